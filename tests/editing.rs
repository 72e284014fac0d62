use perlerpad::canvas::{CellId, MoveDirection, Symmetry, SymmetryAxis};
use perlerpad::components::tools::{InteractionController, PointerEvent, Tool};
use perlerpad::palette::BeadColor;
use perlerpad::project::Project;
use perlerpad::viewport::Viewport;

const RED: BeadColor = BeadColor::rgb(0xFF, 0, 0);
const CELL: f32 = 20.0;

fn center(x: u32, y: u32) -> (f32, f32) {
    (x as f32 * CELL + CELL / 2.0, y as f32 * CELL + CELL / 2.0)
}

fn controller(tool: Tool) -> InteractionController {
    let mut c = InteractionController::new();
    c.tool = tool;
    c.selected_color = Some(RED);
    c
}

fn click(c: &mut InteractionController, vp: &Viewport, project: &mut Project, x: u32, y: u32) {
    let (px, py) = center(x, y);
    c.handle(PointerEvent::Down { x: px, y: py }, vp, project, &mut ());
    c.handle(PointerEvent::Up, vp, project, &mut ());
}

fn assert_positions(project: &Project) {
    for (y, row) in project.grid().rows().iter().enumerate() {
        assert_eq!(row.len() as u32, project.width());
        for (x, cell) in row.iter().enumerate() {
            assert_eq!((cell.x, cell.y), (x as u32, y as u32));
        }
    }
    assert_eq!(project.grid().rows().len() as u32, project.height());
}

#[test]
fn one_drag_is_one_undo_step() {
    let vp = Viewport::new(10, 10, CELL);
    let mut project = Project::new(10, 10, "drag");
    let mut c = controller(Tool::Brush);

    let (x, y) = center(0, 4);
    c.handle(PointerEvent::Down { x, y }, &vp, &mut project, &mut ());
    for i in 1..6 {
        let (x, y) = center(i, 4);
        c.handle(PointerEvent::Move { x, y }, &vp, &mut project, &mut ());
    }
    c.handle(PointerEvent::Up, &vp, &mut project, &mut ());

    assert_eq!(project.grid().colored_count(), 6);
    assert_eq!(project.undo_count(), 1);

    assert!(project.undo());
    assert_eq!(project.grid().colored_count(), 0);
}

#[test]
fn x_symmetry_mirrors_across_the_vertical_axis() {
    let vp = Viewport::new(10, 10, CELL);
    let mut project = Project::new(10, 10, "sym");
    let mut c = controller(Tool::Brush);
    c.symmetry = Symmetry::on(SymmetryAxis::X);

    click(&mut c, &vp, &mut project, 2, 5);
    assert_eq!(project.grid().color_at(2, 5), Some(&RED));
    assert_eq!(project.grid().color_at(7, 5), Some(&RED));
    assert_eq!(project.grid().colored_count(), 2);
}

#[test]
fn centre_column_of_odd_width_is_painted_once() {
    let vp = Viewport::new(9, 3, CELL);
    let mut project = Project::new(9, 3, "odd");
    let mut c = controller(Tool::Brush);
    c.symmetry = Symmetry::on(SymmetryAxis::X);

    click(&mut c, &vp, &mut project, 4, 1);
    assert_eq!(project.grid().colored_count(), 1);
    assert_eq!(project.undo_count(), 1);
}

#[test]
fn inserting_a_row_shifts_cells_and_marks() {
    let mut project = Project::new(5, 5, "rows");
    project.set_cell(2, 4, Some(RED));
    project.toggle_mark(CellId::new(1, 4));

    assert!(project.insert_row(3));
    assert_eq!(project.height(), 6);
    assert_positions(&project);
    assert_eq!(project.grid().color_at(2, 5), Some(&RED));
    assert!(project.grid().color_at(2, 4).is_none());
    assert!(project.marks().is_marked(CellId::new(1, 5)));
    assert!(!project.marks().is_marked(CellId::new(1, 4)));
}

#[test]
fn moving_left_drains_the_grid() {
    let mut project = Project::new(4, 2, "move");
    for x in 0..4 {
        project.set_cell(x, 0, Some(RED));
    }

    assert!(project.move_grid(MoveDirection::Left));
    assert!(project.grid().color_at(3, 0).is_none());
    assert_eq!(project.grid().colored_count(), 3);

    for _ in 1..4 {
        project.move_grid(MoveDirection::Left);
    }
    assert_eq!(project.grid().colored_count(), 0);
    assert_positions(&project);
}

#[test]
fn a_fresh_edit_after_undo_drops_redo() {
    let mut project = Project::new(3, 3, "history");
    project.set_cell(0, 0, Some(RED));
    project.set_cell(1, 1, Some(RED));

    assert!(project.undo());
    assert!(project.grid().color_at(1, 1).is_none());
    assert!(project.redo());
    assert_eq!(project.grid().color_at(1, 1), Some(&RED));

    assert!(project.undo());
    project.set_cell(2, 2, Some(RED));
    assert_eq!(project.redo_count(), 0);
    assert!(!project.redo());
}

#[test]
fn four_by_four_scenario() {
    let vp = Viewport::new(4, 4, CELL);
    let mut project = Project::new(4, 4, "scenario");
    let mut c = controller(Tool::Brush);

    click(&mut c, &vp, &mut project, 0, 0);
    assert_eq!(project.grid().colored_count(), 1);
    assert_eq!(project.grid().color_at(0, 0), Some(&RED));

    c.symmetry = Symmetry::on(SymmetryAxis::X);
    click(&mut c, &vp, &mut project, 3, 3);
    assert_eq!(project.grid().color_at(3, 3), Some(&RED));
    assert_eq!(project.grid().color_at(0, 3), Some(&RED));
    assert_eq!(project.grid().colored_count(), 3);
    assert_eq!(project.undo_count(), 2);
}

#[test]
fn undo_keeps_marks_placed_after_the_edit() {
    let vp = Viewport::new(4, 4, CELL);
    let mut project = Project::new(4, 4, "marks");
    let mut c = controller(Tool::Brush);

    click(&mut c, &vp, &mut project, 0, 0);
    project.toggle_mark(CellId::new(2, 2));
    assert!(project.insert_row(0));
    project.toggle_mark(CellId::new(0, 0));

    assert!(project.undo());
    assert_eq!(project.height(), 4);
    assert!(project.marks().is_marked(CellId::new(2, 2)));
    assert!(project.undo());
    assert!(project.grid().color_at(0, 0).is_none());
    assert_eq!(project.marks().iter().collect::<Vec<_>>(), vec![CellId::new(2, 2)]);
}
