use std::collections::HashSet;

use crate::canvas::{CellEdit, CellId, Symmetry};
use crate::palette::BeadColor;
use crate::project::Project;
use crate::render::GridRenderer;
use crate::viewport::{self, Viewport};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    /// Single-click placement; every click is its own undo step.
    Select,
    #[default]
    Brush,
    Eraser,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[Tool::Select, Tool::Brush, Tool::Eraser]
    }
}

/// Pointer input in logical pixels relative to the surface's top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    Leave,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hover {
    Cell(CellId),
    Outside,
}

/// What handling one pointer event did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PointerResponse {
    /// `None` for events without a position (`Up`).
    pub hover: Option<Hover>,
    /// The project changed (one new undo step); a full redraw is due.
    pub committed: bool,
    /// Cells drawn on the preview during this event.
    pub previewed: Vec<CellId>,
}

/// Where in-progress strokes are shown before they are committed.
pub trait StrokePreview {
    fn preview_cell(&mut self, x: u32, y: u32, color: Option<&BeadColor>);
}

impl StrokePreview for GridRenderer {
    fn preview_cell(&mut self, x: u32, y: u32, color: Option<&BeadColor>) {
        self.render_cell(x, y, color);
    }
}

/// Headless: strokes are only committed.
impl StrokePreview for () {
    fn preview_cell(&mut self, _x: u32, _y: u32, _color: Option<&BeadColor>) {}
}

// ============================================================================
// STROKE TRACKER: cells touched by the current drag
// ============================================================================

#[derive(Default)]
pub struct StrokeTracker {
    pub is_active: bool,
    /// Color every touched cell receives (`None` erases).
    target: Option<BeadColor>,
    last_cell: Option<CellId>,
    edits: Vec<CellEdit>,
    seen: HashSet<CellId>,
    pub description: String,
}

/// A finished stroke, ready to be committed as one batch.
pub struct StrokeEvent {
    pub edits: Vec<CellEdit>,
    pub description: String,
}

impl StrokeTracker {
    pub fn start(&mut self, target: Option<BeadColor>, description: &str) {
        self.is_active = true;
        self.target = target;
        self.last_cell = None;
        self.edits.clear();
        self.seen.clear();
        self.description = description.to_string();
    }

    pub fn target(&self) -> Option<&BeadColor> {
        self.target.as_ref()
    }

    pub fn last_cell(&self) -> Option<CellId> {
        self.last_cell
    }

    pub fn set_last_cell(&mut self, cell: CellId) {
        self.last_cell = Some(cell);
    }

    /// Remember `cell` as touched; returns `false` if it already was.
    pub fn record(&mut self, cell: CellId) -> bool {
        if !self.seen.insert(cell) {
            return false;
        }
        self.edits.push(CellEdit {
            x: cell.x,
            y: cell.y,
            color: self.target.clone(),
        });
        true
    }

    pub fn touched(&self) -> usize {
        self.edits.len()
    }

    pub fn finish(&mut self) -> Option<StrokeEvent> {
        if !self.is_active {
            return None;
        }
        let event = StrokeEvent {
            edits: std::mem::take(&mut self.edits),
            description: std::mem::take(&mut self.description),
        };
        self.cancel();
        (!event.edits.is_empty()).then_some(event)
    }

    pub fn cancel(&mut self) {
        self.is_active = false;
        self.target = None;
        self.last_cell = None;
        self.edits.clear();
        self.seen.clear();
        self.description.clear();
    }
}

// ============================================================================
// INTERACTION CONTROLLER
// ============================================================================

/// Turns pointer events into cell edits.
///
/// Brush and eraser drags are previewed cell by cell and committed to the
/// project as a single batch when the pointer is released or leaves the
/// surface.  Select clicks commit at once.
#[derive(Default)]
pub struct InteractionController {
    pub tool: Tool,
    pub selected_color: Option<BeadColor>,
    pub symmetry: Symmetry,
    stroke: StrokeTracker,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_painting(&self) -> bool {
        self.stroke.is_active
    }

    pub fn handle(
        &mut self,
        event: PointerEvent,
        viewport: &Viewport,
        project: &mut Project,
        preview: &mut impl StrokePreview,
    ) -> PointerResponse {
        let mut response = PointerResponse::default();
        match event {
            PointerEvent::Down { x, y } => {
                let cell = viewport::cell_at(x, y, viewport);
                response.hover = Some(hover_of(cell));
                let Some(cell) = cell else {
                    return response;
                };
                if self.stroke.is_active {
                    response.committed |= self.commit(project);
                }
                match self.tool {
                    Tool::Select => {
                        response.committed |= self.click(cell, viewport, project);
                    }
                    Tool::Brush | Tool::Eraser => {
                        // With no color selected the brush erases.
                        let (target, description) = match self.tool {
                            Tool::Eraser => (None, "Eraser Stroke"),
                            _ => (self.selected_color.clone(), "Brush Stroke"),
                        };
                        self.stroke.start(target, description);
                        self.paint(cell, viewport, preview, &mut response.previewed);
                    }
                }
            }
            PointerEvent::Move { x, y } => {
                let cell = viewport::cell_at(x, y, viewport);
                response.hover = Some(hover_of(cell));
                if let Some(cell) = cell
                    && self.stroke.is_active
                    && self.stroke.last_cell() != Some(cell)
                {
                    self.paint(cell, viewport, preview, &mut response.previewed);
                }
            }
            PointerEvent::Up => {
                response.committed = self.commit(project);
            }
            PointerEvent::Leave => {
                response.hover = Some(Hover::Outside);
                response.committed = self.commit(project);
            }
        }
        response
    }

    /// Apply the stroke's target to `cell` and its mirror on the preview.
    fn paint(
        &mut self,
        cell: CellId,
        viewport: &Viewport,
        preview: &mut impl StrokePreview,
        previewed: &mut Vec<CellId>,
    ) {
        self.stroke.set_last_cell(cell);
        let mirror = self.symmetry.mirror_of(cell, viewport.width, viewport.height);
        for target in std::iter::once(cell).chain(mirror) {
            if self.stroke.record(target) {
                preview.preview_cell(target.x, target.y, self.stroke.target());
                previewed.push(target);
            }
        }
    }

    fn click(&mut self, cell: CellId, viewport: &Viewport, project: &mut Project) -> bool {
        let color = self.selected_color.clone();
        let mirror = self.symmetry.mirror_of(cell, viewport.width, viewport.height);
        let edits: Vec<CellEdit> = std::iter::once(cell)
            .chain(mirror)
            .map(|c| CellEdit { x: c.x, y: c.y, color: color.clone() })
            .collect();
        project.set_cells(&edits)
    }

    fn commit(&mut self, project: &mut Project) -> bool {
        let Some(stroke) = self.stroke.finish() else {
            return false;
        };
        crate::log_info!("{}: {} cells", stroke.description, stroke.edits.len());
        project.set_cells(&stroke.edits)
    }
}

fn hover_of(cell: Option<CellId>) -> Hover {
    match cell {
        Some(cell) => Hover::Cell(cell),
        None => Hover::Outside,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::SymmetryAxis;

    const RED: BeadColor = BeadColor::rgb(255, 0, 0);

    #[derive(Default)]
    struct Recorder(Vec<(u32, u32, Option<BeadColor>)>);

    impl StrokePreview for Recorder {
        fn preview_cell(&mut self, x: u32, y: u32, color: Option<&BeadColor>) {
            self.0.push((x, y, color.cloned()));
        }
    }

    fn setup(width: u32, height: u32) -> (InteractionController, Viewport, Project) {
        let mut controller = InteractionController::new();
        controller.selected_color = Some(RED);
        (controller, Viewport::new(width, height, 10.0), Project::new(width, height, "t"))
    }

    /// Center of a cell in logical pixels.
    fn at(x: u32, y: u32) -> (f32, f32) {
        (x as f32 * 10.0 + 5.0, y as f32 * 10.0 + 5.0)
    }

    #[test]
    fn drag_previews_then_commits_once() {
        let (mut c, vp, mut project) = setup(5, 5);
        let mut preview = Recorder::default();

        let (x, y) = at(0, 0);
        c.handle(PointerEvent::Down { x, y }, &vp, &mut project, &mut preview);
        for i in 1..4 {
            let (x, y) = at(i, 0);
            c.handle(PointerEvent::Move { x, y }, &vp, &mut project, &mut preview);
            c.handle(PointerEvent::Move { x: x + 1.0, y }, &vp, &mut project, &mut preview);
        }
        assert!(c.is_painting());
        assert_eq!(preview.0.len(), 4);
        assert_eq!(project.grid().colored_count(), 0);

        let response = c.handle(PointerEvent::Up, &vp, &mut project, &mut preview);
        assert!(response.committed);
        assert!(!c.is_painting());
        assert_eq!(project.grid().colored_count(), 4);
        assert_eq!(project.undo_count(), 1);
    }

    #[test]
    fn leaving_the_surface_commits() {
        let (mut c, vp, mut project) = setup(3, 3);
        c.tool = Tool::Eraser;
        project.set_cell(1, 1, Some(RED));

        let (x, y) = at(1, 1);
        c.handle(PointerEvent::Down { x, y }, &vp, &mut project, &mut ());
        let response = c.handle(PointerEvent::Leave, &vp, &mut project, &mut ());
        assert_eq!(response.hover, Some(Hover::Outside));
        assert!(project.grid().color_at(1, 1).is_none());
        assert_eq!(project.undo_count(), 2);
    }

    #[test]
    fn mirror_on_the_axis_is_recorded_once() {
        let (mut c, vp, mut project) = setup(5, 3);
        c.symmetry = Symmetry::on(SymmetryAxis::X);
        let mut preview = Recorder::default();

        let (x, y) = at(2, 1);
        let response = c.handle(PointerEvent::Down { x, y }, &vp, &mut project, &mut preview);
        assert_eq!(response.previewed, vec![CellId::new(2, 1)]);
    }

    #[test]
    fn select_clicks_commit_immediately() {
        let (mut c, vp, mut project) = setup(4, 4);
        c.tool = Tool::Select;
        c.symmetry = Symmetry::on(SymmetryAxis::Y);

        let (x, y) = at(1, 0);
        let response = c.handle(PointerEvent::Down { x, y }, &vp, &mut project, &mut ());
        assert!(response.committed);
        assert!(!c.is_painting());
        assert_eq!(project.grid().color_at(1, 0), Some(&RED));
        assert_eq!(project.grid().color_at(1, 3), Some(&RED));
        assert_eq!(project.undo_count(), 1);
    }

    #[test]
    fn hover_never_touches_history() {
        let (mut c, vp, mut project) = setup(4, 4);
        let response = c.handle(PointerEvent::Move { x: 15.0, y: 25.0 }, &vp, &mut project, &mut ());
        assert_eq!(response.hover, Some(Hover::Cell(CellId::new(1, 2))));
        let response = c.handle(PointerEvent::Move { x: 95.0, y: 5.0 }, &vp, &mut project, &mut ());
        assert_eq!(response.hover, Some(Hover::Outside));
        assert_eq!(project.undo_count(), 0);
    }

    #[test]
    fn no_selected_color_erases() {
        let (mut c, vp, mut project) = setup(3, 3);
        project.set_cell(0, 0, Some(RED));
        project.set_cell(2, 2, Some(RED));
        c.selected_color = None;

        let (x, y) = at(0, 0);
        c.handle(PointerEvent::Down { x, y }, &vp, &mut project, &mut ());
        assert!(c.handle(PointerEvent::Up, &vp, &mut project, &mut ()).committed);
        assert!(project.grid().color_at(0, 0).is_none());

        c.tool = Tool::Select;
        let (x, y) = at(2, 2);
        let response = c.handle(PointerEvent::Down { x, y }, &vp, &mut project, &mut ());
        assert!(response.committed);
        assert_eq!(project.grid().colored_count(), 0);
        assert_eq!(project.undo_count(), 4);
    }

    #[test]
    fn reentering_a_touched_cell_previews_it_once() {
        let (mut c, vp, mut project) = setup(4, 1);
        let mut preview = Recorder::default();

        for x in [0, 1, 2, 1, 0, 1] {
            let (px, py) = at(x, 0);
            let event = if preview.0.is_empty() {
                PointerEvent::Down { x: px, y: py }
            } else {
                PointerEvent::Move { x: px, y: py }
            };
            c.handle(event, &vp, &mut project, &mut preview);
        }
        let cells: Vec<u32> = preview.0.iter().map(|(x, _, _)| *x).collect();
        assert_eq!(cells, vec![0, 1, 2]);

        assert!(c.handle(PointerEvent::Up, &vp, &mut project, &mut preview).committed);
        assert_eq!(project.grid().colored_count(), 3);
        assert_eq!(project.undo_count(), 1);
    }

    #[test]
    fn out_of_bounds_down_is_ignored() {
        let (mut c, vp, mut project) = setup(2, 2);
        c.handle(PointerEvent::Down { x: -3.0, y: 5.0 }, &vp, &mut project, &mut ());
        assert!(!c.is_painting());
        assert!(!c.handle(PointerEvent::Up, &vp, &mut project, &mut ()).committed);
    }
}
