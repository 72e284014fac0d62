use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::canvas::{CellEdit, CellId, ColorStats, Grid, GridState, MarkShift, MarkedCells, MoveDirection};
use crate::components::history::{GridSnapshot, HistoryManager, DEFAULT_MAX_UNDO};
use crate::io::{CellRecord, ProjectError, ProjectFile};
use crate::palette::{BeadColor, Palette};

/// Single open bead design.
///
/// Every editing operation here records one undo step when it changes
/// something; degenerate requests (deleting the last row, out-of-bounds
/// cells, empty batches, repainting a cell with its own color) return
/// `false` and leave history untouched.  Marks are not part of undo.
pub struct Project {
    pub id: String,
    pub name: String,
    pub state: GridState,
    pub history: HistoryManager,
    /// `None` for projects never saved.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
}

impl Project {
    pub fn new(width: u32, height: u32, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            state: GridState::new(width, height),
            history: HistoryManager::new(DEFAULT_MAX_UNDO),
            path: None,
            is_dirty: false,
            last_modified: now_millis(),
        }
    }

    pub fn new_untitled(untitled_counter: usize, width: u32, height: u32) -> Self {
        Self::new(width, height, format!("Untitled-{}", untitled_counter))
    }

    pub fn with_max_undo(mut self, steps: usize) -> Self {
        self.history.set_max_history_size(steps);
        self
    }

    // --- accessors -------------------------------------------------------

    pub fn grid(&self) -> &Grid {
        &self.state.grid
    }

    pub fn width(&self) -> u32 {
        self.state.width()
    }

    pub fn height(&self) -> u32 {
        self.state.height()
    }

    pub fn marks(&self) -> &MarkedCells {
        &self.state.marks
    }

    pub fn undo_count(&self) -> usize {
        self.history.undo_count()
    }

    pub fn redo_count(&self) -> usize {
        self.history.redo_count()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }

    pub fn color_stats(&self, palette: &Palette) -> ColorStats {
        self.state.color_stats(palette)
    }

    /// Display title with a dirty indicator.
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    // --- history-recorded edits ------------------------------------------

    pub fn set_cell(&mut self, x: u32, y: u32, color: Option<BeadColor>) -> bool {
        if self.state.grid.get(x, y).is_none() {
            return false;
        }
        self.record("Paint Cell", |state| state.set_color(x, y, color))
    }

    /// Apply a whole stroke as one undo step.
    pub fn set_cells(&mut self, edits: &[CellEdit]) -> bool {
        if edits.is_empty() {
            return false;
        }
        self.record("Paint Stroke", |state| state.apply_edits(edits) > 0)
    }

    pub fn insert_row(&mut self, index: u32) -> bool {
        self.record_structural("Insert Row", MarkShift::InsertRow(index), |state| {
            state.insert_row(index)
        })
    }

    pub fn delete_row(&mut self, index: u32) -> bool {
        self.record_structural("Delete Row", MarkShift::DeleteRow(index), |state| {
            state.delete_row(index)
        })
    }

    pub fn insert_column(&mut self, index: u32) -> bool {
        self.record_structural("Insert Column", MarkShift::InsertColumn(index), |state| {
            state.insert_column(index)
        })
    }

    pub fn delete_column(&mut self, index: u32) -> bool {
        self.record_structural("Delete Column", MarkShift::DeleteColumn(index), |state| {
            state.delete_column(index)
        })
    }

    pub fn move_grid(&mut self, direction: MoveDirection) -> bool {
        let description = match direction {
            MoveDirection::Up => "Move Up",
            MoveDirection::Down => "Move Down",
            MoveDirection::Left => "Move Left",
            MoveDirection::Right => "Move Right",
        };
        self.record(description, |state| {
            state.shift(direction);
            true
        })
    }

    /// Recolor every `old` cell; `None` erases them.
    pub fn replace_color(&mut self, old: &BeadColor, new: Option<&BeadColor>) -> bool {
        if Some(old) == new {
            return false;
        }
        self.record("Replace Color", |state| state.replace_color(old, new) > 0)
    }

    pub fn flip_horizontal(&mut self) -> bool {
        self.record("Flip Horizontal", |state| {
            state.flip_horizontal();
            true
        })
    }

    pub fn flip_vertical(&mut self) -> bool {
        self.record("Flip Vertical", |state| {
            state.flip_vertical();
            true
        })
    }

    pub fn clear(&mut self) -> bool {
        self.record("Clear", |state| {
            state.clear();
            true
        })
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(&mut self.state) {
            Some(description) => {
                crate::log_info!("Undo: {}", description);
                self.touch();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(&mut self.state) {
            Some(description) => {
                crate::log_info!("Redo: {}", description);
                self.touch();
                true
            }
            None => false,
        }
    }

    // --- marking (not recorded) ------------------------------------------

    /// Flip a cell's placed mark; returns the new state, or `None` when the
    /// cell is outside the grid.
    pub fn toggle_mark(&mut self, id: CellId) -> Option<bool> {
        self.state.grid.get(id.x, id.y)?;
        let marked = self.state.marks.toggle(id);
        self.state.mark_dirty();
        self.touch();
        Some(marked)
    }

    pub fn reset_marks(&mut self) {
        if self.state.marks.is_empty() {
            return;
        }
        self.state.marks.clear();
        self.state.mark_dirty();
        self.touch();
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    // --- persistence -------------------------------------------------------

    /// Serializable form.  Colors known to `palette` are written as their
    /// palette ID, others as `#RRGGBB`.
    pub fn to_file(&self, palette: &Palette) -> ProjectFile {
        let grid = self
            .state
            .grid
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| CellRecord {
                        id: cell.id().to_string(),
                        color: cell.color.as_ref().map(|c| palette.encode(c)),
                        x: cell.x,
                        y: cell.y,
                    })
                    .collect()
            })
            .collect();

        ProjectFile {
            id: self.id.clone(),
            name: self.name.clone(),
            width: self.width(),
            height: self.height(),
            grid,
            marked_cells: self.state.marks.to_map(),
            last_modified: self.last_modified,
        }
    }

    /// Replace-wholesale load.  Cell positions are taken from where each
    /// record sits in the grid, not from its stored `x`/`y`/`id`.
    pub fn from_file(file: ProjectFile, palette: &Palette) -> Result<Self, ProjectError> {
        file.validate()?;
        let colors = file
            .grid
            .iter()
            .flatten()
            .map(|cell| cell.color.as_deref().map(|text| palette.decode(text)))
            .collect();

        let mut state = GridState::new(file.width, file.height);
        state.grid = Grid::from_colors(file.width, file.height, colors);
        state.marks = MarkedCells::from_map(&file.marked_cells);
        let (width, height) = (state.width(), state.height());
        state.marks.remap(|id| (id.x < width && id.y < height).then_some(id));

        let id = if file.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            file.id
        };

        Ok(Self {
            id,
            name: file.name,
            state,
            history: HistoryManager::new(DEFAULT_MAX_UNDO),
            path: None,
            is_dirty: false,
            last_modified: file.last_modified,
        })
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// Display name from the file stem of `path`.
    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    fn record(&mut self, description: &str, op: impl FnOnce(&mut GridState) -> bool) -> bool {
        self.record_with(description, None, op)
    }

    fn record_structural(
        &mut self,
        description: &str,
        shift: MarkShift,
        op: impl FnOnce(&mut GridState) -> bool,
    ) -> bool {
        self.record_with(description, Some(shift), op)
    }

    /// Snapshot, run `op`, and push the snapshot only if `op` changed something.
    fn record_with(
        &mut self,
        description: &str,
        shift: Option<MarkShift>,
        op: impl FnOnce(&mut GridState) -> bool,
    ) -> bool {
        let before = GridSnapshot::capture(&self.state);
        if !op(&mut self.state) {
            return false;
        }
        match shift {
            Some(shift) => self.history.push_structural(description, before, shift),
            None => self.history.push_snapshot(description, before),
        }
        self.touch();
        true
    }

    fn touch(&mut self) {
        self.is_dirty = true;
        self.last_modified = now_millis();
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: BeadColor = BeadColor::rgb(255, 0, 0);
    const GREEN: BeadColor = BeadColor::rgb(0, 255, 0);

    fn palette() -> Palette {
        Palette::from_groups(vec![(
            "A".to_string(),
            vec![("A2".to_string(), "#FF0000".to_string())],
        )])
    }

    #[test]
    fn degenerate_ops_do_not_touch_history() {
        let mut project = Project::new(1, 1, "p");
        assert!(!project.delete_row(0));
        assert!(!project.delete_column(0));
        assert!(!project.set_cell(4, 4, Some(RED)));
        assert!(!project.set_cells(&[]));
        assert!(!project.replace_color(&RED, Some(&GREEN)));
        assert!(!project.undo());
        assert_eq!(project.undo_count(), 0);
        assert!(!project.is_dirty);
    }

    #[test]
    fn each_edit_is_one_undo_step() {
        let mut project = Project::new(4, 4, "p");
        project.set_cell(0, 0, Some(RED));
        project.replace_color(&RED, Some(&GREEN));
        project.insert_column(0);
        assert_eq!(project.undo_count(), 3);
        assert_eq!(project.undo_description(), Some("Insert Column"));

        assert!(project.undo());
        assert_eq!(project.width(), 4);
        assert!(project.undo());
        assert_eq!(project.grid().color_at(0, 0), Some(&RED));
        assert_eq!(project.redo_count(), 2);
    }

    #[test]
    fn undo_bound_is_twenty() {
        let mut project = Project::new(2, 2, "p");
        for i in 0..25 {
            let color = if i % 2 == 0 { Some(RED) } else { None };
            project.set_cell(0, 0, color);
        }
        assert_eq!(project.undo_count(), DEFAULT_MAX_UNDO);
    }

    #[test]
    fn marks_are_outside_history() {
        let mut project = Project::new(3, 3, "p");
        assert_eq!(project.toggle_mark(CellId::new(1, 1)), Some(true));
        assert_eq!(project.toggle_mark(CellId::new(9, 9)), None);
        assert_eq!(project.undo_count(), 0);
        project.reset_marks();
        assert!(project.marks().is_empty());
    }

    #[test]
    fn undo_leaves_later_mark_toggles_alone() {
        let mut project = Project::new(3, 3, "p");
        project.set_cell(0, 0, Some(RED));
        project.toggle_mark(CellId::new(2, 2));

        assert!(project.undo());
        assert!(project.grid().color_at(0, 0).is_none());
        assert!(project.marks().is_marked(CellId::new(2, 2)));
    }

    #[test]
    fn undoing_a_delete_column_shifts_marks_back() {
        let mut project = Project::new(4, 2, "p");
        project.toggle_mark(CellId::new(3, 1));
        assert!(project.delete_column(1));
        assert!(project.marks().is_marked(CellId::new(2, 1)));

        assert!(project.undo());
        assert_eq!(project.width(), 4);
        assert_eq!(project.marks().iter().collect::<Vec<_>>(), vec![CellId::new(3, 1)]);
    }

    #[test]
    fn repeated_identical_clicks_add_one_step() {
        let mut project = Project::new(2, 2, "p");
        assert!(project.set_cell(1, 0, Some(RED)));
        assert!(!project.set_cell(1, 0, Some(RED)));
        assert!(!project.set_cell(1, 0, Some(RED)));
        assert!(!project.set_cell(0, 1, None));
        assert_eq!(project.undo_count(), 1);
    }

    #[test]
    fn file_round_trip_encodes_palette_ids() {
        let mut project = Project::new(2, 2, "heart");
        project.set_cell(0, 0, Some(RED));
        project.set_cell(1, 1, Some(GREEN));
        project.toggle_mark(CellId::new(0, 0));

        let file = project.to_file(&palette());
        assert_eq!(file.grid[0][0].color.as_deref(), Some("A2"));
        assert_eq!(file.grid[1][1].color.as_deref(), Some("#00FF00"));
        assert_eq!(file.grid[1][0].id, "0-1");

        let loaded = Project::from_file(file, &palette()).unwrap();
        assert_eq!(loaded.grid(), project.grid());
        assert_eq!(loaded.marks(), project.marks());
        assert_eq!(loaded.id, project.id);
        assert_eq!(loaded.undo_count(), 0);
    }

    #[test]
    fn unknown_ids_survive_load_and_save() {
        let mut file = Project::new(1, 1, "p").to_file(&Palette::default());
        file.grid[0][0].color = Some("Z99".to_string());
        let loaded = Project::from_file(file, &palette()).unwrap();
        assert_eq!(
            loaded.grid().color_at(0, 0),
            Some(&BeadColor::Unresolved("Z99".into()))
        );
        assert_eq!(loaded.to_file(&palette()).grid[0][0].color.as_deref(), Some("Z99"));
    }
}
