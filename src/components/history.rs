use std::collections::VecDeque;

use crate::canvas::{Grid, GridState, MarkShift};
use crate::palette::BeadColor;

/// Default number of undo steps kept.
pub const DEFAULT_MAX_UNDO: usize = 20;

// ============================================================================
// GRID SNAPSHOT: structurally independent copy of the cells
// ============================================================================

/// Cells and dimensions only.  Placed marks are never recorded, so undo and
/// redo leave mark toggles alone; structural entries carry a [`MarkShift`]
/// instead.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSnapshot {
    pub width: u32,
    pub height: u32,
    pub colors: Vec<Option<BeadColor>>,
}

impl GridSnapshot {
    pub fn capture(state: &GridState) -> Self {
        Self {
            width: state.width(),
            height: state.height(),
            colors: state.grid.colors(),
        }
    }

    pub fn restore_into(&self, state: &mut GridState) {
        state.grid = Grid::from_colors(self.width, self.height, self.colors.clone());
        state.mark_dirty();
    }

    fn memory_bytes(&self) -> usize {
        let unresolved: usize = self
            .colors
            .iter()
            .map(|c| match c {
                Some(BeadColor::Unresolved(text)) => text.len(),
                _ => 0,
            })
            .sum();
        self.colors.len() * std::mem::size_of::<Option<BeadColor>>()
            + unresolved
    }
}

struct HistoryEntry {
    description: String,
    snapshot: GridSnapshot,
    /// Set for row/column inserts and deletes.
    marks: Option<MarkShift>,
}

// ============================================================================
// HISTORY MANAGER - bounded undo/redo stacks of snapshots
// ============================================================================

/// Undo/redo history.  Each undo entry holds the document as it was *before*
/// the described operation; undoing swaps it with the current document.
pub struct HistoryManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size: max_history_size.max(1),
            max_memory_bytes: Some(64 * 1024 * 1024),
            total_memory: 0,
        }
    }

    /// Record `state` as it is now, before an operation changes it.
    pub fn push(&mut self, description: impl Into<String>, state: &GridState) {
        self.push_snapshot(description, GridSnapshot::capture(state));
    }

    /// Record a snapshot taken earlier (before an operation that turned out
    /// to change something).
    pub fn push_snapshot(&mut self, description: impl Into<String>, snapshot: GridSnapshot) {
        self.push_entry(description.into(), snapshot, None);
    }

    /// Like [`push_snapshot`](Self::push_snapshot) for an edit that also
    /// moved the marks by `shift`; undo moves them back.
    pub fn push_structural(
        &mut self,
        description: impl Into<String>,
        snapshot: GridSnapshot,
        shift: MarkShift,
    ) {
        self.push_entry(description.into(), snapshot, Some(shift));
    }

    fn push_entry(&mut self, description: String, snapshot: GridSnapshot, marks: Option<MarkShift>) {
        for entry in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(entry.snapshot.memory_bytes());
        }

        self.total_memory += snapshot.memory_bytes();
        self.undo_stack.push_back(HistoryEntry {
            description,
            snapshot,
            marks,
        });

        self.prune();
    }

    pub fn undo(&mut self, state: &mut GridState) -> Option<String> {
        let entry = self.undo_stack.pop_back()?;
        let current = GridSnapshot::capture(state);
        self.total_memory += current.memory_bytes();
        self.total_memory = self.total_memory.saturating_sub(entry.snapshot.memory_bytes());
        entry.snapshot.restore_into(state);
        if let Some(shift) = entry.marks {
            shift.inverse().apply(&mut state.marks);
        }
        self.redo_stack.push_back(HistoryEntry {
            description: entry.description.clone(),
            snapshot: current,
            marks: entry.marks,
        });
        Some(entry.description)
    }

    pub fn redo(&mut self, state: &mut GridState) -> Option<String> {
        let entry = self.redo_stack.pop_back()?;
        let current = GridSnapshot::capture(state);
        self.total_memory += current.memory_bytes();
        self.total_memory = self.total_memory.saturating_sub(entry.snapshot.memory_bytes());
        entry.snapshot.restore_into(state);
        if let Some(shift) = entry.marks {
            shift.apply(&mut state.marks);
        }
        self.undo_stack.push_back(HistoryEntry {
            description: entry.description.clone(),
            snapshot: current,
            marks: entry.marks,
        });
        Some(entry.description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.description.as_str())
    }

    /// All undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|e| e.description.clone()).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    pub fn set_max_history_size(&mut self, max: usize) {
        self.max_history_size = max.max(1);
        self.prune();
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.snapshot.memory_bytes());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.snapshot.memory_bytes());
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CellId;

    const RED: BeadColor = BeadColor::rgb(255, 0, 0);

    #[test]
    fn undo_and_redo_swap_snapshots() {
        let mut state = GridState::new(3, 3);
        let mut history = HistoryManager::default();

        history.push("Paint", &state);
        state.set_color(1, 1, Some(RED));

        assert_eq!(history.undo(&mut state).as_deref(), Some("Paint"));
        assert!(state.grid.color_at(1, 1).is_none());
        assert_eq!(history.redo_count(), 1);

        assert_eq!(history.redo(&mut state).as_deref(), Some("Paint"));
        assert_eq!(state.grid.color_at(1, 1), Some(&RED));
        assert_eq!(history.undo_count(), 1);
    }

    #[test]
    fn undo_keeps_marks_toggled_after_the_edit() {
        let mut state = GridState::new(3, 3);
        let mut history = HistoryManager::default();

        history.push("Paint", &state);
        state.set_color(0, 0, Some(RED));
        state.marks.toggle(CellId::new(2, 2));

        history.undo(&mut state);
        assert!(state.grid.color_at(0, 0).is_none());
        assert!(state.marks.is_marked(CellId::new(2, 2)));
        history.redo(&mut state);
        assert!(state.marks.is_marked(CellId::new(2, 2)));
    }

    #[test]
    fn structural_undo_moves_marks_back() {
        let mut state = GridState::new(2, 2);
        state.marks.toggle(CellId::new(1, 1));
        let mut history = HistoryManager::default();

        let before = GridSnapshot::capture(&state);
        state.insert_row(0);
        history.push_structural("Insert Row", before, MarkShift::InsertRow(0));
        assert!(state.marks.is_marked(CellId::new(1, 2)));
        state.marks.toggle(CellId::new(0, 0));

        history.undo(&mut state);
        assert_eq!((state.width(), state.height()), (2, 2));
        assert_eq!(state.marks.iter().collect::<Vec<_>>(), vec![CellId::new(1, 1)]);

        history.redo(&mut state);
        assert_eq!((state.width(), state.height()), (2, 3));
        assert_eq!(state.marks.iter().collect::<Vec<_>>(), vec![CellId::new(1, 2)]);
    }

    #[test]
    fn stored_frames_are_independent_of_later_edits() {
        let mut state = GridState::new(2, 2);
        let mut history = HistoryManager::default();

        history.push("Paint", &state);
        state.set_color(0, 0, Some(RED));
        history.push("Paint", &state);
        state.set_color(1, 1, Some(RED));

        history.undo(&mut state);
        state.set_color(0, 1, Some(RED));
        assert_eq!(history.redo(&mut state).as_deref(), Some("Paint"));
        assert_eq!(state.grid.color_at(1, 1), Some(&RED));
        assert!(state.grid.color_at(0, 1).is_none());

        history.undo(&mut state);
        history.undo(&mut state);
        assert_eq!(state.grid.colored_count(), 0);
    }

    #[test]
    fn push_clears_redo_and_count_is_bounded() {
        let mut state = GridState::new(2, 2);
        let mut history = HistoryManager::new(3);
        for _ in 0..5 {
            history.push("Paint", &state);
        }
        assert_eq!(history.undo_count(), 3);

        history.undo(&mut state);
        assert!(history.can_redo());
        history.push("Paint", &state);
        assert!(!history.can_redo());
    }

    #[test]
    fn empty_stacks_are_no_ops() {
        let mut state = GridState::new(2, 2);
        let mut history = HistoryManager::default();
        assert_eq!(history.undo(&mut state), None);
        assert_eq!(history.redo(&mut state), None);
        assert_eq!(history.memory_usage(), 0);
    }
}
