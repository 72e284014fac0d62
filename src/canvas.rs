use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::palette::{natural_cmp, BeadColor, Palette};

/// Largest grid edge, in cells.
pub const MAX_GRID_DIM: u32 = 500;

// ============================================================================
// CELLS
// ============================================================================

/// Position-derived cell identifier, written `"x-y"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    pub x: u32,
    pub y: u32,
}

impl CellId {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.x, self.y)
    }
}

impl FromStr for CellId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once('-')
            .ok_or_else(|| format!("cell id '{}' is not of the form x-y", s))?;
        let x = x.trim().parse().map_err(|_| format!("bad x in cell id '{}'", s))?;
        let y = y.trim().parse().map_err(|_| format!("bad y in cell id '{}'", s))?;
        Ok(CellId { x, y })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
    /// `None` is an empty (transparent) cell.
    pub color: Option<BeadColor>,
}

impl Cell {
    pub fn empty(x: u32, y: u32) -> Self {
        Self { x, y, color: None }
    }

    pub fn id(&self) -> CellId {
        CellId::new(self.x, self.y)
    }
}

/// One color assignment, as produced by a stroke or a batch edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellEdit {
    pub x: u32,
    pub y: u32,
    pub color: Option<BeadColor>,
}

// ============================================================================
// GRID: row-major cell matrix, `rows[y][x]`
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    /// Empty grid; dimensions are clamped to `1..=MAX_GRID_DIM`.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.clamp(1, MAX_GRID_DIM);
        let height = height.clamp(1, MAX_GRID_DIM);
        let rows = (0..height)
            .map(|y| (0..width).map(|x| Cell::empty(x, y)).collect())
            .collect();
        Self { rows }
    }

    /// Rebuild from row-major colors.  `colors.len()` must equal
    /// `width * height`; missing trailing entries become empty cells.
    pub fn from_colors(width: u32, height: u32, colors: Vec<Option<BeadColor>>) -> Self {
        let mut grid = Self::new(width, height);
        let width = grid.width() as usize;
        for (i, color) in colors.into_iter().enumerate() {
            let (x, y) = (i % width, i / width);
            if let Some(cell) = grid.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
                cell.color = color;
            }
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.rows.first().map_or(0, |row| row.len() as u32)
    }

    pub fn height(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&Cell> {
        self.rows.get(y as usize)?.get(x as usize)
    }

    pub fn color_at(&self, x: u32, y: u32) -> Option<&BeadColor> {
        self.get(x, y)?.color.as_ref()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().flatten()
    }

    /// Row-major copy of every cell color.
    pub fn colors(&self) -> Vec<Option<BeadColor>> {
        self.cells().map(|c| c.color.clone()).collect()
    }

    pub fn colored_count(&self) -> usize {
        self.cells().filter(|c| c.color.is_some()).count()
    }

    fn set_color(&mut self, x: u32, y: u32, color: Option<BeadColor>) -> bool {
        match self.rows.get_mut(y as usize).and_then(|row| row.get_mut(x as usize)) {
            Some(cell) if cell.color != color => {
                cell.color = color;
                true
            }
            _ => false,
        }
    }

    /// Re-derive every cell's position from where it sits.
    fn reindex(&mut self) {
        for (y, row) in self.rows.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                cell.x = x as u32;
                cell.y = y as u32;
            }
        }
    }
}

// ============================================================================
// MARKED CELLS: sparse "bead placed" flags used while assembling
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkedCells(BTreeSet<CellId>);

impl MarkedCells {
    pub fn is_marked(&self, id: CellId) -> bool {
        self.0.contains(&id)
    }

    /// Flip a cell's mark; returns the new state.
    pub fn toggle(&mut self, id: CellId) -> bool {
        if self.0.remove(&id) {
            false
        } else {
            self.0.insert(id);
            true
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CellId> + '_ {
        self.0.iter().copied()
    }

    /// Move every mark through `f`; marks mapped to `None` are dropped.
    pub fn remap(&mut self, f: impl Fn(CellId) -> Option<CellId>) {
        self.0 = self.0.iter().filter_map(|id| f(*id)).collect();
    }

    /// Persisted shape: `{ "x-y": true }`.  Entries with `false` or an
    /// unparseable key are skipped.
    pub fn from_map(map: &BTreeMap<String, bool>) -> Self {
        let mut marks = BTreeSet::new();
        for (key, marked) in map {
            if !marked {
                continue;
            }
            match key.parse::<CellId>() {
                Ok(id) => {
                    marks.insert(id);
                }
                Err(e) => {
                    crate::log_warn!("Ignoring mark: {}", e);
                }
            }
        }
        Self(marks)
    }

    pub fn to_map(&self) -> BTreeMap<String, bool> {
        self.0.iter().map(|id| (id.to_string(), true)).collect()
    }
}

impl FromIterator<CellId> for MarkedCells {
    fn from_iter<I: IntoIterator<Item = CellId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a row/column insert or delete moves the placed marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkShift {
    InsertRow(u32),
    DeleteRow(u32),
    InsertColumn(u32),
    DeleteColumn(u32),
}

impl MarkShift {
    /// The shift that moves marks back.  Marks dropped by a delete stay gone.
    pub fn inverse(self) -> Self {
        match self {
            MarkShift::InsertRow(i) => MarkShift::DeleteRow(i),
            MarkShift::DeleteRow(i) => MarkShift::InsertRow(i),
            MarkShift::InsertColumn(i) => MarkShift::DeleteColumn(i),
            MarkShift::DeleteColumn(i) => MarkShift::InsertColumn(i),
        }
    }

    pub fn apply(self, marks: &mut MarkedCells) {
        use std::cmp::Ordering;
        match self {
            MarkShift::InsertRow(index) => marks.remap(|id| {
                Some(if id.y >= index { CellId::new(id.x, id.y + 1) } else { id })
            }),
            MarkShift::DeleteRow(index) => marks.remap(|id| match id.y.cmp(&index) {
                Ordering::Less => Some(id),
                Ordering::Equal => None,
                Ordering::Greater => Some(CellId::new(id.x, id.y - 1)),
            }),
            MarkShift::InsertColumn(index) => marks.remap(|id| {
                Some(if id.x >= index { CellId::new(id.x + 1, id.y) } else { id })
            }),
            MarkShift::DeleteColumn(index) => marks.remap(|id| match id.x.cmp(&index) {
                Ordering::Less => Some(id),
                Ordering::Equal => None,
                Ordering::Greater => Some(CellId::new(id.x - 1, id.y)),
            }),
        }
    }
}

// ============================================================================
// SYMMETRY
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SymmetryAxis {
    /// Left↔Right mirror (vertical line through the grid center).
    #[default]
    X,
    /// Top↔Bottom mirror (horizontal line through the grid center).
    Y,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Symmetry {
    pub enabled: bool,
    pub axis: SymmetryAxis,
}

impl Symmetry {
    pub fn on(axis: SymmetryAxis) -> Self {
        Self { enabled: true, axis }
    }

    /// The mirror of `cell`, or `None` when symmetry is off or the cell sits
    /// on the axis (mirror equals the cell itself).
    pub fn mirror_of(self, cell: CellId, width: u32, height: u32) -> Option<CellId> {
        if !self.enabled {
            return None;
        }
        let mirror = match self.axis {
            SymmetryAxis::X => CellId::new(width.saturating_sub(1).saturating_sub(cell.x), cell.y),
            SymmetryAxis::Y => CellId::new(cell.x, height.saturating_sub(1).saturating_sub(cell.y)),
        };
        (mirror != cell).then_some(mirror)
    }
}

// ============================================================================
// GRID STATE: the document's cells plus marks, with structural operations
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Per-color bead counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorStats {
    /// Sorted by palette ID (natural order); colors without an ID first.
    pub entries: Vec<(BeadColor, usize)>,
    pub total: usize,
}

/// Cells and marks of one project.  None of these operations record history;
/// [`crate::project::Project`] wraps them with undo snapshots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridState {
    pub grid: Grid,
    pub marks: MarkedCells,
    /// Bumped on every mutation so hosts can tell when to redraw.
    pub dirty_generation: u64,
}

impl GridState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            grid: Grid::new(width, height),
            marks: MarkedCells::default(),
            dirty_generation: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
    }

    pub fn set_color(&mut self, x: u32, y: u32, color: Option<BeadColor>) -> bool {
        let changed = self.grid.set_color(x, y, color);
        if changed {
            self.mark_dirty();
        }
        changed
    }

    /// Apply a batch; out-of-bounds edits are skipped.  Returns how many
    /// edits landed.
    pub fn apply_edits(&mut self, edits: &[CellEdit]) -> usize {
        let applied = edits
            .iter()
            .filter(|e| self.grid.set_color(e.x, e.y, e.color.clone()))
            .count();
        if applied > 0 {
            self.mark_dirty();
        }
        applied
    }

    /// Insert an empty row before `index` (`index == height` appends).
    pub fn insert_row(&mut self, index: u32) -> bool {
        let height = self.height();
        if index > height || height >= MAX_GRID_DIM {
            return false;
        }
        let width = self.width();
        let row = (0..width).map(|x| Cell::empty(x, index)).collect();
        self.grid.rows.insert(index as usize, row);
        self.grid.reindex();
        MarkShift::InsertRow(index).apply(&mut self.marks);
        self.mark_dirty();
        true
    }

    pub fn delete_row(&mut self, index: u32) -> bool {
        let height = self.height();
        if height <= 1 || index >= height {
            return false;
        }
        self.grid.rows.remove(index as usize);
        self.grid.reindex();
        MarkShift::DeleteRow(index).apply(&mut self.marks);
        self.mark_dirty();
        true
    }

    /// Insert an empty column before `index` (`index == width` appends).
    pub fn insert_column(&mut self, index: u32) -> bool {
        let width = self.width();
        if index > width || width >= MAX_GRID_DIM {
            return false;
        }
        for (y, row) in self.grid.rows.iter_mut().enumerate() {
            row.insert(index as usize, Cell::empty(index, y as u32));
        }
        self.grid.reindex();
        MarkShift::InsertColumn(index).apply(&mut self.marks);
        self.mark_dirty();
        true
    }

    pub fn delete_column(&mut self, index: u32) -> bool {
        let width = self.width();
        if width <= 1 || index >= width {
            return false;
        }
        for row in &mut self.grid.rows {
            row.remove(index as usize);
        }
        self.grid.reindex();
        MarkShift::DeleteColumn(index).apply(&mut self.marks);
        self.mark_dirty();
        true
    }

    /// Shift every color one cell towards `direction`.  Colors pushed past the
    /// edge are lost and the opposite edge becomes empty.  Cells themselves
    /// (and marks) stay where they are.
    pub fn shift(&mut self, direction: MoveDirection) {
        let rows = &mut self.grid.rows;
        match direction {
            MoveDirection::Up => {
                let colors: Vec<Vec<Option<BeadColor>>> = rows
                    .iter()
                    .skip(1)
                    .map(|row| row.iter().map(|c| c.color.clone()).collect())
                    .chain(std::iter::once(vec![None; rows[0].len()]))
                    .collect();
                write_colors(rows, colors);
            }
            MoveDirection::Down => {
                let width = rows[0].len();
                let colors: Vec<Vec<Option<BeadColor>>> = std::iter::once(vec![None; width])
                    .chain(
                        rows.iter()
                            .take(rows.len() - 1)
                            .map(|row| row.iter().map(|c| c.color.clone()).collect()),
                    )
                    .collect();
                write_colors(rows, colors);
            }
            MoveDirection::Left => {
                for row in rows.iter_mut() {
                    let last = row.len() - 1;
                    for x in 0..last {
                        row[x].color = row[x + 1].color.take();
                    }
                    row[last].color = None;
                }
            }
            MoveDirection::Right => {
                for row in rows.iter_mut() {
                    for x in (1..row.len()).rev() {
                        row[x].color = row[x - 1].color.take();
                    }
                    row[0].color = None;
                }
            }
        }
        self.mark_dirty();
    }

    /// Recolor every cell currently `old`.  Returns how many cells changed.
    pub fn replace_color(&mut self, old: &BeadColor, new: Option<&BeadColor>) -> usize {
        let mut count = 0;
        for cell in self.grid.rows.iter_mut().flatten() {
            if cell.color.as_ref() == Some(old) {
                cell.color = new.cloned();
                count += 1;
            }
        }
        if count > 0 {
            self.mark_dirty();
        }
        count
    }

    /// Mirror colors left↔right.
    pub fn flip_horizontal(&mut self) {
        for row in &mut self.grid.rows {
            let colors: Vec<Option<BeadColor>> = row.iter_mut().rev().map(|c| c.color.take()).collect();
            for (cell, color) in row.iter_mut().zip(colors) {
                cell.color = color;
            }
        }
        self.mark_dirty();
    }

    /// Mirror colors top↔bottom.
    pub fn flip_vertical(&mut self) {
        let colors: Vec<Vec<Option<BeadColor>>> = self
            .grid
            .rows
            .iter()
            .rev()
            .map(|row| row.iter().map(|c| c.color.clone()).collect())
            .collect();
        write_colors(&mut self.grid.rows, colors);
        self.mark_dirty();
    }

    pub fn clear(&mut self) {
        for cell in self.grid.rows.iter_mut().flatten() {
            cell.color = None;
        }
        self.mark_dirty();
    }

    pub fn color_stats(&self, palette: &Palette) -> ColorStats {
        let mut counts: HashMap<&BeadColor, usize> = HashMap::new();
        for color in self.grid.cells().filter_map(|c| c.color.as_ref()) {
            *counts.entry(color).or_insert(0) += 1;
        }
        let total = counts.values().sum();
        let mut entries: Vec<(BeadColor, usize)> =
            counts.into_iter().map(|(c, n)| (c.clone(), n)).collect();
        entries.sort_by(|(a, _), (b, _)| {
            let id_a = palette.color_id(a).unwrap_or("");
            let id_b = palette.color_id(b).unwrap_or("");
            natural_cmp(id_a, id_b).then_with(|| a.to_string().cmp(&b.to_string()))
        });
        ColorStats { entries, total }
    }
}

fn write_colors(rows: &mut [Vec<Cell>], colors: Vec<Vec<Option<BeadColor>>>) {
    for (row, row_colors) in rows.iter_mut().zip(colors) {
        for (cell, color) in row.iter_mut().zip(row_colors) {
            cell.color = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: BeadColor = BeadColor::rgb(255, 0, 0);
    const BLUE: BeadColor = BeadColor::rgb(0, 0, 255);

    fn assert_positions(state: &GridState) {
        for (y, row) in state.grid.rows().iter().enumerate() {
            assert_eq!(row.len() as u32, state.width());
            for (x, cell) in row.iter().enumerate() {
                assert_eq!((cell.x, cell.y), (x as u32, y as u32));
                assert_eq!(cell.id().to_string(), format!("{}-{}", x, y));
            }
        }
    }

    #[test]
    fn cell_id_parses_and_prints() {
        let id: CellId = "12-7".parse().unwrap();
        assert_eq!(id, CellId::new(12, 7));
        assert_eq!(id.to_string(), "12-7");
        assert!("12".parse::<CellId>().is_err());
        assert!("a-1".parse::<CellId>().is_err());
    }

    #[test]
    fn insert_row_shifts_cells_and_marks() {
        let mut state = GridState::new(5, 5);
        state.set_color(2, 4, Some(RED));
        state.marks.toggle(CellId::new(2, 4));
        state.marks.toggle(CellId::new(1, 1));

        assert!(state.insert_row(3));

        assert_eq!(state.height(), 6);
        assert_positions(&state);
        assert_eq!(state.grid.color_at(2, 5), Some(&RED));
        assert!(state.grid.color_at(2, 3).is_none());
        assert!(state.marks.is_marked(CellId::new(2, 5)));
        assert!(!state.marks.is_marked(CellId::new(2, 4)));
        assert!(state.marks.is_marked(CellId::new(1, 1)));
    }

    #[test]
    fn delete_column_drops_marks_on_the_removed_column() {
        let mut state = GridState::new(4, 2);
        state.set_color(3, 0, Some(BLUE));
        state.marks.toggle(CellId::new(1, 0));
        state.marks.toggle(CellId::new(3, 1));

        assert!(state.delete_column(1));

        assert_eq!(state.width(), 3);
        assert_positions(&state);
        assert_eq!(state.grid.color_at(2, 0), Some(&BLUE));
        assert_eq!(state.marks.iter().collect::<Vec<_>>(), vec![CellId::new(2, 1)]);
    }

    #[test]
    fn degenerate_structural_ops_are_no_ops() {
        let mut state = GridState::new(1, 1);
        let before = state.clone();
        assert!(!state.delete_row(0));
        assert!(!state.delete_column(0));
        assert!(!state.delete_row(5));
        assert!(!state.insert_column(3));
        assert_eq!(state, before);

        let mut full = GridState::new(MAX_GRID_DIM, 1);
        assert!(!full.insert_column(0));
    }

    #[test]
    fn shift_left_empties_the_last_column() {
        let mut state = GridState::new(3, 2);
        state.set_color(2, 0, Some(RED));
        state.set_color(2, 1, Some(BLUE));

        state.shift(MoveDirection::Left);
        assert_eq!(state.grid.color_at(1, 0), Some(&RED));
        assert_eq!(state.grid.color_at(1, 1), Some(&BLUE));
        assert!(state.grid.color_at(2, 0).is_none());
        assert!(state.grid.color_at(2, 1).is_none());

        state.shift(MoveDirection::Left);
        state.shift(MoveDirection::Left);
        assert_eq!(state.grid.colored_count(), 0);
        assert_positions(&state);
    }

    #[test]
    fn shift_down_and_up_move_rows() {
        let mut state = GridState::new(2, 3);
        state.set_color(1, 0, Some(RED));
        state.shift(MoveDirection::Down);
        assert_eq!(state.grid.color_at(1, 1), Some(&RED));
        assert!(state.grid.color_at(1, 0).is_none());
        state.shift(MoveDirection::Up);
        state.shift(MoveDirection::Up);
        assert_eq!(state.grid.colored_count(), 0);
    }

    #[test]
    fn replace_and_flip() {
        let mut state = GridState::new(3, 1);
        state.set_color(0, 0, Some(RED));
        state.set_color(1, 0, Some(RED));
        state.set_color(2, 0, Some(BLUE));

        assert_eq!(state.replace_color(&RED, None), 2);
        assert_eq!(state.grid.colored_count(), 1);

        state.flip_horizontal();
        assert_eq!(state.grid.color_at(0, 0), Some(&BLUE));
        assert_positions(&state);
    }

    #[test]
    fn mirror_skips_the_axis_cell() {
        let sym = Symmetry::on(SymmetryAxis::X);
        assert_eq!(sym.mirror_of(CellId::new(2, 5), 10, 10), Some(CellId::new(7, 5)));
        assert_eq!(sym.mirror_of(CellId::new(4, 0), 9, 3), None);
        let sym = Symmetry::on(SymmetryAxis::Y);
        assert_eq!(sym.mirror_of(CellId::new(3, 0), 4, 4), Some(CellId::new(3, 3)));
        assert_eq!(Symmetry::default().mirror_of(CellId::new(0, 0), 4, 4), None);
    }

    #[test]
    fn stats_sort_by_palette_id() {
        let palette = Palette::from_groups(vec![(
            "A".to_string(),
            vec![
                ("A10".to_string(), "#FF0000".to_string()),
                ("A2".to_string(), "#0000FF".to_string()),
            ],
        )]);
        let mut state = GridState::new(3, 1);
        state.set_color(0, 0, Some(RED));
        state.set_color(1, 0, Some(BLUE));
        state.set_color(2, 0, Some(BLUE));

        let stats = state.color_stats(&palette);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.entries, vec![(BLUE, 2), (RED, 1)]);
    }

    #[test]
    fn mark_shift_inverse_moves_marks_back() {
        let mut marks: MarkedCells = [CellId::new(0, 0), CellId::new(2, 3)].into_iter().collect();
        let original = marks.clone();

        MarkShift::InsertColumn(1).apply(&mut marks);
        assert!(marks.is_marked(CellId::new(3, 3)));
        MarkShift::InsertColumn(1).inverse().apply(&mut marks);
        assert_eq!(marks, original);

        MarkShift::DeleteRow(3).apply(&mut marks);
        MarkShift::DeleteRow(3).inverse().apply(&mut marks);
        assert_eq!(marks.iter().collect::<Vec<_>>(), vec![CellId::new(0, 0)]);
    }

    #[test]
    fn repainting_a_cell_with_its_own_color_is_not_a_change() {
        let mut state = GridState::new(2, 2);
        assert!(state.set_color(0, 0, Some(RED)));
        let generation = state.dirty_generation;
        assert!(!state.set_color(0, 0, Some(RED)));
        assert!(!state.set_color(1, 1, None));
        assert_eq!(state.dirty_generation, generation);
        let edits = [
            CellEdit { x: 0, y: 0, color: Some(RED) },
            CellEdit { x: 1, y: 0, color: Some(BLUE) },
        ];
        assert_eq!(state.apply_edits(&edits), 1);
    }

    #[test]
    fn marks_round_trip_through_the_persisted_map() {
        let mut map = BTreeMap::new();
        map.insert("1-2".to_string(), true);
        map.insert("3-4".to_string(), false);
        map.insert("junk".to_string(), true);
        let marks = MarkedCells::from_map(&map);
        assert_eq!(marks.len(), 1);
        assert_eq!(marks.to_map().keys().collect::<Vec<_>>(), vec!["1-2"]);
    }
}
