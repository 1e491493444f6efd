//! Grid model and the shared grid store.
//!
//! The grid is a fixed [`ROWS`] x [`COLUMNS`] matrix. Rows are independent
//! instrument lanes, columns are timeline steps read cyclically. Each cell is
//! either empty or bound to a [`SoundId`].
//!
//! [`GridStore`] wraps the grid in an `Arc<RwLock>` so editors can mutate it at
//! any time, including during playback, while the scheduler reads the latest
//! contents on every tick.

use std::sync::{Arc, RwLock};

use crate::catalog::{Catalog, SoundId};

/// Number of instrument lanes.
pub const ROWS: usize = 5;
/// Number of steps in one cycle.
pub const COLUMNS: usize = 8;

/// Fixed-size matrix of sound bindings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grid {
    cells: [[Option<SoundId>; COLUMNS]; ROWS],
}

impl Grid {
    /// A grid with every cell empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A grid with `catalog[r]` in column 0 of row `r`, for the first
    /// `min(ROWS, catalog.len())` rows. Everything else is empty.
    pub fn template(catalog: &Catalog) -> Self {
        let mut grid = Self::empty();
        for (row, descriptor) in catalog.descriptors().take(ROWS).enumerate() {
            grid.cells[row][0] = Some(descriptor.id.clone());
        }
        grid
    }

    /// Read one cell.
    ///
    /// # Panics
    ///
    /// Panics if `row >= ROWS` or `column >= COLUMNS`.
    pub fn read(&self, row: usize, column: usize) -> Option<&SoundId> {
        self.cells[row][column].as_ref()
    }

    /// Bind or clear one cell in place.
    ///
    /// # Panics
    ///
    /// Panics if `row >= ROWS` or `column >= COLUMNS`.
    pub fn set(&mut self, row: usize, column: usize, id: Option<SoundId>) {
        self.cells[row][column] = id;
    }

    /// A copy of this grid with one cell replaced.
    pub fn with_cell(&self, row: usize, column: usize, id: Option<SoundId>) -> Self {
        let mut grid = self.clone();
        grid.set(row, column, id);
        grid
    }

    /// Empty every cell.
    pub fn clear(&mut self) {
        for row in &mut self.cells {
            for cell in row {
                *cell = None;
            }
        }
    }

    /// Non-empty cells of one column as `(row, id)` pairs, top to bottom.
    pub fn column(&self, column: usize) -> impl Iterator<Item = (usize, &SoundId)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(row, cells)| cells[column].as_ref().map(|id| (row, id)))
    }

    /// Distinct ids referenced by non-empty cells, in row-major order.
    pub fn occupied_ids(&self) -> Vec<&SoundId> {
        let mut ids: Vec<&SoundId> = Vec::new();
        for id in self.cells.iter().flatten().flatten() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Number of non-empty cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }
}

/// Thread-safe handle to the grid.
///
/// Clones share the same underlying grid.
#[derive(Clone, Default)]
pub struct GridStore {
    inner: Arc<RwLock<Versioned>>,
}

#[derive(Default)]
struct Versioned {
    grid: Grid,
    version: u64,
}

impl GridStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the grid with a closure, holding the read lock for its duration.
    pub fn with_grid<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Grid) -> R,
    {
        let state = self.inner.read().expect("Grid lock poisoned");
        f(&state.grid)
    }

    /// Mutate the grid with a closure. Bumps the version.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Grid) -> R,
    {
        let mut state = self.inner.write().expect("Grid lock poisoned");
        state.version += 1;
        f(&mut state.grid)
    }

    pub fn read(&self, row: usize, column: usize) -> Option<SoundId> {
        self.with_grid(|g| g.read(row, column).cloned())
    }

    pub fn set(&self, row: usize, column: usize, id: Option<SoundId>) {
        self.update(|g| g.set(row, column, id));
    }

    /// Replace the whole grid with the catalog template.
    pub fn reset_to_template(&self, catalog: &Catalog) {
        let template = Grid::template(catalog);
        self.update(|g| *g = template);
    }

    pub fn clear_all(&self) {
        self.update(Grid::clear);
    }

    /// A clone of the current grid.
    pub fn snapshot(&self) -> Grid {
        self.with_grid(Grid::clone)
    }

    /// Number of mutations since creation.
    pub fn version(&self) -> u64 {
        self.inner.read().expect("Grid lock poisoned").version
    }
}

impl std::fmt::Debug for GridStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridStore")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SoundDescriptor;

    fn catalog(n: usize) -> Catalog {
        Catalog::new(
            (0..n)
                .map(|i| SoundDescriptor::new(format!("s{i}"), format!("Sound {i}"), "test", format!("{i}.wav")))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_grid() {
        let grid = Grid::empty();
        assert_eq!(grid.occupied_count(), 0);
        for row in 0..ROWS {
            for column in 0..COLUMNS {
                assert!(grid.read(row, column).is_none());
            }
        }
    }

    #[test]
    fn test_set_then_read() {
        let grid = Grid::empty();
        let id = SoundId::from("kick");
        for row in 0..ROWS {
            for column in 0..COLUMNS {
                let edited = grid.with_cell(row, column, Some(id.clone()));
                assert_eq!(edited.read(row, column), Some(&id));
                assert_eq!(edited.occupied_count(), 1);
                assert_eq!(grid.occupied_count(), 0);
            }
        }
    }

    #[test]
    fn test_set_leaves_other_cells_alone() {
        let base = Grid::template(&catalog(5)).with_cell(2, 5, Some("x".into()));
        let edited = base.with_cell(3, 4, Some("y".into()));
        for row in 0..ROWS {
            for column in 0..COLUMNS {
                if (row, column) != (3, 4) {
                    assert_eq!(edited.read(row, column), base.read(row, column));
                }
            }
        }
        let cleared = edited.with_cell(2, 5, None);
        assert!(cleared.read(2, 5).is_none());
    }

    #[test]
    fn test_template_shape() {
        for n in [1, 3, 5, 9] {
            let catalog = catalog(n);
            let grid = Grid::template(&catalog);
            let expected = n.min(ROWS);
            assert_eq!(grid.occupied_count(), expected);
            for row in 0..expected {
                assert_eq!(grid.read(row, 0), Some(&catalog.entries()[row].descriptor.id));
            }
            for row in 0..ROWS {
                for column in 1..COLUMNS {
                    assert!(grid.read(row, column).is_none());
                }
            }
        }
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_panics() {
        Grid::empty().read(ROWS, 0);
    }

    #[test]
    fn test_column_and_occupied_ids() {
        let mut grid = Grid::empty();
        grid.set(0, 2, Some("kick".into()));
        grid.set(4, 2, Some("hat".into()));
        grid.set(1, 6, Some("kick".into()));
        let column: Vec<_> = grid.column(2).map(|(r, id)| (r, id.as_str())).collect();
        assert_eq!(column, vec![(0, "kick"), (4, "hat")]);
        let ids: Vec<_> = grid.occupied_ids().iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["kick", "hat"]);
    }

    #[test]
    fn test_store_shares_state() {
        let store = GridStore::new();
        let other = store.clone();
        store.set(1, 1, Some("snare".into()));
        assert_eq!(other.read(1, 1), Some(SoundId::from("snare")));
        assert_eq!(other.version(), 1);

        other.reset_to_template(&catalog(2));
        assert_eq!(store.snapshot().occupied_count(), 2);
        store.clear_all();
        assert_eq!(other.snapshot().occupied_count(), 0);
        assert_eq!(store.version(), 3);
    }
}
