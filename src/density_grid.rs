//! # Density Grid
//!
//! Coarse 2°×2° geospatial bins tracking which vessels currently sit in each
//! region. `previous_count` is captured at the start of every sweep so the
//! snapshot can report occupancy change between aggregation passes.

use crate::vessel_store::DENSITY_WINDOW_MS;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Bin size in degrees for both latitude and longitude.
pub const GRID_SIZE_DEG: f64 = 2.0;
/// Empty cells are kept this long before deletion (hysteresis against boundary flapping).
pub const EMPTY_CELL_RETENTION_MS: i64 = 2 * DENSITY_WINDOW_MS;

/// Bin origin (south-west corner) in whole degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub lat: i32,
    pub lon: i32,
}

impl CellKey {
    /// Floors latitude and longitude independently to the grid size.
    pub fn for_position(lat: f64, lon: f64) -> Self {
        Self {
            lat: ((lat / GRID_SIZE_DEG).floor() * GRID_SIZE_DEG) as i32,
            lon: ((lon / GRID_SIZE_DEG).floor() * GRID_SIZE_DEG) as i32,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.lat as f64 + GRID_SIZE_DEG / 2.0,
            self.lon as f64 + GRID_SIZE_DEG / 2.0,
        )
    }

    pub fn id(&self) -> String {
        format!("{}_{}", self.lat, self.lon)
    }
}

#[derive(Debug, Clone)]
pub struct DensityCell {
    pub key: CellKey,
    pub center_lat: f64,
    pub center_lon: f64,
    pub occupants: HashSet<String>,
    pub last_update: i64,
    pub previous_count: usize,
}

impl DensityCell {
    fn new(key: CellKey, now_ms: i64) -> Self {
        let (center_lat, center_lon) = key.center();
        Self {
            key,
            center_lat,
            center_lon,
            occupants: HashSet::new(),
            last_update: now_ms,
            previous_count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.occupants.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridSweepStats {
    pub evicted_occupants: usize,
    pub removed_cells: usize,
}

#[derive(Debug, Default)]
pub struct DensityGrid {
    cells: IndexMap<CellKey, DensityCell>,
}

impl DensityGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `mmsi` in the cell for (`lat`, `lon`). When the vessel was last
    /// seen in a different cell it is removed from that one first.
    pub fn record(
        &mut self,
        mmsi: &str,
        lat: f64,
        lon: f64,
        previous_position: Option<(f64, f64)>,
        now_ms: i64,
    ) -> CellKey {
        let key = CellKey::for_position(lat, lon);

        if let Some((prev_lat, prev_lon)) = previous_position {
            let prev_key = CellKey::for_position(prev_lat, prev_lon);
            if prev_key != key {
                if let Some(prev_cell) = self.cells.get_mut(&prev_key) {
                    if prev_cell.occupants.remove(mmsi) {
                        prev_cell.last_update = now_ms;
                    }
                }
            }
        }

        let cell = self
            .cells
            .entry(key)
            .or_insert_with(|| DensityCell::new(key, now_ms));
        cell.occupants.insert(mmsi.to_string());
        cell.last_update = now_ms;
        key
    }

    /// Snapshots occupancy into `previous_count`, drops occupants for which
    /// `is_resident` is false and deletes cells empty beyond the retention period.
    pub fn sweep<F>(&mut self, now_ms: i64, is_resident: F) -> GridSweepStats
    where
        F: Fn(&str, CellKey) -> bool,
    {
        let mut stats = GridSweepStats::default();

        for cell in self.cells.values_mut() {
            cell.previous_count = cell.occupants.len();
            let key = cell.key;
            cell.occupants.retain(|mmsi| is_resident(mmsi, key));
            stats.evicted_occupants += cell.previous_count - cell.occupants.len();
        }

        let before = self.cells.len();
        self.cells.retain(|_, cell| {
            !(cell.occupants.is_empty() && now_ms - cell.last_update > EMPTY_CELL_RETENTION_MS)
        });
        stats.removed_cells = before - self.cells.len();

        stats
    }

    pub fn cell(&self, key: &CellKey) -> Option<&DensityCell> {
        self.cells.get(key)
    }

    pub fn cells(&self) -> impl Iterator<Item = &DensityCell> {
        self.cells.values()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
