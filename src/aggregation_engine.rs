//! # Aggregation Engine
//!
//! Single owner of all in-memory relay state: vessel records and history, the
//! density grid and the candidate registry. Constructed once per process and
//! shared by the upstream connector, the snapshot builder and the HTTP layer.
//!
//! Every method is synchronous and runs to completion; callers hold the engine
//! lock only for the duration of one call.

use crate::candidate_registry::{CandidateRegistry, CandidateReport};
use crate::density_grid::{CellKey, DensityGrid};
use crate::disruption_detector::DisruptionDetector;
use crate::metrics;
use crate::types::{AisStreamMessage, DensityZone, Disruption, PositionUpdate, ReportError};
use crate::vessel_store::VesselStateStore;
use chrono::Utc;
use log::debug;

/// Cells need at least this many occupants to appear in the density summary.
pub const MIN_ZONE_OCCUPANTS: usize = 2;
/// Maximum density zones in a snapshot.
pub const MAX_DENSITY_ZONES: usize = 200;
/// Linear extrapolation factor from a 30-minute occupancy to ships per day.
pub const SHIPS_PER_DAY_FACTOR: usize = 48;

/// Result of ingesting one position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub cell: CellKey,
    pub candidate: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub removed_vessels: usize,
    pub removed_histories: usize,
    pub evicted_occupants: usize,
    pub removed_cells: usize,
    pub purged_candidates: usize,
}

#[derive(Default)]
pub struct AggregationEngine {
    vessels: VesselStateStore,
    density: DensityGrid,
    candidates: CandidateRegistry,
    detector: DisruptionDetector,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and ingests a decoded upstream message.
    pub fn ingest_message(
        &mut self,
        message: &AisStreamMessage,
        now_ms: i64,
    ) -> Result<IngestOutcome, ReportError> {
        let update = PositionUpdate::try_from(message)?;
        Ok(self.ingest(&update, now_ms))
    }

    /// Upserts the vessel, appends to its history, places it in the density
    /// grid and runs the candidate heuristic.
    pub fn ingest(&mut self, update: &PositionUpdate, now_ms: i64) -> IngestOutcome {
        let previous = self.vessels.upsert(update, now_ms);
        let cell = self.density.record(
            &update.mmsi,
            update.lat,
            update.lon,
            previous.map(|p| (p.lat, p.lon)),
            now_ms,
        );
        let candidate = self.candidates.observe(update, now_ms);
        IngestOutcome { cell, candidate }
    }

    /// Retention sweep across all stores. Runs before every aggregation.
    pub fn sweep(&mut self, now_ms: i64) -> SweepStats {
        let vessel_stats = self.vessels.sweep(now_ms);

        let vessels = &self.vessels;
        let grid_stats = self.density.sweep(now_ms, |mmsi, key| {
            vessels
                .fresh(mmsi, now_ms)
                .map(|v| CellKey::for_position(v.lat, v.lon) == key)
                .unwrap_or(false)
        });

        let purged_candidates = self.candidates.purge(now_ms);

        let stats = SweepStats {
            removed_vessels: vessel_stats.removed_vessels,
            removed_histories: vessel_stats.removed_histories,
            evicted_occupants: grid_stats.evicted_occupants,
            removed_cells: grid_stats.removed_cells,
            purged_candidates,
        };
        if stats != SweepStats::default() {
            debug!("[Engine] Sweep: {:?}", stats);
        }

        metrics::set_tracked_vessels(self.vessels.len());
        metrics::set_density_cells(self.density.len());
        metrics::set_candidates(self.candidates.len());

        stats
    }

    pub fn detect_disruptions(&self, now_ms: i64) -> Vec<Disruption> {
        self.detector.detect(&self.vessels, now_ms)
    }

    /// Cells with at least two occupants, log-scaled intensity, busiest first.
    pub fn density_zones(&self, limit: usize) -> Vec<DensityZone> {
        let qualifying: Vec<_> = self
            .density
            .cells()
            .filter(|c| c.count() >= MIN_ZONE_OCCUPANTS)
            .collect();
        if qualifying.is_empty() {
            return Vec::new();
        }

        let min = qualifying.iter().map(|c| c.count()).min().unwrap_or(0);
        let max = qualifying.iter().map(|c| c.count()).max().unwrap_or(0);

        let mut zones: Vec<DensityZone> = qualifying
            .into_iter()
            .map(|cell| {
                let count = cell.count();
                let delta_pct = if cell.previous_count > 0 {
                    ((count as f64 - cell.previous_count as f64) / cell.previous_count as f64
                        * 100.0)
                        .round()
                } else {
                    0.0
                };
                DensityZone {
                    id: cell.key.id(),
                    name: format!("Zone {:.0}°, {:.0}°", cell.center_lat, cell.center_lon),
                    lat: cell.center_lat,
                    lon: cell.center_lon,
                    intensity: log_intensity(count, min, max),
                    delta_pct,
                    ships_per_day: count * SHIPS_PER_DAY_FACTOR,
                    vessel_count: count,
                    note: format!("{} vessels reporting in the last 30 minutes", count),
                }
            })
            .collect();

        zones.sort_by(|a, b| {
            b.vessel_count
                .cmp(&a.vessel_count)
                .then_with(|| a.id.cmp(&b.id))
        });
        zones.truncate(limit);
        zones
    }

    pub fn candidate_reports(&self, limit: usize) -> Vec<CandidateReport> {
        self.candidates.reports(limit)
    }

    pub fn vessels(&self) -> &VesselStateStore {
        &self.vessels
    }

    pub fn density(&self) -> &DensityGrid {
        &self.density
    }

    pub fn candidates(&self) -> &CandidateRegistry {
        &self.candidates
    }

    pub fn vessel_count(&self) -> usize {
        self.vessels.len()
    }

    pub fn density_zone_count(&self) -> usize {
        self.density.len()
    }
}

/// Wall-clock milliseconds since the Unix epoch, the engine's time base.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// `0.2 + 0.8 * (ln(count+1) - ln(min+1)) / (ln(max+1) - ln(min+1))`, flat 0.5 when max == min.
pub fn log_intensity(count: usize, min: usize, max: usize) -> f64 {
    if max == min {
        return 0.5;
    }
    let ln = |v: usize| ((v + 1) as f64).ln();
    0.2 + 0.8 * (ln(count) - ln(min)) / (ln(max) - ln(min))
}
