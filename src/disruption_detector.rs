//! # Disruption Detector
//!
//! Rule-based anomaly detection over the current vessel state:
//!
//! - **Chokepoint congestion**: vessel count inside each chokepoint radius
//!   compared against a radius-derived baseline.
//! - **Dark-ship gap spike**: vessels reappearing after more than an hour of
//!   silence within the last ten minutes.
//!
//! Thresholds are fixed constants; both detectors are re-run on every aggregation.

use crate::chokepoints::{Chokepoint, CHOKEPOINTS};
use crate::types::{Disruption, DisruptionKind, Severity};
use crate::vessel_store::VesselStateStore;
use std::collections::VecDeque;

/// Chokepoint records are only emitted from this many vessels upwards.
pub const CONGESTION_MIN_VESSELS: usize = 5;
/// Silence longer than this between the two latest reports counts as a gap (60 minutes).
pub const DARK_GAP_MS: i64 = 60 * 60 * 1000;
/// The latest report must be at most this old for a gap to count as a return (10 minutes).
pub const DARK_RECENT_MS: i64 = 10 * 60 * 1000;

const WINDOW_HOURS: u32 = 1;

/// Severity as a pure function of vessel count and chokepoint radius.
pub fn chokepoint_severity(count: usize, radius: f64) -> Severity {
    let baseline = radius * 10.0;
    let count = count as f64;
    if count > baseline * 1.5 {
        Severity::High
    } else if count > baseline {
        Severity::Elevated
    } else {
        Severity::Low
    }
}

pub fn chokepoint_change_pct(count: usize, radius: f64) -> f64 {
    let baseline = radius * 10.0;
    if baseline == 0.0 {
        0.0
    } else {
        (count as f64 / baseline - 1.0) * 100.0
    }
}

pub fn gap_spike_severity(dark_returns: usize) -> Severity {
    if dark_returns > 20 {
        Severity::High
    } else if dark_returns > 10 {
        Severity::Elevated
    } else {
        Severity::Low
    }
}

/// True when the two most recent timestamps are more than an hour apart and
/// the latest is within ten minutes of `now_ms`.
pub fn is_dark_return(history: &VecDeque<i64>, now_ms: i64) -> bool {
    let len = history.len();
    if len < 2 {
        return false;
    }
    let latest = history[len - 1];
    let previous = history[len - 2];
    latest - previous > DARK_GAP_MS && now_ms - latest <= DARK_RECENT_MS
}

pub struct DisruptionDetector {
    chokepoints: Vec<Chokepoint>,
}

impl DisruptionDetector {
    pub fn new(chokepoints: Vec<Chokepoint>) -> Self {
        Self { chokepoints }
    }

    /// Runs both detectors. Chokepoint records come first, in table order.
    pub fn detect(&self, store: &VesselStateStore, now_ms: i64) -> Vec<Disruption> {
        let mut disruptions = self.detect_congestion(store);
        if let Some(spike) = self.detect_gap_spike(store, now_ms) {
            disruptions.push(spike);
        }
        disruptions
    }

    pub fn detect_congestion(&self, store: &VesselStateStore) -> Vec<Disruption> {
        self.chokepoints
            .iter()
            .filter_map(|cp| {
                let count = store.vessels().filter(|v| cp.contains(v.lat, v.lon)).count();
                if count < CONGESTION_MIN_VESSELS {
                    return None;
                }
                let change_pct = chokepoint_change_pct(count, cp.radius);
                Some(Disruption {
                    id: format!("chokepoint-{}", cp.id),
                    name: cp.name.to_string(),
                    kind: DisruptionKind::ChokepointCongestion,
                    lat: cp.lat,
                    lon: cp.lon,
                    severity: chokepoint_severity(count, cp.radius),
                    change_pct,
                    window_hours: WINDOW_HOURS,
                    vessel_count: Some(count),
                    dark_ships: None,
                    region: Some(cp.region.to_string()),
                    description: format!(
                        "{} vessels tracked in {} ({:+.0}% vs baseline of {:.0})",
                        count,
                        cp.name,
                        change_pct,
                        cp.baseline()
                    ),
                })
            })
            .collect()
    }

    pub fn detect_gap_spike(&self, store: &VesselStateStore, now_ms: i64) -> Option<Disruption> {
        let dark_returns = store
            .histories()
            .filter(|(_, history)| is_dark_return(history, now_ms))
            .count();
        if dark_returns == 0 {
            return None;
        }

        Some(Disruption {
            id: "global-gap-spike".to_string(),
            name: "AIS Gap Spike".to_string(),
            kind: DisruptionKind::GapSpike,
            lat: 0.0,
            lon: 0.0,
            severity: gap_spike_severity(dark_returns),
            // linear proxy, not a literal percentage
            change_pct: dark_returns as f64 * 10.0,
            window_hours: WINDOW_HOURS,
            vessel_count: None,
            dark_ships: Some(dark_returns),
            region: Some("Global".to_string()),
            description: format!(
                "{} vessels resumed AIS transmission after more than 60 minutes of silence",
                dark_returns
            ),
        })
    }
}

impl Default for DisruptionDetector {
    fn default() -> Self {
        Self::new(CHOKEPOINTS.to_vec())
    }
}
