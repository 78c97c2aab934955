//! # Vessel State Store
//!
//! Latest position/kinematics per vessel (last-write-wins) plus a short rolling
//! history of report timestamps used by the dark-ship detector.
//!
//! Records older than the density window are removed during the sweep that
//! precedes every aggregation.

use crate::types::PositionUpdate;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Retention window for vessel records and density occupancy (30 minutes).
pub const DENSITY_WINDOW_MS: i64 = 30 * 60 * 1000;
/// Maximum report timestamps kept per vessel.
pub const MAX_HISTORY: usize = 10;

/// Latest known state of one vessel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselRecord {
    pub mmsi: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub timestamp: i64,
    pub ship_type: Option<u32>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub course: Option<f64>,
}

impl VesselRecord {
    pub fn from_update(update: &PositionUpdate, now_ms: i64) -> Self {
        Self {
            mmsi: update.mmsi.clone(),
            name: update.name.clone(),
            lat: update.lat,
            lon: update.lon,
            timestamp: now_ms,
            ship_type: update.ship_type,
            heading: update.heading,
            speed: update.speed,
            course: update.course,
        }
    }

    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms - self.timestamp <= DENSITY_WINDOW_MS
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VesselSweepStats {
    pub removed_vessels: usize,
    pub removed_histories: usize,
}

#[derive(Debug, Default)]
pub struct VesselStateStore {
    vessels: HashMap<String, VesselRecord>,
    history: HashMap<String, VecDeque<i64>>,
}

impl VesselStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the vessel record and appends `now_ms` to its history.
    /// Returns the record that was replaced, if any.
    pub fn upsert(&mut self, update: &PositionUpdate, now_ms: i64) -> Option<VesselRecord> {
        let previous = self
            .vessels
            .insert(update.mmsi.clone(), VesselRecord::from_update(update, now_ms));

        let history = self.history.entry(update.mmsi.clone()).or_default();
        history.push_back(now_ms);
        while history.len() > MAX_HISTORY {
            history.pop_front();
        }

        previous
    }

    pub fn get(&self, mmsi: &str) -> Option<&VesselRecord> {
        self.vessels.get(mmsi)
    }

    /// Record exists and is within the density window.
    pub fn fresh(&self, mmsi: &str, now_ms: i64) -> Option<&VesselRecord> {
        self.vessels.get(mmsi).filter(|v| v.is_fresh(now_ms))
    }

    pub fn vessels(&self) -> impl Iterator<Item = &VesselRecord> {
        self.vessels.values()
    }

    pub fn history(&self, mmsi: &str) -> Option<&VecDeque<i64>> {
        self.history.get(mmsi)
    }

    pub fn histories(&self) -> impl Iterator<Item = (&String, &VecDeque<i64>)> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    /// Drops stale records. A stale vessel's history is filtered to the window
    /// and removed entirely once empty.
    pub fn sweep(&mut self, now_ms: i64) -> VesselSweepStats {
        let mut stats = VesselSweepStats::default();

        let stale: Vec<String> = self
            .vessels
            .iter()
            .filter(|(_, v)| !v.is_fresh(now_ms))
            .map(|(mmsi, _)| mmsi.clone())
            .collect();

        for mmsi in stale {
            self.vessels.remove(&mmsi);
            stats.removed_vessels += 1;

            if let Some(history) = self.history.get_mut(&mmsi) {
                history.retain(|ts| now_ms - *ts <= DENSITY_WINDOW_MS);
                if history.is_empty() {
                    self.history.remove(&mmsi);
                    stats.removed_histories += 1;
                }
            }
        }

        stats
    }
}
