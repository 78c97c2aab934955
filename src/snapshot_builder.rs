// Snapshot Builder - Vista agregada versionada con debounce
// Sweep -> detección -> densidad, cacheado en un ArcSwap para lecturas sin bloqueo

use crate::aggregation_engine::{AggregationEngine, MAX_DENSITY_ZONES};
use crate::metrics;
use crate::types::{RelayStatus, Snapshot};
use arc_swap::ArcSwapOption;
use chrono::{SecondsFormat, TimeZone, Utc};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

struct CachedSnapshot {
    snapshot: Arc<Snapshot>,
    built_at_ms: i64,
}

pub struct SnapshotBuilder {
    interval_ms: u64,
    sequence: AtomicU64,
    cache: ArcSwapOption<CachedSnapshot>,
}

impl SnapshotBuilder {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            sequence: AtomicU64::new(0),
            cache: ArcSwapOption::empty(),
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Returns the cached snapshot if it is younger than half the interval,
    /// otherwise sweeps the engine and builds a new one.
    ///
    /// `status.vessel_count` is replaced with the post-sweep count.
    pub fn snapshot(
        &self,
        engine: &mut AggregationEngine,
        status: RelayStatus,
        now_ms: i64,
    ) -> Arc<Snapshot> {
        if let Some(cached) = self.fresh(now_ms) {
            return cached;
        }
        self.rebuild(engine, status, now_ms)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    fn fresh(&self, now_ms: i64) -> Option<Arc<Snapshot>> {
        let guard = self.cache.load();
        let cached = guard.as_ref()?;
        let debounce_ms = (self.interval_ms / 2) as i64;
        if now_ms - cached.built_at_ms < debounce_ms {
            Some(Arc::clone(&cached.snapshot))
        } else {
            None
        }
    }

    fn rebuild(
        &self,
        engine: &mut AggregationEngine,
        mut status: RelayStatus,
        now_ms: i64,
    ) -> Arc<Snapshot> {
        let started = Instant::now();

        engine.sweep(now_ms);
        let disruptions = engine.detect_disruptions(now_ms);
        let density = engine.density_zones(MAX_DENSITY_ZONES);
        status.vessel_count = engine.vessel_count();

        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(Snapshot {
            sequence,
            timestamp: rfc3339(now_ms),
            status,
            disruptions,
            density,
        });

        self.cache.store(Some(Arc::new(CachedSnapshot {
            snapshot: Arc::clone(&snapshot),
            built_at_ms: now_ms,
        })));

        let elapsed = started.elapsed();
        metrics::record_snapshot_rebuild(elapsed);
        debug!(
            "[Snapshot] #{} built in {:?}: {} vessels, {} disruptions, {} zones",
            sequence,
            elapsed,
            snapshot.status.vessel_count,
            snapshot.disruptions.len(),
            snapshot.density.len()
        );

        snapshot
    }
}

fn rfc3339(now_ms: i64) -> String {
    Utc.timestamp_millis_opt(now_ms)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
