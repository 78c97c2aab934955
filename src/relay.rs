//! # Relay
//!
//! Wires the aggregation engine, the upstream connector, the client fanout and
//! the snapshot builder into one process-wide value shared by the HTTP layer.

use crate::aggregation_engine::{now_ms, AggregationEngine};
use crate::candidate_registry::{CandidateReport, MAX_CANDIDATE_REPORTS};
use crate::client_fanout::ClientFanout;
use crate::settings::Settings;
use crate::snapshot_builder::SnapshotBuilder;
use crate::types::{HealthReport, RelayStatus, Snapshot};
use crate::upstream_connector::UpstreamConnector;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

pub struct Relay {
    engine: Arc<Mutex<AggregationEngine>>,
    fanout: Arc<ClientFanout>,
    upstream: Arc<UpstreamConnector>,
    snapshots: SnapshotBuilder,
}

impl Relay {
    pub fn new(settings: &Settings) -> Self {
        let engine = Arc::new(Mutex::new(AggregationEngine::new()));
        let fanout = Arc::new(ClientFanout::new(settings.fanout.channel_capacity));
        let upstream = Arc::new(UpstreamConnector::new(
            &settings.upstream,
            Arc::clone(&engine),
            Arc::clone(&fanout),
        ));
        Self {
            engine,
            fanout,
            upstream,
            snapshots: SnapshotBuilder::new(settings.snapshot.interval_ms),
        }
    }

    pub fn fanout(&self) -> &Arc<ClientFanout> {
        &self.fanout
    }

    pub fn upstream(&self) -> &Arc<UpstreamConnector> {
        &self.upstream
    }

    pub fn engine(&self) -> &Arc<Mutex<AggregationEngine>> {
        &self.engine
    }

    /// Idempotent; a no-op while the upstream connection is open or opening.
    pub fn ensure_upstream(&self) -> bool {
        self.upstream.connect()
    }

    pub async fn status(&self) -> RelayStatus {
        let vessel_count = self.engine.lock().await.vessel_count();
        RelayStatus {
            connected: self.upstream.is_connected(),
            vessel_count,
            message_count: self.upstream.message_count(),
            client_count: self.fanout.client_count(),
        }
    }

    pub async fn health(&self) -> HealthReport {
        let (vessels, density_zones) = {
            let engine = self.engine.lock().await;
            (engine.vessel_count(), engine.density_zone_count())
        };
        HealthReport {
            status: "ok",
            clients: self.fanout.client_count(),
            messages: self.upstream.message_count(),
            connected: self.upstream.is_connected(),
            vessels,
            density_zones,
        }
    }

    /// Current snapshot, rebuilt unless the cached one is still within the debounce window.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot_at(now_ms()).await
    }

    pub async fn snapshot_at(&self, now_ms: i64) -> Arc<Snapshot> {
        let status = self.status_without_engine();
        let mut engine = self.engine.lock().await;
        self.snapshots.snapshot(&mut engine, status, now_ms)
    }

    /// Newest-first, capped at 1500.
    pub async fn candidate_reports(&self) -> Vec<CandidateReport> {
        self.engine
            .lock()
            .await
            .candidate_reports(MAX_CANDIDATE_REPORTS)
    }

    /// Rebuilds the snapshot every interval while the upstream is open or any
    /// vessel is tracked.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let relay = Arc::clone(self);
        let period = Duration::from_millis(self.snapshots.interval_ms().max(1));
        tokio::spawn(async move {
            info!("[Snapshot] Refresh loop every {:?}", period);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let active = relay.upstream.is_connected()
                    || relay.engine.lock().await.vessel_count() > 0;
                if active {
                    relay.snapshot().await;
                }
            }
        })
    }

    // vessel_count is filled in by the builder after its sweep
    fn status_without_engine(&self) -> RelayStatus {
        RelayStatus {
            connected: self.upstream.is_connected(),
            vessel_count: 0,
            message_count: self.upstream.message_count(),
            client_count: self.fanout.client_count(),
        }
    }
}
