// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
    increment_counter, Unit,
};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

// Macros for metrics when observability is disabled
#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {
        let _ = (&$name, &$value $(, &$label, &$label_value)*);
    };
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {
        let _ = (&$name $(, &$label, &$label_value)*);
    };
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {
        let _ = (&$name, &$value $(, &$label, &$label_value)*);
    };
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {
        let _ = (&$name, &$value $(, &$label, &$label_value)*);
    };
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! increment_counter {
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {
        let _ = (&$name $(, &$label, &$label_value)*);
    };
}

// Macros for describe_* functions when observability is disabled
#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

// Re-export macros for use in this module when observability is disabled
#[cfg(not(feature = "observability"))]
use crate::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
    increment_counter,
};

use std::time::Duration;

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    // Upstream
    describe_counter!(
        "ais_upstream_messages_total",
        Unit::Count,
        "Total raw messages received from the upstream AIS stream."
    );
    describe_counter!(
        "ais_upstream_parse_failures_total",
        Unit::Count,
        "Upstream messages that could not be decoded into a position report."
    );
    describe_counter!(
        "ais_upstream_reconnects_total",
        Unit::Count,
        "Reconnect attempts scheduled after the upstream connection closed."
    );
    describe_gauge!("ais_upstream_connected", "Upstream connection state (1=open).");

    // Engine state
    describe_gauge!("ais_tracked_vessels", "Vessels with a record inside the density window.");
    describe_gauge!("ais_density_cells", "Density grid cells currently retained.");
    describe_gauge!("ais_candidates", "Entries in the candidate registry (uncapped).");

    // Fanout
    describe_gauge!("ais_fanout_clients", "Downstream subscribers currently attached.");
    describe_counter!(
        "ais_fanout_lagged_frames_total",
        Unit::Count,
        "Frames skipped by downstream subscribers that fell behind the broadcast buffer."
    );

    // Snapshot
    describe_counter!(
        "ais_snapshot_rebuilds_total",
        Unit::Count,
        "Genuine snapshot rebuilds (debounced requests excluded)."
    );
    describe_histogram!(
        "ais_snapshot_build_ms",
        Unit::Milliseconds,
        "Sweep + detection + scoring latency per snapshot rebuild."
    );

    // Proxies
    describe_counter!(
        "ais_proxy_requests_total",
        Unit::Count,
        "Proxy requests by route and outcome."
    );
}

pub fn increment_upstream_messages() {
    increment_counter!("ais_upstream_messages_total");
}

pub fn increment_parse_failures() {
    increment_counter!("ais_upstream_parse_failures_total");
}

pub fn increment_upstream_reconnects() {
    increment_counter!("ais_upstream_reconnects_total");
}

pub fn set_upstream_connected(connected: bool) {
    gauge!("ais_upstream_connected", if connected { 1.0 } else { 0.0 });
}

pub fn set_tracked_vessels(count: usize) {
    gauge!("ais_tracked_vessels", count as f64);
}

pub fn set_density_cells(count: usize) {
    gauge!("ais_density_cells", count as f64);
}

pub fn set_candidates(count: usize) {
    gauge!("ais_candidates", count as f64);
}

pub fn set_fanout_clients(count: usize) {
    gauge!("ais_fanout_clients", count as f64);
}

pub fn record_fanout_lagged(frames: u64) {
    counter!("ais_fanout_lagged_frames_total", frames);
}

pub fn record_snapshot_rebuild(duration: Duration) {
    increment_counter!("ais_snapshot_rebuilds_total");
    histogram!("ais_snapshot_build_ms", duration.as_secs_f64() * 1000.0);
}

pub fn increment_proxy_request(route: &'static str, outcome: &'static str) {
    increment_counter!("ais_proxy_requests_total", "route" => route, "outcome" => outcome);
}
