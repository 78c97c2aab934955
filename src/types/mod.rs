/// Upstream AIS envelope and the normalized position update
pub mod ais_message;
/// Raw value normalization helpers
pub mod conversions;
/// Snapshot, status and anomaly records served to consumers
pub mod snapshot;

pub use ais_message::{AisStreamMessage, PositionUpdate, ReportError, SubscriptionRequest};
pub use snapshot::{
    DensityZone, Disruption, DisruptionKind, HealthReport, RelayStatus, Severity, Snapshot,
};
