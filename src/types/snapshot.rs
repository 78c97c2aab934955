use serde::Serialize;

/// Connection and traffic counters embedded in every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub connected: bool,
    pub vessel_count: usize,
    pub message_count: u64,
    pub client_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Elevated,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionKind {
    ChokepointCongestion,
    GapSpike,
}

/// Anomaly record emitted by the disruption detector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Disruption {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DisruptionKind,
    pub lat: f64,
    pub lon: f64,
    pub severity: Severity,
    pub change_pct: f64,
    pub window_hours: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vessel_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dark_ships: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub description: String,
}

/// One scored density cell as exposed in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityZone {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub intensity: f64,
    pub delta_pct: f64,
    pub ships_per_day: usize,
    pub vessel_count: usize,
    pub note: String,
}

/// Immutable aggregate view. `sequence` only advances on a genuine rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sequence: u64,
    pub timestamp: String,
    pub status: RelayStatus,
    pub disruptions: Vec<Disruption>,
    pub density: Vec<DensityZone>,
}

/// `/health` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub clients: usize,
    pub messages: u64,
    pub connected: bool,
    pub vessels: usize,
    pub density_zones: usize,
}
