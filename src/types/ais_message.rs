use crate::types::conversions::{finite_or_none, value_to_identifier, value_to_ship_type, ConversionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type tag for position reports on the upstream feed.
pub const POSITION_REPORT: &str = "PositionReport";

// Mensaje crudo del stream (lo que recibes)
#[derive(Debug, Clone, Deserialize)]
pub struct AisStreamMessage {
    #[serde(rename = "MessageType", default)]
    pub message_type: Option<String>,
    #[serde(rename = "MetaData", default)]
    pub meta_data: Option<AisMetaData>,
    #[serde(rename = "Message", default)]
    pub message: Option<AisMessageBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AisMetaData {
    #[serde(rename = "MMSI", default)]
    pub mmsi: Option<Value>,
    #[serde(rename = "ShipName", default)]
    pub ship_name: Option<String>,
    #[serde(rename = "ShipType", default)]
    pub ship_type: Option<Value>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AisMessageBody {
    #[serde(rename = "PositionReport", default)]
    pub position_report: Option<RawPositionReport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPositionReport {
    #[serde(rename = "UserID", default)]
    pub user_id: Option<Value>,
    #[serde(rename = "Latitude", default)]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude", default)]
    pub longitude: Option<f64>,
    #[serde(rename = "TrueHeading", default)]
    pub true_heading: Option<f64>,
    #[serde(rename = "Sog", default)]
    pub sog: Option<f64>,
    #[serde(rename = "Cog", default)]
    pub cog: Option<f64>,
}

impl AisStreamMessage {
    /// Parses a raw upstream frame. Returns `None` for anything that is not JSON
    /// or does not match the expected envelope.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }

    pub fn is_position_report(&self) -> bool {
        self.message_type.as_deref() == Some(POSITION_REPORT)
    }
}

// Tipo homogenizado (lo que usa el engine)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub mmsi: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub ship_type: Option<u32>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub course: Option<f64>,
}

impl TryFrom<&AisStreamMessage> for PositionUpdate {
    type Error = ReportError;

    fn try_from(raw: &AisStreamMessage) -> Result<Self, Self::Error> {
        if !raw.is_position_report() {
            return Err(ReportError::NotPositionReport);
        }

        let meta = raw.meta_data.clone().unwrap_or_default();
        let report = raw
            .message
            .as_ref()
            .and_then(|m| m.position_report.clone())
            .unwrap_or_default();

        // Message-level fields win, MetaData is the fallback
        let mmsi = match report.user_id.as_ref().or(meta.mmsi.as_ref()) {
            Some(value) => value_to_identifier(value)?,
            None => String::new(),
        };
        if mmsi.is_empty() {
            return Err(ReportError::MissingIdentifier);
        }

        let lat = report.latitude.or(meta.latitude);
        let lon = report.longitude.or(meta.longitude);
        let (lat, lon) = match (finite_or_none(lat), finite_or_none(lon)) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(ReportError::InvalidCoordinates(mmsi)),
        };

        Ok(PositionUpdate {
            mmsi,
            name: meta.ship_name.map(|n| n.trim().to_string()).unwrap_or_default(),
            lat,
            lon,
            ship_type: meta.ship_type.as_ref().and_then(value_to_ship_type),
            heading: finite_or_none(report.true_heading),
            speed: finite_or_none(report.sog),
            course: finite_or_none(report.cog),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Message is not a position report")]
    NotPositionReport,
    #[error("Position report has no vessel identifier")]
    MissingIdentifier,
    #[error("Position report for {0} has non-finite coordinates")]
    InvalidCoordinates(String),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Subscription handshake sent once per upstream connection.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "APIKey")]
    pub api_key: String,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: Vec<[[f64; 2]; 2]>,
    #[serde(rename = "FilterMessageTypes")]
    pub filter_message_types: Vec<String>,
}

impl SubscriptionRequest {
    /// Whole-globe subscription restricted to position reports.
    pub fn global_position_reports(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            bounding_boxes: vec![[[-90.0, -180.0], [90.0, 180.0]]],
            filter_message_types: vec![POSITION_REPORT.to_string()],
        }
    }
}
