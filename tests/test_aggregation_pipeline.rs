//! Integration tests for the aggregation pipeline
//!
//! Tests cover:
//! - Raw upstream JSON through ingestion, sweep and detection
//! - Snapshot wire format (camelCase, disruption and density records)
//! - Candidate registry exposure and retention

use ais_relay::aggregation_engine::AggregationEngine;
use ais_relay::candidate_registry::{CANDIDATE_RETENTION_MS, MAX_CANDIDATE_REPORTS};
use ais_relay::snapshot_builder::SnapshotBuilder;
use ais_relay::types::{AisStreamMessage, DisruptionKind, RelayStatus, Severity};
use serde_json::{json, Value};

const MIN: i64 = 60 * 1000;

fn position_report(mmsi: u64, lat: f64, lon: f64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "MessageType": "PositionReport",
        "MetaData": {
            "MMSI": mmsi,
            "ShipName": "TANKER ",
            "ShipType": 80,
            "latitude": lat,
            "longitude": lon
        },
        "Message": {
            "PositionReport": {
                "Latitude": lat,
                "Longitude": lon,
                "TrueHeading": 120,
                "Sog": 11.2,
                "Cog": 118.5
            }
        }
    }))
    .unwrap()
}

fn ingest_raw(engine: &mut AggregationEngine, raw: &[u8], now_ms: i64) {
    let message = AisStreamMessage::parse(raw).expect("valid envelope");
    assert!(message.is_position_report());
    engine.ingest_message(&message, now_ms).expect("valid report");
}

/// Six distinct vessels inside Hormuz yield exactly one low-severity congestion record
#[test]
fn test_hormuz_congestion_end_to_end() {
    let mut engine = AggregationEngine::new();
    let builder = SnapshotBuilder::new(5000);
    let now = 1_700_000_000_000;

    for i in 0..6 {
        ingest_raw(&mut engine, &position_report(422_000_100 + i, 26.5, 56.5), now);
    }

    let snapshot = builder.snapshot(&mut engine, RelayStatus::default(), now);
    let congestion: Vec<_> = snapshot
        .disruptions
        .iter()
        .filter(|d| d.kind == DisruptionKind::ChokepointCongestion)
        .collect();
    assert_eq!(congestion.len(), 1);
    assert_eq!(congestion[0].id, "chokepoint-hormuz");
    assert_eq!(congestion[0].vessel_count, Some(6));
    assert_eq!(congestion[0].severity, Severity::Low);
    assert!((congestion[0].change_pct + 70.0).abs() < 1e-9);

    // all six share one 2° cell
    assert_eq!(snapshot.density.len(), 1);
    assert_eq!(snapshot.density[0].id, "26_56");
    assert_eq!(snapshot.density[0].vessel_count, 6);
    assert_eq!(snapshot.density[0].ships_per_day, 288);
    assert_eq!(snapshot.density[0].intensity, 0.5);
}

/// Snapshot JSON uses the camelCase wire names
#[test]
fn test_snapshot_wire_format() {
    let mut engine = AggregationEngine::new();
    let builder = SnapshotBuilder::new(5000);
    let now = 1_700_000_000_000;
    for i in 0..5 {
        ingest_raw(&mut engine, &position_report(538_000_000 + i, 30.5, 32.3), now);
    }

    let status = RelayStatus {
        connected: true,
        vessel_count: 0,
        message_count: 5,
        client_count: 2,
    };
    let snapshot = builder.snapshot(&mut engine, status, now);
    let value: Value = serde_json::to_value(&*snapshot).unwrap();

    assert_eq!(value["sequence"], 1);
    assert!(value["timestamp"].as_str().unwrap().starts_with("2023-11-14T"));
    assert_eq!(value["status"]["vesselCount"], 5);
    assert_eq!(value["status"]["messageCount"], 5);
    assert_eq!(value["status"]["clientCount"], 2);

    let suez = &value["disruptions"][0];
    assert_eq!(suez["type"], "chokepoint_congestion");
    assert_eq!(suez["severity"], "low");
    assert_eq!(suez["windowHours"], 1);
    assert_eq!(suez["vesselCount"], 5);
    assert_eq!(suez["region"], "Egypt");
    assert!(suez.get("darkShips").is_none());

    let zone = &value["density"][0];
    assert_eq!(zone["id"], "30_32");
    assert!(zone.get("shipsPerDay").is_some());
    assert!(zone.get("deltaPct").is_some());
}

/// A vessel returning after 90 minutes of silence is reported as a gap spike
#[test]
fn test_dark_ship_return_without_intermediate_sweep() {
    let mut engine = AggregationEngine::new();
    let builder = SnapshotBuilder::new(5000);

    ingest_raw(&mut engine, &position_report(244_000_001, -10.0, -30.0), 0);
    ingest_raw(&mut engine, &position_report(244_000_001, -10.1, -30.1), 90 * MIN);

    let snapshot = builder.snapshot(&mut engine, RelayStatus::default(), 95 * MIN);
    let spike = snapshot
        .disruptions
        .iter()
        .find(|d| d.kind == DisruptionKind::GapSpike)
        .expect("gap spike");
    assert_eq!(spike.dark_ships, Some(1));
    assert_eq!(spike.severity, Severity::Low);
    assert_eq!(spike.change_pct, 10.0);
}

/// Repeated reports from one vessel never double-count in density
#[test]
fn test_repeated_reports_do_not_double_count() {
    let mut engine = AggregationEngine::new();
    let builder = SnapshotBuilder::new(1000);
    for t in 0..10 {
        ingest_raw(&mut engine, &position_report(636_000_001, 1.0, 1.0), t * MIN);
        ingest_raw(&mut engine, &position_report(636_000_002, 1.5, 1.5), t * MIN);
    }
    let snapshot = builder.snapshot(&mut engine, RelayStatus::default(), 10 * MIN);
    assert_eq!(snapshot.density.len(), 1);
    assert_eq!(snapshot.density[0].vessel_count, 2);
    assert_eq!(engine.vessels().history("636000001").unwrap().len(), 10);
}

/// Candidates outlive the density window but not the 2-hour retention
#[test]
fn test_candidate_retention_across_sweeps() {
    let mut engine = AggregationEngine::new();
    let raw = serde_json::to_vec(&json!({
        "MessageType": "PositionReport",
        "MetaData": {"MMSI": 338000099u64, "ShipName": "USNS MERCY", "ShipType": 0,
                     "latitude": 32.7, "longitude": -117.2},
        "Message": {"PositionReport": {"Latitude": 32.7, "Longitude": -117.2}}
    }))
    .unwrap();
    ingest_raw(&mut engine, &raw, 0);

    engine.sweep(60 * MIN);
    assert_eq!(engine.vessel_count(), 0);
    let reports = engine.candidate_reports(MAX_CANDIDATE_REPORTS);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].name, "USNS MERCY");

    engine.sweep(CANDIDATE_RETENTION_MS + 1);
    assert!(engine.candidate_reports(MAX_CANDIDATE_REPORTS).is_empty());
}
