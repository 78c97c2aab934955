//! # AIS Relay
//!
//! A real-time vessel-tracking relay with in-memory geospatial aggregation. The relay
//! keeps one connection to a global AIS position-report stream, rebroadcasts every raw
//! frame to downstream WebSocket subscribers, and maintains bounded, time-windowed
//! state from which it derives higher-level maritime intelligence.
//!
//! ## Overview
//!
//! - **Ingestion**: last-write-wins vessel records and a short report history per vessel
//! - **Density**: 2°×2° occupancy grid with trend between sweeps
//! - **Anomalies**: chokepoint congestion and dark-ship (AIS gap) returns
//! - **Candidates**: heuristic registry of probable military contacts
//!
//! ## Architecture
//!
//! ### Stream Layer
//! [`upstream_connector`] owns the single upstream socket (idempotent connect, subscription
//! handshake, fixed-delay reconnect). [`client_fanout`] rebroadcasts each frame to every
//! attached subscriber.
//!
//! ### Aggregation Layer
//! [`aggregation_engine`] owns the vessel store, density grid and candidate registry.
//! [`snapshot_builder`] runs the retention sweep and the detectors, and caches the result
//! behind a debounce window.
//!
//! ### Gateway Layer
//! [`http`] serves the WebSocket fanout, `/health`, `/ais/snapshot`, and the `/rss` and
//! `/opensky` pass-through proxies.

// Core Types
/// Upstream message envelope, position updates and snapshot records
pub mod types;

// Aggregation Layer
/// Latest record and report history per vessel
pub mod vessel_store;
/// Coarse geospatial occupancy bins
pub mod density_grid;
/// Time-boxed registry of probable military vessels
pub mod candidate_registry;
/// Static chokepoint reference data
pub mod chokepoints;
/// Chokepoint congestion and dark-ship gap detection
pub mod disruption_detector;
/// Single owner of all in-memory aggregation state
pub mod aggregation_engine;
/// Debounced, versioned snapshot cache
pub mod snapshot_builder;

// Stream Layer
/// Broadcast of raw upstream frames to downstream subscribers
pub mod client_fanout;
/// Upstream AIS stream connection lifecycle
pub mod upstream_connector;
/// Process-wide wiring of engine, connector, fanout and snapshots
pub mod relay;

// Gateway Layer
/// Shared proxy error and response types
pub mod proxy;
/// Allowlisted RSS/Atom feed proxy
pub mod feed_proxy;
/// OAuth2-backed OpenSky flight-state proxy
pub mod opensky_proxy;
/// axum router, handlers and error rendering
pub mod http;

// Infrastructure
/// Metrics and observability
pub mod metrics;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use aggregation_engine::AggregationEngine;
pub use client_fanout::ClientFanout;
pub use relay::Relay;
pub use settings::Settings;
pub use snapshot_builder::SnapshotBuilder;
pub use upstream_connector::UpstreamConnector;
