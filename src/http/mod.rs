//! HTTP gateway for the relay.
//!
//! One axum listener serves the downstream WebSocket fanout on `/`, the
//! health and snapshot endpoints, and the two pass-through proxies.
//!
//! ```text
//! GET /               WebSocket upgrade, raw upstream frames
//! GET /health         connection and state counters
//! GET /ais/snapshot   debounced aggregate view (?candidates=true)
//! GET /rss?url=       allowlisted feed fetch
//! GET /opensky        OAuth2-backed flight states
//! OPTIONS *           204 preflight
//! ```

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;

use crate::settings::Server;
use tokio::net::TcpListener;

/// Binds the gateway listener. `host` may be a name (`localhost`) or an address.
pub async fn bind(server: &Server) -> std::io::Result<TcpListener> {
    TcpListener::bind((server.host.as_str(), server.port)).await
}
