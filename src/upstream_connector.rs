// UpstreamConnector - Conexión única al stream AIS upstream
// connect() idempotente, handshake de suscripción, reconexión con delay fijo al cerrar
// Cada evento compara la generación de su conexión con la actual para ignorar sockets obsoletos

use crate::aggregation_engine::{now_ms, AggregationEngine};
use crate::client_fanout::{ClientFanout, RelayFrame};
use crate::metrics;
use crate::settings::Upstream;
use crate::types::{AisStreamMessage, SubscriptionRequest};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::connect_async;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("websocket error: {0}")]
    Socket(#[from] tungstenite::Error),
    #[error("failed to encode subscription: {0}")]
    Subscribe(#[from] serde_json::Error),
    #[error("connection superseded by generation {0}")]
    Superseded(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Open,
}

/// Tracks which connection attempt is current. Every attempt gets a new
/// generation; events carrying an older one are ignored.
#[derive(Debug)]
pub struct ConnectionSlot {
    generation: u64,
    phase: Phase,
}

impl ConnectionSlot {
    pub fn new() -> Self {
        Self {
            generation: 0,
            phase: Phase::Idle,
        }
    }

    /// Starts a new attempt. `None` while a connection is open or opening.
    pub fn begin(&mut self) -> Option<u64> {
        if self.phase != Phase::Idle {
            return None;
        }
        self.generation += 1;
        self.phase = Phase::Connecting;
        Some(self.generation)
    }

    pub fn mark_open(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) || self.phase != Phase::Connecting {
            return false;
        }
        self.phase = Phase::Open;
        true
    }

    /// Returns true when the closing connection was the tracked one, in which
    /// case the slot goes idle and the caller owns the reconnect.
    pub fn on_close(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) || self.phase == Phase::Idle {
            return false;
        }
        self.phase = Phase::Idle;
        true
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Default for ConnectionSlot {
    fn default() -> Self {
        Self::new()
    }
}

pub struct UpstreamConnector {
    url: String,
    api_key: String,
    reconnect_delay: Duration,
    engine: Arc<tokio::sync::Mutex<AggregationEngine>>,
    fanout: Arc<ClientFanout>,
    slot: Mutex<ConnectionSlot>,
    message_count: AtomicU64,
}

impl UpstreamConnector {
    pub fn new(
        settings: &Upstream,
        engine: Arc<tokio::sync::Mutex<AggregationEngine>>,
        fanout: Arc<ClientFanout>,
    ) -> Self {
        Self {
            url: settings.url.clone(),
            api_key: settings.api_key.clone(),
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
            engine,
            fanout,
            slot: Mutex::new(ConnectionSlot::new()),
            message_count: AtomicU64::new(0),
        }
    }

    /// Starts a connection attempt unless one is already open or opening.
    /// Must be called from within a tokio runtime.
    pub fn connect(self: &Arc<Self>) -> bool {
        let generation = match self.lock_slot().begin() {
            Some(g) => g,
            None => return false,
        };
        info!("🔌 [Upstream] Connecting to {} (generation {})", self.url, generation);
        tokio::spawn(Arc::clone(self).run(generation));
        true
    }

    pub fn is_connected(&self) -> bool {
        self.lock_slot().phase() == Phase::Open
    }

    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    fn lock_slot(&self) -> MutexGuard<'_, ConnectionSlot> {
        // slot state stays consistent even if a holder panicked
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_slot().is_current(generation)
    }

    async fn run(self: Arc<Self>, generation: u64) {
        match self.session(generation).await {
            Ok(()) => info!("[Upstream] Connection {} closed", generation),
            Err(UpstreamError::Superseded(current)) => {
                debug!(
                    "[Upstream] Connection {} superseded by {}",
                    generation, current
                );
            }
            Err(e) => error!("❌ [Upstream] Connection {} failed: {}", generation, e),
        }

        let reconnect = self.lock_slot().on_close(generation);
        if !reconnect {
            return;
        }

        metrics::set_upstream_connected(false);
        metrics::increment_upstream_reconnects();
        info!(
            "[Upstream] Reconnecting in {}ms",
            self.reconnect_delay.as_millis()
        );
        let this = Arc::clone(&self);
        tokio::spawn(async move {
            sleep(this.reconnect_delay).await;
            this.connect();
        });
    }

    async fn session(&self, generation: u64) -> Result<(), UpstreamError> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;

        {
            let mut slot = self.lock_slot();
            if !slot.mark_open(generation) {
                return Err(UpstreamError::Superseded(slot.generation()));
            }
        }
        metrics::set_upstream_connected(true);
        info!("✅ [Upstream] Connected (generation {})", generation);

        let (mut write, mut read) = ws_stream.split();
        let subscription = SubscriptionRequest::global_position_reports(self.api_key.clone());
        write
            .send(Message::Text(serde_json::to_string(&subscription)?))
            .await?;

        while let Some(msg) = read.next().await {
            if !self.is_current(generation) {
                return Err(UpstreamError::Superseded(self.lock_slot().generation()));
            }
            match msg {
                Ok(Message::Text(text)) => self.handle_frame(RelayFrame::text(text)).await,
                Ok(Message::Binary(data)) => self.handle_frame(RelayFrame::binary(data)).await,
                Ok(Message::Close(frame)) => {
                    warn!("⚠️ [Upstream] Server closed connection: {:?}", frame);
                    break;
                }
                // ping/pong handled by tungstenite
                Ok(_) => {}
                Err(e) => {
                    warn!("⚠️ [Upstream] Socket error: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Counts the frame, ingests it when it decodes to a position report and
    /// always rebroadcasts the raw bytes.
    async fn handle_frame(&self, frame: RelayFrame) {
        self.message_count.fetch_add(1, Ordering::Relaxed);
        metrics::increment_upstream_messages();

        match AisStreamMessage::parse(frame.as_bytes()) {
            Some(message) if message.is_position_report() => {
                let result = self.engine.lock().await.ingest_message(&message, now_ms());
                if let Err(e) = result {
                    debug!("[Upstream] Dropped position report: {}", e);
                    metrics::increment_parse_failures();
                }
            }
            Some(_) => {}
            None => {
                debug!("[Upstream] Unparseable frame ({} bytes)", frame.as_bytes().len());
                metrics::increment_parse_failures();
            }
        }

        self.fanout.publish(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_is_idempotent_while_active() {
        let mut slot = ConnectionSlot::new();
        assert_eq!(slot.begin(), Some(1));
        assert_eq!(slot.begin(), None);
        assert!(slot.mark_open(1));
        assert_eq!(slot.begin(), None);
        assert_eq!(slot.phase(), Phase::Open);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut slot = ConnectionSlot::new();
        let first = slot.begin().unwrap();
        assert!(slot.mark_open(first));
        assert!(slot.on_close(first));

        let second = slot.begin().unwrap();
        assert_ne!(first, second);
        // late events from the superseded socket
        assert!(!slot.mark_open(first));
        assert!(!slot.on_close(first));
        assert_eq!(slot.phase(), Phase::Connecting);

        assert!(slot.mark_open(second));
        assert!(slot.on_close(second));
        assert!(!slot.on_close(second), "close is handled once");
        assert_eq!(slot.phase(), Phase::Idle);
    }

    #[test]
    fn test_failed_attempt_returns_to_idle() {
        let mut slot = ConnectionSlot::new();
        let g = slot.begin().unwrap();
        assert!(slot.on_close(g));
        assert_eq!(slot.begin(), Some(g + 1));
    }
}
