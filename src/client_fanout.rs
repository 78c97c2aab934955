// ClientFanout - Retransmisión de cada frame upstream a todos los clientes conectados
// Canal broadcast acotado: un cliente lento salta frames antiguos en vez de acumular memoria

use crate::metrics;
use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Raw upstream frame, text or binary preserved. Cloning is a refcount bump.
#[derive(Clone, Debug, PartialEq)]
pub enum RelayFrame {
    Text(Utf8Bytes),
    Binary(Bytes),
}

impl RelayFrame {
    pub fn text(s: impl Into<String>) -> Self {
        RelayFrame::Text(Utf8Bytes::from(s.into()))
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        RelayFrame::Binary(Bytes::from(data.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RelayFrame::Text(s) => s.as_str().as_bytes(),
            RelayFrame::Binary(b) => b,
        }
    }

    fn into_message(self) -> Message {
        match self {
            RelayFrame::Text(s) => Message::Text(s),
            RelayFrame::Binary(b) => Message::Binary(b),
        }
    }
}

/// Broadcast hub shared by the upstream connector (publisher) and every
/// downstream WebSocket session (subscribers).
pub struct ClientFanout {
    sender: broadcast::Sender<RelayFrame>,
}

impl ClientFanout {
    /// `capacity`: frames buffered before the slowest subscriber starts skipping
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayFrame> {
        self.sender.subscribe()
    }

    /// Publishes one frame. Returns how many subscribers it was queued for.
    pub fn publish(&self, frame: RelayFrame) -> usize {
        // Err only means there are no subscribers right now
        self.sender.send(frame).unwrap_or(0)
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Drives one downstream session until either side goes away.
    /// Inbound client messages are read (to observe close) and discarded.
    pub async fn serve_client(&self, socket: WebSocket) {
        let id = Uuid::new_v4();
        let mut rx = self.subscribe();
        metrics::set_fanout_clients(self.client_count());
        info!("[Fanout] Client {} attached ({} total)", id, self.client_count());

        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Ok(frame) => {
                        if let Err(e) = sink.send(frame.into_message()).await {
                            debug!("[Fanout] Client {} send failed: {}", id, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("[Fanout] Client {} lagged, skipped {} frames", id, skipped);
                        metrics::record_fanout_lagged(skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("[Fanout] Client {} socket error: {}", id, e);
                        break;
                    }
                },
            }
        }

        drop(rx);
        metrics::set_fanout_clients(self.client_count());
        info!("[Fanout] Client {} detached ({} remaining)", id, self.client_count());
    }
}
