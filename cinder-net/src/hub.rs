//! Socket registry and broadcast fan-out.
//!
//! Every open socket, inbound or outbound, registers the sending half of an
//! unbounded channel here. Broadcasting serializes the envelope once and
//! offers it to every registered socket; a failed send only drops that one
//! socket's message.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{Sink, SinkExt};
use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tracing::trace;

use crate::envelope::Envelope;

/// Identifier of a registered socket.
pub type SocketId = u64;

/// Registry of live gossip sockets.
#[derive(Debug, Default)]
pub struct GossipHub {
    sockets: Mutex<HashMap<SocketId, UnboundedSender<Message>>>,
    next_id: AtomicU64,
}

impl GossipHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket's outgoing channel; returns its id.
    pub fn register(&self, sender: UnboundedSender<Message>) -> SocketId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sockets.lock().insert(id, sender);
        id
    }

    /// Remove a socket on close.
    pub fn unregister(&self, id: SocketId) {
        self.sockets.lock().remove(&id);
    }

    /// Number of live sockets.
    pub fn socket_count(&self) -> usize {
        self.sockets.lock().len()
    }

    /// Send an envelope to every live socket. A send failure on one socket
    /// does not affect the others.
    pub fn broadcast(&self, envelope: &Envelope) {
        let text = envelope.to_json();
        let sockets = self.sockets.lock();
        trace!(event = envelope.event(), sockets = sockets.len(), "broadcast");
        for sender in sockets.values() {
            let _ = sender.send(Message::Text(text.clone()));
        }
    }
}

/// Drain an outgoing channel into a WebSocket sink until either side closes.
pub(crate) async fn forward<W>(mut rx: UnboundedReceiver<Message>, mut sink: W)
where
    W: Sink<Message> + Unpin,
{
    while let Some(message) = rx.recv().await {
        if sink.send(message).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::genesis;
    use tokio::sync::mpsc;

    #[test]
    fn test_register_unregister() {
        let hub = GossipHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register(tx);
        assert_eq!(hub.socket_count(), 1);
        hub.unregister(id);
        assert_eq!(hub.socket_count(), 0);
    }

    #[test]
    fn test_broadcast_reaches_all_sockets() {
        let hub = GossipHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.register(tx1);
        hub.register(tx2);

        hub.broadcast(&Envelope::Block(genesis()));

        for rx in [&mut rx1, &mut rx2] {
            match rx.try_recv().unwrap() {
                Message::Text(text) => assert!(text.contains("\"event\":\"block\"")),
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    #[test]
    fn test_dead_socket_does_not_poison_broadcast() {
        let hub = GossipHub::new();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        hub.register(dead_tx);
        hub.register(live_tx);

        hub.broadcast(&Envelope::Block(genesis()));
        assert!(live_rx.try_recv().is_ok());
    }
}
