//! Outbound peer connections.
//!
//! One task per configured peer URL. Each connection runs a 10-second
//! heartbeat; three unanswered pings terminate the socket. A closed or
//! failed connection is retried after 10 seconds; after three consecutive
//! failures the peer is silenced (logging suppressed, retries continue) and
//! a successful open un-silences it.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use cinder_store::BlockStore;

use crate::handler::NodeHandle;
use crate::hub::forward;

/// Heartbeat interval per socket.
pub const KEEPALIVE_SECS: u64 = 10;
/// Unanswered pings before the socket is terminated.
pub const MAX_MISSED_PONGS: u8 = 3;
/// Delay before a reconnect attempt.
pub const RECONNECT_SECS: u64 = 10;
/// Consecutive failures before a peer is silenced.
pub const SILENCE_AFTER: u32 = 3;

/// Reconnect bookkeeping for one peer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PeerStatus {
    pub failures: u32,
    pub silenced: bool,
}

impl PeerStatus {
    /// Record a failed connection attempt. Returns true when this failure
    /// newly silenced the peer.
    pub fn record_failure(&mut self) -> bool {
        self.failures += 1;
        if !self.silenced && self.failures >= SILENCE_AFTER {
            self.silenced = true;
            return true;
        }
        false
    }

    /// Record a successful open, resetting the counter and un-silencing.
    pub fn record_open(&mut self) {
        self.failures = 0;
        self.silenced = false;
    }
}

/// Maintain one outbound gossip connection forever.
pub async fn run_peer<S: BlockStore + 'static>(handle: Arc<NodeHandle<S>>, url: String) {
    let mut status = PeerStatus::default();

    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                if status.silenced {
                    info!(peer = %url, "peer recovered");
                } else {
                    info!(peer = %url, "peer connected");
                }
                status.record_open();
                drive_connection(&handle, &url, ws).await;
                debug!(peer = %url, "peer connection closed");
            }
            Err(e) => {
                let newly_silenced = status.record_failure();
                if newly_silenced {
                    warn!(peer = %url, "peer silenced after {SILENCE_AFTER} failures");
                } else if !status.silenced {
                    warn!(peer = %url, error = %e, "peer connect failed");
                } else {
                    trace!(peer = %url, error = %e, "peer still unreachable");
                }
            }
        }
        tokio::time::sleep(Duration::from_secs(RECONNECT_SECS)).await;
    }
}

async fn drive_connection<S, W>(
    handle: &Arc<NodeHandle<S>>,
    url: &str,
    ws: tokio_tungstenite::WebSocketStream<W>,
) where
    S: BlockStore + 'static,
    W: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (sink, mut stream) = ws.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let id = handle.hub().register(tx.clone());
    let writer = tokio::spawn(forward(rx, sink));

    let mut heartbeat = tokio::time::interval(Duration::from_secs(KEEPALIVE_SECS));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    heartbeat.tick().await; // the first tick fires immediately
    let mut missed: u8 = 0;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if missed >= MAX_MISSED_PONGS {
                    warn!(peer = %url, "peer unresponsive, terminating");
                    break;
                }
                missed += 1;
                if tx.send(Message::Ping(Vec::new())).is_err() {
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Pong(_))) => missed = 0,
                Some(Ok(Message::Ping(payload))) => {
                    let _ = tx.send(Message::Pong(payload));
                }
                Some(Ok(Message::Text(text))) => handle.handle_text(&text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(peer = %url, error = %e, "peer read error");
                    break;
                }
            }
        }
    }

    handle.hub().unregister(id);
    drop(tx);
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_after_three_failures() {
        let mut status = PeerStatus::default();
        assert!(!status.record_failure());
        assert!(!status.record_failure());
        assert!(status.record_failure()); // newly silenced
        assert!(status.silenced);
        assert_eq!(status.failures, 3);

        // Further failures stay silent.
        assert!(!status.record_failure());
        assert!(status.silenced);
    }

    #[test]
    fn test_open_resets_and_unsilences() {
        let mut status = PeerStatus::default();
        for _ in 0..5 {
            status.record_failure();
        }
        assert!(status.silenced);

        status.record_open();
        assert!(!status.silenced);
        assert_eq!(status.failures, 0);
    }
}
