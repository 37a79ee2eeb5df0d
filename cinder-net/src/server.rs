//! Inbound gossip listener.
//!
//! Accepted sockets join the broadcast hub alongside outbound connections;
//! remote heartbeats are answered with pongs.

use std::sync::Arc;

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use cinder_core::Result;
use cinder_store::BlockStore;

use crate::handler::NodeHandle;
use crate::hub::forward;

/// Listen for inbound gossip connections forever.
pub async fn run_server<S: BlockStore + 'static>(
    handle: Arc<NodeHandle<S>>,
    port: u16,
) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "gossip listening");

    loop {
        let (stream, addr) = listener.accept().await?;
        let handle = handle.clone();
        tokio::spawn(async move {
            match accept_async(stream).await {
                Ok(ws) => serve_socket(handle, ws).await,
                Err(e) => debug!(%addr, error = %e, "websocket handshake failed"),
            }
        });
    }
}

async fn serve_socket<S: BlockStore + 'static>(
    handle: Arc<NodeHandle<S>>,
    ws: tokio_tungstenite::WebSocketStream<TcpStream>,
) {
    let (sink, mut stream) = ws.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let id = handle.hub().register(tx.clone());
    let writer = tokio::spawn(forward(rx, sink));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle.handle_text(&text),
            Ok(Message::Ping(payload)) => {
                let _ = tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "inbound socket error");
                break;
            }
        }
    }

    handle.hub().unregister(id);
    drop(tx);
    let _ = writer.await;
}
