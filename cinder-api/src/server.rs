//! API server state and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use cinder_chain::Chain;
use cinder_core::Result;
use cinder_store::BlockStore;

/// Shared state for the read API.
pub struct ApiState<S: BlockStore> {
    chain: Arc<RwLock<Chain<S>>>,
}

impl<S: BlockStore> ApiState<S> {
    pub fn new(chain: Arc<RwLock<Chain<S>>>) -> Arc<Self> {
        Arc::new(Self { chain })
    }

    pub fn chain(&self) -> &RwLock<Chain<S>> {
        &self.chain
    }
}

/// Serve the read API until the process exits.
pub async fn serve<S: BlockStore + 'static>(
    state: Arc<ApiState<S>>,
    addr: SocketAddr,
) -> Result<()> {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);
    let app: Router = crate::rest::router::<S>()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "read api listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| cinder_core::Error::storage(e.to_string()))?;
    Ok(())
}
