//! The Cinder full node.
//!
//! Startup order: open the store, write the built-in genesis if the store is
//! empty, replay the chain, bulk-pull from the seed peer, then start the
//! gossip listener, outbound peers, the height watchdog, and the read API.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cinder_api::ApiState;
use cinder_chain::Chain;
use cinder_core::Result;
use cinder_net::NodeHandle;
use cinder_store::DirStore;

use crate::config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "node failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    info!(?config, "starting cinder node");

    let store = DirStore::open(config.data_dir.join("blocks"))?;
    let mut chain = Chain::open(store)?;
    if chain.height() == 0 {
        info!("empty store, writing built-in genesis");
        chain.bootstrap_genesis(cinder_core::genesis())?;
    }
    info!(height = chain.height(), tip = %chain.last_hash(), "chain ready");

    let chain = Arc::new(RwLock::new(chain));
    let handle = NodeHandle::new(chain.clone());

    // Catch up from the seed peer before serving anyone.
    if let Some(peer_http) = &config.peer_http {
        if let Err(e) = cinder_net::bootstrap_from_seed(&handle, peer_http).await {
            // A missing or invalid seed block aborts the bootstrap; the
            // watchdog will retry against whatever peer state settles.
            error!(error = %e, "seed bootstrap aborted");
        }
    }

    let mut tasks = Vec::new();

    {
        let handle = handle.clone();
        let port = config.port;
        tasks.push(tokio::spawn(async move {
            if let Err(e) = cinder_net::run_server(handle, port).await {
                error!(error = %e, "gossip listener failed");
            }
        }));
    }

    for peer in &config.peers {
        let handle = handle.clone();
        let url = peer.clone();
        tasks.push(tokio::spawn(cinder_net::run_peer(handle, url)));
    }

    if let Some(peer_http) = config.peer_http.clone() {
        let handle = handle.clone();
        tasks.push(tokio::spawn(cinder_net::run_watchdog(handle, peer_http)));
    }

    {
        let state = ApiState::new(chain);
        let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
        tasks.push(tokio::spawn(async move {
            if let Err(e) = cinder_api::serve(state, addr).await {
                error!(error = %e, "read api failed");
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    for task in &tasks {
        task.abort();
    }
    Ok(())
}
