//! Height watchdog, pull-sync, and sub-chain push.
//!
//! A watchdog polls the configured HTTP seed peer every ~20 seconds. A peer
//! that is ahead triggers a pull-sync: walk back to the divergence point,
//! rewind, replay the remote blocks, and adopt the remote mempool. A peer
//! that is behind receives our tail as a push. A single latch keeps at most
//! one sync cycle in flight; failures release the latch and retry at the
//! next tick.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use cinder_chain::Replay;
use cinder_core::params::{SYNC_BATCH, TAIL};
use cinder_core::{Block, Error, Result, Transaction};
use cinder_store::BlockStore;

use crate::envelope::Envelope;
use crate::handler::NodeHandle;

/// Watchdog period.
pub const WATCHDOG_SECS: u64 = 20;

#[derive(Debug, Deserialize)]
struct HeightResponse {
    height: u64,
}

fn http(e: reqwest::Error) -> Error {
    Error::sync(e.to_string())
}

async fn fetch_height(client: &reqwest::Client, peer: &str) -> Result<u64> {
    let response: HeightResponse = client
        .get(format!("{peer}/height"))
        .send()
        .await
        .map_err(http)?
        .json()
        .await
        .map_err(http)?;
    Ok(response.height)
}

async fn fetch_block(client: &reqwest::Client, peer: &str, height: u64) -> Result<Block> {
    client
        .get(format!("{peer}/block/{height}"))
        .send()
        .await
        .map_err(http)?
        .json()
        .await
        .map_err(http)
}

async fn fetch_blocks(
    client: &reqwest::Client,
    peer: &str,
    start: u64,
    end: u64,
) -> Result<Vec<Block>> {
    client
        .get(format!("{peer}/blocks?start={start}&end={end}"))
        .send()
        .await
        .map_err(http)?
        .json()
        .await
        .map_err(http)
}

async fn fetch_mempool(client: &reqwest::Client, peer: &str) -> Result<Vec<Transaction>> {
    client
        .get(format!("{peer}/mempool"))
        .send()
        .await
        .map_err(http)?
        .json()
        .await
        .map_err(http)
}

/// Run the height watchdog against a seed peer forever.
pub async fn run_watchdog<S: BlockStore + 'static>(handle: Arc<NodeHandle<S>>, peer_http: String) {
    let client = reqwest::Client::new();
    let mut tick = tokio::time::interval(Duration::from_secs(WATCHDOG_SECS));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        if !handle.begin_sync() {
            continue;
        }
        if let Err(e) = watchdog_pass(&handle, &client, &peer_http).await {
            warn!(error = %e, "sync cycle aborted");
        }
        handle.end_sync();
    }
}

async fn watchdog_pass<S: BlockStore + 'static>(
    handle: &Arc<NodeHandle<S>>,
    client: &reqwest::Client,
    peer: &str,
) -> Result<()> {
    let remote = fetch_height(client, peer).await?;
    let local = handle.chain().read().height();

    if remote > local {
        info!(local, remote, "peer is ahead, pulling");
        pull_sync(handle, client, peer, remote).await
    } else if local > remote {
        info!(local, remote, "peer is behind, pushing tail");
        push_tail(handle)
    } else {
        Ok(())
    }
}

/// Catch up to a peer that is ahead of us.
async fn pull_sync<S: BlockStore + 'static>(
    handle: &Arc<NodeHandle<S>>,
    client: &reqwest::Client,
    peer: &str,
    remote_height: u64,
) -> Result<()> {
    // Walk back from the tip comparing hashes to find the divergence point.
    let local_height = handle.chain().read().height();
    let mut fork = 0u64;
    let mut walked = 0usize;
    let mut h = local_height;
    while h > 0 {
        if walked >= TAIL {
            return Err(Error::sync("divergence deeper than the tail window"));
        }
        let i = h - 1;
        let local_hash = handle
            .chain()
            .read()
            .block(i)?
            .ok_or_else(|| Error::storage(format!("missing block {i}")))?
            .hash;
        let remote_block = fetch_block(client, peer, i).await?;
        if remote_block.hash == local_hash {
            fork = i + 1;
            break;
        }
        walked += 1;
        h = i;
    }

    {
        let mut chain = handle.chain().write();
        chain.truncate_to(fork)?;
        chain.clear_mempool();
    }

    for height in fork..remote_height {
        let block = fetch_block(client, peer, height).await?;
        let mut chain = handle.chain().write();
        for tx in &block.transactions {
            chain.inject_mempool(tx.clone());
        }
        chain.add_block(block, Replay::replaying())?;
    }

    let mempool = fetch_mempool(client, peer).await?;
    let mut chain = handle.chain().write();
    chain.replace_mempool(mempool);
    info!(height = chain.height(), "pull-sync complete");
    Ok(())
}

/// Offer our tail to peers that are behind.
fn push_tail<S: BlockStore + 'static>(handle: &Arc<NodeHandle<S>>) -> Result<()> {
    let blocks = handle.chain().read().push_tail()?;
    if !blocks.is_empty() {
        handle.broadcast(&Envelope::Push(blocks));
    }
    Ok(())
}

/// Bulk-pull the whole chain from a seed peer at startup, in batches of up
/// to [`SYNC_BATCH`] blocks, then adopt its mempool. Aborts on the first
/// invalid block.
pub async fn bootstrap_from_seed<S: BlockStore + 'static>(
    handle: &Arc<NodeHandle<S>>,
    peer_http: &str,
) -> Result<()> {
    let client = reqwest::Client::new();
    let remote_height = fetch_height(&client, peer_http).await?;
    let mut local = handle.chain().read().height();
    if remote_height <= local {
        return Ok(());
    }
    info!(local, remote_height, "bootstrapping from seed");

    while local < remote_height {
        let end = (local + SYNC_BATCH).min(remote_height);
        let blocks = fetch_blocks(&client, peer_http, local, end).await?;
        if blocks.is_empty() {
            return Err(Error::sync("seed returned an empty batch"));
        }
        let mut chain = handle.chain().write();
        for block in blocks {
            chain.add_block(block, Replay::replaying())?;
        }
        local = chain.height();
    }

    let mempool = fetch_mempool(&client, peer_http).await?;
    handle.chain().write().replace_mempool(mempool);
    info!(height = local, "bootstrap complete");
    Ok(())
}
