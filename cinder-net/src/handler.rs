//! Shared node handle and envelope dispatch.
//!
//! Every gossip socket hands decoded envelopes to [`NodeHandle::handle`].
//! Duplicate payloads are dropped by recent-hash caches before validation;
//! accepted payloads are rebroadcast to every socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use cinder_chain::Chain;
use cinder_store::BlockStore;

use crate::envelope::Envelope;
use crate::hub::GossipHub;

/// How many recently seen block/push hashes to remember.
const SEEN_CACHE: usize = 64;

/// Shared handle wiring the chain to the gossip layer.
pub struct NodeHandle<S: BlockStore> {
    chain: Arc<RwLock<Chain<S>>>,
    hub: GossipHub,
    seen_blocks: Mutex<VecDeque<String>>,
    seen_pushes: Mutex<VecDeque<String>>,
    stop_incoming: AtomicBool,
    is_syncing: AtomicBool,
}

impl<S: BlockStore> NodeHandle<S> {
    pub fn new(chain: Arc<RwLock<Chain<S>>>) -> Arc<Self> {
        Arc::new(Self {
            chain,
            hub: GossipHub::new(),
            seen_blocks: Mutex::new(VecDeque::new()),
            seen_pushes: Mutex::new(VecDeque::new()),
            stop_incoming: AtomicBool::new(false),
            is_syncing: AtomicBool::new(false),
        })
    }

    pub fn chain(&self) -> &Arc<RwLock<Chain<S>>> {
        &self.chain
    }

    pub fn hub(&self) -> &GossipHub {
        &self.hub
    }

    /// Diagnostic toggle: while set, inbound tx/block ingestion is dropped.
    /// Outbound broadcast is unaffected.
    pub fn set_stop_incoming(&self, stop: bool) {
        self.stop_incoming.store(stop, Ordering::SeqCst);
    }

    pub fn stop_incoming(&self) -> bool {
        self.stop_incoming.load(Ordering::SeqCst)
    }

    /// Acquire the single sync latch. Returns false if a sync is already
    /// running.
    pub fn begin_sync(&self) -> bool {
        !self.is_syncing.swap(true, Ordering::SeqCst)
    }

    /// Release the sync latch.
    pub fn end_sync(&self) {
        self.is_syncing.store(false, Ordering::SeqCst);
    }

    /// Broadcast an envelope to every live socket.
    pub fn broadcast(&self, envelope: &Envelope) {
        self.hub.broadcast(envelope);
    }

    /// Parse and dispatch one wire frame.
    pub fn handle_text(&self, text: &str) {
        match Envelope::from_json(text) {
            Ok(envelope) => self.handle(envelope),
            Err(e) => debug!(error = %e, "unparseable gossip frame"),
        }
    }

    /// Dispatch a decoded envelope.
    pub fn handle(&self, envelope: Envelope) {
        match envelope {
            Envelope::Tx(tx) => {
                if self.stop_incoming() {
                    return;
                }
                let result = self.chain.write().submit_tx(tx.clone());
                match result {
                    Ok(()) => self.broadcast(&Envelope::Tx(tx)),
                    Err(e) => debug!(error = %e, "tx rejected"),
                }
            }
            Envelope::Block(block) => {
                if self.stop_incoming() {
                    return;
                }
                let hash = block.hash.clone();
                if self.chain.read().last_hash() == hash {
                    return;
                }
                if recently_seen(&self.seen_blocks, &hash) {
                    return;
                }
                let result = self.chain.write().accept_block(block.clone());
                match result {
                    Ok(()) => {
                        info!(hash = %short(&hash), "accepted gossiped block");
                        self.broadcast(&Envelope::Block(block));
                    }
                    Err(e) => debug!(error = %e, "block rejected"),
                }
            }
            Envelope::Push(blocks) => {
                let Some(tip) = blocks.last() else { return };
                if recently_seen(&self.seen_pushes, &tip.hash) {
                    return;
                }
                let result = self.chain.write().apply_push(&blocks);
                match result {
                    Ok(()) => self.broadcast(&Envelope::Push(blocks)),
                    Err(e) => debug!(error = %e, "push rejected"),
                }
            }
        }
    }
}

/// Check-and-insert against a bounded recent-hash cache.
fn recently_seen(cache: &Mutex<VecDeque<String>>, hash: &str) -> bool {
    let mut cache = cache.lock();
    if cache.iter().any(|seen| seen == hash) {
        return true;
    }
    cache.push_back(hash.to_string());
    while cache.len() > SEEN_CACHE {
        cache.pop_front();
    }
    false
}

fn short(hash: &str) -> &str {
    &hash[..12.min(hash.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::genesis;
    use cinder_store::MemoryStore;

    fn handle() -> Arc<NodeHandle<MemoryStore>> {
        let mut chain = Chain::open(MemoryStore::new()).unwrap();
        chain.bootstrap_genesis(genesis()).unwrap();
        NodeHandle::new(Arc::new(RwLock::new(chain)))
    }

    #[test]
    fn test_duplicate_block_dropped_before_validation() {
        let handle = handle();
        // The chain tip itself is always a duplicate.
        let tip = handle.chain().read().last_hash().to_string();
        assert!(!recently_seen(&handle.seen_blocks, "other"));
        assert_eq!(handle.chain().read().height(), 1);
        handle.handle(Envelope::Block(genesis()));
        assert_eq!(handle.chain().read().height(), 1);
        assert_eq!(handle.chain().read().last_hash(), tip);
    }

    #[test]
    fn test_seen_cache_bounded() {
        let cache = Mutex::new(VecDeque::new());
        for i in 0..SEEN_CACHE + 5 {
            assert!(!recently_seen(&cache, &format!("h{i}")));
        }
        assert_eq!(cache.lock().len(), SEEN_CACHE);
        // The earliest entries were evicted and read as fresh again.
        assert!(!recently_seen(&cache, "h0"));
        assert!(recently_seen(&cache, "h5"));
    }

    #[test]
    fn test_ingest_gate_blocks_tx_and_block() {
        let handle = handle();
        handle.set_stop_incoming(true);
        assert!(handle.stop_incoming());

        let tx = cinder_core::Transaction {
            sender: cinder_core::Sender::Address("02ab".into()),
            receiver: "02cd".into(),
            amount: 1,
            signature: "00".into(),
            nonce: 1,
            timestamp: 0,
            token: None,
            unlock: None,
            mint: None,
        };
        handle.handle(Envelope::Tx(tx));
        assert_eq!(handle.chain().read().mempool_len(), 0);

        handle.set_stop_incoming(false);
        assert!(!handle.stop_incoming());
    }

    #[test]
    fn test_sync_latch_is_exclusive() {
        let handle = handle();
        assert!(handle.begin_sync());
        assert!(!handle.begin_sync());
        handle.end_sync();
        assert!(handle.begin_sync());
        handle.end_sync();
    }
}
