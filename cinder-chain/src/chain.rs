//! The chain manager.
//!
//! Owns the block store, state index, and mempool as one atomic unit. Every
//! mutation of chain state funnels through `&mut self` here; callers wrap
//! the manager in a single lock so block applications are totally ordered.

use primitive_types::U256;
use serde::Serialize;
use tracing::{info, warn};

use cinder_core::params::{self, GENESIS_PREV_HASH, MAX_PUSH_LEN, TAIL};
use cinder_core::{Block, Error, Result, Transaction};
use cinder_store::BlockStore;

use crate::events::{ChainEvent, EventBus};
use crate::mempool::Mempool;
use crate::state::{MintInfo, StateIndex};
use crate::validate::{check_block, check_tx, BlockCtx, Replay, TxCtx};

/// A transaction together with the height it committed at.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub height: u64,
    pub tx: Transaction,
}

/// A search result: a transaction in a block or still pending.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Height of the containing block; absent while pending in the mempool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    pub tx: Transaction,
}

/// The replicated ledger plus its derived state.
#[derive(Debug)]
pub struct Chain<S: BlockStore> {
    store: S,
    state: StateIndex,
    mempool: Mempool,
    height: u64,
    last_hash: String,
    events: EventBus,
}

impl<S: BlockStore> Chain<S> {
    /// Load the chain from the store, replaying every persisted block.
    ///
    /// The genesis block is accepted unconditionally; every later block is
    /// re-applied with trusted replay flags. Any failure is tampering and
    /// halts initialization.
    pub fn open(store: S) -> Result<Self> {
        let stored = store.height()?;
        let mut chain = Self {
            store,
            state: StateIndex::new(),
            mempool: Mempool::new(),
            height: 0,
            last_hash: GENESIS_PREV_HASH.to_string(),
            events: EventBus::default(),
        };

        if stored == 0 {
            return Ok(chain);
        }

        let genesis = chain
            .store
            .get(0)?
            .ok_or_else(|| Error::storage("missing genesis"))?;
        chain.apply_genesis(genesis, false);

        for h in 1..stored {
            let block = chain
                .store
                .get(h)?
                .ok_or_else(|| Error::storage(format!("missing block {h}")))?;
            chain
                .apply_block(block, Replay::trusted(), false)
                .map_err(|e| Error::tampering(h, e.to_string()))?;
        }

        info!(height = chain.height, "chain loaded from store");
        Ok(chain)
    }

    /// Write and apply the genesis block of a fresh chain.
    pub fn bootstrap_genesis(&mut self, genesis: Block) -> Result<()> {
        if self.height != 0 {
            return Err(Error::invalid_block("chain already has a genesis"));
        }
        self.store.put(0, &genesis)?;
        self.apply_genesis(genesis, true);
        Ok(())
    }

    fn apply_genesis(&mut self, genesis: Block, announce: bool) {
        self.state.release(genesis.timestamp);
        for tx in &genesis.transactions {
            self.state.apply(tx, genesis.timestamp);
        }
        self.height = 1;
        self.last_hash = genesis.hash.clone();
        if announce {
            self.events.publish(ChainEvent::BlockCommitted {
                height: 0,
                hash: genesis.hash,
            });
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The target the next block must meet.
    pub fn current_target(&self) -> Result<U256> {
        Ok(params::target_for_tail(&self.tail_timestamps()?))
    }

    /// Hex form of the current target.
    pub fn diff_hex(&self) -> Result<String> {
        Ok(params::target_hex(&self.current_target()?))
    }

    fn tail_timestamps(&self) -> Result<Vec<u64>> {
        let tail = self.store.tail(self.height, TAIL)?;
        Ok(tail.iter().map(|b| b.timestamp).collect())
    }

    pub fn balance(&self, address: &str, token: Option<&str>) -> u64 {
        self.state.balance(address, token)
    }

    pub fn locked_balance(&self, address: &str, token: Option<&str>) -> u64 {
        self.state.locked_balance(address, token)
    }

    /// Spendable balance counting funds still pending in the mempool.
    pub fn mempool_balance(&self, address: &str, token: Option<&str>) -> u64 {
        (self.state.balance(address, token) + self.mempool.pending_incoming(address, token))
            .saturating_sub(self.mempool.pending_outgoing(address, token))
    }

    pub fn tokens_of(&self, address: &str) -> Vec<String> {
        self.state.tokens_of(address)
    }

    pub fn token_info(&self, token: &str) -> Option<MintInfo> {
        self.state.token(token).copied()
    }

    pub fn token_count(&self) -> usize {
        self.state.minted_count()
    }

    pub fn token_at(&self, index: usize) -> Option<(String, MintInfo)> {
        self.state
            .token_at(index)
            .map(|(name, info)| (name.to_string(), *info))
    }

    /// Current fee for minting a new token.
    pub fn mint_fee_now(&self) -> u64 {
        params::mint_fee(self.height, self.state.minted_count())
    }

    /// Full block reward at the current height.
    pub fn reward_now(&self) -> u64 {
        params::reward(self.height)
    }

    pub fn mempool_txs(&self) -> Vec<Transaction> {
        self.mempool.txs().to_vec()
    }

    pub fn mempool_len(&self) -> usize {
        self.mempool.len()
    }

    pub fn block(&self, height: u64) -> Result<Option<Block>> {
        if height >= self.height {
            return Ok(None);
        }
        self.store.get(height)
    }

    /// Blocks in `[start, end)`, clamped to the chain height.
    pub fn blocks(&self, start: u64, end: u64) -> Result<Vec<Block>> {
        let end = end.min(self.height);
        let mut out = Vec::new();
        for h in start..end {
            match self.store.get(h)? {
                Some(block) => out.push(block),
                None => break,
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Validate and admit a transaction from an external caller.
    pub fn submit_tx(&mut self, tx: Transaction) -> Result<()> {
        if tx.sender.is_reserved() {
            return Err(Error::invalid_tx("reserved senders cannot be submitted"));
        }
        if let Some(address) = tx.sender.address() {
            if self.mempool.contains_sender(address) {
                return Err(Error::invalid_tx("sender already has a pending transaction"));
            }
        }

        let ctx = TxCtx {
            state: &self.state,
            mempool: &self.mempool,
            height: self.height,
            include_mempool_balance: true,
            block_mints: None,
        };
        check_tx(&ctx, &tx)?;

        if !self.mempool.admit(tx) {
            return Err(Error::invalid_tx("sender already has a pending transaction"));
        }
        Ok(())
    }

    /// Validate, persist, and apply a block at the current height.
    pub fn add_block(&mut self, block: Block, replay: Replay) -> Result<()> {
        self.apply_block(block, replay, true)
    }

    /// Live ingest of a gossiped block.
    pub fn accept_block(&mut self, block: Block) -> Result<()> {
        self.add_block(block, Replay::live())
    }

    fn apply_block(&mut self, block: Block, replay: Replay, persist: bool) -> Result<()> {
        let tail = self.tail_timestamps()?;
        let ctx = BlockCtx {
            state: &self.state,
            mempool: &self.mempool,
            tail_timestamps: &tail,
            last_hash: &self.last_hash,
            height: self.height,
        };
        check_block(&ctx, &block, replay)?;

        // Durable before acknowledged; a failed write never commits.
        if persist {
            self.store.put(self.height, &block)?;
        }

        self.state.release(block.timestamp);
        for tx in &block.transactions {
            self.state.apply(tx, block.timestamp);
        }
        self.mempool.remove_included(&block.transactions);

        let committed = self.height;
        self.height += 1;
        self.last_hash = block.hash.clone();

        self.events.publish(ChainEvent::BlockCommitted {
            height: committed,
            hash: block.hash.clone(),
        });
        for mint in block.mints() {
            self.events.publish(ChainEvent::MintCreated {
                token: mint.token.clone(),
                mining_reward: mint.mining_reward.unwrap_or(0),
                airdrop: mint.airdrop,
            });
        }
        Ok(())
    }

    /// Rewind to `fork`, rebuilding the state index by replaying the store
    /// from empty. Persisted blocks above the fork stay on disk until a
    /// replacement overwrites them.
    pub fn truncate_to(&mut self, fork: u64) -> Result<()> {
        if fork > self.height {
            return Err(Error::sync(format!(
                "cannot truncate to {fork} above height {}",
                self.height
            )));
        }

        let mut state = StateIndex::new();
        let mut last_hash = GENESIS_PREV_HASH.to_string();
        for h in 0..fork {
            let block = self
                .store
                .get(h)?
                .ok_or_else(|| Error::storage(format!("missing block {h}")))?;
            state.release(block.timestamp);
            for tx in &block.transactions {
                state.apply(tx, block.timestamp);
            }
            last_hash = block.hash.clone();
        }

        self.state = state;
        self.height = fork;
        self.last_hash = last_hash;
        Ok(())
    }

    /// Apply a sub-chain push: replace up to [`MAX_PUSH_LEN`] tip blocks
    /// with blocks rooted at a shared ancestor.
    ///
    /// The whole index is snapshotted and restored on any failure, so a bad
    /// push cannot leave the node half-reorganized.
    pub fn apply_push(&mut self, sub: &[Block]) -> Result<()> {
        if sub.is_empty() {
            return Err(Error::invalid_block("empty push"));
        }
        if sub.len() > MAX_PUSH_LEN {
            return Err(Error::invalid_block("push longer than the allowed window"));
        }

        // Scan the last len+1 local blocks for the shared ancestor.
        let anchor = &sub[0].prev_hash;
        let mut fork = None;
        let scan = (sub.len() as u64 + 1).min(TAIL as u64).min(self.height);
        for back in 1..=scan {
            let h = self.height - back;
            let block = self
                .store
                .get(h)?
                .ok_or_else(|| Error::storage(format!("missing block {h}")))?;
            if block.hash == *anchor {
                fork = Some(h + 1);
                break;
            }
        }
        let Some(fork) = fork else {
            return Err(Error::invalid_block("push has no shared ancestor in window"));
        };

        let snapshot = (
            self.state.clone(),
            self.mempool.clone(),
            self.height,
            self.last_hash.clone(),
        );

        let outcome = (|| -> Result<()> {
            self.truncate_to(fork)?;
            for block in sub {
                self.add_block(block.clone(), Replay::replaying())?;
            }
            Ok(())
        })();

        if let Err(e) = outcome {
            warn!(error = %e, "push rejected, restoring snapshot");
            (self.state, self.mempool, self.height, self.last_hash) = snapshot;
            return Err(e);
        }

        info!(fork, height = self.height, "applied sub-chain push");
        Ok(())
    }

    pub fn clear_mempool(&mut self) {
        self.mempool.clear();
    }

    /// Stage a fetched transaction ahead of applying its block (pull-sync).
    pub fn inject_mempool(&mut self, tx: Transaction) {
        self.mempool.inject(tx);
    }

    /// Adopt a peer's mempool wholesale (end of pull-sync).
    pub fn replace_mempool(&mut self, txs: Vec<Transaction>) {
        self.mempool.replace(txs);
    }

    // ------------------------------------------------------------------
    // Scans (thin accessors for the read API)
    // ------------------------------------------------------------------

    /// Every committed transaction touching an address, oldest first.
    pub fn history(&self, address: &str) -> Result<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        for h in 0..self.height {
            let Some(block) = self.store.get(h)? else { break };
            for tx in &block.transactions {
                if tx.sender.address() == Some(address) || tx.receiver == address {
                    entries.push(HistoryEntry {
                        height: h,
                        tx: tx.clone(),
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Find a committed block by hash.
    pub fn find_block(&self, hash: &str) -> Result<Option<(u64, Block)>> {
        for h in 0..self.height {
            let Some(block) = self.store.get(h)? else { break };
            if block.hash == hash {
                return Ok(Some((h, block)));
            }
        }
        Ok(None)
    }

    /// Search committed and pending transactions by signature prefix or
    /// exact sender/receiver match.
    pub fn search_txs(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let matches = |tx: &Transaction| {
            tx.signature.starts_with(query)
                || tx.sender.as_str() == query
                || tx.receiver == query
        };

        let mut hits = Vec::new();
        for h in 0..self.height {
            let Some(block) = self.store.get(h)? else { break };
            for tx in &block.transactions {
                if matches(tx) {
                    hits.push(SearchHit {
                        height: Some(h),
                        tx: tx.clone(),
                    });
                    if hits.len() >= limit {
                        return Ok(hits);
                    }
                }
            }
        }
        for tx in self.mempool.txs() {
            if matches(tx) {
                hits.push(SearchHit {
                    height: None,
                    tx: tx.clone(),
                });
                if hits.len() >= limit {
                    break;
                }
            }
        }
        Ok(hits)
    }

    /// The last `min(height, MAX_PUSH_LEN)` blocks, for pushing to peers.
    pub fn push_tail(&self) -> Result<Vec<Block>> {
        self.store.tail(self.height, MAX_PUSH_LEN)
    }
}
