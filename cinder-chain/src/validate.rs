//! Pure validation of transactions and blocks.
//!
//! Every check runs against immutable snapshots of the state index and
//! mempool; nothing here mutates. Rejections are reported as errors and the
//! offending payload is simply dropped by callers.

use std::collections::{HashMap, HashSet};

use cinder_core::params::{
    self, BLOCK_TIME_MS, DEV_WALLET, FUTURE_DRIFT_MS,
};
use cinder_core::{now_ms, Block, Error, Result, Sender, Transaction, MINT_SENDER};

use crate::mempool::Mempool;
use crate::state::StateIndex;

/// Relaxations applied when re-applying blocks that were already accepted
/// once (store replay at boot, pull-sync, sub-chain push).
#[derive(Debug, Clone, Copy, Default)]
pub struct Replay {
    /// Skip the live-ingest checks: timestamp window, mempool coverage, and
    /// mempool membership.
    pub replay: bool,
    /// Additionally skip recomputing the argon2 hash. Only safe for blocks
    /// reloaded from the trusted local store.
    pub skip_pow: bool,
}

impl Replay {
    /// Full validation for live ingest.
    pub fn live() -> Self {
        Self::default()
    }

    /// Replay of blocks fetched from peers.
    pub fn replaying() -> Self {
        Self {
            replay: true,
            skip_pow: false,
        }
    }

    /// Replay of the trusted local store.
    pub fn trusted() -> Self {
        Self {
            replay: true,
            skip_pow: true,
        }
    }
}

/// Mints declared by the block under validation: token → (airdrop, reward).
pub type BlockMints = HashMap<String, (u64, u64)>;

/// Immutable inputs for a transaction check.
pub struct TxCtx<'a> {
    pub state: &'a StateIndex,
    pub mempool: &'a Mempool,
    /// Height the transaction would commit at.
    pub height: u64,
    /// Count funds still pending in the mempool toward the sender's balance.
    pub include_mempool_balance: bool,
    /// `Some` iff validating inside a block; carries the block's own mints.
    pub block_mints: Option<&'a BlockMints>,
}

impl<'a> TxCtx<'a> {
    fn in_block(&self) -> bool {
        self.block_mints.is_some()
    }

    fn spendable(&self, address: &str, token: Option<&str>) -> u64 {
        let base = self.state.balance(address, token);
        if !self.include_mempool_balance {
            return base;
        }
        (base + self.mempool.pending_incoming(address, token))
            .saturating_sub(self.mempool.pending_outgoing(address, token))
    }

    /// Airdrop amount promised for a token by the registry, the mempool, or
    /// the block under validation.
    fn promised_airdrop(&self, token: &str) -> Option<u64> {
        if let Some((airdrop, _)) = self.block_mints.and_then(|m| m.get(token)) {
            return Some(*airdrop);
        }
        if let Some(pending) = self.mempool.pending_mint(token) {
            return pending.mint.as_ref().map(|m| m.airdrop);
        }
        self.state.token(token).map(|info| info.airdrop)
    }
}

/// Validate a single transaction against current state.
pub fn check_tx(ctx: &TxCtx, tx: &Transaction) -> Result<()> {
    if tx.amount == 0 {
        return Err(Error::invalid_tx("amount must be positive"));
    }

    if let Some(unlock) = tx.unlock {
        if unlock <= tx.timestamp {
            return Err(Error::invalid_tx("unlock must be after the transaction timestamp"));
        }
    }

    match &tx.sender {
        Sender::Network => Err(Error::invalid_tx(
            "network sender is only valid as a block reward",
        )),
        Sender::Mint => check_airdrop(ctx, tx),
        Sender::Address(address) => check_spend(ctx, tx, address),
    }
}

/// Validate an airdrop claim (`sender == "mint"`).
fn check_airdrop(ctx: &TxCtx, tx: &Transaction) -> Result<()> {
    if tx.signature != MINT_SENDER {
        return Err(Error::invalid_tx("airdrop signature must be the mint literal"));
    }
    let token = tx
        .token
        .as_deref()
        .ok_or_else(|| Error::invalid_tx("airdrop without a token"))?;
    if tx.unlock.is_some() {
        return Err(Error::invalid_tx("airdrop cannot carry an unlock"));
    }
    if tx.mint.is_some() {
        return Err(Error::invalid_tx("airdrop cannot declare a mint"));
    }
    match ctx.promised_airdrop(token) {
        Some(airdrop) if airdrop == tx.amount => Ok(()),
        Some(_) => Err(Error::invalid_tx("airdrop amount does not match the mint")),
        None => Err(Error::invalid_tx("airdrop references an unknown mint")),
    }
}

/// Validate an address-sender spend (and its mint, if it carries one).
fn check_spend(ctx: &TxCtx, tx: &Transaction, address: &str) -> Result<()> {
    tx.verify_signature()?;

    if tx.nonce <= ctx.state.last_nonce(address) {
        return Err(Error::invalid_tx("nonce not strictly greater"));
    }
    if ctx.state.is_spent(&tx.signature) {
        return Err(Error::invalid_tx("signature already spent"));
    }
    if ctx.spendable(address, tx.token.as_deref()) < tx.amount {
        return Err(Error::invalid_tx("insufficient balance"));
    }

    if let Some(mint) = &tx.mint {
        if tx.receiver != DEV_WALLET {
            return Err(Error::invalid_tx("mint fee must be paid to the dev wallet"));
        }
        if tx.token.is_some() {
            return Err(Error::invalid_tx("mint fee is paid in the native coin"));
        }
        if tx.unlock.is_some() {
            return Err(Error::invalid_tx("mint cannot carry an unlock"));
        }
        let fee = params::mint_fee(ctx.height, ctx.state.minted_count());
        if tx.amount != fee {
            return Err(Error::invalid_tx(format!(
                "mint fee mismatch: expected {fee}, got {}",
                tx.amount
            )));
        }
        if !params::token_name_valid(&mint.token) {
            return Err(Error::invalid_tx("invalid token name"));
        }
        if ctx.state.is_minted(&mint.token) {
            return Err(Error::invalid_tx("token already minted"));
        }
        if !ctx.in_block() && ctx.mempool.pending_mint(&mint.token).is_some() {
            return Err(Error::invalid_tx("token mint already pending"));
        }
        if let Some(reward) = mint.mining_reward {
            if reward == 0 {
                return Err(Error::invalid_tx("mining reward must be positive if present"));
            }
        }
    }

    Ok(())
}

/// Immutable inputs for a block check.
pub struct BlockCtx<'a> {
    pub state: &'a StateIndex,
    pub mempool: &'a Mempool,
    /// Timestamps of the last `TAIL` blocks, ascending.
    pub tail_timestamps: &'a [u64],
    /// Hash of the current chain tip.
    pub last_hash: &'a str,
    /// Height this block would commit at.
    pub height: u64,
}

/// Validate a block against current state. Returns `Ok(())` iff the block
/// may be applied.
pub fn check_block(ctx: &BlockCtx, block: &Block, replay: Replay) -> Result<()> {
    // Difficulty: hash under target, and the declared diff matches the
    // target computed at the predecessor.
    let target = params::target_for_tail(ctx.tail_timestamps);
    if block.hash_value()? > target {
        return Err(Error::invalid_block("hash above target"));
    }
    if block.diff != params::target_hex(&target) {
        return Err(Error::invalid_block("declared diff does not match the tail target"));
    }

    // At most one non-reserved transaction per sender.
    let mut senders = HashSet::new();
    for tx in &block.transactions {
        if let Some(address) = tx.sender.address() {
            if !senders.insert(address) {
                return Err(Error::invalid_block("duplicate sender in block"));
            }
        }
    }

    if !replay.replay {
        let now = now_ms();
        if block.timestamp + BLOCK_TIME_MS < now || block.timestamp > now + FUTURE_DRIFT_MS {
            return Err(Error::invalid_block("timestamp outside the accepted window"));
        }

        // The block must carry at least three quarters of the eligible
        // mempool (the two reward transactions do not count).
        let eligible = ctx.mempool.eligible_before(block.timestamp);
        let carried = block.transactions.len().saturating_sub(2);
        if carried < eligible * 3 / 4 {
            return Err(Error::invalid_block("block leaves too much of the mempool behind"));
        }
    }

    if !replay.skip_pow {
        let recomputed = block.compute_hash()?;
        if recomputed != block.hash {
            return Err(Error::invalid_block("hash does not match the work preimage"));
        }
    }

    if block.prev_hash != ctx.last_hash {
        return Err(Error::invalid_block("prev_hash does not extend the chain tip"));
    }

    block.verify_seal()?;

    // Collect the block's own mints up front; rewards and airdrops may
    // reference them.
    let mut block_mints: BlockMints = HashMap::new();
    for tx in &block.transactions {
        if let Some(mint) = &tx.mint {
            let entry = (mint.airdrop, mint.mining_reward.unwrap_or(0));
            if block_mints.insert(mint.token.clone(), entry).is_some() {
                return Err(Error::invalid_block("duplicate mint in block"));
            }
        }
    }

    check_rewards(ctx, block, &block_mints)?;

    // Per-transaction checks, with airdrop dedup within the block.
    let mut airdropped: HashSet<&str> = HashSet::new();
    let tx_ctx = TxCtx {
        state: ctx.state,
        mempool: ctx.mempool,
        height: ctx.height,
        include_mempool_balance: false,
        block_mints: Some(&block_mints),
    };
    for tx in &block.transactions {
        match &tx.sender {
            Sender::Network => {}
            Sender::Mint => {
                check_tx(&tx_ctx, tx)?;
                let token = tx.token.as_deref().expect("airdrop token checked");
                if !airdropped.insert(token) {
                    return Err(Error::invalid_block("duplicate airdrop for token in block"));
                }
            }
            Sender::Address(_) => {
                check_tx(&tx_ctx, tx)?;
                if !replay.replay
                    && !ctx.mempool.txs().iter().any(|pending| pending.same_identity(tx))
                {
                    return Err(Error::invalid_block("transaction not found in mempool"));
                }
            }
        }
    }

    Ok(())
}

/// Enforce the reward structure: exactly one dev-fee transaction and exactly
/// one mining-reward transaction, both from the network sender.
fn check_rewards(ctx: &BlockCtx, block: &Block, block_mints: &BlockMints) -> Result<()> {
    let full = params::reward(ctx.height);
    let mut dev_fees = 0usize;
    let mut rewards = 0usize;

    for tx in &block.transactions {
        if !matches!(tx.sender, Sender::Network) {
            continue;
        }
        if tx.unlock.is_some() {
            return Err(Error::invalid_block("reward cannot carry an unlock"));
        }
        if tx.mint.is_some() {
            return Err(Error::invalid_block("reward cannot declare a mint"));
        }

        if tx.receiver == DEV_WALLET {
            if tx.token.is_some() {
                return Err(Error::invalid_block("dev fee must be native"));
            }
            if tx.amount != params::dev_cut(full) {
                return Err(Error::invalid_block("dev fee amount mismatch"));
            }
            dev_fees += 1;
        } else {
            match tx.token.as_deref() {
                None => {
                    if tx.amount != params::miner_share(full) {
                        return Err(Error::invalid_block("miner reward amount mismatch"));
                    }
                }
                Some(token) => {
                    let mining_reward = token_mining_reward(ctx, block_mints, token);
                    match mining_reward {
                        Some(reward) if reward > 0 && tx.amount == reward => {}
                        Some(_) => {
                            return Err(Error::invalid_block("token reward amount mismatch"))
                        }
                        None => {
                            return Err(Error::invalid_block("reward for unknown token"))
                        }
                    }
                }
            }
            rewards += 1;
        }
    }

    if dev_fees != 1 {
        return Err(Error::invalid_block("block must carry exactly one dev fee"));
    }
    if rewards != 1 {
        return Err(Error::invalid_block("block must carry exactly one mining reward"));
    }
    Ok(())
}

/// The mining reward of a token known to the registry, the mempool's pending
/// mints, or the block under validation.
fn token_mining_reward(ctx: &BlockCtx, block_mints: &BlockMints, token: &str) -> Option<u64> {
    if let Some(info) = ctx.state.token(token) {
        return Some(info.mining_reward);
    }
    if let Some((_, reward)) = block_mints.get(token) {
        return Some(*reward);
    }
    ctx.mempool
        .pending_mint(token)
        .and_then(|tx| tx.mint.as_ref())
        .map(|mint| mint.mining_reward.unwrap_or(0))
}
