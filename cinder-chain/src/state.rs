//! The in-memory state index.
//!
//! Balances, locked balances, nonce high-water marks, the spent-signature
//! window, and the mint registry. Everything here is derived state: replaying
//! every accepted transaction in block order from an empty index yields the
//! same result as incremental application.
//!
//! The index is `Clone` so the chain manager can snapshot it around reorgs.

use std::collections::{HashMap, HashSet, VecDeque};

use cinder_core::params::SIG_CACHE_LIMIT;
use cinder_core::{Sender, Transaction};
use serde::{Deserialize, Serialize};

/// Key of a balance entry: address plus optional token ticker.
pub type BalanceKey = (String, Option<String>);

/// A credited amount the receiver cannot spend yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedEntry {
    pub address: String,
    pub token: Option<String>,
    pub amount: u64,
    pub unlock_at: u64,
}

/// Registry record of a minted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    #[serde(rename = "miningReward")]
    pub mining_reward: u64,
    pub airdrop: u64,
}

impl MintInfo {
    /// A token is minable iff it carries a positive mining reward.
    pub fn is_minable(&self) -> bool {
        self.mining_reward > 0
    }
}

/// Derived chain state, always recomputable from the block store.
#[derive(Debug, Clone, Default)]
pub struct StateIndex {
    balances: HashMap<BalanceKey, u64>,
    locked: Vec<LockedEntry>,
    last_nonce: HashMap<String, u64>,
    spent_order: VecDeque<String>,
    spent: HashSet<String>,
    minted: HashMap<String, MintInfo>,
    minted_order: Vec<String>,
}

impl StateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spendable balance, excluding locked entries. Zero entries are elided.
    pub fn balance(&self, address: &str, token: Option<&str>) -> u64 {
        self.balances
            .get(&(address.to_string(), token.map(str::to_string)))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of locked amounts for an address and token.
    pub fn locked_balance(&self, address: &str, token: Option<&str>) -> u64 {
        let mut bal = 0u64;
        for entry in &self.locked {
            if entry.address == address && entry.token.as_deref() == token {
                bal += entry.amount;
            }
        }
        bal
    }

    /// Highest nonce accepted for an address; 0 if unseen.
    pub fn last_nonce(&self, address: &str) -> u64 {
        self.last_nonce.get(address).copied().unwrap_or(0)
    }

    /// Whether a signature is inside the retained spent window.
    pub fn is_spent(&self, signature: &str) -> bool {
        self.spent.contains(signature)
    }

    /// Registry entry for a token.
    pub fn token(&self, name: &str) -> Option<&MintInfo> {
        self.minted.get(name)
    }

    /// Whether a token has been minted.
    pub fn is_minted(&self, name: &str) -> bool {
        self.minted.contains_key(name)
    }

    /// Number of minted tokens.
    pub fn minted_count(&self) -> usize {
        self.minted_order.len()
    }

    /// Token at a registry index, in mint order.
    pub fn token_at(&self, index: usize) -> Option<(&str, &MintInfo)> {
        let name = self.minted_order.get(index)?;
        self.minted.get(name).map(|info| (name.as_str(), info))
    }

    /// Tokens an address holds a positive spendable balance of.
    pub fn tokens_of(&self, address: &str) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .balances
            .iter()
            .filter(|((addr, token), amount)| addr == address && token.is_some() && **amount > 0)
            .filter_map(|((_, token), _)| token.clone())
            .collect();
        tokens.sort();
        tokens
    }

    /// Move every lock matured at `block_timestamp` into spendable balances.
    pub fn release(&mut self, block_timestamp: u64) {
        let mut kept = Vec::with_capacity(self.locked.len());
        for entry in self.locked.drain(..) {
            if entry.unlock_at <= block_timestamp {
                *self
                    .balances
                    .entry((entry.address, entry.token))
                    .or_insert(0) += entry.amount;
            } else {
                kept.push(entry);
            }
        }
        self.locked = kept;
    }

    /// Apply one accepted transaction at a block timestamp.
    ///
    /// Validation has already happened; this only mutates. Debits saturate
    /// rather than panic so a logic divergence cannot take the node down.
    pub fn apply(&mut self, tx: &Transaction, block_timestamp: u64) {
        if let Sender::Address(sender) = &tx.sender {
            self.debit(sender, tx.token.as_deref(), tx.amount);
            let nonce = self.last_nonce.entry(sender.clone()).or_insert(0);
            if tx.nonce > *nonce {
                *nonce = tx.nonce;
            }
            self.note_spent(&tx.signature);
        }

        match tx.unlock {
            Some(unlock_at) if unlock_at > block_timestamp => {
                self.locked.push(LockedEntry {
                    address: tx.receiver.clone(),
                    token: tx.token.clone(),
                    amount: tx.amount,
                    unlock_at,
                });
            }
            _ => self.credit(&tx.receiver, tx.token.as_deref(), tx.amount),
        }

        if let Some(mint) = &tx.mint {
            self.register_mint(&mint.token, mint.mining_reward.unwrap_or(0), mint.airdrop);
        }
    }

    fn credit(&mut self, address: &str, token: Option<&str>, amount: u64) {
        if amount == 0 {
            return;
        }
        *self
            .balances
            .entry((address.to_string(), token.map(str::to_string)))
            .or_insert(0) += amount;
    }

    fn debit(&mut self, address: &str, token: Option<&str>, amount: u64) {
        let key = (address.to_string(), token.map(str::to_string));
        if let Some(balance) = self.balances.get_mut(&key) {
            debug_assert!(*balance >= amount, "debit past validated balance");
            *balance = balance.saturating_sub(amount);
            if *balance == 0 {
                self.balances.remove(&key);
            }
        } else {
            debug_assert!(amount == 0, "debit from empty balance");
        }
    }

    fn note_spent(&mut self, signature: &str) {
        if !self.spent.insert(signature.to_string()) {
            return;
        }
        self.spent_order.push_back(signature.to_string());
        while self.spent_order.len() > SIG_CACHE_LIMIT {
            if let Some(evicted) = self.spent_order.pop_front() {
                self.spent.remove(&evicted);
            }
        }
    }

    fn register_mint(&mut self, token: &str, mining_reward: u64, airdrop: u64) {
        if self.minted.contains_key(token) {
            return;
        }
        self.minted.insert(
            token.to_string(),
            MintInfo {
                mining_reward,
                airdrop,
            },
        );
        self.minted_order.push(token.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::{MintSpec, NETWORK_SENDER};

    fn network_credit(receiver: &str, amount: u64, token: Option<&str>) -> Transaction {
        Transaction {
            sender: Sender::Network,
            receiver: receiver.to_string(),
            amount,
            signature: NETWORK_SENDER.to_string(),
            nonce: 0,
            timestamp: 1_000,
            token: token.map(str::to_string),
            unlock: None,
            mint: None,
        }
    }

    fn transfer(sender: &str, receiver: &str, amount: u64, nonce: u64, sig: &str) -> Transaction {
        Transaction {
            sender: Sender::Address(sender.to_string()),
            receiver: receiver.to_string(),
            amount,
            signature: sig.to_string(),
            nonce,
            timestamp: 1_000,
            token: None,
            unlock: None,
            mint: None,
        }
    }

    #[test]
    fn test_credit_debit_flow() {
        let mut state = StateIndex::new();
        state.apply(&network_credit("alice", 500, None), 1_000);
        assert_eq!(state.balance("alice", None), 500);

        state.apply(&transfer("alice", "bob", 200, 1, "sig-1"), 1_000);
        assert_eq!(state.balance("alice", None), 300);
        assert_eq!(state.balance("bob", None), 200);
        assert_eq!(state.last_nonce("alice"), 1);
        assert!(state.is_spent("sig-1"));
        assert!(!state.is_spent("sig-2"));
    }

    #[test]
    fn test_zero_balance_entries_elided() {
        let mut state = StateIndex::new();
        state.apply(&network_credit("alice", 100, None), 1_000);
        state.apply(&transfer("alice", "bob", 100, 1, "sig-1"), 1_000);
        assert_eq!(state.balance("alice", None), 0);
        assert!(state.balances.is_empty() || !state.balances.contains_key(&("alice".into(), None)));
    }

    #[test]
    fn test_token_balances_are_separate() {
        let mut state = StateIndex::new();
        state.apply(&network_credit("alice", 100, None), 1_000);
        state.apply(&network_credit("alice", 40, Some("FOO")), 1_000);
        assert_eq!(state.balance("alice", None), 100);
        assert_eq!(state.balance("alice", Some("FOO")), 40);
        assert_eq!(state.tokens_of("alice"), vec!["FOO".to_string()]);
    }

    #[test]
    fn test_locked_credit_and_release() {
        let mut state = StateIndex::new();
        let mut tx = network_credit("alice", 300, None);
        tx.unlock = Some(5_000);

        state.apply(&tx, 1_000);
        assert_eq!(state.balance("alice", None), 0);
        assert_eq!(state.locked_balance("alice", None), 300);

        // Not yet matured.
        state.release(4_999);
        assert_eq!(state.locked_balance("alice", None), 300);

        state.release(5_000);
        assert_eq!(state.locked_balance("alice", None), 0);
        assert_eq!(state.balance("alice", None), 300);
    }

    #[test]
    fn test_unlock_at_or_before_block_credits_directly() {
        let mut state = StateIndex::new();
        let mut tx = network_credit("alice", 300, None);
        tx.unlock = Some(900);
        state.apply(&tx, 1_000);
        assert_eq!(state.balance("alice", None), 300);
        assert_eq!(state.locked_balance("alice", None), 0);
    }

    #[test]
    fn test_locked_balance_sums_multiple_entries() {
        let mut state = StateIndex::new();
        for (amount, unlock) in [(100, 5_000), (250, 6_000)] {
            let mut tx = network_credit("alice", amount, None);
            tx.unlock = Some(unlock);
            state.apply(&tx, 1_000);
        }
        assert_eq!(state.locked_balance("alice", None), 350);
    }

    #[test]
    fn test_spent_window_evicts_fifo() {
        let mut state = StateIndex::new();
        state.apply(&network_credit("alice", u64::MAX / 2, None), 1_000);
        for i in 0..SIG_CACHE_LIMIT + 10 {
            state.apply(
                &transfer("alice", "bob", 1, i as u64 + 1, &format!("sig-{i}")),
                1_000,
            );
        }
        assert!(!state.is_spent("sig-0"));
        assert!(!state.is_spent("sig-9"));
        assert!(state.is_spent("sig-10"));
        assert!(state.is_spent(&format!("sig-{}", SIG_CACHE_LIMIT + 9)));
    }

    #[test]
    fn test_mint_registry_order() {
        let mut state = StateIndex::new();
        for (i, token) in ["FOO", "BAR", "BAZ"].iter().enumerate() {
            let mut tx = transfer("alice", "dev", 1, i as u64 + 1, &format!("m-{i}"));
            tx.mint = Some(MintSpec {
                token: token.to_string(),
                airdrop: 10,
                mining_reward: Some(5),
            });
            // Fund the debit first.
            state.apply(&network_credit("alice", 1, None), 1_000);
            state.apply(&tx, 1_000);
        }
        assert_eq!(state.minted_count(), 3);
        assert_eq!(state.token_at(0).unwrap().0, "FOO");
        assert_eq!(state.token_at(2).unwrap().0, "BAZ");
        assert!(state.token("BAR").unwrap().is_minable());
        assert!(state.token_at(3).is_none());
    }

    #[test]
    fn test_replay_determinism() {
        // Incremental application and replay-from-empty agree.
        let txs = vec![
            network_credit("alice", 1_000, None),
            transfer("alice", "bob", 400, 1, "s1"),
            transfer("bob", "carol", 100, 1, "s2"),
        ];

        let mut incremental = StateIndex::new();
        for tx in &txs {
            incremental.apply(tx, 1_000);
        }

        let mut replayed = StateIndex::new();
        for tx in &txs {
            replayed.apply(tx, 1_000);
        }

        for addr in ["alice", "bob", "carol"] {
            assert_eq!(incremental.balance(addr, None), replayed.balance(addr, None));
            assert_eq!(incremental.last_nonce(addr), replayed.last_nonce(addr));
        }
    }
}
