//! Mempool: ordered pending transactions awaiting inclusion.
//!
//! Admission enforces at most one pending transaction per non-reserved
//! sender. Wallets that batch transactions must therefore wait for inclusion
//! before submitting the next one. Reserved-sender entries only appear here
//! through mint-airdrop synthesis or sync staging, never from external
//! callers.

use cinder_core::{Sender, Transaction};

/// Ordered set of pending transactions with a per-sender uniqueness guard.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    txs: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Pending transactions in admission order.
    pub fn txs(&self) -> &[Transaction] {
        &self.txs
    }

    /// Whether an address already has a pending transaction.
    pub fn contains_sender(&self, address: &str) -> bool {
        self.txs
            .iter()
            .any(|tx| tx.sender.address() == Some(address))
    }

    /// The pending mint transaction for a token, if any.
    pub fn pending_mint(&self, token: &str) -> Option<&Transaction> {
        self.txs
            .iter()
            .find(|tx| tx.mint.as_ref().is_some_and(|m| m.token == token))
    }

    /// Number of pending transactions with a timestamp at or before `ts`.
    pub fn eligible_before(&self, ts: u64) -> usize {
        self.txs.iter().filter(|tx| tx.timestamp <= ts).count()
    }

    /// Admit a validated transaction.
    ///
    /// Enforces the per-sender guard and, for mint transactions, appends the
    /// synthesized airdrop. Returns false when the guard rejects.
    pub fn admit(&mut self, tx: Transaction) -> bool {
        if let Some(address) = tx.sender.address() {
            if self.contains_sender(address) {
                return false;
            }
        }
        let airdrop = Transaction::airdrop_for(&tx, tx.timestamp);
        self.txs.push(tx);
        if let Some(airdrop) = airdrop {
            self.txs.push(airdrop);
        }
        true
    }

    /// Stage a transaction without the guard. Used when a sync injects the
    /// contents of a fetched block ahead of applying it.
    pub fn inject(&mut self, tx: Transaction) {
        if matches!(tx.sender, Sender::Network) {
            return;
        }
        if self.txs.iter().any(|pending| pending.same_identity(&tx)) {
            return;
        }
        self.txs.push(tx);
    }

    /// Remove every pending entry matching an included transaction by
    /// identity tuple. Returns the number removed.
    pub fn remove_included(&mut self, included: &[Transaction]) -> usize {
        let before = self.txs.len();
        self.txs
            .retain(|pending| !included.iter().any(|tx| tx.same_identity(pending)));
        before - self.txs.len()
    }

    /// Replace the whole pool (pull-sync adopts the peer's mempool).
    pub fn replace(&mut self, txs: Vec<Transaction>) {
        self.txs = txs;
    }

    pub fn clear(&mut self) {
        self.txs.clear();
    }

    /// Sum of pending amounts flowing into an address for a token.
    pub fn pending_incoming(&self, address: &str, token: Option<&str>) -> u64 {
        self.txs
            .iter()
            .filter(|tx| tx.receiver == address && tx.token.as_deref() == token)
            .map(|tx| tx.amount)
            .sum()
    }

    /// Sum of pending amounts flowing out of an address for a token.
    pub fn pending_outgoing(&self, address: &str, token: Option<&str>) -> u64 {
        self.txs
            .iter()
            .filter(|tx| tx.sender.address() == Some(address) && tx.token.as_deref() == token)
            .map(|tx| tx.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::{params, KeyPair, MintSpec};

    fn signed_transfer(key: &KeyPair, receiver: &str, amount: u64, nonce: u64) -> Transaction {
        let mut tx = Transaction {
            sender: Sender::Address(String::new()),
            receiver: receiver.to_string(),
            amount,
            signature: String::new(),
            nonce,
            timestamp: 1_000,
            token: None,
            unlock: None,
            mint: None,
        };
        tx.sign(key);
        tx
    }

    fn signed_mint(key: &KeyPair, token: &str, airdrop: u64) -> Transaction {
        let mut tx = Transaction {
            sender: Sender::Address(String::new()),
            receiver: params::DEV_WALLET.to_string(),
            amount: params::mint_fee(0, 0),
            signature: String::new(),
            nonce: 1,
            timestamp: 1_000,
            token: None,
            unlock: None,
            mint: Some(MintSpec {
                token: token.to_string(),
                airdrop,
                mining_reward: Some(5),
            }),
        };
        tx.sign(key);
        tx
    }

    #[test]
    fn test_one_pending_per_sender() {
        let key = KeyPair::generate();
        let mut pool = Mempool::new();

        assert!(pool.admit(signed_transfer(&key, "bob", 10, 1)));
        assert!(!pool.admit(signed_transfer(&key, "carol", 20, 2)));
        assert_eq!(pool.len(), 1);

        let other = KeyPair::generate();
        assert!(pool.admit(signed_transfer(&other, "bob", 10, 1)));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_mint_admission_synthesizes_airdrop() {
        let key = KeyPair::generate();
        let mut pool = Mempool::new();

        assert!(pool.admit(signed_mint(&key, "FOO", 1_000)));
        assert_eq!(pool.len(), 2);

        let airdrop = &pool.txs()[1];
        assert_eq!(airdrop.sender, Sender::Mint);
        assert_eq!(airdrop.amount, 1_000);
        assert_eq!(airdrop.token.as_deref(), Some("FOO"));
        assert_eq!(airdrop.receiver, key.public_hex());

        assert!(pool.pending_mint("FOO").is_some());
        assert!(pool.pending_mint("BAR").is_none());
    }

    #[test]
    fn test_zero_airdrop_synthesizes_nothing() {
        let key = KeyPair::generate();
        let mut pool = Mempool::new();
        assert!(pool.admit(signed_mint(&key, "FOO", 0)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove_included_by_identity() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let mut pool = Mempool::new();

        let tx_a = signed_transfer(&a, "bob", 10, 1);
        let tx_b = signed_transfer(&b, "bob", 20, 1);
        pool.admit(tx_a.clone());
        pool.admit(tx_b.clone());

        let removed = pool.remove_included(std::slice::from_ref(&tx_a));
        assert_eq!(removed, 1);
        assert_eq!(pool.len(), 1);
        assert!(pool.txs()[0].same_identity(&tx_b));
    }

    #[test]
    fn test_inject_skips_network_and_duplicates() {
        let key = KeyPair::generate();
        let mut pool = Mempool::new();

        let tx = signed_transfer(&key, "bob", 10, 1);
        pool.inject(tx.clone());
        pool.inject(tx.clone());
        assert_eq!(pool.len(), 1);

        pool.inject(Transaction {
            sender: Sender::Network,
            receiver: "bob".into(),
            amount: 5,
            signature: "network".into(),
            nonce: 0,
            timestamp: 1_000,
            token: None,
            unlock: None,
            mint: None,
        });
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_eligible_before() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let mut pool = Mempool::new();

        let mut early = signed_transfer(&a, "bob", 10, 1);
        early.timestamp = 500;
        early.sign(&a);
        let mut late = signed_transfer(&b, "bob", 10, 1);
        late.timestamp = 2_000;
        late.sign(&b);

        pool.admit(early);
        pool.admit(late);
        assert_eq!(pool.eligible_before(1_000), 1);
        assert_eq!(pool.eligible_before(2_000), 2);
    }

    #[test]
    fn test_pending_flows() {
        let key = KeyPair::generate();
        let mut pool = Mempool::new();
        let tx = signed_transfer(&key, "bob", 30, 1);
        let sender = key.public_hex().to_string();
        pool.admit(tx);

        assert_eq!(pool.pending_incoming("bob", None), 30);
        assert_eq!(pool.pending_outgoing(&sender, None), 30);
        assert_eq!(pool.pending_incoming("bob", Some("FOO")), 0);
    }
}
