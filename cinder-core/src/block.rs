//! Blocks.
//!
//! A block's proof-of-work hash and its proposer signature both cover the
//! canonical JSON of the block with `hash` and `signature` set to the empty
//! string. Blocks are chained by `prev_hash` and carry the hex target they
//! claim to have been mined against in `diff`.

use chrono::Utc;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::crypto::{pow_hex, sha256, verify_der_hex, KeyPair};
use crate::error::{Error, Result};
use crate::params::{self, GENESIS_PREV_HASH, STARTING_DIFF};
use crate::tx::{MintSpec, Sender, Transaction, NETWORK_SENDER};

/// Current wall-clock time in milliseconds since epoch.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// A proposer-signed, proof-of-work-sealed batch of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Milliseconds since epoch.
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub prev_hash: String,
    pub nonce: u64,
    /// Proposer's DER-hex signature over the work preimage.
    pub signature: String,
    /// Proposer's hex public key.
    pub proposer: String,
    /// Lowercase hex of the Argon2id digest of the work preimage.
    pub hash: String,
    /// Hex of the difficulty target this block claims to have been mined
    /// against.
    pub diff: String,
}

/// Serialize-only shadow of [`Block`] with `hash` and `signature` blanked.
/// Field order must match `Block` exactly.
#[derive(Serialize)]
struct SignableBlock<'a> {
    timestamp: u64,
    transactions: &'a [Transaction],
    prev_hash: &'a str,
    nonce: u64,
    signature: &'a str,
    proposer: &'a str,
    hash: &'a str,
    diff: &'a str,
}

impl Block {
    /// The canonical JSON bytes of this block with `hash` and `signature`
    /// blanked. This is both the proof-of-work preimage and the proposer's
    /// signing preimage.
    pub fn work_bytes(&self) -> Vec<u8> {
        let signable = SignableBlock {
            timestamp: self.timestamp,
            transactions: &self.transactions,
            prev_hash: &self.prev_hash,
            nonce: self.nonce,
            signature: "",
            proposer: &self.proposer,
            hash: "",
            diff: &self.diff,
        };
        serde_json::to_vec(&signable).expect("block serialization cannot fail")
    }

    /// Recompute the proof-of-work hash over the work preimage.
    pub fn compute_hash(&self) -> Result<String> {
        pow_hex(&self.work_bytes())
    }

    /// SHA-256 of the proposer signing preimage.
    pub fn signing_digest(&self) -> [u8; 32] {
        sha256(&self.work_bytes())
    }

    /// Verify the proposer signature under the `proposer` key.
    pub fn verify_seal(&self) -> Result<()> {
        verify_der_hex(&self.signing_digest(), &self.signature, &self.proposer)
    }

    /// The block hash as a big-endian integer.
    pub fn hash_value(&self) -> Result<U256> {
        U256::from_str_radix(&self.hash, 16)
            .map_err(|_| Error::invalid_block("hash is not valid hex"))
    }

    /// Mint descriptions carried by this block's transactions.
    pub fn mints(&self) -> impl Iterator<Item = &MintSpec> {
        self.transactions.iter().filter_map(|tx| tx.mint.as_ref())
    }
}

/// Builder for mining and sealing blocks. Used by tests and by external
/// block producers embedding the crate.
pub struct BlockBuilder {
    timestamp: u64,
    transactions: Vec<Transaction>,
    prev_hash: String,
    diff: U256,
}

impl BlockBuilder {
    pub fn new(prev_hash: impl Into<String>, diff: U256) -> Self {
        Self {
            timestamp: now_ms(),
            transactions: Vec::new(),
            prev_hash: prev_hash.into(),
            diff,
        }
    }

    /// Override the block timestamp (defaults to now).
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = transactions;
        self
    }

    /// Search nonces until the proof-of-work hash meets the target, then
    /// seal with the proposer key.
    pub fn mine_and_seal(self, key: &KeyPair) -> Result<Block> {
        let mut block = Block {
            timestamp: self.timestamp,
            transactions: self.transactions,
            prev_hash: self.prev_hash,
            nonce: 0,
            signature: String::new(),
            proposer: key.public_hex().to_string(),
            hash: String::new(),
            diff: params::target_hex(&self.diff),
        };

        loop {
            let hash = block.compute_hash()?;
            if params::hash_meets_target(&hash, &self.diff) {
                block.hash = hash;
                break;
            }
            block.nonce += 1;
        }

        block.signature = key.sign(&block.signing_digest());
        Ok(block)
    }
}

/// The built-in genesis block: a fixed-timestamp premine from the network
/// sender. Deterministic across nodes; accepted unconditionally at height 0.
pub fn genesis() -> Block {
    let premine = Transaction {
        sender: Sender::Network,
        receiver: genesis_address().to_string(),
        amount: genesis_premine(),
        signature: NETWORK_SENDER.to_string(),
        nonce: 0,
        timestamp: GENESIS_TIMESTAMP_MS,
        token: None,
        unlock: None,
        mint: None,
    };

    let mut block = Block {
        timestamp: GENESIS_TIMESTAMP_MS,
        transactions: vec![premine],
        prev_hash: GENESIS_PREV_HASH.to_string(),
        nonce: 0,
        signature: NETWORK_SENDER.to_string(),
        proposer: NETWORK_SENDER.to_string(),
        hash: String::new(),
        diff: STARTING_DIFF.to_string(),
    };
    block.hash = block.compute_hash().expect("genesis hash");
    block
}

/// Timestamp of the built-in genesis block.
pub const GENESIS_TIMESTAMP_MS: u64 = 1_735_689_600_000;

/// Recipient of the built-in premine.
pub fn genesis_address() -> &'static str {
    params::DEV_WALLET
}

/// Premine amount in points.
pub fn genesis_premine() -> u64 {
    5_000 * params::COIN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_preimage_blanks_hash_and_signature() {
        let block = genesis();
        let json = String::from_utf8(block.work_bytes()).unwrap();
        assert!(json.contains("\"signature\":\"\""));
        assert!(json.contains("\"hash\":\"\""));
        // Field order per the canonical declaration.
        let ts = json.find("\"timestamp\"").unwrap();
        let txs = json.find("\"transactions\"").unwrap();
        let prev = json.find("\"prev_hash\"").unwrap();
        let diff = json.find("\"diff\"").unwrap();
        assert!(ts < txs && txs < prev && prev < diff);
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let a = genesis();
        let b = genesis();
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash, a.compute_hash().unwrap());
        assert_eq!(a.prev_hash, GENESIS_PREV_HASH);
    }

    #[test]
    fn test_mine_and_seal() {
        let key = KeyPair::generate();
        let target = params::starting_target();
        let block = BlockBuilder::new(genesis().hash, target)
            .timestamp(GENESIS_TIMESTAMP_MS + 60_000)
            .mine_and_seal(&key)
            .unwrap();

        assert_eq!(block.hash, block.compute_hash().unwrap());
        assert!(params::hash_meets_target(&block.hash, &target));
        assert_eq!(block.diff, params::target_hex(&target));
        block.verify_seal().unwrap();
    }

    #[test]
    fn test_tampered_block_fails_seal() {
        let key = KeyPair::generate();
        let mut block = BlockBuilder::new(genesis().hash, params::starting_target())
            .mine_and_seal(&key)
            .unwrap();
        block.timestamp += 1;
        assert!(block.verify_seal().is_err());
        assert_ne!(block.hash, block.compute_hash().unwrap());
    }

    #[test]
    fn test_hash_value_ordering() {
        let block = genesis();
        let value = block.hash_value().unwrap();
        assert!(value <= U256::max_value());
    }
}
