//! Cinder Core - fundamental types for the Cinder chain.
//!
//! This crate provides the data model and cryptographic primitives used
//! throughout the system:
//!
//! - [`tx`] - Transactions, senders, and mint descriptions
//! - [`block`] - Proof-of-work blocks and the block builder
//! - [`crypto`] - SHA-256, secp256k1 signatures, Argon2id work hashing
//! - [`params`] - Protocol constants and the difficulty schedule
//!
//! # Example
//!
//! ```rust
//! use cinder_core::{BlockBuilder, KeyPair, Sender, Transaction, params};
//!
//! let key = KeyPair::generate();
//!
//! let mut tx = Transaction {
//!     sender: Sender::Address(String::new()),
//!     receiver: "02aa".into(),
//!     amount: 100,
//!     signature: String::new(),
//!     nonce: 1,
//!     timestamp: cinder_core::now_ms(),
//!     token: None,
//!     unlock: None,
//!     mint: None,
//! };
//! tx.sign(&key);
//! assert!(tx.verify_signature().is_ok());
//!
//! let block = BlockBuilder::new(cinder_core::genesis().hash, params::starting_target())
//!     .transactions(vec![tx])
//!     .mine_and_seal(&key)
//!     .unwrap();
//! assert!(block.verify_seal().is_ok());
//! ```

pub mod block;
pub mod crypto;
pub mod error;
pub mod params;
pub mod tx;

// Re-exports for convenience
pub use block::{genesis, genesis_address, genesis_premine, now_ms, Block, BlockBuilder};
pub use crypto::{pow_digest, pow_hex, sha256, sign_der_hex, verify_der_hex, KeyPair};
pub use error::{Error, Result};
pub use tx::{MintSpec, Sender, Transaction, MINT_SENDER, NETWORK_SENDER};
