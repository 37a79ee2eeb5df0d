//! Chain operations for Cinder.
//!
//! This crate provides chain management without networking:
//! - State index (balances, locks, nonces, spent window, mint registry)
//! - Mempool (pending transactions, per-sender guard, airdrop synthesis)
//! - Validator (pure transaction and block checks)
//! - Chain manager (apply blocks, replay from disk, reorgs)
//! - Post-commit event bus
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Chain                             │
//! │  (height, tip hash, apply/replay/reorg, accessors)      │
//! └─────────────────────────────────────────────────────────┘
//!        │                 │                    │
//!        ▼                 ▼                    ▼
//! ┌─────────────┐  ┌──────────────┐  ┌────────────────────┐
//! │  Validator  │  │   Mempool    │  │     StateIndex     │
//! │ (pure rules)│  │ (pending set)│  │ (derived balances) │
//! └─────────────┘  └──────────────┘  └────────────────────┘
//!        │
//!        ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                  BlockStore (cinder-store)               │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod chain;
mod events;
mod mempool;
mod state;
mod validate;

pub use chain::{Chain, HistoryEntry, SearchHit};
pub use events::{ChainEvent, EventBus};
pub use mempool::Mempool;
pub use state::{LockedEntry, MintInfo, StateIndex};
pub use validate::{check_block, check_tx, BlockCtx, BlockMints, Replay, TxCtx};
