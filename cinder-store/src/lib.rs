//! Block persistence for Cinder.
//!
//! The chain is stored as one JSON document per height. The [`BlockStore`]
//! trait keeps the backend swappable; [`DirStore`] is the production
//! directory-of-files backend, [`MemoryStore`] backs tests.

mod dir;
mod memory;

pub use dir::DirStore;
pub use memory::MemoryStore;

use cinder_core::{Block, Result};

/// Durable, random-access block persistence keyed by height.
///
/// Heights are contiguous from zero; `put` at an existing height overwrites
/// (reorgs rewrite the orphaned tail in place).
pub trait BlockStore: Send + Sync {
    /// Persist a block at a height. The write is durable before this
    /// returns.
    fn put(&self, height: u64, block: &Block) -> Result<()>;

    /// Read the block at a height.
    fn get(&self, height: u64) -> Result<Option<Block>>;

    /// Number of contiguous blocks stored from height zero.
    fn height(&self) -> Result<u64>;

    /// Read the last `k` blocks below `upto` in ascending height order.
    fn tail(&self, upto: u64, k: usize) -> Result<Vec<Block>> {
        let start = upto.saturating_sub(k as u64);
        let mut blocks = Vec::with_capacity((upto - start) as usize);
        for h in start..upto {
            match self.get(h)? {
                Some(block) => blocks.push(block),
                None => return Err(cinder_core::Error::storage(format!("missing block {h}"))),
            }
        }
        Ok(blocks)
    }
}
