//! In-memory block store for tests.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use cinder_core::{Block, Result};

/// Block store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<BTreeMap<u64, Block>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl super::BlockStore for MemoryStore {
    fn put(&self, height: u64, block: &Block) -> Result<()> {
        self.blocks.write().insert(height, block.clone());
        Ok(())
    }

    fn get(&self, height: u64) -> Result<Option<Block>> {
        Ok(self.blocks.read().get(&height).cloned())
    }

    fn height(&self) -> Result<u64> {
        let blocks = self.blocks.read();
        let mut height = 0u64;
        while blocks.contains_key(&height) {
            height += 1;
        }
        Ok(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockStore;
    use cinder_core::genesis;

    #[test]
    fn test_memory_store_contract() {
        let store = MemoryStore::new();
        assert_eq!(store.height().unwrap(), 0);

        let block = genesis();
        store.put(0, &block).unwrap();
        assert_eq!(store.height().unwrap(), 1);
        assert_eq!(store.get(0).unwrap().unwrap(), block);
        assert!(store.get(7).unwrap().is_none());
    }
}
