//! Directory-of-files block store.
//!
//! Layout: one file per height, named by the decimal height, holding the
//! block's JSON. Writes are synced to disk before the store acknowledges
//! them.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use cinder_core::{Block, Error, Result};

/// Block store backed by a directory of per-height JSON files.
#[derive(Debug)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The root directory of this store.
    pub fn path(&self) -> &std::path::Path {
        &self.dir
    }

    fn file_for(&self, height: u64) -> PathBuf {
        self.dir.join(height.to_string())
    }
}

impl super::BlockStore for DirStore {
    fn put(&self, height: u64, block: &Block) -> Result<()> {
        let path = self.file_for(height);
        let json = serde_json::to_vec(block)?;
        let mut file = File::create(&path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        Ok(())
    }

    fn get(&self, height: u64) -> Result<Option<Block>> {
        let path = self.file_for(height);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let block = serde_json::from_slice(&bytes).map_err(|e| {
            Error::storage(format!("corrupt block file {}: {e}", path.display()))
        })?;
        Ok(Some(block))
    }

    fn height(&self) -> Result<u64> {
        let mut present = std::collections::HashSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(h) = name.parse::<u64>() {
                    present.insert(h);
                }
            }
        }
        let mut height = 0u64;
        while present.contains(&height) {
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
    fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();

        let block = genesis();
        store.put(0, &block).unwrap();

        let loaded = store.get(0).unwrap().unwrap();
        assert_eq!(loaded, block);
        assert!(store.get(1).unwrap().is_none());
    }

    #[test]
    fn test_height_counts_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        assert_eq!(store.height().unwrap(), 0);

        let block = genesis();
        store.put(0, &block).unwrap();
        store.put(1, &block).unwrap();
        assert_eq!(store.height().unwrap(), 2);

        // A gap stops the count.
        store.put(5, &block).unwrap();
        assert_eq!(store.height().unwrap(), 2);
    }

    #[test]
    fn test_put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();

        let mut block = genesis();
        store.put(0, &block).unwrap();
        block.nonce = 99;
        store.put(0, &block).unwrap();

        assert_eq!(store.get(0).unwrap().unwrap().nonce, 99);
        assert_eq!(store.height().unwrap(), 1);
    }

    #[test]
    fn test_reopen_preserves_blocks() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DirStore::open(dir.path()).unwrap();
            store.put(0, &genesis()).unwrap();
        }
        let store = DirStore::open(dir.path()).unwrap();
        assert_eq!(store.height().unwrap(), 1);
        assert_eq!(store.get(0).unwrap().unwrap(), genesis());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("0"), b"not json").unwrap();
        assert!(store.get(0).is_err());
    }

    #[test]
    fn test_tail_slice() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        for h in 0..5 {
            let mut block = genesis();
            block.nonce = h;
            store.put(h, &block).unwrap();
        }

        let tail = store.tail(5, 3).unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].nonce, 2);
        assert_eq!(tail[2].nonce, 4);

        // Asking for more than exists returns everything.
        let tail = store.tail(5, 10).unwrap();
        assert_eq!(tail.len(), 5);
    }
}
