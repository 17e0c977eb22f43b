//! The block-storage seam between the codec and its callers.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::types::{Error, Reference};

/// Maps references to encrypted blocks. This is the only interface through
/// which the decoder touches the outside world; how blocks are actually
/// kept (a directory of files, a key-value store, a network) is up to the
/// implementation.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store a block under its reference. Returns true if newly stored,
    /// false if the reference was already present; blocks are immutable and
    /// content-addressed, so an existing entry is already correct.
    async fn put(&self, reference: Reference, block: &[u8]) -> Result<bool, Error>;

    /// Fill `buf` with the block for `reference`. The buffer is always
    /// exactly one block; implementations must report a stored block of any
    /// other length as [`Error::InvalidBlockSize`] and an unknown reference
    /// as [`Error::MissingBlock`].
    async fn get(&self, reference: &Reference, buf: &mut [u8]) -> Result<(), Error>;

    /// Whether the store holds a block for `reference`.
    async fn has(&self, reference: &Reference) -> Result<bool, Error>;
}

/// In-memory block store, for tests and small tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<HashMap<Reference, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes stored.
    pub fn total_bytes(&self) -> usize {
        self.blocks.read().unwrap().values().map(|b| b.len()).sum()
    }

    /// References of every stored block, in no particular order.
    pub fn keys(&self) -> Vec<Reference> {
        self.blocks.read().unwrap().keys().copied().collect()
    }

    /// Store a block under `reference` unconditionally, replacing any
    /// existing entry. Unlike [`BlockStore::put`] this does not treat the
    /// store as content-addressed; it exists so tests can plant blocks that
    /// do not hash to their reference.
    pub fn insert(&self, reference: Reference, block: Vec<u8>) {
        self.blocks.write().unwrap().insert(reference, block);
    }

    /// Remove the block for `reference`. Returns true if it was present.
    pub fn remove(&self, reference: &Reference) -> bool {
        self.blocks.write().unwrap().remove(reference).is_some()
    }

    /// A copy of the block for `reference`, if present.
    pub fn block(&self, reference: &Reference) -> Option<Vec<u8>> {
        self.blocks.read().unwrap().get(reference).cloned()
    }

    pub fn clear(&self) {
        self.blocks.write().unwrap().clear();
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn put(&self, reference: Reference, block: &[u8]) -> Result<bool, Error> {
        let mut blocks = self.blocks.write().unwrap();
        if blocks.contains_key(&reference) {
            return Ok(false);
        }
        blocks.insert(reference, block.to_vec());
        Ok(true)
    }

    async fn get(&self, reference: &Reference, buf: &mut [u8]) -> Result<(), Error> {
        let blocks = self.blocks.read().unwrap();
        let block = blocks
            .get(reference)
            .ok_or(Error::MissingBlock(*reference))?;
        if block.len() != buf.len() {
            return Err(Error::InvalidBlockSize {
                got: block.len(),
                want: buf.len(),
            });
        }
        buf.copy_from_slice(block);
        Ok(())
    }

    async fn has(&self, reference: &Reference) -> Result<bool, Error> {
        Ok(self.blocks.read().unwrap().contains_key(reference))
    }
}
