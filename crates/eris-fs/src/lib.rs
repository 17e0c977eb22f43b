//! Filesystem-based ERIS block storage.
//!
//! Stores one file per block in a flat directory, with the file name being
//! the unpadded Base32 encoding of the block reference. This mirrors the
//! layout the ERIS specification suggests for plain-directory stores, so a
//! store directory written by one implementation is readable by another.

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use eris::{BlockStore, Error, Reference, REFERENCE_SIZE};

const BASE32_UNPADDED: base32::Alphabet = base32::Alphabet::RFC4648 { padding: false };

/// Directory-backed block store implementing the [`BlockStore`] seam.
pub struct FsBlockStore {
    base_path: PathBuf,
}

impl FsBlockStore {
    /// Open a block store at the given directory, creating it if needed.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn block_path(&self, reference: &Reference) -> PathBuf {
        self.base_path
            .join(base32::encode(BASE32_UNPADDED, reference.as_bytes()))
    }

    /// Store a block. Returns false without touching the file if the
    /// reference is already present; an existing block is already correct
    /// because blocks are immutable and content-addressed.
    pub fn put_sync(&self, reference: Reference, block: &[u8]) -> Result<bool, Error> {
        let path = self.block_path(&reference);
        if path.exists() {
            return Ok(false);
        }

        // Write atomically using temp file + rename.
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, block)?;
        fs::rename(&temp_path, &path)?;
        Ok(true)
    }

    /// Read the block for `reference` into `buf`, which must be exactly one
    /// block long.
    pub fn get_sync(&self, reference: &Reference, buf: &mut [u8]) -> Result<(), Error> {
        let path = self.block_path(reference);
        let mut file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::MissingBlock(*reference))
            }
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        if len != buf.len() as u64 {
            return Err(Error::InvalidBlockSize {
                got: len as usize,
                want: buf.len(),
            });
        }
        file.read_exact(buf)?;
        Ok(())
    }

    pub fn exists(&self, reference: &Reference) -> bool {
        self.block_path(reference).exists()
    }

    /// Delete the block for `reference`. Returns true if it was present.
    pub fn delete_sync(&self, reference: &Reference) -> Result<bool, Error> {
        match fs::remove_file(self.block_path(reference)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// References of every block in the store. File names that do not
    /// decode to a reference are ignored.
    pub fn list(&self) -> Result<Vec<Reference>, Error> {
        let mut references = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let Some(bytes) = base32::decode(BASE32_UNPADDED, &name) else {
                continue;
            };
            if bytes.len() != REFERENCE_SIZE {
                continue;
            }
            let mut reference = Reference::default();
            reference.0.copy_from_slice(&bytes);
            references.push(reference);
        }
        Ok(references)
    }

    /// Block count and total bytes in the store.
    pub fn stats(&self) -> Result<FsStats, Error> {
        let mut stats = FsStats::default();
        for entry in fs::read_dir(&self.base_path)? {
            let metadata = entry?.metadata()?;
            if metadata.is_file() {
                stats.count += 1;
                stats.total_bytes += metadata.len();
            }
        }
        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsStats {
    pub count: usize,
    pub total_bytes: u64,
}

#[async_trait]
impl BlockStore for FsBlockStore {
    async fn put(&self, reference: Reference, block: &[u8]) -> Result<bool, Error> {
        self.put_sync(reference, block)
    }

    async fn get(&self, reference: &Reference, buf: &mut [u8]) -> Result<(), Error> {
        self.get_sync(reference, buf)
    }

    async fn has(&self, reference: &Reference) -> Result<bool, Error> {
        Ok(self.exists(reference))
    }
}
