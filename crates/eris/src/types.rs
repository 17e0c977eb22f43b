//! Core ERIS types: references, keys, read capabilities and their wire forms.

use std::fmt;

/// Size of a block reference.
pub const REFERENCE_SIZE: usize = 32;

/// Size of a block encryption key.
pub const KEY_SIZE: usize = 32;

/// Size of the convergence secret.
pub const CONVERGENCE_SECRET_SIZE: usize = 32;

/// Size of one reference-key pair inside an internal node.
pub(crate) const REFERENCE_KEY_LEN: usize = REFERENCE_SIZE + KEY_SIZE;

/// The small block size defined by the ERIS specification (1 KiB).
pub const BLOCK_SIZE_1K: usize = 1024;

/// The large block size defined by the ERIS specification (32 KiB).
pub const BLOCK_SIZE_32K: usize = 32 * 1024;

/// Size of the binary form of a [`ReadCapability`].
pub const READ_CAPABILITY_LEN: usize = 66;

const URN_PREFIX: &str = "urn:eris:";

const BASE32_UNPADDED: base32::Alphabet = base32::Alphabet::RFC4648 { padding: false };

/// Secret mixed into leaf keys so that equal content converges to equal
/// blocks only for holders of the same secret. The all-zero secret is legal
/// and treated like any other value.
pub type ConvergenceSecret = [u8; CONVERGENCE_SECRET_SIZE];

/// A reference to an encrypted block of data: the unkeyed Blake2b-256 hash
/// of the block's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Reference(pub [u8; REFERENCE_SIZE]);

impl Reference {
    /// An all-zero reference marks an unused slot in an internal node.
    pub(crate) fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; REFERENCE_SIZE] {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference({})", self)
    }
}

/// The ChaCha20 key that decrypts a specific block. Derived from the block's
/// plaintext: keyed with the convergence secret for leaves, unkeyed for
/// internal nodes.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Key(pub [u8; KEY_SIZE]);

impl Key {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

/// A block reference paired with the key required to decrypt the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReferenceKeyPair {
    pub reference: Reference,
    pub key: Key,
}

/// All the information required to read content that has been split and
/// encrypted per the ERIS specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCapability {
    /// Size of the blocks the content has been split into.
    pub block_size: usize,
    /// Level of the root node: 0 when the content fit a single leaf.
    pub level: u8,
    /// Reference-key pair for the root node of the tree.
    pub root: ReferenceKeyPair,
}

impl ReadCapability {
    /// Binary form, per section 2.6 of the ERIS specification: the log2 of
    /// the block size, the level, then the root reference and key.
    pub fn to_bytes(&self) -> Result<[u8; READ_CAPABILITY_LEN], Error> {
        let mut out = [0u8; READ_CAPABILITY_LEN];
        out[0] = block_size_code(self.block_size)
            .ok_or(Error::UnsupportedBlockSize(self.block_size))?;
        out[1] = self.level;
        out[2..34].copy_from_slice(&self.root.reference.0);
        out[34..66].copy_from_slice(&self.root.key.0);
        Ok(out)
    }

    /// Parse the binary form. Trailing bytes after the first 66 are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() < READ_CAPABILITY_LEN {
            return Err(Error::CapabilityTooShort(data.len()));
        }

        // The first byte is the block size as a power of two, constrained to
        // the specification-defined values.
        let block_size = match data[0] {
            0x0a => BLOCK_SIZE_1K,
            0x0f => BLOCK_SIZE_32K,
            code => return Err(Error::UnsupportedBlockSizeCode(code)),
        };

        let mut root = ReferenceKeyPair::default();
        root.reference.0.copy_from_slice(&data[2..34]);
        root.key.0.copy_from_slice(&data[34..66]);

        Ok(Self {
            block_size,
            level: data[1],
            root,
        })
    }

    /// URN form, per section 2.7 of the ERIS specification: the literal
    /// prefix `urn:eris:` followed by the unpadded Base32 encoding of the
    /// binary form.
    pub fn urn(&self) -> Result<String, Error> {
        let data = self.to_bytes()?;
        Ok(format!("{URN_PREFIX}{}", base32::encode(BASE32_UNPADDED, &data)))
    }

    /// Parse the URN form.
    pub fn from_urn(urn: &str) -> Result<Self, Error> {
        let Some(encoded) = urn.strip_prefix(URN_PREFIX) else {
            return Err(Error::InvalidUrn("missing urn:eris: prefix"));
        };
        let data = base32::decode(BASE32_UNPADDED, encoded)
            .ok_or(Error::InvalidUrn("invalid base32"))?;
        Self::from_bytes(&data)
    }
}

/// The block-size byte of the capability wire form, or `None` for sizes the
/// specification does not define a code for.
pub(crate) fn block_size_code(block_size: usize) -> Option<u8> {
    match block_size {
        BLOCK_SIZE_1K => Some(0x0a),
        BLOCK_SIZE_32K => Some(0x0f),
        _ => None,
    }
}

/// Errors produced while encoding, decoding or (un)marshaling capabilities.
///
/// Errors are sticky on the iterator that encountered them: once an encoder
/// or decoder reports an error it yields no further blocks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A fetched block's length does not match the capability's block size.
    #[error("invalid block size: got {got} bytes, want {want}")]
    InvalidBlockSize { got: usize, want: usize },
    /// A fetched block's contents do not hash to the requested reference.
    #[error("invalid block: contents do not match the reference")]
    InvalidBlock,
    /// Leaf unpadding rules were violated, or an internal node carries
    /// non-zero bytes after its terminating zero reference.
    #[error("invalid padding")]
    InvalidPadding,
    /// The decrypted root node does not hash to the capability's root key.
    #[error("key in read capability is invalid")]
    InvalidKey,
    /// A block size outside the specification-defined set.
    #[error("unsupported block size: {0}")]
    UnsupportedBlockSize(usize),
    /// A block-size byte in a capability's wire form that the specification
    /// does not define.
    #[error("unsupported block size code: {0:#04x}")]
    UnsupportedBlockSizeCode(u8),
    /// A capability wire form shorter than 66 bytes.
    #[error("read capability too short: {0} bytes")]
    CapabilityTooShort(usize),
    #[error("invalid read capability URN: {0}")]
    InvalidUrn(&'static str),
    /// The tree grew past 255 levels.
    #[error("tree level exceeds 255")]
    LevelOverflow,
    /// A reference the block store does not hold.
    #[error("block {0} not found")]
    MissingBlock(Reference),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
