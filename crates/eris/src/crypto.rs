//! The two primitives the ERIS construction is built from: Blake2b-256 and
//! the ChaCha20 keystream. Nothing else in the crate touches the primitive
//! APIs directly.

use blake2::digest::consts::U32;
use blake2::digest::Mac;
use blake2::{Blake2b, Blake2bMac, Digest};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;

use crate::types::{ConvergenceSecret, Key, Reference};

type Blake2b256 = Blake2b<U32>;
type Blake2bMac256 = Blake2bMac<U32>;

const NONCE_SIZE: usize = 12;

/// Unkeyed Blake2b-256 of an encrypted block. This is the block's reference.
pub(crate) fn block_reference(block: &[u8]) -> Reference {
    Reference(Blake2b256::digest(block).into())
}

/// Unkeyed Blake2b-256 of a plaintext node. This is the encryption key for
/// internal nodes, and what the Verify-Key check compares against the root
/// key of a read capability.
pub(crate) fn node_key(node: &[u8]) -> Key {
    Key(Blake2b256::digest(node).into())
}

/// Blake2b-256 keyed with the convergence secret, over a plaintext leaf.
/// This is the encryption key for leaf nodes.
pub(crate) fn leaf_key(node: &[u8], secret: &ConvergenceSecret) -> Key {
    let mut mac =
        Blake2bMac256::new_from_slice(secret).expect("convergence secret is a valid hash key");
    mac.update(node);
    Key(mac.finalize().into_bytes().into())
}

/// XOR `buf` with the ChaCha20 keystream for `key` at the given tree level.
/// The nonce is the level byte followed by eleven zero bytes (all twelve
/// zero for leaves), with the initial counter at zero.
pub(crate) fn xor_block(key: &Key, level: u8, buf: &mut [u8]) {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[0] = level;
    let mut cipher = ChaCha20::new(&key.0.into(), &nonce.into());
    cipher.apply_keystream(buf);
}
