//! Streaming ERIS decoder.
//!
//! The decoder walks the encoded tree depth first, left to right, keeping an
//! explicit stack of pending nodes so that each [`next`](Decoder::next) call
//! does a bounded amount of work: one run of internal-node expansions down
//! to the next leaf.

use std::sync::Arc;

use crate::crypto;
use crate::padding::unpad;
use crate::store::BlockStore;
use crate::types::{
    Error, Key, ReadCapability, Reference, ReferenceKeyPair, REFERENCE_KEY_LEN, REFERENCE_SIZE,
};

/// A pending node of the tree: its reference-key pair and its level.
struct Frame {
    pair: ReferenceKeyPair,
    level: u8,
}

/// A streaming decoder for the content behind a read capability.
///
/// Drive it with [`next`](Decoder::next); each true result makes the next
/// block of the original content observable through
/// [`block`](Decoder::block). Once `next` returns false, check
/// [`err`](Decoder::err) to tell completion from failure.
pub struct Decoder<S> {
    store: Arc<S>,
    capability: ReadCapability,

    /// Nodes not yet visited, topmost is next. Pushed in reverse so that
    /// children pop in left-to-right order.
    stack: Vec<Frame>,

    /// Scratch the store fills with fetched blocks; decryption happens in
    /// place here, and `block` aliases it.
    buf: Vec<u8>,
    block_len: usize,

    /// Root verification and stack setup happen on the first `next` call,
    /// so constructing a decoder performs no fetches.
    started: bool,

    err: Option<Error>,
}

impl<S: BlockStore> Decoder<S> {
    pub fn new(store: Arc<S>, capability: ReadCapability) -> Self {
        Self {
            store,
            capability,
            stack: Vec::new(),
            buf: vec![0; capability.block_size],
            block_len: 0,
            started: false,
            err: None,
        }
    }

    /// Advance to the next block of the original content. Returns false
    /// when the content is exhausted or an error occurred; check
    /// [`err`](Decoder::err). Errors are sticky.
    pub async fn next(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        if !self.started {
            if let Err(err) = self.start().await {
                self.err = Some(err);
                return false;
            }
            self.started = true;
        }

        loop {
            let Some(frame) = self.stack.pop() else {
                // Every node has been visited.
                return false;
            };
            let is_final = self.stack.is_empty();

            if let Err(err) = self.dereference(&frame).await {
                self.err = Some(err);
                return false;
            }

            if frame.level == 0 {
                self.block_len = self.buf.len();
                if is_final {
                    // The last leaf carries the padding.
                    match unpad(&self.buf, self.capability.block_size) {
                        Ok(content) => self.block_len = content.len(),
                        Err(err) => {
                            self.err = Some(err);
                            return false;
                        }
                    }
                    if self.block_len == 0 {
                        // The content was empty; nothing to yield.
                        return false;
                    }
                }
                return true;
            }

            if let Err(err) = self.push_children(frame.level - 1) {
                self.err = Some(err);
                return false;
            }
        }
    }

    /// The current block of original content. Only valid after `next`
    /// returned true, and only until the next call; copy it to retain it.
    pub fn block(&self) -> &[u8] {
        &self.buf[..self.block_len]
    }

    /// The error that ended decoding, if any.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Verify the read capability and seed the stack. For level 0 the root
    /// is the only leaf; for anything deeper, the Verify-Key check compares
    /// the hash of the decrypted root node against the capability's key
    /// before trusting it.
    async fn start(&mut self) -> Result<(), Error> {
        let root = Frame {
            pair: self.capability.root,
            level: self.capability.level,
        };

        if self.capability.level == 0 {
            self.stack.push(root);
            return Ok(());
        }

        self.dereference(&root).await?;
        if crypto::node_key(&self.buf) != self.capability.root.key {
            return Err(Error::InvalidKey);
        }
        self.push_children(self.capability.level - 1)
    }

    /// Fetch the block for `frame` into the scratch buffer, verify that its
    /// contents hash to the reference, and decrypt it in place.
    async fn dereference(&mut self, frame: &Frame) -> Result<(), Error> {
        self.store.get(&frame.pair.reference, &mut self.buf).await?;
        if crypto::block_reference(&self.buf) != frame.pair.reference {
            return Err(Error::InvalidBlock);
        }
        crypto::xor_block(&frame.pair.key, frame.level, &mut self.buf);
        Ok(())
    }

    /// Parse the internal node sitting in the scratch buffer and push its
    /// children, in reverse order, at the given level.
    fn push_children(&mut self, level: u8) -> Result<(), Error> {
        let pairs = parse_internal_node(&self.buf)?;
        if pairs.is_empty() {
            // The encoder never produces a childless internal node; only a
            // hand-crafted capability can lead here.
            return Err(Error::InvalidPadding);
        }
        for pair in pairs.into_iter().rev() {
            self.stack.push(Frame { pair, level });
        }
        Ok(())
    }
}

/// Parse the reference-key pairs out of a plaintext internal node. The pair
/// list ends at the first all-zero reference; every byte after that must be
/// zero.
fn parse_internal_node(node: &[u8]) -> Result<Vec<ReferenceKeyPair>, Error> {
    let mut pairs = Vec::new();
    for at in (0..node.len()).step_by(REFERENCE_KEY_LEN) {
        let mut reference = Reference::default();
        reference.0.copy_from_slice(&node[at..at + REFERENCE_SIZE]);

        if reference.is_zero() {
            if node[at + REFERENCE_SIZE..].iter().any(|&b| b != 0) {
                return Err(Error::InvalidPadding);
            }
            break;
        }

        let mut key = Key::default();
        key.0
            .copy_from_slice(&node[at + REFERENCE_SIZE..at + REFERENCE_KEY_LEN]);
        pairs.push(ReferenceKeyPair { reference, key });
    }
    Ok(pairs)
}

/// Decode the content behind `capability`, fetching blocks from `store`.
pub async fn decode<S: BlockStore>(
    store: Arc<S>,
    capability: ReadCapability,
) -> Result<Vec<u8>, Error> {
    let mut decoder = Decoder::new(store, capability);
    let mut content = Vec::new();
    while decoder.next().await {
        content.extend_from_slice(decoder.block());
    }
    match decoder.err.take() {
        Some(err) => Err(err),
        None => Ok(content),
    }
}
