//! Streaming ERIS encoder.
//!
//! The encoder pulls padded leaf blocks from the splitter, encrypts them
//! into a layer of reference-key pairs, then folds that layer into internal
//! nodes level by level until a single root pair remains. Blocks are
//! deduplicated by reference: a block seen before is not emitted again, but
//! its pair still takes its place in the tree.

use std::collections::HashSet;
use std::io::Read;

use crate::crypto;
use crate::split::Splitter;
use crate::types::{
    block_size_code, ConvergenceSecret, Error, ReadCapability, Reference, ReferenceKeyPair,
    REFERENCE_KEY_LEN, REFERENCE_SIZE,
};

enum State {
    /// Pulling blocks from the splitter and encrypting leaves.
    Leaves,
    /// Folding the accumulated pair list into internal-node layers.
    Folding,
    /// Root established; `next` returns false.
    Done,
}

/// A streaming encoder over a byte source.
///
/// Drive it with [`next`](Encoder::next); each true result makes one newly
/// produced block observable through [`block`](Encoder::block) and
/// [`reference`](Encoder::reference). Once `next` returns false with no
/// error, [`capability`](Encoder::capability) holds the read capability for
/// the encoded content.
pub struct Encoder<R> {
    splitter: Splitter<R>,
    secret: ConvergenceSecret,
    block_size: usize,

    state: State,

    /// Level of the layer currently being produced; leaves are level 0.
    level: u8,

    /// Reference-key pairs accumulated for the layer under construction.
    pairs: Vec<ReferenceKeyPair>,

    /// Plaintext internal nodes of the level being folded, built eagerly,
    /// and the index of the next one to encrypt.
    nodes: Vec<Vec<u8>>,
    next_node: usize,

    /// References of every block emitted so far.
    seen: HashSet<Reference>,

    /// The current encrypted block; valid after `next` returns true, until
    /// the next call.
    block: Vec<u8>,
    reference: Reference,

    err: Option<Error>,
    capability: Option<ReadCapability>,
}

impl<R: Read> Encoder<R> {
    /// Create an encoder reading content from `source`. The block size must
    /// be one of the specification-defined values (1 KiB or 32 KiB). The
    /// convergence secret is not validated; the zero secret is legal.
    pub fn new(
        source: R,
        secret: ConvergenceSecret,
        block_size: usize,
    ) -> Result<Self, Error> {
        if block_size_code(block_size).is_none() {
            return Err(Error::UnsupportedBlockSize(block_size));
        }
        Ok(Self {
            splitter: Splitter::new(source, block_size),
            secret,
            block_size,
            state: State::Leaves,
            level: 0,
            pairs: Vec::new(),
            nodes: Vec::new(),
            next_node: 0,
            seen: HashSet::new(),
            block: vec![0; block_size],
            reference: Reference::default(),
            err: None,
            capability: None,
        })
    }

    /// Advance to the next unique block. Returns false when encoding is
    /// finished or an error occurred; check [`err`](Encoder::err). Errors
    /// are sticky.
    pub fn next(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        loop {
            match self.state {
                State::Leaves => {
                    if !self.splitter.next() {
                        if let Some(e) = self.splitter.take_err() {
                            self.err = Some(Error::Io(e));
                            return false;
                        }
                        // The splitter yields at least one (padded) block
                        // for any source, so the pair list cannot be empty.
                        assert!(!self.pairs.is_empty(), "splitter yielded no blocks");
                        self.state = State::Folding;
                        continue;
                    }

                    // Encrypt the padded leaf in place in our own buffer:
                    // key is the secret-keyed hash of the plaintext, nonce
                    // is all zero, reference is the hash of the ciphertext.
                    self.block.copy_from_slice(self.splitter.block());
                    let key = crypto::leaf_key(&self.block, &self.secret);
                    crypto::xor_block(&key, 0, &mut self.block);
                    let reference = crypto::block_reference(&self.block);

                    self.pairs.push(ReferenceKeyPair { reference, key });
                    if self.seen.insert(reference) {
                        self.reference = reference;
                        return true;
                    }
                    // Duplicate block: not emitted, but its pair still
                    // shapes the tree.
                }
                State::Folding => {
                    if self.next_node == self.nodes.len() {
                        if self.pairs.len() == 1 {
                            self.capability = Some(ReadCapability {
                                block_size: self.block_size,
                                level: self.level,
                                root: self.pairs[0],
                            });
                            self.state = State::Done;
                            return false;
                        }

                        // Start the next level up: lay the current pair
                        // list out as plaintext internal nodes.
                        let Some(level) = self.level.checked_add(1) else {
                            self.err = Some(Error::LevelOverflow);
                            return false;
                        };
                        self.level = level;
                        self.nodes = construct_internal_nodes(&self.pairs, self.block_size);
                        self.next_node = 0;
                        self.pairs.clear();
                        continue;
                    }

                    // Encrypt the next internal node of this level: key is
                    // the unkeyed hash of the plaintext, nonce starts with
                    // the level byte.
                    self.block.copy_from_slice(&self.nodes[self.next_node]);
                    self.next_node += 1;
                    let key = crypto::node_key(&self.block);
                    crypto::xor_block(&key, self.level, &mut self.block);
                    let reference = crypto::block_reference(&self.block);

                    self.pairs.push(ReferenceKeyPair { reference, key });
                    if self.seen.insert(reference) {
                        self.reference = reference;
                        return true;
                    }
                }
                State::Done => return false,
            }
        }
    }

    /// The current encrypted block. Only valid after `next` returned true,
    /// and only until the next call; copy it to retain it.
    pub fn block(&self) -> &[u8] {
        &self.block
    }

    /// The reference of the current block.
    pub fn reference(&self) -> Reference {
        self.reference
    }

    /// The error that ended encoding, if any.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// The read capability for the encoded content. Only present once
    /// `next` has returned false with no error.
    pub fn capability(&self) -> Option<ReadCapability> {
        self.capability
    }

    /// Reset the encoder to encode a new source with the same secret and
    /// block size, reusing its buffers.
    pub fn reset(&mut self, source: R) {
        self.splitter.reset(source);
        self.state = State::Leaves;
        self.level = 0;
        self.pairs.clear();
        self.nodes.clear();
        self.next_node = 0;
        self.seen.clear();
        self.err = None;
        self.capability = None;
    }
}

/// Lay a non-empty pair list out as plaintext internal nodes: up to arity
/// pairs per node in order, each written as reference followed by key, the
/// remainder of each node zero-filled to the block size.
fn construct_internal_nodes(pairs: &[ReferenceKeyPair], block_size: usize) -> Vec<Vec<u8>> {
    debug_assert!(!pairs.is_empty(), "no reference-key pairs");
    let arity = block_size / REFERENCE_KEY_LEN;

    pairs
        .chunks(arity)
        .map(|chunk| {
            let mut node = vec![0u8; block_size];
            for (slot, pair) in chunk.iter().enumerate() {
                let at = slot * REFERENCE_KEY_LEN;
                node[at..at + REFERENCE_SIZE].copy_from_slice(&pair.reference.0);
                node[at + REFERENCE_SIZE..at + REFERENCE_KEY_LEN]
                    .copy_from_slice(&pair.key.0);
            }
            node
        })
        .collect()
}

/// Encode `content` completely, returning every unique block in emission
/// order (leaves left to right, then each internal layer left to right,
/// bottom up) together with the read capability.
pub fn encode<R: Read>(
    content: R,
    secret: ConvergenceSecret,
    block_size: usize,
) -> Result<(Vec<Vec<u8>>, ReadCapability), Error> {
    let mut encoder = Encoder::new(content, secret, block_size)?;
    let mut blocks = Vec::new();
    while encoder.next() {
        blocks.push(encoder.block().to_vec());
    }
    if let Some(err) = encoder.err.take() {
        return Err(err);
    }
    let capability = encoder
        .capability()
        .expect("encoder finished without error or capability");
    Ok((blocks, capability))
}
