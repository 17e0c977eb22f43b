//! End-to-end encode/decode tests over an in-memory block store, seeded
//! from the scenarios in the ERIS specification.

use std::collections::HashSet;
use std::sync::Arc;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use eris::{
    decode, encode, BlockStore, ConvergenceSecret, Decoder, Encoder, Error, MemoryStore,
    ReadCapability, Reference, BLOCK_SIZE_1K, BLOCK_SIZE_32K,
};

const ZERO_SECRET: ConvergenceSecret = [0u8; 32];

/// Encode `content` and put every emitted block into a fresh memory store.
async fn encode_into_store(
    content: &[u8],
    secret: ConvergenceSecret,
    block_size: usize,
) -> (Arc<MemoryStore>, ReadCapability, Vec<Reference>) {
    let store = Arc::new(MemoryStore::new());
    let mut encoder = Encoder::new(content, secret, block_size).unwrap();
    let mut references = Vec::new();
    while encoder.next() {
        references.push(encoder.reference());
        store
            .put(encoder.reference(), encoder.block())
            .await
            .unwrap();
    }
    assert!(encoder.err().is_none(), "encode failed: {:?}", encoder.err());
    (store, encoder.capability().unwrap(), references)
}

fn pseudorandom(len: usize, seed: u64) -> Vec<u8> {
    let mut content = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut content);
    content
}

#[tokio::test]
async fn empty_content_is_a_single_pad_leaf() {
    let (store, capability, references) = encode_into_store(b"", ZERO_SECRET, BLOCK_SIZE_1K).await;

    assert_eq!(capability.level, 0);
    assert_eq!(references.len(), 1);
    assert_eq!(store.len(), 1);

    let content = decode(store, capability).await.unwrap();
    assert!(content.is_empty());
}

#[tokio::test]
async fn hello_world_fits_one_leaf() {
    let (store, capability, references) =
        encode_into_store(b"Hello world!", ZERO_SECRET, BLOCK_SIZE_1K).await;

    assert_eq!(capability.level, 0);
    assert_eq!(references.len(), 1);

    let urn = capability.urn().unwrap();
    assert_eq!(ReadCapability::from_urn(&urn).unwrap(), capability);

    let content = decode(store, capability).await.unwrap();
    assert_eq!(content, b"Hello world!");
}

#[tokio::test]
async fn constant_content_deduplicates_blocks() {
    // 100 KiB of zeroes at 1 KiB blocks: 100 identical zero leaves plus a
    // pad leaf, folded through seven level-1 nodes (six of them identical)
    // into a level-2 root. 109 tree nodes, but only 5 unique blocks.
    let content = vec![0u8; 100 * 1024];
    let (store, capability, references) =
        encode_into_store(&content, ZERO_SECRET, BLOCK_SIZE_1K).await;

    assert_eq!(capability.level, 2);
    assert_eq!(references.len(), 5);
    assert_eq!(store.len(), 5);

    let decoded = decode(store, capability).await.unwrap();
    assert_eq!(decoded, content);
}

#[tokio::test]
async fn pseudorandom_megabyte_roundtrips_at_32k() {
    let content = pseudorandom(1024 * 1024, 0x5eed);
    let (store, capability, _) = encode_into_store(&content, ZERO_SECRET, BLOCK_SIZE_32K).await;

    // 32 full leaves plus the pad leaf fit one internal node.
    assert_eq!(capability.level, 1);

    let decoded = decode(store, capability).await.unwrap();
    assert_eq!(decoded, content);
}

#[tokio::test]
async fn pseudorandom_megabyte_roundtrips_at_1k() {
    let content = pseudorandom(1024 * 1024, 0x5eed);
    let (store, capability, references) =
        encode_into_store(&content, ZERO_SECRET, BLOCK_SIZE_1K).await;

    // 1025 leaves, then layers of 65, 5 and 1 internal nodes.
    assert_eq!(capability.level, 3);
    assert_eq!(references.len(), 1025 + 65 + 5 + 1);

    let decoded = decode(store, capability).await.unwrap();
    assert_eq!(decoded, content);
}

#[tokio::test]
async fn corrupted_block_fails_with_invalid_block() {
    let content = vec![0u8; 100 * 1024];
    let (store, capability, references) =
        encode_into_store(&content, ZERO_SECRET, BLOCK_SIZE_1K).await;

    // Flip one bit in any non-root block.
    let victim = references
        .iter()
        .find(|reference| **reference != capability.root.reference)
        .copied()
        .unwrap();
    let mut block = store.block(&victim).unwrap();
    block[0] ^= 0x01;
    store.insert(victim, block);

    let mut decoder = Decoder::new(store, capability);
    while decoder.next().await {}
    assert!(matches!(decoder.err(), Some(Error::InvalidBlock)));
}

#[tokio::test]
async fn corrupted_root_key_fails_with_invalid_key() {
    let content = vec![0u8; 100 * 1024];
    let (store, mut capability, _) =
        encode_into_store(&content, ZERO_SECRET, BLOCK_SIZE_1K).await;
    assert!(capability.level > 0);

    capability.root.key.0[0] ^= 0x01;

    let mut decoder = Decoder::new(store, capability);
    assert!(!decoder.next().await);
    assert!(matches!(decoder.err(), Some(Error::InvalidKey)));
}

#[test]
fn encoding_is_convergent() {
    let content = pseudorandom(200 * 1024, 42);

    let (first_blocks, first_capability) =
        encode(&content[..], ZERO_SECRET, BLOCK_SIZE_1K).unwrap();
    let (second_blocks, second_capability) =
        encode(&content[..], ZERO_SECRET, BLOCK_SIZE_1K).unwrap();

    assert_eq!(first_capability, second_capability);
    assert_eq!(first_blocks, second_blocks);

    // A different convergence secret produces a disjoint universe.
    let mut other_secret = ZERO_SECRET;
    other_secret[0] = 1;
    let (_, other_capability) = encode(&content[..], other_secret, BLOCK_SIZE_1K).unwrap();
    assert_ne!(other_capability.root, first_capability.root);
    assert_ne!(other_capability.urn().unwrap(), first_capability.urn().unwrap());
}

#[tokio::test]
async fn emitted_references_are_unique() {
    let content = vec![7u8; 300 * 1024];
    let (_, _, references) = encode_into_store(&content, ZERO_SECRET, BLOCK_SIZE_1K).await;

    let unique: HashSet<Reference> = references.iter().copied().collect();
    assert_eq!(unique.len(), references.len());
}

#[test]
fn every_block_hashes_to_its_reference() {
    let content = pseudorandom(64 * 1024, 7);
    let mut encoder = Encoder::new(&content[..], ZERO_SECRET, BLOCK_SIZE_1K).unwrap();
    while encoder.next() {
        let digest: [u8; 32] = Blake2b::<U32>::digest(encoder.block()).into();
        assert_eq!(Reference(digest), encoder.reference());
    }
    assert!(encoder.err().is_none());
}

#[tokio::test]
async fn block_aligned_content_gets_a_trailing_pad_leaf() {
    // Content of exactly one block still produces a second, all-padding
    // leaf, and therefore an internal node above the two.
    let content = vec![b'a'; BLOCK_SIZE_1K];
    let (store, capability, references) =
        encode_into_store(&content, ZERO_SECRET, BLOCK_SIZE_1K).await;

    assert_eq!(capability.level, 1);
    assert_eq!(references.len(), 3);

    let decoded = decode(store, capability).await.unwrap();
    assert_eq!(decoded, content);
}
