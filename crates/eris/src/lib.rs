//! Encoding for Robust Immutable Storage (ERIS), version 1.0.0:
//!
//! <https://eris.codeberg.page/spec/>
//!
//! ERIS encodes arbitrary content into a set of uniformly sized, encrypted
//! and content-addressed blocks, plus a short read capability that can be
//! written as an URN. The content can be reassembled from the blocks only
//! with that capability. The encoding is defined independently of any
//! storage or transport layer.
//!
//! This crate concerns itself with the encoding and decoding of content;
//! blocks reach and leave it through the [`BlockStore`] seam. A simple
//! in-memory implementation is included, and the `eris-fs` crate stores
//! blocks as files in a directory.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use eris::{decode, BlockStore, Encoder, MemoryStore, BLOCK_SIZE_1K};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), eris::Error> {
//!     let store = Arc::new(MemoryStore::new());
//!     let secret = [0u8; eris::CONVERGENCE_SECRET_SIZE];
//!
//!     let mut encoder = Encoder::new(&b"Hello world!"[..], secret, BLOCK_SIZE_1K)?;
//!     while encoder.next() {
//!         store.put(encoder.reference(), encoder.block()).await?;
//!     }
//!     let capability = encoder.capability().expect("encoding finished");
//!
//!     let content = decode(store, capability).await?;
//!     assert_eq!(content, b"Hello world!");
//!     Ok(())
//! }
//! ```

mod crypto;
mod padding;
mod split;

pub mod decode;
pub mod encode;
pub mod store;
pub mod types;

pub use decode::{decode, Decoder};
pub use encode::{encode, Encoder};
pub use store::{BlockStore, MemoryStore};
pub use types::{
    ConvergenceSecret, Error, Key, ReadCapability, Reference, ReferenceKeyPair, BLOCK_SIZE_1K,
    BLOCK_SIZE_32K, CONVERGENCE_SECRET_SIZE, KEY_SIZE, READ_CAPABILITY_LEN, REFERENCE_SIZE,
};
