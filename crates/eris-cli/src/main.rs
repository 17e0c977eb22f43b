//! Utility to read and write ERIS-encoded files to/from a store on disk.
//!
//! A store directory contains zero or more files, each a single ERIS block
//! named by the Base32 encoding of the block's reference.
//!
//! Usage:
//!   eris put [--secret <hex>] [--block-size <n>] <store-dir> <file>
//!   eris get [-o <path>] <store-dir> <urn>

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use eris::{
    ConvergenceSecret, Decoder, Encoder, ReadCapability, BLOCK_SIZE_1K, BLOCK_SIZE_32K,
    CONVERGENCE_SECRET_SIZE,
};
use eris_fs::FsBlockStore;

/// Files below this size are stored with 1 KiB blocks to save space.
const SMALL_FILE_THRESHOLD: u64 = 16 * 1024;

#[derive(Parser)]
#[command(name = "eris")]
#[command(about = "Read and write ERIS-encoded files in a block store directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file into the store and print its ERIS URN
    Put {
        /// Store directory
        store_dir: PathBuf,
        /// Input file, or "-" for stdin
        input: String,
        /// Convergence secret as 64 hex characters; the zero secret if omitted
        #[arg(long)]
        secret: Option<String>,
        /// Block size in bytes (1024 or 32768); chosen from the input size if omitted
        #[arg(long)]
        block_size: Option<usize>,
    },
    /// Decode the content behind an ERIS URN from the store
    Get {
        /// Store directory
        store_dir: PathBuf,
        /// The urn:eris: identifier to decode
        urn: String,
        /// Output file; stdout if omitted. An existing file is not overwritten.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Put {
            store_dir,
            input,
            secret,
            block_size,
        } => put(store_dir, &input, secret.as_deref(), block_size),
        Commands::Get {
            store_dir,
            urn,
            output,
        } => get(store_dir, &urn, output).await,
    }
}

fn parse_secret(secret: Option<&str>) -> Result<ConvergenceSecret> {
    let mut out = [0u8; CONVERGENCE_SECRET_SIZE];
    if let Some(secret) = secret {
        let decoded = hex::decode(secret).context("invalid secret hex")?;
        if decoded.len() != CONVERGENCE_SECRET_SIZE {
            bail!(
                "invalid secret: expected {} bytes, got {}",
                CONVERGENCE_SECRET_SIZE,
                decoded.len()
            );
        }
        out.copy_from_slice(&decoded);
    }
    Ok(out)
}

fn put(
    store_dir: PathBuf,
    input: &str,
    secret: Option<&str>,
    block_size: Option<usize>,
) -> Result<()> {
    let secret = parse_secret(secret)?;

    let (source, file_len): (Box<dyn Read>, Option<u64>) = if input == "-" {
        (Box::new(io::stdin()), None)
    } else {
        let file = File::open(input).with_context(|| format!("opening {input}"))?;
        let len = file.metadata().ok().map(|m| m.len());
        (Box::new(file), len)
    };

    let block_size = match block_size {
        Some(size) if size == BLOCK_SIZE_1K || size == BLOCK_SIZE_32K => size,
        Some(size) => bail!("unsupported block size: {size}"),
        None => match file_len {
            Some(len) if len < SMALL_FILE_THRESHOLD => {
                info!("input is smaller than 16KiB, using 1KiB blocks");
                BLOCK_SIZE_1K
            }
            _ => BLOCK_SIZE_32K,
        },
    };

    let store = FsBlockStore::new(&store_dir)
        .with_context(|| format!("opening store {}", store_dir.display()))?;

    let started = Instant::now();
    let mut written = 0u64;
    let mut skipped = 0u64;
    let mut bytes_stored = 0u64;

    let mut encoder = Encoder::new(source, secret, block_size)?;
    while encoder.next() {
        if store.put_sync(encoder.reference(), encoder.block())? {
            written += 1;
            bytes_stored += encoder.block().len() as u64;
        } else {
            skipped += 1;
        }
    }
    if let Some(err) = encoder.err() {
        bail!("encoding failed: {err}");
    }
    let capability = encoder.capability().expect("encoder finished cleanly");

    let elapsed = started.elapsed();
    info!(
        written,
        skipped,
        bytes_stored,
        elapsed = ?elapsed,
        "encoded input"
    );

    println!("{}", capability.urn()?);
    Ok(())
}

async fn get(store_dir: PathBuf, urn: &str, output: Option<PathBuf>) -> Result<()> {
    let capability =
        ReadCapability::from_urn(urn).with_context(|| format!("invalid URN {urn:?}"))?;

    let mut out: Box<dyn Write> = match &output {
        None => Box::new(io::stdout()),
        Some(path) => Box::new(
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .with_context(|| format!("creating {}", path.display()))?,
        ),
    };

    let store = Arc::new(
        FsBlockStore::new(&store_dir)
            .with_context(|| format!("opening store {}", store_dir.display()))?,
    );

    let started = Instant::now();
    let mut bytes_read = 0u64;

    let mut decoder = Decoder::new(store, capability);
    while decoder.next().await {
        out.write_all(decoder.block()).context("writing output")?;
        bytes_read += decoder.block().len() as u64;
    }
    if let Some(err) = decoder.err() {
        bail!("decoding failed: {err}");
    }
    out.flush().context("flushing output")?;

    info!(bytes_read, elapsed = ?started.elapsed(), "decoded content");
    Ok(())
}
