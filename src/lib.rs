//! # arclist
//!
//! Decoder for nested payload/listing archives and their compressed text
//! resources.
//!
//! An archive is a payload file holding named byte ranges plus a listing
//! file describing them. A listing can itself live inside a payload, so an
//! archive forms a tree; this crate walks the whole tree with bounded
//! parallelism, decoding each listing's block-compressed metadata.
//!
//! ## Features
//!
//! - Memory-mapped, bounds-checked byte windows shared across the tree
//! - Block-wise zlib metadata decompression, at most once per block
//! - Concurrent tree walk with per-node failure isolation and cancellation
//! - Leaf extraction with transparent inflate
//! - Text resources with per-block substitution compression, decoded to lines
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use arclist::{Accessor, DecoderConfig, ListingDecoder, NamePrefix, ViewCache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = ViewCache::new();
//!     let root = Accessor::open(&cache, Path::new("data.pak"), Path::new("data.idx"))?;
//!
//!     let config = DecoderConfig {
//!         nested: Some(Arc::new(NamePrefix("sub/".to_string()))),
//!         ..DecoderConfig::default()
//!     };
//!     let report = ListingDecoder::new(config).decode(root).await;
//!
//!     for listing in &report.listings {
//!         println!("{} ({} entries)", listing.name(), listing.entries.len());
//!     }
//!     for failure in &report.failures {
//!         eprintln!("{failure}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod error;
pub mod io;
pub mod text;

pub use archive::{
    Accessor, ArchiveExtractor, CancelFlag, DecoderConfig, DirectoryEntry, Listing, ListingDecoder,
    ListingFailure, ListingKind, NamePrefix, NestedListing, WalkReport,
};
pub use cli::Cli;
pub use error::{DecodeError, Result};
pub use io::{MappedView, ViewCache};
pub use text::{TextHeader, TextResource};
