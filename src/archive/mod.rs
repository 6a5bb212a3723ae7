//! Payload/listing archive decoding.
//!
//! An archive is a pair of files: a payload holding named byte ranges, and
//! a listing describing them. Listings may themselves be stored inside a
//! payload, which makes the archive a tree of nodes.
//!
//! ## Architecture
//!
//! - [`accessor`]: [`Accessor`] handles, one per node, sharing file mappings
//! - [`structures`]: fixed binary records and decoded [`Listing`] values
//! - [`decompress`]: [`BlockDecompressor`] seam and the zlib implementation
//! - [`parser`]: decodes the listing of a single node
//! - [`decoder`]: walks the whole tree with bounded parallelism
//! - [`extractor`]: reads leaf content out of a payload
//!
//! ## Limitations
//!
//! - Metadata records are split on every `:`, names containing the
//!   delimiter cannot be decoded
//! - Writing is limited to reopening a listing for rewrite

mod accessor;
mod decoder;
mod decompress;
mod extractor;
mod parser;
mod structures;

pub use accessor::{Accessor, CapacityListing};
pub use decoder::{
    CancelFlag, DecoderConfig, ListingDecoder, ListingFailure, NamePrefix, NestedListing,
    WalkReport,
};
pub use decompress::{BlockDecompressor, ZlibDecompressor};
pub use extractor::ArchiveExtractor;
pub use parser::{ListingParser, parse_record};
pub use structures::*;
