//! Shared read-only access to memory-mapped files.
//!
//! A [`MappedView`] wraps one mapping of one file. Views are handed out as
//! `Arc<MappedView>` and shared between every accessor that reads the same
//! file; the [`ViewCache`] makes sure a normalized path is mapped only once.

mod cache;
mod mapped;
mod stream;

pub use cache::ViewCache;
pub use mapped::{ByteView, GrowableView, MappedView, SECTOR_SIZE, round_capacity};
pub(crate) use stream::{read_exact_or_truncated, read_vec};
