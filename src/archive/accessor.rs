use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::io::{ByteView, GrowableView, MappedView, ViewCache};

use super::DirectoryEntry;

/// Handle on one archive node.
///
/// Combines the payload and listing mappings with the directory entry that
/// locates this node's listing inside the listing mapping. Accessors are
/// cheap to clone; all mappings are shared.
#[derive(Debug, Clone)]
pub struct Accessor {
    cache: Arc<ViewCache>,
    payload: Arc<MappedView>,
    listing: Arc<MappedView>,
    entry: DirectoryEntry,
    level: u32,
}

impl Accessor {
    /// Root accessor over a payload/listing file pair.
    ///
    /// The self entry spans the whole listing file.
    pub fn open(cache: &Arc<ViewCache>, payload: &Path, listing: &Path) -> Result<Self> {
        let payload = cache.open(payload)?;
        let listing = cache.open(listing)?;

        let name = listing
            .path()
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry = DirectoryEntry::whole_file(name, listing.len());

        Ok(Self {
            cache: cache.clone(),
            payload,
            listing,
            entry,
            level: 0,
        })
    }

    /// Child node whose listing is stored in this node's payload, and whose
    /// entries point back into the same payload.
    pub fn derive_child(&self, entry: DirectoryEntry) -> Self {
        Self {
            cache: self.cache.clone(),
            payload: self.payload.clone(),
            listing: self.payload.clone(),
            entry,
            level: self.level + 1,
        }
    }

    /// Child node whose listing is stored in this node's payload, but whose
    /// entries point into a separate payload file.
    pub fn derive_child_with_payload(
        &self,
        payload: &Path,
        entry: DirectoryEntry,
    ) -> Result<Self> {
        Ok(Self {
            cache: self.cache.clone(),
            payload: self.cache.open(payload)?,
            listing: self.payload.clone(),
            entry,
            level: self.level + 1,
        })
    }

    /// Directory entry locating this node's listing
    pub fn entry(&self) -> &DirectoryEntry {
        &self.entry
    }

    /// Number of derivation steps from the root accessor
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn payload(&self) -> &Arc<MappedView> {
        &self.payload
    }

    pub fn listing(&self) -> &Arc<MappedView> {
        &self.listing
    }

    /// Stored bytes of this node's listing
    pub fn open_listing(&self) -> Result<ByteView> {
        self.listing.view(self.entry.offset()?, self.entry.size())
    }

    /// Writable target for a rewritten listing.
    ///
    /// The root listing file is truncated and rewritten from scratch; nested
    /// listings get a window over their current range, extended to the next
    /// sector boundary so the listing may grow in place.
    pub fn open_capacity_listing(&self) -> Result<CapacityListing> {
        if self.level == 0 {
            return Ok(CapacityListing::Recreated(self.listing.recreate()?));
        }

        let window = self
            .listing
            .growable_view(self.entry.offset()?, self.entry.size())?;
        Ok(CapacityListing::Window(window))
    }

    /// Raw stored content of `entry` in this node's payload
    pub fn open_binary(&self, entry: &DirectoryEntry) -> Result<ByteView> {
        self.payload.view(entry.offset()?, entry.size())
    }
}

/// Write target returned by [`Accessor::open_capacity_listing`]
#[derive(Debug)]
pub enum CapacityListing {
    /// Root listing file, truncated to zero length
    Recreated(File),
    /// Fixed window over a nested listing's sectors
    Window(GrowableView),
}

impl Write for CapacityListing {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CapacityListing::Recreated(file) => file.write(buf),
            CapacityListing::Window(window) => window.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CapacityListing::Recreated(file) => file.flush(),
            CapacityListing::Window(window) => window.flush(),
        }
    }
}

impl Seek for CapacityListing {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            CapacityListing::Recreated(file) => file.seek(pos),
            CapacityListing::Window(window) => window.seek(pos),
        }
    }
}
