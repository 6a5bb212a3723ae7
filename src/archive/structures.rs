use byteorder::{LittleEndian, ReadBytesExt};
use std::cmp::Ordering;
use std::io::Cursor;

use crate::error::{DecodeError, Result, ensure_len, non_negative};
use crate::io::SECTOR_SIZE;

use super::Accessor;

/// Listing body prologue - 16 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingHeader {
    pub entry_count: i32,
    pub block_count: i32,
    /// Offset of the block table, relative to the body start
    pub block_table_offset: i32,
    /// Base that block offsets are relative to
    pub info_base_offset: i32,
}

impl ListingHeader {
    pub const SIZE: usize = 16;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len("listing header", data, Self::SIZE)?;
        let mut cursor = Cursor::new(data);

        Ok(Self {
            entry_count: cursor.read_i32::<LittleEndian>()?,
            block_count: cursor.read_i32::<LittleEndian>()?,
            block_table_offset: cursor.read_i32::<LittleEndian>()?,
            info_base_offset: cursor.read_i32::<LittleEndian>()?,
        })
    }

    pub fn entries(&self) -> Result<usize> {
        non_negative("entry count", self.entry_count)
    }

    pub fn blocks(&self) -> Result<usize> {
        non_negative("block count", self.block_count)
    }

    pub fn block_table(&self) -> Result<usize> {
        non_negative("block table offset", self.block_table_offset)
    }

    pub fn info_base(&self) -> Result<usize> {
        non_negative("info base offset", self.info_base_offset)
    }
}

/// Fixed per-entry record following the header - 10 bytes, packed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntryRecord {
    pub block_number: u16,
    /// Start of this entry's text record inside the decompressed block
    pub intra_block_offset: u16,
    pub opaque_a: u32,
    pub opaque_b: u16,
}

impl RawEntryRecord {
    pub const SIZE: usize = 10;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len("entry record", data, Self::SIZE)?;
        let mut cursor = Cursor::new(data);

        Ok(Self {
            block_number: cursor.read_u16::<LittleEndian>()?,
            intra_block_offset: cursor.read_u16::<LittleEndian>()?,
            opaque_a: cursor.read_u32::<LittleEndian>()?,
            opaque_b: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// Metadata block descriptor - 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBlockRecord {
    pub offset_from_info_base: i32,
    pub uncompressed_size: i32,
}

impl RawBlockRecord {
    pub const SIZE: usize = 8;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len("block record", data, Self::SIZE)?;
        let mut cursor = Cursor::new(data);

        Ok(Self {
            offset_from_info_base: cursor.read_i32::<LittleEndian>()?,
            uncompressed_size: cursor.read_i32::<LittleEndian>()?,
        })
    }
}

/// One decoded directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    /// Position in 2048-byte sectors
    pub sector: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub opaque_a: u32,
    pub opaque_b: u16,
}

impl DirectoryEntry {
    pub fn new(
        name: impl Into<String>,
        sector: u64,
        compressed_size: u64,
        uncompressed_size: u64,
    ) -> Self {
        Self {
            name: name.into(),
            sector,
            compressed_size,
            uncompressed_size,
            opaque_a: 0,
            opaque_b: 0,
        }
    }

    /// Entry spanning a whole, uncompressed file of `len` bytes
    pub fn whole_file(name: impl Into<String>, len: u64) -> Self {
        Self::new(name, 0, len, len)
    }

    /// Byte offset of the entry's content
    ///
    /// Fails with [`DecodeError::InvalidField`] when the sector lies past
    /// the addressable range.
    pub fn offset(&self) -> Result<u64> {
        self.sector
            .checked_mul(SECTOR_SIZE)
            .ok_or(DecodeError::InvalidField {
                what: "sector",
                value: self.sector.into(),
            })
    }

    /// Number of stored bytes
    pub fn size(&self) -> u64 {
        self.compressed_size
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed_size != self.uncompressed_size
    }
}

/// Decoded, ordered directory of one archive node
#[derive(Debug, Clone)]
pub struct Listing {
    pub accessor: Accessor,
    /// Entries in original record order
    pub entries: Vec<DirectoryEntry>,
}

impl Listing {
    pub fn name(&self) -> &str {
        &self.accessor.entry().name
    }

    pub fn kind(&self) -> ListingKind<'_> {
        ListingKind::Archive {
            level: self.accessor.level(),
        }
    }
}

/// Display kind of a decoded node.
///
/// Archive nodes always sort before alternate-format nodes. Archives are
/// ordered by descending nesting level, alternates by ordinal name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind<'a> {
    Archive { level: u32 },
    AlternateFormat { name: &'a str },
}

impl Ord for ListingKind<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Archive { level: a }, Self::Archive { level: b }) => b.cmp(a),
            (Self::AlternateFormat { name: a }, Self::AlternateFormat { name: b }) => {
                a.as_bytes().cmp(b.as_bytes())
            }
            (Self::Archive { .. }, Self::AlternateFormat { .. }) => Ordering::Less,
            (Self::AlternateFormat { .. }, Self::Archive { .. }) => Ordering::Greater,
        }
    }
}

impl PartialOrd for ListingKind<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
