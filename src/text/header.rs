use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::{DecodeError, Result, non_negative};
use crate::io::read_vec;

/// Directory record of one text line - 4 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRecord {
    /// Text block the line starts in
    pub block: u8,
    pub block_offset_tag: u8,
    /// Raw-byte offset of the line inside its block's compressed stream
    pub packed_offset: u16,
    /// Set by the unpacker
    pub unpacked_offset: Option<usize>,
    /// Set by the unpacker once the next line (or end of stream) is reached
    pub unpacked_length: Option<usize>,
}

impl LineRecord {
    pub const SIZE: usize = 4;

    pub fn new(block: u8, packed_offset: u16) -> Self {
        Self {
            block,
            block_offset_tag: 0,
            packed_offset,
            unpacked_offset: None,
            unpacked_length: None,
        }
    }

    pub fn from_bytes(data: &[u8; Self::SIZE]) -> Self {
        Self {
            block: data[0],
            block_offset_tag: data[1],
            packed_offset: u16::from_le_bytes([data[2], data[3]]),
            unpacked_offset: None,
            unpacked_length: None,
        }
    }

    /// Unpacked byte range, once both bounds are known
    pub fn unpacked_range(&self) -> Option<std::ops::Range<usize>> {
        let start = self.unpacked_offset?;
        Some(start..start + self.unpacked_length?)
    }
}

/// Text resource prologue and line directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextHeader {
    pub version: i32,
    pub line_count: i32,
    pub keys_unpacked_size: i32,
    pub block_count: i32,
    pub block_sizes: Vec<i32>,
    pub lines: Vec<LineRecord>,
}

impl TextHeader {
    pub const PROLOGUE_SIZE: usize = 16;
    pub const VERSION: i32 = 1;

    /// Read the prologue, block size table and line directory.
    ///
    /// # Errors
    ///
    /// [`DecodeError::UnsupportedFormatVersion`] unless the version is 1,
    /// [`DecodeError::TruncatedStream`] when any table is cut short.
    pub fn read<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let prologue = read_vec(input, Self::PROLOGUE_SIZE, "text header")?;
        let mut cursor = Cursor::new(prologue);

        let version = cursor.read_i32::<LittleEndian>()?;
        let line_count = cursor.read_i32::<LittleEndian>()?;
        let keys_unpacked_size = cursor.read_i32::<LittleEndian>()?;
        let block_count = cursor.read_i32::<LittleEndian>()?;

        if version != Self::VERSION {
            return Err(DecodeError::UnsupportedFormatVersion(version));
        }

        let blocks = non_negative("text block count", block_count)?;
        let table = read_vec(input, blocks.saturating_mul(4), "text block table")?;
        let block_sizes = table
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let count = non_negative("text line count", line_count)?;
        let directory = read_vec(
            input,
            count.saturating_mul(LineRecord::SIZE),
            "line directory",
        )?;
        let lines = directory
            .chunks_exact(LineRecord::SIZE)
            .map(|b| LineRecord::from_bytes(&[b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            version,
            line_count,
            keys_unpacked_size,
            block_count,
            block_sizes,
            lines,
        })
    }

    /// Bytes occupied by the header in the stream
    pub fn encoded_len(&self) -> usize {
        Self::PROLOGUE_SIZE + self.block_sizes.len() * 4 + self.lines.len() * LineRecord::SIZE
    }
}
