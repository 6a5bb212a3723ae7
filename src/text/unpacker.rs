//! Single-pass text block unpacker.
//!
//! The compressed body is a run of blocks, each a [`SubstitutionTable`]
//! followed by raw bytes. Raw bytes are expanded through the table until the
//! block's output reaches [`CHUNK_SIZE`] bytes, then the next block starts.
//!
//! Line boundaries are recovered on the same pass: a line starts where the
//! cursor's (block, raw offset) equals the line record's
//! (block, packed offset), and ends where the next line starts.

use std::io::Read;
use tracing::trace;

use crate::error::{DecodeError, Result};
use crate::io::read_exact_or_truncated;

use super::encoding::LineEncoding;
use super::header::LineRecord;
use super::substitution::SubstitutionTable;

/// Unpacked bytes produced per block
pub const CHUNK_SIZE: usize = 4096;

/// Inflates a text body and fills in the unpacked bounds of its lines.
#[derive(Debug)]
pub struct TextUnpacker<'a, R> {
    input: R,
    lines: &'a mut [LineRecord],
}

impl<'a, R: Read> TextUnpacker<'a, R> {
    /// `lines` must be sorted by (block, packed offset).
    pub fn new(input: R, lines: &'a mut [LineRecord]) -> Self {
        Self { input, lines }
    }

    /// Inflate `compressed_size` bytes of body and return the unpacked bytes.
    ///
    /// Nothing is read when `compressed_size` is not positive.
    pub fn unpack(&mut self, compressed_size: i64) -> Result<Vec<u8>> {
        let mut unpacked = Vec::new();
        if compressed_size <= 0 {
            return Ok(unpacked);
        }

        let mut remaining = compressed_size;
        let mut block_number = 0usize;
        let mut next = 0usize;

        while remaining > 0 {
            let table = SubstitutionTable::read(&mut self.input)?;
            remaining -= (table.block_size() + SubstitutionTable::PREFIX_SIZE) as i64;

            let mut chunk = Vec::with_capacity(CHUNK_SIZE);
            let mut position = 0usize;
            let mut byte = [0u8; 1];

            while chunk.len() < CHUNK_SIZE && remaining > 0 {
                while let Some(line) = self.lines.get(next) {
                    let at_cursor = line.block as usize == block_number
                        && line.packed_offset as usize == position;
                    if !at_cursor {
                        break;
                    }
                    self.open_line(next, unpacked.len() + chunk.len());
                    next += 1;
                }

                read_exact_or_truncated(&mut self.input, &mut byte, "text block")?;
                chunk.extend_from_slice(table.expand(byte[0]));
                position += 1;
                remaining -= 1;
            }

            trace!(
                block = block_number,
                raw = position,
                unpacked = chunk.len(),
                "unpacked text block"
            );
            unpacked.extend_from_slice(&chunk);
            block_number += 1;
        }

        if let Some(last) = next.checked_sub(1) {
            let start = self.lines[last].unpacked_offset.unwrap_or_default();
            self.lines[last].unpacked_length = Some(unpacked.len() - start);
        }
        if next < self.lines.len() {
            return Err(DecodeError::UnreachedLine { index: next });
        }

        Ok(unpacked)
    }

    /// Record where line `index` starts, which also closes the line before it.
    fn open_line(&mut self, index: usize, offset: usize) {
        self.lines[index].unpacked_offset = Some(offset);
        if let Some(previous) = index.checked_sub(1) {
            let start = self.lines[previous].unpacked_offset.unwrap_or_default();
            self.lines[previous].unpacked_length = Some(offset - start);
        }
    }
}

/// Decode every line's unpacked range, index-aligned with `lines`.
pub fn decode_lines(
    unpacked: &[u8],
    lines: &[LineRecord],
    encoding: &dyn LineEncoding,
) -> Result<Vec<String>> {
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let range = line
                .unpacked_range()
                .ok_or(DecodeError::UnreachedLine { index })?;
            let bytes = unpacked.get(range.clone()).ok_or_else(|| {
                DecodeError::truncated("unpacked line", range.end as u64, unpacked.len() as u64)
            })?;
            Ok(encoding.decode(bytes))
        })
        .collect()
}

/// Unpack a text body and decode its lines in one go.
///
/// Returns no lines at all when `compressed_size` is not positive.
pub fn unpack_lines<R: Read>(
    input: R,
    lines: &mut [LineRecord],
    compressed_size: i64,
    encoding: &dyn LineEncoding,
) -> Result<Vec<String>> {
    if compressed_size <= 0 {
        return Ok(Vec::new());
    }
    let unpacked = TextUnpacker::new(input, lines).unpack(compressed_size)?;
    decode_lines(&unpacked, lines, encoding)
}
