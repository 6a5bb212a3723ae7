//! Per-node listing parser.
//!
//! A listing body is laid out as:
//!
//! 1. [`ListingHeader`] (16 bytes)
//! 2. `entry_count` × [`RawEntryRecord`]
//! 3. `block_count` × [`RawBlockRecord`] at `block_table_offset`
//! 4. zlib-compressed metadata blocks at `info_base_offset + block.offset`
//!
//! Each decompressed block holds the text records of consecutive entries,
//! `"<sector>:<uncompressed>:<compressed>:<name>"` with a one byte
//! terminator, followed by a 4-byte trailer. A record's length is only known
//! from where the next record of the same block starts, so entries are
//! walked strictly in record order.

use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use tracing::{debug, trace};

use crate::error::{DecodeError, Result, buffer_len, ensure_len, non_negative};

use super::decoder::CancelFlag;
use super::decompress::BlockDecompressor;
use super::structures::{DirectoryEntry, ListingHeader, RawBlockRecord, RawEntryRecord};
use super::{Accessor, Listing};

/// Bytes after the last record of every metadata block
const BLOCK_TRAILER: usize = 4;

/// Decodes the listing of a single accessor.
#[derive(Debug)]
pub struct ListingParser<'a> {
    decompressor: &'a dyn BlockDecompressor,
    cancel: &'a CancelFlag,
}

impl<'a> ListingParser<'a> {
    pub fn new(decompressor: &'a dyn BlockDecompressor, cancel: &'a CancelFlag) -> Self {
        Self {
            decompressor,
            cancel,
        }
    }

    /// Read and decode the listing `accessor` points at.
    pub fn parse(&self, accessor: &Accessor) -> Result<Listing> {
        let self_entry = accessor.entry();
        let stored = accessor.open_listing()?;

        let body: Cow<'_, [u8]> = if self_entry.is_compressed() {
            trace!(
                name = %self_entry.name,
                compressed = self_entry.compressed_size,
                uncompressed = self_entry.uncompressed_size,
                "inflating listing body"
            );
            let expected = buffer_len("listing size", self_entry.uncompressed_size)?;
            Cow::Owned(self.decompressor.decompress(&stored, expected)?)
        } else {
            Cow::Borrowed(&stored[..])
        };

        let entries = self.parse_body(&body)?;
        debug!(
            name = %self_entry.name,
            level = accessor.level(),
            entries = entries.len(),
            "decoded listing"
        );

        Ok(Listing {
            accessor: accessor.clone(),
            entries,
        })
    }

    /// Decode a (decompressed) listing body into its entries.
    pub fn parse_body(&self, body: &[u8]) -> Result<Vec<DirectoryEntry>> {
        let header = ListingHeader::from_bytes(body)?;
        let entry_count = header.entries()?;
        let block_count = header.blocks()?;

        let records_end = ListingHeader::SIZE + entry_count * RawEntryRecord::SIZE;
        ensure_len("entry records", body, records_end)?;
        let records = body[ListingHeader::SIZE..records_end]
            .chunks_exact(RawEntryRecord::SIZE)
            .map(RawEntryRecord::from_bytes)
            .collect::<Result<Vec<_>>>()?;

        let table_start = header.block_table()?;
        let table_end = table_start + block_count * RawBlockRecord::SIZE;
        ensure_len("block table", body, table_end)?;
        let blocks = body[table_start..table_end]
            .chunks_exact(RawBlockRecord::SIZE)
            .map(RawBlockRecord::from_bytes)
            .collect::<Result<Vec<_>>>()?;

        let info_base = header.info_base()?;
        let mut entries = Vec::with_capacity(entry_count);
        let mut current_block = None;
        let mut block = Vec::new();

        for (index, record) in records.iter().enumerate() {
            self.cancel.check()?;

            if current_block != Some(record.block_number) {
                block = self.inflate_block(body, &blocks, info_base, record.block_number)?;
                current_block = Some(record.block_number);
            }

            // The next record of the same block bounds this one; the last
            // record of a block runs up to the trailer.
            let end = match records.get(index + 1) {
                Some(next) if next.block_number == record.block_number => {
                    next.intra_block_offset as usize
                }
                _ => block.len().checked_sub(BLOCK_TRAILER).ok_or_else(|| {
                    DecodeError::malformed(index, "metadata block shorter than its trailer")
                })?,
            };
            let start = record.intra_block_offset as usize;
            let len = end
                .checked_sub(start)
                .and_then(|n| n.checked_sub(1))
                .ok_or_else(|| {
                    DecodeError::malformed(index, format!("record bounds {start}..{end} are empty"))
                })?;

            let text = block.get(start..start + len).ok_or_else(|| {
                DecodeError::truncated("metadata record", (start + len) as u64, block.len() as u64)
            })?;
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(text);

            let mut entry = parse_record(index, &text)?;
            entry.opaque_a = record.opaque_a;
            entry.opaque_b = record.opaque_b;
            entries.push(entry);
        }

        Ok(entries)
    }

    fn inflate_block(
        &self,
        body: &[u8],
        blocks: &[RawBlockRecord],
        info_base: usize,
        number: u16,
    ) -> Result<Vec<u8>> {
        let block = blocks.get(number as usize).ok_or_else(|| {
            DecodeError::truncated("block table", number as u64 + 1, blocks.len() as u64)
        })?;

        let offset = info_base + non_negative("block offset", block.offset_from_info_base)?;
        let size = non_negative("block size", block.uncompressed_size)?;
        ensure_len("metadata block", body, offset)?;

        trace!(block = number, offset, size, "inflating metadata block");
        self.decompressor.decompress(&body[offset..], size)
    }
}

/// Parse `"<hexSector>:<hexUncompressed>:<hexCompressed>:<name>"`.
///
/// Splits on every `:`, so names containing the delimiter are rejected.
pub fn parse_record(index: usize, text: &str) -> Result<DirectoryEntry> {
    let fields: Vec<&str> = text.split(':').collect();
    if fields.len() != 4 {
        return Err(DecodeError::malformed(
            index,
            format!("expected 4 fields, found {} in {text:?}", fields.len()),
        ));
    }

    let sector = parse_hex(index, "sector", fields[0])?;
    let uncompressed_size = parse_hex(index, "uncompressed size", fields[1])?;
    let compressed_size = parse_hex(index, "compressed size", fields[2])?;

    Ok(DirectoryEntry::new(
        fields[3],
        sector,
        compressed_size,
        uncompressed_size,
    ))
}

fn parse_hex(index: usize, field: &str, value: &str) -> Result<u64> {
    // from_str_radix alone would also accept a leading sign
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::malformed(
            index,
            format!("{field} {value:?} is not hex"),
        ));
    }
    u64::from_str_radix(value, 16)
        .map_err(|e| DecodeError::malformed(index, format!("{field} {value:?}: {e}")))
}
