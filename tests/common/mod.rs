#![allow(dead_code)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

pub const SECTOR: usize = 0x800;

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Text record of one directory entry
pub fn record(sector: u64, uncompressed: u64, compressed: u64, name: &str) -> String {
    format!("{sector:X}:{uncompressed:X}:{compressed:X}:{name}")
}

/// Listing body with one zlib metadata block per inner slice.
pub fn listing_body(blocks: &[Vec<String>]) -> Vec<u8> {
    let mut records = Vec::new();
    let mut packed = Vec::new();
    for (number, texts) in blocks.iter().enumerate() {
        let mut block = Vec::new();
        for text in texts {
            records.push((number as u16, block.len() as u16));
            block.extend_from_slice(text.as_bytes());
            block.push(0);
        }
        block.extend_from_slice(b"end\0");
        packed.push((block.len() as i32, zlib(&block)));
    }

    let table = 16 + records.len() * 10;
    let info_base = table + packed.len() * 8;

    let mut out = Vec::new();
    for v in [
        records.len() as i32,
        packed.len() as i32,
        table as i32,
        info_base as i32,
    ] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for (number, offset) in &records {
        out.extend_from_slice(&number.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    let mut offset = 0i32;
    for (size, data) in &packed {
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        offset += data.len() as i32;
    }
    for (_, data) in &packed {
        out.extend_from_slice(data);
    }
    out
}

/// Payload/listing pair on disk
pub struct Fixture {
    pub dir: TempDir,
    pub payload: PathBuf,
    pub listing: PathBuf,
}

impl Fixture {
    pub fn new(payload: &[u8], listing: &[u8]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let payload_path = dir.path().join("data.pak");
        let listing_path = dir.path().join("data.idx");
        std::fs::write(&payload_path, payload).unwrap();
        std::fs::write(&listing_path, listing).unwrap();
        Self {
            dir,
            payload: payload_path,
            listing: listing_path,
        }
    }
}

/// Payload holding each blob at its own sector, starting at sector 1.
///
/// Returns the payload and each blob's sector.
pub fn sectored_payload(blobs: &[Vec<u8>]) -> (Vec<u8>, Vec<u64>) {
    let mut payload = vec![0u8; SECTOR];
    let mut sectors = Vec::new();
    for blob in blobs {
        sectors.push((payload.len() / SECTOR) as u64);
        payload.extend_from_slice(blob);
        let padded = payload.len().div_ceil(SECTOR) * SECTOR;
        payload.resize(padded, 0);
    }
    (payload, sectors)
}
