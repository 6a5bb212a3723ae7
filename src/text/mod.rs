//! Compressed text resources.
//!
//! A text resource is a [`TextHeader`] (prologue, block size table, line
//! directory) followed by a body of substitution-compressed blocks. The
//! [`TextUnpacker`] inflates the body in one pass while working out where
//! each line's bytes landed, then the lines are decoded with a
//! [`LineEncoding`].

mod encoding;
mod header;
mod substitution;
mod unpacker;

pub use encoding::{Cp1252, LineEncoding, Utf8Lossy};
pub use header::{LineRecord, TextHeader};
pub use substitution::SubstitutionTable;
pub use unpacker::{CHUNK_SIZE, TextUnpacker, decode_lines, unpack_lines};

use std::io::Read;

use crate::error::Result;

/// Fully decoded text resource
#[derive(Debug, Clone)]
pub struct TextResource {
    /// Header with every line's unpacked bounds filled in
    pub header: TextHeader,
    /// Decoded lines, index-aligned with `header.lines`
    pub lines: Vec<String>,
}

impl TextResource {
    /// Read a header and treat the rest of `input` as the compressed body.
    pub fn read<R: Read>(mut input: R, encoding: &dyn LineEncoding) -> Result<Self> {
        let mut header = TextHeader::read(&mut input)?;

        let mut body = Vec::new();
        input.read_to_end(&mut body)?;

        let lines = unpack_lines(
            body.as_slice(),
            &mut header.lines,
            body.len() as i64,
            encoding,
        )?;
        Ok(Self { header, lines })
    }
}
