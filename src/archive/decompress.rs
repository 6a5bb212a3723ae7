use flate2::read::ZlibDecoder;
use std::fmt::Debug;
use std::io::Read;

use crate::error::{DecodeError, Result};

/// Inflates one compressed block into a buffer of known size.
pub trait BlockDecompressor: Send + Sync + Debug {
    /// Decompress `input` and check that exactly `expected` bytes come out.
    ///
    /// `input` may extend past the end of the compressed stream; trailing
    /// bytes are ignored.
    fn decompress(&self, input: &[u8], expected: usize) -> Result<Vec<u8>>;
}

/// zlib-framed deflate, used for listing bodies and metadata blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibDecompressor;

impl BlockDecompressor for ZlibDecompressor {
    fn decompress(&self, input: &[u8], expected: usize) -> Result<Vec<u8>> {
        // The declared size is untrusted; only hint up to a plausible ratio
        let mut out = Vec::with_capacity(expected.min(input.len().saturating_mul(4)));
        // One byte of slack so an oversized stream shows up as a mismatch
        ZlibDecoder::new(input)
            .take((expected as u64).saturating_add(1))
            .read_to_end(&mut out)
            .map_err(DecodeError::CorruptBlock)?;

        if out.len() != expected {
            return Err(DecodeError::DecompressionFailure {
                expected: expected as u64,
                actual: out.len() as u64,
            });
        }
        Ok(out)
    }
}
