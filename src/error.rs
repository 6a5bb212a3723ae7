//! Error type shared by the listing and text-resource decoders.

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors raised while decoding listings or text resources
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Text resource declares a version other than 1
    #[error("unsupported text resource version: {0}")]
    UnsupportedFormatVersion(i32),

    /// A structure declares more bytes than are available
    #[error("truncated stream reading {what}: needed {needed} bytes, {available} available")]
    TruncatedStream {
        what: &'static str,
        needed: u64,
        available: u64,
    },

    /// A count, offset or size field is negative or out of range
    #[error("invalid {what}: {value}")]
    InvalidField { what: &'static str, value: i128 },

    /// Metadata text record could not be parsed
    #[error("malformed metadata record #{index}: {reason}")]
    MalformedMetadataRecord { index: usize, reason: String },

    /// Inflated output does not match the declared size
    #[error("decompression produced {actual} bytes, expected {expected}")]
    DecompressionFailure { expected: u64, actual: u64 },

    /// The compressed stream itself is corrupt
    #[error("corrupt compressed block: {0}")]
    CorruptBlock(#[source] std::io::Error),

    /// Substitution table header is not a whole number of triples
    #[error("malformed substitution table: {0}")]
    MalformedSubstitutionTable(String),

    /// A line record was never reached by the unpacking cursor
    #[error("line #{index} was never reached in the compressed stream")]
    UnreachedLine { index: usize },

    /// A decode task panicked or was aborted
    #[error("decode task failed: {0}")]
    TaskFailed(String),

    /// The walk was cancelled before this node finished
    #[error("decode cancelled")]
    Cancelled,

    /// IO error (mapping, seeking, reading)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub(crate) fn truncated(what: &'static str, needed: u64, available: u64) -> Self {
        DecodeError::TruncatedStream {
            what,
            needed,
            available,
        }
    }

    pub(crate) fn malformed(index: usize, reason: impl Into<String>) -> Self {
        DecodeError::MalformedMetadataRecord {
            index,
            reason: reason.into(),
        }
    }
}

/// Convert a signed count or offset field into a usable index.
pub(crate) fn non_negative(what: &'static str, value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| DecodeError::InvalidField {
        what,
        value: value.into(),
    })
}

/// Convert a declared byte size into a buffer length.
pub(crate) fn buffer_len(what: &'static str, value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| DecodeError::InvalidField {
        what,
        value: value.into(),
    })
}

/// Check that `data` holds at least `needed` bytes.
pub(crate) fn ensure_len(what: &'static str, data: &[u8], needed: usize) -> Result<()> {
    if data.len() < needed {
        return Err(DecodeError::truncated(
            what,
            needed as u64,
            data.len() as u64,
        ));
    }
    Ok(())
}
