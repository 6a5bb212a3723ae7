use encoding_rs::WINDOWS_1252;
use std::fmt::Debug;

/// Turns the unpacked bytes of one line into text.
pub trait LineEncoding: Send + Sync + Debug {
    fn decode(&self, bytes: &[u8]) -> String;
}

/// Windows-1252; every byte maps to a character
#[derive(Debug, Clone, Copy, Default)]
pub struct Cp1252;

impl LineEncoding for Cp1252 {
    fn decode(&self, bytes: &[u8]) -> String {
        WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned()
    }
}

/// UTF-8, replacing invalid sequences
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Lossy;

impl LineEncoding for Utf8Lossy {
    fn decode(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
