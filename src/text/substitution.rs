use std::io::Read;

use crate::error::{DecodeError, Result};
use crate::io::read_vec;

/// Per-block byte expansion table.
///
/// Serialized as an `i32` byte size followed by `{key, left, right}`
/// triples. Every byte starts out expanding to itself; each triple then
/// rebinds `key` to the expansion of `left` followed by that of `right`,
/// as the table stands at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionTable {
    expansions: Vec<Vec<u8>>,
    block_size: usize,
}

impl SubstitutionTable {
    /// Bytes taken by the size prefix
    pub const PREFIX_SIZE: usize = 4;

    pub fn identity() -> Self {
        Self {
            expansions: (0..=255u8).map(|b| vec![b]).collect(),
            block_size: 0,
        }
    }

    pub fn read<R: Read + ?Sized>(input: &mut R) -> Result<Self> {
        let prefix = read_vec(input, Self::PREFIX_SIZE, "substitution table size")?;
        let size = i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);

        let block_size = usize::try_from(size)
            .ok()
            .filter(|n| n % 3 == 0)
            .ok_or_else(|| {
                DecodeError::MalformedSubstitutionTable(format!(
                    "size {size} is not a whole number of triples"
                ))
            })?;

        let triples = read_vec(input, block_size, "substitution table")?;
        let mut table = Self::identity();
        for triple in triples.chunks_exact(3) {
            table.bind(triple[0], triple[1], triple[2]);
        }
        table.block_size = block_size;
        Ok(table)
    }

    /// Rebind `key` to `expand(left) ++ expand(right)`.
    pub fn bind(&mut self, key: u8, left: u8, right: u8) {
        let mut expansion = self.expansions[left as usize].clone();
        expansion.extend_from_slice(&self.expansions[right as usize]);
        self.expansions[key as usize] = expansion;
    }

    /// Declared byte size of the serialized triples
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn expand(&self, byte: u8) -> &[u8] {
        &self.expansions[byte as usize]
    }
}

impl Default for SubstitutionTable {
    fn default() -> Self {
        Self::identity()
    }
}
