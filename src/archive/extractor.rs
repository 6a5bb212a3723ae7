use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, buffer_len};

use super::decompress::{BlockDecompressor, ZlibDecompressor};
use super::{Accessor, DirectoryEntry};

/// Leaf content extractor
pub struct ArchiveExtractor {
    accessor: Accessor,
    decompressor: Arc<dyn BlockDecompressor>,
}

impl ArchiveExtractor {
    pub fn new(accessor: Accessor) -> Self {
        Self {
            accessor,
            decompressor: Arc::new(ZlibDecompressor),
        }
    }

    /// Extract entry data to memory
    ///
    /// Entries whose stored and uncompressed sizes differ are inflated.
    pub fn extract_to_memory(&self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        let stored = self.accessor.open_binary(entry)?;

        if entry.is_compressed() {
            let expected = buffer_len("entry size", entry.uncompressed_size)?;
            return self.decompressor.decompress(&stored, expected);
        }
        Ok(stored.to_vec())
    }

    /// Extract entry to disk
    pub async fn extract_to_file(&self, entry: &DirectoryEntry, output_path: &Path) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let data = self.extract_to_memory(entry)?;

        let mut file = fs::File::create(output_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        Ok(())
    }

    /// Extract entry to stdout
    pub async fn extract_to_stdout(&self, entry: &DirectoryEntry) -> Result<()> {
        let data = self.extract_to_memory(entry)?;

        let mut stdout = tokio::io::stdout();
        stdout.write_all(&data).await?;
        stdout.flush().await?;

        Ok(())
    }
}
