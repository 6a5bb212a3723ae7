use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{DecodeError, Result, buffer_len};

/// Archive sector size. Listings may only grow in whole sectors.
pub const SECTOR_SIZE: u64 = 0x800;

/// Capacity reserved for a listing of `size` bytes that may grow in place.
///
/// Always leaves room for at least one more sector, even when `size` is
/// already sector aligned.
pub fn round_capacity(size: u64) -> u64 {
    (size / SECTOR_SIZE + 1).saturating_mul(SECTOR_SIZE)
}

/// Read-only mapping of a single file.
///
/// The mapping itself is swapped out only by the rewrite paths
/// ([`recreate`](Self::recreate), [`growable_view`](Self::growable_view)).
/// Views that were handed out before a swap keep the old mapping alive.
#[derive(Debug)]
pub struct MappedView {
    path: PathBuf,
    map: RwLock<Arc<Mmap>>,
}

impl MappedView {
    /// Map the file at `path` read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let map = map_file(&file)?;
        Ok(Self {
            path: path.to_path_buf(),
            map: RwLock::new(Arc::new(map)),
        })
    }

    /// Path this view was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the mapping in bytes
    pub fn len(&self) -> u64 {
        self.current().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow `size` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TruncatedStream`] when the range extends past
    /// the end of the mapping.
    pub fn view(&self, offset: u64, size: u64) -> Result<ByteView> {
        let map = self.current();
        let available = map.len() as u64;
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= available)
            .ok_or_else(|| {
                DecodeError::truncated("mapped view", offset.saturating_add(size), available)
            })?;

        Ok(ByteView {
            map,
            start: offset as usize,
            end: end as usize,
        })
    }

    /// Writable window of at least `size` bytes at `offset`, rounded up with
    /// [`round_capacity`]. The file is extended when the window reaches past
    /// its end.
    ///
    /// Callers must make sure no other reader is using this file while the
    /// window is alive.
    pub fn growable_view(&self, offset: u64, size: u64) -> Result<GrowableView> {
        let capacity = round_capacity(size);
        let end = offset
            .checked_add(capacity)
            .ok_or_else(|| DecodeError::truncated("growable view", u64::MAX, self.len()))?;
        let len = buffer_len("growable view size", capacity)?;
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;

        if file.metadata()?.len() < end {
            file.set_len(end)?;
        }

        // Safety: the file is opened by us and callers guarantee exclusive use
        // for the lifetime of the window.
        #[allow(unsafe_code)]
        let map = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(len)
                .map_mut(&file)?
        };

        self.replace(map_file(&file)?);
        Ok(GrowableView { map, position: 0 })
    }

    /// Truncate the backing file to zero bytes and return it open for writing.
    pub fn recreate(&self) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;

        self.replace(map_file(&file)?);
        Ok(file)
    }

    fn current(&self) -> Arc<Mmap> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, map: Mmap) {
        *self.map.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(map);
    }
}

fn map_file(file: &File) -> Result<Mmap> {
    // Safety: archive files are static inputs; the only writers are the
    // rewrite paths above, which callers serialize against readers.
    #[allow(unsafe_code)]
    let map = unsafe { Mmap::map(file)? };
    Ok(map)
}

/// Bytes borrowed from a [`MappedView`].
///
/// Holds its own reference to the mapping, so it stays valid even if the
/// view is remapped afterwards.
#[derive(Debug, Clone)]
pub struct ByteView {
    map: Arc<Mmap>,
    start: usize,
    end: usize,
}

impl Deref for ByteView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map[self.start..self.end]
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

/// Writable, fixed-capacity window over part of a file.
#[derive(Debug)]
pub struct GrowableView {
    map: MmapMut,
    position: usize,
}

impl GrowableView {
    /// Total bytes the window can hold
    pub fn capacity(&self) -> usize {
        self.map.len()
    }
}

impl Deref for GrowableView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

impl DerefMut for GrowableView {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

impl Write for GrowableView {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.map.len().saturating_sub(self.position);
        let n = buf.len().min(room);
        if n == 0 && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "listing capacity exhausted",
            ));
        }
        self.map[self.position..self.position + n].copy_from_slice(&buf[..n]);
        self.position += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.map.flush()
    }
}

impl Seek for GrowableView {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(n) => (self.map.len() as u64).checked_add_signed(n),
            SeekFrom::Current(n) => (self.position as u64).checked_add_signed(n),
        };
        match target {
            Some(n) if n <= self.map.len() as u64 => {
                self.position = n as usize;
                Ok(n)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek outside listing capacity",
            )),
        }
    }
}
