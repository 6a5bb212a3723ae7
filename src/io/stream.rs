use std::io::{ErrorKind, Read};

use crate::error::{DecodeError, Result};

/// Fill `buf` from `input`, reporting a short read as a truncated stream.
pub(crate) fn read_exact_or_truncated<R: Read + ?Sized>(
    input: &mut R,
    buf: &mut [u8],
    what: &'static str,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(DecodeError::truncated(
                    what,
                    buf.len() as u64,
                    filled as u64,
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Read exactly `len` bytes into a new buffer.
///
/// `len` usually comes from a header, so the buffer only grows as bytes
/// actually arrive.
pub(crate) fn read_vec<R: Read + ?Sized>(
    input: &mut R,
    len: usize,
    what: &'static str,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    (&mut *input).take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(DecodeError::truncated(
            what,
            len as u64,
            buf.len() as u64,
        ));
    }
    Ok(buf)
}
