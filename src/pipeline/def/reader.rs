use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

use super::error::{DefError, Result};

/// Little-endian reader over a seekable DEF byte source.
///
/// Every short read is reported as [`DefError::TruncatedInput`] together with the
/// offset the read started at, so callers can re-label it per file section.
pub struct DefReader<R> {
    inner: R,
}

impl<R: Read + Seek> DefReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn skip(&mut self, count: i64) -> Result<()> {
        self.inner.seek(SeekFrom::Current(count))?;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let offset = self.position()?;
        self.inner.read_u8().map_err(|e| short_read(e, offset, 1))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let offset = self.position()?;
        self.inner
            .read_u16::<LittleEndian>()
            .map_err(|e| short_read(e, offset, 2))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let offset = self.position()?;
        self.inner
            .read_i16::<LittleEndian>()
            .map_err(|e| short_read(e, offset, 2))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let offset = self.position()?;
        self.inner
            .read_u32::<LittleEndian>()
            .map_err(|e| short_read(e, offset, 4))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let offset = self.position()?;
        self.inner
            .read_i32::<LittleEndian>()
            .map_err(|e| short_read(e, offset, 4))
    }

    /// Reads exactly `count` bytes. The buffer grows with the data actually read, so a
    /// bogus count from a corrupt header fails as a short read instead of allocating.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let offset = self.position()?;
        let mut buf = Vec::new();
        (&mut self.inner).take(count as u64).read_to_end(&mut buf)?;
        if buf.len() < count {
            return Err(DefError::TruncatedInput {
                offset,
                wanted: count,
            });
        }
        Ok(buf)
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.position()?;
        self.inner
            .read_exact(buf)
            .map_err(|e| short_read(e, offset, buf.len()))
    }

    /// Reads a fixed-width name field. The name ends at the first NUL byte, or spans
    /// the whole field when there is none.
    pub fn read_name(&mut self, width: usize) -> Result<String> {
        let field = self.read_bytes(width)?;
        Ok(name_from_field(&field))
    }
}

pub(crate) fn name_from_field(field: &[u8]) -> String {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..len]).into_owned()
}

fn short_read(err: io::Error, offset: u64, wanted: usize) -> DefError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        DefError::TruncatedInput { offset, wanted }
    } else {
        DefError::Io(err)
    }
}
