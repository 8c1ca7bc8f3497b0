//! Byte accumulation for extracted entries.
//!
//! Primary decoders pull data and write it into the sink through
//! [`std::io::Write`]; the UnRAR engine pushes chunks from its callback via
//! [`ExtractSink::push`]. Both end in [`ExtractSink::finish`], so extraction
//! results look the same whichever engine produced them.

use crate::error::{ArchiveError, Result};
use std::io;
use std::ops::Deref;

/// Zero bytes appended after every extracted entry.
///
/// Lets callers treat the buffer as a NUL-terminated string (even a UTF-16
/// one) without copying. Not counted in [`ExtractedData::len`].
pub const PADDING_LEN: usize = 3;

/// Collects exactly `declared` bytes of one entry.
#[derive(Debug)]
pub struct ExtractSink {
    buf: Vec<u8>,
    declared: usize,
}

impl ExtractSink {
    /// Create a sink for an entry of `declared` bytes.
    ///
    /// Fails with [`ArchiveError::SizeOverflow`] when the size plus padding
    /// does not fit in memory, instead of attempting the allocation.
    pub fn with_declared_size(declared: u64) -> Result<Self> {
        let declared_usize = usize::try_from(declared)
            .ok()
            .filter(|size| *size <= usize::MAX - PADDING_LEN)
            .ok_or(ArchiveError::SizeOverflow(declared))?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(declared_usize + PADDING_LEN)
            .map_err(|_| ArchiveError::SizeOverflow(declared))?;

        Ok(Self {
            buf,
            declared: declared_usize,
        })
    }

    /// Append a chunk. Returns `false` if the chunk would exceed the
    /// declared size; the sink is left unchanged in that case.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        if chunk.len() > self.declared - self.buf.len() {
            return false;
        }
        self.buf.extend_from_slice(chunk);
        true
    }

    /// Bytes received so far
    pub fn received(&self) -> usize {
        self.buf.len()
    }

    pub fn declared(&self) -> usize {
        self.declared
    }

    /// Check the byte count and seal the buffer with the zero padding.
    pub fn finish(mut self, name: &str) -> Result<ExtractedData> {
        if self.buf.len() != self.declared {
            return Err(ArchiveError::decode(
                name,
                format!(
                    "size mismatch: expected {} bytes, got {}",
                    self.declared,
                    self.buf.len()
                ),
            ));
        }
        self.buf.extend_from_slice(&[0u8; PADDING_LEN]);
        Ok(ExtractedData {
            len: self.declared,
            buf: self.buf,
        })
    }
}

impl io::Write for ExtractSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.push(data) {
            Ok(data.len())
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("entry produced more than the declared {} bytes", self.declared),
            ))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Uniquely owned contents of one extracted entry.
///
/// Derefs to the entry bytes; [`ExtractedData::with_padding`] exposes the
/// trailing zero bytes as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedData {
    buf: Vec<u8>,
    len: usize,
}

impl ExtractedData {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Entry bytes followed by [`PADDING_LEN`] zero bytes.
    pub fn with_padding(&self) -> &[u8] {
        &self.buf
    }

    /// Entry bytes without the padding.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.truncate(self.len);
        self.buf
    }
}

impl Deref for ExtractedData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for ExtractedData {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
