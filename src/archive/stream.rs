//! Byte sources for archives.
//!
//! A file path, an in-memory buffer or any caller-supplied `Read + Seek`
//! object all become one [`ArchiveStream`] that decoders read from.

use crate::error::{ArchiveError, Result};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// Anything a decoder can read and seek.
///
/// `Send` so that an opened archive can move to another thread.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Where archive bytes come from.
pub enum StreamSource {
    /// File on disk
    File(PathBuf),
    /// Complete archive in memory
    Memory(Vec<u8>),
    /// Platform or caller stream object
    Reader(Box<dyn ReadSeek>),
}

impl StreamSource {
    pub fn reader<R: ReadSeek + 'static>(reader: R) -> Self {
        StreamSource::Reader(Box::new(reader))
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::File(path) => f.debug_tuple("File").field(path).finish(),
            StreamSource::Memory(data) => write!(f, "Memory({} bytes)", data.len()),
            StreamSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<PathBuf> for StreamSource {
    fn from(path: PathBuf) -> Self {
        StreamSource::File(path)
    }
}

impl From<&Path> for StreamSource {
    fn from(path: &Path) -> Self {
        StreamSource::File(path.to_path_buf())
    }
}

impl From<&str> for StreamSource {
    fn from(path: &str) -> Self {
        StreamSource::File(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for StreamSource {
    fn from(data: Vec<u8>) -> Self {
        StreamSource::Memory(data)
    }
}

/// Seekable, readable handle over a [`StreamSource`].
pub struct ArchiveStream {
    inner: Box<dyn ReadSeek>,
    /// Set when the stream reads a file on disk
    origin: Option<PathBuf>,
}

impl ArchiveStream {
    /// Open the source. Fails with [`ArchiveError::SourceUnavailable`] if a
    /// file cannot be opened.
    pub fn open(source: StreamSource) -> Result<Self> {
        match source {
            StreamSource::File(path) => {
                let file = File::open(&path).map_err(|e| ArchiveError::SourceUnavailable {
                    path: Some(path.clone()),
                    source: e,
                })?;
                debug!("Opened archive file {}", path.display());
                Ok(Self {
                    inner: Box::new(BufReader::new(file)),
                    origin: Some(path),
                })
            }
            StreamSource::Memory(data) => Ok(Self {
                inner: Box::new(Cursor::new(data)),
                origin: None,
            }),
            StreamSource::Reader(reader) => Ok(Self {
                inner: reader,
                origin: None,
            }),
        }
    }

    /// Path of the underlying file, if the stream is file-backed.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Total stream length. Leaves the position at the start.
    pub fn len(&mut self) -> io::Result<u64> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(len)
    }

    /// Turn the stream into something that has a filesystem path.
    ///
    /// File-backed streams keep their path. Anything else is copied to a
    /// temporary file that is deleted when the location is dropped.
    pub fn into_location(self) -> Result<ArchiveLocation> {
        if let Some(path) = self.origin {
            return Ok(ArchiveLocation { path, temp: None });
        }

        let mut inner = self.inner;
        let spool = |inner: &mut Box<dyn ReadSeek>| -> io::Result<TempPath> {
            let mut temp = tempfile::Builder::new()
                .prefix(".polyarchive_")
                .suffix(".rar")
                .tempfile()?;
            inner.seek(SeekFrom::Start(0))?;
            let copied = io::copy(inner, temp.as_file_mut())?;
            debug!("Spooled {} bytes to {}", copied, temp.path().display());
            Ok(temp.into_temp_path())
        };

        let temp = spool(&mut inner)
            .map_err(|e| ArchiveError::SourceUnavailable { path: None, source: e })?;
        Ok(ArchiveLocation {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }
}

impl Read for ArchiveStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for ArchiveStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl fmt::Debug for ArchiveStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveStream")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Filesystem path of an archive, for engines that only accept paths.
#[derive(Debug)]
pub struct ArchiveLocation {
    path: PathBuf,
    /// Removes the spooled copy on drop
    temp: Option<TempPath>,
}

impl ArchiveLocation {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the path is a temporary copy of a non-file source
    pub fn is_spooled(&self) -> bool {
        self.temp.is_some()
    }
}
