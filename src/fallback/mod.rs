//! UnRAR fallback for RAR archives the primary decoder cannot parse.
//!
//! The fallback engine is a second, independently versioned RAR
//! implementation (the UnRAR shared library, see [`unrar_dll`]). It shares no
//! parsing state with the primary decoder: listings are re-derived by walking
//! the archive headers, and data is pushed to us chunk by chunk from the
//! engine's callback rather than pulled.

pub mod unrar_dll;

#[cfg(test)]
pub(crate) mod testing;

use crate::archive::sink::{ExtractSink, ExtractedData};
use crate::error::{ArchiveError, Result};
use crate::paths;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

pub use unrar_dll::{system_engine, DynamicUnrar};

/// Oldest UnRAR API version with the extended header and callback interface.
/// Newer versions are backward compatible.
pub const MIN_UNRAR_VERSION: u32 = 6;

/// One file header as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RarHeader {
    /// Name with the separators the engine reports (`\` on Windows)
    pub file_name: String,
    pub unpacked_size_low: u32,
    pub unpacked_size_high: u32,
    /// MS-DOS date/time
    pub file_time: u32,
    pub is_directory: bool,
}

impl RarHeader {
    pub fn unpacked_size(&self) -> u64 {
        (u64::from(self.unpacked_size_high) << 32) | u64::from(self.unpacked_size_low)
    }
}

/// An open archive inside the engine. Closed on drop.
///
/// Mirrors the engine's header cursor: after [`read_header`] returns a
/// header, exactly one of [`skip`] or [`test`] must be called before the
/// next [`read_header`].
///
/// [`read_header`]: RarSession::read_header
/// [`skip`]: RarSession::skip
/// [`test`]: RarSession::test
pub trait RarSession {
    /// Next header, `None` at the end of the archive.
    fn read_header(&mut self) -> Result<Option<RarHeader>>;

    /// Move past the current file without decoding it.
    fn skip(&mut self) -> Result<()>;

    /// Decode the current file, handing every decoded chunk to `on_data`.
    /// Returning `false` from `on_data` aborts decoding with an error.
    fn test(&mut self, on_data: &mut dyn FnMut(&[u8]) -> bool) -> Result<()>;
}

/// A RAR extraction engine that may or may not be present at runtime.
pub trait UnrarEngine: Send + Sync {
    /// API version reported by the engine
    fn version(&self) -> u32;

    /// Open `archive` for extraction.
    fn open(&self, archive: &Path) -> Result<Box<dyn RarSession + '_>>;
}

/// A file listed by the fallback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEntry {
    /// Name with `/` separators
    pub name: String,
    pub unpacked_size: u64,
    pub file_time: u32,
}

/// Lists and extracts RAR entries through an [`UnrarEngine`].
#[derive(Clone)]
pub struct FallbackExtractor {
    engine: Arc<dyn UnrarEngine>,
}

impl FallbackExtractor {
    /// Wrap `engine`, rejecting engines older than [`MIN_UNRAR_VERSION`].
    pub fn new(engine: Arc<dyn UnrarEngine>) -> Result<Self> {
        let version = engine.version();
        if version < MIN_UNRAR_VERSION {
            return Err(ArchiveError::FallbackUnavailable(format!(
                "UnRAR API version {} is older than the required {}",
                version, MIN_UNRAR_VERSION
            )));
        }
        debug!("Using UnRAR engine with API version {}", version);
        Ok(Self { engine })
    }

    /// Walk every header of `archive` and record its files in `known`.
    ///
    /// Positions already present in `known` are not re-added; their names
    /// must match what the engine reports now, otherwise the listing is
    /// inconsistent and nothing extracted through it can be trusted.
    pub fn list_names(&self, archive: &Path, known: &mut Vec<FallbackEntry>) -> Result<()> {
        let mut session = self.engine.open(archive)?;
        let mut index = 0;

        while let Some(header) = session.read_header()? {
            if !header.is_directory {
                let name = paths::to_forward_slashes(&header.file_name);
                match known.get(index) {
                    None => known.push(FallbackEntry {
                        name,
                        unpacked_size: header.unpacked_size(),
                        file_time: header.file_time,
                    }),
                    Some(recorded) if recorded.name == name => {}
                    Some(recorded) => {
                        error!(
                            "UnRAR listing of {} changed at entry {}: '{}' became '{}'",
                            archive.display(),
                            index,
                            recorded.name,
                            name
                        );
                        return Err(ArchiveError::FallbackInconsistency {
                            index,
                            recorded: recorded.name.clone(),
                            found: name,
                        });
                    }
                }
                index += 1;
            }
            session.skip()?;
        }

        debug!("UnRAR listed {} files in {}", index, archive.display());
        Ok(())
    }

    /// Extract the first file whose name matches `name` case-insensitively.
    ///
    /// The whole entry is decoded; its size must match the header.
    pub fn extract_by_name(&self, archive: &Path, name: &str) -> Result<ExtractedData> {
        let mut session = self.engine.open(archive)?;

        let header = loop {
            match session.read_header()? {
                Some(header) if paths::names_equal(&paths::to_forward_slashes(&header.file_name), name) => {
                    break header;
                }
                Some(_) => session.skip()?,
                None => return Err(ArchiveError::EntryNotFound(name.to_string())),
            }
        };

        // Entries past 4 GiB are not supported
        if header.unpacked_size_high != 0 {
            return Err(ArchiveError::SizeOverflow(header.unpacked_size()));
        }

        let mut sink = ExtractSink::with_declared_size(u64::from(header.unpacked_size_low))?;
        session.test(&mut |chunk: &[u8]| sink.push(chunk))?;
        sink.finish(name)
    }
}
