//! Error types shared by every archive operation.

use crate::archive::ArchiveFormat;
use std::path::PathBuf;

/// Errors produced while opening, listing or extracting archives.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The byte source could not be opened (missing file, permission denied, ...)
    #[error("Archive source unavailable: {}", .path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<stream>".to_string()))]
    SourceUnavailable {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// The decoder rejected the container structure
    #[error("Failed to parse {format} archive: {reason}")]
    ParseFailure { format: ArchiveFormat, reason: String },

    /// No known signature at the start of the source
    #[error("Unrecognized archive format")]
    UnknownFormat,

    /// Lookup by name or id missed
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Declared entry size cannot be allocated
    #[error("Entry size {0} exceeds the addressable range")]
    SizeOverflow(u64),

    /// Decompression failed or produced the wrong number of bytes
    #[error("Failed to decode '{name}': {reason}")]
    DecodeFailure { name: String, reason: String },

    /// RAR parse failed and no UnRAR engine could take over
    #[error("RAR fallback unavailable: {0}")]
    FallbackUnavailable(String),

    /// The UnRAR engine re-derived a listing that disagrees with the recorded one
    #[error("RAR fallback listing mismatch at entry {index}: recorded '{recorded}', found '{found}'")]
    FallbackInconsistency {
        index: usize,
        recorded: String,
        found: String,
    },

    /// The archive handle has been closed
    #[error("Archive is closed")]
    Closed,
}

impl ArchiveError {
    pub(crate) fn parse(format: ArchiveFormat, reason: impl Into<String>) -> Self {
        ArchiveError::ParseFailure {
            format,
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ArchiveError::DecodeFailure {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error leaves the archive handle usable for other entries.
    pub fn is_local_to_entry(&self) -> bool {
        matches!(
            self,
            ArchiveError::EntryNotFound(_)
                | ArchiveError::SizeOverflow(_)
                | ArchiveError::DecodeFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
