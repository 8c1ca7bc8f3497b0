//! polyarchive - read ZIP, 7z, TAR and RAR archives through one interface
//!
//! Opening an archive builds its entry table without decompressing
//! anything; entries are extracted one at a time by id or name. RAR
//! archives the built-in decoder cannot parse are retried with a separately
//! installed UnRAR library when one can be found.

pub mod archive;
pub mod config;
pub mod error;
pub mod fallback;
pub mod paths;

pub use archive::{Archive, ArchiveFormat, ArchiveTime, EntryRecord, ExtractedData, StreamSource};
pub use config::ArchiveConfig;
pub use error::{ArchiveError, Result};
