//! Archive handling.
//!
//! Provides one read-only interface over ZIP (zip crate), 7z (sevenz-rust2),
//! TAR (tar crate) and RAR (unrar), with a fallback to a separately located
//! UnRAR library when the primary RAR decoder cannot parse an archive.
//!
//! Opening an archive parses its directory only. Entry contents are
//! decompressed when they are asked for.
//!
//! # Usage
//!
//! ```ignore
//! use polyarchive::archive::{Archive, ArchiveFormat};
//!
//! let mut archive = Archive::open(ArchiveFormat::zip(), "comic.cbz")?;
//! for entry in archive.entries()? {
//!     println!("{} ({} bytes)", entry.name, entry.uncompressed_size);
//! }
//! let page = archive.extract_by_name("Page01.JPG")?;
//! ```

pub mod decoder;
pub mod entry;
pub mod handle;
pub mod sink;
pub mod stream;
pub mod time;

pub use entry::{EntryOffset, EntryRecord, EntryTable, ParsedEntry};
pub use handle::Archive;
pub use sink::{ExtractSink, ExtractedData, PADDING_LEN};
pub use stream::{ArchiveLocation, ArchiveStream, ReadSeek, StreamSource};
pub use time::ArchiveTime;

use std::fmt;

/// Container format handled by an [`Archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// ZIP archive. With `deflated_only` set, only Deflate-compressed entries
    /// can be extracted.
    Zip { deflated_only: bool },
    /// 7z archive
    SevenZip,
    /// Uncompressed TAR archive
    Tar,
    /// RAR archive (RAR 1.5 through RAR5)
    Rar,
}

impl ArchiveFormat {
    /// ZIP accepting every compression method the zip crate supports
    pub const fn zip() -> Self {
        ArchiveFormat::Zip {
            deflated_only: false,
        }
    }

    /// Detect the format from the first bytes of a container.
    ///
    /// Needs at least 262 bytes to recognize TAR (the `ustar` magic lives at
    /// offset 257); the other formats are recognized from the first 6 bytes.
    pub fn detect(magic: &[u8]) -> Option<Self> {
        // ZIP: PK\x03\x04, PK\x05\x06 (empty) or PK\x07\x08 (spanned)
        if magic.len() >= 4
            && magic[0..2] == [0x50, 0x4B]
            && matches!(magic[2..4], [0x03, 0x04] | [0x05, 0x06] | [0x07, 0x08])
        {
            return Some(Self::zip());
        }

        // RAR: Rar!\x1A\x07\x00 (RAR4) or Rar!\x1A\x07\x01\x00 (RAR5)
        if magic.len() >= 6 && magic[0..6] == [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07] {
            return Some(ArchiveFormat::Rar);
        }

        // 7z: 7z\xBC\xAF\x27\x1C
        if magic.len() >= 6 && magic[0..6] == [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C] {
            return Some(ArchiveFormat::SevenZip);
        }

        // TAR: "ustar" at 257 (POSIX "ustar\0" and GNU "ustar ")
        if magic.len() >= 262 && &magic[257..262] == b"ustar" {
            return Some(ArchiveFormat::Tar);
        }

        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip { .. } => "ZIP",
            ArchiveFormat::SevenZip => "7-Zip",
            ArchiveFormat::Tar => "TAR",
            ArchiveFormat::Rar => "RAR",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
