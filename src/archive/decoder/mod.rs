//! Format decoders.
//!
//! Each decoder drives one external codec crate through the same narrow
//! protocol: walk the entries once, then seek to a recorded entry and
//! decompress it on demand.

mod rar;
mod sevenzip;
mod tar;
mod zip;

pub use self::rar::RarDecoder;
pub use self::sevenzip::SevenZipDecoder;
pub use self::tar::TarDecoder;
pub use self::zip::ZipDecoder;

use super::entry::{EntryOffset, EntryTable, ParsedEntry};
use super::sink::ExtractSink;
use super::stream::ArchiveStream;
use super::ArchiveFormat;
use crate::error::{ArchiveError, Result};
use std::sync::Arc;
use tracing::debug;

/// Per-format parsing and extraction.
pub trait FormatDecoder {
    /// Parse the next member in archive order.
    ///
    /// `Ok(None)` means end of data. Must not decompress entry contents.
    fn parse_next(&mut self) -> Result<Option<ParsedEntry>>;

    /// Reposition to an entry previously reported by [`parse_next`].
    ///
    /// [`parse_next`]: FormatDecoder::parse_next
    fn seek_entry(&mut self, offset: EntryOffset) -> Result<()>;

    /// Decompress exactly `expected_size` bytes of the entry selected by the
    /// last successful [`seek_entry`] into `sink`.
    ///
    /// [`seek_entry`]: FormatDecoder::seek_entry
    fn decompress(&mut self, expected_size: u64, sink: &mut ExtractSink) -> Result<()>;

    /// Archive-level comment. `None` when the format has none.
    fn global_comment(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Open the decoder for `format` over `stream`.
///
/// RAR decoding needs a filesystem path, so non-file streams are spooled
/// to a temporary file first.
pub fn open(format: ArchiveFormat, stream: ArchiveStream) -> Result<Box<dyn FormatDecoder + Send>> {
    let decoder: Box<dyn FormatDecoder + Send> = match format {
        ArchiveFormat::Zip { deflated_only } => Box::new(ZipDecoder::open(stream, deflated_only)?),
        ArchiveFormat::SevenZip => Box::new(SevenZipDecoder::open(stream)?),
        ArchiveFormat::Tar => Box::new(TarDecoder::open(stream)?),
        ArchiveFormat::Rar => Box::new(RarDecoder::open(Arc::new(stream.into_location()?))?),
    };
    Ok(decoder)
}

/// Walk every entry into a fresh table.
///
/// All-or-nothing: the first decoder error is returned and no partial table
/// survives. Reaching end of data before any entry is also a failure; an
/// archive with nothing to show is treated as unreadable.
pub fn parse_all(format: ArchiveFormat, decoder: &mut dyn FormatDecoder) -> Result<EntryTable> {
    let mut table = EntryTable::new();
    loop {
        match decoder.parse_next()? {
            Some(parsed) => {
                table.push(parsed);
            }
            None if table.is_empty() => {
                return Err(ArchiveError::parse(format, "end of data before the first entry"));
            }
            None => {
                debug!("Parsed {} entries from {} archive", table.len(), format);
                return Ok(table);
            }
        }
    }
}
