//! RAR decoding via the unrar crate.
//!
//! unrar only reads archives from a path and only moves forward, so the
//! decoder holds an [`ArchiveLocation`] and re-walks the headers up to the
//! requested entry on every extraction.

use super::FormatDecoder;
use crate::archive::entry::{EntryOffset, ParsedEntry};
use crate::archive::sink::ExtractSink;
use crate::archive::stream::ArchiveLocation;
use crate::archive::time::ArchiveTime;
use crate::archive::ArchiveFormat;
use crate::error::{ArchiveError, Result};
use crate::paths;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Offset tokens are header ordinals (directories included).
pub struct RarDecoder {
    pending: VecDeque<ParsedEntry>,
    header_count: u64,
    current: Option<u64>,
    location: Arc<ArchiveLocation>,
}

impl RarDecoder {
    pub fn open(location: Arc<ArchiveLocation>) -> Result<Self> {
        let parse_err = |e: unrar::error::UnrarError| ArchiveError::parse(ArchiveFormat::Rar, e.to_string());

        let listing = unrar::Archive::new(location.path())
            .open_for_listing()
            .map_err(parse_err)?;

        let mut pending = VecDeque::new();
        let mut header_count = 0u64;
        for header in listing {
            let header = header.map_err(parse_err)?;
            let ordinal = header_count;
            header_count += 1;

            if header.is_directory() {
                continue;
            }
            pending.push_back(ParsedEntry {
                name: paths::to_forward_slashes(&header.filename.to_string_lossy()),
                uncompressed_size: header.unpacked_size,
                offset: EntryOffset(ordinal),
                mod_time: ArchiveTime::Dos(header.file_time),
            });
        }

        debug!(
            "Listed {} RAR headers in {}",
            header_count,
            location.path().display()
        );
        Ok(Self {
            pending,
            header_count,
            current: None,
            location,
        })
    }
}

impl FormatDecoder for RarDecoder {
    fn parse_next(&mut self) -> Result<Option<ParsedEntry>> {
        Ok(self.pending.pop_front())
    }

    fn seek_entry(&mut self, offset: EntryOffset) -> Result<()> {
        if offset.0 >= self.header_count {
            return Err(ArchiveError::EntryNotFound(format!("RAR header {}", offset.0)));
        }
        self.current = Some(offset.0);
        Ok(())
    }

    fn decompress(&mut self, _expected_size: u64, sink: &mut ExtractSink) -> Result<()> {
        let ordinal = self
            .current
            .ok_or_else(|| ArchiveError::decode("<unknown>", "no entry selected"))?;
        let label = format!("RAR header {ordinal}");
        let decode_err = |e: unrar::error::UnrarError| ArchiveError::decode(&label, e.to_string());

        let mut archive = unrar::Archive::new(self.location.path())
            .open_for_processing()
            .map_err(decode_err)?;

        let mut index = 0u64;
        loop {
            let header = archive
                .read_header()
                .map_err(decode_err)?
                .ok_or_else(|| ArchiveError::decode(&label, "archive ended before the entry"))?;

            if index == ordinal {
                let (data, _rest) = header.read().map_err(decode_err)?;
                if !sink.push(&data) {
                    return Err(ArchiveError::decode(
                        &label,
                        format!("decoded {} bytes, more than the declared {}", data.len(), sink.declared()),
                    ));
                }
                return Ok(());
            }

            archive = header.skip().map_err(decode_err)?;
            index += 1;
        }
    }
}
