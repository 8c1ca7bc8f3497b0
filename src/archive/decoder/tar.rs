//! TAR decoding via the tar crate.
//!
//! The tar crate walks the headers (including GNU long names and PAX
//! records); entry data is stored uncompressed, so extraction is a plain
//! seek + read on the stream.

use super::FormatDecoder;
use crate::archive::entry::{EntryOffset, ParsedEntry};
use crate::archive::sink::ExtractSink;
use crate::archive::stream::ArchiveStream;
use crate::archive::time::ArchiveTime;
use crate::archive::ArchiveFormat;
use crate::error::{ArchiveError, Result};
use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};
use tracing::debug;

/// Offset tokens are byte offsets of entry data within the stream.
pub struct TarDecoder {
    pending: VecDeque<ParsedEntry>,
    current: Option<u64>,
    stream: ArchiveStream,
}

impl TarDecoder {
    /// Walk all headers once. The tar crate borrows the stream while
    /// iterating, so the header walk happens here and `parse_next` replays it.
    pub fn open(stream: ArchiveStream) -> Result<Self> {
        let parse_err = |e: io::Error| ArchiveError::parse(ArchiveFormat::Tar, e.to_string());

        let mut archive = ::tar::Archive::new(stream);
        let mut pending = VecDeque::new();
        for entry in archive.entries_with_seek().map_err(parse_err)? {
            let entry = entry.map_err(parse_err)?;
            let header = entry.header();
            let entry_type = header.entry_type();

            if !(entry_type.is_file() || entry_type.is_contiguous()) {
                debug!(
                    "Skipping TAR member {} ({:?})",
                    String::from_utf8_lossy(&entry.path_bytes()),
                    entry_type
                );
                continue;
            }

            let mod_time = header
                .mtime()
                .ok()
                .and_then(|secs| i64::try_from(secs).ok())
                .map(ArchiveTime::Unix)
                .unwrap_or_default();

            pending.push_back(ParsedEntry {
                name: String::from_utf8_lossy(&entry.path_bytes()).into_owned(),
                uncompressed_size: entry.size(),
                offset: EntryOffset(entry.raw_file_position()),
                mod_time,
            });
        }

        Ok(Self {
            pending,
            current: None,
            stream: archive.into_inner(),
        })
    }
}

impl FormatDecoder for TarDecoder {
    fn parse_next(&mut self) -> Result<Option<ParsedEntry>> {
        Ok(self.pending.pop_front())
    }

    fn seek_entry(&mut self, offset: EntryOffset) -> Result<()> {
        self.stream
            .seek(SeekFrom::Start(offset.0))
            .map_err(|e| ArchiveError::decode(format!("@{}", offset.0), e.to_string()))?;
        self.current = Some(offset.0);
        Ok(())
    }

    fn decompress(&mut self, expected_size: u64, sink: &mut ExtractSink) -> Result<()> {
        let offset = self
            .current
            .ok_or_else(|| ArchiveError::decode("<unknown>", "no entry selected"))?;
        let mut data = (&mut self.stream).take(expected_size);
        io::copy(&mut data, sink)
            .map_err(|e| ArchiveError::decode(format!("@{offset}"), e.to_string()))?;
        Ok(())
    }
}
