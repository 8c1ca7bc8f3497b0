//! ZIP decoding via the zip crate.

use super::FormatDecoder;
use crate::archive::entry::{EntryOffset, ParsedEntry};
use crate::archive::sink::ExtractSink;
use crate::archive::stream::ArchiveStream;
use crate::archive::time::ArchiveTime;
use crate::archive::ArchiveFormat;
use crate::error::{ArchiveError, Result};
use ::zip::{CompressionMethod, ZipArchive};
use std::io;

/// Walks the central directory; offset tokens are central directory indices.
pub struct ZipDecoder {
    archive: ZipArchive<ArchiveStream>,
    deflated_only: bool,
    next: usize,
    current: Option<usize>,
}

impl ZipDecoder {
    pub fn open(stream: ArchiveStream, deflated_only: bool) -> Result<Self> {
        let archive = ZipArchive::new(stream)
            .map_err(|e| ArchiveError::parse(Self::format(deflated_only), e.to_string()))?;
        Ok(Self {
            archive,
            deflated_only,
            next: 0,
            current: None,
        })
    }

    fn format(deflated_only: bool) -> ArchiveFormat {
        ArchiveFormat::Zip { deflated_only }
    }
}

impl FormatDecoder for ZipDecoder {
    fn parse_next(&mut self) -> Result<Option<ParsedEntry>> {
        while self.next < self.archive.len() {
            let index = self.next;
            self.next += 1;
            let format = Self::format(self.deflated_only);

            // Raw access reads the local header without setting up decompression
            let file = self
                .archive
                .by_index_raw(index)
                .map_err(|e| ArchiveError::parse(format, e.to_string()))?;
            if file.is_dir() {
                continue;
            }

            let mod_time = file
                .last_modified()
                .map(|dt| ArchiveTime::from_dos_parts(dt.datepart(), dt.timepart()))
                .unwrap_or_default();

            return Ok(Some(ParsedEntry {
                name: file.name().to_string(),
                uncompressed_size: file.size(),
                offset: EntryOffset(index as u64),
                mod_time,
            }));
        }
        Ok(None)
    }

    fn seek_entry(&mut self, offset: EntryOffset) -> Result<()> {
        let index = usize::try_from(offset.0)
            .ok()
            .filter(|i| *i < self.archive.len())
            .ok_or_else(|| ArchiveError::EntryNotFound(format!("ZIP index {}", offset.0)))?;
        self.current = Some(index);
        Ok(())
    }

    fn decompress(&mut self, expected_size: u64, sink: &mut ExtractSink) -> Result<()> {
        let index = self
            .current
            .ok_or_else(|| ArchiveError::decode("<unknown>", "no entry selected"))?;

        let mut file = self
            .archive
            .by_index(index)
            .map_err(|e| ArchiveError::decode(format!("#{index}"), e.to_string()))?;
        let name = file.name().to_string();

        if self.deflated_only
            && expected_size > 0
            && file.compression() != CompressionMethod::Deflated
        {
            return Err(ArchiveError::decode(
                name,
                format!("compression method {:?} is not allowed (deflate only)", file.compression()),
            ));
        }

        // Reading to the end lets the zip crate verify the CRC; the sink
        // rejects anything past the declared size
        io::copy(&mut file, sink).map_err(|e| ArchiveError::decode(&name, e.to_string()))?;
        Ok(())
    }

    fn global_comment(&mut self) -> Result<Option<Vec<u8>>> {
        let comment = self.archive.comment();
        if comment.is_empty() {
            Ok(None)
        } else {
            Ok(Some(comment.to_vec()))
        }
    }
}
