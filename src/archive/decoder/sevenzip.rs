//! 7z decoding via sevenz-rust2.
//!
//! The archive header is read once when the decoder opens. An entry is
//! extracted by decoding the block that holds it; in solid archives the
//! entries in front of it in the same block are decoded and discarded, which
//! is slow but keeps memory bounded to one entry.

use super::FormatDecoder;
use crate::archive::entry::{EntryOffset, ParsedEntry};
use crate::archive::sink::ExtractSink;
use crate::archive::stream::ArchiveStream;
use crate::archive::time::ArchiveTime;
use crate::archive::ArchiveFormat;
use crate::error::{ArchiveError, Result};
use sevenz_rust2::{Archive, ArchiveEntry, BlockDecoder, Password};
use std::io;

/// Offset tokens are indices into the 7z file list.
pub struct SevenZipDecoder {
    archive: Archive,
    password: Password,
    stream: ArchiveStream,
    next: usize,
    current: Option<usize>,
}

impl SevenZipDecoder {
    pub fn open(mut stream: ArchiveStream) -> Result<Self> {
        let password = Password::empty();
        let archive = Archive::read(&mut stream, &password)
            .map_err(|e| ArchiveError::parse(ArchiveFormat::SevenZip, e.to_string()))?;
        Ok(Self {
            archive,
            password,
            stream,
            next: 0,
            current: None,
        })
    }
}

impl FormatDecoder for SevenZipDecoder {
    fn parse_next(&mut self) -> Result<Option<ParsedEntry>> {
        let files = &self.archive.files;
        while let Some(file) = files.get(self.next) {
            let index = self.next;
            self.next += 1;
            if file.is_directory {
                continue;
            }

            let mod_time = if file.has_last_modified_date {
                ArchiveTime::FileTime(u64::from(file.last_modified_date))
            } else {
                ArchiveTime::Unknown
            };

            return Ok(Some(ParsedEntry {
                name: file.name.clone(),
                uncompressed_size: file.size,
                offset: EntryOffset(index as u64),
                mod_time,
            }));
        }
        Ok(None)
    }

    fn seek_entry(&mut self, offset: EntryOffset) -> Result<()> {
        let count = self.archive.files.len();
        let index = usize::try_from(offset.0)
            .ok()
            .filter(|i| *i < count)
            .ok_or_else(|| ArchiveError::EntryNotFound(format!("7z index {}", offset.0)))?;
        self.current = Some(index);
        Ok(())
    }

    fn decompress(&mut self, _expected_size: u64, sink: &mut ExtractSink) -> Result<()> {
        let index = self
            .current
            .ok_or_else(|| ArchiveError::decode("<unknown>", "no entry selected"))?;
        let target: *const ArchiveEntry = &self.archive.files[index];
        let name = self.archive.files[index].name.clone();

        // Entries without a data stream are empty
        let Some(block_index) = self.archive.stream_map.file_block_index[index] else {
            return Ok(());
        };

        // Matched by address, names are not unique
        let mut found = false;
        BlockDecoder::new(1, block_index, &self.archive, &self.password, &mut self.stream)
            .for_each_entries(&mut |entry, reader| {
                if !std::ptr::eq(entry, target) {
                    io::copy(reader, &mut io::sink())?;
                    return Ok(true);
                }
                found = true;
                io::copy(reader, &mut *sink)?;
                Ok(false)
            })
            .map_err(|e| ArchiveError::decode(&name, e.to_string()))?;

        if !found {
            return Err(ArchiveError::decode(&name, format!("entry not found in block {block_index}")));
        }
        Ok(())
    }
}
