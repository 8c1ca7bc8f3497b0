//! Parsed entry metadata.

use super::time::ArchiveTime;
use crate::paths;

/// Decoder-defined position token used to re-seek to an entry.
///
/// Its meaning depends on the decoder that produced it (central directory
/// index for ZIP, data offset for TAR, header ordinal for RAR...). Only the
/// decoder that recorded a token can interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryOffset(pub u64);

/// Entry metadata as reported by a decoder, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub name: String,
    pub uncompressed_size: u64,
    pub offset: EntryOffset,
    pub mod_time: ArchiveTime,
}

/// Information about a file in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Parse-order sequence number (0-based, dense)
    pub id: usize,
    /// Path within the archive as stored (may be empty)
    pub name: String,
    /// Size after decompression
    pub uncompressed_size: u64,
    /// Position token for re-seeking
    pub offset: EntryOffset,
    /// Archive-native modification time
    pub mod_time: ArchiveTime,
}

/// Ordered, append-only collection of entries.
///
/// Filled once while an archive is parsed and only read afterwards.
#[derive(Debug, Default)]
pub struct EntryTable {
    entries: Vec<EntryRecord>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, assigning it the next id.
    pub(crate) fn push(&mut self, parsed: ParsedEntry) -> usize {
        let id = self.entries.len();
        self.entries.push(EntryRecord {
            id,
            name: parsed.name,
            uncompressed_size: parsed.uncompressed_size,
            offset: parsed.offset,
            mod_time: parsed.mod_time,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&EntryRecord> {
        self.entries.get(id)
    }

    pub fn as_slice(&self) -> &[EntryRecord] {
        &self.entries
    }

    /// Id of the first entry whose name matches case-insensitively.
    ///
    /// Archives may contain the same name twice; the earlier entry wins.
    pub fn find_id(&self, name: &str) -> Option<usize> {
        paths::position_of(self.entries.iter().map(|e| e.name.as_str()), name)
    }
}
