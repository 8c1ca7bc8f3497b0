//! In-memory UnRAR engine for tests.

use super::{RarHeader, RarSession, UnrarEngine};
use crate::error::{ArchiveError, Result};
use std::path::Path;

/// Small enough that every test payload spans several callbacks.
const CHUNK_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct MemoryEntry {
    name: String,
    data: Vec<u8>,
    declared_size: u64,
    is_directory: bool,
}

impl MemoryEntry {
    pub fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
            declared_size: 0,
            is_directory: true,
        }
    }

    pub fn file(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            data: data.to_vec(),
            declared_size: data.len() as u64,
            is_directory: false,
        }
    }

    /// Report a header size different from the stored data.
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = size;
        self
    }
}

pub struct MemoryUnrar {
    version: u32,
    entries: Vec<MemoryEntry>,
}

impl MemoryUnrar {
    pub fn new(version: u32, entries: Vec<MemoryEntry>) -> Self {
        Self { version, entries }
    }
}

impl UnrarEngine for MemoryUnrar {
    fn version(&self) -> u32 {
        self.version
    }

    fn open(&self, _archive: &Path) -> Result<Box<dyn RarSession + '_>> {
        Ok(Box::new(MemorySession {
            entries: &self.entries,
            position: 0,
            pending: false,
        }))
    }
}

struct MemorySession<'a> {
    entries: &'a [MemoryEntry],
    position: usize,
    // a header was handed out and not yet skipped or tested
    pending: bool,
}

impl<'a> MemorySession<'a> {
    fn current(&self) -> Result<&'a MemoryEntry> {
        if !self.pending {
            return Err(ArchiveError::decode("<memory>", "no header was read"));
        }
        self.entries
            .get(self.position)
            .ok_or_else(|| ArchiveError::decode("<memory>", "past the end"))
    }

    fn advance(&mut self) {
        self.pending = false;
        self.position += 1;
    }
}

impl RarSession for MemorySession<'_> {
    fn read_header(&mut self) -> Result<Option<RarHeader>> {
        if self.pending {
            self.advance();
        }
        let Some(entry) = self.entries.get(self.position) else {
            return Ok(None);
        };
        self.pending = true;

        Ok(Some(RarHeader {
            file_name: entry.name.clone(),
            unpacked_size_low: entry.declared_size as u32,
            unpacked_size_high: (entry.declared_size >> 32) as u32,
            file_time: 0x5A21_6C00,
            is_directory: entry.is_directory,
        }))
    }

    fn skip(&mut self) -> Result<()> {
        self.current()?;
        self.advance();
        Ok(())
    }

    fn test(&mut self, on_data: &mut dyn FnMut(&[u8]) -> bool) -> Result<()> {
        let entry = self.current()?;
        for chunk in entry.data.chunks(CHUNK_LEN) {
            if !on_data(chunk) {
                self.advance();
                return Err(ArchiveError::decode(&entry.name, "extraction aborted by the receiver"));
            }
        }
        self.advance();
        Ok(())
    }
}
