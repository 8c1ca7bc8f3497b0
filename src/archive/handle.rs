//! The archive handle.
//!
//! An [`Archive`] owns the stream and the decoder for one opened container
//! together with the table of its entries. RAR archives the primary decoder
//! cannot parse are handed to the UnRAR fallback; callers see the same
//! handle either way.

use super::decoder::{self, FormatDecoder, RarDecoder};
use super::entry::{EntryOffset, EntryRecord, EntryTable, ParsedEntry};
use super::sink::{ExtractSink, ExtractedData};
use super::stream::{ArchiveLocation, ArchiveStream, StreamSource};
use super::time::ArchiveTime;
use super::ArchiveFormat;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::fallback::{FallbackEntry, FallbackExtractor};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Bytes read from the start of a source to detect its format
const SNIFF_LEN: usize = 512;

enum State {
    Primary(Box<dyn FormatDecoder + Send>),
    Fallback {
        extractor: FallbackExtractor,
        location: Arc<ArchiveLocation>,
        listing: Vec<FallbackEntry>,
    },
    Closed,
}

/// An opened archive.
///
/// The entry table is built when the archive opens; entry data is
/// decompressed only by [`extract_by_id`](Archive::extract_by_id) and
/// [`extract_by_name`](Archive::extract_by_name).
pub struct Archive {
    format: ArchiveFormat,
    entries: EntryTable,
    state: State,
}

impl Archive {
    /// Open `source` as `format` with the default configuration.
    pub fn open(format: ArchiveFormat, source: impl Into<StreamSource>) -> Result<Self> {
        Self::open_with(format, source, &ArchiveConfig::default())
    }

    /// Open `source` as `format`.
    pub fn open_with(
        format: ArchiveFormat,
        source: impl Into<StreamSource>,
        config: &ArchiveConfig,
    ) -> Result<Self> {
        let stream = ArchiveStream::open(source.into())?;
        Self::from_stream(format, stream, config)
    }

    pub fn open_zip(source: impl Into<StreamSource>, deflated_only: bool) -> Result<Self> {
        Self::open(ArchiveFormat::Zip { deflated_only }, source)
    }

    pub fn open_7z(source: impl Into<StreamSource>) -> Result<Self> {
        Self::open(ArchiveFormat::SevenZip, source)
    }

    pub fn open_tar(source: impl Into<StreamSource>) -> Result<Self> {
        Self::open(ArchiveFormat::Tar, source)
    }

    pub fn open_rar(source: impl Into<StreamSource>) -> Result<Self> {
        Self::open(ArchiveFormat::Rar, source)
    }

    /// Open `source`, picking the format from its leading bytes.
    ///
    /// Fails with [`ArchiveError::UnknownFormat`] if no signature matches.
    pub fn open_detected(source: impl Into<StreamSource>, config: &ArchiveConfig) -> Result<Self> {
        let mut stream = ArchiveStream::open(source.into())?;
        let unreadable = |e| ArchiveError::SourceUnavailable {
            path: None,
            source: e,
        };

        let mut magic = [0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < SNIFF_LEN {
            match stream.read(&mut magic[filled..]).map_err(unreadable)? {
                0 => break,
                n => filled += n,
            }
        }
        // Also rewinds for the decoder
        let total = stream.len().map_err(unreadable)?;

        let format = ArchiveFormat::detect(&magic[..filled]).ok_or(ArchiveError::UnknownFormat)?;
        debug!("Detected {} archive ({} bytes)", format, total);
        Self::from_stream(format, stream, config)
    }

    fn from_stream(format: ArchiveFormat, stream: ArchiveStream, config: &ArchiveConfig) -> Result<Self> {
        let (state, entries) = match format {
            ArchiveFormat::Rar => Self::open_rar_stream(stream, config)?,
            _ => {
                let mut decoder = decoder::open(format, stream)?;
                let entries = decoder::parse_all(format, decoder.as_mut())?;
                (State::Primary(decoder), entries)
            }
        };

        Ok(Self {
            format,
            entries,
            state,
        })
    }

    fn open_rar_stream(stream: ArchiveStream, config: &ArchiveConfig) -> Result<(State, EntryTable)> {
        let location = Arc::new(stream.into_location()?);

        let primary = RarDecoder::open(Arc::clone(&location)).and_then(|mut decoder| {
            let entries = decoder::parse_all(ArchiveFormat::Rar, &mut decoder)?;
            Ok((decoder, entries))
        });

        match primary {
            Ok((decoder, entries)) => Ok((State::Primary(Box::new(decoder)), entries)),
            Err(e) => {
                warn!(
                    "RAR decoder failed on {}: {}. Trying UnRAR fallback",
                    location.path().display(),
                    e
                );
                Self::activate_fallback(location, config)
            }
        }
    }

    /// List the archive from scratch through the UnRAR engine.
    fn activate_fallback(
        location: Arc<ArchiveLocation>,
        config: &ArchiveConfig,
    ) -> Result<(State, EntryTable)> {
        let extractor = FallbackExtractor::new(config.resolve_unrar_engine()?)?;

        let mut listing = Vec::new();
        extractor.list_names(location.path(), &mut listing)?;
        if listing.is_empty() {
            return Err(ArchiveError::parse(
                ArchiveFormat::Rar,
                "UnRAR found no entries either",
            ));
        }

        let mut entries = EntryTable::new();
        append_listing(&mut entries, &listing);
        info!(
            "Opened {} through UnRAR fallback ({} entries)",
            location.path().display(),
            entries.len()
        );

        Ok((
            State::Fallback {
                extractor,
                location,
                listing,
            },
            entries,
        ))
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Whether entries are served by the UnRAR fallback.
    pub fn uses_fallback(&self) -> bool {
        matches!(self.state, State::Fallback { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// All entries in archive order. `entries()[i].id == i`.
    pub fn entries(&self) -> Result<&[EntryRecord]> {
        if self.is_closed() {
            return Err(ArchiveError::Closed);
        }
        Ok(self.entries.as_slice())
    }

    /// Id of the first entry named `name`, compared case-insensitively.
    pub fn find_id(&self, name: &str) -> Option<usize> {
        if self.is_closed() {
            return None;
        }
        self.entries.find_id(name)
    }

    /// Extract the entry with the given id.
    ///
    /// The returned data is exactly `uncompressed_size` bytes long and is
    /// followed by [`PADDING_LEN`](super::PADDING_LEN) zero bytes.
    pub fn extract_by_id(&mut self, id: usize) -> Result<ExtractedData> {
        let result = self.extract(id);
        self.close_on_inconsistency(&result);
        result
    }

    /// Extract the first entry named `name` (case-insensitive).
    pub fn extract_by_name(&mut self, name: &str) -> Result<ExtractedData> {
        if self.is_closed() {
            return Err(ArchiveError::Closed);
        }
        let id = self
            .find_id(name)
            .ok_or_else(|| ArchiveError::EntryNotFound(name.to_string()))?;
        self.extract_by_id(id)
    }

    fn extract(&mut self, id: usize) -> Result<ExtractedData> {
        if self.is_closed() {
            return Err(ArchiveError::Closed);
        }
        let record = self
            .entries
            .get(id)
            .ok_or_else(|| ArchiveError::EntryNotFound(format!("id {} of {}", id, self.entries.len())))?;

        match &mut self.state {
            State::Primary(decoder) => {
                let mut sink = ExtractSink::with_declared_size(record.uncompressed_size)?;
                decoder.seek_entry(record.offset)?;
                decoder.decompress(record.uncompressed_size, &mut sink)?;
                sink.finish(&record.name)
            }
            State::Fallback {
                extractor, location, ..
            } => extractor.extract_by_name(location.path(), &record.name),
            State::Closed => Err(ArchiveError::Closed),
        }
    }

    /// Re-derive the UnRAR listing and check it against the recorded entries.
    ///
    /// Files that appeared since the archive was opened are appended to the
    /// entry table. A renamed or reordered entry is an inconsistency: the
    /// handle closes itself and every later call fails with
    /// [`ArchiveError::Closed`]. Does nothing for archives read by a primary
    /// decoder.
    pub fn verify_listing(&mut self) -> Result<()> {
        let result = match &mut self.state {
            State::Primary(_) => Ok(()),
            State::Fallback {
                extractor,
                location,
                listing,
            } => extractor
                .list_names(location.path(), listing)
                .map(|()| append_listing(&mut self.entries, listing)),
            State::Closed => Err(ArchiveError::Closed),
        };
        self.close_on_inconsistency(&result);
        result
    }

    /// The archive comment, if the format has one. Always `None` for RAR
    /// archives served by the fallback.
    pub fn global_comment(&mut self) -> Result<Option<Vec<u8>>> {
        match &mut self.state {
            State::Primary(decoder) => decoder.global_comment(),
            State::Fallback { .. } => Ok(None),
            State::Closed => Err(ArchiveError::Closed),
        }
    }

    /// Release the decoder and the stream. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.is_closed() {
            debug!("Closing {} archive", self.format);
            self.state = State::Closed;
        }
    }

    fn close_on_inconsistency<T>(&mut self, result: &Result<T>) {
        if let Err(e @ ArchiveError::FallbackInconsistency { .. }) = result {
            error!("Closing {} archive: {}", self.format, e);
            self.close();
        }
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("format", &self.format)
            .field("entries", &self.entries.len())
            .field("fallback", &self.uses_fallback())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Append fallback entries not yet in `entries`; ids follow listing order.
fn append_listing(entries: &mut EntryTable, listing: &[FallbackEntry]) {
    for (index, entry) in listing.iter().enumerate().skip(entries.len()) {
        entries.push(ParsedEntry {
            name: entry.name.clone(),
            uncompressed_size: entry.unpacked_size,
            offset: EntryOffset(index as u64),
            mod_time: ArchiveTime::Dos(entry.file_time),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::PADDING_LEN;
    use crate::fallback::testing::{MemoryEntry, MemoryUnrar};
    use crate::fallback::MIN_UNRAR_VERSION;
    use anyhow::Result;
    use std::fs::File;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use tracing_subscriber::EnvFilter;
    use zip::write::SimpleFileOptions;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// `a.txt` = "hello", `b/c.bin` empty
    fn sample_zip() -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("a.txt", options).unwrap();
        zip.write_all(b"hello").unwrap();
        zip.start_file("b/c.bin", options).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn sample_tar() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_ustar();
        header.set_size(11);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "Dir/File.TXT", &b"tar payload"[..])
            .unwrap();
        builder.into_inner().unwrap()
    }

    /// Valid RAR4 signature followed by bytes no RAR decoder accepts
    fn broken_rar() -> Vec<u8> {
        let mut bytes = b"Rar!\x1a\x07\x00".to_vec();
        bytes.extend_from_slice(&[0x5A; 64]);
        bytes
    }

    fn fallback_config(version: u32) -> ArchiveConfig {
        let engine = MemoryUnrar::new(
            version,
            vec![
                MemoryEntry::dir("Scans"),
                MemoryEntry::file("Scans\\Page01.JPG", b"\xFF\xD8\xFFpage one"),
                MemoryEntry::file("Scans\\Page02.JPG", b"\xFF\xD8\xFFpage two"),
            ],
        );
        ArchiveConfig::default().with_unrar_engine(Arc::new(engine))
    }

    #[test]
    fn test_zip_scenario() -> Result<()> {
        init_tracing();
        let mut archive = Archive::open(ArchiveFormat::zip(), sample_zip())?;

        let entries = archive.entries()?;
        assert_eq!(entries.len(), 2);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.id, i);
        }

        let a = archive.find_id("a.txt").unwrap();
        let data = archive.extract_by_id(a)?;
        assert_eq!(data.as_bytes(), b"hello");
        assert_eq!(data.len(), 5);
        assert_eq!(&data.with_padding()[5..], &[0u8; PADDING_LEN]);

        let empty = archive.extract_by_name("b/c.bin")?;
        assert!(empty.is_empty());
        assert_eq!(empty.with_padding(), &[0u8; PADDING_LEN]);

        assert_eq!(archive.global_comment()?, None);
        Ok(())
    }

    #[test]
    fn test_7z_scenario() -> Result<()> {
        let mut writer = sevenz_rust2::ArchiveWriter::new(Cursor::new(Vec::new()))?;
        writer.push_archive_entry::<&[u8]>(sevenz_rust2::ArchiveEntry::new_directory("b"), None)?;
        writer.push_archive_entry(sevenz_rust2::ArchiveEntry::new_file("a.txt"), Some(&b"hello"[..]))?;
        writer.push_archive_entry::<&[u8]>(sevenz_rust2::ArchiveEntry::new_file("b/c.bin"), None)?;
        writer.push_archive_entry(sevenz_rust2::ArchiveEntry::new_file("dup.txt"), Some(&b"one"[..]))?;
        writer.push_archive_entry(sevenz_rust2::ArchiveEntry::new_file("dup.txt"), Some(&b"two"[..]))?;
        let bytes = writer.finish()?.into_inner();

        let mut archive = Archive::open(ArchiveFormat::SevenZip, bytes)?;
        let names: Vec<&str> = archive.entries()?.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b/c.bin", "dup.txt", "dup.txt"]);

        let data = archive.extract_by_name("a.txt")?;
        assert_eq!(data.as_bytes(), b"hello");
        assert_eq!(&data.with_padding()[5..], &[0u8; PADDING_LEN]);
        assert!(archive.extract_by_name("b/c.bin")?.is_empty());

        // Same name, different ids, different contents
        assert_eq!(archive.extract_by_id(2)?.as_bytes(), b"one");
        assert_eq!(archive.extract_by_id(3)?.as_bytes(), b"two");
        assert_eq!(archive.extract_by_name("DUP.TXT")?.as_bytes(), b"one");
        Ok(())
    }

    #[test]
    fn test_rar_primary_scenario() -> Result<()> {
        let bytes = include_bytes!("decoder/testdata/stored.rar").to_vec();
        let mut archive = Archive::open_with(ArchiveFormat::Rar, bytes, &fallback_config(MIN_UNRAR_VERSION))?;
        assert!(!archive.uses_fallback());

        let names: Vec<&str> = archive.entries()?.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["docs/readme.txt", "notes.txt"]);
        assert_eq!(archive.extract_by_name("Docs/ReadMe.txt")?.as_bytes(), b"read me first");
        assert_eq!(archive.extract_by_id(1)?.as_bytes(), b"hi");
        Ok(())
    }

    #[test]
    fn test_archive_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Archive>();
    }

    #[test]
    fn test_open_from_file() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = dir.path().join("sample.zip");
        File::create(&zip_path)?.write_all(&sample_zip())?;

        let mut archive = Archive::open_zip(zip_path.as_path(), false)?;
        assert_eq!(archive.extract_by_name("A.TXT")?.as_bytes(), b"hello");
        Ok(())
    }

    #[test]
    fn test_open_from_reader() -> Result<()> {
        let source = StreamSource::reader(Cursor::new(sample_tar()));
        let mut archive = Archive::open(ArchiveFormat::Tar, source)?;
        assert_eq!(archive.extract_by_id(0)?.as_bytes(), b"tar payload");
        Ok(())
    }

    #[test]
    fn test_find_id_ignores_case() -> Result<()> {
        let archive = Archive::open_tar(sample_tar())?;
        assert_eq!(archive.find_id("dir/file.txt"), Some(0));
        assert_eq!(archive.find_id("DIR/FILE.TXT"), Some(0));
        assert_eq!(archive.find_id("dir\\file.txt"), None);
        Ok(())
    }

    #[test]
    fn test_repeated_extraction_is_identical() -> Result<()> {
        let mut archive = Archive::open(ArchiveFormat::zip(), sample_zip())?;
        let first = archive.extract_by_id(0)?;
        let second = archive.extract_by_id(0)?;
        assert_eq!(first.as_bytes(), second.as_bytes());
        Ok(())
    }

    #[test]
    fn test_id_past_the_end() -> Result<()> {
        let mut archive = Archive::open(ArchiveFormat::zip(), sample_zip())?;
        let count = archive.entries()?.len();
        let err = archive.extract_by_id(count).unwrap_err();
        assert!(matches!(err, ArchiveError::EntryNotFound(_)));
        assert!(err.is_local_to_entry());
        assert!(!ArchiveError::Closed.is_local_to_entry());

        // the handle is still usable
        assert_eq!(archive.extract_by_id(0)?.as_bytes(), b"hello");
        Ok(())
    }

    #[test]
    fn test_duplicate_names_first_match_wins() -> Result<()> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("dup.txt", options)?;
        zip.write_all(b"first")?;
        // the zip writer refuses exact duplicates, case variants are fine
        zip.start_file("DUP.TXT", options)?;
        zip.write_all(b"second")?;
        let bytes = zip.finish()?.into_inner();

        let mut archive = Archive::open(ArchiveFormat::zip(), bytes)?;
        assert_eq!(archive.entries()?.len(), 2);
        assert_eq!(archive.find_id("Dup.Txt"), Some(0));
        assert_eq!(archive.extract_by_name("DUP.TXT")?.as_bytes(), b"first");
        assert_eq!(archive.extract_by_id(1)?.as_bytes(), b"second");
        Ok(())
    }

    #[test]
    fn test_deflated_only_zip() -> Result<()> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        zip.start_file("stored.txt", stored)?;
        zip.write_all(b"stored data")?;
        zip.start_file("deflated.txt", deflated)?;
        zip.write_all(b"deflated data")?;
        let bytes = zip.finish()?.into_inner();

        let mut archive = Archive::open_zip(bytes, true)?;
        assert!(matches!(
            archive.extract_by_name("stored.txt"),
            Err(ArchiveError::DecodeFailure { .. })
        ));
        assert_eq!(archive.extract_by_name("deflated.txt")?.as_bytes(), b"deflated data");
        Ok(())
    }

    #[test]
    fn test_corrupted_first_byte_fails() {
        let mut tar_bytes = sample_tar();
        tar_bytes[0] ^= 0xFF;
        assert!(Archive::open(ArchiveFormat::Tar, tar_bytes).is_err());

        let mut seven_zip = vec![0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
        seven_zip.extend_from_slice(&[0u8; 32]);
        seven_zip[0] ^= 0xFF;
        assert!(Archive::open(ArchiveFormat::SevenZip, seven_zip).is_err());

        // The central directory is intact, the local header signature is not
        let mut zip_bytes = sample_zip();
        zip_bytes[0] ^= 0xFF;
        let err = Archive::open(ArchiveFormat::zip(), zip_bytes).unwrap_err();
        assert!(matches!(err, ArchiveError::ParseFailure { format: ArchiveFormat::Zip { .. }, .. }));
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let dir = tempdir().unwrap();
        let err = Archive::open_7z(dir.path().join("missing.7z")).unwrap_err();
        assert!(matches!(err, ArchiveError::SourceUnavailable { path: Some(_), .. }));
    }

    #[test]
    fn test_close_is_idempotent() -> Result<()> {
        let mut archive = Archive::open(ArchiveFormat::zip(), sample_zip())?;
        archive.close();
        archive.close();

        assert!(matches!(archive.entries(), Err(ArchiveError::Closed)));
        assert!(matches!(archive.extract_by_id(0), Err(ArchiveError::Closed)));
        assert!(matches!(archive.extract_by_name("a.txt"), Err(ArchiveError::Closed)));
        assert!(matches!(archive.global_comment(), Err(ArchiveError::Closed)));
        assert_eq!(archive.find_id("a.txt"), None);
        Ok(())
    }

    #[test]
    fn test_open_detected() -> Result<()> {
        let config = ArchiveConfig::default();
        let archive = Archive::open_detected(sample_zip(), &config)?;
        assert_eq!(archive.format(), ArchiveFormat::zip());

        // Sniffing must leave the stream rewound for the decoder
        let mut archive = Archive::open_detected(StreamSource::reader(Cursor::new(sample_tar())), &config)?;
        assert_eq!(archive.format(), ArchiveFormat::Tar);
        assert_eq!(archive.entries()?.len(), 1);
        assert_eq!(archive.extract_by_id(0)?.as_bytes(), b"tar payload");

        let err = Archive::open_detected(b"not an archive".to_vec(), &config).unwrap_err();
        assert!(matches!(err, ArchiveError::UnknownFormat));
        Ok(())
    }

    #[test]
    fn test_rar_fallback_scenario() -> Result<()> {
        init_tracing();
        let mut archive = Archive::open_with(ArchiveFormat::Rar, broken_rar(), &fallback_config(MIN_UNRAR_VERSION))?;
        assert!(archive.uses_fallback());

        let names: Vec<&str> = archive.entries()?.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Scans/Page01.JPG", "Scans/Page02.JPG"]);

        assert_eq!(archive.extract_by_name("Scans/Page01.JPG")?.as_bytes(), b"\xFF\xD8\xFFpage one");
        let data = archive.extract_by_name("scans/page02.jpg")?;
        assert_eq!(data.as_bytes(), b"\xFF\xD8\xFFpage two");
        assert_eq!(&data.with_padding()[data.len()..], &[0u8; PADDING_LEN]);

        assert_eq!(archive.global_comment()?, None);
        archive.verify_listing()?;
        assert_eq!(archive.entries()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_rar_fallback_disabled() {
        let config = fallback_config(MIN_UNRAR_VERSION).without_rar_fallback();
        let err = Archive::open_with(ArchiveFormat::Rar, broken_rar(), &config).unwrap_err();
        assert!(matches!(err, ArchiveError::FallbackUnavailable(_)));
    }

    #[test]
    fn test_rar_fallback_engine_too_old() {
        let config = fallback_config(MIN_UNRAR_VERSION - 1);
        let err = Archive::open_with(ArchiveFormat::Rar, broken_rar(), &config).unwrap_err();
        assert!(matches!(err, ArchiveError::FallbackUnavailable(_)));
    }

    #[test]
    fn test_rar_fallback_with_empty_listing() {
        let engine = MemoryUnrar::new(MIN_UNRAR_VERSION, vec![MemoryEntry::dir("only-a-dir")]);
        let config = ArchiveConfig::default().with_unrar_engine(Arc::new(engine));
        let err = Archive::open_with(ArchiveFormat::Rar, broken_rar(), &config).unwrap_err();
        assert!(matches!(err, ArchiveError::ParseFailure { format: ArchiveFormat::Rar, .. }));
    }

    #[test]
    fn test_rar_fallback_inconsistency_closes_handle() -> Result<()> {
        let mut archive = Archive::open_with(ArchiveFormat::Rar, broken_rar(), &fallback_config(MIN_UNRAR_VERSION))?;

        // simulate the engine reporting a different listing than at open
        if let State::Fallback { listing, .. } = &mut archive.state {
            listing[0].name = "Scans/Cover.JPG".to_string();
        }
        let err = archive.verify_listing().unwrap_err();
        assert!(matches!(err, ArchiveError::FallbackInconsistency { index: 0, .. }));
        assert!(archive.is_closed());
        assert!(matches!(archive.extract_by_id(0), Err(ArchiveError::Closed)));
        Ok(())
    }
}
