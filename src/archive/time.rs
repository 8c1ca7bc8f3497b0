//! Archive-native timestamps.
//!
//! Every format stores modification times differently. We keep the raw value
//! and convert only when a caller asks for it.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::time::SystemTime;

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

/// Modification time as stored by the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveTime {
    /// No timestamp recorded
    #[default]
    Unknown,
    /// MS-DOS date (high 16 bits) and time (low 16 bits), local time (ZIP, RAR)
    Dos(u32),
    /// Seconds since the Unix epoch, UTC (TAR)
    Unix(i64),
    /// 100ns intervals since 1601-01-01, UTC (7z)
    FileTime(u64),
}

impl ArchiveTime {
    /// Build a DOS timestamp from separate date and time words.
    pub fn from_dos_parts(date: u16, time: u16) -> Self {
        ArchiveTime::Dos((u32::from(date) << 16) | u32::from(time))
    }

    /// The raw stored value, format-dependent.
    pub fn raw(&self) -> Option<u64> {
        match *self {
            ArchiveTime::Unknown => None,
            ArchiveTime::Dos(v) => Some(u64::from(v)),
            ArchiveTime::Unix(v) => Some(v as u64),
            ArchiveTime::FileTime(v) => Some(v),
        }
    }

    /// Convert to UTC. Returns `None` when no time was stored or the stored
    /// value is out of range.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match *self {
            ArchiveTime::Unknown => None,
            ArchiveTime::Dos(v) => {
                let date = (v >> 16) as u16;
                let time = v as u16;
                let naive = NaiveDate::from_ymd_opt(
                    1980 + i32::from(date >> 9),
                    u32::from((date >> 5) & 0x0F),
                    u32::from(date & 0x1F),
                )?
                .and_hms_opt(
                    u32::from(time >> 11),
                    u32::from((time >> 5) & 0x3F),
                    u32::from(time & 0x1F) * 2,
                )?;
                // DOS times carry no zone; archivers write local time
                Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|local| local.with_timezone(&Utc))
            }
            ArchiveTime::Unix(secs) => DateTime::from_timestamp(secs, 0),
            ArchiveTime::FileTime(ticks) => {
                let secs = (ticks / 10_000_000) as i64 - FILETIME_UNIX_OFFSET_SECS;
                let nanos = ((ticks % 10_000_000) * 100) as u32;
                DateTime::from_timestamp(secs, nanos)
            }
        }
    }

    pub fn to_system_time(&self) -> Option<SystemTime> {
        self.to_utc().map(SystemTime::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_unix_time() {
        let t = ArchiveTime::Unix(1_700_000_000);
        let utc = t.to_utc().unwrap();
        assert_eq!(utc.timestamp(), 1_700_000_000);
        assert_eq!(t.raw(), Some(1_700_000_000));
    }

    #[test]
    fn test_filetime() {
        // 2000-01-01T00:00:00Z
        let ticks = (946_684_800u64 + 11_644_473_600) * 10_000_000 + 5;
        let utc = ArchiveTime::FileTime(ticks).to_utc().unwrap();
        assert_eq!(utc.timestamp(), 946_684_800);
        assert_eq!(utc.timestamp_subsec_nanos(), 500);
    }

    #[test]
    fn test_dos_fields() {
        // 2015-06-21 13:45:30 local time
        let date = ((2015 - 1980) << 9) | (6 << 5) | 21;
        let time = (13 << 11) | (45 << 5) | (30 / 2);
        let t = ArchiveTime::from_dos_parts(date, time);
        let local = t.to_utc().unwrap().with_timezone(&Local);
        assert_eq!(local.year(), 2015);
        assert_eq!(local.month(), 6);
        assert_eq!(local.day(), 21);
        assert_eq!(local.hour(), 13);
        assert_eq!(local.minute(), 45);
        assert_eq!(local.second(), 30);
    }

    #[test]
    fn test_invalid_dos_date() {
        // month 0 does not exist
        assert_eq!(ArchiveTime::from_dos_parts(0, 0).to_utc(), None);
        assert_eq!(ArchiveTime::Unknown.to_utc(), None);
        assert_eq!(ArchiveTime::Unknown.to_system_time(), None);
    }
}
