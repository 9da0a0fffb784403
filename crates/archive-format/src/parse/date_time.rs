//! MS-DOS and NTFS timestamp conversion.

use chrono::{DateTime, NaiveDate, Utc};

/// A packed MS-DOS date+time pair (2-second resolution, 1980-based year).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsdosTimestamp {
    /// Packed time: bits 15-11 hour, 10-5 minute, 4-0 seconds/2.
    pub time: u16,
    /// Packed date: bits 15-9 year-1980, 8-5 month, 4-0 day.
    pub date: u16,
}

impl MsdosTimestamp {
    /// Convert to a UTC `DateTime`, or `None` if the packed fields don't form
    /// a valid calendar date/time (e.g. the all-zero sentinel).
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let year = 1980 + ((self.date >> 9) & 0x7f) as i32;
        let month = ((self.date >> 5) & 0x0f) as u32;
        let day = (self.date & 0x1f) as u32;
        let hour = ((self.time >> 11) & 0x1f) as u32;
        let minute = ((self.time >> 5) & 0x3f) as u32;
        let second = ((self.time & 0x1f) as u32) * 2;

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = date.and_hms_opt(hour, minute, second)?;
        Some(DateTime::from_naive_utc_and_offset(time, Utc))
    }

    /// Pack a UTC `DateTime` into an MS-DOS timestamp, clamping to the
    /// format's 1980-2107 range and 2-second resolution.
    pub fn from_datetime(dt: DateTime<Utc>) -> MsdosTimestamp {
        use chrono::Datelike;
        use chrono::Timelike;
        let year = (dt.year() - 1980).clamp(0, 127) as u16;
        let date = (year << 9) | ((dt.month() as u16) << 5) | (dt.day() as u16);
        let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | ((dt.second() as u16) / 2);
        MsdosTimestamp { time, date }
    }
}

/// A 64-bit NTFS timestamp: 100ns ticks since 1601-01-01 00:00:00 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtfsTimestamp {
    /// Raw 100ns-tick count since the NTFS epoch.
    pub timestamp: u64,
}

const NTFS_EPOCH_DIFF_100NS: i64 = 116_444_736_000_000_000;

impl NtfsTimestamp {
    /// Convert to a UTC `DateTime`.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let ticks = self.timestamp as i64 - NTFS_EPOCH_DIFF_100NS;
        let secs = ticks.div_euclid(10_000_000);
        let nanos = (ticks.rem_euclid(10_000_000)) * 100;
        DateTime::from_timestamp(secs, nanos as u32)
    }
}

/// The Unix epoch, used as the zero value for timestamps that could not be
/// determined (and for deterministic TAR/ZIP normalization).
pub fn zero_datetime() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msdos_roundtrip_stable() {
        let original = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let packed = MsdosTimestamp::from_datetime(original);
        let back = packed.to_datetime().unwrap();
        // 2-second resolution only.
        assert!((back.timestamp() - original.timestamp()).abs() <= 2);
    }

    #[test]
    fn ntfs_epoch_is_1601() {
        let ts = NtfsTimestamp { timestamp: NTFS_EPOCH_DIFF_100NS as u64 };
        let dt = ts.to_datetime().unwrap();
        assert_eq!(dt.timestamp(), 0);
    }
}
