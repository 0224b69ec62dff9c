//! FAT packed date/time conversion
//!
//! Dates pack as `yyyyyyym mmmddddd` (years since 1980), times as
//! `hhhhhmmm mmmsssss` (two-second resolution). The creation timestamp
//! carries an extra byte of 10 ms units that refines the seconds.

/// Wall-clock fields decoded from a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millis: u16,
}

impl DateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant
    pub const EPOCH: DateTime = DateTime {
        year: 1980,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
        millis: 0,
    };

    /// Combines a packed date with a packed time
    pub fn from_fat(date: u16, time: u16) -> Self {
        let (year, month, day) = decode_date(date);
        let (hour, minute, second) = decode_time(time);
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millis: 0,
        }
    }

    /// Creation stamps add a 0..=199 count of 10 ms units
    pub fn from_fat_precise(date: u16, time: u16, tenths: u8) -> Self {
        let mut dt = Self::from_fat(date, time);
        let extra = tenths.min(199) as u16 * 10;
        dt.second += (extra / 1000) as u8;
        dt.millis = extra % 1000;
        dt
    }

    /// Returns `(date, time, tenths)` in on-disk form
    pub fn to_fat(&self) -> (u16, u16, u8) {
        let tenths = (self.second % 2) * 100 + (self.millis / 10).min(99) as u8;
        (
            encode_date(self.year, self.month, self.day),
            encode_time(self.hour, self.minute, self.second),
            tenths,
        )
    }
}

impl Default for DateTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

/// Returns `(year, month, day)`
pub fn decode_date(date: u16) -> (u16, u8, u8) {
    let year = 1980 + (date >> 9);
    let month = ((date >> 5) & 0x0F) as u8;
    let day = (date & 0x1F) as u8;
    (year, month, day)
}

/// Returns `(hour, minute, second)`
pub fn decode_time(time: u16) -> (u8, u8, u8) {
    let hour = (time >> 11) as u8;
    let minute = ((time >> 5) & 0x3F) as u8;
    let second = ((time & 0x1F) * 2) as u8;
    (hour, minute, second)
}

/// Years outside 1980..=2107 are clamped
pub fn encode_date(year: u16, month: u8, day: u8) -> u16 {
    let year = year.clamp(1980, 2107) - 1980;
    (year << 9) | (((month & 0x0F) as u16) << 5) | (day & 0x1F) as u16
}

pub fn encode_time(hour: u8, minute: u8, second: u8) -> u16 {
    (((hour & 0x1F) as u16) << 11) | (((minute & 0x3F) as u16) << 5) | (second / 2) as u16
}
