//! FAT16 directory entry structures and operations

use super::constants::*;
use super::timestamps::DateTime;
use arrayvec::ArrayString;
use bitflags::bitflags;

bitflags! {
    /// Attribute byte of a directory entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        /// Marks a long-filename fragment, not a real entry
        const LONG_NAME = Self::READ_ONLY.bits()
            | Self::HIDDEN.bits()
            | Self::SYSTEM.bits()
            | Self::VOLUME_ID.bits();
        const _ = !0;
    }
}

/// What a raw 32-byte slot holds
#[derive(Debug, PartialEq, Eq)]
pub enum SlotKind {
    EndOfDirectory,
    Deleted,
    LongName,
    VolumeLabel,
    Short,
}

/// Classifies a slot by its first byte and attribute byte, in the order
/// directory scanning tests them
pub fn classify(raw: &[u8]) -> SlotKind {
    match raw[0] {
        END_OF_DIRECTORY => SlotKind::EndOfDirectory,
        DELETED_ENTRY_MARKER => SlotKind::Deleted,
        _ => {
            let attr = Attributes::from_bits_retain(raw[11]);
            if attr & Attributes::from_bits_retain(0x3F) == Attributes::LONG_NAME {
                SlotKind::LongName
            } else if attr.contains(Attributes::VOLUME_ID) {
                SlotKind::VolumeLabel
            } else {
                SlotKind::Short
            }
        }
    }
}

/// 8.3 format directory entry (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortDirEntry {
    /// 8 character filename + 3 character extension, space padded
    pub name: [u8; 11],
    pub attributes: Attributes,
    /// 10 ms units refining the creation time
    pub create_tenths: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub access_date: u16,
    /// Always zero on FAT16
    pub first_cluster_high: u16,
    pub modify_time: u16,
    pub modify_date: u16,
    pub first_cluster_low: u16,
    /// File size in bytes
    pub file_size: u32,
}

impl ShortDirEntry {
    pub fn new(name: [u8; 11], attributes: Attributes, first_cluster: u16, now: DateTime) -> Self {
        let (date, time, tenths) = now.to_fat();
        Self {
            name,
            attributes,
            create_tenths: tenths,
            create_time: time,
            create_date: date,
            access_date: date,
            first_cluster_high: 0,
            modify_time: time,
            modify_date: date,
            first_cluster_low: first_cluster,
            file_size: 0,
        }
    }

    pub fn decode(raw: &[u8]) -> Self {
        let le16 = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);
        let mut name = [0u8; 11];
        name.copy_from_slice(&raw[0..11]);
        Self {
            name,
            attributes: Attributes::from_bits_retain(raw[11]),
            create_tenths: raw[13],
            create_time: le16(14),
            create_date: le16(16),
            access_date: le16(18),
            first_cluster_high: le16(20),
            modify_time: le16(22),
            modify_date: le16(24),
            first_cluster_low: le16(26),
            file_size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        raw[0..11].copy_from_slice(&self.name);
        raw[11] = self.attributes.bits();
        raw[12] = 0;
        raw[13] = self.create_tenths;
        raw[14..16].copy_from_slice(&self.create_time.to_le_bytes());
        raw[16..18].copy_from_slice(&self.create_date.to_le_bytes());
        raw[18..20].copy_from_slice(&self.access_date.to_le_bytes());
        raw[20..22].copy_from_slice(&self.first_cluster_high.to_le_bytes());
        raw[22..24].copy_from_slice(&self.modify_time.to_le_bytes());
        raw[24..26].copy_from_slice(&self.modify_date.to_le_bytes());
        raw[26..28].copy_from_slice(&self.first_cluster_low.to_le_bytes());
        raw[28..32].copy_from_slice(&self.file_size.to_le_bytes());
    }

    /// Both halves combined; only the low half is meaningful on FAT16
    pub fn first_cluster(&self) -> u32 {
        ((self.first_cluster_high as u32) << 16) | self.first_cluster_low as u32
    }

    /// Returns true if entry is a directory
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    pub fn created(&self) -> DateTime {
        DateTime::from_fat_precise(self.create_date, self.create_time, self.create_tenths)
    }

    pub fn accessed(&self) -> DateTime {
        DateTime::from_fat(self.access_date, 0)
    }

    pub fn modified(&self) -> DateTime {
        DateTime::from_fat(self.modify_date, self.modify_time)
    }

    /// Returns the filename as "NAME.EXT", or "NAME" with no extension
    pub fn display_name(&self) -> ArrayString<12> {
        display_name_of(&self.name)
    }
}

/// Renders a raw 11-byte short name: trailing spaces trimmed, a `.` only
/// when the extension is non-empty, and a leading 0x05 read back as 0xE5
pub fn display_name_of(name: &[u8; 11]) -> ArrayString<12> {
    let mut out = ArrayString::new();
    let base_end = name[..8]
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |p| p + 1);
    let ext_end = name[8..]
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |p| p + 1);

    for (i, &b) in name[..base_end].iter().enumerate() {
        let b = if i == 0 && b == KANJI_E5_ESCAPE {
            DELETED_ENTRY_MARKER
        } else {
            b
        };
        out.push(display_char(b));
    }
    if ext_end > 0 {
        out.push('.');
        for &b in &name[8..8 + ext_end] {
            out.push(display_char(b));
        }
    }
    out
}

/// Bytes outside ASCII have no codepage here and show as the placeholder
fn display_char(b: u8) -> char {
    if b.is_ascii() {
        b as char
    } else {
        READ_PLACEHOLDER as char
    }
}

/// Long filename fragment (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LfnEntry {
    pub order: u8,
    /// 5 + 6 + 2 UTF-16 code units, in name order
    pub units: [u16; LFN_CHARS_PER_ENTRY],
    pub checksum: u8,
}

/// Byte offsets of the 13 code units inside a fragment
const LFN_UNIT_OFFSETS: [usize; LFN_CHARS_PER_ENTRY] =
    [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

impl LfnEntry {
    pub fn decode(raw: &[u8]) -> Self {
        let mut units = [0u16; LFN_CHARS_PER_ENTRY];
        for (unit, &at) in units.iter_mut().zip(LFN_UNIT_OFFSETS.iter()) {
            *unit = u16::from_le_bytes([raw[at], raw[at + 1]]);
        }
        Self {
            order: raw[0],
            units,
            checksum: raw[13],
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        raw[..32].fill(0);
        raw[0] = self.order;
        raw[11] = Attributes::LONG_NAME.bits();
        raw[13] = self.checksum;
        for (unit, &at) in self.units.iter().zip(LFN_UNIT_OFFSETS.iter()) {
            raw[at..at + 2].copy_from_slice(&unit.to_le_bytes());
        }
    }

    /// 1-based position of this fragment within the name
    pub fn index(&self) -> usize {
        (self.order & LFN_ORDER_MASK) as usize
    }

    pub fn is_last(&self) -> bool {
        self.order & LFN_LAST_FRAGMENT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short(name: &[u8; 11]) -> ShortDirEntry {
        ShortDirEntry::new(*name, Attributes::ARCHIVE, 5, DateTime::EPOCH)
    }

    #[test]
    fn test_display_with_extension() {
        assert_eq!(short(b"FOO     BAR").display_name().as_str(), "FOO.BAR");
    }

    #[test]
    fn test_display_without_extension() {
        assert_eq!(short(b"README     ").display_name().as_str(), "README");
        assert_eq!(short(b"FULLNAMEEXT").display_name().as_str(), "FULLNAME.EXT");
    }

    #[test]
    fn test_dot_entries() {
        assert_eq!(short(b".          ").display_name().as_str(), ".");
        assert_eq!(short(b"..         ").display_name().as_str(), "..");
    }

    #[test]
    fn test_escaped_e5_first_byte() {
        let entry = short(b"\x05ABC    TXT");
        // 0xE5 is not ASCII, so it displays as the placeholder
        assert_eq!(entry.display_name().as_str(), "?ABC.TXT");

        let mut raw = [0u8; 32];
        entry.encode(&mut raw);
        assert_eq!(classify(&raw), SlotKind::Short);
    }

    #[test]
    fn test_field_round_trip_and_offsets() {
        let mut entry = short(b"DATA    BIN");
        entry.file_size = 0x0102_0304;
        entry.first_cluster_low = 0xBEEF;
        let mut raw = [0u8; 32];
        entry.encode(&mut raw);
        assert_eq!(&raw[26..28], &[0xEF, 0xBE]);
        assert_eq!(&raw[28..32], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(ShortDirEntry::decode(&raw), entry);
        assert_eq!(entry.first_cluster(), 0xBEEF);
    }

    #[test]
    fn test_classify_order() {
        let mut raw = [0u8; 32];
        assert_eq!(classify(&raw), SlotKind::EndOfDirectory);
        raw[0] = DELETED_ENTRY_MARKER;
        raw[11] = Attributes::LONG_NAME.bits();
        assert_eq!(classify(&raw), SlotKind::Deleted);
        raw[0] = 0x41;
        assert_eq!(classify(&raw), SlotKind::LongName);
        raw[11] = (Attributes::VOLUME_ID | Attributes::ARCHIVE).bits();
        assert_eq!(classify(&raw), SlotKind::VolumeLabel);
        raw[11] = Attributes::DIRECTORY.bits();
        assert_eq!(classify(&raw), SlotKind::Short);
    }

    #[test]
    fn test_lfn_unit_layout() {
        let mut raw = [0u8; 32];
        let entry = LfnEntry {
            order: 0x42,
            units: [
                b'a' as u16, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 0x263A,
            ],
            checksum: 0x99,
        };
        entry.encode(&mut raw);
        assert_eq!(raw[1], b'a');
        assert_eq!(raw[11], 0x0F);
        assert_eq!(&raw[30..32], &[0x3A, 0x26]);
        assert_eq!(&raw[26..28], &[0, 0]);
        let back = LfnEntry::decode(&raw);
        assert_eq!(back, entry);
        assert_eq!(back.index(), 2);
        assert!(back.is_last());
    }
}
