//! FAT16 Boot Sector Structure
//!
//! Fields are decoded and encoded explicitly in little-endian order; the
//! struct layout in memory never mirrors the disk.

use super::constants::*;
use crate::filesys::FsError;

/// Represents the boot sector of a FAT16 filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSector {
    /// Jump instruction to boot code
    pub jump_boot: [u8; 3],

    /// Name of the system that formatted the volume
    pub oem_name: [u8; 8],

    /// Number of bytes per sector
    pub bytes_per_sector: u16,

    /// Number of sectors per cluster
    pub sectors_per_cluster: u8,

    /// Number of reserved sectors at start of volume
    /// Including the boot sector. Typically 1 for FAT16
    pub reserved_sectors: u16,

    /// Number of FAT copies
    pub fat_count: u8,

    /// Maximum number of root directory entries
    pub root_dir_entries: u16,

    /// Total number of sectors (16-bit)
    /// Used if volume is smaller than 32MB, otherwise use total_sectors_32
    pub total_sectors_16: u16,

    /// Media type descriptor
    pub media_type: u8,

    /// Sectors per FAT
    pub sectors_per_fat: u16,

    pub sectors_per_track: u16,
    pub head_count: u16,
    pub hidden_sectors: u32,

    /// Total number of sectors (32-bit)
    pub total_sectors_32: u32,

    pub drive_number: u8,
    pub boot_signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],

    /// Bytes 510..512, 0xAA55 on a valid volume
    pub signature: u16,
}

fn le16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn put16(b: &mut [u8], at: usize, v: u16) {
    b[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(b: &mut [u8], at: usize, v: u32) {
    b[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

impl BootSector {
    /// Decodes sector 0 without validating it
    pub fn decode(sector: &[u8; BLOCK_SIZE]) -> Self {
        let mut jump_boot = [0u8; 3];
        jump_boot.copy_from_slice(&sector[0..3]);
        let mut oem_name = [0u8; 8];
        oem_name.copy_from_slice(&sector[3..11]);
        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&sector[43..54]);
        let mut fs_type = [0u8; 8];
        fs_type.copy_from_slice(&sector[54..62]);

        Self {
            jump_boot,
            oem_name,
            bytes_per_sector: le16(sector, 11),
            sectors_per_cluster: sector[13],
            reserved_sectors: le16(sector, 14),
            fat_count: sector[16],
            root_dir_entries: le16(sector, 17),
            total_sectors_16: le16(sector, 19),
            media_type: sector[21],
            sectors_per_fat: le16(sector, 22),
            sectors_per_track: le16(sector, 24),
            head_count: le16(sector, 26),
            hidden_sectors: le32(sector, 28),
            total_sectors_32: le32(sector, 32),
            drive_number: sector[36],
            boot_signature: sector[38],
            volume_id: le32(sector, 39),
            volume_label,
            fs_type,
            signature: le16(sector, 510),
        }
    }

    /// Decodes and checks the jump bytes, partition signature and sector size
    pub fn parse(sector: &[u8; BLOCK_SIZE]) -> Result<Self, FsError> {
        let bs = Self::decode(sector);
        if bs.jump_boot[0] != JUMP_SHORT || bs.jump_boot[2] != JUMP_NOP {
            log::debug!("rejecting boot sector: jump bytes {:02x?}", bs.jump_boot);
            return Err(FsError::BadSuperblock);
        }
        if bs.signature != PARTITION_SIGNATURE {
            log::debug!("rejecting boot sector: signature {:#06x}", bs.signature);
            return Err(FsError::BadSuperblock);
        }
        if bs.bytes_per_sector as usize != BLOCK_SIZE {
            log::debug!(
                "rejecting boot sector: {} bytes per sector",
                bs.bytes_per_sector
            );
            return Err(FsError::BadSuperblock);
        }
        Ok(bs)
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut s = [0u8; BLOCK_SIZE];
        s[0..3].copy_from_slice(&self.jump_boot);
        s[3..11].copy_from_slice(&self.oem_name);
        put16(&mut s, 11, self.bytes_per_sector);
        s[13] = self.sectors_per_cluster;
        put16(&mut s, 14, self.reserved_sectors);
        s[16] = self.fat_count;
        put16(&mut s, 17, self.root_dir_entries);
        put16(&mut s, 19, self.total_sectors_16);
        s[21] = self.media_type;
        put16(&mut s, 22, self.sectors_per_fat);
        put16(&mut s, 24, self.sectors_per_track);
        put16(&mut s, 26, self.head_count);
        put32(&mut s, 28, self.hidden_sectors);
        put32(&mut s, 32, self.total_sectors_32);
        s[36] = self.drive_number;
        s[38] = self.boot_signature;
        put32(&mut s, 39, self.volume_id);
        s[43..54].copy_from_slice(&self.volume_label);
        s[54..62].copy_from_slice(&self.fs_type);
        put16(&mut s, 510, self.signature);
        s
    }

    /// Whichever of the 16- and 32-bit sector counts is in use
    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 != 0 {
            self.total_sectors_16 as u32
        } else {
            self.total_sectors_32
        }
    }
}
