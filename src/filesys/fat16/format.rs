//! Laying down an empty FAT16 volume

use super::*;

/// Shape of a freshly formatted volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Power of two between 1 and 128
    pub sectors_per_cluster: u8,
    /// Multiple of 16, so the root directory fills whole sectors
    pub root_entries: u16,
    pub fat_count: u8,
    pub volume_label: [u8; 11],
    pub volume_id: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            sectors_per_cluster: 4, // Typically 4 for small drives
            root_entries: ROOT_DIR_ENTRIES,
            fat_count: 2,
            volume_label: *NO_NAME_LABEL,
            volume_id: 0x12345678,
        }
    }
}

const NO_NAME_LABEL: &[u8; 11] = b"NO NAME    ";
const RESERVED_SECTORS: u16 = 1;
const MEDIA_FIXED_DISK: u8 = 0xF8;

impl FormatOptions {
    fn validate(&self) -> Result<(), FsError> {
        let spc = self.sectors_per_cluster;
        if spc == 0 || spc > 128 || !spc.is_power_of_two() {
            return Err(FsError::InvalidArgument);
        }
        if self.root_entries == 0 || self.root_entries % 16 != 0 || self.fat_count == 0 {
            return Err(FsError::InvalidArgument);
        }
        Ok(())
    }

    /// Boot sector for a device of `total_blocks` sectors
    fn boot_sector(&self, total_blocks: u32) -> BootSector {
        let spc = self.sectors_per_cluster as u32;
        let root_dir_sectors =
            (self.root_entries as u32 * DIR_ENTRY_SIZE as u32).div_ceil(BLOCK_SIZE as u32);
        let estimated_clusters = total_blocks
            .saturating_sub(RESERVED_SECTORS as u32 + root_dir_sectors)
            / spc;
        let sectors_per_fat = ((estimated_clusters + FIRST_DATA_CLUSTER) * FAT_ENTRY_SIZE as u32)
            .div_ceil(BLOCK_SIZE as u32)
            .min(u16::MAX as u32);

        BootSector {
            jump_boot: [JUMP_SHORT, 0x3C, JUMP_NOP],
            oem_name: *b"UTTAOS.0",
            bytes_per_sector: BLOCK_SIZE as u16,
            sectors_per_cluster: self.sectors_per_cluster,
            reserved_sectors: RESERVED_SECTORS,
            fat_count: self.fat_count,
            root_dir_entries: self.root_entries,
            total_sectors_16: if total_blocks < 65536 {
                total_blocks as u16
            } else {
                0
            },
            media_type: MEDIA_FIXED_DISK,
            sectors_per_fat: sectors_per_fat as u16,
            sectors_per_track: 63,
            head_count: 255,
            hidden_sectors: 0,
            total_sectors_32: if total_blocks >= 65536 { total_blocks } else { 0 },
            drive_number: 0x80, // Hard disk
            boot_signature: 0x29,
            volume_id: self.volume_id,
            volume_label: self.volume_label,
            fs_type: *b"FAT16   ",
            signature: PARTITION_SIGNATURE,
        }
    }
}

impl<'a> Fat16<'a> {
    /// Writes an empty FAT16 layout over the whole device and mounts it
    pub fn format(
        mut device: Box<dyn BlockDevice + 'a>,
        options: &FormatOptions,
    ) -> Result<Self, FsError> {
        options.validate()?;
        if device.block_size() != BLOCK_SIZE {
            return Err(FsError::InvalidArgument);
        }
        let total_blocks =
            u32::try_from(device.total_blocks()).map_err(|_| FsError::InvalidArgument)?;

        let boot_sector = options.boot_sector(total_blocks);
        let geometry = Geometry::from_boot_sector(&boot_sector).map_err(|_| {
            log::warn!(
                "fat16: cannot format {} sectors with {} sectors per cluster",
                total_blocks,
                options.sectors_per_cluster
            );
            FsError::InvalidArgument
        })?;

        device.write_block(0, &boot_sector.encode())?;

        let zero_block = [0u8; BLOCK_SIZE];
        let mut first_fat_block = [0u8; BLOCK_SIZE];
        // Entries 0 and 1 are reserved: media byte, then end of chain
        FatEntry {
            cluster: 0xFF00 | boot_sector.media_type as u16,
        }
        .encode(&mut first_fat_block[0..]);
        FatEntry::END.encode(&mut first_fat_block[FAT_ENTRY_SIZE..]);

        for copy in 0..geometry.fat_count {
            let fat_start =
                geometry.first_fat_sector as u64 + copy as u64 * geometry.sectors_per_fat as u64;
            device.write_block(fat_start, &first_fat_block)?;
            for j in 1..geometry.sectors_per_fat as u64 {
                device.write_block(fat_start + j, &zero_block)?;
            }
        }

        let root_start = geometry.root_dir_first_sector as u64;
        for i in 0..geometry.root_dir_sectors as u64 {
            device.write_block(root_start + i, &zero_block)?;
        }

        if &options.volume_label != NO_NAME_LABEL {
            let mut root_block = [0u8; BLOCK_SIZE];
            let label = ShortDirEntry::new(
                options.volume_label,
                Attributes::VOLUME_ID,
                0,
                DateTime::EPOCH,
            );
            label.encode(&mut root_block[..DIR_ENTRY_SIZE]);
            device.write_block(root_start, &root_block)?;
        }

        log::info!(
            "fat16: formatted {} sectors, {} clusters of {} bytes",
            total_blocks,
            geometry.total_clusters,
            geometry.bytes_per_cluster
        );
        Fat16::mount(device, MountOptions::default())
    }
}
