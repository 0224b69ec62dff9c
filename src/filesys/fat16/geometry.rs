//! Volume geometry derived from the boot sector

use super::boot_sector::BootSector;
use super::constants::*;
use crate::filesys::FsError;

/// Derived layout of a mounted volume. Immutable after mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub total_sectors: u32,
    pub total_data_sectors: u32,
    pub first_fat_sector: u32,
    pub sectors_per_fat: u32,
    pub fat_count: u8,
    pub root_dir_first_sector: u32,
    pub root_dir_sectors: u32,
    /// Pseudo-clusters the root directory spans
    pub root_cluster_count: u32,
    pub first_data_sector: u32,
    pub total_clusters: u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster: usize,
}

impl Geometry {
    pub fn from_boot_sector(bs: &BootSector) -> Result<Self, FsError> {
        if bs.sectors_per_cluster == 0
            || bs.reserved_sectors == 0
            || bs.fat_count == 0
            || bs.sectors_per_fat == 0
        {
            return Err(FsError::BadSuperblock);
        }

        let sectors_per_cluster = bs.sectors_per_cluster as u32;
        let sectors_per_fat = bs.sectors_per_fat as u32;
        let first_fat_sector = bs.reserved_sectors as u32;
        let root_dir_first_sector = first_fat_sector + bs.fat_count as u32 * sectors_per_fat;
        let root_dir_sectors =
            (bs.root_dir_entries as u32 * DIR_ENTRY_SIZE as u32).div_ceil(BLOCK_SIZE as u32);
        let first_data_sector = root_dir_first_sector + root_dir_sectors;
        let total_sectors = bs.total_sectors();
        let total_data_sectors = total_sectors
            .checked_sub(first_data_sector)
            .ok_or(FsError::BadSuperblock)?;
        let total_clusters = total_data_sectors / sectors_per_cluster;

        // Every data cluster needs a FAT slot, and cluster numbers must stay
        // below the end-of-chain range
        let fat_slots = sectors_per_fat * FAT_ENTRIES_PER_SECTOR as u32;
        if total_clusters + FIRST_DATA_CLUSTER > fat_slots
            || total_clusters + FIRST_DATA_CLUSTER > END_OF_CHAIN
        {
            return Err(FsError::BadSuperblock);
        }

        Ok(Self {
            total_sectors,
            total_data_sectors,
            first_fat_sector,
            sectors_per_fat,
            fat_count: bs.fat_count,
            root_dir_first_sector,
            root_dir_sectors,
            root_cluster_count: root_dir_sectors.div_ceil(sectors_per_cluster),
            first_data_sector,
            total_clusters,
            sectors_per_cluster,
            bytes_per_cluster: sectors_per_cluster as usize * BLOCK_SIZE,
        })
    }

    /// One past the highest data cluster number
    pub fn cluster_limit(&self) -> u32 {
        self.total_clusters + FIRST_DATA_CLUSTER
    }

    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        (FIRST_DATA_CLUSTER..self.cluster_limit()).contains(&cluster)
    }

    pub fn is_root_cluster(&self, cluster: u32) -> bool {
        (ROOT_CLUSTER_BASE..ROOT_CLUSTER_BASE + self.root_cluster_count).contains(&cluster)
    }

    /// First sector of a data cluster or root pseudo-cluster, plus the
    /// number of sectors it may span
    pub fn cluster_extent(&self, cluster: u32) -> Result<(u64, u32), FsError> {
        if self.is_root_cluster(cluster) {
            let skipped = (cluster - ROOT_CLUSTER_BASE) * self.sectors_per_cluster;
            let len = (self.root_dir_sectors - skipped).min(self.sectors_per_cluster);
            Ok(((self.root_dir_first_sector + skipped) as u64, len))
        } else if self.is_data_cluster(cluster) {
            let first = (cluster - FIRST_DATA_CLUSTER) as u64 * self.sectors_per_cluster as u64
                + self.first_data_sector as u64;
            Ok((first, self.sectors_per_cluster))
        } else {
            Err(FsError::InvalidArgument)
        }
    }

    /// Sector holding the FAT slot of `cluster` in copy `copy`, and the
    /// slot's byte offset inside it
    pub fn fat_slot(&self, cluster: u32, copy: u8) -> (u64, usize) {
        let offset = cluster as usize * FAT_ENTRY_SIZE;
        let sector = self.first_fat_sector as u64
            + copy as u64 * self.sectors_per_fat as u64
            + (offset / BLOCK_SIZE) as u64;
        (sector, offset % BLOCK_SIZE)
    }
}
