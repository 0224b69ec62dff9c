//! Chain walking and cluster allocation over the FAT region
//!
//! Everything that mutates the FAT takes the caller's `FatState` guard, so
//! holding the `fat` lock is the only way in.

use super::*;

impl Fat16<'_> {
    /// Reads the FAT slot of a data cluster from the first FAT copy
    pub fn read_fat_entry(&self, cluster: u32) -> Result<FatEntry, FsError> {
        if !self.geometry.is_data_cluster(cluster) {
            return Err(FsError::InvalidArgument);
        }
        let (sector, offset) = self.geometry.fat_slot(cluster, 0);
        let mut buf = [0u8; BLOCK_SIZE];
        self.read_sector(sector, &mut buf)?;
        Ok(FatEntry::decode(&buf[offset..]))
    }

    /// Patches one FAT slot in the first copy, and in every other copy
    /// when mirroring is enabled
    pub(crate) fn write_fat_entry(
        &self,
        _state: &mut FatState,
        cluster: u32,
        entry: FatEntry,
    ) -> Result<(), FsError> {
        if !self.geometry.is_data_cluster(cluster) {
            return Err(FsError::InvalidArgument);
        }
        let copies = if self.options.mirror_fats {
            self.geometry.fat_count
        } else {
            1
        };
        let mut buf = [0u8; BLOCK_SIZE];
        for copy in 0..copies {
            let (sector, offset) = self.geometry.fat_slot(cluster, copy);
            self.read_sector(sector, &mut buf)?;
            entry.encode(&mut buf[offset..]);
            self.write_sector(sector, &buf)?;
        }
        Ok(())
    }

    /// Next cluster after `cluster`: the following root pseudo-cluster, the
    /// FAT successor of a data cluster, or an end-of-chain value
    pub fn next_cluster(&self, cluster: u32) -> Result<u32, FsError> {
        if self.geometry.is_root_cluster(cluster) {
            let next = cluster + 1;
            return Ok(if self.geometry.is_root_cluster(next) {
                next
            } else {
                CHAIN_END
            });
        }
        if is_end_of_chain(cluster) {
            return Ok(cluster);
        }
        if !self.geometry.is_data_cluster(cluster) {
            log::warn!("fat16: chain walk from invalid cluster {:#x}", cluster);
            return Ok(CHAIN_END);
        }

        let next = self.read_fat_entry(cluster)?.cluster as u32;
        log::trace!("fat16: cluster {} -> {:#x}", cluster, next);
        if is_end_of_chain(next) || self.geometry.is_data_cluster(next) {
            Ok(next)
        } else {
            log::warn!("fat16: cluster {} links to {:#x}, ending chain", cluster, next);
            Ok(CHAIN_END)
        }
    }

    /// Claims the first free cluster at or after the hint, wrapping once
    pub fn allocate_cluster(&self) -> Result<u32, FsError> {
        self.check_writable()?;
        let mut state = self.fat.lock();
        self.allocate_locked(&mut state)
    }

    pub(crate) fn allocate_locked(&self, state: &mut FatState) -> Result<u32, FsError> {
        let per_sector = FAT_ENTRIES_PER_SECTOR as u32;
        let limit = self.geometry.cluster_limit();
        let sectors = limit.div_ceil(per_sector);
        let start = (state.last_free_cluster / per_sector) % sectors;
        let mut buf = [0u8; BLOCK_SIZE];

        for step in 0..sectors {
            let index = (start + step) % sectors;
            self.read_sector(self.geometry.first_fat_sector as u64 + index as u64, &mut buf)?;

            for (slot, raw) in buf.chunks_exact(FAT_ENTRY_SIZE).enumerate() {
                let cluster = index * per_sector + slot as u32;
                if !self.geometry.is_data_cluster(cluster) || !FatEntry::decode(raw).is_free() {
                    continue;
                }
                self.write_fat_entry(state, cluster, FatEntry::ALLOCATED)?;
                state.last_free_cluster = if cluster + 1 < limit {
                    cluster + 1
                } else {
                    FIRST_DATA_CLUSTER
                };
                log::debug!("fat16: allocated cluster {}", cluster);
                return Ok(cluster);
            }
        }

        log::debug!("fat16: no free clusters");
        Err(FsError::NoSpace)
    }

    /// Number of clusters in the chain starting at `first`
    pub fn chain_length(&self, first: u32) -> Result<u32, FsError> {
        if !self.geometry.is_data_cluster(first) {
            return Ok(0);
        }
        let mut count = 1;
        let mut cluster = first;
        loop {
            cluster = self.next_cluster(cluster)?;
            if is_end_of_chain(cluster) {
                return Ok(count);
            }
            count += 1;
            if count > self.geometry.total_clusters {
                log::warn!("fat16: chain from {} loops, cutting at {}", first, count);
                return Ok(count);
            }
        }
    }

    /// Last cluster of the chain starting at `first`
    pub fn last_cluster(&self, first: u32) -> Result<u32, FsError> {
        let length = self.chain_length(first)?;
        self.nth_cluster(first, length.saturating_sub(1))
    }

    /// Cluster `n` places down the chain, or an end-of-chain value when the
    /// chain is shorter
    pub fn nth_cluster(&self, first: u32, n: u32) -> Result<u32, FsError> {
        let mut cluster = first;
        for _ in 0..n {
            if is_end_of_chain(cluster) {
                break;
            }
            cluster = self.next_cluster(cluster)?;
        }
        Ok(cluster)
    }

    /// Allocates a zero-filled cluster and links it after `last`, if given
    pub(crate) fn extend_chain(
        &self,
        state: &mut FatState,
        last: Option<u32>,
    ) -> Result<u32, FsError> {
        let cluster = self.allocate_locked(state)?;
        let zeroes = match zeroed_buffer(self.geometry.bytes_per_cluster) {
            Ok(buf) => buf,
            Err(e) => {
                self.write_fat_entry(state, cluster, FatEntry::FREE)?;
                return Err(e);
            }
        };
        let linked = self.write_cluster(cluster, &zeroes).and_then(|()| match last {
            Some(last) => self.write_fat_entry(state, last, FatEntry { cluster: cluster as u16 }),
            None => Ok(()),
        });
        if let Err(e) = linked {
            self.write_fat_entry(state, cluster, FatEntry::FREE)?;
            state.last_free_cluster = state.last_free_cluster.min(cluster);
            return Err(e);
        }
        Ok(cluster)
    }

    /// Releases every cluster of the chain starting at `first`
    pub(crate) fn free_chain(&self, state: &mut FatState, first: u32) -> Result<u32, FsError> {
        let mut freed = 0;
        let mut cluster = first;
        while self.geometry.is_data_cluster(cluster) && freed < self.geometry.total_clusters {
            let next = self.next_cluster(cluster)?;
            self.write_fat_entry(state, cluster, FatEntry::FREE)?;
            state.last_free_cluster = state.last_free_cluster.min(cluster);
            freed += 1;
            cluster = next;
        }
        log::debug!("fat16: freed {} clusters from {}", freed, first);
        Ok(freed)
    }

    /// Cuts the chain after `keep` clusters, freeing the rest. A `keep` of
    /// zero frees the whole chain.
    pub(crate) fn truncate_chain(
        &self,
        state: &mut FatState,
        first: u32,
        keep: u32,
    ) -> Result<(), FsError> {
        if keep == 0 {
            self.free_chain(state, first)?;
            return Ok(());
        }
        let tail = self.nth_cluster(first, keep - 1)?;
        if !self.geometry.is_data_cluster(tail) {
            return Ok(());
        }
        let rest = self.next_cluster(tail)?;
        self.write_fat_entry(state, tail, FatEntry::END)?;
        self.free_chain(state, rest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    fn link(fs: &Fat16, from: u32, to: u32) {
        let mut state = fs.fat.lock();
        fs.write_fat_entry(&mut state, from, FatEntry { cluster: to as u16 })
            .unwrap();
    }

    #[test]
    fn test_chain_walk_to_tail() {
        let fs = volume(2048, 4);
        link(&fs, 2, 3);
        link(&fs, 3, 7);
        link(&fs, 7, CHAIN_END);

        assert_eq!(fs.next_cluster(2).unwrap(), 3);
        assert_eq!(fs.next_cluster(3).unwrap(), 7);
        let tail = fs.next_cluster(7).unwrap();
        assert!(is_end_of_chain(tail));
        assert!(is_end_of_chain(fs.next_cluster(tail).unwrap()));
        assert!(is_end_of_chain(fs.next_cluster(END_OF_CHAIN).unwrap()));
        assert_eq!(fs.chain_length(2).unwrap(), 3);
        assert_eq!(fs.last_cluster(2).unwrap(), 7);
        assert_eq!(fs.nth_cluster(2, 2).unwrap(), 7);
    }

    #[test]
    fn test_root_pseudo_chain() {
        let fs = volume(2048, 4);
        let count = fs.geometry().root_cluster_count;
        assert_eq!(fs.next_cluster(ROOT_CLUSTER_BASE).unwrap(), ROOT_CLUSTER_BASE + 1);
        let last = ROOT_CLUSTER_BASE + count - 1;
        assert!(is_end_of_chain(fs.next_cluster(last).unwrap()));
    }

    #[test]
    fn test_corrupt_links_end_the_chain() {
        let fs = volume(2048, 4);
        link(&fs, 4, 1);
        assert_eq!(fs.next_cluster(4).unwrap(), CHAIN_END);
        // A free slot is not a valid successor either
        assert_eq!(fs.next_cluster(5).unwrap(), CHAIN_END);
        assert_eq!(fs.next_cluster(0).unwrap(), CHAIN_END);
    }

    #[test]
    fn test_looping_chain_is_bounded() {
        let fs = volume(2048, 4);
        link(&fs, 2, 3);
        link(&fs, 3, 2);
        let length = fs.chain_length(2).unwrap();
        assert!(length > fs.geometry().total_clusters);
    }

    #[test]
    fn test_allocator_marks_free_slot() {
        let fs = volume(2048, 4);
        let cluster = fs.allocate_cluster().unwrap();
        assert_eq!(cluster, FIRST_DATA_CLUSTER);
        assert_eq!(fs.read_fat_entry(cluster).unwrap().cluster, 0xFFF7);
        assert!(fs.read_fat_entry(cluster).unwrap().is_end_of_chain());
    }

    #[test]
    fn test_allocator_skips_used_slots() {
        let fs = volume(2048, 4);
        for used in 2..10 {
            link(&fs, used, CHAIN_END);
        }
        let cluster = fs.allocate_cluster().unwrap();
        assert_eq!(cluster, 10);
        let next = fs.allocate_cluster().unwrap();
        assert_eq!(next, 11);
    }

    #[test]
    fn test_allocator_wraps_to_earlier_sectors() {
        let fs = volume(8192, 1);
        let limit = fs.geometry().cluster_limit();
        fs.fat.lock().last_free_cluster = limit - 1;
        link(&fs, limit - 1, CHAIN_END);
        // Start sector only holds used or out-of-range slots, so the scan wraps
        let start = (limit - 1) / FAT_ENTRIES_PER_SECTOR as u32 * FAT_ENTRIES_PER_SECTOR as u32;
        for used in start..limit - 1 {
            link(&fs, used, CHAIN_END);
        }
        assert_eq!(fs.allocate_cluster().unwrap(), FIRST_DATA_CLUSTER);
    }

    #[test]
    fn test_allocator_exhaustion() {
        let fs = volume(2048, 4);
        let total = fs.geometry().total_clusters;
        for _ in 0..total {
            let cluster = fs.allocate_cluster().unwrap();
            assert!(fs.geometry().is_data_cluster(cluster));
        }
        assert_eq!(fs.allocate_cluster(), Err(FsError::NoSpace));
    }

    #[test]
    fn test_concurrent_allocation_hands_out_unique_clusters() {
        let fs = volume(2048, 4);
        let mut claimed: Vec<u32> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let mut mine = Vec::new();
                        loop {
                            match fs.allocate_cluster() {
                                Ok(cluster) => mine.push(cluster),
                                Err(FsError::NoSpace) => return mine,
                                Err(e) => panic!("allocation failed: {:?}", e),
                            }
                        }
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        let total = claimed.len();
        claimed.sort_unstable();
        claimed.dedup();
        assert_eq!(claimed.len(), total);
        assert_eq!(total as u32, fs.geometry().total_clusters);
        assert_eq!(fs.usage().unwrap().free_clusters, 0);
    }

    #[test]
    fn test_failed_zero_fill_frees_cluster() {
        let fs = volume_failing(4096, 4, |g| g.first_data_sector as u64);
        let free = fs.usage().unwrap().free_clusters;
        let mut state = fs.fat.lock();
        assert_eq!(fs.extend_chain(&mut state, None), Err(FsError::IOError));
        drop(state);
        assert!(fs.read_fat_entry(FIRST_DATA_CLUSTER).unwrap().is_free());
        assert_eq!(fs.usage().unwrap().free_clusters, free);
    }

    #[test]
    fn test_fat_copies_mirrored() {
        let fs = volume(2048, 4);
        let cluster = fs.allocate_cluster().unwrap();
        let (sector, offset) = fs.geometry().fat_slot(cluster, 1);
        let mut buf = [0u8; BLOCK_SIZE];
        fs.read_sector(sector, &mut buf).unwrap();
        assert_eq!(FatEntry::decode(&buf[offset..]), FatEntry::ALLOCATED);
    }

    #[test]
    fn test_mirroring_disabled_touches_first_copy_only() {
        let image = unmount_image(volume(2048, 4));
        let fs = mount_image(
            image,
            MountOptions {
                mirror_fats: false,
                ..MountOptions::default()
            },
        );
        let cluster = fs.allocate_cluster().unwrap();
        let (sector, offset) = fs.geometry().fat_slot(cluster, 1);
        let mut buf = [0u8; BLOCK_SIZE];
        fs.read_sector(sector, &mut buf).unwrap();
        assert!(FatEntry::decode(&buf[offset..]).is_free());
    }

    #[test]
    fn test_extend_and_truncate() {
        let fs = volume(2048, 4);
        let mut state = fs.fat.lock();
        let first = fs.extend_chain(&mut state, None).unwrap();
        let second = fs.extend_chain(&mut state, Some(first)).unwrap();
        let third = fs.extend_chain(&mut state, Some(second)).unwrap();
        drop(state);
        assert_eq!(fs.chain_length(first).unwrap(), 3);
        assert_eq!(fs.last_cluster(first).unwrap(), third);

        let mut state = fs.fat.lock();
        fs.truncate_chain(&mut state, first, 1).unwrap();
        drop(state);
        assert_eq!(fs.chain_length(first).unwrap(), 1);
        assert!(fs.read_fat_entry(second).unwrap().is_free());
        assert!(fs.read_fat_entry(third).unwrap().is_free());

        let mut state = fs.fat.lock();
        assert_eq!(fs.free_chain(&mut state, first).unwrap(), 1);
        assert_eq!(state.last_free_cluster, first);
    }

    #[test]
    fn test_allocation_rejected_when_read_only() {
        let image = unmount_image(volume(2048, 4));
        let fs = mount_image(
            image,
            MountOptions {
                read_only: true,
                ..MountOptions::default()
            },
        );
        assert_eq!(fs.allocate_cluster(), Err(FsError::ReadOnly));
    }
}
