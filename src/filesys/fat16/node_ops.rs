//! Node creation, resizing and volume usage

use super::*;
use alloc::string::String;

/// Raw facts about a directory gathered before adding an entry to it
struct SlotScan {
    short_names: Vec<[u8; 11]>,
    /// Byte position of the first reusable slot
    free_slot: Option<u64>,
    /// Last cluster of the directory, for extending it
    last_cluster: u32,
}

fn validate_name(name: &str) -> Result<(), FsError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.chars().count() > MAX_LFN_LENGTH
        || name.contains(['/', '\\', '\0'])
        || !has_legal_char(name)
    {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

impl Fat16<'_> {
    fn directory_cluster(&self, dir: NodeId) -> Result<u32, FsError> {
        if dir == 0 || dir == ROOT_CLUSTER_BASE {
            Ok(ROOT_CLUSTER_BASE)
        } else if self.geometry.is_data_cluster(dir) {
            Ok(dir)
        } else {
            Err(FsError::InvalidArgument)
        }
    }

    pub(crate) fn read_entry_at(&self, position: u64) -> Result<ShortDirEntry, FsError> {
        let mut buf = [0u8; BLOCK_SIZE];
        self.read_sector(position / BLOCK_SIZE as u64, &mut buf)?;
        let at = (position % BLOCK_SIZE as u64) as usize;
        Ok(ShortDirEntry::decode(&buf[at..at + DIR_ENTRY_SIZE]))
    }

    /// Overwrites the 32-byte slot at absolute byte `position`
    pub(crate) fn write_entry_at(&self, position: u64, raw: &[u8; DIR_ENTRY_SIZE]) -> Result<(), FsError> {
        let mut buf = [0u8; BLOCK_SIZE];
        let sector = position / BLOCK_SIZE as u64;
        self.read_sector(sector, &mut buf)?;
        let at = (position % BLOCK_SIZE as u64) as usize;
        buf[at..at + DIR_ENTRY_SIZE].copy_from_slice(raw);
        self.write_sector(sector, &buf)
    }

    fn scan_slots(&self, dir: u32) -> Result<SlotScan, FsError> {
        let mut scan = SlotScan {
            short_names: Vec::new(),
            free_slot: None,
            last_cluster: dir,
        };
        let mut buf = zeroed_buffer(self.geometry.bytes_per_cluster)?;
        let mut cluster = dir;

        loop {
            self.read_cluster(cluster, &mut buf)?;
            let (first_sector, sectors) = self.geometry.cluster_extent(cluster)?;
            let used = sectors as usize * BLOCK_SIZE;
            scan.last_cluster = cluster;

            for (i, raw) in buf[..used].chunks_exact(DIR_ENTRY_SIZE).enumerate() {
                let position = first_sector * BLOCK_SIZE as u64 + (i * DIR_ENTRY_SIZE) as u64;
                match classify(raw) {
                    SlotKind::EndOfDirectory => {
                        scan.free_slot.get_or_insert(position);
                        return Ok(scan);
                    }
                    SlotKind::Deleted => {
                        scan.free_slot.get_or_insert(position);
                    }
                    SlotKind::Short => {
                        scan.short_names
                            .try_reserve(1)
                            .map_err(|_| FsError::OutOfMemory)?;
                        scan.short_names.push(ShortDirEntry::decode(raw).name);
                    }
                    SlotKind::LongName | SlotKind::VolumeLabel => {}
                }
            }

            let next = self.next_cluster(cluster)?;
            if is_end_of_chain(next) {
                return Ok(scan);
            }
            cluster = next;
        }
    }

    /// Picks the stored 8.3 name for `name` given the names already taken
    fn choose_short_name(name: &str, taken: &[[u8; 11]]) -> Result<[u8; 11], FsError> {
        if is_lossless(name) {
            let basis = basis_name(name, 0);
            if taken.contains(&basis) {
                return Err(FsError::AlreadyExists);
            }
            return Ok(basis);
        }
        (1..=MAX_NUMERIC_TAIL)
            .map(|tail| basis_name(name, tail))
            .find(|candidate| !taken.contains(candidate))
            .ok_or(FsError::NoSpace)
    }

    /// Writes the "." and ".." entries into a new directory cluster
    fn init_directory(&self, cluster: u32, parent: u32, now: DateTime) -> Result<(), FsError> {
        let mut buf = zeroed_buffer(self.geometry.bytes_per_cluster)?;
        let parent = if parent == ROOT_CLUSTER_BASE { 0 } else { parent };
        ShortDirEntry::new(*b".          ", Attributes::DIRECTORY, cluster as u16, now)
            .encode(&mut buf[..DIR_ENTRY_SIZE]);
        ShortDirEntry::new(*b"..         ", Attributes::DIRECTORY, parent as u16, now)
            .encode(&mut buf[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE]);
        self.write_cluster(cluster, &buf)
    }

    /// Adds a file or directory called `template.name` to directory
    /// `parent`. Only a short entry is written, so the returned node carries
    /// the stored 8.3 name.
    pub fn create(&self, parent: NodeId, template: &Node) -> Result<Node, FsError> {
        self.check_writable()?;
        let name = template.name.as_str();
        validate_name(name)?;
        let dir = self.directory_cluster(parent)?;

        let mut state = self.fat.lock();

        for existing in self.iter_dir(dir)? {
            if existing?.name.eq_ignore_ascii_case(name) {
                return Err(FsError::AlreadyExists);
            }
        }
        let scan = self.scan_slots(dir)?;
        let short = Self::choose_short_name(name, &scan.short_names)?;

        let mut attributes = template.attributes
            & (Attributes::HIDDEN | Attributes::SYSTEM | Attributes::READ_ONLY);
        if template.mode & 0o222 == 0 {
            attributes |= Attributes::READ_ONLY;
        }
        let now = (self.options.clock)();

        let first_cluster = if template.is_dir() {
            attributes |= Attributes::DIRECTORY;
            let cluster = self.extend_chain(&mut state, None)?;
            if let Err(e) = self.init_directory(cluster, dir, now) {
                self.free_chain(&mut state, cluster)?;
                return Err(e);
            }
            cluster
        } else {
            attributes |= Attributes::ARCHIVE;
            0
        };

        // Cluster added to the parent when it had no free slot
        let mut grown = None;
        let position = match scan.free_slot {
            Some(position) => Ok(position),
            None if dir == ROOT_CLUSTER_BASE => Err(FsError::NoSpace),
            None => self
                .extend_chain(&mut state, Some(scan.last_cluster))
                .and_then(|cluster| {
                    grown = Some(cluster);
                    self.geometry.cluster_extent(cluster)
                })
                .map(|(sector, _)| sector * BLOCK_SIZE as u64),
        };

        let entry = ShortDirEntry::new(short, attributes, first_cluster as u16, now);
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        entry.encode(&mut raw);
        let written =
            position.and_then(|position| self.write_entry_at(position, &raw).map(|()| position));
        let position = match written {
            Ok(position) => position,
            Err(e) => {
                if first_cluster != 0 {
                    self.free_chain(&mut state, first_cluster)?;
                }
                if let Some(cluster) = grown {
                    self.write_fat_entry(&mut state, scan.last_cluster, FatEntry::END)?;
                    self.free_chain(&mut state, cluster)?;
                }
                return Err(e);
            }
        };

        let display = entry.display_name();
        log::debug!("fat16: created {} in {:#x} at byte {}", display, dir, position);
        Ok(self.node_from_entry(&entry, String::from(display.as_str()), position))
    }

    /// Grows or shrinks a file's chain to hold `new_length` bytes and records
    /// the new size in its directory entry
    pub fn resize(&self, node: &mut Node, new_length: u64) -> Result<(), FsError> {
        self.check_writable()?;
        let position = node.entry_position.ok_or(FsError::InvalidArgument)?;
        if node.is_dir() {
            return Err(FsError::InvalidArgument);
        }
        let size = u32::try_from(new_length).map_err(|_| FsError::InvalidArgument)?;
        let wanted = new_length.div_ceil(self.geometry.bytes_per_cluster as u64) as u32;

        let mut state = self.fat.lock();
        let mut entry = self.read_entry_at(position)?;
        let first = entry.first_cluster_low as u32;
        let have = self.chain_length(first)?;
        let mut new_first = if have == 0 { 0 } else { first };

        if wanted > have {
            let mut last = if have == 0 {
                None
            } else {
                Some(self.last_cluster(first)?)
            };
            for _ in have..wanted {
                match self.extend_chain(&mut state, last) {
                    Ok(cluster) => {
                        if new_first == 0 {
                            new_first = cluster;
                        }
                        last = Some(cluster);
                    }
                    Err(e) => {
                        if have == 0 {
                            if new_first != 0 {
                                self.free_chain(&mut state, new_first)?;
                            }
                        } else {
                            self.truncate_chain(&mut state, first, have)?;
                        }
                        return Err(e);
                    }
                }
            }
        } else if wanted < have {
            self.truncate_chain(&mut state, first, wanted)?;
            if wanted == 0 {
                new_first = 0;
            }
        }

        let (date, time, _) = (self.options.clock)().to_fat();
        entry.file_size = size;
        entry.first_cluster_low = new_first as u16;
        entry.modify_date = date;
        entry.modify_time = time;
        entry.access_date = date;
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        entry.encode(&mut raw);
        if let Err(e) = self.write_entry_at(position, &raw) {
            if wanted > have {
                self.truncate_chain(&mut state, new_first, have)?;
            }
            return Err(e);
        }

        log::debug!(
            "fat16: resized {} to {} bytes ({} -> {} clusters)",
            node.name,
            new_length,
            have,
            wanted
        );
        node.id = new_first;
        node.size = new_length;
        node.modified = entry.modified();
        node.accessed = entry.accessed();
        Ok(())
    }

    /// Counts free clusters by scanning the first FAT copy
    pub fn usage(&self) -> Result<FsStat, FsError> {
        let _fat = self.fat.lock();
        let limit = self.geometry.cluster_limit();
        let per_sector = FAT_ENTRIES_PER_SECTOR as u32;
        let mut free_clusters = 0;
        let mut buf = [0u8; BLOCK_SIZE];

        for index in 0..limit.div_ceil(per_sector) {
            self.read_sector(self.geometry.first_fat_sector as u64 + index as u64, &mut buf)?;
            for (slot, raw) in buf.chunks_exact(FAT_ENTRY_SIZE).enumerate() {
                let cluster = index * per_sector + slot as u32;
                if self.geometry.is_data_cluster(cluster) && FatEntry::decode(raw).is_free() {
                    free_clusters += 1;
                }
            }
        }

        Ok(FsStat {
            block_size: BLOCK_SIZE,
            total_blocks: self.geometry.total_sectors as u64,
            free_blocks: free_clusters as u64 * self.geometry.sectors_per_cluster as u64,
            cluster_size: self.geometry.bytes_per_cluster,
            total_clusters: self.geometry.total_clusters,
            free_clusters,
        })
    }
}
