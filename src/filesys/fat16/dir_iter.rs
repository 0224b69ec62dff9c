//! Directory traversal with long-filename reassembly

use super::*;
use alloc::string::String;

/// Longest index a fragment may carry: 20 * 13 covers 255 characters
const MAX_LFN_FRAGMENTS: usize = 20;

/// Long-name fragments collected ahead of their short entry
struct PendingLfn {
    name: [u8; MAX_LFN_FRAGMENTS * LFN_CHARS_PER_ENTRY],
    len: usize,
    checksum: u8,
    /// Index the next fragment must carry; 0 once the set is complete
    next: usize,
    active: bool,
}

impl PendingLfn {
    const fn new() -> Self {
        Self {
            name: [0; MAX_LFN_FRAGMENTS * LFN_CHARS_PER_ENTRY],
            len: 0,
            checksum: 0,
            next: 0,
            active: false,
        }
    }

    fn reset(&mut self) {
        self.name[..self.len].fill(0);
        self.len = 0;
        self.next = 0;
        self.active = false;
    }

    fn discard(&mut self) {
        if self.active {
            log::warn!("fat16: dropping long name with no short entry");
        }
        self.reset();
    }

    fn push(&mut self, fragment: &LfnEntry) {
        let index = fragment.index();
        if index == 0 || index > MAX_LFN_FRAGMENTS {
            log::warn!("fat16: ignoring long-name fragment {:#x}", fragment.order);
            self.discard();
            return;
        }
        let continues =
            self.active && index == self.next && fragment.checksum == self.checksum;
        if self.active && !continues && !fragment.is_last() {
            log::warn!("fat16: long-name fragment {} out of sequence", index);
            self.reset();
            return;
        }
        if fragment.is_last() || !self.active {
            self.reset();
            self.active = true;
            self.checksum = fragment.checksum;
            self.len = index * LFN_CHARS_PER_ENTRY;
        }

        let start = (index - 1) * LFN_CHARS_PER_ENTRY;
        for (slot, &unit) in self.name[start..].iter_mut().zip(fragment.units.iter()) {
            *slot = if unit < 0x80 { unit as u8 } else { READ_PLACEHOLDER };
        }
        self.next = index - 1;
    }

    /// The reassembled name if it belongs to `short_name`
    fn take(&mut self, short_name: &[u8; 11]) -> Option<String> {
        if !self.active {
            return None;
        }
        if self.next != 0 {
            log::warn!("fat16: long name is missing fragment {}, using short name", self.next);
            self.reset();
            return None;
        }
        let expected = lfn_checksum(short_name);
        if self.checksum != expected {
            log::warn!(
                "fat16: long name checksum {:#04x} does not match {:#04x}, using short name",
                self.checksum,
                expected
            );
            self.reset();
            return None;
        }

        let chars = &self.name[..self.len];
        let end = chars
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(chars.len())
            .min(MAX_LFN_LENGTH);
        let name: String = chars[..end].iter().map(|&b| b as char).collect();
        self.reset();
        Some(name)
    }
}

/// Per-traversal directory state, owned by whoever opened the directory
pub struct DirCursor {
    cluster: u32,
    buffer: Vec<u8>,
    offset: usize,
    /// Bytes of `buffer` the current cluster actually covers
    end: usize,
    finished: bool,
    lfn: PendingLfn,
}

impl DirCursor {
    /// Cluster whose contents are currently buffered
    pub fn cluster(&self) -> u32 {
        self.cluster
    }

    pub fn is_root(&self) -> bool {
        self.cluster >= ROOT_CLUSTER_BASE
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<'a> Fat16<'a> {
    pub fn root(&self) -> Node {
        let mut node = Node::template("/", NodeKind::Directory);
        node.id = ROOT_CLUSTER_BASE;
        node.attributes = Attributes::DIRECTORY;
        node
    }

    /// Starts a traversal of directory `dir`; 0 and the root id both name
    /// the root directory
    pub fn open_directory(&self, dir: NodeId) -> Result<DirCursor, FsError> {
        let cluster = if dir == 0 || dir == ROOT_CLUSTER_BASE {
            ROOT_CLUSTER_BASE
        } else if self.geometry.is_data_cluster(dir) {
            dir
        } else {
            return Err(FsError::InvalidArgument);
        };

        let mut buffer = zeroed_buffer(self.geometry.bytes_per_cluster)?;
        self.read_cluster(cluster, &mut buffer)?;
        Ok(DirCursor {
            cluster,
            buffer,
            offset: 0,
            end: self.cluster_bytes(cluster)?,
            finished: false,
            lfn: PendingLfn::new(),
        })
    }

    /// Yields the next complete entry, or the next one whose long or short
    /// name matches `name` case-insensitively
    pub fn next_entry(&self, cursor: &mut DirCursor, name: Option<&str>) -> Result<Node, FsError> {
        loop {
            if cursor.finished {
                return Err(FsError::NotFound);
            }

            if cursor.offset + DIR_ENTRY_SIZE > cursor.end {
                let next = self.next_cluster(cursor.cluster)?;
                if is_end_of_chain(next) {
                    cursor.finished = true;
                    return Err(FsError::NotFound);
                }
                self.read_cluster(next, &mut cursor.buffer)?;
                cursor.cluster = next;
                cursor.offset = 0;
                cursor.end = self.cluster_bytes(next)?;
                continue;
            }

            let at = cursor.offset;
            cursor.offset += DIR_ENTRY_SIZE;
            let raw = &cursor.buffer[at..at + DIR_ENTRY_SIZE];

            match classify(raw) {
                SlotKind::EndOfDirectory => {
                    cursor.lfn.discard();
                    cursor.finished = true;
                    return Err(FsError::NotFound);
                }
                SlotKind::Deleted | SlotKind::VolumeLabel => cursor.lfn.discard(),
                SlotKind::LongName => {
                    let fragment = LfnEntry::decode(raw);
                    cursor.lfn.push(&fragment);
                }
                SlotKind::Short => {
                    let entry = ShortDirEntry::decode(raw);
                    let long = cursor.lfn.take(&entry.name);
                    let short = entry.display_name();

                    let matched = name.map_or(true, |target| {
                        short.eq_ignore_ascii_case(target)
                            || long
                                .as_deref()
                                .is_some_and(|l| l.eq_ignore_ascii_case(target))
                    });
                    if !matched {
                        continue;
                    }

                    let (first_sector, _) = self.geometry.cluster_extent(cursor.cluster)?;
                    let position = first_sector * BLOCK_SIZE as u64 + at as u64;
                    let display = long.unwrap_or_else(|| String::from(short.as_str()));
                    return Ok(self.node_from_entry(&entry, display, position));
                }
            }
        }
    }

    fn cluster_bytes(&self, cluster: u32) -> Result<usize, FsError> {
        let (_, sectors) = self.geometry.cluster_extent(cluster)?;
        Ok(sectors as usize * BLOCK_SIZE)
    }

    pub(crate) fn node_from_entry(&self, entry: &ShortDirEntry, name: String, position: u64) -> Node {
        let kind = if entry.is_directory() {
            NodeKind::Directory
        } else {
            NodeKind::File
        };
        let mut id = entry.first_cluster_low as u32;
        if kind == NodeKind::Directory && id == 0 {
            id = ROOT_CLUSTER_BASE;
        }
        let mode = if entry.attributes.contains(Attributes::READ_ONLY) {
            MODE_READ_ONLY
        } else {
            MODE_READ_WRITE
        };

        Node {
            id,
            name,
            kind,
            mode,
            attributes: entry.attributes,
            size: entry.file_size as u64,
            uid: 0,
            gid: 0,
            created: entry.created(),
            accessed: entry.accessed(),
            modified: entry.modified(),
            entry_position: Some(position),
        }
    }

    pub fn iter_dir(&self, dir: NodeId) -> Result<DirIter<'_, 'a>, FsError> {
        Ok(DirIter {
            fs: self,
            cursor: self.open_directory(dir)?,
            done: false,
        })
    }

    pub fn list_dir(&self, dir: NodeId) -> Result<Vec<Node>, FsError> {
        self.iter_dir(dir)?.collect()
    }

    pub fn lookup(&self, dir: NodeId, name: &str) -> Result<Node, FsError> {
        let mut cursor = self.open_directory(dir)?;
        self.next_entry(&mut cursor, Some(name))
    }

    /// Walks a `/`-separated path from the root
    pub fn resolve(&self, path: &str) -> Result<Node, FsError> {
        let mut node = self.root();
        for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            if !node.is_dir() {
                return Err(FsError::NotADirectory);
            }
            if component == ".." && node.id == ROOT_CLUSTER_BASE {
                continue;
            }
            node = self.lookup(node.id, component)?;
        }
        Ok(node)
    }
}

/// Lazy walk over one directory. Finite and not restartable.
pub struct DirIter<'f, 'a> {
    fs: &'f Fat16<'a>,
    cursor: DirCursor,
    done: bool,
}

impl Iterator for DirIter<'_, '_> {
    type Item = Result<Node, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fs.next_entry(&mut self.cursor, None) {
            Ok(node) => Some(Ok(node)),
            Err(FsError::NotFound) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
