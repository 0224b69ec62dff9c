//! Block-addressed file reads and writes over a cluster chain

use super::*;

impl Fat16<'_> {
    /// Cluster holding sector `block_offset` of the chain starting at
    /// `first`, plus that sector's offset inside it. `None` when the chain
    /// ends first.
    fn locate(&self, first: u32, block_offset: u64) -> Result<Option<(u32, u32)>, FsError> {
        let spc = self.geometry.sectors_per_cluster as u64;
        if block_offset / spc > self.geometry.total_clusters as u64 {
            return Ok(None);
        }
        let mut cluster = first;
        let mut remaining = block_offset;
        while remaining >= spc {
            cluster = self.next_cluster(cluster)?;
            if is_end_of_chain(cluster) {
                return Ok(None);
            }
            remaining -= spc;
        }
        Ok(Some((cluster, remaining as u32)))
    }

    /// Bytes of caller buffer `count` blocks need, if the buffer has them
    fn transfer_len(count: u64, buf_len: usize) -> Result<usize, FsError> {
        let needed = count
            .checked_mul(BLOCK_SIZE as u64)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(FsError::InvalidArgument)?;
        if buf_len < needed {
            return Err(FsError::InvalidArgument);
        }
        Ok(needed)
    }

    /// Reads `block_count` blocks starting `block_offset` blocks into the
    /// node. Returns fewer blocks than asked when the chain runs out.
    pub fn read_blocks(
        &self,
        node: &Node,
        buf: &mut [u8],
        block_offset: u64,
        block_count: u64,
    ) -> Result<u64, FsError> {
        Self::transfer_len(block_count, buf.len())?;
        if block_count == 0 || node.id == 0 {
            return Ok(0);
        }
        if !self.geometry.is_data_cluster(node.id) && !self.geometry.is_root_cluster(node.id) {
            return Err(FsError::InvalidArgument);
        }

        let Some((mut cluster, mut offset)) = self.locate(node.id, block_offset)? else {
            return Ok(0);
        };
        let mut done = 0u64;
        while done < block_count {
            let (_, sectors) = self.geometry.cluster_extent(cluster)?;
            let n = ((sectors - offset) as u64).min(block_count - done) as u32;
            let at = done as usize * BLOCK_SIZE;
            let dst = &mut buf[at..at + n as usize * BLOCK_SIZE];
            if offset == 0 && n == self.geometry.sectors_per_cluster {
                self.read_cluster(cluster, dst)?;
            } else {
                self.read_cluster_partial(cluster, offset, n, dst)?;
            }
            done += n as u64;
            offset = 0;

            if done < block_count {
                cluster = self.next_cluster(cluster)?;
                if is_end_of_chain(cluster) {
                    log::debug!("fat16: short read of node {}: {} blocks", node.id, done);
                    break;
                }
            }
        }
        Ok(done)
    }

    /// Writes `block_count` blocks starting `block_offset` blocks into the
    /// node. The chain must already be long enough; see `reallocate`.
    pub fn write_blocks(
        &self,
        node: &Node,
        buf: &[u8],
        block_offset: u64,
        block_count: u64,
    ) -> Result<u64, FsError> {
        self.check_writable()?;
        Self::transfer_len(block_count, buf.len())?;
        if block_count == 0 {
            return Ok(0);
        }
        if !self.geometry.is_data_cluster(node.id) {
            return Err(FsError::InvalidArgument);
        }

        // Held so the chain cannot be resized between the check and the transfer
        let _fat = self.fat.lock();
        let allocated =
            self.chain_length(node.id)? as u64 * self.geometry.sectors_per_cluster as u64;
        let end = block_offset
            .checked_add(block_count)
            .ok_or(FsError::InvalidArgument)?;
        if end > allocated {
            return Err(FsError::InvalidArgument);
        }

        let (mut cluster, mut offset) = self
            .locate(node.id, block_offset)?
            .ok_or(FsError::InvalidArgument)?;
        let mut done = 0u64;
        while done < block_count {
            let spc = self.geometry.sectors_per_cluster;
            let n = ((spc - offset) as u64).min(block_count - done) as u32;
            let at = done as usize * BLOCK_SIZE;
            let src = &buf[at..at + n as usize * BLOCK_SIZE];
            if offset == 0 && n == spc {
                self.write_cluster(cluster, src)?;
            } else {
                self.write_cluster_partial(cluster, offset, n, src)?;
            }
            done += n as u64;
            offset = 0;

            if done < block_count {
                cluster = self.next_cluster(cluster)?;
                if is_end_of_chain(cluster) {
                    return Err(FsError::InvalidArgument);
                }
            }
        }
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use alloc::vec;
    use rand::rngs::SmallRng;
    use rand::{RngCore, SeedableRng};

    fn payload(blocks: usize, seed: u64) -> Vec<u8> {
        let mut data = vec![0u8; blocks * BLOCK_SIZE];
        SmallRng::seed_from_u64(seed).fill_bytes(&mut data);
        data
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let fs = volume(4096, 4);
        let node = sized_file(&fs, "data.bin", 5 * 2048);
        for (offset, count, seed) in [(0u64, 1u64, 1u64), (3, 6, 2), (4, 4, 3), (7, 13, 4)] {
            let data = payload(count as usize, seed);
            assert_eq!(fs.write_blocks(&node, &data, offset, count).unwrap(), count);
            let mut back = vec![0u8; data.len()];
            assert_eq!(fs.read_blocks(&node, &mut back, offset, count).unwrap(), count);
            assert_eq!(back, data);
        }
    }

    #[test]
    fn test_fragmented_chain_follows_fat() {
        let fs = volume(4096, 1);
        // Interleave two files so neither chain is contiguous
        let a = sized_file(&fs, "a", 512);
        let mut b = sized_file(&fs, "b", 512);
        let mut a_grown = a.clone();
        fs.resize(&mut a_grown, 3 * 512).unwrap();
        fs.resize(&mut b, 2 * 512).unwrap();
        assert_ne!(fs.next_cluster(a.id).unwrap(), a.id + 1);

        let data = payload(3, 9);
        fs.write_blocks(&a_grown, &data, 0, 3).unwrap();

        let second = fs.nth_cluster(a.id, 1).unwrap();
        let mut raw = vec![0u8; BLOCK_SIZE];
        fs.read_cluster(second, &mut raw).unwrap();
        assert_eq!(&raw[..], &data[BLOCK_SIZE..2 * BLOCK_SIZE]);

        let mut back = vec![0u8; 3 * BLOCK_SIZE];
        assert_eq!(fs.read_blocks(&a_grown, &mut back, 0, 3).unwrap(), 3);
        assert_eq!(back, data);
    }

    #[test]
    fn test_read_past_chain_is_short() {
        let fs = volume(4096, 4);
        let node = sized_file(&fs, "short.txt", 2 * 2048);
        let mut buf = vec![0u8; 12 * BLOCK_SIZE];
        assert_eq!(fs.read_blocks(&node, &mut buf, 4, 12).unwrap(), 4);
        assert_eq!(fs.read_blocks(&node, &mut buf, 8, 1).unwrap(), 0);
        assert_eq!(fs.read_blocks(&node, &mut buf, 1_000_000, 1).unwrap(), 0);
    }

    #[test]
    fn test_write_past_chain_rejected() {
        let fs = volume(4096, 4);
        let node = sized_file(&fs, "short.txt", 2 * 2048);
        let data = payload(4, 5);
        assert_eq!(fs.write_blocks(&node, &data, 6, 2).unwrap(), 2);
        assert_eq!(fs.write_blocks(&node, &data, 6, 3), Err(FsError::InvalidArgument));
        assert_eq!(fs.write_blocks(&node, &data, 8, 1), Err(FsError::InvalidArgument));
        assert_eq!(
            fs.write_blocks(&node, &data, u64::MAX, 2),
            Err(FsError::InvalidArgument)
        );
    }

    #[test]
    fn test_buffer_too_small_rejected() {
        let fs = volume(4096, 4);
        let node = sized_file(&fs, "f", 2048);
        let mut buf = vec![0u8; BLOCK_SIZE];
        assert_eq!(fs.read_blocks(&node, &mut buf, 0, 2), Err(FsError::InvalidArgument));
        assert_eq!(fs.write_blocks(&node, &buf, 0, 2), Err(FsError::InvalidArgument));
    }

    #[test]
    fn test_empty_file() {
        let fs = volume(4096, 4);
        let node = fs.create(ROOT_CLUSTER_BASE, &Node::template("empty", NodeKind::File)).unwrap();
        assert_eq!(node.id, 0);
        let mut buf = vec![0u8; BLOCK_SIZE];
        assert_eq!(fs.read_blocks(&node, &mut buf, 0, 1).unwrap(), 0);
        assert_eq!(fs.write_blocks(&node, &buf, 0, 1), Err(FsError::InvalidArgument));
        assert_eq!(fs.write_blocks(&node, &buf, 0, 0).unwrap(), 0);
    }

    #[test]
    fn test_read_only_mount_rejects_write() {
        let fs = volume(4096, 4);
        let node = sized_file(&fs, "f", 2048);
        let fs = mount_image(
            unmount_image(fs),
            MountOptions {
                read_only: true,
                ..MountOptions::default()
            },
        );
        let buf = vec![0u8; BLOCK_SIZE];
        assert_eq!(fs.write_blocks(&node, &buf, 0, 1), Err(FsError::ReadOnly));
        let mut buf = buf;
        assert_eq!(fs.read_blocks(&node, &mut buf, 0, 1).unwrap(), 1);
    }

    #[test]
    fn test_through_vfs_table() {
        let fs = volume(4096, 2);
        let node = sized_file(&fs, "vfs.bin", 4 * 1024);
        let vfs: &dyn FileSystem<DirCursor = DirCursor> = &fs;
        let data = payload(8, 11);
        assert_eq!(vfs.write(&node, &data, 0, 8).unwrap(), 8);
        let mut back = vec![0u8; data.len()];
        assert_eq!(vfs.read(&node, &mut back, 0, 8).unwrap(), 8);
        assert_eq!(back, data);
    }
}
