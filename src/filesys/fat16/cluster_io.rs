//! Whole- and partial-cluster transfers
//!
//! Cluster numbers are translated with `(cluster - 2) * sectors_per_cluster
//! + first_data_sector`; root-directory pseudo-clusters map onto the root
//! region instead, and the last one may be shorter than a full cluster.

use super::*;

impl Fat16<'_> {
    /// Reads a whole cluster into `buf`. Bytes past the end of a short
    /// root pseudo-cluster are zeroed, which reads as end of directory.
    pub fn read_cluster(&self, cluster: u32, buf: &mut [u8]) -> Result<(), FsError> {
        let bpc = self.geometry.bytes_per_cluster;
        if buf.len() < bpc {
            return Err(FsError::InvalidArgument);
        }
        let (first, sectors) = self.geometry.cluster_extent(cluster)?;
        let used = sectors as usize * BLOCK_SIZE;
        self.device.lock().read_blocks(first, &mut buf[..used])?;
        buf[used..bpc].fill(0);
        Ok(())
    }

    /// Reads `count` sectors starting `offset` sectors into the cluster
    pub fn read_cluster_partial(
        &self,
        cluster: u32,
        offset: u32,
        count: u32,
        buf: &mut [u8],
    ) -> Result<(), FsError> {
        let first = self.partial_start(cluster, offset, count, buf.len())?;
        let len = count as usize * BLOCK_SIZE;
        self.device.lock().read_blocks(first, &mut buf[..len])
    }

    /// Writes a whole cluster from `buf`; only the sectors a short root
    /// pseudo-cluster owns are written
    pub fn write_cluster(&self, cluster: u32, buf: &[u8]) -> Result<(), FsError> {
        if buf.len() < self.geometry.bytes_per_cluster {
            return Err(FsError::InvalidArgument);
        }
        let (first, sectors) = self.geometry.cluster_extent(cluster)?;
        let used = sectors as usize * BLOCK_SIZE;
        self.device.lock().write_blocks(first, &buf[..used])
    }

    pub fn write_cluster_partial(
        &self,
        cluster: u32,
        offset: u32,
        count: u32,
        buf: &[u8],
    ) -> Result<(), FsError> {
        let first = self.partial_start(cluster, offset, count, buf.len())?;
        let len = count as usize * BLOCK_SIZE;
        self.device.lock().write_blocks(first, &buf[..len])
    }

    /// Absolute sector a partial transfer starts at, after bounds checks
    fn partial_start(
        &self,
        cluster: u32,
        offset: u32,
        count: u32,
        buf_len: usize,
    ) -> Result<u64, FsError> {
        let (first, sectors) = self.geometry.cluster_extent(cluster)?;
        let end = offset.checked_add(count).ok_or(FsError::InvalidArgument)?;
        if end > sectors || buf_len < count as usize * BLOCK_SIZE {
            return Err(FsError::InvalidArgument);
        }
        Ok(first + offset as u64)
    }
}
