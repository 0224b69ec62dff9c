//! In-memory block device implementation

use crate::filesys::{BlockDevice, FsError};
use alloc::vec;
use alloc::vec::Vec;
use core::result::Result;

/// Block device that stores data in memory
pub struct MemoryBlockDevice {
    /// Backing store, `total_blocks * block_size` bytes
    data: Vec<u8>,

    /// Size of each block in bytes
    block_size: usize,

    /// Block that fails every access, for exercising error paths
    faulty_block: Option<u64>,
}

impl MemoryBlockDevice {
    /// Creates a new zero-filled memory block device with given size
    pub fn new(total_blocks: u64, block_size: usize) -> Self {
        Self {
            data: vec![0; total_blocks as usize * block_size],
            block_size,
            faulty_block: None,
        }
    }

    /// Wraps an existing disk image; trailing bytes short of a block are dropped
    pub fn from_image(mut data: Vec<u8>, block_size: usize) -> Self {
        data.truncate(data.len() - data.len() % block_size);
        Self {
            data,
            block_size,
            faulty_block: None,
        }
    }

    /// Makes every read or write touching `block_num` fail with `IOError`
    pub fn fail_block(&mut self, block_num: u64) {
        self.faulty_block = Some(block_num);
    }

    /// Raw view of the whole image
    pub fn image(&self) -> &[u8] {
        &self.data
    }

    /// Validates block number is within bounds and not marked faulty
    fn block_range(&self, block_num: u64) -> Result<core::ops::Range<usize>, FsError> {
        if block_num >= self.total_blocks() || self.faulty_block == Some(block_num) {
            return Err(FsError::IOError);
        }
        let start = block_num as usize * self.block_size;
        Ok(start..start + self.block_size)
    }

    /// Validates buffer is correct block size
    fn validate_buffer(&self, buf: &[u8]) -> Result<(), FsError> {
        if buf.len() != self.block_size {
            return Err(FsError::IOError);
        }
        Ok(())
    }
}

impl BlockDevice for MemoryBlockDevice {
    /// Reads block into buffer
    fn read_block(&self, block_num: u64, buf: &mut [u8]) -> Result<(), FsError> {
        self.validate_buffer(buf)?;
        let range = self.block_range(block_num)?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    /// Writes buffer to block
    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> Result<(), FsError> {
        self.validate_buffer(buf)?;
        let range = self.block_range(block_num)?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }

    /// Returns size of each block
    fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns total number of blocks
    fn total_blocks(&self) -> u64 {
        (self.data.len() / self.block_size) as u64
    }
}
