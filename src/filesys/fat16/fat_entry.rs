//! FAT16 file allocation table entry

use super::constants::*;

/// True for any chain value in the end-of-chain range. Root-directory
/// pseudo-clusters sit above it and are never treated as chain ends.
/// Callers only test values produced by `next_cluster`, which maps every
/// out-of-range link to `CHAIN_END`.
pub fn is_end_of_chain(value: u32) -> bool {
    (END_OF_CHAIN..ROOT_CLUSTER_BASE).contains(&value)
}

/// Represents a 16-bit FAT entry pointing to the next cluster in a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatEntry {
    /// Cluster number or special value (0=free, >=0xFFF7=end)
    pub cluster: u16,
}

impl FatEntry {
    pub const FREE: FatEntry = FatEntry { cluster: 0 };
    pub const ALLOCATED: FatEntry = FatEntry {
        cluster: ALLOCATED_MARKER,
    };
    pub const END: FatEntry = FatEntry {
        cluster: CHAIN_END as u16,
    };

    pub fn decode(raw: &[u8]) -> Self {
        Self {
            cluster: u16::from_le_bytes([raw[0], raw[1]]),
        }
    }

    pub fn encode(&self, raw: &mut [u8]) {
        raw[..FAT_ENTRY_SIZE].copy_from_slice(&self.cluster.to_le_bytes());
    }

    /// Returns true if this entry marks the end of a cluster chain
    pub fn is_end_of_chain(&self) -> bool {
        is_end_of_chain(self.cluster as u32)
    }

    /// Returns true if this cluster is unused/free
    pub fn is_free(&self) -> bool {
        self.cluster == 0
    }
}
