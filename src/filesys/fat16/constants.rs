//! FAT16 filesystem constants

/// Size of a disk sector in bytes; the only sector size the driver mounts
pub const BLOCK_SIZE: usize = 512;

/// Size of FAT entry in bytes (16-bit)
pub const FAT_ENTRY_SIZE: usize = 2;

/// FAT entries held by one sector
pub const FAT_ENTRIES_PER_SECTOR: usize = BLOCK_SIZE / FAT_ENTRY_SIZE;

/// Size of a short or long directory entry
pub const DIR_ENTRY_SIZE: usize = 32;

/// Default number of root directory entries for new volumes
pub const ROOT_DIR_ENTRIES: u16 = 512;

/// Maximum length of filename excluding extension
pub const MAX_FILENAME_LENGTH: usize = 8;

/// Maximum length of file extension
pub const MAX_EXTENSION_LENGTH: usize = 3;

/// Longest name a set of LFN fragments can reassemble into
pub const MAX_LFN_LENGTH: usize = 255;

/// UTF-16 code units carried by one LFN fragment
pub const LFN_CHARS_PER_ENTRY: usize = 13;

/// Low bits of the LFN ordering byte holding the 1-based fragment index
pub const LFN_ORDER_MASK: u8 = 0x1F;

/// Ordering-byte flag set on the highest fragment of a set
pub const LFN_LAST_FRAGMENT: u8 = 0x40;

/// First name byte of a never-used slot; ends the directory
pub const END_OF_DIRECTORY: u8 = 0x00;

/// Marker for deleted directory entries
pub const DELETED_ENTRY_MARKER: u8 = 0xE5;

/// Stands in for a literal 0xE5 first character
pub const KANJI_E5_ESCAPE: u8 = 0x05;

/// Any FAT value at or above this ends a chain
pub const END_OF_CHAIN: u32 = 0xFFF7;

/// Canonical end-of-chain value returned by the chain walker
pub const CHAIN_END: u32 = 0xFFFF;

/// Value the allocator stores in a newly claimed slot
pub const ALLOCATED_MARKER: u16 = 0xFFF7;

/// First cluster number backed by the data region
pub const FIRST_DATA_CLUSTER: u32 = 2;

/// The FAT16 root directory is not a chain; its sectors are addressed as
/// pseudo-clusters numbered from here, above every 16-bit FAT value
pub const ROOT_CLUSTER_BASE: u32 = 0x1_0000;

/// Jump instruction bytes required at offsets 0 and 2 of sector 0
pub const JUMP_SHORT: u8 = 0xEB;
pub const JUMP_NOP: u8 = 0x90;

/// Partition signature stored little-endian at offset 510
pub const PARTITION_SIGNATURE: u16 = 0xAA55;

/// Placeholder for non-ASCII code units when displaying a name
pub const READ_PLACEHOLDER: u8 = b'?';

/// Placeholder for non-ASCII code units when building a name to store
pub const CREATE_PLACEHOLDER: u8 = b'_';

/// Unix permission approximations
pub const MODE_READ_ONLY: u16 = 0o555;
pub const MODE_READ_WRITE: u16 = 0o777;
