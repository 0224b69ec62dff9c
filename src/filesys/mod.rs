use alloc::string::String;
use core::fmt;
use core::result::Result;

pub mod block;
pub mod fat16;

use fat16::{Attributes, DateTime};

// Define error types for the filesystem operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Sector 0 is not a usable FAT16 boot sector
    BadSuperblock,
    /// A working buffer could not be allocated
    OutOfMemory,
    InvalidArgument,
    /// Entry absent, end of directory, or end of chain during lookup
    NotFound,
    /// Every FAT entry is in use
    NoSpace,
    AlreadyExists,
    InvalidName,
    NotADirectory,
    /// The volume was mounted read-only
    ReadOnly,
    /// Raised by block devices; passed through untouched
    IOError,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::BadSuperblock => write!(f, "Bad superblock"),
            FsError::OutOfMemory => write!(f, "Out of memory"),
            FsError::InvalidArgument => write!(f, "Invalid argument"),
            FsError::NotFound => write!(f, "Not found"),
            FsError::NoSpace => write!(f, "No space left on volume"),
            FsError::AlreadyExists => write!(f, "Already exists"),
            FsError::InvalidName => write!(f, "Invalid name"),
            FsError::NotADirectory => write!(f, "Not a directory"),
            FsError::ReadOnly => write!(f, "Read-only filesystem"),
            FsError::IOError => write!(f, "I/O error"),
        }
    }
}

// Core traits for filesystem abstraction

/// Represents a block device that can be read from and written to
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_num: u64, buf: &mut [u8]) -> Result<(), FsError>;
    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> Result<(), FsError>;
    fn block_size(&self) -> usize;
    fn total_blocks(&self) -> u64;

    /// Reads `buf.len() / block_size()` consecutive blocks starting at `first`
    fn read_blocks(&self, first: u64, buf: &mut [u8]) -> Result<(), FsError> {
        let block_size = self.block_size();
        for (i, chunk) in buf.chunks_exact_mut(block_size).enumerate() {
            self.read_block(first + i as u64, chunk)?;
        }
        Ok(())
    }

    /// Writes `buf.len() / block_size()` consecutive blocks starting at `first`
    fn write_blocks(&mut self, first: u64, buf: &[u8]) -> Result<(), FsError> {
        let block_size = self.block_size();
        for (i, chunk) in buf.chunks_exact(block_size).enumerate() {
            self.write_block(first + i as u64, chunk)?;
        }
        Ok(())
    }
}

/// Identifier of a node: the first cluster of its data
pub type NodeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// A file or directory as seen by the VFS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Unix-style permission bits approximated from the attribute byte
    pub mode: u16,
    pub attributes: Attributes,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub created: DateTime,
    pub accessed: DateTime,
    pub modified: DateTime,
    /// Absolute byte position of the on-disk directory entry
    pub entry_position: Option<u64>,
}

impl Node {
    /// A node description for `create_node`; everything but the name and
    /// kind is filled in by the driver
    pub fn template(name: &str, kind: NodeKind) -> Self {
        Self {
            id: 0,
            name: name.into(),
            kind,
            mode: 0o777,
            attributes: Attributes::empty(),
            size: 0,
            uid: 0,
            gid: 0,
            created: DateTime::EPOCH,
            accessed: DateTime::EPOCH,
            modified: DateTime::EPOCH,
            entry_position: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes.contains(Attributes::HIDDEN)
    }

    pub fn is_system(&self) -> bool {
        self.attributes.contains(Attributes::SYSTEM)
    }

    pub fn is_archive(&self) -> bool {
        self.attributes.contains(Attributes::ARCHIVE)
    }
}

/// Volume usage information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub block_size: usize,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub cluster_size: usize,
    pub total_clusters: u32,
    pub free_clusters: u32,
}

/// The operation table the VFS layer calls into
pub trait FileSystem: Send + Sync {
    /// Per-traversal directory state, owned by the caller
    type DirCursor;

    fn root_node(&self) -> Node;
    fn open_dir(&self, dir: NodeId) -> Result<Self::DirCursor, FsError>;
    /// Returns the next entry, or the entry called `name` when given.
    /// `NotFound` marks the end of the directory.
    fn read_dir(&self, cursor: &mut Self::DirCursor, name: Option<&str>) -> Result<Node, FsError>;
    fn close_dir(&self, cursor: Self::DirCursor);
    /// Returns the number of blocks read, short at end of chain
    fn read(
        &self,
        node: &Node,
        buf: &mut [u8],
        block_offset: u64,
        block_count: u64,
    ) -> Result<u64, FsError>;
    fn write(
        &self,
        node: &Node,
        buf: &[u8],
        block_offset: u64,
        block_count: u64,
    ) -> Result<u64, FsError>;
    fn create_node(&self, parent: NodeId, node: &Node) -> Result<Node, FsError>;
    /// Resizes the node's cluster chain to hold `new_length` bytes
    fn reallocate(&self, node: &mut Node, new_length: u64) -> Result<(), FsError>;
    fn stat(&self) -> Result<FsStat, FsError>;
}
