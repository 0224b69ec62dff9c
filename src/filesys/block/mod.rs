//! Block device implementations

pub mod memory;

pub use memory::MemoryBlockDevice;
