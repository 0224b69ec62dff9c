#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]
extern crate alloc;

pub mod filesys;
pub mod logging;

pub mod prelude {
    pub use crate::filesys::fat16::{Fat16, Fat16Driver, FormatOptions, MountOptions};
    pub use crate::filesys::{BlockDevice, FileSystem, FsError, Node, NodeKind};
}
