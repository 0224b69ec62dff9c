//! FAT16 filesystem implementation

use super::*;
use alloc::boxed::Box;
use alloc::vec::Vec;
use spin::Mutex;

mod boot_sector;
mod cluster_io;
mod constants;
mod dir_entry;
mod dir_iter;
mod fat_entry;
mod fat_table;
mod file;
mod format;
mod geometry;
mod node_ops;
mod short_name;
mod timestamps;

#[cfg(test)]
mod test_util;

pub use boot_sector::BootSector;
pub use constants::*;
pub use dir_entry::{classify, display_name_of, Attributes, LfnEntry, ShortDirEntry, SlotKind};
pub use dir_iter::{DirCursor, DirIter};
pub use fat_entry::{is_end_of_chain, FatEntry};
pub use format::FormatOptions;
pub use geometry::Geometry;
pub use short_name::{basis_name, has_legal_char, is_lossless, lfn_checksum, MAX_NUMERIC_TAIL};
pub use timestamps::{decode_date, decode_time, encode_date, encode_time, DateTime};

fn epoch_clock() -> DateTime {
    DateTime::EPOCH
}

/// Per-mount behaviour switches
#[derive(Debug, Clone, Copy)]
pub struct MountOptions {
    /// Reject every operation that would modify the volume
    pub read_only: bool,
    /// Copy FAT updates into every FAT, not only the first
    pub mirror_fats: bool,
    /// Timestamp source for created and modified entries
    pub clock: fn() -> DateTime,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            mirror_fats: true,
            clock: epoch_clock,
        }
    }
}

/// Mutable allocation state, guarded for the whole of any FAT update
#[derive(Debug)]
pub(crate) struct FatState {
    /// Where the next free-cluster scan starts; a hint only
    pub last_free_cluster: u32,
}

/// FAT16 filesystem driver, one per mounted volume
pub struct Fat16<'a> {
    /// Underlying block device
    device: Mutex<Box<dyn BlockDevice + 'a>>,
    /// Boot sector containing filesystem parameters
    boot_sector: BootSector,
    /// Layout derived from the boot sector
    geometry: Geometry,
    /// Serialises allocation and chain mutation across callers
    fat: Mutex<FatState>,
    options: MountOptions,
}

/// Allocates a zero-filled working buffer, reporting failure instead of
/// aborting
pub(crate) fn zeroed_buffer(len: usize) -> Result<Vec<u8>, FsError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| FsError::OutOfMemory)?;
    buf.resize(len, 0);
    Ok(buf)
}

impl<'a> Fat16<'a> {
    /// Validates sector 0 and derives the volume geometry
    pub fn mount(device: Box<dyn BlockDevice + 'a>, options: MountOptions) -> Result<Self, FsError> {
        if device.block_size() != BLOCK_SIZE {
            log::warn!(
                "fat16: device block size {} unsupported",
                device.block_size()
            );
            return Err(FsError::BadSuperblock);
        }

        let mut sector0 = [0u8; BLOCK_SIZE];
        device.read_block(0, &mut sector0)?;
        let boot_sector = BootSector::parse(&sector0)?;
        let geometry = Geometry::from_boot_sector(&boot_sector)?;

        if geometry.total_sectors as u64 > device.total_blocks() {
            log::warn!(
                "fat16: volume claims {} sectors, device has {}",
                geometry.total_sectors,
                device.total_blocks()
            );
            return Err(FsError::BadSuperblock);
        }

        log::info!(
            "fat16: mounted {} clusters of {} bytes{}",
            geometry.total_clusters,
            geometry.bytes_per_cluster,
            if options.read_only { " (read-only)" } else { "" }
        );
        log::debug!("fat16: geometry {:?}", geometry);

        Ok(Self {
            device: Mutex::new(device),
            boot_sector,
            geometry,
            fat: Mutex::new(FatState {
                last_free_cluster: FIRST_DATA_CLUSTER,
            }),
            options,
        })
    }

    /// Releases the volume and hands the device back
    pub fn unmount(self) -> Box<dyn BlockDevice + 'a> {
        log::info!("fat16: unmounted");
        self.device.into_inner()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.boot_sector
    }

    pub fn options(&self) -> &MountOptions {
        &self.options
    }

    fn check_writable(&self) -> Result<(), FsError> {
        if self.options.read_only {
            Err(FsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn read_sector(&self, sector: u64, buf: &mut [u8]) -> Result<(), FsError> {
        self.device.lock().read_block(sector, buf)
    }

    fn write_sector(&self, sector: u64, buf: &[u8]) -> Result<(), FsError> {
        self.device.lock().write_block(sector, buf)
    }
}

/// Registration entry the VFS uses to find and mount FAT16 volumes
#[derive(Debug, Clone, Copy, Default)]
pub struct Fat16Driver;

impl Fat16Driver {
    pub const NAME: &'static str = "fat16";

    pub fn init() -> Self {
        log::info!("fat16: driver registered");
        Fat16Driver
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// True when sector 0 of `device` holds a mountable boot sector
    pub fn probe(&self, device: &dyn BlockDevice) -> bool {
        if device.block_size() != BLOCK_SIZE {
            return false;
        }
        let mut sector0 = [0u8; BLOCK_SIZE];
        if device.read_block(0, &mut sector0).is_err() {
            return false;
        }
        BootSector::parse(&sector0)
            .and_then(|bs| Geometry::from_boot_sector(&bs))
            .is_ok()
    }

    pub fn mount<'a>(
        &self,
        device: Box<dyn BlockDevice + 'a>,
        options: MountOptions,
    ) -> Result<Fat16<'a>, FsError> {
        Fat16::mount(device, options)
    }

    pub fn unmount<'a>(&self, fs: Fat16<'a>) -> Box<dyn BlockDevice + 'a> {
        fs.unmount()
    }
}

impl FileSystem for Fat16<'_> {
    type DirCursor = DirCursor;

    fn root_node(&self) -> Node {
        self.root()
    }

    fn open_dir(&self, dir: NodeId) -> Result<DirCursor, FsError> {
        self.open_directory(dir)
    }

    fn read_dir(&self, cursor: &mut DirCursor, name: Option<&str>) -> Result<Node, FsError> {
        self.next_entry(cursor, name)
    }

    fn close_dir(&self, cursor: DirCursor) {
        drop(cursor);
    }

    fn read(
        &self,
        node: &Node,
        buf: &mut [u8],
        block_offset: u64,
        block_count: u64,
    ) -> Result<u64, FsError> {
        self.read_blocks(node, buf, block_offset, block_count)
    }

    fn write(
        &self,
        node: &Node,
        buf: &[u8],
        block_offset: u64,
        block_count: u64,
    ) -> Result<u64, FsError> {
        self.write_blocks(node, buf, block_offset, block_count)
    }

    fn create_node(&self, parent: NodeId, node: &Node) -> Result<Node, FsError> {
        self.create(parent, node)
    }

    fn reallocate(&self, node: &mut Node, new_length: u64) -> Result<(), FsError> {
        self.resize(node, new_length)
    }

    fn stat(&self) -> Result<FsStat, FsError> {
        self.usage()
    }
}

#[cfg(test)]
mod tests {
    use crate::filesys::block::MemoryBlockDevice;
    use super::test_util::*;
    use super::*;

    #[test]
    fn test_mount_formatted_volume() {
        let fs = volume(4096, 1);
        let g = fs.geometry();
        assert!(g.first_data_sector > g.first_fat_sector);
        assert_eq!(fs.boot_sector().fs_type, *b"FAT16   ");
    }

    #[test]
    fn test_mount_blank_device_fails() {
        let dev = MemoryBlockDevice::new(2048, BLOCK_SIZE);
        let err = Fat16::mount(Box::new(dev), MountOptions::default()).err();
        assert_eq!(err, Some(FsError::BadSuperblock));
    }

    #[test]
    fn test_mount_corrupt_signature_fails() {
        let mut image = unmount_image(volume(2048, 1));
        image[510] = 0x00;
        let dev = MemoryBlockDevice::from_image(image, BLOCK_SIZE);
        let err = Fat16::mount(Box::new(dev), MountOptions::default()).err();
        assert_eq!(err, Some(FsError::BadSuperblock));
    }

    #[test]
    fn test_mount_wrong_block_size_fails() {
        let dev = MemoryBlockDevice::new(512, 1024);
        let err = Fat16::mount(Box::new(dev), MountOptions::default()).err();
        assert_eq!(err, Some(FsError::BadSuperblock));
    }

    #[test]
    fn test_mount_propagates_device_error() {
        let mut dev = MemoryBlockDevice::new(16, BLOCK_SIZE);
        dev.fail_block(0);
        let err = Fat16::mount(Box::new(dev), MountOptions::default()).err();
        assert_eq!(err, Some(FsError::IOError));
    }

    #[test]
    fn test_volume_larger_than_device_fails() {
        let image = unmount_image(volume(4096, 1));
        let dev = MemoryBlockDevice::from_image(image[..2048 * BLOCK_SIZE].to_vec(), BLOCK_SIZE);
        let err = Fat16::mount(Box::new(dev), MountOptions::default()).err();
        assert_eq!(err, Some(FsError::BadSuperblock));
    }

    #[test]
    fn test_driver_probe_and_remount() {
        let driver = Fat16Driver::init();
        assert_eq!(driver.name(), "fat16");

        let image = unmount_image(volume(2048, 2));
        let dev = MemoryBlockDevice::from_image(image, BLOCK_SIZE);
        assert!(driver.probe(&dev));
        assert!(!driver.probe(&MemoryBlockDevice::new(8, BLOCK_SIZE)));

        let read_only = MountOptions {
            read_only: true,
            ..MountOptions::default()
        };
        let fs = driver.mount(Box::new(dev), read_only).unwrap();
        assert!(fs.options().read_only);
        assert_eq!(fs.geometry().sectors_per_cluster, 2);
        let dev = driver.unmount(fs);
        assert_eq!(dev.total_blocks(), 2048);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(alloc::format!("{}", FsError::NoSpace), "No space left on volume");
        assert_eq!(alloc::format!("{}", FsError::BadSuperblock), "Bad superblock");
    }
}
