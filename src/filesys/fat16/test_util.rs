//! Volume builders and raw-entry fixtures shared by the driver's tests

use super::*;
use crate::filesys::block::MemoryBlockDevice;
use alloc::vec;

pub fn format_image(total_blocks: u64, options: &FormatOptions) -> Vec<u8> {
    let dev = MemoryBlockDevice::new(total_blocks, BLOCK_SIZE);
    unmount_image(Fat16::format(Box::new(dev), options).unwrap())
}

pub fn mount_image(image: Vec<u8>, options: MountOptions) -> Fat16<'static> {
    let dev = MemoryBlockDevice::from_image(image, BLOCK_SIZE);
    Fat16::mount(Box::new(dev), options).unwrap()
}

/// Freshly formatted volume with a 512-entry root
pub fn volume(total_blocks: u64, sectors_per_cluster: u8) -> Fat16<'static> {
    volume_with(total_blocks, sectors_per_cluster, ROOT_DIR_ENTRIES)
}

pub fn volume_with(total_blocks: u64, sectors_per_cluster: u8, root_entries: u16) -> Fat16<'static> {
    let options = FormatOptions {
        sectors_per_cluster,
        root_entries,
        ..FormatOptions::default()
    };
    let dev = MemoryBlockDevice::new(total_blocks, BLOCK_SIZE);
    Fat16::format(Box::new(dev), &options).unwrap()
}

/// Formatted volume whose device faults on the sector `pick` selects
pub fn volume_failing(
    total_blocks: u64,
    sectors_per_cluster: u8,
    pick: impl FnOnce(&Geometry) -> u64,
) -> Fat16<'static> {
    let fs = volume(total_blocks, sectors_per_cluster);
    let bad = pick(fs.geometry());
    let mut dev = MemoryBlockDevice::from_image(unmount_image(fs), BLOCK_SIZE);
    dev.fail_block(bad);
    Fat16::mount(Box::new(dev), MountOptions::default()).unwrap()
}

/// Unmounts and copies the whole device out
pub fn unmount_image(fs: Fat16<'_>) -> Vec<u8> {
    let dev = fs.unmount();
    let mut image = vec![0u8; dev.total_blocks() as usize * dev.block_size()];
    dev.read_blocks(0, &mut image).unwrap();
    image
}

/// Writes a raw slot into directory `dir`, counting slots across its chain
pub fn plant(fs: &Fat16, dir: u32, slot: usize, raw: &[u8; DIR_ENTRY_SIZE]) {
    let per_cluster = fs.geometry().bytes_per_cluster / DIR_ENTRY_SIZE;
    let cluster = fs.nth_cluster(dir, (slot / per_cluster) as u32).unwrap();
    let (first_sector, _) = fs.geometry().cluster_extent(cluster).unwrap();
    let position = first_sector * BLOCK_SIZE as u64 + ((slot % per_cluster) * DIR_ENTRY_SIZE) as u64;
    fs.write_entry_at(position, raw).unwrap();
}

pub fn short_raw(name: &[u8; 11], attributes: Attributes, cluster: u16, size: u32) -> [u8; DIR_ENTRY_SIZE] {
    let mut entry = ShortDirEntry::new(*name, attributes, cluster, DateTime::EPOCH);
    entry.file_size = size;
    let mut raw = [0u8; DIR_ENTRY_SIZE];
    entry.encode(&mut raw);
    raw
}

/// Long-name fragments for `name` in on-disk order: highest index first,
/// carrying the last-fragment flag, padded with NUL then 0xFFFF
pub fn lfn_raws(name: &str, checksum: u8) -> Vec<[u8; DIR_ENTRY_SIZE]> {
    let mut units: Vec<u16> = name.chars().map(|c| c as u32 as u16).collect();
    if units.len() % LFN_CHARS_PER_ENTRY != 0 {
        units.push(0);
    }
    while units.len() % LFN_CHARS_PER_ENTRY != 0 {
        units.push(0xFFFF);
    }

    let count = units.len() / LFN_CHARS_PER_ENTRY;
    (1..=count)
        .rev()
        .map(|index| {
            let mut fragment = LfnEntry {
                order: index as u8,
                units: [0; LFN_CHARS_PER_ENTRY],
                checksum,
            };
            if index == count {
                fragment.order |= LFN_LAST_FRAGMENT;
            }
            let start = (index - 1) * LFN_CHARS_PER_ENTRY;
            fragment
                .units
                .copy_from_slice(&units[start..start + LFN_CHARS_PER_ENTRY]);
            let mut raw = [0u8; DIR_ENTRY_SIZE];
            fragment.encode(&mut raw);
            raw
        })
        .collect()
}

pub fn create_dir(fs: &Fat16, parent: u32, name: &str) -> Node {
    fs.create(parent, &Node::template(name, NodeKind::Directory))
        .unwrap()
}

/// A root-directory file with a chain sized for `len` bytes
pub fn sized_file(fs: &Fat16, name: &str, len: u64) -> Node {
    let mut node = fs
        .create(ROOT_CLUSTER_BASE, &Node::template(name, NodeKind::File))
        .unwrap();
    fs.resize(&mut node, len).unwrap();
    node
}
