//! Formatting a partition as EXT2 or EXT3.
//!
//! Layout, in order from the partition start:
//!
//! ```text
//! EXT2: superblock | inode bitmap | block bitmap | inode table | block table
//! EXT3: superblock | recovery snapshot | journal | inode bitmap | ...
//! ```

use log::{debug, info};

use crate::codec::OnDisk;
use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{
    DirEntry, DirectoryBlock, FileBlock, Inode, JournalEntry, SnapshotHeader, SuperBlock,
    BLOCK_CELL_SIZE, INODE_DIR, INODE_FILE, JOURNAL_ENTRIES, ROOT_INODE, SUPERBLOCK_MAGIC,
    USERS_INODE,
};
use crate::journal;
use crate::volume::{now, Volume};

pub const USERS_FILE: &str = "users.txt";
pub const USERS_BOOTSTRAP: &str = "1,G,root\n1,U,root,root,123\n";

const INODE_SIZE: i64 = Inode::SIZE as i64;
const CELL_SIZE: i64 = BLOCK_CELL_SIZE as i64;
const SB_SIZE: i64 = SuperBlock::SIZE as i64;
const JOURNAL_REGION: i64 = (JOURNAL_ENTRIES * JournalEntry::SIZE) as i64;
const SNAPSHOT_HEADER: i64 = SnapshotHeader::SIZE as i64;

/// Bytes one inode costs: its bitmap byte, three block bitmap bytes,
/// its record and three block cells.
const PER_INODE: i64 = 1 + 3 + INODE_SIZE + 3 * CELL_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Ext2,
    Ext3,
}

impl FsKind {
    pub fn parse(s: &str) -> Option<FsKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2fs" | "ext2" => Some(FsKind::Ext2),
            "3fs" | "ext3" => Some(FsKind::Ext3),
            _ => None,
        }
    }

    pub fn fs_type(self) -> i64 {
        match self {
            FsKind::Ext2 => 2,
            FsKind::Ext3 => 3,
        }
    }
}

/// Region offsets of a partition about to be formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub kind: FsKind,
    pub inodes: i64,
    pub snapshot_start: Option<i64>,
    pub journal_start: Option<i64>,
    pub bm_inode_start: i64,
    pub bm_block_start: i64,
    pub inode_start: i64,
    pub block_start: i64,
    pub end: i64,
}

impl Geometry {
    pub fn compute(kind: FsKind, start: i64, size: i64) -> Result<Geometry> {
        let inodes = match kind {
            FsKind::Ext2 => (size - SB_SIZE) / PER_INODE,
            FsKind::Ext3 => (size - SB_SIZE - JOURNAL_REGION - SNAPSHOT_HEADER) / (2 * PER_INODE),
        };
        if inodes < 2 {
            return Err(FsError::no_space(format!(
                "partition of {size} bytes is too small for {kind:?}"
            )));
        }

        let mut cursor = start + SB_SIZE;
        let (snapshot_start, journal_start) = match kind {
            FsKind::Ext2 => (None, None),
            FsKind::Ext3 => {
                let snapshot = cursor;
                cursor += snapshot_len(inodes);
                let journal = cursor;
                cursor += JOURNAL_REGION;
                (Some(snapshot), Some(journal))
            }
        };
        let bm_inode_start = cursor;
        let bm_block_start = bm_inode_start + inodes;
        let inode_start = bm_block_start + 3 * inodes;
        let block_start = inode_start + inodes * INODE_SIZE;
        let end = block_start + 3 * inodes * CELL_SIZE;
        Ok(Geometry {
            kind,
            inodes,
            snapshot_start,
            journal_start,
            bm_inode_start,
            bm_block_start,
            inode_start,
            block_start,
            end,
        })
    }

    fn superblock(&self) -> SuperBlock {
        SuperBlock {
            fs_type: self.kind.fs_type(),
            inodes_count: self.inodes,
            blocks_count: 3 * self.inodes,
            free_blocks: 3 * self.inodes,
            free_inodes: self.inodes,
            mtime: now(),
            umtime: 0,
            mnt_count: 1,
            magic: SUPERBLOCK_MAGIC,
            inode_s: INODE_SIZE,
            block_s: CELL_SIZE,
            first_ino: 0,
            first_blo: 0,
            bm_inode_start: self.bm_inode_start,
            bm_block_start: self.bm_block_start,
            inode_start: self.inode_start,
            block_start: self.block_start,
        }
    }
}

/// Size of the snapshot region: header plus a copy of both bitmaps,
/// the inode table and the block table.
pub fn snapshot_len(inodes: i64) -> i64 {
    SNAPSHOT_HEADER + inodes * PER_INODE
}

/// Zeroes the partition regions and writes a fresh filesystem holding
/// the root directory and `users.txt`.
pub fn format<D: BlockDevice>(mut dev: D, start: i64, size: i64, kind: FsKind) -> Result<Volume<D>> {
    let geo = Geometry::compute(kind, start, size)?;
    debug!("mkfs geometry {geo:?}");
    dev.zero(start, geo.end - start)?;

    let mut vol = Volume::from_parts(dev, start, geo.superblock());
    let stamp = now();

    vol.mark_inode_used(ROOT_INODE)?;
    vol.mark_block_used(0)?;
    let mut root = Inode::new(INODE_DIR, "755", 0, 0, stamp);
    root.block[0] = 0;
    root.size = DirectoryBlock::SIZE as i64;
    vol.write_inode(ROOT_INODE, &root)?;

    let mut root_block = DirectoryBlock::for_directory(ROOT_INODE, ROOT_INODE);
    root_block.entries[2] = DirEntry::new(USERS_FILE, USERS_INODE);
    vol.write_dir_block(0, &root_block)?;

    vol.mark_inode_used(USERS_INODE)?;
    vol.mark_block_used(1)?;
    let mut users = Inode::new(INODE_FILE, "644", 1, 1, stamp);
    users.block[0] = 1;
    users.size = USERS_BOOTSTRAP.len() as i64;
    vol.write_inode(USERS_INODE, &users)?;
    vol.write_file_block(1, &FileBlock::from_slice(USERS_BOOTSTRAP.as_bytes()))?;

    if kind == FsKind::Ext3 {
        journal::clear_journal(&mut vol)?;
        journal::write_journal(&mut vol, "mkfile", "/users.txt", USERS_BOOTSTRAP)?;
    }

    vol.sync()?;
    info!(
        "formatted {:?} at {start}: {} inodes, {} blocks",
        kind, geo.inodes, 3 * geo.inodes
    );
    Ok(vol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Bitmap;
    use crate::device::MemDevice;

    #[test]
    fn ext2_geometry_fits_the_partition() {
        let size = 3 * 1024 * 1024;
        let geo = Geometry::compute(FsKind::Ext2, 1000, size).unwrap();
        assert_eq!(geo.inodes, (size - 136) / 464);
        assert_eq!(geo.bm_inode_start, 1000 + 136);
        assert!(geo.end <= 1000 + size);
        assert!(geo.journal_start.is_none());
    }

    #[test]
    fn ext3_places_snapshot_then_journal() {
        let size = 3 * 1024 * 1024;
        let geo = Geometry::compute(FsKind::Ext3, 0, size).unwrap();
        assert_eq!(geo.snapshot_start, Some(136));
        assert_eq!(geo.journal_start, Some(136 + snapshot_len(geo.inodes)));
        assert_eq!(geo.bm_inode_start - JOURNAL_REGION, geo.journal_start.unwrap());
        assert!(geo.end <= size);
    }

    #[test]
    fn tiny_partitions_are_rejected() {
        assert!(matches!(
            Geometry::compute(FsKind::Ext3, 0, 4096),
            Err(FsError::OutOfSpace(_))
        ));
    }

    #[test]
    fn fresh_superblock_counts_bootstrap_objects() {
        let vol = format(MemDevice::new(1 << 20), 0, 1 << 20, FsKind::Ext3).unwrap();
        let sb = *vol.superblock();
        assert_eq!(sb.magic, SUPERBLOCK_MAGIC);
        assert_eq!(sb.fs_type, 3);
        assert_eq!(sb.free_inodes, sb.inodes_count - 2);
        assert_eq!(sb.free_blocks, sb.blocks_count - 2);
        assert_eq!((sb.first_ino, sb.first_blo), (2, 2));
    }

    #[test]
    fn reopening_reads_the_same_superblock() {
        let vol = format(MemDevice::new(1 << 20), 4096, 600 * 1024, FsKind::Ext2).unwrap();
        let sb = *vol.superblock();
        let mut reopened = Volume::open(vol.into_device(), 4096).unwrap();
        assert_eq!(*reopened.superblock(), sb);
        assert!(reopened.is_used(Bitmap::Inodes, 1).unwrap());
        assert!(!reopened.is_used(Bitmap::Inodes, 2).unwrap());
        let root = reopened.read_inode(ROOT_INODE).unwrap();
        assert_eq!(root.perm_str(), "755");
        assert_eq!(root.uid, 0);
    }
}
