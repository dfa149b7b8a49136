//! `loss` and `recovery`: snapshot, wipe and restore of the data areas.
//!
//! The snapshot region of an EXT3 partition starts right after the
//! superblock: a [`SnapshotHeader`] followed by copies of the inode bitmap,
//! block bitmap, inode table and block table, in that order.

use log::{info, warn};

use crate::codec::OnDisk;
use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{SnapshotHeader, SuperBlock};
use crate::journal;
use crate::volume::{now, Volume};

/// The four areas a snapshot covers, as (offset, length) pairs.
fn areas(sb: &SuperBlock) -> [(i64, i64); 4] {
    let n = sb.inodes_count;
    let b = sb.blocks_count;
    [
        (sb.bm_inode_start, n),
        (sb.bm_block_start, b),
        (sb.inode_start, n * sb.inode_s),
        (sb.block_start, b * sb.block_s),
    ]
}

fn snapshot_start<D: BlockDevice>(vol: &Volume<D>) -> i64 {
    vol.start() + SuperBlock::SIZE as i64
}

/// Simulates a disk failure. On EXT3 the areas are first copied into the
/// snapshot region; then they are zeroed and the journal cleared.
pub fn loss<D: BlockDevice>(vol: &mut Volume<D>) -> Result<()> {
    let sb = *vol.superblock();
    let regions = areas(&sb);

    if sb.is_ext3() {
        let header = SnapshotHeader {
            last_mount: now(),
            inodes_free: sb.free_inodes,
            blocks_free: sb.free_blocks,
        };
        let mut cursor = snapshot_start(vol);
        vol.device().write_record(cursor, &header)?;
        cursor += SnapshotHeader::SIZE as i64;
        for (offset, len) in regions {
            vol.device().copy_within(offset, cursor, len)?;
            cursor += len;
        }
    } else {
        warn!("EXT2 partition at {} has no snapshot region; data is lost", vol.start());
    }

    for (offset, len) in regions {
        vol.device().zero(offset, len)?;
    }
    if sb.is_ext3() {
        journal::clear_journal(vol)?;
    }
    info!("loss simulated on partition at {}", vol.start());
    Ok(())
}

/// Restores the areas saved by the last `loss`.
pub fn recovery<D: BlockDevice>(vol: &mut Volume<D>) -> Result<()> {
    if !vol.superblock().is_ext3() {
        return Err(FsError::validation("recovery requires an EXT3 filesystem"));
    }
    let mut cursor = snapshot_start(vol);
    let header: SnapshotHeader = vol.device().read_record(cursor)?;
    if header.last_mount == 0 {
        return Err(FsError::not_found("no recovery snapshot has been taken"));
    }
    cursor += SnapshotHeader::SIZE as i64;
    for (offset, len) in areas(vol.superblock()) {
        vol.device().copy_within(cursor, offset, len)?;
        cursor += len;
    }

    vol.sb.free_inodes = header.inodes_free;
    vol.sb.free_blocks = header.blocks_free;
    vol.sb.mtime = now();
    vol.sb.mnt_count += 1;
    vol.sync()?;
    info!("partition at {} recovered from snapshot", vol.start());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemDevice;
    use crate::fs_layout::{ROOT_INODE, USERS_INODE};
    use crate::mkfs::{format, FsKind};

    #[test]
    fn loss_then_recovery_restores_content() {
        let mut vol = format(MemDevice::new(1 << 20), 0, 1 << 20, FsKind::Ext3).unwrap();
        let dir = vol.create_directory(ROOT_INODE, "docs", 1, 1).unwrap();
        let file = vol.create_file(dir, "a.txt", b"keep me", 1, 1).unwrap();
        vol.sync().unwrap();
        let sb_before = *vol.superblock();

        loss(&mut vol).unwrap();
        assert!(!vol.read_inode(ROOT_INODE).unwrap().is_dir());
        assert!(vol.resolve("/docs").is_err());
        assert!(journal::read_journal(&mut vol).unwrap().is_empty());

        recovery(&mut vol).unwrap();
        assert_eq!(vol.resolve("/docs/a.txt").unwrap(), file);
        let inode = vol.read_inode(file).unwrap();
        assert_eq!(vol.read_content(&inode).unwrap(), b"keep me");
        let users = vol.read_inode(USERS_INODE).unwrap();
        assert!(!vol.read_content(&users).unwrap().is_empty());
        assert_eq!(vol.superblock().free_inodes, sb_before.free_inodes);
        assert_eq!(vol.superblock().mnt_count, sb_before.mnt_count + 1);
    }

    #[test]
    fn recovery_without_snapshot_is_refused() {
        let mut vol = format(MemDevice::new(1 << 20), 0, 1 << 20, FsKind::Ext3).unwrap();
        assert!(matches!(recovery(&mut vol), Err(FsError::NotFound(_))));
    }

    #[test]
    fn recovery_requires_ext3() {
        let mut vol = format(MemDevice::new(1 << 20), 0, 1 << 20, FsKind::Ext2).unwrap();
        loss(&mut vol).unwrap();
        assert!(matches!(recovery(&mut vol), Err(FsError::Validation(_))));
    }
}
