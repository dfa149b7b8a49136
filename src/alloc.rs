//! Inode and block allocation over the two byte-per-entry bitmaps.
//!
//! Marking updates the free counters and first-free hints of the in-memory
//! superblock only; callers persist it with [`Volume::sync`].

use log::debug;

use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::volume::Volume;

const FREE: u8 = 0;
const USED: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitmap {
    Inodes,
    Blocks,
}

impl<D: BlockDevice> Volume<D> {
    fn bitmap_range(&self, which: Bitmap) -> (i64, i64) {
        match which {
            Bitmap::Inodes => (self.sb.bm_inode_start, self.sb.inodes_count),
            Bitmap::Blocks => (self.sb.bm_block_start, self.sb.blocks_count),
        }
    }

    pub fn read_bitmap(&mut self, which: Bitmap) -> Result<Vec<u8>> {
        let (start, len) = self.bitmap_range(which);
        self.device().read_vec(start, len as usize)
    }

    /// First free slot in linear order.
    pub fn find_free(&mut self, which: Bitmap) -> Result<i64> {
        self.first_free_from(which, 0)?.ok_or_else(|| match which {
            Bitmap::Inodes => FsError::no_space("no free inodes"),
            Bitmap::Blocks => FsError::no_space("no free blocks"),
        })
    }

    fn first_free_from(&mut self, which: Bitmap, from: i64) -> Result<Option<i64>> {
        let map = self.read_bitmap(which)?;
        let from = from.max(0) as usize;
        Ok(map
            .iter()
            .skip(from)
            .position(|&b| b == FREE)
            .map(|p| (p + from) as i64))
    }

    pub fn is_used(&mut self, which: Bitmap, index: i64) -> Result<bool> {
        let (start, len) = self.bitmap_range(which);
        if index < 0 || index >= len {
            return Err(FsError::corruption(format!("{which:?} index {index} out of range")));
        }
        Ok(self.device().read_vec(start + index, 1)?[0] != FREE)
    }

    // Flips one bitmap byte and keeps the free counter and hint in step
    fn set_entry(&mut self, which: Bitmap, index: i64, used: bool) -> Result<()> {
        if self.is_used(which, index)? == used {
            return Ok(());
        }
        let (start, _) = self.bitmap_range(which);
        let byte = if used { USED } else { FREE };
        self.device().write_bytes(start + index, &[byte])?;

        let delta = if used { -1 } else { 1 };
        match which {
            Bitmap::Inodes => self.sb.free_inodes += delta,
            Bitmap::Blocks => self.sb.free_blocks += delta,
        }

        let hint = match which {
            Bitmap::Inodes => self.sb.first_ino,
            Bitmap::Blocks => self.sb.first_blo,
        };
        let new_hint = if used && index == hint {
            self.first_free_from(which, index + 1)?.unwrap_or(-1)
        } else if !used && (hint == -1 || index < hint) {
            index
        } else {
            hint
        };
        match which {
            Bitmap::Inodes => self.sb.first_ino = new_hint,
            Bitmap::Blocks => self.sb.first_blo = new_hint,
        }
        Ok(())
    }

    pub fn mark_inode_used(&mut self, index: i64) -> Result<()> {
        self.set_entry(Bitmap::Inodes, index, true)
    }

    pub fn mark_inode_free(&mut self, index: i64) -> Result<()> {
        self.set_entry(Bitmap::Inodes, index, false)
    }

    pub fn mark_block_used(&mut self, index: i64) -> Result<()> {
        self.set_entry(Bitmap::Blocks, index, true)
    }

    pub fn mark_block_free(&mut self, index: i64) -> Result<()> {
        self.set_entry(Bitmap::Blocks, index, false)
    }

    // Takes the first free inode and marks it used
    pub fn alloc_inode(&mut self) -> Result<i64> {
        let index = self.find_free(Bitmap::Inodes)?;
        self.mark_inode_used(index)?;
        debug!("allocated inode {index}");
        Ok(index)
    }

    // Takes the first free block and marks it used
    pub fn alloc_block(&mut self) -> Result<i64> {
        let index = self.find_free(Bitmap::Blocks)?;
        self.mark_block_used(index)?;
        debug!("allocated block {index}");
        Ok(index)
    }

    /// Frees a data block and wipes its cell.
    pub fn release_block(&mut self, index: i64) -> Result<()> {
        self.mark_block_free(index)?;
        self.zero_cell(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mkfs::{format, FsKind};
    use crate::device::MemDevice;

    fn fresh() -> Volume<MemDevice> {
        format(MemDevice::new(256 * 1024), 0, 256 * 1024, FsKind::Ext2).unwrap()
    }

    #[test]
    fn allocation_skips_bootstrap_entries() {
        let mut vol = fresh();
        let free_before = vol.superblock().free_inodes;
        assert_eq!(vol.alloc_inode().unwrap(), 2);
        assert_eq!(vol.alloc_block().unwrap(), 2);
        assert_eq!(vol.superblock().free_inodes, free_before - 1);
        assert_eq!(vol.superblock().first_ino, 3);
    }

    #[test]
    fn freeing_moves_the_hint_back_and_is_idempotent() {
        let mut vol = fresh();
        let a = vol.alloc_inode().unwrap();
        let _b = vol.alloc_inode().unwrap();
        let free = vol.superblock().free_inodes;
        vol.mark_inode_free(a).unwrap();
        vol.mark_inode_free(a).unwrap();
        assert_eq!(vol.superblock().free_inodes, free + 1);
        assert_eq!(vol.superblock().first_ino, a);
        assert_eq!(vol.find_free(Bitmap::Inodes).unwrap(), a);
    }

    #[test]
    fn exhausting_inodes_is_out_of_space() {
        let mut vol = fresh();
        let count = vol.superblock().inodes_count;
        for _ in 2..count {
            vol.alloc_inode().unwrap();
        }
        assert_eq!(vol.superblock().free_inodes, 0);
        assert!(matches!(vol.alloc_inode(), Err(FsError::OutOfSpace(_))));
    }
}
