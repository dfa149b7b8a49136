//! A formatted partition opened on a device: superblock plus record I/O.
//!
//! `Volume` plays the part of the in-memory filesystem state: it keeps the
//! superblock and hands out typed access to the inode table and block table.
//! Allocation, directories and file content are layered on top in their own
//! modules as further `impl Volume` blocks.

use log::debug;

use crate::codec::OnDisk;
use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{DirectoryBlock, FileBlock, Inode, SuperBlock, BLOCK_CELL_SIZE};

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct Volume<D: BlockDevice> {
    dev: D,
    start: i64,
    pub(crate) sb: SuperBlock,
}

impl<D: BlockDevice> Volume<D> {
    /// Reads and validates the superblock at `start`.
    pub fn open(mut dev: D, start: i64) -> Result<Self> {
        let sb: SuperBlock = dev.read_record(start)?;
        sb.check_magic()?;
        if sb.inode_s != Inode::SIZE as i64 || sb.block_s != BLOCK_CELL_SIZE as i64 {
            return Err(FsError::corruption(format!(
                "unexpected record sizes inode={} block={}",
                sb.inode_s, sb.block_s
            )));
        }
        debug!(
            "opened ext{} at {start}: {} inodes, {} blocks",
            sb.fs_type, sb.inodes_count, sb.blocks_count
        );
        Ok(Self { dev, start, sb })
    }

    pub(crate) fn from_parts(dev: D, start: i64, sb: SuperBlock) -> Self {
        Self { dev, start, sb }
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.sb
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn device(&mut self) -> &mut D {
        &mut self.dev
    }

    pub fn into_device(self) -> D {
        self.dev
    }

    /// Writes the in-memory superblock back to the partition header.
    pub fn sync(&mut self) -> Result<()> {
        let sb = self.sb;
        self.dev.write_record(self.start, &sb)
    }

    /* ---------------- INODES ---------------- */

    // Index must fall inside the inode table
    fn check_inode(&self, index: i64) -> Result<()> {
        if index < 0 || index >= self.sb.inodes_count {
            return Err(FsError::corruption(format!("inode {index} out of range")));
        }
        Ok(())
    }

    // Index must fall inside the block table
    fn check_block(&self, index: i64) -> Result<()> {
        if index < 0 || index >= self.sb.blocks_count {
            return Err(FsError::corruption(format!("block {index} out of range")));
        }
        Ok(())
    }

    pub fn read_inode(&mut self, index: i64) -> Result<Inode> {
        self.check_inode(index)?;
        let off = self.sb.inode_offset(index);
        self.dev.read_record(off)
    }

    pub fn write_inode(&mut self, index: i64, inode: &Inode) -> Result<()> {
        self.check_inode(index)?;
        let off = self.sb.inode_offset(index);
        self.dev.write_record(off, inode)
    }

    /// Allocates an inode slot and stores `inode` in it.
    pub fn create_inode(&mut self, inode: &Inode) -> Result<i64> {
        let index = self.alloc_inode()?;
        self.write_inode(index, inode)?;
        Ok(index)
    }

    /// Frees the inode's blocks and its slot, leaving zeroed records behind.
    pub fn release_inode(&mut self, index: i64) -> Result<()> {
        let mut inode = self.read_inode(index)?;
        self.free_blocks(&mut inode)?;
        self.mark_inode_free(index)?;
        let off = self.sb.inode_offset(index);
        self.dev.zero(off, self.sb.inode_s)
    }

    /* ---------------- BLOCKS ---------------- */

    // Raw bytes of one block cell
    pub fn read_cell(&mut self, index: i64) -> Result<Vec<u8>> {
        self.check_block(index)?;
        let off = self.sb.block_offset(index);
        self.dev.read_vec(off, BLOCK_CELL_SIZE)
    }

    /// Writes `bytes` at the start of a block cell, zero-padding the rest.
    pub fn write_cell(&mut self, index: i64, bytes: &[u8]) -> Result<()> {
        self.check_block(index)?;
        let mut cell = vec![0u8; BLOCK_CELL_SIZE];
        let len = bytes.len().min(BLOCK_CELL_SIZE);
        cell[..len].copy_from_slice(&bytes[..len]);
        let off = self.sb.block_offset(index);
        self.dev.write_bytes(off, &cell)
    }

    pub fn zero_cell(&mut self, index: i64) -> Result<()> {
        self.write_cell(index, &[])
    }

    pub fn read_dir_block(&mut self, index: i64) -> Result<DirectoryBlock> {
        Ok(DirectoryBlock::from_bytes(&self.read_cell(index)?)?)
    }

    pub fn write_dir_block(&mut self, index: i64, block: &DirectoryBlock) -> Result<()> {
        self.write_cell(index, &block.to_bytes())
    }

    pub fn read_file_block(&mut self, index: i64) -> Result<FileBlock> {
        Ok(FileBlock::from_bytes(&self.read_cell(index)?)?)
    }

    pub fn write_file_block(&mut self, index: i64, block: &FileBlock) -> Result<()> {
        self.write_cell(index, &block.to_bytes())
    }
}
