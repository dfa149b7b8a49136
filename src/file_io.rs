//! File content spread over the direct blocks of an inode.

use log::debug;

use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{FileBlock, Inode, FILE_BLOCK_CAPACITY, INODE_BLOCKS, INODE_FILE, MAX_FILE_SIZE};
use crate::directory::DEFAULT_PERM;
use crate::volume::{now, Volume};

pub fn blocks_needed(len: usize) -> usize {
    len.div_ceil(FILE_BLOCK_CAPACITY)
}

impl<D: BlockDevice> Volume<D> {
    /// Concatenates the inode's blocks up to its recorded size.
    pub fn read_content(&mut self, inode: &Inode) -> Result<Vec<u8>> {
        let size = inode.size.max(0) as usize;
        let mut out = Vec::with_capacity(size);
        for block in inode.used_blocks() {
            if out.len() >= size {
                break;
            }
            out.extend_from_slice(&self.read_file_block(block)?.data);
        }
        out.truncate(size);
        Ok(out)
    }

    /// Stores `bytes` as the whole content of inode `index`, allocating
    /// missing blocks and releasing the ones no longer needed.
    pub fn write_content(&mut self, index: i64, inode: &mut Inode, bytes: &[u8]) -> Result<()> {
        let needed = blocks_needed(bytes.len());
        if needed > INODE_BLOCKS {
            return Err(FsError::no_space(format!(
                "{} bytes exceed the {MAX_FILE_SIZE} bytes an inode can hold",
                bytes.len()
            )));
        }
        let missing = inode.block[..needed].iter().filter(|&&b| b == -1).count() as i64;
        if missing > self.sb.free_blocks {
            return Err(FsError::no_space(format!(
                "{missing} blocks needed, {} free",
                self.sb.free_blocks
            )));
        }

        for (i, chunk) in bytes.chunks(FILE_BLOCK_CAPACITY).enumerate() {
            if inode.block[i] == -1 {
                inode.block[i] = self.alloc_block()?;
            }
            self.write_file_block(inode.block[i], &FileBlock::from_slice(chunk))?;
        }
        for slot in needed..INODE_BLOCKS {
            if inode.block[slot] != -1 {
                self.release_block(inode.block[slot])?;
                inode.block[slot] = -1;
            }
        }

        inode.size = bytes.len() as i64;
        inode.mtime = now();
        self.write_inode(index, inode)?;
        debug!("inode {index}: wrote {} bytes in {needed} blocks", bytes.len());
        Ok(())
    }

    /// Releases every allocated block of `inode`; the caller persists it.
    pub fn free_blocks(&mut self, inode: &mut Inode) -> Result<()> {
        for slot in inode.block.iter_mut() {
            if *slot != -1 {
                self.release_block(*slot)?;
                *slot = -1;
            }
        }
        inode.size = 0;
        Ok(())
    }

    /// Allocates a file inode holding `content` and links it under `parent`.
    pub fn create_file(
        &mut self,
        parent: i64,
        name: &str,
        content: &[u8],
        uid: i64,
        gid: i64,
    ) -> Result<i64> {
        if blocks_needed(content.len()) > INODE_BLOCKS {
            return Err(FsError::no_space(format!(
                "{} bytes exceed the {MAX_FILE_SIZE} bytes an inode can hold",
                content.len()
            )));
        }
        let mut inode = Inode::new(INODE_FILE, DEFAULT_PERM, uid, gid, now());
        let index = self.create_inode(&inode)?;
        self.write_content(index, &mut inode, content)?;
        if let Err(e) = self.add_entry(parent, name, index) {
            self.release_inode(index)?;
            return Err(e);
        }
        debug!("mkfile '{name}' -> inode {index} under {parent}");
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Bitmap;
    use crate::device::MemDevice;
    use crate::fs_layout::{ROOT_INODE, USERS_INODE};
    use crate::mkfs::{format, FsKind};

    fn fresh() -> Volume<MemDevice> {
        format(MemDevice::new(512 * 1024), 0, 512 * 1024, FsKind::Ext2).unwrap()
    }

    #[test]
    fn users_file_holds_bootstrap_content() {
        let mut vol = fresh();
        let inode = vol.read_inode(USERS_INODE).unwrap();
        let text = vol.read_content(&inode).unwrap();
        assert_eq!(text, b"1,G,root\n1,U,root,root,123\n");
    }

    #[test]
    fn block_counts_follow_content_length() {
        let mut vol = fresh();
        for (name, len, blocks) in [("zero", 0, 0), ("two", 128, 2), ("three", 129, 3)] {
            let data = vec![b'x'; len];
            let ino = vol.create_file(ROOT_INODE, name, &data, 1, 1).unwrap();
            let inode = vol.read_inode(ino).unwrap();
            assert_eq!(inode.used_blocks().count(), blocks, "{name}");
            assert_eq!(vol.read_content(&inode).unwrap(), data);
        }
    }

    #[test]
    fn oversized_content_is_rejected_without_allocating() {
        let mut vol = fresh();
        let free_inodes = vol.superblock().free_inodes;
        let free_blocks = vol.superblock().free_blocks;
        let data = vec![b'x'; MAX_FILE_SIZE + 1];
        assert!(matches!(
            vol.create_file(ROOT_INODE, "big", &data, 1, 1),
            Err(FsError::OutOfSpace(_))
        ));
        assert_eq!(vol.superblock().free_inodes, free_inodes);
        assert_eq!(vol.superblock().free_blocks, free_blocks);
        assert!(vol.create_file(ROOT_INODE, "max", &vec![b'y'; MAX_FILE_SIZE], 1, 1).is_ok());
    }

    #[test]
    fn shrinking_content_releases_tail_blocks() {
        let mut vol = fresh();
        let ino = vol.create_file(ROOT_INODE, "f", &[7u8; 200], 1, 1).unwrap();
        let mut inode = vol.read_inode(ino).unwrap();
        let tail = inode.block[3];
        vol.write_content(ino, &mut inode, b"short").unwrap();
        assert_eq!(inode.used_blocks().count(), 1);
        assert!(!vol.is_used(Bitmap::Blocks, tail).unwrap());
        assert_eq!(vol.read_content(&inode).unwrap(), b"short");
    }

    #[test]
    fn free_blocks_returns_every_block() {
        let mut vol = fresh();
        let ino = vol.create_file(ROOT_INODE, "f", &[1u8; 130], 1, 1).unwrap();
        let before = vol.superblock().free_blocks;
        let mut inode = vol.read_inode(ino).unwrap();
        vol.free_blocks(&mut inode).unwrap();
        assert_eq!(vol.superblock().free_blocks, before + 3);
        assert!(inode.block.iter().all(|&b| b == -1));
    }
}
