//! Directory blocks: lookup, insertion, removal and path resolution.
//!
//! A directory owns up to 15 blocks of 4 entries each. Slot 0 and 1 of its
//! first block are `.` and `..`; they are never returned as children.

use log::debug;

use crate::codec::OnDisk;
use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{
    DirEntry, DirectoryBlock, Inode, DIR_ENTRIES, INODE_BLOCKS, INODE_DIR, NAME_LEN, ROOT_INODE,
};
use crate::path;
use crate::volume::{now, Volume};

pub const DEFAULT_PERM: &str = "664";

/// Where an entry lives: block index plus slot inside that block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLoc {
    pub block: i64,
    pub slot: usize,
}

fn name_matches(stored: &str, wanted: &str) -> bool {
    let w = wanted.as_bytes();
    stored.as_bytes() == w || (w.len() > NAME_LEN && stored.as_bytes() == &w[..NAME_LEN])
}

fn is_dot(name: &str) -> bool {
    name == "." || name == ".."
}

impl<D: BlockDevice> Volume<D> {
    pub fn read_dir_inode(&mut self, index: i64) -> Result<Inode> {
        let inode = self.read_inode(index)?;
        if !inode.is_dir() {
            return Err(FsError::validation(format!("inode {index} is not a directory")));
        }
        Ok(inode)
    }

    /// Every occupied entry of a directory, `.` and `..` included.
    pub fn dir_entries(&mut self, dir: i64) -> Result<Vec<(EntryLoc, DirEntry)>> {
        let inode = self.read_dir_inode(dir)?;
        let mut out = Vec::new();
        for &block in inode.block.iter().filter(|&&b| b != -1) {
            let content = self.read_dir_block(block)?;
            for (slot, entry) in content.entries.iter().enumerate() {
                if !entry.is_free() {
                    out.push((EntryLoc { block, slot }, *entry));
                }
            }
        }
        Ok(out)
    }

    /// Named children of a directory, skipping `.` and `..`.
    pub fn children(&mut self, dir: i64) -> Result<Vec<(String, i64)>> {
        Ok(self
            .dir_entries(dir)?
            .into_iter()
            .map(|(_, e)| (e.name(), e.inode))
            .filter(|(name, _)| !name.is_empty() && !is_dot(name))
            .collect())
    }

    /// Named entry lookup. `.` and `..` are never matched.
    fn locate(&mut self, dir: i64, name: &str) -> Result<Option<(EntryLoc, DirEntry)>> {
        if is_dot(name) {
            return Ok(None);
        }
        Ok(self
            .dir_entries(dir)?
            .into_iter()
            .find(|(_, e)| !is_dot(&e.name()) && name_matches(&e.name(), name)))
    }

    pub fn find_child(&mut self, dir: i64, name: &str) -> Result<Option<i64>> {
        Ok(self.locate(dir, name)?.map(|(_, e)| e.inode))
    }

    pub fn find_inode_in_directory(&mut self, dir: i64, name: &str) -> Result<i64> {
        self.find_child(dir, name)?
            .ok_or_else(|| FsError::not_found(format!("'{name}' in directory inode {dir}")))
    }

    pub fn resolve_components(&mut self, parts: &[String]) -> Result<i64> {
        let mut current = ROOT_INODE;
        for part in parts {
            current = self.find_inode_in_directory(current, part)?;
        }
        Ok(current)
    }

    /// Walks an absolute path from the root; `/` is inode 0.
    pub fn resolve(&mut self, path: &str) -> Result<i64> {
        let parts = path::components(path)?;
        self.resolve_components(&parts)
            .map_err(|e| match e {
                FsError::NotFound(_) => FsError::not_found(path.to_string()),
                other => other,
            })
    }

    /// Installs `name -> child` in the first free slot, growing the
    /// directory by one block when every existing slot is taken.
    pub fn add_entry(&mut self, dir: i64, name: &str, child: i64) -> Result<()> {
        let mut inode = self.read_dir_inode(dir)?;
        let entry = DirEntry::new(name, child);
        let blocks = inode.block;

        for &block in blocks.iter().filter(|&&b| b != -1) {
            let mut content = self.read_dir_block(block)?;
            if let Some(slot) = content.entries.iter().position(DirEntry::is_free) {
                content.entries[slot] = entry;
                self.write_dir_block(block, &content)?;
                inode.mtime = now();
                return self.write_inode(dir, &inode);
            }
        }

        let slot = inode
            .block
            .iter()
            .position(|&b| b == -1)
            .ok_or_else(|| {
                FsError::no_space(format!(
                    "directory inode {dir} is full ({} entries)",
                    INODE_BLOCKS * DIR_ENTRIES
                ))
            })?;
        let block = self.alloc_block()?;
        let mut content = DirectoryBlock::empty();
        content.entries[0] = entry;
        self.write_dir_block(block, &content)?;
        inode.block[slot] = block;
        inode.mtime = now();
        self.write_inode(dir, &inode)?;
        debug!("directory {dir} grew block {block} at slot {slot}");
        Ok(())
    }

    /// Frees the entry named `name` and returns the inode it pointed at.
    /// The directory keeps its blocks.
    pub fn remove_entry(&mut self, dir: i64, name: &str) -> Result<i64> {
        if is_dot(name) {
            return Err(FsError::validation("'.' and '..' can not be removed"));
        }
        let (loc, entry) = self
            .locate(dir, name)?
            .ok_or_else(|| FsError::not_found(format!("'{name}' in directory inode {dir}")))?;
        let mut content = self.read_dir_block(loc.block)?;
        content.entries[loc.slot] = DirEntry::free();
        self.write_dir_block(loc.block, &content)?;
        let mut inode = self.read_dir_inode(dir)?;
        inode.mtime = now();
        self.write_inode(dir, &inode)?;
        Ok(entry.inode)
    }

    /// Overwrites the entry name in place.
    pub fn rename_entry(&mut self, dir: i64, old: &str, new: &str) -> Result<()> {
        let (loc, entry) = self
            .locate(dir, old)?
            .ok_or_else(|| FsError::not_found(format!("'{old}' in directory inode {dir}")))?;
        let mut content = self.read_dir_block(loc.block)?;
        content.entries[loc.slot] = DirEntry::new(new, entry.inode);
        self.write_dir_block(loc.block, &content)
    }

    /// Points the `..` entry of `dir` at `parent`.
    pub fn set_parent_link(&mut self, dir: i64, parent: i64) -> Result<()> {
        let inode = self.read_dir_inode(dir)?;
        let first = inode.block[0];
        if first == -1 {
            return Err(FsError::corruption(format!("directory inode {dir} has no blocks")));
        }
        let mut content = self.read_dir_block(first)?;
        if content.entries[1].name() != ".." {
            return Err(FsError::corruption(format!("directory inode {dir} lacks '..'")));
        }
        content.entries[1].inode = parent;
        self.write_dir_block(first, &content)
    }

    /// Allocates a directory inode with its first block and links it
    /// under `parent`.
    pub fn create_directory(&mut self, parent: i64, name: &str, uid: i64, gid: i64) -> Result<i64> {
        let mut inode = Inode::new(INODE_DIR, DEFAULT_PERM, uid, gid, now());
        let index = self.create_inode(&inode)?;
        let block = self.alloc_block()?;
        self.write_dir_block(block, &DirectoryBlock::for_directory(index, parent))?;
        inode.block[0] = block;
        inode.size = DirectoryBlock::SIZE as i64;
        self.write_inode(index, &inode)?;
        if let Err(e) = self.add_entry(parent, name, index) {
            self.release_inode(index)?;
            return Err(e);
        }
        debug!("mkdir '{name}' -> inode {index} under {parent}");
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemDevice;
    use crate::fs_layout::USERS_INODE;
    use crate::mkfs::{format, FsKind};

    fn fresh() -> Volume<MemDevice> {
        format(MemDevice::new(512 * 1024), 0, 512 * 1024, FsKind::Ext2).unwrap()
    }

    #[test]
    fn root_lists_users_file() {
        let mut vol = fresh();
        assert_eq!(vol.children(ROOT_INODE).unwrap(), vec![("users.txt".to_string(), USERS_INODE)]);
        assert_eq!(vol.resolve("/users.txt").unwrap(), USERS_INODE);
        assert_eq!(vol.resolve("/").unwrap(), ROOT_INODE);
    }

    #[test]
    fn new_directory_has_dot_entries() {
        let mut vol = fresh();
        let home = vol.create_directory(ROOT_INODE, "home", 1, 1).unwrap();
        let u = vol.create_directory(home, "u", 1, 1).unwrap();
        let entries = vol.dir_entries(u).unwrap();
        assert_eq!(entries[0].1.name(), ".");
        assert_eq!(entries[0].1.inode, u);
        assert_eq!(entries[1].1.name(), "..");
        assert_eq!(entries[1].1.inode, home);
        assert_eq!(vol.resolve("/home/u").unwrap(), u);
        assert!(matches!(vol.resolve("/home/x"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn long_names_are_truncated_and_still_found() {
        let mut vol = fresh();
        let d = vol.create_directory(ROOT_INODE, "a_very_long_directory", 1, 1).unwrap();
        let names: Vec<_> = vol.children(ROOT_INODE).unwrap().into_iter().map(|c| c.0).collect();
        assert!(names.contains(&"a_very_long_".to_string()));
        assert_eq!(vol.resolve("/a_very_long_directory").unwrap(), d);
    }

    #[test]
    fn directory_rejects_the_sixty_first_entry() {
        let mut vol = fresh();
        let d = vol.create_directory(ROOT_INODE, "full", 1, 1).unwrap();
        // two slots are taken by '.' and '..'
        for i in 0..58 {
            vol.add_entry(d, &format!("f{i}"), USERS_INODE).unwrap();
        }
        assert_eq!(vol.children(d).unwrap().len(), 58);
        assert!(matches!(
            vol.add_entry(d, "overflow", USERS_INODE),
            Err(FsError::OutOfSpace(_))
        ));
    }

    #[test]
    fn removed_slots_are_reused_without_shrinking() {
        let mut vol = fresh();
        let d = vol.create_directory(ROOT_INODE, "d", 1, 1).unwrap();
        for name in ["a", "b", "c"] {
            vol.add_entry(d, name, USERS_INODE).unwrap();
        }
        let blocks_before = vol.read_inode(d).unwrap().used_blocks().count();
        assert_eq!(vol.remove_entry(d, "a").unwrap(), USERS_INODE);
        vol.add_entry(d, "z", USERS_INODE).unwrap();
        assert_eq!(vol.read_inode(d).unwrap().used_blocks().count(), blocks_before);
        assert!(vol.find_child(d, "a").unwrap().is_none());
        assert!(vol.remove_entry(d, "..").is_err());
    }

    #[test]
    fn parent_link_can_be_rewritten() {
        let mut vol = fresh();
        let a = vol.create_directory(ROOT_INODE, "a", 1, 1).unwrap();
        let b = vol.create_directory(ROOT_INODE, "b", 1, 1).unwrap();
        vol.set_parent_link(b, a).unwrap();
        assert_eq!(vol.dir_entries(b).unwrap()[1].1.inode, a);
        assert_eq!(vol.find_child(b, "..").unwrap(), None);
        assert_eq!(vol.find_child(b, ".").unwrap(), None);
    }
}
