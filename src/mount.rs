//! Process-wide table of mounted partitions.
//!
//! Ids are `<carnet><n><letter>`: `n` counts mounts per disk, the letter
//! is fixed per disk in the order disks were first mounted ('A', 'B', ...).

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::codec::fixed;
use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::PartitionType;
use crate::partition::{Disk, Slot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub id: String,
    pub path: PathBuf,
    pub name: String,
    pub kind: PartitionType,
    pub start: i64,
    pub size: i64,
    pub correlative: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MountTable {
    carnet: String,
    entries: Vec<MountEntry>,
    /// Disks in first-mount order; the index picks the letter.
    letters: Vec<PathBuf>,
}

impl MountTable {
    pub fn new(carnet: impl Into<String>) -> Self {
        Self {
            carnet: carnet.into(),
            entries: Vec::new(),
            letters: Vec::new(),
        }
    }

    pub fn list(&self) -> &[MountEntry] {
        &self.entries
    }

    pub fn find(&self, id: &str) -> Result<&MountEntry> {
        let id = id.trim();
        self.entries
            .iter()
            .find(|e| e.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| FsError::not_found(format!("mounted partition '{id}'")))
    }

    fn letter_for(&mut self, path: &Path) -> Result<char> {
        let idx = match self.letters.iter().position(|p| p == path) {
            Some(idx) => idx,
            None => {
                self.letters.push(path.to_path_buf());
                self.letters.len() - 1
            }
        };
        u8::try_from(idx)
            .ok()
            .filter(|&i| i < 26)
            .map(|i| (b'A' + i) as char)
            .ok_or_else(|| FsError::no_space("no mount letters left"))
    }

    fn next_number(&self, path: &Path) -> usize {
        self.entries
            .iter()
            .filter(|e| e.path == path)
            .filter_map(|e| {
                e.id.strip_prefix(self.carnet.as_str())
                    .map(|rest| rest.trim_end_matches(|c: char| c.is_ascii_alphabetic()))
                    .and_then(|n| n.parse::<usize>().ok())
            })
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Mounts a primary or logical partition found by name.
    pub fn mount<D: BlockDevice>(
        &mut self,
        disk: &mut Disk<D>,
        path: &Path,
        name: &str,
    ) -> Result<MountEntry> {
        let located = disk.locate(name)?;
        if located.kind == PartitionType::Extended {
            return Err(FsError::validation(format!(
                "'{name}' is an extended partition and can not be mounted"
            )));
        }
        if self
            .entries
            .iter()
            .any(|e| e.path == path && e.name.eq_ignore_ascii_case(&located.name))
        {
            return Err(FsError::conflict(format!("'{name}' is already mounted")));
        }

        let letter = self.letter_for(path)?;
        let id = format!("{}{}{letter}", self.carnet, self.next_number(path));
        let correlative = self.entries.len() as i64 + 1;

        if let Slot::Mbr(idx) = located.slot {
            let part = &mut disk.mbr_mut().partitions[idx];
            part.id = fixed(&id);
            part.correlative = correlative;
            disk.sync()?;
        }

        let entry = MountEntry {
            id,
            path: path.to_path_buf(),
            name: located.name,
            kind: located.kind,
            start: located.start,
            size: located.size,
            correlative,
        };
        info!("mounted '{}' of {} as {}", entry.name, path.display(), entry.id);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Drops the entry and clears the id stored in the MBR for primaries.
    pub fn unmount<D: BlockDevice>(&mut self, disk: &mut Disk<D>, id: &str) -> Result<MountEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.id.eq_ignore_ascii_case(id.trim()))
            .ok_or_else(|| FsError::not_found(format!("mounted partition '{id}'")))?;
        let entry = self.entries.remove(pos);
        if let Ok(located) = disk.locate(&entry.name) {
            if let Slot::Mbr(idx) = located.slot {
                let part = &mut disk.mbr_mut().partitions[idx];
                part.id = [0; 4];
                part.correlative = 0;
                disk.sync()?;
            }
        }
        info!("unmounted {}", entry.id);
        Ok(entry)
    }

    /// Re-reads the offsets of every entry of `path` after the partition
    /// table changed; entries whose partition is gone are dropped.
    pub fn refresh<D: BlockDevice>(&mut self, disk: &mut Disk<D>, path: &Path) -> Result<()> {
        let mut kept = Vec::with_capacity(self.entries.len());
        for mut entry in std::mem::take(&mut self.entries) {
            if entry.path != path {
                kept.push(entry);
                continue;
            }
            match disk.locate(&entry.name) {
                Ok(located) => {
                    entry.start = located.start;
                    entry.size = located.size;
                    kept.push(entry);
                }
                Err(FsError::NotFound(_)) => {
                    warn!("{} no longer exists, dropping its mount", entry.id);
                }
                Err(e) => {
                    self.entries = kept;
                    return Err(e);
                }
            }
        }
        self.entries = kept;
        Ok(())
    }

    /// Forgets every mount of a disk that was removed.
    pub fn forget_disk(&mut self, path: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.path != path);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemDevice;
    use crate::fs_layout::{Fit, Mbr};

    const K: i64 = 1024;

    fn disk() -> Disk<MemDevice> {
        let mut d = Disk::init(MemDevice::new(64 * 1024), Mbr::new(64 * K, Fit::First, 0, 1)).unwrap();
        d.create_partition(PartitionType::Primary, Fit::First, 8 * K, "part1").unwrap();
        d.create_partition(PartitionType::Primary, Fit::First, 8 * K, "part2").unwrap();
        d.create_partition(PartitionType::Extended, Fit::First, 16 * K, "ext").unwrap();
        d.create_partition(PartitionType::Logical, Fit::First, 4 * K, "log1").unwrap();
        d
    }

    #[test]
    fn ids_follow_carnet_number_letter() {
        let mut table = MountTable::new("53");
        let mut a = disk();
        let mut b = disk();
        let first = table.mount(&mut a, Path::new("/t/a.mia"), "part1").unwrap();
        let other = table.mount(&mut b, Path::new("/t/b.mia"), "part1").unwrap();
        let second = table.mount(&mut a, Path::new("/t/a.mia"), "PART2").unwrap();
        assert_eq!(first.id, "531A");
        assert_eq!(other.id, "531B");
        assert_eq!(second.id, "532A");
        assert_eq!(second.correlative, 3);
        assert_eq!(a.mbr().partitions[0].id(), "531A");
        assert_eq!(table.find("531a").unwrap().name, "part1");
    }

    #[test]
    fn extended_and_duplicate_mounts_are_rejected() {
        let mut table = MountTable::new("53");
        let mut d = disk();
        let path = Path::new("/t/a.mia");
        assert!(matches!(table.mount(&mut d, path, "ext"), Err(FsError::Validation(_))));
        table.mount(&mut d, path, "log1").unwrap();
        assert!(matches!(table.mount(&mut d, path, "LOG1"), Err(FsError::Conflict(_))));
        assert!(matches!(table.mount(&mut d, path, "nope"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn unmount_clears_the_mbr_and_ids_do_not_collide() {
        let mut table = MountTable::new("53");
        let mut d = disk();
        let path = Path::new("/t/a.mia");
        table.mount(&mut d, path, "part1").unwrap();
        table.mount(&mut d, path, "part2").unwrap();
        table.unmount(&mut d, "531A").unwrap();
        assert_eq!(d.mbr().partitions[0].id(), "");
        assert_eq!(d.mbr().partitions[0].correlative, 0);
        let again = table.mount(&mut d, path, "part1").unwrap();
        assert_eq!(again.id, "533A");
        assert!(table.unmount(&mut d, "999Z").is_err());
    }

    #[test]
    fn refresh_follows_moved_partitions() {
        let mut table = MountTable::new("53");
        let mut d = disk();
        let path = Path::new("/t/a.mia");
        table.mount(&mut d, path, "part1").unwrap();
        table.mount(&mut d, path, "part2").unwrap();
        d.delete_partition("part1", crate::partition::DeleteMode::Fast).unwrap();
        table.refresh(&mut d, path).unwrap();
        assert_eq!(table.list().len(), 1);
        assert_eq!(table.list()[0].start, crate::fs_layout::MBR_RESERVED);
        assert_eq!(table.forget_disk(path), 1);
    }
}
