//! Disk image files: `mkdisk` and `rmdisk`.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use rand::Rng;

use crate::device::FileDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{Fit, Mbr, MBR_RESERVED};
use crate::partition::Disk;
use crate::volume::now;

pub const DISK_SUFFIX: &str = ".mia";

/// Trims quotes and appends `.mia` when missing.
pub fn disk_path(raw: &str) -> PathBuf {
    let raw = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    if raw.to_ascii_lowercase().ends_with(DISK_SUFFIX) {
        PathBuf::from(raw)
    } else {
        PathBuf::from(format!("{raw}{DISK_SUFFIX}"))
    }
}

/// Creates a zero-filled image holding only an MBR.
pub fn mkdisk(path: &Path, size: i64, fit: Fit) -> Result<Disk<FileDevice>> {
    if size <= MBR_RESERVED {
        return Err(FsError::validation(format!(
            "a disk needs more than {MBR_RESERVED} bytes, got {size}"
        )));
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(FsError::conflict(format!("disk {}", path.display())));
        }
        Err(e) => return Err(e.into()),
    };
    file.set_len(size as u64)?;
    drop(file);

    let signature = rand::thread_rng().gen_range(1..i64::MAX);
    let disk = Disk::init(FileDevice::open(path)?, Mbr::new(size, fit, now(), signature))?;
    info!("created disk {} ({size} bytes, signature {signature})", path.display());
    Ok(disk)
}

pub fn rmdisk(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("removed disk {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(FsError::not_found(format!("disk {}", path.display())))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn open_disk(path: &Path) -> Result<Disk<FileDevice>> {
    Disk::open(FileDevice::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_layout::STATUS_EMPTY;

    #[test]
    fn suffix_is_enforced() {
        assert_eq!(disk_path("/t/a"), PathBuf::from("/t/a.mia"));
        assert_eq!(disk_path("\"/t/a.MIA\""), PathBuf::from("/t/a.MIA"));
    }

    #[test]
    fn fresh_disk_has_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/a.mia");
        mkdisk(&path, 10 * 1024 * 1024, Fit::First).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 10 * 1024 * 1024);

        let disk = open_disk(&path).unwrap();
        let mbr = disk.mbr();
        assert_eq!(mbr.size, 10 * 1024 * 1024);
        assert_ne!(mbr.signature, 0);
        assert!(mbr.partitions.iter().all(|p| p.status == STATUS_EMPTY));
    }

    #[test]
    fn existing_and_missing_disks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mia");
        mkdisk(&path, 4096, Fit::Best).unwrap();
        assert!(matches!(mkdisk(&path, 4096, Fit::Best), Err(FsError::Conflict(_))));
        rmdisk(&path).unwrap();
        assert!(matches!(rmdisk(&path), Err(FsError::NotFound(_))));
        assert!(matches!(open_disk(&path), Err(FsError::NotFound(_))));
    }
}
