//! Host-side list of the disk images created by `mkdisk`.
//!
//! Stored as `{ "disks": [...] }`. Readers share the lock, updates take it
//! exclusively and rewrite the whole file.
//!
//! The lock only orders threads of one process. Across processes the file
//! is replaced through a rename so readers never see a torn write, and an
//! update first folds in what is on disk. Two processes updating at the
//! same instant can still lose one of the updates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{FsError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RegistryFile {
    disks: Vec<String>,
}

#[derive(Debug)]
pub struct DiskRegistry {
    path: PathBuf,
    inner: RwLock<RegistryFile>,
}

/// Replaces `path` with `bytes` through a sibling temp file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", std::process::id()));
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<RegistryFile> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("resetting malformed disk registry {}: {e}", path.display());
            RegistryFile::default()
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RegistryFile::default()),
        Err(e) => Err(e.into()),
    }
}

fn poisoned() -> FsError {
    FsError::Device(io::Error::new(io::ErrorKind::Other, "disk registry lock poisoned"))
}

/// Adds disks another process registered since this one last wrote.
fn merge(into: &mut RegistryFile, other: RegistryFile) {
    for disk in other.disks {
        if !into.disks.contains(&disk) && Path::new(&disk).exists() {
            into.disks.push(disk);
        }
    }
}

impl DiskRegistry {
    /// Loads the registry, dropping entries whose image no longer exists.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = read_file(&path)?;
        let before = file.disks.len();
        file.disks.retain(|d| Path::new(d).exists());
        if file.disks.len() != before {
            debug!("registry dropped {} stale disks", before - file.disks.len());
        }
        let registry = Self {
            path,
            inner: RwLock::new(file),
        };
        registry.save()?;
        Ok(registry)
    }

    fn save(&self) -> Result<()> {
        let guard = self.inner.read().map_err(|_| poisoned())?;
        let json = serde_json::to_string_pretty(&*guard).map_err(io::Error::from)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }

    pub fn disks(&self) -> Result<Vec<String>> {
        Ok(self.inner.read().map_err(|_| poisoned())?.disks.clone())
    }

    pub fn add(&self, disk: &Path) -> Result<()> {
        let disk = disk.to_string_lossy().into_owned();
        {
            let mut guard = self.inner.write().map_err(|_| poisoned())?;
            let on_disk = read_file(&self.path)?;
            merge(&mut guard, on_disk);
            if !guard.disks.contains(&disk) {
                guard.disks.push(disk);
            }
        }
        self.save()
    }

    pub fn remove(&self, disk: &Path) -> Result<()> {
        let disk = disk.to_string_lossy();
        {
            let mut guard = self.inner.write().map_err(|_| poisoned())?;
            let on_disk = read_file(&self.path)?;
            merge(&mut guard, on_disk);
            guard.disks.retain(|d| d.as_str() != &*disk);
        }
        self.save()
    }
}
