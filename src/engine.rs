//! The process-wide engine: configuration, mount table, login session and
//! disk registry, plus one method per command.
//!
//! Each command opens the disk image it needs, does its work and drops the
//! handle before returning. Filesystem commands run as the logged-in user
//! on the partition they logged into.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::accounts::UsersFile;
use crate::config::EngineConfig;
use crate::device::FileDevice;
use crate::disk::{self, disk_path};
use crate::error::{FsError, Result};
use crate::fs_layout::{Fit, JournalEntry, PartitionType, SuperBlock};
use crate::journal::{self, RepairOutcome};
use crate::mkfs::{self, FsKind};
use crate::mount::{MountEntry, MountTable};
use crate::ops::{self, CopyOutcome, FindMatch, MAX_CONTENT};
use crate::partition::{DeleteMode, Located};
use crate::path;
use crate::perm::parse_ugo;
use crate::recovery;
use crate::registry::DiskRegistry;
use crate::report::{self, Report, ReportKind};
use crate::session::{Session, SessionStore};
use crate::volume::Volume;

/// What an `fdisk` invocation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdiskAction {
    Create {
        kind: PartitionType,
        fit: Fit,
        size: i64,
    },
    Delete(DeleteMode),
    /// Signed byte delta.
    Resize(i64),
}

/// Where `rep` reads from: a mounted partition or a bare disk image.
#[derive(Debug, Clone, Copy)]
pub enum ReportSource<'a> {
    Mounted(&'a str),
    Disk(&'a str),
}

pub struct Engine {
    config: EngineConfig,
    mounts: MountTable,
    sessions: SessionStore,
    registry: DiskRegistry,
}

fn read_host_file(path: &Path) -> Result<Vec<u8>> {
    let meta = fs::metadata(path)
        .map_err(|_| FsError::not_found(format!("host file {}", path.display())))?;
    if meta.len() > MAX_CONTENT as u64 {
        return Err(FsError::validation(format!(
            "{} is larger than {MAX_CONTENT} bytes",
            path.display()
        )));
    }
    Ok(fs::read(path)?)
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let registry = DiskRegistry::load(config.registry_path.clone())?;
        Ok(Self {
            mounts: MountTable::new(config.carnet.clone()),
            sessions: SessionStore::new(config.session_path.clone()),
            registry,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &DiskRegistry {
        &self.registry
    }

    /* ---------------- HELPERS ---------------- */

    /// The logged-in session, or the automatic one when scripts may run
    /// without `login`.
    fn session(&mut self) -> Result<Session> {
        if let Some(session) = self.sessions.current() {
            return Ok(session.clone());
        }
        if !self.config.allow_auto {
            return Err(FsError::denied("no active session, use login first"));
        }
        let id = self
            .mounts
            .list()
            .first()
            .map(|e| e.id.clone())
            .ok_or_else(|| FsError::not_found("no mounted partition for the automatic session"))?;
        let session = Session::automatic(&id);
        self.sessions.set_transient(session.clone());
        Ok(session)
    }

    fn root_session(&mut self) -> Result<Session> {
        let session = self.session()?;
        if !session.is_root {
            return Err(FsError::denied(format!("{} is not root", session.user)));
        }
        Ok(session)
    }

    /// Refuses partitions other than the session's for non-root users.
    fn check_access(&mut self, id: &str) -> Result<()> {
        match self.sessions.current() {
            Some(session) => session.check_partition(id),
            None => Ok(()),
        }
    }

    /// Opens the filesystem of mount `id`, runs `f` and writes the
    /// superblock back whatever `f` returned.
    fn with_volume<T>(
        &mut self,
        id: &str,
        f: impl FnOnce(&mut Volume<FileDevice>) -> Result<T>,
    ) -> Result<T> {
        let entry = self.mounts.find(id)?.clone();
        let mut vol = Volume::open(FileDevice::open(&entry.path)?, entry.start)?;
        let out = f(&mut vol);
        vol.sync()?;
        out
    }

    /// Runs a file operation as the current user, journaling on success.
    fn as_user<T>(
        &mut self,
        record: Option<(&str, &str, &str)>,
        f: impl FnOnce(&mut Volume<FileDevice>, &Session) -> Result<T>,
    ) -> Result<T> {
        let session = self.session()?;
        let id = session.partition_id.clone();
        self.with_volume(&id, |vol| {
            let out = f(vol, &session)?;
            if let Some((op, target, content)) = record {
                journal::write_journal(vol, op, target, content)?;
            }
            Ok(out)
        })
    }

    /* ---------------- DISKS ---------------- */

    pub fn mkdisk(&mut self, raw_path: &str, size: i64, fit: Fit) -> Result<PathBuf> {
        let path = disk_path(raw_path);
        disk::mkdisk(&path, size, fit)?;
        self.registry.add(&path)?;
        Ok(path)
    }

    pub fn rmdisk(&mut self, raw_path: &str) -> Result<PathBuf> {
        let path = disk_path(raw_path);
        disk::rmdisk(&path)?;
        self.registry.remove(&path)?;
        let dropped = self.mounts.forget_disk(&path);
        if dropped > 0 {
            info!("dropped {dropped} mounts of {}", path.display());
        }
        Ok(path)
    }

    pub fn fdisk(&mut self, raw_path: &str, name: &str, action: FdiskAction) -> Result<Located> {
        let path = disk_path(raw_path);
        let mut disk = disk::open_disk(&path)?;
        let located = match action {
            FdiskAction::Create { kind, fit, size } => disk.create_partition(kind, fit, size, name)?,
            FdiskAction::Delete(mode) => disk.delete_partition(name, mode)?,
            FdiskAction::Resize(delta) => disk.resize_partition(name, delta)?,
        };
        self.mounts.refresh(&mut disk, &path)?;
        Ok(located)
    }

    pub fn mount(&mut self, raw_path: &str, name: &str) -> Result<MountEntry> {
        let path = disk_path(raw_path);
        let mut disk = disk::open_disk(&path)?;
        self.mounts.mount(&mut disk, &path, name.trim())
    }

    pub fn unmount(&mut self, id: &str) -> Result<MountEntry> {
        let entry = self.mounts.find(id)?.clone();
        let mut disk = disk::open_disk(&entry.path)?;
        self.mounts.unmount(&mut disk, id)
    }

    pub fn mounted(&self) -> &[MountEntry] {
        self.mounts.list()
    }

    pub fn mkfs(&mut self, id: &str, kind: FsKind) -> Result<SuperBlock> {
        self.check_access(id)?;
        let entry = self.mounts.find(id)?.clone();
        let vol = mkfs::format(FileDevice::open(&entry.path)?, entry.start, entry.size, kind)?;
        info!("{} formatted as {kind:?}", entry.id);
        Ok(*vol.superblock())
    }

    /* ---------------- SESSION ---------------- */

    pub fn current_session(&mut self) -> Option<Session> {
        self.sessions.current().cloned()
    }

    pub fn login(&mut self, user: &str, password: &str, id: &str) -> Result<Session> {
        if let Some(active) = self.sessions.current() {
            if !active.is_automatic() {
                return Err(FsError::conflict(format!(
                    "{} is already logged in, use logout first",
                    active.user
                )));
            }
        }
        let entry_id = self.mounts.find(id)?.id.clone();
        let account = self.with_volume(&entry_id, |vol| {
            vol.load_users()?.authenticate(user.trim(), password.trim())
        })?;
        let session = Session::from_account(&account, &entry_id);
        self.sessions.start(session.clone())?;
        info!("{} logged into {entry_id}", session.user);
        Ok(session)
    }

    pub fn logout(&mut self) -> Result<Session> {
        let session = self
            .sessions
            .current()
            .cloned()
            .ok_or_else(|| FsError::not_found("no active session"))?;
        self.sessions.end()?;
        info!("{} logged out", session.user);
        Ok(session)
    }

    /* ---------------- USERS AND GROUPS ---------------- */

    fn edit_users<T>(
        &mut self,
        f: impl FnOnce(&mut UsersFile) -> Result<T>,
    ) -> Result<T> {
        let session = self.root_session()?;
        self.with_volume(&session.partition_id, |vol| {
            let mut users = vol.load_users()?;
            let out = f(&mut users)?;
            vol.store_users(&users)?;
            Ok(out)
        })
    }

    pub fn mkgrp(&mut self, name: &str) -> Result<i64> {
        self.edit_users(|users| users.add_group(name.trim()))
    }

    pub fn rmgrp(&mut self, name: &str) -> Result<()> {
        self.edit_users(|users| users.remove_group(name.trim()))
    }

    pub fn mkusr(&mut self, user: &str, password: &str, group: &str) -> Result<i64> {
        self.edit_users(|users| users.add_user(user.trim(), password.trim(), group.trim()))
    }

    pub fn rmusr(&mut self, user: &str) -> Result<()> {
        self.edit_users(|users| users.remove_user(user.trim()))
    }

    pub fn chgrp(&mut self, user: &str, group: &str) -> Result<()> {
        self.edit_users(|users| users.change_group(user.trim(), group.trim()))
    }

    /* ---------------- FILES ---------------- */

    pub fn mkdir(&mut self, raw: &str, parents: bool) -> Result<i64> {
        let target = path::normalize(raw);
        self.as_user(Some(("mkdir", target.as_str(), "")), |vol, s| {
            ops::mkdir(vol, &s.requester(), &target, parents)
        })
    }

    /// Content comes from a host file when given, else `size` digits.
    pub fn mkfile(
        &mut self,
        raw: &str,
        parents: bool,
        size: Option<i64>,
        host_file: Option<&Path>,
    ) -> Result<i64> {
        let target = path::normalize(raw);
        let content = match (host_file, size) {
            (Some(file), _) => read_host_file(file)?,
            (None, Some(size)) => ops::size_content(size)?,
            (None, None) => Vec::new(),
        };
        let text = String::from_utf8_lossy(&content).into_owned();
        self.as_user(Some(("mkfile", target.as_str(), text.as_str())), |vol, s| {
            ops::mkfile(vol, &s.requester(), &target, parents, &content)
        })
    }

    pub fn edit(&mut self, raw: &str, host_file: &Path) -> Result<()> {
        let target = path::normalize(raw);
        let content = read_host_file(host_file)?;
        let text = String::from_utf8_lossy(&content).into_owned();
        self.as_user(Some(("edit", target.as_str(), text.as_str())), |vol, s| {
            ops::edit(vol, &s.requester(), &target, &content)
        })
    }

    pub fn cat(&mut self, paths: &[String]) -> Result<Vec<(String, Vec<u8>)>> {
        if paths.is_empty() {
            return Err(FsError::validation("cat needs at least one file"));
        }
        self.as_user(None, |vol, s| {
            let who = s.requester();
            paths
                .iter()
                .map(|raw| {
                    let target = path::normalize(raw);
                    let content = ops::cat(vol, &who, &target)?;
                    Ok((target, content))
                })
                .collect()
        })
    }

    pub fn remove(&mut self, raw: &str) -> Result<usize> {
        let target = path::normalize(raw);
        self.as_user(Some(("remove", target.as_str(), "")), |vol, s| {
            ops::remove(vol, &s.requester(), &target)
        })
    }

    pub fn rename(&mut self, raw: &str, new_name: &str) -> Result<()> {
        let target = path::normalize(raw);
        self.as_user(None, |vol, s| {
            ops::rename(vol, &s.requester(), &target, new_name.trim())
        })
    }

    pub fn copy(&mut self, source: &str, dest: &str) -> Result<CopyOutcome> {
        let (source, dest) = (path::normalize(source), path::normalize(dest));
        self.as_user(None, |vol, s| ops::copy(vol, &s.requester(), &source, &dest))
    }

    pub fn move_node(&mut self, source: &str, dest: &str) -> Result<()> {
        let (source, dest) = (path::normalize(source), path::normalize(dest));
        self.as_user(None, |vol, s| {
            ops::move_node(vol, &s.requester(), &source, &dest)
        })
    }

    pub fn find(&mut self, start: &str, pattern: &str) -> Result<Vec<FindMatch>> {
        let start = path::normalize(start);
        self.as_user(None, |vol, s| {
            ops::find(vol, &s.requester(), &start, pattern.trim())
        })
    }

    pub fn chmod(&mut self, raw: &str, ugo: &str, recursive: bool) -> Result<usize> {
        let target = path::normalize(raw);
        let perm = parse_ugo(ugo)?;
        self.as_user(None, |vol, s| {
            ops::chmod(vol, &s.requester(), &target, perm, recursive)
        })
    }

    /// Gives `raw` (and its subtree with `recursive`) to an active user.
    pub fn chown(&mut self, raw: &str, user: &str, recursive: bool) -> Result<usize> {
        let target = path::normalize(raw);
        let user = user.trim();
        self.as_user(None, |vol, s| {
            let uid = vol
                .load_users()?
                .find_user(user)
                .map(|u| u.uid)
                .ok_or_else(|| FsError::not_found(format!("user '{user}'")))?;
            ops::chown(vol, &s.requester(), &target, uid, recursive)
        })
    }

    /* ---------------- JOURNAL AND RECOVERY ---------------- */

    pub fn loss(&mut self, id: &str) -> Result<()> {
        self.check_access(id)?;
        self.with_volume(id, recovery::loss)
    }

    pub fn recovery(&mut self, id: &str) -> Result<()> {
        self.check_access(id)?;
        self.with_volume(id, recovery::recovery)
    }

    pub fn journal(&mut self, id: &str) -> Result<Vec<JournalEntry>> {
        self.with_volume(id, journal::read_journal)
    }

    pub fn repair_journal(&mut self, id: &str) -> Result<RepairOutcome> {
        self.check_access(id)?;
        let backup_dir = self.config.backup_dir.clone();
        let id = self.mounts.find(id)?.id.clone();
        self.with_volume(&id, |vol| journal::repair_journal(vol, &backup_dir, &id))
    }

    /* ---------------- REPORTS ---------------- */

    pub fn report(
        &mut self,
        kind: ReportKind,
        source: ReportSource<'_>,
        target: Option<&str>,
    ) -> Result<Report> {
        match source {
            ReportSource::Disk(raw) if kind.is_disk_level() => {
                let mut disk = disk::open_disk(&disk_path(raw))?;
                report::disk_report(&mut disk, kind)
            }
            ReportSource::Disk(_) => Err(FsError::validation(format!(
                "{kind:?} needs -id of a mounted partition"
            ))),
            ReportSource::Mounted(id) if kind.is_disk_level() => {
                let entry = self.mounts.find(id)?.clone();
                let mut disk = disk::open_disk(&entry.path)?;
                report::disk_report(&mut disk, kind)
            }
            ReportSource::Mounted(id) => {
                self.with_volume(id, |vol| report::fs_report(vol, kind, target))
            }
        }
    }

    /// Builds a report and writes its text to `output` on the host.
    pub fn report_to_file(
        &mut self,
        kind: ReportKind,
        source: ReportSource<'_>,
        target: Option<&str>,
        output: &Path,
    ) -> Result<Report> {
        let report = self.report(kind, source, target)?;
        let label = match source {
            ReportSource::Mounted(id) => id.to_string(),
            ReportSource::Disk(raw) => disk_path(raw).display().to_string(),
        };
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(output, format!("{}{report}", report::banner(kind, &label)))?;
        debug!("{kind:?} report written to {}", output.display());
        Ok(report)
    }
}
