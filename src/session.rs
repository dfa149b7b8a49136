//! The single login slot and its JSON sidecar file.
//!
//! The sidecar lets a second process see who is logged in. It is written on
//! login, removed on logout and read lazily when memory holds no session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::accounts::Account;
use crate::error::{FsError, Result};
use crate::perm::{Requester, AUTO_USER};
use crate::registry::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: String,
    pub group: String,
    pub partition_id: String,
    pub uid: i64,
    pub gid: i64,
    pub is_active: bool,
    pub is_root: bool,
}

impl Session {
    pub fn from_account(account: &Account, partition_id: &str) -> Self {
        Self {
            user: account.user.clone(),
            group: account.group.clone(),
            partition_id: partition_id.to_string(),
            uid: account.uid,
            gid: account.gid,
            is_active: true,
            is_root: account.is_root(),
        }
    }

    /// Synthetic root session used when scripted runs are allowed to skip
    /// `login`.
    pub fn automatic(partition_id: &str) -> Self {
        Self {
            user: AUTO_USER.to_string(),
            group: String::new(),
            partition_id: partition_id.to_string(),
            uid: 0,
            gid: 0,
            is_active: true,
            is_root: true,
        }
    }

    pub fn is_automatic(&self) -> bool {
        self.user == AUTO_USER
    }

    pub fn requester(&self) -> Requester {
        Requester::new(self.user.clone(), self.uid, self.gid)
    }

    /// Non-root users may only touch the partition they logged into.
    pub fn check_partition(&self, id: &str) -> Result<()> {
        if self.is_root || self.partition_id.eq_ignore_ascii_case(id) {
            Ok(())
        } else {
            Err(FsError::denied(format!(
                "{} is logged into '{}', not '{id}'",
                self.user, self.partition_id
            )))
        }
    }
}

/// In-memory slot mirrored to a file.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    current: Option<Session>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The active session, falling back to the sidecar file.
    pub fn current(&mut self) -> Option<&Session> {
        if self.current.is_none() {
            self.current = self.load();
        }
        self.current.as_ref().filter(|s| s.is_active)
    }

    fn load(&self) -> Option<Session> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("can not read session file {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str::<Session>(&text) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("ignoring malformed session file {}: {e}", self.path.display());
                None
            }
        }
    }

    pub fn start(&mut self, session: Session) -> Result<()> {
        let json = serde_json::to_string_pretty(&session)
            .map_err(|e| FsError::Device(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        write_atomic(&self.path, json.as_bytes())?;
        debug!("session for {} saved to {}", session.user, self.path.display());
        self.current = Some(session);
        Ok(())
    }

    /// Keeps a session in memory only; used for the automatic session.
    pub fn set_transient(&mut self, session: Session) {
        self.current = Some(session);
    }

    pub fn end(&mut self) -> Result<()> {
        self.current = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
