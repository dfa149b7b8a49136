//! Error kinds shared by every layer of the engine.

use std::fmt;
use std::io;

use crate::codec::CodecError;

#[derive(Debug)]
pub enum FsError {
    /// Missing or malformed argument, name too long, content too large.
    Validation(String),
    /// Path, partition, mount id, user or group does not exist.
    NotFound(String),
    PermissionDenied(String),
    /// Name already taken, user or group already active, partition already mounted.
    Conflict(String),
    /// No free inode or block, partition or directory saturated.
    OutOfSpace(String),
    /// Magic mismatch or a structural invariant broken on disk.
    Corruption(String),
    Device(io::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        FsError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        FsError::NotFound(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        FsError::PermissionDenied(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        FsError::Conflict(msg.into())
    }

    pub fn no_space(msg: impl Into<String>) -> Self {
        FsError::OutOfSpace(msg.into())
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        FsError::Corruption(msg.into())
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Validation(m) => write!(f, "invalid argument: {m}"),
            FsError::NotFound(m) => write!(f, "not found: {m}"),
            FsError::PermissionDenied(m) => write!(f, "permission denied: {m}"),
            FsError::Conflict(m) => write!(f, "already exists: {m}"),
            FsError::OutOfSpace(m) => write!(f, "out of space: {m}"),
            FsError::Corruption(m) => write!(f, "corrupted filesystem: {m}"),
            FsError::Device(e) => write!(f, "device error: {e}"),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        FsError::Device(e)
    }
}

impl From<CodecError> for FsError {
    fn from(e: CodecError) -> Self {
        FsError::Corruption(e.to_string())
    }
}
