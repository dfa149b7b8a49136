//! EXTREAMFS Library
//!
//! A virtual disk image partitioned by MBR/EBR records, with EXT2/EXT3-like
//! filesystems inside its partitions. Shared by every binary (shell, mkfs,
//! info).
//!
//! Layers, bottom-up:
//! - `codec`, `fs_layout`: packed little-endian records.
//! - `device`: byte-addressed images (`FileDevice`, `MemDevice`).
//! - `partition`, `disk`: MBR, EBR chain and `.mia` image files.
//! - `volume`, `alloc`, `directory`, `file_io`: one formatted partition.
//! - `mkfs`, `journal`, `recovery`: formatting, the EXT3 journal and the
//!   loss/recovery snapshot.
//! - `perm`, `accounts`, `session`, `mount`, `registry`: who may do what,
//!   and the process-wide state.
//! - `ops`, `report`, `engine`, `script`, `commands`: the command surface.

pub mod accounts;
pub mod alloc;
pub mod codec;
pub mod commands;
pub mod config;
pub mod device;
pub mod directory;
pub mod disk;
pub mod engine;
pub mod error;
pub mod file_io;
pub mod fs_layout;
pub mod journal;
pub mod mkfs;
pub mod mount;
pub mod ops;
pub mod partition;
pub mod path;
pub mod perm;
pub mod recovery;
pub mod registry;
pub mod report;
pub mod script;
pub mod session;
pub mod volume;

pub use config::{load_config, EngineConfig};
pub use engine::Engine;
pub use error::{FsError, Result};
