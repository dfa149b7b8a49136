//! Common utilities for tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use extreamfs::commands::run_line;
use extreamfs::device::FileDevice;
use extreamfs::disk::open_disk;
use extreamfs::volume::Volume;
use extreamfs::{Engine, EngineConfig, FsError};
use tempfile::TempDir;

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

/// An engine whose disks and sidecar files all live in a temp dir.
pub struct Workspace {
    pub dir: TempDir,
    pub engine: Engine,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::in_dir(dir.path())).unwrap();
        Self { dir, engine }
    }

    pub fn disk(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Runs a command line that must succeed and returns its output.
    pub fn run(&mut self, line: &str) -> String {
        match run_line(&mut self.engine, line) {
            Some(Ok(out)) => {
                log!("{} -> {}", line, out);
                out
            }
            Some(Err(e)) => panic!("'{line}' failed: {e}"),
            None => panic!("'{line}' holds no command"),
        }
    }

    /// Runs a command line that must fail.
    pub fn fail(&mut self, line: &str) -> FsError {
        match run_line(&mut self.engine, line) {
            Some(Err(e)) => {
                log!("{} -> Error: {}", line, e);
                e
            }
            Some(Ok(out)) => panic!("'{line}' should have failed, printed: {out}"),
            None => panic!("'{line}' holds no command"),
        }
    }

    /// Disk with one 3 MiB primary formatted as `fs`, mounted and with
    /// root logged in. Returns the mount id.
    pub fn formatted(&mut self, fs: &str) -> String {
        let disk = self.disk("a.mia");
        self.run(&format!("mkdisk -size=10 -unit=M -path={}", disk.display()));
        self.run(&format!(
            "fdisk -size=3 -unit=M -type=P -name=part1 -path={}",
            disk.display()
        ));
        self.run(&format!("mount -path={} -name=part1", disk.display()));
        let id = self.engine.mounted()[0].id.clone();
        self.run(&format!("mkfs -id={id} -fs={fs}"));
        self.run(&format!("login -user=root -pass=123 -id={id}"));
        id
    }

    pub fn host_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

/// Opens the filesystem of partition `name` straight from the image.
pub fn open_volume(disk: &Path, name: &str) -> Volume<FileDevice> {
    let mut d = open_disk(disk).unwrap();
    let start = d.locate(name).unwrap().start;
    Volume::open(d.into_device(), start).unwrap()
}
