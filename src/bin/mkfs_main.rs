//! Entry point for `mkfs_extreamfs`: formats one partition of a disk image
//! without going through a script.

use anyhow::Context;
use clap::Parser;
use extreamfs::mkfs::FsKind;
use extreamfs::{load_config, Engine};
use std::path::PathBuf;

#[derive(Parser)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disk image (.mia)
    #[arg(value_name = "DISK")]
    disk: String,

    /// Partition name inside the disk
    #[arg(short, long)]
    name: String,

    /// 2fs or 3fs
    #[arg(long, default_value = "2fs")]
    fs: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let kind = FsKind::parse(&args.fs)
        .with_context(|| format!("unknown filesystem '{}', use 2fs or 3fs", args.fs))?;
    let cfg = load_config(args.config.as_deref()).context("cannot load configuration")?;
    let mut engine = Engine::new(cfg)?;

    /* ---------------------------------------------------------
       MOUNT, FORMAT, UNMOUNT
    --------------------------------------------------------- */
    let entry = engine
        .mount(&args.disk, &args.name)
        .with_context(|| format!("cannot mount '{}' of {}", args.name, args.disk))?;
    let formatted = engine.mkfs(&entry.id, kind);
    engine.unmount(&entry.id)?;
    let sb = formatted.context("format failed")?;

    /* ---------------------------------------------------------
       DONE
    --------------------------------------------------------- */
    println!("EXTREAMFS ext{} created on '{}' of {}", sb.fs_type, entry.name, entry.path.display());
    println!("  Partition @     {} ({} bytes)", entry.start, entry.size);
    println!("  Inodes:         {} ({} free)", sb.inodes_count, sb.free_inodes);
    println!("  Blocks:         {} ({} free)", sb.blocks_count, sb.free_blocks);
    println!("To use it: mount -path={} -name={}", entry.path.display(), entry.name);
    Ok(())
}
