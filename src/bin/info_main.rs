//! CLI entry point for `extreamfs_info`

use anyhow::Context;
use clap::Parser;
use extreamfs::disk::{disk_path, open_disk};
use extreamfs::fs_layout::ROOT_INODE;
use extreamfs::report::{self, Report};
use extreamfs::volume::Volume;

/// Simple inspection tool for EXTREAMFS disk images
#[derive(Parser)]
struct Cli {
    /// Path to the .mia file
    image: String,

    /// Partition whose filesystem should be printed
    #[arg(short, long)]
    name: Option<String>,

    /// Also print the whole directory tree
    #[arg(long)]
    tree: bool,

    /// Also print the journal (EXT3 only)
    #[arg(long)]
    journal: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let path = disk_path(&args.image);
    let mut disk = open_disk(&path).with_context(|| format!("cannot open {}", path.display()))?;

    println!("====== EXTREAMFS DISK ======");
    let (mbr, logicals) = report::logical_chain(&mut disk)?;
    print!("{}", Report::Mbr { mbr, logicals });

    let Some(name) = args.name else {
        return Ok(());
    };
    let located = disk.locate(&name)?;
    let mut vol = Volume::open(disk.into_device(), located.start)
        .with_context(|| format!("'{name}' does not hold a filesystem"))?;

    println!("\n====== SUPERBLOCK ({name}) ======");
    print!("{}", Report::SuperBlock(*vol.superblock()));

    println!("\n====== ROOT DIRECTORY CONTENT ======");
    for (entry, inode) in vol.children(ROOT_INODE)? {
        let kind = if vol.read_inode(inode)?.is_dir() { "dir" } else { "file" };
        println!("- inode {inode} : {entry} ({kind})");
    }

    if args.tree {
        println!("\n====== TREE ======");
        print!("{}", Report::Tree(report::tree(&mut vol)?));
    }
    if args.journal {
        println!("\n====== JOURNAL ======");
        print!("{}", Report::Journal(extreamfs::journal::read_journal(&mut vol)?));
    }
    Ok(())
}
