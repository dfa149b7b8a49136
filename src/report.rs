//! Read-only traversal of every on-disk structure, for `rep`.
//!
//! Each traversal returns plain data; [`Report`] wraps them and renders a
//! plain-text view through `Display`.

use std::collections::HashSet;
use std::fmt;

use log::warn;

use crate::accounts::UsersFile;
use crate::alloc::Bitmap;
use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{
    DirectoryBlock, Ebr, FileBlock, Inode, JournalEntry, Mbr, PartitionType, SuperBlock,
    EBR_RESERVED, MBR_RESERVED, ROOT_INODE,
};
use crate::journal;
use crate::partition::Disk;
use crate::path;
use crate::perm::mode_string;
use crate::volume::{now, Volume};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Mbr,
    Disk,
    Inode,
    Block,
    BmInode,
    BmBlock,
    Tree,
    Sb,
    File,
    Ls,
    Journaling,
}

impl ReportKind {
    pub fn parse(s: &str) -> Option<ReportKind> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "mbr" => ReportKind::Mbr,
            "disk" => ReportKind::Disk,
            "inode" => ReportKind::Inode,
            "block" => ReportKind::Block,
            "bm_inode" => ReportKind::BmInode,
            "bm_block" => ReportKind::BmBlock,
            "tree" => ReportKind::Tree,
            "sb" => ReportKind::Sb,
            "file" => ReportKind::File,
            "ls" => ReportKind::Ls,
            "journaling" => ReportKind::Journaling,
            _ => return None,
        })
    }

    /// Reports that only need the MBR, not a formatted filesystem.
    pub fn is_disk_level(self) -> bool {
        matches!(self, ReportKind::Mbr | ReportKind::Disk)
    }
}

/* ---------------- DISK LEVEL ---------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Mbr,
    Primary,
    Extended,
    Ebr,
    Logical,
    Free,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub name: String,
    pub start: i64,
    pub size: i64,
    /// Share of the whole disk.
    pub percent: f64,
    /// Inside the extended partition.
    pub nested: bool,
}

pub fn logical_chain<D: BlockDevice>(disk: &mut Disk<D>) -> Result<(Mbr, Vec<(i64, Ebr)>)> {
    Ok((*disk.mbr(), disk.logicals()?))
}

/// Disk layout from offset 0 to the end, free gaps included.
pub fn disk_segments<D: BlockDevice>(disk: &mut Disk<D>) -> Result<Vec<Segment>> {
    let mbr = *disk.mbr();
    let logicals = disk.logicals()?;
    let total = mbr.size.max(1) as f64;
    let seg = |kind, name: &str, start: i64, size: i64, nested| Segment {
        kind,
        name: name.to_string(),
        start,
        size,
        percent: size as f64 * 100.0 / total,
        nested,
    };

    let mut parts: Vec<_> = mbr.active().map(|(_, p)| *p).collect();
    parts.sort_by_key(|p| p.start);

    let mut out = vec![seg(SegmentKind::Mbr, "MBR", 0, MBR_RESERVED, false)];
    let mut cursor = MBR_RESERVED;
    for p in parts {
        if p.start > cursor {
            out.push(seg(SegmentKind::Free, "", cursor, p.start - cursor, false));
        }
        if p.kind() == Some(PartitionType::Extended) {
            out.push(seg(SegmentKind::Extended, &p.name(), p.start, p.size, false));
            let mut inner = p.start;
            for (pos, ebr) in &logicals {
                if *pos > inner {
                    out.push(seg(SegmentKind::Free, "", inner, pos - inner, true));
                }
                out.push(seg(SegmentKind::Ebr, "", *pos, ebr.start - pos, true));
                out.push(seg(SegmentKind::Logical, &ebr.name(), ebr.start, ebr.size, true));
                inner = ebr.start + ebr.size;
            }
            if logicals.is_empty() {
                out.push(seg(SegmentKind::Ebr, "", p.start, EBR_RESERVED.min(p.size), true));
                inner = p.start + EBR_RESERVED.min(p.size);
            }
            if inner < p.end() {
                out.push(seg(SegmentKind::Free, "", inner, p.end() - inner, true));
            }
        } else {
            out.push(seg(SegmentKind::Primary, &p.name(), p.start, p.size, false));
        }
        cursor = cursor.max(p.end());
    }
    if cursor < mbr.size {
        out.push(seg(SegmentKind::Free, "", cursor, mbr.size - cursor, false));
    }
    Ok(out)
}

/* ---------------- FILESYSTEM LEVEL ---------------- */

pub fn used_inodes<D: BlockDevice>(vol: &mut Volume<D>) -> Result<Vec<(i64, Inode)>> {
    let map = vol.read_bitmap(Bitmap::Inodes)?;
    let mut out = Vec::new();
    for (i, _) in map.iter().enumerate().filter(|(_, &b)| b != 0) {
        out.push((i as i64, vol.read_inode(i as i64)?));
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Folder(DirectoryBlock),
    File(FileBlock),
}

/// Every block referenced by a used inode, typed by its owner.
pub fn classified_blocks<D: BlockDevice>(vol: &mut Volume<D>) -> Result<Vec<(i64, BlockKind)>> {
    let mut out = Vec::new();
    for (_, inode) in used_inodes(vol)? {
        for block in inode.block.iter().copied().filter(|&b| b != -1) {
            let kind = if inode.is_dir() {
                BlockKind::Folder(vol.read_dir_block(block)?)
            } else {
                BlockKind::File(vol.read_file_block(block)?)
            };
            out.push((block, kind));
        }
    }
    out.sort_by_key(|(b, _)| *b);
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub index: i64,
    pub name: String,
    pub inode: Inode,
    pub children: Vec<TreeNode>,
}

fn walk<D: BlockDevice>(
    vol: &mut Volume<D>,
    index: i64,
    name: String,
    seen: &mut HashSet<i64>,
) -> Result<TreeNode> {
    let inode = vol.read_inode(index)?;
    let mut node = TreeNode {
        index,
        name,
        inode,
        children: Vec::new(),
    };
    if !inode.is_dir() || !seen.insert(index) {
        return Ok(node);
    }
    for (child_name, child) in vol.children(index)? {
        match walk(vol, child, child_name.clone(), seen) {
            Ok(n) => node.children.push(n),
            Err(e) => warn!("tree: skipping '{child_name}' (inode {child}): {e}"),
        }
    }
    Ok(node)
}

pub fn tree<D: BlockDevice>(vol: &mut Volume<D>) -> Result<TreeNode> {
    walk(vol, ROOT_INODE, "/".to_string(), &mut HashSet::new())
}

pub fn file_content<D: BlockDevice>(vol: &mut Volume<D>, path: &str) -> Result<Vec<u8>> {
    let index = vol.resolve(path)?;
    let inode = vol.read_inode(index)?;
    if inode.is_dir() {
        return Err(FsError::validation(format!("'{path}' is a directory")));
    }
    vol.read_content(&inode)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: i64,
    pub mode: String,
    pub owner: String,
    pub group: String,
    pub ctime: i64,
    pub mtime: i64,
}

/// Children of a directory (or the file itself) with owner and group
/// names resolved from users.txt.
pub fn ls<D: BlockDevice>(vol: &mut Volume<D>, target: &str) -> Result<Vec<LsEntry>> {
    let users = vol.load_users().unwrap_or_else(|e| {
        warn!("ls: users.txt unreadable, showing numeric ids: {e}");
        UsersFile::default()
    });
    let index = vol.resolve(target)?;
    let inode = vol.read_inode(index)?;
    let listing = if inode.is_dir() {
        vol.children(index)?
    } else {
        let name = path::components(target)?.pop().unwrap_or_default();
        vec![(name, index)]
    };

    let mut out = Vec::with_capacity(listing.len());
    for (name, child) in listing {
        let inode = vol.read_inode(child)?;
        out.push(LsEntry {
            name,
            is_dir: inode.is_dir(),
            size: inode.size,
            mode: mode_string(&inode.perm),
            owner: users
                .user_name(inode.uid)
                .map_or_else(|| inode.uid.to_string(), str::to_string),
            group: users
                .group_name(inode.gid)
                .map_or_else(|| inode.gid.to_string(), str::to_string),
            ctime: inode.ctime,
            mtime: inode.mtime,
        });
    }
    Ok(out)
}

/* ---------------- REPORT ---------------- */

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Mbr { mbr: Mbr, logicals: Vec<(i64, Ebr)> },
    Disk { size: i64, segments: Vec<Segment> },
    SuperBlock(SuperBlock),
    Inodes(Vec<(i64, Inode)>),
    Blocks(Vec<(i64, BlockKind)>),
    Bitmap { which: Bitmap, bits: Vec<u8> },
    Tree(TreeNode),
    File { path: String, content: Vec<u8> },
    Ls { path: String, entries: Vec<LsEntry> },
    Journal(Vec<JournalEntry>),
}

pub fn disk_report<D: BlockDevice>(disk: &mut Disk<D>, kind: ReportKind) -> Result<Report> {
    match kind {
        ReportKind::Mbr => {
            let (mbr, logicals) = logical_chain(disk)?;
            Ok(Report::Mbr { mbr, logicals })
        }
        ReportKind::Disk => Ok(Report::Disk {
            size: disk.mbr().size,
            segments: disk_segments(disk)?,
        }),
        other => Err(FsError::validation(format!("{other:?} needs a mounted filesystem"))),
    }
}

/// `target` is the path inside the partition used by `file` and `ls`.
pub fn fs_report<D: BlockDevice>(
    vol: &mut Volume<D>,
    kind: ReportKind,
    target: Option<&str>,
) -> Result<Report> {
    let need_target = || {
        target
            .map(path::normalize)
            .ok_or_else(|| FsError::validation("this report needs -path_file_ls"))
    };
    Ok(match kind {
        ReportKind::Sb => Report::SuperBlock(*vol.superblock()),
        ReportKind::Inode => Report::Inodes(used_inodes(vol)?),
        ReportKind::Block => Report::Blocks(classified_blocks(vol)?),
        ReportKind::BmInode => Report::Bitmap {
            which: Bitmap::Inodes,
            bits: vol.read_bitmap(Bitmap::Inodes)?,
        },
        ReportKind::BmBlock => Report::Bitmap {
            which: Bitmap::Blocks,
            bits: vol.read_bitmap(Bitmap::Blocks)?,
        },
        ReportKind::Tree => Report::Tree(tree(vol)?),
        ReportKind::File => {
            let path = need_target()?;
            let content = file_content(vol, &path)?;
            Report::File { path, content }
        }
        ReportKind::Ls => {
            let path = target.map(path::normalize).unwrap_or_else(|| "/".to_string());
            let entries = ls(vol, &path)?;
            Report::Ls { path, entries }
        }
        ReportKind::Journaling => Report::Journal(journal::read_journal(vol)?),
        ReportKind::Mbr | ReportKind::Disk => {
            return Err(FsError::validation(format!("{kind:?} is a disk report")));
        }
    })
}

/* ---------------- TEXT RENDERING ---------------- */

fn stamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn inode_kind(inode: &Inode) -> &'static str {
    if inode.is_dir() {
        "dir"
    } else {
        "file"
    }
}

fn render_tree(f: &mut fmt::Formatter<'_>, node: &TreeNode, depth: usize) -> fmt::Result {
    writeln!(
        f,
        "{:indent$}{} [inode {} {} {}]",
        "",
        node.name,
        node.index,
        inode_kind(&node.inode),
        node.inode.perm_str(),
        indent = depth * 2
    )?;
    for child in &node.children {
        render_tree(f, child, depth + 1)?;
    }
    Ok(())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Mbr { mbr, logicals } => {
                writeln!(f, "MBR size={} created={} signature={} fit={}",
                    mbr.size, stamp(mbr.creation_time), mbr.signature, mbr.fit as char)?;
                for (i, p) in mbr.partitions.iter().enumerate() {
                    writeln!(
                        f,
                        "  [{i}] status={} type={} fit={} start={} size={} name={} id={} correlative={}",
                        p.status as char,
                        if p.kind == 0 { '-' } else { p.kind as char },
                        if p.fit == 0 { '-' } else { p.fit as char },
                        p.start, p.size, p.name(), p.id(), p.correlative
                    )?;
                }
                for (pos, e) in logicals {
                    writeln!(f, "  EBR@{pos} name={} start={} size={} next={} fit={}",
                        e.name(), e.start, e.size, e.next, e.fit as char)?;
                }
                Ok(())
            }
            Report::Disk { size, segments } => {
                writeln!(f, "DISK {size} bytes")?;
                for s in segments {
                    writeln!(
                        f,
                        "{}{:?} {} @{} {} bytes ({:.2}%)",
                        if s.nested { "    " } else { "  " },
                        s.kind, s.name, s.start, s.size, s.percent
                    )?;
                }
                Ok(())
            }
            Report::SuperBlock(sb) => {
                writeln!(f, "SUPERBLOCK ext{}", sb.fs_type)?;
                writeln!(f, "  inodes {} ({} free), blocks {} ({} free)",
                    sb.inodes_count, sb.free_inodes, sb.blocks_count, sb.free_blocks)?;
                writeln!(f, "  mtime {} umtime {} mounts {}",
                    stamp(sb.mtime), stamp(sb.umtime), sb.mnt_count)?;
                writeln!(f, "  magic {:#X} inode_s {} block_s {} first_ino {} first_blo {}",
                    sb.magic, sb.inode_s, sb.block_s, sb.first_ino, sb.first_blo)?;
                writeln!(f, "  bm_inode @{} bm_block @{} inodes @{} blocks @{}",
                    sb.bm_inode_start, sb.bm_block_start, sb.inode_start, sb.block_start)
            }
            Report::Inodes(list) => {
                for (i, n) in list {
                    writeln!(
                        f,
                        "inode {i}: {} uid={} gid={} size={} perm={} atime={} ctime={} mtime={} blocks={:?}",
                        inode_kind(n), n.uid, n.gid, n.size, n.perm_str(),
                        stamp(n.atime), stamp(n.ctime), stamp(n.mtime),
                        n.used_blocks().collect::<Vec<_>>()
                    )?;
                }
                Ok(())
            }
            Report::Blocks(list) => {
                for (i, b) in list {
                    match b {
                        BlockKind::Folder(d) => {
                            let entries: Vec<String> = d
                                .entries
                                .iter()
                                .map(|e| format!("{}->{}", e.name(), e.inode))
                                .collect();
                            writeln!(f, "block {i} folder: {}", entries.join(" | "))?;
                        }
                        BlockKind::File(b) => {
                            let text = String::from_utf8_lossy(&b.data);
                            writeln!(f, "block {i} file: {:?}", text.trim_end_matches('\0'))?;
                        }
                    }
                }
                Ok(())
            }
            Report::Bitmap { which, bits } => {
                writeln!(f, "{which:?} bitmap")?;
                for row in bits.chunks(20) {
                    let line: Vec<String> = row.iter().map(|b| b.to_string()).collect();
                    writeln!(f, "{}", line.join(" "))?;
                }
                Ok(())
            }
            Report::Tree(root) => render_tree(f, root, 0),
            Report::File { path, content } => {
                writeln!(f, "{path}")?;
                writeln!(f, "{}", String::from_utf8_lossy(content))
            }
            Report::Ls { path, entries } => {
                writeln!(f, "{path}")?;
                for e in entries {
                    writeln!(
                        f,
                        "{}{} {:>8} {:>8} {:>6} {} {} {}",
                        if e.is_dir { 'd' } else { '-' },
                        e.mode, e.owner, e.group, e.size,
                        stamp(e.ctime), stamp(e.mtime), e.name
                    )?;
                }
                Ok(())
            }
            Report::Journal(entries) => {
                if entries.is_empty() {
                    return writeln!(f, "journal is empty");
                }
                for e in entries {
                    writeln!(f, "#{} {} {} {:?} {}",
                        e.count, e.operation(), e.path(), e.content(), stamp(e.date as i64))?;
                }
                Ok(())
            }
        }
    }
}

/// Header line shared by every rendered report file.
pub fn banner(kind: ReportKind, id: &str) -> String {
    format!("# {kind:?} report of {id} generated {}\n", stamp(now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemDevice;
    use crate::fs_layout::{Fit, USERS_INODE};
    use crate::mkfs::{format, FsKind};

    fn fresh() -> Volume<MemDevice> {
        let mut vol = format(MemDevice::new(256 * 1024), 0, 256 * 1024, FsKind::Ext3).unwrap();
        let home = vol.create_directory(ROOT_INODE, "home", 1, 1).unwrap();
        vol.create_file(home, "a.txt", b"hello", 1, 1).unwrap();
        vol.sync().unwrap();
        vol
    }

    #[test]
    fn tree_and_inodes_cover_everything_reachable() {
        let mut vol = fresh();
        let root = tree(&mut vol).unwrap();
        assert_eq!(root.children.len(), 2);
        let home = root.children.iter().find(|c| c.name == "home").unwrap();
        assert_eq!(home.children[0].name, "a.txt");
        assert_eq!(used_inodes(&mut vol).unwrap().len(), 4);
        let text = Report::Tree(root).to_string();
        assert!(text.contains("  home [inode 2 dir 664]"));
    }

    #[test]
    fn blocks_are_typed_by_their_inode() {
        let mut vol = fresh();
        let blocks = classified_blocks(&mut vol).unwrap();
        assert_eq!(blocks.len(), 4);
        assert!(matches!(blocks[0].1, BlockKind::Folder(_)));
        assert!(matches!(blocks[1].1, BlockKind::File(_)));
    }

    #[test]
    fn ls_resolves_names() {
        let mut vol = fresh();
        let entries = ls(&mut vol, "/").unwrap();
        let users = entries.iter().find(|e| e.name == "users.txt").unwrap();
        assert_eq!(users.owner, "root");
        assert_eq!(users.mode, "rw-r--r--");
        let file = ls(&mut vol, "/home/a.txt").unwrap();
        assert_eq!(file.len(), 1);
        assert_eq!(file[0].size, 5);
    }

    #[test]
    fn fs_reports_dispatch() {
        let mut vol = fresh();
        let r = fs_report(&mut vol, ReportKind::File, Some("home/a.txt")).unwrap();
        assert_eq!(r, Report::File { path: "/home/a.txt".into(), content: b"hello".to_vec() });
        assert!(fs_report(&mut vol, ReportKind::File, None).is_err());
        match fs_report(&mut vol, ReportKind::Journaling, None).unwrap() {
            Report::Journal(entries) => assert_eq!(entries[0].path(), "/users.txt"),
            other => panic!("unexpected {other:?}"),
        }
        match fs_report(&mut vol, ReportKind::BmInode, None).unwrap() {
            Report::Bitmap { bits, .. } => assert_eq!(&bits[..5], &[1, 1, 1, 1, 0]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(vol.read_inode(USERS_INODE).is_ok());
    }

    #[test]
    fn disk_segments_account_for_every_byte() {
        let size = 64 * 1024;
        let mut d = Disk::init(MemDevice::new(size as usize), Mbr::new(size, Fit::First, 0, 1)).unwrap();
        d.create_partition(PartitionType::Primary, Fit::First, 8 * 1024, "p").unwrap();
        d.create_partition(PartitionType::Extended, Fit::First, 16 * 1024, "e").unwrap();
        d.create_partition(PartitionType::Logical, Fit::First, 4 * 1024, "l").unwrap();
        let segs = disk_segments(&mut d).unwrap();
        let top: i64 = segs
            .iter()
            .filter(|s| !s.nested && s.kind != SegmentKind::Extended)
            .map(|s| s.size)
            .sum::<i64>()
            + 16 * 1024;
        assert_eq!(top, size);
        let inner: i64 = segs.iter().filter(|s| s.nested).map(|s| s.size).sum();
        assert_eq!(inner, 16 * 1024);
        assert!(segs.iter().any(|s| s.kind == SegmentKind::Logical && s.name == "l"));
        assert!(ReportKind::parse("BM_INODE").is_some());
    }
}
