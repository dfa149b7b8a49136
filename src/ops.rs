//! Path-level file operations run on behalf of a requester.
//!
//! Every function here checks permissions before touching the volume and
//! leaves journaling and sessions to the caller.

use std::collections::VecDeque;

use log::{debug, warn};
use regex::Regex;

use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{Inode, MAX_FILE_SIZE, NAME_LEN, ROOT_INODE, USERS_INODE};
use crate::path;
use crate::perm::{allowed, check, Access, Requester};
use crate::volume::{now, Volume};

/// Largest host file accepted as content.
pub const MAX_CONTENT: usize = 64 * 1024;

const SIZE_PATTERN: &[u8] = b"0123456789";

pub fn size_content(size: i64) -> Result<Vec<u8>> {
    let size = usize::try_from(size)
        .map_err(|_| FsError::validation(format!("size {size} must not be negative")))?;
    if size > MAX_CONTENT {
        return Err(FsError::validation(format!("size {size} exceeds {MAX_CONTENT} bytes")));
    }
    Ok(SIZE_PATTERN.iter().copied().cycle().take(size).collect())
}

fn guard_protected(index: i64, what: &str) -> Result<()> {
    match index {
        ROOT_INODE => Err(FsError::denied(format!("the root directory can not be {what}"))),
        USERS_INODE => Err(FsError::denied(format!("users.txt can not be {what}"))),
        _ => Ok(()),
    }
}

/// Refuses content before any block of an existing file is released.
fn check_fits(content: &[u8]) -> Result<()> {
    if content.len() > MAX_FILE_SIZE {
        return Err(FsError::no_space(format!(
            "{} bytes exceed the {MAX_FILE_SIZE} bytes an inode can hold",
            content.len()
        )));
    }
    Ok(())
}

fn check_new_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(FsError::validation(format!("'{name}' is not a valid name")));
    }
    Ok(())
}

/// Resolves the parent of `target` and returns it with the leaf name.
fn parent_of<D: BlockDevice>(vol: &mut Volume<D>, target: &str) -> Result<(i64, String)> {
    let (parents, leaf) = path::split_parent(target)?;
    let parent = vol
        .resolve_components(&parents)
        .map_err(|_| FsError::not_found(path::from_components(&parents)))?;
    vol.read_dir_inode(parent)?;
    Ok((parent, leaf))
}

/// `true` when `node` is `ancestor` or lies below it, following the stored
/// `..` links up to the root.
fn is_ancestor<D: BlockDevice>(vol: &mut Volume<D>, ancestor: i64, mut node: i64) -> Result<bool> {
    // a sound tree reaches the root in fewer hops than there are inodes
    for _ in 0..=vol.superblock().inodes_count {
        if node == ancestor {
            return Ok(true);
        }
        if node == ROOT_INODE {
            return Ok(false);
        }
        let dir = vol.read_dir_inode(node)?;
        node = vol.read_dir_block(dir.block[0])?.entries[1].inode;
    }
    Err(FsError::corruption(format!("inode {node} has a looping parent chain")))
}

/* ---------------- CREATION ---------------- */

/// Walks `parts` from the root, creating missing directories when
/// `parents` is set.
fn ensure_dirs<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    parts: &[String],
    parents: bool,
) -> Result<i64> {
    let mut current = ROOT_INODE;
    for (depth, part) in parts.iter().enumerate() {
        current = match vol.find_child(current, part)? {
            Some(next) => {
                vol.read_dir_inode(next)?;
                next
            }
            None if parents => {
                let dir = vol.read_dir_inode(current)?;
                check(&dir, who, Access::Write, &path::from_components(&parts[..depth]))?;
                vol.create_directory(current, part, who.uid, who.gid)?
            }
            None => {
                return Err(FsError::not_found(path::from_components(&parts[..=depth])));
            }
        };
    }
    Ok(current)
}

pub fn mkdir<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    target: &str,
    parents: bool,
) -> Result<i64> {
    let (parts, leaf) = path::split_parent(target)?;
    check_new_name(&leaf)?;
    let parent = ensure_dirs(vol, who, &parts, parents)?;
    if vol.find_child(parent, &leaf)?.is_some() {
        return Err(FsError::conflict(format!("'{target}' already exists")));
    }
    let dir = vol.read_dir_inode(parent)?;
    check(&dir, who, Access::Write, &path::from_components(&parts))?;
    vol.create_directory(parent, &leaf, who.uid, who.gid)
}

/// Creates or overwrites a file. Existing files keep their inode.
pub fn mkfile<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    target: &str,
    parents: bool,
    content: &[u8],
) -> Result<i64> {
    let (parts, leaf) = path::split_parent(target)?;
    check_new_name(&leaf)?;
    let parent = ensure_dirs(vol, who, &parts, parents)?;

    if let Some(index) = vol.find_child(parent, &leaf)? {
        let mut inode = vol.read_inode(index)?;
        if inode.is_dir() {
            return Err(FsError::conflict(format!("'{target}' is a directory")));
        }
        check(&inode, who, Access::Write, target)?;
        check_fits(content)?;
        vol.free_blocks(&mut inode)?;
        vol.write_content(index, &mut inode, content)?;
        debug!("mkfile overwrote {target}");
        return Ok(index);
    }

    let dir = vol.read_dir_inode(parent)?;
    check(&dir, who, Access::Write, &path::from_components(&parts))?;
    vol.create_file(parent, &leaf, content, who.uid, who.gid)
}

/// Replaces the content of an existing file.
pub fn edit<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    target: &str,
    content: &[u8],
) -> Result<()> {
    let index = vol.resolve(target)?;
    let mut inode = vol.read_inode(index)?;
    if inode.is_dir() {
        return Err(FsError::validation(format!("'{target}' is a directory")));
    }
    check(&inode, who, Access::ReadWrite, target)?;
    check_fits(content)?;
    vol.free_blocks(&mut inode)?;
    vol.write_content(index, &mut inode, content)
}

pub fn cat<D: BlockDevice>(vol: &mut Volume<D>, who: &Requester, target: &str) -> Result<Vec<u8>> {
    let index = vol.resolve(target)?;
    let mut inode = vol.read_inode(index)?;
    if inode.is_dir() {
        return Err(FsError::validation(format!("'{target}' is a directory")));
    }
    check(&inode, who, Access::Read, target)?;
    let content = vol.read_content(&inode)?;
    inode.atime = now();
    vol.write_inode(index, &inode)?;
    Ok(content)
}

/* ---------------- REMOVAL ---------------- */

/// Every inode of the subtree rooted at `index`, children before parents.
fn subtree<D: BlockDevice>(vol: &mut Volume<D>, index: i64, out: &mut Vec<(i64, Inode)>) -> Result<()> {
    let inode = vol.read_inode(index)?;
    if inode.is_dir() && !out.iter().any(|(i, _)| *i == index) {
        for (_, child) in vol.children(index)? {
            subtree(vol, child, out)?;
        }
    }
    out.push((index, inode));
    Ok(())
}

/// Nothing changes unless the requester may write every node of the tree.
pub fn remove<D: BlockDevice>(vol: &mut Volume<D>, who: &Requester, target: &str) -> Result<usize> {
    let (parent, leaf) = parent_of(vol, target)?;
    let index = vol.find_inode_in_directory(parent, &leaf)?;
    guard_protected(index, "removed")?;

    let parent_inode = vol.read_inode(parent)?;
    check(&parent_inode, who, Access::Write, &path::normalize(target))?;
    let mut nodes = Vec::new();
    subtree(vol, index, &mut nodes)?;
    for (i, inode) in &nodes {
        guard_protected(*i, "removed")?;
        check(inode, who, Access::Write, &format!("inode {i} under {target}"))?;
    }

    vol.remove_entry(parent, &leaf)?;
    for (i, _) in &nodes {
        vol.release_inode(*i)?;
    }
    debug!("removed {target}: {} inodes", nodes.len());
    Ok(nodes.len())
}

/* ---------------- NAMING ---------------- */

pub fn rename<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    target: &str,
    new_name: &str,
) -> Result<()> {
    check_new_name(new_name)?;
    if new_name.len() > NAME_LEN {
        return Err(FsError::validation(format!(
            "'{new_name}' is longer than {NAME_LEN} bytes"
        )));
    }
    let (parent, leaf) = parent_of(vol, target)?;
    let index = vol.find_inode_in_directory(parent, &leaf)?;
    guard_protected(index, "renamed")?;
    if vol.find_child(parent, new_name)?.is_some() {
        return Err(FsError::conflict(format!("'{new_name}' already exists")));
    }
    let inode = vol.read_inode(index)?;
    check(&inode, who, Access::Write, target)?;
    vol.rename_entry(parent, &leaf, new_name)
}

/// Relinks `source` under the directory `dest`; the inode stays put.
pub fn move_node<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    source: &str,
    dest: &str,
) -> Result<()> {
    let (parent, leaf) = parent_of(vol, source)?;
    let index = vol.find_inode_in_directory(parent, &leaf)?;
    guard_protected(index, "moved")?;
    let dest_index = vol.resolve(dest)?;
    let dest_inode = vol.read_dir_inode(dest_index)?;
    if is_ancestor(vol, index, dest_index)? {
        return Err(FsError::validation(format!("can not move '{source}' into itself")));
    }
    if vol.find_child(dest_index, &leaf)?.is_some() {
        return Err(FsError::conflict(format!("'{leaf}' already exists in '{dest}'")));
    }

    let parent_inode = vol.read_inode(parent)?;
    check(&parent_inode, who, Access::Write, source)?;
    let inode = vol.read_inode(index)?;
    check(&inode, who, Access::Write, source)?;
    check(&dest_inode, who, Access::Write, dest)?;

    vol.remove_entry(parent, &leaf)?;
    if let Err(e) = vol.add_entry(dest_index, &leaf, index) {
        vol.add_entry(parent, &leaf, index)?;
        return Err(e);
    }
    if inode.is_dir() {
        vol.set_parent_link(index, dest_index)?;
    }
    debug!("moved inode {index} from {parent} to {dest_index}");
    Ok(())
}

/* ---------------- COPY ---------------- */

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyOutcome {
    pub copied: usize,
    pub skipped: usize,
}

fn copy_node<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    source: i64,
    dest: i64,
    name: &str,
    out: &mut CopyOutcome,
) -> Result<()> {
    let inode = vol.read_inode(source)?;
    if !allowed(&inode, who, Access::Read) {
        warn!("copy: no read permission on '{name}' (inode {source}), skipped");
        out.skipped += 1;
        return Ok(());
    }
    let created = if inode.is_dir() {
        vol.create_directory(dest, name, who.uid, who.gid)?
    } else {
        let content = vol.read_content(&inode)?;
        vol.create_file(dest, name, &content, who.uid, who.gid)?
    };
    let mut copy = vol.read_inode(created)?;
    copy.perm = inode.perm;
    vol.write_inode(created, &copy)?;
    out.copied += 1;

    if inode.is_dir() {
        for (child_name, child) in vol.children(source)? {
            copy_node(vol, who, child, created, &child_name, out)?;
        }
    }
    Ok(())
}

/// Duplicates `source` with fresh inodes and blocks inside directory `dest`.
pub fn copy<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    source: &str,
    dest: &str,
) -> Result<CopyOutcome> {
    let (_, leaf) = path::split_parent(source)?;
    let index = vol.resolve(source)?;
    if index == ROOT_INODE {
        return Err(FsError::validation("the root directory can not be copied"));
    }
    let dest_index = vol.resolve(dest)?;
    let dest_inode = vol.read_dir_inode(dest_index)?;
    if is_ancestor(vol, index, dest_index)? {
        return Err(FsError::validation(format!("can not copy '{source}' into itself")));
    }
    if vol.find_child(dest_index, &leaf)?.is_some() {
        return Err(FsError::conflict(format!("'{leaf}' already exists in '{dest}'")));
    }
    check(&dest_inode, who, Access::Write, dest)?;
    let source_inode = vol.read_inode(index)?;
    check(&source_inode, who, Access::Read, source)?;

    let mut out = CopyOutcome::default();
    copy_node(vol, who, index, dest_index, &leaf, &mut out)?;
    Ok(out)
}

/* ---------------- FIND ---------------- */

/// Anchored regex for a shell glob with `*` and `?`.
pub fn glob_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| FsError::validation(format!("bad pattern '{pattern}': {e}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindMatch {
    pub path: String,
    pub is_dir: bool,
    pub depth: usize,
}

/// Breadth-first search below `start`. Directories the requester can not
/// read are skipped along with their subtree.
pub fn find<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    start: &str,
    pattern: &str,
) -> Result<Vec<FindMatch>> {
    let re = glob_regex(pattern)?;
    let start = path::normalize(start);
    let root = vol.resolve(&start)?;
    let root_inode = vol.read_dir_inode(root)?;
    check(&root_inode, who, Access::Read, &start)?;

    let mut out = Vec::new();
    let mut queue = VecDeque::from([(root, start, 0usize)]);
    let mut seen = vec![root];
    while let Some((dir, dir_path, depth)) = queue.pop_front() {
        for (name, child) in vol.children(dir)? {
            let inode = match vol.read_inode(child) {
                Ok(inode) => inode,
                Err(e) => {
                    warn!("find: skipping '{name}': {e}");
                    continue;
                }
            };
            if !allowed(&inode, who, Access::Read) {
                debug!("find: no read permission on {}", path::join(&dir_path, &name));
                continue;
            }
            let child_path = path::join(&dir_path, &name);
            if re.is_match(&name) {
                out.push(FindMatch {
                    path: child_path.clone(),
                    is_dir: inode.is_dir(),
                    depth: depth + 1,
                });
            }
            if inode.is_dir() && !seen.contains(&child) {
                seen.push(child);
                queue.push_back((child, child_path, depth + 1));
            }
        }
    }
    Ok(out)
}

pub fn render_find(start: &str, matches: &[FindMatch]) -> String {
    let mut out = format!("{}\n", path::normalize(start));
    for m in matches {
        let name = m.path.rsplit('/').next().unwrap_or(&m.path);
        out.push_str(&format!(
            "{:indent$}|_ {name}{}\n",
            "",
            if m.is_dir { "/" } else { "" },
            indent = (m.depth - 1) * 2
        ));
    }
    out
}

/* ---------------- OWNERSHIP ---------------- */

/// Applies `change` to `target`, and to its subtree when `recursive`.
/// Recursive runs only touch nodes the requester owns; the target itself
/// must be owned (or the requester a superuser).
fn update_tree<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    target: &str,
    recursive: bool,
    mut change: impl FnMut(&mut Inode),
) -> Result<usize> {
    let index = vol.resolve(target)?;
    let inode = vol.read_inode(index)?;
    if !who.owns(&inode) {
        return Err(FsError::denied(format!("{} does not own '{target}'", who.user)));
    }
    let nodes = if recursive {
        let mut nodes = Vec::new();
        subtree(vol, index, &mut nodes)?;
        nodes
    } else {
        vec![(index, inode)]
    };

    let mut changed = 0;
    for (i, mut inode) in nodes {
        if !who.owns(&inode) {
            debug!("skipping inode {i}, not owned by {}", who.user);
            continue;
        }
        change(&mut inode);
        vol.write_inode(i, &inode)?;
        changed += 1;
    }
    Ok(changed)
}

pub fn chmod<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    target: &str,
    perm: [u8; 3],
    recursive: bool,
) -> Result<usize> {
    update_tree(vol, who, target, recursive, |inode| inode.perm = perm)
}

pub fn chown<D: BlockDevice>(
    vol: &mut Volume<D>,
    who: &Requester,
    target: &str,
    uid: i64,
    recursive: bool,
) -> Result<usize> {
    update_tree(vol, who, target, recursive, |inode| inode.uid = uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Bitmap;
    use crate::device::MemDevice;
    use crate::mkfs::{format, FsKind};

    fn fresh() -> Volume<MemDevice> {
        format(MemDevice::new(512 * 1024), 0, 512 * 1024, FsKind::Ext2).unwrap()
    }

    fn root() -> Requester {
        Requester::new("root", 1, 1)
    }

    fn alice() -> Requester {
        Requester::new("alice", 2, 2)
    }

    #[test]
    fn size_content_cycles_digits() {
        assert_eq!(size_content(11).unwrap(), b"01234567890");
        assert!(size_content(0).unwrap().is_empty());
        assert!(size_content(-1).is_err());
    }

    #[test]
    fn mkdir_needs_parents_flag() {
        let mut vol = fresh();
        assert!(matches!(
            mkdir(&mut vol, &root(), "/a/b", false),
            Err(FsError::NotFound(_))
        ));
        let b = mkdir(&mut vol, &root(), "/a/b", true).unwrap();
        assert_eq!(vol.resolve("/a/b").unwrap(), b);
        assert!(matches!(
            mkdir(&mut vol, &root(), "/a/b", true),
            Err(FsError::Conflict(_))
        ));
    }

    #[test]
    fn mkfile_overwrites_and_cat_reads() {
        let mut vol = fresh();
        mkfile(&mut vol, &root(), "/d/f.txt", true, b"first").unwrap();
        let idx = mkfile(&mut vol, &root(), "/d/f.txt", false, b"second").unwrap();
        assert_eq!(vol.resolve("/d/f.txt").unwrap(), idx);
        assert_eq!(cat(&mut vol, &root(), "/d/f.txt").unwrap(), b"second");
        assert!(mkfile(&mut vol, &root(), "/missing/f", false, b"").is_err());
    }

    #[test]
    fn permissions_gate_access() {
        let mut vol = fresh();
        mkfile(&mut vol, &root(), "/f.txt", false, b"secret").unwrap();
        chmod(&mut vol, &root(), "/f.txt", *b"600", false).unwrap();
        assert!(matches!(
            cat(&mut vol, &alice(), "/f.txt"),
            Err(FsError::PermissionDenied(_))
        ));
        // root's directory is 755, so others can not create in it
        assert!(mkfile(&mut vol, &alice(), "/mine.txt", false, b"x").is_err());
        assert!(chmod(&mut vol, &alice(), "/f.txt", *b"777", false).is_err());
    }

    #[test]
    fn remove_is_all_or_nothing() {
        let mut vol = fresh();
        mkfile(&mut vol, &root(), "/t/a/x.txt", true, b"x").unwrap();
        mkfile(&mut vol, &root(), "/t/b.txt", true, b"y").unwrap();
        chmod(&mut vol, &root(), "/t", *b"777", true).unwrap();
        chmod(&mut vol, &root(), "/t/a/x.txt", *b"444", false).unwrap();
        let free = vol.superblock().free_inodes;
        assert!(matches!(
            remove(&mut vol, &alice(), "/t/a"),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(vol.resolve("/t/a/x.txt").is_ok());
        assert_eq!(vol.superblock().free_inodes, free);
        assert_eq!(remove(&mut vol, &root(), "/t").unwrap(), 4);
        assert_eq!(vol.superblock().free_inodes, free + 4);
        assert!(remove(&mut vol, &root(), "/users.txt").is_err());
    }

    #[test]
    fn rename_round_trips_bytes() {
        let mut vol = fresh();
        mkfile(&mut vol, &root(), "/notes.txt", false, b"n").unwrap();
        let before = vol.device().as_bytes().to_vec();
        rename(&mut vol, &root(), "/notes.txt", "other.txt").unwrap();
        assert!(vol.resolve("/other.txt").is_ok());
        rename(&mut vol, &root(), "/other.txt", "notes.txt").unwrap();
        assert_eq!(vol.device().as_bytes(), &before[..]);
        assert!(rename(&mut vol, &root(), "/notes.txt", "a/b").is_err());
        assert!(rename(&mut vol, &root(), "/notes.txt", "thirteen_byte").is_err());
    }

    #[test]
    fn move_relinks_dot_dot() {
        let mut vol = fresh();
        mkdir(&mut vol, &root(), "/src/inner", true).unwrap();
        mkdir(&mut vol, &root(), "/dst", false).unwrap();
        move_node(&mut vol, &root(), "/src/inner", "/dst").unwrap();
        let inner = vol.resolve("/dst/inner").unwrap();
        let dst = vol.resolve("/dst").unwrap();
        let entries = vol.dir_entries(inner).unwrap();
        assert_eq!(entries[1].1.inode, dst);
        assert!(vol.resolve("/src/inner").is_err());
        assert!(move_node(&mut vol, &root(), "/dst", "/dst/inner").is_err());
    }

    #[test]
    fn copy_then_remove_restores_allocation() {
        let mut vol = fresh();
        mkfile(&mut vol, &root(), "/a/b/c.txt", true, &[7u8; 200]).unwrap();
        mkdir(&mut vol, &root(), "/dest", false).unwrap();
        let inodes = vol.read_bitmap(Bitmap::Inodes).unwrap();
        let blocks = vol.read_bitmap(Bitmap::Blocks).unwrap();
        let out = copy(&mut vol, &root(), "/a", "/dest").unwrap();
        assert_eq!(out, CopyOutcome { copied: 3, skipped: 0 });
        assert_eq!(cat(&mut vol, &root(), "/dest/a/b/c.txt").unwrap(), vec![7u8; 200]);
        remove(&mut vol, &root(), "/dest/a").unwrap();
        assert_eq!(vol.read_bitmap(Bitmap::Inodes).unwrap(), inodes);
        assert_eq!(vol.read_bitmap(Bitmap::Blocks).unwrap(), blocks);
    }

    #[test]
    fn long_name_alias_can_not_nest_a_directory_in_itself() {
        let mut vol = fresh();
        mkdir(&mut vol, &root(), "/abcdefghijklmnop/sub", true).unwrap();
        let sub = vol.resolve("/abcdefghijkl/sub").unwrap();
        let inodes = vol.read_bitmap(Bitmap::Inodes).unwrap();

        let err = move_node(&mut vol, &root(), "/abcdefghijklmnop", "/abcdefghijkl/sub").unwrap_err();
        assert!(matches!(err, FsError::Validation(_)), "{err}");
        let err = copy(&mut vol, &root(), "/abcdefghijklmnop", "/abcdefghijkl/sub").unwrap_err();
        assert!(matches!(err, FsError::Validation(_)), "{err}");

        assert_eq!(vol.resolve("/abcdefghijkl/sub").unwrap(), sub);
        assert_eq!(vol.read_bitmap(Bitmap::Inodes).unwrap(), inodes);
    }

    #[test]
    fn dot_names_are_not_entries() {
        let mut vol = fresh();
        mkdir(&mut vol, &root(), "/a", false).unwrap();
        assert!(matches!(vol.resolve("/a/.."), Err(FsError::NotFound(_))));
        assert!(matches!(vol.resolve("/a/."), Err(FsError::NotFound(_))));
        assert!(matches!(
            mkdir(&mut vol, &root(), "/a/..", false),
            Err(FsError::Validation(_))
        ));
        assert!(matches!(
            move_node(&mut vol, &root(), "/a", "/a/.."),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn find_matches_globs_breadth_first() {
        let mut vol = fresh();
        mkfile(&mut vol, &root(), "/docs/a.txt", true, b"").unwrap();
        mkfile(&mut vol, &root(), "/docs/deep/b.txt", true, b"").unwrap();
        mkfile(&mut vol, &root(), "/docs/c.md", true, b"").unwrap();
        let found = find(&mut vol, &root(), "/docs", "*.txt").unwrap();
        let paths: Vec<_> = found.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, ["/docs/a.txt", "/docs/deep/b.txt"]);
        assert_eq!(found[1].depth, 2);
        assert!(find(&mut vol, &root(), "/", "?.md").unwrap().len() == 1);
        let text = render_find("/docs", &found);
        assert!(text.contains("  |_ b.txt"));
    }

    #[test]
    fn recursive_chown_only_touches_owned_nodes() {
        let mut vol = fresh();
        mkdir(&mut vol, &root(), "/shared", false).unwrap();
        chmod(&mut vol, &root(), "/shared", *b"777", false).unwrap();
        mkfile(&mut vol, &alice(), "/shared/mine.txt", false, b"").unwrap();
        mkfile(&mut vol, &root(), "/shared/roots.txt", false, b"").unwrap();
        chown(&mut vol, &root(), "/shared", 2, false).unwrap();
        let changed = chmod(&mut vol, &alice(), "/shared", *b"700", true).unwrap();
        assert_eq!(changed, 2);
        let roots = vol.resolve("/shared/roots.txt").unwrap();
        assert_eq!(vol.read_inode(roots).unwrap().perm, *b"664");
    }
}
