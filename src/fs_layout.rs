//! On-disk records of a virtual disk and of the filesystems inside it.
//!
//! Sizes are fixed and packed; every record implements [`OnDisk`] so other
//! modules can do offset arithmetic with `Record::SIZE`.

use crate::codec::{field_str, fixed, CodecError, OnDisk, Reader, Writer};

pub const SUPERBLOCK_MAGIC: i64 = 0xEF53;

/// Bytes reserved for the MBR at the start of a disk.
pub const MBR_RESERVED: i64 = 512;
/// Bytes reserved in front of each logical partition for its EBR.
pub const EBR_RESERVED: i64 = 1024;

pub const PARTITION_SLOTS: usize = 4;
pub const PART_NAME_LEN: usize = 16;
pub const PART_ID_LEN: usize = 4;

pub const INODE_BLOCKS: usize = 15;
pub const DIR_ENTRIES: usize = 4;
pub const NAME_LEN: usize = 12;
pub const FILE_BLOCK_CAPACITY: usize = 64;
pub const POINTERS_PER_BLOCK: usize = 8;

/// One physical block cell holds either a directory block or a file block.
pub const BLOCK_CELL_SIZE: usize = if DirectoryBlock::SIZE > FileBlock::SIZE {
    DirectoryBlock::SIZE
} else {
    FileBlock::SIZE
};

/// Largest content a single inode can address through its direct blocks.
pub const MAX_FILE_SIZE: usize = INODE_BLOCKS * FILE_BLOCK_CAPACITY;

pub const JOURNAL_ENTRIES: usize = 50;
/// Slot count of the journal region written by older layouts.
pub const LEGACY_JOURNAL_ENTRIES: usize = 64;

pub const ROOT_INODE: i64 = 0;
pub const USERS_INODE: i64 = 1;

pub const STATUS_EMPTY: u8 = b'0';
pub const STATUS_ACTIVE: u8 = b'1';

pub const INODE_DIR: u8 = b'0';
pub const INODE_FILE: u8 = b'1';

/* ---------------- ENUMS ---------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    First,
    Best,
    Worst,
}

impl Fit {
    pub fn as_byte(self) -> u8 {
        match self {
            Fit::First => b'F',
            Fit::Best => b'B',
            Fit::Worst => b'W',
        }
    }

    /// Lowercase bytes written by older tools are accepted.
    pub fn from_byte(b: u8) -> Option<Fit> {
        match b.to_ascii_uppercase() {
            b'F' => Some(Fit::First),
            b'B' => Some(Fit::Best),
            b'W' => Some(Fit::Worst),
            _ => None,
        }
    }

    /// Parses `FF`/`BF`/`WF` (or their single letter form), any case.
    pub fn parse(s: &str) -> Option<Fit> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FF" | "F" => Some(Fit::First),
            "BF" | "B" => Some(Fit::Best),
            "WF" | "W" => Some(Fit::Worst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    Primary,
    Extended,
    Logical,
}

impl PartitionType {
    pub fn as_byte(self) -> u8 {
        match self {
            PartitionType::Primary => b'P',
            PartitionType::Extended => b'E',
            PartitionType::Logical => b'L',
        }
    }

    pub fn from_byte(b: u8) -> Option<PartitionType> {
        match b.to_ascii_uppercase() {
            b'P' => Some(PartitionType::Primary),
            b'E' => Some(PartitionType::Extended),
            b'L' => Some(PartitionType::Logical),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<PartitionType> {
        let s = s.trim();
        if s.len() != 1 {
            return None;
        }
        Self::from_byte(s.as_bytes()[0])
    }
}

/* ---------------- MBR / PARTITIONS ---------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub status: u8,
    pub kind: u8,
    pub fit: u8,
    pub start: i64,
    pub size: i64,
    pub name: [u8; PART_NAME_LEN],
    pub correlative: i64,
    pub id: [u8; PART_ID_LEN],
}

impl Partition {
    pub fn empty() -> Self {
        Self {
            status: STATUS_EMPTY,
            kind: 0,
            fit: 0,
            start: -1,
            size: 0,
            name: [0; PART_NAME_LEN],
            correlative: -1,
            id: [0; PART_ID_LEN],
        }
    }

    pub fn new(kind: PartitionType, fit: Fit, start: i64, size: i64, name: &str) -> Self {
        Self {
            status: STATUS_ACTIVE,
            kind: kind.as_byte(),
            fit: fit.as_byte(),
            start,
            size,
            name: fixed(name),
            correlative: -1,
            id: [0; PART_ID_LEN],
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn kind(&self) -> Option<PartitionType> {
        PartitionType::from_byte(self.kind)
    }

    pub fn name(&self) -> String {
        field_str(&self.name)
    }

    pub fn id(&self) -> String {
        field_str(&self.id)
    }

    pub fn end(&self) -> i64 {
        self.start + self.size
    }
}

impl OnDisk for Partition {
    const SIZE: usize = 3 + 8 + 8 + PART_NAME_LEN + 8 + PART_ID_LEN;

    fn encode_into(&self, w: &mut Writer) {
        w.u8(self.status);
        w.u8(self.kind);
        w.u8(self.fit);
        w.i64(self.start);
        w.i64(self.size);
        w.bytes(&self.name);
        w.i64(self.correlative);
        w.bytes(&self.id);
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            status: r.u8()?,
            kind: r.u8()?,
            fit: r.u8()?,
            start: r.i64()?,
            size: r.i64()?,
            name: r.array()?,
            correlative: r.i64()?,
            id: r.array()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mbr {
    pub size: i64,
    pub creation_time: i64,
    pub signature: i64,
    pub fit: u8,
    pub partitions: [Partition; PARTITION_SLOTS],
}

impl Mbr {
    pub fn new(size: i64, fit: Fit, creation_time: i64, signature: i64) -> Self {
        Self {
            size,
            creation_time,
            signature,
            fit: fit.as_byte(),
            partitions: [Partition::empty(); PARTITION_SLOTS],
        }
    }

    pub fn active(&self) -> impl Iterator<Item = (usize, &Partition)> {
        self.partitions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active())
    }

    pub fn extended(&self) -> Option<(usize, &Partition)> {
        self.active()
            .find(|(_, p)| p.kind() == Some(PartitionType::Extended))
    }
}

impl OnDisk for Mbr {
    const SIZE: usize = 8 * 3 + 1 + PARTITION_SLOTS * Partition::SIZE;

    fn encode_into(&self, w: &mut Writer) {
        w.i64(self.size);
        w.i64(self.creation_time);
        w.i64(self.signature);
        w.u8(self.fit);
        for p in &self.partitions {
            w.record(p);
        }
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let size = r.i64()?;
        let creation_time = r.i64()?;
        let signature = r.i64()?;
        let fit = r.u8()?;
        let mut partitions = [Partition::empty(); PARTITION_SLOTS];
        for p in partitions.iter_mut() {
            *p = r.record()?;
        }
        Ok(Self {
            size,
            creation_time,
            signature,
            fit,
            partitions,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ebr {
    pub mount: u8,
    pub fit: u8,
    /// Offset of the logical partition data; the EBR sits before it.
    pub start: i64,
    pub size: i64,
    /// Offset of the next EBR, or -1 at the end of the chain.
    pub next: i64,
    pub name: [u8; PART_NAME_LEN],
}

impl Ebr {
    pub fn empty() -> Self {
        Self {
            mount: STATUS_EMPTY,
            fit: 0,
            start: -1,
            size: 0,
            next: -1,
            name: [0; PART_NAME_LEN],
        }
    }

    pub fn name(&self) -> String {
        field_str(&self.name)
    }

    pub fn is_used(&self) -> bool {
        self.size > 0
    }
}

impl OnDisk for Ebr {
    const SIZE: usize = 2 + 8 * 3 + PART_NAME_LEN;

    fn encode_into(&self, w: &mut Writer) {
        w.u8(self.mount);
        w.u8(self.fit);
        w.i64(self.start);
        w.i64(self.size);
        w.i64(self.next);
        w.bytes(&self.name);
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            mount: r.u8()?,
            fit: r.u8()?,
            start: r.i64()?,
            size: r.i64()?,
            next: r.i64()?,
            name: r.array()?,
        })
    }
}

/* ---------------- SUPERBLOCK ---------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SuperBlock {
    pub fs_type: i64,
    pub inodes_count: i64,
    pub blocks_count: i64,
    pub free_blocks: i64,
    pub free_inodes: i64,
    pub mtime: i64,
    pub umtime: i64,
    pub mnt_count: i64,
    pub magic: i64,
    pub inode_s: i64,
    pub block_s: i64,
    pub first_ino: i64,
    pub first_blo: i64,
    pub bm_inode_start: i64,
    pub bm_block_start: i64,
    pub inode_start: i64,
    pub block_start: i64,
}

impl SuperBlock {
    pub fn check_magic(&self) -> Result<(), CodecError> {
        if self.magic != SUPERBLOCK_MAGIC {
            return Err(CodecError::BadMagic(self.magic));
        }
        Ok(())
    }

    pub fn inode_offset(&self, index: i64) -> i64 {
        self.inode_start + index * self.inode_s
    }

    pub fn block_offset(&self, index: i64) -> i64 {
        self.block_start + index * self.block_s
    }

    pub fn is_ext3(&self) -> bool {
        self.fs_type == 3
    }
}

impl OnDisk for SuperBlock {
    const SIZE: usize = 17 * 8;

    fn encode_into(&self, w: &mut Writer) {
        for v in [
            self.fs_type,
            self.inodes_count,
            self.blocks_count,
            self.free_blocks,
            self.free_inodes,
            self.mtime,
            self.umtime,
            self.mnt_count,
            self.magic,
            self.inode_s,
            self.block_s,
            self.first_ino,
            self.first_blo,
            self.bm_inode_start,
            self.bm_block_start,
            self.inode_start,
            self.block_start,
        ] {
            w.i64(v);
        }
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            fs_type: r.i64()?,
            inodes_count: r.i64()?,
            blocks_count: r.i64()?,
            free_blocks: r.i64()?,
            free_inodes: r.i64()?,
            mtime: r.i64()?,
            umtime: r.i64()?,
            mnt_count: r.i64()?,
            magic: r.i64()?,
            inode_s: r.i64()?,
            block_s: r.i64()?,
            first_ino: r.i64()?,
            first_blo: r.i64()?,
            bm_inode_start: r.i64()?,
            bm_block_start: r.i64()?,
            inode_start: r.i64()?,
            block_start: r.i64()?,
        })
    }
}

/* ---------------- INODE ---------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub uid: i64,
    pub gid: i64,
    /// Content length for files, one directory block record for directories.
    pub size: i64,
    pub atime: i64,
    pub ctime: i64,
    pub mtime: i64,
    pub block: [i64; INODE_BLOCKS],
    pub kind: u8,
    /// Owner, group and other digits as ASCII '0'..'7'.
    pub perm: [u8; 3],
}

impl Inode {
    pub fn new(kind: u8, perm: &str, uid: i64, gid: i64, now: i64) -> Self {
        Self {
            uid,
            gid,
            size: 0,
            atime: now,
            ctime: now,
            mtime: now,
            block: [-1; INODE_BLOCKS],
            kind,
            perm: fixed(perm),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == INODE_DIR
    }

    pub fn perm_str(&self) -> String {
        String::from_utf8_lossy(&self.perm).into_owned()
    }

    /// Allocated block slots, in order, stopping at the first hole.
    pub fn used_blocks(&self) -> impl Iterator<Item = i64> + '_ {
        self.block.iter().copied().take_while(|&b| b != -1)
    }
}

impl OnDisk for Inode {
    const SIZE: usize = 6 * 8 + INODE_BLOCKS * 8 + 1 + 3;

    fn encode_into(&self, w: &mut Writer) {
        w.i64(self.uid);
        w.i64(self.gid);
        w.i64(self.size);
        w.i64(self.atime);
        w.i64(self.ctime);
        w.i64(self.mtime);
        for b in self.block {
            w.i64(b);
        }
        w.u8(self.kind);
        w.bytes(&self.perm);
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let uid = r.i64()?;
        let gid = r.i64()?;
        let size = r.i64()?;
        let atime = r.i64()?;
        let ctime = r.i64()?;
        let mtime = r.i64()?;
        let mut block = [-1; INODE_BLOCKS];
        for b in block.iter_mut() {
            *b = r.i64()?;
        }
        Ok(Self {
            uid,
            gid,
            size,
            atime,
            ctime,
            mtime,
            block,
            kind: r.u8()?,
            perm: r.array()?,
        })
    }
}

/* ---------------- BLOCKS ---------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; NAME_LEN],
    pub inode: i64,
}

impl DirEntry {
    pub fn free() -> Self {
        Self {
            name: [0; NAME_LEN],
            inode: -1,
        }
    }

    /// Names longer than the field are cut to their first 12 bytes.
    pub fn new(name: &str, inode: i64) -> Self {
        Self {
            name: fixed(name),
            inode,
        }
    }

    pub fn is_free(&self) -> bool {
        self.inode == -1
    }

    pub fn name(&self) -> String {
        field_str(&self.name)
    }
}

impl OnDisk for DirEntry {
    const SIZE: usize = NAME_LEN + 4 + 8;

    fn encode_into(&self, w: &mut Writer) {
        w.bytes(&self.name);
        w.bytes(&[0; 4]);
        w.i64(self.inode);
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let name = r.array()?;
        let _reserved: [u8; 4] = r.array()?;
        Ok(Self {
            name,
            inode: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryBlock {
    pub entries: [DirEntry; DIR_ENTRIES],
}

impl DirectoryBlock {
    pub fn empty() -> Self {
        Self {
            entries: [DirEntry::free(); DIR_ENTRIES],
        }
    }

    /// First block of a directory: `.` and `..` in slots 0 and 1.
    pub fn for_directory(own: i64, parent: i64) -> Self {
        let mut b = Self::empty();
        b.entries[0] = DirEntry::new(".", own);
        b.entries[1] = DirEntry::new("..", parent);
        b
    }
}

impl OnDisk for DirectoryBlock {
    const SIZE: usize = DIR_ENTRIES * DirEntry::SIZE;

    fn encode_into(&self, w: &mut Writer) {
        for e in &self.entries {
            w.record(e);
        }
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let mut entries = [DirEntry::free(); DIR_ENTRIES];
        for e in entries.iter_mut() {
            *e = r.record()?;
        }
        Ok(Self { entries })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileBlock {
    pub data: [u8; FILE_BLOCK_CAPACITY],
}

impl FileBlock {
    pub fn from_slice(chunk: &[u8]) -> Self {
        let mut data = [0u8; FILE_BLOCK_CAPACITY];
        let len = chunk.len().min(FILE_BLOCK_CAPACITY);
        data[..len].copy_from_slice(&chunk[..len]);
        Self { data }
    }
}

impl OnDisk for FileBlock {
    const SIZE: usize = FILE_BLOCK_CAPACITY;

    fn encode_into(&self, w: &mut Writer) {
        w.bytes(&self.data);
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { data: r.array()? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerBlock {
    pub pointers: [i64; POINTERS_PER_BLOCK],
}

impl PointerBlock {
    pub fn empty() -> Self {
        Self {
            pointers: [-1; POINTERS_PER_BLOCK],
        }
    }
}

impl OnDisk for PointerBlock {
    const SIZE: usize = POINTERS_PER_BLOCK * 8;

    fn encode_into(&self, w: &mut Writer) {
        for p in self.pointers {
            w.i64(p);
        }
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let mut pointers = [-1; POINTERS_PER_BLOCK];
        for p in pointers.iter_mut() {
            *p = r.i64()?;
        }
        Ok(Self { pointers })
    }
}

/* ---------------- JOURNAL / SNAPSHOT ---------------- */

pub const JOURNAL_OP_LEN: usize = 10;
pub const JOURNAL_PATH_LEN: usize = 32;
pub const JOURNAL_CONTENT_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JournalEntry {
    /// -1 marks a free slot; otherwise the slot position plus one.
    pub count: i32,
    pub operation: [u8; JOURNAL_OP_LEN],
    pub path: [u8; JOURNAL_PATH_LEN],
    pub content: [u8; JOURNAL_CONTENT_LEN],
    pub date: f32,
}

impl JournalEntry {
    pub fn free() -> Self {
        Self {
            count: -1,
            operation: [0; JOURNAL_OP_LEN],
            path: [0; JOURNAL_PATH_LEN],
            content: [0; JOURNAL_CONTENT_LEN],
            date: 0.0,
        }
    }

    pub fn new(count: i32, operation: &str, path: &str, content: &str, date: f32) -> Self {
        Self {
            count,
            operation: fixed(operation),
            path: fixed(path),
            content: fixed(content),
            date,
        }
    }

    pub fn is_free(&self) -> bool {
        self.count == -1
    }

    pub fn operation(&self) -> String {
        field_str(&self.operation)
    }

    pub fn path(&self) -> String {
        field_str(&self.path)
    }

    pub fn content(&self) -> String {
        field_str(&self.content)
    }
}

impl OnDisk for JournalEntry {
    const SIZE: usize = 4 + JOURNAL_OP_LEN + JOURNAL_PATH_LEN + JOURNAL_CONTENT_LEN + 4;

    fn encode_into(&self, w: &mut Writer) {
        w.i32(self.count);
        w.bytes(&self.operation);
        w.bytes(&self.path);
        w.bytes(&self.content);
        w.f32(self.date);
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            count: r.i32()?,
            operation: r.array()?,
            path: r.array()?,
            content: r.array()?,
            date: r.f32()?,
        })
    }
}

/// Header of the recovery snapshot; the region copies follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotHeader {
    /// Zero until `loss` has stored a snapshot.
    pub last_mount: i64,
    pub inodes_free: i64,
    pub blocks_free: i64,
}

impl OnDisk for SnapshotHeader {
    const SIZE: usize = 3 * 8;

    fn encode_into(&self, w: &mut Writer) {
        w.i64(self.last_mount);
        w.i64(self.inodes_free);
        w.i64(self.blocks_free);
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            last_mount: r.i64()?,
            inodes_free: r.i64()?,
            blocks_free: r.i64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes_match_layout() {
        assert_eq!(Partition::SIZE, 47);
        assert_eq!(Mbr::SIZE, 213);
        assert_eq!(Ebr::SIZE, 42);
        assert_eq!(SuperBlock::SIZE, 136);
        assert_eq!(Inode::SIZE, 172);
        assert_eq!(DirEntry::SIZE, 24);
        assert_eq!(DirectoryBlock::SIZE, 96);
        assert_eq!(FileBlock::SIZE, 64);
        assert_eq!(PointerBlock::SIZE, 64);
        assert_eq!(JournalEntry::SIZE, 114);
        assert_eq!(BLOCK_CELL_SIZE, 96);
        assert_eq!(MAX_FILE_SIZE, 960);
    }

    #[test]
    fn mbr_round_trips_with_partitions() {
        let mut mbr = Mbr::new(10 * 1024 * 1024, Fit::First, 1_700_000_000, 42);
        mbr.partitions[1] = Partition::new(PartitionType::Extended, Fit::Worst, 512, 4096, "ext");
        let decoded = Mbr::from_bytes(&mbr.to_bytes()).unwrap();
        assert_eq!(decoded, mbr);
        assert_eq!(decoded.extended().map(|(i, _)| i), Some(1));
        assert_eq!(decoded.partitions[1].name(), "ext");
    }

    #[test]
    fn inode_round_trips() {
        let mut inode = Inode::new(INODE_FILE, "664", 2, 3, 1_700_000_000);
        inode.block[0] = 7;
        inode.size = 11;
        let decoded = Inode::from_bytes(&inode.to_bytes()).unwrap();
        assert_eq!(decoded, inode);
        assert_eq!(decoded.used_blocks().collect::<Vec<_>>(), vec![7]);
        assert_eq!(decoded.perm_str(), "664");
    }

    #[test]
    fn directory_block_keeps_names_of_twelve_bytes() {
        let mut block = DirectoryBlock::for_directory(4, 0);
        block.entries[2] = DirEntry::new("exactly12chr", 9);
        block.entries[3] = DirEntry::new("thirteen_char", 10);
        let decoded = DirectoryBlock::from_bytes(&block.to_bytes()).unwrap();
        assert_eq!(decoded.entries[0].name(), ".");
        assert_eq!(decoded.entries[1].inode, 0);
        assert_eq!(decoded.entries[2].name(), "exactly12chr");
        assert_eq!(decoded.entries[3].name(), "thirteen_cha");
    }

    #[test]
    fn journal_entry_round_trips_and_truncates() {
        let long = "x".repeat(100);
        let entry = JournalEntry::new(3, "mkfile", "/home/u/hi.txt", &long, 1.7e9);
        let decoded = JournalEntry::from_bytes(&entry.to_bytes()).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.content().len(), JOURNAL_CONTENT_LEN);
        assert!(JournalEntry::free().is_free());
    }

    #[test]
    fn superblock_magic_is_checked_outside_decode() {
        let sb = SuperBlock {
            magic: 0x1234,
            ..SuperBlock::default()
        };
        let decoded = SuperBlock::from_bytes(&sb.to_bytes()).unwrap();
        assert_eq!(decoded, sb);
        assert_eq!(decoded.check_magic(), Err(CodecError::BadMagic(0x1234)));
    }

    #[test]
    fn short_buffers_are_truncated() {
        let err = Ebr::from_bytes(&[0u8; 10]).unwrap_err();
        assert_eq!(err, CodecError::Truncated { needed: 42, got: 10 });
    }

    #[test]
    fn fit_and_type_parse() {
        assert_eq!(Fit::parse("bf"), Some(Fit::Best));
        assert_eq!(Fit::from_byte(b'w'), Some(Fit::Worst));
        assert_eq!(Fit::parse("XF"), None);
        assert_eq!(PartitionType::parse("l"), Some(PartitionType::Logical));
        assert_eq!(PartitionType::parse("PE"), None);
    }
}
