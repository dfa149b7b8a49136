//! EXT3 operation journal: 50 fixed slots right before the inode bitmap.
//!
//! Writers take the first free slot and wrap to slot 0 once every slot is
//! used. `repair_journal` salvages readable entries from the current region
//! and from the 64-slot region older layouts kept before the inode table.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::codec::OnDisk;
use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{JournalEntry, SuperBlock, JOURNAL_ENTRIES, LEGACY_JOURNAL_ENTRIES};
use crate::volume::{now, Volume};

const ENTRY_SIZE: i64 = JournalEntry::SIZE as i64;
const CONTENT_CHARS: usize = 100;
const MIN_STAMP: u32 = 1_000_000_000;
const MAX_STAMP: u32 = 2_000_000_000;

/// Offset of the canonical journal region, if the filesystem has one.
pub fn journal_start(sb: &SuperBlock) -> Option<i64> {
    sb.is_ext3()
        .then(|| sb.bm_inode_start - JOURNAL_ENTRIES as i64 * ENTRY_SIZE)
}

fn require_journal<D: BlockDevice>(vol: &Volume<D>) -> Result<i64> {
    journal_start(vol.superblock())
        .ok_or_else(|| FsError::validation("the filesystem has no journal (EXT2)"))
}

fn read_slots<D: BlockDevice>(vol: &mut Volume<D>, start: i64, count: usize) -> Result<Vec<JournalEntry>> {
    let raw = vol.device().read_vec(start, count * JournalEntry::SIZE)?;
    raw.chunks_exact(JournalEntry::SIZE)
        .map(|chunk| Ok(JournalEntry::from_bytes(chunk)?))
        .collect()
}

/// Every occupied slot in slot order.
pub fn read_journal<D: BlockDevice>(vol: &mut Volume<D>) -> Result<Vec<JournalEntry>> {
    let start = require_journal(vol)?;
    Ok(read_slots(vol, start, JOURNAL_ENTRIES)?
        .into_iter()
        .filter(|e| !e.is_free())
        .collect())
}

/// Records one operation. A no-op on EXT2.
pub fn write_journal<D: BlockDevice>(
    vol: &mut Volume<D>,
    operation: &str,
    path: &str,
    content: &str,
) -> Result<()> {
    let Some(start) = journal_start(vol.superblock()) else {
        return Ok(());
    };
    let slots = read_slots(vol, start, JOURNAL_ENTRIES)?;
    let index = slots.iter().position(JournalEntry::is_free).unwrap_or(0);
    let content: String = content.chars().take(CONTENT_CHARS).collect();
    let entry = JournalEntry::new(
        index as i32 + 1,
        operation,
        path,
        &content,
        now() as f32,
    );
    debug!("journal slot {index}: {operation} {path}");
    vol.device()
        .write_record(start + index as i64 * ENTRY_SIZE, &entry)
}

/// Marks every slot free.
pub fn clear_journal<D: BlockDevice>(vol: &mut Volume<D>) -> Result<()> {
    let start = require_journal(vol)?;
    write_region(vol, start, &[])
}

fn write_region<D: BlockDevice>(vol: &mut Volume<D>, start: i64, entries: &[JournalEntry]) -> Result<()> {
    let mut bytes = Vec::with_capacity(JOURNAL_ENTRIES * JournalEntry::SIZE);
    for i in 0..JOURNAL_ENTRIES {
        let entry = entries.get(i).copied().unwrap_or_else(JournalEntry::free);
        bytes.extend_from_slice(&entry.to_bytes());
    }
    vol.device().write_bytes(start, &bytes)
}

/// Outcome of a journal salvage.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    pub recovered: usize,
    pub backup: PathBuf,
}

fn sanitize(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    raw[..end]
        .iter()
        .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '?' })
        .collect::<String>()
        .trim()
        .to_string()
}

fn plausible_stamp(date: f32) -> bool {
    date.is_finite() && date >= MIN_STAMP as f32 && date <= MAX_STAMP as f32
}

/// First little-endian u32 inside the slot that reads as a unix time.
fn scan_stamp(raw: &[u8]) -> Option<u32> {
    raw.windows(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .find(|v| (MIN_STAMP..=MAX_STAMP).contains(v))
}

fn salvage(raw: &[u8], found: &mut Vec<JournalEntry>) {
    for chunk in raw.chunks_exact(JournalEntry::SIZE) {
        let Ok(entry) = JournalEntry::from_bytes(chunk) else {
            continue;
        };
        let operation = sanitize(&entry.operation);
        let path = sanitize(&entry.path);
        if operation.is_empty() && path.is_empty() {
            continue;
        }
        let date = if plausible_stamp(entry.date) {
            entry.date
        } else {
            match scan_stamp(chunk) {
                Some(stamp) => stamp as f32,
                None => {
                    warn!("journal entry '{operation} {path}' has no timestamp, using now");
                    now() as f32
                }
            }
        };
        let content = sanitize(&entry.content);
        found.push(JournalEntry::new(0, &operation, &path, &content, date));
    }
}

/// Rebuilds the journal from whatever entries can still be read.
///
/// The canonical region is backed up to `backup_dir` before it is
/// rewritten with the salvaged entries sorted by time.
pub fn repair_journal<D: BlockDevice>(
    vol: &mut Volume<D>,
    backup_dir: &Path,
    id: &str,
) -> Result<RepairOutcome> {
    let canonical = require_journal(vol)?;
    let legacy = vol.superblock().inode_start - LEGACY_JOURNAL_ENTRIES as i64 * ENTRY_SIZE;
    let canonical_len = JOURNAL_ENTRIES * JournalEntry::SIZE;

    let mut found = Vec::new();
    let current = vol.device().read_vec(canonical, canonical_len)?;
    salvage(&current, &mut found);
    if legacy != canonical && legacy >= vol.start() + SuperBlock::SIZE as i64 {
        let raw = vol
            .device()
            .read_vec(legacy, LEGACY_JOURNAL_ENTRIES * JournalEntry::SIZE)?;
        salvage(&raw, &mut found);
    }

    let mut seen = HashSet::new();
    found.retain(|e| seen.insert((e.date as i64, e.operation(), e.path())));
    found.sort_by(|a, b| a.date.total_cmp(&b.date));
    if found.is_empty() {
        return Err(FsError::corruption("no recoverable journal entries"));
    }

    fs::create_dir_all(backup_dir)?;
    let backup = backup_dir.join(format!("journal_backup_{id}_{}.bin", now()));
    fs::write(&backup, &current)?;

    let entries: Vec<JournalEntry> = found
        .iter()
        .take(JOURNAL_ENTRIES)
        .enumerate()
        .map(|(i, e)| JournalEntry { count: i as i32 + 1, ..*e })
        .collect();
    write_region(vol, canonical, &entries)?;
    info!(
        "journal repaired: {} entries recovered, backup at {}",
        entries.len(),
        backup.display()
    );
    Ok(RepairOutcome {
        recovered: entries.len(),
        backup,
    })
}
