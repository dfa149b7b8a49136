//! `fdisk` core: the MBR partition table and the EBR chain of logical
//! partitions.
//!
//! Free space is always described as a list of holes between active
//! partitions; fit policies only pick among those holes. Moving a partition
//! rewrites everything inside it that stores absolute offsets (EBR links and
//! superblock region offsets).

use log::{debug, info, warn};

use crate::codec::OnDisk;
use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::{
    Ebr, Fit, Inode, Mbr, Partition, PartitionType, SuperBlock, EBR_RESERVED, MBR_RESERVED,
    PARTITION_SLOTS, PART_NAME_LEN, STATUS_EMPTY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bytes,
    Kilo,
    Mega,
}

impl Unit {
    pub fn parse(s: &str) -> Option<Unit> {
        match s.trim().to_ascii_uppercase().as_str() {
            "B" => Some(Unit::Bytes),
            "K" => Some(Unit::Kilo),
            "M" => Some(Unit::Mega),
            _ => None,
        }
    }

    pub fn to_bytes(self, amount: i64) -> Result<i64> {
        let factor = match self {
            Unit::Bytes => 1,
            Unit::Kilo => 1024,
            Unit::Mega => 1024 * 1024,
        };
        amount
            .checked_mul(factor)
            .ok_or_else(|| FsError::validation(format!("size {amount} overflows")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Fast,
    Full,
}

impl DeleteMode {
    pub fn parse(s: &str) -> Option<DeleteMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Some(DeleteMode::Fast),
            "full" => Some(DeleteMode::Full),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hole {
    pub start: i64,
    pub size: i64,
}

/// Where a partition is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Mbr(usize),
    /// Offset of the EBR describing the logical partition.
    Logical(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub slot: Slot,
    pub kind: PartitionType,
    pub name: String,
    pub start: i64,
    pub size: i64,
}

/// Gaps between the MBR reservation, the active partitions and the end of
/// the disk, in ascending order.
pub fn holes(mbr: &Mbr) -> Vec<Hole> {
    let mut used: Vec<(i64, i64)> = mbr.active().map(|(_, p)| (p.start, p.end())).collect();
    used.sort_unstable();
    let mut out = Vec::new();
    let mut cursor = MBR_RESERVED;
    for (start, end) in used {
        if start > cursor {
            out.push(Hole {
                start: cursor,
                size: start - cursor,
            });
        }
        cursor = cursor.max(end);
    }
    if cursor < mbr.size {
        out.push(Hole {
            start: cursor,
            size: mbr.size - cursor,
        });
    }
    out
}

pub fn free_space(mbr: &Mbr) -> i64 {
    holes(mbr).iter().map(|h| h.size).sum()
}

pub fn pick_hole(holes: &[Hole], size: i64, fit: Fit) -> Option<Hole> {
    let mut fitting = holes.iter().copied().filter(|h| h.size >= size);
    match fit {
        Fit::First => fitting.next(),
        Fit::Best => fitting.min_by_key(|h| h.size),
        // ties go to the lowest offset
        Fit::Worst => fitting.max_by(|a, b| a.size.cmp(&b.size).then(b.start.cmp(&a.start))),
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(FsError::validation("partition name can not be empty"));
    }
    if name.len() > PART_NAME_LEN {
        return Err(FsError::validation(format!(
            "partition name '{name}' is longer than {PART_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

/// Shifts the region offsets of a filesystem that was just moved by `delta`.
/// Partitions without a valid superblock are left alone.
fn rebase_superblock<D: BlockDevice>(dev: &mut D, start: i64, delta: i64) -> Result<()> {
    let Ok(mut sb) = dev.read_record::<SuperBlock>(start) else {
        return Ok(());
    };
    if sb.check_magic().is_err() || sb.inode_s != Inode::SIZE as i64 {
        return Ok(());
    }
    sb.bm_inode_start += delta;
    sb.bm_block_start += delta;
    sb.inode_start += delta;
    sb.block_start += delta;
    debug!("superblock at {start} rebased by {delta}");
    dev.write_record(start, &sb)
}

/// A disk image opened through its MBR.
pub struct Disk<D: BlockDevice> {
    dev: D,
    mbr: Mbr,
}

impl<D: BlockDevice> Disk<D> {
    pub fn open(mut dev: D) -> Result<Self> {
        let mbr: Mbr = dev.read_record(0)?;
        if mbr.size <= MBR_RESERVED {
            return Err(FsError::corruption(format!("MBR reports a disk of {} bytes", mbr.size)));
        }
        Ok(Self { dev, mbr })
    }

    /// Writes a fresh MBR to `dev`.
    pub fn init(mut dev: D, mbr: Mbr) -> Result<Self> {
        dev.write_record(0, &mbr)?;
        Ok(Self { dev, mbr })
    }

    pub fn mbr(&self) -> &Mbr {
        &self.mbr
    }

    pub(crate) fn mbr_mut(&mut self) -> &mut Mbr {
        &mut self.mbr
    }

    pub fn device(&mut self) -> &mut D {
        &mut self.dev
    }

    pub fn into_device(self) -> D {
        self.dev
    }

    pub fn sync(&mut self) -> Result<()> {
        let mbr = self.mbr;
        self.dev.write_record(0, &mbr)
    }

    fn extended(&self) -> Option<Partition> {
        self.mbr.extended().map(|(_, p)| *p)
    }

    /* ---------------- LOOKUP ---------------- */

    /// Logical partitions in chain order, with the offset of their EBR.
    pub fn logicals(&mut self) -> Result<Vec<(i64, Ebr)>> {
        let Some(ext) = self.extended() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        let mut pos = ext.start;
        loop {
            let ebr: Ebr = self.dev.read_record(pos)?;
            if !ebr.is_used() {
                break;
            }
            out.push((pos, ebr));
            if ebr.next == -1 {
                break;
            }
            if ebr.next <= pos || ebr.next >= ext.end() {
                warn!("EBR at {pos} links to {} outside the chain", ebr.next);
                return Err(FsError::corruption(format!("broken EBR chain at {pos}")));
            }
            pos = ebr.next;
        }
        Ok(out)
    }

    /// Finds a partition by name, ASCII case-insensitively.
    pub fn locate(&mut self, name: &str) -> Result<Located> {
        let primary = self
            .mbr
            .active()
            .find(|(_, p)| p.name().eq_ignore_ascii_case(name))
            .map(|(i, p)| (i, *p));
        if let Some((idx, p)) = primary {
            let kind = p
                .kind()
                .ok_or_else(|| FsError::corruption(format!("partition '{name}' has type {}", p.kind)))?;
            return Ok(Located {
                slot: Slot::Mbr(idx),
                kind,
                name: p.name(),
                start: p.start,
                size: p.size,
            });
        }
        self.logicals()?
            .into_iter()
            .find(|(_, e)| e.name().eq_ignore_ascii_case(name))
            .map(|(pos, e)| Located {
                slot: Slot::Logical(pos),
                kind: PartitionType::Logical,
                name: e.name(),
                start: e.start,
                size: e.size,
            })
            .ok_or_else(|| FsError::not_found(format!("partition '{name}'")))
    }

    fn name_taken(&mut self, name: &str) -> Result<bool> {
        match self.locate(name) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /* ---------------- CREATE ---------------- */

    pub fn create_partition(
        &mut self,
        kind: PartitionType,
        fit: Fit,
        size: i64,
        name: &str,
    ) -> Result<Located> {
        check_name(name)?;
        if size <= 0 {
            return Err(FsError::validation("partition size must be positive"));
        }
        if self.name_taken(name)? {
            return Err(FsError::conflict(format!("partition '{name}'")));
        }
        match kind {
            PartitionType::Logical => return self.create_logical(fit, size, name),
            PartitionType::Extended if self.extended().is_some() => {
                return Err(FsError::conflict("the disk already has an extended partition"));
            }
            PartitionType::Extended if size < EBR_RESERVED => {
                return Err(FsError::validation(format!(
                    "an extended partition needs at least {EBR_RESERVED} bytes"
                )));
            }
            _ => {}
        }
        if self.mbr.active().count() == PARTITION_SLOTS {
            return Err(FsError::no_space("all four partition slots are in use"));
        }

        let hole = match pick_hole(&holes(&self.mbr), size, fit) {
            Some(hole) => hole,
            None => {
                let free = free_space(&self.mbr);
                if free < size {
                    return Err(FsError::no_space(format!(
                        "{size} bytes requested, {free} free on the disk"
                    )));
                }
                debug!("no hole of {size} bytes, defragmenting first");
                self.defragment()?;
                pick_hole(&holes(&self.mbr), size, fit)
                    .ok_or_else(|| FsError::no_space(format!("no hole of {size} bytes")))?
            }
        };
        let slot = self
            .mbr
            .partitions
            .iter()
            .position(|p| !p.is_active())
            .ok_or_else(|| FsError::no_space("all four partition slots are in use"))?;

        self.mbr.partitions[slot] = Partition::new(kind, fit, hole.start, size, name);
        if kind == PartitionType::Extended {
            self.dev.write_record(hole.start, &Ebr::empty())?;
        }
        self.sync()?;
        info!("created {kind:?} partition '{name}' at {} ({size} bytes)", hole.start);
        Ok(Located {
            slot: Slot::Mbr(slot),
            kind,
            name: name.to_string(),
            start: hole.start,
            size,
        })
    }

    /// Appends a logical partition after the last one in the chain.
    fn create_logical(&mut self, fit: Fit, size: i64, name: &str) -> Result<Located> {
        let ext = self
            .extended()
            .ok_or_else(|| FsError::not_found("a logical partition needs an extended partition"))?;
        let chain = self.logicals()?;
        let pos = match chain.last() {
            Some((_, last)) => last.start + last.size,
            None => ext.start,
        };
        let needed = size + EBR_RESERVED;
        if pos + needed > ext.end() {
            return Err(FsError::no_space(format!(
                "{needed} bytes requested, {} left in extended partition '{}'",
                (ext.end() - pos).max(0),
                ext.name()
            )));
        }

        let ebr = Ebr {
            mount: STATUS_EMPTY,
            fit: fit.as_byte(),
            start: pos + EBR_RESERVED,
            size,
            next: -1,
            name: crate::codec::fixed(name),
        };
        self.dev.write_record(pos, &ebr)?;
        if let Some(&(last_pos, mut last)) = chain.last() {
            last.next = pos;
            self.dev.write_record(last_pos, &last)?;
        }
        info!("created logical partition '{name}' at {} ({size} bytes)", ebr.start);
        Ok(Located {
            slot: Slot::Logical(pos),
            kind: PartitionType::Logical,
            name: name.to_string(),
            start: ebr.start,
            size,
        })
    }

    /* ---------------- DELETE ---------------- */

    /// Removes a partition. Deleting from the MBR defragments the disk.
    pub fn delete_partition(&mut self, name: &str, mode: DeleteMode) -> Result<Located> {
        let located = self.locate(name)?;
        match located.slot {
            Slot::Mbr(idx) => {
                let p = self.mbr.partitions[idx];
                if mode == DeleteMode::Full {
                    // covers every logical partition of an extended one
                    self.dev.zero(p.start, p.size)?;
                }
                self.mbr.partitions[idx] = Partition::empty();
                self.defragment()?;
            }
            Slot::Logical(pos) => self.delete_logical(pos, mode)?,
        }
        info!("deleted partition '{}' ({mode:?})", located.name);
        Ok(located)
    }

    fn delete_logical(&mut self, pos: i64, mode: DeleteMode) -> Result<()> {
        let chain = self.logicals()?;
        let i = chain
            .iter()
            .position(|(p, _)| *p == pos)
            .ok_or_else(|| FsError::not_found(format!("EBR at {pos}")))?;
        let ebr = chain[i].1;
        if mode == DeleteMode::Full {
            self.dev.zero(ebr.start, ebr.size)?;
        }
        if i == 0 {
            // the head EBR stays at the start of the extended partition
            match chain.get(1) {
                Some(&(next_pos, next)) => {
                    self.dev.write_record(pos, &next)?;
                    self.dev.zero(next_pos, Ebr::SIZE as i64)?;
                }
                None => self.dev.write_record(pos, &Ebr::empty())?,
            }
        } else {
            let (prev_pos, mut prev) = chain[i - 1];
            prev.next = ebr.next;
            self.dev.write_record(prev_pos, &prev)?;
            self.dev.zero(pos, Ebr::SIZE as i64)?;
        }
        Ok(())
    }

    /* ---------------- MOVE / DEFRAGMENT ---------------- */

    /// Moves the data of MBR slot `idx` to `new_start`, zeroing the bytes
    /// it leaves behind and fixing absolute offsets stored inside it.
    fn relocate(&mut self, idx: usize, new_start: i64) -> Result<()> {
        let p = self.mbr.partitions[idx];
        let delta = new_start - p.start;
        if delta == 0 {
            return Ok(());
        }
        debug!("moving '{}' from {} to {new_start}", p.name(), p.start);
        self.dev.copy_within(p.start, new_start, p.size)?;
        let (from, to) = if delta < 0 {
            ((new_start + p.size).max(p.start), p.end())
        } else {
            (p.start, new_start.min(p.end()))
        };
        self.dev.zero(from, to - from)?;

        if p.kind() == Some(PartitionType::Extended) {
            self.rebase_chain(new_start, delta)?;
        } else {
            rebase_superblock(&mut self.dev, new_start, delta)?;
        }
        self.mbr.partitions[idx].start = new_start;
        Ok(())
    }

    fn rebase_chain(&mut self, head: i64, delta: i64) -> Result<()> {
        let mut pos = head;
        loop {
            let mut ebr: Ebr = self.dev.read_record(pos)?;
            if !ebr.is_used() {
                return Ok(());
            }
            ebr.start += delta;
            rebase_superblock(&mut self.dev, ebr.start, delta)?;
            let next = ebr.next;
            if next != -1 {
                ebr.next += delta;
            }
            self.dev.write_record(pos, &ebr)?;
            if next == -1 {
                return Ok(());
            }
            if next + delta <= pos {
                return Err(FsError::corruption(format!("broken EBR chain at {pos}")));
            }
            pos = next + delta;
        }
    }

    fn by_start(&self) -> Vec<usize> {
        let mut order: Vec<usize> = self.mbr.active().map(|(i, _)| i).collect();
        order.sort_by_key(|&i| self.mbr.partitions[i].start);
        order
    }

    /// Packs every active partition right after the MBR reservation and
    /// rewrites the table in ascending start order. Returns how many moved.
    pub fn defragment(&mut self) -> Result<usize> {
        let order = self.by_start();
        let mut cursor = MBR_RESERVED;
        let mut moved = 0;
        for &i in &order {
            if self.mbr.partitions[i].start != cursor {
                self.relocate(i, cursor)?;
                moved += 1;
            }
            cursor = self.mbr.partitions[i].end();
        }

        let mut table = [Partition::empty(); PARTITION_SLOTS];
        for (slot, &i) in order.iter().enumerate() {
            table[slot] = self.mbr.partitions[i];
        }
        self.mbr.partitions = table;
        self.sync()?;
        if moved > 0 {
            info!("defragmented disk: {moved} partitions moved");
        }
        Ok(moved)
    }

    /* ---------------- RESIZE ---------------- */

    fn mbr_slot(&self, name: &str) -> Result<usize> {
        self.mbr
            .active()
            .find(|(_, p)| p.name().eq_ignore_ascii_case(name))
            .map(|(i, _)| i)
            .ok_or_else(|| FsError::not_found(format!("partition '{name}'")))
    }

    fn space_after(&self, idx: usize) -> i64 {
        let p = self.mbr.partitions[idx];
        let next = self
            .mbr
            .active()
            .filter(|(i, q)| *i != idx && q.start >= p.end())
            .map(|(_, q)| q.start)
            .min()
            .unwrap_or(self.mbr.size);
        next - p.end()
    }

    /// Grows (`delta > 0`) or shrinks a partition in place.
    pub fn resize_partition(&mut self, name: &str, delta: i64) -> Result<Located> {
        if delta == 0 {
            return Err(FsError::validation("-add must not be zero"));
        }
        let located = self.locate(name)?;
        let new_size = located.size + delta;
        if new_size <= 0 {
            return Err(FsError::validation(format!(
                "partition '{name}' of {} bytes can not shrink by {}",
                located.size, -delta
            )));
        }
        let idx = match located.slot {
            Slot::Logical(pos) => {
                self.resize_logical(pos, new_size)?;
                return self.locate(name);
            }
            Slot::Mbr(idx) => idx,
        };

        if delta < 0 {
            let new_end = located.start + new_size;
            if located.kind == PartitionType::Extended {
                let used_end = self
                    .logicals()?
                    .iter()
                    .map(|(_, e)| e.start + e.size)
                    .max()
                    .unwrap_or(located.start + Ebr::SIZE as i64);
                if new_end < used_end {
                    return Err(FsError::validation(format!(
                        "shrinking '{name}' would cut its logical partitions"
                    )));
                }
            }
            self.dev.zero(new_end, -delta)?;
            self.mbr.partitions[idx].size = new_size;
            self.defragment()?;
        } else {
            let mut idx = idx;
            let after = self.space_after(idx);
            if delta > after {
                let free = free_space(&self.mbr);
                if delta > free {
                    return Err(FsError::no_space(format!(
                        "'{name}' needs {delta} more bytes, {free} free on the disk"
                    )));
                }
                self.defragment()?;
                idx = self.mbr_slot(name)?;
                let need = delta - self.space_after(idx);
                if need > 0 {
                    let start = self.mbr.partitions[idx].start;
                    let mut later: Vec<usize> = self
                        .by_start()
                        .into_iter()
                        .filter(|&i| self.mbr.partitions[i].start > start)
                        .collect();
                    // highest first so no partition overwrites a neighbour
                    later.reverse();
                    for i in later {
                        let to = self.mbr.partitions[i].start + need;
                        self.relocate(i, to)?;
                    }
                }
            }
            self.mbr.partitions[idx].size = new_size;
            self.sync()?;
        }
        info!("partition '{name}' resized to {new_size} bytes");
        self.locate(name)
    }

    /// Logical partitions shrink in place or grow up to the next EBR (or
    /// the end of the extended partition).
    fn resize_logical(&mut self, pos: i64, new_size: i64) -> Result<()> {
        let ext = self
            .extended()
            .ok_or_else(|| FsError::corruption("logical partition without an extended one"))?;
        let mut ebr: Ebr = self.dev.read_record(pos)?;
        if new_size < ebr.size {
            self.dev.zero(ebr.start + new_size, ebr.size - new_size)?;
        } else {
            let limit = if ebr.next != -1 { ebr.next } else { ext.end() };
            if ebr.start + new_size > limit {
                return Err(FsError::no_space(format!(
                    "logical partition '{}' can grow by at most {} bytes",
                    ebr.name(),
                    limit - ebr.start - ebr.size
                )));
            }
        }
        ebr.size = new_size;
        self.dev.write_record(pos, &ebr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemDevice;
    use crate::mkfs::{format, FsKind};
    use crate::volume::Volume;

    const K: i64 = 1024;

    fn disk(size: i64, fit: Fit) -> Disk<MemDevice> {
        let dev = MemDevice::new(size as usize);
        Disk::init(dev, Mbr::new(size, fit, 0, 42)).unwrap()
    }

    #[test]
    fn fit_policies_pick_their_hole() {
        let hs = [
            Hole { start: 512, size: 300 },
            Hole { start: 2000, size: 100 },
            Hole { start: 5000, size: 900 },
        ];
        assert_eq!(pick_hole(&hs, 100, Fit::First).unwrap().start, 512);
        assert_eq!(pick_hole(&hs, 100, Fit::Best).unwrap().start, 2000);
        assert_eq!(pick_hole(&hs, 100, Fit::Worst).unwrap().start, 5000);
        assert!(pick_hole(&hs, 901, Fit::First).is_none());
    }

    #[test]
    fn primaries_are_laid_out_after_the_mbr() {
        let mut d = disk(64 * K, Fit::First);
        let a = d.create_partition(PartitionType::Primary, Fit::First, 8 * K, "a").unwrap();
        let b = d.create_partition(PartitionType::Primary, Fit::First, 8 * K, "b").unwrap();
        assert_eq!(a.start, MBR_RESERVED);
        assert_eq!(b.start, MBR_RESERVED + 8 * K);
        assert_eq!(free_space(d.mbr()), 64 * K - MBR_RESERVED - 16 * K);
        assert!(matches!(
            d.create_partition(PartitionType::Primary, Fit::First, K, "A"),
            Err(FsError::Conflict(_))
        ));
    }

    #[test]
    fn slot_and_extended_limits() {
        let mut d = disk(64 * K, Fit::First);
        d.create_partition(PartitionType::Extended, Fit::First, 8 * K, "e").unwrap();
        assert!(matches!(
            d.create_partition(PartitionType::Extended, Fit::First, 8 * K, "e2"),
            Err(FsError::Conflict(_))
        ));
        for name in ["p1", "p2", "p3"] {
            d.create_partition(PartitionType::Primary, Fit::First, K, name).unwrap();
        }
        assert!(matches!(
            d.create_partition(PartitionType::Primary, Fit::First, K, "p4"),
            Err(FsError::OutOfSpace(_))
        ));
        assert!(matches!(
            d.create_partition(PartitionType::Primary, Fit::First, 0, "zero"),
            Err(FsError::Validation(_))
        ));
    }

    #[test]
    fn logical_chain_is_linked_and_searchable() {
        let mut d = disk(64 * K, Fit::First);
        assert!(matches!(
            d.create_partition(PartitionType::Logical, Fit::First, K, "l0"),
            Err(FsError::NotFound(_))
        ));
        let ext = d.create_partition(PartitionType::Extended, Fit::First, 16 * K, "ext").unwrap();
        let l1 = d.create_partition(PartitionType::Logical, Fit::Worst, 4 * K, "l1").unwrap();
        let l2 = d.create_partition(PartitionType::Logical, Fit::Worst, 4 * K, "l2").unwrap();
        assert_eq!(l1.start, ext.start + EBR_RESERVED);
        assert_eq!(l2.start, l1.start + 4 * K + EBR_RESERVED);

        let chain = d.logicals().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].1.next, chain[1].0);
        assert_eq!(d.locate("L2").unwrap().slot, Slot::Logical(chain[1].0));
        assert!(matches!(
            d.create_partition(PartitionType::Logical, Fit::First, 8 * K, "big"),
            Err(FsError::OutOfSpace(_))
        ));
    }

    #[test]
    fn deleting_the_head_logical_keeps_the_chain() {
        let mut d = disk(64 * K, Fit::First);
        d.create_partition(PartitionType::Extended, Fit::First, 16 * K, "ext").unwrap();
        d.create_partition(PartitionType::Logical, Fit::First, 2 * K, "l1").unwrap();
        let l2 = d.create_partition(PartitionType::Logical, Fit::First, 2 * K, "l2").unwrap();
        d.delete_partition("l1", DeleteMode::Fast).unwrap();
        let chain = d.logicals().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].1.name(), "l2");
        assert_eq!(chain[0].1.start, l2.start);
        d.delete_partition("l2", DeleteMode::Full).unwrap();
        assert!(d.logicals().unwrap().is_empty());
    }

    #[test]
    fn delete_defragments_and_moves_data() {
        let mut d = disk(64 * K, Fit::First);
        d.create_partition(PartitionType::Primary, Fit::First, 4 * K, "a").unwrap();
        let b = d.create_partition(PartitionType::Primary, Fit::First, 4 * K, "b").unwrap();
        d.device().write_bytes(b.start, b"payload").unwrap();

        d.delete_partition("a", DeleteMode::Full).unwrap();
        let moved = d.locate("b").unwrap();
        assert_eq!(moved.start, MBR_RESERVED);
        assert_eq!(moved.slot, Slot::Mbr(0));
        assert_eq!(d.device().read_vec(MBR_RESERVED, 7).unwrap(), b"payload");
        assert_eq!(d.device().read_vec(b.start, 7).unwrap(), vec![0; 7]);
    }

    #[test]
    fn moving_a_formatted_partition_rebases_its_superblock() {
        let mut d = disk(512 * K, Fit::First);
        d.create_partition(PartitionType::Primary, Fit::First, 16 * K, "a").unwrap();
        let b = d.create_partition(PartitionType::Primary, Fit::First, 200 * K, "b").unwrap();
        let dev = d.into_device();
        let vol = format(dev, b.start, b.size, FsKind::Ext2).unwrap();
        let mut d = Disk::open(vol.into_device()).unwrap();

        d.delete_partition("a", DeleteMode::Fast).unwrap();
        let b = d.locate("b").unwrap();
        let mut vol = Volume::open(d.into_device(), b.start).unwrap();
        assert_eq!(vol.superblock().bm_inode_start, b.start + SuperBlock::SIZE as i64);
        assert_eq!(vol.resolve("/users.txt").unwrap(), 1);
    }

    #[test]
    fn extended_move_fixes_ebr_links() {
        let mut d = disk(128 * K, Fit::First);
        d.create_partition(PartitionType::Primary, Fit::First, 8 * K, "p").unwrap();
        d.create_partition(PartitionType::Extended, Fit::First, 32 * K, "e").unwrap();
        d.create_partition(PartitionType::Logical, Fit::First, 4 * K, "l1").unwrap();
        d.create_partition(PartitionType::Logical, Fit::First, 4 * K, "l2").unwrap();
        d.delete_partition("p", DeleteMode::Fast).unwrap();

        let e = d.locate("e").unwrap();
        assert_eq!(e.start, MBR_RESERVED);
        let chain = d.logicals().unwrap();
        assert_eq!(chain[0].0, e.start);
        assert_eq!(chain[0].1.start, e.start + EBR_RESERVED);
        assert_eq!(chain[0].1.next, chain[1].0);
        assert_eq!(chain[1].1.start, chain[1].0 + EBR_RESERVED);
    }

    #[test]
    fn resize_shrink_and_grow() {
        let mut d = disk(64 * K, Fit::First);
        d.create_partition(PartitionType::Primary, Fit::First, 8 * K, "a").unwrap();
        d.create_partition(PartitionType::Primary, Fit::First, 8 * K, "b").unwrap();

        assert!(matches!(d.resize_partition("a", -8 * K), Err(FsError::Validation(_))));
        assert!(d.resize_partition("a", -9 * K).is_err());

        // shrink leaves a gap that defragmentation closes
        d.resize_partition("a", -4 * K).unwrap();
        assert_eq!(d.locate("b").unwrap().start, MBR_RESERVED + 4 * K);

        // growing past b shifts b to the right
        d.device().write_bytes(MBR_RESERVED + 4 * K, b"bee").unwrap();
        let a = d.resize_partition("a", 10 * K).unwrap();
        assert_eq!(a.size, 14 * K);
        let b = d.locate("b").unwrap();
        assert_eq!(b.start, a.start + a.size);
        assert_eq!(d.device().read_vec(b.start, 3).unwrap(), b"bee");

        assert!(matches!(d.resize_partition("b", 64 * K), Err(FsError::OutOfSpace(_))));
    }

    #[test]
    fn logical_resize_stays_inside_its_gap() {
        let mut d = disk(64 * K, Fit::First);
        d.create_partition(PartitionType::Extended, Fit::First, 16 * K, "e").unwrap();
        d.create_partition(PartitionType::Logical, Fit::First, 2 * K, "l1").unwrap();
        d.create_partition(PartitionType::Logical, Fit::First, 2 * K, "l2").unwrap();
        assert!(matches!(d.resize_partition("l1", K), Err(FsError::OutOfSpace(_))));
        let l2 = d.resize_partition("l2", 4 * K).unwrap();
        assert_eq!(l2.size, 6 * K);
        let l1 = d.resize_partition("l1", -K).unwrap();
        assert_eq!(l1.size, K);
    }

    #[test]
    fn units_and_modes_parse() {
        assert_eq!(Unit::parse("m").unwrap().to_bytes(3).unwrap(), 3 * 1024 * 1024);
        assert_eq!(Unit::parse("K").unwrap().to_bytes(2).unwrap(), 2048);
        assert!(Unit::parse("G").is_none());
        assert_eq!(DeleteMode::parse("FULL"), Some(DeleteMode::Full));
    }
}
