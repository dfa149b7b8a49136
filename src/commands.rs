//! Maps parsed script lines onto [`Engine`] calls and renders their
//! confirmations.

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::path::Path;

use log::{debug, error};

use crate::engine::{Engine, FdiskAction, ReportSource};
use crate::error::{FsError, Result};
use crate::fs_layout::{Fit, PartitionType};
use crate::mkfs::FsKind;
use crate::ops::render_find;
use crate::partition::{DeleteMode, Unit};
use crate::report::{Report, ReportKind};
use crate::script::{parse_line, Invocation};

fn parse_or<T>(inv: &Invocation, key: &str, default: T, parse: fn(&str) -> Option<T>) -> Result<T> {
    match inv.get(key) {
        Some(raw) => parse(raw).ok_or_else(|| FsError::validation(format!("-{key}={raw} is not valid"))),
        None => Ok(default),
    }
}

fn fdisk(engine: &mut Engine, inv: &Invocation) -> Result<String> {
    inv.only(&["size", "unit", "path", "type", "fit", "name", "delete", "add"])?;
    let path = inv.require("path")?;
    let name = inv.require("name")?;
    let unit = parse_or(inv, "unit", Unit::Kilo, Unit::parse)?;

    if let Some(mode) = inv.get("delete") {
        let mode = DeleteMode::parse(mode)
            .ok_or_else(|| FsError::validation(format!("-delete={mode} must be fast or full")))?;
        let gone = engine.fdisk(path, name, FdiskAction::Delete(mode))?;
        return Ok(format!("partition '{}' deleted ({mode:?})", gone.name));
    }
    if let Some(add) = inv.int("add")? {
        let delta = unit.to_bytes(add)?;
        let p = engine.fdisk(path, name, FdiskAction::Resize(delta))?;
        return Ok(format!("partition '{}' is now {} bytes", p.name, p.size));
    }

    let size = inv
        .int("size")?
        .ok_or_else(|| FsError::validation("fdisk needs -size, -delete or -add"))?;
    let action = FdiskAction::Create {
        kind: parse_or(inv, "type", PartitionType::Primary, PartitionType::parse)?,
        fit: parse_or(inv, "fit", Fit::Worst, Fit::parse)?,
        size: unit.to_bytes(size)?,
    };
    let p = engine.fdisk(path, name, action)?;
    Ok(format!(
        "{:?} partition '{}' created at {} ({} bytes)",
        p.kind, p.name, p.start, p.size
    ))
}

fn mounted(engine: &Engine) -> String {
    if engine.mounted().is_empty() {
        return "no mounted partitions".to_string();
    }
    let mut out = String::new();
    for e in engine.mounted() {
        let _ = writeln!(
            out,
            "{:<6} {:<10} {:?} {}",
            e.id,
            e.name,
            e.kind,
            e.path.display()
        );
    }
    out.trim_end().to_string()
}

fn rep(engine: &mut Engine, inv: &Invocation) -> Result<String> {
    inv.only(&["name", "path", "id", "disk", "path_file_ls"])?;
    let raw = inv.require("name")?;
    let kind = ReportKind::parse(raw)
        .ok_or_else(|| FsError::validation(format!("unknown report '{raw}'")))?;
    let output = inv.require("path")?;
    let source = match (inv.get("id"), inv.get("disk")) {
        (Some(id), _) => ReportSource::Mounted(id),
        (None, Some(disk)) => ReportSource::Disk(disk),
        (None, None) => return Err(FsError::validation("rep needs -id or -disk")),
    };
    let report = engine.report_to_file(kind, source, inv.get("path_file_ls"), Path::new(output))?;
    let summary = match &report {
        Report::Inodes(list) => format!(" ({} inodes)", list.len()),
        Report::Blocks(list) => format!(" ({} blocks)", list.len()),
        Report::Journal(list) => format!(" ({} entries)", list.len()),
        _ => String::new(),
    };
    Ok(format!("report {raw} written to {output}{summary}"))
}

fn journaling(engine: &mut Engine, inv: &Invocation) -> Result<String> {
    inv.only(&["id", "repair"])?;
    let id = inv.require("id")?;
    if inv.flag("repair") {
        let outcome = engine.repair_journal(id)?;
        return Ok(format!(
            "journal of {id} repaired: {} entries recovered, backup at {}",
            outcome.recovered,
            outcome.backup.display()
        ));
    }
    Ok(Report::Journal(engine.journal(id)?).to_string().trim_end().to_string())
}

/// Runs one parsed command and returns what it prints.
pub fn execute(engine: &mut Engine, inv: &Invocation) -> Result<String> {
    debug!("executing {inv:?}");
    match inv.command.as_str() {
        "mkdisk" => {
            inv.only(&["size", "unit", "fit", "path"])?;
            let size = inv.int("size")?.ok_or_else(|| FsError::validation("mkdisk needs -size"))?;
            if size <= 0 {
                return Err(FsError::validation("-size must be positive"));
            }
            let unit = parse_or(inv, "unit", Unit::Mega, Unit::parse)?;
            let fit = parse_or(inv, "fit", Fit::First, Fit::parse)?;
            let path = engine.mkdisk(inv.require("path")?, unit.to_bytes(size)?, fit)?;
            Ok(format!("disk {} created", path.display()))
        }
        "rmdisk" => {
            inv.only(&["path"])?;
            let path = engine.rmdisk(inv.require("path")?)?;
            Ok(format!("disk {} removed", path.display()))
        }
        "fdisk" => fdisk(engine, inv),
        "mount" => {
            inv.only(&["path", "name"])?;
            let e = engine.mount(inv.require("path")?, inv.require("name")?)?;
            Ok(format!("partition '{}' mounted as {}", e.name, e.id))
        }
        "unmount" => {
            inv.only(&["id"])?;
            let e = engine.unmount(inv.require("id")?)?;
            Ok(format!("{} unmounted", e.id))
        }
        "mounted" => {
            inv.only(&[])?;
            Ok(mounted(engine))
        }
        "mkfs" => {
            inv.only(&["id", "type", "fs"])?;
            if let Some(t) = inv.get("type").filter(|t| !t.eq_ignore_ascii_case("full")) {
                return Err(FsError::validation(format!("-type={t} must be full")));
            }
            let kind = parse_or(inv, "fs", FsKind::Ext2, FsKind::parse)?;
            let id = inv.require("id")?;
            let sb = engine.mkfs(id, kind)?;
            Ok(format!(
                "{id} formatted as ext{}: {} inodes, {} blocks",
                sb.fs_type, sb.inodes_count, sb.blocks_count
            ))
        }
        "login" => {
            inv.only(&["user", "pass", "id"])?;
            let s = engine.login(inv.require("user")?, inv.require("pass")?, inv.require("id")?)?;
            Ok(format!("welcome {} ({}) on {}", s.user, s.group, s.partition_id))
        }
        "logout" => {
            inv.only(&[])?;
            let s = engine.logout()?;
            Ok(format!("goodbye {}", s.user))
        }
        "mkgrp" => {
            inv.only(&["name"])?;
            let name = inv.require("name")?;
            let gid = engine.mkgrp(name)?;
            Ok(format!("group '{name}' created with gid {gid}"))
        }
        "rmgrp" => {
            inv.only(&["name"])?;
            let name = inv.require("name")?;
            engine.rmgrp(name)?;
            Ok(format!("group '{name}' removed"))
        }
        "mkusr" => {
            inv.only(&["user", "pass", "grp"])?;
            let user = inv.require("user")?;
            let uid = engine.mkusr(user, inv.require("pass")?, inv.require("grp")?)?;
            Ok(format!("user '{user}' created with uid {uid}"))
        }
        "rmusr" => {
            inv.only(&["user"])?;
            let user = inv.require("user")?;
            engine.rmusr(user)?;
            Ok(format!("user '{user}' removed"))
        }
        "chgrp" => {
            inv.only(&["user", "grp"])?;
            let (user, grp) = (inv.require("user")?, inv.require("grp")?);
            engine.chgrp(user, grp)?;
            Ok(format!("user '{user}' moved to group '{grp}'"))
        }
        "mkdir" => {
            inv.only(&["path", "p"])?;
            let path = inv.require("path")?;
            engine.mkdir(path, inv.flag("p"))?;
            Ok(format!("directory {path} created"))
        }
        "mkfile" => {
            inv.only(&["path", "r", "size", "cont"])?;
            let path = inv.require("path")?;
            engine.mkfile(path, inv.flag("r"), inv.int("size")?, inv.get("cont").map(Path::new))?;
            Ok(format!("file {path} created"))
        }
        "edit" => {
            inv.only(&["path", "contenido"])?;
            let path = inv.require("path")?;
            engine.edit(path, Path::new(inv.require("contenido")?))?;
            Ok(format!("file {path} updated"))
        }
        "cat" => {
            let files: Vec<String> = inv.numbered("file").into_iter().map(str::to_string).collect();
            let contents = engine.cat(&files)?;
            Ok(contents
                .iter()
                .map(|(_, c)| String::from_utf8_lossy(c).into_owned())
                .collect::<Vec<_>>()
                .join("\n"))
        }
        "remove" => {
            inv.only(&["path"])?;
            let path = inv.require("path")?;
            let n = engine.remove(path)?;
            Ok(format!("{path} removed ({n} inodes freed)"))
        }
        "rename" => {
            inv.only(&["path", "name"])?;
            let (path, name) = (inv.require("path")?, inv.require("name")?);
            engine.rename(path, name)?;
            Ok(format!("{path} renamed to {name}"))
        }
        "copy" => {
            inv.only(&["path", "destino"])?;
            let (path, dest) = (inv.require("path")?, inv.require("destino")?);
            let out = engine.copy(path, dest)?;
            Ok(format!(
                "{path} copied to {dest}: {} copied, {} skipped",
                out.copied, out.skipped
            ))
        }
        "move" => {
            inv.only(&["path", "destino"])?;
            let (path, dest) = (inv.require("path")?, inv.require("destino")?);
            engine.move_node(path, dest)?;
            Ok(format!("{path} moved to {dest}"))
        }
        "find" => {
            inv.only(&["path", "name"])?;
            let path = inv.require("path")?;
            let found = engine.find(path, inv.require("name")?)?;
            if found.is_empty() {
                return Ok("no matches".to_string());
            }
            Ok(render_find(path, &found).trim_end().to_string())
        }
        "chmod" => {
            inv.only(&["path", "ugo", "r"])?;
            let path = inv.require("path")?;
            let n = engine.chmod(path, inv.require("ugo")?, inv.flag("r"))?;
            Ok(format!("permissions of {path} changed ({n} inodes)"))
        }
        "chown" => {
            inv.only(&["path", "usuario", "r"])?;
            let path = inv.require("path")?;
            let n = engine.chown(path, inv.require("usuario")?, inv.flag("r"))?;
            Ok(format!("owner of {path} changed ({n} inodes)"))
        }
        "rep" => rep(engine, inv),
        "loss" => {
            inv.only(&["id"])?;
            let id = inv.require("id")?;
            engine.loss(id)?;
            Ok(format!("loss simulated on {id}"))
        }
        "recovery" => {
            inv.only(&["id"])?;
            let id = inv.require("id")?;
            engine.recovery(id)?;
            Ok(format!("{id} recovered"))
        }
        "journaling" => journaling(engine, inv),
        other => Err(FsError::validation(format!("unknown command '{other}'"))),
    }
}

/// Parses and runs one line. `None` when the line holds no command.
pub fn run_line(engine: &mut Engine, line: &str) -> Option<Result<String>> {
    match parse_line(line) {
        Ok(Some(inv)) => Some(execute(engine, &inv)),
        Ok(None) => None,
        Err(e) => Some(Err(e)),
    }
}

/// Counters of a script run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStats {
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs every line of `input`, printing each confirmation or `Error: ...`.
/// A failing command does not stop the script.
pub fn run_script<R: BufRead, W: Write>(
    engine: &mut Engine,
    input: R,
    mut out: W,
) -> io::Result<ScriptStats> {
    let mut stats = ScriptStats::default();
    for line in input.lines() {
        let line = line?;
        if line.trim().eq_ignore_ascii_case("exit") {
            break;
        }
        match run_line(engine, &line) {
            None => continue,
            Some(Ok(msg)) => {
                stats.succeeded += 1;
                if !msg.is_empty() {
                    writeln!(out, "{msg}")?;
                }
            }
            Some(Err(e)) => {
                stats.failed += 1;
                error!("{}: {e}", line.trim());
                writeln!(out, "Error: {e}")?;
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn script_reports_errors_and_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::new(EngineConfig::in_dir(dir.path())).unwrap();
        let disk = dir.path().join("a.mia");
        let script = format!(
            "# setup\nmkdisk -size=1 -path={d}\nbogus -x=1\nfdisk -size=300 -name=p -path={d}\nmounted\n",
            d = disk.display()
        );
        let mut out = Vec::new();
        let stats = run_script(&mut engine, script.as_bytes(), &mut out).unwrap();
        assert_eq!(stats, ScriptStats { succeeded: 3, failed: 1 });
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Error: invalid argument: unknown command 'bogus'"));
        assert!(text.contains("no mounted partitions"));
    }

    #[test]
    fn fdisk_defaults_to_kilobytes_and_worst_fit() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::new(EngineConfig::in_dir(dir.path())).unwrap();
        let disk = dir.path().join("b").display().to_string();
        run_line(&mut engine, &format!("mkdisk -size=1 -path={disk}")).unwrap().unwrap();
        let msg = run_line(&mut engine, &format!("fdisk -size=64 -name=p1 -path={disk}"))
            .unwrap()
            .unwrap();
        assert!(msg.contains("(65536 bytes)"), "{msg}");
        let err = run_line(&mut engine, &format!("fdisk -name=p1 -add=0 -path={disk}")).unwrap();
        assert!(err.is_err());
        assert!(run_line(&mut engine, "mkdisk -size=1 -unit=G -path=/nowhere").unwrap().is_err());
    }
}
