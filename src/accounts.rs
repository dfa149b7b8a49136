//! The `users.txt` registry at inode 1.
//!
//! One comma separated record per line:
//!
//! ```text
//! gid,G,group
//! uid,U,group,user,password
//! ```
//!
//! Removal tombstones a record by setting its id to 0; the line stays.
//! Lines that parse as neither form are kept verbatim.

use log::debug;

use crate::device::BlockDevice;
use crate::error::{FsError, Result};
use crate::fs_layout::USERS_INODE;
use crate::perm::ROOT_USER;
use crate::volume::Volume;

/// Longest user name, group name or password accepted.
pub const MAX_FIELD_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub gid: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub uid: i64,
    /// Group name, or a GID written as decimal.
    pub group: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Group(GroupRecord),
    User(UserRecord),
    Other(String),
}

/// A successful login: who, and which group they act as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user: String,
    pub group: String,
    pub uid: i64,
    pub gid: i64,
}

impl Account {
    pub fn is_root(&self) -> bool {
        self.uid == 1 && self.user == ROOT_USER
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersFile {
    lines: Vec<Line>,
}

fn parse_line(raw: &str) -> Line {
    let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
    let Ok(id) = fields[0].parse::<i64>() else {
        return Line::Other(raw.to_string());
    };
    match (fields.get(1).copied(), fields.len()) {
        (Some("G"), 3) => Line::Group(GroupRecord {
            gid: id,
            name: fields[2].to_string(),
        }),
        (Some("U"), 5) => Line::User(UserRecord {
            uid: id,
            group: fields[2].to_string(),
            name: fields[3].to_string(),
            password: fields[4].to_string(),
        }),
        _ => Line::Other(raw.to_string()),
    }
}

/// Rejects empty values, values over ten bytes and anything that would
/// break the record format.
pub fn check_field(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(FsError::validation(format!("{what} can not be empty")));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(FsError::validation(format!(
            "{what} '{value}' is longer than {MAX_FIELD_LEN} bytes"
        )));
    }
    if value.contains([',', '\n', '\r']) {
        return Err(FsError::validation(format!("{what} '{value}' contains a separator")));
    }
    Ok(())
}

impl UsersFile {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(parse_line)
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Group(g) => out.push_str(&format!("{},G,{}", g.gid, g.name)),
                Line::User(u) => out.push_str(&format!(
                    "{},U,{},{},{}",
                    u.uid, u.group, u.name, u.password
                )),
                Line::Other(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupRecord> {
        self.lines.iter().filter_map(|l| match l {
            Line::Group(g) if g.gid != 0 => Some(g),
            _ => None,
        })
    }

    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.lines.iter().filter_map(|l| match l {
            Line::User(u) if u.uid != 0 => Some(u),
            _ => None,
        })
    }

    pub fn find_group(&self, name: &str) -> Option<&GroupRecord> {
        self.groups().find(|g| g.name == name)
    }

    pub fn find_user(&self, name: &str) -> Option<&UserRecord> {
        self.users().find(|u| u.name == name)
    }

    /// Resolves a user's group field, which may hold a GID or a name.
    pub fn resolve_group(&self, reference: &str) -> Option<&GroupRecord> {
        if let Ok(gid) = reference.parse::<i64>() {
            if let Some(g) = self.groups().find(|g| g.gid == gid) {
                return Some(g);
            }
        }
        self.find_group(reference)
    }

    pub fn user_name(&self, uid: i64) -> Option<&str> {
        self.users().find(|u| u.uid == uid).map(|u| u.name.as_str())
    }

    pub fn group_name(&self, gid: i64) -> Option<&str> {
        self.groups().find(|g| g.gid == gid).map(|g| g.name.as_str())
    }

    fn next_group_id(&self) -> i64 {
        self.groups().map(|g| g.gid).max().unwrap_or(0) + 1
    }

    fn next_user_id(&self) -> i64 {
        self.users().map(|u| u.uid).max().unwrap_or(0) + 1
    }

    pub fn add_group(&mut self, name: &str) -> Result<i64> {
        check_field("group name", name)?;
        if self.find_group(name).is_some() {
            return Err(FsError::conflict(format!("group '{name}'")));
        }
        let gid = self.next_group_id();
        self.lines.push(Line::Group(GroupRecord {
            gid,
            name: name.to_string(),
        }));
        Ok(gid)
    }

    pub fn remove_group(&mut self, name: &str) -> Result<()> {
        if name == ROOT_USER {
            return Err(FsError::denied("the root group can not be removed"));
        }
        let record = self
            .lines
            .iter_mut()
            .find_map(|l| match l {
                Line::Group(g) if g.gid != 0 && g.name == name => Some(g),
                _ => None,
            })
            .ok_or_else(|| FsError::not_found(format!("group '{name}'")))?;
        record.gid = 0;
        Ok(())
    }

    pub fn add_user(&mut self, name: &str, password: &str, group: &str) -> Result<i64> {
        check_field("user name", name)?;
        check_field("password", password)?;
        check_field("group name", group)?;
        if self.find_user(name).is_some() {
            return Err(FsError::conflict(format!("user '{name}'")));
        }
        let group = self
            .resolve_group(group)
            .ok_or_else(|| FsError::not_found(format!("group '{group}'")))?
            .name
            .clone();
        let uid = self.next_user_id();
        self.lines.push(Line::User(UserRecord {
            uid,
            group,
            name: name.to_string(),
            password: password.to_string(),
        }));
        Ok(uid)
    }

    fn user_mut(&mut self, name: &str) -> Result<&mut UserRecord> {
        self.lines
            .iter_mut()
            .find_map(|l| match l {
                Line::User(u) if u.uid != 0 && u.name == name => Some(u),
                _ => None,
            })
            .ok_or_else(|| FsError::not_found(format!("user '{name}'")))
    }

    pub fn remove_user(&mut self, name: &str) -> Result<()> {
        if name == ROOT_USER {
            return Err(FsError::denied("the root user can not be removed"));
        }
        self.user_mut(name)?.uid = 0;
        Ok(())
    }

    pub fn change_group(&mut self, user: &str, group: &str) -> Result<()> {
        let target = self
            .resolve_group(group)
            .ok_or_else(|| FsError::not_found(format!("group '{group}'")))?
            .clone();
        let current = {
            let record = self
                .find_user(user)
                .ok_or_else(|| FsError::not_found(format!("user '{user}'")))?;
            self.resolve_group(&record.group).map(|g| g.gid)
        };
        if current == Some(target.gid) {
            return Err(FsError::conflict(format!(
                "user '{user}' already belongs to '{}'",
                target.name
            )));
        }
        self.user_mut(user)?.group = target.name;
        Ok(())
    }

    /// Matches an active user by name and password and resolves its group.
    pub fn authenticate(&self, user: &str, password: &str) -> Result<Account> {
        let record = self
            .users()
            .find(|u| u.name == user && u.password == password)
            .ok_or_else(|| FsError::denied(format!("unknown user '{user}' or wrong password")))?;
        let group = self
            .resolve_group(&record.group)
            .ok_or_else(|| FsError::not_found(format!("group '{}' of '{user}'", record.group)))?;
        Ok(Account {
            user: record.name.clone(),
            group: group.name.clone(),
            uid: record.uid,
            gid: group.gid,
        })
    }
}

impl<D: BlockDevice> Volume<D> {
    pub fn load_users(&mut self) -> Result<UsersFile> {
        let inode = self.read_inode(USERS_INODE)?;
        let bytes = self.read_content(&inode)?;
        Ok(UsersFile::parse(&String::from_utf8_lossy(&bytes)))
    }

    pub fn store_users(&mut self, users: &UsersFile) -> Result<()> {
        let text = users.render();
        let mut inode = self.read_inode(USERS_INODE)?;
        self.write_content(USERS_INODE, &mut inode, text.as_bytes())?;
        debug!("users.txt rewritten ({} bytes)", text.len());
        Ok(())
    }
}
