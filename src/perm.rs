//! rwx triples stored as ASCII octal digits in the inode.

use crate::error::{FsError, Result};
use crate::fs_layout::Inode;

pub const ROOT_USER: &str = "root";
/// Scripting user that bypasses permission checks when enabled.
pub const AUTO_USER: &str = "__auto__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn mask(self) -> u8 {
        match self {
            Access::Read => 4,
            Access::Write => 2,
            Access::ReadWrite => 6,
        }
    }
}

/// Who is asking: the symbolic name plus the numeric ids from users.txt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user: String,
    pub uid: i64,
    pub gid: i64,
}

impl Requester {
    pub fn new(user: impl Into<String>, uid: i64, gid: i64) -> Self {
        Self {
            user: user.into(),
            uid,
            gid,
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.user == ROOT_USER || self.user == AUTO_USER
    }

    /// Root, or the owner of `inode`.
    pub fn owns(&self, inode: &Inode) -> bool {
        self.is_superuser() || inode.uid == self.uid
    }
}

fn digit(b: u8) -> u8 {
    b.wrapping_sub(b'0') & 7
}

/// Owner, group or other triple, picked the way `ls -l` would.
pub fn allowed(inode: &Inode, who: &Requester, access: Access) -> bool {
    if who.is_superuser() {
        return true;
    }
    let triple = if inode.uid == who.uid {
        inode.perm[0]
    } else if inode.gid == who.gid {
        inode.perm[1]
    } else {
        inode.perm[2]
    };
    let mask = access.mask();
    digit(triple) & mask == mask
}

pub fn check(inode: &Inode, who: &Requester, access: Access, what: &str) -> Result<()> {
    if allowed(inode, who, access) {
        Ok(())
    } else {
        Err(FsError::denied(format!(
            "{} may not {} '{what}'",
            who.user,
            match access {
                Access::Read => "read",
                Access::Write => "write",
                Access::ReadWrite => "read and write",
            }
        )))
    }
}

/// Parses a `-ugo` argument: exactly three octal digits.
pub fn parse_ugo(raw: &str) -> Result<[u8; 3]> {
    let raw = raw.trim();
    let bytes = raw.as_bytes();
    if bytes.len() != 3 || !bytes.iter().all(|b| (b'0'..=b'7').contains(b)) {
        return Err(FsError::validation(format!(
            "permission '{raw}' must be three octal digits"
        )));
    }
    Ok([bytes[0], bytes[1], bytes[2]])
}

/// `rwxr-x---` rendering of the stored triple.
pub fn mode_string(perm: &[u8; 3]) -> String {
    let mut out = String::with_capacity(9);
    for &b in perm {
        let d = digit(b);
        out.push(if d & 4 != 0 { 'r' } else { '-' });
        out.push(if d & 2 != 0 { 'w' } else { '-' });
        out.push(if d & 1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_layout::INODE_FILE;

    fn file(perm: &str, uid: i64, gid: i64) -> Inode {
        Inode::new(INODE_FILE, perm, uid, gid, 0)
    }

    #[test]
    fn owner_group_other_in_order() {
        let inode = file("640", 2, 3);
        assert!(allowed(&inode, &Requester::new("ana", 2, 9), Access::ReadWrite));
        assert!(allowed(&inode, &Requester::new("bob", 5, 3), Access::Read));
        assert!(!allowed(&inode, &Requester::new("bob", 5, 3), Access::Write));
        assert!(!allowed(&inode, &Requester::new("eve", 5, 4), Access::Read));
    }

    #[test]
    fn owner_triple_wins_even_when_stricter() {
        let inode = file("074", 2, 2);
        assert!(!allowed(&inode, &Requester::new("ana", 2, 2), Access::Read));
    }

    #[test]
    fn superusers_bypass() {
        let inode = file("000", 2, 2);
        assert!(allowed(&inode, &Requester::new("root", 1, 1), Access::ReadWrite));
        assert!(allowed(&inode, &Requester::new(AUTO_USER, 0, 0), Access::Write));
        assert!(matches!(
            check(&inode, &Requester::new("x", 7, 7), Access::Read, "/f"),
            Err(FsError::PermissionDenied(_))
        ));
    }

    #[test]
    fn ugo_parsing_and_rendering() {
        assert_eq!(parse_ugo("755").unwrap(), *b"755");
        assert!(parse_ugo("78").is_err());
        assert!(parse_ugo("778").is_err());
        assert_eq!(mode_string(b"664"), "rw-rw-r--");
        assert_eq!(mode_string(b"750"), "rwxr-x---");
    }
}
