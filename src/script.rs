//! Command-line syntax of the shell: `command -key=value -flag ...`.
//!
//! Values may be double-quoted to hold spaces. `#` starts a comment unless
//! it sits inside quotes. Keys are case-insensitive.

use std::collections::BTreeMap;

use crate::error::{FsError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    args: BTreeMap<String, String>,
}

/// Splits on whitespace outside quotes and drops the comment tail.
fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            '#' if !quoted => break,
            c if c.is_whitespace() && !quoted => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if quoted {
        return Err(FsError::validation("unterminated quote"));
    }
    if started {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Lines made only of dashes and underscores are separators in scripts.
fn is_separator(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c == '-' || c == '_' || c.is_whitespace())
}

/// `None` for blank lines, comments and separators.
pub fn parse_line(line: &str) -> Result<Option<Invocation>> {
    if is_separator(line) {
        return Ok(None);
    }
    let mut tokens = tokenize(line)?.into_iter();
    let Some(command) = tokens.next() else {
        return Ok(None);
    };

    let mut args = BTreeMap::new();
    for token in tokens {
        let Some(body) = token.strip_prefix('-') else {
            return Err(FsError::validation(format!(
                "unexpected argument '{token}', parameters look like -key=value"
            )));
        };
        let (key, value) = match body.split_once('=') {
            Some((k, v)) => (k, v),
            None => (body, ""),
        };
        if key.is_empty() {
            return Err(FsError::validation(format!("parameter '{token}' has no name")));
        }
        args.insert(key.to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(Some(Invocation {
        command: command.to_ascii_lowercase(),
        args,
    }))
}

impl Invocation {
    /// A non-empty value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| FsError::validation(format!("{} needs -{key}", self.command)))
    }

    /// Present with or without a value.
    pub fn flag(&self, key: &str) -> bool {
        self.args.contains_key(key)
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>> {
        self.get(key)
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| FsError::validation(format!("-{key}={v} is not an integer")))
            })
            .transpose()
    }

    /// Values of `prefix1`, `prefix2`, ... ordered by their number.
    pub fn numbered(&self, prefix: &str) -> Vec<&str> {
        let mut found: Vec<(u32, &str)> = self
            .args
            .iter()
            .filter_map(|(k, v)| {
                let n = k.strip_prefix(prefix)?.parse::<u32>().ok()?;
                Some((n, v.as_str())).filter(|(_, v)| !v.is_empty())
            })
            .collect();
        found.sort_unstable_by_key(|(n, _)| *n);
        found.into_iter().map(|(_, v)| v).collect()
    }

    /// Fails on parameters the command does not take.
    pub fn only(&self, allowed: &[&str]) -> Result<()> {
        match self.args.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(k) => Err(FsError::validation(format!(
                "{} does not take -{k}",
                self.command
            ))),
            None => Ok(()),
        }
    }
}
