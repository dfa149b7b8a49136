/// Engine configuration loader.
/// Reads an optional INI file shared by every binary. Missing sections or keys
/// fall back to the defaults of `EngineConfig::default()`.
///
/// ```ini
/// [mount]
/// carnet = 53
/// [session]
/// path = /tmp/extreamfs_session.json
/// allow_auto = false
/// [registry]
/// path = /tmp/extreamfs_disk_registry.json
/// [journal]
/// backup_dir = /tmp
/// ```

use std::path::{Path, PathBuf};

use configparser::ini::Ini;

use crate::error::{FsError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Two digit prefix of every mount id.
    pub carnet: String,

    pub session_path: PathBuf,

    /// Lets commands run without `login` as the `__auto__` superuser.
    pub allow_auto: bool,

    pub registry_path: PathBuf,

    /// Where `repair_journal` drops its backups.
    pub backup_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let tmp = PathBuf::from("/tmp");
        Self {
            carnet: "53".to_string(),
            session_path: tmp.join("extreamfs_session.json"),
            allow_auto: false,
            registry_path: std::env::temp_dir().join("extreamfs_disk_registry.json"),
            backup_dir: tmp,
        }
    }
}

impl EngineConfig {
    /// Every sidecar inside `dir`; used by tests and throwaway runs.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            session_path: dir.join("extreamfs_session.json"),
            registry_path: dir.join("extreamfs_disk_registry.json"),
            backup_dir: dir.to_path_buf(),
            ..Self::default()
        }
    }
}

fn check_carnet(carnet: &str) -> Result<()> {
    if carnet.len() == 2 && carnet.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(FsError::validation(format!(
            "mount.carnet '{carnet}' must be two digits"
        )))
    }
}

/// Parses the INI text. Separate from `load_config` so it can be tested
/// without touching the filesystem.
pub fn parse_config(text: &str) -> Result<EngineConfig> {
    let mut ini = Ini::new();
    ini.read(text.to_string())
        .map_err(|e| FsError::validation(format!("config: {e}")))?;

    let mut cfg = EngineConfig::default();

    // [mount]
    if let Some(carnet) = ini.get("mount", "carnet") {
        check_carnet(&carnet)?;
        cfg.carnet = carnet;
    }

    // [session]
    if let Some(path) = ini.get("session", "path") {
        cfg.session_path = PathBuf::from(path);
    }
    if let Some(allow) = ini
        .getbool("session", "allow_auto")
        .map_err(|e| FsError::validation(format!("session.allow_auto: {e}")))?
    {
        cfg.allow_auto = allow;
    }

    // [registry]
    if let Some(path) = ini.get("registry", "path") {
        cfg.registry_path = PathBuf::from(path);
    }

    // [journal]
    if let Some(dir) = ini.get("journal", "backup_dir") {
        cfg.backup_dir = PathBuf::from(dir);
    }

    Ok(cfg)
}

/// Loads `path`, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => parse_config(&std::fs::read_to_string(path)?),
        None => Ok(EngineConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_keep_defaults() {
        let cfg = parse_config("[mount]\ncarnet = 71\n").unwrap();
        assert_eq!(cfg.carnet, "71");
        assert!(!cfg.allow_auto);
        assert_eq!(cfg.backup_dir, PathBuf::from("/tmp"));
    }

    #[test]
    fn every_section_is_read() {
        let cfg = parse_config(
            "[session]\npath=/x/s.json\nallow_auto=true\n[registry]\npath=/x/r.json\n[journal]\nbackup_dir=/x/b\n",
        )
        .unwrap();
        assert!(cfg.allow_auto);
        assert_eq!(cfg.session_path, PathBuf::from("/x/s.json"));
        assert_eq!(cfg.registry_path, PathBuf::from("/x/r.json"));
        assert_eq!(cfg.backup_dir, PathBuf::from("/x/b"));
    }

    #[test]
    fn carnet_must_be_two_digits() {
        assert!(parse_config("[mount]\ncarnet=5\n").is_err());
        assert!(parse_config("[mount]\ncarnet=ab\n").is_err());
        assert!(parse_config("[session]\nallow_auto=maybe\n").is_err());
    }

    #[test]
    fn no_file_means_defaults() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }
}
