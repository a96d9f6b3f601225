//! Persistence configuration stored as TOML.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use super::atomic::write_atomic;

/// Where and how saves are written.
///
/// Missing fields take their defaults, so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Root directory holding one subdirectory per slot.
    pub save_dir: PathBuf,

    /// File name of the save inside each slot directory.
    pub file_name: String,

    /// Pretty-print saved JSON.
    pub pretty_json: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("SaveData"),
            file_name: "save.json".to_string(),
            pretty_json: true,
        }
    }
}

impl PersistenceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.save_dir.as_os_str().is_empty() {
            return Err(anyhow!("save_dir must be non-empty"));
        }
        let name = self.file_name.trim();
        if name.is_empty() {
            return Err(anyhow!("file_name must be non-empty"));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(anyhow!("file_name must be a plain file name"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PersistenceConfig::default()`.
pub fn load_config(path: &Path) -> Result<PersistenceConfig> {
    if !path.exists() {
        let cfg = PersistenceConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PersistenceConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PersistenceConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PersistenceConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("persistence.toml");
        let cfg = PersistenceConfig {
            save_dir: temp.path().join("saves"),
            file_name: "slot.json".to_string(),
            pretty_json: false,
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("persistence.toml");
        fs::write(&path, "pretty_json = false\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(!cfg.pretty_json);
        assert_eq!(cfg.file_name, "save.json");
    }

    #[test]
    fn nested_file_name_is_invalid() {
        let cfg = PersistenceConfig {
            file_name: "../escape.json".to_string(),
            ..PersistenceConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
