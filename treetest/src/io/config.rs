//! Framework configuration, optionally stored as TOML.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Run configuration.
///
/// Missing fields default to sensible values so an empty file (or no file
/// at all) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Overwrite mismatching snapshots instead of failing.
    pub update_snapshots: bool,

    /// Directory holding one `.snap` document per top-level suite.
    pub snapshot_dir: PathBuf,

    /// Root used to render source locations as relative paths.
    pub project_dir: PathBuf,

    /// Upper bound on calls a single mock records.
    pub max_num_mock_calls: usize,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            update_snapshots: false,
            snapshot_dir: PathBuf::from("snapshots"),
            project_dir: std::env::current_dir().unwrap_or_default(),
            max_num_mock_calls: 10_000,
        }
    }
}

impl FrameworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_dir.as_os_str().is_empty() {
            return Err(anyhow!("snapshot_dir must not be empty"));
        }
        if self.max_num_mock_calls == 0 {
            return Err(anyhow!("max_num_mock_calls must be > 0"));
        }
        Ok(())
    }

    /// Snapshot directory, resolved against `project_dir` when relative.
    pub fn resolved_snapshot_dir(&self) -> PathBuf {
        if self.snapshot_dir.is_absolute() {
            self.snapshot_dir.clone()
        } else {
            self.project_dir.join(&self.snapshot_dir)
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `FrameworkConfig::default()`.
pub fn load_config(path: &Path) -> Result<FrameworkConfig> {
    if !path.exists() {
        let cfg = FrameworkConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: FrameworkConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &FrameworkConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
