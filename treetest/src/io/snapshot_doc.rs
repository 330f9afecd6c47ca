//! Snapshot document text format.
//!
//! One document per top-level describe, stored as
//! `<snapshot_dir>/<normalized name>.snap`:
//!
//! ```text
//! # treetest snapshot v1
//! adds-3f2a9c0d1e4b5a67 1 "first line\nsecond line"
//! adds-3f2a9c0d1e4b5a67 2 "{\"x\": 1}"
//! ```
//!
//! Each entry occupies exactly one line: identity, sequence number, and the
//! value as a JSON string. Entries are written sorted by key so rewrites are stable.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};

pub const HEADER: &str = "# treetest snapshot v1";
pub const EXTENSION: &str = "snap";

/// Address of one snapshot within a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotKey {
    pub identity: String,
    /// 1-based position of the snapshot assertion within its test.
    pub seq: u32,
}

impl SnapshotKey {
    pub fn new(identity: &str, seq: u32) -> Self {
        Self {
            identity: identity.to_string(),
            seq,
        }
    }
}

/// Map a describe name to a file stem.
pub fn normalize_name(name: &str) -> String {
    let normalized: String = name
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if normalized.is_empty() {
        "_".to_string()
    } else {
        normalized
    }
}

/// Parse document contents into entries.
pub fn parse_document(contents: &str) -> Result<BTreeMap<SnapshotKey, String>> {
    let mut entries = BTreeMap::new();
    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(3, ' ');
        let identity = parts.next().unwrap_or_default();
        let seq = parts
            .next()
            .ok_or_else(|| anyhow!("line {line_no}: missing sequence number"))?;
        let seq: u32 = seq
            .parse()
            .with_context(|| format!("line {line_no}: invalid sequence number '{seq}'"))?;
        let value = parts
            .next()
            .ok_or_else(|| anyhow!("line {line_no}: missing value"))?;
        let value: String = serde_json::from_str(value)
            .with_context(|| format!("line {line_no}: invalid value"))?;
        if entries
            .insert(SnapshotKey::new(identity, seq), value)
            .is_some()
        {
            bail!("line {line_no}: duplicate entry '{identity} {seq}'");
        }
    }
    Ok(entries)
}

pub fn render_document<'a>(
    entries: impl IntoIterator<Item = (&'a SnapshotKey, &'a str)>,
) -> Result<String> {
    let mut buf = String::from(HEADER);
    buf.push('\n');
    for (key, value) in entries {
        let encoded = serde_json::to_string(value).context("serialize snapshot value")?;
        buf.push_str(&format!("{} {} {encoded}\n", key.identity, key.seq));
    }
    Ok(buf)
}

pub fn load_document(path: &Path) -> Result<BTreeMap<SnapshotKey, String>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read snapshot {}", path.display()))?;
    parse_document(&contents).with_context(|| format!("parse snapshot {}", path.display()))
}

/// Atomically write a document (temp file + rename).
pub fn write_document(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("snapshot path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("snap.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp snapshot {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace snapshot {}", path.display()))?;
    Ok(())
}
