//! Per-run snapshot store with usage tracking and end-of-run pruning.
//!
//! The store is loaded once when a run starts, mutated as tests execute, and
//! finalized exactly once when the run ends. Finalizing deletes every persisted
//! entry that was neither read, written nor protected by `mark_checked` during
//! the run, then rewrites the documents that changed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::aggregate::SnapshotSummary;
use crate::io::snapshot_doc::{
    EXTENSION, SnapshotKey, load_document, normalize_name, render_document, write_document,
};

/// Result of `compare_or_update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// No prior value; the candidate was stored.
    Added,
    /// Update mode replaced a different stored value.
    Updated,
    /// Stored value equals the candidate.
    Matched,
    /// Compare mode found a different stored value.
    Mismatch { stored: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryChange {
    Unchanged,
    Added,
    Updated,
}

#[derive(Debug)]
struct Entry {
    value: String,
    used: bool,
    change: EntryChange,
}

#[derive(Debug)]
struct Document {
    path: PathBuf,
    on_disk: bool,
    entries: BTreeMap<SnapshotKey, Entry>,
}

impl Document {
    fn empty(path: PathBuf) -> Self {
        Self {
            path,
            on_disk: false,
            entries: BTreeMap::new(),
        }
    }
}

/// Snapshot documents for one run, keyed by normalized describe name.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    update_mode: bool,
    documents: BTreeMap<String, Document>,
}

impl SnapshotStore {
    /// Load every `*.snap` document under `dir`. A missing directory yields an
    /// empty store.
    #[instrument(skip_all, fields(dir = %dir.display(), update_mode = update_mode))]
    pub fn load(dir: &Path, update_mode: bool) -> Result<Self> {
        let mut documents = BTreeMap::new();
        if dir.is_dir() {
            let listing = fs::read_dir(dir)
                .with_context(|| format!("list snapshot dir {}", dir.display()))?;
            for item in listing {
                let item = item.with_context(|| format!("list snapshot dir {}", dir.display()))?;
                let path = item.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                let name = name.to_string();
                let entries = load_document(&path)?
                    .into_iter()
                    .map(|(key, value)| {
                        let entry = Entry {
                            value,
                            used: false,
                            change: EntryChange::Unchanged,
                        };
                        (key, entry)
                    })
                    .collect();
                debug!(document = %name, "loaded snapshot document");
                documents.insert(
                    name,
                    Document {
                        path,
                        on_disk: true,
                        entries,
                    },
                );
            }
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            update_mode,
            documents,
        })
    }

    pub fn update_mode(&self) -> bool {
        self.update_mode
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_mut(&mut self, describe: &str) -> &mut Document {
        let name = normalize_name(describe);
        let path = self.dir.join(format!("{name}.{EXTENSION}"));
        self.documents
            .entry(name)
            .or_insert_with(|| Document::empty(path))
    }

    /// Stored value for `key`, marking it used.
    pub fn read(&mut self, describe: &str, key: &SnapshotKey) -> Option<String> {
        let entry = self.document_mut(describe).entries.get_mut(key)?;
        entry.used = true;
        Some(entry.value.clone())
    }

    /// Store `candidate` when absent (or in update mode), otherwise compare.
    /// The key is marked used either way.
    pub fn compare_or_update(
        &mut self,
        describe: &str,
        key: &SnapshotKey,
        candidate: &str,
    ) -> Comparison {
        let update_mode = self.update_mode;
        let document = self.document_mut(describe);
        let Some(entry) = document.entries.get_mut(key) else {
            debug!(identity = %key.identity, seq = key.seq, "snapshot added");
            document.entries.insert(
                key.clone(),
                Entry {
                    value: candidate.to_string(),
                    used: true,
                    change: EntryChange::Added,
                },
            );
            return Comparison::Added;
        };
        entry.used = true;
        if entry.value == candidate {
            return Comparison::Matched;
        }
        if !update_mode {
            return Comparison::Mismatch {
                stored: entry.value.clone(),
            };
        }
        debug!(identity = %key.identity, seq = key.seq, "snapshot updated");
        entry.value = candidate.to_string();
        if entry.change == EntryChange::Unchanged {
            entry.change = EntryChange::Updated;
        }
        Comparison::Updated
    }

    /// Protect every known entry of a test from pruning.
    pub fn mark_checked(&mut self, describe: &str, identity: &str) {
        let document = self.document_mut(describe);
        let mut marked = 0usize;
        for (key, entry) in &mut document.entries {
            if key.identity == identity {
                entry.used = true;
                marked += 1;
            }
        }
        if marked > 0 {
            debug!(identity, marked, "snapshot entries marked checked");
        }
    }

    /// Prune unused entries and persist changed documents.
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn finalize(self) -> Result<SnapshotSummary> {
        let mut summary = SnapshotSummary::default();
        for (name, mut document) in self.documents {
            let before = document.entries.len();
            document.entries.retain(|_, entry| entry.used);
            let removed = before - document.entries.len();
            let added = count_changes(&document, EntryChange::Added);
            let updated = count_changes(&document, EntryChange::Updated);

            summary.added += added;
            summary.updated += updated;
            summary.removed += removed;
            summary.total += document.entries.len();

            if added + updated + removed == 0 {
                continue;
            }
            if document.entries.is_empty() {
                if document.on_disk {
                    fs::remove_file(&document.path).with_context(|| {
                        format!("remove snapshot {}", document.path.display())
                    })?;
                    debug!(document = %name, "removed empty snapshot document");
                }
                continue;
            }
            let contents = render_document(
                document
                    .entries
                    .iter()
                    .map(|(key, entry)| (key, entry.value.as_str())),
            )
            .with_context(|| format!("render snapshot {}", document.path.display()))?;
            write_document(&document.path, &contents)?;
            debug!(document = %name, added, updated, removed, "wrote snapshot document");
        }
        info!(
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            total = summary.total,
            "snapshots finalized"
        );
        Ok(summary)
    }
}

fn count_changes(document: &Document, change: EntryChange) -> usize {
    document
        .entries
        .values()
        .filter(|entry| entry.change == change)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::snapshot_doc::HEADER;

    fn seed(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(format!("{name}.snap"));
        let mut contents = format!("{HEADER}\n");
        for line in lines {
            contents.push_str(line);
            contents.push('\n');
        }
        fs::write(&path, contents).expect("seed snapshot");
        path
    }

    #[test]
    fn missing_dir_loads_empty_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::load(&temp.path().join("absent"), false).expect("load");
        let summary = store.finalize().expect("finalize");
        assert_eq!(summary, SnapshotSummary::default());
        assert!(!temp.path().join("absent").exists());
    }

    #[test]
    fn added_entry_is_written_on_finalize() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = SnapshotStore::load(temp.path(), false).expect("load");
        let key = SnapshotKey::new("t-1", 1);
        assert_eq!(store.compare_or_update("Math", &key, "a\nb"), Comparison::Added);
        let summary = store.finalize().expect("finalize");
        assert_eq!(summary.added, 1);
        assert_eq!(summary.total, 1);

        let contents = fs::read_to_string(temp.path().join("math.snap")).expect("read");
        assert!(contents.contains(r#"t-1 1 "a\nb""#));
    }

    #[test]
    fn matching_compare_leaves_file_untouched() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = seed(temp.path(), "math", &[r#"t-1 1 "value""#]);
        let before = fs::read_to_string(&path).expect("read");

        let mut store = SnapshotStore::load(temp.path(), false).expect("load");
        let comparison = store.compare_or_update("math", &SnapshotKey::new("t-1", 1), "value");
        assert_eq!(comparison, Comparison::Matched);
        let summary = store.finalize().expect("finalize");

        assert_eq!(summary, SnapshotSummary { total: 1, ..SnapshotSummary::default() });
        assert_eq!(fs::read_to_string(&path).expect("read"), before);
    }

    #[test]
    fn mismatch_reports_stored_value_without_writing() {
        let temp = tempfile::tempdir().expect("tempdir");
        seed(temp.path(), "math", &[r#"t-1 1 "old""#]);
        let mut store = SnapshotStore::load(temp.path(), false).expect("load");
        let comparison = store.compare_or_update("math", &SnapshotKey::new("t-1", 1), "new");
        assert_eq!(
            comparison,
            Comparison::Mismatch {
                stored: "old".to_string()
            }
        );
        assert_eq!(store.read("math", &SnapshotKey::new("t-1", 1)).as_deref(), Some("old"));
        let summary = store.finalize().expect("finalize");
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.removed, 0);
    }

    #[test]
    fn update_mode_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = seed(temp.path(), "math", &[r#"t-1 1 "old""#]);
        let mut store = SnapshotStore::load(temp.path(), true).expect("load");
        assert!(store.update_mode());
        let comparison = store.compare_or_update("math", &SnapshotKey::new("t-1", 1), "new");
        assert_eq!(comparison, Comparison::Updated);
        let summary = store.finalize().expect("finalize");
        assert_eq!(summary.updated, 1);
        assert!(fs::read_to_string(&path).expect("read").contains(r#"t-1 1 "new""#));
    }

    #[test]
    fn unused_entries_are_pruned_and_checked_entries_kept() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = seed(
            temp.path(),
            "math",
            &[
                r#"kept-1 1 "a""#,
                r#"kept-1 2 "b""#,
                r#"gone-2 1 "c""#,
                r#"read-3 1 "d""#,
            ],
        );
        let mut store = SnapshotStore::load(temp.path(), false).expect("load");
        store.mark_checked("math", "kept-1");
        assert_eq!(store.read("math", &SnapshotKey::new("read-3", 1)).as_deref(), Some("d"));
        let summary = store.finalize().expect("finalize");

        assert_eq!(summary.removed, 1);
        assert_eq!(summary.total, 3);
        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.contains(r#"kept-1 2 "b""#));
        assert!(!contents.contains("gone-2"));
    }

    #[test]
    fn fully_pruned_document_is_deleted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = seed(temp.path(), "old_suite", &[r#"x-1 1 "a""#]);
        let store = SnapshotStore::load(temp.path(), false).expect("load");
        let summary = store.finalize().expect("finalize");
        assert_eq!(summary.removed, 1);
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_document_fails_load() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("bad.snap"), "id-1 nope \"value\"\n").expect("write");
        let err = SnapshotStore::load(temp.path(), false).expect_err("corrupt");
        assert!(format!("{err:#}").contains("bad.snap"));
    }
}
