//! Stack capture and source location resolution.
//!
//! Failure records carry the caller location of the failing assertion (via
//! `#[track_caller]`) plus a short, truncated stack. Symbol formatting is left
//! to `std::backtrace`; this module only trims and relativizes.

use std::backtrace::Backtrace;
use std::panic::Location;
use std::path::{Path, PathBuf};

use crate::core::types::SourceLocation;

/// Frames kept in a failure record.
pub const STACK_DEPTH: usize = 3;

/// Frame prefixes that belong to the runtime or to this crate's own
/// machinery rather than to the code under test.
const INTERNAL_FRAME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "treetest::",
    "__rust",
    "rust_begin_unwind",
];

/// Resolves source locations and captures call stacks for failure records.
pub trait StackResolver {
    fn resolve(&self, file: &str, line: u32, column: u32) -> SourceLocation;

    fn resolve_caller(&self, location: &Location<'_>) -> SourceLocation {
        self.resolve(location.file(), location.line(), location.column())
    }

    /// Frames of `backtrace` that belong to user code, at most `depth`.
    fn frames(&self, backtrace: &Backtrace, depth: usize) -> Vec<String> {
        user_frames(&backtrace.to_string(), depth)
    }

    /// Capture the current stack, keeping at most `depth` frames.
    fn capture(&self, depth: usize) -> Vec<String> {
        self.frames(&Backtrace::force_capture(), depth)
    }
}

/// Resolver backed by `std::backtrace`.
#[derive(Debug, Clone)]
pub struct BacktraceResolver {
    project_dir: PathBuf,
}

impl BacktraceResolver {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
        }
    }
}

impl StackResolver for BacktraceResolver {
    fn resolve(&self, file: &str, line: u32, column: u32) -> SourceLocation {
        SourceLocation {
            file: relativize(&self.project_dir, file),
            line,
            column,
        }
    }
}

/// Render `file` relative to `project_dir` when it lives underneath it.
pub fn relativize(project_dir: &Path, file: &str) -> String {
    let path = Path::new(file);
    match path.strip_prefix(project_dir) {
        Ok(relative) if !project_dir.as_os_str().is_empty() => relative.display().to_string(),
        _ => file.to_string(),
    }
}

/// Extract symbol names from a rendered backtrace, skipping internal frames.
fn user_frames(rendered: &str, depth: usize) -> Vec<String> {
    rendered
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let (index, symbol) = trimmed.split_once(": ")?;
            if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            Some(symbol.trim().to_string())
        })
        .filter(|symbol| !is_internal(symbol))
        .take(depth)
        .collect()
}

/// Trait impl frames render as `<Type as Trait>::method`; the owning path is
/// the one inside the angle brackets.
fn is_internal(symbol: &str) -> bool {
    let path = symbol.trim_start_matches(['<', '&']);
    let path = path.strip_prefix("mut ").unwrap_or(path);
    INTERNAL_FRAME_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}
