//! Test-only helpers: a deterministic clock, a recording reporter, and a
//! throwaway project directory.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use crate::clock::Clock;
use crate::core::aggregate::{AggregatedResult, SuiteSummary};
use crate::core::types::DescribeResult;
use crate::framework::Framework;
use crate::io::config::FrameworkConfig;
use crate::io::snapshot_doc::{EXTENSION, normalize_name};
use crate::reporter::Reporter;

/// Clock that advances by a fixed step on every reading.
#[derive(Debug)]
pub struct ManualClock {
    current: Cell<DateTime<Utc>>,
    step: Cell<Duration>,
}

impl ManualClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            current: Cell::new(start),
            step: Cell::new(Duration::milliseconds(1)),
        }
    }

    pub fn set_step(&self, step: Duration) {
        self.step.set(step);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        Self::starting_at(start)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let now = self.current.get();
        self.current.set(now + self.step.get());
        now
    }
}

/// One reporter notification, as recorded by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterEvent {
    RunStart(Vec<String>),
    SuiteStart(String),
    SuiteResult {
        suite: String,
        summary: SuiteSummary,
        /// Total tests in the running aggregate when the suite finished.
        tests_so_far: usize,
        /// Titles of every test in the suite, own tests before nested ones.
        tests: Vec<String>,
    },
    RunComplete(AggregatedResult),
}

/// Reporter that records every event. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Rc<RefCell<Vec<ReporterEvent>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<ReporterEvent> {
        self.events.borrow().clone()
    }
}

impl Reporter for RecordingReporter {
    fn run_start(&mut self, suites: &[String]) {
        self.events
            .borrow_mut()
            .push(ReporterEvent::RunStart(suites.to_vec()));
    }

    fn suite_start(&mut self, suite: &str) {
        self.events
            .borrow_mut()
            .push(ReporterEvent::SuiteStart(suite.to_string()));
    }

    fn suite_result(
        &mut self,
        suite: &str,
        aggregate: &AggregatedResult,
        summary: &SuiteSummary,
        result: &DescribeResult,
    ) {
        self.events.borrow_mut().push(ReporterEvent::SuiteResult {
            suite: suite.to_string(),
            summary: summary.clone(),
            tests_so_far: aggregate.total_tests(),
            tests: result
                .all_tests()
                .iter()
                .map(|test| test.titles.join(" > "))
                .collect(),
        });
    }

    fn run_complete(&mut self, aggregate: &AggregatedResult) {
        self.events
            .borrow_mut()
            .push(ReporterEvent::RunComplete(aggregate.clone()));
    }
}

/// Temporary project directory with a `snapshots/` folder beneath it.
pub struct TestProject {
    temp: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp project")?;
        Ok(Self { temp })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.path().join("snapshots")
    }

    pub fn config(&self) -> FrameworkConfig {
        FrameworkConfig {
            update_snapshots: false,
            snapshot_dir: PathBuf::from("snapshots"),
            project_dir: self.path().to_path_buf(),
            max_num_mock_calls: 100,
        }
    }

    /// Framework rooted at this project with a [`ManualClock`].
    pub fn framework<'s>(&self) -> Framework<'s> {
        self.framework_with(self.config())
    }

    pub fn framework_with<'s>(&self, config: FrameworkConfig) -> Framework<'s> {
        Framework::new(config).with_clock(ManualClock::default())
    }

    pub fn snapshot_path(&self, suite: &str) -> PathBuf {
        self.snapshot_dir()
            .join(format!("{}.{EXTENSION}", normalize_name(suite)))
    }

    /// Raw contents of a suite's snapshot document, if it exists.
    pub fn read_snapshot(&self, suite: &str) -> Option<String> {
        fs::read_to_string(self.snapshot_path(suite)).ok()
    }

    pub fn write_snapshot(&self, suite: &str, contents: &str) -> Result<()> {
        fs::create_dir_all(self.snapshot_dir()).context("create snapshot dir")?;
        let path = self.snapshot_path(suite);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// File names in the snapshot directory, sorted.
    pub fn snapshot_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.snapshot_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
