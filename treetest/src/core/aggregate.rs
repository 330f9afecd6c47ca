//! Folding describe results into run-wide totals.

use std::time::Duration;

use serde::Serialize;

use crate::core::types::{DescribeResult, TestStatus};

/// Classification of a whole suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteOutcome {
    Passed,
    Failed,
    Skipped,
}

/// Per-suite counts derived from one top-level describe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteSummary {
    pub name: String,
    pub outcome: SuiteOutcome,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
}

impl SuiteSummary {
    /// Summarize a suite. `registered_skip` marks suites registered with
    /// `describe_skip`, which count as skipped even when they declare no tests.
    pub fn from_describe(result: &DescribeResult, registered_skip: bool) -> Self {
        let mut summary = Self {
            name: result.name.clone(),
            outcome: SuiteOutcome::Passed,
            passed: 0,
            failed: 0,
            skipped: 0,
            duration: Duration::ZERO,
        };
        for test in result.all_tests() {
            match test.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Skipped { .. } => summary.skipped += 1,
                TestStatus::Failed { .. } | TestStatus::Exception { .. } => summary.failed += 1,
            }
            summary.duration += test.duration.unwrap_or_default();
        }
        summary.outcome = if summary.failed > 0 {
            SuiteOutcome::Failed
        } else if summary.passed == 0 && (summary.skipped > 0 || registered_skip) {
            SuiteOutcome::Skipped
        } else {
            SuiteOutcome::Passed
        };
        summary
    }
}

/// Snapshot store totals produced when the store is finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Entries remaining on disk after pruning.
    pub total: usize,
}

/// Running totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatedResult {
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub tests_skipped: usize,
    pub suites_passed: usize,
    pub suites_failed: usize,
    pub suites_skipped: usize,
    pub duration: Duration,
    /// Present once the snapshot store has been finalized.
    pub snapshots: Option<SnapshotSummary>,
}

impl AggregatedResult {
    pub fn fold_suite(&mut self, suite: &SuiteSummary) {
        self.tests_passed += suite.passed;
        self.tests_failed += suite.failed;
        self.tests_skipped += suite.skipped;
        self.duration += suite.duration;
        match suite.outcome {
            SuiteOutcome::Passed => self.suites_passed += 1,
            SuiteOutcome::Failed => self.suites_failed += 1,
            SuiteOutcome::Skipped => self.suites_skipped += 1,
        }
    }

    pub fn total_tests(&self) -> usize {
        self.tests_passed + self.tests_failed + self.tests_skipped
    }

    /// A run succeeds when no test failed.
    pub fn success(&self) -> bool {
        self.tests_failed == 0
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        let mut buf = serde_json::to_string_pretty(self)?;
        buf.push('\n');
        Ok(buf)
    }
}
