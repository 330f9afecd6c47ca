//! Run lifecycle notifications.

use tracing::{info, warn};

use crate::core::aggregate::{AggregatedResult, SuiteSummary};
use crate::core::types::{DescribeResult, TestStatus};

/// Sink for run lifecycle events. Reporters observe; they cannot change the
/// outcome of a run.
pub trait Reporter {
    fn run_start(&mut self, suites: &[String]);

    fn suite_start(&mut self, suite: &str);

    /// `aggregate` already includes `summary`.
    fn suite_result(
        &mut self,
        suite: &str,
        aggregate: &AggregatedResult,
        summary: &SuiteSummary,
        result: &DescribeResult,
    );

    fn run_complete(&mut self, aggregate: &AggregatedResult);
}

/// Reports through `tracing` events.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn run_start(&mut self, suites: &[String]) {
        info!(suites = suites.len(), "run started");
    }

    fn suite_start(&mut self, suite: &str) {
        info!(suite, "suite started");
    }

    fn suite_result(
        &mut self,
        suite: &str,
        _aggregate: &AggregatedResult,
        summary: &SuiteSummary,
        result: &DescribeResult,
    ) {
        for test in result.all_tests() {
            let title = test.titles.join(" > ");
            match &test.status {
                TestStatus::Failed {
                    message, location, ..
                } => {
                    let at = location.as_ref().map(ToString::to_string).unwrap_or_default();
                    warn!(test = %title, at = %at, "failed: {message}");
                }
                TestStatus::Exception {
                    error, location, ..
                } => {
                    let at = location.as_ref().map(ToString::to_string).unwrap_or_default();
                    warn!(test = %title, at = %at, "exception: {error}");
                }
                TestStatus::Passed | TestStatus::Skipped { .. } => {}
            }
        }
        info!(
            suite,
            outcome = ?summary.outcome,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            "suite finished"
        );
    }

    fn run_complete(&mut self, aggregate: &AggregatedResult) {
        let snapshots = aggregate.snapshots.unwrap_or_default();
        info!(
            passed = aggregate.tests_passed,
            failed = aggregate.tests_failed,
            skipped = aggregate.tests_skipped,
            duration_ms = aggregate.duration.as_millis() as u64,
            snapshots_added = snapshots.added,
            snapshots_updated = snapshots.updated,
            snapshots_removed = snapshots.removed,
            "run complete"
        );
    }
}
