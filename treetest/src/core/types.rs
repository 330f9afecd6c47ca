//! Result types produced by the describe engine.
//!
//! These types are terminal records: once a status is assigned it is never
//! rewritten. They serialize to stable JSON for machine-readable summaries.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::identity::TestIdentity;
use crate::core::path::{DescribePath, TestPath};

/// Source position of an assertion, panic or skipped declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Terminal status of one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    /// An assertion failed. Only the first failing assertion is recorded.
    Failed {
        message: String,
        location: Option<SourceLocation>,
        stack: Vec<String>,
    },
    Skipped {
        location: Option<SourceLocation>,
    },
    /// The test body panicked or returned an error.
    Exception {
        error: String,
        location: Option<SourceLocation>,
        stack: Vec<String>,
    },
}

impl TestStatus {
    /// Failed or Exception.
    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failed { .. } | TestStatus::Exception { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TestStatus::Skipped { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed { .. } => "failed",
            TestStatus::Skipped { .. } => "skipped",
            TestStatus::Exception { .. } => "exception",
        }
    }
}

/// Outcome of a single test declaration.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    #[serde(skip)]
    pub path: TestPath,
    pub titles: Vec<String>,
    pub identity: TestIdentity,
    /// Wall time spent in the body; `None` for tests that never ran.
    pub duration: Option<Duration>,
    #[serde(flatten)]
    pub status: TestStatus,
}

impl TestResult {
    pub fn name(&self) -> &str {
        &self.path.name
    }
}

/// Outcome of one describe block and everything nested under it.
#[derive(Debug, Clone, Serialize)]
pub struct DescribeResult {
    #[serde(skip)]
    pub path: DescribePath,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Nested describes in declaration order.
    pub children: Vec<DescribeResult>,
    /// Tests declared directly in this describe, in declaration order.
    pub tests: Vec<TestResult>,
}

impl DescribeResult {
    /// Every test in this subtree, depth first: own tests, then children.
    pub fn all_tests(&self) -> Vec<&TestResult> {
        let mut out = Vec::new();
        collect_tests(self, &mut out);
        out
    }

    /// Look up a direct child describe by name.
    pub fn child(&self, name: &str) -> Option<&DescribeResult> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Look up a test declared directly in this describe by name.
    pub fn test(&self, name: &str) -> Option<&TestResult> {
        self.tests.iter().find(|test| test.name() == name)
    }
}

fn collect_tests<'a>(describe: &'a DescribeResult, out: &mut Vec<&'a TestResult>) {
    out.extend(describe.tests.iter());
    for child in &describe.children {
        collect_tests(child, out);
    }
}
