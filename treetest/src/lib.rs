//! Describe/test execution core with snapshot assertions.
//!
//! Suites are registered on a [`Framework`] and executed by [`Framework::run`].
//! Each `describe` body runs once to gather its tests (nested describes run
//! inline), then the gathered tests run in declaration order. Assertions go
//! through [`TestContext`], which records the first failure of a test and
//! compares snapshot values against per-suite documents on disk.
//!
//! - **[`core`]**: Pure logic: paths, identities, result types, aggregation,
//!   engine errors.
//! - **[`io`]**: Snapshot documents, configuration, stack resolution and
//!   panic capture.
//!
//! Orchestration lives in [`describe`] (the recursive engine) and
//! [`framework`] (suite registry and run driver).

pub mod cli;
pub mod clock;
pub mod core;
pub mod describe;
pub mod exit_codes;
pub mod framework;
pub mod io;
pub mod logging;
pub mod matchers;
pub mod mock;
pub mod reporter;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::clock::{Clock, SystemClock};
pub use crate::core::aggregate::{AggregatedResult, SnapshotSummary, SuiteOutcome, SuiteSummary};
pub use crate::core::errors::EngineError;
pub use crate::core::types::{DescribeResult, SourceLocation, TestResult, TestStatus};
pub use crate::describe::Describe;
pub use crate::framework::{Framework, RunOutcome};
pub use crate::io::config::FrameworkConfig;
pub use crate::matchers::{Expectation, TestContext, TestReturn};
pub use crate::mock::{Mock, MockCall};
pub use crate::reporter::{Reporter, TracingReporter};
