//! Suite registry and run driver.
//!
//! A [`Framework`] owns the registered top-level suites and the "is running"
//! flag. `run` walks the suites in registration order, folds their results
//! into an [`AggregatedResult`], finalizes the snapshot store once, and
//! notifies the reporter along the way.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info, instrument};

use crate::clock::{Clock, SystemClock};
use crate::core::aggregate::{AggregatedResult, SuiteSummary};
use crate::core::errors::EngineError;
use crate::core::path::DescribePath;
use crate::core::types::DescribeResult;
use crate::describe::{Describe, Engine, Extension, RunState, run_describe};
use crate::io::config::FrameworkConfig;
use crate::io::snapshot_store::SnapshotStore;
use crate::io::stack::{BacktraceResolver, StackResolver};
use crate::reporter::{Reporter, TracingReporter};

type SuiteBody<'s> = Box<dyn FnOnce(&mut Describe<'_, 's>) + 's>;
type FailureCallback<'s> = Box<dyn FnMut(&AggregatedResult) + 's>;

struct Suite<'s> {
    name: String,
    body: SuiteBody<'s>,
    extension: Extension,
    skip: bool,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub aggregate: AggregatedResult,
    /// One result per suite, in registration order.
    pub suites: Vec<DescribeResult>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.aggregate.success()
    }

    pub fn suite(&self, name: &str) -> Option<&DescribeResult> {
        self.suites.iter().find(|suite| suite.name == name)
    }
}

/// Test framework instance: suite registry plus run driver.
pub struct Framework<'s> {
    config: FrameworkConfig,
    clock: Box<dyn Clock + 's>,
    resolver: Box<dyn StackResolver + 's>,
    reporter: RefCell<Box<dyn Reporter + 's>>,
    on_failure: RefCell<Option<FailureCallback<'s>>>,
    suites: RefCell<Vec<Suite<'s>>>,
    running: Cell<bool>,
}

impl<'s> Framework<'s> {
    pub fn new(config: FrameworkConfig) -> Self {
        let resolver = BacktraceResolver::new(&config.project_dir);
        Self {
            config,
            clock: Box::new(SystemClock),
            resolver: Box::new(resolver),
            reporter: RefCell::new(Box::new(TracingReporter)),
            on_failure: RefCell::new(None),
            suites: RefCell::new(Vec::new()),
            running: Cell::new(false),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 's) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_resolver(mut self, resolver: impl StackResolver + 's) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_reporter(self, reporter: impl Reporter + 's) -> Self {
        *self.reporter.borrow_mut() = Box::new(reporter);
        self
    }

    /// Callback invoked after a run in which at least one test failed.
    pub fn on_failure(self, callback: impl FnMut(&AggregatedResult) + 's) -> Self {
        *self.on_failure.borrow_mut() = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Names of the suites registered for the next run.
    pub fn suite_names(&self) -> Vec<String> {
        self.suites
            .borrow()
            .iter()
            .map(|suite| suite.name.clone())
            .collect()
    }

    /// Register a top-level suite.
    pub fn describe(
        &self,
        name: &str,
        body: impl FnOnce(&mut Describe<'_, 's>) + 's,
    ) -> Result<(), EngineError> {
        self.register(name, Box::new(body), None, false)
    }

    /// Register a top-level suite whose tests are all skipped.
    pub fn describe_skip(
        &self,
        name: &str,
        body: impl FnOnce(&mut Describe<'_, 's>) + 's,
    ) -> Result<(), EngineError> {
        self.register(name, Box::new(body), None, true)
    }

    /// Register a top-level suite carrying a matcher extension.
    pub fn describe_with<X: Any>(
        &self,
        name: &str,
        extension: X,
        body: impl FnOnce(&mut Describe<'_, 's>) + 's,
    ) -> Result<(), EngineError> {
        let extension: Rc<dyn Any> = Rc::new(extension);
        self.register(name, Box::new(body), Some(extension), false)
    }

    fn register(
        &self,
        name: &str,
        body: SuiteBody<'s>,
        extension: Extension,
        skip: bool,
    ) -> Result<(), EngineError> {
        if self.running.get() {
            return Err(EngineError::RegisterWhileRunning {
                suite: name.to_string(),
            });
        }
        debug!(suite = name, skip, "suite registered");
        self.suites.borrow_mut().push(Suite {
            name: name.to_string(),
            body,
            extension,
            skip,
        });
        Ok(())
    }

    /// Run every registered suite. The registry is emptied.
    ///
    /// Test failures are reported in the outcome; only engine misuse and
    /// snapshot I/O errors return `Err`.
    #[instrument(skip_all, fields(update_snapshots = self.config.update_snapshots))]
    pub fn run(&self) -> Result<RunOutcome, EngineError> {
        if self.running.replace(true) {
            return Err(EngineError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        let snapshots = SnapshotStore::load(
            &self.config.resolved_snapshot_dir(),
            self.config.update_snapshots,
        )
        .map_err(EngineError::Snapshot)?;
        let suites = std::mem::take(&mut *self.suites.borrow_mut());
        let names: Vec<String> = suites.iter().map(|suite| suite.name.clone()).collect();
        info!(suites = names.len(), "run starting");
        self.reporter.borrow_mut().run_start(&names);
        let mut run_state = RunState::new(snapshots);
        let engine = Engine {
            clock: self.clock.as_ref(),
            resolver: self.resolver.as_ref(),
            mock_call_limit: self.config.max_num_mock_calls,
        };

        let mut aggregate = AggregatedResult::default();
        let mut results = Vec::with_capacity(suites.len());
        for suite in suites {
            self.reporter.borrow_mut().suite_start(&suite.name);
            let result = run_describe(
                engine,
                &mut run_state,
                DescribePath::root(&suite.name),
                suite.skip,
                suite.extension,
                suite.body,
            )?;
            let summary = SuiteSummary::from_describe(&result, suite.skip);
            aggregate.fold_suite(&summary);
            self.reporter
                .borrow_mut()
                .suite_result(&suite.name, &aggregate, &summary, &result);
            results.push(result);
        }

        let summary = run_state
            .snapshots
            .finalize()
            .map_err(EngineError::Snapshot)?;
        aggregate.snapshots = Some(summary);
        self.reporter.borrow_mut().run_complete(&aggregate);

        if !aggregate.success() {
            if let Some(callback) = self.on_failure.borrow_mut().as_mut() {
                callback(&aggregate);
            }
        }
        Ok(RunOutcome {
            aggregate,
            suites: results,
        })
    }
}

/// Clears the running flag on every exit path of `run`.
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
