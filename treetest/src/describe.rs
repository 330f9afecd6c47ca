//! Recursive describe engine.
//!
//! Each describe runs in two phases:
//!
//! 1. **Gather**: the body runs exactly once against a [`Describe`] scope.
//!    `test` registers a pending test in declaration order; `describe` runs the
//!    whole nested describe (gather and run) immediately, before the body
//!    continues.
//! 2. **Run**: pending tests execute in registration order once the body has
//!    returned.
//!
//! Tests at one level therefore always run after every nested describe
//! declared at that level has completed.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe, Location};
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::clock::Clock;
use crate::core::errors::EngineError;
use crate::core::identity::{TestIdentity, assign_identity};
use crate::core::path::{DescribePath, TestPath};
use crate::core::types::{DescribeResult, TestResult, TestStatus};
use crate::io::panic_hook::{self, PanicRecord};
use crate::io::snapshot_store::SnapshotStore;
use crate::io::stack::{STACK_DEPTH, StackResolver};
use crate::matchers::{TestContext, TestReturn};

/// Matcher extension shared by a describe subtree.
pub type Extension = Option<Rc<dyn Any>>;

type Runnable<'s> = Box<dyn FnOnce(&TestContext<'_>) -> Result<(), String> + 's>;

/// Mutable state threaded through one run.
pub struct RunState {
    pub identities: HashSet<TestIdentity>,
    pub snapshots: SnapshotStore,
}

impl RunState {
    pub fn new(snapshots: SnapshotStore) -> Self {
        Self {
            identities: HashSet::new(),
            snapshots,
        }
    }
}

/// Collaborators the engine consults while running tests.
#[derive(Clone, Copy)]
pub struct Engine<'e> {
    pub clock: &'e dyn Clock,
    pub resolver: &'e dyn StackResolver,
    pub mock_call_limit: usize,
}

struct PendingTest<'s> {
    path: TestPath,
    identity: TestIdentity,
    declared_at: &'static Location<'static>,
    run: Runnable<'s>,
}

enum Slot<'s> {
    Pending(PendingTest<'s>),
    Running(TestPath),
    Done(TestResult),
}

impl<'s> Slot<'s> {
    /// Claim a pending test for execution. Skipped results need no work.
    fn begin(&mut self) -> Result<Option<PendingTest<'s>>, EngineError> {
        let path = match self {
            Slot::Pending(pending) => pending.path.clone(),
            Slot::Done(result) if result.status.is_skipped() => return Ok(None),
            Slot::Done(result) => {
                return Err(EngineError::AlreadyRan {
                    test: result.path.to_string(),
                });
            }
            Slot::Running(path) => {
                return Err(EngineError::AlreadyRan {
                    test: path.to_string(),
                });
            }
        };
        match std::mem::replace(self, Slot::Running(path)) {
            Slot::Pending(pending) => Ok(Some(pending)),
            _ => Ok(None),
        }
    }
}

/// Declaration scope passed to a describe body.
pub struct Describe<'r, 's> {
    engine: Engine<'r>,
    run_state: &'r mut RunState,
    path: DescribePath,
    skip: bool,
    extension: Extension,
    slots: BTreeMap<usize, Slot<'s>>,
    next_slot: usize,
    children: Vec<DescribeResult>,
    error: Option<EngineError>,
}

impl<'r, 's> Describe<'r, 's> {
    pub fn path(&self) -> &DescribePath {
        &self.path
    }

    /// Whether declarations in this scope are skipped.
    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    /// Register a test. Its body runs after this describe's body returns.
    #[track_caller]
    pub fn test<R, F>(&mut self, name: &str, body: F)
    where
        R: TestReturn,
        F: FnOnce(&TestContext<'_>) -> R + 's,
    {
        let declared_at = Location::caller();
        if self.skip {
            self.register_skip(name, declared_at);
            return;
        }
        let Some((path, identity)) = self.register_identity(name) else {
            return;
        };
        debug!(test = %path, "test registered");
        let run: Runnable<'s> = Box::new(move |ctx: &TestContext<'_>| body(ctx).into_outcome());
        self.push(Slot::Pending(PendingTest {
            path,
            identity,
            declared_at,
            run,
        }));
    }

    /// Register a skipped test. Its body is never invoked.
    #[track_caller]
    pub fn test_skip<R, F>(&mut self, name: &str, body: F)
    where
        R: TestReturn,
        F: FnOnce(&TestContext<'_>) -> R + 's,
    {
        drop(body);
        self.register_skip(name, Location::caller());
    }

    /// Run a nested describe to completion.
    pub fn describe(&mut self, name: &str, body: impl FnOnce(&mut Describe<'_, 's>)) {
        let extension = self.extension.clone();
        self.nest(name, self.skip, extension, body);
    }

    /// Run a nested describe whose tests are all skipped.
    pub fn describe_skip(&mut self, name: &str, body: impl FnOnce(&mut Describe<'_, 's>)) {
        let extension = self.extension.clone();
        self.nest(name, true, extension, body);
    }

    /// Run a nested describe with its own matcher extension.
    pub fn describe_with<X: Any>(
        &mut self,
        name: &str,
        extension: X,
        body: impl FnOnce(&mut Describe<'_, 's>),
    ) {
        let extension: Rc<dyn Any> = Rc::new(extension);
        self.nest(name, self.skip, Some(extension), body);
    }

    fn nest(
        &mut self,
        name: &str,
        skip: bool,
        extension: Extension,
        body: impl FnOnce(&mut Describe<'_, 's>),
    ) {
        if self.error.is_some() {
            return;
        }
        let path = self.path.child(name);
        match run_describe(self.engine, self.run_state, path, skip, extension, body) {
            Ok(result) => self.children.push(result),
            Err(err) => self.error = Some(err),
        }
    }

    fn register_identity(&mut self, name: &str) -> Option<(TestPath, TestIdentity)> {
        if self.error.is_some() {
            return None;
        }
        let path = TestPath::new(&self.path, name);
        match assign_identity(&mut self.run_state.identities, &path) {
            Ok(identity) => Some((path, identity)),
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }

    fn register_skip(&mut self, name: &str, declared_at: &'static Location<'static>) {
        let Some((path, identity)) = self.register_identity(name) else {
            return;
        };
        debug!(test = %path, "test skipped");
        self.run_state
            .snapshots
            .mark_checked(self.path.root_name(), &identity);
        let location = self.engine.resolver.resolve_caller(declared_at);
        self.push(Slot::Done(TestResult {
            titles: path.titles(),
            path,
            identity,
            duration: None,
            status: TestStatus::Skipped {
                location: Some(location),
            },
        }));
    }

    fn push(&mut self, slot: Slot<'s>) {
        self.slots.insert(self.next_slot, slot);
        self.next_slot += 1;
    }
}

/// Gather and run one describe, returning its complete result.
#[instrument(skip_all, fields(describe = %path, skip = skip))]
pub fn run_describe<'s>(
    engine: Engine<'_>,
    run_state: &mut RunState,
    path: DescribePath,
    skip: bool,
    extension: Extension,
    body: impl FnOnce(&mut Describe<'_, 's>),
) -> Result<DescribeResult, EngineError> {
    let started_at = engine.clock.now();
    let mut scope = Describe {
        engine,
        run_state,
        path,
        skip,
        extension,
        slots: BTreeMap::new(),
        next_slot: 0,
        children: Vec::new(),
        error: None,
    };
    body(&mut scope);

    let Describe {
        run_state,
        path,
        extension,
        mut slots,
        children,
        error,
        ..
    } = scope;
    if let Some(err) = error {
        return Err(err);
    }

    for slot in slots.values_mut() {
        if let Some(pending) = slot.begin()? {
            let result = execute(engine, run_state, extension.as_deref(), pending);
            *slot = Slot::Done(result);
        }
    }

    let mut tests = Vec::with_capacity(slots.len());
    for slot in slots.into_values() {
        match slot {
            Slot::Done(result) => tests.push(result),
            Slot::Pending(PendingTest { path: test, .. }) | Slot::Running(test) => {
                return Err(EngineError::IncompleteExecution {
                    describe: path.to_string(),
                    test: test.name.to_string(),
                });
            }
        }
    }

    Ok(DescribeResult {
        name: path.name().to_string(),
        path,
        started_at,
        finished_at: engine.clock.now(),
        children,
        tests,
    })
}

/// Run one test body, containing any failure in its result.
fn execute(
    engine: Engine<'_>,
    run_state: &mut RunState,
    extension: Option<&dyn Any>,
    pending: PendingTest<'_>,
) -> TestResult {
    let PendingTest {
        path,
        identity,
        declared_at,
        run,
    } = pending;
    let document = path.describe.root_name().to_string();

    let started = engine.clock.now();
    let (outcome, recorded) = {
        let ctx = TestContext::new(
            &path,
            &identity,
            &document,
            &mut run_state.snapshots,
            engine.resolver,
            extension,
            engine.mock_call_limit,
        );
        let outcome = panic_hook::catching(|| panic::catch_unwind(AssertUnwindSafe(|| run(&ctx))));
        (outcome, ctx.take_status())
    };
    let finished = engine.clock.now();

    let status = match (recorded, outcome) {
        (Some(status), _) => status,
        (None, Ok(Ok(()))) => TestStatus::Passed,
        (None, Ok(Err(error))) => TestStatus::Exception {
            error,
            location: Some(engine.resolver.resolve_caller(declared_at)),
            stack: Vec::new(),
        },
        (None, Err(payload)) => {
            let error = panic_hook::payload_message(payload.as_ref());
            match panic_hook::take_last() {
                Some(PanicRecord {
                    file,
                    line,
                    column,
                    backtrace,
                }) => TestStatus::Exception {
                    error,
                    location: Some(engine.resolver.resolve(&file, line, column)),
                    stack: engine.resolver.frames(&backtrace, STACK_DEPTH),
                },
                None => TestStatus::Exception {
                    error,
                    location: Some(engine.resolver.resolve_caller(declared_at)),
                    stack: Vec::new(),
                },
            }
        }
    };
    if status.is_failure() {
        run_state.snapshots.mark_checked(&document, &identity);
    }
    debug!(test = %path, status = status.label(), "test finished");

    TestResult {
        titles: path.titles(),
        path,
        identity,
        duration: Some((finished - started).to_std().unwrap_or_default()),
        status,
    }
}
