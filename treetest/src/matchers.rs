//! Assertion dispatch.
//!
//! Every assertion funnels through [`TestContext::dispatch`]: the actual and
//! expected values are produced lazily, the matcher decides pass/fail and
//! hands back a lazy failure message. A failure never interrupts the test
//! body; it is recorded only if the test has no terminal status yet, so the
//! first failing assertion wins.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::Location;

use difference::{Changeset, Difference};
use tracing::debug;

use crate::core::path::TestPath;
use crate::core::types::TestStatus;
use crate::io::snapshot_doc::SnapshotKey;
use crate::io::snapshot_store::{Comparison, SnapshotStore};
use crate::io::stack::{STACK_DEPTH, StackResolver};
use crate::mock::Mock;

/// Assertion scope handed to a running test body.
pub struct TestContext<'t> {
    path: &'t TestPath,
    identity: &'t str,
    document: &'t str,
    status: RefCell<Option<TestStatus>>,
    assertions: Cell<usize>,
    snapshot_seq: Cell<u32>,
    snapshots: RefCell<&'t mut SnapshotStore>,
    resolver: &'t dyn StackResolver,
    extension: Option<&'t dyn Any>,
    mock_call_limit: usize,
}

impl<'t> TestContext<'t> {
    pub(crate) fn new(
        path: &'t TestPath,
        identity: &'t str,
        document: &'t str,
        snapshots: &'t mut SnapshotStore,
        resolver: &'t dyn StackResolver,
        extension: Option<&'t dyn Any>,
        mock_call_limit: usize,
    ) -> Self {
        Self {
            path,
            identity,
            document,
            status: RefCell::new(None),
            assertions: Cell::new(0),
            snapshot_seq: Cell::new(0),
            snapshots: RefCell::new(snapshots),
            resolver,
            extension,
            mock_call_limit,
        }
    }

    pub fn name(&self) -> &str {
        &self.path.name
    }

    pub fn path(&self) -> &TestPath {
        self.path
    }

    pub fn identity(&self) -> &str {
        self.identity
    }

    /// Assertions dispatched so far in this test.
    pub fn assertions(&self) -> usize {
        self.assertions.get()
    }

    /// Whether an assertion has already failed.
    pub fn has_failed(&self) -> bool {
        self.status.borrow().is_some()
    }

    /// Matcher extension attached to the enclosing describe, if it is a `T`.
    pub fn extension<T: Any>(&self) -> Option<&T> {
        self.extension?.downcast_ref::<T>()
    }

    pub(crate) fn take_status(&self) -> Option<TestStatus> {
        self.status.borrow_mut().take()
    }

    /// Evaluate an assertion. Returns whether it passed.
    #[track_caller]
    pub fn dispatch<A, E, M, F>(
        &self,
        matcher: M,
        actual: impl FnOnce() -> A,
        expected: impl FnOnce() -> E,
    ) -> bool
    where
        M: FnOnce(A, E) -> (F, bool),
        F: FnOnce() -> String,
    {
        let location = Location::caller();
        self.assertions.set(self.assertions.get() + 1);
        let (message, pass) = matcher(actual(), expected());
        if !pass {
            self.record_failure(message, location);
        }
        pass
    }

    fn record_failure(&self, message: impl FnOnce() -> String, location: &Location<'_>) {
        self.snapshots
            .borrow_mut()
            .mark_checked(self.document, self.identity);
        if self.status.borrow().is_some() {
            debug!(test = %self.path, "later assertion failure discarded");
            return;
        }
        let status = TestStatus::Failed {
            message: message(),
            location: Some(self.resolver.resolve_caller(location)),
            stack: self.resolver.capture(STACK_DEPTH),
        };
        *self.status.borrow_mut() = Some(status);
    }

    /// Start an assertion on `actual`.
    pub fn expect<A>(&self, actual: A) -> Expectation<'_, 't, A> {
        Expectation { ctx: self, actual }
    }

    /// Record an unconditional failure.
    #[track_caller]
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.dispatch(|message: String, ()| (move || message, false), || message, || ());
    }

    /// Compare `value` against the next snapshot of this test, storing it when
    /// absent or when update mode is on.
    #[track_caller]
    pub fn snapshot(&self, value: impl fmt::Display) -> bool {
        let seq = self.snapshot_seq.get() + 1;
        self.snapshot_seq.set(seq);
        let key = SnapshotKey::new(self.identity, seq);
        let candidate = value.to_string();
        let comparison =
            self.snapshots
                .borrow_mut()
                .compare_or_update(self.document, &key, &candidate);
        self.dispatch(
            move |comparison: Comparison, candidate: String| {
                let pass = !matches!(comparison, Comparison::Mismatch { .. });
                let message = move || match comparison {
                    Comparison::Mismatch { stored } => snapshot_diff(seq, &stored, &candidate),
                    _ => String::new(),
                };
                (message, pass)
            },
            || comparison,
            || candidate,
        )
    }

    /// Stored value of this test's snapshot number `seq` (1-based), marking
    /// it used.
    pub fn stored_snapshot(&self, seq: u32) -> Option<String> {
        self.snapshots
            .borrow_mut()
            .read(self.document, &SnapshotKey::new(self.identity, seq))
    }

    /// Create a mock whose calls are answered by `respond`.
    pub fn mock<A, R>(&self, respond: impl FnMut(&A) -> R + 't) -> Mock<'t, A, R> {
        Mock::new(self.resolver, self.mock_call_limit, respond)
    }
}

fn snapshot_diff(seq: u32, stored: &str, received: &str) -> String {
    let changeset = Changeset::new(stored, received, "\n");
    let mut out = format!("snapshot #{seq} does not match (- stored, + received)");
    for diff in &changeset.diffs {
        let (marker, text) = match diff {
            Difference::Same(text) => (' ', text),
            Difference::Rem(text) => ('-', text),
            Difference::Add(text) => ('+', text),
        };
        for line in text.split('\n') {
            out.push('\n');
            out.push(marker);
            out.push(' ');
            out.push_str(line);
        }
    }
    out
}

/// Pending assertion on a value.
pub struct Expectation<'c, 't, A> {
    ctx: &'c TestContext<'t>,
    actual: A,
}

impl<A: fmt::Debug> Expectation<'_, '_, A> {
    #[track_caller]
    pub fn to_equal<E: fmt::Debug>(self, expected: E) -> bool
    where
        A: PartialEq<E>,
    {
        let Expectation { ctx, actual } = self;
        ctx.dispatch(
            |actual: A, expected: E| {
                let pass = actual == expected;
                (
                    move || format!("expected {expected:?}, received {actual:?}"),
                    pass,
                )
            },
            || actual,
            || expected,
        )
    }

    #[track_caller]
    pub fn to_not_equal<E: fmt::Debug>(self, expected: E) -> bool
    where
        A: PartialEq<E>,
    {
        let Expectation { ctx, actual } = self;
        ctx.dispatch(
            |actual: A, expected: E| {
                let pass = actual != expected;
                (
                    move || format!("expected a value other than {expected:?}, received {actual:?}"),
                    pass,
                )
            },
            || actual,
            || expected,
        )
    }

    /// Pass when `predicate` holds; `description` names it in the message.
    #[track_caller]
    pub fn to_satisfy(self, description: &str, predicate: impl FnOnce(&A) -> bool) -> bool {
        let Expectation { ctx, actual } = self;
        ctx.dispatch(
            |actual: A, description: &str| {
                let pass = predicate(&actual);
                (
                    move || format!("expected value to satisfy {description}, received {actual:?}"),
                    pass,
                )
            },
            || actual,
            || description,
        )
    }
}

impl Expectation<'_, '_, bool> {
    #[track_caller]
    pub fn to_be_true(self) -> bool {
        self.to_equal(true)
    }

    #[track_caller]
    pub fn to_be_false(self) -> bool {
        self.to_equal(false)
    }
}

/// Values a test body may return.
///
/// `()` always completes normally; `Err` is recorded as an exception with the
/// error's alternate `Display` rendering.
pub trait TestReturn {
    fn into_outcome(self) -> Result<(), String>;
}

impl TestReturn for () {
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: fmt::Display> TestReturn for Result<(), E> {
    fn into_outcome(self) -> Result<(), String> {
        self.map_err(|err| format!("{err:#}"))
    }
}
