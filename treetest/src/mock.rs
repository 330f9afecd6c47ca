//! Call-recording mocks.
//!
//! A mock answers calls through a user-supplied responder and records each
//! call's arguments and call site, up to the configured call bound. Calls past
//! the bound still answer but are only counted.

use std::cell::{Cell, RefCell};
use std::panic::Location;

use tracing::warn;

use crate::core::types::SourceLocation;
use crate::io::stack::StackResolver;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall<A> {
    pub args: A,
    pub location: SourceLocation,
}

pub struct Mock<'t, A, R> {
    resolver: &'t dyn StackResolver,
    limit: usize,
    respond: RefCell<Box<dyn FnMut(&A) -> R + 't>>,
    calls: RefCell<Vec<MockCall<A>>>,
    dropped: Cell<usize>,
}

impl<'t, A, R> Mock<'t, A, R> {
    pub(crate) fn new(
        resolver: &'t dyn StackResolver,
        limit: usize,
        respond: impl FnMut(&A) -> R + 't,
    ) -> Self {
        Self {
            resolver,
            limit,
            respond: RefCell::new(Box::new(respond)),
            calls: RefCell::new(Vec::new()),
            dropped: Cell::new(0),
        }
    }

    #[track_caller]
    pub fn call(&self, args: A) -> R {
        let location = Location::caller();
        let response = {
            let mut respond = self.respond.borrow_mut();
            (*respond)(&args)
        };
        let mut calls = self.calls.borrow_mut();
        if calls.len() < self.limit {
            calls.push(MockCall {
                args,
                location: self.resolver.resolve_caller(location),
            });
        } else {
            if self.dropped.get() == 0 {
                warn!(limit = self.limit, "mock call limit reached, further calls not recorded");
            }
            self.dropped.set(self.dropped.get() + 1);
        }
        response
    }

    /// Total calls, including those past the recording bound.
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len() + self.dropped.get()
    }

    /// Calls that were answered but not recorded.
    pub fn dropped_calls(&self) -> usize {
        self.dropped.get()
    }

    pub fn calls(&self) -> Vec<MockCall<A>>
    where
        A: Clone,
    {
        self.calls.borrow().clone()
    }

    pub fn last_call(&self) -> Option<MockCall<A>>
    where
        A: Clone,
    {
        self.calls.borrow().last().cloned()
    }
}
