// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::registry::Handle;
use crate::signal::Signal;
use crate::{Error, Result, telemetry};

/// A call currently executing for one key.
///
/// Only the owner (the caller that created it) writes the outcome and fires the signal; the
/// outcome is written exactly once and before the signal fires, so joiners read it only after
/// the signal released them.
pub(crate) struct Call<T, E, S> {
    outcome: OnceLock<Result<T, E>>,
    signal: S,
    joiners: AtomicUsize,
}

impl<T, E, S: Signal> Call<T, E, S> {
    pub(crate) fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
            signal: S::default(),
            joiners: AtomicUsize::new(0),
        }
    }

    pub(crate) fn signal(&self) -> &S {
        &self.signal
    }

    pub(crate) fn add_joiner(&self) {
        self.joiners.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn joiners(&self) -> usize {
        self.joiners.load(Ordering::Relaxed)
    }

    /// Stores the outcome of the work and releases every joiner. Returns the outcome for the owner.
    pub(crate) fn complete(&self, group: &'static str, outcome: std::result::Result<T, E>) -> Result<T, E>
    where
        T: Clone,
    {
        let outcome = outcome.map_err(Error::upstream);
        telemetry::completed(group, self.joiners(), outcome.is_err());

        let stored = self.outcome.set(outcome.clone()).is_ok();
        debug_assert!(stored, "the outcome of a flight is written exactly once");
        self.signal.fire();

        outcome
    }

    /// Marks the call as abandoned if the owner never completed it.
    ///
    /// Returns `true` if this call did the marking.
    pub(crate) fn abandon(&self, group: &'static str) -> bool {
        if self.outcome.set(Err(Error::Abandoned)).is_err() {
            return false;
        }

        telemetry::abandoned(group, self.joiners());
        self.signal.fire();
        true
    }

    /// The outcome as seen by a joiner once the signal fired.
    pub(crate) fn outcome(&self) -> Result<T, E>
    where
        T: Clone,
    {
        debug_assert!(self.signal.is_fired(), "outcome read before the signal fired");
        self.outcome.get().cloned().unwrap_or(Err(Error::Abandoned))
    }
}

impl<T, E, S> Debug for Call<T, E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("completed", &self.outcome.get().is_some())
            .field("joiners", &self.joiners.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T, E, S: Signal> Handle for Arc<Call<T, E, S>> {
    fn is_same(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T, E, S: Signal> Handle for Rc<Call<T, E, S>> {
    fn is_same(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}
