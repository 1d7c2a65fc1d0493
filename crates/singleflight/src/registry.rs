// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::hash::Hash;

/// Shared handle to an in-flight call, as stored in the registry.
pub(crate) trait Handle: Clone {
    /// Both handles point to the same call.
    fn is_same(&self, other: &Self) -> bool;
}

/// Result of looking up a key in the registry.
#[derive(Debug)]
pub(crate) enum Membership<P> {
    /// A call for the key is already in flight; wait for it.
    Joined(P),
    /// No call was in flight; the caller now owns this new one and must execute the work.
    Created(P),
}

/// Maps keys to their in-flight calls.
///
/// The registry holds no lock of its own. Each group keeps it behind a single mutex and only
/// touches it while holding that mutex, which makes every method here one critical section.
pub(crate) struct Registry<K, P> {
    calls: HashMap<K, P>,
}

impl<K, P> Registry<K, P> {
    pub(crate) fn new() -> Self {
        Self { calls: HashMap::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }
}

impl<K, P> Registry<K, P>
where
    K: Hash + Eq,
    P: Handle,
{
    /// Returns the call in flight for `key`, or registers a new one created by `make`.
    pub(crate) fn try_join_or_create(&mut self, key: K, make: impl FnOnce() -> P) -> Membership<P> {
        match self.calls.entry(key) {
            Entry::Occupied(entry) => Membership::Joined(entry.get().clone()),
            Entry::Vacant(entry) => {
                let call = make();
                entry.insert(call.clone());
                Membership::Created(call)
            }
        }
    }

    /// Removes `call` from the registry.
    ///
    /// Does nothing if `key` maps to a different call. Returns whether an entry was removed.
    pub(crate) fn remove(&mut self, key: &K, call: &P) -> bool {
        if !self.calls.get(key).is_some_and(|current| current.is_same(call)) {
            return false;
        }

        self.calls.remove(key);
        true
    }
}

impl<K, P> Debug for Registry<K, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("in_flight", &self.calls.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::call::Call;
    use crate::signal::Latch;

    type Flight = Arc<Call<u32, (), Latch>>;

    fn new_flight() -> Flight {
        Arc::new(Call::new())
    }

    #[test]
    fn first_caller_creates_then_others_join() {
        let mut registry = Registry::new();

        let Membership::Created(created) = registry.try_join_or_create("key", new_flight) else {
            panic!("first caller must create");
        };
        let Membership::Joined(joined) = registry.try_join_or_create("key", new_flight) else {
            panic!("second caller must join");
        };

        assert!(created.is_same(&joined));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_keys_get_distinct_calls() {
        let mut registry = Registry::new();

        let a = registry.try_join_or_create("a", new_flight);
        let b = registry.try_join_or_create("b", new_flight);

        assert!(matches!(a, Membership::Created(_)));
        assert!(matches!(b, Membership::Created(_)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_checks_identity() {
        let mut registry = Registry::new();
        let Membership::Created(call) = registry.try_join_or_create("key", new_flight) else {
            panic!("first caller must create");
        };

        assert!(!registry.remove(&"key", &new_flight()));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&"key", &call));
        assert_eq!(registry.len(), 0);
        assert!(!registry.remove(&"key", &call));
    }

    #[test]
    fn abandoned_call_is_joined_until_removed() {
        let mut registry = Registry::new();
        let Membership::Created(abandoned) = registry.try_join_or_create("key", new_flight) else {
            panic!("first caller must create");
        };
        assert!(abandoned.abandon("test"));

        let Membership::Joined(late) = registry.try_join_or_create("key", new_flight) else {
            panic!("registered call must be joined");
        };
        assert!(late.outcome().unwrap_err().is_abandoned());

        assert!(registry.remove(&"key", &abandoned));
        assert!(matches!(registry.try_join_or_create("key", new_flight), Membership::Created(_)));
    }

    #[test]
    fn completed_call_is_joined_until_removed() {
        let mut registry = Registry::new();
        let Membership::Created(call) = registry.try_join_or_create("key", new_flight) else {
            panic!("first caller must create");
        };
        let _ = call.complete("test", Ok(7));

        // Late arrivals during the grace period still join the finished flight.
        let Membership::Joined(late) = registry.try_join_or_create("key", new_flight) else {
            panic!("completed call must be joined");
        };
        assert_eq!(late.outcome().unwrap(), 7);
    }

    #[test]
    fn debug_reports_size() {
        let mut registry = Registry::new();
        let _ = registry.try_join_or_create(1, new_flight);

        assert_eq!(format!("{registry:?}"), "Registry { in_flight: 1 }");
    }
}
