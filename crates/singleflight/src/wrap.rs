// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use crate::{BlockingSingleFlight, LocalSingleFlight, Result, SingleFlight};

/// A function bound to a coalescing group.
///
/// Created by the `wrap` method of each group type. Every invocation derives a key from its
/// arguments and goes through the group's `call_with`, so concurrent invocations whose arguments
/// map to the same key share a single execution.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use singleflight::SingleFlight;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let group = Arc::new(SingleFlight::<u64, String, std::io::Error>::new());
///
/// let load_user = group.wrap(
///     |id: &u64| *id,
///     |id: u64| async move { Ok::<_, std::io::Error>(format!("user-{id}")) },
/// );
///
/// assert_eq!(load_user.call(7).await.unwrap(), "user-7");
/// # }
/// ```
pub struct Wrapped<G, D, F> {
    group: G,
    derive_key: D,
    func: F,
}

impl<G, D, F> Wrapped<G, D, F> {
    pub(crate) fn new(group: G, derive_key: D, func: F) -> Self {
        Self { group, derive_key, func }
    }

    /// The group this function is bound to.
    #[must_use]
    pub fn group(&self) -> &G {
        &self.group
    }
}

impl<K, T, E, D, F> Wrapped<Arc<SingleFlight<K, T, E>>, D, F>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Invokes the bound function through the group.
    ///
    /// # Errors
    ///
    /// Same as [`SingleFlight::call`].
    pub async fn call<A, Fut>(&self, args: A) -> Result<T, E>
    where
        D: Fn(&A) -> K,
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let key = (self.derive_key)(&args);
        self.group.call_with(key, args, &self.func).await
    }
}

impl<K, T, E, D, F> Wrapped<Rc<LocalSingleFlight<K, T, E>>, D, F>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Invokes the bound function through the group.
    ///
    /// # Errors
    ///
    /// Same as [`LocalSingleFlight::call`].
    pub async fn call<A, Fut>(&self, args: A) -> Result<T, E>
    where
        D: Fn(&A) -> K,
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let key = (self.derive_key)(&args);
        self.group.call_with(key, args, &self.func).await
    }
}

impl<K, T, E, D, F> Wrapped<Arc<BlockingSingleFlight<K, T, E>>, D, F>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Invokes the bound function through the group.
    ///
    /// # Errors
    ///
    /// Same as [`BlockingSingleFlight::call`].
    pub fn call<A>(&self, args: A) -> Result<T, E>
    where
        D: Fn(&A) -> K,
        F: Fn(A) -> std::result::Result<T, E>,
    {
        let key = (self.derive_key)(&args);
        self.group.call_with(key, args, &self.func)
    }
}

impl<G: Clone, D: Clone, F: Clone> Clone for Wrapped<G, D, F> {
    fn clone(&self) -> Self {
        Self {
            group: self.group.clone(),
            derive_key: self.derive_key.clone(),
            func: self.func.clone(),
        }
    }
}

impl<G: Debug, D, F> Debug for Wrapped<G, D, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wrapped").field("group", &self.group).finish_non_exhaustive()
    }
}
