// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::{BlockingSingleFlight, Error, LocalSingleFlight, SingleFlight};

const DEFAULT_NAME: &str = "default";

type KeyValidator<K> = Arc<dyn Fn(&K) -> std::result::Result<(), Cow<'static, str>> + Send + Sync>;

/// Configuration shared by all coalescing groups.
///
/// Options are created through [`Builder`]; every group type exposes a `builder()` constructor
/// and `new()` uses the defaults.
pub struct Options<K> {
    name: &'static str,
    grace_period: Duration,
    key_validator: Option<KeyValidator<K>>,
}

impl<K> Options<K> {
    /// The group name reported in telemetry.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// How long the owner of a flight waits after broadcasting its outcome before it removes
    /// the flight from the registry.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Runs the key validator, if any.
    pub(crate) fn validate<E>(&self, key: &K) -> std::result::Result<(), Error<E>> {
        match &self.key_validator {
            Some(validator) => validator(key).map_err(Error::invalid_argument),
            None => Ok(()),
        }
    }
}

impl<K> Default for Options<K> {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME,
            grace_period: Duration::ZERO,
            key_validator: None,
        }
    }
}

impl<K> Clone for Options<K> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            grace_period: self.grace_period,
            key_validator: self.key_validator.clone(),
        }
    }
}

impl<K> Debug for Options<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("name", &self.name)
            .field("grace_period", &self.grace_period)
            .field("key_validator", &self.key_validator.is_some())
            .finish()
    }
}

/// Builder for coalescing groups.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use singleflight::SingleFlight;
///
/// let group = SingleFlight::<String, u64, std::io::Error>::builder()
///     .name("user_profiles")
///     .grace_period(Duration::from_millis(1))
///     .key_validator(|key: &String| {
///         if key.is_empty() { Err("key must not be empty".into()) } else { Ok(()) }
///     })
///     .build();
///
/// assert_eq!(group.options().name(), "user_profiles");
/// ```
#[must_use]
pub struct Builder<K, T, E> {
    options: Options<K>,
    _outcome: PhantomData<fn() -> (T, E)>,
}

impl<K, T, E> Builder<K, T, E> {
    pub(crate) fn new() -> Self {
        Self {
            options: Options::default(),
            _outcome: PhantomData,
        }
    }

    /// Sets the group name reported in telemetry. Defaults to `"default"`.
    pub fn name(mut self, name: &'static str) -> Self {
        self.options.name = name;
        self
    }

    /// Sets a pause between broadcasting an outcome and removing the flight from the registry.
    ///
    /// Callers arriving during the pause join the completed flight instead of starting a new
    /// one. The pause is not needed for correctness and defaults to zero, which skips it.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.options.grace_period = grace_period;
        self
    }

    /// Sets a check that every key must pass before a call starts.
    ///
    /// Rejected keys fail with [`Error::InvalidArgument`] carrying the returned message,
    /// without taking any lock or running any work. Useful when keys arrive from an untyped
    /// boundary such as a request path.
    pub fn key_validator<V>(mut self, validator: V) -> Self
    where
        V: Fn(&K) -> std::result::Result<(), Cow<'static, str>> + Send + Sync + 'static,
    {
        self.options.key_validator = Some(Arc::new(validator));
        self
    }

    /// Returns the configured options.
    #[must_use]
    pub fn into_options(self) -> Options<K> {
        self.options
    }

    /// Builds a [`SingleFlight`] for tasks running on a multi-threaded async runtime.
    #[must_use]
    pub fn build(self) -> SingleFlight<K, T, E> {
        SingleFlight::with_options(self.options)
    }

    /// Builds a [`LocalSingleFlight`] for `!Send` tasks sharing one thread.
    #[must_use]
    pub fn build_local(self) -> LocalSingleFlight<K, T, E> {
        LocalSingleFlight::with_options(self.options)
    }

    /// Builds a [`BlockingSingleFlight`] for OS threads.
    #[must_use]
    pub fn build_blocking(self) -> BlockingSingleFlight<K, T, E> {
        BlockingSingleFlight::with_options(self.options)
    }
}

impl<K, T, E> Debug for Builder<K, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder").field("options", &self.options).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::<String>::default();

        assert_eq!(options.name(), "default");
        assert_eq!(options.grace_period(), Duration::ZERO);
        assert!(options.validate::<()>(&String::new()).is_ok());
    }

    #[test]
    fn builder_sets_all_fields() {
        let options = Builder::<u32, (), ()>::new()
            .name("profiles")
            .grace_period(Duration::from_millis(5))
            .key_validator(|key| if *key == 0 { Err("zero".into()) } else { Ok(()) })
            .into_options();

        assert_eq!(options.name(), "profiles");
        assert_eq!(options.grace_period(), Duration::from_millis(5));
        assert!(options.validate::<()>(&1).is_ok());

        let error = options.validate::<()>(&0).unwrap_err();
        assert!(matches!(error, Error::InvalidArgument(ref message) if message == "zero"));
    }

    #[test]
    fn clone_shares_validator() {
        let options = Builder::<u32, (), ()>::new().key_validator(|_| Err("never".into())).into_options();
        let cloned = options.clone();

        assert!(cloned.validate::<()>(&7).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn debug_hides_validator() {
        let options = Builder::<u32, (), ()>::new().key_validator(|_| Ok(())).into_options();
        let debug = format!("{options:?}");

        assert!(debug.contains("Options"));
        assert!(debug.contains("key_validator: true"));
    }
}
