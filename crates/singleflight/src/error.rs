// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

/// The result of a coalesced call.
pub type Result<T, E> = std::result::Result<T, Error<E>>;

/// An error returned by a coalesced call.
///
/// Every caller of the same flight receives an equal error: the failure of the work closure is
/// stored once behind an [`Arc`] and each caller gets a clone of that same `Arc`, so callers can
/// branch on the concrete error type and even compare identity with [`Arc::ptr_eq`].
///
/// # Examples
///
/// ```
/// use singleflight::{BlockingSingleFlight, Error};
///
/// #[derive(Debug, PartialEq)]
/// struct NotFound;
///
/// let group = BlockingSingleFlight::<&str, String, NotFound>::new();
/// let error = group.call("user:404", || Err(NotFound)).unwrap_err();
///
/// assert!(matches!(error, Error::Upstream(ref e) if **e == NotFound));
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error<E> {
    /// The key was rejected by the configured key validator. Raised before any work starts.
    #[error("invalid argument: {0}")]
    InvalidArgument(Cow<'static, str>),

    /// The work closure failed. The original error is shared by all callers of the flight.
    #[error("coalesced call failed")]
    Upstream(#[source] Arc<E>),

    /// The caller executing the work stopped before producing an outcome, either because its
    /// future was dropped or because the work panicked.
    #[error("coalesced call was abandoned before producing an outcome")]
    Abandoned,
}

impl<E> Error<E> {
    pub(crate) fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn upstream(error: E) -> Self {
        Self::Upstream(Arc::new(error))
    }

    /// Returns `true` if the key was rejected before the call started.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns `true` if the owning caller stopped before producing an outcome.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned)
    }

    /// Returns the shared error produced by the work closure, if that is what failed.
    #[must_use]
    pub fn upstream_error(&self) -> Option<&Arc<E>> {
        match self {
            Self::Upstream(error) => Some(error),
            _ => None,
        }
    }
}

// Manual impl: cloning only bumps the `Arc`, so `E` itself does not need to be `Clone`.
impl<E> Clone for Error<E> {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidArgument(message) => Self::InvalidArgument(message.clone()),
            Self::Upstream(error) => Self::Upstream(Arc::clone(error)),
            Self::Abandoned => Self::Abandoned,
        }
    }
}
