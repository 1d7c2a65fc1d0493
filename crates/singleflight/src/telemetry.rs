// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events, compiled in with the `logs` feature.

#[cfg(any(feature = "logs", test))]
pub(crate) const STARTED_EVENT: &str = "singleflight.started";
#[cfg(any(feature = "logs", test))]
pub(crate) const JOINED_EVENT: &str = "singleflight.joined";
#[cfg(any(feature = "logs", test))]
pub(crate) const COMPLETED_EVENT: &str = "singleflight.completed";
#[cfg(any(feature = "logs", test))]
pub(crate) const ABANDONED_EVENT: &str = "singleflight.abandoned";

/// The caller found no flight for its key and now executes the work.
#[inline]
pub(crate) fn started(group: &'static str) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: STARTED_EVENT,
        tracing::Level::DEBUG,
        flight.group = group,
        flight.event = STARTED_EVENT,
    );

    #[cfg(not(any(feature = "logs", test)))]
    let _ = group;
}

/// The caller joined an existing flight and waits for its outcome.
#[inline]
pub(crate) fn joined(group: &'static str) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: JOINED_EVENT,
        tracing::Level::DEBUG,
        flight.group = group,
        flight.event = JOINED_EVENT,
    );

    #[cfg(not(any(feature = "logs", test)))]
    let _ = group;
}

/// The owner stored the outcome and released its joiners.
#[inline]
pub(crate) fn completed(group: &'static str, joiners: usize, failed: bool) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: COMPLETED_EVENT,
        tracing::Level::DEBUG,
        flight.group = group,
        flight.event = COMPLETED_EVENT,
        flight.joiners = joiners,
        flight.failed = failed,
    );

    #[cfg(not(any(feature = "logs", test)))]
    let _ = (group, joiners, failed);
}

/// The owner stopped before producing an outcome; joiners fail with `Abandoned`.
#[inline]
pub(crate) fn abandoned(group: &'static str, joiners: usize) {
    #[cfg(any(feature = "logs", test))]
    tracing::event!(
        name: ABANDONED_EVENT,
        tracing::Level::WARN,
        flight.group = group,
        flight.event = ABANDONED_EVENT,
        flight.joiners = joiners,
    );

    #[cfg(not(any(feature = "logs", test)))]
    let _ = (group, joiners);
}
