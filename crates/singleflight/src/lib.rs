// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Coalesces concurrent calls for the same key into a single execution.
//!
//! When many callers ask for the same thing at the same time, for example because they all
//! missed a cache for the same key, only the first caller (the "owner") runs the work while the
//! others (the "joiners") wait and receive a clone of its outcome. Successes and failures are
//! shared alike: if the work fails, every caller of that flight receives the same error.
//!
//! Nothing is cached. Once a flight finishes and its key is removed from the registry, the next
//! call for that key runs the work again.
//!
//! # When to Use
//!
//! - **Cache population**: Prevent a thundering herd when a hot cache entry expires
//! - **API calls**: Deduplicate concurrent requests to the same endpoint
//! - **Database queries**: Coalesce identical queries issued simultaneously
//!
//! # Concurrency Models
//!
//! The same join-or-start protocol is available for three ways of running concurrent code:
//!
//! | Group                    | Callers                                  | Waiting           |
//! |--------------------------|------------------------------------------|-------------------|
//! | [`SingleFlight`]         | `Send` tasks on a multi-threaded runtime | suspends the task |
//! | [`LocalSingleFlight`]    | `!Send` tasks sharing one thread         | suspends the task |
//! | [`BlockingSingleFlight`] | OS threads                               | blocks the thread |
//!
//! In every model the registry is only touched while holding its lock, the work never runs
//! while that lock is held, and flights for different keys never wait on each other.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use singleflight::SingleFlight;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let group: Arc<SingleFlight<&str, String, std::io::Error>> = Arc::new(SingleFlight::new());
//!
//! // Concurrent calls with the same key share a single execution.
//! let result = group
//!     .call("user:123", || async {
//!         // This expensive operation runs once, even if called concurrently.
//!         Ok("expensive_result".to_string())
//!     })
//!     .await;
//!
//! assert_eq!(result.unwrap(), "expensive_result");
//! # }
//! ```
//!
//! # Errors
//!
//! Failures of the work are wrapped in [`Error::Upstream`], which holds the original error in an
//! [`Arc`](std::sync::Arc) shared by all callers of the flight. Keys can optionally be checked by
//! a validator configured on the [`Builder`]; rejected keys fail with [`Error::InvalidArgument`]
//! before anything else happens.
//!
//! # Cancellation and Panics
//!
//! No retry or timeout is applied; layer those around `call` if needed. Dropping a joiner does
//! not affect anyone else. If the owner is dropped or panics before producing an outcome, its
//! joiners fail with [`Error::Abandoned`] and the next call for the key starts a fresh flight.
//!
//! # Features
//!
//! - `logs`: emits `tracing` events when flights start, are joined, complete or are abandoned.

mod blocking;
mod call;
mod error;
mod local;
mod options;
mod registry;
mod signal;
mod task;
mod telemetry;
mod wrap;

pub use blocking::BlockingSingleFlight;
pub use error::{Error, Result};
pub use local::LocalSingleFlight;
pub use options::{Builder, Options};
pub use task::SingleFlight;
pub use wrap::Wrapped;
