// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates using `SingleFlight` to prevent a thundering herd when populating a cache.
//!
//! Concurrent requests for the same missing cache entry share a single database query. The
//! first request owns the flight and performs the query; the others join it and receive a clone
//! of its outcome, including failures.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use singleflight::SingleFlight;

#[derive(Debug, thiserror::Error)]
#[error("database unavailable for {0}")]
struct DatabaseError(String);

struct ProfileCache {
    entries: Mutex<HashMap<String, String>>,
    flights: SingleFlight<String, String, DatabaseError>,
    queries: AtomicUsize,
}

impl ProfileCache {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            flights: SingleFlight::builder().name("profiles").build(),
            queries: AtomicUsize::new(0),
        }
    }

    async fn get(&self, user: &str) -> singleflight::Result<String, DatabaseError> {
        let cached = self.entries.lock().get(user).cloned();
        if let Some(profile) = cached {
            return Ok(profile);
        }

        let profile = self
            .flights
            .call(user.to_string(), || async {
                let count = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
                println!("  querying database for {user} (query #{count})");

                // Simulate an expensive query.
                tokio::time::sleep(Duration::from_millis(500)).await;

                if user.starts_with("banned:") {
                    return Err(DatabaseError(user.to_string()));
                }
                Ok(format!("Profile(name: {user})"))
            })
            .await?;

        self.entries.lock().insert(user.to_string(), profile.clone());
        Ok(profile)
    }
}

#[tokio::main]
async fn main() {
    let cache = Arc::new(ProfileCache::new());

    println!("Starting 5 concurrent requests for user:123 and 3 for banned:9...\n");

    let mut handles = Vec::new();
    for (i, user) in ["user:123"; 5].into_iter().chain(["banned:9"; 3]).enumerate() {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let result = cache.get(user).await;
            let elapsed = start.elapsed();
            match result {
                Ok(profile) => println!("  [Request {i}] got {profile} in {elapsed:?}"),
                Err(error) => println!("  [Request {i}] failed in {elapsed:?}: {error}"),
            }
        }));

        // Stagger the requests slightly to see the coalescing in action.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    // The entry is cached now, so this does not query the database again.
    let cached = cache.get("user:123").await.expect("the profile is cached");
    println!("\nCached: {cached}");

    let total = cache.queries.load(Ordering::SeqCst);
    println!("Database queried {total} time(s) for 9 requests.");
}
