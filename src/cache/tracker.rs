//! Request Tracker Module
//!
//! Collapses concurrent fetch-and-store operations for the same key into a
//! single in-flight execution.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error};

use crate::error::{CacheError, Result};

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T>>>;

// == Request Tracker ==
/// Maps each in-flight key to one shared completion that late joiners await.
///
/// The operation runs on its own task, so a caller that stops waiting does
/// not cancel it; the entry is removed once the operation finishes, whatever
/// its outcome.
pub struct RequestTracker<T: Clone + Send + Sync + 'static> {
    in_flight: Arc<Mutex<HashMap<String, SharedOutcome<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> RequestTracker<T> {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(
        map: &Mutex<HashMap<String, SharedOutcome<T>>>,
    ) -> MutexGuard<'_, HashMap<String, SharedOutcome<T>>> {
        // Guarded sections never panic, so a poisoned map is still consistent.
        map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // == Track ==
    /// Runs `operation` for `key`, or joins the run already in flight.
    ///
    /// Every caller of one run observes the same success value or the same
    /// error. Must be called from within a tokio runtime.
    pub fn track<F, Fut>(&self, key: &str, operation: F) -> impl Future<Output = Result<T>> + Send
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut in_flight = Self::lock(&self.in_flight);

        if let Some(existing) = in_flight.get(key) {
            debug!(key, "Joining in-flight request");
            return existing.clone();
        }

        let registry = Arc::clone(&self.in_flight);
        let owned_key = key.to_string();
        let work = operation();

        let task = tokio::spawn(async move {
            let outcome = work.await;
            Self::lock(&registry).remove(&owned_key);
            outcome
        });

        let shared = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    error!(error = %join_error, "Tracked operation did not complete");
                    Err(CacheError::Internal(format!(
                        "tracked operation aborted: {}",
                        join_error
                    )))
                }
            }
        }
        .boxed()
        .shared();

        in_flight.insert(key.to_string(), shared.clone());
        shared
    }

    /// Number of keys with an operation in flight.
    pub fn in_flight(&self) -> usize {
        Self::lock(&self.in_flight).len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        Self::lock(&self.in_flight).contains_key(key)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for RequestTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}
