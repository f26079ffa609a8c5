//! Per-key coalescing of concurrent, identical requests.
//!
//! When many callers ask for the same key at the same moment, only one of
//! them — the leader — should pay for the expensive load. [`SingleFlight`]
//! keeps a registry of in-flight calls: the first caller for a key registers
//! an episode and runs the work; everyone else arriving during that episode
//! blocks until the leader finishes and receives a clone of its result,
//! success or failure alike.
//!
//! ## Episode Lifecycle
//!
//! ```text
//!   caller A (leader)              caller B (waiter)
//!   ─────────────────              ─────────────────
//!   lock registry
//!   no entry for "k"
//!   insert Call, unlock
//!   run work()  ──────────┐        lock registry
//!                         │        entry found for "k"
//!                         │        clone handle, unlock
//!                         │        wait on condvar ──────┐
//!   publish result        │                              │
//!   deregister "k"        │                              │
//!   notify_all  ──────────┼──────► woken, clone result ◄─┘
//!   return result         │        return result
//! ```
//!
//! The registry lock is held only for the check-or-insert and the removal;
//! the work closure always runs outside of it, so slow loads for one key
//! never block flights for other keys.
//!
//! Episodes are strictly per-overlap: once the leader deregisters the key, a
//! later call starts a fresh episode and re-runs the work.
//!
//! ## Example Usage
//!
//! ```
//! use ringcache::flight::SingleFlight;
//!
//! let flight: SingleFlight<u32> = SingleFlight::new();
//! let value = flight.run("answer", || 42);
//! assert_eq!(value, 42);
//!
//! // A second, non-overlapping call runs the closure again.
//! let value = flight.run("answer", || 43);
//! assert_eq!(value, 43);
//! ```

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

/// One in-flight episode: a slot for the result plus a latch for waiters.
struct Call<T> {
    result: Mutex<Option<T>>,
    done: Condvar,
}

impl<T> Call<T> {
    fn new() -> Self {
        Call {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }
}

/// Collapses concurrent calls for the same key into one execution.
///
/// `T` is the complete outcome of the work — for fallible loads, use a
/// `Result` so errors are shared with waiters exactly like values. `T` must
/// be `Clone` because every participant of an episode receives the outcome.
///
/// # Thread Safety
///
/// All methods take `&self`; the type is `Send + Sync` when `T` is `Send`.
pub struct SingleFlight<T> {
    calls: Mutex<FxHashMap<String, Arc<Call<T>>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlight<T> {
    /// Creates a coalescer with no in-flight calls.
    pub fn new() -> Self {
        SingleFlight {
            calls: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<T: Clone> SingleFlight<T> {
    /// Runs `work` for `key`, or joins an in-flight run of it.
    ///
    /// Exactly one caller per episode executes `work`; all overlapping
    /// callers block until it completes and receive a clone of the same
    /// outcome. Returns only when the episode has completed — there is no
    /// cancellation.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::thread;
    /// use ringcache::flight::SingleFlight;
    ///
    /// let flight: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
    /// let runs = Arc::new(AtomicUsize::new(0));
    ///
    /// let handles: Vec<_> = (0..4)
    ///     .map(|_| {
    ///         let flight = Arc::clone(&flight);
    ///         let runs = Arc::clone(&runs);
    ///         thread::spawn(move || {
    ///             flight.run("k", move || {
    ///                 runs.fetch_add(1, Ordering::SeqCst);
    ///                 thread::sleep(std::time::Duration::from_millis(50));
    ///                 "value".to_string()
    ///             })
    ///         })
    ///     })
    ///     .collect();
    ///
    /// for handle in handles {
    ///     assert_eq!(handle.join().unwrap(), "value");
    /// }
    /// assert_eq!(runs.load(Ordering::SeqCst), 1);
    /// ```
    pub fn run<F>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        // Check-or-insert must be atomic: either we observe an existing
        // episode or we register our own, never both.
        let (call, leader) = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let call = Arc::new(Call::new());
                    calls.insert(key.to_owned(), Arc::clone(&call));
                    (call, true)
                }
            }
        };

        if !leader {
            let mut result = call.result.lock();
            loop {
                if let Some(outcome) = result.as_ref() {
                    return outcome.clone();
                }
                call.done.wait(&mut result);
            }
        }

        // Leader path: the work runs outside every lock.
        let outcome = work();

        *call.result.lock() = Some(outcome.clone());
        self.calls.lock().remove(key);
        call.done.notify_all();

        outcome
    }
}

impl<T> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn single_caller_runs_the_work() {
        let flight: SingleFlight<&str> = SingleFlight::new();
        assert_eq!(flight.run("k", || "ok"), "ok");
    }

    #[test]
    fn overlapping_callers_share_one_execution() {
        let flight: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    flight.run("x", move || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        // Keep the episode open long enough for everyone to
                        // pile onto it.
                        thread::sleep(Duration::from_millis(100));
                        "ok".to_string()
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "ok");
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sequential_calls_each_run_the_work() {
        let flight: SingleFlight<usize> = SingleFlight::new();
        let runs = AtomicUsize::new(0);

        for _ in 0..3 {
            flight.run("x", || runs.fetch_add(1, Ordering::SeqCst));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn errors_are_shared_with_waiters() {
        let flight: Arc<SingleFlight<Result<String, String>>> = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    flight.run("broken", move || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Err("load failed".to_string())
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Err("load failed".to_string()));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_keys_do_not_coalesce() {
        let flight: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let flight = Arc::clone(&flight);
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    let key = format!("key-{i}");
                    let value = key.clone();
                    flight.run(&key, move || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        value
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn registry_is_empty_after_completion() {
        let flight: SingleFlight<u8> = SingleFlight::new();
        flight.run("k", || 1);
        assert_eq!(flight.calls.lock().len(), 0);
    }
}
