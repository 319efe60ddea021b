//! Request coalescing
//!
//! Concurrent callers asking for the same key share one in-flight future
//! instead of each starting their own. The key is forgotten when the flight
//! settles, so a later caller starts fresh work rather than observing a
//! stale result. Waiters that give up early only release their share; the
//! flight is dropped, and its work cancelled, once the last waiter is gone.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type Flight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Slot<V, E>
where
    V: Clone,
    E: Clone,
{
    /// Distinguishes successive flights for the same key
    id: u64,
    flight: Flight<V, E>,
    waiters: usize,
}

type Registry<V, E> = Arc<Mutex<HashMap<String, Slot<V, E>>>>;

/// Per-key in-flight deduplication
pub struct SingleFlight<V, E>
where
    V: Clone,
    E: Clone,
{
    in_flight: Registry<V, E>,
    next_id: AtomicU64,
}

/// One waiter's share of a flight, released on exit whether the waiter
/// finished or was dropped
struct WaiterGuard<'a, V: Clone, E: Clone> {
    registry: &'a Registry<V, E>,
    key: &'a str,
    id: u64,
}

impl<V: Clone, E: Clone> Drop for WaiterGuard<'_, V, E> {
    fn drop(&mut self) {
        let mut in_flight = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let abandoned = match in_flight.get_mut(self.key) {
            Some(slot) if slot.id == self.id => {
                slot.waiters = slot.waiters.saturating_sub(1);
                slot.waiters == 0
            }
            _ => false,
        };
        if abandoned {
            tracing::debug!(key = self.key, "Last waiter left, dropping flight");
            in_flight.remove(self.key);
        }
    }
}

/// Forget `key` if it still maps to flight `id`
fn settle<V: Clone, E: Clone>(registry: &Registry<V, E>, key: &str, id: u64) {
    let mut in_flight = registry.lock().unwrap_or_else(PoisonError::into_inner);
    if in_flight.get(key).is_some_and(|slot| slot.id == id) {
        in_flight.remove(key);
    }
}

impl<V, E> SingleFlight<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `make()` unless a flight for `key` is already pending, in which
    /// case wait for that one's result instead.
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (id, flight) = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get_mut(key) {
                Some(slot) => {
                    tracing::debug!(key, waiters = slot.waiters, "Joining in-flight request");
                    slot.waiters += 1;
                    (slot.id, slot.flight.clone())
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let registry = Arc::clone(&self.in_flight);
                    let owned_key = key.to_string();
                    let work = make();

                    let flight = async move {
                        let result = work.await;
                        settle(&registry, &owned_key, id);
                        result
                    }
                    .boxed()
                    .shared();

                    in_flight.insert(
                        key.to_string(),
                        Slot {
                            id,
                            flight: flight.clone(),
                            waiters: 1,
                        },
                    );
                    (id, flight)
                }
            }
        };

        let guard = WaiterGuard {
            registry: &self.in_flight,
            key,
            id,
        };
        let result = flight.await;
        drop(guard);
        result
    }

    /// Number of keys with a pending flight
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<V, E> Default for SingleFlight<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<u32, String>(7)
            }
        };

        let (a, b, c) = tokio::join!(
            flights.run("adsb:mil", make()),
            flights.run("adsb:mil", make()),
            flights.run("adsb:mil", make()),
        );

        assert_eq!((a, b, c), (Ok(7), Ok(7), Ok(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let flights: SingleFlight<&'static str, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |key: &'static str| {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<&'static str, String>(key)
            }
        };

        let (a, b) = tokio::join!(
            flights.run("fr24:all", make("fr24:all")),
            flights.run("opensky:all", make("opensky:all")),
        );

        assert_eq!(a, Ok("fr24:all"));
        assert_eq!(b, Ok("opensky:all"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_not_remembered() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();

        let first = flights
            .run("k", || async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert_eq!(first, Err("boom".to_string()));
        assert_eq!(flights.in_flight(), 0);

        let second = flights.run("k", || async { Ok::<u32, String>(1) }).await;
        assert_eq!(second, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_giving_up_keeps_flight_shared() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok::<u32, String>(9)
            }
        };

        let first = flights.run("opensky:all", make());
        let impatient = async {
            tokio::time::timeout(Duration::from_millis(20), flights.run("opensky:all", make())).await
        };
        let late = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(flights.in_flight(), 1, "flight still registered after a waiter left");
            flights.run("opensky:all", make()).await
        };

        let (first, impatient, late) = tokio::join!(first, impatient, late);

        assert_eq!(first, Ok(9));
        assert!(impatient.is_err());
        assert_eq!(late, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_settled_flight_is_forgotten_before_waiters_return() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();

        let result = flights.run("k", || async { Ok::<u32, String>(1) }).await;

        assert_eq!(result, Ok(1));
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_dropped_waiter_releases_key() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();

        let pending = flights.run("k", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<u32, String>(1)
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(20), pending).await;

        assert!(timed_out.is_err());
        assert_eq!(flights.in_flight(), 0);
    }
}
