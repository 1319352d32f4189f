//! Local Single-Flight
//!
//! Per-instance coalescing of concurrent calls with identical arguments.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, WeakShared};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use super::request_key;

type Call<T, E> = BoxFuture<'static, Result<T, E>>;

/// Map entry. Holds the call weakly so it is dropped once no caller awaits it.
struct FlightEntry<T, E> {
    id: u64,
    flight: WeakShared<Call<T, E>>,
}

type FlightMap<T, E> = Mutex<HashMap<String, FlightEntry<T, E>>>;

// == Single Flight ==
/// Coalesces concurrent calls sharing an operation name and arguments.
///
/// All callers that arrive while a call is in flight receive clones of the
/// same outcome, success or error. The entry is removed as soon as the call
/// finishes, or as soon as every caller awaiting it has been dropped, so a
/// later call starts fresh. Each instance has its own map; owners keep one
/// as a field.
pub struct SingleFlight<T, E> {
    in_flight: Arc<FlightMap<T, E>>,
    next_id: AtomicU64,
}

impl<T, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T, E> std::fmt::Debug for SingleFlight<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct calls currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    // == Run ==
    /// Runs `operation` unless an identical call is already in flight, in
    /// which case its outcome is shared.
    ///
    /// The call is registered before the operation is first polled. Arguments
    /// that cannot be serialized run directly without coalescing.
    pub async fn run<A, F, Fut>(&self, operation: &str, args: &A, f: F) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let key = match request_key(operation, args) {
            Ok(key) => key,
            Err(err) => {
                warn!(operation, error = %err, "Arguments not serializable, running without coalescing");
                return f().await;
            }
        };

        let flight = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&key).and_then(|entry| entry.flight.upgrade()) {
                Some(existing) => {
                    debug!(key = %key, "Joining in-flight request");
                    existing
                }
                None => {
                    let fut = f();
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let guard = FlightGuard {
                        in_flight: Arc::downgrade(&self.in_flight),
                        key: key.clone(),
                        id,
                    };
                    let flight = async move {
                        let _guard = guard;
                        fut.await
                    }
                    .boxed()
                    .shared();
                    if let Some(weak) = flight.downgrade() {
                        in_flight.insert(key, FlightEntry { id, flight: weak });
                    }
                    flight
                }
            }
        };

        flight.await
    }
}

/// Removes the map entry when the underlying call finishes, fails, panics or
/// is abandoned by every caller.
struct FlightGuard<T, E> {
    in_flight: Weak<FlightMap<T, E>>,
    key: String,
    id: u64,
}

impl<T, E> Drop for FlightGuard<T, E> {
    fn drop(&mut self) {
        let Some(in_flight) = self.in_flight.upgrade() else {
            return;
        };
        let mut in_flight = in_flight.lock();
        // A newer call may already own the key
        if in_flight.get(&self.key).is_some_and(|entry| entry.id == self.id) {
            in_flight.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::join_all;
    use tokio::sync::oneshot;
    use tokio::time::{sleep, Instant};
    use tokio_test::{assert_pending, assert_ready, task};

    fn slow_op(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = Result<u32, String>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(100)).await;
            Ok(value * 2)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_calls_run_once() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let results = join_all((0..10).map(|_| flight.run("double", &21, || slow_op(&calls, 21)))).await;

        assert!(results.iter().all(|r| r == &Ok(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(200), "callers must resolve together, took {elapsed:?}");
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_args_run_concurrently() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let results = join_all((1..=3).map(|n| {
            let calls = &calls;
            let flight = &flight;
            async move { flight.run("double", &n, || slow_op(calls, n)).await }
        }))
        .await;

        assert_eq!(results, vec![Ok(2), Ok(4), Ok(6)]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_shared() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all((0..5).map(|_| {
            let calls = Arc::clone(&calls);
            flight.run("fail", &(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                Err::<u32, _>("user not found".to_string())
            })
        }))
        .await;

        assert!(results.iter().all(|r| r == &Err("user not found".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_call_starts_fresh() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(flight.run("double", &1, || slow_op(&calls, 1)).await, Ok(2));
        assert_eq!(flight.run("double", &1, || slow_op(&calls, 1)).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_do_not_share_state() {
        let first: SingleFlight<u32, String> = SingleFlight::new();
        let second: SingleFlight<u32, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            first.run("double", &5, || slow_op(&calls, 5)),
            second.run("double", &5, || slow_op(&calls, 5)),
        );

        assert_eq!((a, b), (Ok(10), Ok(10)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_name_is_part_of_key() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            flight.run("double", &5, || slow_op(&calls, 5)),
            flight.run("triple", &5, || slow_op(&calls, 5)),
        );

        assert_eq!((a, b), (Ok(10), Ok(10)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registered_before_first_suspension() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let (tx, rx) = oneshot::channel::<u32>();
        let args = 7u32;

        let mut leader = task::spawn(flight.run("wait", &args, move || async move {
            rx.await.map_err(|e| e.to_string())
        }));
        assert_pending!(leader.poll());
        assert_eq!(flight.in_flight(), 1);

        let mut follower = task::spawn(flight.run("wait", &args, || async {
            Err("second caller must not run the operation".to_string())
        }));
        assert_pending!(follower.poll());

        tx.send(99).unwrap();
        assert_eq!(assert_ready!(leader.poll()), Ok(99));
        assert_eq!(assert_ready!(follower.poll()), Ok(99));
        assert_eq!(flight.in_flight(), 0);
    }

    #[test]
    fn test_cancelled_leader_does_not_strand_followers() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let (tx, rx) = oneshot::channel::<u32>();

        let mut leader = task::spawn(flight.run("wait", &1, move || async move {
            rx.await.map_err(|e| e.to_string())
        }));
        assert_pending!(leader.poll());
        let mut follower = task::spawn(flight.run("wait", &1, || async { Ok(0) }));
        assert_pending!(follower.poll());

        drop(leader);
        tx.send(5).unwrap();
        assert_eq!(assert_ready!(follower.poll()), Ok(5));
        assert_eq!(flight.in_flight(), 0);
    }

    #[test]
    fn test_abandoned_call_is_released() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let (_tx, rx) = oneshot::channel::<u32>();

        let mut leader = task::spawn(flight.run("wait", &1, move || async move {
            rx.await.map_err(|e| e.to_string())
        }));
        assert_pending!(leader.poll());
        assert_eq!(flight.in_flight(), 1);

        drop(leader);
        assert_eq!(flight.in_flight(), 0);

        let mut retry = task::spawn(flight.run("wait", &1, || async { Ok(3) }));
        assert_eq!(assert_ready!(retry.poll()), Ok(3));
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unserializable_args_run_directly() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let mut args = HashMap::new();
        args.insert((1, 1), 1);

        let result = flight.run("op", &args, || async { Ok(3) }).await;
        assert_eq!(result, Ok(3));
        assert_eq!(flight.in_flight(), 0);
    }
}
