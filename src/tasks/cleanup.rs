//! TTL Cleanup Service
//!
//! Background service that periodically sweeps expired entries from a cache.
//!
//! A repeating timer enqueues one cleanup task per tick; a single worker
//! drains the queue, so sweeps never overlap. Each sweep runs on the blocking
//! pool, so a slow sweep never blocks the timer. A failed sweep is reported
//! and the service keeps running.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

/// Sweep period used when none is configured.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_millis(2000);

/// Called after each successful sweep with `(cleaned, current_size)`.
pub type CleanupCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Called with the error of each failed sweep.
pub type ErrorCallback = Arc<dyn Fn(&CacheError) + Send + Sync>;

// == Cleanupable Cache ==
/// Anything that can bulk-evict expired entries and report its size.
pub trait CleanupableCache: Send + Sync {
    fn cleanup_expired_entries(&self) -> Result<()>;

    fn size(&self) -> usize;
}

// == Cleanup Options ==
#[derive(Clone)]
pub struct CleanupOptions {
    /// Time between two enqueued sweeps
    pub interval: Duration,
    on_cleanup: Option<CleanupCallback>,
    on_error: Option<ErrorCallback>,
}

impl CleanupOptions {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_cleanup<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_cleanup = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CacheError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CLEANUP_INTERVAL,
            on_cleanup: None,
            on_error: None,
        }
    }
}

impl fmt::Debug for CleanupOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupOptions")
            .field("interval", &self.interval)
            .field("on_cleanup", &self.on_cleanup.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// One enqueued sweep.
#[derive(Debug)]
struct CleanupTask {
    scheduled_at: Instant,
}

/// Handles owned while the service is running.
struct RunState {
    timer: JoinHandle<()>,
    /// Cleared on stop so the worker discards whatever is still queued
    accepting: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    pending: Arc<AtomicUsize>,
}

// == Cleanup Service ==
/// Periodic, strictly serial expiry sweeper for one cache.
///
/// Must be started from within a tokio runtime.
pub struct CleanupService {
    cache: Arc<dyn CleanupableCache>,
    options: CleanupOptions,
    state: Mutex<Option<RunState>>,
}

impl CleanupService {
    pub fn new(cache: Arc<dyn CleanupableCache>, options: CleanupOptions) -> Self {
        Self {
            cache,
            options,
            state: Mutex::new(None),
        }
    }

    // == Start ==
    /// Arms the timer and the worker. No-op if already running.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if state.is_some() {
            return;
        }

        let interval = self.options.interval.max(Duration::from_millis(1));
        let (tx, rx) = mpsc::unbounded_channel();
        let accepting = Arc::new(AtomicBool::new(true));
        let queued = Arc::new(AtomicUsize::new(0));
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(run_worker(
            rx,
            Arc::clone(&self.cache),
            self.options.clone(),
            Arc::clone(&accepting),
            Arc::clone(&queued),
            Arc::clone(&pending),
        ));

        let timer_queued = Arc::clone(&queued);
        let timer = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                timer_queued.fetch_add(1, Ordering::SeqCst);
                let task = CleanupTask {
                    scheduled_at: Instant::now(),
                };
                if tx.send(task).is_err() {
                    break;
                }
            }
        });

        info!(
            interval_ms = interval.as_millis() as u64,
            "Background cleanup started"
        );

        *state = Some(RunState {
            timer,
            accepting,
            queued,
            pending,
        });
    }

    // == Stop ==
    /// Disarms the timer and discards queued sweeps. No-op if stopped.
    ///
    /// A sweep that is already executing runs to completion.
    pub fn stop(&self) {
        let Some(run) = self.state.lock().take() else {
            return;
        };

        run.accepting.store(false, Ordering::SeqCst);
        run.timer.abort();
        let discarded = run.queued.swap(0, Ordering::SeqCst);

        info!(discarded, "Background cleanup stopped");
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Sweeps waiting to run. Always 0 once stopped.
    pub fn queue_size(&self) -> usize {
        self.state
            .lock()
            .as_ref()
            .map_or(0, |run| run.queued.load(Ordering::SeqCst))
    }

    /// Sweeps currently executing (0 or 1).
    pub fn pending_tasks(&self) -> usize {
        self.state
            .lock()
            .as_ref()
            .map_or(0, |run| run.pending.load(Ordering::SeqCst))
    }

    pub fn interval(&self) -> Duration {
        self.options.interval
    }
}

impl Drop for CleanupService {
    fn drop(&mut self) {
        if let Some(run) = self.state.get_mut().take() {
            run.accepting.store(false, Ordering::SeqCst);
            run.timer.abort();
        }
    }
}

impl fmt::Debug for CleanupService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupService")
            .field("options", &self.options)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Drains the task queue one sweep at a time until the timer goes away.
async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<CleanupTask>,
    cache: Arc<dyn CleanupableCache>,
    options: CleanupOptions,
    accepting: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(task) = rx.recv().await {
        if !accepting.load(Ordering::SeqCst) {
            continue;
        }
        // stop() may have zeroed the counter already
        let _ = queued.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        pending.store(1, Ordering::SeqCst);
        debug!(
            waited_ms = task.scheduled_at.elapsed().as_millis() as u64,
            "Running cleanup task"
        );
        // Sweeps are O(n) and synchronous: keep them off the async workers
        let sweep_cache = Arc::clone(&cache);
        let sweep_options = options.clone();
        let running = tokio::task::spawn_blocking(move || {
            perform_cleanup(sweep_cache.as_ref(), &sweep_options)
        });
        if let Err(err) = running.await {
            warn!(error = %err, "Cleanup task did not complete");
        }
        pending.store(0, Ordering::SeqCst);
    }
    debug!("Cleanup worker exited");
}

/// One sweep: measure, evict, measure, report. Errors and panics are contained.
fn perform_cleanup(cache: &dyn CleanupableCache, options: &CleanupOptions) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| sweep(cache)))
        .unwrap_or_else(|payload| Err(CacheError::Cleanup(panic_message(payload.as_ref()))));

    match outcome {
        Ok((cleaned, size_after)) => {
            if cleaned > 0 {
                info!(cleaned, size_after, "TTL cleanup: removed expired entries");
            } else {
                debug!(size_after, "TTL cleanup: no expired entries found");
            }

            if let Some(callback) = &options.on_cleanup {
                callback(cleaned, size_after);
            }
        }
        Err(err) => {
            warn!(error = %err, "TTL cleanup failed");
            if let Some(callback) = &options.on_error {
                callback(&err);
            }
        }
    }
}

/// Returns `(cleaned, size_after)`.
fn sweep(cache: &dyn CleanupableCache) -> Result<(usize, usize)> {
    let size_before = cache.size();
    cache.cleanup_expired_entries()?;
    let size_after = cache.size();
    Ok((size_before.saturating_sub(size_after), size_after))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "cleanup panicked".to_string()
    }
}
