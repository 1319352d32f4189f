//! Job Queue Module
//!
//! Contract of the external unique-job queue used by distributed
//! single-flight, plus a process-local implementation of it.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::QueueError;

type Completion = watch::Receiver<Option<JobOutcome>>;

// == Job Outcome ==
/// Final state of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// The processor returned a value
    Completed(Value),
    /// The operation itself failed; carries its error serialized as JSON
    Failed(Value),
    /// The job could not be carried out: undecodable payload, unencodable
    /// result, or a crashed processor. Not an error of the operation.
    Errored(String),
}

// == Job Handle ==
/// Reference to a submitted job, used to await its outcome.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub queue: String,
    pub job_id: String,
    completion: Option<Completion>,
}

impl JobHandle {
    pub fn new(queue: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            job_id: job_id.into(),
            completion: None,
        }
    }

    fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = Some(completion);
        self
    }
}

// == Job Queue ==
/// Queue guaranteeing at most one active job per `(queue, job_id)`.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submits a job, or attaches to the active job with the same id.
    async fn submit(&self, queue: &str, job_id: &str, payload: Value) -> Result<JobHandle, QueueError>;

    /// Waits for the single completion event of a job.
    async fn await_completion(&self, handle: &JobHandle) -> Result<JobOutcome, QueueError>;
}

/// Worker function for one queue: payload in, outcome out.
pub type JobProcessor = Arc<dyn Fn(Value) -> BoxFuture<'static, JobOutcome> + Send + Sync>;

// == Typed Processor ==
/// Builds a processor from a typed async operation.
///
/// The payload's `args` field is decoded into `A`; the operation's value or
/// error is encoded back to JSON. Payloads or results that do not convert
/// end the job as [`JobOutcome::Errored`].
pub fn typed_processor<A, T, E, F, Fut>(operation: F) -> JobProcessor
where
    A: DeserializeOwned + Send + 'static,
    T: Serialize,
    E: Serialize,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let operation = Arc::new(operation);
    Arc::new(move |payload: Value| {
        let operation = Arc::clone(&operation);
        async move {
            let args = payload.get("args").cloned().unwrap_or(Value::Null);
            let args: A = match serde_json::from_value(args) {
                Ok(args) => args,
                Err(err) => return JobOutcome::Errored(format!("invalid job payload: {err}")),
            };
            let encoded = match operation(args).await {
                Ok(value) => serde_json::to_value(value).map(JobOutcome::Completed),
                Err(err) => serde_json::to_value(err).map(JobOutcome::Failed),
            };
            encoded.unwrap_or_else(|err| JobOutcome::Errored(format!("unencodable job outcome: {err}")))
        }
        .boxed()
    })
}

// == In-Memory Job Queue ==
/// Process-local [`JobQueue`].
///
/// Jobs run on the tokio runtime as soon as they are submitted and are
/// forgotten once they finish, so a later submission with the same id runs
/// again.
#[derive(Default)]
pub struct InMemoryJobQueue {
    processors: RwLock<HashMap<String, JobProcessor>>,
    active: Arc<Mutex<HashMap<(String, String), Completion>>>,
    closed: AtomicBool,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the worker for `queue`, replacing any previous one.
    pub fn register_processor(&self, queue: impl Into<String>, processor: JobProcessor) {
        self.processors.write().insert(queue.into(), processor);
    }

    /// Stops accepting submissions. Running jobs still complete.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Jobs submitted and not yet finished.
    pub fn active_jobs(&self) -> usize {
        self.active.lock().len()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn submit(&self, queue: &str, job_id: &str, payload: Value) -> Result<JobHandle, QueueError> {
        if self.is_closed() {
            return Err(QueueError::Unavailable(queue.to_string()));
        }
        let processor = self
            .processors
            .read()
            .get(queue)
            .cloned()
            .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))?;

        let key = (queue.to_string(), job_id.to_string());
        let handle = JobHandle::new(queue, job_id);

        let mut active = self.active.lock();
        if let Some(completion) = active.get(&key) {
            debug!(queue, job_id, "Attaching to active job");
            return Ok(handle.with_completion(completion.clone()));
        }

        let (tx, rx) = watch::channel(None);
        active.insert(key.clone(), rx.clone());
        drop(active);

        let registry = Arc::clone(&self.active);
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(processor(payload))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    warn!(queue = %key.0, job_id = %key.1, "Job processor panicked");
                    JobOutcome::Errored("job processor panicked".to_string())
                });
            registry.lock().remove(&key);
            let _ = tx.send(Some(outcome));
        });

        Ok(handle.with_completion(rx))
    }

    async fn await_completion(&self, handle: &JobHandle) -> Result<JobOutcome, QueueError> {
        let mut completion = handle
            .completion
            .clone()
            .ok_or_else(|| QueueError::Await(format!("job {} was not submitted here", handle.job_id)))?;

        let outcome = completion
            .wait_for(Option::is_some)
            .await
            .map_err(|_| QueueError::Await(format!("job {} ended without an outcome", handle.job_id)))?;

        outcome
            .clone()
            .ok_or_else(|| QueueError::Await(format!("job {} has no outcome", handle.job_id)))
    }
}

impl std::fmt::Debug for InMemoryJobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryJobQueue")
            .field("queues", &self.processors.read().keys().collect::<Vec<_>>())
            .field("active_jobs", &self.active_jobs())
            .field("closed", &self.is_closed())
            .finish()
    }
}
