//! Distributed Single-Flight
//!
//! Coalesces identical calls across processes by submitting them to a
//! unique-job queue. Any coordination failure degrades to direct execution.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::queue::{JobOutcome, JobQueue};
use super::request_key;
use crate::error::QueueError;

// == Distributed Single Flight ==
#[derive(Clone)]
pub struct DistributedSingleFlight {
    namespace: String,
    queue: Option<Arc<dyn JobQueue>>,
    queue_name: Option<String>,
}

impl DistributedSingleFlight {
    /// Creates a coordinator scoped to `namespace`.
    ///
    /// Without a queue every call runs directly and nothing is coalesced.
    pub fn new(namespace: impl Into<String>, queue: Option<Arc<dyn JobQueue>>) -> Self {
        Self {
            namespace: namespace.into(),
            queue,
            queue_name: None,
        }
    }

    /// Routes every operation to one queue instead of one queue per operation.
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn has_queue(&self) -> bool {
        self.queue.is_some()
    }

    /// Queue that jobs for `operation` are submitted to.
    pub fn queue_name(&self, operation: &str) -> String {
        let suffix = self.queue_name.as_deref().unwrap_or(operation);
        format!("{}:{}", self.namespace, suffix)
    }

    /// Job identity: `namespace:operation:json(args)`.
    pub fn job_id<A: Serialize + ?Sized>(&self, operation: &str, args: &A) -> serde_json::Result<String> {
        Ok(format!("{}:{}", self.namespace, request_key(operation, args)?))
    }

    // == Run ==
    /// Submits (or attaches to) the job for this call and returns its outcome.
    ///
    /// A failed job is decoded into `E` and returned as the caller's error.
    /// When the queue is missing, the job cannot be coordinated, or the job
    /// errored on the queue side, `f` runs locally instead.
    pub async fn run<A, T, E, F, Fut>(&self, operation: &str, args: &A, f: F) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
        E: DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(queue) = self.queue.as_deref() else {
            debug!(operation, namespace = %self.namespace, "No job queue configured, running directly");
            return f().await;
        };

        let outcome = match self.coordinate(queue, operation, args).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(operation, error = %err, "Job coordination failed, running directly");
                return f().await;
            }
        };

        match outcome {
            JobOutcome::Completed(value) => match serde_json::from_value(value) {
                Ok(value) => Ok(value),
                Err(err) => {
                    warn!(operation, error = %err, "Undecodable job result, running directly");
                    f().await
                }
            },
            JobOutcome::Failed(reason) => match serde_json::from_value(reason) {
                Ok(err) => Err(err),
                Err(err) => {
                    warn!(operation, error = %err, "Undecodable job failure, running directly");
                    f().await
                }
            },
            JobOutcome::Errored(reason) => {
                warn!(operation, reason = %reason, "Job errored in the queue, running directly");
                f().await
            }
        }
    }

    async fn coordinate<A>(&self, queue: &dyn JobQueue, operation: &str, args: &A) -> Result<JobOutcome, QueueError>
    where
        A: Serialize + ?Sized,
    {
        let queue_name = self.queue_name(operation);
        let job_id = self.job_id(operation, args)?;
        let payload = json!({ "args": serde_json::to_value(args)? });

        let handle = queue.submit(&queue_name, &job_id, payload).await?;
        debug!(queue = %queue_name, job_id = %job_id, "Awaiting job completion");
        queue.await_completion(&handle).await
    }
}

impl std::fmt::Debug for DistributedSingleFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedSingleFlight")
            .field("namespace", &self.namespace)
            .field("queue_name", &self.queue_name)
            .field("has_queue", &self.has_queue())
            .finish()
    }
}
