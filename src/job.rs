//! Job state: per-upload progress, results, and event queues.
//!
//! One [`Job`] exists per uploaded deck. Its entry in the [`JobStore`] is
//! written by exactly one producer (the background pipeline task) and read
//! by zero or more pollers, so a coarse `RwLock` over the whole table is
//! sufficient; no fine-grained locking is needed.
//!
//! The store is an injected value owned by the application state, never a
//! process-wide global — tests build a fresh store per case. Completed jobs
//! are retained until process restart; there is no eviction (see DESIGN.md).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a job.
///
/// `Uploading → Processing → Completed` on the happy path, or
/// `Uploading → Processing → Error` when conversion or rasterisation fails.
/// Both `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploading,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// The outcome for a single slide. Appended in slide order, never mutated
/// after append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideResult {
    /// 1-based slide index.
    pub slide: usize,
    /// OCR-extracted text (possibly empty, or an error placeholder).
    pub text: String,
    /// LLM summary, or an inline `Error: …` placeholder.
    pub summary: String,
}

/// Snapshot of one job, as returned by `GET /status/{job_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// Percentage in `0..=100`, monotonically non-decreasing.
    pub progress: u8,
    /// Human-readable description of the current stage.
    pub message: String,
    /// Per-slide results accumulated so far, ascending slide index.
    pub results: Vec<SlideResult>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Uploading,
            progress: 0,
            message: "File uploaded, starting processing...".to_string(),
            results: Vec::new(),
        }
    }

    /// Raise progress to `pct`, clamped to 100. Progress never moves
    /// backwards, so a late stage update cannot undo a newer one.
    pub fn advance_progress(&mut self, pct: u8) {
        self.progress = self.progress.max(pct.min(100));
    }
}

/// One message on a job's event queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A slide finished (successfully or with an inline error placeholder).
    Slide(SlideResult),
    /// Sentinel: no further events will arrive for this job.
    Done,
}

/// Producer half of a job entry, handed to the background task.
pub struct JobProducer {
    /// Queue feeding the `/stream/{job_id}` consumer.
    pub events: mpsc::UnboundedSender<StreamEvent>,
    /// Cancellation hook, checked between slides. No HTTP surface triggers
    /// it today; it exists so a future revision can abort in-flight jobs.
    pub cancel: CancellationToken,
}

/// Task-safe key-value store of jobs plus their event queues.
///
/// Cheap to clone; all clones share the same tables.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    /// Single-consumer receivers, taken (removed) by the first stream
    /// subscriber for each job.
    queues: Arc<Mutex<HashMap<String, mpsc::UnboundedReceiver<StreamEvent>>>>,
    cancels: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh job and wire up its event queue and cancellation
    /// token. Returns the producer half for the background task.
    pub async fn insert(&self, job: Job) -> JobProducer {
        let id = job.id.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        self.jobs.write().await.insert(id.clone(), job);
        self.queues.lock().await.insert(id.clone(), rx);
        self.cancels.lock().await.insert(id, cancel.clone());

        JobProducer { events: tx, cancel }
    }

    /// Clone a snapshot of the job, if known.
    pub async fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Apply a mutation to the job entry. Returns false for unknown ids.
    pub async fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        match self.jobs.write().await.get_mut(id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }

    /// Take the single-consumer event receiver for a job.
    ///
    /// Returns `None` both for unknown jobs and when the receiver was
    /// already taken; callers disambiguate with [`JobStore::get`].
    pub async fn take_queue(&self, id: &str) -> Option<mpsc::UnboundedReceiver<StreamEvent>> {
        self.queues.lock().await.remove(id)
    }

    /// Request cancellation of a running job. Takes effect at the next
    /// between-slides check. Returns false for unknown ids.
    pub async fn cancel(&self, id: &str) -> bool {
        match self.cancels.lock().await.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Delete a job and its queue/cancellation entries.
    pub async fn remove(&self, id: &str) {
        self.jobs.write().await.remove(id);
        self.queues.lock().await.remove(id);
        self.cancels.lock().await.remove(id);
    }

    /// Number of tracked jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
