//! Background jobs.
//!
//! Deferred renders and operator-initiated moves are handed to a
//! [`TaskQueue`]. Delivery is at-least-once, so every job must tolerate
//! redelivery: a render job simply renders again, and a move job whose source
//! already redirects to its destination does nothing.

use std::sync::{Arc, Mutex, mpsc};

use scribe_store::DocumentId;

use crate::error::WikiError;
use crate::wiki::Wiki;

/// Render one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderJob {
    pub document: DocumentId,
    pub cache_control: Option<String>,
    pub base_url: Option<String>,
}

/// Move the subtree rooted at `(locale, old_slug)` to `new_slug`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveJob {
    pub locale: String,
    pub old_slug: String,
    pub new_slug: String,
    pub user: String,
}

/// A queued unit of work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Job {
    Render(RenderJob),
    Move(MoveJob),
}

/// Accepts jobs for later execution.
pub trait TaskQueue: Send + Sync {
    /// Queue a job.
    fn enqueue(&self, job: Job) -> Result<(), WikiError>;
}

/// Queue that drops every job.
///
/// Dropped render jobs leave their document in the scheduled state, where
/// [`Wiki::render_pending_documents`] picks them up.
#[derive(Debug, Default)]
pub struct NullQueue;

impl TaskQueue for NullQueue {
    fn enqueue(&self, job: Job) -> Result<(), WikiError> {
        tracing::debug!(?job, "No task queue configured, dropping job");
        Ok(())
    }
}

/// In-process queue over a std channel.
pub struct ChannelQueue {
    tx: mpsc::Sender<Job>,
    rx: Mutex<mpsc::Receiver<Job>>,
}

impl Default for ChannelQueue {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

impl ChannelQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next job without blocking.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn try_next(&self) -> Option<Job> {
        self.rx.lock().unwrap().try_recv().ok()
    }
}

impl TaskQueue for ChannelQueue {
    fn enqueue(&self, job: Job) -> Result<(), WikiError> {
        tracing::debug!(?job, "Queued job");
        self.tx
            .send(job)
            .map_err(|_| WikiError::validation("task queue is closed"))
    }
}

/// Outcome of draining a queue.
#[derive(Debug, Default)]
pub struct WorkerReport {
    /// Jobs that completed.
    pub completed: usize,
    /// Jobs that failed, with their errors.
    pub failed: Vec<(Job, WikiError)>,
}

/// Executes jobs from a [`ChannelQueue`] against a [`Wiki`].
pub struct Worker {
    wiki: Arc<Wiki>,
    queue: Arc<ChannelQueue>,
}

impl Worker {
    /// Worker draining `queue` into `wiki`.
    #[must_use]
    pub fn new(wiki: Arc<Wiki>, queue: Arc<ChannelQueue>) -> Self {
        Self { wiki, queue }
    }

    /// Run every job currently queued, including jobs queued while running.
    pub fn run_pending(&self) -> WorkerReport {
        let mut report = WorkerReport::default();
        while let Some(job) = self.queue.try_next() {
            match self.run(&job) {
                Ok(()) => report.completed += 1,
                Err(e) => {
                    tracing::warn!(?job, "Job failed: {e}");
                    report.failed.push((job, e));
                }
            }
        }
        report
    }

    /// Run one job.
    pub fn run(&self, job: &Job) -> Result<(), WikiError> {
        match job {
            Job::Render(render) => self.run_render(render),
            Job::Move(job) => self.wiki.run_move_job(job).map(|_| ()),
        }
    }

    fn run_render(&self, job: &RenderJob) -> Result<(), WikiError> {
        match self.wiki.render(
            job.document,
            job.cache_control.as_deref(),
            job.base_url.as_deref(),
            None,
        ) {
            Ok(_) => Ok(()),
            Err(WikiError::RenderingInProgress) => {
                tracing::debug!(document = %job.document, "Render already running, skipping job");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
