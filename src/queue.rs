//! Bounded job queue.
//!
//! A job is a closure handed a [`Completion`]. The job may finish
//! synchronously or hand the completion to a spawned task and signal it
//! later; the queue only counts signals. At most `parallelism` jobs are
//! outstanding at any time, and each signal frees a slot for the next
//! queued job.
//!
//! There is no cancellation or timeout. A job that never signals stalls
//! [`JobQueue::start`] forever.

use crate::error::{Result, SkillmapError};
use std::collections::{HashSet, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type Job = Box<dyn FnOnce(Completion) + Send + 'static>;

/// One-shot completion signal for a dispatched job.
///
/// `done` consumes the handle, so a job cannot report twice.
pub struct Completion {
    id: usize,
    tx: mpsc::UnboundedSender<usize>,
    signaled: bool,
}

impl Completion {
    pub fn done(mut self) {
        self.signaled = true;
        // The receiver only goes away once `start` has returned.
        let _ = self.tx.send(self.id);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.signaled {
            warn!(job = self.id, "completion dropped without signaling; job queue will stall");
        }
    }
}

pub struct JobQueue {
    parallelism: usize,
    pending: VecDeque<Job>,
    started: bool,
}

impl JobQueue {
    pub fn new(parallelism: usize) -> Result<Self> {
        if parallelism == 0 {
            return Err(SkillmapError::config("job queue parallelism must be at least 1"));
        }
        Ok(Self {
            parallelism,
            pending: VecDeque::new(),
            started: false,
        })
    }

    /// Queues a job. Rejected once `start` has been called.
    pub fn add_operation<F>(&mut self, job: F) -> Result<()>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        if self.started {
            return Err(SkillmapError::QueueStarted);
        }
        self.pending.push_back(Box::new(job));
        Ok(())
    }

    /// Runs every queued job and resolves once each one has signaled.
    /// Returns the number of completions observed.
    pub async fn start(&mut self) -> Result<usize> {
        if self.started {
            return Err(SkillmapError::QueueStarted);
        }
        self.started = true;

        let total = self.pending.len();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut in_flight: HashSet<usize> = HashSet::with_capacity(self.parallelism);
        let mut next_id = 0usize;
        let mut completed = 0usize;

        while in_flight.len() < self.parallelism {
            let Some(job) = self.pending.pop_front() else {
                break;
            };
            dispatch(job, next_id, &tx, &mut in_flight);
            next_id += 1;
        }

        while completed < total {
            let Some(id) = rx.recv().await else {
                break;
            };
            if !in_flight.remove(&id) {
                warn!(job = id, "ignoring completion for a job that is not in flight");
                continue;
            }
            completed += 1;
            debug!(job = id, completed, total, "job finished");

            if let Some(job) = self.pending.pop_front() {
                dispatch(job, next_id, &tx, &mut in_flight);
                next_id += 1;
            }
        }

        Ok(completed)
    }
}

fn dispatch(job: Job, id: usize, tx: &mpsc::UnboundedSender<usize>, in_flight: &mut HashSet<usize>) {
    in_flight.insert(id);
    job(Completion {
        id,
        tx: tx.clone(),
        signaled: false,
    });
}
