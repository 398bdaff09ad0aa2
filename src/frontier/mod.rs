//! The crawl frontier: task model, the run-wide dedup set and the state
//! machine that turns fetched documents into follow-up tasks.

pub mod machine;
pub mod task;

pub use machine::{CrawlMachine, ListingSummary, Outcome};
pub use task::{CrawlTask, RequestMethod, TaskKind};

use dashmap::DashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// A task with the same dedup key was admitted earlier in the run.
    Duplicate,
    /// The task ceiling was reached or the frontier was closed.
    Closed,
}

/// Run-wide set of admitted dedup keys plus the optional task ceiling.
///
/// Admission is an atomic check-and-insert, so two workers discovering the
/// same record id concurrently admit it once.
#[derive(Debug)]
pub struct Frontier {
    seen: DashSet<String>,
    admitted: AtomicUsize,
    max_tasks: Option<usize>,
    closed: CancellationToken,
}

impl Frontier {
    pub fn new(max_tasks: Option<usize>) -> Self {
        Self {
            seen: DashSet::new(),
            admitted: AtomicUsize::new(0),
            max_tasks,
            closed: CancellationToken::new(),
        }
    }

    pub fn admit(&self, task: &CrawlTask) -> Admission {
        if self.closed.is_cancelled() {
            return Admission::Closed;
        }
        if !self.seen.insert(task.dedup_key.clone()) {
            debug!(key = %task.dedup_key, "Skipping duplicate task");
            return Admission::Duplicate;
        }

        let reserved = self
            .admitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| match self.max_tasks {
                Some(max) if count >= max => None,
                _ => Some(count + 1),
            });
        if reserved.is_err() {
            self.seen.remove(&task.dedup_key);
            if !self.closed.is_cancelled() {
                info!("Task ceiling reached, no new tasks will be admitted");
                self.closed.cancel();
            }
            return Admission::Closed;
        }

        Admission::Accepted
    }

    /// Stop admitting tasks. Already admitted tasks are unaffected.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the frontier stops admitting tasks.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::SeqCst)
    }
}
