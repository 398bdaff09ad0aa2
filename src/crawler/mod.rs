//! Bounded worker pool that drives the frontier to completion.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::{signal, sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::fetcher::{FetchError, Fetcher};
use crate::frontier::{Admission, CrawlMachine, CrawlTask, Frontier, Outcome, TaskKind};
use crate::pagination::EndReason;
use crate::sink::RecordSink;
use crate::validation::{Emission, RecordGate};

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub concurrency: usize,
    /// Ceiling on tasks admitted during the run.
    pub max_tasks: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_tasks: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetStats {
    pub label: String,
    pub listing_pages: usize,
    pub stubs: usize,
    pub detail_tasks: usize,
    pub records: usize,
    pub failures: usize,
    /// Why the pagination walk ended, once it has.
    pub end: Option<EndReason>,
}

/// Run summary. A run succeeds when its queue drains, however many
/// individual tasks failed.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub completed: usize,
    pub failed: usize,
    pub bot_detected: usize,
    pub records_emitted: usize,
    pub records_rejected: usize,
    pub stubs_dropped: usize,
    pub duplicates_skipped: usize,
    /// Tasks refused because the ceiling was reached.
    pub refused: usize,
    /// Admitted tasks never dispatched because of shutdown.
    pub abandoned: usize,
    pub targets: BTreeMap<String, TargetStats>,
}

impl CrawlReport {
    fn new(run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            started_at: now,
            finished_at: now,
            completed: 0,
            failed: 0,
            bot_detected: 0,
            records_emitted: 0,
            records_rejected: 0,
            stubs_dropped: 0,
            duplicates_skipped: 0,
            refused: 0,
            abandoned: 0,
            targets: BTreeMap::new(),
        }
    }

    fn target(&mut self, task: &CrawlTask) -> &mut TargetStats {
        let target = task.target();
        self.targets
            .entry(target.key.clone())
            .or_insert_with(|| TargetStats {
                label: target.label.clone(),
                ..TargetStats::default()
            })
    }
}

struct TaskResult {
    task: CrawlTask,
    outcome: Result<Outcome, FetchError>,
}

/// Main supervisor that dispatches crawl tasks
pub struct CrawlSupervisor {
    fetcher: Arc<dyn Fetcher>,
    machine: Arc<CrawlMachine>,
    gate: RecordGate,
    frontier: Arc<Frontier>,
    config: WorkerConfig,
    run_id: Uuid,
    shutdown_token: CancellationToken,
}

impl CrawlSupervisor {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn RecordSink>,
        machine: CrawlMachine,
        config: WorkerConfig,
    ) -> Self {
        Self {
            fetcher,
            machine: Arc::new(machine),
            gate: RecordGate::new(sink),
            frontier: Arc::new(Frontier::new(config.max_tasks)),
            config,
            run_id: Uuid::new_v4(),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Cancelling this stops dispatch; in-flight tasks still finish.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    /// Run until the queue drains or shutdown is requested.
    pub async fn run(self, initial: Vec<CrawlTask>) -> Result<CrawlReport> {
        info!("Starting crawl {}", self.run_id);
        info!(
            "Configuration - concurrency: {}, max_tasks: {:?}",
            self.config.concurrency, self.config.max_tasks
        );

        let mut report = CrawlReport::new(self.run_id);
        let mut queue = VecDeque::new();
        for task in initial {
            self.enqueue(task, &mut queue, &mut report);
        }

        let shutdown_token = self.shutdown_token.clone();
        let frontier = self.frontier.clone();
        let signal_handle = tokio::spawn(async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Received shutdown signal, finishing in-flight tasks...");
            frontier.close();
            shutdown_token.cancel();
        });

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut running: JoinSet<TaskResult> = JoinSet::new();

        loop {
            while !self.shutdown_token.is_cancelled() && !queue.is_empty() {
                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    break;
                };
                let Some(task) = queue.pop_front() else {
                    break;
                };
                self.dispatch(task, permit, &mut running);
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                joined = running.join_next() => match joined {
                    Some(Ok(result)) => self.apply(result, &mut queue, &mut report).await,
                    Some(Err(e)) => {
                        error!("Crawl task panicked: {}", e);
                        report.failed += 1;
                    }
                    None => {}
                },
                _ = self.shutdown_token.cancelled() => {
                    // Drain without dispatching; the loop exits once running is empty.
                    while let Some(joined) = running.join_next().await {
                        match joined {
                            Ok(result) => self.apply(result, &mut queue, &mut report).await,
                            Err(e) => {
                                error!("Crawl task panicked: {}", e);
                                report.failed += 1;
                            }
                        }
                    }
                }
            }
        }

        signal_handle.abort();

        report.abandoned = queue.len();
        report.finished_at = Utc::now();
        info!(
            completed = report.completed,
            failed = report.failed,
            records = report.records_emitted,
            abandoned = report.abandoned,
            "Crawl {} finished",
            self.run_id
        );
        Ok(report)
    }

    fn enqueue(&self, task: CrawlTask, queue: &mut VecDeque<CrawlTask>, report: &mut CrawlReport) {
        match self.frontier.admit(&task) {
            Admission::Accepted => {
                if matches!(task.kind, TaskKind::Detail { .. }) {
                    report.target(&task).detail_tasks += 1;
                }
                queue.push_back(task);
            }
            Admission::Duplicate => report.duplicates_skipped += 1,
            Admission::Closed => report.refused += 1,
        }
    }

    fn dispatch(
        &self,
        task: CrawlTask,
        permit: tokio::sync::OwnedSemaphorePermit,
        running: &mut JoinSet<TaskResult>,
    ) {
        let fetcher = self.fetcher.clone();
        let machine = self.machine.clone();
        let span = info_span!("task", key = %task.dedup_key, kind = task.kind.label());

        running.spawn(
            async move {
                let _permit = permit; // Hold permit until the task completes
                debug!("Fetching {}", task.url);
                let outcome = fetcher
                    .fetch(&task)
                    .await
                    .map(|page| machine.advance(&task, &page));
                TaskResult { task, outcome }
            }
            .instrument(span),
        );
    }

    async fn apply(
        &self,
        result: TaskResult,
        queue: &mut VecDeque<CrawlTask>,
        report: &mut CrawlReport,
    ) {
        let TaskResult { task, outcome } = result;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.is_bot_detection() {
                    report.bot_detected += 1;
                }
                error!(key = %task.dedup_key, url = %task.url, "Abandoning task: {}", err);
                report.failed += 1;
                report.target(&task).failures += 1;
                return;
            }
        };
        report.completed += 1;

        if let Some(listing) = &outcome.listing {
            report.stubs_dropped += listing.dropped_rows;
            let stats = report.target(&task);
            stats.listing_pages += 1;
            stats.stubs += listing.stubs;
            if listing.end.is_some() {
                stats.end = listing.end;
            }
        }

        if let Some(record) = outcome.record {
            match self.gate.submit(record).await {
                Ok(Emission::Upserted) => {
                    report.records_emitted += 1;
                    report.target(&task).records += 1;
                }
                Ok(Emission::Rejected) => report.records_rejected += 1,
                Err(e) => {
                    warn!(key = %task.dedup_key, "Record not stored: {}", e);
                    report.failed += 1;
                    report.target(&task).failures += 1;
                }
            }
        }

        for follow_up in outcome.follow_ups {
            self.enqueue(follow_up, queue, report);
        }
    }
}

/// Crawl every configured target and seed URL into `sink`.
pub async fn crawl(
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn RecordSink>,
) -> Result<CrawlReport> {
    let targets = if config.seed_urls.is_empty() || !config.targets.is_empty() {
        config.resolve_targets()?
    } else {
        Vec::new()
    };

    let machine = CrawlMachine::new(config.site.clone(), config.policy);
    let initial = machine.initial_tasks(&targets, &config.seed_urls);
    info!(
        targets = targets.len(),
        seeds = config.seed_urls.len(),
        "Resolved crawl targets"
    );

    CrawlSupervisor::new(fetcher, sink, machine, config.worker.clone())
        .run(initial)
        .await
}
