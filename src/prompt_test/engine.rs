//! Prompt-test orchestration: create one job per (prompt, model) pair and
//! poll every job until it settles.
//!
//! Polling is sequential: each round fetches the still-polling jobs one at a
//! time in registration order, reports the round to the observer, then
//! sleeps for the poll interval. A failed fetch keeps the previous snapshot
//! and the job is polled again next round. Without a deadline or a stop
//! signal the loop runs until every job settles.

use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::registry::{JobRegistry, Refresh};
use super::{PromptTestJob, PromptTestSpec};
use crate::client::ScorableClient;
use crate::config::POLL_INTERVAL_SECS;
use crate::error::{ScorableError, ScorableResult};
use crate::resources::prompt_tests::CreatePromptTest;

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Give up after this long. `None` polls until every job settles.
    pub deadline: Option<Duration>,
    /// Polling stops once `true` is observed.
    pub stop: Option<watch::Receiver<bool>>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            deadline: None,
            stop: None,
        }
    }
}

impl PollOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }
}

/// Progress callbacks. Every method defaults to a no-op.
pub trait PollObserver {
    fn on_job_created(&mut self, _job: &PromptTestJob) {}

    fn on_job_creation_failed(&mut self, _prompt: &str, _model: &str, _error: &ScorableError) {}

    fn on_fetch_failed(&mut self, _job_id: &str, _error: &ScorableError) {}

    /// Called exactly once per job, when it settles.
    fn on_settled(&mut self, _job: &PromptTestJob) {}

    /// Called after every polling round with all known jobs, ordered by id.
    fn on_round(&mut self, _jobs: &[PromptTestJob]) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PollObserver for NoopObserver {}

/// Create one job per (prompt, model) pair.
///
/// A pair whose creation fails is reported and skipped. Fails with
/// `NoJobsCreated` when nothing could be created.
pub async fn submit(
    client: &ScorableClient,
    spec: &PromptTestSpec,
    observer: &mut dyn PollObserver,
) -> ScorableResult<JobRegistry> {
    spec.validate()?;

    let prompt_tests = client.prompt_tests();
    let mut registry = JobRegistry::new();

    for (prompt, model) in spec.combinations() {
        let request = CreatePromptTest::from_spec(spec, prompt, model);
        match prompt_tests.create_prompt_test(&request).await {
            Ok(job) => {
                info!(job_id = %job.id, model = %model, "Created prompt test");
                observer.on_job_created(&job);
                registry.register(job);
            }
            Err(e) => {
                warn!(
                    model = %model,
                    prompt = %prompt,
                    "Failed to create prompt test: {}",
                    e
                );
                observer.on_job_creation_failed(prompt, model, &e);
            }
        }
    }

    if registry.is_empty() {
        return Err(ScorableError::NoJobsCreated);
    }
    Ok(registry)
}

/// Poll every unsettled job until all are settled, then return the settled
/// jobs ordered by id.
///
/// Returns immediately, without any request, when the registry is already
/// fully settled.
pub async fn await_completion(
    client: &ScorableClient,
    registry: &mut JobRegistry,
    options: PollOptions,
    observer: &mut dyn PollObserver,
) -> ScorableResult<Vec<PromptTestJob>> {
    let prompt_tests = client.prompt_tests();
    let started = Instant::now();
    let mut stop_rx = options.stop;
    let mut round = 0u64;

    while !registry.all_settled() {
        if stop_rx.as_ref().is_some_and(|rx| *rx.borrow()) {
            info!(round, "Prompt test polling cancelled");
            return Err(ScorableError::Cancelled);
        }

        round += 1;
        for job_id in registry.polling_ids() {
            match prompt_tests.get_prompt_test(&job_id).await {
                Ok(job) => {
                    let finished = job.finished_tasks();
                    let total = job.tasks.len();
                    if registry.refresh(&job_id, job) == Refresh::Settled {
                        info!(job_id = %job_id, round, "Prompt test completed");
                        if let Some(settled) = registry.get(&job_id) {
                            observer.on_settled(settled);
                        }
                    } else {
                        debug!(job_id = %job_id, finished, total, "Prompt test still running");
                    }
                }
                Err(e) => {
                    warn!(job_id = %job_id, "Could not retrieve prompt test status: {}", e);
                    observer.on_fetch_failed(&job_id, &e);
                }
            }
        }

        observer.on_round(&registry.snapshots());

        if registry.all_settled() {
            break;
        }

        if let Some(deadline) = options.deadline {
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                warn!(
                    settled = registry.settled_count(),
                    total = registry.len(),
                    "Prompt test deadline exceeded"
                );
                return Err(ScorableError::DeadlineExceeded { elapsed });
            }
        }

        sleep_or_stop(options.interval, &mut stop_rx).await;
    }

    info!(jobs = registry.len(), rounds = round, "All prompt tests completed");
    Ok(registry.settled_jobs())
}

/// Sleep for `interval`, waking early when the stop signal changes. A dropped
/// sender disables the signal for the rest of the run.
async fn sleep_or_stop(interval: Duration, stop_rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = stop_rx.as_mut() else {
        tokio::time::sleep(interval).await;
        return;
    };

    let sender_dropped = tokio::select! {
        _ = tokio::time::sleep(interval) => false,
        changed = rx.changed() => changed.is_err(),
    };
    if sender_dropped {
        *stop_rx = None;
        tokio::time::sleep(interval).await;
    }
}
