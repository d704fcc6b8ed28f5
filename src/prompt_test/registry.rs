//! In-memory tracking of submitted prompt-test jobs.

use std::collections::HashMap;

use super::PromptTestJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Polling,
    Settled,
}

#[derive(Debug, Clone)]
struct Entry {
    snapshot: PromptTestJob,
    state: JobState,
}

/// Outcome of applying a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    StillPolling,
    /// The job settled with this snapshot.
    Settled,
    /// Unknown id or already settled; nothing changed.
    Ignored,
}

/// Latest known snapshot per job, split into polling and settled.
///
/// A job moves from polling to settled at most once and never back.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly created job. Returns `false` for a duplicate id.
    pub fn register(&mut self, job: PromptTestJob) -> bool {
        if self.entries.contains_key(&job.id) {
            return false;
        }
        self.order.push(job.id.clone());
        self.entries.insert(
            job.id.clone(),
            Entry {
                snapshot: job,
                state: JobState::Polling,
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, job_id: &str) -> Option<&PromptTestJob> {
        self.entries.get(job_id).map(|e| &e.snapshot)
    }

    pub fn is_settled(&self, job_id: &str) -> bool {
        self.entries
            .get(job_id)
            .is_some_and(|e| e.state == JobState::Settled)
    }

    /// Ids still being polled, in registration order.
    pub fn polling_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| !self.is_settled(id))
            .cloned()
            .collect()
    }

    pub fn settled_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.state == JobState::Settled)
            .count()
    }

    pub fn all_settled(&self) -> bool {
        self.settled_count() == self.len()
    }

    /// Replace the snapshot of the polling job registered as `job_id` and
    /// settle it if complete. The snapshot is stored under `job_id` even when
    /// the service echoes the id back differently.
    pub fn refresh(&mut self, job_id: &str, job: PromptTestJob) -> Refresh {
        let Some(entry) = self.entries.get_mut(job_id) else {
            return Refresh::Ignored;
        };
        if entry.state == JobState::Settled {
            return Refresh::Ignored;
        }
        let complete = job.is_complete();
        entry.snapshot = job;
        if complete {
            entry.state = JobState::Settled;
            Refresh::Settled
        } else {
            Refresh::StillPolling
        }
    }

    /// Every known job's latest snapshot, ordered by registered id.
    pub fn snapshots(&self) -> Vec<PromptTestJob> {
        self.sorted(|_| true)
    }

    /// Settled jobs only, ordered by registered id.
    pub fn settled_jobs(&self) -> Vec<PromptTestJob> {
        self.sorted(|e| e.state == JobState::Settled)
    }

    fn sorted(&self, keep: impl Fn(&Entry) -> bool) -> Vec<PromptTestJob> {
        let mut ids: Vec<&String> = self.order.iter().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| keep(*e))
            .map(|e| e.snapshot.clone())
            .collect()
    }
}
