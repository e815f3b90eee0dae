//! Background message processing
//!
//! `POST /api/jobs` hands a message to the runtime and returns immediately.
//! Callers poll for the result or abort the job; dropping the task is the
//! only cancellation mechanism.

use crate::models::ProcessResponse;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Point-in-time view of a job, safe to hand out
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessResponse>,
}

struct JobEntry {
    status: JobStatus,
    created_at: DateTime<Utc>,
    result: Option<ProcessResponse>,
    abort: Option<AbortHandle>,
}

impl JobEntry {
    fn snapshot(&self, job_id: Uuid) -> JobSnapshot {
        JobSnapshot {
            job_id,
            status: self.status,
            created_at: self.created_at,
            result: self.result.clone(),
        }
    }
}

#[derive(Clone, Default)]
pub struct JobTracker {
    jobs: Arc<DashMap<Uuid, JobEntry>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` on the runtime and track it under a fresh job id
    pub fn submit<F>(&self, work: F) -> Uuid
    where
        F: Future<Output = ProcessResponse> + Send + 'static,
    {
        let job_id = Uuid::new_v4();

        // entry must exist before the task can finish
        self.jobs.insert(
            job_id,
            JobEntry {
                status: JobStatus::Pending,
                created_at: Utc::now(),
                result: None,
                abort: None,
            },
        );

        let jobs = self.jobs.clone();
        let handle = tokio::spawn(async move {
            let response = work.await;
            if let Some(mut entry) = jobs.get_mut(&job_id) {
                if entry.status == JobStatus::Pending {
                    entry.status = JobStatus::Completed;
                    entry.result = Some(response);
                    entry.abort = None;
                }
            }
            debug!(job_id = %job_id, "Job finished");
        });

        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            if entry.status == JobStatus::Pending {
                entry.abort = Some(handle.abort_handle());
            }
        }

        info!(job_id = %job_id, "Job submitted");
        job_id
    }

    pub fn get(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.jobs.get(&job_id).map(|entry| entry.snapshot(job_id))
    }

    /// Abort a pending job. Finished jobs are returned unchanged.
    pub fn cancel(&self, job_id: Uuid) -> Option<JobSnapshot> {
        let mut entry = self.jobs.get_mut(&job_id)?;

        if entry.status == JobStatus::Pending {
            if let Some(abort) = entry.abort.take() {
                abort.abort();
            }
            entry.status = JobStatus::Cancelled;
            info!(job_id = %job_id, "Job cancelled");
        }

        Some(entry.snapshot(job_id))
    }

    /// Drop jobs created more than `ttl` ago, aborting any still running
    pub fn purge_older_than(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let before = self.jobs.len();

        self.jobs.retain(|job_id, entry| {
            let expired = (now - entry.created_at)
                .to_std()
                .map(|age| age > ttl)
                .unwrap_or(false);

            if expired {
                if let Some(abort) = entry.abort.take() {
                    abort.abort();
                }
                debug!(job_id = %job_id, "Job purged");
            }
            !expired
        });

        before.saturating_sub(self.jobs.len())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
