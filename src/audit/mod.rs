//! Audit logging for finished runs
//!
//! Every `process_message` outcome is recorded with a hash of its inputs so
//! it can be inspected and checked later.

use crate::models::{ExecutionMode, ProcessResponse, ResponseStatus};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: Uuid,
    pub session_id: String,
    pub intent: String,
    pub mode: ExecutionMode,
    pub cycles: u32,
    pub status: ResponseStatus,
    pub input_hash: String,
    pub response: Arc<ProcessResponse>,
    pub reasoning_trace: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

/// Audit trail storage
pub struct AuditLog {
    records: Arc<RwLock<HashMap<Uuid, RunRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a run record
    pub async fn record(&self, record: RunRecord) -> Result<Uuid> {
        let run_id = record.run_id;
        let mut records = self.records.write().await;
        records.insert(run_id, record);
        Ok(run_id)
    }

    pub async fn get(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&run_id).cloned())
    }

    /// Run ids for a session, oldest first
    pub async fn list_for_session(&self, session_id: &str) -> Result<Vec<Uuid>> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records
            .values()
            .filter(|record| record.session_id == session_id)
            .map(|record| (record.run_id, record.created_at))
            .collect();

        items.sort_by_key(|(_, created_at)| *created_at);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }

    /// Drop records older than `ttl`, returning how many went
    pub async fn purge_older_than(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();

        records.retain(|run_id, record| {
            let expired = (now - record.created_at)
                .to_std()
                .map(|age| age > ttl)
                .unwrap_or(false);

            if expired {
                debug!(run_id = %run_id, "Run record purged");
            }
            !expired
        });

        before.saturating_sub(records.len())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Recompute the input hash of a stored record
    pub async fn verify_integrity(&self, run_id: Uuid) -> Result<bool> {
        let records = self.records.read().await;

        Ok(records
            .get(&run_id)
            .map(|r| compute_input_hash(&r.intent, &r.session_id, r.mode) == r.input_hash)
            .unwrap_or(false))
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct HashedInput<'a> {
    intent: &'a str,
    session_id: &'a str,
    mode: ExecutionMode,
}

/// SHA-256 over the run inputs, streamed straight into the hasher
pub fn compute_input_hash(intent: &str, session_id: &str, mode: ExecutionMode) -> String {
    let mut hasher = Sha256::new();
    let input = HashedInput {
        intent,
        session_id,
        mode,
    };

    if serde_json::to_writer(&mut HashWriter(&mut hasher), &input).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
