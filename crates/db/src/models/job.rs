//! Durable queue jobs.

use marketsync_core::queue::{
    catalog_import_key, webhook_job_key, CatalogImportPayload, WebhookJobPayload,
    CATALOG_IMPORT_JOB, CATALOG_IMPORT_MAX_ATTEMPTS, CATALOG_IMPORT_QUEUE, WEBHOOK_MAX_ATTEMPTS,
    WEBHOOK_QUEUE,
};
use marketsync_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{JobStatus, StatusId};

/// A row from the `queued_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueuedJob {
    pub id: DbId,
    pub queue: String,
    pub name: String,
    pub unique_key: Option<String>,
    pub payload: serde_json::Value,
    pub status_id: StatusId,
    /// Attempts started so far, including the current one while active.
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: Timestamp,
    pub last_error: Option<String>,
    pub locked_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl QueuedJob {
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::from_id(self.status_id)
    }

    /// Decode the payload into a typed job payload.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// DTO for enqueueing a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub queue: String,
    pub name: String,
    pub unique_key: Option<String>,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
}

impl NewJob {
    /// A processing job for a stored webhook, partitioned by `job_name`.
    pub fn webhook(job_name: &str, payload: &WebhookJobPayload) -> Result<Self, serde_json::Error> {
        Ok(Self {
            queue: WEBHOOK_QUEUE.to_string(),
            name: job_name.to_string(),
            unique_key: Some(webhook_job_key(job_name, payload.webhook_id)),
            payload: serde_json::to_value(payload)?,
            max_attempts: WEBHOOK_MAX_ATTEMPTS as i32,
        })
    }

    /// A catalog import page for a tenant.
    pub fn catalog_import(payload: &CatalogImportPayload) -> Result<Self, serde_json::Error> {
        Ok(Self {
            queue: CATALOG_IMPORT_QUEUE.to_string(),
            name: CATALOG_IMPORT_JOB.to_string(),
            unique_key: Some(catalog_import_key(payload.tenant_id)),
            payload: serde_json::to_value(payload)?,
            max_attempts: CATALOG_IMPORT_MAX_ATTEMPTS as i32,
        })
    }
}

/// Where a failed attempt left the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Back to waiting; due again at `run_at`.
    Retrying { run_at: Timestamp },
    /// Attempts exhausted; retained for inspection.
    Failed,
}
