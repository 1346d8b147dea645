//! Webhook processors.
//!
//! Both processors share the same bookkeeping around their domain logic:
//! load the record, mark it `PROCESSING`, apply, then mark it `COMPLETED`
//! or `FAILED` (bumping `retry_count`) and hand the error back to the
//! queue. Jobs whose event type belongs to another family are
//! acknowledged without touching anything.

pub mod inventory;
pub mod order;

pub use inventory::InventoryProcessor;
pub use order::OrderProcessor;

use marketsync_core::events::EventFamily;
use marketsync_core::queue::{WebhookJobPayload, WEBHOOK_MAX_ATTEMPTS};
use marketsync_db::models::job::QueuedJob;
use marketsync_db::models::webhook::WebhookRecord;
use marketsync_db::Store;

use crate::error::ProcessError;
use crate::runner::JobOutcome;

/// Load and claim the record a webhook job points at.
///
/// Returns `None` when the job should be acknowledged as a no-op.
pub(crate) async fn begin(
    store: &dyn Store,
    job: &QueuedJob,
    family: EventFamily,
) -> Result<Option<WebhookRecord>, ProcessError> {
    let payload: WebhookJobPayload = job.payload_as()?;

    if EventFamily::of(&payload.event_type) != family {
        tracing::debug!(
            job_id = job.id,
            webhook_id = payload.webhook_id,
            event_type = %payload.event_type,
            "Event belongs to another family, skipping",
        );
        return Ok(None);
    }

    let Some(record) = store.find_webhook(payload.webhook_id).await? else {
        tracing::warn!(
            job_id = job.id,
            webhook_id = payload.webhook_id,
            "Webhook record not found, skipping",
        );
        return Ok(None);
    };

    if record.retry_count >= WEBHOOK_MAX_ATTEMPTS as i32 {
        return Err(ProcessError::RetryLimitReached {
            webhook_id: record.id,
            retry_count: record.retry_count,
        });
    }

    store.mark_webhook_processing(record.id).await?;
    Ok(Some(record))
}

/// Record the attempt's result on the webhook and translate it for the
/// queue runner.
pub(crate) async fn finish(
    store: &dyn Store,
    record: &WebhookRecord,
    result: Result<(), ProcessError>,
) -> Result<JobOutcome, ProcessError> {
    match result {
        Ok(()) => {
            store.mark_webhook_completed(record.id).await?;
            tracing::info!(
                webhook_id = record.id,
                tenant_id = record.tenant_id,
                event_type = %record.event_type,
                "Webhook processed",
            );
            Ok(JobOutcome::Done)
        }
        Err(e) => {
            let message = e.to_string();
            if let Err(mark_err) = store.mark_webhook_failed(record.id, &message).await {
                tracing::error!(
                    webhook_id = record.id,
                    error = %mark_err,
                    "Failed to record webhook failure",
                );
            }
            tracing::error!(
                webhook_id = record.id,
                tenant_id = record.tenant_id,
                event_type = %record.event_type,
                attempt = record.retry_count + 1,
                error = %message,
                "Webhook processing failed",
            );
            Err(e)
        }
    }
}
