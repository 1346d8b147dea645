use marketsync_core::payload::PayloadError;
use marketsync_core::types::DbId;
use marketsync_db::StoreError;
use marketsync_shopee::ShopeeError;

/// Why a job attempt failed.
///
/// The `Display` text is written to the webhook record's `error_message`
/// and to the job's `last_error`.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("Marketplace error: {0}")]
    Marketplace(#[from] ShopeeError),

    /// The job's own payload could not be decoded.
    #[error("Invalid job payload: {0}")]
    InvalidJob(#[from] serde_json::Error),

    /// The webhook record has already failed too many times.
    #[error("Webhook {webhook_id} reached the retry limit ({retry_count} failures)")]
    RetryLimitReached { webhook_id: DbId, retry_count: i32 },
}

impl ProcessError {
    /// Whether another attempt could succeed.
    ///
    /// Malformed job payloads and exhausted records fail permanently;
    /// everything else is handed back to the queue's backoff.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ProcessError::InvalidJob(_) | ProcessError::RetryLimitReached { .. }
        )
    }
}
