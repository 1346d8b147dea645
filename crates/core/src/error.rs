//! Errors the operator API raises from domain rules.

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// A job for the webhook is already waiting or running.
    #[error("Webhook {0} is already queued for processing")]
    AlreadyQueued(DbId),

    /// Stored for audit only; its event family has no processor.
    #[error("Event type '{0}' has no processor")]
    NoProcessor(String),
}
