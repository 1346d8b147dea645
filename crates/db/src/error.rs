use marketsync_core::types::DbId;

/// Errors returned by every store trait method.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backing store refused the operation (connection loss, injected
    /// fault in tests).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
