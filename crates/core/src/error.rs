#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Entity identified by an external string key (e.g. a video id).
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
