//! Error types for the triage pipeline.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("External service error: {0}")]
    External(#[from] ExternalError),
}

/// Configuration-related errors. Every key has a default, so the only
/// failure mode is a value that is set but does not parse.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors. Only genuinely fatal conditions live here —
/// expected branches (already-resolved item) are ordinary return variants.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Version conflict on item {id}: expected {expected}, found {found}")]
    Conflict { id: Uuid, expected: u64, found: u64 },
}

/// Review lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Pending item {id} not found")]
    ItemNotFound { id: Uuid },

    #[error("Counselor {id} not found")]
    CounselorNotFound { id: String },

    #[error("Item {id} is in state {state}, cannot {attempted}")]
    InvalidState {
        id: Uuid,
        state: String,
        attempted: String,
    },

    #[error("No available counselor in organization {org_id:?}")]
    NoAvailableCounselor { org_id: Option<String> },

    #[error("Item {id} deadline not reached ({remaining:?} remaining)")]
    DeadlineNotReached { id: Uuid, remaining: Duration },
}

/// External-collaborator errors. Timeouts from the classifier or generator
/// are handled fail-safe by the caller and never reach the user.
#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    #[error("Risk classification timed out after {timeout:?}")]
    ClassificationTimeout { timeout: Duration },

    #[error("Response generation timed out after {timeout:?}")]
    GenerationTimeout { timeout: Duration },

    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Delivery failed for user {user_id}: {reason}")]
    DeliveryFailed { user_id: String, reason: String },
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
