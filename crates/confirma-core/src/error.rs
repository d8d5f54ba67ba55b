use thiserror::Error;

/// Top-level error type for Confirma.
///
/// Variants follow the failure taxonomy of the reminder engine: per-item
/// failures (`Validation`, `GatewayCallFailed`, `DedupeWriteFailed`) are
/// contained by the caller, cycle-level failures (`FeedUnavailable`, `Store`)
/// abort one pass only.
#[derive(Debug, Error)]
pub enum ConfirmaError {
    /// The source feed could not be queried. Retry next cycle.
    #[error("feed unavailable: {0}")]
    FeedUnavailable(String),

    /// A row or inbound event failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A messaging gateway call failed (network, timeout, non-2xx).
    #[error("gateway call failed: {0}")]
    GatewayCallFailed(String),

    /// A dedupe record could not be written.
    #[error("dedupe write failed: {0}")]
    DedupeWriteFailed(String),

    /// The legacy scheduling table update failed.
    #[error("legacy update failed: {0}")]
    LegacyUpdateFailed(String),

    /// A reply matches more than one appointment and carries no identifier.
    #[error("ambiguous resolution: {0}")]
    AmbiguousResolution(String),

    /// A reply could not be matched to any appointment.
    #[error("cannot resolve appointment: {0}")]
    Unresolved(String),

    /// Dedupe Store read/connectivity error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
