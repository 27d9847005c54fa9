use thiserror::Error;

/// Failures reported by the acquisition backend itself, as distinct from
/// argument-validation failures (those live in `pscatter_addr::ValidationError`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend initialization failed: {reason}")]
    InitializationFailed { reason: String },
    #[error("backend rejected prepare for page {page_base:#x}: {reason}")]
    PrepareFailed { page_base: u64, reason: String },
    #[error("backend round-trip failed: {reason}")]
    ExecutionFailed { reason: String },
    #[error("backend rejected clear/reinitialize: {reason}")]
    ClearFailed { reason: String },
}
