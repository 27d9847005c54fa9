use thiserror::Error;

use pscatter_addr::ValidationError;
use pscatter_backend::BackendError;

/// Errors raised at `execute`/`clear`/`close` time. Prepare-time
/// failures are silent refusals (`bool`/`Option`) and read-time failures are
/// per-operation return values, not exceptions — neither path uses this
/// type directly, though [`ScatterError::InvalidArgument`] and
/// [`ScatterError::WritesDisabled`] are exposed via the `try_*` variants of
/// the prepare methods for callers that want the reason.
#[derive(Debug, Error)]
pub enum ScatterError {
    #[error(transparent)]
    InvalidArgument(#[from] ValidationError),
    #[error("memory writing is disabled")]
    WritesDisabled,
    #[error("backend execution failed: {0}")]
    ExecutionFailed(#[source] BackendError),
    #[error("handle or map is disposed")]
    Disposed,
    #[error("pointer value failed address-class validation")]
    PointerInvalid,
    #[error("backend rejected initialization or reinitialization: {0}")]
    BackendFatal(#[source] BackendError),
}
