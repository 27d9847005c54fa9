use pscatter_addr::{ScatterFlags, TargetId};

use crate::error::BackendError;

/// Higher-level backend realization: an opaque, stateful scatter resource owned
/// by exactly one handle. The backend owns the result buffers; their
/// lifetime is bound to `&self`, so a caller must copy bytes out (via
/// [`ScatterResource::read`]) before the resource is closed.
///
/// Implementations must make `close` idempotent — it may be called zero or
/// more times and must not double-free the underlying backend handle.
pub trait ScatterResource: Send {
    /// Registers a page-aligned read. `length` must be `<= 0x1000`; callers
    /// (not the backend) are responsible for page-splicing larger ranges.
    fn prepare(&mut self, page_base: u64, length: usize) -> Result<(), BackendError>;

    /// Registers a write of arbitrary alignment and length.
    fn prepare_write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), BackendError>;

    /// Performs one round-trip for every prepared read/write since the last
    /// `execute` or `clear`.
    fn execute(&mut self) -> Result<(), BackendError>;

    /// Copies up to `out.len()` bytes starting at `addr` from the
    /// most recent execute's results into `out`. Returns the number of
    /// bytes actually copied; `0` signals the covering page failed or was
    /// never prepared.
    fn read(&self, addr: u64, out: &mut [u8]) -> usize;

    /// Releases all prepared/result state and rearms the resource for a new
    /// target/flags without tearing down the backend connection.
    fn clear(&mut self, target: TargetId, flags: ScatterFlags) -> Result<(), BackendError>;

    /// Idempotent. Releases the backend handle; safe to call repeatedly.
    fn close(&mut self);
}

/// Factory for [`ScatterResource`]s: the one-time, possibly-fatal
/// initialization step.
pub trait ScatterResourceFactory {
    type Resource: ScatterResource;

    fn initialize(
        &self,
        target: TargetId,
        flags: ScatterFlags,
    ) -> Result<Self::Resource, BackendError>;
}
