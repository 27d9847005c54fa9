use pscatter_addr::{ScatterFlags, TargetId};

use crate::error::BackendError;

/// One page-aligned fetch request for the lower-level batch primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRead {
    pub page_base: u64,
    pub page_length: usize,
}

/// Result of one [`BatchRead`]: the filled buffer plus a per-descriptor
/// success flag (the buffer's contents are unspecified when `ok` is false).
#[derive(Debug, Clone)]
pub struct BatchReadResult {
    pub buf: Vec<u8>,
    pub ok: bool,
}

/// One write request for the lower-level batch primitive.
#[derive(Debug, Clone)]
pub struct BatchWrite {
    pub addr: u64,
    pub bytes: Vec<u8>,
}

/// Lower-level backend realization: the caller owns every buffer and the backend
/// is purely a stateless (from the caller's perspective) batch executor.
/// A [`crate::ScatterResource`] can be built generically on top of this by
/// pairing it with caller-held per-page buffers.
pub trait BatchBackend: Send + Sync {
    fn batch_read(
        &self,
        target: TargetId,
        flags: ScatterFlags,
        reads: &[BatchRead],
    ) -> Result<Vec<BatchReadResult>, BackendError>;

    fn batch_write(
        &self,
        target: TargetId,
        flags: ScatterFlags,
        writes: &[BatchWrite],
    ) -> Result<Vec<bool>, BackendError>;
}
