//! Adapts a [`BatchBackend`] (the lower-level backend realization, where the
//! caller owns every buffer) into a [`ScatterResource`], so
//! [`crate::ScatterHandle`] drives both backend realizations through one code
//! path instead of duplicating the handle state machine per realization.

use std::collections::HashMap;
use std::sync::Arc;

use pscatter_addr::{ScatterFlags, TargetId, PAGE_SIZE};
use pscatter_backend::{BackendError, BatchBackend, BatchRead, BatchWrite, ScatterResource, ScatterResourceFactory};

/// Wraps any `B: BatchBackend` so it can back a [`crate::ScatterHandle`] the
/// same way a native [`ScatterResource`] implementation would.
pub struct BatchScatterResource<B: BatchBackend> {
    backend: Arc<B>,
    target: TargetId,
    flags: ScatterFlags,
    pending_reads: Vec<BatchRead>,
    pending_writes: Vec<BatchWrite>,
    results: HashMap<u64, (Vec<u8>, bool)>,
}

impl<B: BatchBackend> BatchScatterResource<B> {
    pub fn new(backend: Arc<B>, target: TargetId, flags: ScatterFlags) -> Self {
        BatchScatterResource {
            backend,
            target,
            flags,
            pending_reads: Vec::new(),
            pending_writes: Vec::new(),
            results: HashMap::new(),
        }
    }
}

impl<B: BatchBackend> ScatterResource for BatchScatterResource<B> {
    fn prepare(&mut self, page_base: u64, length: usize) -> Result<(), BackendError> {
        if length > PAGE_SIZE as usize {
            return Err(BackendError::PrepareFailed {
                page_base,
                reason: "length exceeds one page".into(),
            });
        }
        self.pending_reads.push(BatchRead {
            page_base,
            page_length: length,
        });
        Ok(())
    }

    fn prepare_write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), BackendError> {
        self.pending_writes.push(BatchWrite {
            addr,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        if !self.pending_writes.is_empty() {
            self.backend
                .batch_write(self.target, self.flags, &self.pending_writes)?;
            self.pending_writes.clear();
        }
        if !self.pending_reads.is_empty() {
            let results = self
                .backend
                .batch_read(self.target, self.flags, &self.pending_reads)?;
            self.results.clear();
            for (req, res) in self.pending_reads.drain(..).zip(results) {
                self.results.insert(req.page_base, (res.buf, res.ok));
            }
        }
        Ok(())
    }

    fn read(&self, addr: u64, out: &mut [u8]) -> usize {
        let page_base = pscatter_addr::page_align(addr);
        let off = pscatter_addr::byte_offset(addr) as usize;
        match self.results.get(&page_base) {
            Some((buf, true)) => {
                let avail = buf.len().saturating_sub(off);
                let n = out.len().min(avail);
                out[..n].copy_from_slice(&buf[off..off + n]);
                n
            }
            _ => 0,
        }
    }

    fn clear(&mut self, target: TargetId, flags: ScatterFlags) -> Result<(), BackendError> {
        flags.validate().map_err(|e| BackendError::ClearFailed {
            reason: e.to_string(),
        })?;
        self.pending_reads.clear();
        self.pending_writes.clear();
        self.results.clear();
        self.target = target;
        self.flags = flags;
        Ok(())
    }

    fn close(&mut self) {
        self.pending_reads.clear();
        self.pending_writes.clear();
        self.results.clear();
    }
}

/// Factory pairing a `B: BatchBackend` with [`BatchScatterResource`], so it
/// can be handed to [`crate::ScatterHandle::initialize`] exactly like a
/// native [`ScatterResourceFactory`].
pub struct BatchResourceFactory<B: BatchBackend> {
    backend: Arc<B>,
}

impl<B: BatchBackend> BatchResourceFactory<B> {
    pub fn new(backend: Arc<B>) -> Self {
        BatchResourceFactory { backend }
    }
}

impl<B: BatchBackend> ScatterResourceFactory for BatchResourceFactory<B> {
    type Resource = BatchScatterResource<B>;

    fn initialize(
        &self,
        target: TargetId,
        flags: ScatterFlags,
    ) -> Result<Self::Resource, BackendError> {
        flags.validate().map_err(|e| BackendError::InitializationFailed {
            reason: e.to_string(),
        })?;
        Ok(BatchScatterResource::new(self.backend.clone(), target, flags))
    }
}
