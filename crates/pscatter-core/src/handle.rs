use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use bytemuck::Pod;
use tracing::{debug, warn};

use pscatter_addr::{
    is_valid_for_class, validate_range, ScatterFlags, TargetId, ValidationError, PAGE_SIZE,
};
use pscatter_backend::{ScatterResource, ScatterResourceFactory};
use pscatter_config::WriteGate;
use pscatter_splice::{splice, tiny_window};

use crate::error::ScatterError;
use crate::lease::{Lease, LeasePool};
use crate::string::{decode_truncated, StringEncoding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Fresh,
    Prepared,
    Executed,
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct PageEntry {
    window_len: usize,
    is_tiny: bool,
}

struct PageResult {
    buf: Vec<u8>,
    ok: bool,
}

struct Inner<R: ScatterResource> {
    resource: Option<R>,
    target: TargetId,
    flags: ScatterFlags,
    state: HandleState,
    is_prepared: bool,
    closed: bool,
    prepared_reads: HashMap<u64, PageEntry>,
    prepared_writes: Vec<(u64, Vec<u8>)>,
    result_cache: HashMap<u64, PageResult>,
    #[allow(clippy::type_complexity)]
    completed: Vec<Box<dyn FnMut(&ScatterHandle<R>) + Send>>,
    total_bytes: u64,
    max_total_bytes: u64,
    max_total_pages: u64,
}

/// The scatter handle. Accumulates prepared reads/writes for one
/// target, executes them in a single backend round-trip, and serves reads
/// out of the resulting cache until the next `prepare`/`clear`/`close`.
///
/// Generic over the backend realization (`R: ScatterResource`) so the same
/// handle logic drives both backend realizations — see
/// [`crate::batch_adapter::BatchScatterResource`] for the adapter that lets
/// a [`pscatter_backend::BatchBackend`] stand in for `R`.
pub struct ScatterHandle<R: ScatterResource> {
    inner: Mutex<Inner<R>>,
    lease_pool: Arc<LeasePool>,
}

impl<R: ScatterResource> ScatterHandle<R> {
    pub fn initialize(
        factory: &(impl ScatterResourceFactory<Resource = R> + ?Sized),
        target: TargetId,
        flags: ScatterFlags,
        lease_pool: Arc<LeasePool>,
    ) -> Result<Self, ScatterError> {
        flags.validate()?;
        let resource = factory
            .initialize(target, flags)
            .map_err(ScatterError::BackendFatal)?;
        Ok(Self::from_resource(resource, target, flags, lease_pool))
    }

    pub fn from_resource(
        resource: R,
        target: TargetId,
        flags: ScatterFlags,
        lease_pool: Arc<LeasePool>,
    ) -> Self {
        Self::with_quotas(
            resource,
            target,
            flags,
            lease_pool,
            pscatter_addr::MAX_TOTAL_BYTES,
            pscatter_addr::MAX_TOTAL_PAGES,
        )
    }

    /// Same as [`Self::from_resource`] but with overridable aggregate
    /// quotas, so tests can exercise `TotalBytesExceeded`/`TotalPagesExceeded`
    /// without looping billions of times to hit the real constants.
    pub fn with_quotas(
        resource: R,
        target: TargetId,
        flags: ScatterFlags,
        lease_pool: Arc<LeasePool>,
        max_total_bytes: u64,
        max_total_pages: u64,
    ) -> Self {
        ScatterHandle {
            inner: Mutex::new(Inner {
                resource: Some(resource),
                target,
                flags,
                state: HandleState::Fresh,
                is_prepared: false,
                closed: false,
                prepared_reads: HashMap::new(),
                prepared_writes: Vec::new(),
                result_cache: HashMap::new(),
                completed: Vec::new(),
                total_bytes: 0,
                max_total_bytes,
                max_total_pages,
            }),
            lease_pool,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn target(&self) -> TargetId {
        self.lock().target
    }

    pub fn flags(&self) -> ScatterFlags {
        self.lock().flags
    }

    pub fn is_prepared(&self) -> bool {
        self.lock().is_prepared
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    // ---- prepare ----------------------------------------------------

    fn validate_address(inner: &Inner<R>, addr: u64) -> Result<(), ValidationError> {
        if !is_valid_for_class(addr, inner.target.address_class()) {
            return Err(ValidationError::AddressOutOfClass { addr });
        }
        Ok(())
    }

    fn record_window(
        reads: &mut HashMap<u64, PageEntry>,
        page_base: u64,
        src_offset: usize,
        len: usize,
        proposed_len: usize,
    ) {
        match reads.get_mut(&page_base) {
            None => {
                reads.insert(
                    page_base,
                    PageEntry {
                        window_len: proposed_len,
                        is_tiny: proposed_len < PAGE_SIZE as usize,
                    },
                );
            }
            Some(existing) => {
                let needed_end = src_offset + len;
                if needed_end > existing.window_len {
                    existing.window_len = PAGE_SIZE as usize;
                    existing.is_tiny = false;
                }
            }
        }
    }

    /// Returns `Err` with the reason a read could not be prepared;
    /// [`Self::prepare_read`] collapses this to a bare `bool`.
    pub fn try_prepare_read(&self, addr: u64, len: u64) -> Result<(), ScatterError> {
        validate_range(addr, len)?;
        let mut inner = self.lock();
        if inner.closed {
            return Err(ScatterError::Disposed);
        }
        Self::validate_address(&inner, addr)?;

        let windows = splice(addr, len);
        let single_window = windows.len() == 1;
        let tiny = if single_window {
            tiny_window(addr, len, inner.flags.contains(ScatterFlags::SCATTER_FORCE_PAGEREAD))
        } else {
            None
        };

        let new_pages = windows
            .iter()
            .filter(|w| !inner.prepared_reads.contains_key(&w.page_base))
            .count() as u64;
        let prospective_pages = inner.prepared_reads.len() as u64 + new_pages;
        if prospective_pages > inner.max_total_pages {
            return Err(ValidationError::TotalPagesExceeded.into());
        }
        let prospective_bytes = inner.total_bytes + len;
        if prospective_bytes > inner.max_total_bytes {
            return Err(ValidationError::TotalBytesExceeded { len }.into());
        }

        for w in &windows {
            let proposed_len = if single_window {
                tiny.map(|t| t.window_len).unwrap_or(PAGE_SIZE as usize)
            } else {
                PAGE_SIZE as usize
            };
            Self::record_window(&mut inner.prepared_reads, w.page_base, w.src_offset, w.len, proposed_len);
        }
        inner.total_bytes = prospective_bytes;
        inner.is_prepared = true;
        if inner.state != HandleState::Closed {
            inner.state = HandleState::Prepared;
        }
        Ok(())
    }

    pub fn prepare_read(&self, addr: u64, len: u64) -> bool {
        self.try_prepare_read(addr, len).is_ok()
    }

    pub fn prepare_read_value<T: Pod>(&self, addr: u64) -> bool {
        self.prepare_read(addr, std::mem::size_of::<T>() as u64)
    }

    pub fn prepare_read_array<T: Pod>(&self, addr: u64, n: usize) -> bool {
        self.prepare_read(addr, (std::mem::size_of::<T>() * n) as u64)
    }

    pub fn prepare_read_ptr(&self, addr: u64) -> bool {
        self.prepare_read(addr, std::mem::size_of::<u64>() as u64)
    }

    pub fn try_prepare_write_span<T: Pod>(&self, addr: u64, data: &[T]) -> Result<(), ScatterError> {
        if !WriteGate::global().is_enabled() {
            return Err(ScatterError::WritesDisabled);
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        validate_range(addr, bytes.len() as u64)?;
        let mut inner = self.lock();
        if inner.closed {
            return Err(ScatterError::Disposed);
        }
        Self::validate_address(&inner, addr)?;
        inner.prepared_writes.push((addr, bytes.to_vec()));
        inner.is_prepared = true;
        if inner.state != HandleState::Closed {
            inner.state = HandleState::Prepared;
        }
        Ok(())
    }

    pub fn prepare_write_span<T: Pod>(&self, addr: u64, data: &[T]) -> bool {
        self.try_prepare_write_span(addr, data).is_ok()
    }

    pub fn prepare_write_value<T: Pod>(&self, addr: u64, value: T) -> bool {
        self.prepare_write_span(addr, std::slice::from_ref(&value))
    }

    // ---- execute ------------------------------------------------------

    pub fn execute(&self) -> Result<(), ScatterError> {
        let mut guard = self.lock();
        if guard.closed {
            return Err(ScatterError::Disposed);
        }
        if !guard.is_prepared {
            return Ok(());
        }

        let reads: Vec<(u64, PageEntry)> = guard
            .prepared_reads
            .iter()
            .map(|(&k, &v)| (k, v))
            .collect();
        let writes = guard.prepared_writes.clone();

        {
            let resource = guard
                .resource
                .as_mut()
                .expect("resource present while not closed");
            for (page_base, entry) in &reads {
                resource
                    .prepare(*page_base, entry.window_len)
                    .map_err(ScatterError::ExecutionFailed)?;
            }
            for (addr, bytes) in &writes {
                resource
                    .prepare_write(*addr, bytes)
                    .map_err(ScatterError::ExecutionFailed)?;
            }
            if let Err(e) = resource.execute() {
                warn!(error = %e, "scatter round execution failed");
                return Err(ScatterError::ExecutionFailed(e));
            }

            let mut result_cache = HashMap::with_capacity(reads.len());
            for (page_base, entry) in &reads {
                let mut buf = vec![0u8; entry.window_len];
                let n = resource.read(*page_base, &mut buf);
                let ok = n == entry.window_len;
                result_cache.insert(*page_base, PageResult { buf, ok });
            }
            guard.result_cache = result_cache;
        }
        guard.state = HandleState::Executed;
        debug!(pages = reads.len(), writes = writes.len(), "scatter round executed");
        drop(guard);

        self.fire_completed();
        Ok(())
    }

    fn fire_completed(&self) {
        let mut callbacks = {
            let mut inner = self.lock();
            std::mem::take(&mut inner.completed)
        };
        for cb in callbacks.iter_mut() {
            if panic::catch_unwind(AssertUnwindSafe(|| cb(self))).is_err() {
                warn!("scatter handle completion callback panicked; continuing");
            }
        }
        let mut inner = self.lock();
        // A callback may itself have registered further callbacks (common
        // for dependent-round chains); prepend the ones that existed before
        // this dispatch so nothing registered mid-dispatch is lost, then
        // append anything newly registered.
        callbacks.extend(std::mem::take(&mut inner.completed));
        inner.completed = callbacks;
    }

    pub fn register_completed(&self, cb: impl FnMut(&ScatterHandle<R>) + Send + 'static) {
        self.lock().completed.push(Box::new(cb));
    }

    // ---- read -----------------------------------------------------------

    fn try_read_bytes_inner(&self, addr: u64, len: u64) -> Result<Option<Vec<u8>>, ScatterError> {
        let inner = self.lock();
        if inner.closed {
            return Err(ScatterError::Disposed);
        }
        if inner.state != HandleState::Executed {
            return Ok(None);
        }
        let windows = splice(addr, len);
        let mut out = vec![0u8; len as usize];
        for w in &windows {
            match inner.result_cache.get(&w.page_base) {
                Some(PageResult { buf, ok: true }) => {
                    if !pscatter_splice::copy_window(w, buf, &mut out) {
                        return Ok(None);
                    }
                }
                _ => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    /// `Err` only for disposal; a miss (not yet executed, or a failed page
    /// in the result cache) is `Ok(None)`, matching the non-`try_` variants'
    /// convention of returning misses as values, not errors.
    pub fn try_read_bytes(&self, addr: u64, len: u64) -> Result<Option<Vec<u8>>, ScatterError> {
        self.try_read_bytes_inner(addr, len)
    }

    pub fn read_bytes(&self, addr: u64, len: u64) -> Option<Vec<u8>> {
        self.try_read_bytes_inner(addr, len).ok().flatten()
    }

    pub fn read_value<T: Pod>(&self, addr: u64) -> Option<T> {
        let bytes = self.read_bytes(addr, std::mem::size_of::<T>() as u64)?;
        Some(bytemuck::pod_read_unaligned(&bytes))
    }

    pub fn read_span<T: Pod>(&self, addr: u64, out: &mut [T]) -> bool {
        let len = (out.len() * std::mem::size_of::<T>()) as u64;
        match self.read_bytes(addr, len) {
            Some(bytes) => {
                out.copy_from_slice(bytemuck::cast_slice(&bytes));
                true
            }
            None => false,
        }
    }

    pub fn read_array<T: Pod>(&self, addr: u64, n: usize) -> Option<Lease<T>> {
        let byte_len = std::mem::size_of::<T>() * n;
        let bytes = self.read_bytes(addr, byte_len as u64)?;
        let mut buf = self.lease_pool.acquire(byte_len);
        buf.copy_from_slice(&bytes);
        Some(Lease::new(self.lease_pool.clone(), buf))
    }

    /// Heap-allocating convenience alongside [`Self::read_array`] for
    /// one-off reads not worth pulling a pooled buffer for.
    pub fn read_array_vec<T: Pod>(&self, addr: u64, n: usize) -> Option<Vec<T>> {
        let byte_len = std::mem::size_of::<T>() * n;
        let bytes = self.read_bytes(addr, byte_len as u64)?;
        Some(bytemuck::cast_slice(&bytes).to_vec())
    }

    /// Permissive variant: never fails on a partial read, returns the
    /// number of bytes actually filled.
    pub fn read_bytes_partial(&self, addr: u64, len: u64) -> (Vec<u8>, usize) {
        let inner = self.lock();
        let mut out = vec![0u8; len as usize];
        if inner.closed || inner.state != HandleState::Executed {
            return (out, 0);
        }
        let windows = splice(addr, len);
        let mut filled = 0usize;
        for w in &windows {
            match inner.result_cache.get(&w.page_base) {
                Some(PageResult { buf, ok: true }) if pscatter_splice::copy_window(w, buf, &mut out) => {
                    filled = w.dst_offset + w.len;
                }
                _ => break,
            }
        }
        (out, filled)
    }

    pub fn read_span_partial<T: Pod>(&self, addr: u64, out: &mut [T]) -> usize {
        let byte_len = (out.len() * std::mem::size_of::<T>()) as u64;
        let (bytes, filled) = self.read_bytes_partial(addr, byte_len);
        let whole_elems = filled / std::mem::size_of::<T>();
        out[..whole_elems].copy_from_slice(&bytemuck::cast_slice(&bytes)[..whole_elems]);
        whole_elems
    }

    /// Permissive variant of [`Self::read_array`]: resizes to the number of
    /// whole elements actually filled instead of failing outright on a
    /// partial page.
    pub fn read_array_partial<T: Pod>(&self, addr: u64, n: usize) -> Lease<T> {
        let elem_size = std::mem::size_of::<T>();
        let (bytes, filled) = self.read_bytes_partial(addr, (elem_size * n) as u64);
        let whole_bytes = (filled / elem_size) * elem_size;
        let mut buf = self.lease_pool.acquire(whole_bytes);
        buf.copy_from_slice(&bytes[..whole_bytes]);
        Lease::new(self.lease_pool.clone(), buf)
    }

    pub fn read_ptr(&self, addr: u64) -> Option<u64> {
        let value: u64 = self.read_value(addr)?;
        if value == 0 {
            return None;
        }
        let class = self.lock().target.address_class();
        if !is_valid_for_class(value, class) {
            return None;
        }
        Some(value)
    }

    pub fn read_string(&self, addr: u64, len: u64, encoding: StringEncoding) -> Option<String> {
        let bytes = self.read_bytes(addr, len)?;
        Some(decode_truncated(&bytes, encoding))
    }

    // ---- clear / close --------------------------------------------------

    pub fn clear(&self, target: Option<TargetId>, flags: Option<ScatterFlags>) -> Result<(), ScatterError> {
        if let Some(f) = flags {
            f.validate()?;
        }
        let mut inner = self.lock();
        if inner.closed {
            return Err(ScatterError::Disposed);
        }
        let new_target = target.unwrap_or(inner.target);
        let new_flags = flags.unwrap_or(inner.flags);
        {
            let resource = inner.resource.as_mut().expect("resource present while not closed");
            resource
                .clear(new_target, new_flags)
                .map_err(ScatterError::BackendFatal)?;
        }
        inner.target = new_target;
        inner.flags = new_flags;
        inner.prepared_reads.clear();
        inner.prepared_writes.clear();
        inner.result_cache.clear();
        inner.completed.clear();
        inner.total_bytes = 0;
        inner.is_prepared = false;
        inner.state = HandleState::Fresh;
        Ok(())
    }

    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        if let Some(resource) = inner.resource.as_mut() {
            resource.close();
        }
        inner.resource = None;
        inner.prepared_reads.clear();
        inner.prepared_writes.clear();
        inner.result_cache.clear();
        inner.completed.clear();
        inner.closed = true;
        inner.state = HandleState::Closed;
    }
}

impl<R: ScatterResource> Drop for ScatterHandle<R> {
    fn drop(&mut self) {
        // No other reference can exist at this point; tolerate a poisoned
        // mutex from a panic on another thread rather than panicking again.
        if let Ok(mut inner) = self.inner.lock() {
            if !inner.closed {
                if let Some(resource) = inner.resource.as_mut() {
                    resource.close();
                }
                inner.resource = None;
                inner.closed = true;
                inner.state = HandleState::Closed;
            }
        }
    }
}
