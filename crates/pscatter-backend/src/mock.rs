//! Deterministic in-memory backend used by every other `pscatter-*` crate's
//! test suite. There is no FPGA/hypervisor to link against in this
//! workspace; this plays the role `aero-mem`'s `PhysicalMemory` plays for
//! its own crate's tests — a sparse, page-chunked byte store, here with the
//! addition of injectable per-page/per-round failure so the engine's error
//! paths (`ExecutionFailed`, `PartialResult`) are exercisable without a real
//! device.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use pscatter_addr::{ScatterFlags, TargetId, PAGE_SIZE};

use crate::batch::{BatchBackend, BatchRead, BatchReadResult, BatchWrite};
use crate::error::BackendError;
use crate::resource::{ScatterResource, ScatterResourceFactory};

type Page = Box<[u8]>;

struct Store {
    pages: Mutex<HashMap<u64, Page>>,
    fail_pages: Mutex<HashSet<u64>>,
    fail_execute: AtomicBool,
}

impl Store {
    fn new() -> Self {
        Store {
            pages: Mutex::new(HashMap::new()),
            fail_pages: Mutex::new(HashSet::new()),
            fail_execute: AtomicBool::new(false),
        }
    }

    fn read_page(&self, page_base: u64) -> Page {
        let pages = self.pages.lock().unwrap();
        match pages.get(&page_base) {
            Some(p) => p.clone(),
            None => vec![0u8; PAGE_SIZE as usize].into_boxed_slice(),
        }
    }

    fn write_bytes(&self, addr: u64, bytes: &[u8]) {
        let mut pages = self.pages.lock().unwrap();
        let mut remaining = bytes;
        let mut cur = addr;
        while !remaining.is_empty() {
            let page_base = pscatter_addr::page_align(cur);
            let off = pscatter_addr::byte_offset(cur) as usize;
            let take = remaining.len().min(PAGE_SIZE as usize - off);
            let page = pages
                .entry(page_base)
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize].into_boxed_slice());
            page[off..off + take].copy_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            cur += take as u64;
        }
    }

    fn page_ok(&self, page_base: u64) -> bool {
        !self.fail_pages.lock().unwrap().contains(&page_base)
    }
}

/// Handle shared by a test to drive an otherwise-healthy [`MockBackend`]
/// into failure for specific pages or whole rounds.
#[derive(Clone)]
pub struct MockFaultInjector {
    store: Arc<Store>,
}

impl MockFaultInjector {
    pub fn fail_page(&self, page_base: u64) {
        self.store.fail_pages.lock().unwrap().insert(page_base);
    }

    pub fn clear_fail_page(&self, page_base: u64) {
        self.store.fail_pages.lock().unwrap().remove(&page_base);
    }

    pub fn fail_next_execute(&self, fail: bool) {
        self.store.fail_execute.store(fail, Ordering::SeqCst);
    }
}

/// Factory + [`BatchBackend`] implementation backed by a shared, sparse
/// page store. Cloning shares the same store (mirrors the real backend's
/// single underlying device being usable from many handles).
#[derive(Clone)]
pub struct MockBackend {
    store: Arc<Store>,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend {
            store: Arc::new(Store::new()),
        }
    }

    pub fn fault_injector(&self) -> MockFaultInjector {
        MockFaultInjector {
            store: self.store.clone(),
        }
    }

    /// Test convenience: write bytes directly into the backing store,
    /// bypassing any handle (models "ground truth" memory state).
    pub fn seed(&self, addr: u64, bytes: &[u8]) {
        self.store.write_bytes(addr, bytes);
    }

    /// Test convenience: read bytes directly out of the backing store.
    pub fn snapshot(&self, addr: u64, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        let mut filled = 0;
        let mut cur = addr;
        while filled < len {
            let page_base = pscatter_addr::page_align(cur);
            let off = pscatter_addr::byte_offset(cur) as usize;
            let page = self.store.read_page(page_base);
            let take = (len - filled).min(PAGE_SIZE as usize - off);
            out[filled..filled + take].copy_from_slice(&page[off..off + take]);
            filled += take;
            cur += take as u64;
        }
        out
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScatterResourceFactory for MockBackend {
    type Resource = MockResource;

    fn initialize(
        &self,
        target: TargetId,
        flags: ScatterFlags,
    ) -> Result<MockResource, BackendError> {
        flags.validate().map_err(|e| BackendError::InitializationFailed {
            reason: e.to_string(),
        })?;
        Ok(MockResource {
            store: self.store.clone(),
            target,
            flags,
            pending_reads: Vec::new(),
            pending_writes: Vec::new(),
            results: HashMap::new(),
        })
    }
}

impl BatchBackend for MockBackend {
    fn batch_read(
        &self,
        _target: TargetId,
        _flags: ScatterFlags,
        reads: &[BatchRead],
    ) -> Result<Vec<BatchReadResult>, BackendError> {
        if self.store.fail_execute.swap(false, Ordering::SeqCst) {
            return Err(BackendError::ExecutionFailed {
                reason: "injected batch_read failure".into(),
            });
        }
        Ok(reads
            .iter()
            .map(|r| {
                let ok = self.store.page_ok(r.page_base);
                let buf = if ok {
                    let page = self.store.read_page(r.page_base);
                    page[..r.page_length.min(page.len())].to_vec()
                } else {
                    Vec::new()
                };
                BatchReadResult { buf, ok }
            })
            .collect())
    }

    fn batch_write(
        &self,
        _target: TargetId,
        _flags: ScatterFlags,
        writes: &[BatchWrite],
    ) -> Result<Vec<bool>, BackendError> {
        if self.store.fail_execute.swap(false, Ordering::SeqCst) {
            return Err(BackendError::ExecutionFailed {
                reason: "injected batch_write failure".into(),
            });
        }
        Ok(writes
            .iter()
            .map(|w| {
                self.store.write_bytes(w.addr, &w.bytes);
                true
            })
            .collect())
    }
}

/// A [`ScatterResource`] bound to one [`MockBackend`] store.
pub struct MockResource {
    store: Arc<Store>,
    target: TargetId,
    flags: ScatterFlags,
    pending_reads: Vec<(u64, usize)>,
    pending_writes: Vec<(u64, Vec<u8>)>,
    results: HashMap<u64, (Page, bool)>,
}

impl ScatterResource for MockResource {
    fn prepare(&mut self, page_base: u64, length: usize) -> Result<(), BackendError> {
        if length > PAGE_SIZE as usize {
            return Err(BackendError::PrepareFailed {
                page_base,
                reason: "length exceeds one page".into(),
            });
        }
        self.pending_reads.push((page_base, length));
        Ok(())
    }

    fn prepare_write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), BackendError> {
        self.pending_writes.push((addr, bytes.to_vec()));
        Ok(())
    }

    fn execute(&mut self) -> Result<(), BackendError> {
        if self.store.fail_execute.swap(false, Ordering::SeqCst) {
            return Err(BackendError::ExecutionFailed {
                reason: "injected execute failure".into(),
            });
        }
        for (addr, bytes) in self.pending_writes.drain(..) {
            self.store.write_bytes(addr, &bytes);
        }
        for (page_base, _len) in self.pending_reads.drain(..) {
            let ok = self.store.page_ok(page_base);
            let page = if ok {
                self.store.read_page(page_base)
            } else {
                vec![0u8; PAGE_SIZE as usize].into_boxed_slice()
            };
            self.results.insert(page_base, (page, ok));
        }
        Ok(())
    }

    fn read(&self, addr: u64, out: &mut [u8]) -> usize {
        let page_base = pscatter_addr::page_align(addr);
        let off = pscatter_addr::byte_offset(addr) as usize;
        match self.results.get(&page_base) {
            Some((page, true)) => {
                let avail = page.len().saturating_sub(off);
                let n = out.len().min(avail);
                out[..n].copy_from_slice(&page[off..off + n]);
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

impl Drop for MockResource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_execute_read_round_trip() {
        let backend = MockBackend::new();
        backend.seed(0x1000, &[1, 2, 3, 4]);
        let mut res = backend
            .initialize(TargetId::PHYSICAL, ScatterFlags::NONE)
            .unwrap();
        res.prepare(0x1000, PAGE_SIZE as usize).unwrap();
        res.execute().unwrap();
        let mut out = [0u8; 4];
        assert_eq!(res.read(0x1000, &mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn failed_page_reads_zero_bytes() {
        let backend = MockBackend::new();
        let injector = backend.fault_injector();
        injector.fail_page(0x2000);
        let mut res = backend
            .initialize(TargetId::PHYSICAL, ScatterFlags::NONE)
            .unwrap();
        res.prepare(0x2000, PAGE_SIZE as usize).unwrap();
        res.execute().unwrap();
        let mut out = [0u8; 4];
        assert_eq!(res.read(0x2000, &mut out), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let backend = MockBackend::new();
        let mut res = backend
            .initialize(TargetId::PHYSICAL, ScatterFlags::NONE)
            .unwrap();
        res.close();
        res.close();
    }

    #[test]
    fn batch_backend_round_trip() {
        let backend = MockBackend::new();
        backend.seed(0x5000, &[9, 9, 9]);
        let reads = [BatchRead {
            page_base: 0x5000,
            page_length: PAGE_SIZE as usize,
        }];
        let results = backend
            .batch_read(TargetId::PHYSICAL, ScatterFlags::NONE, &reads)
            .unwrap();
        assert!(results[0].ok);
        assert_eq!(&results[0].buf[..3], &[9, 9, 9]);
    }
}
