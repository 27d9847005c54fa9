use std::sync::{Arc, Mutex};

use bytemuck::Pod;
use pscatter_addr::{is_valid_for_class, AddressClass};
use pscatter_core::{decode_truncated, Lease, LeasePool, StringEncoding};

use crate::kind::EntryKind;

pub(crate) struct EntryState {
    pub(crate) addr: u64,
    pub(crate) kind: EntryKind,
    bytes: Mutex<Option<Vec<u8>>>,
}

impl EntryState {
    pub(crate) fn new(addr: u64, kind: EntryKind) -> Arc<EntryState> {
        Arc::new(EntryState {
            addr,
            kind,
            bytes: Mutex::new(None),
        })
    }

    pub(crate) fn set(&self, bytes: Option<Vec<u8>>) {
        *self.bytes.lock().unwrap() = bytes;
    }

    fn get(&self) -> Option<Vec<u8>> {
        self.bytes.lock().unwrap().clone()
    }
}

/// One entry in a read map: a typed value at an address, whose bytes were
/// captured by the owning round's completion callback once its scatter
/// handle finished executing (see `ReadMap::add_round`).
#[derive(Clone)]
pub struct ReadMapEntry {
    pub(crate) state: Arc<EntryState>,
    pub(crate) lease_pool: Arc<LeasePool>,
}

impl ReadMapEntry {
    pub fn addr(&self) -> u64 {
        self.state.addr
    }

    /// `None` until the owning round has executed, or if the backing page
    /// failed.
    pub fn get_value<T: Pod>(&self) -> Option<T> {
        let bytes = self.state.get()?;
        if bytes.len() != std::mem::size_of::<T>() {
            return None;
        }
        Some(bytemuck::pod_read_unaligned(&bytes))
    }

    pub fn get_array<T: Pod>(&self) -> Option<Lease<T>> {
        let bytes = self.state.get()?;
        let mut buf = self.lease_pool.acquire(bytes.len());
        buf.copy_from_slice(&bytes);
        Some(Lease::new(self.lease_pool.clone(), buf))
    }

    pub fn get_string(&self) -> Option<String> {
        let bytes = self.state.get()?;
        let encoding = match self.state.kind {
            EntryKind::String { encoding, .. } => encoding,
            _ => StringEncoding::Utf8,
        };
        Some(decode_truncated(&bytes, encoding))
    }

    /// A `pointer` entry decodes as a `u64`; a null or non-canonical value
    /// (per the target's address class) reads as `None` rather than a bad
    /// address a caller could accidentally dereference.
    pub fn get_pointer(&self, class: AddressClass) -> Option<u64> {
        let value: u64 = self.get_value()?;
        if value == 0 || !is_valid_for_class(value, class) {
            return None;
        }
        Some(value)
    }
}
