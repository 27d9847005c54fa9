//! A small, process-wide, thread-safe pool of byte buffers backing
//! [`read_array`](crate::ScatterHandle::read_array) leases and, via
//! `pscatter-readmap`, `array<T>` read-map entries — one allocator for
//! both instead of each layer rolling its own.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use bytemuck::Pod;

#[derive(Default)]
pub struct LeasePool {
    bins: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
}

impl LeasePool {
    pub fn new() -> Arc<LeasePool> {
        Arc::new(LeasePool {
            bins: Mutex::new(HashMap::new()),
        })
    }

    /// Takes a buffer of exactly `bytes` length from the pool, or allocates
    /// a fresh zeroed one if none is available. Exposed beyond this crate so
    /// `pscatter-readmap`'s `array<T>` entries can share the same pool.
    pub fn acquire(&self, bytes: usize) -> Vec<u8> {
        let mut bins = self.bins.lock().unwrap();
        match bins.get_mut(&bytes).and_then(|bin| bin.pop()) {
            Some(buf) => buf,
            None => vec![0u8; bytes],
        }
    }

    pub fn release(&self, mut buf: Vec<u8>) {
        let bytes = buf.len();
        buf.iter_mut().for_each(|b| *b = 0);
        self.bins.lock().unwrap().entry(bytes).or_default().push(buf);
    }
}

/// A caller-visible borrow of a pooled buffer, interpreted as a slice of
/// `T`. Returned to the pool on drop.
pub struct Lease<T: Pod> {
    pool: Arc<LeasePool>,
    buf: Option<Vec<u8>>,
    _marker: PhantomData<T>,
}

impl<T: Pod> Lease<T> {
    /// Wraps an already-acquired buffer as a typed lease; exposed beyond
    /// this crate so `pscatter-readmap`'s `array<T>` entries can build one
    /// from the same pool without duplicating the pooling logic.
    pub fn new(pool: Arc<LeasePool>, buf: Vec<u8>) -> Self {
        Lease {
            pool,
            buf: Some(buf),
            _marker: PhantomData,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        bytemuck::cast_slice(self.buf.as_deref().unwrap())
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Pod> Deref for Lease<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leased_buffer_is_returned_to_the_pool_on_drop() {
        let pool = LeasePool::new();
        {
            let buf = pool.acquire(32);
            let lease: Lease<u32> = Lease::new(pool.clone(), buf);
            assert_eq!(lease.len(), 8);
        }
        // The bin for 32 bytes should now hold the returned buffer.
        let reused = pool.acquire(32);
        assert_eq!(reused.len(), 32);
        assert!(reused.iter().all(|&b| b == 0));
    }
}
