//! The scatter map. An ordered sequence of [`ScatterHandle`] "rounds",
//! all sharing one `target` and backend factory, executed strictly
//! sequentially — a later round's `prepare` calls, typically issued from an
//! earlier round's completion callback once pointers it just read are
//! known, always see a handle whose own prior round has already finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use pscatter_addr::{ScatterFlags, TargetId};
use pscatter_backend::{ScatterResource, ScatterResourceFactory};

use crate::error::ScatterError;
use crate::handle::ScatterHandle;
use crate::lease::LeasePool;

/// Holds the rounds of a multi-step scatter in execution order. The map
/// owns the backend factory and shared `target`/lease pool so `add_round`
/// can build each round's [`ScatterHandle`] itself, matching the
/// `handle = map.add_round(flags)` contract rather than requiring a caller
/// to build handles externally and hand them in.
pub struct ScatterMap<R: ScatterResource> {
    factory: Arc<dyn ScatterResourceFactory<Resource = R> + Send + Sync>,
    target: TargetId,
    lease_pool: Arc<LeasePool>,
    rounds: Mutex<Vec<Arc<ScatterHandle<R>>>>,
    closed: AtomicBool,
    #[allow(clippy::type_complexity)]
    completed: Mutex<Vec<Box<dyn FnMut() + Send>>>,
}

impl<R: ScatterResource> ScatterMap<R> {
    pub fn new(
        factory: Arc<dyn ScatterResourceFactory<Resource = R> + Send + Sync>,
        target: TargetId,
        lease_pool: Arc<LeasePool>,
    ) -> Self {
        ScatterMap {
            factory,
            target,
            lease_pool,
            rounds: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Builds and appends a new round with the given `flags`, returning the
    /// handle so a caller can `prepare_*` against it directly (and, for a
    /// dependent round, register a completion callback on it). Fails if the
    /// map is closed or the backend rejects initialization.
    pub fn add_round(&self, flags: ScatterFlags) -> Result<Arc<ScatterHandle<R>>, ScatterError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ScatterError::Disposed);
        }
        let handle = Arc::new(ScatterHandle::initialize(
            self.factory.as_ref(),
            self.target,
            flags,
            self.lease_pool.clone(),
        )?);
        self.rounds.lock().unwrap().push(handle.clone());
        Ok(handle)
    }

    pub fn round(&self, index: usize) -> Option<Arc<ScatterHandle<R>>> {
        self.rounds.lock().unwrap().get(index).cloned()
    }

    pub fn round_count(&self) -> usize {
        self.rounds.lock().unwrap().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Registers a callback fired once `execute` has run every round to
    /// completion without error.
    pub fn register_completed(&self, cb: impl FnMut() + Send + 'static) {
        self.completed.lock().unwrap().push(Box::new(cb));
    }

    /// Executes every round in order. A round with nothing prepared (e.g. a
    /// dependent round whose prior-round callback chose not to prepare
    /// anything) is a no-op per [`ScatterHandle::execute`], so the sequence
    /// never stalls waiting on an intentionally-empty round. A round's
    /// failure aborts subsequent rounds and propagates without firing the
    /// map's own completed callbacks.
    pub fn execute(&self) -> Result<(), ScatterError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ScatterError::Disposed);
        }
        let rounds = self.rounds.lock().unwrap().clone();
        for round in &rounds {
            round.execute()?;
        }
        for cb in self.completed.lock().unwrap().iter_mut() {
            cb();
        }
        Ok(())
    }

    /// Clears every round's prepared/result state and registered callbacks,
    /// without removing the rounds themselves from the map.
    pub fn clear_all(&self) -> Result<(), ScatterError> {
        let rounds = self.rounds.lock().unwrap().clone();
        for round in &rounds {
            round.clear(None, None)?;
        }
        Ok(())
    }

    /// Closes every round's underlying resource, in order, then marks the
    /// map itself closed so further `add_round` calls fail. Idempotent.
    pub fn close_all(&self) {
        let rounds = self.rounds.lock().unwrap().clone();
        for round in &rounds {
            round.close();
        }
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use pscatter_addr::TargetId;
    use pscatter_backend::MockBackend;

    use super::*;
    use crate::lease::LeasePool;

    #[test]
    fn dependent_round_is_prepared_from_first_rounds_callback() {
        let backend = Arc::new(MockBackend::new());
        backend.seed(0x1000, &8u64.to_le_bytes()); // a "pointer" into 0x2000 range below
        backend.seed(0x2000, &[42u8, 0, 0, 0]);

        let map = ScatterMap::<pscatter_backend::MockResource>::new(backend, TargetId::PHYSICAL, LeasePool::new());
        let round0 = map.add_round(ScatterFlags::NONE).unwrap();
        let round1 = map.add_round(ScatterFlags::NONE).unwrap();

        round0.prepare_read(0x1000, 8);

        let round1_for_cb = round1.clone();
        let touched = Arc::new(AtomicU64::new(0));
        let touched_cb = touched.clone();
        round0.register_completed(move |h| {
            if let Some(ptr) = h.read_value::<u64>(0x1000) {
                touched_cb.store(ptr, Ordering::SeqCst);
                round1_for_cb.prepare_read(0x2000, 4);
            }
        });

        map.execute().unwrap();

        assert_eq!(touched.load(Ordering::SeqCst), 8);
        assert_eq!(map.round(1).unwrap().read_value::<u32>(0x2000), Some(42));
    }

    #[test]
    fn map_completed_callback_fires_once_after_all_rounds_succeed() {
        let backend = Arc::new(MockBackend::new());
        backend.seed(0x3000, &1u32.to_le_bytes());

        let map = ScatterMap::<pscatter_backend::MockResource>::new(backend, TargetId::PHYSICAL, LeasePool::new());
        let round0 = map.add_round(ScatterFlags::NONE).unwrap();
        round0.prepare_read_value::<u32>(0x3000);

        let fired = Arc::new(AtomicU64::new(0));
        let fired_cb = fired.clone();
        map.register_completed(move || {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        });

        map.execute().unwrap();
        map.execute().unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn add_round_fails_once_the_map_is_closed() {
        let backend = Arc::new(MockBackend::new());
        let map = ScatterMap::<pscatter_backend::MockResource>::new(backend, TargetId::PHYSICAL, LeasePool::new());
        map.add_round(ScatterFlags::NONE).unwrap();
        map.close_all();
        assert!(map.is_closed());
        assert!(matches!(
            map.add_round(ScatterFlags::NONE),
            Err(ScatterError::Disposed)
        ));
    }
}
