use std::sync::{Arc, Mutex};

use pscatter_addr::{ScatterFlags, TargetId};
use pscatter_backend::{ScatterResource, ScatterResourceFactory};
use pscatter_core::{LeasePool, ScatterError, ScatterHandle, ScatterMap};
use tracing::trace;

use crate::entry::{EntryState, ReadMapEntry};
use crate::kind::EntryKind;

/// A named group of entries within a round. Carries its own `completed`
/// callback list, fired once the owning round has executed and this
/// index's entries have been filled from the round's result cache — the
/// mechanism a dependent round uses to register its own entries/callbacks
/// against the *next* round from inside a still-executing one, without
/// reaching past the [`ReadMap`] API down to a raw [`ScatterHandle`].
struct Index<R: ScatterResource> {
    entries: Vec<Arc<EntryState>>,
    #[allow(clippy::type_complexity)]
    completed: Vec<Box<dyn FnMut(&ReadMap<R>) + Send>>,
}

impl<R: ScatterResource> Index<R> {
    fn new() -> Self {
        Index {
            entries: Vec::new(),
            completed: Vec::new(),
        }
    }
}

struct RoundData<R: ScatterResource> {
    handle: Arc<ScatterHandle<R>>,
    indexes: Arc<Mutex<Vec<Index<R>>>>,
}

struct ReadMapInner<R: ScatterResource> {
    map: ScatterMap<R>,
    rounds: Mutex<Vec<RoundData<R>>>,
    lease_pool: Arc<LeasePool>,
}

/// A declarative layer over [`ScatterMap`]. Callers describe
/// *what* they want — a hierarchy of rounds, indexes within a round, and
/// typed entries within an index — instead of manually splicing addresses
/// and re-reading a handle's cache. Entry population piggybacks on each
/// round's own completion callback (the same mechanism `ScatterMap` uses to
/// chain dependent rounds), so entries remain readable even after the
/// owning handle is cleared for its next round.
///
/// Cheaply cloneable: every clone shares the same underlying rounds, so an
/// index's completion callback can be handed a clone of the map it belongs
/// to and use the full `ReadMap` API — `add_round`/`add_index`/`add_entry`/
/// `register_index_completed` — to build round *R+1*'s entries once round
/// *R*'s results are in.
pub struct ReadMap<R: ScatterResource>(Arc<ReadMapInner<R>>);

impl<R: ScatterResource> Clone for ReadMap<R> {
    fn clone(&self) -> Self {
        ReadMap(self.0.clone())
    }
}

impl<R: ScatterResource + 'static> ReadMap<R> {
    pub fn new(
        factory: Arc<dyn ScatterResourceFactory<Resource = R> + Send + Sync>,
        target: TargetId,
        lease_pool: Arc<LeasePool>,
    ) -> Self {
        ReadMap(Arc::new(ReadMapInner {
            map: ScatterMap::new(factory, target, lease_pool.clone()),
            rounds: Mutex::new(Vec::new()),
            lease_pool,
        }))
    }

    /// Builds and appends a new round with the given `flags`, wiring up its
    /// own entry-filling and index-dispatch completion callback. Returns the
    /// round's id, used by [`Self::add_index`].
    pub fn add_round(&self, flags: ScatterFlags) -> Result<usize, ScatterError> {
        let handle = self.0.map.add_round(flags)?;
        let indexes: Arc<Mutex<Vec<Index<R>>>> = Arc::new(Mutex::new(Vec::new()));
        let indexes_for_cb = indexes.clone();
        let self_for_cb = self.clone();
        handle.register_completed(move |h| {
            {
                let idxs = indexes_for_cb.lock().unwrap();
                for index in idxs.iter() {
                    for entry in &index.entries {
                        let bytes = h.read_bytes(entry.addr, entry.kind.byte_len());
                        trace!(
                            addr = %format_args!("{:#x}", entry.addr),
                            hit = bytes.is_some(),
                            "read-map entry captured"
                        );
                        entry.set(bytes);
                    }
                }
            }
            fire_index_callbacks(&indexes_for_cb, &self_for_cb);
        });
        let mut rounds = self.0.rounds.lock().unwrap();
        rounds.push(RoundData { handle, indexes });
        Ok(rounds.len() - 1)
    }

    /// Adds an (initially empty) index to `round`. Returns the index's id,
    /// used by [`Self::add_entry`] and [`Self::register_index_completed`].
    pub fn add_index(&self, round: usize) -> usize {
        let rounds = self.0.rounds.lock().unwrap();
        let mut indexes = rounds[round].indexes.lock().unwrap();
        indexes.push(Index::new());
        indexes.len() - 1
    }

    /// Registers one typed entry in `round`/`index`, eagerly preparing the
    /// read against the round's handle. Returns a handle to the entry's
    /// eventual value, valid to read once [`Self::execute`] has run.
    pub fn add_entry(&self, round: usize, index: usize, addr: u64, kind: EntryKind) -> ReadMapEntry {
        let rounds = self.0.rounds.lock().unwrap();
        let round_data = &rounds[round];
        round_data.handle.prepare_read(addr, kind.byte_len());
        let state = EntryState::new(addr, kind);
        round_data.indexes.lock().unwrap()[index].entries.push(state.clone());
        ReadMapEntry {
            state,
            lease_pool: self.0.lease_pool.clone(),
        }
    }

    /// Registers a callback fired once `round` has executed and `index`'s
    /// own entries have been filled. Typically used from *inside* an
    /// earlier round's index callback to build the next round's entries
    /// once a pointer it just captured is known.
    pub fn register_index_completed(
        &self,
        round: usize,
        index: usize,
        cb: impl FnMut(&ReadMap<R>) + Send + 'static,
    ) {
        let rounds = self.0.rounds.lock().unwrap();
        rounds[round].indexes.lock().unwrap()[index]
            .completed
            .push(Box::new(cb));
    }

    pub fn round_handle(&self, round: usize) -> Arc<ScatterHandle<R>> {
        self.0.rounds.lock().unwrap()[round].handle.clone()
    }

    /// Executes every round in order, delegating to the underlying
    /// [`ScatterMap`]; each round's entries populate themselves, and each
    /// index's own callbacks fire, via the completion callback registered
    /// in [`Self::add_round`].
    pub fn execute(&self) -> Result<(), ScatterError> {
        self.0.map.execute()
    }

    pub fn clear_all(&self) -> Result<(), ScatterError> {
        self.0.map.clear_all()
    }

    pub fn close_all(&self) {
        self.0.map.close_all()
    }
}

/// Fires every index's `completed` callbacks once, merging back anything a
/// callback itself registered mid-dispatch — mirrors
/// `ScatterHandle`'s own completion-dispatch discipline of releasing the
/// lock before invoking callbacks.
fn fire_index_callbacks<R: ScatterResource + 'static>(
    indexes: &Mutex<Vec<Index<R>>>,
    map: &ReadMap<R>,
) {
    let mut taken: Vec<_> = {
        let mut idxs = indexes.lock().unwrap();
        idxs.iter_mut().map(|idx| std::mem::take(&mut idx.completed)).collect()
    };
    for callbacks in taken.iter_mut() {
        for cb in callbacks.iter_mut() {
            cb(map);
        }
    }
    let mut idxs = indexes.lock().unwrap();
    for (i, callbacks) in taken.into_iter().enumerate() {
        let mut merged = callbacks;
        merged.extend(std::mem::take(&mut idxs[i].completed));
        idxs[i].completed = merged;
    }
}
