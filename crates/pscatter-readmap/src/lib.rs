//! The declarative read map. Layered on `pscatter-core`'s [`ScatterMap`]
//! and [`ScatterHandle`](pscatter_core::ScatterHandle); see
//! [`ReadMap`] for the entry point.

mod entry;
mod kind;
mod readmap;

pub use entry::ReadMapEntry;
pub use kind::EntryKind;
pub use readmap::ReadMap;
