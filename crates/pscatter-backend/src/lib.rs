//! The backend abstraction. Two equivalent realizations are exposed,
//! since a memory-acquisition backend commonly exposes both a higher-level
//! resource-owned-buffer scatter API and a lower-level batch primitive:
//!
//! - [`ScatterResource`]/[`ScatterResourceFactory`] — backend owns result
//!   buffers, scoped to the resource's lifetime.
//! - [`BatchBackend`] — caller owns every buffer; the backend is a pure
//!   batch executor.
//!
//! [`mock`] provides a deterministic in-memory implementation of both,
//! since no real acquisition device is available in this workspace.

mod batch;
mod error;
mod mock;
mod resource;

pub use batch::{BatchBackend, BatchRead, BatchReadResult, BatchWrite};
pub use error::BackendError;
pub use mock::{MockBackend, MockFaultInjector, MockResource};
pub use resource::{ScatterResource, ScatterResourceFactory};
