//! Thin façade wiring logging initialization, config loading, and CLI
//! argument passthrough around the scatter engine. The engine crates
//! (`pscatter-addr`, `pscatter-backend`, `pscatter-splice`, `pscatter-core`,
//! `pscatter-readmap`, `pscatter-config`) are usable on their own; this
//! crate is the convenience entry point for an embedding application.

mod cli;
mod logging;

pub use cli::{parse_args, Cli};
pub use logging::init_logging;

pub use pscatter_addr::{
    is_valid_for_class, is_valid_kernel_va, is_valid_user_va, is_valid_va, AddressClass,
    ScatterFlags, TargetId, ValidationError, PAGE_SIZE,
};
pub use pscatter_backend::{BackendError, MockBackend, MockFaultInjector, MockResource, ScatterResource, ScatterResourceFactory};
pub use pscatter_config::{key, Access, ConfigError, ConfigKey, ConfigStore, WriteGate, DOMAIN_CORE, KEY_MEMORY_WRITE_DISABLE};
pub use pscatter_core::{BatchResourceFactory, BatchScatterResource, Lease, LeasePool, ScatterError, ScatterHandle, ScatterMap, StringEncoding};
pub use pscatter_readmap::{EntryKind, ReadMap, ReadMapEntry};
