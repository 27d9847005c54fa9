use tracing_subscriber::EnvFilter;

/// Installs a process-wide `tracing` subscriber writing to stderr, honoring
/// `RUST_LOG` (default `info`). Library crates never call this themselves —
/// only the embedding binary/application does, so a library never clobbers
/// a subscriber the host process already installed.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
