use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Process-wide, read-only-after-handle-creation switch: memory writes are
/// allowed while this is enabled, refused with `WritesDisabled` once it is
/// turned off. Backed by a single global so every `pscatter-core` handle,
/// regardless of which `ConfigStore` set it, observes the same switch.
pub struct WriteGate {
    enabled: AtomicBool,
}

impl WriteGate {
    pub fn global() -> &'static WriteGate {
        static GATE: OnceLock<WriteGate> = OnceLock::new();
        GATE.get_or_init(|| WriteGate {
            enabled: AtomicBool::new(true),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_enabled() {
        let _guard = crate::GLOBAL_GATE_TEST_LOCK.lock().unwrap();
        // Other tests in this process may have flipped the global gate;
        // only assert the type's own semantics, not a fresh-process default.
        let gate = WriteGate::global();
        gate.set_enabled(true);
        assert!(gate.is_enabled());
        gate.set_enabled(false);
        assert!(!gate.is_enabled());
        gate.set_enabled(true);
    }
}
