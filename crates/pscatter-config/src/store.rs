use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::gate::WriteGate;
use crate::key::{Access, ConfigKey, KEY_MEMORY_WRITE_DISABLE};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config key {0:#018x} is read-only")]
    ReadOnly(ConfigKey),
}

/// The opaque `u64` config key space. Most keys are plumbing for
/// the non-core collaborators (device selection, refresh timers, and so
/// on) and are simply stored and returned verbatim; `pscatter-core` only
/// ever consults [`KEY_MEMORY_WRITE_DISABLE`], mirrored here into the
/// process-wide [`WriteGate`] so the core doesn't need a `ConfigStore`
/// reference of its own.
pub struct ConfigStore {
    values: Mutex<HashMap<ConfigKey, u64>>,
    access: HashMap<ConfigKey, Access>,
}

impl ConfigStore {
    pub fn new() -> Self {
        let mut values = HashMap::new();
        values.insert(KEY_MEMORY_WRITE_DISABLE, 0);
        let mut access = HashMap::new();
        access.insert(KEY_MEMORY_WRITE_DISABLE, Access::ReadWrite);
        ConfigStore {
            values: Mutex::new(values),
            access,
        }
    }

    /// Marks `key` read-only from now on (used by the façade to lock down
    /// keys it has already resolved from the CLI at startup).
    pub fn with_read_only(mut self, key: ConfigKey) -> Self {
        self.access.insert(key, Access::ReadOnly);
        self
    }

    pub fn get(&self, key: ConfigKey) -> Option<u64> {
        self.values.lock().unwrap().get(&key).copied()
    }

    pub fn set(&self, key: ConfigKey, value: u64) -> Result<(), ConfigError> {
        if self.access.get(&key) == Some(&Access::ReadOnly) {
            return Err(ConfigError::ReadOnly(key));
        }
        self.values.lock().unwrap().insert(key, value);
        if key == KEY_MEMORY_WRITE_DISABLE {
            WriteGate::global().set_enabled(value == 0);
        }
        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_write_disable_key_flips_the_global_gate() {
        let _guard = crate::GLOBAL_GATE_TEST_LOCK.lock().unwrap();
        let store = ConfigStore::new();
        store.set(KEY_MEMORY_WRITE_DISABLE, 1).unwrap();
        assert!(!WriteGate::global().is_enabled());
        store.set(KEY_MEMORY_WRITE_DISABLE, 0).unwrap();
        assert!(WriteGate::global().is_enabled());
    }

    #[test]
    fn read_only_key_rejects_writes() {
        let _guard = crate::GLOBAL_GATE_TEST_LOCK.lock().unwrap();
        let store = ConfigStore::new().with_read_only(KEY_MEMORY_WRITE_DISABLE);
        assert!(store.set(KEY_MEMORY_WRITE_DISABLE, 1).is_err());
    }

    #[test]
    fn unknown_keys_round_trip_verbatim() {
        let store = ConfigStore::new();
        let k = crate::key::key(0x42, 7);
        assert_eq!(store.get(k), None);
        store.set(k, 99).unwrap();
        assert_eq!(store.get(k), Some(99));
    }
}
