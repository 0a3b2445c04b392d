use crate::core::config::store::ConfigStore;
use crate::core::config::value::ConfigValue;
use crate::core::error::Result;
use std::sync::{Arc, Mutex, MutexGuard};

/// A config store shared by the session and its components
pub type SharedConfig = Arc<Mutex<ConfigStore>>;

pub fn lock_config(config: &SharedConfig) -> MutexGuard<'_, ConfigStore> {
    config.lock().unwrap_or_else(|e| e.into_inner())
}

/// One instance's view of the shared config store
#[derive(Clone)]
pub struct ConfigHandle {
    store: SharedConfig,
    uid: String,
}

impl ConfigHandle {
    pub fn new(store: SharedConfig, uid: &str) -> Self {
        Self {
            store,
            uid: uid.to_string(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn get(&self, field: &str) -> Result<ConfigValue> {
        lock_config(&self.store).get(&self.uid, field)
    }

    pub fn get_f64(&self, field: &str, fallback: f64) -> f64 {
        self.get(field).ok().and_then(|v| v.as_f64()).unwrap_or(fallback)
    }

    pub fn get_bool(&self, field: &str, fallback: bool) -> bool {
        self.get(field).ok().and_then(|v| v.as_bool()).unwrap_or(fallback)
    }

    pub fn set(&self, field: &str, value: ConfigValue) -> Result<()> {
        lock_config(&self.store).set(&self.uid, field, value)
    }

    /// Handle onto another instance of the same store
    pub fn for_uid(&self, uid: &str) -> ConfigHandle {
        ConfigHandle::new(Arc::clone(&self.store), uid)
    }

    pub fn store(&self) -> &SharedConfig {
        &self.store
    }
}
