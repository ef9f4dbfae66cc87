// Device-local Key/Value Store Port (fallback tier + identity cache)

use crate::error::Result;
use async_trait::async_trait;

/// Small string store scoped to the current device
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` if the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write (replace) a value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; no-op when absent
    async fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory key/value store
    #[derive(Default)]
    pub struct MemoryKeyValueStore {
        values: Mutex<HashMap<String, String>>,
        broken: AtomicBool,
    }

    impl MemoryKeyValueStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every following call fail
        pub fn set_broken(&self, broken: bool) {
            self.broken.store(broken, Ordering::SeqCst);
        }

        /// Raw value, bypassing the broken switch
        pub fn raw(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }

        fn check(&self) -> Result<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(AppError::Storage("local store unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl KeyValueStore for MemoryKeyValueStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.check()?;
            Ok(self.raw(key))
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.check()?;
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.check()?;
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
    }
}
