// ShiftSwap Infrastructure - Device-local Adapters
// Implements: KeyValueStore (fallback tier + identity cache)

pub mod file_store;

pub use file_store::{default_data_dir, FileKeyValueStore};
