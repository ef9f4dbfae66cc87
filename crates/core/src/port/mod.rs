// Port Layer - Interfaces for external dependencies

pub mod feedback_repository;
pub mod id_provider; // For deterministic testing
pub mod key_value_store;
pub mod shift_repository;
pub mod time_provider;

// Re-exports
pub use feedback_repository::FeedbackRepository;
pub use id_provider::IdProvider;
pub use key_value_store::KeyValueStore;
pub use shift_repository::ShiftRepository;
pub use time_provider::TimeProvider;
