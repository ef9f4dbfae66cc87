// ShiftSwap Infrastructure - SQLite Adapter
// Implements: ShiftRepository (primary tier), FeedbackRepository

mod connection;
mod feedback_repository;
mod migration;
mod shift_repository;

pub use connection::{create_lazy_pool, create_pool};
pub use feedback_repository::SqliteFeedbackRepository;
pub use migration::run_migrations;
pub use shift_repository::SqliteShiftRepository;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
