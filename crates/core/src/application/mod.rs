// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod feedback;
pub mod lifecycle;
pub mod store;
pub mod views;

// Re-exports
pub use feedback::FeedbackService;
pub use lifecycle::{LifecycleEngine, Transition};
pub use store::{ConditionalWrite, ShiftStore, Snapshot, StoreTier};
pub use views::View;
