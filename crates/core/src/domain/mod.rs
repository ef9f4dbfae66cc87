// Domain Layer - Pure business logic and entities

pub mod error;
pub mod feedback;
pub mod shift;

// Re-exports
pub use error::DomainError;
pub use feedback::Feedback;
pub use shift::{
    format_duration, parse_local_timestamp, ClaimState, ReassignChanges, Shift, ShiftDraft,
    ShiftId, ShiftStatus, WorkerId,
};
