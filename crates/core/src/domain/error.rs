// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Claim lost the race; `claimer` holds the shift
    #[error("Shift {shift_id} was already claimed by {claimer}")]
    AlreadyClaimed { shift_id: String, claimer: String },

    #[error("Shift {0} is no longer available")]
    NoLongerAvailable(String),

    #[error("Invalid shift state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Shift not found: {0}")]
    ShiftNotFound(String),
}

impl DomainError {
    /// True when the caller's view is stale and should be reloaded
    pub fn requires_refresh(&self) -> bool {
        matches!(
            self,
            DomainError::AlreadyClaimed { .. }
                | DomainError::NoLongerAvailable(_)
                | DomainError::ShiftNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
