//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use serde_json::json;
use shiftswap_core::application::Snapshot;
use shiftswap_core::domain::DomainError;
use shiftswap_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const FORBIDDEN: i32 = 4004;
    pub const UNAVAILABLE: i32 = 4005;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    to_rpc_error_with_snapshot(err, None)
}

/// Like [`to_rpc_error`], attaching a refreshed snapshot to stale-view rejections
pub fn to_rpc_error_with_snapshot(err: AppError, snapshot: Option<Snapshot>) -> ErrorObjectOwned {
    let message = err.to_string();
    match err {
        AppError::Domain(e) => match e {
            DomainError::Validation(_) => {
                ErrorObjectOwned::owned(code::VALIDATION_ERROR, message, None::<()>)
            }
            DomainError::PermissionDenied(_) => {
                ErrorObjectOwned::owned(code::FORBIDDEN, message, None::<()>)
            }
            DomainError::InvalidStateTransition { .. } => {
                ErrorObjectOwned::owned(code::CONFLICT, message, None::<()>)
            }
            DomainError::AlreadyClaimed { shift_id, claimer } => ErrorObjectOwned::owned(
                code::CONFLICT,
                message,
                Some(json!({
                    "shift_id": shift_id,
                    "claimer": claimer,
                    "snapshot": snapshot,
                })),
            ),
            DomainError::NoLongerAvailable(shift_id) => ErrorObjectOwned::owned(
                code::UNAVAILABLE,
                message,
                Some(json!({ "shift_id": shift_id, "snapshot": snapshot })),
            ),
            DomainError::ShiftNotFound(shift_id) => ErrorObjectOwned::owned(
                code::NOT_FOUND,
                message,
                Some(json!({ "shift_id": shift_id, "snapshot": snapshot })),
            ),
        },
        AppError::Validation(_) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, message, None::<()>)
        }
        AppError::NotFound(_) => ErrorObjectOwned::owned(code::NOT_FOUND, message, None::<()>),
        AppError::Database(_) | AppError::Storage(_) => {
            ErrorObjectOwned::owned(code::DB_ERROR, message, None::<()>)
        }
        AppError::Io(_)
        | AppError::Serialization(_)
        | AppError::Config(_)
        | AppError::Internal(_) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, message, None::<()>)
        }
    }
}

/// Error returned when the rate limiter denies a request
pub fn throttled() -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        None::<()>,
    )
}
