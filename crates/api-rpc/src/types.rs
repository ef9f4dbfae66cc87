//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results. Timestamps travel as
//! local `YYYY-MM-DDTHH:MM[:SS]` strings. `actor` is optional everywhere:
//! the identity cached on this device is used when it is absent.

use serde::{Deserialize, Serialize};
use shiftswap_core::application::{Snapshot, StoreTier, Transition, View};
use shiftswap_core::domain::Shift;

/// shifts.list.v1 - Read shifts, optionally as one worker's view
#[derive(Debug, Default, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub view: View,
    /// Worker whose view to build (defaults to the cached identity)
    #[serde(default)]
    pub worker: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub view: View,
    pub worker: Option<String>,
    pub tier: StoreTier,
    pub shifts: Vec<ShiftSummary>,
}

/// Shift plus display helpers
#[derive(Debug, Clone, Serialize)]
pub struct ShiftSummary {
    #[serde(flatten)]
    pub shift: Shift,
    pub duration: String,
}

impl From<Shift> for ShiftSummary {
    fn from(shift: Shift) -> Self {
        let duration = shiftswap_core::domain::format_duration(shift.duration());
        Self { shift, duration }
    }
}

impl ListResponse {
    pub fn new(view: View, worker: Option<String>, snapshot: Snapshot) -> Self {
        Self {
            view,
            worker,
            tier: snapshot.tier,
            shifts: snapshot.shifts.into_iter().map(ShiftSummary::from).collect(),
        }
    }
}

/// shifts.create.v1 - Offer a new shift
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub owner_id: Option<String>,
    pub starts_at: String,
    pub ends_at: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// shifts.edit.v1 - Owner edits an open shift
#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub shift_id: String,
    #[serde(default)]
    pub actor: Option<String>,
    pub starts_at: String,
    pub ends_at: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Hand the offer to another worker; defaults to the actor
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// shifts.claim.v1 - Take an open shift
#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub shift_id: String,
    #[serde(default)]
    pub actor: Option<String>,
}

/// shifts.reassign.v1 - Claimer passes a shift on again
#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub shift_id: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// shifts.cancel.v1 - Owner deletes an open shift
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub shift_id: String,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Result of every accepted transition
pub type TransitionResponse = Transition;

/// identity.get.v1
#[derive(Debug, Default, Deserialize)]
pub struct IdentityGetRequest {
    // No parameters needed
}

/// identity.set.v1
#[derive(Debug, Deserialize)]
pub struct IdentitySetRequest {
    pub worker_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityResponse {
    pub worker_id: Option<String>,
}

/// feedback.submit.v1
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub received: bool,
    pub created_at: i64,
}
