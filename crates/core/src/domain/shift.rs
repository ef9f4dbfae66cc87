// Shift Domain Model

use crate::domain::error::{DomainError, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Shift ID (UUID v4)
pub type ShiftId = String;

/// Self-declared worker identifier (not authenticated)
pub type WorkerId = String;

/// Accepted input formats for local timestamps
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Shift status
///
/// `Cancelled` is never persisted: cancelling deletes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Open,
    Claimed,
    Cancelled,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Open => "open",
            ShiftStatus::Claimed => "claimed",
            ShiftStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShiftStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(ShiftStatus::Open),
            "claimed" => Ok(ShiftStatus::Claimed),
            "cancelled" => Ok(ShiftStatus::Cancelled),
            other => Err(DomainError::Validation(format!(
                "unknown shift status: {}",
                other
            ))),
        }
    }
}

/// Parse a timezone-naive local timestamp (`2024-01-01T08:00` or with seconds)
pub fn parse_local_timestamp(input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .ok_or_else(|| DomainError::Validation(format!("invalid timestamp: {:?}", input)))
}

/// Render a duration as `8h 00m`
pub fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

/// Trim a free-text field; blank input becomes `None`
pub fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Fields a worker supplies when offering or editing a shift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftDraft {
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
    pub owner_id: WorkerId,
}

impl ShiftDraft {
    pub fn new(
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
        notes: Option<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            starts_at,
            ends_at,
            notes,
            owner_id: owner_id.into(),
        }
    }

    /// Trim text fields and check the interval
    pub fn normalized(self) -> Result<Self> {
        let owner_id = self.owner_id.trim().to_string();
        if owner_id.is_empty() {
            return Err(DomainError::Validation("owner id is required".to_string()));
        }
        validate_interval(self.starts_at, self.ends_at)?;

        Ok(Self {
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            notes: normalize_notes(self.notes),
            owner_id,
        })
    }
}

/// Optional changes supplied when a claimer passes a shift forward again
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReassignChanges {
    #[serde(default)]
    pub starts_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub ends_at: Option<NaiveDateTime>,
    /// `Some("")` clears the notes, `None` keeps them
    #[serde(default)]
    pub notes: Option<String>,
}

/// Subset of a shift read when re-checking a claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimState {
    pub status: ShiftStatus,
    pub claimer_contact: Option<WorkerId>,
    pub owner_id: WorkerId,
}

/// Shift Entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub created_at: i64, // epoch ms
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub owner_id: WorkerId,
    pub status: ShiftStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimer_contact: Option<WorkerId>,
}

fn validate_interval(starts_at: NaiveDateTime, ends_at: NaiveDateTime) -> Result<()> {
    if ends_at <= starts_at {
        return Err(DomainError::Validation(format!(
            "shift must end after it starts ({} >= {})",
            starts_at, ends_at
        )));
    }
    Ok(())
}

impl Shift {
    /// Create an open shift from a draft
    ///
    /// # Arguments
    ///
    /// * `id` - Unique shift ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `draft` - Worker supplied fields
    pub fn open(id: impl Into<String>, created_at: i64, draft: ShiftDraft) -> Result<Self> {
        let draft = draft.normalized()?;
        let shift = Self {
            id: id.into(),
            created_at,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            notes: draft.notes,
            owner_id: draft.owner_id,
            status: ShiftStatus::Open,
            claimer_contact: None,
        };
        shift.validate()?;
        Ok(shift)
    }

    /// Check every record invariant
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DomainError::Validation("shift id is required".to_string()));
        }
        if self.owner_id.trim().is_empty() {
            return Err(DomainError::Validation("owner id is required".to_string()));
        }
        validate_interval(self.starts_at, self.ends_at)?;

        match (self.status, &self.claimer_contact) {
            // Cancel deletes the record; this status is never stored
            (ShiftStatus::Cancelled, _) => Err(DomainError::Validation(
                "cancelled shift cannot be stored".to_string(),
            )),
            (ShiftStatus::Claimed, Some(c)) if !c.trim().is_empty() => Ok(()),
            (ShiftStatus::Claimed, _) => Err(DomainError::Validation(
                "claimed shift must name its claimer".to_string(),
            )),
            (_, Some(_)) => Err(DomainError::Validation(format!(
                "{} shift cannot have a claimer",
                self.status
            ))),
            (_, None) => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }

    pub fn is_owned_by(&self, worker: &str) -> bool {
        self.owner_id == worker
    }

    pub fn is_claimed_by(&self, worker: &str) -> bool {
        self.status == ShiftStatus::Claimed && self.claimer_contact.as_deref() == Some(worker)
    }

    pub fn duration(&self) -> Duration {
        self.ends_at - self.starts_at
    }

    pub fn claim_state(&self) -> ClaimState {
        ClaimState {
            status: self.status,
            claimer_contact: self.claimer_contact.clone(),
            owner_id: self.owner_id.clone(),
        }
    }

    /// Apply an owner's edit (open -> open)
    pub fn apply_edit(&mut self, actor: &str, draft: ShiftDraft) -> Result<()> {
        if !self.is_owned_by(actor) {
            return Err(DomainError::PermissionDenied(
                "only the owner can edit this shift".to_string(),
            ));
        }
        if !self.is_open() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "open (edit)".to_string(),
            });
        }

        let draft = draft.normalized()?;
        self.starts_at = draft.starts_at;
        self.ends_at = draft.ends_at;
        self.notes = draft.notes;
        self.owner_id = draft.owner_id;
        Ok(())
    }

    /// Take an open shift (open -> claimed)
    pub fn claim(&mut self, actor: &str) -> Result<()> {
        match self.status {
            ShiftStatus::Open => {}
            ShiftStatus::Claimed => {
                return Err(DomainError::AlreadyClaimed {
                    shift_id: self.id.clone(),
                    claimer: self.claimer_contact.clone().unwrap_or_default(),
                })
            }
            ShiftStatus::Cancelled => return Err(DomainError::NoLongerAvailable(self.id.clone())),
        }
        if self.is_owned_by(actor) {
            return Err(DomainError::PermissionDenied(
                "you cannot claim your own shift".to_string(),
            ));
        }

        self.status = ShiftStatus::Claimed;
        self.claimer_contact = Some(actor.to_string());
        Ok(())
    }

    /// Pass a claimed shift forward again (claimed -> open, claimer becomes owner)
    pub fn reassign(&mut self, actor: &str, changes: ReassignChanges) -> Result<()> {
        if self.status != ShiftStatus::Claimed {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "open (reassign)".to_string(),
            });
        }
        if !self.is_claimed_by(actor) {
            return Err(DomainError::PermissionDenied(
                "only the current claimer can pass this shift on".to_string(),
            ));
        }

        let starts_at = changes.starts_at.unwrap_or(self.starts_at);
        let ends_at = changes.ends_at.unwrap_or(self.ends_at);
        validate_interval(starts_at, ends_at)?;

        self.starts_at = starts_at;
        self.ends_at = ends_at;
        if changes.notes.is_some() {
            self.notes = normalize_notes(changes.notes);
        }
        self.owner_id = actor.to_string();
        self.status = ShiftStatus::Open;
        self.claimer_contact = None;
        Ok(())
    }

    /// Check that the actor may delete this shift
    pub fn ensure_cancellable_by(&self, actor: &str) -> Result<()> {
        if !self.is_owned_by(actor) {
            return Err(DomainError::PermissionDenied(
                "only the owner can delete this shift".to_string(),
            ));
        }
        if !self.is_open() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: ShiftStatus::Cancelled.to_string(),
            });
        }
        Ok(())
    }
}
