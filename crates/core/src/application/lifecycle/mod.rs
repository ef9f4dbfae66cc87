// Lifecycle Engine - create / edit / claim / reassign / cancel
//
// Every transition re-reads the record from the store before deciding,
// then writes conditionally on the claim state it read. A claim landing in
// between makes the write fail instead of being overwritten, so two workers
// racing for the same shift cannot both win.


use crate::application::store::{ConditionalWrite, ShiftStore, Snapshot, StoreTier};
use crate::application::views::View;
use crate::domain::{
    ClaimState, DomainError, ReassignChanges, Shift, ShiftDraft, ShiftId, ShiftStatus, WorkerId,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TimeProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of an accepted transition
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    /// Record after the transition (`None` after cancel)
    pub shift: Option<Shift>,
    /// Tier that accepted the write
    pub stored_in: StoreTier,
    /// Fresh view of all shifts
    pub snapshot: Snapshot,
}

/// Shift lifecycle engine
pub struct LifecycleEngine {
    store: Arc<ShiftStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<ShiftStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            id_provider,
            time_provider,
        }
    }

    /// Every known shift
    pub async fn read_all(&self) -> Snapshot {
        self.store.read_all().await
    }

    /// Shifts visible in one view for `worker`
    pub async fn list(&self, view: View, worker: Option<&str>) -> Snapshot {
        let snapshot = self.store.read_all().await;
        Snapshot {
            shifts: view.select(&snapshot.shifts, worker),
            tier: snapshot.tier,
        }
    }

    pub async fn get_identity(&self) -> Option<WorkerId> {
        self.store.get_identity().await
    }

    pub async fn set_identity(&self, value: &str) -> Result<WorkerId> {
        let id = self.store.set_identity(value).await?;
        info!(worker_id = %id, "Worker identity cached");
        Ok(id)
    }

    /// Use the explicit actor, or the cached identity when none was given
    pub async fn resolve_actor(&self, actor: Option<&str>) -> Result<WorkerId> {
        match actor.map(str::trim).filter(|a| !a.is_empty()) {
            Some(actor) => Ok(actor.to_string()),
            None => self.store.get_identity().await.ok_or_else(|| {
                AppError::Validation(
                    "worker id required: pass one or cache it on this device first".to_string(),
                )
            }),
        }
    }

    /// Offer a new shift (∅ -> open)
    pub async fn create(&self, draft: ShiftDraft) -> Result<Transition> {
        let shift = Shift::open(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            draft,
        )?;

        let tier = self.store.upsert(&shift).await?;
        info!(
            shift_id = %shift.id,
            owner_id = %shift.owner_id,
            starts_at = %shift.starts_at,
            stored_in = %tier,
            "Shift created"
        );

        self.remember_identity(&shift.owner_id).await;
        Ok(self.finish(Some(shift), tier).await)
    }

    /// Owner edits an open shift (open -> open)
    pub async fn edit(&self, actor: &str, id: &ShiftId, draft: ShiftDraft) -> Result<Transition> {
        let actor = require_actor(actor)?;
        let mut shift = self.load(id).await?;
        let expected = shift.claim_state();

        shift.apply_edit(actor, draft)?;
        let write = self.store.replace_if(&shift, &expected).await?;
        let tier = settle(id, actor, write)?;
        info!(shift_id = %id, actor = %actor, stored_in = %tier, "Shift updated");

        Ok(self.finish(Some(shift), tier).await)
    }

    /// Take an open shift (open -> claimed)
    pub async fn claim(&self, actor: &str, id: &ShiftId) -> Result<Transition> {
        let actor = require_actor(actor)?;

        // Never trust a cached status: re-check right before claiming
        let (state, checked_in) = self.store.find_claim_state(id).await?;
        if let Some(rejection) = claim_rejection(id, state.as_ref(), actor) {
            info!(shift_id = %id, actor = %actor, checked_in = %checked_in, reason = %rejection, "Claim rejected");
            return Err(rejection.into());
        }

        match self.store.claim_if_open(id, actor).await? {
            ConditionalWrite::Applied { tier } => {
                info!(shift_id = %id, claimer = %actor, stored_in = %tier, "Shift claimed");
                self.remember_identity(actor).await;

                // Read back from the tier that took the claim; the snapshot
                // may come from the other one
                let shift = match self.store.find_in(id, tier).await {
                    Ok(shift) => shift,
                    Err(e) => {
                        warn!(shift_id = %id, tier = %tier, error = %e, "Claimed shift read-back failed");
                        None
                    }
                };
                let snapshot = self.store.read_all().await;
                let shift = shift.or_else(|| snapshot.get(id).cloned());
                Ok(Transition {
                    shift,
                    stored_in: tier,
                    snapshot,
                })
            }
            ConditionalWrite::Lost { current, tier } => {
                let rejection = claim_rejection(id, current.as_ref(), actor)
                    .unwrap_or_else(|| DomainError::NoLongerAvailable(id.clone()));
                warn!(shift_id = %id, actor = %actor, tier = %tier, reason = %rejection, "Claim lost the race");
                Err(rejection.into())
            }
        }
    }

    /// Claimer passes the shift forward again (claimed -> open)
    pub async fn reassign(
        &self,
        actor: &str,
        id: &ShiftId,
        changes: ReassignChanges,
    ) -> Result<Transition> {
        let actor = require_actor(actor)?;
        let mut shift = self.load(id).await?;
        let expected = shift.claim_state();
        let previous_owner = shift.owner_id.clone();

        shift.reassign(actor, changes)?;
        let write = self.store.replace_if(&shift, &expected).await?;
        let tier = settle(id, actor, write)?;
        info!(
            shift_id = %id,
            previous_owner = %previous_owner,
            new_owner = %shift.owner_id,
            stored_in = %tier,
            "Shift passed on"
        );

        Ok(self.finish(Some(shift), tier).await)
    }

    /// Owner withdraws an open shift (record deleted)
    pub async fn cancel(&self, actor: &str, id: &ShiftId) -> Result<Transition> {
        let actor = require_actor(actor)?;
        let shift = self.load(id).await?;

        shift.ensure_cancellable_by(actor)?;
        let write = self.store.remove_if(id, &shift.claim_state()).await?;
        let tier = settle(id, actor, write)?;
        info!(shift_id = %id, actor = %actor, stored_in = %tier, "Shift deleted");

        Ok(self.finish(None, tier).await)
    }

    async fn load(&self, id: &ShiftId) -> Result<Shift> {
        let (shift, _) = self.store.find(id).await?;
        shift.ok_or_else(|| DomainError::ShiftNotFound(id.clone()).into())
    }

    async fn finish(&self, shift: Option<Shift>, stored_in: StoreTier) -> Transition {
        Transition {
            shift,
            stored_in,
            snapshot: self.store.read_all().await,
        }
    }

    /// First worker id used on this device becomes the cached identity
    async fn remember_identity(&self, worker: &str) {
        if self.store.get_identity().await.is_some() {
            return;
        }
        if let Err(e) = self.store.set_identity(worker).await {
            warn!(error = %e, "Failed to cache worker identity");
        }
    }
}

fn require_actor(actor: &str) -> Result<&str> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(AppError::Validation("worker id must not be empty".to_string()));
    }
    Ok(actor)
}

/// Tier of an applied write, or the rejection for a record changed underneath
fn settle(id: &ShiftId, actor: &str, write: ConditionalWrite) -> Result<StoreTier> {
    match write {
        ConditionalWrite::Applied { tier } => Ok(tier),
        ConditionalWrite::Lost { current, tier } => {
            let rejection = stale_rejection(id, current.as_ref());
            warn!(shift_id = %id, actor = %actor, tier = %tier, reason = %rejection, "Shift changed before the write");
            Err(rejection.into())
        }
    }
}

/// Rejection for a write that found the record changed since it was read
fn stale_rejection(id: &ShiftId, current: Option<&ClaimState>) -> DomainError {
    match current {
        Some(ClaimState {
            status: ShiftStatus::Claimed,
            claimer_contact,
            ..
        }) => DomainError::AlreadyClaimed {
            shift_id: id.clone(),
            claimer: claimer_contact.clone().unwrap_or_default(),
        },
        _ => DomainError::NoLongerAvailable(id.clone()),
    }
}

/// Why `actor` may not claim a shift in `state`, if anything
fn claim_rejection(id: &ShiftId, state: Option<&ClaimState>, actor: &str) -> Option<DomainError> {
    let Some(state) = state else {
        return Some(DomainError::NoLongerAvailable(id.clone()));
    };

    match state.status {
        ShiftStatus::Claimed => Some(DomainError::AlreadyClaimed {
            shift_id: id.clone(),
            claimer: state.claimer_contact.clone().unwrap_or_default(),
        }),
        ShiftStatus::Cancelled => Some(DomainError::NoLongerAvailable(id.clone())),
        ShiftStatus::Open if state.owner_id == actor => Some(DomainError::PermissionDenied(
            "you cannot claim your own shift".to_string(),
        )),
        ShiftStatus::Open => None,
    }
}
