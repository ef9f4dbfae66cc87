// Tiered Shift Store
//
// Primary backend first, device-local fallback when the primary fails.
// The tiers are NOT kept consistent: a write that fell back to the local
// store stays invisible to reads that the primary answers.

use crate::application::constants::{FALLBACK_SHIFTS_KEY, IDENTITY_KEY};
use crate::domain::{ClaimState, Shift, ShiftId, ShiftStatus, WorkerId};
use crate::error::{AppError, Result};
use crate::port::{KeyValueStore, ShiftRepository};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// Which backend served a read or accepted a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreTier {
    Primary,
    Fallback,
}

impl std::fmt::Display for StoreTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreTier::Primary => write!(f, "primary"),
            StoreTier::Fallback => write!(f, "fallback"),
        }
    }
}

/// Fully materialized list of shifts plus the tier that produced it
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub shifts: Vec<Shift>,
    pub tier: StoreTier,
}

impl Snapshot {
    fn new(mut shifts: Vec<Shift>, tier: StoreTier) -> Self {
        shifts.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then_with(|| a.id.cmp(&b.id)));
        Self { shifts, tier }
    }

    pub fn get(&self, id: &str) -> Option<&Shift> {
        self.shifts.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// Result of a conditional write (claim, edit, reassign, cancel)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalWrite {
    /// The record still matched and this call changed it
    Applied { tier: StoreTier },
    /// Someone else changed the record first, or it is gone
    Lost {
        current: Option<ClaimState>,
        tier: StoreTier,
    },
}

type FallbackMap = BTreeMap<ShiftId, Shift>;

/// Tiered store over the primary repository and the local fallback
pub struct ShiftStore {
    primary: Arc<dyn ShiftRepository>,
    local: Arc<dyn KeyValueStore>,
    // Serializes read-modify-write cycles on the fallback blob
    fallback_lock: Mutex<()>,
}

impl ShiftStore {
    pub fn new(primary: Arc<dyn ShiftRepository>, local: Arc<dyn KeyValueStore>) -> Self {
        Self {
            primary,
            local,
            fallback_lock: Mutex::new(()),
        }
    }

    /// Read every known shift; never fails
    pub async fn read_all(&self) -> Snapshot {
        match self.primary.find_all().await {
            Ok(shifts) => Snapshot::new(shifts, StoreTier::Primary),
            Err(e) => {
                warn!(error = %e, "Primary read failed, serving fallback store");
                let shifts = match self.load_fallback().await {
                    Ok(map) => map.into_values().collect(),
                    Err(e) => {
                        error!(error = %e, "Fallback read failed, returning empty snapshot");
                        Vec::new()
                    }
                };
                Snapshot::new(shifts, StoreTier::Fallback)
            }
        }
    }

    /// Authoritative read of one shift
    pub async fn find(&self, id: &ShiftId) -> Result<(Option<Shift>, StoreTier)> {
        match self.primary.find_by_id(id).await {
            Ok(shift) => Ok((shift, StoreTier::Primary)),
            Err(e) => {
                warn!(shift_id = %id, error = %e, "Primary lookup failed, using fallback store");
                let map = self.load_fallback().await?;
                Ok((map.get(id).cloned(), StoreTier::Fallback))
            }
        }
    }

    /// Authoritative read of status, claimer and owner
    pub async fn find_claim_state(&self, id: &ShiftId) -> Result<(Option<ClaimState>, StoreTier)> {
        match self.primary.find_claim_state(id).await {
            Ok(state) => Ok((state, StoreTier::Primary)),
            Err(e) => {
                warn!(shift_id = %id, error = %e, "Primary claim re-check failed, using fallback store");
                let map = self.load_fallback().await?;
                Ok((map.get(id).map(Shift::claim_state), StoreTier::Fallback))
            }
        }
    }

    /// Read one shift from a specific tier
    ///
    /// Used to read back a write from the tier that accepted it.
    pub async fn find_in(&self, id: &ShiftId, tier: StoreTier) -> Result<Option<Shift>> {
        match tier {
            StoreTier::Primary => self.primary.find_by_id(id).await,
            StoreTier::Fallback => Ok(self.load_fallback().await?.get(id).cloned()),
        }
    }

    /// Insert or replace a shift
    ///
    /// # Errors
    /// - validation error if the record breaks an invariant (nothing written)
    /// - storage error only if both tiers failed
    pub async fn upsert(&self, shift: &Shift) -> Result<StoreTier> {
        shift.validate()?;

        match self.primary.upsert(shift).await {
            Ok(()) => {
                debug!(shift_id = %shift.id, status = %shift.status, "Shift written to primary");
                Ok(StoreTier::Primary)
            }
            Err(e) => {
                warn!(shift_id = %shift.id, error = %e, "Primary upsert failed, writing to fallback store");
                self.mutate_fallback(|map| {
                    map.insert(shift.id.clone(), shift.clone());
                })
                .await?;
                Ok(StoreTier::Fallback)
            }
        }
    }

    /// Delete a shift; no-op if unknown
    pub async fn remove(&self, id: &ShiftId) -> Result<StoreTier> {
        match self.primary.delete(id).await {
            Ok(removed) => {
                debug!(shift_id = %id, removed, "Shift deleted from primary");
                Ok(StoreTier::Primary)
            }
            Err(e) => {
                warn!(shift_id = %id, error = %e, "Primary delete failed, deleting from fallback store");
                self.mutate_fallback(|map| {
                    map.remove(id);
                })
                .await?;
                Ok(StoreTier::Fallback)
            }
        }
    }

    /// Replace a shift only if its claim state still equals `expected`
    ///
    /// # Errors
    /// - validation error if the record breaks an invariant (nothing written)
    /// - storage error only if both tiers failed
    pub async fn replace_if(&self, shift: &Shift, expected: &ClaimState) -> Result<ConditionalWrite> {
        shift.validate()?;

        match self.primary.replace_if(shift, expected).await {
            Ok(true) => {
                debug!(shift_id = %shift.id, status = %shift.status, "Shift replaced in primary");
                Ok(ConditionalWrite::Applied {
                    tier: StoreTier::Primary,
                })
            }
            Ok(false) => Ok(self.lost_in_primary(&shift.id).await),
            Err(e) => {
                warn!(shift_id = %shift.id, error = %e, "Primary update failed, updating fallback store");
                self.mutate_fallback(|map| match map.get_mut(&shift.id) {
                    Some(current) if current.claim_state() == *expected => {
                        *current = shift.clone();
                        ConditionalWrite::Applied {
                            tier: StoreTier::Fallback,
                        }
                    }
                    other => ConditionalWrite::Lost {
                        current: other.map(|s| s.claim_state()),
                        tier: StoreTier::Fallback,
                    },
                })
                .await
            }
        }
    }

    /// Delete a shift only if its claim state still equals `expected`
    pub async fn remove_if(&self, id: &ShiftId, expected: &ClaimState) -> Result<ConditionalWrite> {
        match self.primary.delete_if(id, expected).await {
            Ok(true) => {
                debug!(shift_id = %id, "Shift deleted from primary");
                Ok(ConditionalWrite::Applied {
                    tier: StoreTier::Primary,
                })
            }
            Ok(false) => Ok(self.lost_in_primary(id).await),
            Err(e) => {
                warn!(shift_id = %id, error = %e, "Primary delete failed, deleting from fallback store");
                self.mutate_fallback(|map| {
                    let current = map.get(id).map(Shift::claim_state);
                    if current.as_ref() == Some(expected) {
                        map.remove(id);
                        ConditionalWrite::Applied {
                            tier: StoreTier::Fallback,
                        }
                    } else {
                        ConditionalWrite::Lost {
                            current,
                            tier: StoreTier::Fallback,
                        }
                    }
                })
                .await
            }
        }
    }

    /// Claim `id` for `claimer` only if it is still open
    pub async fn claim_if_open(&self, id: &ShiftId, claimer: &str) -> Result<ConditionalWrite> {
        match self.primary.claim_if_open(id, claimer).await {
            Ok(true) => Ok(ConditionalWrite::Applied {
                tier: StoreTier::Primary,
            }),
            Ok(false) => Ok(self.lost_in_primary(id).await),
            Err(e) => {
                warn!(shift_id = %id, error = %e, "Primary claim failed, claiming in fallback store");
                self.mutate_fallback(|map| match map.get_mut(id) {
                    Some(shift) if shift.status == ShiftStatus::Open && shift.owner_id != claimer => {
                        shift.status = ShiftStatus::Claimed;
                        shift.claimer_contact = Some(claimer.to_string());
                        ConditionalWrite::Applied {
                            tier: StoreTier::Fallback,
                        }
                    }
                    other => ConditionalWrite::Lost {
                        current: other.map(|s| s.claim_state()),
                        tier: StoreTier::Fallback,
                    },
                })
                .await
            }
        }
    }

    // The primary refused a conditional write; report what it holds now.
    // A failing re-read is reported as a vanished record, never as an error.
    async fn lost_in_primary(&self, id: &ShiftId) -> ConditionalWrite {
        let current = match self.primary.find_claim_state(id).await {
            Ok(current) => current,
            Err(e) => {
                warn!(shift_id = %id, error = %e, "Primary re-read after a refused write failed");
                None
            }
        };
        ConditionalWrite::Lost {
            current,
            tier: StoreTier::Primary,
        }
    }

    /// Cached worker identity of this device
    pub async fn get_identity(&self) -> Option<WorkerId> {
        match self.local.get(IDENTITY_KEY).await {
            Ok(value) => value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read cached identity");
                None
            }
        }
    }

    /// Cache the worker identity of this device
    pub async fn set_identity(&self, value: &str) -> Result<WorkerId> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::Validation("worker id must not be empty".to_string()));
        }
        self.local.set(IDENTITY_KEY, value).await?;
        Ok(value.to_string())
    }

    async fn load_fallback(&self) -> Result<FallbackMap> {
        let Some(raw) = self.local.get(FALLBACK_SHIFTS_KEY).await? else {
            return Ok(FallbackMap::new());
        };

        match serde_json::from_str::<FallbackMap>(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                // Unreadable blob is treated as empty, the next write replaces it
                warn!(error = %e, "Fallback blob is corrupt, treating as empty");
                Ok(FallbackMap::new())
            }
        }
    }

    async fn mutate_fallback<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut FallbackMap) -> T,
    {
        let _guard = self.fallback_lock.lock().await;

        let mut map = self.load_fallback().await?;
        let out = f(&mut map);
        let written = if map.is_empty() {
            // Nothing left to keep: drop the blob instead of storing `{}`
            self.local.remove(FALLBACK_SHIFTS_KEY).await
        } else {
            let raw = serde_json::to_string(&map)?;
            self.local.set(FALLBACK_SHIFTS_KEY, &raw).await
        };
        written.map_err(|e| {
            error!(error = %e, "Fallback write failed, change is lost");
            e
        })?;

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{parse_local_timestamp, ShiftDraft};
    use crate::port::key_value_store::mocks::MemoryKeyValueStore;
    use crate::port::shift_repository::mocks::InMemoryShiftRepository;

    fn setup() -> (Arc<InMemoryShiftRepository>, Arc<MemoryKeyValueStore>, ShiftStore) {
        let primary = Arc::new(InMemoryShiftRepository::new());
        let local = Arc::new(MemoryKeyValueStore::new());
        let store = ShiftStore::new(primary.clone(), local.clone());
        (primary, local, store)
    }

    fn shift(id: &str, owner: &str) -> Shift {
        Shift::open(
            id,
            1000,
            ShiftDraft::new(
                parse_local_timestamp("2024-01-01T08:00").unwrap(),
                parse_local_timestamp("2024-01-01T16:00").unwrap(),
                Some("bring keys".to_string()),
                owner,
            ),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_read_all_round_trips() {
        let (_, _, store) = setup();
        let s = shift("s1", "A");

        assert_eq!(store.upsert(&s).await.unwrap(), StoreTier::Primary);
        let snapshot = store.read_all().await;

        assert_eq!(snapshot.tier, StoreTier::Primary);
        assert_eq!(snapshot.get("s1"), Some(&s));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (primary, _, store) = setup();
        let s = shift("s1", "A");
        store.upsert(&s).await.unwrap();
        store.upsert(&s).await.unwrap();
        assert_eq!(primary.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_record() {
        let (primary, _, store) = setup();
        let mut s = shift("s1", "A");
        s.ends_at = s.starts_at;

        let err = store.upsert(&s).await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_primary_falls_back() {
        let (primary, local, store) = setup();
        primary.set_offline(true);
        let s = shift("s1", "A");

        assert_eq!(store.upsert(&s).await.unwrap(), StoreTier::Fallback);
        assert!(local.raw(FALLBACK_SHIFTS_KEY).is_some());

        let snapshot = store.read_all().await;
        assert_eq!(snapshot.tier, StoreTier::Fallback);
        assert_eq!(snapshot.get("s1"), Some(&s));
    }

    #[tokio::test]
    async fn test_tiers_diverge_after_recovery() {
        let (primary, _, store) = setup();
        primary.set_offline(true);
        store.upsert(&shift("s1", "A")).await.unwrap();
        primary.set_offline(false);

        // Primary answers again and never saw the fallback write
        let snapshot = store.read_all().await;
        assert_eq!(snapshot.tier, StoreTier::Primary);
        assert!(!snapshot.contains("s1"));
    }

    #[tokio::test]
    async fn test_both_tiers_down() {
        let (primary, local, store) = setup();
        primary.set_offline(true);
        local.set_broken(true);

        assert!(store.upsert(&shift("s1", "A")).await.is_err());

        let snapshot = store.read_all().await;
        assert_eq!(snapshot.tier, StoreTier::Fallback);
        assert!(snapshot.shifts.is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_, _, store) = setup();
        store.upsert(&shift("s1", "A")).await.unwrap();

        store.remove(&"s1".to_string()).await.unwrap();
        store.remove(&"s1".to_string()).await.unwrap();
        assert!(!store.read_all().await.contains("s1"));
    }

    #[tokio::test]
    async fn test_remove_falls_back() {
        let (primary, _, store) = setup();
        primary.set_offline(true);
        store.upsert(&shift("s1", "A")).await.unwrap();

        assert_eq!(
            store.remove(&"s1".to_string()).await.unwrap(),
            StoreTier::Fallback
        );
        assert!(store.read_all().await.shifts.is_empty());
    }

    #[tokio::test]
    async fn test_remove_if_unchanged() {
        let (_, _, store) = setup();
        let s = shift("s1", "A");
        store.upsert(&s).await.unwrap();

        assert_eq!(
            store.remove_if(&s.id, &s.claim_state()).await.unwrap(),
            ConditionalWrite::Applied {
                tier: StoreTier::Primary
            }
        );
        assert!(matches!(
            store.remove_if(&s.id, &s.claim_state()).await.unwrap(),
            ConditionalWrite::Lost { current: None, .. }
        ));
        assert!(!store.read_all().await.contains("s1"));
    }

    #[tokio::test]
    async fn test_remove_if_keeps_interleaved_claim() {
        let (primary, _, store) = setup();
        let s = shift("s1", "A");
        store.upsert(&s).await.unwrap();
        store.claim_if_open(&s.id, "B").await.unwrap();

        match store.remove_if(&s.id, &s.claim_state()).await.unwrap() {
            ConditionalWrite::Lost { current, .. } => {
                assert_eq!(current.unwrap().claimer_contact.as_deref(), Some("B"));
            }
            other => panic!("unexpected delete result: {other:?}"),
        }
        assert_eq!(primary.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_if_keeps_interleaved_claim() {
        let (primary, _, store) = setup();
        let s = shift("s1", "A");
        store.upsert(&s).await.unwrap();
        store.claim_if_open(&s.id, "B").await.unwrap();

        let mut edited = s.clone();
        edited.notes = None;
        assert!(matches!(
            store.replace_if(&edited, &s.claim_state()).await.unwrap(),
            ConditionalWrite::Lost { .. }
        ));
        assert_eq!(primary.rows()[0].claimer_contact.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_replace_if_rejects_invalid_record() {
        let (primary, _, store) = setup();
        let s = shift("s1", "A");
        store.upsert(&s).await.unwrap();
        let calls = primary.call_count();

        let mut bad = s.clone();
        bad.status = ShiftStatus::Cancelled;
        assert!(store.replace_if(&bad, &s.claim_state()).await.is_err());
        assert_eq!(primary.call_count(), calls);
    }

    #[tokio::test]
    async fn test_conditional_writes_in_fallback() {
        let (primary, local, store) = setup();
        primary.set_offline(true);
        let s = shift("s1", "A");
        store.upsert(&s).await.unwrap();
        store.claim_if_open(&s.id, "B").await.unwrap();

        // Stale expectation loses in the fallback tier too
        assert_eq!(
            store.remove_if(&s.id, &s.claim_state()).await.unwrap(),
            ConditionalWrite::Lost {
                current: store.find_claim_state(&s.id).await.unwrap().0,
                tier: StoreTier::Fallback
            }
        );

        let (claimed, _) = store.find(&s.id).await.unwrap();
        let claimed = claimed.unwrap();
        assert_eq!(
            store.remove_if(&s.id, &claimed.claim_state()).await.unwrap(),
            ConditionalWrite::Applied {
                tier: StoreTier::Fallback
            }
        );

        // Last fallback record gone: the blob is dropped
        assert!(local.raw(FALLBACK_SHIFTS_KEY).is_none());
        assert!(store.read_all().await.shifts.is_empty());
    }

    #[tokio::test]
    async fn test_find_in_reads_the_given_tier() {
        let (primary, _, store) = setup();
        primary.set_offline(true);
        store.upsert(&shift("s1", "A")).await.unwrap();
        primary.set_offline(false);

        let id = "s1".to_string();
        assert!(store.find_in(&id, StoreTier::Primary).await.unwrap().is_none());
        assert!(store.find_in(&id, StoreTier::Fallback).await.unwrap().is_some());
    }

    /// Refuses every conditional write, then fails the re-read
    struct RefusingRepository;

    #[async_trait::async_trait]
    impl ShiftRepository for RefusingRepository {
        async fn find_all(&self) -> Result<Vec<Shift>> {
            Ok(Vec::new())
        }
        async fn find_by_id(&self, _id: &ShiftId) -> Result<Option<Shift>> {
            Ok(None)
        }
        async fn find_claim_state(&self, _id: &ShiftId) -> Result<Option<ClaimState>> {
            Err(AppError::Database("connection reset".to_string()))
        }
        async fn upsert(&self, _shift: &Shift) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _id: &ShiftId) -> Result<bool> {
            Ok(false)
        }
        async fn replace_if(&self, _shift: &Shift, _expected: &ClaimState) -> Result<bool> {
            Ok(false)
        }
        async fn delete_if(&self, _id: &ShiftId, _expected: &ClaimState) -> Result<bool> {
            Ok(false)
        }
        async fn claim_if_open(&self, _id: &ShiftId, _claimer: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_failed_reread_after_lost_write_is_not_an_error() {
        let store = ShiftStore::new(
            Arc::new(RefusingRepository),
            Arc::new(MemoryKeyValueStore::new()),
        );
        let id = "s1".to_string();

        assert_eq!(
            store.claim_if_open(&id, "B").await.unwrap(),
            ConditionalWrite::Lost {
                current: None,
                tier: StoreTier::Primary
            }
        );
        let s = shift("s1", "A");
        assert!(matches!(
            store.remove_if(&id, &s.claim_state()).await.unwrap(),
            ConditionalWrite::Lost { current: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_claim_if_open_only_once() {
        let (_, _, store) = setup();
        store.upsert(&shift("s1", "A")).await.unwrap();
        let id = "s1".to_string();

        assert_eq!(
            store.claim_if_open(&id, "B").await.unwrap(),
            ConditionalWrite::Applied {
                tier: StoreTier::Primary
            }
        );
        match store.claim_if_open(&id, "C").await.unwrap() {
            ConditionalWrite::Lost { current, .. } => {
                let current = current.unwrap();
                assert_eq!(current.status, ShiftStatus::Claimed);
                assert_eq!(current.claimer_contact.as_deref(), Some("B"));
            }
            other => panic!("unexpected claim result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_claim_in_fallback() {
        let (primary, _, store) = setup();
        primary.set_offline(true);
        store.upsert(&shift("s1", "A")).await.unwrap();
        let id = "s1".to_string();

        assert_eq!(
            store.claim_if_open(&id, "B").await.unwrap(),
            ConditionalWrite::Applied {
                tier: StoreTier::Fallback
            }
        );
        let (found, tier) = store.find(&id).await.unwrap();
        assert_eq!(tier, StoreTier::Fallback);
        assert_eq!(found.unwrap().claimer_contact.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_corrupt_fallback_blob_reads_empty() {
        let (primary, local, store) = setup();
        local.set(FALLBACK_SHIFTS_KEY, "{not json").await.unwrap();
        primary.set_offline(true);

        assert!(store.read_all().await.shifts.is_empty());
        // Next write replaces the corrupt blob
        store.upsert(&shift("s1", "A")).await.unwrap();
        assert!(store.read_all().await.contains("s1"));
    }

    #[tokio::test]
    async fn test_identity_round_trip() {
        let (_, _, store) = setup();
        assert_eq!(store.get_identity().await, None);
        assert!(store.set_identity("   ").await.is_err());

        assert_eq!(store.set_identity(" 12345 ").await.unwrap(), "12345");
        assert_eq!(store.get_identity().await.as_deref(), Some("12345"));
    }
}
