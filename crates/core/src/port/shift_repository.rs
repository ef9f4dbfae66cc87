// Shift Repository Port (primary backend)

use crate::domain::{ClaimState, Shift, ShiftId};
use crate::error::Result;
use async_trait::async_trait;

/// Primary tabular backend for the `shifts` relation
///
/// Every method may fail when the backend is unreachable; the tiered
/// `ShiftStore` decides what to do about it.
#[async_trait]
pub trait ShiftRepository: Send + Sync {
    /// Read every shift
    async fn find_all(&self) -> Result<Vec<Shift>>;

    /// Find shift by ID
    async fn find_by_id(&self, id: &ShiftId) -> Result<Option<Shift>>;

    /// Read only status, claimer and owner of one shift
    async fn find_claim_state(&self, id: &ShiftId) -> Result<Option<ClaimState>>;

    /// Insert or replace the full record keyed by `shift.id`
    async fn upsert(&self, shift: &Shift) -> Result<()>;

    /// Delete by ID
    ///
    /// # Returns
    /// true if a row was removed
    async fn delete(&self, id: &ShiftId) -> Result<bool>;

    /// Replace the record only if its stored claim state still equals `expected`
    ///
    /// Must be a single atomic conditional update.
    ///
    /// # Returns
    /// true if this call replaced the record
    async fn replace_if(&self, shift: &Shift, expected: &ClaimState) -> Result<bool>;

    /// Delete only if the stored claim state still equals `expected`
    ///
    /// # Returns
    /// true if a row was removed
    async fn delete_if(&self, id: &ShiftId, expected: &ClaimState) -> Result<bool>;

    /// Claim a shift only if it is still open and not owned by `claimer`
    ///
    /// Must be a single atomic conditional update.
    ///
    /// # Returns
    /// true if this call claimed the shift
    async fn claim_if_open(&self, id: &ShiftId, claimer: &str) -> Result<bool>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::ShiftStatus;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory primary backend that can be switched offline
    #[derive(Default)]
    pub struct InMemoryShiftRepository {
        rows: Mutex<BTreeMap<ShiftId, Shift>>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl InMemoryShiftRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every following call fail (or succeed again)
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Direct view of the stored rows, bypassing the offline switch
        pub fn rows(&self) -> Vec<Shift> {
            self.rows.lock().unwrap().values().cloned().collect()
        }

        fn check(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(AppError::Database("primary backend offline".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ShiftRepository for InMemoryShiftRepository {
        async fn find_all(&self) -> Result<Vec<Shift>> {
            self.check()?;
            Ok(self.rows())
        }

        async fn find_by_id(&self, id: &ShiftId) -> Result<Option<Shift>> {
            self.check()?;
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }

        async fn find_claim_state(&self, id: &ShiftId) -> Result<Option<ClaimState>> {
            self.check()?;
            Ok(self.rows.lock().unwrap().get(id).map(Shift::claim_state))
        }

        async fn upsert(&self, shift: &Shift) -> Result<()> {
            self.check()?;
            self.rows
                .lock()
                .unwrap()
                .insert(shift.id.clone(), shift.clone());
            Ok(())
        }

        async fn delete(&self, id: &ShiftId) -> Result<bool> {
            self.check()?;
            Ok(self.rows.lock().unwrap().remove(id).is_some())
        }

        async fn replace_if(&self, shift: &Shift, expected: &ClaimState) -> Result<bool> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&shift.id) {
                Some(current) if current.claim_state() == *expected => {
                    *current = shift.clone();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn delete_if(&self, id: &ShiftId, expected: &ClaimState) -> Result<bool> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            if rows.get(id).map(Shift::claim_state).as_ref() == Some(expected) {
                rows.remove(id);
                return Ok(true);
            }
            Ok(false)
        }

        async fn claim_if_open(&self, id: &ShiftId, claimer: &str) -> Result<bool> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(id) {
                Some(shift) if shift.status == ShiftStatus::Open && shift.owner_id != claimer => {
                    shift.status = ShiftStatus::Claimed;
                    shift.claimer_contact = Some(claimer.to_string());
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }
}
