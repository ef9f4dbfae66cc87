//! RPC Method Handlers
//!
//! Translates JSON-RPC parameters into lifecycle engine calls.

use crate::error::{throttled, to_rpc_error, to_rpc_error_with_snapshot};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    CancelRequest, ClaimRequest, CreateRequest, EditRequest, FeedbackRequest, FeedbackResponse,
    IdentityGetRequest, IdentityResponse, IdentitySetRequest, ListRequest, ListResponse,
    ReassignRequest, TransitionResponse,
};
use chrono::NaiveDateTime;
use jsonrpsee::types::ErrorObjectOwned;
use shiftswap_core::application::{FeedbackService, LifecycleEngine};
use shiftswap_core::domain::{parse_local_timestamp, ReassignChanges, ShiftDraft};
use shiftswap_core::error::AppError;
use std::sync::Arc;
use tracing::debug;

type RpcResult<T> = Result<T, ErrorObjectOwned>;

fn parse_time(field: &str, value: &str) -> Result<NaiveDateTime, AppError> {
    parse_local_timestamp(value).map_err(|e| AppError::Validation(format!("{}: {}", field, e)))
}

fn parse_optional_time(field: &str, value: Option<&str>) -> Result<Option<NaiveDateTime>, AppError> {
    value.map(|v| parse_time(field, v)).transpose()
}

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    engine: Arc<LifecycleEngine>,
    feedback: Arc<FeedbackService>,
    rate_limiter: Arc<RateLimiter>,
}

impl RpcHandler {
    pub fn new(
        engine: Arc<LifecycleEngine>,
        feedback: Arc<FeedbackService>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            engine,
            feedback,
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    /// Rate limiting check for mutating methods
    async fn admit(&self) -> RpcResult<()> {
        if self.rate_limiter.check().await {
            Ok(())
        } else {
            Err(throttled())
        }
    }

    /// Map an engine error, attaching a fresh snapshot when the caller's view is stale
    async fn reject(&self, err: AppError) -> ErrorObjectOwned {
        if err.requires_refresh() {
            let snapshot = self.engine.read_all().await;
            to_rpc_error_with_snapshot(err, Some(snapshot))
        } else {
            to_rpc_error(err)
        }
    }

    async fn actor(&self, actor: Option<&str>) -> RpcResult<String> {
        self.engine.resolve_actor(actor).await.map_err(to_rpc_error)
    }

    /// shifts.list.v1
    pub async fn list(&self, params: ListRequest) -> RpcResult<ListResponse> {
        let worker = match params.worker {
            Some(w) if !w.trim().is_empty() => Some(w.trim().to_string()),
            _ => self.engine.get_identity().await,
        };

        let snapshot = self.engine.list(params.view, worker.as_deref()).await;
        debug!(view = ?params.view, count = snapshot.shifts.len(), tier = %snapshot.tier, "Listed shifts");
        Ok(ListResponse::new(params.view, worker, snapshot))
    }

    /// shifts.create.v1
    pub async fn create(&self, params: CreateRequest) -> RpcResult<TransitionResponse> {
        self.admit().await?;
        let owner = self.actor(params.owner_id.as_deref()).await?;

        let draft = build_draft(&params.starts_at, &params.ends_at, params.notes, owner)
            .map_err(to_rpc_error)?;

        match self.engine.create(draft).await {
            Ok(t) => Ok(t),
            Err(e) => Err(self.reject(e).await),
        }
    }

    /// shifts.edit.v1
    pub async fn edit(&self, params: EditRequest) -> RpcResult<TransitionResponse> {
        self.admit().await?;
        let actor = self.actor(params.actor.as_deref()).await?;

        let owner = params.owner_id.unwrap_or_else(|| actor.clone());
        let draft = build_draft(&params.starts_at, &params.ends_at, params.notes, owner)
            .map_err(to_rpc_error)?;

        match self.engine.edit(&actor, &params.shift_id, draft).await {
            Ok(t) => Ok(t),
            Err(e) => Err(self.reject(e).await),
        }
    }

    /// shifts.claim.v1
    pub async fn claim(&self, params: ClaimRequest) -> RpcResult<TransitionResponse> {
        self.admit().await?;
        let actor = self.actor(params.actor.as_deref()).await?;

        match self.engine.claim(&actor, &params.shift_id).await {
            Ok(t) => Ok(t),
            Err(e) => Err(self.reject(e).await),
        }
    }

    /// shifts.reassign.v1
    pub async fn reassign(&self, params: ReassignRequest) -> RpcResult<TransitionResponse> {
        self.admit().await?;
        let actor = self.actor(params.actor.as_deref()).await?;

        let changes = ReassignChanges {
            starts_at: parse_optional_time("starts_at", params.starts_at.as_deref())
                .map_err(to_rpc_error)?,
            ends_at: parse_optional_time("ends_at", params.ends_at.as_deref())
                .map_err(to_rpc_error)?,
            notes: params.notes,
        };

        match self.engine.reassign(&actor, &params.shift_id, changes).await {
            Ok(t) => Ok(t),
            Err(e) => Err(self.reject(e).await),
        }
    }

    /// shifts.cancel.v1
    pub async fn cancel(&self, params: CancelRequest) -> RpcResult<TransitionResponse> {
        self.admit().await?;
        let actor = self.actor(params.actor.as_deref()).await?;

        match self.engine.cancel(&actor, &params.shift_id).await {
            Ok(t) => Ok(t),
            Err(e) => Err(self.reject(e).await),
        }
    }

    /// identity.get.v1
    pub async fn get_identity(&self, _params: IdentityGetRequest) -> RpcResult<IdentityResponse> {
        Ok(IdentityResponse {
            worker_id: self.engine.get_identity().await,
        })
    }

    /// identity.set.v1
    pub async fn set_identity(&self, params: IdentitySetRequest) -> RpcResult<IdentityResponse> {
        let worker_id = self
            .engine
            .set_identity(&params.worker_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(IdentityResponse {
            worker_id: Some(worker_id),
        })
    }

    /// feedback.submit.v1
    pub async fn submit_feedback(&self, params: FeedbackRequest) -> RpcResult<FeedbackResponse> {
        self.admit().await?;
        let feedback = self
            .feedback
            .submit(params.name, &params.email, &params.message)
            .await
            .map_err(to_rpc_error)?;

        Ok(FeedbackResponse {
            received: true,
            created_at: feedback.created_at,
        })
    }
}

fn build_draft(
    starts_at: &str,
    ends_at: &str,
    notes: Option<String>,
    owner: String,
) -> Result<ShiftDraft, AppError> {
    Ok(ShiftDraft::new(
        parse_time("starts_at", starts_at)?,
        parse_time("ends_at", ends_at)?,
        notes,
        owner,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use shiftswap_core::application::{ShiftStore, StoreTier, View};
    use shiftswap_core::domain::ShiftStatus;
    use shiftswap_core::port::feedback_repository::mocks::RecordingFeedbackRepository;
    use shiftswap_core::port::id_provider::mocks::SequentialIdProvider;
    use shiftswap_core::port::key_value_store::mocks::MemoryKeyValueStore;
    use shiftswap_core::port::shift_repository::mocks::InMemoryShiftRepository;
    use shiftswap_core::port::time_provider::mocks::FixedTimeProvider;

    fn handler_with_limit(burst: u32) -> RpcHandler {
        let store = Arc::new(ShiftStore::new(
            Arc::new(InMemoryShiftRepository::new()),
            Arc::new(MemoryKeyValueStore::new()),
        ));
        let time = Arc::new(FixedTimeProvider::new(1_700_000_000_000));
        let engine = Arc::new(LifecycleEngine::new(
            store,
            Arc::new(SequentialIdProvider::new()),
            time.clone(),
        ));
        let feedback = Arc::new(FeedbackService::new(
            Arc::new(RecordingFeedbackRepository::default()),
            time,
        ));
        RpcHandler::new(engine, feedback, RateLimiter::new(burst, 1))
    }

    fn handler() -> RpcHandler {
        handler_with_limit(100)
    }

    fn create_req(owner: &str) -> CreateRequest {
        CreateRequest {
            owner_id: Some(owner.to_string()),
            starts_at: "2024-01-01T08:00".to_string(),
            ends_at: "2024-01-01T16:00".to_string(),
            notes: None,
        }
    }

    async fn create(h: &RpcHandler, owner: &str) -> String {
        h.create(create_req(owner)).await.unwrap().shift.unwrap().id
    }

    fn claim_req(id: &str, actor: &str) -> ClaimRequest {
        ClaimRequest {
            shift_id: id.to_string(),
            actor: Some(actor.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let h = handler();
        let created = h.create(create_req("A")).await.unwrap();
        assert_eq!(created.stored_in, StoreTier::Primary);

        let list = h.list(ListRequest::default()).await.unwrap();
        assert_eq!(list.shifts.len(), 1);
        assert_eq!(list.shifts[0].duration, "8h 00m");
        // First create cached the owner as this device's identity
        assert_eq!(list.worker.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_timestamp() {
        let h = handler();
        let mut req = create_req("A");
        req.starts_at = "yesterday".to_string();

        let err = h.create(req).await.unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_create_without_identity_is_rejected() {
        let h = handler();
        let mut req = create_req("A");
        req.owner_id = None;

        let err = h.create(req).await.unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_lost_claim_carries_winner_and_snapshot() {
        let h = handler();
        let id = create(&h, "A").await;
        h.claim(claim_req(&id, "B")).await.unwrap();

        let err = h.claim(claim_req(&id, "C")).await.unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);

        let data: serde_json::Value = serde_json::from_str(err.data().unwrap().get()).unwrap();
        assert_eq!(data["claimer"], "B");
        assert_eq!(data["snapshot"]["shifts"][0]["status"], "claimed");
    }

    #[tokio::test]
    async fn test_claim_own_shift_is_forbidden() {
        let h = handler();
        let id = create(&h, "A").await;

        let err = h.claim(claim_req(&id, "A")).await.unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_reassign_and_cancel_flow() {
        let h = handler();
        let id = create(&h, "A").await;
        h.claim(claim_req(&id, "B")).await.unwrap();

        let err = h
            .cancel(CancelRequest {
                shift_id: id.clone(),
                actor: Some("A".to_string()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);

        let reopened = h
            .reassign(ReassignRequest {
                shift_id: id.clone(),
                actor: Some("B".to_string()),
                starts_at: None,
                ends_at: Some("2024-01-01T12:00".to_string()),
                notes: None,
            })
            .await
            .unwrap()
            .shift
            .unwrap();
        assert_eq!(reopened.status, ShiftStatus::Open);
        assert_eq!(reopened.owner_id, "B");

        let cancelled = h
            .cancel(CancelRequest {
                shift_id: id.clone(),
                actor: Some("B".to_string()),
            })
            .await
            .unwrap();
        assert!(!cancelled.snapshot.contains(&id));

        let err = h.claim(claim_req(&id, "C")).await.unwrap_err();
        assert_eq!(err.code(), code::UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_edit_uses_cached_identity() {
        let h = handler();
        let id = create(&h, "A").await;

        let edited = h
            .edit(EditRequest {
                shift_id: id,
                actor: None,
                starts_at: "2024-01-01T09:00".to_string(),
                ends_at: "2024-01-01T17:00:00".to_string(),
                notes: Some("moved".to_string()),
                owner_id: None,
            })
            .await
            .unwrap()
            .shift
            .unwrap();
        assert_eq!(edited.owner_id, "A");
        assert_eq!(edited.notes.as_deref(), Some("moved"));
    }

    #[tokio::test]
    async fn test_edit_hands_shift_to_new_owner() {
        let h = handler();
        let id = create(&h, "A").await;

        let edited = h
            .edit(EditRequest {
                shift_id: id.clone(),
                actor: Some("A".to_string()),
                starts_at: "2024-01-01T08:00".to_string(),
                ends_at: "2024-01-01T16:00".to_string(),
                notes: None,
                owner_id: Some(" D ".to_string()),
            })
            .await
            .unwrap()
            .shift
            .unwrap();
        assert_eq!(edited.owner_id, "D");

        // The old owner lost control, the new one may not claim it
        let err = h
            .cancel(CancelRequest {
                shift_id: id.clone(),
                actor: Some("A".to_string()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);
        let err = h.claim(claim_req(&id, "D")).await.unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);
        assert!(h.claim(claim_req(&id, "A")).await.is_ok());
    }

    #[tokio::test]
    async fn test_identity_roundtrip() {
        let h = handler();
        assert_eq!(
            h.get_identity(IdentityGetRequest::default())
                .await
                .unwrap()
                .worker_id,
            None
        );

        let set = h
            .set_identity(IdentitySetRequest {
                worker_id: "  W9 ".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(set.worker_id.as_deref(), Some("W9"));

        let err = h
            .set_identity(IdentitySetRequest {
                worker_id: " ".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_list_feed_view() {
        let h = handler();
        let a = create(&h, "A").await;
        create(&h, "B").await;
        h.claim(claim_req(&a, "C")).await.unwrap();

        let feed = h
            .list(ListRequest {
                view: View::Feed,
                worker: Some("C".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(feed.shifts.len(), 1);
        assert_eq!(feed.shifts[0].shift.owner_id, "B");
    }

    #[tokio::test]
    async fn test_feedback_submit() {
        let h = handler();
        let ok = h
            .submit_feedback(FeedbackRequest {
                name: None,
                email: "x@y.z".to_string(),
                message: "nice".to_string(),
            })
            .await
            .unwrap();
        assert!(ok.received);
        assert_eq!(ok.created_at, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_mutations_are_throttled() {
        let h = handler_with_limit(1);
        h.create(create_req("A")).await.unwrap();

        let err = h.create(create_req("A")).await.unwrap_err();
        assert_eq!(err.code(), code::THROTTLED);

        // Reads are not rate limited
        assert!(h.list(ListRequest::default()).await.is_ok());
    }
}
