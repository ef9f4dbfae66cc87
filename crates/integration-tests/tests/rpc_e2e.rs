//! JSON-RPC server driven through a real HTTP client

mod common;

use common::{cleanup, memory_pool, scratch};
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::server::ServerHandle;
use serde_json::Value;
use shiftswap_api_rpc::error::code;
use shiftswap_api_rpc::rate_limiter::RateLimiter;
use shiftswap_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use shiftswap_core::application::{FeedbackService, LifecycleEngine, ShiftStore};
use shiftswap_core::port::id_provider::UuidProvider;
use shiftswap_core::port::time_provider::SystemTimeProvider;
use shiftswap_infra_local::FileKeyValueStore;
use shiftswap_infra_sqlite::{SqliteFeedbackRepository, SqliteShiftRepository};
use std::path::PathBuf;
use std::sync::Arc;

async fn start() -> (HttpClient, ServerHandle, PathBuf) {
    let local = scratch("rpc-local");
    let pool = memory_pool().await;

    let store = Arc::new(ShiftStore::new(
        Arc::new(SqliteShiftRepository::new(pool.clone())),
        Arc::new(FileKeyValueStore::new(local.clone())),
    ));
    let time = Arc::new(SystemTimeProvider);
    let engine = Arc::new(LifecycleEngine::new(store, Arc::new(UuidProvider), time.clone()));
    let feedback = Arc::new(FeedbackService::new(
        Arc::new(SqliteFeedbackRepository::new(pool)),
        time,
    ));

    let handler = RpcHandler::new(engine, feedback, RateLimiter::new(100, 100));
    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (addr, handle) = RpcServer::new(config, handler).start().await.unwrap();

    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();
    (client, handle, local)
}

fn params(pairs: &[(&str, &str)]) -> ObjectParams {
    let mut p = ObjectParams::new();
    for (k, v) in pairs {
        p.insert(k, v).unwrap();
    }
    p
}

#[tokio::test]
async fn test_swap_over_rpc() {
    let (client, handle, local) = start().await;

    let created: Value = client
        .request(
            "shifts.create.v1",
            params(&[
                ("owner_id", "A"),
                ("starts_at", "2024-01-01T08:00"),
                ("ends_at", "2024-01-01T16:00"),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(created["stored_in"], "primary");
    assert_eq!(created["shift"]["status"], "open");
    let id = created["shift"]["id"].as_str().unwrap().to_string();

    let claimed: Value = client
        .request("shifts.claim.v1", params(&[("shift_id", id.as_str()), ("actor", "B")]))
        .await
        .unwrap();
    assert_eq!(claimed["shift"]["claimer_contact"], "B");

    // A second claimer is told who won and gets the current list
    let err = client
        .request::<Value, _>("shifts.claim.v1", params(&[("shift_id", id.as_str()), ("actor", "C")]))
        .await
        .unwrap_err();
    match err {
        ClientError::Call(obj) => {
            assert_eq!(obj.code(), code::CONFLICT);
            let data: Value = serde_json::from_str(obj.data().unwrap().get()).unwrap();
            assert_eq!(data["claimer"], "B");
            assert_eq!(data["snapshot"]["shifts"][0]["id"], id.as_str());
        }
        other => panic!("unexpected client error: {other:?}"),
    }

    let reopened: Value = client
        .request("shifts.reassign.v1", params(&[("shift_id", id.as_str()), ("actor", "B")]))
        .await
        .unwrap();
    assert_eq!(reopened["shift"]["owner_id"], "B");
    assert_eq!(reopened["shift"]["status"], "open");

    // List works with params omitted; identity defaults to the first creator
    let listed: Value = client
        .request("shifts.list.v1", jsonrpsee::rpc_params![])
        .await
        .unwrap();
    assert_eq!(listed["worker"], "A");
    assert_eq!(listed["shifts"][0]["duration"], "8h 00m");

    handle.stop().unwrap();
    cleanup(&[&local]);
}

#[tokio::test]
async fn test_identity_and_feedback_over_rpc() {
    let (client, handle, local) = start().await;

    let none: Value = client
        .request("identity.get.v1", jsonrpsee::rpc_params![])
        .await
        .unwrap();
    assert!(none["worker_id"].is_null());

    let set: Value = client
        .request("identity.set.v1", params(&[("worker_id", " W42 ")]))
        .await
        .unwrap();
    assert_eq!(set["worker_id"], "W42");

    let fb: Value = client
        .request(
            "feedback.submit.v1",
            params(&[("email", "w42@example.com"), ("message", "handy")]),
        )
        .await
        .unwrap();
    assert_eq!(fb["received"], true);

    let err = client
        .request::<Value, _>(
            "feedback.submit.v1",
            params(&[("email", ""), ("message", "handy")]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Call(ref obj) if obj.code() == code::VALIDATION_ERROR));

    handle.stop().unwrap();
    cleanup(&[&local]);
}
