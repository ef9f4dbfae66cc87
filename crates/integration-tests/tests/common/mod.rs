//! Shared wiring for integration tests

#![allow(dead_code)]

use shiftswap_core::application::{LifecycleEngine, ShiftStore};
use shiftswap_core::domain::{parse_local_timestamp, ShiftDraft};
use shiftswap_core::port::id_provider::UuidProvider;
use shiftswap_core::port::time_provider::SystemTimeProvider;
use shiftswap_infra_local::FileKeyValueStore;
use shiftswap_infra_sqlite::{create_pool, run_migrations, SqliteShiftRepository};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

/// Unique scratch path under the system temp dir
pub fn scratch(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("shiftswap-{}-{}", prefix, uuid::Uuid::new_v4()))
}

pub fn file_url(path: &PathBuf) -> String {
    format!("sqlite://{}", path.display())
}

pub async fn memory_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub async fn file_pool(path: &PathBuf) -> SqlitePool {
    let pool = create_pool(&file_url(path)).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// One device: the shared primary plus its own local directory
pub fn device(pool: SqlitePool, local_dir: PathBuf) -> Arc<LifecycleEngine> {
    let store = Arc::new(ShiftStore::new(
        Arc::new(SqliteShiftRepository::new(pool)),
        Arc::new(FileKeyValueStore::new(local_dir)),
    ));
    Arc::new(LifecycleEngine::new(
        store,
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    ))
}

pub fn draft(owner: &str, start: &str, end: &str) -> ShiftDraft {
    ShiftDraft::new(
        parse_local_timestamp(start).unwrap(),
        parse_local_timestamp(end).unwrap(),
        None,
        owner,
    )
}

pub fn cleanup(paths: &[&PathBuf]) {
    for path in paths {
        let _ = std::fs::remove_dir_all(path);
        let _ = std::fs::remove_file(path);
        for suffix in ["-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
