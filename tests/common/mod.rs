#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::Arc;
use video_ingest_backend::config::IngestConfig;
use video_ingest_backend::entities::internal_servers;
use video_ingest_backend::infrastructure::database::run_migrations;
use video_ingest_backend::services::activity::ActivityLog;
use video_ingest_backend::services::media::{
    MediaProbe, MediaTranscoder, SimMediaProbe, SimThumbnailExtractor, SimTranscoder,
};
use video_ingest_backend::services::scheduler::JobScheduler;
use video_ingest_backend::services::storage::MemoryStorageService;
use video_ingest_backend::services::upload_service::UploadService;
use video_ingest_backend::services::worker::JobWorkerPool;
use video_ingest_backend::utils::clock::ManualClock;

pub struct TestEnv {
    pub db: DatabaseConnection,
    pub storage: MemoryStorageService,
    pub clock: ManualClock,
    pub config: IngestConfig,
    pub uploads: Arc<UploadService>,
}

/// Small chunks and a two-step ladder keep fixtures readable.
pub fn test_config() -> IngestConfig {
    IngestConfig {
        max_file_size: 100 * 1024 * 1024,
        chunk_size: 1024 * 1024,
        quality_ladder: vec!["360p".to_string(), "720p".to_string()],
        transcoder_kind: "sim".to_string(),
        chunk_write_backoff_ms: 1,
        ..IngestConfig::default()
    }
}

pub async fn setup() -> TestEnv {
    setup_with(test_config(), Arc::new(SimMediaProbe)).await
}

pub async fn setup_with(config: IngestConfig, probe: Arc<dyn MediaProbe>) -> TestEnv {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    run_migrations(&db).await.unwrap();

    let storage = MemoryStorageService::new();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

    let uploads = Arc::new(UploadService::new(
        db.clone(),
        Arc::new(storage.clone()),
        probe,
        JobScheduler::new(db.clone(), config.clone()),
        ActivityLog::new(db.clone()),
        Arc::new(clock.clone()),
        config.clone(),
    ));

    TestEnv {
        db,
        storage,
        clock,
        config,
        uploads,
    }
}

pub fn worker_pool(env: &TestEnv, transcoder: Arc<dyn MediaTranscoder>) -> JobWorkerPool {
    let (_tx, rx) = tokio::sync::watch::channel(false);
    JobWorkerPool::new(
        env.db.clone(),
        Arc::new(env.storage.clone()),
        transcoder,
        Arc::new(SimThumbnailExtractor),
        ActivityLog::new(env.db.clone()),
        env.uploads.clone(),
        Arc::new(env.clock.clone()),
        env.config.clone(),
        rx,
    )
}

pub fn sim_pool(env: &TestEnv) -> JobWorkerPool {
    worker_pool(env, Arc::new(SimTranscoder))
}

pub async fn seed_servers(db: &DatabaseConnection, count: usize) {
    for i in 0..count {
        internal_servers::ActiveModel {
            id: Set(format!("server-{}", i)),
            name: Set(format!("edge-{}", i)),
            active: Set(true),
            priority: Set(i as i32),
            capacity_bytes: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .unwrap();
    }
}

/// A deterministic payload of `len` bytes seeded by the chunk number.
pub fn chunk_payload(chunk_number: i32, len: usize) -> Vec<u8> {
    let seed = chunk_number as u8;
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}
