mod common;

use anyhow::anyhow;
use async_trait::async_trait;
use common::{chunk_payload, seed_servers, setup, setup_with, test_config};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;
use video_ingest_backend::entities::{video_activity_log, video_files, video_processing_jobs};
use video_ingest_backend::services::media::{MediaInfo, MediaProbe};
use video_ingest_backend::services::storage::{StorageService, source_key};
use video_ingest_backend::services::upload_service::CreateSessionRequest;

fn mp4_request(size: u64) -> CreateSessionRequest {
    CreateSessionRequest {
        filename: "feature.mp4".to_string(),
        size,
        mime_type: "video/mp4".to_string(),
        content_id: Some("content-9".to_string()),
        episode_id: None,
    }
}

#[tokio::test]
async fn test_completion_triggers_finalize_exactly_once() {
    let env = setup().await;
    seed_servers(&env.db, 2).await;
    let (session, video_file) = env
        .uploads
        .create_session(mp4_request(2 * 1024 * 1024))
        .await
        .unwrap();

    let c0 = chunk_payload(0, 1024 * 1024);
    let c1 = chunk_payload(1, 1024 * 1024);
    env.uploads.submit_chunk(&session.id, 0, &c0).await.unwrap();
    let progress = env.uploads.submit_chunk(&session.id, 1, &c1).await.unwrap();
    assert_eq!(progress.progress_percent, 100.0);

    let file = video_files::Entity::find_by_id(&video_file.id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.upload_status, "completed");
    assert_eq!(file.processing_status, "processing");
    // Metadata came from the probe
    assert!(file.duration_secs.is_some());

    // Merged asset is the chunks in index order; payloads are gone
    let merged = env.storage.get_file(&source_key(&video_file.id)).await.unwrap();
    let mut expected = c0.clone();
    expected.extend_from_slice(&c1);
    assert_eq!(merged, expected);
    assert!(
        env.storage
            .list_objects(&format!("chunks/{}/", video_file.id))
            .await
            .unwrap()
            .is_empty()
    );

    // ladder (2) x servers (2) + 1 thumbnail
    let count_jobs = || async {
        video_processing_jobs::Entity::find()
            .filter(video_processing_jobs::Column::VideoFileId.eq(&video_file.id))
            .count(&env.db)
            .await
            .unwrap()
    };
    assert_eq!(count_jobs().await, 5);

    // A duplicate delivery of the final chunk reports progress but cannot
    // schedule a second fan-out
    let replay = env.uploads.submit_chunk(&session.id, 1, &c1).await.unwrap();
    assert_eq!(replay.uploaded_chunks, 2);
    assert_eq!(count_jobs().await, 5);

    let completions = video_activity_log::Entity::find()
        .filter(video_activity_log::Column::EventType.eq("upload_completed"))
        .count(&env.db)
        .await
        .unwrap();
    assert_eq!(completions, 1);
}

struct UnavailableProbe;

#[async_trait]
impl MediaProbe for UnavailableProbe {
    async fn probe(&self, _data: &[u8]) -> anyhow::Result<MediaInfo> {
        Err(anyhow!("probe tool unavailable"))
    }
}

#[tokio::test]
async fn test_probe_failure_does_not_block_completion() {
    let env = setup_with(test_config(), Arc::new(UnavailableProbe)).await;
    seed_servers(&env.db, 1).await;
    let (session, video_file) = env
        .uploads
        .create_session(mp4_request(1024 * 1024))
        .await
        .unwrap();

    env.uploads
        .submit_chunk(&session.id, 0, &chunk_payload(0, 1024 * 1024))
        .await
        .unwrap();

    let file = video_files::Entity::find_by_id(&video_file.id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.upload_status, "completed");
    assert_eq!(file.processing_status, "processing");
    assert!(file.duration_secs.is_none());

    let probe_failures = video_activity_log::Entity::find()
        .filter(video_activity_log::Column::EventType.eq("probe_failed"))
        .count(&env.db)
        .await
        .unwrap();
    assert_eq!(probe_failures, 1);

    // Jobs were still scheduled: ladder (2) x servers (1) + thumbnail
    let job_count = video_processing_jobs::Entity::find()
        .filter(video_processing_jobs::Column::VideoFileId.eq(&video_file.id))
        .count(&env.db)
        .await
        .unwrap();
    assert_eq!(job_count, 3);
}

#[tokio::test]
async fn test_no_active_servers_schedules_only_thumbnail() {
    let env = setup().await;
    let (session, video_file) = env
        .uploads
        .create_session(mp4_request(1024 * 1024))
        .await
        .unwrap();

    env.uploads
        .submit_chunk(&session.id, 0, &chunk_payload(0, 1024 * 1024))
        .await
        .unwrap();

    let jobs = video_processing_jobs::Entity::find()
        .filter(video_processing_jobs::Column::VideoFileId.eq(&video_file.id))
        .all(&env.db)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_type, "thumbnail");
    assert!(jobs[0].quality.is_none());
    assert!(jobs[0].server_id.is_none());
}
