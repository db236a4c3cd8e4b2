mod common;

use common::{chunk_payload, setup};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use video_ingest_backend::entities::{upload_chunks, video_files};
use video_ingest_backend::error::IngestError;
use video_ingest_backend::services::upload_service::CreateSessionRequest;
use video_ingest_backend::utils::clock::Clock;

fn mp4_request(size: u64) -> CreateSessionRequest {
    CreateSessionRequest {
        filename: "movie.mp4".to_string(),
        size,
        mime_type: "video/mp4".to_string(),
        content_id: None,
        episode_id: None,
    }
}

#[tokio::test]
async fn test_create_session_rejects_oversize_file() {
    let env = setup().await;
    let err = env
        .uploads
        .create_session(mp4_request(env.config.max_file_size + 1))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidFile(_)));
}

#[tokio::test]
async fn test_create_session_rejects_unknown_container() {
    let env = setup().await;
    let err = env
        .uploads
        .create_session(CreateSessionRequest {
            mime_type: "application/pdf".to_string(),
            ..mp4_request(1024)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidFile(_)));
}

#[tokio::test]
async fn test_create_session_rejects_both_owner_references() {
    let env = setup().await;
    let err = env
        .uploads
        .create_session(CreateSessionRequest {
            content_id: Some("c1".to_string()),
            episode_id: Some("e1".to_string()),
            ..mp4_request(1024)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidFile(_)));
}

#[tokio::test]
async fn test_boundary_chunk_sizing() {
    let env = setup().await;
    let size = 10_500_000u64;
    let (session, _) = env.uploads.create_session(mp4_request(size)).await.unwrap();

    // ceil(10,500,000 / 1,048,576) chunks, with a short trailing chunk
    assert_eq!(session.total_chunks, 11);
    let final_len = size - 10 * 1_048_576;
    assert_eq!(final_len, 14_240);

    // A full-size final chunk must be rejected...
    let err = env
        .uploads
        .submit_chunk(&session.id, 10, &chunk_payload(10, 1_048_576))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::ChunkSizeMismatch { .. }));

    // ...and the short remainder accepted.
    env.uploads
        .submit_chunk(&session.id, 10, &chunk_payload(10, final_len as usize))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_chunk_number_out_of_range() {
    let env = setup().await;
    let (session, _) = env
        .uploads
        .create_session(mp4_request(3 * 1024 * 1024))
        .await
        .unwrap();

    let err = env
        .uploads
        .submit_chunk(&session.id, 3, &chunk_payload(3, 1024 * 1024))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IngestError::ChunkOutOfRange { number: 3, total: 3 }
    ));

    let err = env
        .uploads
        .submit_chunk(&session.id, -1, &chunk_payload(0, 1024 * 1024))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::ChunkOutOfRange { .. }));
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let env = setup().await;
    let err = env
        .uploads
        .submit_chunk("nope", 0, &chunk_payload(0, 1024 * 1024))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_idempotent_chunk_submission() {
    let env = setup().await;
    let (session, _) = env
        .uploads
        .create_session(mp4_request(3 * 1024 * 1024))
        .await
        .unwrap();

    let payload = chunk_payload(0, 1024 * 1024);
    let first = env
        .uploads
        .submit_chunk(&session.id, 0, &payload)
        .await
        .unwrap();
    let second = env
        .uploads
        .submit_chunk(&session.id, 0, &payload)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.uploaded_chunks, 1);

    let ledger_rows = upload_chunks::Entity::find()
        .filter(upload_chunks::Column::SessionId.eq(&session.id))
        .count(&env.db)
        .await
        .unwrap();
    assert_eq!(ledger_rows, 1);
}

#[tokio::test]
async fn test_session_renewed_when_near_expiry() {
    let env = setup().await;
    let (session, _) = env
        .uploads
        .create_session(mp4_request(3 * 1024 * 1024))
        .await
        .unwrap();

    // 30 minutes to expiry: the submission must push it out a full window
    env.clock
        .set(session.expires_at - chrono::Duration::minutes(30));
    env.uploads
        .submit_chunk(&session.id, 0, &chunk_payload(0, 1024 * 1024))
        .await
        .unwrap();

    let renewed = video_ingest_backend::entities::upload_sessions::Entity::find_by_id(&session.id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert!(renewed.expires_at - env.clock.now() >= chrono::Duration::hours(23));
}

#[tokio::test]
async fn test_session_not_renewed_far_from_expiry() {
    let env = setup().await;
    let (session, _) = env
        .uploads
        .create_session(mp4_request(3 * 1024 * 1024))
        .await
        .unwrap();

    env.clock
        .set(session.expires_at - chrono::Duration::hours(2));
    env.uploads
        .submit_chunk(&session.id, 0, &chunk_payload(0, 1024 * 1024))
        .await
        .unwrap();

    let unchanged = video_ingest_backend::entities::upload_sessions::Entity::find_by_id(&session.id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.expires_at, session.expires_at);
}

#[tokio::test]
async fn test_expired_session_rejects_chunks() {
    let env = setup().await;
    let (session, video_file) = env
        .uploads
        .create_session(mp4_request(3 * 1024 * 1024))
        .await
        .unwrap();

    env.clock
        .set(session.expires_at + chrono::Duration::minutes(1));
    let err = env
        .uploads
        .submit_chunk(&session.id, 0, &chunk_payload(0, 1024 * 1024))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::SessionExpired(_)));

    // The file itself is still `uploading`, so the caller may start a
    // fresh resume flow.
    let file = video_files::Entity::find_by_id(&video_file.id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.upload_status, "uploading");
}

#[tokio::test]
async fn test_cancel_session_cleans_up() {
    let env = setup().await;
    let (session, video_file) = env
        .uploads
        .create_session(mp4_request(3 * 1024 * 1024))
        .await
        .unwrap();

    env.uploads
        .submit_chunk(&session.id, 0, &chunk_payload(0, 1024 * 1024))
        .await
        .unwrap();
    env.uploads
        .submit_chunk(&session.id, 2, &chunk_payload(2, 1024 * 1024))
        .await
        .unwrap();

    env.uploads.cancel_session(&session.id).await.unwrap();

    let ledger_rows = upload_chunks::Entity::find()
        .filter(upload_chunks::Column::SessionId.eq(&session.id))
        .count(&env.db)
        .await
        .unwrap();
    assert_eq!(ledger_rows, 0);

    let file = video_files::Entity::find_by_id(&video_file.id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.upload_status, "failed");

    // Chunk payloads are gone and the session no longer resolves
    assert_eq!(env.storage.object_count(), 0);
    assert!(matches!(
        env.uploads.session_status(&session.id).await.unwrap_err(),
        IngestError::SessionNotFound(_)
    ));
}

#[tokio::test]
async fn test_cancel_session_with_no_chunks() {
    let env = setup().await;
    let (session, _) = env
        .uploads
        .create_session(mp4_request(3 * 1024 * 1024))
        .await
        .unwrap();
    env.uploads.cancel_session(&session.id).await.unwrap();
}
