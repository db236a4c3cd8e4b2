mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{chunk_payload, seed_servers, setup};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use video_ingest_backend::{AppState, create_app};

fn test_app(env: &common::TestEnv) -> axum::Router {
    create_app(AppState {
        db: env.db.clone(),
        storage: Arc::new(env.storage.clone()),
        upload_service: env.uploads.clone(),
        config: env.config.clone(),
    })
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_upload_flow_over_http() {
    let env = setup().await;
    seed_servers(&env.db, 2).await;
    let app = test_app(&env);

    // 1. Open a session for a 2 MiB file
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/uploads")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"filename": "trailer.mp4", "size": 2097152, "mime_type": "video/mp4"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    let session_id = json["session_id"].as_str().unwrap().to_string();
    assert_eq!(json["total_chunks"], 2);
    assert_eq!(json["chunk_size"], 1024 * 1024);
    assert!(!json["token"].as_str().unwrap().is_empty());

    // 2. Submit both chunks as raw octet streams
    for n in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/uploads/{}/chunks/{}", session_id, n))
                    .header("Content-Type", "application/octet-stream")
                    .body(Body::from(chunk_payload(n, 1024 * 1024)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // 3. Status reflects the completed merge
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/uploads/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["progress_percent"], 100.0);

    // 4. Resume point equals total_chunks once everything is present
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/uploads/{}/resume", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["chunk_number"], 2);
}

#[tokio::test]
async fn test_chunk_out_of_range_is_bad_request() {
    let env = setup().await;
    let app = test_app(&env);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/uploads")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"filename": "a.mp4", "size": 1048576, "mime_type": "video/mp4"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let json = json_body(response).await;
    let session_id = json["session_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/uploads/{}/chunks/7", session_id))
                .header("Content-Type", "application/octet-stream")
                .body(Body::from(chunk_payload(7, 1024 * 1024)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let env = setup().await;
    let app = test_app(&env);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/uploads/not-a-session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_file_is_rejected() {
    let env = setup().await;
    let app = test_app(&env);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/uploads")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"filename": "notes.txt", "size": 10, "mime_type": "text/plain"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_session_over_http() {
    let env = setup().await;
    let app = test_app(&env);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/uploads")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"filename": "b.mp4", "size": 1048576, "mime_type": "video/mp4"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let json = json_body(response).await;
    let session_id = json["session_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/uploads/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Gone for good
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/uploads/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_pending_sessions() {
    let env = setup().await;
    let app = test_app(&env);

    for name in ["one.mp4", "two.mp4"] {
        let body = format!(
            r#"{{"filename": "{}", "size": 2097152, "mime_type": "video/mp4"}}"#,
            name
        );
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/uploads")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/uploads").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}
