use crate::api::error::AppError;
use crate::services::upload_service::{
    ChunkProgress, CreateSessionRequest, CreateSessionResponse, PendingSessionResponse,
    SessionStatus,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResumePointResponse {
    /// Lowest chunk index not yet uploaded; equals `total_chunks` when the
    /// caller should finalize rather than resume.
    pub chunk_number: i32,
}

#[utoipa::path(
    post,
    path = "/uploads",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Upload session opened", body = CreateSessionResponse),
        (status = 400, description = "File rejected by validation")
    ),
    tag = "uploads"
)]
pub async fn create_session_handler(
    State(state): State<crate::AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(axum::http::StatusCode, Json<CreateSessionResponse>), AppError> {
    let (session, video_file) = state.upload_service.create_session(req).await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            video_file_id: video_file.id,
            token: session.token,
            chunk_size: session.chunk_size as u64,
            total_chunks: session.total_chunks,
            expires_at: session.expires_at,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/uploads/{session_id}/chunks/{chunk_number}",
    request_body(content = Vec<u8>, description = "Chunk payload", content_type = "application/octet-stream"),
    params(
        ("session_id" = String, Path, description = "Upload session ID"),
        ("chunk_number" = i32, Path, description = "Chunk number (0-based)")
    ),
    responses(
        (status = 200, description = "Chunk accepted", body = ChunkProgress),
        (status = 400, description = "Chunk rejected by validation"),
        (status = 404, description = "Session not found"),
        (status = 410, description = "Session expired")
    ),
    tag = "uploads"
)]
pub async fn submit_chunk_handler(
    State(state): State<crate::AppState>,
    Path((session_id, chunk_number)): Path<(String, i32)>,
    body: axum::body::Bytes,
) -> Result<Json<ChunkProgress>, AppError> {
    let progress = state
        .upload_service
        .submit_chunk(&session_id, chunk_number, &body)
        .await?;
    Ok(Json(progress))
}

#[utoipa::path(
    get,
    path = "/uploads/{session_id}/resume",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Resume point", body = ResumePointResponse),
        (status = 404, description = "Session not found")
    ),
    tag = "uploads"
)]
pub async fn resume_point_handler(
    State(state): State<crate::AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ResumePointResponse>, AppError> {
    let chunk_number = state.upload_service.find_resume_point(&session_id).await?;
    Ok(Json(ResumePointResponse { chunk_number }))
}

#[utoipa::path(
    get,
    path = "/uploads/{session_id}",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Session status", body = SessionStatus),
        (status = 404, description = "Session not found")
    ),
    tag = "uploads"
)]
pub async fn session_status_handler(
    State(state): State<crate::AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatus>, AppError> {
    let status = state.upload_service.session_status(&session_id).await?;
    Ok(Json(status))
}

#[utoipa::path(
    delete,
    path = "/uploads/{session_id}",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    responses(
        (status = 204, description = "Session cancelled"),
        (status = 404, description = "Session not found")
    ),
    tag = "uploads"
)]
pub async fn cancel_session_handler(
    State(state): State<crate::AppState>,
    Path(session_id): Path<String>,
) -> Result<axum::http::StatusCode, AppError> {
    state.upload_service.cancel_session(&session_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/uploads",
    responses(
        (status = 200, description = "Resumable upload sessions", body = Vec<PendingSessionResponse>)
    ),
    tag = "uploads"
)]
pub async fn list_sessions_handler(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<PendingSessionResponse>>, AppError> {
    let sessions = state.upload_service.list_pending_sessions().await?;
    Ok(Json(sessions))
}
