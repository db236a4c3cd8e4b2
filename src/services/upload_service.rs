use crate::config::IngestConfig;
use crate::entities::{upload_chunks, upload_sessions, video_files};
use crate::error::{IngestError, Result};
use crate::models::{ProcessingStatus, SessionState, UploadStatus};
use crate::services::activity::{ActivityEvent, ActivityLog};
use crate::services::media::MediaProbe;
use crate::services::scheduler::JobScheduler;
use crate::services::storage::{self, StorageService};
use crate::utils::clock::Clock;
use crate::utils::hash::chunk_checksum;
use crate::utils::retry::retry_with_backoff;
use chrono::Duration;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub content_id: Option<String>,
    pub episode_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub video_file_id: String,
    pub token: String,
    pub chunk_size: u64,
    pub total_chunks: i32,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, ToSchema)]
pub struct ChunkProgress {
    pub uploaded_chunks: i32,
    pub total_chunks: i32,
    pub progress_percent: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionStatus {
    pub status: String,
    pub uploaded_chunks: i32,
    pub total_chunks: i32,
    pub progress_percent: f64,
}

#[derive(Serialize, ToSchema)]
pub struct PendingSessionResponse {
    pub session_id: String,
    pub video_file_id: String,
    pub filename: String,
    pub total_size: i64,
    pub chunk_size: i64,
    pub total_chunks: i32,
    pub uploaded_chunks: i32,
    pub uploaded_numbers: Vec<i32>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Orchestrates the upload lifecycle: session creation, idempotent chunk
/// acceptance, resume, cancellation and the one-time merge into a source
/// asset. Constructed with its collaborators so tests can inject fakes
/// and drive the clock.
pub struct UploadService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    probe: Arc<dyn MediaProbe>,
    scheduler: JobScheduler,
    activity: ActivityLog,
    clock: Arc<dyn Clock>,
    config: IngestConfig,
}

impl UploadService {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        probe: Arc<dyn MediaProbe>,
        scheduler: JobScheduler,
        activity: ActivityLog,
        clock: Arc<dyn Clock>,
        config: IngestConfig,
    ) -> Self {
        Self {
            db,
            storage,
            probe,
            scheduler,
            activity,
            clock,
            config,
        }
    }

    pub async fn create_session(
        &self,
        req: CreateSessionRequest,
    ) -> Result<(upload_sessions::Model, video_files::Model)> {
        if req.size == 0 {
            return Err(IngestError::InvalidFile(
                "declared size must be positive".to_string(),
            ));
        }
        if req.size > self.config.max_file_size {
            return Err(IngestError::InvalidFile(format!(
                "file too large: {} bytes (max {})",
                req.size, self.config.max_file_size
            )));
        }
        if !self
            .config
            .allowed_mime_types
            .iter()
            .any(|m| m == &req.mime_type)
        {
            return Err(IngestError::InvalidFile(format!(
                "unsupported container format: {}",
                req.mime_type
            )));
        }
        if req.content_id.is_some() && req.episode_id.is_some() {
            return Err(IngestError::InvalidFile(
                "content_id and episode_id are mutually exclusive".to_string(),
            ));
        }

        let now = self.clock.now();

        // The file record lands first. If the session insert below fails,
        // the file is left in `uploading` with no session, which callers
        // treat as resumable from chunk 0.
        let video_file = video_files::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            content_id: Set(req.content_id),
            episode_id: Set(req.episode_id),
            filename: Set(req.filename),
            size: Set(req.size as i64),
            mime_type: Set(req.mime_type),
            upload_status: Set(UploadStatus::Uploading.as_str().to_string()),
            processing_status: Set(ProcessingStatus::Pending.as_str().to_string()),
            duration_secs: Set(None),
            width: Set(None),
            height: Set(None),
            codec: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        let session = upload_sessions::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            video_file_id: Set(video_file.id.clone()),
            token: Set(crate::utils::token::generate_session_token()),
            chunk_size: Set(self.config.chunk_size as i64),
            total_size: Set(req.size as i64),
            total_chunks: Set(self.config.total_chunks(req.size)),
            uploaded_chunks: Set(0),
            status: Set(SessionState::Uploading.as_str().to_string()),
            created_at: Set(now),
            expires_at: Set(now + Duration::hours(self.config.session_ttl_hours)),
        }
        .insert(&self.db)
        .await?;

        info!(
            "Opened upload session {} for '{}' ({} bytes, {} chunks)",
            session.id, video_file.filename, video_file.size, session.total_chunks
        );
        Ok((session, video_file))
    }

    /// Accept one chunk. Idempotent: a chunk already recorded as uploaded
    /// is not re-written and does not double count; the call still reports
    /// current progress. Submitting the last missing chunk triggers the
    /// merge synchronously before returning.
    pub async fn submit_chunk(
        &self,
        session_id: &str,
        chunk_number: i32,
        bytes: &[u8],
    ) -> Result<ChunkProgress> {
        let session = self.find_session(session_id).await?;
        let now = self.clock.now();

        // Replays against a finalizing/completed session report progress
        // without touching anything; the ledger is immutable from here on.
        if session.status != SessionState::Uploading.as_str() {
            return Ok(progress_of(session.uploaded_chunks, session.total_chunks));
        }

        if session.expires_at <= now {
            return Err(IngestError::SessionExpired(session_id.to_string()));
        }
        self.renew_if_near_expiry(&session, now).await;

        if chunk_number < 0 || chunk_number >= session.total_chunks {
            return Err(IngestError::ChunkOutOfRange {
                number: chunk_number,
                total: session.total_chunks,
            });
        }

        let expected = expected_chunk_len(&session, chunk_number);
        if bytes.len() as u64 != expected {
            return Err(IngestError::ChunkSizeMismatch {
                number: chunk_number,
                expected,
                actual: bytes.len() as u64,
            });
        }

        // Idempotency gate: look at the ledger before the byte write so a
        // duplicate delivery never re-writes payload.
        let already_uploaded = upload_chunks::Entity::find_by_id((
            session_id.to_string(),
            chunk_number,
        ))
        .one(&self.db)
        .await?
        .is_some_and(|c| c.uploaded);

        if !already_uploaded {
            let checksum = chunk_checksum(bytes);
            let key = storage::chunk_key(&session.video_file_id, chunk_number);
            let storage_ref = &self.storage;
            let payload = bytes.to_vec();

            retry_with_backoff(
                self.config.chunk_write_attempts,
                StdDuration::from_millis(self.config.chunk_write_backoff_ms),
                "chunk store write",
                || {
                    let key = key.clone();
                    let payload = payload.clone();
                    async move { storage_ref.upload_file(&key, payload).await }
                },
            )
            .await
            .map_err(IngestError::Storage)?;

            self.record_chunk(session_id, chunk_number, bytes.len() as i64, checksum, now)
                .await?;
        }

        let session = self.find_session(session_id).await?;
        if session.uploaded_chunks >= session.total_chunks {
            self.try_finalize(&session).await?;
        }
        Ok(progress_of(session.uploaded_chunks, session.total_chunks))
    }

    /// Ledger write plus progress counter, under a row lock on the session
    /// so concurrent duplicate deliveries of the same chunk cannot double
    /// count. Re-checks the ledger inside the transaction; the loser of a
    /// race becomes a no-op.
    async fn record_chunk(
        &self,
        session_id: &str,
        chunk_number: i32,
        size: i64,
        checksum: String,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.db
            .transaction::<_, (), IngestError>(|txn| {
                Box::pin(async move {
                    let session = upload_sessions::Entity::find_by_id(&session_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .ok_or_else(|| IngestError::SessionNotFound(session_id.clone()))?;

                    if session.status != SessionState::Uploading.as_str() {
                        return Ok(());
                    }

                    let existing = upload_chunks::Entity::find_by_id((
                        session_id.clone(),
                        chunk_number,
                    ))
                    .one(txn)
                    .await?;

                    if existing.as_ref().is_some_and(|c| c.uploaded) {
                        return Ok(());
                    }

                    match existing {
                        Some(prev) => {
                            let mut entry: upload_chunks::ActiveModel = prev.into();
                            entry.size = Set(size);
                            entry.checksum = Set(checksum);
                            entry.uploaded = Set(true);
                            entry.uploaded_at = Set(now);
                            entry.update(txn).await?;
                        }
                        None => {
                            upload_chunks::ActiveModel {
                                session_id: Set(session_id.clone()),
                                chunk_number: Set(chunk_number),
                                size: Set(size),
                                checksum: Set(checksum),
                                uploaded: Set(true),
                                uploaded_at: Set(now),
                            }
                            .insert(txn)
                            .await?;
                        }
                    }

                    let uploaded = session.uploaded_chunks + 1;
                    let mut active: upload_sessions::ActiveModel = session.into();
                    active.uploaded_chunks = Set(uploaded);
                    active.update(txn).await?;
                    Ok(())
                })
            })
            .await
            .map_err(IngestError::from)
    }

    /// Session renewal rule: within the threshold of expiry, extend by a
    /// full TTL so long uploads are not killed by a fixed window. Failure
    /// is non-fatal to the chunk submission.
    async fn renew_if_near_expiry(
        &self,
        session: &upload_sessions::Model,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        if session.expires_at - now >= Duration::minutes(self.config.renewal_threshold_mins) {
            return;
        }

        let res = upload_sessions::Entity::update_many()
            .col_expr(
                upload_sessions::Column::ExpiresAt,
                Expr::value(now + Duration::hours(self.config.session_ttl_hours)),
            )
            .filter(upload_sessions::Column::Id.eq(&session.id))
            .filter(upload_sessions::Column::Status.eq(SessionState::Uploading.as_str()))
            .exec(&self.db)
            .await;

        if let Err(e) = res {
            warn!(
                "Failed to renew session {}, continuing with existing expiry: {}",
                session.id, e
            );
        }
    }

    /// Smallest chunk index not yet recorded as uploaded, or `total_chunks`
    /// when every chunk is present. Tolerates gaps from out-of-order and
    /// parallel submissions.
    pub async fn find_resume_point(&self, session_id: &str) -> Result<i32> {
        let session = self.find_session(session_id).await?;

        let present: HashSet<i32> = upload_chunks::Entity::find()
            .filter(upload_chunks::Column::SessionId.eq(session_id))
            .filter(upload_chunks::Column::Uploaded.eq(true))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|c| c.chunk_number)
            .collect();

        for n in 0..session.total_chunks {
            if !present.contains(&n) {
                return Ok(n);
            }
        }
        Ok(session.total_chunks)
    }

    pub async fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let session = self.find_session(session_id).await?;
        let progress = progress_of(session.uploaded_chunks, session.total_chunks);
        Ok(SessionStatus {
            status: session.status,
            uploaded_chunks: progress.uploaded_chunks,
            total_chunks: progress.total_chunks,
            progress_percent: progress.progress_percent,
        })
    }

    /// Tear down a session: ledger entries and chunk payloads go, and the
    /// file is marked failed. Safe to call at any point, including before
    /// the first chunk.
    pub async fn cancel_session(&self, session_id: &str) -> Result<()> {
        let session = self.find_session(session_id).await?;
        self.discard_session(&session, ActivityEvent::UploadCancelled)
            .await
    }

    /// Cancel every expired session still in `uploading`. Invoked from the
    /// maintenance sweep; returns the number of sessions reaped.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let now = self.clock.now();
        let expired = upload_sessions::Entity::find()
            .filter(upload_sessions::Column::Status.eq(SessionState::Uploading.as_str()))
            .filter(upload_sessions::Column::ExpiresAt.lt(now))
            .all(&self.db)
            .await?;

        let mut reaped = 0;
        for session in expired {
            info!("Reaping expired upload session {}", session.id);
            self.discard_session(&session, ActivityEvent::SessionExpired)
                .await?;
            reaped += 1;
        }
        Ok(reaped)
    }

    async fn discard_session(
        &self,
        session: &upload_sessions::Model,
        event: ActivityEvent,
    ) -> Result<()> {
        upload_chunks::Entity::delete_many()
            .filter(upload_chunks::Column::SessionId.eq(&session.id))
            .exec(&self.db)
            .await?;

        if let Err(e) = self
            .storage
            .delete_prefix(&storage::chunk_prefix(&session.video_file_id))
            .await
        {
            warn!(
                "Chunk payload cleanup failed for session {}: {}",
                session.id, e
            );
        }

        video_files::Entity::update_many()
            .col_expr(
                video_files::Column::UploadStatus,
                Expr::value(UploadStatus::Failed.as_str()),
            )
            .filter(video_files::Column::Id.eq(&session.video_file_id))
            .exec(&self.db)
            .await?;

        session.clone().delete(&self.db).await?;

        self.activity
            .record(Some(&session.video_file_id), event, None)
            .await;
        Ok(())
    }

    pub async fn list_pending_sessions(&self) -> Result<Vec<PendingSessionResponse>> {
        let sessions = upload_sessions::Entity::find()
            .filter(upload_sessions::Column::Status.eq(SessionState::Uploading.as_str()))
            .all(&self.db)
            .await?;

        let mut result = Vec::new();
        for s in sessions {
            let video_file = video_files::Entity::find_by_id(&s.video_file_id)
                .one(&self.db)
                .await?;

            let mut uploaded_numbers: Vec<i32> = upload_chunks::Entity::find()
                .filter(upload_chunks::Column::SessionId.eq(&s.id))
                .filter(upload_chunks::Column::Uploaded.eq(true))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|c| c.chunk_number)
                .collect();
            uploaded_numbers.sort_unstable();

            result.push(PendingSessionResponse {
                session_id: s.id,
                video_file_id: s.video_file_id,
                filename: video_file.map(|f| f.filename).unwrap_or_default(),
                total_size: s.total_size,
                chunk_size: s.chunk_size,
                total_chunks: s.total_chunks,
                uploaded_chunks: s.uploaded_chunks,
                uploaded_numbers,
                expires_at: s.expires_at,
            });
        }
        Ok(result)
    }

    /// Claim the one-time right to merge. The `uploading -> finalizing`
    /// transition is a conditional update so concurrent duplicate
    /// final-chunk submissions cannot both merge, even across processes.
    async fn try_finalize(&self, session: &upload_sessions::Model) -> Result<()> {
        let claimed = upload_sessions::Entity::update_many()
            .col_expr(
                upload_sessions::Column::Status,
                Expr::value(SessionState::Finalizing.as_str()),
            )
            .filter(upload_sessions::Column::Id.eq(&session.id))
            .filter(upload_sessions::Column::Status.eq(SessionState::Uploading.as_str()))
            .exec(&self.db)
            .await?
            .rows_affected
            == 1;

        if !claimed {
            return Ok(());
        }
        self.finalize(session).await
    }

    /// Merge all chunk payloads in index order into the source asset,
    /// probe it, flip the file to `completed`/`processing`, and fan out
    /// the processing jobs.
    async fn finalize(&self, session: &upload_sessions::Model) -> Result<()> {
        let file_id = &session.video_file_id;
        let chunk_keys: Vec<String> = (0..session.total_chunks)
            .map(|n| storage::chunk_key(file_id, n))
            .collect();
        let dest = storage::source_key(file_id);

        let merged_size = match self.storage.compose_objects(&chunk_keys, &dest).await {
            Ok(size) => size,
            Err(e) => {
                // Hand the claim back so a retried final-chunk submission
                // can attempt the merge again.
                let _ = upload_sessions::Entity::update_many()
                    .col_expr(
                        upload_sessions::Column::Status,
                        Expr::value(SessionState::Uploading.as_str()),
                    )
                    .filter(upload_sessions::Column::Id.eq(&session.id))
                    .filter(upload_sessions::Column::Status.eq(SessionState::Finalizing.as_str()))
                    .exec(&self.db)
                    .await;
                return Err(IngestError::Storage(e));
            }
        };

        let media_info = match self.storage.get_file(&dest).await {
            Ok(data) => match self.probe.probe(&data).await {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!("Media probe failed for {}: {}", file_id, e);
                    self.activity
                        .record(
                            Some(file_id),
                            ActivityEvent::ProbeFailed,
                            Some(json!({ "error": e.to_string() })),
                        )
                        .await;
                    None
                }
            },
            Err(e) => {
                warn!("Could not read merged asset {} for probing: {}", file_id, e);
                self.activity
                    .record(
                        Some(file_id),
                        ActivityEvent::ProbeFailed,
                        Some(json!({ "error": e.to_string() })),
                    )
                    .await;
                None
            }
        };

        let video_file = video_files::Entity::find_by_id(file_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| IngestError::SessionNotFound(session.id.clone()))?;

        let mut active: video_files::ActiveModel = video_file.into();
        if let Some(info) = media_info {
            active.duration_secs = Set(Some(info.duration_secs));
            active.width = Set(Some(info.width as i32));
            active.height = Set(Some(info.height as i32));
            active.codec = Set(Some(info.codec));
        }
        active.upload_status = Set(UploadStatus::Completed.as_str().to_string());
        active.processing_status = Set(ProcessingStatus::Processing.as_str().to_string());
        active.updated_at = Set(self.clock.now());
        active.update(&self.db).await?;

        upload_sessions::Entity::update_many()
            .col_expr(
                upload_sessions::Column::Status,
                Expr::value(SessionState::Completed.as_str()),
            )
            .filter(upload_sessions::Column::Id.eq(&session.id))
            .exec(&self.db)
            .await?;

        self.activity
            .record(
                Some(file_id),
                ActivityEvent::UploadCompleted,
                Some(json!({
                    "size": merged_size,
                    "chunks": session.total_chunks,
                })),
            )
            .await;

        self.scheduler.schedule(file_id).await?;

        // Chunk payloads only live until the merge
        if let Err(e) = self
            .storage
            .delete_prefix(&storage::chunk_prefix(file_id))
            .await
        {
            warn!("Post-merge chunk cleanup failed for {}: {}", file_id, e);
        }

        info!(
            "Finalized upload session {} ({} bytes merged)",
            session.id, merged_size
        );
        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> Result<upload_sessions::Model> {
        upload_sessions::Entity::find_by_id(session_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| IngestError::SessionNotFound(session_id.to_string()))
    }
}

fn progress_of(uploaded: i32, total: i32) -> ChunkProgress {
    let percent = if total == 0 {
        100.0
    } else {
        uploaded as f64 / total as f64 * 100.0
    };
    ChunkProgress {
        uploaded_chunks: uploaded,
        total_chunks: total,
        progress_percent: percent,
    }
}

/// Only the final chunk may be shorter than the session chunk size.
fn expected_chunk_len(session: &upload_sessions::Model, chunk_number: i32) -> u64 {
    if chunk_number == session.total_chunks - 1 {
        session.total_size as u64 - (session.total_chunks as u64 - 1) * session.chunk_size as u64
    } else {
        session.chunk_size as u64
    }
}
