use crate::config::IngestConfig;
use crate::entities::{video_files, video_processing_jobs, video_qualities};
use crate::error::Result;
use crate::models::{JobStatus, JobType, ProcessingStatus};
use crate::services::activity::{ActivityEvent, ActivityLog};
use crate::services::media::{MediaTranscoder, ThumbnailExtractor};
use crate::services::storage::{self, StorageService};
use crate::services::upload_service::UploadService;
use crate::utils::clock::Clock;
use anyhow::anyhow;
use chrono::Duration;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

struct WorkerContext {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    transcoder: Arc<dyn MediaTranscoder>,
    thumbnailer: Arc<dyn ThumbnailExtractor>,
    activity: ActivityLog,
    uploads: Arc<UploadService>,
    clock: Arc<dyn Clock>,
    config: IngestConfig,
}

/// Pool of job workers plus a maintenance sweep. Each worker claims one
/// pending job at a time; the `pending -> processing` transition is the
/// mutual-exclusion point and is an atomic conditional update, so two
/// workers can never execute the same job.
pub struct JobWorkerPool {
    ctx: Arc<WorkerContext>,
    shutdown: watch::Receiver<bool>,
}

impl JobWorkerPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        transcoder: Arc<dyn MediaTranscoder>,
        thumbnailer: Arc<dyn ThumbnailExtractor>,
        activity: ActivityLog,
        uploads: Arc<UploadService>,
        clock: Arc<dyn Clock>,
        config: IngestConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ctx: Arc::new(WorkerContext {
                db,
                storage,
                transcoder,
                thumbnailer,
                activity,
                uploads,
                clock,
                config,
            }),
            shutdown,
        }
    }

    pub async fn run(self) {
        info!(
            "Job worker pool started ({} workers)",
            self.ctx.config.worker_count
        );

        let mut handles = Vec::new();
        for worker_id in 0..self.ctx.config.worker_count {
            let ctx = self.ctx.clone();
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(worker_loop(ctx, worker_id, shutdown)));
        }
        handles.push(tokio::spawn(maintenance_loop(
            self.ctx.clone(),
            self.shutdown.clone(),
        )));

        for handle in handles {
            let _ = handle.await;
        }
        info!("Job worker pool stopped");
    }

    /// Drain every currently claimable job once. The worker loops are a
    /// thin polling wrapper around this; tests call it directly.
    pub async fn run_available(&self) -> Result<usize> {
        let mut executed = 0;
        while let Some(job) = claim_next(&self.ctx).await? {
            execute_job(&self.ctx, job).await;
            executed += 1;
        }
        Ok(executed)
    }

    /// Requeue jobs stuck in `processing` past the staleness window.
    pub async fn reclaim_stale(&self) -> Result<u64> {
        reclaim_stale(&self.ctx).await
    }
}

async fn worker_loop(ctx: Arc<WorkerContext>, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
    let poll = std::time::Duration::from_secs(ctx.config.worker_poll_interval_secs);
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Worker {} shutting down", worker_id);
                break;
            }
            _ = sleep(poll) => {
                loop {
                    match claim_next(&ctx).await {
                        Ok(Some(job)) => execute_job(&ctx, job).await,
                        Ok(None) => break,
                        Err(e) => {
                            error!("Worker {} failed to claim a job: {}", worker_id, e);
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn maintenance_loop(ctx: Arc<WorkerContext>, mut shutdown: watch::Receiver<bool>) {
    let interval = std::time::Duration::from_secs(ctx.config.maintenance_interval_secs);
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Maintenance sweep shutting down");
                break;
            }
            _ = sleep(interval) => {
                match reclaim_stale(&ctx).await {
                    Ok(0) => {}
                    Ok(n) => info!("Reclaimed {} stalled jobs", n),
                    Err(e) => error!("Stale job sweep failed: {}", e),
                }
                match ctx.uploads.sweep_expired().await {
                    Ok(0) => {}
                    Ok(n) => info!("Reaped {} expired upload sessions", n),
                    Err(e) => error!("Expired session sweep failed: {}", e),
                }
            }
        }
    }
}

/// Find a claimable job and win it. Candidates are taken oldest-first;
/// losing the conditional update to another worker just moves on to the
/// next candidate.
async fn claim_next(ctx: &WorkerContext) -> Result<Option<video_processing_jobs::Model>> {
    let candidates = video_processing_jobs::Entity::find()
        .filter(video_processing_jobs::Column::Status.eq(JobStatus::Pending.as_str()))
        .order_by_asc(video_processing_jobs::Column::CreatedAt)
        .limit(8)
        .all(&ctx.db)
        .await?;

    for job in candidates {
        if try_claim(&ctx.db, &job.id, ctx.clock.now()).await? {
            return Ok(Some(job));
        }
    }
    Ok(None)
}

/// Atomic `pending -> processing` transition. Returns false when another
/// worker already owns the job.
pub async fn try_claim(
    db: &DatabaseConnection,
    job_id: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<bool> {
    let res = video_processing_jobs::Entity::update_many()
        .col_expr(
            video_processing_jobs::Column::Status,
            Expr::value(JobStatus::Processing.as_str()),
        )
        .col_expr(
            video_processing_jobs::Column::StartedAt,
            Expr::value(Some(now)),
        )
        .filter(video_processing_jobs::Column::Id.eq(job_id))
        .filter(video_processing_jobs::Column::Status.eq(JobStatus::Pending.as_str()))
        .exec(db)
        .await?;
    Ok(res.rows_affected == 1)
}

async fn execute_job(ctx: &WorkerContext, job: video_processing_jobs::Model) {
    let outcome = run_job(ctx, &job).await;
    let now = ctx.clock.now();

    let mut active = video_processing_jobs::ActiveModel {
        id: Set(job.id.clone()),
        ..Default::default()
    };
    active.completed_at = Set(Some(now));

    match outcome {
        Ok(()) => {
            active.status = Set(JobStatus::Completed.as_str().to_string());
            active.progress = Set(100);
            if let Err(e) = video_processing_jobs::Entity::update(active)
                .exec(&ctx.db)
                .await
            {
                error!("Failed to record completion of job {}: {}", job.id, e);
                return;
            }
            ctx.activity
                .record(
                    Some(&job.video_file_id),
                    ActivityEvent::JobCompleted,
                    Some(job_details(&job)),
                )
                .await;
        }
        Err(e) => {
            warn!("Job {} failed: {}", job.id, e);
            active.status = Set(JobStatus::Failed.as_str().to_string());
            active.error_message = Set(Some(e.to_string()));
            if let Err(e) = video_processing_jobs::Entity::update(active)
                .exec(&ctx.db)
                .await
            {
                error!("Failed to record failure of job {}: {}", job.id, e);
                return;
            }
            ctx.activity
                .record(
                    Some(&job.video_file_id),
                    ActivityEvent::JobFailed,
                    Some(job_details(&job)),
                )
                .await;
        }
    }

    if let Err(e) = rollup_processing_status(ctx, &job.video_file_id).await {
        error!(
            "Failed to roll up processing status for {}: {}",
            job.video_file_id, e
        );
    }
}

fn job_details(job: &video_processing_jobs::Model) -> serde_json::Value {
    json!({
        "job_id": job.id,
        "job_type": job.job_type,
        "quality": job.quality,
        "server_id": job.server_id,
    })
}

async fn run_job(ctx: &WorkerContext, job: &video_processing_jobs::Model) -> anyhow::Result<()> {
    let source = ctx
        .storage
        .get_file(&storage::source_key(&job.video_file_id))
        .await?;

    if job.job_type == JobType::Transcode.as_str() {
        let quality = job
            .quality
            .as_deref()
            .ok_or_else(|| anyhow!("transcode job {} has no target quality", job.id))?;
        let server_id = job
            .server_id
            .as_deref()
            .ok_or_else(|| anyhow!("transcode job {} has no target server", job.id))?;

        let output = ctx.transcoder.transcode(&source, quality).await?;
        let key = storage::rendition_key(&job.video_file_id, quality, server_id);
        let size_bytes = output.data.len() as i64;
        ctx.storage.upload_file(&key, output.data).await?;

        video_qualities::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            video_file_id: Set(job.video_file_id.clone()),
            quality: Set(quality.to_string()),
            server_id: Set(server_id.to_string()),
            path: Set(key),
            size_bytes: Set(size_bytes),
            bitrate_kbps: Set(output.bitrate_kbps),
            created_at: Set(ctx.clock.now()),
        }
        .insert(&ctx.db)
        .await?;
        Ok(())
    } else if job.job_type == JobType::Thumbnail.as_str() {
        let thumb = ctx.thumbnailer.extract(&source).await?;
        ctx.storage
            .upload_file(&storage::thumbnail_key(&job.video_file_id), thumb)
            .await?;
        Ok(())
    } else {
        Err(anyhow!("unknown job type: {}", job.job_type))
    }
}

/// Aggregate job outcomes into the parent file's processing status:
/// `completed` once every scheduled quality succeeded on at least one
/// server and the thumbnail job is terminal; `failed` once all jobs are
/// terminal and some quality never succeeded anywhere.
async fn rollup_processing_status(ctx: &WorkerContext, video_file_id: &str) -> Result<()> {
    let jobs = video_processing_jobs::Entity::find()
        .filter(video_processing_jobs::Column::VideoFileId.eq(video_file_id))
        .all(&ctx.db)
        .await?;

    if jobs.is_empty() {
        return Ok(());
    }

    let all_terminal = jobs.iter().all(|j| JobStatus::is_terminal(&j.status));
    let thumbnail_terminal = jobs
        .iter()
        .filter(|j| j.job_type == JobType::Thumbnail.as_str())
        .all(|j| JobStatus::is_terminal(&j.status));

    // quality -> has at least one completed transcode
    let mut quality_done: HashMap<&str, bool> = HashMap::new();
    for job in jobs
        .iter()
        .filter(|j| j.job_type == JobType::Transcode.as_str())
    {
        if let Some(q) = job.quality.as_deref() {
            let done = quality_done.entry(q).or_insert(false);
            *done |= job.status == JobStatus::Completed.as_str();
        }
    }

    let every_quality_done = quality_done.values().all(|d| *d);
    let target = if thumbnail_terminal && every_quality_done && all_terminal {
        Some(ProcessingStatus::Completed)
    } else if all_terminal && !every_quality_done {
        Some(ProcessingStatus::Failed)
    } else {
        None
    };

    if let Some(status) = target {
        video_files::Entity::update_many()
            .col_expr(
                video_files::Column::ProcessingStatus,
                Expr::value(status.as_str()),
            )
            .col_expr(
                video_files::Column::UpdatedAt,
                Expr::value(ctx.clock.now()),
            )
            .filter(video_files::Column::Id.eq(video_file_id))
            .filter(
                video_files::Column::ProcessingStatus
                    .eq(ProcessingStatus::Processing.as_str()),
            )
            .exec(&ctx.db)
            .await?;
    }
    Ok(())
}

/// Stale claim recovery: a worker crash leaves its job in `processing`
/// forever, so anything processing past the staleness window is requeued
/// (bounded per job, then failed for good).
async fn reclaim_stale(ctx: &WorkerContext) -> Result<u64> {
    let cutoff = ctx.clock.now() - Duration::minutes(ctx.config.stale_job_timeout_mins);
    let stale = video_processing_jobs::Entity::find()
        .filter(video_processing_jobs::Column::Status.eq(JobStatus::Processing.as_str()))
        .filter(video_processing_jobs::Column::StartedAt.lt(cutoff))
        .all(&ctx.db)
        .await?;

    let mut reclaimed = 0;
    for job in stale {
        if job.reclaim_count >= ctx.config.max_job_reclaims {
            let res = video_processing_jobs::Entity::update_many()
                .col_expr(
                    video_processing_jobs::Column::Status,
                    Expr::value(JobStatus::Failed.as_str()),
                )
                .col_expr(
                    video_processing_jobs::Column::ErrorMessage,
                    Expr::value(Some(
                        "stalled in processing; reclaim limit reached".to_string(),
                    )),
                )
                .col_expr(
                    video_processing_jobs::Column::CompletedAt,
                    Expr::value(Some(ctx.clock.now())),
                )
                .filter(video_processing_jobs::Column::Id.eq(&job.id))
                .filter(
                    video_processing_jobs::Column::Status.eq(JobStatus::Processing.as_str()),
                )
                .exec(&ctx.db)
                .await?;

            if res.rows_affected == 1 {
                ctx.activity
                    .record(
                        Some(&job.video_file_id),
                        ActivityEvent::JobFailed,
                        Some(job_details(&job)),
                    )
                    .await;
                rollup_processing_status(ctx, &job.video_file_id).await?;
            }
        } else {
            let res = video_processing_jobs::Entity::update_many()
                .col_expr(
                    video_processing_jobs::Column::Status,
                    Expr::value(JobStatus::Pending.as_str()),
                )
                .col_expr(
                    video_processing_jobs::Column::StartedAt,
                    Expr::value(Option::<chrono::DateTime<chrono::Utc>>::None),
                )
                .col_expr(
                    video_processing_jobs::Column::ReclaimCount,
                    Expr::value(job.reclaim_count + 1),
                )
                .filter(video_processing_jobs::Column::Id.eq(&job.id))
                .filter(
                    video_processing_jobs::Column::Status.eq(JobStatus::Processing.as_str()),
                )
                .filter(video_processing_jobs::Column::StartedAt.lt(cutoff))
                .exec(&ctx.db)
                .await?;

            if res.rows_affected == 1 {
                ctx.activity
                    .record(
                        Some(&job.video_file_id),
                        ActivityEvent::JobReclaimed,
                        Some(job_details(&job)),
                    )
                    .await;
                reclaimed += 1;
            }
        }
    }
    Ok(reclaimed)
}
