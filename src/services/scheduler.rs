use crate::config::IngestConfig;
use crate::entities::{internal_servers, video_processing_jobs};
use crate::error::Result;
use crate::models::{JobStatus, JobType};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Expands one finalized asset into its set of processing jobs: one
/// transcode per (quality, active server) pair plus a single thumbnail
/// job. The full cross-product is deliberate — every rendition is
/// replicated to every active server.
#[derive(Clone)]
pub struct JobScheduler {
    db: DatabaseConnection,
    config: IngestConfig,
}

impl JobScheduler {
    pub fn new(db: DatabaseConnection, config: IngestConfig) -> Self {
        Self { db, config }
    }

    pub async fn schedule(&self, video_file_id: &str) -> Result<usize> {
        let servers = internal_servers::Entity::find()
            .filter(internal_servers::Column::Active.eq(true))
            .order_by_asc(internal_servers::Column::Priority)
            .all(&self.db)
            .await?;

        if servers.is_empty() {
            warn!(
                "No active servers registered; scheduling only the thumbnail job for {}",
                video_file_id
            );
        }

        let now = chrono::Utc::now();
        let mut jobs = Vec::with_capacity(servers.len() * self.config.quality_ladder.len() + 1);

        for quality in &self.config.quality_ladder {
            for server in &servers {
                jobs.push(video_processing_jobs::ActiveModel {
                    id: Set(Uuid::new_v4().to_string()),
                    video_file_id: Set(video_file_id.to_string()),
                    job_type: Set(JobType::Transcode.as_str().to_string()),
                    quality: Set(Some(quality.clone())),
                    server_id: Set(Some(server.id.clone())),
                    status: Set(JobStatus::Pending.as_str().to_string()),
                    progress: Set(0),
                    error_message: Set(None),
                    reclaim_count: Set(0),
                    created_at: Set(now),
                    started_at: Set(None),
                    completed_at: Set(None),
                });
            }
        }

        jobs.push(video_processing_jobs::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            video_file_id: Set(video_file_id.to_string()),
            job_type: Set(JobType::Thumbnail.as_str().to_string()),
            quality: Set(None),
            server_id: Set(None),
            status: Set(JobStatus::Pending.as_str().to_string()),
            progress: Set(0),
            error_message: Set(None),
            reclaim_count: Set(0),
            created_at: Set(now),
            started_at: Set(None),
            completed_at: Set(None),
        });

        let count = jobs.len();
        video_processing_jobs::Entity::insert_many(jobs)
            .exec(&self.db)
            .await?;

        info!(
            "Scheduled {} processing jobs for video file {}",
            count, video_file_id
        );
        Ok(count)
    }
}
