use crate::entities::video_activity_log;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use std::fmt;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub enum ActivityEvent {
    UploadCompleted,
    UploadCancelled,
    SessionExpired,
    ProbeFailed,
    JobCompleted,
    JobFailed,
    JobReclaimed,
}

impl ActivityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadCompleted => "upload_completed",
            Self::UploadCancelled => "upload_cancelled",
            Self::SessionExpired => "session_expired",
            Self::ProbeFailed => "probe_failed",
            Self::JobCompleted => "job_completed",
            Self::JobFailed => "job_failed",
            Self::JobReclaimed => "job_reclaimed",
        }
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only lifecycle event log for audit and diagnostics.
#[derive(Clone)]
pub struct ActivityLog {
    db: DatabaseConnection,
}

impl ActivityLog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        video_file_id: Option<&str>,
        event: ActivityEvent,
        details: Option<Value>,
    ) {
        info!(
            target: "activity",
            event_type = %event,
            video_file_id = ?video_file_id,
            "Activity event"
        );

        let entry = video_activity_log::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            video_file_id: Set(video_file_id.map(|s| s.to_string())),
            event_type: Set(event.to_string()),
            details: Set(details.map(|v| v.to_string())),
            created_at: Set(chrono::Utc::now()),
        };

        if let Err(e) = entry.insert(&self.db).await {
            error!("Failed to persist activity log entry: {}", e);
        }
    }
}
