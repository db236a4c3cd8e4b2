use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "video_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub content_id: Option<String>,
    pub episode_id: Option<String>,
    pub filename: String,
    pub size: i64,
    pub mime_type: String,
    pub upload_status: String,
    pub processing_status: String,
    pub duration_secs: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub codec: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::upload_sessions::Entity")]
    UploadSessions,
    #[sea_orm(has_many = "super::video_processing_jobs::Entity")]
    VideoProcessingJobs,
    #[sea_orm(has_many = "super::video_qualities::Entity")]
    VideoQualities,
}

impl Related<super::upload_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadSessions.def()
    }
}

impl Related<super::video_processing_jobs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VideoProcessingJobs.def()
    }
}

impl Related<super::video_qualities::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VideoQualities.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
