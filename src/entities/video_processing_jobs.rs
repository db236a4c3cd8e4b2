use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "video_processing_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub video_file_id: String,
    pub job_type: String,
    /// Target rendition, set only for transcode jobs.
    pub quality: Option<String>,
    /// Target server, set only for transcode jobs.
    pub server_id: Option<String>,
    pub status: String,
    #[sea_orm(default_value = 0)]
    pub progress: i32,
    pub error_message: Option<String>,
    #[sea_orm(default_value = 0)]
    pub reclaim_count: i32,
    pub created_at: DateTimeUtc,
    pub started_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::video_files::Entity",
        from = "Column::VideoFileId",
        to = "super::video_files::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    VideoFiles,
}

impl Related<super::video_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VideoFiles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
