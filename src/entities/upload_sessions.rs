use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub video_file_id: String,
    pub token: String,
    pub chunk_size: i64,
    pub total_size: i64,
    pub total_chunks: i32,
    #[sea_orm(default_value = 0)]
    pub uploaded_chunks: i32,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,
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
    #[sea_orm(has_many = "super::upload_chunks::Entity")]
    UploadChunks,
}

impl Related<super::video_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VideoFiles.def()
    }
}

impl Related<super::upload_chunks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadChunks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
