use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "video_qualities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub video_file_id: String,
    pub quality: String,
    pub server_id: String,
    pub path: String,
    pub size_bytes: i64,
    pub bitrate_kbps: Option<i32>,
    pub created_at: DateTimeUtc,
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
