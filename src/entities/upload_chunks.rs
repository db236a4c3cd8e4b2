use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-chunk ledger entry. At most one row per (session, chunk number);
/// the composite primary key is what makes resubmission idempotent.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub chunk_number: i32,
    pub size: i64,
    pub checksum: String,
    #[sea_orm(default_expr = "Expr::value(false)")]
    pub uploaded: bool,
    pub uploaded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::upload_sessions::Entity",
        from = "Column::SessionId",
        to = "super::upload_sessions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    UploadSessions,
}

impl Related<super::upload_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadSessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
