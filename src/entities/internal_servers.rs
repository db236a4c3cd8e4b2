use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Storage/transcode target registry. Owned by an external collaborator;
/// the pipeline only ever reads it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "internal_servers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    #[sea_orm(default_expr = "Expr::value(true)")]
    pub active: bool,
    /// Lower priority runs first when fanning out jobs.
    #[sea_orm(default_value = 0)]
    pub priority: i32,
    pub capacity_bytes: Option<i64>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
