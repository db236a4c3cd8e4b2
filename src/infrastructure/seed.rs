use crate::entities::{internal_servers, prelude::*};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use tracing::info;

/// Seed one local server into the registry when it is empty, so a fresh
/// development database can run the full fan-out. Production registries
/// are populated by the server-registry collaborator, never by us.
pub async fn seed_initial_servers(db: &DatabaseConnection) -> anyhow::Result<()> {
    let count = InternalServers::find().count(db).await?;
    if count > 0 {
        return Ok(());
    }

    info!("🌱 Server registry empty, seeding local default server");

    internal_servers::ActiveModel {
        id: Set("local-1".to_string()),
        name: Set("local".to_string()),
        active: Set(true),
        priority: Set(0),
        capacity_bytes: Set(None),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await?;

    Ok(())
}
