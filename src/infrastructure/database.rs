use crate::entities::{
    internal_servers, upload_chunks, upload_sessions, video_activity_log, video_files,
    video_processing_jobs, video_qualities,
};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;
    crate::infrastructure::seed::seed_initial_servers(&db).await?;

    Ok(db)
}

/// Create the schema from the entity definitions. Statements are
/// `IF NOT EXISTS`, so this is safe to run on every startup.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = vec![
        schema
            .create_table_from_entity(video_files::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(upload_sessions::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(upload_chunks::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(video_processing_jobs::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(video_qualities::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(video_activity_log::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(internal_servers::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        let stmt = builder.build(&stmt);
        let _ = db.execute(stmt).await;
    }

    // Indexes on the columns the workers and the resume path scan
    let _ = db
        .execute(sea_orm::Statement::from_string(
            builder,
            "CREATE INDEX IF NOT EXISTS idx_video_processing_jobs_status ON video_processing_jobs(status);"
                .to_string(),
        ))
        .await;
    let _ = db
        .execute(sea_orm::Statement::from_string(
            builder,
            "CREATE INDEX IF NOT EXISTS idx_upload_chunks_session ON upload_chunks(session_id);"
                .to_string(),
        ))
        .await;
    let _ = db
        .execute(sea_orm::Statement::from_string(
            builder,
            "CREATE INDEX IF NOT EXISTS idx_upload_sessions_status ON upload_sessions(status, expires_at);"
                .to_string(),
        ))
        .await;

    Ok(())
}
