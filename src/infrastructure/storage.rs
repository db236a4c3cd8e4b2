use crate::services::storage::{MemoryStorageService, S3StorageService, StorageService};
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

/// Build the object store from the environment. Without an endpoint
/// configured this falls back to the in-memory store, which is only
/// suitable for local development.
pub async fn setup_storage() -> Arc<dyn StorageService> {
    let Ok(endpoint_url) = env::var("S3_ENDPOINT") else {
        warn!("⚠️  S3_ENDPOINT not set, using in-memory storage (development only)");
        return Arc::new(MemoryStorageService::new());
    };

    let access_key = env::var("S3_ACCESS_KEY").expect("S3_ACCESS_KEY must be set");
    let secret_key = env::var("S3_SECRET_KEY").expect("S3_SECRET_KEY must be set");
    let bucket = env::var("S3_BUCKET").expect("S3_BUCKET must be set");

    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new("us-east-1"))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", bucket);
            }
        }
    }

    Arc::new(S3StorageService::new(s3_client, bucket))
}
