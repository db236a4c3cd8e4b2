use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Chunk payload path, deterministic in (video file id, chunk number).
/// Zero-padded so lexicographic listing matches index order.
pub fn chunk_key(video_file_id: &str, chunk_number: i32) -> String {
    format!("chunks/{}/{:06}", video_file_id, chunk_number)
}

pub fn chunk_prefix(video_file_id: &str) -> String {
    format!("chunks/{}/", video_file_id)
}

/// Merged source asset path.
pub fn source_key(video_file_id: &str) -> String {
    format!("assets/{}/source", video_file_id)
}

/// Per-rendition output path, keyed by (video file id, quality, server id).
pub fn rendition_key(video_file_id: &str, quality: &str, server_id: &str) -> String {
    format!("assets/{}/{}/{}.mp4", video_file_id, quality, server_id)
}

pub fn thumbnail_key(video_file_id: &str) -> String {
    format!("assets/{}/thumbnail.webp", video_file_id)
}

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> Result<()>;
    async fn get_file(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete_file(&self, key: &str) -> Result<()>;
    async fn file_exists(&self, key: &str) -> Result<bool>;
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Concatenate `source_keys` in the given order into one object at
    /// `dest_key`; returns the merged size in bytes.
    async fn compose_objects(&self, source_keys: &[String], dest_key: &str) -> Result<i64>;

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        for key in self.list_objects(prefix).await? {
            self.delete_file(&key).await?;
        }
        Ok(())
    }
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        let data = res.body.collect().await?.to_vec();
        Ok(data)
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token)
                .send()
                .await?;

            if let Some(contents) = res.contents {
                for object in contents {
                    if let Some(key) = object.key {
                        objects.push(key);
                    }
                }
            }

            if res.is_truncated.unwrap_or(false) {
                continuation_token = res.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn compose_objects(&self, source_keys: &[String], dest_key: &str) -> Result<i64> {
        // Server-side multipart copy; chunk payloads never round-trip
        // through this process. Requires all but the last part to meet
        // the S3 minimum part size, which the configured chunk size does.
        let multipart = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(dest_key)
            .send()
            .await?;

        let upload_id = multipart
            .upload_id()
            .ok_or_else(|| anyhow::anyhow!("No upload ID"))?;

        let mut completed_parts = Vec::new();
        for (i, source) in source_keys.iter().enumerate() {
            let part_number = i as i32 + 1;
            let res = self
                .client
                .upload_part_copy()
                .bucket(&self.bucket)
                .key(dest_key)
                .upload_id(upload_id)
                .part_number(part_number)
                .copy_source(format!("{}/{}", self.bucket, source))
                .send()
                .await?;

            let etag = res
                .copy_part_result()
                .and_then(|r| r.e_tag())
                .unwrap_or_default()
                .to_string();

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(etag)
                    .part_number(part_number)
                    .build(),
            );
        }

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(dest_key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await?;

        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(dest_key)
            .send()
            .await?;

        Ok(head.content_length.unwrap_or(0))
    }
}

/// In-memory storage used by tests and by local development when no
/// object store is configured.
#[derive(Default, Clone)]
pub struct MemoryStorageService {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }
}

#[async_trait]
impl StorageService for MemoryStorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.objects.write().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("object not found: {}", key))
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        self.objects.write().unwrap().remove(key);
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.read().unwrap().contains_key(key))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .unwrap()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn compose_objects(&self, source_keys: &[String], dest_key: &str) -> Result<i64> {
        let mut merged = Vec::new();
        {
            let objects = self.objects.read().unwrap();
            for key in source_keys {
                let data = objects
                    .get(key)
                    .ok_or_else(|| anyhow::anyhow!("object not found: {}", key))?;
                merged.extend_from_slice(data);
            }
        }
        let size = merged.len() as i64;
        self.objects
            .write()
            .unwrap()
            .insert(dest_key.to_string(), merged);
        Ok(size)
    }
}
