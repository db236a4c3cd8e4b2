use std::env;

/// Ingest pipeline configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Maximum file size in bytes (default: 10 GiB)
    pub max_file_size: u64,

    /// Fixed chunk size per session in bytes (default: 8 MiB)
    pub chunk_size: u64,

    /// MIME allow-list of accepted container formats
    pub allowed_mime_types: Vec<String>,

    /// Session expiry window in hours (default: 24)
    pub session_ttl_hours: i64,

    /// Renew the session when time-to-expiry drops below this (default: 60 min)
    pub renewal_threshold_mins: i64,

    /// Target rendition ladder, every entry transcoded to every active server
    pub quality_ladder: Vec<String>,

    /// Number of concurrent job workers (default: 4)
    pub worker_count: usize,

    /// Worker idle poll interval in seconds (default: 2)
    pub worker_poll_interval_secs: u64,

    /// Attempts for a transient chunk-store write before surfacing the error
    pub chunk_write_attempts: u32,

    /// Base delay for the exponential backoff between attempts, in ms
    pub chunk_write_backoff_ms: u64,

    /// A job stuck in `processing` longer than this is reclaimed (default: 30 min)
    pub stale_job_timeout_mins: i64,

    /// How many times a stalled job may be requeued before it is failed
    pub max_job_reclaims: i32,

    /// Transcoder/probe implementation: "ffmpeg" or "sim"
    pub transcoder_kind: String,

    /// Maintenance sweep interval (stale jobs, expired sessions), in seconds
    pub maintenance_interval_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024 * 1024, // 10 GiB
            chunk_size: 8 * 1024 * 1024,            // 8 MiB
            allowed_mime_types: vec![
                "video/mp4".to_string(),
                "video/mpeg".to_string(),
                "video/webm".to_string(),
                "video/quicktime".to_string(),
                "video/x-matroska".to_string(),
                "video/x-msvideo".to_string(),
                "video/mp2t".to_string(),
            ],
            session_ttl_hours: 24,
            renewal_threshold_mins: 60,
            quality_ladder: vec![
                "360p".to_string(),
                "480p".to_string(),
                "720p".to_string(),
                "1080p".to_string(),
            ],
            worker_count: 4,
            worker_poll_interval_secs: 2,
            chunk_write_attempts: 3,
            chunk_write_backoff_ms: 200,
            stale_job_timeout_mins: 30,
            max_job_reclaims: 2,
            transcoder_kind: "ffmpeg".to_string(),
            maintenance_interval_secs: 3600,
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            chunk_size: env::var("CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.chunk_size),

            allowed_mime_types: env::var("ALLOWED_VIDEO_MIMES")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_mime_types),

            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.session_ttl_hours),

            renewal_threshold_mins: env::var("SESSION_RENEWAL_THRESHOLD_MINS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.renewal_threshold_mins),

            quality_ladder: env::var("QUALITY_LADDER")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.quality_ladder),

            worker_count: env::var("WORKER_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.worker_count),

            worker_poll_interval_secs: env::var("WORKER_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.worker_poll_interval_secs),

            chunk_write_attempts: env::var("CHUNK_WRITE_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.chunk_write_attempts),

            chunk_write_backoff_ms: env::var("CHUNK_WRITE_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.chunk_write_backoff_ms),

            stale_job_timeout_mins: env::var("STALE_JOB_TIMEOUT_MINS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.stale_job_timeout_mins),

            max_job_reclaims: env::var("MAX_JOB_RECLAIMS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_job_reclaims),

            transcoder_kind: env::var("TRANSCODER_KIND").unwrap_or(default.transcoder_kind),

            maintenance_interval_secs: env::var("MAINTENANCE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.maintenance_interval_secs),
        }
    }

    /// Create config for development (simulated codec tools, small chunks)
    pub fn development() -> Self {
        Self {
            max_file_size: 1024 * 1024 * 1024,
            chunk_size: 1024 * 1024,
            transcoder_kind: "sim".to_string(),
            worker_poll_interval_secs: 1,
            maintenance_interval_secs: 60,
            ..Self::default()
        }
    }

    /// Total chunk count for a declared file size: `ceil(size / chunk_size)`.
    pub fn total_chunks(&self, size: u64) -> i32 {
        size.div_ceil(self.chunk_size) as i32
    }

    /// Expected byte length of one chunk; only the final chunk may be short.
    pub fn expected_chunk_len(&self, size: u64, chunk_number: i32, total_chunks: i32) -> u64 {
        if chunk_number == total_chunks - 1 {
            size - (total_chunks as u64 - 1) * self.chunk_size
        } else {
            self.chunk_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024 * 1024);
        assert_eq!(config.chunk_size, 8 * 1024 * 1024);
        assert_eq!(config.quality_ladder.len(), 4);
        assert_eq!(config.chunk_write_attempts, 3);
    }

    #[test]
    fn test_development_config() {
        let config = IngestConfig::development();
        assert_eq!(config.transcoder_kind, "sim");
        assert_eq!(config.chunk_size, 1024 * 1024);
    }

    #[test]
    fn test_chunk_arithmetic() {
        let config = IngestConfig {
            chunk_size: 1_048_576,
            ..IngestConfig::default()
        };

        // Exact multiple
        assert_eq!(config.total_chunks(3 * 1_048_576), 3);
        assert_eq!(config.expected_chunk_len(3 * 1_048_576, 2, 3), 1_048_576);

        // Trailing partial chunk
        let size = 10_500_000u64;
        let total = config.total_chunks(size);
        assert_eq!(total, 11);
        assert_eq!(config.expected_chunk_len(size, 0, total), 1_048_576);
        assert_eq!(
            config.expected_chunk_len(size, total - 1, total),
            size - 10 * 1_048_576
        );
    }
}
