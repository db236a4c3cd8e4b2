pub mod prelude;

pub mod internal_servers;
pub mod upload_chunks;
pub mod upload_sessions;
pub mod video_activity_log;
pub mod video_files;
pub mod video_processing_jobs;
pub mod video_qualities;
