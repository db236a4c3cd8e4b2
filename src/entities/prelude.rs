pub use super::internal_servers::Entity as InternalServers;
pub use super::upload_chunks::Entity as UploadChunks;
pub use super::upload_sessions::Entity as UploadSessions;
pub use super::video_activity_log::Entity as VideoActivityLog;
pub use super::video_files::Entity as VideoFiles;
pub use super::video_processing_jobs::Entity as VideoProcessingJobs;
pub use super::video_qualities::Entity as VideoQualities;
