//! Status vocabularies shared between the service layer and the entities.
//! Columns store the string form; these enums keep the transitions typed
//! on the Rust side.

/// VideoFile.upload_status: `uploading -> {completed | failed}`, terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// VideoFile.processing_status: `pending -> processing -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// UploadSession.status. `finalizing` is the compare-and-swap guard state
/// that makes the merge fire at most once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uploading,
    Finalizing,
    Completed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    Transcode,
    Thumbnail,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcode => "transcode",
            Self::Thumbnail => "thumbnail",
        }
    }
}

/// ProcessingJob.status: `pending -> processing -> {completed | failed}`.
/// No transition out of the terminal states; re-processing means a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(s: &str) -> bool {
        s == Self::Completed.as_str() || s == Self::Failed.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(UploadStatus::Uploading.as_str(), "uploading");
        assert_eq!(SessionState::Finalizing.as_str(), "finalizing");
        assert_eq!(JobType::Thumbnail.as_str(), "thumbnail");
        assert!(JobStatus::is_terminal("failed"));
        assert!(!JobStatus::is_terminal("processing"));
    }
}
