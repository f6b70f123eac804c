//! Verification job types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NonEmptyString;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Locally minted id for a job created while the session is simulated.
    #[must_use]
    pub fn simulated() -> Self {
        Self(format!("job-{}", uuid::Uuid::new_v4()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Error)]
#[error("unknown job status: {0}")]
pub struct JobStatusParseError(pub String);

impl JobStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl FromStr for JobStatus {
    type Err = JobStatusParseError;

    /// Case-insensitive: the upload endpoint reports `queued`, the status endpoint `QUEUED`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(Self::Queued),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(JobStatusParseError(raw.to_string())),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verification job as tracked by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub filename: String,
    pub status: JobStatus,
    /// Percentage label, e.g. `"45%"`.
    pub progress: String,
    pub submitted_at: DateTime<Utc>,
}

impl JobRecord {
    /// Placeholder record for a freshly accepted submission.
    #[must_use]
    pub fn queued(id: JobId, filename: impl Into<String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id,
            filename: filename.into(),
            status: JobStatus::Queued,
            progress: "0%".to_string(),
            submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionViolation {
    #[error("no file selected for upload")]
    MissingFile,
}

/// A file selected for verification, held in memory until submitted.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    filename: NonEmptyString,
    bytes: Vec<u8>,
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename.as_str())
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, PreconditionViolation> {
        let filename =
            NonEmptyString::new(filename).map_err(|_| PreconditionViolation::MissingFile)?;
        Ok(Self { filename, bytes })
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        self.filename.as_str()
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
