use std::fmt;

use crate::JobId;

/// A failed backend request, tagged with what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RequestError {
    pub kind: RequestFailure,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: RequestFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn duplicate_job(job_id: impl Into<JobId>) -> Self {
        Self::new(
            RequestFailure::DuplicateJob {
                job_id: job_id.into(),
            },
            "duplicate job already running",
        )
    }

    /// Id of the already-running job when this is a submission conflict.
    pub fn duplicate_job_id(&self) -> Option<&str> {
        match &self.kind {
            RequestFailure::DuplicateJob { job_id } => Some(job_id),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            RequestFailure::HttpStatus(code) => Some(code),
            RequestFailure::DuplicateJob { .. } => Some(409),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    HttpStatus(u16),
    DuplicateJob { job_id: JobId },
    Network,
    Timeout,
    Decode,
    InvalidUrl,
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestFailure::HttpStatus(code) => write!(f, "http status {code}"),
            RequestFailure::DuplicateJob { job_id } => write!(f, "duplicate of job {job_id}"),
            RequestFailure::Network => write!(f, "network error"),
            RequestFailure::Timeout => write!(f, "timeout"),
            RequestFailure::Decode => write!(f, "malformed response"),
            RequestFailure::InvalidUrl => write!(f, "invalid url"),
        }
    }
}
