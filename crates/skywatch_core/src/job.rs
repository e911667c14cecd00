use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type JobId = String;

/// Pipeline stages the backend knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    SetupBootstrap,
    SetupDataPipeline,
    FullPipeline,
    TrainKeplerStrict,
    BenchmarksCompare,
    HardeningSuiteStrict,
    MultiSector,
}

impl JobType {
    pub const ALL: [JobType; 7] = [
        JobType::SetupBootstrap,
        JobType::SetupDataPipeline,
        JobType::FullPipeline,
        JobType::TrainKeplerStrict,
        JobType::BenchmarksCompare,
        JobType::HardeningSuiteStrict,
        JobType::MultiSector,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::SetupBootstrap => "setup-bootstrap",
            JobType::SetupDataPipeline => "setup-data-pipeline",
            JobType::FullPipeline => "full-pipeline",
            JobType::TrainKeplerStrict => "train-kepler-strict",
            JobType::BenchmarksCompare => "benchmarks-compare",
            JobType::HardeningSuiteStrict => "hardening-suite-strict",
            JobType::MultiSector => "multi-sector",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job type: {0}")]
pub struct UnknownJobType(pub String);

impl FromStr for JobType {
    type Err = UnknownJobType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        JobType::ALL
            .into_iter()
            .find(|job_type| job_type.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownJobType(s.to_string()))
    }
}

/// Server-owned job state. Unknown strings survive a round trip untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Succeeded,
    Failed,
    Cancelled,
    Other(String),
}

impl JobState {
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
            JobState::Other(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

impl From<String> for JobState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "completed" => JobState::Completed,
            "succeeded" => JobState::Succeeded,
            "failed" => JobState::Failed,
            "cancelled" => JobState::Cancelled,
            _ => JobState::Other(raw),
        }
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub job_type: JobType,
    pub state: JobState,
    pub artifacts_dir: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub created_at: Option<f64>,
    #[serde(default)]
    pub started_at: Option<f64>,
    #[serde(default)]
    pub finished_at: Option<f64>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl Job {
    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitJobRequest {
    pub job_type: JobType,
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub queue_depth: u64,
    pub running: Vec<JobId>,
    pub concurrency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactListing {
    #[serde(default)]
    pub root: Option<String>,
    pub files: Vec<ArtifactFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAck {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearAck {
    pub status: String,
    #[serde(default)]
    pub db_count: Option<u64>,
    #[serde(default)]
    pub fs_count: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Caller identity as reported by the backend; used for display and gating only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub role: String,
    #[serde(default)]
    pub public_read: Option<bool>,
}

impl Identity {
    pub fn can_operate(&self) -> bool {
        matches!(self.role.as_str(), "operator" | "admin")
    }
}

#[cfg(test)]
mod tests {
    use super::{JobState, JobType};

    #[test]
    fn job_type_parses_wire_names() {
        assert_eq!(
            "train-kepler-strict".parse::<JobType>().unwrap(),
            JobType::TrainKeplerStrict
        );
        assert!("train".parse::<JobType>().is_err());
    }

    #[test]
    fn unknown_states_are_kept_and_not_terminal() {
        let state = JobState::from("paused".to_string());
        assert_eq!(state.as_str(), "paused");
        assert!(!state.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Queued.is_terminal());
    }
}
