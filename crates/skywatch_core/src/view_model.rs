use crate::{JobId, JobState, JobType, LogLine, OrchestratorStats, RequestError, StreamPhase};

/// Last failure of each operation; cleared by that operation's next success.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationErrors {
    pub submit: Option<RequestError>,
    pub refresh: Option<RequestError>,
    pub cancel: Option<RequestError>,
    pub clear: Option<RequestError>,
    pub stats: Option<RequestError>,
}

impl OperationErrors {
    pub fn is_empty(&self) -> bool {
        self.submit.is_none()
            && self.refresh.is_none()
            && self.cancel.is_none()
            && self.clear.is_none()
            && self.stats.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsoleView {
    pub jobs: Vec<JobRowView>,
    pub active_job: Option<JobId>,
    /// Existing job reported by the last rejected submission.
    pub conflict: Option<JobId>,
    pub stream: StreamView,
    pub stats: Option<OrchestratorStats>,
    pub errors: OperationErrors,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub job_type: JobType,
    pub state: JobState,
    pub note: Option<String>,
    /// Log stream is attached to this job.
    pub attached: bool,
    /// Orchestrator reports this job as executing.
    pub executing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamView {
    pub job_id: Option<JobId>,
    pub phase: StreamPhase,
    pub lines: Vec<LogLine>,
    pub received: u64,
}
