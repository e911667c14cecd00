use std::collections::BTreeMap;

use crate::{CancelAck, ClearAck, Job, JobId, JobType, OrchestratorStats, RequestError};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User asked to run a pipeline stage.
    StartRequested {
        job_type: JobType,
        params: BTreeMap<String, String>,
    },
    /// Backend answered a submission.
    JobSubmitted {
        job_type: JobType,
        result: Result<Job, RequestError>,
    },
    /// User asked for an immediate reconciliation.
    RefreshRequested,
    /// Job list fetch finished.
    JobsLoaded {
        request: u64,
        result: Result<Vec<Job>, RequestError>,
    },
    CancelRequested {
        job_id: JobId,
    },
    CancelFinished {
        job_id: JobId,
        result: Result<CancelAck, RequestError>,
    },
    ClearAllRequested,
    ClearAllFinished {
        result: Result<ClearAck, RequestError>,
    },
    /// Telemetry interval elapsed.
    PollTick,
    StatsLoaded {
        request: u64,
        result: Result<OrchestratorStats, RequestError>,
    },
    /// User picked a job whose log should be followed.
    JobSelected {
        job_id: JobId,
    },
    /// Log view went away; release the connection.
    StreamDetached,
    StreamOpened {
        generation: u64,
    },
    StreamLine {
        generation: u64,
        text: String,
    },
    StreamClosed {
        generation: u64,
    },
    ConflictDismissed,
    NoOp,
}
