use std::collections::BTreeMap;

use crate::{JobId, JobType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SubmitJob {
        job_type: JobType,
        params: BTreeMap<String, String>,
    },
    RefreshJobs {
        request: u64,
    },
    FetchStats {
        request: u64,
    },
    CancelJob {
        job_id: JobId,
    },
    ClearAllJobs,
    /// Open the log stream for `job_id`; events must echo `generation`.
    OpenLogStream {
        job_id: JobId,
        generation: u64,
    },
    CloseLogStream {
        generation: u64,
    },
}
