use crate::view_model::{ConsoleView, JobRowView, OperationErrors, StreamView};
use crate::{Effect, Job, JobId, LogBuffer, OrchestratorStats, StreamPhase};

/// Monotonic request numbers; a response older than the last applied one is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct RequestCounter {
    issued: u64,
    applied: u64,
}

impl RequestCounter {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn is_stale(&self, request: u64) -> bool {
        request <= self.applied
    }

    fn accept(&mut self, request: u64) -> bool {
        if self.is_stale(request) {
            return false;
        }
        self.applied = request;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct StreamSlot {
    job_id: Option<JobId>,
    phase: StreamPhase,
    generation: u64,
    buffer: LogBuffer,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsoleState {
    jobs: Vec<Job>,
    active_job: Option<JobId>,
    conflict: Option<JobId>,
    stream: StreamSlot,
    stats: Option<OrchestratorStats>,
    errors: OperationErrors,
    refreshes: RequestCounter,
    stats_requests: RequestCounter,
    dirty: bool,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> ConsoleView {
        let executing = |job_id: &str| {
            self.stats
                .as_ref()
                .is_some_and(|stats| stats.running.iter().any(|id| id == job_id))
        };
        let jobs = self
            .jobs
            .iter()
            .map(|job| JobRowView {
                job_id: job.job_id.clone(),
                job_type: job.job_type,
                state: job.state.clone(),
                note: job.note.clone(),
                attached: self.stream.job_id.as_deref() == Some(job.job_id.as_str())
                    && self.stream.phase != StreamPhase::Disconnected,
                executing: executing(&job.job_id),
            })
            .collect();

        ConsoleView {
            jobs,
            active_job: self.active_job.clone(),
            conflict: self.conflict.clone(),
            stream: StreamView {
                job_id: self.stream.job_id.clone(),
                phase: self.stream.phase,
                lines: self.stream.buffer.iter().cloned().collect(),
                received: self.stream.buffer.received(),
            },
            stats: self.stats.clone(),
            errors: self.errors.clone(),
            dirty: self.dirty,
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.job_id == job_id)
    }

    pub fn active_job(&self) -> Option<&str> {
        self.active_job.as_deref()
    }

    pub fn conflict(&self) -> Option<&str> {
        self.conflict.as_deref()
    }

    pub fn stream_phase(&self) -> StreamPhase {
        self.stream.phase
    }

    pub fn stream_job(&self) -> Option<&str> {
        self.stream.job_id.as_deref()
    }

    pub fn stream_generation(&self) -> u64 {
        self.stream.generation
    }

    pub fn log_buffer(&self) -> &LogBuffer {
        &self.stream.buffer
    }

    pub fn stats(&self) -> Option<&OrchestratorStats> {
        self.stats.as_ref()
    }

    pub fn errors(&self) -> &OperationErrors {
        &self.errors
    }

    /// Returns whether a render is needed and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn errors_mut(&mut self) -> &mut OperationErrors {
        self.dirty = true;
        &mut self.errors
    }

    pub(crate) fn set_conflict(&mut self, job_id: Option<JobId>) {
        if self.conflict != job_id {
            self.conflict = job_id;
            self.mark_dirty();
        }
    }

    pub(crate) fn refresh_effect(&mut self) -> Effect {
        Effect::RefreshJobs {
            request: self.refreshes.issue(),
        }
    }

    pub(crate) fn stats_effect(&mut self) -> Effect {
        Effect::FetchStats {
            request: self.stats_requests.issue(),
        }
    }

    /// Replaces the job list when `request` is newer than what is shown.
    pub(crate) fn replace_jobs(&mut self, request: u64, jobs: Vec<Job>) -> bool {
        if !self.refreshes.accept(request) {
            return false;
        }
        self.jobs = jobs;
        self.errors.refresh = None;
        self.mark_dirty();
        true
    }

    pub(crate) fn refresh_failed_is_current(&self, request: u64) -> bool {
        !self.refreshes.is_stale(request)
    }

    pub(crate) fn replace_stats(&mut self, request: u64, stats: OrchestratorStats) -> bool {
        if !self.stats_requests.accept(request) {
            return false;
        }
        self.stats = Some(stats);
        self.errors.stats = None;
        self.mark_dirty();
        true
    }

    pub(crate) fn stats_failed_is_current(&self, request: u64) -> bool {
        !self.stats_requests.is_stale(request)
    }

    /// Points the log stream at `job_id`, closing any live connection first.
    pub(crate) fn attach_stream(&mut self, job_id: JobId) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(2);
        if self.stream.phase.is_live() {
            effects.push(Effect::CloseLogStream {
                generation: self.stream.generation,
            });
        }
        self.stream.generation += 1;
        self.stream.job_id = Some(job_id.clone());
        self.stream.phase = StreamPhase::Connecting;
        self.stream.buffer.clear();
        self.active_job = Some(job_id.clone());
        self.mark_dirty();
        effects.push(Effect::OpenLogStream {
            job_id,
            generation: self.stream.generation,
        });
        effects
    }

    pub(crate) fn detach_stream(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.stream.phase.is_live() {
            effects.push(Effect::CloseLogStream {
                generation: self.stream.generation,
            });
        }
        if self.stream.job_id.is_some() || self.stream.phase != StreamPhase::Disconnected {
            self.stream.job_id = None;
            self.stream.phase = StreamPhase::Disconnected;
            self.stream.buffer.clear();
            self.mark_dirty();
        }
        effects
    }

    pub(crate) fn is_stream_attached_to(&self, job_id: &str) -> bool {
        self.stream.phase.is_live() && self.stream.job_id.as_deref() == Some(job_id)
    }

    fn is_current_stream(&self, generation: u64) -> bool {
        generation == self.stream.generation && self.stream.phase.is_live()
    }

    pub(crate) fn stream_opened(&mut self, generation: u64) -> bool {
        if !self.is_current_stream(generation) {
            return false;
        }
        if self.stream.phase != StreamPhase::Streaming {
            self.stream.phase = StreamPhase::Streaming;
            self.mark_dirty();
        }
        true
    }

    pub(crate) fn stream_line(&mut self, generation: u64, text: String) -> bool {
        if !self.is_current_stream(generation) {
            return false;
        }
        self.stream.phase = StreamPhase::Streaming;
        self.stream.buffer.push(text);
        self.mark_dirty();
        true
    }

    pub(crate) fn stream_closed(&mut self, generation: u64) -> bool {
        if !self.is_current_stream(generation) {
            return false;
        }
        self.stream.phase = StreamPhase::Closed;
        self.mark_dirty();
        true
    }
}
