use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::Value;
use skywatch_core::{
    ArtifactListing, CancelAck, ClearAck, ConsoleView, Identity, Job, JobState, JobType,
    OrchestratorStats, RequestError, RequestFailure, StreamPhase,
};
use skywatch_engine::{BackendApi, ConsoleHandle, LogStream};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct FakeBackend {
    jobs: Mutex<Vec<Job>>,
    running_conflict: Mutex<Option<String>>,
    fail_stats: AtomicBool,
    list_calls: AtomicUsize,
    log_lines: Vec<String>,
}

impl FakeBackend {
    fn with_logs(lines: &[&str]) -> Self {
        Self {
            log_lines: lines.iter().map(|line| line.to_string()).collect(),
            ..Self::default()
        }
    }
}

fn job(job_id: &str, job_type: JobType, state: JobState) -> Job {
    Job {
        job_id: job_id.to_string(),
        job_type,
        state,
        artifacts_dir: format!("/artifacts/{job_id}"),
        note: None,
        created_at: None,
        started_at: None,
        finished_at: None,
        params: BTreeMap::new(),
        attempts: 0,
        error: None,
    }
}

fn unavailable() -> RequestError {
    RequestError::new(RequestFailure::HttpStatus(503), "unavailable")
}

#[async_trait::async_trait]
impl BackendApi for FakeBackend {
    async fn submit_job(
        &self,
        job_type: JobType,
        _params: BTreeMap<String, String>,
    ) -> Result<Job, RequestError> {
        if let Some(existing) = self.running_conflict.lock().unwrap().clone() {
            return Err(RequestError::duplicate_job(existing));
        }
        let created = job("job-1", job_type, JobState::Queued);
        self.jobs.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RequestError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn get_job(&self, job_id: &str) -> Result<Job, RequestError> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|job| job.job_id == job_id)
            .cloned()
            .ok_or_else(|| RequestError::new(RequestFailure::HttpStatus(404), "job not found"))
    }

    async fn cancel_job(&self, _job_id: &str) -> Result<CancelAck, RequestError> {
        Ok(CancelAck {
            status: "cancelling".into(),
        })
    }

    async fn clear_all_jobs(&self) -> Result<ClearAck, RequestError> {
        self.jobs.lock().unwrap().clear();
        Ok(ClearAck {
            status: "cleared".into(),
            db_count: None,
            fs_count: None,
            total: None,
        })
    }

    async fn list_artifacts(&self, _job_id: &str) -> Result<ArtifactListing, RequestError> {
        Ok(ArtifactListing::default())
    }

    async fn orchestrator_stats(&self) -> Result<OrchestratorStats, RequestError> {
        if self.fail_stats.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(OrchestratorStats {
            queue_depth: 0,
            running: Vec::new(),
            concurrency: 1,
        })
    }

    async fn whoami(&self) -> Result<Identity, RequestError> {
        Ok(Identity {
            role: "operator".into(),
            public_read: None,
        })
    }

    async fn reliability_calibration(
        &self,
        _run_id: &str,
        _model: Option<&str>,
        _bins: Option<u32>,
    ) -> Result<Value, RequestError> {
        Err(unavailable())
    }

    async fn open_log_stream(&self, job_id: &str) -> Result<LogStream, RequestError> {
        Ok(LogStream::from_lines(job_id, self.log_lines.clone()))
    }
}

async fn wait_for(handle: &ConsoleHandle, predicate: impl FnMut(&ConsoleView) -> bool) -> ConsoleView {
    tokio::time::timeout(WAIT, handle.wait_for(predicate))
        .await
        .expect("view reached in time")
}

fn stream_texts(view: &ConsoleView) -> Vec<String> {
    view.stream.lines.iter().map(|line| line.text.clone()).collect()
}

fn stream_finished(view: &ConsoleView) -> bool {
    view.stream.phase == StreamPhase::Closed
}

#[tokio::test]
async fn started_job_streams_its_log() {
    skywatch_logging::initialize_for_tests();
    let backend = Arc::new(FakeBackend::with_logs(&["boot", "train", "done"]));
    let handle = ConsoleHandle::spawn(backend.clone());

    handle.start(JobType::FullPipeline, BTreeMap::new());
    let view = wait_for(&handle, stream_finished).await;

    assert_eq!(view.active_job.as_deref(), Some("job-1"));
    assert_eq!(view.stream.job_id.as_deref(), Some("job-1"));
    assert_eq!(stream_texts(&view), vec!["boot", "train", "done"]);
}

#[tokio::test]
async fn attaching_after_conflict_matches_a_fresh_start() {
    let fresh = {
        let backend = Arc::new(FakeBackend::with_logs(&["a", "b"]));
        let handle = ConsoleHandle::spawn(backend);
        handle.start(JobType::TrainKeplerStrict, BTreeMap::new());
        wait_for(&handle, stream_finished).await
    };

    let backend = Arc::new(FakeBackend::with_logs(&["a", "b"]));
    *backend.running_conflict.lock().unwrap() = Some("job-1".into());
    let handle = ConsoleHandle::spawn(backend);
    handle.start(JobType::TrainKeplerStrict, BTreeMap::new());
    let conflicted = wait_for(&handle, |view| view.conflict.is_some()).await;
    assert_eq!(conflicted.conflict.as_deref(), Some("job-1"));
    assert_eq!(conflicted.stream.phase, StreamPhase::Disconnected);

    handle.select_job("job-1");
    let attached = wait_for(&handle, stream_finished).await;

    assert_eq!(attached.conflict, None);
    assert_eq!(attached.stream.job_id, fresh.stream.job_id);
    assert_eq!(stream_texts(&attached), stream_texts(&fresh));
}

#[tokio::test]
async fn closed_stream_triggers_a_refresh() {
    let backend = Arc::new(FakeBackend::with_logs(&["only line"]));
    let handle = ConsoleHandle::spawn(backend.clone());

    handle.start(JobType::SetupBootstrap, BTreeMap::new());
    wait_for(&handle, stream_finished).await;

    // One refresh after the submit, one after the stream ended.
    let deadline = tokio::time::Instant::now() + WAIT;
    while backend.list_calls.load(Ordering::SeqCst) < 2 {
        assert!(tokio::time::Instant::now() < deadline, "refresh never issued");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn failing_stats_do_not_block_the_job_list() {
    let backend = Arc::new(FakeBackend::default());
    backend
        .jobs
        .lock()
        .unwrap()
        .push(job("job-4", JobType::BenchmarksCompare, JobState::Running));
    backend.fail_stats.store(true, Ordering::SeqCst);
    let mut handle = ConsoleHandle::spawn(backend);

    handle.start_polling(Duration::from_secs(3));
    let view = wait_for(&handle, |view| !view.jobs.is_empty() && view.errors.stats.is_some()).await;

    assert!(handle.is_polling());
    assert_eq!(view.jobs[0].job_id, "job-4");
    assert_eq!(view.errors.refresh, None);
    assert_eq!(view.stats, None);

    handle.stop_polling();
    assert!(!handle.is_polling());
}

#[tokio::test]
async fn clear_all_empties_the_list() {
    let backend = Arc::new(FakeBackend::default());
    backend
        .jobs
        .lock()
        .unwrap()
        .push(job("job-5", JobType::MultiSector, JobState::Completed));
    let handle = ConsoleHandle::spawn(backend);

    handle.refresh();
    wait_for(&handle, |view| view.jobs.len() == 1).await;
    handle.clear_all();
    let view = wait_for(&handle, |view| view.jobs.is_empty()).await;

    assert!(view.errors.is_empty());
}
