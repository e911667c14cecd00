use std::collections::BTreeMap;
use std::sync::Once;

use pretty_assertions::assert_eq;
use skywatch_core::{
    update, ClearAck, ConsoleState, Effect, Job, JobState, JobType, Msg, OrchestratorStats,
    RequestError, RequestFailure, StreamPhase,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(skywatch_logging::initialize_for_tests);
}

fn job(id: &str, job_type: JobType, state: JobState) -> Job {
    Job {
        job_id: id.to_string(),
        job_type,
        state,
        artifacts_dir: format!("/artifacts/{id}"),
        note: None,
        created_at: None,
        started_at: None,
        finished_at: None,
        params: BTreeMap::new(),
        attempts: 0,
        error: None,
    }
}

fn start(state: ConsoleState, job_type: JobType) -> (ConsoleState, Vec<Effect>) {
    update(
        state,
        Msg::StartRequested {
            job_type,
            params: BTreeMap::new(),
        },
    )
}

fn submitted(state: ConsoleState, result: Result<Job, RequestError>) -> (ConsoleState, Vec<Effect>) {
    update(
        state,
        Msg::JobSubmitted {
            job_type: JobType::TrainKeplerStrict,
            result,
        },
    )
}

fn load_jobs(state: ConsoleState, request: u64, jobs: Vec<Job>) -> ConsoleState {
    update(
        state,
        Msg::JobsLoaded {
            request,
            result: Ok(jobs),
        },
    )
    .0
}

#[test]
fn start_requests_a_submission_without_touching_the_list() {
    init_logging();
    let (state, effects) = start(ConsoleState::new(), JobType::FullPipeline);

    assert_eq!(
        effects,
        vec![Effect::SubmitJob {
            job_type: JobType::FullPipeline,
            params: BTreeMap::new(),
        }]
    );
    assert!(state.jobs().is_empty());
    assert_eq!(state.active_job(), None);
}

#[test]
fn successful_submission_activates_job_and_attaches_stream() {
    init_logging();
    let (state, _) = start(ConsoleState::new(), JobType::TrainKeplerStrict);
    let created = job("job-1", JobType::TrainKeplerStrict, JobState::Queued);
    let (mut state, effects) = submitted(state, Ok(created));

    assert_eq!(
        effects,
        vec![
            Effect::OpenLogStream {
                job_id: "job-1".into(),
                generation: 1,
            },
            Effect::RefreshJobs { request: 1 },
        ]
    );
    assert_eq!(state.active_job(), Some("job-1"));
    assert_eq!(state.stream_phase(), StreamPhase::Connecting);
    assert!(state.jobs().is_empty(), "list only changes through a refresh");
    assert!(state.consume_dirty());
}

#[test]
fn duplicate_conflict_exposes_existing_job_and_keeps_active_entry() {
    init_logging();
    let running = job("job-1", JobType::TrainKeplerStrict, JobState::Running);
    let state = load_jobs(ConsoleState::new(), 1, vec![running]);
    let (state, _) = submitted(state, Ok(job("job-0", JobType::FullPipeline, JobState::Queued)));

    let (state, _) = start(state, JobType::TrainKeplerStrict);
    let (state, effects) = submitted(state, Err(RequestError::duplicate_job("job-1")));

    assert!(effects.is_empty());
    assert_eq!(state.conflict(), Some("job-1"));
    assert_eq!(state.active_job(), Some("job-0"));
    assert_eq!(state.jobs().len(), 1);
    assert_eq!(
        state.errors().submit.as_ref().and_then(|e| e.duplicate_job_id()),
        Some("job-1")
    );
    let view = state.view();
    assert_eq!(view.conflict.as_deref(), Some("job-1"));
    assert_eq!(view.stream.job_id.as_deref(), Some("job-0"));
}

#[test]
fn attaching_to_conflicting_job_matches_a_fresh_submission() {
    init_logging();
    let (conflicted, _) = submitted(
        ConsoleState::new(),
        Err(RequestError::duplicate_job("job-9")),
    );
    let (attached, attach_effects) = update(
        conflicted,
        Msg::JobSelected {
            job_id: "job-9".into(),
        },
    );
    let (fresh, fresh_effects) = submitted(
        ConsoleState::new(),
        Ok(job("job-9", JobType::TrainKeplerStrict, JobState::Running)),
    );

    assert_eq!(attached.conflict(), None);
    assert_eq!(attach_effects[0], fresh_effects[0]);

    let lines = ["boot", "epoch 1", "epoch 2"];
    let feed = |mut state: ConsoleState| {
        for text in lines {
            state = update(
                state,
                Msg::StreamLine {
                    generation: 1,
                    text: text.to_string(),
                },
            )
            .0;
        }
        state
    };
    let attached = feed(attached);
    let fresh = feed(fresh);
    assert_eq!(attached.log_buffer(), fresh.log_buffer());
    assert_eq!(attached.view().stream, fresh.view().stream);
}

#[test]
fn generic_submit_failure_is_not_a_conflict() {
    init_logging();
    let err = RequestError::new(RequestFailure::HttpStatus(500), "boom");
    let (state, effects) = submitted(ConsoleState::new(), Err(err.clone()));

    assert!(effects.is_empty());
    assert_eq!(state.conflict(), None);
    assert_eq!(state.errors().submit, Some(err));
}

#[test]
fn cancel_is_fire_and_forget() {
    init_logging();
    let state = load_jobs(
        ConsoleState::new(),
        1,
        vec![job("job-1", JobType::MultiSector, JobState::Running)],
    );
    let (state, effects) = update(
        state,
        Msg::CancelRequested {
            job_id: "job-1".into(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::CancelJob {
            job_id: "job-1".into()
        }]
    );
    assert_eq!(state.job("job-1").map(|j| &j.state), Some(&JobState::Running));

    let (state, effects) = update(
        state,
        Msg::CancelFinished {
            job_id: "job-1".into(),
            result: Err(RequestError::new(RequestFailure::HttpStatus(400), "not running")),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.errors().cancel.as_ref().and_then(|e| e.status()), Some(400));

    let state = load_jobs(
        state,
        2,
        vec![job("job-1", JobType::MultiSector, JobState::Cancelled)],
    );
    assert_eq!(state.job("job-1").map(|j| &j.state), Some(&JobState::Cancelled));
}

#[test]
fn clear_all_refreshes_on_success_and_keeps_list_on_failure() {
    init_logging();
    let jobs = vec![job("job-1", JobType::MultiSector, JobState::Completed)];
    let (state, _) = update(ConsoleState::new(), Msg::RefreshRequested);
    let state = load_jobs(state, 1, jobs.clone());

    let (state, effects) = update(state, Msg::ClearAllRequested);
    assert_eq!(effects, vec![Effect::ClearAllJobs]);

    let (state, effects) = update(
        state,
        Msg::ClearAllFinished {
            result: Err(RequestError::new(RequestFailure::HttpStatus(403), "insufficient role")),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.jobs(), jobs.as_slice());
    assert!(state.errors().clear.is_some());

    let (state, effects) = update(
        state,
        Msg::ClearAllFinished {
            result: Ok(ClearAck {
                status: "cleared".into(),
                db_count: Some(1),
                fs_count: Some(1),
                total: Some(2),
            }),
        },
    );
    assert_eq!(effects, vec![Effect::RefreshJobs { request: 2 }]);
    assert!(state.errors().clear.is_none());
    let state = load_jobs(state, 2, Vec::new());
    assert!(state.jobs().is_empty());
}

#[test]
fn poll_tick_refreshes_jobs_and_stats_independently() {
    init_logging();
    let (state, effects) = update(ConsoleState::new(), Msg::PollTick);
    assert_eq!(
        effects,
        vec![
            Effect::RefreshJobs { request: 1 },
            Effect::FetchStats { request: 1 },
        ]
    );

    let (state, _) = update(
        state,
        Msg::StatsLoaded {
            request: 1,
            result: Err(RequestError::new(RequestFailure::Network, "connection refused")),
        },
    );
    let state = load_jobs(
        state,
        1,
        vec![job("job-1", JobType::SetupBootstrap, JobState::Running)],
    );

    assert_eq!(state.jobs().len(), 1);
    assert!(state.errors().stats.is_some());
    assert!(state.errors().refresh.is_none());

    let (state, _) = update(state, Msg::PollTick);
    let (state, _) = update(
        state,
        Msg::StatsLoaded {
            request: 2,
            result: Ok(OrchestratorStats {
                queue_depth: 0,
                running: vec!["job-1".into()],
                concurrency: 2,
            }),
        },
    );
    assert!(state.errors().stats.is_none());
    assert!(state.view().jobs[0].executing);
}

#[test]
fn out_of_order_refreshes_never_regress_the_list() {
    init_logging();
    let (state, _) = update(ConsoleState::new(), Msg::RefreshRequested);
    let (state, _) = update(state, Msg::RefreshRequested);

    let newer = vec![job("job-1", JobType::FullPipeline, JobState::Completed)];
    let older = vec![job("job-1", JobType::FullPipeline, JobState::Running)];
    let state = load_jobs(state, 2, newer.clone());
    let state = load_jobs(state, 1, older);
    assert_eq!(state.jobs(), newer.as_slice());

    let (state, _) = update(
        state,
        Msg::JobsLoaded {
            request: 1,
            result: Err(RequestError::new(RequestFailure::Timeout, "late")),
        },
    );
    assert!(state.errors().refresh.is_none(), "stale failures are ignored");
}
