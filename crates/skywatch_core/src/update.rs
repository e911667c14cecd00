use crate::{ConsoleState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
///
/// Job state is never edited locally; the list only changes by being replaced
/// with a fresh fetch, so local and server state can only differ by staleness.
pub fn update(mut state: ConsoleState, msg: Msg) -> (ConsoleState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartRequested { job_type, params } => {
            state.set_conflict(None);
            if state.errors().submit.is_some() {
                state.errors_mut().submit = None;
            }
            vec![Effect::SubmitJob { job_type, params }]
        }
        Msg::JobSubmitted { result, .. } => match result {
            Ok(job) => {
                state.errors_mut().submit = None;
                state.set_conflict(None);
                let mut effects = state.attach_stream(job.job_id);
                effects.push(state.refresh_effect());
                effects
            }
            Err(err) => {
                // A conflict leaves the active job alone; the caller may attach to the existing one.
                state.set_conflict(err.duplicate_job_id().map(ToOwned::to_owned));
                state.errors_mut().submit = Some(err);
                Vec::new()
            }
        },
        Msg::RefreshRequested => vec![state.refresh_effect()],
        Msg::JobsLoaded { request, result } => {
            match result {
                Ok(jobs) => {
                    state.replace_jobs(request, jobs);
                }
                Err(err) => {
                    if state.refresh_failed_is_current(request) {
                        state.errors_mut().refresh = Some(err);
                    }
                }
            }
            Vec::new()
        }
        Msg::CancelRequested { job_id } => vec![Effect::CancelJob { job_id }],
        Msg::CancelFinished { result, .. } => {
            match result {
                Ok(_) => {
                    if state.errors().cancel.is_some() {
                        state.errors_mut().cancel = None;
                    }
                }
                Err(err) => state.errors_mut().cancel = Some(err),
            }
            Vec::new()
        }
        Msg::ClearAllRequested => vec![Effect::ClearAllJobs],
        Msg::ClearAllFinished { result } => match result {
            Ok(_) => {
                if state.errors().clear.is_some() {
                    state.errors_mut().clear = None;
                }
                vec![state.refresh_effect()]
            }
            Err(err) => {
                state.errors_mut().clear = Some(err);
                Vec::new()
            }
        },
        Msg::PollTick => vec![state.refresh_effect(), state.stats_effect()],
        Msg::StatsLoaded { request, result } => {
            match result {
                Ok(stats) => {
                    state.replace_stats(request, stats);
                }
                Err(err) => {
                    if state.stats_failed_is_current(request) {
                        state.errors_mut().stats = Some(err);
                    }
                }
            }
            Vec::new()
        }
        Msg::JobSelected { job_id } => {
            if state.conflict() == Some(job_id.as_str()) {
                state.set_conflict(None);
            }
            if state.is_stream_attached_to(&job_id) {
                Vec::new()
            } else {
                state.attach_stream(job_id)
            }
        }
        Msg::StreamDetached => state.detach_stream(),
        Msg::StreamOpened { generation } => {
            state.stream_opened(generation);
            Vec::new()
        }
        Msg::StreamLine { generation, text } => {
            state.stream_line(generation, text);
            Vec::new()
        }
        Msg::StreamClosed { generation } => {
            // The stream never carries the terminal state; only the list endpoint does.
            if state.stream_closed(generation) {
                vec![state.refresh_effect()]
            } else {
                Vec::new()
            }
        }
        Msg::ConflictDismissed => {
            state.set_conflict(None);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
