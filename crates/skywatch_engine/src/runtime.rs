use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use skywatch_core::{update, ConsoleState, ConsoleView, Effect, JobId, JobType, Msg};
use skywatch_logging::{sky_debug, sky_info, sky_warn};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::api::BackendApi;
use crate::poller::TelemetryPoller;
use crate::stream::LogStreamConsumer;

/// Front door of the running console.
///
/// Owns the state loop task: messages go in through the methods below,
/// the rendered view comes out through [`ConsoleHandle::subscribe`].
/// Must be created inside a tokio runtime.
pub struct ConsoleHandle {
    msg_tx: mpsc::UnboundedSender<Msg>,
    view_rx: watch::Receiver<ConsoleView>,
    shutdown: CancellationToken,
    poller: Option<TelemetryPoller>,
}

impl ConsoleHandle {
    pub fn spawn(api: Arc<dyn BackendApi>) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let state = ConsoleState::new();
        let (view_tx, view_rx) = watch::channel(state.view());
        let shutdown = CancellationToken::new();

        let runner = EffectRunner {
            streams: LogStreamConsumer::new(Arc::clone(&api), msg_tx.clone()),
            api,
            msg_tx: msg_tx.clone(),
        };
        tokio::spawn(run_loop(state, msg_rx, view_tx, runner, shutdown.clone()));

        Self {
            msg_tx,
            view_rx,
            shutdown,
            poller: None,
        }
    }

    pub fn send(&self, msg: Msg) {
        if self.msg_tx.send(msg).is_err() {
            sky_warn!("console loop has stopped; message dropped");
        }
    }

    pub fn start(&self, job_type: JobType, params: BTreeMap<String, String>) {
        self.send(Msg::StartRequested { job_type, params });
    }

    pub fn refresh(&self) {
        self.send(Msg::RefreshRequested);
    }

    pub fn cancel(&self, job_id: impl Into<JobId>) {
        self.send(Msg::CancelRequested {
            job_id: job_id.into(),
        });
    }

    pub fn clear_all(&self) {
        self.send(Msg::ClearAllRequested);
    }

    /// Attaches the log stream to an existing job.
    pub fn select_job(&self, job_id: impl Into<JobId>) {
        self.send(Msg::JobSelected {
            job_id: job_id.into(),
        });
    }

    pub fn detach_stream(&self) {
        self.send(Msg::StreamDetached);
    }

    pub fn dismiss_conflict(&self) {
        self.send(Msg::ConflictDismissed);
    }

    pub fn view(&self) -> ConsoleView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConsoleView> {
        self.view_rx.clone()
    }

    /// Resolves with the first published view satisfying `predicate`.
    ///
    /// Returns the last view if the loop stops first.
    pub async fn wait_for<F>(&self, predicate: F) -> ConsoleView
    where
        F: FnMut(&ConsoleView) -> bool,
    {
        let mut rx = self.view_rx.clone();
        let result = rx.wait_for(predicate).await.map(|view| view.clone());
        result.unwrap_or_else(|_| self.view())
    }

    pub fn start_polling(&mut self, interval: Duration) {
        self.stop_polling();
        sky_info!("polling every {:?}", interval);
        self.poller = Some(TelemetryPoller::start(interval, self.msg_tx.clone()));
    }

    pub fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(TelemetryPoller::is_running)
    }

    /// Stops polling, closes the log stream and ends the state loop.
    pub fn shutdown(&mut self) {
        self.stop_polling();
        self.shutdown.cancel();
    }
}

impl Drop for ConsoleHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_loop(
    mut state: ConsoleState,
    mut msg_rx: mpsc::UnboundedReceiver<Msg>,
    view_tx: watch::Sender<ConsoleView>,
    mut runner: EffectRunner,
    shutdown: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = msg_rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        let (next, effects) = update(state, msg);
        state = next;
        if state.consume_dirty() {
            view_tx.send_replace(state.view());
        }
        for effect in effects {
            runner.run(effect);
        }
    }
    runner.streams.release();
    sky_debug!("console loop stopped");
}

struct EffectRunner {
    api: Arc<dyn BackendApi>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    streams: LogStreamConsumer,
}

impl EffectRunner {
    fn run(&mut self, effect: Effect) {
        let api = Arc::clone(&self.api);
        match effect {
            Effect::SubmitJob { job_type, params } => self.dispatch(async move {
                sky_info!("submitting {} job", job_type);
                let result = api.submit_job(job_type, params).await;
                match &result {
                    Ok(job) => sky_info!("{} job {} accepted", job_type, job.job_id),
                    Err(err) if err.duplicate_job_id().is_some() => {}
                    Err(err) => sky_warn!("submitting {} failed: {}", job_type, err),
                }
                Msg::JobSubmitted { job_type, result }
            }),
            Effect::RefreshJobs { request } => self.dispatch(async move {
                let result = api.list_jobs().await;
                if let Err(err) = &result {
                    sky_warn!("job list refresh {} failed: {}", request, err);
                }
                Msg::JobsLoaded { request, result }
            }),
            Effect::FetchStats { request } => self.dispatch(async move {
                let result = api.orchestrator_stats().await;
                if let Err(err) = &result {
                    sky_warn!("stats fetch {} failed: {}", request, err);
                }
                Msg::StatsLoaded { request, result }
            }),
            Effect::CancelJob { job_id } => self.dispatch(async move {
                let result = api.cancel_job(&job_id).await;
                match &result {
                    Ok(ack) => sky_info!("cancel of {} answered {}", job_id, ack.status),
                    Err(err) => sky_warn!("cancelling {} failed: {}", job_id, err),
                }
                Msg::CancelFinished { job_id, result }
            }),
            Effect::ClearAllJobs => self.dispatch(async move {
                let result = api.clear_all_jobs().await;
                match &result {
                    Ok(ack) => sky_info!("clear answered {} ({} jobs)", ack.status, ack.total.unwrap_or(0)),
                    Err(err) => sky_warn!("clearing jobs failed: {}", err),
                }
                Msg::ClearAllFinished { result }
            }),
            Effect::OpenLogStream { job_id, generation } => {
                self.streams.attach(job_id, generation);
            }
            Effect::CloseLogStream { generation } => {
                self.streams.detach(generation);
            }
        }
    }

    fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = Msg> + Send + 'static,
    {
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let msg = task.await;
            let _ = msg_tx.send(msg);
        });
    }
}
