//! Skywatch core: job model, pure state machine, and the view-state protocol.
mod effect;
mod error;
mod history;
mod job;
mod log_buffer;
mod msg;
mod panel;
mod reveal;
mod state;
mod update;
mod view_model;
mod view_state;

pub use effect::Effect;
pub use error::{RequestError, RequestFailure};
pub use history::{History, MAX_HISTORY};
pub use job::{
    ArtifactFile, ArtifactListing, CancelAck, ClearAck, Identity, Job, JobId, JobList, JobState,
    JobType, OrchestratorStats, SubmitJobRequest, UnknownJobType,
};
pub use log_buffer::{LogBuffer, LogLine, StreamPhase, LOG_BUFFER_CAPACITY};
pub use msg::Msg;
pub use panel::{scoped_updates, FetchTicket, LatestOnly, PanelError};
pub use reveal::{anchor_id, reveal_tab, reveal_tab_with, AnchorSurface, ScrollBehavior};
pub use state::ConsoleState;
pub use update::update;
pub use view_model::{ConsoleView, JobRowView, OperationErrors, StreamView};
pub use view_state::{Location, ViewState, DEFAULT_TAB, TAB_KEY};
