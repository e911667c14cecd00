//! Async side of the console: HTTP and WebSocket access to the backend,
//! the state loop that executes effects, and the shared view-state store.
mod api;
mod config;
mod panel;
mod panels;
mod poller;
mod runtime;
mod stream;
mod view_store;

pub use api::{BackendApi, ReqwestApiClient, API_KEY_HEADER};
pub use config::{ClientConfig, ConsoleSettings, DEFAULT_BASE_URL};
pub use panel::{Panel, PanelSync, PanelView};
pub use panels::{ArtifactsPanel, ReliabilityPanel, ReliabilitySelection};
pub use poller::TelemetryPoller;
pub use runtime::ConsoleHandle;
pub use stream::{LogStream, LogStreamConsumer};
pub use view_store::{reveal_tab_with_retry, ViewStateStore};
