//! Panels shipped with the console.
use std::sync::Arc;

use serde_json::Value;
use skywatch_core::{ArtifactListing, JobId, RequestError, ViewState};

use crate::api::BackendApi;
use crate::panel::Panel;

/// File listing of the job named by the `job` key.
pub struct ArtifactsPanel {
    api: Arc<dyn BackendApi>,
}

impl ArtifactsPanel {
    pub const TAB: &'static str = "jobs";
    pub const KEYS: &'static [&'static str] = &["job"];

    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Panel for ArtifactsPanel {
    type Selection = Option<JobId>;
    type Data = Option<ArtifactListing>;

    fn tab(&self) -> &'static str {
        Self::TAB
    }

    fn owned_keys(&self) -> &'static [&'static str] {
        Self::KEYS
    }

    fn read_selection(&self, state: &ViewState) -> Self::Selection {
        state.read("job").map(str::to_string)
    }

    fn write_selection(&self, selection: &Self::Selection) -> Vec<(String, Option<String>)> {
        vec![("job".to_string(), selection.clone())]
    }

    async fn load(&self, selection: &Self::Selection) -> Result<Self::Data, RequestError> {
        match selection {
            Some(job_id) => self.api.list_artifacts(job_id).await.map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReliabilitySelection {
    pub run: Option<String>,
    pub model: Option<String>,
    pub bins: Option<u32>,
}

/// Calibration curve of one run, optionally narrowed to a model.
pub struct ReliabilityPanel {
    api: Arc<dyn BackendApi>,
}

impl ReliabilityPanel {
    pub const TAB: &'static str = "reliability";
    pub const KEYS: &'static [&'static str] = &["run", "model", "bins"];

    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Panel for ReliabilityPanel {
    type Selection = ReliabilitySelection;
    type Data = Option<Value>;

    fn tab(&self) -> &'static str {
        Self::TAB
    }

    fn owned_keys(&self) -> &'static [&'static str] {
        Self::KEYS
    }

    fn read_selection(&self, state: &ViewState) -> Self::Selection {
        ReliabilitySelection {
            run: state.read("run").map(str::to_string),
            model: state.read("model").map(str::to_string),
            bins: state
                .read("bins")
                .and_then(|bins| bins.parse::<u32>().ok())
                .filter(|bins| *bins > 0),
        }
    }

    fn write_selection(&self, selection: &Self::Selection) -> Vec<(String, Option<String>)> {
        vec![
            ("run".to_string(), selection.run.clone()),
            ("model".to_string(), selection.model.clone()),
            ("bins".to_string(), selection.bins.map(|bins| bins.to_string())),
        ]
    }

    async fn load(&self, selection: &Self::Selection) -> Result<Self::Data, RequestError> {
        let Some(run) = selection.run.as_deref() else {
            return Ok(None);
        };
        self.api
            .reliability_calibration(run, selection.model.as_deref(), selection.bins)
            .await
            .map(Some)
    }
}
