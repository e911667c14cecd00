use std::collections::BTreeMap;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use skywatch_core::{
    ArtifactListing, CancelAck, ClearAck, Identity, Job, JobList, JobType, OrchestratorStats,
    RequestError, RequestFailure, SubmitJobRequest,
};
use skywatch_logging::{sky_debug, sky_info};
use url::Url;

use crate::stream::LogStream;
use crate::ClientConfig;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Backend operations the console depends on.
#[async_trait::async_trait]
pub trait BackendApi: Send + Sync {
    /// Fails with [`RequestFailure::DuplicateJob`] when a job of this type is already running.
    async fn submit_job(
        &self,
        job_type: JobType,
        params: BTreeMap<String, String>,
    ) -> Result<Job, RequestError>;

    async fn list_jobs(&self) -> Result<Vec<Job>, RequestError>;

    async fn get_job(&self, job_id: &str) -> Result<Job, RequestError>;

    async fn cancel_job(&self, job_id: &str) -> Result<CancelAck, RequestError>;

    async fn clear_all_jobs(&self) -> Result<ClearAck, RequestError>;

    async fn list_artifacts(&self, job_id: &str) -> Result<ArtifactListing, RequestError>;

    async fn orchestrator_stats(&self) -> Result<OrchestratorStats, RequestError>;

    async fn whoami(&self) -> Result<Identity, RequestError>;

    async fn reliability_calibration(
        &self,
        run_id: &str,
        model: Option<&str>,
        bins: Option<u32>,
    ) -> Result<Value, RequestError>;

    /// Opens the live log feed of a job.
    async fn open_log_stream(&self, job_id: &str) -> Result<LogStream, RequestError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApiClient {
    client: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

impl ReqwestApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, RequestError> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|err| RequestError::new(RequestFailure::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(RequestError::new(
                RequestFailure::InvalidUrl,
                format!("{} cannot be used as a base url", config.base_url),
            ));
        }
        base.set_query(None);
        base.set_fragment(None);

        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| RequestError::new(RequestFailure::Network, err.to_string()))?;

        Ok(Self {
            client,
            base,
            api_key: config.api_key.clone(),
        })
    }

    /// Base url extended with percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, RequestError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| RequestError::new(RequestFailure::InvalidUrl, "base url has no path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// WebSocket address of a job's log feed.
    pub fn log_stream_url(&self, job_id: &str) -> Result<Url, RequestError> {
        let mut url = self.endpoint(&["jobs", job_id, "logs"])?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(RequestError::new(
                    RequestFailure::InvalidUrl,
                    format!("no websocket scheme for {other}"),
                ))
            }
        };
        url.set_scheme(scheme).map_err(|()| {
            RequestError::new(RequestFailure::InvalidUrl, "cannot switch to a websocket scheme")
        })?;
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        sky_debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RequestError> {
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let response = check_status(response).await?;
        response.json::<T>().await.map_err(map_reqwest_error)
    }
}

#[async_trait::async_trait]
impl BackendApi for ReqwestApiClient {
    async fn submit_job(
        &self,
        job_type: JobType,
        params: BTreeMap<String, String>,
    ) -> Result<Job, RequestError> {
        let url = self.endpoint(&["jobs"])?;
        let body = SubmitJobRequest { job_type, params };
        let result: Result<Job, RequestError> =
            self.send_json(self.request(Method::POST, url).json(&body)).await;
        if let Err(err) = &result {
            if let Some(existing) = err.duplicate_job_id() {
                sky_info!("{} already has job {} in flight", job_type, existing);
            }
        }
        result
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RequestError> {
        let url = self.endpoint(&["jobs"])?;
        let list: JobList = self.send_json(self.request(Method::GET, url)).await?;
        Ok(list.jobs)
    }

    async fn get_job(&self, job_id: &str) -> Result<Job, RequestError> {
        let url = self.endpoint(&["jobs", job_id])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn cancel_job(&self, job_id: &str) -> Result<CancelAck, RequestError> {
        let url = self.endpoint(&["jobs", job_id, "cancel"])?;
        self.send_json(self.request(Method::POST, url)).await
    }

    async fn clear_all_jobs(&self) -> Result<ClearAck, RequestError> {
        let url = self.endpoint(&["jobs", "clear"])?;
        self.send_json(self.request(Method::DELETE, url)).await
    }

    async fn list_artifacts(&self, job_id: &str) -> Result<ArtifactListing, RequestError> {
        let url = self.endpoint(&["jobs", job_id, "artifacts"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn orchestrator_stats(&self) -> Result<OrchestratorStats, RequestError> {
        let url = self.endpoint(&["orchestrator", "stats"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn whoami(&self) -> Result<Identity, RequestError> {
        let url = self.endpoint(&["auth", "whoami"])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn reliability_calibration(
        &self,
        run_id: &str,
        model: Option<&str>,
        bins: Option<u32>,
    ) -> Result<Value, RequestError> {
        let mut url = self.endpoint(&["reliability", "run", run_id, "calibration"])?;
        if model.is_some() || bins.is_some() {
            let mut pairs = url.query_pairs_mut();
            if let Some(model) = model {
                pairs.append_pair("model", model);
            }
            if let Some(bins) = bins {
                pairs.append_pair("bins", &bins.to_string());
            }
        }
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn open_log_stream(&self, job_id: &str) -> Result<LogStream, RequestError> {
        let url = self.log_stream_url(job_id)?;
        LogStream::connect(job_id, url, self.api_key.as_deref()).await
    }
}

async fn check_status(response: Response) -> Result<Response, RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::CONFLICT {
        if let Some(job_id) = conflicting_job_id(&body) {
            return Err(RequestError::duplicate_job(job_id));
        }
    }
    Err(RequestError::new(
        RequestFailure::HttpStatus(status.as_u16()),
        error_message(status, &body),
    ))
}

/// Reads the running job's id out of a 409 body.
fn conflicting_job_id(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/detail/job_id")
        .or_else(|| value.get("job_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let detail = value
            .get("detail")
            .and_then(|detail| detail.as_str().or_else(|| detail.get("message")?.as_str()));
        if let Some(detail) = detail {
            return detail.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RequestError {
    if err.is_timeout() {
        return RequestError::new(RequestFailure::Timeout, err.to_string());
    }
    if err.is_decode() {
        return RequestError::new(RequestFailure::Decode, err.to_string());
    }
    if err.is_builder() {
        return RequestError::new(RequestFailure::InvalidUrl, err.to_string());
    }
    RequestError::new(RequestFailure::Network, err.to_string())
}
