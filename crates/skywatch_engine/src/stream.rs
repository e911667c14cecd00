use std::future;
use std::sync::Arc;

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use skywatch_core::{JobId, Msg, RequestError, RequestFailure};
use skywatch_logging::{sky_debug, sky_info, sky_warn};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::{BackendApi, API_KEY_HEADER};

/// Text lines of one job's live log feed.
///
/// Ends when the server closes the connection or the transport fails.
pub struct LogStream {
    job_id: JobId,
    lines: BoxStream<'static, String>,
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream").field("job_id", &self.job_id).finish_non_exhaustive()
    }
}

impl LogStream {
    pub fn from_lines<I>(job_id: impl Into<JobId>, lines: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::from_stream(job_id, stream::iter(lines))
    }

    pub fn from_stream<S>(job_id: impl Into<JobId>, lines: S) -> Self
    where
        S: Stream<Item = String> + Send + 'static,
    {
        Self {
            job_id: job_id.into(),
            lines: lines.boxed(),
        }
    }

    pub(crate) async fn connect(
        job_id: &str,
        url: Url,
        api_key: Option<&str>,
    ) -> Result<Self, RequestError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(map_ws_error)?;
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|err| RequestError::new(RequestFailure::InvalidUrl, err.to_string()))?;
            request.headers_mut().insert(API_KEY_HEADER, value);
        }

        sky_debug!("connecting log stream {}", url);
        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(map_ws_error)?;

        let owner = job_id.to_string();
        let lines = socket
            .take_while(move |message| {
                let keep = match message {
                    Ok(Message::Close(_)) => false,
                    Ok(_) => true,
                    Err(err) => {
                        sky_warn!("log stream for job {} dropped: {}", owner, err);
                        false
                    }
                };
                future::ready(keep)
            })
            .filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(split_lines(text.as_str())),
                    _ => None,
                })
            })
            .flat_map(stream::iter);

        Ok(Self::from_stream(job_id, lines))
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.next().await
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

fn map_ws_error(err: tungstenite::Error) -> RequestError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status().as_u16();
            RequestError::new(
                RequestFailure::HttpStatus(status),
                format!("log stream handshake rejected with {status}"),
            )
        }
        tungstenite::Error::Url(err) => RequestError::new(RequestFailure::InvalidUrl, err.to_string()),
        other => RequestError::new(RequestFailure::Network, other.to_string()),
    }
}

struct Attachment {
    job_id: JobId,
    generation: u64,
    cancel: CancellationToken,
}

/// Keeps at most one log connection open and feeds its lines back as messages.
///
/// Every message carries the generation it was attached with so the state
/// machine can drop output from connections it has already replaced.
pub struct LogStreamConsumer {
    api: Arc<dyn BackendApi>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    current: Option<Attachment>,
}

impl LogStreamConsumer {
    pub fn new(api: Arc<dyn BackendApi>, msg_tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self {
            api,
            msg_tx,
            current: None,
        }
    }

    /// Closes any previous connection, then connects to `job_id`.
    pub fn attach(&mut self, job_id: JobId, generation: u64) {
        self.release();
        sky_info!("attaching log stream to job {} (generation {})", job_id, generation);

        let cancel = CancellationToken::new();
        tokio::spawn(pump(
            Arc::clone(&self.api),
            job_id.clone(),
            generation,
            cancel.clone(),
            self.msg_tx.clone(),
        ));
        self.current = Some(Attachment {
            job_id,
            generation,
            cancel,
        });
    }

    /// Closes the connection if it still belongs to `generation`.
    pub fn detach(&mut self, generation: u64) {
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.generation == generation)
        {
            self.release();
        }
    }

    pub fn attached_job(&self) -> Option<&str> {
        self.current.as_ref().map(|current| current.job_id.as_str())
    }

    pub fn release(&mut self) {
        if let Some(previous) = self.current.take() {
            sky_debug!(
                "closing log stream of job {} (generation {})",
                previous.job_id,
                previous.generation
            );
            previous.cancel.cancel();
        }
    }
}

impl Drop for LogStreamConsumer {
    fn drop(&mut self) {
        self.release();
    }
}

async fn pump(
    api: Arc<dyn BackendApi>,
    job_id: JobId,
    generation: u64,
    cancel: CancellationToken,
    msg_tx: mpsc::UnboundedSender<Msg>,
) {
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = api.open_log_stream(&job_id) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(err) => {
            sky_warn!("log stream for job {} failed to open: {}", job_id, err);
            let _ = msg_tx.send(Msg::StreamClosed { generation });
            return;
        }
    };
    if msg_tx.send(Msg::StreamOpened { generation }).is_err() {
        return;
    }

    let mut forwarded: u64 = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                sky_debug!("log stream for job {} released after {} lines", job_id, forwarded);
                return;
            }
            next = stream.next_line() => match next {
                Some(text) => {
                    forwarded += 1;
                    if msg_tx.send(Msg::StreamLine { generation, text }).is_err() {
                        return;
                    }
                }
                None => {
                    sky_info!("log stream for job {} ended after {} lines", job_id, forwarded);
                    let _ = msg_tx.send(Msg::StreamClosed { generation });
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::split_lines;

    #[test]
    fn frames_split_into_lines() {
        assert_eq!(split_lines("a\nb\r\nc"), vec!["a", "b", "c"]);
        assert!(split_lines("").is_empty());
    }
}
