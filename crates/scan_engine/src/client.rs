use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use scan_core::{
    FailureKind, HistoryEntry, HistoryFilter, JobId, JobKind, RemoteError, StatusReply,
    SubmitReply, SubmitRequest,
};
use scan_logging::{scan_debug, scan_warn};

use crate::types::{SubmitBody, WireHistoryEntry, WireStatus, WireSubmitReply};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Root of the scan API, e.g. `https://scanner.example.com/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Remote job executor: runs scans and answers status/abort requests.
#[async_trait::async_trait]
pub trait ScanExecutor: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReply, RemoteError>;

    async fn status(&self, job_id: &JobId, kind: JobKind) -> Result<StatusReply, RemoteError>;

    async fn cancel(&self, job_id: &JobId) -> Result<(), RemoteError>;
}

/// Authoritative record of past and in-flight jobs.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    async fn history(
        &self,
        filter: HistoryFilter,
        kind: Option<JobKind>,
    ) -> Result<Vec<HistoryEntry>, RemoteError>;
}

/// JSON-over-HTTP client for both remote services.
#[derive(Debug, Clone)]
pub struct HttpScanClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpScanClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, RemoteError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|err| RemoteError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be a base url", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RemoteError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { base_url, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::new(FailureKind::InvalidUrl, "base url has no path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<String, RemoteError> {
        scan_debug!("{} {}", method, url);
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_status_error(status));
        }
        response.text().await.map_err(map_reqwest_error)
    }
}

#[async_trait::async_trait]
impl ScanExecutor for HttpScanClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitReply, RemoteError> {
        let url = self.endpoint(&["scans"])?;
        let body = serde_json::to_vec(&SubmitBody::from(request))
            .map_err(|err| RemoteError::new(FailureKind::Decode, err.to_string()))?;
        let text = self.send(Method::POST, url, Some(body)).await?;
        let wire: WireSubmitReply = decode_json(&text, "{}")?;
        Ok(wire.into_reply(request.kind))
    }

    async fn status(&self, job_id: &JobId, kind: JobKind) -> Result<StatusReply, RemoteError> {
        let url = self.endpoint(&["scans", job_id.as_str()])?;
        let text = self.send(Method::GET, url, None).await?;
        let wire: WireStatus = decode_json(&text, "{}")?;
        Ok(wire.into_reply(kind))
    }

    async fn cancel(&self, job_id: &JobId) -> Result<(), RemoteError> {
        let url = self.endpoint(&["scans", job_id.as_str()])?;
        // Only the status code matters; the body is ignored.
        self.send(Method::DELETE, url, None).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl HistoryStore for HttpScanClient {
    async fn history(
        &self,
        filter: HistoryFilter,
        kind: Option<JobKind>,
    ) -> Result<Vec<HistoryEntry>, RemoteError> {
        let mut url = self.endpoint(&["scans", "history"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(
                "status",
                match filter {
                    HistoryFilter::InProgress => "in_progress",
                    HistoryFilter::Complete => "complete",
                },
            );
            if let Some(kind) = kind {
                query.append_pair("kind", kind.as_str());
            }
        }
        let text = self.send(Method::GET, url, None).await?;
        let raw: Vec<serde_json::Value> = decode_json(&text, "[]")?;

        // One bad row must not hide the rest of the history.
        let entries = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<WireHistoryEntry>(value) {
                Ok(wire) => wire.into_entry(),
                Err(err) => {
                    scan_warn!("Skipping malformed history entry: {}", err);
                    None
                }
            })
            .collect();
        Ok(entries)
    }
}

/// Decodes a JSON body; an empty body reads as `empty` instead.
fn decode_json<T: serde::de::DeserializeOwned>(text: &str, empty: &str) -> Result<T, RemoteError> {
    let text = if text.trim().is_empty() { empty } else { text };
    serde_json::from_str(text).map_err(|err| RemoteError::new(FailureKind::Decode, err.to_string()))
}

fn http_status_error(status: StatusCode) -> RemoteError {
    RemoteError::new(FailureKind::HttpStatus(status.as_u16()), status.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return RemoteError::new(FailureKind::Decode, err.to_string());
    }
    RemoteError::new(FailureKind::Network, err.to_string())
}
