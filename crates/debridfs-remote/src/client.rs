//! reqwest-backed Real-Debrid client.
//!
//! # Design
//! - One HTTP exchange per trait call; retries live in [`crate::retry`].
//! - Non-2xx responses are turned into [`ApiProblem`]s by a single error handler.
//! - URLs are built as `base + path` so the `/rest/1.0` prefix of the base survives.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderValue, RANGE};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{ApiProblem, RemoteError, RemoteResult};
use crate::model::{
    AddedTorrent, ByteRange, ContentStream, DownloadRecord, Page, TorrentInfo, TorrentRecord,
    UnrestrictedLink,
};
use crate::service::DebridApi;

/// Production REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.real-debrid.com/rest/1.0";
const TOTAL_COUNT_HEADER: &str = "x-total-count";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`RealDebridClient`].
#[derive(Clone)]
pub struct RemoteConfig {
    /// Base URL every API path is appended to.
    pub base_url: Url,
    /// Private API token sent as `auth_token`.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent reported to the service.
    pub user_agent: String,
}

impl RemoteConfig {
    /// Settings targeting the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] if the built-in endpoint cannot be parsed.
    pub fn new(api_key: impl Into<String>) -> RemoteResult<Self> {
        let base_url = parse_base_url(DEFAULT_API_URL)?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("debridfs/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Point the client at another endpoint (tests, proxies).
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] when `raw` is not an absolute URL.
    pub fn with_base_url(mut self, raw: &str) -> RemoteResult<Self> {
        self.base_url = parse_base_url(raw)?;
        Ok(self)
    }

    /// Override the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn parse_base_url(raw: &str) -> RemoteResult<Url> {
    Url::parse(raw).map_err(|source| RemoteError::InvalidUrl {
        value: raw.to_string(),
        source,
    })
}

/// Description of one API exchange.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    operation: &'static str,
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    form: Vec<(&'static str, String)>,
}

impl ApiRequest {
    fn new(operation: &'static str, method: Method, path: impl Into<String>) -> Self {
        Self {
            operation,
            method,
            path: path.into(),
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    /// `GET` request.
    #[must_use]
    pub fn get(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(operation, Method::GET, path)
    }

    /// `POST` request.
    #[must_use]
    pub fn post(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(operation, Method::POST, path)
    }

    /// `DELETE` request.
    #[must_use]
    pub fn delete(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(operation, Method::DELETE, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    /// Append a multipart form field.
    #[must_use]
    pub fn form(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.form.push((key, value.into()));
        self
    }

    /// Operation identifier used in logs and errors.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }
}

/// Real-Debrid REST client.
#[derive(Debug, Clone)]
pub struct RealDebridClient {
    http: Client,
    config: RemoteConfig,
}

impl RealDebridClient {
    /// Build a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] if the HTTP client cannot be constructed.
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| RemoteError::Transport {
                operation: "client.build",
                source,
            })?;
        Ok(Self { http, config })
    }

    /// Settings this client was built with.
    #[must_use]
    pub const fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            path
        )
    }

    async fn send(&self, request: &ApiRequest) -> RemoteResult<Response> {
        debug!(
            operation = request.operation,
            method = %request.method,
            path = %request.path,
            "calling remote"
        );
        let mut builder = self
            .http
            .request(request.method.clone(), self.endpoint(&request.path))
            .query(&[("auth_token", self.config.api_key.as_str())]);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.form.is_empty() {
            let form = request
                .form
                .iter()
                .fold(Form::new(), |form, (key, value)| form.text(*key, value.clone()));
            builder = builder.multipart(form);
        }
        let response = builder
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                operation: request.operation,
                source,
            })?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(request.operation, response).await)
        }
    }

    async fn read_body(operation: &'static str, response: Response) -> RemoteResult<Vec<u8>> {
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|source| RemoteError::Transport { operation, source })
    }

    /// Execute a request and decode its JSON body.
    ///
    /// # Errors
    ///
    /// Returns transport, status, or decode errors.
    pub async fn call_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> RemoteResult<T> {
        let response = self.send(request).await?;
        let body = Self::read_body(request.operation, response).await?;
        serde_json::from_slice(&body).map_err(|source| RemoteError::Decode {
            operation: request.operation,
            source,
        })
    }

    /// Execute a paginated listing request.
    ///
    /// A `204` or empty body is an empty page.
    ///
    /// # Errors
    ///
    /// Returns transport, status, or decode errors.
    pub async fn call_page<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> RemoteResult<Page<T>> {
        let response = self.send(request).await?;
        let total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<usize>().ok());
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Page {
                items: Vec::new(),
                total: total.or(Some(0)),
            });
        }
        let body = Self::read_body(request.operation, response).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Page {
                items: Vec::new(),
                total: total.or(Some(0)),
            });
        }
        let items = serde_json::from_slice(&body).map_err(|source| RemoteError::Decode {
            operation: request.operation,
            source,
        })?;
        Ok(Page { items, total })
    }

    /// Execute a request whose body is ignored.
    ///
    /// # Errors
    ///
    /// Returns transport or status errors.
    pub async fn call_no_content(&self, request: &ApiRequest) -> RemoteResult<()> {
        self.send(request).await.map(drop)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

/// Turn a non-2xx response into a structured error.
pub(crate) async fn error_from_response(operation: &'static str, response: Response) -> RemoteError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();
    let parsed = serde_json::from_slice::<ErrorBody>(&bytes).ok();

    let message = parsed
        .as_ref()
        .and_then(|body| body.error.clone().or_else(|| body.message.clone()))
        .unwrap_or_else(|| {
            if body_text.is_empty() {
                format!("request failed with status {status}")
            } else {
                body_text
            }
        });
    let error_code = parsed.and_then(|body| body.error_code);
    debug!(operation, status = status.as_u16(), ?error_code, %message, "remote rejected request");

    RemoteError::status_error(
        operation,
        ApiProblem {
            message,
            status: status.as_u16(),
        },
    )
}

#[async_trait]
impl DebridApi for RealDebridClient {
    async fn downloads_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> RemoteResult<Page<DownloadRecord>> {
        let request = ApiRequest::get("downloads.list", "/downloads")
            .query("offset", offset)
            .query("limit", limit)
            .query("includebreadcrumbs", false);
        self.call_page(&request).await
    }

    async fn torrents_page(&self, offset: usize, limit: usize) -> RemoteResult<Page<TorrentRecord>> {
        let request = ApiRequest::get("torrents.list", "/torrents")
            .query("offset", offset)
            .query("limit", limit)
            .query("includebreadcrumbs", false);
        self.call_page(&request).await
    }

    async fn torrent_info(&self, id: &str) -> RemoteResult<TorrentInfo> {
        let request = ApiRequest::get("torrents.info", format!("/torrents/info/{id}"));
        self.call_json(&request).await
    }

    async fn unrestrict_link(&self, link: &str) -> RemoteResult<UnrestrictedLink> {
        let request = ApiRequest::post("unrestrict.link", "/unrestrict/link").form("link", link);
        self.call_json(&request).await
    }

    async fn delete_download(&self, id: &str) -> RemoteResult<()> {
        let request = ApiRequest::delete("downloads.delete", format!("/downloads/delete/{id}"));
        self.call_no_content(&request).await
    }

    async fn add_magnet(&self, magnet: &str) -> RemoteResult<AddedTorrent> {
        let request = ApiRequest::post("torrents.add_magnet", "/torrents/addMagnet")
            .form("magnet", magnet);
        self.call_json(&request).await
    }

    async fn select_files(&self, id: &str, file_ids: &[u64]) -> RemoteResult<()> {
        let files = file_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let request =
            ApiRequest::post("torrents.select_files", format!("/torrents/selectFiles/{id}"))
                .form("files", files);
        self.call_no_content(&request).await
    }

    async fn delete_torrent(&self, id: &str) -> RemoteResult<()> {
        let request = ApiRequest::delete("torrents.delete", format!("/torrents/delete/{id}"));
        self.call_no_content(&request).await
    }

    async fn open_link(&self, url: &str, range: Option<ByteRange>) -> RemoteResult<ContentStream> {
        const OPERATION: &str = "link.open";
        let target = Url::parse(url).map_err(|source| RemoteError::InvalidUrl {
            value: url.to_string(),
            source,
        })?;
        let mut builder = self.http.get(target);
        if let Some(range) = range {
            let value = HeaderValue::from_str(&range.header_value())
                .map_err(|_| RemoteError::InvalidHeader { name: "range" })?;
            builder = builder.header(RANGE, value);
        }
        let response = builder
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                operation: OPERATION,
                source,
            })?;
        if !response.status().is_success() {
            return Err(error_from_response(OPERATION, response).await);
        }
        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|source| RemoteError::Transport {
                    operation: OPERATION,
                    source,
                })
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TorrentStatus;
    use anyhow::Result;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> Result<RealDebridClient> {
        let config = RemoteConfig::new("TOKEN")?.with_base_url(&server.url("/rest/1.0"))?;
        Ok(RealDebridClient::new(config)?)
    }

    #[tokio::test]
    async fn torrents_page_reads_total_count() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/1.0/torrents")
                .query_param("auth_token", "TOKEN")
                .query_param("offset", "0")
                .query_param("limit", "1");
            then.status(200).header("X-Total-Count", "7").json_body(json!([
                {
                    "id": "T1",
                    "filename": "Movie.2019.1080p",
                    "hash": "abc",
                    "bytes": 100,
                    "status": "downloaded",
                    "links": ["https://real-debrid.com/d/L1"]
                }
            ]));
        });

        let page = client_for(&server)?.torrents_page(0, 1).await?;
        mock.assert();
        assert_eq!(page.total, Some(7));
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].status, TorrentStatus::Downloaded);
        Ok(())
    }

    #[tokio::test]
    async fn empty_listing_is_an_empty_page() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/rest/1.0/downloads");
            then.status(204);
        });

        let page = client_for(&server)?.downloads_page(0, 2500).await?;
        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn error_body_becomes_problem() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/rest/1.0/unrestrict/link");
            then.status(503)
                .json_body(json!({"error": "hoster_unavailable", "error_code": 19}));
        });

        let err = client_for(&server)?
            .unrestrict_link("https://real-debrid.com/d/L1")
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert!(err.is_broken_link());
        match err {
            RemoteError::Status { operation, problem } => {
                assert_eq!(operation, "unrestrict.link");
                assert_eq!(problem.message, "hoster_unavailable");
                assert_eq!(problem.status, 503);
            }
            other => anyhow::bail!("unexpected error {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn select_files_posts_to_job() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/1.0/torrents/selectFiles/NEW")
                .query_param("auth_token", "TOKEN");
            then.status(204);
        });

        client_for(&server)?.select_files("NEW", &[1, 3]).await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn open_link_sends_range() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/dl/a.mkv").header("range", "bytes=2-");
            then.status(206).body("llo");
        });

        let client = client_for(&server)?;
        let mut stream = client
            .open_link(&server.url("/dl/a.mkv"), Some(ByteRange { start: 2, end: None }))
            .await?;
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend(chunk?);
        }
        mock.assert();
        assert_eq!(body, b"llo");
        Ok(())
    }

    #[test]
    fn config_debug_redacts_key() -> Result<()> {
        let config = RemoteConfig::new("SECRET")?;
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("SECRET"));
        assert!(rendered.contains("api.real-debrid.com"));
        Ok(())
    }
}
