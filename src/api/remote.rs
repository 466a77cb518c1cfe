//! Purpose: Open the service's SSE endpoints over HTTP and run sessions against them.
//! Exports: `StreamClient`, `StreamEndpoint`, `StreamFilter`, `StreamBody`.
//! Role: Blocking transport for the session driver; one request per session, never retried.
//! Invariants: Requests send `Accept: text/event-stream` and a bearer token when configured.
//! Invariants: Non-2xx statuses and transport failures surface as `ErrorKind::Connection`.
//! Invariants: The per-request timeout equals the session deadline so stalled reads return.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::session::{SessionLimits, SessionOutcome, run_session};
use crate::core::validate::PayloadKind;
use serde::Deserialize;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

type ApiResult<T> = Result<T, Error>;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7777";
const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamEndpoint {
    Status,
    Fetch,
}

impl StreamEndpoint {
    pub fn segments(self) -> &'static [&'static str] {
        match self {
            StreamEndpoint::Status => &["v1", "status", "sse"],
            StreamEndpoint::Fetch => &["v1", "fetch", "sse"],
        }
    }

    /// The endpoint decides the payload contract, not the event name.
    pub fn payload_kind(self) -> PayloadKind {
        match self {
            StreamEndpoint::Status => PayloadKind::RepoStatus,
            StreamEndpoint::Fetch => PayloadKind::FetchResult,
        }
    }

    pub fn label(self) -> &'static str {
        self.payload_kind().label()
    }
}

/// Repository selection forwarded to both stream endpoints.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StreamFilter {
    pub path: Option<String>,
    pub account: Option<String>,
    pub dirty: bool,
}

#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<StreamClientInner>,
}

struct StreamClientInner {
    base_url: Url,
    token: Option<String>,
    filter: StreamFilter,
    agent: ureq::Agent,
}

/// An open event-stream response. Dropping it releases the connection.
pub struct StreamBody {
    reader: Box<dyn Read + Send + Sync>,
    status: u16,
    content_type: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
}

impl StreamClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(StreamClientInner {
                base_url,
                token: None,
                filter: StreamFilter::default(),
                agent,
            }),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.token = Some(token);
        } else {
            self.inner = Arc::new(StreamClientInner {
                base_url: self.inner.base_url.clone(),
                token: Some(token),
                filter: self.inner.filter.clone(),
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    pub fn with_filter(mut self, filter: StreamFilter) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.filter = filter;
        } else {
            self.inner = Arc::new(StreamClientInner {
                base_url: self.inner.base_url.clone(),
                token: self.inner.token.clone(),
                filter,
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn endpoint_url(&self, endpoint: StreamEndpoint) -> ApiResult<Url> {
        let mut url = build_url(&self.inner.base_url, endpoint.segments())?;
        let filter = &self.inner.filter;
        if filter.path.is_some() || filter.account.is_some() || filter.dirty {
            let mut pairs = url.query_pairs_mut();
            if let Some(path) = &filter.path {
                pairs.append_pair("path", path);
            }
            if let Some(account) = &filter.account {
                pairs.append_pair("account", account);
            }
            if filter.dirty {
                pairs.append_pair("dirty", "true");
            }
        }
        Ok(url)
    }

    /// Single connection attempt; `timeout` bounds connect plus every body read.
    pub fn open(&self, endpoint: StreamEndpoint, timeout: Duration) -> ApiResult<StreamBody> {
        let url = self.endpoint_url(endpoint)?;
        debug!(stream = endpoint.label(), url = %url, "opening event stream");

        let mut request = self
            .inner
            .agent
            .get(url.as_str())
            .set("Accept", EVENT_STREAM_CONTENT_TYPE)
            .timeout(timeout);
        if let Some(token) = &self.inner.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        match request.call() {
            Ok(response) => {
                let status = response.status();
                let content_type = response.content_type().to_string();
                if content_type != EVENT_STREAM_CONTENT_TYPE {
                    debug!(
                        stream = endpoint.label(),
                        content_type = %content_type,
                        "stream response is not text/event-stream"
                    );
                }
                Ok(StreamBody {
                    reader: response.into_reader(),
                    status,
                    content_type,
                })
            }
            Err(ureq::Error::Status(code, response)) => {
                Err(parse_error_response(code, response).with_url(url.as_str()))
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Connection)
                .with_message("stream request failed")
                .with_url(url.as_str())
                .with_source(err)),
        }
    }

    pub fn run_session(&self, endpoint: StreamEndpoint, limits: SessionLimits) -> SessionOutcome {
        run_session(endpoint.payload_kind(), limits, || {
            self.open(endpoint, limits.deadline)
        })
    }
}

impl StreamBody {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

impl Read for StreamBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid base url")
            .with_hint("Use a URL like http://127.0.0.1:7777.")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("base url must use http or https scheme")
        );
    }
    if url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Usage).with_message("base url cannot be a base"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("base url must not include a query or fragment"));
    }
    Ok(url)
}

/// Appends `segments` to the base path, keeping any prefix the base already has.
fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("base url cannot be a base"))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    let mut err = Error::new(ErrorKind::Connection).with_status(status);
    let detail = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => envelope.error,
        Err(_) => body.trim().chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
    };
    err = if detail.is_empty() {
        err.with_message(format!("HTTP {status}"))
    } else {
        err.with_message(format!("HTTP {status}: {detail}"))
    };
    if status == 401 || status == 403 {
        err = err.with_hint("Set DS_TOKEN (or --token) to the service's bearer token.");
    }
    err
}
