use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};

use crate::error::EmbedError;

/// A single outbound HTTP exchange as built by a session initiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method name as supplied by the session (router sessions lower-case it).
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Facade over the HTTP client.
///
/// Implementations must reject non-2xx responses with [`EmbedError::Status`]
/// and network failures with [`EmbedError::Transport`].
pub trait HttpTransport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, EmbedError>> + Send + 'a>>;
}

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn build(&self, request: &HttpRequest) -> Result<reqwest::RequestBuilder, EmbedError> {
        // Verbs go on the wire in canonical upper case; anything that is not a
        // valid token fails here rather than at the server.
        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| {
                EmbedError::InvalidRequest(format!("invalid HTTP method: {:?}", request.method))
            })?;

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                EmbedError::InvalidRequest(format!("invalid header name {name:?}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                EmbedError::InvalidRequest(format!("invalid value for header {name}: {e}"))
            })?;
            builder = builder.header(name, value);
        }

        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)?;
            if request.header_value("content-type").is_none() {
                builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
            }
            builder = builder.body(bytes);
        }

        Ok(builder)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, EmbedError>> + Send + 'a>> {
        Box::pin(async move {
            let builder = self.build(request)?;

            tracing::debug!(method = %request.method, url = %request.url, "Sending request");

            let resp = builder
                .send()
                .await
                .map_err(|e| EmbedError::Transport(e.to_string()))?;

            let status = resp.status();
            let body = resp.text().await.map_err(|e| {
                EmbedError::Transport(format!("failed to read response body: {e}"))
            })?;

            if !status.is_success() {
                return Err(EmbedError::Status {
                    method: request.method.clone(),
                    url: request.url.clone(),
                    status: status.as_u16(),
                    body,
                });
            }

            Ok(HttpResponse {
                status: status.as_u16(),
                body,
            })
        })
    }
}

/// Scripted reply for [`StubTransport`].
#[derive(Debug, Clone)]
pub enum StubReply {
    Status { status: u16, body: String },
    NetworkError(String),
}

impl StubReply {
    pub fn ok_json(body: serde_json::Value) -> Self {
        StubReply::Status {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        StubReply::Status {
            status,
            body: body.into(),
        }
    }
}

/// Transport that records every request and answers from a script.
///
/// Once the script is exhausted every further request fails with a
/// transport error.
pub struct StubTransport {
    replies: Mutex<VecDeque<StubReply>>,
    requests: Mutex<Vec<HttpRequest>>,
    delivered: AtomicUsize,
    delay: Option<Duration>,
}

impl StubTransport {
    pub fn new(replies: Vec<StubReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            delivered: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Hold every reply back for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Number of replies handed back to a caller. A request whose future was
    /// dropped during the delay is counted by `call_count` but not here.
    pub fn delivered_count(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl HttpTransport for StubTransport {
    fn send<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, EmbedError>> + Send + 'a>> {
        Box::pin(async move {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            let reply = self.replies.lock().ok().and_then(|mut r| r.pop_front());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.delivered.fetch_add(1, Ordering::Relaxed);

            match reply {
                Some(StubReply::Status { status, body }) if (200..300).contains(&status) => {
                    Ok(HttpResponse { status, body })
                }
                Some(StubReply::Status { status, body }) => Err(EmbedError::Status {
                    method: request.method.clone(),
                    url: request.url.clone(),
                    status,
                    body,
                }),
                Some(StubReply::NetworkError(message)) => Err(EmbedError::Transport(message)),
                None => Err(EmbedError::Transport("no scripted reply left".into())),
            }
        })
    }
}
