//! The transport adapter every endpoint call goes through.
//!
//! [`HttpTransport`] joins a resolved request onto the configured base URL,
//! merges default headers, injects the bearer token and decodes the JSON
//! body. It never retries on its own; the one exception is a single replay
//! after its token source refreshed a rejected credential.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nexus_common::{Endpoint, HttpMethod, ParamLocation};
use reqwest::StatusCode;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenSource;
use crate::error::{Result, TransportError};

// =============================================================================
// Request descriptor
// =============================================================================

/// A fully described HTTP request with every path parameter substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: HttpMethod,
    /// Decoded path segments; encoding happens when joined onto the base URL.
    pub segments: Vec<String>,
    /// Query pairs in send order; a list parameter repeats its name.
    pub query: Vec<(String, String)>,
    /// Headers on top of the transport defaults.
    pub headers: Vec<(String, String)>,
    /// JSON body of a mutation.
    pub body: Option<Value>,
}

impl RequestDescriptor {
    /// Request for a literal path such as `/health`.
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            segments: split_path(path).map(str::to_string).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a query pair.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Resolve an endpoint invocation.
    ///
    /// `params` is an object keyed by parameter name (or `null` for none).
    /// Missing required parameters, undeclared parameters and a body on an
    /// endpoint that takes none are rejected before anything is sent.
    pub fn from_endpoint(endpoint: &Endpoint, params: &Value, body: Option<Value>) -> Result<Self> {
        let empty = serde_json::Map::new();
        let values = match params {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return Err(TransportError::InvalidRequest(format!(
                    "{}: parameters must be an object, got {other}",
                    endpoint.key
                )));
            }
        };

        if let Some(unknown) = values.keys().find(|name| endpoint.param(name).is_none()) {
            return Err(TransportError::InvalidRequest(format!(
                "{}: unknown parameter `{unknown}`",
                endpoint.key
            )));
        }
        if body.is_some() && !endpoint.has_body {
            return Err(TransportError::InvalidRequest(format!(
                "{}: endpoint takes no request body",
                endpoint.key
            )));
        }

        let mut request = Self {
            method: endpoint.method,
            segments: Vec::new(),
            query: Vec::new(),
            headers: Vec::new(),
            body,
        };

        for param in &endpoint.params {
            let value = values.get(&param.name).filter(|v| !v.is_null());
            let Some(value) = value else {
                if param.required {
                    return Err(TransportError::InvalidRequest(format!(
                        "{}: missing required {} parameter `{}`",
                        endpoint.key,
                        location_name(param.location),
                        param.name
                    )));
                }
                continue;
            };
            match param.location {
                ParamLocation::Path => {}
                ParamLocation::Query => match value {
                    Value::Array(items) => request.query.extend(
                        items
                            .iter()
                            .filter(|item| !item.is_null())
                            .map(|item| (param.name.clone(), scalar_string(item))),
                    ),
                    _ => request.query.push((param.name.clone(), scalar_string(value))),
                },
                ParamLocation::Header => request
                    .headers
                    .push((param.name.clone(), scalar_string(value))),
            }
        }

        for segment in split_path(&endpoint.path) {
            request
                .segments
                .push(substitute_segment(endpoint, segment, values)?);
        }
        Ok(request)
    }

    /// Path as sent, with placeholders substituted.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn location_name(location: ParamLocation) -> &'static str {
    match location {
        ParamLocation::Path => "path",
        ParamLocation::Query => "query",
        ParamLocation::Header => "header",
    }
}

/// Replace every `{name}` placeholder inside one path segment.
fn substitute_segment(
    endpoint: &Endpoint,
    segment: &str,
    values: &serde_json::Map<String, Value>,
) -> Result<String> {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &rest[open + 1..close];
        let value = values
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| {
                TransportError::InvalidRequest(format!(
                    "{}: missing required path parameter `{name}`",
                    endpoint.key
                ))
            })?;
        out.push_str(&scalar_string(value));
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Wire form of a parameter value.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Executes request descriptors.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a request and return its decoded JSON body (`null` when empty).
    ///
    /// A cancelled token aborts the call with [`TransportError::Cancelled`].
    async fn send(&self, request: RequestDescriptor, cancel: &CancellationToken) -> Result<Value>;
}

/// Static settings of an [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Every request path is joined onto this URL.
    pub base_url: Url,
    /// Headers sent with every request.
    pub default_headers: Vec<(String, String)>,
    /// Per-request timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl TransportConfig {
    /// Config for `base_url`, rejecting URLs that cannot carry a path.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|err| {
            TransportError::InvalidRequest(format!("invalid base URL `{base_url}`: {err}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidRequest(format!(
                "invalid base URL `{base_url}`: cannot carry a path"
            )));
        }
        Ok(Self {
            base_url,
            default_headers: Vec::new(),
            timeout: None,
        })
    }

    /// Add a default header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// [`Transport`] over `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    config: TransportConfig,
    tokens: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.config.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Transport authenticating through `tokens`.
    pub fn new(config: TransportConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|err| {
            warn!(error = %err, "Failed to build HTTP client.");
            TransportError::network(&err)
        })?;
        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    fn url_for(&self, request: &RequestDescriptor) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                TransportError::InvalidRequest("base URL cannot carry a path".to_string())
            })?
            .pop_if_empty()
            .extend(&request.segments);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    async fn execute(
        &self,
        request: &RequestDescriptor,
        url: Url,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let mut builder = self.http.request(reqwest_method(request.method), url);
        for (name, value) in self.config.default_headers.iter().chain(&request.headers) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransportError::Cancelled),
            response = builder.send() => response.map_err(|err| {
                debug!(error = %err, "Request failed.");
                TransportError::network(&err)
            }),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: RequestDescriptor, cancel: &CancellationToken) -> Result<Value> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let url = self.url_for(&request)?;
        debug!(method = %request.method, %url, "Sending request.");

        let token = self.tokens.token().await?;
        let mut response = self
            .execute(&request, url.clone(), token.as_deref(), cancel)
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && let Some(fresh) = self.tokens.refresh(token.as_deref()).await?
        {
            debug!(method = %request.method, %url, "Retrying with refreshed token.");
            response = self.execute(&request, url, Some(&fresh), cancel).await?;
        }

        let status = response.status();
        let result = decode(response, cancel).await;
        debug!(status = status.as_u16(), ok = result.is_ok(), "Received response.");
        result
    }
}

async fn decode(response: reqwest::Response, cancel: &CancellationToken) -> Result<Value> {
    let status = response.status();
    let bytes = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(TransportError::Cancelled),
        bytes = response.bytes() => bytes.map_err(|err| TransportError::network(&err))?,
    };

    if !status.is_success() {
        return Err(TransportError::HttpStatus {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|err| TransportError::Decode(err.to_string()))
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}
