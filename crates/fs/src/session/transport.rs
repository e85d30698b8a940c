// HTTP transport seam for the session client.
//
// The session client only ever POSTs JSON and reads back status, body and
// `Set-Cookie` values, so the seam is that narrow. `ReqwestTransport` is the
// production implementation; tests plug in scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// One outgoing POST.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Absolute path on the remote host, e.g. `/0/ServiceModel/...`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequest {
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        Self { path: path.into(), headers: Vec::new(), body }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw answer to an `HttpRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Set-Cookie` header values in the order received.
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, set_cookies: Vec::new(), body: body.into() }
    }

    pub fn with_cookie(mut self, set_cookie: impl Into<String>) -> Self {
        self.set_cookies.push(set_cookie.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connect refused, reset, timed out. Worth another attempt.
    #[error("transient transport failure: {0}")]
    Transient(String),
    /// The request could not be built or sent at all.
    #[error("transport failure: {0}")]
    Fatal(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Abstraction over the HTTP stack for testability.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

// ── reqwest ────────────────────────────────────────────────────────

/// Production transport on `reqwest` with rustls.
///
/// Cookies are managed by the session client, not by reqwest's cookie
/// store, so a failed login can never disturb the live session.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base: Url,
    client: reqwest::Client,
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

impl ReqwestTransport {
    pub fn new(base: Url) -> Result<Self, TransportError> {
        Self::with_timeout(base, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base: Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let base = self.base.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}"))
            .map_err(|e| TransportError::Fatal(format!("invalid request URL for `{path}`: {e}")))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.endpoint(&request.path)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Fatal(format!("invalid header name `{name}`: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Fatal(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&request.body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = response.text().await.map_err(classify)?;

        Ok(HttpResponse { status, set_cookies, body })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_connect() || error.is_timeout() || error.is_request() || error.is_body() {
        TransportError::Transient(error.to_string())
    } else {
        TransportError::Fatal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_lookup_ignores_case() {
        let request = HttpRequest::new("/x", json!({})).with_header("BPMCSRF", "token");
        assert_eq!(request.header("bpmcsrf"), Some("token"));
        assert_eq!(request.header("cookie"), None);
    }

    #[test]
    fn endpoint_appends_absolute_path_to_base() {
        let transport =
            ReqwestTransport::new(Url::parse("https://crm.example.com/").unwrap()).unwrap();
        let url = transport.endpoint("/0/ServiceModel/WorkspaceExplorerService.svc/GetPackages");
        assert_eq!(
            url.unwrap().as_str(),
            "https://crm.example.com/0/ServiceModel/WorkspaceExplorerService.svc/GetPackages"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let transport =
            ReqwestTransport::new(Url::parse("http://localhost:8080/creatio").unwrap()).unwrap();
        let url = transport.endpoint("/ServiceModel/AuthService.svc/Login").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/creatio/ServiceModel/AuthService.svc/Login");
    }

    #[test]
    fn response_status_helpers() {
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
        assert!(HttpResponse::new(401, "").is_unauthorized());
    }

    #[tokio::test]
    async fn unreachable_host_is_transient() {
        // Port 9 (discard) is closed on test hosts.
        let transport = ReqwestTransport::with_timeout(
            Url::parse("http://127.0.0.1:9").unwrap(),
            Duration::from_millis(500),
        )
        .unwrap();
        let error = transport
            .post(HttpRequest::new("/ServiceModel/AuthService.svc/Login", json!({})))
            .await
            .expect_err("connect should fail");
        assert!(error.is_transient(), "{error}");
    }
}
