// Session client: one authenticated HTTP session to one remote endpoint.
//
// Handles login, cookie and anti-forgery token bookkeeping, transient retry,
// and a single transparent re-login when the server answers unauthorized.
//
// Transport is abstracted via `HttpTransport` for testability.

pub mod transport;

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use creatio_fs_common::protocol::{
    BuildResponse, ChangesResponse, GenerateChangesRequest, GetSchemaRequest, LoginRequest,
    LoginResponse, Operation, PackageChange, PackagesResponse, ResponseEnvelope, SchemaResponse,
    WorkspaceItemsResponse, CSRF_COOKIE, CSRF_HEADER, LOGIN_PATH,
};
use creatio_fs_common::types::{PackageMetaInfo, Schema, SchemaType, WorkspaceItem};

use crate::error::{FsError, FsResult};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

/// Raw bodies longer than this are cut before being logged.
const MAX_LOGGED_BODY: usize = 2048;

// ── Configuration ───────────────────────────────────────────────────

/// Where and as whom to connect. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    url: Url,
    login: String,
    password: String,
}

impl ConnectionInfo {
    pub fn new(
        url: &str,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> FsResult<Self> {
        let url = validate_url(url)?;
        Ok(Self { url, login: login.into(), password: password.into() })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        // `validate_url` guarantees a host.
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    pub fn login(&self) -> &str {
        &self.login
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("url", &self.url.as_str())
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

fn validate_url(raw: &str) -> FsResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| FsError::Config(format!("invalid platform URL `{raw}`: {e}")))?;
    match url.scheme() {
        "https" | "http" => {}
        other => {
            return Err(FsError::Config(format!(
                "platform URL must use http or https, got `{other}`"
            )))
        }
    }
    if !matches!(url.host_str(), Some(host) if !host.is_empty()) {
        return Err(FsError::Config(format!("platform URL `{raw}` has no host")));
    }
    Ok(url)
}

/// Retry parameters for transient transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1).
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts: attempts.max(1), delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

// ── Session state ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Authenticated cookie set plus its anti-forgery token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    cookies: Vec<Cookie>,
    csrf_token: String,
    authenticated: bool,
}

impl Session {
    /// Build a session from raw `Set-Cookie` values. The anti-forgery cookie
    /// must be among them.
    pub fn from_set_cookies(set_cookies: &[String]) -> FsResult<Self> {
        let mut cookies: Vec<Cookie> = Vec::new();
        for raw in set_cookies {
            let pair = raw.split(';').next().unwrap_or_default().trim();
            let Some((name, value)) = pair.split_once('=') else { continue };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let cookie = Cookie { name: name.to_string(), value: value.trim().to_string() };
            match cookies.iter_mut().find(|existing| existing.name == cookie.name) {
                Some(existing) => *existing = cookie,
                None => cookies.push(cookie),
            }
        }

        let csrf_token = cookies
            .iter()
            .find(|cookie| cookie.name == CSRF_COOKIE)
            .map(|cookie| cookie.value.clone())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                FsError::Authentication(format!(
                    "malformed session: login response carried no {CSRF_COOKIE} cookie"
                ))
            })?;

        Ok(Self { cookies, csrf_token, authenticated: true })
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// `Cookie` header value: every session cookie in order.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// One authenticated session against one remote endpoint.
///
/// Callers are expected to go through a [`crate::queue::RequestQueue`] so
/// requests reach the server strictly one at a time.
pub struct SessionClient<T: HttpTransport> {
    connection: ConnectionInfo,
    transport: T,
    retry: RetryPolicy,
    session: Mutex<Option<Session>>,
}

impl<T: HttpTransport> SessionClient<T> {
    pub fn new(connection: ConnectionInfo, transport: T) -> Self {
        Self { connection, transport, retry: RetryPolicy::default(), session: Mutex::new(None) }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_session().is_some()
    }

    /// Snapshot of the live session, if any.
    pub fn session(&self) -> Option<Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn current_session(&self) -> Option<Session> {
        self.session().filter(Session::is_authenticated)
    }

    fn invalidate_session(&self) {
        let mut guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = guard.as_mut() {
            session.authenticated = false;
        }
    }

    /// Authenticate and replace the live session. On any failure the
    /// previous session is left exactly as it was.
    pub async fn login(&self) -> FsResult<()> {
        let body = serde_json::to_value(LoginRequest {
            user_name: self.connection.login(),
            user_password: &self.connection.password,
        })
        .map_err(|e| FsError::protocol(None, format!("failed to encode login request: {e}")))?;

        let response = self.send(HttpRequest::new(LOGIN_PATH, body), "login").await?;
        if !response.is_success() {
            log_body("login", &response);
            return Err(FsError::protocol(
                Some(response.status),
                format!("login answered with HTTP {}", response.status),
            ));
        }

        let answer: LoginResponse = serde_json::from_str(&response.body).map_err(|e| {
            log_body("login", &response);
            FsError::protocol(Some(response.status), format!("login response is not JSON: {e}"))
        })?;
        if !answer.is_success() {
            let message = answer
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| format!("login rejected with code {}", answer.code));
            warn!(host = self.connection.host(), login = self.connection.login(), "login rejected");
            return Err(FsError::Authentication(message));
        }

        let session = Session::from_set_cookies(&response.set_cookies)?;
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
        info!(host = self.connection.host(), login = self.connection.login(), "logged in");
        Ok(())
    }

    /// Invoke one server operation and return the full response body.
    ///
    /// Logs in lazily. An unauthorized answer triggers exactly one re-login
    /// and one replay; a second unauthorized answer is fatal.
    pub async fn call(&self, operation: Operation, payload: Value) -> FsResult<Value> {
        let session = match self.current_session() {
            Some(session) => session,
            None => self.fresh_session().await?,
        };

        let mut response = self.send_authenticated(operation, &session, &payload).await?;
        if response.is_unauthorized() {
            warn!(%operation, "session rejected, logging in again");
            self.invalidate_session();
            let session = self.fresh_session().await?;
            response = self.send_authenticated(operation, &session, &payload).await?;
            if response.is_unauthorized() {
                return Err(FsError::Authentication(format!(
                    "`{operation}` was unauthorized again after re-login"
                )));
            }
        }

        decode_envelope(operation, response)
    }

    async fn fresh_session(&self) -> FsResult<Session> {
        self.login().await?;
        self.current_session()
            .ok_or_else(|| FsError::Authentication("no session after login".to_string()))
    }

    async fn send_authenticated(
        &self,
        operation: Operation,
        session: &Session,
        payload: &Value,
    ) -> FsResult<HttpResponse> {
        let request = HttpRequest::new(operation.path(), payload.clone())
            .with_header("Cookie", session.cookie_header())
            .with_header(CSRF_HEADER, session.csrf_token());
        self.send(request, operation.name()).await
    }

    /// Send with the transient-failure retry policy applied.
    async fn send(&self, request: HttpRequest, label: &str) -> FsResult<HttpResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.post(request.clone()).await {
                Ok(response) => {
                    debug!(operation = label, status = response.status, attempt, "request done");
                    return Ok(response);
                }
                Err(TransportError::Transient(message)) if attempt < self.retry.attempts => {
                    warn!(operation = label, attempt, error = %message, "transient failure, retrying");
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(error) => {
                    let message = match error {
                        TransportError::Transient(message) | TransportError::Fatal(message) => {
                            message
                        }
                    };
                    return Err(FsError::Transport { attempts: attempt, message });
                }
            }
        }
    }

    // ── Typed operations ────────────────────────────────────────────

    pub async fn get_packages(&self) -> FsResult<Vec<PackageMetaInfo>> {
        let value = self.call(Operation::GetPackages, json!({})).await?;
        Ok(decode::<PackagesResponse>(Operation::GetPackages, value)?.packages)
    }

    pub async fn get_workspace_items(&self) -> FsResult<Vec<WorkspaceItem>> {
        let value = self.call(Operation::GetWorkspaceItems, json!({})).await?;
        Ok(decode::<WorkspaceItemsResponse>(Operation::GetWorkspaceItems, value)?.items)
    }

    /// Fetch the body-bearing schema for `item`.
    pub async fn get_schema(&self, item: &WorkspaceItem) -> FsResult<Schema> {
        let operation = Operation::GetSchema(designer_for(item.schema_type, &item.name)?);
        let request = GetSchemaRequest { schema_u_id: item.u_id, use_full_hierarchy: false };
        let payload = serde_json::to_value(request)
            .map_err(|e| FsError::protocol(None, format!("failed to encode request: {e}")))?;
        let schema = decode::<SchemaResponse>(operation, self.call(operation, payload).await?)?.schema;
        if schema.u_id != item.u_id {
            return Err(FsError::protocol(
                None,
                format!(
                    "server returned schema {} for `{}` ({})",
                    schema.u_id, item.name, item.u_id
                ),
            ));
        }
        Ok(schema)
    }

    pub async fn save_schema(&self, kind: SchemaType, schema: &Schema) -> FsResult<()> {
        let operation = Operation::SaveSchema(designer_for(kind, &schema.name)?);
        let payload = serde_json::to_value(schema)
            .map_err(|e| FsError::protocol(None, format!("failed to encode schema: {e}")))?;
        self.call(operation, payload).await?;
        Ok(())
    }

    pub async fn lock(&self, items: &[WorkspaceItem]) -> FsResult<()> {
        self.source_control(Operation::LockElements, items).await
    }

    pub async fn unlock(&self, items: &[WorkspaceItem]) -> FsResult<()> {
        self.source_control(Operation::UnlockElements, items).await
    }

    pub async fn revert(&self, items: &[WorkspaceItem]) -> FsResult<()> {
        self.source_control(Operation::RevertElements, items).await
    }

    async fn source_control(&self, operation: Operation, items: &[WorkspaceItem]) -> FsResult<()> {
        let payload = serde_json::to_value(items)
            .map_err(|e| FsError::protocol(None, format!("failed to encode items: {e}")))?;
        self.call(operation, payload).await?;
        Ok(())
    }

    pub async fn generate_changes(&self, package_name: &str) -> FsResult<Vec<PackageChange>> {
        let payload = serde_json::to_value(GenerateChangesRequest { package_name })
            .map_err(|e| FsError::protocol(None, format!("failed to encode request: {e}")))?;
        let value = self.call(Operation::GenerateChanges, payload).await?;
        Ok(decode::<ChangesResponse>(Operation::GenerateChanges, value)?.changes)
    }

    pub async fn build(&self) -> FsResult<BuildResponse> {
        let value = self.call(Operation::Build, json!({})).await?;
        decode(Operation::Build, value)
    }

    pub async fn rebuild(&self) -> FsResult<BuildResponse> {
        let value = self.call(Operation::Rebuild, json!({})).await?;
        decode(Operation::Rebuild, value)
    }

    /// Run a data-service select query and return the raw response.
    pub async fn select_query(&self, query: Value) -> FsResult<Value> {
        self.call(Operation::SelectQuery, query).await
    }
}

fn designer_for(
    kind: SchemaType,
    name: &str,
) -> FsResult<creatio_fs_common::protocol::SchemaDesigner> {
    kind.designer()
        .ok_or_else(|| FsError::Unsupported(format!("`{name}` is a {kind} schema with no editable body")))
}

fn decode_envelope(operation: Operation, response: HttpResponse) -> FsResult<Value> {
    if !response.is_success() {
        log_body(operation.name(), &response);
        return Err(FsError::protocol(
            Some(response.status),
            format!("`{operation}` answered with HTTP {}", response.status),
        ));
    }

    let envelope: ResponseEnvelope = serde_json::from_str(&response.body).map_err(|e| {
        log_body(operation.name(), &response);
        FsError::protocol(Some(response.status), format!("`{operation}` response is not JSON: {e}"))
    })?;

    match envelope.success {
        Some(true) => Ok(envelope.into_value()),
        Some(false) => Err(FsError::RemoteOperation(envelope.error_message())),
        None => {
            log_body(operation.name(), &response);
            Err(FsError::protocol(
                Some(response.status),
                format!("`{operation}` response has no success flag"),
            ))
        }
    }
}

fn decode<R: DeserializeOwned>(operation: Operation, value: Value) -> FsResult<R> {
    serde_json::from_value(value)
        .map_err(|e| FsError::protocol(None, format!("unexpected `{operation}` response shape: {e}")))
}

fn log_body(operation: &str, response: &HttpResponse) {
    let mut end = response.body.len().min(MAX_LOGGED_BODY);
    while !response.body.is_char_boundary(end) {
        end -= 1;
    }
    debug!(operation, status = response.status, body = &response.body[..end], "raw response");
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;

    // ── Mock transport ──────────────────────────────────────────────

    /// Scripted transport: answers in order and records every request.
    #[derive(Default)]
    struct MockTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockTransport {
        fn push(&self, response: HttpResponse) {
            self.responses.lock().unwrap().push_back(Ok(response));
        }

        fn push_error(&self, error: TransportError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn paths(&self) -> Vec<String> {
            self.requests().into_iter().map(|request| request.path).collect()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Fatal("no scripted response".into())))
        }
    }

    fn login_ok(token: &str) -> HttpResponse {
        HttpResponse::new(200, r#"{"Code":0,"Message":""}"#)
            .with_cookie(".ASPXAUTH=auth-cookie; path=/; HttpOnly")
            .with_cookie(format!("BPMCSRF={token}; path=/"))
            .with_cookie("UserName=Supervisor; path=/")
    }

    fn ok(body: Value) -> HttpResponse {
        HttpResponse::new(200, body.to_string())
    }

    fn client(transport: MockTransport) -> SessionClient<MockTransport> {
        let connection =
            ConnectionInfo::new("https://crm.example.com", "Supervisor", "secret").unwrap();
        SessionClient::new(connection, transport)
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO))
    }

    // ── Connection info ─────────────────────────────────────────────

    #[test]
    fn connection_info_derives_host_and_port() {
        let info = ConnectionInfo::new("https://crm.example.com", "a", "b").unwrap();
        assert_eq!(info.host(), "crm.example.com");
        assert_eq!(info.port(), 443);

        let info = ConnectionInfo::new("http://localhost:5000/", "a", "b").unwrap();
        assert_eq!(info.port(), 5000);
    }

    #[test]
    fn connection_info_rejects_bad_urls() {
        assert!(matches!(ConnectionInfo::new("not a url", "a", "b"), Err(FsError::Config(_))));
        assert!(matches!(
            ConnectionInfo::new("ftp://crm.example.com", "a", "b"),
            Err(FsError::Config(_))
        ));
    }

    #[test]
    fn connection_info_debug_hides_password() {
        let info = ConnectionInfo::new("https://crm.example.com", "Supervisor", "hunter2").unwrap();
        let rendered = format!("{info:?}");
        assert!(rendered.contains("Supervisor"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn retry_policy_allows_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }

    // ── Session parsing ─────────────────────────────────────────────

    #[test]
    fn session_extracts_csrf_and_keeps_cookie_order() {
        let session = Session::from_set_cookies(&login_ok("tok-1").set_cookies).unwrap();
        assert_eq!(session.csrf_token(), "tok-1");
        assert_eq!(
            session.cookie_header(),
            ".ASPXAUTH=auth-cookie; BPMCSRF=tok-1; UserName=Supervisor"
        );
    }

    #[test]
    fn session_without_csrf_cookie_is_malformed() {
        let error = Session::from_set_cookies(&[".ASPXAUTH=x; path=/".to_string()])
            .expect_err("missing BPMCSRF should fail");
        assert!(matches!(error, FsError::Authentication(_)));
    }

    // ── Login ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn login_posts_credentials_and_stores_session() {
        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        let client = client(transport);

        client.login().await.expect("login should succeed");
        assert!(client.is_authenticated());

        let requests = client.transport().requests();
        assert_eq!(requests[0].path, LOGIN_PATH);
        assert_eq!(requests[0].body, json!({ "UserName": "Supervisor", "UserPassword": "secret" }));
        assert_eq!(requests[0].header("Cookie"), None);
    }

    #[tokio::test]
    async fn rejected_login_reports_server_message() {
        let transport = MockTransport::default();
        transport.push(HttpResponse::new(200, r#"{"Code":1,"Message":"Invalid login or password"}"#));
        let client = client(transport);

        let error = client.login().await.expect_err("login should fail");
        assert_eq!(error, FsError::Authentication("Invalid login or password".into()));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn failed_login_keeps_previous_session() {
        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        transport.push(HttpResponse::new(200, r#"{"Code":1,"Message":"nope"}"#));
        transport.push(HttpResponse::new(200, r#"{"Code":0}"#)); // no cookies
        let client = client(transport);

        client.login().await.unwrap();
        let before = client.session().unwrap();

        assert!(client.login().await.is_err());
        assert_eq!(client.session().unwrap(), before);

        assert!(matches!(client.login().await, Err(FsError::Authentication(_))));
        assert_eq!(client.session().unwrap(), before);
        assert!(client.is_authenticated());
    }

    // ── Calls ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn call_logs_in_lazily_and_sends_session_headers() {
        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        transport.push(ok(json!({ "success": true, "packages": [] })));
        let client = client(transport);

        let packages = client.get_packages().await.expect("call should succeed");
        assert!(packages.is_empty());

        let requests = client.transport().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].path, Operation::GetPackages.path());
        assert_eq!(requests[1].header(CSRF_HEADER), Some("tok-1"));
        assert!(requests[1].header("Cookie").unwrap().contains("BPMCSRF=tok-1"));
    }

    #[tokio::test]
    async fn unauthorized_triggers_one_relogin_and_one_replay() {
        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        transport.push(HttpResponse::new(401, ""));
        transport.push(login_ok("tok-2"));
        transport.push(ok(json!({ "success": true, "items": [] })));
        let client = client(transport);

        client.get_workspace_items().await.expect("replay should succeed");

        let requests = client.transport().requests();
        let paths: Vec<_> = requests.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                LOGIN_PATH,
                Operation::GetWorkspaceItems.path(),
                LOGIN_PATH,
                Operation::GetWorkspaceItems.path(),
            ]
        );
        assert_eq!(requests[3].header(CSRF_HEADER), Some("tok-2"));
    }

    #[tokio::test]
    async fn second_unauthorized_is_fatal_without_third_attempt() {
        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        transport.push(HttpResponse::new(401, ""));
        transport.push(login_ok("tok-2"));
        transport.push(HttpResponse::new(401, ""));
        transport.push(ok(json!({ "success": true })));
        let client = client(transport);

        let error = client.build().await.expect_err("second 401 should be fatal");
        assert!(matches!(error, FsError::Authentication(_)));
        assert_eq!(client.transport().requests().len(), 4);
    }

    #[tokio::test]
    async fn non_success_status_is_protocol_error() {
        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        transport.push(HttpResponse::new(500, "<html>Server Error</html>"));
        let client = client(transport);

        let error = client.get_packages().await.expect_err("500 should fail");
        assert!(matches!(error, FsError::Protocol { status: Some(500), .. }));
    }

    #[tokio::test]
    async fn non_json_body_is_protocol_error() {
        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        transport.push(HttpResponse::new(200, "<html>login page</html>"));
        let client = client(transport);

        let error = client.get_packages().await.expect_err("html should fail");
        assert!(matches!(error, FsError::Protocol { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn success_false_is_remote_operation_error() {
        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        transport.push(ok(json!({
            "success": false,
            "errorInfo": { "message": "Item is locked by another user" }
        })));
        let client = client(transport);

        let error = client.lock(&[]).await.expect_err("lock should fail");
        assert_eq!(error, FsError::RemoteOperation("Item is locked by another user".into()));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_then_surface() {
        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        transport.push_error(TransportError::Transient("connection reset".into()));
        transport.push(ok(json!({ "success": true, "packages": [] })));
        let recovering = client(transport);

        recovering.get_packages().await.expect("second attempt should succeed");
        assert_eq!(recovering.transport().paths().len(), 3);

        let transport = MockTransport::default();
        for _ in 0..3 {
            transport.push_error(TransportError::Transient("timed out".into()));
        }
        let exhausted = client(transport);
        let error = exhausted.login().await.expect_err("retries should run out");
        assert_eq!(error, FsError::Transport { attempts: 3, message: "timed out".into() });
    }

    #[tokio::test]
    async fn fatal_transport_error_is_not_retried() {
        let transport = MockTransport::default();
        transport.push_error(TransportError::Fatal("bad header".into()));
        let client = client(transport);

        let error = client.login().await.expect_err("fatal error should surface");
        assert_eq!(error, FsError::Transport { attempts: 1, message: "bad header".into() });
        assert_eq!(client.transport().requests().len(), 1);
    }

    #[tokio::test]
    async fn get_schema_checks_returned_uid() {
        let item: WorkspaceItem = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "uId": Uuid::new_v4(),
            "name": "AccountPageV2",
            "packageName": "Custom",
            "packageUId": Uuid::new_v4(),
            "type": 4
        }))
        .unwrap();

        let transport = MockTransport::default();
        transport.push(login_ok("tok-1"));
        transport.push(ok(json!({
            "success": true,
            "schema": { "uId": Uuid::new_v4(), "name": "Other", "body": "x" }
        })));
        let client = client(transport);

        let error = client.get_schema(&item).await.expect_err("mismatched uId should fail");
        assert!(matches!(error, FsError::Protocol { .. }));
        assert_eq!(
            client.transport().paths()[1],
            Operation::GetSchema(creatio_fs_common::protocol::SchemaDesigner::ClientUnit).path()
        );
    }

    #[tokio::test]
    async fn schema_kinds_without_designer_are_unsupported() {
        let client = client(MockTransport::default());
        let error = client
            .save_schema(SchemaType::Dll, &Schema { name: "Lib".into(), ..Default::default() })
            .await
            .expect_err("dll bodies cannot be saved");
        assert!(matches!(error, FsError::Unsupported(_)));
        assert!(client.transport().requests().is_empty());
    }

    #[test]
    fn missing_success_flag_is_protocol_error() {
        let response = ok(json!({ "items": [] }));
        let error = decode_envelope(Operation::GetWorkspaceItems, response).unwrap_err();
        assert!(matches!(error, FsError::Protocol { .. }));
    }
}
