//! In-process mock of the sharebox server for integration tests.
//!
//! Tokens are opaque counters (`access-N`, `refresh-N`). Exactly one access
//! token and one refresh token are valid at a time, like the real server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use sharebox_core::auth::TokenPersistence;
use sharebox_core::{ClientConfig, Credential, ShareboxClient};

pub const PASSWORD: &str = "correct-password";
pub const OTP: &str = "123456";
pub const CSRF: &str = "csrf-abc123";
/// Account that has not enrolled an authenticator yet.
pub const NEW_USER: &str = "newbie";
pub const OTP_URL: &str = "otpauth://totp/Sharebox:newbie?secret=JBSWY3DPEHPK3PXP";
pub const PUBLIC_LINK: &str = "pub123";
pub const PASSPHRASE: &str = "open-sesame";

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Value,
}

#[derive(Default)]
pub struct MockState {
    issued: AtomicUsize,
    access: Mutex<Option<String>>,
    refresh: Mutex<Option<String>>,

    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub rate_limited_calls: AtomicUsize,

    /// Delay before the refresh endpoint answers.
    pub refresh_delay: Mutex<Duration>,
    /// Forced refresh failure status.
    pub refresh_failure: Mutex<Option<StatusCode>>,
    /// Leave the refresh token out of refresh replies.
    pub keep_refresh: AtomicBool,
    /// Reject every bearer token, even fresh ones.
    pub reject_all: AtomicBool,
    pub logout_failure: Mutex<Option<StatusCode>>,
    /// Delay before `shared-with-me` checks its bearer token.
    pub slow_delay: Mutex<Duration>,
    pub enrolled: AtomicBool,
    /// Admin endpoints answer 403 unless set.
    pub admin: AtomicBool,

    /// Authorization header seen per request path.
    pub authorization: Mutex<HashMap<String, Vec<Option<String>>>>,
    /// Calls to endpoints that record their method and body.
    pub calls: Mutex<Vec<Call>>,
}

impl MockState {
    fn issue_pair(&self) -> (String, String) {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{}", n);
        let refresh = format!("refresh-{}", n);
        *self.access.lock().unwrap() = Some(access.clone());
        *self.refresh.lock().unwrap() = Some(refresh.clone());
        (access, refresh)
    }

    /// Invalidate the current access token; the refresh token stays valid.
    pub fn expire_access(&self) {
        *self.access.lock().unwrap() = None;
    }

    pub fn valid_refresh(&self) -> Option<String> {
        self.refresh.lock().unwrap().clone()
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn auth_headers(&self, path: &str) -> Vec<Option<String>> {
        self.authorization
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Recorded calls whose path starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn log_call(&self, method: &'static str, path: impl Into<String>, body: Value) {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.into(),
            body,
        });
    }

    fn require_admin(&self) -> Result<(), Response> {
        if self.admin.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err((
                StatusCode::FORBIDDEN,
                Json(json!({"detail": "You do not have permission to perform this action."})),
            )
                .into_response())
        }
    }

    fn record(&self, path: &str, headers: &HeaderMap) -> Option<String> {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.authorization
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(value.clone());
        value
    }

    fn authorize(&self, path: &str, headers: &HeaderMap) -> Result<(), Response> {
        let presented = self.record(path, headers);
        let token = presented.as_deref().and_then(|v| v.strip_prefix("Bearer "));
        let valid = self.access.lock().unwrap().clone();
        match (token, valid) {
            (Some(t), Some(v)) if t == v && !self.reject_all.load(Ordering::SeqCst) => Ok(()),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Given token not valid for any token type"})),
            )
                .into_response()),
        }
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/api/auth/login/", post(login))
            .route("/api/auth/login/otp/", post(verify_otp))
            .route("/api/auth/mfa/enable/", post(enable_mfa))
            .route("/api/auth/refresh/", post(refresh))
            .route("/api/auth/logout/", post(logout))
            .route("/api/auth/user/", get(current_user))
            .route("/api/auth/delete/", post(delete_account))
            .route("/api/auth/register/", post(register))
            .route("/api/auth/verify-email/{uid}/{token}/", get(verify_email))
            .route("/api/auth/update/", patch(update_user))
            .route("/api/files/my-files/", get(my_files))
            .route("/api/files/shared-with-me/", get(shared_with_me))
            .route("/api/files/upload/", post(upload))
            .route("/api/files/download/{id}/", get(download))
            .route("/api/files/view/{id}/", get(view))
            .route("/api/files/share/", post(share))
            .route("/api/files/share/public/", post(share_public))
            .route("/api/files/shared/public/details/", get(public_share_details))
            .route(
                "/api/files/shared/public/{link}/{passphrase}/",
                get(public_shared),
            )
            .route("/api/files/shared/{link}/", get(access_shared))
            .route("/api/files/send-email/", post(send_email))
            .route("/api/admin/users/", get(admin_users))
            .route(
                "/api/admin/users/{id}/",
                get(admin_get_user)
                    .patch(admin_update_user)
                    .delete(admin_delete_user),
            )
            .route("/api/admin/users/{id}/make-superuser/", patch(admin_make_superuser))
            .route("/api/admin/files/", get(admin_files))
            .route("/api/admin/files/{id}/", axum::routing::delete(admin_delete_file))
            .route("/api/throttled/", get(throttled))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_url(self.base_url())
    }

    pub fn client(&self) -> ShareboxClient {
        ShareboxClient::new(&self.config()).unwrap()
    }

    /// A client that is already past login and second factor.
    pub async fn authenticated_client(&self) -> ShareboxClient {
        let client = self.client();
        client.session().login("alice", PASSWORD).await.unwrap();
        client.session().verify_otp(OTP).await.unwrap();
        client
    }
}

/// Persistence stub that starts a client with a fixed credential.
pub struct FixedTokens(pub Credential);

impl TokenPersistence for FixedTokens {
    fn load(&self) -> anyhow::Result<Option<Credential>> {
        Ok(Some(self.0.clone()))
    }

    fn save(&self, _credential: &Credential) -> anyhow::Result<()> {
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

// ============================================================================
// Handlers
// ============================================================================

async fn login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("auth/login/", &headers);
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid username or password"})),
        )
            .into_response();
    }

    let cookies = AppendHeaders([
        (header::SET_COOKIE, "sessionid=login-step; Path=/; HttpOnly"),
        (header::SET_COOKIE, "csrftoken=csrf-abc123; Path=/"),
    ]);

    if body["username"] == NEW_USER && !state.enrolled.load(Ordering::SeqCst) {
        return (
            cookies,
            Json(json!({
                "message": "MFA setup required. Scan the QR code with an authenticator app.",
                "otp_url": OTP_URL,
            })),
        )
            .into_response();
    }

    (
        cookies,
        Json(json!({"message": "Password verified. Please provide OTP."})),
    )
        .into_response()
}

async fn verify_otp(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("auth/login/otp/", &headers);
    if cookie_value(&headers, "sessionid").as_deref() != Some("login-step") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Session expired. Please login again."})),
        )
            .into_response();
    }
    let csrf = headers.get("x-csrftoken").and_then(|v| v.to_str().ok());
    if csrf != Some(CSRF) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "CSRF Failed: CSRF token missing."})),
        )
            .into_response();
    }
    if body["otp"] != OTP {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid OTP"})),
        )
            .into_response();
    }

    let (access, refresh) = state.issue_pair();
    Json(json!({
        "access": access,
        "refresh": refresh,
        "user": {"id": 7, "email": "alice@example.com", "first_name": "Alice", "last_name": "Liddell", "role": "user"},
    }))
    .into_response()
}

async fn enable_mfa(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if body["otp"] != OTP {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "Invalid OTP"})),
        )
            .into_response();
    }
    state.enrolled.store(true, Ordering::SeqCst);
    Json(json!({"success": true, "message": "MFA enabled successfully"})).into_response()
}

async fn refresh(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("auth/refresh/", &headers);
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let forced = *state.refresh_failure.lock().unwrap();
    if let Some(status) = forced {
        return (status, Json(json!({"detail": "refresh unavailable"}))).into_response();
    }

    let presented = body["refresh"].as_str().map(str::to_string);
    if presented.is_none() || presented != state.valid_refresh() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired", "code": "token_not_valid"})),
        )
            .into_response();
    }

    if state.keep_refresh.load(Ordering::SeqCst) {
        let old_refresh = state.valid_refresh();
        let (access, _) = state.issue_pair();
        *state.refresh.lock().unwrap() = old_refresh;
        return Json(json!({"access": access})).into_response();
    }

    let (access, refresh) = state.issue_pair();
    Json(json!({"access": access, "refresh": refresh})).into_response()
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(rejected) = state.authorize("auth/logout/", &headers) {
        return rejected;
    }
    let failure = *state.logout_failure.lock().unwrap();
    if let Some(status) = failure {
        return (status, "logout backend down").into_response();
    }
    *state.refresh.lock().unwrap() = None;
    Json(json!({"message": "Successfully logged out."})).into_response()
}

async fn current_user(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = state.authorize("auth/user/", &headers) {
        return rejected;
    }
    Json(json!({"id": 7, "email": "alice@example.com", "first_name": "Alice", "last_name": "Liddell"}))
        .into_response()
}

async fn delete_account(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = state.authorize("auth/delete/", &headers) {
        return rejected;
    }
    *state.access.lock().unwrap() = None;
    *state.refresh.lock().unwrap() = None;
    StatusCode::NO_CONTENT.into_response()
}

async fn my_files(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = state.authorize("files/my-files/", &headers) {
        return rejected;
    }
    Json(json!([
        {"id": 1, "name": "report", "owner": 7, "description": "Q3", "uploaded_at": "2026-01-05T10:00:00Z"},
        {"id": "9b1deb4d", "name": "notes"},
    ]))
    .into_response()
}

async fn shared_with_me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let delay = *state.slow_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if let Err(rejected) = state.authorize("files/shared-with-me/", &headers) {
        return rejected;
    }
    Json(json!([{
        "id": 3,
        "file_name": "plans.pdf",
        "shared_by": "bob@example.com",
        "share_type": "download",
        "shared_link": "a1b2c3",
    }]))
    .into_response()
}

async fn upload(State(state): State<Arc<MockState>>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(rejected) = state.authorize("files/upload/", &headers) {
        return rejected;
    }
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);
    let text = String::from_utf8_lossy(&body);
    if !is_multipart || !text.contains("hello sharebox") || !text.contains("name=\"name\"") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "No file provided"}))).into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({"id": 42, "name": "greeting", "owner": 7, "description": "hi"})),
    )
        .into_response()
}

async fn download(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(rejected) = state.authorize("files/download/", &headers) {
        return rejected;
    }
    if id != "42" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    (
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"greeting.txt\""),
        ],
        "hello sharebox",
    )
        .into_response()
}

async fn share(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejected) = state.authorize("files/share/", &headers) {
        return rejected;
    }
    Json(json!({
        "shared_link": "a1b2c3",
        "expires_at": "2026-01-06T10:00:00Z",
        "public": body["public"],
        "one_time": body["one_time"],
    }))
    .into_response()
}

async fn public_shared(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path((link, passphrase)): Path<(String, String)>,
) -> Response {
    state.record("files/shared/public/", &headers);
    if link != PUBLIC_LINK || passphrase != PASSPHRASE {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Invalid passphrase"})),
        )
            .into_response();
    }
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"cat.png\""),
        ],
        Bytes::from_static(b"\x89PNG"),
    )
        .into_response()
}

fn admin_user(id: i64) -> Value {
    json!({
        "id": id,
        "email": format!("user{}@example.com", id),
        "first_name": "User",
        "last_name": id.to_string(),
        "mfa_enabled": true,
        "mfa_secret": "JBSWY3DPEHPK3PXP",
        "email_verified": true,
        "is_active": true,
        "is_superuser": false,
        "is_staff": false,
    })
}

async fn admin_users(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = state.authorize("admin/users/", &headers) {
        return rejected;
    }
    if let Err(rejected) = state.require_admin() {
        return rejected;
    }
    state.log_call("GET", "admin/users/", Value::Null);
    Json(json!([admin_user(1), admin_user(2)])).into_response()
}

async fn admin_get_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(rejected) = state.authorize("admin/users/{id}/", &headers) {
        return rejected;
    }
    if let Err(rejected) = state.require_admin() {
        return rejected;
    }
    state.log_call("GET", format!("admin/users/{}/", id), Value::Null);
    if id > 100 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    Json(admin_user(id)).into_response()
}

async fn admin_update_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejected) = state.authorize("admin/users/{id}/", &headers) {
        return rejected;
    }
    if let Err(rejected) = state.require_admin() {
        return rejected;
    }
    state.log_call("PATCH", format!("admin/users/{}/", id), body.clone());
    let mut user = admin_user(id);
    if let (Some(user), Some(changes)) = (user.as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            user.insert(key.clone(), value.clone());
        }
    }
    Json(user).into_response()
}

async fn admin_delete_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(rejected) = state.authorize("admin/users/{id}/", &headers) {
        return rejected;
    }
    if let Err(rejected) = state.require_admin() {
        return rejected;
    }
    state.log_call("DELETE", format!("admin/users/{}/", id), Value::Null);
    StatusCode::NO_CONTENT.into_response()
}

async fn admin_make_superuser(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejected) = state.authorize("admin/users/{id}/make-superuser/", &headers) {
        return rejected;
    }
    if let Err(rejected) = state.require_admin() {
        return rejected;
    }
    state.log_call("PATCH", format!("admin/users/{}/make-superuser/", id), body.clone());
    let verb = if body["is_superuser"] == true { "granted" } else { "revoked" };
    Json(json!({"message": format!("Superuser status {} for user {}", verb, id)})).into_response()
}

async fn admin_files(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = state.authorize("admin/files/", &headers) {
        return rejected;
    }
    if let Err(rejected) = state.require_admin() {
        return rejected;
    }
    state.log_call("GET", "admin/files/", Value::Null);
    Json(json!([
        {"id": 1, "name": "report", "owner": 7},
        {"id": 5, "name": "budget", "owner": 2, "description": "2026"},
    ]))
    .into_response()
}

async fn admin_delete_file(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(rejected) = state.authorize("admin/files/{id}/", &headers) {
        return rejected;
    }
    if let Err(rejected) = state.require_admin() {
        return rejected;
    }
    state.log_call("DELETE", format!("admin/files/{}/", id), Value::Null);
    StatusCode::NO_CONTENT.into_response()
}

async fn register(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("auth/register/", &headers);
    state.log_call("POST", "auth/register/", body.clone());
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"email": ["user with this email already exists."]})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "id": 21,
            "email": body["email"],
            "first_name": body["first_name"],
            "last_name": body["last_name"],
            "role": "user",
        })),
    )
        .into_response()
}

async fn verify_email(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path((uid, token)): Path<(String, String)>,
) -> Response {
    state.record("auth/verify-email/", &headers);
    state.log_call("GET", format!("auth/verify-email/{}/{}/", uid, token), Value::Null);
    if token != "good-token" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid or expired verification link"})),
        )
            .into_response();
    }
    Json(json!({"message": "Email verified successfully"})).into_response()
}

async fn update_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejected) = state.authorize("auth/update/", &headers) {
        return rejected;
    }
    state.log_call("PATCH", "auth/update/", body.clone());
    let mut user = json!({"id": 7, "email": "alice@example.com", "first_name": "Alice", "last_name": "Liddell"});
    if let (Some(user), Some(changes)) = (user.as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            user.insert(key.clone(), value.clone());
        }
    }
    Json(user).into_response()
}

async fn view(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(rejected) = state.authorize("files/view/", &headers) {
        return rejected;
    }
    state.log_call("GET", format!("files/view/{}/", id), Value::Null);
    (
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"plans.pdf\""),
        ],
        Bytes::from_static(b"%PDF-1.7"),
    )
        .into_response()
}

async fn share_public(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejected) = state.authorize("files/share/public/", &headers) {
        return rejected;
    }
    state.log_call("POST", "files/share/public/", body);
    (
        StatusCode::CREATED,
        Json(json!({
            "shared_link": PUBLIC_LINK,
            "expires_at": "2026-01-06T10:00:00Z",
            "passphrase": PASSPHRASE,
        })),
    )
        .into_response()
}

async fn public_share_details(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejected) = state.authorize("files/shared/public/details/", &headers) {
        return rejected;
    }
    let file_id = query.get("file_id").cloned().unwrap_or_default();
    state.log_call("GET", "files/shared/public/details/", json!({"file_id": file_id}));
    if file_id != "42" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No active public link for this file"})),
        )
            .into_response();
    }
    Json(json!({
        "shared_link": PUBLIC_LINK,
        "expires_at": "2026-01-06T10:00:00Z",
        "passphrase": PASSPHRASE,
    }))
    .into_response()
}

async fn access_shared(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(link): Path<String>,
) -> Response {
    if let Err(rejected) = state.authorize("files/shared/", &headers) {
        return rejected;
    }
    state.log_call("GET", format!("files/shared/{}/", link), Value::Null);
    if link != "a1b2c3" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Share link not found or expired"})),
        )
            .into_response();
    }
    (
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"plans.pdf\""),
        ],
        Bytes::from_static(b"%PDF-1.7"),
    )
        .into_response()
}

async fn send_email(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejected) = state.authorize("files/send-email/", &headers) {
        return rejected;
    }
    state.log_call("POST", "files/send-email/", body);
    Json(json!({"success": "Email sent successfully"})).into_response()
}

/// Answers 429 on the first call, then succeeds.
async fn throttled(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(rejected) = state.authorize("throttled/", &headers) {
        return rejected;
    }
    if state.rate_limited_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
    }
    Json(json!({"ok": true})).into_response()
}
