//! Login, second-factor, refresh and logout protocols.
//!
//! `SessionManager` and `TokenRenewer` are the only writers of the
//! `CredentialStore`. The gateway reaches the refresh protocol through the
//! `TokenRefresher` trait and never depends on `SessionManager` itself.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::gateway::LOGOUT_PATH;
use crate::api::{ApiError, ApiGateway, HttpTransport, RequestDescriptor, TokenRefresher};
use crate::models::{RegisterRequest, UserProfile, UserUpdate};
use crate::validation;

use super::credentials::PendingStep;
use super::{Credential, CredentialStore, SessionStatus};

const LOGIN_PATH: &str = "auth/login/";
const OTP_PATH: &str = "auth/login/otp/";
const MFA_ENABLE_PATH: &str = "auth/mfa/enable/";
const REFRESH_PATH: &str = "auth/refresh/";
const REGISTER_PATH: &str = "auth/register/";
const USER_PATH: &str = "auth/user/";
const UPDATE_USER_PATH: &str = "auth/update/";
const DELETE_USER_PATH: &str = "auth/delete/";

/// Marker in the login reply message when the account has no authenticator yet.
const MFA_SETUP_MARKER: &str = "MFA setup required";

/// What the server wants after the password was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Submit the one-time code with `verify_otp`.
    MfaRequired,
    /// Enroll an authenticator from `otp_url`, confirm with `enable_mfa`,
    /// then log in again.
    MfaSetupRequired { otp_url: String },
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct OtpBody<'a> {
    otp: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    message: Option<String>,
    otp_url: Option<String>,
    access: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    access: String,
    refresh: Option<String>,
    user: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
struct MessageReply {
    message: Option<String>,
    success: Option<serde_json::Value>,
}

impl LoginReply {
    fn outcome(self) -> Result<LoginOutcome, ApiError> {
        let setup = self
            .message
            .as_deref()
            .map(|m| m.contains(MFA_SETUP_MARKER))
            .unwrap_or(false);

        if setup || self.otp_url.is_some() {
            let otp_url = self.otp_url.ok_or_else(|| {
                ApiError::InvalidResponse("MFA setup required but no otp_url returned".to_string())
            })?;
            return Ok(LoginOutcome::MfaSetupRequired { otp_url });
        }

        if self.access.is_some() {
            // Second factor is mandatory; tokens issued on password alone are not used.
            debug!("Login returned tokens without a second factor, discarding them");
        }
        Ok(LoginOutcome::MfaRequired)
    }
}

// ============================================================================
// Refresh protocol
// ============================================================================

/// Exchanges the refresh token for a new pair over the raw transport.
pub struct TokenRenewer {
    transport: HttpTransport,
    store: Arc<CredentialStore>,
    timeout: Duration,
}

impl TokenRenewer {
    pub fn new(transport: HttpTransport, store: Arc<CredentialStore>, timeout: Duration) -> Self {
        Self {
            transport,
            store,
            timeout,
        }
    }

    /// Refresh the pair. Success commits it; any failure, including a
    /// timeout, ends the session.
    ///
    /// Both outcomes are applied only while the store still holds
    /// `refresh_token`. A logout or a new login during the exchange wins,
    /// and the caller gets `SessionExpired`.
    pub async fn renew(&self, refresh_token: String) -> Result<Credential, ApiError> {
        let outcome = match tokio::time::timeout(self.timeout, self.exchange(&refresh_token)).await
        {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout),
        };

        match outcome {
            Ok(credential) => {
                if !self.store.replace_if_refresh(&refresh_token, credential.clone()) {
                    debug!("Session changed during refresh, discarding new tokens");
                    return Err(ApiError::SessionExpired);
                }
                info!("Access token refreshed");
                Ok(credential)
            }
            Err(e) => {
                if self.store.clear_if_refresh(&refresh_token) {
                    warn!(error = %e, "Token refresh failed, ending session");
                } else {
                    debug!(error = %e, "Stale token refresh failed, session left alone");
                }
                Err(e)
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<Credential, ApiError> {
        let descriptor = RequestDescriptor::post(REFRESH_PATH)
            .anonymous()
            .json(&RefreshBody {
                refresh: refresh_token,
            })?;

        let response = self.transport.send(&descriptor, None).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "Refresh rejected");
            return Err(if status.is_server_error() {
                ApiError::from_status(status, &body)
            } else {
                ApiError::SessionExpired
            });
        }

        let reply: TokenReply = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e))
        })?;

        // Rotated pair when the server sends one, otherwise keep the current refresh token
        Ok(Credential {
            access: Some(reply.access),
            refresh: Some(reply.refresh.unwrap_or_else(|| refresh_token.to_string())),
        })
    }
}

impl TokenRefresher for TokenRenewer {
    fn refresh(&self, refresh_token: String) -> BoxFuture<'_, Result<Credential, ApiError>> {
        self.renew(refresh_token).boxed()
    }

    fn expire_session(&self) {
        self.store.clear();
    }
}

// ============================================================================
// Session manager
// ============================================================================

pub struct SessionManager {
    gateway: Arc<ApiGateway>,
    store: Arc<CredentialStore>,
    /// Bound on the best-effort logout notification.
    logout_timeout: Duration,
}

impl SessionManager {
    pub fn new(gateway: Arc<ApiGateway>, logout_timeout: Duration) -> Self {
        let store = Arc::clone(gateway.store());
        Self {
            gateway,
            store,
            logout_timeout,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.store.status()
    }

    /// Check username and password. Never sends a bearer credential and
    /// never commits one.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        validation::require("Username", username)?;
        validation::require("Password", password)?;

        let descriptor = RequestDescriptor::post(LOGIN_PATH)
            .anonymous()
            .json(&LoginBody { username, password })?;

        let reply: LoginReply = self
            .gateway
            .send_json(descriptor)
            .await
            .map_err(ApiError::into_auth_failure)?;

        let outcome = reply.outcome()?;
        match &outcome {
            LoginOutcome::MfaRequired => {
                self.store.begin_step(PendingStep::Verification);
                info!(username = username, "Password accepted, awaiting one-time code");
            }
            LoginOutcome::MfaSetupRequired { otp_url } => {
                self.store.begin_step(PendingStep::Enrollment {
                    otp_url: otp_url.clone(),
                });
                info!(username = username, "Password accepted, authenticator enrollment required");
            }
        }
        Ok(outcome)
    }

    /// Submit the one-time code. Success commits the issued pair.
    pub async fn verify_otp(&self, code: &str) -> Result<Option<UserProfile>, ApiError> {
        if self.store.status() != SessionStatus::MfaPending {
            return Err(ApiError::Validation(
                "No login is waiting for a one-time code".to_string(),
            ));
        }
        validation::otp(code)?;

        let descriptor = RequestDescriptor::post(OTP_PATH)
            .anonymous()
            .json(&OtpBody { otp: code.trim() })?;

        let reply: TokenReply = self
            .gateway
            .send_json(descriptor)
            .await
            .map_err(ApiError::into_auth_failure)?;

        let refresh = reply.refresh.ok_or_else(|| {
            ApiError::InvalidResponse("OTP verification returned no refresh token".to_string())
        })?;
        self.store.set(Credential::new(reply.access, refresh));
        info!("Second factor accepted, session authenticated");
        Ok(reply.user)
    }

    /// Confirm authenticator enrollment. The caller must log in again afterwards.
    pub async fn enable_mfa(&self, code: &str) -> Result<(), ApiError> {
        if !matches!(self.store.status(), SessionStatus::MfaSetupPending { .. }) {
            return Err(ApiError::Validation(
                "No authenticator enrollment is in progress".to_string(),
            ));
        }
        validation::otp(code)?;

        let descriptor = RequestDescriptor::post(MFA_ENABLE_PATH)
            .anonymous()
            .json(&OtpBody { otp: code.trim() })?;

        let reply: MessageReply = self
            .gateway
            .send_json(descriptor)
            .await
            .map_err(ApiError::into_auth_failure)?;

        if matches!(reply.success, Some(serde_json::Value::Bool(false))) {
            return Err(ApiError::Auth {
                status: 400,
                message: reply
                    .message
                    .unwrap_or_else(|| "Enrollment code rejected".to_string()),
            });
        }

        self.store.end_step();
        info!("Authenticator enrolled, login required");
        Ok(())
    }

    /// Tell the server (best effort) and drop the local session regardless.
    pub async fn logout(&self) {
        let credential = self.store.get();
        if !credential.is_empty() {
            match tokio::time::timeout(self.logout_timeout, self.notify_logout(&credential)).await {
                Ok(Ok(())) => debug!("Server acknowledged logout"),
                Ok(Err(e)) => warn!(error = %e, "Logout notification failed"),
                Err(_) => warn!("Logout notification timed out"),
            }
        }
        self.store.clear();
        info!("Logged out");
    }

    async fn notify_logout(&self, credential: &Credential) -> Result<(), ApiError> {
        let descriptor = RequestDescriptor::post(LOGOUT_PATH).json(&serde_json::json!({
            "refresh": credential.refresh,
        }))?;
        self.gateway.send_discard(descriptor).await
    }

    /// Create an account. The server sends a verification email; the new
    /// account cannot log in until it is verified.
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ApiError> {
        validation::require("First name", &request.first_name)?;
        validation::require("Last name", &request.last_name)?;
        validation::email(&request.email)?;
        validation::password(&request.password)?;

        let descriptor = RequestDescriptor::post(REGISTER_PATH)
            .anonymous()
            .json(request)?;
        self.gateway.send_json(descriptor).await
    }

    /// Follow an email verification link's `uid`/`token` pair.
    pub async fn verify_email(&self, uid: &str, token: &str) -> Result<String, ApiError> {
        validation::path_segment("uid", uid)?;
        validation::path_segment("token", token)?;

        let path = format!("auth/verify-email/{}/{}/", uid, token);
        let reply: MessageReply = self
            .gateway
            .send_json(RequestDescriptor::get(path).anonymous())
            .await?;
        Ok(reply
            .message
            .unwrap_or_else(|| "Email verified".to_string()))
    }

    pub async fn load_user(&self) -> Result<UserProfile, ApiError> {
        self.gateway.get_json(USER_PATH).await
    }

    pub async fn update_user(&self, update: &UserUpdate) -> Result<UserProfile, ApiError> {
        if update.is_empty() {
            return Err(ApiError::Validation("Nothing to update".to_string()));
        }
        if let Some(ref email) = update.email {
            validation::email(email)?;
        }
        let descriptor = RequestDescriptor::patch(UPDATE_USER_PATH).json(update)?;
        self.gateway.send_json(descriptor).await
    }

    /// Delete the signed-in account and end the session.
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.gateway
            .send_discard(RequestDescriptor::post(DELETE_USER_PATH))
            .await?;
        self.store.clear();
        info!("Account deleted");
        Ok(())
    }
}
