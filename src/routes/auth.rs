//! Auth routes: email access codes, session management, WS tickets.

use axum::extract::{FromRef, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use super::error::ApiError;
use crate::services::email_auth::{self, EmailAuthError};
use crate::services::session;
use crate::state::AppState;

const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the session cookie or a bearer token.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

#[cfg(test)]
impl AuthUser {
    /// Signed-in user for handler tests that never reach the database.
    pub(crate) fn for_test(id: uuid::Uuid) -> Self {
        let user = session::SessionUser {
            id,
            display_name: "Tester".into(),
            email: Some("tester@example.com".into()),
            avatar_url: None,
            theme_mode: "system".into(),
            theme_color: "blue".into(),
        };
        Self { user, token: "test-token".into() }
    }
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(COOKIE_NAME)
            .map(Cookie::value)
            .filter(|t| !t.is_empty())
            .or_else(|| bearer_token(&parts.headers))
            .map(str::to_owned)
            .ok_or_else(unauthorized)?;

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, &token)
            .await?
            .ok_or_else(unauthorized)?;

        Ok(Self { user, token })
    }
}

fn unauthorized() -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "sign in required")
}

pub(crate) fn email_auth_error_to_status(err: &EmailAuthError) -> StatusCode {
    match err {
        EmailAuthError::InvalidEmail | EmailAuthError::InvalidCode => StatusCode::BAD_REQUEST,
        EmailAuthError::VerificationFailed => StatusCode::UNAUTHORIZED,
        EmailAuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<EmailAuthError> for ApiError {
    fn from(err: EmailAuthError) -> Self {
        Self::from_service(email_auth_error_to_status(&err), &err)
    }
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(session::SESSION_TTL)
        .build()
}

fn cleared_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RequestCodeBody {
    pub email: String,
}

/// `POST /api/auth/email/request-code`: create a code and mail it.
pub async fn request_email_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = email_auth::normalize_email(&body.email).ok_or(EmailAuthError::InvalidEmail)?;
    state.rate_limiter.check_code_request(&email)?;

    let code = email_auth::request_access_code(&state.pool, &email).await?;

    match &state.mailer {
        Some(mailer) => {
            if let Err(e) = mailer.send_access_code(&email, &code).await {
                tracing::error!(error = %e, "access code delivery failed");
                return Err(ApiError::new(StatusCode::BAD_GATEWAY, "E_MAIL_FAILED", "could not send the code"));
            }
        }
        None => tracing::debug!(%email, %code, "mail delivery not configured; access code not sent"),
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    pub email: String,
    pub code: String,
}

/// `POST /api/auth/email/verify-code`: exchange a code for a session cookie.
pub async fn verify_email_code(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<VerifyCodeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = email_auth::verify_access_code(&state.pool, &body.email, &body.code).await?;
    let token = session::create_session(&state.pool, user_id).await?;
    let user = session::validate_session(&state.pool, &token)
        .await?
        .ok_or_else(unauthorized)?;

    tracing::info!(%user_id, "signed in with access code");
    let jar = jar.add(session_cookie(token, state.cookie_secure));
    Ok((jar, Json(user)))
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, "session delete failed on logout");
    }
    let jar = CookieJar::new().add(cleared_cookie(state.cookie_secure));
    (jar, StatusCode::NO_CONTENT)
}

/// `POST /api/auth/ws-ticket`: create a one-time WS ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, ApiError> {
    let ticket = session::create_ws_ticket(&state.pool, auth.user.id).await?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
