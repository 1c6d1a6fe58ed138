use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tower_sessions::{Expiry, Session};

use super::{ApiError, ApiResponse, AppState, MessageResponse, SessionInfo};
use crate::api::validation::{validate_email, validate_new_password, validate_username};
use crate::db::User;

/// Session key holding the logged-in user's id.
pub const SESSION_USER_KEY: &str = "user_id";

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware guarding the account and post-mutation routes.
/// Only the session cookie authenticates a request.
pub async fn auth_middleware(
    session: Session,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    if let Ok(Some(user_id)) = session.get::<i32>(SESSION_USER_KEY).await {
        tracing::Span::current().record("user_id", user_id);
        return Ok(next.run(request).await);
    }

    Ok(ApiError::Unauthorized("Authentication required".to_string()).into_response())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /register
/// Session status, so clients can skip the form when already logged in
pub async fn register_form(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<SessionInfo>>, ApiError> {
    Ok(Json(ApiResponse::success(
        session_info(&state, &session).await?,
    )))
}

/// POST /register
/// Create a new account; username and email must be unused
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if session_user_id(&session).await?.is_some() {
        return Err(ApiError::validation("Already logged in"));
    }

    let username = validate_username(&payload.username)?;
    let email = validate_email(&payload.email)?;
    let password = validate_new_password(&payload.password, &payload.confirm_password)?;

    let existing = state
        .store
        .get_user_by_username(username)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to check username: {e}")))?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "Username taken, please choose another one",
        ));
    }

    let existing = state
        .store
        .get_user_by_email(email)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to check email: {e}")))?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "Email already registered, please choose another one",
        ));
    }

    let user = state
        .store
        .create_user(username, email, password, &state.config.security)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create user: {e}")))?;

    tracing::info!("Account created for user: {}", user.username);

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Account created for {}, you are now able to log in",
        user.username
    )))))
}

/// GET /login
/// Session status for the login form
pub async fn login_form(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<SessionInfo>>, ApiError> {
    Ok(Json(ApiResponse::success(
        session_info(&state, &session).await?,
    )))
}

/// POST /login
/// Authenticate with email and password, creates the session cookie
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionInfo>>, ApiError> {
    if session_user_id(&session).await?.is_some() {
        return Err(ApiError::validation("Already logged in"));
    }

    if payload.email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state
        .store
        .verify_login(&payload.email, &payload.password)
        .await
        .map_err(|e| ApiError::internal(format!("Authentication error: {e}")))?
        .ok_or_else(|| {
            ApiError::Unauthorized("Login unsuccessful, please check email and password".to_string())
        })?;

    if let Err(e) = session.insert(SESSION_USER_KEY, user.id).await {
        return Err(ApiError::internal(format!("Failed to create session: {e}")));
    }

    if payload.remember {
        let expires_at =
            OffsetDateTime::now_utc() + time::Duration::days(state.config.server.remember_me_days);
        session.set_expiry(Some(Expiry::AtDateTime(expires_at)));
    }

    tracing::info!("User logged in: {}", user.username);

    Ok(Json(ApiResponse::success(SessionInfo {
        authenticated: true,
        username: Some(user.username),
    })))
}

/// GET /logout
/// Invalidate the current session
pub async fn logout(session: Session) -> Json<ApiResponse<MessageResponse>> {
    let _ = session.flush().await;
    Json(ApiResponse::success(MessageResponse::new("Logged out")))
}

// ============================================================================
// Helpers
// ============================================================================

/// Read the user id from the session, if any
pub async fn session_user_id(session: &Session) -> Result<Option<i32>, ApiError> {
    session
        .get::<i32>(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))
}

/// Get the logged-in user, returns 401 if the session is anonymous or stale
pub async fn require_user(state: &AppState, session: &Session) -> Result<User, ApiError> {
    let user_id = session_user_id(session)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    state
        .store
        .get_user_by_id(user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
}

async fn session_info(state: &AppState, session: &Session) -> Result<SessionInfo, ApiError> {
    let Some(user_id) = session_user_id(session).await? else {
        return Ok(SessionInfo {
            authenticated: false,
            username: None,
        });
    };

    let username = state
        .store
        .get_user_by_id(user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .map(|u| u.username);

    Ok(SessionInfo {
        authenticated: username.is_some(),
        username,
    })
}
