use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::session_user_id;
use super::{ApiError, ApiResponse, AppState, MessageResponse, SessionInfo};
use crate::api::validation::{validate_email, validate_new_password};
use crate::db::User;

#[derive(Deserialize)]
pub struct ForgetPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

/// GET /forget_password
pub async fn forget_password_form(
    session: Session,
) -> Result<Json<ApiResponse<SessionInfo>>, ApiError> {
    let authenticated = session_user_id(&session).await?.is_some();

    Ok(Json(ApiResponse::success(SessionInfo {
        authenticated,
        username: None,
    })))
}

/// POST /forget_password
/// Issue a reset token for the account and email the reset link
pub async fn forget_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<ForgetPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if session_user_id(&session).await?.is_some() {
        return Err(ApiError::validation("Already logged in"));
    }

    let email = validate_email(&payload.email)?;

    let user = state
        .store
        .get_user_by_email(email)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or_else(|| ApiError::validation("No account with that email address exists"))?;

    let token = state
        .reset_tokens
        .issue(user.id)
        .map_err(|e| ApiError::internal(format!("Failed to issue reset token: {e}")))?;

    let valid_minutes = (state.config.security.reset_token_ttl_seconds / 60).max(1);

    state
        .mailer
        .send_password_reset(&user.email, &token, valid_minutes)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to send reset email: {e}")))?;

    tracing::info!("Password reset requested for user: {}", user.username);

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "An email with instructions to reset your password has been sent",
    ))))
}

/// GET /reset_password/{token}
/// Check the token before the client shows its new-password form
pub async fn reset_password_form(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    token_user(&state, &token).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Reset token accepted, submit a new password",
    ))))
}

/// POST /reset_password/{token}
/// Set a new password for the account the token was issued for
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if session_user_id(&session).await?.is_some() {
        return Err(ApiError::validation("Already logged in"));
    }

    let user = token_user(&state, &token).await?;
    let password = validate_new_password(&payload.password, &payload.confirm_password)?;

    state
        .store
        .update_user_password(user.id, password, &state.config.security)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to update password: {e}")))?;

    tracing::info!("Password reset completed for user: {}", user.username);

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Your password has been updated, you are now able to log in",
    ))))
}

/// Verify a reset token and load the user it was issued for. Any failure
/// (bad signature, expiry, vanished account) is the same invalid-token
/// outcome the caller reports back.
async fn token_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let user_id = state
        .reset_tokens
        .verify(token)
        .ok_or(ApiError::InvalidResetToken)?;

    state
        .store
        .get_user_by_id(user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or(ApiError::InvalidResetToken)
}
