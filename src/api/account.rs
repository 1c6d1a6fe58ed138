use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::require_user;
use super::{ApiError, ApiResponse, AppState, UserDto};
use crate::api::validation::{validate_email, validate_username};
use crate::services::ImageError;

/// Current editable values, returned by GET /update_info so the client can
/// prefill its form.
#[derive(Serialize)]
pub struct AccountForm {
    pub username: String,
    pub email: String,
    pub image_url: String,
}

/// GET /account
/// Current user's profile (requires authentication)
pub async fn account(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = require_user(&state, &session).await?;

    Ok(Json(ApiResponse::success(user.into())))
}

/// GET /update_info
pub async fn update_info_form(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<AccountForm>>, ApiError> {
    let user = require_user(&state, &session).await?;
    let dto = UserDto::from(user);

    Ok(Json(ApiResponse::success(AccountForm {
        username: dto.username,
        email: dto.email,
        image_url: dto.image_url,
    })))
}

/// POST /update_info (multipart)
/// Update username/email and optionally replace the profile picture
pub async fn update_info(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = require_user(&state, &session).await?;

    let mut username: Option<String> = None;
    let mut email: Option<String> = None;
    let mut picture: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart payload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "username" => {
                username = Some(field.text().await.map_err(|e| {
                    ApiError::validation(format!("Invalid username field: {e}"))
                })?);
            }
            "email" => {
                email = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::validation(format!("Invalid email field: {e}")))?,
                );
            }
            "picture" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Invalid picture field: {e}")))?;

                // An empty file input just means "keep the current picture"
                if !bytes.is_empty() {
                    picture = Some((file_name, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    let username = validate_username(username.as_deref().unwrap_or(&user.username))?.to_string();
    let email = validate_email(email.as_deref().unwrap_or(&user.email))?.to_string();

    // Uniqueness only matters for values that actually changed
    if username != user.username {
        let taken = state
            .store
            .get_user_by_username(&username)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to check username: {e}")))?;
        if taken.is_some() {
            return Err(ApiError::conflict(
                "Username taken, please choose another one",
            ));
        }
    }

    if email != user.email {
        let taken = state
            .store
            .get_user_by_email(&email)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to check email: {e}")))?;
        if taken.is_some() {
            return Err(ApiError::conflict(
                "Email already registered, please choose another one",
            ));
        }
    }

    if let Some((file_name, bytes)) = picture {
        let stored = state
            .images
            .save_picture(&file_name, bytes)
            .await
            .map_err(|e| match e {
                ImageError::UnsupportedType(_) | ImageError::Process(_) => {
                    ApiError::validation(e.to_string())
                }
                other => ApiError::internal(other.to_string()),
            })?;

        state
            .store
            .set_user_image(user.id, &stored)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store picture: {e}")))?;
    }

    let updated = state
        .store
        .update_user_profile(user.id, &username, &email)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to update profile: {e}")))?;

    tracing::info!("Account info updated for user: {}", updated.username);

    Ok(Json(ApiResponse::success(updated.into())))
}
