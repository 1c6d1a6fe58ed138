use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::require_user;
use super::{
    ApiError, ApiResponse, AppState, MessageResponse, PostDraft, PostDto, PostPageDto,
    UserPostsDto,
};
use crate::api::validation::{validate_page, validate_post_content, validate_post_title};
use crate::db::{Author, User};
use crate::entities::posts;

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
}

const fn default_page() -> u64 {
    1
}

#[derive(Deserialize)]
pub struct PostRequest {
    pub title: String,
    pub content: String,
}

/// GET / and /home
/// All posts, newest first, paginated
pub async fn home(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ApiResponse<PostPageDto>>, ApiError> {
    let page = validate_page(params.page)?;

    let page_data = state
        .store
        .recent_posts(page, state.config.general.posts_per_page)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list posts: {e}")))?;

    Ok(Json(ApiResponse::success(PostPageDto::from_page(
        page_data, page,
    ))))
}

/// GET /post/{id}
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let post = state
        .store
        .get_post(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get post: {e}")))?
        .ok_or_else(|| ApiError::post_not_found(id))?;

    let author = post_author(&state, &post).await?;

    Ok(Json(ApiResponse::success(PostDto::from_model(
        post, author,
    ))))
}

/// GET /post/new
/// Empty draft for the new-post form (requires authentication)
pub async fn new_post_form(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<PostDraft>>, ApiError> {
    require_user(&state, &session).await?;

    Ok(Json(ApiResponse::success(PostDraft::default())))
}

/// POST /post/new
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<PostRequest>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let user = require_user(&state, &session).await?;

    let title = validate_post_title(&payload.title)?;
    let content = validate_post_content(&payload.content)?;

    let post = state
        .store
        .create_post(user.id, title, content)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create post: {e}")))?;

    tracing::info!("New post {} created by {}", post.id, user.username);

    Ok(Json(ApiResponse::success(PostDto::from_model(
        post,
        author_of(user),
    ))))
}

/// GET /post/{id}/update
/// Current values for the edit form; only the author may see it
pub async fn update_post_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PostDraft>>, ApiError> {
    let user = require_user(&state, &session).await?;
    let post = owned_post(&state, id, &user).await?;

    Ok(Json(ApiResponse::success(PostDraft {
        title: post.title,
        content: post.content,
    })))
}

/// POST /post/{id}/update
/// Update a post; only its author may do this
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i32>,
    Json(payload): Json<PostRequest>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let user = require_user(&state, &session).await?;
    owned_post(&state, id, &user).await?;

    let title = validate_post_title(&payload.title)?;
    let content = validate_post_content(&payload.content)?;

    let post = state
        .store
        .update_post(id, title, content)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to update post: {e}")))?
        .ok_or_else(|| ApiError::post_not_found(id))?;

    Ok(Json(ApiResponse::success(PostDto::from_model(
        post,
        author_of(user),
    ))))
}

/// POST /post/{id}/delete
/// Delete a post; only its author may do this
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = require_user(&state, &session).await?;
    owned_post(&state, id, &user).await?;

    let deleted = state
        .store
        .delete_post(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to delete post: {e}")))?;

    if !deleted {
        return Err(ApiError::post_not_found(id));
    }

    tracing::info!("Post {} deleted by {}", id, user.username);

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Your post has been deleted",
    ))))
}

/// GET /user/{username}
/// One user's posts, newest first, paginated
pub async fn user_posts(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ApiResponse<UserPostsDto>>, ApiError> {
    let page = validate_page(params.page)?;

    let user = state
        .store
        .get_user_by_username(&username)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or_else(|| ApiError::user_not_found(&username))?;

    let page_data = state
        .store
        .posts_by_author(user.id, page, state.config.general.posts_per_page)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list posts: {e}")))?;

    Ok(Json(ApiResponse::success(UserPostsDto {
        user: author_of(user).into(),
        posts: PostPageDto::from_page(page_data, page),
    })))
}

// ============================================================================
// Helpers
// ============================================================================

/// Fetch a post and check that `user` is its author. 404 for unknown ids,
/// 403 for anyone who is not the author.
async fn owned_post(state: &AppState, id: i32, user: &User) -> Result<posts::Model, ApiError> {
    let post = state
        .store
        .get_post(id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get post: {e}")))?
        .ok_or_else(|| ApiError::post_not_found(id))?;

    if post.author_id != user.id {
        return Err(ApiError::forbidden("You can only modify your own posts"));
    }

    Ok(post)
}

async fn post_author(state: &AppState, post: &posts::Model) -> Result<Author, ApiError> {
    let author = state
        .store
        .get_user_by_id(post.author_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get author: {e}")))?
        .ok_or_else(|| ApiError::internal(format!("Post {} has no author", post.id)))?;

    Ok(author_of(author))
}

fn author_of(user: User) -> Author {
    Author {
        username: user.username,
        image_file: user.image_file,
    }
}
