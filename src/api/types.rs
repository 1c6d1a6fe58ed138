use serde::Serialize;

use crate::db;
use crate::entities::posts;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Who the session belongs to, if anyone. Returned by the GET side of the
/// account-flow routes so clients know whether to show a form or move on.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub created_at: String,
}

impl From<db::User> for UserDto {
    fn from(user: db::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            image_url: uploads_url(&user.image_file),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct AuthorDto {
    pub username: String,
    pub image_url: String,
}

impl From<db::Author> for AuthorDto {
    fn from(author: db::Author) -> Self {
        Self {
            username: author.username,
            image_url: uploads_url(&author.image_file),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDto {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub date_posted: String,
    pub author: AuthorDto,
}

impl PostDto {
    pub fn from_model(post: posts::Model, author: db::Author) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            date_posted: post.date_posted,
            author: author.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostPageDto {
    pub posts: Vec<PostDto>,
    pub page: u64,
    pub total_pages: u64,
}

impl PostPageDto {
    pub fn from_page(page_data: db::PostPage, page: u64) -> Self {
        Self {
            posts: page_data
                .posts
                .into_iter()
                .map(|(post, author)| PostDto::from_model(post, author))
                .collect(),
            page,
            total_pages: page_data.total_pages,
        }
    }
}

/// A user's profile header plus one page of their posts.
#[derive(Debug, Serialize)]
pub struct UserPostsDto {
    pub user: AuthorDto,
    pub posts: PostPageDto,
}

/// Prefill values for the post form (empty for a new post, the stored
/// values when editing).
#[derive(Debug, Default, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
}

fn uploads_url(file: &str) -> String {
    format!("/uploads/{file}")
}
