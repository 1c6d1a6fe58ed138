use std::sync::LazyLock;

use regex::Regex;

use super::ApiError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    let trimmed = username.trim();
    if !(5..=20).contains(&trimmed.chars().count()) {
        return Err(ApiError::validation(
            "Username must be between 5 and 20 characters",
        ));
    }
    Ok(trimmed)
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    if !EMAIL_RE.is_match(trimmed) {
        return Err(ApiError::validation("Invalid email address"));
    }
    Ok(trimmed)
}

/// Check a new password together with its confirmation field.
pub fn validate_new_password<'a>(password: &'a str, confirm: &str) -> Result<&'a str, ApiError> {
    if password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }
    if password != confirm {
        return Err(ApiError::validation("Passwords do not match"));
    }
    Ok(password)
}

pub fn validate_post_title(title: &str) -> Result<&str, ApiError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Title cannot be empty"));
    }
    if trimmed.chars().count() > 140 {
        return Err(ApiError::validation("Title must be 140 characters or less"));
    }
    Ok(trimmed)
}

pub fn validate_post_content(content: &str) -> Result<&str, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::validation("Content cannot be empty"));
    }
    Ok(content)
}

pub fn validate_page(page: u64) -> Result<u64, ApiError> {
    if page == 0 {
        return Err(ApiError::validation(
            "Invalid page number: pages start at 1",
        ));
    }
    Ok(page)
}
