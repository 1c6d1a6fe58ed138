use axum::Json;
use serde::Serialize;

use super::ApiResponse;

#[derive(Serialize)]
pub struct AboutResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

/// GET /about
pub async fn about() -> Json<ApiResponse<AboutResponse>> {
    Json(ApiResponse::success(AboutResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        description: "A small blogging service: accounts, posts and not much else",
    }))
}
