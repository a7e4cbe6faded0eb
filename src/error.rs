use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::session::AuthError;
use crate::response::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    Sqlx(sqlx::Error),
    /// A recoverable auth outcome, reported inside a successful response.
    Auth(AuthError),
    Unauthenticated,
    NotFound(&'static str),
}

impl From<sqlx::Error> for AppError {
    fn from(inner: sqlx::Error) -> Self {
        AppError::Sqlx(inner)
    }
}

impl From<AuthError> for AppError {
    fn from(inner: AuthError) -> Self {
        AppError::Auth(inner)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Auth(AuthError::Unexpected(e)) => {
                tracing::error!("Auth flow failed: {}", e);
                internal_error()
            }
            AppError::Auth(e) => {
                tracing::warn!(code = e.code(), "{}", e);
                ApiResponse::failure(e.code(), e.to_string()).into_response()
            }
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(ApiResponse::failure(
                    "UNAUTHENTICATED",
                    "Could not validate credentials",
                )),
            )
                .into_response(),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::failure("NOT_FOUND", format!("{what} not found"))),
            )
                .into_response(),
            AppError::Sqlx(e) => {
                tracing::error!("Database error: {}", e);
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "data": null,
            "error": "UNEXPECTED",
            "message": "Something went wrong!",
        })),
    )
        .into_response()
}
