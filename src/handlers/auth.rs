use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    Json,
};

use crate::{
    auth::{gate::bearer_token, AuthError, CurrentUser, IssuedSession, TokenError},
    error::AppError,
    models::user::{
        AuthResponse, ChangePassword, CreateUser, LoginPayload, TokenResponse, UpdateProfile,
        User, UserSummary,
    },
    response::{ApiResponse, Page, PageQuery},
    store::UserStore,
    AppState,
};

fn auth_response(session: IssuedSession) -> AuthResponse {
    AuthResponse {
        user: session.user.summary(),
        access_token: session.access_token,
        refresh_token: session.refresh_token,
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    let session = state
        .sessions()
        .login(&payload.email, &payload.password)
        .await?;

    Ok(ApiResponse::ok(auth_response(session), "Login Successfull"))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    let session = state
        .sessions()
        .signup(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok(ApiResponse::ok(auth_response(session), "Signup Successfull"))
}

/// Exchanges the refresh token in `Authorization` for a new access token.
/// A bare token without the `Bearer` scheme is accepted too.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiResponse<TokenResponse>, AppError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| bearer_token(value).unwrap_or(value))
        .ok_or(AuthError::InvalidToken(TokenError::Missing))?;

    let token = state.sessions().refresh(raw)?;

    Ok(ApiResponse::ok(
        TokenResponse {
            token,
            token_type: None,
        },
        "Refreshed token generated successfully",
    ))
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ChangePassword>,
) -> Result<ApiResponse<TokenResponse>, AppError> {
    let token = state
        .sessions()
        .change_password(&user, &payload.old_password, &payload.new_password)
        .await?;

    Ok(ApiResponse::ok(
        TokenResponse {
            token,
            token_type: Some("bearer"),
        },
        "Password changed successfully",
    ))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfile>,
) -> Result<ApiResponse<UserSummary>, AppError> {
    let updated = state
        .store
        .update_name(&user.id, payload.name.trim())
        .await?
        .ok_or(AuthError::UserNotFound)?;

    tracing::info!(user_id = %updated.id, "profile updated");
    Ok(ApiResponse::ok(updated.summary(), "Profile updated successfully"))
}

pub async fn list_users(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Page<User>>, AppError> {
    let users = state.store.list(query.limit(), query.offset()).await?;
    let total = state.store.count().await?;

    Ok(ApiResponse::ok(
        Page {
            items: users,
            total,
            current_page: query.page(),
            total_pages: query.total_pages(total),
        },
        "All users fetched successfully",
    ))
}
