use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::handlers::{auth, story};
use crate::AppState;

async fn welcome() -> Json<Value> {
    Json(json!({"status": 200, "message": "Server running"}))
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/access-token", post(auth::refresh_token))
        .route("/change-password", post(auth::change_password))
        .route("/update-profile", post(auth::update_profile))
        .route("/get-all-user", get(auth::list_users))
}

fn story_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(story::create_story))
        .route("/update", put(story::update_story))
        .route("/delete", delete(story::delete_story))
        .route("/get-all-stories", get(story::list_stories))
        .route("/get-by-id", get(story::get_story))
        .route("/add-contribution", post(story::add_contribution))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .nest("/v1/auth", auth_routes())
        .nest("/v1/stories", story_routes())
        .with_state(state)
}
