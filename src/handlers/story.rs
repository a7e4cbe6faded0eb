use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::story::{Contribution, CreateStory, NewContribution, StoryView, UpdateStory},
    response::{ApiResponse, PageQuery},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct StoryId {
    pub story_id: String,
}

pub async fn create_story(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateStory>,
) -> Result<ApiResponse<StoryView>, AppError> {
    let created_by = payload.created_by.unwrap_or_else(|| user.id.clone());
    let story = state
        .store
        .create_story(payload.title.trim(), &payload.contributions, Some(created_by.as_str()))
        .await?;

    tracing::info!(story_id = %story.id, user_id = %user.id, "story created");
    Ok(ApiResponse::ok(story.into(), "Story created successfully!"))
}

pub async fn update_story(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Query(StoryId { story_id }): Query<StoryId>,
    Json(mut payload): Json<UpdateStory>,
) -> Result<ApiResponse<StoryView>, AppError> {
    payload.title = payload.title.map(|title| title.trim().to_string());
    let story = state
        .store
        .update_story(&story_id, payload)
        .await?
        .ok_or(AppError::NotFound("Story"))?;

    Ok(ApiResponse::ok(story.into(), "Story updated successfully!"))
}

pub async fn delete_story(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(StoryId { story_id }): Query<StoryId>,
) -> Result<ApiResponse<()>, AppError> {
    if !state.store.delete_story(&story_id).await? {
        return Err(AppError::NotFound("Story"));
    }

    tracing::info!(story_id = %story_id, user_id = %user.id, "story deleted");
    Ok(ApiResponse::done("Story deleted successfully!"))
}

pub async fn list_stories(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Vec<StoryView>>, AppError> {
    let stories = state
        .store
        .list_stories(query.limit(), query.offset())
        .await?;

    Ok(ApiResponse::ok(
        stories.into_iter().map(StoryView::from).collect(),
        "Stories fetched successfully!",
    ))
}

pub async fn get_story(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Query(StoryId { story_id }): Query<StoryId>,
) -> Result<ApiResponse<StoryView>, AppError> {
    let story = state
        .store
        .find_story(&story_id)
        .await?
        .ok_or(AppError::NotFound("Story"))?;

    Ok(ApiResponse::ok(story.into(), "Story fetched successfully!"))
}

pub async fn add_contribution(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(StoryId { story_id }): Query<StoryId>,
    Json(payload): Json<NewContribution>,
) -> Result<ApiResponse<StoryView>, AppError> {
    let contribution = Contribution {
        user_id: payload.user_id.unwrap_or_else(|| user.id.clone()),
        content: payload.content,
    };
    let story = state
        .store
        .add_contribution(&story_id, contribution)
        .await?
        .ok_or(AppError::NotFound("Story"))?;

    Ok(ApiResponse::ok(story.into(), "Contribution added successfully!"))
}
