use serde::{Deserialize, Serialize};
use sqlx::types::Json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub user_id: String,
    pub content: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub contributions: Json<Vec<Contribution>>,
    pub created_by: Option<String>,
    pub story_image: Option<String>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

/// Wire shape of a story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryView {
    pub id: String,
    pub title: String,
    pub contributions: Vec<Contribution>,
    pub image_path: Option<String>,
    pub created_by: Option<String>,
}

impl From<Story> for StoryView {
    fn from(story: Story) -> Self {
        StoryView {
            id: story.id,
            title: story.title,
            contributions: story.contributions.0,
            image_path: story.story_image,
            created_by: story.created_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateStory {
    pub title: String,
    #[serde(default)]
    pub contributions: Vec<Contribution>,
    pub created_by: Option<String>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateStory {
    pub title: Option<String>,
    pub contributions: Option<Vec<Contribution>>,
    pub created_by: Option<String>,
    pub story_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewContribution {
    pub content: String,
    pub user_id: Option<String>,
}
