use sqlx::types::Json;

use super::{now, Store};
use crate::models::story::{Contribution, Story, UpdateStory};

impl Store {
    pub async fn create_story(
        &self,
        title: &str,
        contributions: &[Contribution],
        created_by: Option<&str>,
    ) -> Result<Story, sqlx::Error> {
        let created_at = now();
        sqlx::query_as::<_, Story>(
            "INSERT INTO stories (id, title, contributions, created_by, story_image, created_at, updated_at) \
             VALUES (?, ?, ?, ?, NULL, ?, ?) RETURNING *",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(title)
        .bind(Json(contributions))
        .bind(created_by)
        .bind(created_at)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_story(&self, id: &str) -> Result<Option<Story>, sqlx::Error> {
        sqlx::query_as::<_, Story>("SELECT * FROM stories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_stories(&self, limit: i64, offset: i64) -> Result<Vec<Story>, sqlx::Error> {
        sqlx::query_as::<_, Story>(
            "SELECT * FROM stories ORDER BY created_at, id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Applies the fields present in `changes`. `None` if the story doesn't exist.
    pub async fn update_story(
        &self,
        id: &str,
        changes: UpdateStory,
    ) -> Result<Option<Story>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = sqlx::query_as::<_, Story>("SELECT * FROM stories WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let title = changes.title.unwrap_or(current.title);
        let contributions = changes.contributions.unwrap_or(current.contributions.0);
        let created_by = changes.created_by.or(current.created_by);
        let story_image = changes.story_image.or(current.story_image);

        let updated = sqlx::query_as::<_, Story>(
            "UPDATE stories SET title = ?, contributions = ?, created_by = ?, story_image = ?, updated_at = ? \
             WHERE id = ? RETURNING *",
        )
        .bind(title)
        .bind(Json(contributions))
        .bind(created_by)
        .bind(story_image)
        .bind(now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Appends to the contribution list. `None` if the story doesn't exist.
    pub async fn add_contribution(
        &self,
        id: &str,
        contribution: Contribution,
    ) -> Result<Option<Story>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = sqlx::query_as::<_, Story>("SELECT * FROM stories WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut contributions = current.contributions.0;
        contributions.push(contribution);

        let updated = sqlx::query_as::<_, Story>(
            "UPDATE stories SET contributions = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(Json(contributions))
        .bind(now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Returns whether a story was removed.
    pub async fn delete_story(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM stories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
