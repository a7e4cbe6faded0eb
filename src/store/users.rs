use async_trait::async_trait;

use super::{now, Store, UserStore};
use crate::auth::password::Credential;
use crate::models::user::{NewUser, User};

#[async_trait]
impl UserStore for Store {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create(&self, user: NewUser) -> Result<User, sqlx::Error> {
        let created_at = now();
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email, password_hash, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.credential.as_str())
        .bind(false)
        .bind(created_at)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_password(
        &self,
        id: &str,
        credential: &Credential,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(credential.as_str())
        .bind(now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_name(&self, id: &str, name: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("UPDATE users SET name = ?, updated_at = ? WHERE id = ? RETURNING *")
            .bind(name)
            .bind(now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at, id LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
    }

    async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password;
    use crate::store::is_unique_violation;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".into(),
            email: email.into(),
            credential: Credential::from_stored("$argon2id$placeholder"),
        }
    }

    #[tokio::test]
    async fn create_then_find() {
        let store = Store::in_memory().await.unwrap();
        let created = store.create(new_user("ada@x.com")).await.unwrap();

        assert!(!created.id.is_empty());
        assert!(!created.is_active);

        let by_email = store.find_by_email("ada@x.com").await.unwrap().unwrap();
        let by_id = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_id.email, "ada@x.com");
        assert!(store.find_by_email("nobody@x.com").await.unwrap().is_none());
        assert!(store.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = Store::in_memory().await.unwrap();
        store.create(new_user("ada@x.com")).await.unwrap();

        let err = store.create(new_user("ada@x.com")).await.unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn updates_touch_only_the_target_row() {
        let store = Store::in_memory().await.unwrap();
        let ada = store.create(new_user("ada@x.com")).await.unwrap();
        let bob = store.create(new_user("bob@x.com")).await.unwrap();

        let credential = password::hash("new-secret").unwrap();
        let updated = store.update_password(&ada.id, &credential).await.unwrap().unwrap();
        assert!(password::verify("new-secret", &updated.credential()));

        let renamed = store.update_name(&bob.id, "Bobby").await.unwrap().unwrap();
        assert_eq!(renamed.name, "Bobby");

        let bob_again = store.find_by_id(&bob.id).await.unwrap().unwrap();
        assert_eq!(bob_again.password_hash, "$argon2id$placeholder");
        assert!(store.update_name("missing", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_pages_in_creation_order() {
        let store = Store::in_memory().await.unwrap();
        for i in 0..5 {
            store.create(new_user(&format!("u{i}@x.com"))).await.unwrap();
        }

        let first = store.list(2, 0).await.unwrap();
        let last = store.list(2, 4).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(last.len(), 1);
        assert_eq!(store.count().await.unwrap(), 5);
    }
}
