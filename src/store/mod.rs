//! SQLite persistence for users and stories.
//!
//! Every operation borrows a pooled connection (or opens a transaction) for
//! its own duration only; the handle goes back to the pool when it is dropped,
//! whichever way the operation exits.

mod stories;
mod users;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::auth::password::Credential;
use crate::models::user::{NewUser, User};

/// User lookups and writes the auth core depends on.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error>;

    async fn create(&self, user: NewUser) -> Result<User, sqlx::Error>;

    /// Returns `None` when no user has this id.
    async fn update_password(
        &self,
        id: &str,
        credential: &Credential,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn update_name(&self, id: &str, name: &str) -> Result<Option<User>, sqlx::Error>;

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, sqlx::Error>;

    async fn count(&self) -> Result<i64, sqlx::Error>;
}

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(db_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// A private in-memory database with the schema applied.
    ///
    /// The pool holds exactly one connection that never expires, since each
    /// SQLite in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self, sqlx::migrate::MigrateError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
