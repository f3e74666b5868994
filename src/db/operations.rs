use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::models::Identity;
use crate::db::CredentialStore;
use crate::error::DatabaseError;

const IDENTITY_COLUMNS: &str = "id, username, email, password_hash, created_at";

/// Postgres-backed identity store. Uniqueness comes from the table's
/// `UNIQUE` constraints rather than any in-process lock.
pub struct PgCredentialStore {
    pool: Arc<PgPool>,
}

impl PgCredentialStore {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| DatabaseError::QueryError(format!("migration failed: {}", e)))
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Identity>, DatabaseError> {
        let query = format!("SELECT {} FROM identities WHERE {} = $1", IDENTITY_COLUMNS, column);
        let identity = sqlx::query_as::<_, Identity>(&query)
            .bind(value)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(identity)
    }
}

/// Maps a unique-constraint violation to the field it guards.
fn map_insert_error(err: sqlx::Error) -> DatabaseError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("identities_username_key") => "username",
                _ => "email",
            };
            return DatabaseError::Duplicate(field.to_string());
        }
    }
    err.into()
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_identity(&self, identity: Identity) -> Result<Identity, DatabaseError> {
        let query = format!(
            "INSERT INTO identities (id, username, email, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            IDENTITY_COLUMNS
        );
        sqlx::query_as::<_, Identity>(&query)
            .bind(identity.id)
            .bind(&identity.username)
            .bind(&identity.email)
            .bind(&identity.password_hash)
            .bind(identity.created_at)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(map_insert_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError> {
        let query = format!("SELECT {} FROM identities WHERE id = $1", IDENTITY_COLUMNS);
        let identity = sqlx::query_as::<_, Identity>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(identity)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, DatabaseError> {
        self.find_one("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, DatabaseError> {
        self.find_one("username", username).await
    }

    async fn delete_identity(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM identities")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count as u64)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
