//! Connection pool bootstrap: builds the `sqlx::PgPool` and applies the
//! embedded schema before the pool is handed to any repository.

use crate::errors::DbError;
use crate::schema::apply_schema;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connects to `database_url`, applies the schema if it is not already
    /// present, and returns a pool ready for repository use.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        if database_url.is_empty() {
            return Err(DbError::ConfigurationError("DATABASE_URL is empty".into()));
        }

        info!("connecting to the settlement store");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        apply_schema(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wraps an already-migrated pool (the schema having been applied by
    /// the caller, e.g. `#[sqlx::test]`) without reconnecting.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}
