use super::{RepositoryError, SequenceRepository};
use crate::DbPool;

pub struct SqlSequenceRepository {
    pool: DbPool,
}

impl SqlSequenceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SequenceRepository for SqlSequenceRepository {
    async fn next_value(&self, code: &str) -> Result<u64, RepositoryError> {
        // Single statement, so two callers can never draw the same number.
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO sequence (code, next_value) VALUES (?, 2)
             ON CONFLICT(code) DO UPDATE SET next_value = next_value + 1
             RETURNING next_value - 1",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        u64::try_from(value).map_err(|error| RepositoryError::Decode(error.to_string()))
    }
}
