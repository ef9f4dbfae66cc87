// SQLite FeedbackRepository Implementation

use crate::shift_repository::map_sqlx_error;
use async_trait::async_trait;
use shiftswap_core::domain::Feedback;
use shiftswap_core::error::Result;
use shiftswap_core::port::FeedbackRepository;
use sqlx::SqlitePool;

pub struct SqliteFeedbackRepository {
    pool: SqlitePool,
}

impl SqliteFeedbackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackRepository for SqliteFeedbackRepository {
    async fn insert(&self, feedback: &Feedback) -> Result<()> {
        sqlx::query("INSERT INTO feedback (name, email, message, created_at) VALUES (?, ?, ?, ?)")
            .bind(&feedback.name)
            .bind(&feedback.email)
            .bind(&feedback.message)
            .bind(feedback.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    #[tokio::test]
    async fn test_insert_appends() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = SqliteFeedbackRepository::new(pool.clone());

        let fb = Feedback::new(None, "a@b.c", "hello", 1).unwrap();
        repo.insert(&fb).await.unwrap();
        repo.insert(&fb).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
