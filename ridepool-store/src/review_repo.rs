use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_core::{ReviewRepository, StoreResult};
use ridepool_shared::{Review, ReviewPageRequest, ReviewPatch, ReviewSummary};

use crate::database::{db_error, PgUnitOfWork};

const REVIEW_COLUMNS: &str = "id, trip_id, author_id, text, rating, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    trip_id: i64,
    author_id: i64,
    text: String,
    rating: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            trip_id: row.trip_id,
            author_id: row.author_id,
            text: row.text,
            rating: row.rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ReviewRepository for PgUnitOfWork {
    async fn insert_review(
        &mut self,
        trip_id: i64,
        author_id: i64,
        text: &str,
        rating: i16,
    ) -> StoreResult<Review> {
        let sql = format!(
            "INSERT INTO reviews (trip_id, author_id, text, rating) VALUES ($1, $2, $3, $4) \
             RETURNING {REVIEW_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(trip_id)
            .bind(author_id)
            .bind(text)
            .bind(rating)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(row.into())
    }

    async fn find_review(&mut self, id: i64) -> StoreResult<Option<Review>> {
        let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(row.map(Review::from))
    }

    async fn review_exists(&mut self, trip_id: i64, author_id: i64) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM reviews
                WHERE trip_id = $1 AND author_id = $2 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(trip_id)
        .bind(author_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn update_review(&mut self, id: i64, patch: &ReviewPatch) -> StoreResult<Review> {
        let sql = format!(
            r#"
            UPDATE reviews
            SET text = COALESCE($2, text),
                rating = COALESCE($3, rating),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {REVIEW_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id)
            .bind(patch.text.as_deref())
            .bind(patch.rating)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(row.into())
    }

    async fn delete_review(&mut self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE reviews SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn average_rating(&mut self, trip_id: i64) -> StoreResult<Option<f64>> {
        sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(rating)::DOUBLE PRECISION FROM reviews WHERE trip_id = $1 AND deleted_at IS NULL",
        )
        .bind(trip_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn list_reviews(&mut self, request: &ReviewPageRequest) -> StoreResult<Vec<ReviewSummary>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, trip_id, author_id, text, rating, created_at, updated_at
            FROM reviews
            WHERE deleted_at IS NULL
              AND ($1::BIGINT IS NULL OR trip_id = $1)
              AND ($2::BIGINT IS NULL OR author_id = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(request.trip_id)
        .bind(request.author_id)
        .bind(i64::from(request.page_size))
        .bind(request.offset() as i64)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(|row| Review::from(row).summary()).collect())
    }
}
