use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_core::{StoreError, StoreResult, TripRepository};
use ridepool_shared::{Trip, TripDraft};

use crate::database::{db_error, status_error, PgUnitOfWork};

const TRIP_COLUMNS: &str = "id, driver_id, car_id, origin, destination, start_time, duration_min, \
     total_seats, available_seats, price, status, average_rating, created_at, updated_at, deleted_at";

#[derive(sqlx::FromRow)]
struct TripRow {
    id: i64,
    driver_id: i64,
    car_id: i64,
    origin: String,
    destination: String,
    start_time: DateTime<Utc>,
    duration_min: i32,
    total_seats: i32,
    available_seats: i32,
    price: i64,
    status: String,
    average_rating: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            id: row.id,
            driver_id: row.driver_id,
            car_id: row.car_id,
            origin: row.origin,
            destination: row.destination,
            start_time: row.start_time,
            duration_min: row.duration_min,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            price: row.price,
            status: row.status.parse().map_err(status_error)?,
            average_rating: row.average_rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[async_trait]
impl TripRepository for PgUnitOfWork {
    async fn insert_trip(&mut self, driver_id: i64, draft: &TripDraft) -> StoreResult<Trip> {
        let sql = format!(
            r#"
            INSERT INTO trips (driver_id, car_id, origin, destination, start_time, duration_min,
                               total_seats, available_seats, price, status, average_rating)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8, 'published', 0)
            RETURNING {TRIP_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(driver_id)
            .bind(draft.car_id)
            .bind(&draft.origin)
            .bind(&draft.destination)
            .bind(draft.start_time)
            .bind(draft.duration_min)
            .bind(draft.total_seats)
            .bind(draft.price)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.try_into()
    }

    async fn find_trip(&mut self, id: i64) -> StoreResult<Option<Trip>> {
        let sql = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.map(Trip::try_from).transpose()
    }

    async fn find_trip_for_update(&mut self, id: i64) -> StoreResult<Option<Trip>> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        );
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.map(Trip::try_from).transpose()
    }

    async fn list_trips(&mut self) -> StoreResult<Vec<Trip>> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE deleted_at IS NULL ORDER BY start_time DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn reserve_seat(&mut self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET available_seats = available_seats - 1, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL AND available_seats > 0
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_average_rating(&mut self, id: i64, rating: f64) -> StoreResult<()> {
        sqlx::query("UPDATE trips SET average_rating = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(rating)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn soft_delete_trip(&mut self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE trips SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn start_due_trips(&mut self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET status = 'in_progress', updated_at = NOW()
            WHERE status = 'published' AND start_time <= $1 AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }

    async fn complete_finished_trips(&mut self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET status = 'completed', updated_at = NOW()
            WHERE status = 'in_progress'
              AND start_time + make_interval(mins => duration_min) <= $1
              AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}
