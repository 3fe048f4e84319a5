use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_core::{BookingRepository, StoreError, StoreResult};
use ridepool_shared::{Booking, BookingStatus};

use crate::database::{db_error, status_error, PgUnitOfWork};

const BOOKING_COLUMNS: &str = "id, trip_id, passenger_id, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    trip_id: i64,
    passenger_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            trip_id: row.trip_id,
            passenger_id: row.passenger_id,
            status: row.status.parse().map_err(status_error)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BookingRepository for PgUnitOfWork {
    async fn insert_booking(&mut self, trip_id: i64, passenger_id: i64) -> StoreResult<Booking> {
        let sql = format!(
            "INSERT INTO bookings (trip_id, passenger_id, status) VALUES ($1, $2, 'pending') \
             RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(trip_id)
            .bind(passenger_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.try_into()
    }

    async fn find_booking(&mut self, id: i64) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn find_booking_for_update(&mut self, id: i64) -> StoreResult<Option<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn booking_exists(&mut self, trip_id: i64, passenger_id: i64) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE trip_id = $1 AND passenger_id = $2 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(trip_id)
        .bind(passenger_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn booking_exists_with_status(
        &mut self,
        trip_id: i64,
        passenger_id: i64,
        status: BookingStatus,
    ) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE trip_id = $1 AND passenger_id = $2 AND status = $3 AND deleted_at IS NULL
            )
            "#,
        )
        .bind(trip_id)
        .bind(passenger_id)
        .bind(status.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)
    }

    async fn set_booking_status(&mut self, id: i64, status: BookingStatus) -> StoreResult<Booking> {
        let sql = format!(
            "UPDATE bookings SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)?;

        row.try_into()
    }

    async fn list_trip_bookings(
        &mut self,
        trip_id: i64,
        status: Option<BookingStatus>,
    ) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE trip_id = $1 AND ($2::TEXT IS NULL OR status = $2) AND deleted_at IS NULL \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(trip_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}
