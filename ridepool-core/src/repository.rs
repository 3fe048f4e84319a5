use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_shared::{
    Booking, BookingStatus, Review, ReviewPageRequest, ReviewPatch, ReviewSummary, Trip, TripDraft,
};

/// Failure raised by a storage or cache adapter
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Codec error: {0}")]
    Codec(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Trip rows. `find_*` never returns soft-deleted trips.
#[async_trait]
pub trait TripRepository: Send {
    async fn insert_trip(&mut self, driver_id: i64, draft: &TripDraft) -> StoreResult<Trip>;

    async fn find_trip(&mut self, id: i64) -> StoreResult<Option<Trip>>;

    /// Same as `find_trip`, holding a row lock until the unit of work ends
    async fn find_trip_for_update(&mut self, id: i64) -> StoreResult<Option<Trip>>;

    async fn list_trips(&mut self) -> StoreResult<Vec<Trip>>;

    /// Take one seat if any is left. Returns `false` when the trip is full.
    async fn reserve_seat(&mut self, id: i64) -> StoreResult<bool>;

    async fn set_average_rating(&mut self, id: i64, rating: f64) -> StoreResult<()>;

    async fn soft_delete_trip(&mut self, id: i64) -> StoreResult<bool>;

    /// published trips with `start_time <= now` become in_progress
    async fn start_due_trips(&mut self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// in_progress trips with `start_time + duration <= now` become completed
    async fn complete_finished_trips(&mut self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait BookingRepository: Send {
    async fn insert_booking(&mut self, trip_id: i64, passenger_id: i64) -> StoreResult<Booking>;

    async fn find_booking(&mut self, id: i64) -> StoreResult<Option<Booking>>;

    async fn find_booking_for_update(&mut self, id: i64) -> StoreResult<Option<Booking>>;

    /// Any booking row for the pair, whatever its status
    async fn booking_exists(&mut self, trip_id: i64, passenger_id: i64) -> StoreResult<bool>;

    async fn booking_exists_with_status(
        &mut self,
        trip_id: i64,
        passenger_id: i64,
        status: BookingStatus,
    ) -> StoreResult<bool>;

    async fn set_booking_status(&mut self, id: i64, status: BookingStatus) -> StoreResult<Booking>;

    async fn list_trip_bookings(
        &mut self,
        trip_id: i64,
        status: Option<BookingStatus>,
    ) -> StoreResult<Vec<Booking>>;
}

/// Review rows. Deleted reviews are invisible to every method here.
#[async_trait]
pub trait ReviewRepository: Send {
    async fn insert_review(
        &mut self,
        trip_id: i64,
        author_id: i64,
        text: &str,
        rating: i16,
    ) -> StoreResult<Review>;

    async fn find_review(&mut self, id: i64) -> StoreResult<Option<Review>>;

    async fn review_exists(&mut self, trip_id: i64, author_id: i64) -> StoreResult<bool>;

    /// Writes only the fields present in `patch`
    async fn update_review(&mut self, id: i64, patch: &ReviewPatch) -> StoreResult<Review>;

    async fn delete_review(&mut self, id: i64) -> StoreResult<bool>;

    /// Mean rating of the trip's reviews, `None` when it has none
    async fn average_rating(&mut self, trip_id: i64) -> StoreResult<Option<f64>>;

    async fn list_reviews(&mut self, request: &ReviewPageRequest) -> StoreResult<Vec<ReviewSummary>>;
}

/// One transaction spanning every repository. Dropping it without
/// `commit` discards all of its writes.
#[async_trait]
pub trait UnitOfWork: TripRepository + BookingRepository + ReviewRepository + Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}
