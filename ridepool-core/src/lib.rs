pub mod cache;
pub mod clock;
pub mod repository;

use ridepool_shared::BookingStatus;
use serde::Serialize;

pub use cache::CacheStore;
pub use clock::{Clock, FixedClock, SystemClock};
pub use repository::{
    BookingRepository, ReviewRepository, StoreError, StoreResult, TripRepository, UnitOfWork,
    UnitOfWorkFactory,
};

/// Coarse classification of a failure, as seen by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidState,
    Conflict,
    Validation,
    Capacity,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Trip not found: {0}")]
    TripNotFound(i64),
    #[error("Booking not found: {0}")]
    BookingNotFound(i64),
    #[error("Review not found: {0}")]
    ReviewNotFound(i64),
    #[error("Trip {0} is not open for bookings")]
    TripNotAvailable(i64),
    #[error("Passenger {passenger_id} already has a booking on trip {trip_id}")]
    BookingAlreadyExists { trip_id: i64, passenger_id: i64 },
    #[error("Booking {booking_id} is already {status}")]
    BookingNotPending { booking_id: i64, status: BookingStatus },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("No available seats on trip {0}")]
    NoAvailableSeats(i64),
    #[error("Trip {0} is not completed yet")]
    TripNotCompleted(i64),
    #[error("User {author_id} was not an approved passenger of trip {trip_id}")]
    UserNotPassenger { trip_id: i64, author_id: i64 },
    #[error("User {author_id} already reviewed trip {trip_id}")]
    ReviewAlreadyPresent { trip_id: i64, author_id: i64 },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::TripNotFound(_)
            | CoreError::BookingNotFound(_)
            | CoreError::ReviewNotFound(_) => ErrorKind::NotFound,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::TripNotAvailable(_)
            | CoreError::BookingNotPending { .. }
            | CoreError::TripNotCompleted(_)
            | CoreError::UserNotPassenger { .. } => ErrorKind::InvalidState,
            CoreError::BookingAlreadyExists { .. } | CoreError::ReviewAlreadyPresent { .. } => {
                ErrorKind::Conflict
            }
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NoAvailableSeats(_) => ErrorKind::Capacity,
            CoreError::Storage(_) => ErrorKind::Internal,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
