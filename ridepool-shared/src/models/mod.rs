pub mod booking;
pub mod review;
pub mod trip;

pub use booking::{Booking, BookingStatus};
pub use review::{
    Review, ReviewDraft, ReviewPage, ReviewPageRequest, ReviewPatch, ReviewQuery, ReviewSummary,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use trip::{Trip, TripDraft, TripStatus};

/// Raised when a status column holds a value outside the known lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);
