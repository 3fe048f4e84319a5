pub mod models;

pub use models::{
    Booking, BookingStatus, Review, ReviewDraft, ReviewPage, ReviewPageRequest, ReviewPatch,
    ReviewQuery, ReviewSummary, Trip, TripDraft, TripStatus, UnknownStatus, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
