pub mod booking;
pub mod review_cache;
pub mod reviews;
pub mod scheduler;
pub mod trips;

#[cfg(test)]
mod testing;

pub use booking::BookingWorkflow;
pub use review_cache::ReviewListCache;
pub use reviews::ReviewService;
pub use scheduler::{SweepReport, TripStatusScheduler, TripStatusSweep};
pub use trips::TripService;
