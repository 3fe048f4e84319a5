use std::sync::Arc;
use ridepool_trips::{BookingWorkflow, ReviewService, TripService};

#[derive(Clone)]
pub struct AppState {
    pub trips: Arc<TripService>,
    pub bookings: Arc<BookingWorkflow>,
    pub reviews: Arc<ReviewService>,
}
