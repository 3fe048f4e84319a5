use chrono::{Duration, Utc};
use ridepool_core::{Clock, FixedClock, UnitOfWorkFactory};
use ridepool_shared::{Booking, Trip, TripDraft};
use ridepool_store::{MemoryCache, MemoryUnitOfWorkFactory};
use std::sync::Arc;

use crate::{BookingWorkflow, ReviewListCache, ReviewService, TripService, TripStatusSweep};

pub const DRIVER: i64 = 100;

/// Every service wired to one in-memory store and cache
pub struct Fixture {
    pub uow: Arc<dyn UnitOfWorkFactory>,
    pub cache: Arc<MemoryCache>,
    pub clock: Arc<FixedClock>,
    pub trips: TripService,
    pub bookings: BookingWorkflow,
    pub reviews: ReviewService,
    pub sweep: TripStatusSweep,
}

impl Fixture {
    pub fn new() -> Self {
        let uow: Arc<dyn UnitOfWorkFactory> = Arc::new(MemoryUnitOfWorkFactory::new());
        let cache = Arc::new(MemoryCache::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let list_cache = ReviewListCache::new(
            cache.clone(),
            std::time::Duration::from_secs(60),
            std::time::Duration::from_secs(10),
        );

        Self {
            trips: TripService::new(uow.clone()),
            bookings: BookingWorkflow::new(uow.clone()),
            reviews: ReviewService::new(uow.clone(), list_cache),
            sweep: TripStatusSweep::new(uow.clone(), clock.clone()),
            uow,
            cache,
            clock,
        }
    }

    pub fn draft(&self, seats: i32, starts_in: Duration, duration_min: i32) -> TripDraft {
        TripDraft {
            car_id: 1,
            origin: "Grozny".to_string(),
            destination: "Vladikavkaz".to_string(),
            start_time: self.clock.now() + starts_in,
            duration_min,
            total_seats: seats,
            price: 700,
        }
    }

    pub async fn published_trip(&self, seats: i32) -> Trip {
        let draft = self.draft(seats, Duration::hours(3), 60);
        self.trips.create(DRIVER, draft).await.unwrap()
    }

    pub async fn trip(&self, id: i64) -> Trip {
        self.trips.get(id).await.unwrap()
    }

    /// A trip with the given passengers approved, then driven to completion
    pub async fn completed_trip_with(&self, passengers: &[i64]) -> (Trip, Vec<Booking>) {
        let trip = self.published_trip(passengers.len().max(1) as i32).await;
        let mut approved = Vec::new();
        for passenger in passengers {
            let booking = self.bookings.create(trip.id, *passenger).await.unwrap();
            approved.push(self.bookings.approve(booking.id, DRIVER).await.unwrap());
        }

        self.clock.advance(Duration::hours(5));
        self.sweep.run_once().await.unwrap();
        (self.trip(trip.id).await, approved)
    }
}
