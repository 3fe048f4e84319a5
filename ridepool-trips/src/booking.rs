use ridepool_core::{CoreError, CoreResult, StoreError, UnitOfWorkFactory};
use ridepool_shared::{Booking, BookingStatus, Trip, TripStatus};
use std::sync::Arc;
use tracing::info;

/// Seat requests and their approval. The only writer of `available_seats`.
///
/// Approve and reject run inside one unit of work that locks the booking and
/// then its trip, so concurrent approvals on one trip queue up behind each
/// other and can never take more seats than the trip has.
pub struct BookingWorkflow {
    uow: Arc<dyn UnitOfWorkFactory>,
}

impl BookingWorkflow {
    pub fn new(uow: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow }
    }

    /// Request a seat. The booking starts out pending and holds no seat.
    pub async fn create(&self, trip_id: i64, passenger_id: i64) -> CoreResult<Booking> {
        let mut uow = self.uow.begin().await?;

        let trip = uow
            .find_trip(trip_id)
            .await?
            .ok_or(CoreError::TripNotFound(trip_id))?;

        if trip.status != TripStatus::Published {
            return Err(CoreError::TripNotAvailable(trip_id));
        }

        // Any earlier row blocks, rejected ones included
        if uow.booking_exists(trip_id, passenger_id).await? {
            return Err(CoreError::BookingAlreadyExists { trip_id, passenger_id });
        }

        let booking = uow
            .insert_booking(trip_id, passenger_id)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => {
                    CoreError::BookingAlreadyExists { trip_id, passenger_id }
                }
                other => other.into(),
            })?;

        uow.commit().await?;

        info!(trip_id, passenger_id, booking_id = booking.id, "Booking requested");
        Ok(booking)
    }

    /// Transition: Pending → Approved, taking one seat
    pub async fn approve(&self, booking_id: i64, driver_id: i64) -> CoreResult<Booking> {
        let mut uow = self.uow.begin().await?;

        let booking = uow
            .find_booking_for_update(booking_id)
            .await?
            .ok_or(CoreError::BookingNotFound(booking_id))?;
        let trip = uow
            .find_trip_for_update(booking.trip_id)
            .await?
            .ok_or(CoreError::TripNotFound(booking.trip_id))?;

        ensure_pending(&booking)?;
        ensure_driver(&trip, driver_id)?;

        if !trip.has_free_seat() || !uow.reserve_seat(trip.id).await? {
            return Err(CoreError::NoAvailableSeats(trip.id));
        }

        let approved = uow.set_booking_status(booking_id, BookingStatus::Approved).await?;
        uow.commit().await?;

        info!(
            trip_id = trip.id,
            booking_id,
            seats_left = trip.available_seats - 1,
            "Booking approved"
        );
        Ok(approved)
    }

    /// Transition: Pending → Rejected. Seats are untouched.
    pub async fn reject(&self, booking_id: i64, driver_id: i64) -> CoreResult<Booking> {
        let mut uow = self.uow.begin().await?;

        let booking = uow
            .find_booking_for_update(booking_id)
            .await?
            .ok_or(CoreError::BookingNotFound(booking_id))?;
        let trip = uow
            .find_trip_for_update(booking.trip_id)
            .await?
            .ok_or(CoreError::TripNotFound(booking.trip_id))?;

        ensure_pending(&booking)?;
        ensure_driver(&trip, driver_id)?;

        let rejected = uow.set_booking_status(booking_id, BookingStatus::Rejected).await?;
        uow.commit().await?;

        info!(trip_id = trip.id, booking_id, "Booking rejected");
        Ok(rejected)
    }

    pub async fn get(&self, booking_id: i64) -> CoreResult<Booking> {
        let mut uow = self.uow.begin().await?;
        uow.find_booking(booking_id)
            .await?
            .ok_or(CoreError::BookingNotFound(booking_id))
    }

    /// Requests still waiting for the driver's decision
    pub async fn pending_for_trip(&self, trip_id: i64) -> CoreResult<Vec<Booking>> {
        let mut uow = self.uow.begin().await?;
        if uow.find_trip(trip_id).await?.is_none() {
            return Err(CoreError::TripNotFound(trip_id));
        }
        Ok(uow
            .list_trip_bookings(trip_id, Some(BookingStatus::Pending))
            .await?)
    }
}

fn ensure_pending(booking: &Booking) -> CoreResult<()> {
    if booking.status.is_terminal() {
        return Err(CoreError::BookingNotPending {
            booking_id: booking.id,
            status: booking.status,
        });
    }
    Ok(())
}

fn ensure_driver(trip: &Trip, driver_id: i64) -> CoreResult<()> {
    if trip.driver_id != driver_id {
        return Err(CoreError::Forbidden(format!(
            "user {} is not the driver of trip {}",
            driver_id, trip.id
        )));
    }
    Ok(())
}
