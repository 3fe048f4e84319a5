use ridepool_core::{CoreError, CoreResult, UnitOfWorkFactory};
use ridepool_shared::{Trip, TripDraft};
use std::sync::Arc;
use tracing::info;

pub struct TripService {
    uow: Arc<dyn UnitOfWorkFactory>,
}

impl TripService {
    pub fn new(uow: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow }
    }

    /// Publish a trip with every seat free
    pub async fn create(&self, driver_id: i64, draft: TripDraft) -> CoreResult<Trip> {
        validate_draft(&draft)?;

        let mut uow = self.uow.begin().await?;
        let trip = uow.insert_trip(driver_id, &draft).await?;
        uow.commit().await?;

        info!(
            trip_id = trip.id,
            driver_id,
            seats = trip.total_seats,
            "Trip published: {} -> {}",
            trip.origin,
            trip.destination
        );
        Ok(trip)
    }

    pub async fn get(&self, trip_id: i64) -> CoreResult<Trip> {
        let mut uow = self.uow.begin().await?;
        uow.find_trip(trip_id)
            .await?
            .ok_or(CoreError::TripNotFound(trip_id))
    }

    pub async fn list(&self) -> CoreResult<Vec<Trip>> {
        let mut uow = self.uow.begin().await?;
        Ok(uow.list_trips().await?)
    }

    /// Soft delete. Only the trip's driver may do it.
    pub async fn delete(&self, trip_id: i64, driver_id: i64) -> CoreResult<()> {
        let mut uow = self.uow.begin().await?;
        let trip = uow
            .find_trip_for_update(trip_id)
            .await?
            .ok_or(CoreError::TripNotFound(trip_id))?;

        if trip.driver_id != driver_id {
            return Err(CoreError::Forbidden(format!(
                "user {} is not the driver of trip {}",
                driver_id, trip_id
            )));
        }

        if !uow.soft_delete_trip(trip_id).await? {
            return Err(CoreError::TripNotFound(trip_id));
        }
        uow.commit().await?;

        info!(trip_id, driver_id, "Trip deleted");
        Ok(())
    }
}

fn validate_draft(draft: &TripDraft) -> CoreResult<()> {
    if draft.origin.trim().is_empty() || draft.destination.trim().is_empty() {
        return Err(CoreError::Validation("origin and destination are required".to_string()));
    }
    if draft.total_seats <= 0 {
        return Err(CoreError::Validation("a trip needs at least one seat".to_string()));
    }
    if draft.duration_min <= 0 {
        return Err(CoreError::Validation("duration must be positive".to_string()));
    }
    if draft.price < 0 {
        return Err(CoreError::Validation("price cannot be negative".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, DRIVER};
    use chrono::Duration;
    use ridepool_core::ErrorKind;
    use ridepool_shared::TripStatus;

    #[tokio::test]
    async fn test_create_publishes_with_free_seats() {
        let fx = Fixture::new();
        let trip = fx.published_trip(4).await;

        assert_eq!(trip.status, TripStatus::Published);
        assert_eq!(trip.available_seats, 4);
        assert_eq!(trip.total_seats, 4);
        assert_eq!(trip.average_rating, 0.0);
        assert_eq!(fx.trip(trip.id).await, trip);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_drafts() {
        let fx = Fixture::new();
        let base = fx.draft(2, Duration::hours(1), 60);

        let bad = [
            TripDraft { total_seats: 0, ..base.clone() },
            TripDraft { duration_min: 0, ..base.clone() },
            TripDraft { price: -1, ..base.clone() },
            TripDraft { origin: "  ".to_string(), ..base.clone() },
        ];
        for draft in bad {
            let err = fx.trips.create(DRIVER, draft).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(fx.trips.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_start_first() {
        let fx = Fixture::new();
        let early = fx.trips.create(DRIVER, fx.draft(2, Duration::hours(1), 30)).await.unwrap();
        let late = fx.trips.create(DRIVER, fx.draft(2, Duration::hours(9), 30)).await.unwrap();

        let ids: Vec<i64> = fx.trips.list().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![late.id, early.id]);
    }

    #[tokio::test]
    async fn test_delete_is_driver_only_and_hides_trip() {
        let fx = Fixture::new();
        let trip = fx.published_trip(2).await;

        let err = fx.trips.delete(trip.id, DRIVER + 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        fx.trips.delete(trip.id, DRIVER).await.unwrap();
        let err = fx.trips.get(trip.id).await.unwrap_err();
        assert!(matches!(err, CoreError::TripNotFound(_)));
        assert!(fx.trips.list().await.unwrap().is_empty());

        let err = fx.bookings.create(trip.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
