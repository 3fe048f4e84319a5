//! In-process adapters for the storage and cache ports.
//!
//! `MemoryUnitOfWorkFactory` hands out units of work that hold an exclusive
//! lock on the whole data set and write into a private copy; `commit` swaps
//! the copy in, dropping the unit of work throws it away. Transactions are
//! therefore fully serialized, which is stricter than the row locking the
//! Postgres adapter relies on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ridepool_core::{
    BookingRepository, CacheStore, ReviewRepository, StoreError, StoreResult, TripRepository,
    UnitOfWork, UnitOfWorkFactory,
};
use ridepool_shared::{
    Booking, BookingStatus, Review, ReviewPageRequest, ReviewPatch, ReviewSummary, Trip, TripDraft,
    TripStatus,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone)]
struct StoredReview {
    review: Review,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    trips: BTreeMap<i64, Trip>,
    bookings: BTreeMap<i64, Booking>,
    reviews: BTreeMap<i64, StoredReview>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn live_trip_mut(&mut self, id: i64) -> Option<&mut Trip> {
        self.trips.get_mut(&id).filter(|t| t.deleted_at.is_none())
    }

    fn live_reviews(&self) -> impl Iterator<Item = &Review> {
        self.reviews
            .values()
            .filter(|r| r.deleted_at.is_none())
            .map(|r| &r.review)
    }
}

#[derive(Clone, Default)]
pub struct MemoryUnitOfWorkFactory {
    tables: Arc<AsyncMutex<Tables>>,
}

impl MemoryUnitOfWorkFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnitOfWorkFactory for MemoryUnitOfWorkFactory {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl TripRepository for MemoryUnitOfWork {
    async fn insert_trip(&mut self, driver_id: i64, draft: &TripDraft) -> StoreResult<Trip> {
        let now = Utc::now();
        let id = self.working.next_id();
        let trip = Trip {
            id,
            driver_id,
            car_id: draft.car_id,
            origin: draft.origin.clone(),
            destination: draft.destination.clone(),
            start_time: draft.start_time,
            duration_min: draft.duration_min,
            total_seats: draft.total_seats,
            available_seats: draft.total_seats,
            price: draft.price,
            status: TripStatus::Published,
            average_rating: 0.0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.working.trips.insert(id, trip.clone());
        Ok(trip)
    }

    async fn find_trip(&mut self, id: i64) -> StoreResult<Option<Trip>> {
        Ok(self.working.live_trip_mut(id).map(|t| t.clone()))
    }

    async fn find_trip_for_update(&mut self, id: i64) -> StoreResult<Option<Trip>> {
        self.find_trip(id).await
    }

    async fn list_trips(&mut self) -> StoreResult<Vec<Trip>> {
        let mut trips: Vec<Trip> = self
            .working
            .trips
            .values()
            .filter(|t| t.deleted_at.is_none())
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        Ok(trips)
    }

    async fn reserve_seat(&mut self, id: i64) -> StoreResult<bool> {
        match self.working.live_trip_mut(id) {
            Some(trip) if trip.available_seats > 0 => {
                trip.available_seats -= 1;
                trip.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_average_rating(&mut self, id: i64, rating: f64) -> StoreResult<()> {
        if let Some(trip) = self.working.trips.get_mut(&id) {
            trip.average_rating = rating;
            trip.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn soft_delete_trip(&mut self, id: i64) -> StoreResult<bool> {
        match self.working.live_trip_mut(id) {
            Some(trip) => {
                let now = Utc::now();
                trip.deleted_at = Some(now);
                trip.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn start_due_trips(&mut self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut changed = 0;
        for trip in self.working.trips.values_mut() {
            if trip.deleted_at.is_none()
                && trip.status == TripStatus::Published
                && trip.start_time <= now
            {
                trip.status = TripStatus::InProgress;
                trip.updated_at = Utc::now();
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn complete_finished_trips(&mut self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut changed = 0;
        for trip in self.working.trips.values_mut() {
            if trip.deleted_at.is_none()
                && trip.status == TripStatus::InProgress
                && trip.end_time() <= now
            {
                trip.status = TripStatus::Completed;
                trip.updated_at = Utc::now();
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl BookingRepository for MemoryUnitOfWork {
    async fn insert_booking(&mut self, trip_id: i64, passenger_id: i64) -> StoreResult<Booking> {
        if self.booking_exists(trip_id, passenger_id).await? {
            return Err(StoreError::UniqueViolation(format!(
                "booking ({trip_id}, {passenger_id})"
            )));
        }
        let now = Utc::now();
        let id = self.working.next_id();
        let booking = Booking {
            id,
            trip_id,
            passenger_id,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.working.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn find_booking(&mut self, id: i64) -> StoreResult<Option<Booking>> {
        Ok(self.working.bookings.get(&id).cloned())
    }

    async fn find_booking_for_update(&mut self, id: i64) -> StoreResult<Option<Booking>> {
        self.find_booking(id).await
    }

    async fn booking_exists(&mut self, trip_id: i64, passenger_id: i64) -> StoreResult<bool> {
        Ok(self
            .working
            .bookings
            .values()
            .any(|b| b.trip_id == trip_id && b.passenger_id == passenger_id))
    }

    async fn booking_exists_with_status(
        &mut self,
        trip_id: i64,
        passenger_id: i64,
        status: BookingStatus,
    ) -> StoreResult<bool> {
        Ok(self.working.bookings.values().any(|b| {
            b.trip_id == trip_id && b.passenger_id == passenger_id && b.status == status
        }))
    }

    async fn set_booking_status(&mut self, id: i64, status: BookingStatus) -> StoreResult<Booking> {
        let booking = self
            .working
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::Database(format!("booking {id} vanished")))?;
        booking.status = status;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn list_trip_bookings(
        &mut self,
        trip_id: i64,
        status: Option<BookingStatus>,
    ) -> StoreResult<Vec<Booking>> {
        Ok(self
            .working
            .bookings
            .values()
            .filter(|b| b.trip_id == trip_id && status.map_or(true, |s| b.status == s))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReviewRepository for MemoryUnitOfWork {
    async fn insert_review(
        &mut self,
        trip_id: i64,
        author_id: i64,
        text: &str,
        rating: i16,
    ) -> StoreResult<Review> {
        if self.review_exists(trip_id, author_id).await? {
            return Err(StoreError::UniqueViolation(format!(
                "review ({trip_id}, {author_id})"
            )));
        }
        let now = Utc::now();
        let id = self.working.next_id();
        let review = Review {
            id,
            trip_id,
            author_id,
            text: text.to_string(),
            rating,
            created_at: now,
            updated_at: now,
        };
        self.working.reviews.insert(
            id,
            StoredReview { review: review.clone(), deleted_at: None },
        );
        Ok(review)
    }

    async fn find_review(&mut self, id: i64) -> StoreResult<Option<Review>> {
        Ok(self
            .working
            .reviews
            .get(&id)
            .filter(|r| r.deleted_at.is_none())
            .map(|r| r.review.clone()))
    }

    async fn review_exists(&mut self, trip_id: i64, author_id: i64) -> StoreResult<bool> {
        Ok(self
            .working
            .live_reviews()
            .any(|r| r.trip_id == trip_id && r.author_id == author_id))
    }

    async fn update_review(&mut self, id: i64, patch: &ReviewPatch) -> StoreResult<Review> {
        let stored = self
            .working
            .reviews
            .get_mut(&id)
            .filter(|r| r.deleted_at.is_none())
            .ok_or_else(|| StoreError::Database(format!("review {id} vanished")))?;
        if let Some(text) = &patch.text {
            stored.review.text = text.clone();
        }
        if let Some(rating) = patch.rating {
            stored.review.rating = rating;
        }
        stored.review.updated_at = Utc::now();
        Ok(stored.review.clone())
    }

    async fn delete_review(&mut self, id: i64) -> StoreResult<bool> {
        match self.working.reviews.get_mut(&id) {
            Some(stored) if stored.deleted_at.is_none() => {
                stored.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn average_rating(&mut self, trip_id: i64) -> StoreResult<Option<f64>> {
        let ratings: Vec<f64> = self
            .working
            .live_reviews()
            .filter(|r| r.trip_id == trip_id)
            .map(|r| f64::from(r.rating))
            .collect();
        if ratings.is_empty() {
            return Ok(None);
        }
        Ok(Some(ratings.iter().sum::<f64>() / ratings.len() as f64))
    }

    async fn list_reviews(&mut self, request: &ReviewPageRequest) -> StoreResult<Vec<ReviewSummary>> {
        let mut matching: Vec<&Review> = self
            .working
            .live_reviews()
            .filter(|r| request.trip_id.map_or(true, |id| r.trip_id == id))
            .filter(|r| request.author_id.map_or(true, |id| r.author_id == id))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(matching
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.page_size as usize)
            .map(Review::summary)
            .collect())
    }
}

/// Process-local cache with per-entry expiry. `set_unavailable(true)` makes
/// every call fail, standing in for an unreachable cache server.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    ttls: Mutex<HashMap<String, Duration>>,
    unavailable: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Live (unexpired) keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, (_, expires))| *expires > now)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// TTL most recently requested for `key`
    pub fn last_ttl(&self, key: &str) -> Option<Duration> {
        self.ttls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Cache("cache unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.check_available()?;
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        self.ttls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), ttl);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<()> {
        self.check_available()?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn draft(seats: i32) -> TripDraft {
        TripDraft {
            car_id: 1,
            origin: "Grozny".into(),
            destination: "Nalchik".into(),
            start_time: Utc::now() + ChronoDuration::hours(2),
            duration_min: 120,
            total_seats: seats,
            price: 800,
        }
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_discards_writes() {
        let factory = MemoryUnitOfWorkFactory::new();

        let mut uow = factory.begin().await.unwrap();
        let trip = uow.insert_trip(1, &draft(2)).await.unwrap();
        drop(uow);

        let mut uow = factory.begin().await.unwrap();
        assert!(uow.find_trip(trip.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_committed_writes_are_visible() {
        let factory = MemoryUnitOfWorkFactory::new();

        let mut uow = factory.begin().await.unwrap();
        let trip = uow.insert_trip(1, &draft(1)).await.unwrap();
        assert!(uow.reserve_seat(trip.id).await.unwrap());
        assert!(!uow.reserve_seat(trip.id).await.unwrap());
        uow.commit().await.unwrap();

        let mut uow = factory.begin().await.unwrap();
        let stored = uow.find_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(stored.available_seats, 0);
    }

    #[tokio::test]
    async fn test_duplicate_booking_is_a_unique_violation() {
        let factory = MemoryUnitOfWorkFactory::new();
        let mut uow = factory.begin().await.unwrap();
        let trip = uow.insert_trip(1, &draft(2)).await.unwrap();

        uow.insert_booking(trip.id, 7).await.unwrap();
        let err = uow.insert_booking(trip.id, 7).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_deleted_reviews_leave_the_average() {
        let factory = MemoryUnitOfWorkFactory::new();
        let mut uow = factory.begin().await.unwrap();
        let trip = uow.insert_trip(1, &draft(2)).await.unwrap();

        let first = uow.insert_review(trip.id, 10, "fine", 4).await.unwrap();
        uow.insert_review(trip.id, 11, "great", 5).await.unwrap();
        assert_eq!(uow.average_rating(trip.id).await.unwrap(), Some(4.5));

        assert!(uow.delete_review(first.id).await.unwrap());
        assert!(!uow.delete_review(first.id).await.unwrap());
        assert_eq!(uow.average_rating(trip.id).await.unwrap(), Some(5.0));
        assert!(uow.find_review(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_expiry_and_outage() {
        let cache = MemoryCache::new();
        cache.set_with_ttl("a", "1", Duration::from_secs(60)).await.unwrap();
        cache.set_with_ttl("b", "2", Duration::from_millis(0)).await.unwrap();

        assert_eq!(cache.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(cache.get("b").await.unwrap(), None);
        assert_eq!(cache.keys(), vec!["a".to_string()]);

        cache.set_unavailable(true);
        assert!(cache.get("a").await.is_err());
        cache.set_unavailable(false);

        cache.delete(&["a".to_string()]).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
    }
}
