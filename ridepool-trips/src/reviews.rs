use ridepool_core::{CoreError, CoreResult, StoreError, UnitOfWork, UnitOfWorkFactory};
use ridepool_shared::{
    BookingStatus, Review, ReviewDraft, ReviewPage, ReviewPatch, ReviewQuery, TripStatus,
};
use std::sync::Arc;
use tracing::info;

use crate::review_cache::ReviewListCache;

const MIN_RATING: i16 = 1;
const MAX_RATING: i16 = 5;
const MIN_TEXT_LEN: usize = 3;

/// Review writes and reads. Keeps `Trip::average_rating` equal to the mean of
/// the trip's live reviews.
///
/// Every mutation locks the trip row before touching reviews, so two writers
/// on one trip recompute the mean one after the other.
pub struct ReviewService {
    uow: Arc<dyn UnitOfWorkFactory>,
    cache: ReviewListCache,
}

impl ReviewService {
    pub fn new(uow: Arc<dyn UnitOfWorkFactory>, cache: ReviewListCache) -> Self {
        Self { uow, cache }
    }

    pub async fn create(
        &self,
        trip_id: i64,
        author_id: i64,
        draft: ReviewDraft,
    ) -> CoreResult<Review> {
        validate_rating(draft.rating)?;
        let text = validate_text(&draft.text)?;

        let mut uow = self.uow.begin().await?;

        let trip = uow
            .find_trip_for_update(trip_id)
            .await?
            .ok_or(CoreError::TripNotFound(trip_id))?;

        if trip.status != TripStatus::Completed {
            return Err(CoreError::TripNotCompleted(trip_id));
        }

        if !uow
            .booking_exists_with_status(trip_id, author_id, BookingStatus::Approved)
            .await?
        {
            return Err(CoreError::UserNotPassenger { trip_id, author_id });
        }

        if uow.review_exists(trip_id, author_id).await? {
            return Err(CoreError::ReviewAlreadyPresent { trip_id, author_id });
        }

        let review = uow
            .insert_review(trip_id, author_id, text, draft.rating)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => {
                    CoreError::ReviewAlreadyPresent { trip_id, author_id }
                }
                other => other.into(),
            })?;

        let average = refresh_average(&mut *uow, trip_id).await?;
        uow.commit().await?;
        self.cache.invalidate().await;

        info!(trip_id, author_id, review_id = review.id, average, "Review created");
        Ok(review)
    }

    pub async fn update(
        &self,
        review_id: i64,
        author_id: i64,
        patch: ReviewPatch,
    ) -> CoreResult<Review> {
        if patch.is_empty() {
            return Err(CoreError::Validation("nothing to update".to_string()));
        }
        if let Some(rating) = patch.rating {
            validate_rating(rating)?;
        }
        let patch = ReviewPatch {
            text: patch.text.as_deref().map(validate_text).transpose()?.map(str::to_string),
            rating: patch.rating,
        };

        let mut uow = self.uow.begin().await?;
        let review = lock_own_review(&mut *uow, review_id, author_id).await?;

        let updated = uow.update_review(review.id, &patch).await?;
        let average = refresh_average(&mut *uow, review.trip_id).await?;
        uow.commit().await?;
        self.cache.invalidate().await;

        info!(trip_id = review.trip_id, review_id, average, "Review updated");
        Ok(updated)
    }

    pub async fn delete(&self, review_id: i64, author_id: i64) -> CoreResult<()> {
        let mut uow = self.uow.begin().await?;
        let review = lock_own_review(&mut *uow, review_id, author_id).await?;

        if !uow.delete_review(review.id).await? {
            return Err(CoreError::ReviewNotFound(review_id));
        }
        let average = refresh_average(&mut *uow, review.trip_id).await?;
        uow.commit().await?;
        self.cache.invalidate().await;

        info!(trip_id = review.trip_id, review_id, average, "Review deleted");
        Ok(())
    }

    pub async fn get(&self, review_id: i64) -> CoreResult<Review> {
        let mut uow = self.uow.begin().await?;
        uow.find_review(review_id)
            .await?
            .ok_or(CoreError::ReviewNotFound(review_id))
    }

    pub async fn list(&self, query: ReviewQuery) -> CoreResult<ReviewPage> {
        let request = query.normalize();
        let cacheable = ReviewListCache::is_cacheable(&request);

        if cacheable {
            if let Some(items) = self.cache.get(request.page_size).await {
                return Ok(ReviewPage { items, page: request.page, page_size: request.page_size });
            }
        }

        let items = {
            let mut uow = self.uow.begin().await?;
            uow.list_reviews(&request).await?
        };

        if cacheable {
            self.cache.put(request.page_size, &items).await;
        }

        Ok(ReviewPage { items, page: request.page, page_size: request.page_size })
    }
}

/// Find the review, check ownership, then lock its trip and read the review
/// again under that lock.
async fn lock_own_review(
    uow: &mut dyn UnitOfWork,
    review_id: i64,
    author_id: i64,
) -> CoreResult<Review> {
    let review = uow
        .find_review(review_id)
        .await?
        .ok_or(CoreError::ReviewNotFound(review_id))?;

    if review.author_id != author_id {
        return Err(CoreError::Forbidden(format!(
            "user {} is not the author of review {}",
            author_id, review_id
        )));
    }

    uow.find_trip_for_update(review.trip_id)
        .await?
        .ok_or(CoreError::TripNotFound(review.trip_id))?;

    uow.find_review(review_id)
        .await?
        .ok_or(CoreError::ReviewNotFound(review_id))
}

/// Recompute the trip mean from its live reviews and store it
async fn refresh_average(uow: &mut dyn UnitOfWork, trip_id: i64) -> CoreResult<f64> {
    let average = uow.average_rating(trip_id).await?.unwrap_or(0.0);
    uow.set_average_rating(trip_id, average).await?;
    Ok(average)
}

fn validate_rating(rating: i16) -> CoreResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(CoreError::Validation(format!(
            "rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

fn validate_text(text: &str) -> CoreResult<&str> {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TEXT_LEN {
        return Err(CoreError::Validation(format!(
            "review text must be at least {} characters",
            MIN_TEXT_LEN
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, DRIVER};
    use ridepool_core::{CacheStore, ErrorKind};

    fn draft(rating: i16, text: &str) -> ReviewDraft {
        ReviewDraft { text: text.to_string(), rating }
    }

    #[tokio::test]
    async fn test_first_review_sets_average() {
        let fx = Fixture::new();
        let (trip, _) = fx.completed_trip_with(&[1]).await;
        assert_eq!(trip.average_rating, 0.0);

        let review = fx.reviews.create(trip.id, 1, draft(5, "great trip")).await.unwrap();
        assert_eq!(review.rating, 5);
        assert_eq!(fx.trip(trip.id).await.average_rating, 5.0);

        let err = fx.reviews.create(trip.id, 1, draft(1, "changed my mind")).await.unwrap_err();
        assert!(matches!(err, CoreError::ReviewAlreadyPresent { author_id: 1, .. }));
        assert_eq!(fx.trip(trip.id).await.average_rating, 5.0);
    }

    #[tokio::test]
    async fn test_average_tracks_every_mutation() {
        let fx = Fixture::new();
        let (trip, _) = fx.completed_trip_with(&[1, 2, 3]).await;

        let a = fx.reviews.create(trip.id, 1, draft(5, "lovely")).await.unwrap();
        let b = fx.reviews.create(trip.id, 2, draft(4, "fine ride")).await.unwrap();
        fx.reviews.create(trip.id, 3, draft(3, "okay")).await.unwrap();
        assert_eq!(fx.trip(trip.id).await.average_rating, 4.0);

        let patch = ReviewPatch { rating: Some(2), text: None };
        let updated = fx.reviews.update(b.id, 2, patch).await.unwrap();
        assert_eq!(updated.rating, 2);
        assert_eq!(updated.text, "fine ride");
        assert!((fx.trip(trip.id).await.average_rating - 10.0 / 3.0).abs() < 1e-9);

        fx.reviews.delete(a.id, 1).await.unwrap();
        assert_eq!(fx.trip(trip.id).await.average_rating, 2.5);

        fx.reviews.delete(b.id, 2).await.unwrap();
        assert_eq!(fx.trip(trip.id).await.average_rating, 3.0);
    }

    #[tokio::test]
    async fn test_deleting_last_review_resets_average() {
        let fx = Fixture::new();
        let (trip, _) = fx.completed_trip_with(&[1]).await;
        let review = fx.reviews.create(trip.id, 1, draft(4, "nice")).await.unwrap();

        fx.reviews.delete(review.id, 1).await.unwrap();
        assert_eq!(fx.trip(trip.id).await.average_rating, 0.0);

        let err = fx.reviews.get(review.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = fx.reviews.delete(review.id, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::ReviewNotFound(_)));
    }

    #[tokio::test]
    async fn test_review_requires_completed_trip() {
        let fx = Fixture::new();
        let trip = fx.published_trip(2).await;
        let booking = fx.bookings.create(trip.id, 1).await.unwrap();
        fx.bookings.approve(booking.id, DRIVER).await.unwrap();

        let err = fx.reviews.create(trip.id, 1, draft(5, "great")).await.unwrap_err();
        assert!(matches!(err, CoreError::TripNotCompleted(_)));

        let query = ReviewQuery { trip_id: Some(trip.id), ..Default::default() };
        assert!(fx.reviews.list(query).await.unwrap().items.is_empty());
        assert_eq!(fx.trip(trip.id).await.average_rating, 0.0);

        let err = fx.reviews.create(999, 1, draft(5, "great")).await.unwrap_err();
        assert!(matches!(err, CoreError::TripNotFound(999)));
    }

    #[tokio::test]
    async fn test_review_requires_approved_passenger() {
        let fx = Fixture::new();
        let trip = fx.published_trip(3).await;
        fx.bookings.create(trip.id, 2).await.unwrap();
        let rejected = fx.bookings.create(trip.id, 3).await.unwrap();
        fx.bookings.reject(rejected.id, DRIVER).await.unwrap();
        fx.clock.advance(chrono::Duration::hours(5));
        fx.sweep.run_once().await.unwrap();

        for author in [1, 2, 3] {
            let err = fx.reviews.create(trip.id, author, draft(5, "great")).await.unwrap_err();
            assert!(matches!(err, CoreError::UserNotPassenger { .. }), "author {author}");
        }
        assert_eq!(fx.trip(trip.id).await.average_rating, 0.0);
    }

    #[tokio::test]
    async fn test_validation_runs_first() {
        let fx = Fixture::new();

        for bad in [draft(0, "good text"), draft(6, "good text"), draft(3, "  ab  ")] {
            let err = fx.reviews.create(999, 1, bad).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let err = fx.reviews.update(999, 1, ReviewPatch::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let patch = ReviewPatch { text: Some("x".into()), rating: None };
        let err = fx.reviews.update(999, 1, patch).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_text_is_stored_trimmed() {
        let fx = Fixture::new();
        let (trip, _) = fx.completed_trip_with(&[1]).await;
        let review = fx.reviews.create(trip.id, 1, draft(4, "  on time  ")).await.unwrap();
        assert_eq!(review.text, "on time");

        let patch = ReviewPatch { text: Some(" clean car ".into()), rating: None };
        let updated = fx.reviews.update(review.id, 1, patch).await.unwrap();
        assert_eq!(updated.text, "clean car");
        assert_eq!(updated.rating, 4);
    }

    #[tokio::test]
    async fn test_review_of_deleted_trip_cannot_change() {
        let fx = Fixture::new();
        let (trip, _) = fx.completed_trip_with(&[1]).await;
        let review = fx.reviews.create(trip.id, 1, draft(4, "decent")).await.unwrap();
        fx.trips.delete(trip.id, DRIVER).await.unwrap();

        let patch = ReviewPatch { rating: Some(1), text: None };
        let err = fx.reviews.update(review.id, 1, patch).await.unwrap_err();
        assert!(matches!(err, CoreError::TripNotFound(id) if id == trip.id));
        let err = fx.reviews.delete(review.id, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::TripNotFound(_)));

        assert_eq!(fx.reviews.get(review.id).await.unwrap().rating, 4);
    }

    #[tokio::test]
    async fn test_only_author_mutates() {
        let fx = Fixture::new();
        let (trip, _) = fx.completed_trip_with(&[1, 2]).await;
        let review = fx.reviews.create(trip.id, 1, draft(4, "decent")).await.unwrap();

        let patch = ReviewPatch { rating: Some(1), text: None };
        let err = fx.reviews.update(review.id, 2, patch).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = fx.reviews.delete(review.id, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        assert_eq!(fx.reviews.get(review.id).await.unwrap().rating, 4);
        assert_eq!(fx.trip(trip.id).await.average_rating, 4.0);
    }

    #[tokio::test]
    async fn test_listing_is_served_from_cache_until_a_mutation() {
        let fx = Fixture::new();
        let (trip, _) = fx.completed_trip_with(&[1, 2]).await;
        fx.reviews.create(trip.id, 1, draft(5, "superb")).await.unwrap();

        let page = fx.reviews.list(ReviewQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(fx.cache.keys(), vec![ReviewListCache::key(10)]);

        // A stale entry proves the second read never reaches storage
        fx.cache
            .set_with_ttl(&ReviewListCache::key(10), "[]", std::time::Duration::from_secs(60))
            .await
            .unwrap();
        assert!(fx.reviews.list(ReviewQuery::default()).await.unwrap().items.is_empty());

        fx.reviews.create(trip.id, 2, draft(3, "alright")).await.unwrap();
        assert!(fx.cache.keys().is_empty());
        let page = fx.reviews.list(ReviewQuery::default()).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].author_id, 2);
    }

    #[tokio::test]
    async fn test_filtered_listing_bypasses_cache() {
        let fx = Fixture::new();
        let (trip, _) = fx.completed_trip_with(&[1, 2]).await;
        fx.reviews.create(trip.id, 1, draft(5, "superb")).await.unwrap();
        fx.reviews.create(trip.id, 2, draft(2, "late")).await.unwrap();

        let query = ReviewQuery { author_id: Some(2), ..Default::default() };
        let page = fx.reviews.list(query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].rating, 2);

        let query = ReviewQuery { page: Some(2), page_size: Some(1), ..Default::default() };
        let page = fx.reviews.list(query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.page, 2);

        assert!(fx.cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_operations() {
        let fx = Fixture::new();
        let (trip, _) = fx.completed_trip_with(&[1]).await;
        fx.cache.set_unavailable(true);

        let review = fx.reviews.create(trip.id, 1, draft(5, "superb")).await.unwrap();
        let page = fx.reviews.list(ReviewQuery::default()).await.unwrap();
        assert_eq!(page.items, vec![review.summary()]);
        fx.reviews.delete(review.id, 1).await.unwrap();

        assert_eq!(fx.trip(trip.id).await.average_rating, 0.0);
    }
}
