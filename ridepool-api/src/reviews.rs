use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use ridepool_shared::{Review, ReviewDraft, ReviewPage, ReviewPatch, ReviewQuery};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub author_id: i64,
    pub rating: i16,
    pub text: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/{id}/reviews", post(create_review))
        .route("/v1/reviews", get(list_reviews))
        .route("/v1/reviews/{id}", get(get_review))
        .route(
            "/v1/reviews/{id}/authors/{author_id}",
            patch(update_review).delete(delete_review),
        )
}

async fn create_review(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let draft = ReviewDraft { text: req.text, rating: req.rating };
    let review = state.reviews.create(trip_id, req.author_id, draft).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<ReviewPage>, AppError> {
    Ok(Json(state.reviews.list(query).await?))
}

async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Review>, AppError> {
    Ok(Json(state.reviews.get(id).await?))
}

async fn update_review(
    State(state): State<AppState>,
    Path((id, author_id)): Path<(i64, i64)>,
    Json(patch): Json<ReviewPatch>,
) -> Result<Json<Review>, AppError> {
    Ok(Json(state.reviews.update(id, author_id, patch).await?))
}

async fn delete_review(
    State(state): State<AppState>,
    Path((id, author_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    state.reviews.delete(id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
