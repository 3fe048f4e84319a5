use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use ridepool_shared::{Booking, Trip, TripDraft};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/drivers/{driver_id}/trips", post(create_trip))
        .route("/v1/trips", get(list_trips))
        .route("/v1/trips/{id}", get(get_trip))
        .route("/v1/trips/{id}/drivers/{driver_id}", delete(delete_trip))
        .route("/v1/trips/{id}/bookings/pending", get(pending_bookings))
}

async fn create_trip(
    State(state): State<AppState>,
    Path(driver_id): Path<i64>,
    Json(draft): Json<TripDraft>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state.trips.create(driver_id, draft).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn list_trips(State(state): State<AppState>) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.trips.list().await?))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.get(id).await?))
}

async fn delete_trip(
    State(state): State<AppState>,
    Path((id, driver_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    state.trips.delete(id, driver_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn pending_bookings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.pending_for_trip(id).await?))
}
