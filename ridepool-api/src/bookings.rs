use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ridepool_shared::Booking;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub trip_id: i64,
    pub passenger_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub driver_id: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/approve", post(approve_booking))
        .route("/v1/bookings/{id}/reject", post(reject_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.create(req.trip_id, req.passenger_id).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(id).await?))
}

async fn approve_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.approve(id, req.driver_id).await?))
}

async fn reject_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.reject(id, req.driver_id).await?))
}
