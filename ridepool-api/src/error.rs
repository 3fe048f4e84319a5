use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ridepool_core::{CoreError, ErrorKind};
use serde_json::json;

#[derive(Debug)]
pub struct AppError(CoreError);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::InvalidState | ErrorKind::Conflict | ErrorKind::Capacity => {
                StatusCode::CONFLICT
            }
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.0.kind();

        let error_message = match kind {
            ErrorKind::Internal => {
                tracing::error!("Internal Server Error: {}", self.0);
                "Internal Server Error".to_string()
            }
            _ => self.0.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridepool_core::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::TripNotFound(1), StatusCode::NOT_FOUND),
            (CoreError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (CoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CoreError::TripNotCompleted(1), StatusCode::CONFLICT),
            (CoreError::ReviewAlreadyPresent { trip_id: 1, author_id: 2 }, StatusCode::CONFLICT),
            (CoreError::NoAvailableSeats(1), StatusCode::CONFLICT),
            (
                CoreError::Storage(StoreError::Database("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
