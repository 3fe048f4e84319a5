use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UnknownStatus;

/// Trip lifecycle, advanced only by wall-clock time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Published,
    InProgress,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Published => "published",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(TripStatus::Published),
            "in_progress" => Ok(TripStatus::InProgress),
            "completed" => Ok(TripStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A scheduled ride offered by a driver with a finite number of seats
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: i64,
    pub driver_id: i64,
    pub car_id: i64,
    pub origin: String,
    pub destination: String,
    pub start_time: DateTime<Utc>,
    pub duration_min: i32,
    pub total_seats: i32,
    pub available_seats: i32,
    pub price: i64,
    pub status: TripStatus,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Trip {
    /// Moment the trip is expected to arrive
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(i64::from(self.duration_min))
    }

    pub fn has_free_seat(&self) -> bool {
        self.available_seats > 0
    }
}

/// Driver input for publishing a new trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripDraft {
    pub car_id: i64,
    pub origin: String,
    pub destination: String,
    pub start_time: DateTime<Utc>,
    pub duration_min: i32,
    pub total_seats: i32,
    pub price: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [TripStatus::Published, TripStatus::InProgress, TripStatus::Completed] {
            assert_eq!(status.as_str().parse::<TripStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<TripStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TripStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_end_time_adds_duration() {
        let start = Utc::now();
        let trip = Trip {
            id: 1,
            driver_id: 1,
            car_id: 1,
            origin: "Grozny".into(),
            destination: "Makhachkala".into(),
            start_time: start,
            duration_min: 90,
            total_seats: 3,
            available_seats: 3,
            price: 500,
            status: TripStatus::Published,
            average_rating: 0.0,
            created_at: start,
            updated_at: start,
            deleted_at: None,
        };
        assert_eq!(trip.end_time(), start + Duration::minutes(90));
        assert!(trip.has_free_seat());
    }
}
