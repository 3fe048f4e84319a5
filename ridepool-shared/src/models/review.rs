use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page size used when the caller gives none, or one out of range
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest page a caller may ask for
pub const MAX_PAGE_SIZE: u32 = 50;

/// A post-trip rating left by a passenger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
    pub id: i64,
    pub trip_id: i64,
    pub author_id: i64,
    pub text: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn summary(&self) -> ReviewSummary {
        ReviewSummary {
            id: self.id,
            trip_id: self.trip_id,
            author_id: self.author_id,
            text: self.text.clone(),
            rating: self.rating,
            created_at: self.created_at,
        }
    }
}

/// Input for a new review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub text: String,
    pub rating: i16,
}

/// Per-field update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewPatch {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub rating: Option<i16>,
}

impl ReviewPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.rating.is_none()
    }
}

/// Listing filter as received from a caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewQuery {
    pub trip_id: Option<i64>,
    pub author_id: Option<i64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ReviewQuery {
    /// Apply defaults and caps
    pub fn normalize(&self) -> ReviewPageRequest {
        let page = match self.page {
            Some(p) if p >= 1 => p,
            _ => 1,
        };
        let page_size = match self.page_size {
            Some(s) if (1..=MAX_PAGE_SIZE).contains(&s) => s,
            _ => DEFAULT_PAGE_SIZE,
        };
        ReviewPageRequest {
            trip_id: self.trip_id.filter(|id| *id > 0),
            author_id: self.author_id.filter(|id| *id > 0),
            page,
            page_size,
        }
    }
}

/// A normalized listing request: page starts at 1, page size within bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewPageRequest {
    pub trip_id: Option<i64>,
    pub author_id: Option<i64>,
    pub page: u32,
    pub page_size: u32,
}

impl ReviewPageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn is_unfiltered_first_page(&self) -> bool {
        self.trip_id.is_none() && self.author_id.is_none() && self.page == 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewSummary {
    pub id: i64,
    pub trip_id: i64,
    pub author_id: i64,
    pub text: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewPage {
    pub items: Vec<ReviewSummary>,
    pub page: u32,
    pub page_size: u32,
}
