use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::BackendError;

/// The kind of place a recommendation points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceCategory {
    Attraction,
    Restaurant,
    Accommodation,
    Cafe,
    Shopping,
}

impl PlaceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaceCategory::Attraction => "attraction",
            PlaceCategory::Restaurant => "restaurant",
            PlaceCategory::Accommodation => "accommodation",
            PlaceCategory::Cafe => "cafe",
            PlaceCategory::Shopping => "shopping",
        }
    }
}

impl FromStr for PlaceCategory {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attraction" => Ok(PlaceCategory::Attraction),
            "restaurant" => Ok(PlaceCategory::Restaurant),
            "accommodation" => Ok(PlaceCategory::Accommodation),
            "cafe" => Ok(PlaceCategory::Cafe),
            "shopping" => Ok(PlaceCategory::Shopping),
            _ => Err(BackendError::UnknownEnumValue {
                kind: "place category",
                value: s.to_owned(),
            }),
        }
    }
}

/// A candidate place in the database.
#[derive(Clone, Debug, Serialize)]
pub struct Recommendation {
    /// The ID of the recommendation.
    pub(crate) id: Uuid,

    /// The trip whose participants will vote on it.
    pub(crate) trip_id: Uuid,

    #[serde(flatten)]
    pub(crate) details: PlaceDetails,

    #[serde(with = "time::serde::timestamp")]
    pub(crate) created_at: OffsetDateTime,
}

impl Recommendation {
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn details(&self) -> &PlaceDetails {
        &self.details
    }
}

/// Everything known about a place before it is stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub(crate) name: String,

    pub(crate) category: PlaceCategory,

    pub(crate) description: String,

    /// Between 0 and 5, as reported by the places service.
    pub(crate) rating: f64,

    /// Estimated cost per person.
    pub(crate) estimated_cost: i64,

    /// Human-readable, e.g. `"2-3 hours"`.
    pub(crate) duration: String,

    pub(crate) location: String,

    pub(crate) pros: Vec<String>,

    pub(crate) cons: Vec<String>,

    /// Opaque reference into the places service.
    pub(crate) place_id: String,
}

impl PlaceDetails {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> PlaceCategory {
        self.category
    }
}
