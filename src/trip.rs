use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::code::TripCode;
use crate::normalization;

const DEFAULT_TITLE: &str = "Group trip";

/// Where a trip is in its lifecycle. Variants are ordered; a trip only
/// ever moves to a later status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Planning,
    ConsensusReached,
    PlanGenerated,
}

impl TripStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            TripStatus::Planning => 0,
            TripStatus::ConsensusReached => 1,
            TripStatus::PlanGenerated => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(TripStatus::Planning),
            1 => Some(TripStatus::ConsensusReached),
            2 => Some(TripStatus::PlanGenerated),
            _ => None,
        }
    }

    /// Returns the later of the two statuses.
    pub fn advance_to(self, next: TripStatus) -> TripStatus {
        self.max(next)
    }
}

/// A single trip in the database.
#[derive(Clone, Debug, Serialize)]
pub struct Trip {
    /// The ID of the trip.
    pub(crate) id: Uuid,

    /// The shareable code.
    pub(crate) code: TripCode,

    pub(crate) title: String,

    pub(crate) status: TripStatus,

    /// The session owner who created the trip, if any.
    pub(crate) owner_id: Option<Uuid>,

    /// The plan currently shown for this trip.
    pub(crate) current_plan_id: Option<Uuid>,

    #[serde(with = "time::serde::timestamp")]
    pub(crate) created_at: OffsetDateTime,
}

impl Trip {
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn code(&self) -> &TripCode {
        &self.code
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> TripStatus {
        self.status
    }

    pub fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

/// A trip about to be inserted.
#[derive(Clone, Debug)]
pub struct NewTrip {
    pub(crate) code: TripCode,
    pub(crate) title: String,
    pub(crate) owner_id: Option<Uuid>,
}

/// The body of a trip creation request. Every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TripSubmission {
    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub(crate) title: Option<String>,
}

impl TripSubmission {
    pub fn into_new_trip(self, code: TripCode, owner_id: Option<Uuid>) -> NewTrip {
        NewTrip {
            code,
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            owner_id,
        }
    }
}
