use thiserror::Error;
use uuid::Uuid;

use crate::code::TripCode;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents an SQL error.
    #[error("internal error")]
    Sqlx { source: sqlx::Error },

    /// Represents a request body that is not valid JSON for its route.
    #[error("malformed request body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    /// Represents a submission with a missing or invalid field.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("invalid trip code {0:?}")]
    InvalidTripCode(String),

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Represents an `Authorization` header that does not carry a
    /// session.
    #[error("invalid session")]
    InvalidSession,

    #[error("session required")]
    SessionRequired,

    #[error("trip belongs to another owner")]
    NotOwner,

    #[error("trip {0} does not exist")]
    NonExistentTrip(TripCode),

    #[error("trip has no participants yet")]
    NoParticipants,

    #[error("no places found")]
    NoPlacesFound,

    #[error("recommendation {0} does not exist in this trip")]
    UnknownRecommendation(Uuid),

    #[error("trip has no plan yet")]
    NoPlan,

    #[error("trip has no snapshot yet")]
    NoSnapshot,

    #[error("trip has no candidate places")]
    NoCandidates,

    /// Represents a plan request made before the group has voted enough.
    #[error("not enough votes: {actual} of {required}")]
    NotEnoughVotes { actual: usize, required: usize },

    /// Represents a collision on the unique trip code.
    #[error("trip code already exists")]
    CodeAlreadyExists,

    #[error("could not allocate a unique trip code after {0} attempts")]
    CodeSpaceExhausted(u8),

    /// Represents a transport error talking to the places service.
    #[error("places service error")]
    PlacesService { source: reqwest::Error },

    /// Represents a response from the places service that is neither
    /// results nor an empty result set.
    #[error("places service returned status {0}")]
    PlacesStatus(String),

    /// Represents a transport error talking to the text generator.
    #[error("generator service error")]
    GeneratorService { source: reqwest::Error },

    #[error("generator returned no text")]
    EmptyGeneration,

    #[error("failed to serialize plan context")]
    ContextSerialization { source: serde_json::Error },

    #[error("failed to parse generated plan")]
    UnparseablePlan { source: serde_json::Error },

    #[error("generated plan has an empty itinerary")]
    EmptyItinerary,

    #[error("generated plan has no items on {0}")]
    EmptyDay(String),

    #[error("unable to parse URL {url}")]
    UnableToParseUrl { url: String, source: url::ParseError },

    /// Represents a stored value that does not map to a known variant.
    #[error("unknown {kind} {value:?} in database")]
    UnknownEnumValue { kind: &'static str, value: String },
}

impl BackendError {
    pub(crate) fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        BackendError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_field(field: &'static str) -> Self {
        Self::invalid_field(field, "is required")
    }
}
