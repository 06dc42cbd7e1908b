use serde::Serialize;
use warp::http::StatusCode;
use warp::reject;

use crate::errors::BackendError;

const INTERNAL_ERROR_MESSAGE: &str = "internal error";

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    /// Server errors are reported without detail; the full error is
    /// only logged.
    pub fn flatten(&self, status: StatusCode) -> FlattenedRejection {
        let message = if status.is_server_error() {
            INTERNAL_ERROR_MESSAGE.to_owned()
        } else {
            format!("{}", self.error)
        };

        FlattenedRejection {
            context: self.context.clone(),
            message,
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Context {
    CreateTrip,
    RetrieveTrip { code: String },
    DeleteTrip { code: String },
    MyTrips,
    AddParticipant { code: String },
    Participants { code: String },
    Summary { code: String },
    GenerateRecommendations { code: String },
    Recommendations { code: String },
    CastVote { code: String },
    Votes { code: String },
    FullVotes { code: String },
    Consensus { code: String },
    GeneratePlan { code: String },
    CurrentPlan { code: String },
    Plans { code: String },
    CreateSnapshot { code: String },
    LatestSnapshot { code: String },
}

impl Context {
    pub fn create_trip() -> Context {
        Context::CreateTrip
    }

    pub fn retrieve_trip(code: String) -> Context {
        Context::RetrieveTrip { code }
    }

    pub fn delete_trip(code: String) -> Context {
        Context::DeleteTrip { code }
    }

    pub fn my_trips() -> Context {
        Context::MyTrips
    }

    pub fn add_participant(code: String) -> Context {
        Context::AddParticipant { code }
    }

    pub fn participants(code: String) -> Context {
        Context::Participants { code }
    }

    pub fn summary(code: String) -> Context {
        Context::Summary { code }
    }

    pub fn generate_recommendations(code: String) -> Context {
        Context::GenerateRecommendations { code }
    }

    pub fn recommendations(code: String) -> Context {
        Context::Recommendations { code }
    }

    pub fn cast_vote(code: String) -> Context {
        Context::CastVote { code }
    }

    pub fn votes(code: String) -> Context {
        Context::Votes { code }
    }

    pub fn full_votes(code: String) -> Context {
        Context::FullVotes { code }
    }

    pub fn consensus(code: String) -> Context {
        Context::Consensus { code }
    }

    pub fn generate_plan(code: String) -> Context {
        Context::GeneratePlan { code }
    }

    pub fn current_plan(code: String) -> Context {
        Context::CurrentPlan { code }
    }

    pub fn plans(code: String) -> Context {
        Context::Plans { code }
    }

    pub fn create_snapshot(code: String) -> Context {
        Context::CreateSnapshot { code }
    }

    pub fn latest_snapshot(code: String) -> Context {
        Context::LatestSnapshot { code }
    }
}
