use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::normalization::{self, checked, Field};
use crate::recommendation::{PlaceCategory, Recommendation};

/// The name recorded for votes cast without one.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }
}

impl FromStr for VoteType {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteType::Up),
            "down" => Ok(VoteType::Down),
            _ => Err(BackendError::UnknownEnumValue {
                kind: "vote type",
                value: s.to_owned(),
            }),
        }
    }
}

/// A single vote in the database. The same voter may vote any number
/// of times on the same recommendation.
#[derive(Clone, Debug, Serialize)]
pub struct Vote {
    /// The ID of the vote.
    pub(crate) id: Uuid,

    pub(crate) trip_id: Uuid,

    pub(crate) recommendation_id: Uuid,

    pub(crate) vote_type: VoteType,

    pub(crate) participant_nickname: String,

    #[serde(with = "time::serde::timestamp")]
    pub(crate) created_at: OffsetDateTime,
}

impl Vote {
    pub fn recommendation_id(&self) -> &Uuid {
        &self.recommendation_id
    }

    pub fn vote_type(&self) -> VoteType {
        self.vote_type
    }
}

/// A validated vote about to be inserted.
#[derive(Clone, Debug)]
pub struct NewVote {
    pub(crate) recommendation_id: Uuid,
    pub(crate) vote_type: VoteType,
    pub(crate) participant_nickname: String,
}

/// The raw body of a vote request.
#[derive(Debug, Default, Deserialize)]
pub struct VoteSubmission {
    #[serde(default)]
    recommendation_id: Option<Field<Uuid>>,

    #[serde(default)]
    vote_type: Option<Field<VoteType>>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    participant_nickname: Option<String>,
}

impl VoteSubmission {
    pub fn validate(self) -> Result<NewVote, BackendError> {
        Ok(NewVote {
            recommendation_id: checked(self.recommendation_id, "recommendation_id")?
                .ok_or_else(|| BackendError::missing_field("recommendation_id"))?,
            vote_type: checked(self.vote_type, "vote_type")?
                .ok_or_else(|| BackendError::missing_field("vote_type"))?,
            participant_nickname: self
                .participant_nickname
                .unwrap_or_else(|| ANONYMOUS.to_owned()),
        })
    }
}

/// A vote together with the place it was cast on.
#[derive(Clone, Debug, Serialize)]
pub struct VoteDetail {
    #[serde(flatten)]
    vote: Vote,

    recommendation_name: Option<String>,
    recommendation_type: Option<PlaceCategory>,
    recommendation_location: Option<String>,
    estimated_cost: Option<i64>,
    duration: Option<String>,
    rating: Option<f64>,
}

impl VoteDetail {
    /// Pairs every vote with its recommendation, newest vote first.
    pub fn join(votes: Vec<Vote>, recommendations: &[Recommendation]) -> Vec<VoteDetail> {
        let by_id: HashMap<&Uuid, &Recommendation> =
            recommendations.iter().map(|r| (&r.id, r)).collect();

        let mut details: Vec<VoteDetail> = votes
            .into_iter()
            .map(|vote| {
                let place = by_id.get(&vote.recommendation_id).map(|r| &r.details);

                VoteDetail {
                    recommendation_name: place.map(|p| p.name.clone()),
                    recommendation_type: place.map(|p| p.category),
                    recommendation_location: place.map(|p| p.location.clone()),
                    estimated_cost: place.map(|p| p.estimated_cost),
                    duration: place.map(|p| p.duration.clone()),
                    rating: place.map(|p| p.rating),
                    vote,
                }
            })
            .collect();

        details.reverse();
        details
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{VoteSubmission, VoteType, ANONYMOUS};
    use crate::errors::BackendError;

    #[test]
    fn votes_default_to_anonymous() {
        let submission: VoteSubmission = serde_json::from_value(json!({
            "recommendation_id": "6f1c2a4e-8d53-4f8b-9a77-5d2d1bb0c001",
            "vote_type": "down",
        }))
        .unwrap();

        let vote = submission.validate().expect("validate vote");

        assert_eq!(vote.vote_type, VoteType::Down);
        assert_eq!(vote.participant_nickname, ANONYMOUS);
    }

    #[test]
    fn missing_direction_is_named() {
        let submission: VoteSubmission = serde_json::from_value(json!({
            "recommendation_id": "6f1c2a4e-8d53-4f8b-9a77-5d2d1bb0c001",
        }))
        .unwrap();

        match submission.validate() {
            Err(BackendError::InvalidField { field, .. }) => assert_eq!(field, "vote_type"),
            other => panic!("expected invalid field, got {:?}", other),
        }
    }

    #[test]
    fn mistyped_fields_are_named() {
        for (field, body) in &[
            (
                "vote_type",
                json!({
                    "recommendation_id": "6f1c2a4e-8d53-4f8b-9a77-5d2d1bb0c001",
                    "vote_type": "sideways",
                }),
            ),
            (
                "recommendation_id",
                json!({ "recommendation_id": "not-a-uuid", "vote_type": "up" }),
            ),
        ] {
            let submission: VoteSubmission = serde_json::from_value(body.clone()).unwrap();

            match submission.validate() {
                Err(BackendError::InvalidField { field: f, .. }) => assert_eq!(f, *field),
                other => panic!("expected invalid field, got {:?}", other),
            }
        }
    }
}
