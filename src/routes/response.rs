use serde::Serialize;

use crate::analysis::GroupSummary;
use crate::consensus::Consensus;
use crate::participant::Participant;
use crate::places::PlaceQuery;
use crate::plan::Plan;
use crate::recommendation::Recommendation;
use crate::snapshot::Snapshot;
use crate::trip::Trip;
use crate::vote::{Vote, VoteDetail};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Consensus(ConsensusReport),
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
    Participant {
        participant: Participant,
    },
    Participants {
        participants: Vec<Participant>,
    },
    Plan {
        plan: Plan,
        from_cache: bool,
    },
    Plans {
        plans: Vec<Plan>,
    },
    Recommendations {
        recommendations: Vec<Recommendation>,
        #[serde(skip_serializing_if = "Option::is_none")]
        analysis: Option<PlaceQuery>,
    },
    Snapshot {
        snapshot: Snapshot,
    },
    Summary(GroupSummary),
    Trip {
        trip: Trip,
        link: String,
    },
    Trips {
        trips: Vec<Trip>,
    },
    Vote {
        vote: Vote,
    },
    VoteDetails {
        votes: Vec<VoteDetail>,
    },
    Votes {
        votes: Vec<Vote>,
    },
}

#[derive(Debug, Serialize)]
pub struct ConsensusReport {
    #[serde(flatten)]
    pub(crate) consensus: Consensus,
    pub(crate) minimum_votes: usize,
    pub(crate) ready: bool,
}
