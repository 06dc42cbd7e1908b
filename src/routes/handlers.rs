use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, o, warn};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::analysis::GroupSummary;
use crate::consensus::Consensus;
use crate::environment::Environment;
use crate::errors::BackendError;
use crate::participant::ParticipantSubmission;
use crate::places::PlaceQuery;
use crate::plan::{Plan, PlanRequest};
use crate::recommendation::PlaceDetails;
use crate::routes::{
    rejection::{Context, Rejection},
    response::{ConsensusReport, SuccessResponse},
};
use crate::session::Session;
use crate::snapshot::Snapshot;
use crate::trip::{Trip, TripStatus, TripSubmission};
use crate::vote::{VoteDetail, VoteSubmission};
use crate::{assembler::PlanContext, code::TripCode};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($body:tt)+) => {{
        let start = Instant::now();

        // errors short-circuit through `?` and are reported without the
        // timing header
        let result = { $($body)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    }};
}

pub async fn create_trip(
    environment: Environment,
    authorization: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::create_trip(), e);

        let session = Session::from_header(authorization.as_deref()).map_err(error_handler)?;
        let submission: TripSubmission = parse_body(&body).map_err(error_handler)?;

        let trip = insert_trip(&environment, submission, session.owner())
            .await
            .map_err(error_handler)?;
        debug!(environment.logger, "Created trip"; "code" => %trip.code());

        let link = environment.urls.trip(trip.code()).map_err(error_handler)?;
        let location = link.to_string();

        with_header(
            with_status(
                json(&SuccessResponse::Trip { trip, link: location.clone() }),
                StatusCode::CREATED,
            ),
            "location",
            location,
        )
    }
}

pub async fn retrieve_trip(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::retrieve_trip(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let link = environment.urls.trip(trip.code()).map_err(error_handler)?;

        json(&SuccessResponse::Trip { trip, link: link.to_string() })
    }
}

pub async fn delete_trip(
    environment: Environment,
    code: String,
    authorization: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::delete_trip(code.clone()), e);

        let session = Session::from_header(authorization.as_deref()).map_err(error_handler)?;
        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        session.authorize(&trip).map_err(error_handler)?;

        debug!(environment.logger, "Deleting trip..."; "code" => %trip.code());
        environment.db.delete_trip(trip.code()).await.map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn my_trips(environment: Environment, authorization: Option<String>) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::my_trips(), e);

        let owner = Session::from_header(authorization.as_deref())
            .and_then(|s| s.require_owner())
            .map_err(error_handler)?;

        let trips = environment.db.owned_trips(&owner).await.map_err(error_handler)?;

        json(&SuccessResponse::Trips { trips })
    }
}

pub async fn add_participant(environment: Environment, code: String, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::add_participant(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let submission: ParticipantSubmission = parse_body(&body).map_err(error_handler)?;
        let details = submission.validate().map_err(error_handler)?;

        let participant = environment
            .db
            .insert_participant(trip.id(), details)
            .await
            .map_err(error_handler)?;

        with_status(json(&SuccessResponse::Participant { participant }), StatusCode::CREATED)
    }
}

pub async fn participants(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::participants(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let participants = environment.db.participants(trip.id()).await.map_err(error_handler)?;

        json(&SuccessResponse::Participants { participants })
    }
}

pub async fn summary(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::summary(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let participants = environment.db.participants(trip.id()).await.map_err(error_handler)?;

        json(&SuccessResponse::Summary(GroupSummary::new(&participants)))
    }
}

pub async fn generate_recommendations(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler =
            |e: BackendError| Rejection::new(Context::generate_recommendations(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let participants = environment.db.participants(trip.id()).await.map_err(error_handler)?;

        let query = PlaceQuery::from_participants(&participants)
            .ok_or(BackendError::NoParticipants)
            .map_err(error_handler)?;
        let places = find_places(&environment, &query).await.map_err(error_handler)?;

        let recommendations = environment
            .db
            .insert_recommendations(trip.id(), places)
            .await
            .map_err(error_handler)?;

        json(&SuccessResponse::Recommendations {
            recommendations,
            analysis: Some(query),
        })
    }
}

pub async fn recommendations(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::recommendations(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let recommendations = environment
            .db
            .recommendations(trip.id())
            .await
            .map_err(error_handler)?;

        json(&SuccessResponse::Recommendations {
            recommendations,
            analysis: None,
        })
    }
}

pub async fn cast_vote(environment: Environment, code: String, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::cast_vote(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let submission: VoteSubmission = parse_body(&body).map_err(error_handler)?;
        let new_vote = submission.validate().map_err(error_handler)?;

        let db = &environment.db;
        let vote = db.insert_vote(trip.id(), new_vote).await.map_err(error_handler)?;

        let count = db.count_votes(trip.id()).await.map_err(error_handler)?;
        if count >= environment.config.minimum_votes {
            db.advance_status(trip.id(), TripStatus::ConsensusReached)
                .await
                .map_err(error_handler)?;
        }

        with_status(json(&SuccessResponse::Vote { vote }), StatusCode::CREATED)
    }
}

pub async fn votes(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::votes(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let votes = environment.db.votes(trip.id()).await.map_err(error_handler)?;

        json(&SuccessResponse::Votes { votes })
    }
}

pub async fn full_votes(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::full_votes(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let votes = environment.db.votes(trip.id()).await.map_err(error_handler)?;
        let recommendations = environment
            .db
            .recommendations(trip.id())
            .await
            .map_err(error_handler)?;

        json(&SuccessResponse::VoteDetails {
            votes: VoteDetail::join(votes, &recommendations),
        })
    }
}

pub async fn consensus(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::consensus(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let consensus = build_consensus(&environment, &trip).await.map_err(error_handler)?;

        let minimum_votes = environment.config.minimum_votes;
        let ready = consensus.is_ready(minimum_votes);

        json(&SuccessResponse::Consensus(ConsensusReport {
            consensus,
            minimum_votes,
            ready,
        }))
    }
}

pub async fn generate_plan(environment: Environment, code: String, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::generate_plan(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let request: PlanRequest = parse_body(&body).map_err(error_handler)?;

        let cached = if request.force_new {
            None
        } else {
            environment.db.current_plan(trip.id()).await.map_err(error_handler)?
        };

        let (plan, status, from_cache) = match cached {
            Some(plan) => {
                debug!(environment.logger, "Returning current plan"; "code" => %trip.code());
                (plan, StatusCode::OK, true)
            }
            None => {
                let plan = assemble_plan(&environment, &trip).await.map_err(error_handler)?;
                (plan, StatusCode::CREATED, false)
            }
        };

        with_status(json(&SuccessResponse::Plan { plan, from_cache }), status)
    }
}

pub async fn current_plan(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::current_plan(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let plan = environment
            .db
            .current_plan(trip.id())
            .await
            .map_err(error_handler)?
            .ok_or(BackendError::NoPlan)
            .map_err(error_handler)?;

        json(&SuccessResponse::Plan { plan, from_cache: true })
    }
}

pub async fn plans(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::plans(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let plans = environment.db.plans(trip.id()).await.map_err(error_handler)?;

        json(&SuccessResponse::Plans { plans })
    }
}

pub async fn create_snapshot(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::create_snapshot(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let consensus = build_consensus(&environment, &trip).await.map_err(error_handler)?;
        let context = planning_context(&environment, &trip, &consensus)
            .await
            .map_err(error_handler)?;
        let snapshot = record_snapshot(&environment, &trip, &context)
            .await
            .map_err(error_handler)?;

        with_status(json(&SuccessResponse::Snapshot { snapshot }), StatusCode::CREATED)
    }
}

pub async fn latest_snapshot(environment: Environment, code: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::latest_snapshot(code.clone()), e);

        let trip = find_trip(&environment, &code).await.map_err(error_handler)?;
        let snapshot = environment
            .db
            .latest_snapshot(trip.id())
            .await
            .map_err(error_handler)?
            .ok_or(BackendError::NoSnapshot)
            .map_err(error_handler)?;

        json(&SuccessResponse::Snapshot { snapshot })
    }
}

/// Parses a JSON body. An empty body is treated as an empty submission.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, BackendError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(BackendError::MalformedBody)
}

async fn find_trip(environment: &Environment, code: &str) -> Result<Trip, BackendError> {
    let code: TripCode = code.parse()?;
    let trip = environment.db.retrieve_trip(&code).await?;

    trip.ok_or(BackendError::NonExistentTrip(code))
}

async fn insert_trip(
    environment: &Environment,
    submission: TripSubmission,
    owner: Option<Uuid>,
) -> Result<Trip, BackendError> {
    let attempts = environment.config.code_attempts;

    for attempt in 1..=attempts {
        let new_trip = submission.clone().into_new_trip(TripCode::generate(), owner);

        match environment.db.create_trip(new_trip).await {
            Err(BackendError::CodeAlreadyExists) => {
                debug!(environment.logger, "Trip code taken, retrying..."; "attempt" => attempt);
            }
            result => return result,
        }
    }

    Err(BackendError::CodeSpaceExhausted(attempts))
}

async fn find_places(
    environment: &Environment,
    query: &PlaceQuery,
) -> Result<Vec<PlaceDetails>, BackendError> {
    let logger = environment
        .logger
        .new(o!("province" => query.province.clone()));

    let finder = match &environment.places {
        Some(f) => f,
        None => {
            warn!(logger, "No places service configured");
            return Err(BackendError::NoPlacesFound);
        }
    };

    let places = finder.find(query).await.map_err(|e| {
        warn!(logger, "Place search failed"; "error" => %e);
        BackendError::NoPlacesFound
    })?;

    if places.is_empty() {
        return Err(BackendError::NoPlacesFound);
    }

    debug!(logger, "Found places"; "count" => places.len());

    Ok(places)
}

async fn build_consensus(environment: &Environment, trip: &Trip) -> Result<Consensus, BackendError> {
    let candidates = environment.db.recommendations(trip.id()).await?;
    let votes = environment.db.votes(trip.id()).await?;

    Ok(Consensus::from_votes(candidates, &votes))
}

async fn planning_context(
    environment: &Environment,
    trip: &Trip,
    consensus: &Consensus,
) -> Result<PlanContext, BackendError> {
    let participants = environment.db.participants(trip.id()).await?;

    Ok(PlanContext::new(trip.title(), &participants, consensus))
}

async fn record_snapshot(
    environment: &Environment,
    trip: &Trip,
    context: &PlanContext,
) -> Result<Snapshot, BackendError> {
    let payload = serde_json::to_value(context)
        .map_err(|source| BackendError::ContextSerialization { source })?;

    let snapshot = environment.db.insert_snapshot(trip.id(), payload).await?;
    debug!(environment.logger, "Recorded snapshot"; "code" => %trip.code(), "snapshot" => %snapshot.id());

    Ok(snapshot)
}

/// Every generated plan is preceded by a snapshot of the context it was
/// built from.
async fn assemble_plan(environment: &Environment, trip: &Trip) -> Result<Plan, BackendError> {
    let db = &environment.db;

    let consensus = build_consensus(environment, trip).await?;
    consensus.check_ready(environment.config.minimum_votes)?;

    let context = planning_context(environment, trip, &consensus).await?;
    record_snapshot(environment, trip, &context).await?;

    let (content, source) = environment.assembler.assemble(&context).await;
    debug!(environment.logger, "Assembled plan"; "code" => %trip.code(), "source" => source.as_str());

    let plan = db.insert_plan(trip.id(), content, source).await?;
    db.advance_status(trip.id(), TripStatus::PlanGenerated).await?;

    Ok(plan)
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
