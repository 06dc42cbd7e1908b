use std::sync::Arc;

use log::{error, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, Reply, WithStatus};
use warp::Filter;

use crate::environment::Environment;
use crate::errors::BackendError;

pub mod admin;
mod handlers;
mod rejection;
mod response;

pub use internal::*;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);
        error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        let flattened = r.flatten(status);

        return Ok(with_status(json(&flattened), status));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        MalformedBody(..) | InvalidField { .. } | InvalidTripCode(..) | InvalidDate(..) => {
            StatusCode::BAD_REQUEST
        }
        InvalidSession | SessionRequired => StatusCode::UNAUTHORIZED,
        NotOwner => StatusCode::FORBIDDEN,
        NonExistentTrip(..)
        | NoParticipants
        | NoPlacesFound
        | UnknownRecommendation(..)
        | NoPlan
        | NoSnapshot => StatusCode::NOT_FOUND,
        NoCandidates | NotEnoughVotes { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Combines every public route, with rejections formatted as JSON.
pub fn make_api(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let logger = environment.logger.clone();

    make_create_trip_route(environment.clone())
        .or(make_my_trips_route(environment.clone()))
        .unify()
        .or(make_retrieve_trip_route(environment.clone()))
        .unify()
        .or(make_delete_trip_route(environment.clone()))
        .unify()
        .or(make_add_participant_route(environment.clone()))
        .unify()
        .or(make_participants_route(environment.clone()))
        .unify()
        .or(make_summary_route(environment.clone()))
        .unify()
        .or(make_generate_recommendations_route(environment.clone()))
        .unify()
        .or(make_recommendations_route(environment.clone()))
        .unify()
        .or(make_cast_vote_route(environment.clone()))
        .unify()
        .or(make_votes_route(environment.clone()))
        .unify()
        .or(make_full_votes_route(environment.clone()))
        .unify()
        .or(make_consensus_route(environment.clone()))
        .unify()
        .or(make_generate_plan_route(environment.clone()))
        .unify()
        .or(make_current_plan_route(environment.clone()))
        .unify()
        .or(make_plans_route(environment.clone()))
        .unify()
        .or(make_create_snapshot_route(environment.clone()))
        .unify()
        .or(make_latest_snapshot_route(environment))
        .unify()
        .recover(move |r| format_rejection(logger.clone(), r))
}

mod internal {
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{body::bytes, delete, get as g, header, path as p, path::param as par, post};

    use super::handlers;
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    fn authorization() -> BoxedFilter<(Option<String>,)> {
        header::optional::<String>("authorization").boxed()
    }

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let $route_variable = warp::any()
                .map(move || environment.clone());

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_create_trip_route => create_trip, rt; p("trips"), end(), post(), authorization(), bytes());
    route!(make_retrieve_trip_route => retrieve_trip, rt; p("trips"), par::<String>(), end(), g());
    route!(make_delete_trip_route => delete_trip, rt; p("trips"), par::<String>(), end(), delete(), authorization());
    route!(make_my_trips_route => my_trips, rt; p("mytrips"), end(), g(), authorization());
    route!(make_add_participant_route => add_participant, rt; p!("trips" / String / "participants"), post(), bytes());
    route!(make_participants_route => participants, rt; p!("trips" / String / "participants"), g());
    route!(make_summary_route => summary, rt; p!("trips" / String / "summary"), g());
    route!(make_generate_recommendations_route => generate_recommendations, rt; p!("places" / "recommendations" / String), post());
    route!(make_recommendations_route => recommendations, rt; p!("trips" / String / "recommendations"), g());
    route!(make_cast_vote_route => cast_vote, rt; p!("trips" / String / "votes"), post(), bytes());
    route!(make_votes_route => votes, rt; p!("trips" / String / "votes"), g());
    route!(make_full_votes_route => full_votes, rt; p!("trips" / String / "votes" / "full"), g());
    route!(make_consensus_route => consensus, rt; p!("trips" / String / "consensus"), g());
    route!(make_generate_plan_route => generate_plan, rt; p!("trips" / String / "plan"), post(), bytes());
    route!(make_current_plan_route => current_plan, rt; p!("trips" / String / "plan"), g());
    route!(make_plans_route => plans, rt; p!("trips" / String / "plans"), g());
    route!(make_create_snapshot_route => create_snapshot, rt; p!("trips" / String / "ai" / "snapshot"), post());
    route!(make_latest_snapshot_route => latest_snapshot, rt; p!("trips" / String / "ai" / "snapshot"), g());
}
