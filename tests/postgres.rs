use std::env;

use serde_json::json;

use planner::code::TripCode;
use planner::db::{Db, PgDb};
use planner::participant::ParticipantSubmission;
use planner::plan::{PlanContent, PlanSource};
use planner::recommendation::PlaceDetails;
use planner::trip::{Trip, TripSubmission};
use planner::vote::VoteSubmission;

const CONNECTION_STRING_VARIABLE: &str = "PLANNER_TEST_DB_CONNECTION_STRING";

#[tokio::test]
async fn deleting_a_trip_cascades() {
    dotenv::dotenv().ok();

    let connection_string = match env::var(CONNECTION_STRING_VARIABLE) {
        Ok(s) => s,
        Err(_) => {
            eprintln!("{} is not set, skipping", CONNECTION_STRING_VARIABLE);
            return;
        }
    };

    prepare_db(&connection_string).await;

    let pool = sqlx::Pool::connect(&connection_string)
        .await
        .expect("create database pool");
    let db = PgDb::new(pool);

    let doomed = create_trip(&db).await;
    let kept = create_trip(&db).await;

    fill(&db, &doomed).await;
    fill(&db, &kept).await;

    db.delete_trip(doomed.code()).await.expect("delete trip");

    let id = doomed.id();
    assert!(db.retrieve_trip(doomed.code()).await.unwrap().is_none());
    assert!(db.participants(id).await.unwrap().is_empty());
    assert!(db.recommendations(id).await.unwrap().is_empty());
    assert!(db.votes(id).await.unwrap().is_empty());
    assert!(db.plans(id).await.unwrap().is_empty());
    assert!(db.latest_snapshot(id).await.unwrap().is_none());

    let id = kept.id();
    assert_eq!(db.participants(id).await.unwrap().len(), 1);
    assert_eq!(db.recommendations(id).await.unwrap().len(), 1);
    assert_eq!(db.votes(id).await.unwrap().len(), 1);
    assert_eq!(db.plans(id).await.unwrap().len(), 1);
    assert!(db.current_plan(id).await.unwrap().is_some());
    assert!(db.latest_snapshot(id).await.unwrap().is_some());

    db.delete_trip(kept.code()).await.expect("clean up trip");
}

async fn create_trip(db: &PgDb) -> Trip {
    let new_trip = TripSubmission::default().into_new_trip(TripCode::generate(), None);

    db.create_trip(new_trip).await.expect("create trip")
}

async fn fill(db: &PgDb, trip: &Trip) {
    let participant: ParticipantSubmission = serde_json::from_value(json!({
        "nickname": "Mali",
        "available_dates": ["2025-11-01"],
        "budget": 3000,
        "preferred_province": "Nan",
        "travel_styles": ["nature"],
    }))
    .unwrap();
    db.insert_participant(trip.id(), participant.validate().unwrap())
        .await
        .expect("insert participant");

    let place: PlaceDetails = serde_json::from_value(json!({
        "name": "Old Town",
        "category": "attraction",
        "description": "The old town",
        "rating": 4.5,
        "estimated_cost": 100,
        "duration": "2-3 hours",
        "location": "Nan",
        "pros": [],
        "cons": [],
        "place_id": "place-0",
    }))
    .unwrap();
    let recommendations = db
        .insert_recommendations(trip.id(), vec![place])
        .await
        .expect("insert recommendations");

    let vote: VoteSubmission = serde_json::from_value(json!({
        "recommendation_id": recommendations[0].id(),
        "vote_type": "up",
    }))
    .unwrap();
    db.insert_vote(trip.id(), vote.validate().unwrap())
        .await
        .expect("insert vote");

    let content: PlanContent = serde_json::from_value(json!({
        "title": "Plan",
        "itinerary": [{ "day": "Day 1", "label": "Day 1", "items": [] }],
    }))
    .unwrap();
    db.insert_plan(trip.id(), content, PlanSource::Template)
        .await
        .expect("insert plan");

    db.insert_snapshot(trip.id(), json!({ "group_size": 1 }))
        .await
        .expect("insert snapshot");
}

async fn prepare_db(connection_string: &str) {
    if env::var("PLANNER_TEST_INITIALIZE_DB").unwrap_or_else(|_| "0".to_owned()) == "1" {
        let connection_string = connection_string.to_owned();

        tokio::task::spawn_blocking(move || initialize_db_for_test(&connection_string))
            .await
            .expect("initialize DB");
    }
}

fn initialize_db_for_test(connection_string: &str) {
    use movine::Movine;
    use postgres::{Client, NoTls};

    let mut client = Client::connect(connection_string, NoTls)
        .expect("create postgres::Client from PLANNER_TEST_DB_CONNECTION_STRING");
    let mut movine = Movine::new(&mut client);

    movine.set_migration_dir("migrations");
    movine.set_strict(true);

    if movine.status().is_err() {
        movine.initialize().expect("initialize movine");
    }

    movine.up().expect("run movine migrations");
}
