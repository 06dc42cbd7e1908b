use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use log::o;
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use uuid::Uuid;
use warp::http::StatusCode;

use planner::db::memory::MemoryDb;
use planner::environment::{Config, Environment};
use planner::errors::BackendError;
use planner::generator::{Prompt, TextGenerator};
use planner::places::{PlaceFinder, PlaceQuery};
use planner::recommendation::PlaceDetails;
use planner::routes;
use planner::urls::Urls;

static SLOG_SCOPE_GUARD: OnceCell<slog_scope::GlobalLoggerGuard> = OnceCell::new();

const BASE_URL: &str = "https://www.example.com/app";

/// Always returns the same three places.
struct FixedPlaces;

impl PlaceFinder for FixedPlaces {
    fn find(&self, _query: &PlaceQuery) -> BoxFuture<Result<Vec<PlaceDetails>, BackendError>> {
        let places: Vec<PlaceDetails> = ["Old Town", "Night Market", "Riverside Cafe"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                serde_json::from_value(json!({
                    "name": name,
                    "category": "attraction",
                    "description": format!("{} in town", name),
                    "rating": 4.5,
                    "estimated_cost": 100 * (i as i64 + 1),
                    "duration": "2-3 hours",
                    "location": "Chiang Mai",
                    "pros": ["popular"],
                    "cons": [],
                    "place_id": format!("place-{}", i),
                }))
                .expect("build place")
            })
            .collect();

        future::ready(Ok(places)).boxed()
    }
}

/// Returns text that is not a plan.
struct GarbageGenerator;

impl TextGenerator for GarbageGenerator {
    fn generate(&self, _prompt: &Prompt) -> BoxFuture<Result<String, BackendError>> {
        future::ready(Ok("Sorry, I can't help with that.".to_owned())).boxed()
    }
}

/// Returns a fenced plan the way chat models tend to.
struct FencedGenerator;

impl TextGenerator for FencedGenerator {
    fn generate(&self, _prompt: &Prompt) -> BoxFuture<Result<String, BackendError>> {
        let plan = json!({
            "title": "Lanna weekend",
            "dates": "2025-11-01 to 2025-11-02",
            "total_budget": 5500,
            "itinerary": [{
                "day": "2025-11-01",
                "label": "Old city",
                "items": [
                    { "time": "09:00", "name": "Old Town", "type": "attraction", "est_cost": 200 },
                    { "time": "13:00", "name": "Elephant camp", "type": "activity", "est_cost": 1500 },
                ],
            }],
            "budget_breakdown": { "attractions": 1700, "meals": 3800 },
        });

        future::ready(Ok(format!("```json\n{}\n```", plan))).boxed()
    }
}

struct Api {
    environment: Environment,
}

impl Api {
    fn new(test_name: &str, generator: Option<Arc<dyn TextGenerator + Send + Sync>>) -> Self {
        initialize_logger();

        let logger = Arc::new(slog_scope::logger().new(o!("test" => test_name.to_owned())));
        let urls = Arc::new(Urls::new(BASE_URL).expect("parse base URL"));

        let environment = Environment::new(
            logger,
            Arc::new(MemoryDb::new()),
            urls,
            Some(Arc::new(FixedPlaces)),
            generator,
            Config::new(2, 5),
        );

        Api { environment }
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        authorization: Option<&str>,
    ) -> (StatusCode, Value) {
        let filter = routes::make_api(self.environment.clone());

        let mut request = warp::test::request().method(method).path(path);

        if let Some(body) = body {
            request = request
                .header("content-type", "application/json")
                .body(body.to_string());
        }

        if let Some(authorization) = authorization {
            request = request.header("authorization", authorization);
        }

        let response = request.reply(&filter).await;
        let status = response.status();

        let body = if response.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(response.body()).expect("parse response as JSON")
        };

        (status, body)
    }

    async fn create_trip(&self, authorization: Option<&str>) -> String {
        let (status, body) = self
            .send("POST", "/trips", Some(json!({ "title": "Chiang Mai weekend" })), authorization)
            .await;
        assert_eq!(status, StatusCode::CREATED);

        body["trip"]["code"].as_str().expect("get trip code").to_owned()
    }

    async fn join(&self, code: &str, nickname: &str, budget: i64) {
        let (status, _) = self
            .send(
                "POST",
                &format!("/trips/{}/participants", code),
                Some(json!({
                    "nickname": nickname,
                    "available_dates": ["2025-11-01", "2025-11-02"],
                    "budget": budget,
                    "preferred_province": "Chiang Mai",
                    "travel_styles": ["nature", "food"],
                })),
                None,
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
    }

    async fn recommend(&self, code: &str) -> Vec<String> {
        let (status, body) = self
            .send("POST", &format!("/places/recommendations/{}", code), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);

        body["recommendations"]
            .as_array()
            .expect("get recommendations")
            .iter()
            .map(|r| r["id"].as_str().expect("get recommendation id").to_owned())
            .collect()
    }

    async fn vote(&self, code: &str, recommendation_id: &str, vote_type: &str) -> StatusCode {
        let (status, _) = self
            .send(
                "POST",
                &format!("/trips/{}/votes", code),
                Some(json!({
                    "recommendation_id": recommendation_id,
                    "vote_type": vote_type,
                    "participant_nickname": "Mali",
                })),
                None,
            )
            .await;

        status
    }

    /// Creates a trip with two participants, recommendations and
    /// enough votes to plan.
    async fn voted_trip(&self) -> (String, Vec<String>) {
        let code = self.create_trip(None).await;
        self.join(&code, "Mali", 3000).await;
        self.join(&code, "Niran", 5000).await;

        let ids = self.recommend(&code).await;
        assert_eq!(self.vote(&code, &ids[0], "up").await, StatusCode::CREATED);
        assert_eq!(self.vote(&code, &ids[1], "down").await, StatusCode::CREATED);

        (code, ids)
    }
}

#[tokio::test]
async fn creating_a_trip_returns_a_link() {
    let api = Api::new("creating_a_trip_returns_a_link", None);

    let filter = routes::make_api(api.environment.clone());
    let response = warp::test::request()
        .method("POST")
        .path("/trips")
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key("server-timing"));

    let body: Value = serde_json::from_slice(response.body()).expect("parse response");
    let code = body["trip"]["code"].as_str().expect("get trip code");

    assert_eq!(body["trip"]["title"], "Group trip");
    assert_eq!(body["trip"]["status"], "planning");
    assert_eq!(body["link"], format!("{}/trip/{}", BASE_URL, code));
    assert_eq!(
        response.headers().get("location").expect("get location header"),
        &format!("{}/trip/{}", BASE_URL, code)
    );

    let (status, body) = api
        .send("GET", &format!("/trips/{}", code.to_lowercase()), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trip"]["code"], code);
}

#[tokio::test]
async fn unknown_and_malformed_codes_are_rejected() {
    let api = Api::new("unknown_and_malformed_codes_are_rejected", None);

    let (status, body) = api.send("GET", "/trips/ZZZ999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["operation"], "retrieve_trip");

    let (status, _) = api.send("GET", "/trips/not-a-code", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_participants_are_rejected() {
    let api = Api::new("invalid_participants_are_rejected", None);
    let code = api.create_trip(None).await;
    let path = format!("/trips/{}/participants", code);

    let (status, body) = api
        .send(
            "POST",
            &path,
            Some(json!({
                "nickname": "Mali",
                "available_dates": [],
                "budget": 3000,
                "preferred_province": "Chiang Mai",
                "travel_styles": ["nature"],
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["operation"], "add_participant");

    let (status, _) = api.send("POST", &path, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = api
        .send(
            "POST",
            &path,
            Some(json!({
                "nickname": "Mali",
                "available_dates": ["2025-11-01"],
                "budget": "5000",
                "preferred_province": "Chiang Mai",
                "travel_styles": ["nature"],
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["message"].as_str().expect("get message").contains("budget"),
        "{}",
        body
    );

    let (status, body) = api.send("GET", &path, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participants"], json!([]));
}

#[tokio::test]
async fn recommendations_need_participants() {
    let api = Api::new("recommendations_need_participants", None);
    let code = api.create_trip(None).await;

    let (status, body) = api
        .send("POST", &format!("/places/recommendations/{}", code), None, None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["operation"], "generate_recommendations");
}

#[tokio::test]
async fn votes_must_reference_the_trip() {
    let api = Api::new("votes_must_reference_the_trip", None);
    let code = api.create_trip(None).await;
    api.join(&code, "Mali", 3000).await;
    api.recommend(&code).await;

    let status = api.vote(&code, &Uuid::new_v4().to_string(), "up").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api
        .send("POST", &format!("/trips/{}/votes", code), Some(json!({ "vote_type": "up" })), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn planning_waits_for_enough_votes() {
    let api = Api::new("planning_waits_for_enough_votes", None);
    let code = api.create_trip(None).await;
    api.join(&code, "Mali", 3000).await;
    let ids = api.recommend(&code).await;

    let plan_path = format!("/trips/{}/plan", code);

    let (status, _) = api.send("POST", &plan_path, None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(api.vote(&code, &ids[0], "up").await, StatusCode::CREATED);

    let (status, body) = api.send("POST", &plan_path, None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["operation"], "generate_plan");

    let (status, body) = api.send("GET", &format!("/trips/{}/consensus", code), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_votes"], 1);
    assert_eq!(body["ready"], false);

    let (status, _) = api.send("GET", &plan_path, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn voting_reaches_consensus() {
    let api = Api::new("voting_reaches_consensus", None);
    let (code, ids) = api.voted_trip().await;

    let (_, body) = api.send("GET", &format!("/trips/{}", code), None, None).await;
    assert_eq!(body["trip"]["status"], "consensus_reached");

    let (status, body) = api.send("GET", &format!("/trips/{}/consensus", code), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["minimum_votes"], 2);

    // both voted places share the highest total; the upvoted one ranks first
    let winners = body["winners"].as_array().expect("get winners");
    assert_eq!(winners.len(), 2);
    assert_eq!(winners[0]["id"], ids[0].as_str());
    assert_eq!(winners[0]["score"], 1);
    assert_eq!(winners[1]["id"], ids[1].as_str());

    let (status, body) = api.send("GET", &format!("/trips/{}/votes/full", code), None, None).await;
    assert_eq!(status, StatusCode::OK);

    let votes = body["votes"].as_array().expect("get votes");
    assert_eq!(votes.len(), 2);
    assert_eq!(votes[0]["recommendation_name"], "Night Market");
    assert_eq!(votes[1]["recommendation_name"], "Old Town");
}

#[tokio::test]
async fn plans_are_reused_until_regenerated() {
    let api = Api::new("plans_are_reused_until_regenerated", None);
    let (code, _) = api.voted_trip().await;
    let plan_path = format!("/trips/{}/plan", code);

    let (status, first) = api.send("POST", &plan_path, None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["from_cache"], false);
    assert_eq!(first["plan"]["source"], "template");

    let total = first["plan"]["total_budget"].as_i64().expect("get total budget");
    // the lowest budget in the group, times the group size
    assert_eq!(total, 6000);

    let breakdown = first["plan"]["budget_breakdown"]
        .as_object()
        .expect("get budget breakdown");
    let sum: i64 = breakdown.values().map(|v| v.as_i64().expect("get amount")).sum();
    assert_eq!(sum, total);

    let (status, second) = api.send("POST", &plan_path, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["from_cache"], true);
    assert_eq!(second["plan"], first["plan"]);

    let (status, current) = api.send("GET", &plan_path, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current, second);

    let (_, again) = api.send("GET", &plan_path, None, None).await;
    assert_eq!(again, current);

    let (status, third) = api
        .send("POST", &plan_path, Some(json!({ "force_new": true })), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(third["plan"]["id"], first["plan"]["id"]);

    let (_, current) = api.send("GET", &plan_path, None, None).await;
    assert_eq!(current["plan"], third["plan"]);

    let (_, history) = api.send("GET", &format!("/trips/{}/plans", code), None, None).await;
    assert_eq!(history["plans"], json!([first["plan"], third["plan"]]));

    let (_, again) = api.send("GET", &format!("/trips/{}/plans", code), None, None).await;
    assert_eq!(again, history);

    let (_, body) = api.send("GET", &format!("/trips/{}", code), None, None).await;
    assert_eq!(body["trip"]["status"], "plan_generated");
}

#[tokio::test]
async fn generated_plans_are_kept() {
    let api = Api::new("generated_plans_are_kept", Some(Arc::new(FencedGenerator)));
    let (code, _) = api.voted_trip().await;

    let (status, body) = api.send("POST", &format!("/trips/{}/plan", code), None, None).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["plan"]["source"], "generated");
    assert_eq!(body["plan"]["title"], "Lanna weekend");
    assert_eq!(body["plan"]["total_budget"], 5500);
    assert_eq!(body["plan"]["participants"], 2);
    assert_eq!(body["plan"]["itinerary"][0]["items"][1]["type"], "other");
    assert_eq!(body["plan"]["budget_breakdown"]["meals"], 3800);
}

#[tokio::test]
async fn snapshots_record_the_planning_context() {
    let api = Api::new("snapshots_record_the_planning_context", None);
    let (code, ids) = api.voted_trip().await;
    let snapshot_path = format!("/trips/{}/ai/snapshot", code);

    let (status, body) = api.send("GET", &snapshot_path, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["operation"], "latest_snapshot");

    let (status, created) = api.send("POST", &snapshot_path, None, None).await;
    assert_eq!(status, StatusCode::CREATED);

    let payload = &created["snapshot"]["payload"];
    assert_eq!(payload["group_size"], 2);
    assert_eq!(payload["budget_per_person"], 3000);
    assert_eq!(payload["preferred_province"], "Chiang Mai");
    assert_eq!(payload["candidates"].as_array().expect("get candidates").len(), ids.len());

    let (status, latest) = api.send("GET", &snapshot_path, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest, created);

    // generating a plan records the context it was built from
    let (status, _) = api.send("POST", &format!("/trips/{}/plan", code), None, None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, latest) = api.send("GET", &snapshot_path, None, None).await;
    assert_ne!(latest["snapshot"]["id"], created["snapshot"]["id"]);
    assert_eq!(latest["snapshot"]["payload"], created["snapshot"]["payload"]);

    let (status, _) = api.send("POST", "/trips/ZZZ999/ai/snapshot", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unusable_generations_fall_back_to_the_template() {
    let api = Api::new(
        "unusable_generations_fall_back_to_the_template",
        Some(Arc::new(GarbageGenerator)),
    );
    let (code, _) = api.voted_trip().await;

    let (status, body) = api.send("POST", &format!("/trips/{}/plan", code), None, None).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["plan"]["source"], "template_fallback");
    assert!(!body["plan"]["itinerary"].as_array().expect("get itinerary").is_empty());
}

#[tokio::test]
async fn owned_trips_need_a_session() {
    let api = Api::new("owned_trips_need_a_session", None);
    let owner = format!("Bearer {}", Uuid::new_v4());
    let stranger = format!("Bearer {}", Uuid::new_v4());

    let code = api.create_trip(Some(&owner)).await;

    let (status, _) = api.send("GET", "/mytrips", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = api.send("GET", "/mytrips", None, Some("Bearer nonsense")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = api.send("GET", "/mytrips", None, Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trips"][0]["code"], code.as_str());

    let (_, body) = api.send("GET", "/mytrips", None, Some(&stranger)).await;
    assert_eq!(body["trips"], json!([]));

    let trip_path = format!("/trips/{}", code);

    let (status, _) = api.send("DELETE", &trip_path, None, Some(&stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = api.send("DELETE", &trip_path, None, Some(&owner)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = api.send("GET", &trip_path, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_trip_removes_its_records() {
    let api = Api::new("deleting_a_trip_removes_its_records", None);
    let (code, _) = api.voted_trip().await;

    let (status, _) = api.send("DELETE", &format!("/trips/{}", code), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for path in &["participants", "recommendations", "votes", "plans", "ai/snapshot"] {
        let (status, _) = api
            .send("GET", &format!("/trips/{}/{}", code, path), None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", path);
    }
}

#[tokio::test]
async fn summary_describes_the_group() {
    let api = Api::new("summary_describes_the_group", None);
    let code = api.create_trip(None).await;
    api.join(&code, "Mali", 3000).await;
    api.join(&code, "Niran", 5000).await;

    let (status, body) = api.send("GET", &format!("/trips/{}/summary", code), None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participant_count"], 2);
}

#[tokio::test]
async fn healthz_reports_the_version() {
    let api = Api::new("healthz_reports_the_version", None);
    let filter = routes::admin::make_healthz_route(api.environment.clone());

    let response = warp::test::request()
        .method("GET")
        .path("/healthz")
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(response.body()).expect("parse response");
    assert_eq!(body["version"], info::VERSION);
}

fn initialize_logger() {
    SLOG_SCOPE_GUARD.get_or_init(|| slog_envlogger::init().expect("initialize slog-envlogger"));
}
