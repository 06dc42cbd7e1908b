//! Candidate places from the Google Places web service.

use std::collections::{HashMap, HashSet};

use futures::future::{BoxFuture, FutureExt};
use lazy_static::lazy_static;
use log::{debug, warn, Logger};
use serde::Deserialize;

use crate::analysis;
use crate::errors::BackendError;
use crate::participant::Participant;
use crate::recommendation::{PlaceCategory, PlaceDetails};

const TEXT_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
const NEARBY_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const LANGUAGE: &str = "en";

const DEFAULT_PROVINCE: &str = "Bangkok";

const MAX_KEYWORD_SEARCHES: usize = 3;
const MAX_TYPE_SEARCHES: usize = 2;
const MAX_PLACES: usize = 8;
const MAX_LODGINGS: usize = 2;
const MAX_RESTAURANTS: usize = 3;
const MIN_RATING: f64 = 3.5;

const PROVINCE_RADIUS: u32 = 20_000;
const LODGING_RADIUS: u32 = 5_000;
const RESTAURANT_RADIUS: u32 = 3_000;

const DEFAULT_PRICE_LEVEL: i64 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Coordinates {
    lat: f64,
    lng: f64,
}

fn at(lat: f64, lng: f64) -> Coordinates {
    Coordinates { lat, lng }
}

lazy_static! {
    static ref STYLE_KEYWORDS: HashMap<&'static str, &'static [&'static str]> = {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("beach", &["beach", "sea", "island"]);
        m.insert("mountain", &["mountain", "doi", "viewpoint"]);
        m.insert("temple", &["temple", "wat", "pagoda"]);
        m.insert("cafe", &["cafe", "coffee shop", "bakery"]);
        m.insert("shopping", &["shopping", "mall", "market"]);
        m.insert("nature", &["nature", "park", "waterfall"]);
        m.insert("culture", &["museum", "art gallery", "culture"]);
        m
    };

    static ref STYLE_TYPES: HashMap<&'static str, &'static [&'static str]> = {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("beach", &["beach", "tourist_attraction"]);
        m.insert("mountain", &["tourist_attraction", "natural_feature", "park"]);
        m.insert("temple", &["hindu_temple", "place_of_worship"]);
        m.insert("cafe", &["cafe", "bakery"]);
        m.insert("shopping", &["shopping_mall", "store"]);
        m.insert("nature", &["park", "natural_feature", "campground"]);
        m.insert("culture", &["museum", "art_gallery", "tourist_attraction"]);
        m
    };

    /// Keyed by lower-case English name and by Thai name.
    static ref PROVINCE_COORDINATES: HashMap<&'static str, Coordinates> = {
        let provinces = [
            ("bangkok", "กรุงเทพมหานคร", at(13.7563, 100.5018)),
            ("chiang mai", "เชียงใหม่", at(18.7883, 98.9853)),
            ("chiang rai", "เชียงราย", at(19.9105, 99.8406)),
            ("phuket", "ภูเก็ต", at(7.8804, 98.3923)),
            ("krabi", "กระบี่", at(8.0863, 98.9063)),
            ("surat thani", "สุราษฎร์ธานี", at(9.1382, 99.3267)),
            ("khon kaen", "ขอนแก่น", at(16.4419, 102.8360)),
            ("nakhon ratchasima", "นครราชสีมา", at(14.9799, 102.0977)),
            ("ubon ratchathani", "อุบลราชธานี", at(15.2286, 104.8560)),
            ("hat yai", "หาดใหญ่", at(7.0086, 100.4739)),
            ("pattaya", "พัทยา", at(12.9236, 100.8825)),
            ("ayutthaya", "อยุธยา", at(14.3532, 100.5775)),
            ("sukhothai", "สุโขทัย", at(17.0061, 99.8231)),
            ("kanchanaburi", "กาญจนบุรี", at(14.0227, 99.5328)),
            ("phetchaburi", "เพชรบุรี", at(13.1110, 99.9399)),
        ];

        let mut m = HashMap::new();
        for (english, thai, coordinates) in provinces.iter() {
            m.insert(*english, *coordinates);
            m.insert(*thai, *coordinates);
        }
        m
    };
}

pub fn province_coordinates(province: &str) -> Option<Coordinates> {
    let province = province.trim();

    PROVINCE_COORDINATES
        .get(province)
        .or_else(|| PROVINCE_COORDINATES.get(province.to_lowercase().as_str()))
        .copied()
}

/// What to search for, derived from a trip's participants.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PlaceQuery {
    pub(crate) province: String,
    pub(crate) styles: Vec<String>,
    pub(crate) average_budget: i64,
    pub(crate) participant_count: usize,
}

impl PlaceQuery {
    /// Returns `None` for a trip without participants.
    pub fn from_participants(participants: &[Participant]) -> Option<Self> {
        let budget = analysis::budget_range(participants)?;

        Some(PlaceQuery {
            province: analysis::top_province(participants)
                .unwrap_or_else(|| DEFAULT_PROVINCE.to_owned()),
            styles: analysis::dominant_styles(participants),
            average_budget: budget.average,
            participant_count: participants.len(),
        })
    }

    /// Text searches, one per style keyword, each scoped to the province.
    pub fn keywords(&self) -> Vec<String> {
        self.styles
            .iter()
            .filter_map(|s| STYLE_KEYWORDS.get(s.as_str()))
            .flat_map(|words| words.iter())
            .map(|word| format!("{} {}", word, self.province))
            .collect()
    }

    /// Place types matching the styles, without duplicates.
    pub fn place_types(&self) -> Vec<&'static str> {
        let mut seen = HashSet::new();

        self.styles
            .iter()
            .filter_map(|s| STYLE_TYPES.get(s.as_str()))
            .flat_map(|types| types.iter().copied())
            .filter(|t| seen.insert(*t))
            .collect()
    }
}

/// Looks up candidate places.
pub trait PlaceFinder {
    fn find(&self, query: &PlaceQuery) -> BoxFuture<Result<Vec<PlaceDetails>, BackendError>>;
}

#[derive(Clone, Debug, Default, Deserialize)]
struct OpeningHours {
    #[serde(default)]
    open_now: Option<bool>,
}

#[derive(Clone, Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

/// A result as returned by the web service.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RawPlace {
    place_id: String,
    name: String,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    user_ratings_total: Option<i64>,
    #[serde(default)]
    price_level: Option<i64>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    opening_hours: Option<OpeningHours>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

impl RawPlace {
    fn address(&self) -> Option<&str> {
        self.vicinity
            .as_deref()
            .or_else(|| self.formatted_address.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<RawPlace>,
}

impl SearchResponse {
    fn into_results(self) -> Result<Vec<RawPlace>, BackendError> {
        match self.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(self.results),
            _ => Err(BackendError::PlacesStatus(self.status)),
        }
    }
}

pub fn category_for(place_type: &str) -> PlaceCategory {
    match place_type {
        "restaurant" => PlaceCategory::Restaurant,
        "lodging" => PlaceCategory::Accommodation,
        "cafe" | "bakery" => PlaceCategory::Cafe,
        "shopping_mall" | "store" => PlaceCategory::Shopping,
        _ => PlaceCategory::Attraction,
    }
}

/// Estimates the cost per person of a visit from the place's price
/// level and the group's average budget.
pub fn estimate_cost(price_level: Option<i64>, budget: i64) -> i64 {
    let level = price_level.unwrap_or(DEFAULT_PRICE_LEVEL) as f64;
    let budget = budget as f64;

    let estimate = (100.0 * (level * 0.5 + 0.5) * (budget / 1000.0)).round();

    estimate.min(budget * 0.3).max(50.0).round() as i64
}

/// Keeps the best-rated distinct places.
fn select(places: Vec<RawPlace>) -> Vec<RawPlace> {
    let mut seen = HashSet::new();

    let mut selected: Vec<RawPlace> = places
        .into_iter()
        .filter(|p| seen.insert(p.place_id.clone()))
        .filter(|p| p.rating.map_or(false, |r| r >= MIN_RATING))
        .collect();

    selected.sort_by(|a, b| {
        let a = a.rating.unwrap_or(0.0);
        let b = b.rating.unwrap_or(0.0);
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });

    selected.truncate(MAX_PLACES);
    selected
}

fn to_details(place: &RawPlace, place_type: Option<&str>, budget: i64) -> PlaceDetails {
    let primary_type = place_type
        .or_else(|| place.types.first().map(String::as_str))
        .unwrap_or("tourist_attraction");
    let category = category_for(primary_type);

    let rating = place.rating.unwrap_or(0.0);
    let reviews = place.user_ratings_total.unwrap_or(0);
    let open_now = place.opening_hours.as_ref().map(|h| h.open_now.unwrap_or(false));
    let address = place.address().unwrap_or("");
    let rating_text = place
        .rating
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unknown".to_owned());

    let mut pros = vec![];
    let mut cons = vec![];

    if rating >= 4.5 {
        pros.push("Highly rated");
    }
    if reviews > 500 {
        pros.push("Popular");
    }
    if place.price_level.unwrap_or(DEFAULT_PRICE_LEVEL) <= 2 {
        pros.push("Affordable");
    }
    if open_now == Some(true) {
        pros.push("Open now");
    }

    if place.price_level.unwrap_or(0) >= 3 {
        cons.push("Expensive");
    }
    if open_now == Some(false) {
        cons.push("May be closed now");
    }
    if reviews < 50 {
        cons.push("Few reviews");
    }

    let mut description = place
        .address()
        .unwrap_or("A local point of interest")
        .to_owned();
    let mut duration = match primary_type {
        "restaurant" | "cafe" => "1-2 hours",
        _ => "2-3 hours",
    };

    match category {
        PlaceCategory::Accommodation => {
            description = format!(
                "{} is a place to stay rated {}, located at {}",
                place.name, rating_text, address
            );
            duration = "Overnight";
            pros.push("Close to the attractions");
        }
        PlaceCategory::Restaurant => {
            description = format!(
                "{} is a restaurant rated {}, located at {}",
                place.name, rating_text, address
            );
            pros.push("Close to the main attractions");
        }
        _ => {}
    }

    if pros.is_empty() {
        pros.push("Worth a visit");
    }
    if cons.is_empty() {
        cons.push("Check the details before going");
    }

    PlaceDetails {
        name: place.name.clone(),
        category,
        description,
        rating,
        estimated_cost: estimate_cost(place.price_level, budget),
        duration: duration.to_owned(),
        location: address.to_owned(),
        pros: pros.into_iter().map(str::to_owned).collect(),
        cons: cons.into_iter().map(str::to_owned).collect(),
        place_id: place.place_id.clone(),
    }
}

/// Searches the Google Places web service. Individual failed searches
/// are logged and skipped.
pub struct GooglePlaces {
    logger: Logger,
    client: reqwest::Client,
    api_key: String,
}

impl GooglePlaces {
    pub fn new(logger: Logger, client: reqwest::Client, api_key: impl Into<String>) -> Self {
        GooglePlaces {
            logger,
            client,
            api_key: api_key.into(),
        }
    }

    async fn search(&self, url: &str, params: &[(&str, String)]) -> Result<Vec<RawPlace>, BackendError> {
        let response: SearchResponse = self
            .client
            .get(url)
            .query(params)
            .query(&[("language", LANGUAGE), ("key", self.api_key.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| BackendError::PlacesService { source })?
            .json()
            .await
            .map_err(|source| BackendError::PlacesService { source })?;

        response.into_results()
    }

    async fn search_text(&self, keyword: &str) -> Vec<RawPlace> {
        debug!(self.logger, "Searching places by text..."; "keyword" => keyword);

        let result = self
            .search(TEXT_SEARCH_URL, &[("query", keyword.to_owned())])
            .await;

        self.or_empty(result)
    }

    async fn search_nearby(&self, at: Coordinates, radius: u32, place_type: &str) -> Vec<RawPlace> {
        debug!(self.logger, "Searching places nearby..."; "type" => place_type, "radius" => radius);

        let params = [
            ("location", format!("{},{}", at.lat, at.lng)),
            ("radius", radius.to_string()),
            ("type", place_type.to_owned()),
        ];
        let result = self.search(NEARBY_SEARCH_URL, &params).await;

        self.or_empty(result)
    }

    fn or_empty(&self, result: Result<Vec<RawPlace>, BackendError>) -> Vec<RawPlace> {
        result.unwrap_or_else(|e| {
            warn!(self.logger, "Place search failed"; "error" => %e);
            vec![]
        })
    }

    async fn find_places(&self, query: &PlaceQuery) -> Vec<PlaceDetails> {
        let mut found = vec![];

        for keyword in query.keywords().iter().take(MAX_KEYWORD_SEARCHES) {
            found.extend(self.search_text(keyword).await);
        }

        if let Some(center) = province_coordinates(&query.province) {
            for place_type in query.place_types().into_iter().take(MAX_TYPE_SEARCHES) {
                found.extend(self.search_nearby(center, PROVINCE_RADIUS, place_type).await);
            }
        }

        let selected = select(found);

        let mut details: Vec<PlaceDetails> = selected
            .iter()
            .map(|p| to_details(p, None, query.average_budget))
            .collect();

        let top_attraction = selected
            .iter()
            .find(|p| p.types.iter().any(|t| t == "tourist_attraction"))
            .or_else(|| selected.first());

        if let Some(center) = top_attraction.and_then(|p| p.geometry.as_ref()).map(|g| g.location) {
            let lodgings = self.search_nearby(center, LODGING_RADIUS, "lodging").await;
            details.extend(
                lodgings
                    .iter()
                    .take(MAX_LODGINGS)
                    .map(|p| to_details(p, Some("lodging"), query.average_budget)),
            );

            let restaurants = self.search_nearby(center, RESTAURANT_RADIUS, "restaurant").await;
            details.extend(
                restaurants
                    .iter()
                    .take(MAX_RESTAURANTS)
                    .map(|p| to_details(p, Some("restaurant"), query.average_budget)),
            );
        }

        details
    }
}

impl PlaceFinder for GooglePlaces {
    fn find(&self, query: &PlaceQuery) -> BoxFuture<Result<Vec<PlaceDetails>, BackendError>> {
        let query = query.clone();

        async move { Ok(self.find_places(&query).await) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::analysis::tests::participant;

    fn raw(value: serde_json::Value) -> RawPlace {
        serde_json::from_value(value).expect("parse raw place")
    }

    fn query(styles: &[&str], province: &str) -> PlaceQuery {
        PlaceQuery {
            province: province.to_owned(),
            styles: styles.iter().map(|s| (*s).to_owned()).collect(),
            average_budget: 3000,
            participant_count: 2,
        }
    }

    #[test]
    fn queries_come_from_the_group() {
        let group = vec![
            participant(&["2025-11-01"], 3000, "Krabi", &["beach", "food"]),
            participant(&["2025-11-01"], 4001, "Krabi", &["beach"]),
        ];

        let query = PlaceQuery::from_participants(&group).expect("build query");

        assert_eq!(query.province, "Krabi");
        assert_eq!(query.styles, vec!["beach", "food"]);
        assert_eq!(query.average_budget, 3501);
        assert_eq!(PlaceQuery::from_participants(&[]), None);
    }

    #[test]
    fn keywords_and_types_follow_styles() {
        let query = query(&["temple", "unknown", "culture"], "Chiang Mai");

        assert_eq!(
            &query.keywords()[..3],
            &["temple Chiang Mai", "wat Chiang Mai", "pagoda Chiang Mai"]
        );
        assert_eq!(
            query.place_types(),
            vec!["hindu_temple", "place_of_worship", "museum", "art_gallery", "tourist_attraction"]
        );
    }

    #[test]
    fn provinces_resolve_in_either_language() {
        assert_eq!(province_coordinates("Chiang Mai"), province_coordinates("เชียงใหม่"));
        assert!(province_coordinates(" krabi ").is_some());
        assert_eq!(province_coordinates("Atlantis"), None);
    }

    #[test]
    fn costs_are_bounded() {
        assert_eq!(estimate_cost(None, 3000), 450);
        assert_eq!(estimate_cost(Some(4), 1000), 250);
        assert_eq!(estimate_cost(Some(0), 100), 50);
        assert_eq!(estimate_cost(Some(2), 10_000), 1500);
    }

    #[test]
    fn only_distinct_well_rated_places_are_kept() {
        let mut places: Vec<RawPlace> = (0..10)
            .map(|i| raw(json!({ "place_id": format!("p{}", i), "name": "x", "rating": 3.6 + i as f64 * 0.1 })))
            .collect();
        places.push(raw(json!({ "place_id": "p9", "name": "again", "rating": 5.0 })));
        places.push(raw(json!({ "place_id": "low", "name": "low", "rating": 3.4 })));
        places.push(raw(json!({ "place_id": "unrated", "name": "unrated" })));

        let selected = select(places);
        let ids: Vec<&str> = selected.iter().map(|p| p.place_id.as_str()).collect();

        assert_eq!(ids, vec!["p9", "p8", "p7", "p6", "p5", "p4", "p3", "p2"]);
        assert_eq!(selected[0].name, "x");
    }

    #[test]
    fn details_describe_the_place() {
        let place = raw(json!({
            "place_id": "abc",
            "name": "Riverside Inn",
            "rating": 4.6,
            "user_ratings_total": 20,
            "price_level": 3,
            "types": ["restaurant", "food"],
            "vicinity": "Charoen Rat Rd",
            "opening_hours": { "open_now": false },
        }));

        let lodging = to_details(&place, Some("lodging"), 3000);
        assert_eq!(lodging.category, PlaceCategory::Accommodation);
        assert_eq!(lodging.duration, "Overnight");
        assert_eq!(lodging.pros, vec!["Highly rated", "Close to the attractions"]);
        assert_eq!(lodging.cons, vec!["Expensive", "May be closed now", "Few reviews"]);
        assert_eq!(lodging.location, "Charoen Rat Rd");

        let restaurant = to_details(&place, None, 3000);
        assert_eq!(restaurant.category, PlaceCategory::Restaurant);
        assert_eq!(restaurant.duration, "1-2 hours");
        assert!(restaurant.description.starts_with("Riverside Inn is a restaurant rated 4.6"));
    }

    #[test]
    fn error_statuses_are_surfaced() {
        let denied: SearchResponse =
            serde_json::from_value(json!({ "status": "REQUEST_DENIED", "results": [] })).unwrap();
        assert!(matches!(denied.into_results(), Err(BackendError::PlacesStatus(_))));

        let empty: SearchResponse = serde_json::from_value(json!({ "status": "ZERO_RESULTS" })).unwrap();
        assert!(empty.into_results().unwrap().is_empty());
    }
}
