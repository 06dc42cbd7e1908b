//! Turns the group's constraints and the voted places into an
//! itinerary.

use std::sync::Arc;

use log::{debug, warn, Logger};
use serde::Serialize;

use crate::analysis;
use crate::consensus::{Consensus, RankedCandidate};
use crate::dates::IsoDate;
use crate::errors::BackendError;
use crate::generator::{Prompt, TextGenerator};
use crate::participant::Participant;
use crate::plan::{
    BudgetBreakdown, ItemKind, ItineraryDay, ItineraryItem, Overview, PlanContent, PlanSource,
};
use crate::recommendation::PlaceCategory;

const DEFAULT_GROUP_SIZE: i64 = 2;
const DEFAULT_BUDGET_PER_PERSON: i64 = 10_000;

const LUNCH_PER_PERSON: i64 = 150;
const DINNER_PER_PERSON: i64 = 200;

/// Default per-person costs of the three attraction slots.
const DEFAULT_ATTRACTION_COSTS: [i64; 3] = [200, 150, 100];
const PLACEHOLDER_NAMES: [&str; 3] = ["Attraction A", "Attraction B", "Attraction C"];
const DEFAULT_DURATION: &str = "2 hours";
const UNSPECIFIED_LOCATION: &str = "Not specified";

const SYSTEM_PROMPT: &str = r#"You are a travel planner for groups travelling in Thailand.
Plan a trip from the JSON context you are given and answer with a single JSON object, without Markdown, of this shape:
{
  "title": string,
  "dates": string or null,
  "participants": integer,
  "total_budget": integer,
  "overview": { "destinations": [string], "accommodation": string, "transportation": string, "total_distance": string },
  "itinerary": [
    { "day": "YYYY-MM-DD", "label": string,
      "items": [ { "time": "HH:MM", "name": string, "type": "travel" | "meal" | "attraction" | "checkin" | "checkout" | "shopping" | "other", "location": string, "est_cost": integer, "duration": string } ] }
  ],
  "budget_breakdown": { "transportation": integer, "accommodation": integer, "attractions": integer, "meals": integer, "shopping": integer, "miscellaneous": integer },
  "tips": [string]
}
Rules:
- Prefer the candidates marked as winners, then the rest in ranking order.
- Only use dates from common_dates when there are any.
- The total budget must not exceed budget_per_person multiplied by group_size.
- Costs are in Thai baht for the whole group."#;

/// A place as presented to the planner.
#[derive(Clone, Debug, Serialize)]
pub struct CandidateSummary {
    name: String,
    category: PlaceCategory,
    estimated_cost: i64,
    rating: f64,
    duration: String,
    location: String,
    up_votes: usize,
    down_votes: usize,
    score: i64,
    winner: bool,
}

impl CandidateSummary {
    fn new(candidate: &RankedCandidate, winner: bool) -> Self {
        let details = candidate.recommendation().details();
        let tally = candidate.tally();

        CandidateSummary {
            name: details.name.clone(),
            category: details.category,
            estimated_cost: details.estimated_cost,
            rating: details.rating,
            duration: details.duration.clone(),
            location: details.location.clone(),
            up_votes: tally.up_count,
            down_votes: tally.down_count,
            score: tally.score(),
            winner,
        }
    }
}

/// Everything the assembler knows about a trip.
#[derive(Clone, Debug, Serialize)]
pub struct PlanContext {
    title: String,
    group_size: i64,
    /// The lowest budget in the group, so the plan fits everyone.
    budget_per_person: i64,
    common_dates: Vec<IsoDate>,
    travel_styles: Vec<String>,
    preferred_province: Option<String>,
    /// Ranked best first.
    candidates: Vec<CandidateSummary>,
}

impl PlanContext {
    pub fn new(title: &str, participants: &[Participant], consensus: &Consensus) -> Self {
        let group_size = if participants.is_empty() {
            DEFAULT_GROUP_SIZE
        } else {
            participants.len() as i64
        };

        let budget_per_person = analysis::budget_range(participants)
            .map(|b| b.min)
            .unwrap_or(DEFAULT_BUDGET_PER_PERSON);

        let winners = consensus.winners().len();

        PlanContext {
            title: title.to_owned(),
            group_size,
            budget_per_person,
            common_dates: analysis::common_dates(participants),
            travel_styles: analysis::dominant_styles(participants),
            preferred_province: analysis::top_province(participants),
            candidates: consensus
                .ranking()
                .iter()
                .enumerate()
                .map(|(i, c)| CandidateSummary::new(c, i < winners))
                .collect(),
        }
    }

    pub fn total_budget(&self) -> i64 {
        self.group_size * self.budget_per_person
    }

    fn prompt(&self) -> Result<Prompt, BackendError> {
        let context = serde_json::to_string_pretty(self)
            .map_err(|source| BackendError::ContextSerialization { source })?;

        Ok(Prompt {
            system: SYSTEM_PROMPT.to_owned(),
            user: context,
        })
    }

    /// The two days of the template plan.
    fn days(&self) -> (String, String) {
        match self.common_dates.as_slice() {
            [] => ("Day 1".to_owned(), "Day 2".to_owned()),
            [only] => (only.to_string(), only.next_day().to_string()),
            [first, second, ..] => (first.to_string(), second.to_string()),
        }
    }

    fn date_range(&self) -> Option<String> {
        match self.common_dates.as_slice() {
            [first, .., last] => Some(format!("{} to {}", first, last)),
            _ => None,
        }
    }
}

/// Builds the deterministic plan used when no generated plan is
/// available. The three best-ranked candidates fill the attraction
/// slots.
pub fn template_plan(context: &PlanContext) -> PlanContent {
    let group = context.group_size;
    let total_budget = context.total_budget();
    let top: Vec<&CandidateSummary> = context.candidates.iter().take(3).collect();

    let attraction = |slot: usize, time: &str| -> ItineraryItem {
        let candidate = top.get(slot);

        ItineraryItem {
            time: time.to_owned(),
            name: candidate
                .map(|c| c.name.clone())
                .unwrap_or_else(|| PLACEHOLDER_NAMES[slot].to_owned()),
            kind: ItemKind::Attraction,
            location: Some(
                candidate
                    .map(|c| c.location.clone())
                    .unwrap_or_else(|| UNSPECIFIED_LOCATION.to_owned()),
            ),
            est_cost: Some(
                candidate
                    .map(|c| c.estimated_cost)
                    .filter(|cost| *cost > 0)
                    .unwrap_or(DEFAULT_ATTRACTION_COSTS[slot])
                    * group,
            ),
            duration: Some(
                candidate
                    .map(|c| c.duration.clone())
                    .unwrap_or_else(|| DEFAULT_DURATION.to_owned()),
            ),
        }
    };

    let item = |time: &str, name: &str, kind: ItemKind, cost: i64, duration: &str| ItineraryItem {
        time: time.to_owned(),
        name: name.to_owned(),
        kind,
        location: None,
        est_cost: Some(cost),
        duration: Some(duration.to_owned()),
    };

    let (first_day, second_day) = context.days();

    let itinerary = vec![
        ItineraryDay {
            day: first_day,
            label: "Day 1".to_owned(),
            items: vec![
                attraction(0, "09:00"),
                item("12:00", "Lunch at a local restaurant", ItemKind::Meal, LUNCH_PER_PERSON * group, "1 hour"),
                attraction(1, "14:00"),
                item("18:00", "Check in", ItemKind::Checkin, 0, "30 minutes"),
                item("19:00", "Dinner by the river", ItemKind::Meal, DINNER_PER_PERSON * group, "1.5 hours"),
            ],
        },
        ItineraryDay {
            day: second_day,
            label: "Day 2".to_owned(),
            items: vec![
                item("08:00", "Breakfast at the hotel", ItemKind::Meal, 0, "1 hour"),
                item("10:00", "Check out", ItemKind::Checkout, 0, "30 minutes"),
                attraction(2, "11:00"),
                item("14:00", "Travel home", ItemKind::Travel, 0, "3 hours"),
            ],
        },
    ];

    let destinations: Vec<String> = top.iter().map(|c| c.name.clone()).collect();
    let headline = destinations
        .first()
        .cloned()
        .or_else(|| context.preferred_province.clone())
        .unwrap_or_else(|| "Thailand".to_owned());

    PlanContent {
        title: format!("Trip plan: {}", headline),
        dates: context.date_range(),
        participants: Some(group),
        total_budget: Some(total_budget),
        overview: Overview {
            destinations,
            accommodation: Some("Hotel or resort near the attractions".to_owned()),
            transportation: Some("Rental car or van".to_owned()),
            total_distance: Some("about 150 km".to_owned()),
        },
        itinerary,
        budget_breakdown: split_budget(total_budget),
        tips: vec![
            "Carry some cash for small purchases and tips.".to_owned(),
            "Allow 20-30% extra time for travel between stops.".to_owned(),
            "Check the weather forecast before leaving.".to_owned(),
            format!("Total budget is {} baht for {} people.", total_budget, group),
        ],
    }
}

/// Splits a budget 25/30/20/15/5/5. Rounding is absorbed by the last
/// category, so the parts always add up to the total.
fn split_budget(total: i64) -> BudgetBreakdown {
    let share = |percent: i64| (total * percent + 50) / 100;

    let transportation = share(25);
    let accommodation = share(30);
    let attractions = share(20);
    let meals = share(15);
    let shopping = share(5);

    BudgetBreakdown {
        transportation,
        accommodation,
        attractions,
        meals,
        shopping,
        miscellaneous: total - transportation - accommodation - attractions - meals - shopping,
    }
}

/// Parses generated text as a plan, filling in what the generator
/// left out.
pub fn parse_generated(text: &str, context: &PlanContext) -> Result<PlanContent, BackendError> {
    let mut content: PlanContent = serde_json::from_str(strip_fences(text))
        .map_err(|source| BackendError::UnparseablePlan { source })?;

    if content.itinerary.is_empty() {
        return Err(BackendError::EmptyItinerary);
    }

    if let Some(day) = content.itinerary.iter().find(|d| d.items.is_empty()) {
        return Err(BackendError::EmptyDay(day.day.clone()));
    }

    content.participants.get_or_insert(context.group_size);
    content.total_budget.get_or_insert(context.total_budget());

    Ok(content)
}

fn strip_fences(text: &str) -> &str {
    let text = text.trim();

    match text.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => text,
    }
}

/// Produces a plan for every request, whether or not a generator is
/// configured or working.
#[derive(Clone)]
pub struct Assembler {
    logger: Arc<Logger>,
    generator: Option<Arc<dyn TextGenerator + Send + Sync>>,
}

impl Assembler {
    pub fn new(logger: Arc<Logger>, generator: Option<Arc<dyn TextGenerator + Send + Sync>>) -> Self {
        Assembler { logger, generator }
    }

    pub async fn assemble(&self, context: &PlanContext) -> (PlanContent, PlanSource) {
        let generator = match &self.generator {
            Some(g) => g,
            None => {
                debug!(self.logger, "No generator configured, using template...");
                return (template_plan(context), PlanSource::Template);
            }
        };

        match self.generate(generator.as_ref(), context).await {
            Ok(content) => (content, PlanSource::Generated),
            Err(e) => {
                warn!(self.logger, "Generation failed, using template"; "error" => %e);
                (template_plan(context), PlanSource::TemplateFallback)
            }
        }
    }

    async fn generate(
        &self,
        generator: &(dyn TextGenerator + Send + Sync),
        context: &PlanContext,
    ) -> Result<PlanContent, BackendError> {
        let prompt = context.prompt()?;
        let text = generator.generate(&prompt).await?;

        parse_generated(&text, context)
    }
}
