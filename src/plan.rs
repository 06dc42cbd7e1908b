use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::BackendError;

/// What an itinerary item is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Travel,
    Meal,
    Attraction,
    Checkin,
    Checkout,
    Shopping,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItineraryItem {
    /// Local time, `HH:MM`.
    pub(crate) time: String,

    pub(crate) name: String,

    #[serde(rename = "type")]
    pub(crate) kind: ItemKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) location: Option<String>,

    /// Cost for the whole group.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_amount"
    )]
    pub(crate) est_cost: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) duration: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    /// Either an ISO date or a placeholder such as `"Day 1"`.
    pub(crate) day: String,

    pub(crate) label: String,

    pub(crate) items: Vec<ItineraryItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    #[serde(default)]
    pub(crate) destinations: Vec<String>,

    #[serde(default)]
    pub(crate) accommodation: Option<String>,

    #[serde(default)]
    pub(crate) transportation: Option<String>,

    #[serde(default)]
    pub(crate) total_distance: Option<String>,
}

/// Spending per category for the whole group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetBreakdown {
    #[serde(deserialize_with = "deserialize_amount")]
    pub(crate) transportation: i64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub(crate) accommodation: i64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub(crate) attractions: i64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub(crate) meals: i64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub(crate) shopping: i64,
    #[serde(deserialize_with = "deserialize_amount")]
    pub(crate) miscellaneous: i64,
}

impl BudgetBreakdown {
    pub fn total(&self) -> i64 {
        self.transportation
            + self.accommodation
            + self.attractions
            + self.meals
            + self.shopping
            + self.miscellaneous
    }
}

/// The itinerary itself, as stored and as produced by either the
/// generator or the template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanContent {
    pub(crate) title: String,

    /// Free text, e.g. `"2025-11-01 to 2025-11-02"`.
    #[serde(default)]
    pub(crate) dates: Option<String>,

    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub(crate) participants: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub(crate) total_budget: Option<i64>,

    #[serde(default)]
    pub(crate) overview: Overview,

    pub(crate) itinerary: Vec<ItineraryDay>,

    #[serde(default)]
    pub(crate) budget_breakdown: BudgetBreakdown,

    #[serde(default)]
    pub(crate) tips: Vec<String>,
}

impl PlanContent {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn itinerary(&self) -> &[ItineraryDay] {
        &self.itinerary
    }

    pub fn budget_breakdown(&self) -> &BudgetBreakdown {
        &self.budget_breakdown
    }

    pub fn total_budget(&self) -> Option<i64> {
        self.total_budget
    }
}

/// How a plan was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Written by the text generator.
    Generated,
    /// Built from the template because no generator is configured.
    Template,
    /// Built from the template after the generator failed.
    TemplateFallback,
}

impl PlanSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanSource::Generated => "generated",
            PlanSource::Template => "template",
            PlanSource::TemplateFallback => "template_fallback",
        }
    }
}

impl FromStr for PlanSource {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(PlanSource::Generated),
            "template" => Ok(PlanSource::Template),
            "template_fallback" => Ok(PlanSource::TemplateFallback),
            _ => Err(BackendError::UnknownEnumValue {
                kind: "plan source",
                value: s.to_owned(),
            }),
        }
    }
}

/// A stored plan. Plans are never updated; a trip points at its
/// current one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Plan {
    pub(crate) id: Uuid,

    pub(crate) trip_id: Uuid,

    #[serde(flatten)]
    pub(crate) content: PlanContent,

    pub(crate) source: PlanSource,

    #[serde(with = "time::serde::timestamp")]
    pub(crate) created_at: OffsetDateTime,
}

impl Plan {
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn content(&self) -> &PlanContent {
        &self.content
    }

    pub fn source(&self) -> PlanSource {
        self.source
    }
}

/// The optional body of a plan request.
#[derive(Debug, Default, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub(crate) force_new: bool,
}

// generated text sometimes carries amounts as floats
fn deserialize_amount<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let amount = f64::deserialize(deserializer)?;
    Ok(amount.round() as i64)
}

fn deserialize_optional_amount<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let amount: Option<f64> = Deserialize::deserialize(deserializer)?;
    Ok(amount.map(|a| a.round() as i64))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ItemKind, PlanContent, PlanRequest};

    #[test]
    fn lenient_amounts_are_rounded() {
        let content: PlanContent = serde_json::from_value(json!({
            "title": "Chiang Mai weekend",
            "total_budget": 9000.4,
            "itinerary": [{
                "day": "2025-11-01",
                "label": "Day 1",
                "items": [{ "time": "09:00", "name": "Doi Suthep", "type": "attraction", "est_cost": 399.6 }],
            }],
            "budget_breakdown": { "meals": 1350.5, "shopping": 450 },
        }))
        .expect("parse plan content");

        assert_eq!(content.total_budget, Some(9000));
        assert_eq!(content.participants, None);
        assert_eq!(content.itinerary[0].items[0].est_cost, Some(400));
        assert_eq!(content.itinerary[0].items[0].kind, ItemKind::Attraction);
        assert_eq!(content.budget_breakdown.meals, 1351);
        assert_eq!(content.budget_breakdown.total(), 1801);
        assert!(content.tips.is_empty());
    }

    #[test]
    fn item_kinds_use_the_type_key() {
        let value = serde_json::to_value(super::ItineraryItem {
            time: "12:00".to_owned(),
            name: "Lunch".to_owned(),
            kind: ItemKind::Meal,
            location: None,
            est_cost: Some(300),
            duration: None,
        })
        .unwrap();

        assert_eq!(value, json!({ "time": "12:00", "name": "Lunch", "type": "meal", "est_cost": 300 }));
    }

    #[test]
    fn force_defaults_to_false() {
        let request: PlanRequest = serde_json::from_str("{}").unwrap();
        assert!(!request.force_new);
    }
}
