//! Group constraints derived from participant submissions.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::dates::IsoDate;
use crate::participant::Participant;

const MAX_DOMINANT_STYLES: usize = 3;

/// The number of participants a date needs to count as common: half
/// the group, rounded up, and never less than one.
pub fn majority_threshold(participants: usize) -> usize {
    ((participants + 1) / 2).max(1)
}

/// How many participants are available on each date.
pub fn date_counts(participants: &[Participant]) -> BTreeMap<IsoDate, usize> {
    let mut counts = BTreeMap::new();

    for participant in participants {
        for date in &participant.details.available_dates {
            *counts.entry(*date).or_insert(0) += 1;
        }
    }

    counts
}

/// Dates on which a majority of the group is available, earliest first.
pub fn common_dates(participants: &[Participant]) -> Vec<IsoDate> {
    common_date_counts(participants)
        .into_iter()
        .map(|c| c.date)
        .collect()
}

fn common_date_counts(participants: &[Participant]) -> Vec<DateCount> {
    let threshold = majority_threshold(participants.len());

    date_counts(participants)
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .map(|(date, count)| DateCount { date, count })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DateCount {
    pub(crate) date: IsoDate,
    pub(crate) count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Popularity {
    pub(crate) value: String,
    pub(crate) count: usize,
}

/// Counts values, most frequent first. Ties keep the order in which
/// values were first seen.
fn rank<'a>(values: impl Iterator<Item = &'a str>) -> Vec<Popularity> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut ranked: Vec<Popularity> = Vec::new();

    for value in values {
        match positions.get(value) {
            Some(&i) => ranked[i].count += 1,
            None => {
                positions.insert(value, ranked.len());
                ranked.push(Popularity {
                    value: value.to_owned(),
                    count: 1,
                });
            }
        }
    }

    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

pub fn popular_styles(participants: &[Participant]) -> Vec<Popularity> {
    rank(
        participants
            .iter()
            .flat_map(|p| p.details.travel_styles.iter().map(String::as_str)),
    )
}

/// The most requested travel styles, at most three.
pub fn dominant_styles(participants: &[Participant]) -> Vec<String> {
    popular_styles(participants)
        .into_iter()
        .take(MAX_DOMINANT_STYLES)
        .map(|p| p.value)
        .collect()
}

pub fn popular_provinces(participants: &[Participant]) -> Vec<Popularity> {
    rank(
        participants
            .iter()
            .map(|p| p.details.preferred_province.as_str()),
    )
}

pub fn top_province(participants: &[Participant]) -> Option<String> {
    popular_provinces(participants)
        .into_iter()
        .next()
        .map(|p| p.value)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetRange {
    pub(crate) min: i64,
    pub(crate) max: i64,
    /// Rounded to the nearest whole number.
    pub(crate) average: i64,
}

pub fn budget_range(participants: &[Participant]) -> Option<BudgetRange> {
    let budgets = participants.iter().map(|p| p.details.budget);

    let min = budgets.clone().min()?;
    let max = budgets.clone().max()?;

    let count = participants.len() as i64;
    let sum: i64 = budgets.sum();

    Some(BudgetRange {
        min,
        max,
        average: (sum + count / 2) / count,
    })
}

/// Everything the summary page shows about a group.
#[derive(Clone, Debug, Serialize)]
pub struct GroupSummary {
    participant_count: usize,
    common_dates: Vec<DateCount>,
    budget: Option<BudgetRange>,
    provinces: Vec<Popularity>,
    travel_styles: Vec<Popularity>,
}

impl GroupSummary {
    pub fn new(participants: &[Participant]) -> Self {
        GroupSummary {
            participant_count: participants.len(),
            common_dates: common_date_counts(participants),
            budget: budget_range(participants),
            provinces: popular_provinces(participants),
            travel_styles: popular_styles(participants),
        }
    }
}
