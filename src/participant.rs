use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dates::IsoDate;
use crate::errors::BackendError;
use crate::normalization::{checked, checked_name, normalize_tag, Field};

/// The largest budget accepted, to keep totals well inside `i64`.
const MAX_BUDGET: f64 = 1_000_000_000.0;

/// A single participant in the database.
#[derive(Clone, Debug, Serialize)]
pub struct Participant {
    /// The ID of the participant.
    pub(crate) id: Uuid,

    /// The trip this participant belongs to.
    pub(crate) trip_id: Uuid,

    /// What the participant submitted.
    #[serde(flatten)]
    pub(crate) details: ParticipantDetails,

    #[serde(with = "time::serde::timestamp")]
    pub(crate) created_at: OffsetDateTime,
}

impl Participant {
    pub fn details(&self) -> &ParticipantDetails {
        &self.details
    }
}

/// A validated participant submission.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParticipantDetails {
    /// Display only; not unique.
    pub(crate) nickname: String,

    /// Sorted, without duplicates, never empty.
    pub(crate) available_dates: Vec<IsoDate>,

    /// The most this participant will spend, always positive.
    pub(crate) budget: i64,

    pub(crate) preferred_province: String,

    /// Normalized tags in submission order, never empty.
    pub(crate) travel_styles: Vec<String>,

    pub(crate) additional_notes: Option<String>,
}

/// The raw body of a participant form. Fields are optional here so
/// that validation can name the one that is missing or mistyped.
#[derive(Debug, Default, Deserialize)]
pub struct ParticipantSubmission {
    #[serde(default)]
    nickname: Option<Field<String>>,

    #[serde(default)]
    available_dates: Option<Field<Vec<String>>>,

    #[serde(default)]
    budget: Option<Field<f64>>,

    #[serde(default)]
    preferred_province: Option<Field<String>>,

    #[serde(default)]
    travel_styles: Option<Field<Vec<String>>>,

    #[serde(default)]
    additional_notes: Option<Field<String>>,
}

impl ParticipantSubmission {
    pub fn validate(self) -> Result<ParticipantDetails, BackendError> {
        let nickname = checked_name(self.nickname, "nickname")?
            .ok_or_else(|| BackendError::missing_field("nickname"))?;

        let available_dates = validate_dates(checked(self.available_dates, "available_dates")?)?;
        let budget = validate_budget(checked(self.budget, "budget")?)?;

        let preferred_province = checked_name(self.preferred_province, "preferred_province")?
            .ok_or_else(|| BackendError::missing_field("preferred_province"))?;

        let travel_styles = validate_styles(checked(self.travel_styles, "travel_styles")?)?;
        let additional_notes = checked_name(self.additional_notes, "additional_notes")?;

        Ok(ParticipantDetails {
            nickname,
            available_dates,
            budget,
            preferred_province,
            travel_styles,
            additional_notes,
        })
    }
}

fn validate_dates(dates: Option<Vec<String>>) -> Result<Vec<IsoDate>, BackendError> {
    let dates = dates.ok_or_else(|| BackendError::missing_field("available_dates"))?;

    let parsed = dates
        .iter()
        .map(|d| {
            d.parse::<IsoDate>()
                .map_err(|e| BackendError::invalid_field("available_dates", e.to_string()))
        })
        .collect::<Result<BTreeSet<_>, _>>()?;

    if parsed.is_empty() {
        return Err(BackendError::invalid_field(
            "available_dates",
            "must be a non-empty array",
        ));
    }

    Ok(parsed.into_iter().collect())
}

fn validate_budget(budget: Option<f64>) -> Result<i64, BackendError> {
    let budget = budget.ok_or_else(|| BackendError::missing_field("budget"))?;

    if !budget.is_finite() || budget <= 0.0 {
        return Err(BackendError::invalid_field("budget", "must be a positive number"));
    }

    if budget.fract() != 0.0 {
        return Err(BackendError::invalid_field("budget", "must be a whole number"));
    }

    if budget > MAX_BUDGET {
        return Err(BackendError::invalid_field("budget", "is too large"));
    }

    Ok(budget as i64)
}

fn validate_styles(styles: Option<Vec<String>>) -> Result<Vec<String>, BackendError> {
    let styles = styles.ok_or_else(|| BackendError::missing_field("travel_styles"))?;

    let mut normalized: Vec<String> = Vec::with_capacity(styles.len());

    for style in styles.iter().map(normalize_tag) {
        if !style.is_empty() && !normalized.contains(&style) {
            normalized.push(style);
        }
    }

    if normalized.is_empty() {
        return Err(BackendError::invalid_field(
            "travel_styles",
            "must be a non-empty array",
        ));
    }

    Ok(normalized)
}
