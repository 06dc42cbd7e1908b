use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::errors::BackendError;

/// Normalizes free text by stripping surrounding whitespace and
/// decomposing it into Unicode Normalization Form D.
///
/// ```
/// use planner::normalization::normalize_name;
/// assert_eq!(normalize_name(" hï "), "hï");
/// ```
pub fn normalize_name(name: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    name.as_ref().trim().nfd().to_string()
}

/// Normalizes a travel-style tag: trimmed and lower-cased, so that
/// `" Beach"` and `"beach"` count as the same preference.
///
/// ```
/// use planner::normalization::normalize_tag;
/// assert_eq!(normalize_tag(" Beach "), "beach");
/// ```
pub fn normalize_tag(tag: impl AsRef<str>) -> String {
    tag.as_ref().trim().to_lowercase()
}

/// Deserializes an optional `String` after running it through
/// `normalize_name`. Blank strings become `None`.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let o: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(o.map(normalize_name).filter(|s| !s.is_empty()))
}

/// A submitted value that may not have the expected type. Type errors
/// are kept until validation so they can be reported against the
/// field they came from.
#[derive(Debug)]
pub enum Field<T> {
    Valid(T),
    Invalid(String),
}

impl<T> Field<T> {
    pub fn check(self, name: &'static str) -> Result<T, BackendError> {
        match self {
            Field::Valid(value) => Ok(value),
            Field::Invalid(reason) => Err(BackendError::invalid_field(name, reason)),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        Ok(match T::deserialize(value) {
            Ok(v) => Field::Valid(v),
            Err(e) => Field::Invalid(e.to_string()),
        })
    }
}

/// Checks an optional field, naming it in the error if it has the wrong
/// type.
pub fn checked<T>(field: Option<Field<T>>, name: &'static str) -> Result<Option<T>, BackendError> {
    field.map(|f| f.check(name)).transpose()
}

/// Like `checked`, then normalized with `normalize_name`. Blank strings
/// become `None`.
pub fn checked_name(
    field: Option<Field<String>>,
    name: &'static str,
) -> Result<Option<String>, BackendError> {
    Ok(checked(field, name)?
        .map(normalize_name)
        .filter(|s| !s.is_empty()))
}
