use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::BackendError;

pub const CODE_LENGTH: usize = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The public, shareable identifier of a trip. The canonical form is
/// upper-case; parsing is case-insensitive.
///
/// ```
/// use planner::code::TripCode;
///
/// let code: TripCode = " ab12cd".parse().unwrap();
/// assert_eq!(code.as_str(), "AB12CD");
/// assert!("ab-12c".parse::<TripCode>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TripCode(String);

impl TripCode {
    /// Draws a random code. Uniqueness is enforced by the database, so
    /// callers must retry on conflict.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();

        let code = (0..CODE_LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();

        TripCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TripCode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.len() == CODE_LENGTH && trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(TripCode(trimmed.to_ascii_uppercase()))
        } else {
            Err(BackendError::InvalidTripCode(s.to_owned()))
        }
    }
}

impl TryFrom<String> for TripCode {
    type Error = BackendError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TripCode> for String {
    fn from(code: TripCode) -> Self {
        code.0
    }
}

impl fmt::Display for TripCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{TripCode, CODE_LENGTH};

    #[test]
    fn generated_codes_parse_back() {
        for _ in 0..100 {
            let code = TripCode::generate();

            assert_eq!(code.as_str().len(), CODE_LENGTH);
            assert_eq!(code.as_str().parse::<TripCode>().unwrap(), code);
        }
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        assert!("ABC12".parse::<TripCode>().is_err());
        assert!("ABC1234".parse::<TripCode>().is_err());
        assert!("".parse::<TripCode>().is_err());
    }

    proptest! {
        #[test]
        fn parsing_ignores_case(code in "[a-zA-Z0-9]{6}") {
            let lower: TripCode = code.to_lowercase().parse().unwrap();
            let upper: TripCode = code.to_uppercase().parse().unwrap();

            prop_assert_eq!(lower, upper);
        }
    }
}
