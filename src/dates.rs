use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use time::Date;

use crate::errors::BackendError;

const ISO_FORMAT: &str = "%F";

/// A calendar date exchanged as `YYYY-MM-DD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct IsoDate(Date);

impl IsoDate {
    pub fn new(date: Date) -> Self {
        IsoDate(date)
    }

    pub fn date(self) -> Date {
        self.0
    }

    pub fn next_day(self) -> Self {
        IsoDate(self.0.next_day())
    }
}

impl FromStr for IsoDate {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Date::parse(s.trim(), ISO_FORMAT)
            .map(IsoDate)
            .map_err(|_| BackendError::InvalidDate(s.to_owned()))
    }
}

impl fmt::Display for IsoDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.format(ISO_FORMAT))
    }
}

impl Serialize for IsoDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsoDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::IsoDate;

    #[test]
    fn dates_round_trip_through_text() {
        let date: IsoDate = "2025-11-01".parse().unwrap();

        assert_eq!(date.to_string(), "2025-11-01");
        assert_eq!(date.next_day().to_string(), "2025-11-02");
    }

    #[test]
    fn dates_order_chronologically() {
        let earlier: IsoDate = "2025-01-31".parse().unwrap();
        let later: IsoDate = "2025-02-01".parse().unwrap();

        assert!(earlier < later);
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!("2025-13-01".parse::<IsoDate>().is_err());
        assert!("01/11/2025".parse::<IsoDate>().is_err());
        assert!("tomorrow".parse::<IsoDate>().is_err());
    }
}
