use url::Url;

use crate::code::TripCode;
use crate::errors::BackendError;

const TRIP_PREFIX: &str = "trip/";

/// Convenience wrapper for URL generation functions.
#[derive(Clone, Debug)]
pub struct Urls {
    /// Top-level URL of the client, including trailing slash.
    base: Url,
}

impl Urls {
    pub fn new(base: impl AsRef<str>) -> Result<Self, BackendError> {
        let mut base = base.as_ref().to_owned();

        if !base.ends_with('/') {
            base.push('/');
        }

        let parsed = Url::parse(&base).map_err(|source| BackendError::UnableToParseUrl {
            url: base.clone(),
            source,
        })?;

        Ok(Urls { base: parsed })
    }

    /// The shareable link of a trip.
    ///
    /// ```
    /// use planner::urls::Urls;
    ///
    /// let urls = Urls::new("https://example.com/app").unwrap();
    /// let code = "ab12cd".parse().unwrap();
    ///
    /// assert_eq!(urls.trip(&code).unwrap().as_str(), "https://example.com/app/trip/AB12CD");
    /// ```
    pub fn trip(&self, code: &TripCode) -> Result<Url, BackendError> {
        let path = format!("{}{}", TRIP_PREFIX, code);

        self.base
            .join(&path)
            .map_err(|source| BackendError::UnableToParseUrl { url: path, source })
    }
}
