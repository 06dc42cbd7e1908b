use uuid::Uuid;

use crate::errors::BackendError;
use crate::trip::Trip;

const BEARER_PREFIX: &str = "Bearer ";

/// Who is making a request. Anonymous requests carry no owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    owner: Option<Uuid>,
}

impl Session {
    pub fn anonymous() -> Self {
        Session { owner: None }
    }

    pub fn for_owner(owner: Uuid) -> Self {
        Session { owner: Some(owner) }
    }

    /// Parses the value of an `Authorization` header, if one was sent.
    ///
    /// ```
    /// use planner::session::Session;
    ///
    /// let owner = uuid::Uuid::new_v4();
    /// let header = format!("Bearer {}", owner);
    ///
    /// assert_eq!(Session::from_header(Some(&header)).unwrap().owner(), Some(owner));
    /// assert_eq!(Session::from_header(None).unwrap().owner(), None);
    /// assert!(Session::from_header(Some("Basic abc")).is_err());
    /// ```
    pub fn from_header(header: Option<&str>) -> Result<Self, BackendError> {
        let header = match header {
            Some(h) => h.trim(),
            None => return Ok(Session::anonymous()),
        };

        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(BackendError::InvalidSession)?;

        let owner = Uuid::parse_str(token.trim()).map_err(|_| BackendError::InvalidSession)?;

        Ok(Session::for_owner(owner))
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner
    }

    pub fn require_owner(&self) -> Result<Uuid, BackendError> {
        self.owner.ok_or(BackendError::SessionRequired)
    }

    /// Checks that this session may modify `trip`. Trips without an
    /// owner may be modified by anyone.
    pub fn authorize(&self, trip: &Trip) -> Result<(), BackendError> {
        match trip.owner_id() {
            None => Ok(()),
            Some(owner) if self.owner == Some(owner) => Ok(()),
            Some(_) => Err(BackendError::NotOwner),
        }
    }
}
