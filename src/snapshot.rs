use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// The planning context of a trip at one point in time, as it is handed
/// to the generator.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub(crate) id: Uuid,

    pub(crate) trip_id: Uuid,

    /// A serialized `PlanContext`.
    pub(crate) payload: serde_json::Value,

    #[serde(with = "time::serde::timestamp")]
    pub(crate) created_at: OffsetDateTime,
}

impl Snapshot {
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}
