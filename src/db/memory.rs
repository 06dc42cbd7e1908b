use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{self, BoxFuture, FutureExt};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::code::TripCode;
use crate::errors::BackendError;
use crate::participant::{Participant, ParticipantDetails};
use crate::plan::{Plan, PlanContent, PlanSource};
use crate::recommendation::{PlaceDetails, Recommendation};
use crate::snapshot::Snapshot;
use crate::trip::{NewTrip, Trip, TripStatus};
use crate::vote::{NewVote, Vote};

#[derive(Default)]
struct State {
    trips: Vec<Trip>,
    participants: Vec<Participant>,
    recommendations: Vec<Recommendation>,
    votes: Vec<Vote>,
    plans: Vec<Plan>,
    snapshots: Vec<Snapshot>,
}

impl State {
    fn trip_mut(&mut self, id: &Uuid) -> Option<&mut Trip> {
        self.trips.iter_mut().find(|t| t.id == *id)
    }
}

/// Keeps everything in memory. Used by tests and local runs without a
/// database; records are kept in insertion order.
#[derive(Default)]
pub struct MemoryDb {
    state: RwLock<State>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    // a panicking writer cannot leave a half-updated record behind, so
    // poisoned state is still usable
    fn read(&self) -> RwLockReadGuard<State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ready<T: Send + 'static>(result: Result<T, BackendError>) -> BoxFuture<'static, Result<T, BackendError>> {
    future::ready(result).boxed()
}

impl super::Db for MemoryDb {
    fn create_trip(&self, trip: NewTrip) -> BoxFuture<Result<Trip, BackendError>> {
        let mut state = self.write();

        if state.trips.iter().any(|t| t.code == trip.code) {
            return ready(Err(BackendError::CodeAlreadyExists));
        }

        let trip = Trip {
            id: Uuid::new_v4(),
            code: trip.code,
            title: trip.title,
            status: TripStatus::Planning,
            owner_id: trip.owner_id,
            current_plan_id: None,
            created_at: OffsetDateTime::now_utc(),
        };

        state.trips.push(trip.clone());

        ready(Ok(trip))
    }

    fn retrieve_trip(&self, code: &TripCode) -> BoxFuture<Result<Option<Trip>, BackendError>> {
        let trip = self.read().trips.iter().find(|t| t.code == *code).cloned();

        ready(Ok(trip))
    }

    fn owned_trips(&self, owner: &Uuid) -> BoxFuture<Result<Vec<Trip>, BackendError>> {
        let mut trips: Vec<Trip> = self
            .read()
            .trips
            .iter()
            .filter(|t| t.owner_id == Some(*owner))
            .cloned()
            .collect();

        trips.reverse();

        ready(Ok(trips))
    }

    fn delete_trip(&self, code: &TripCode) -> BoxFuture<Result<(), BackendError>> {
        let mut state = self.write();

        let id = match state.trips.iter().find(|t| t.code == *code) {
            Some(t) => t.id,
            None => return ready(Err(BackendError::NonExistentTrip(code.clone()))),
        };

        state.trips.retain(|t| t.id != id);
        state.participants.retain(|p| p.trip_id != id);
        state.recommendations.retain(|r| r.trip_id != id);
        state.votes.retain(|v| v.trip_id != id);
        state.plans.retain(|p| p.trip_id != id);
        state.snapshots.retain(|s| s.trip_id != id);

        ready(Ok(()))
    }

    fn advance_status(
        &self,
        trip_id: &Uuid,
        status: TripStatus,
    ) -> BoxFuture<Result<TripStatus, BackendError>> {
        let mut state = self.write();

        let result = match state.trip_mut(trip_id) {
            Some(trip) => {
                trip.status = trip.status.advance_to(status);
                Ok(trip.status)
            }
            None => Err(BackendError::Sqlx {
                source: sqlx::Error::RowNotFound,
            }),
        };

        ready(result)
    }

    fn insert_participant(
        &self,
        trip_id: &Uuid,
        details: ParticipantDetails,
    ) -> BoxFuture<Result<Participant, BackendError>> {
        let participant = Participant {
            id: Uuid::new_v4(),
            trip_id: *trip_id,
            details,
            created_at: OffsetDateTime::now_utc(),
        };

        self.write().participants.push(participant.clone());

        ready(Ok(participant))
    }

    fn participants(&self, trip_id: &Uuid) -> BoxFuture<Result<Vec<Participant>, BackendError>> {
        let participants = self
            .read()
            .participants
            .iter()
            .filter(|p| p.trip_id == *trip_id)
            .cloned()
            .collect();

        ready(Ok(participants))
    }

    fn insert_recommendations(
        &self,
        trip_id: &Uuid,
        places: Vec<PlaceDetails>,
    ) -> BoxFuture<Result<Vec<Recommendation>, BackendError>> {
        let created_at = OffsetDateTime::now_utc();

        let inserted: Vec<Recommendation> = places
            .into_iter()
            .map(|details| Recommendation {
                id: Uuid::new_v4(),
                trip_id: *trip_id,
                details,
                created_at,
            })
            .collect();

        self.write()
            .recommendations
            .extend(inserted.iter().cloned());

        ready(Ok(inserted))
    }

    fn recommendations(
        &self,
        trip_id: &Uuid,
    ) -> BoxFuture<Result<Vec<Recommendation>, BackendError>> {
        let recommendations = self
            .read()
            .recommendations
            .iter()
            .filter(|r| r.trip_id == *trip_id)
            .cloned()
            .collect();

        ready(Ok(recommendations))
    }

    fn insert_vote(&self, trip_id: &Uuid, vote: NewVote) -> BoxFuture<Result<Vote, BackendError>> {
        let mut state = self.write();

        let known = state
            .recommendations
            .iter()
            .any(|r| r.id == vote.recommendation_id && r.trip_id == *trip_id);

        if !known {
            return ready(Err(BackendError::UnknownRecommendation(
                vote.recommendation_id,
            )));
        }

        let vote = Vote {
            id: Uuid::new_v4(),
            trip_id: *trip_id,
            recommendation_id: vote.recommendation_id,
            vote_type: vote.vote_type,
            participant_nickname: vote.participant_nickname,
            created_at: OffsetDateTime::now_utc(),
        };

        state.votes.push(vote.clone());

        ready(Ok(vote))
    }

    fn votes(&self, trip_id: &Uuid) -> BoxFuture<Result<Vec<Vote>, BackendError>> {
        let votes = self
            .read()
            .votes
            .iter()
            .filter(|v| v.trip_id == *trip_id)
            .cloned()
            .collect();

        ready(Ok(votes))
    }

    fn count_votes(&self, trip_id: &Uuid) -> BoxFuture<Result<usize, BackendError>> {
        let count = self
            .read()
            .votes
            .iter()
            .filter(|v| v.trip_id == *trip_id)
            .count();

        ready(Ok(count))
    }

    fn insert_plan(
        &self,
        trip_id: &Uuid,
        content: PlanContent,
        source: PlanSource,
    ) -> BoxFuture<Result<Plan, BackendError>> {
        let mut state = self.write();

        let plan = Plan {
            id: Uuid::new_v4(),
            trip_id: *trip_id,
            content,
            source,
            created_at: OffsetDateTime::now_utc(),
        };

        match state.trip_mut(trip_id) {
            Some(trip) => trip.current_plan_id = Some(plan.id),
            None => return ready(Err(BackendError::Sqlx { source: sqlx::Error::RowNotFound })),
        }

        state.plans.push(plan.clone());

        ready(Ok(plan))
    }

    fn current_plan(&self, trip_id: &Uuid) -> BoxFuture<Result<Option<Plan>, BackendError>> {
        let state = self.read();

        let plan = state
            .trips
            .iter()
            .find(|t| t.id == *trip_id)
            .and_then(|t| t.current_plan_id)
            .and_then(|id| state.plans.iter().find(|p| p.id == id))
            .cloned();

        ready(Ok(plan))
    }

    fn plans(&self, trip_id: &Uuid) -> BoxFuture<Result<Vec<Plan>, BackendError>> {
        let plans = self
            .read()
            .plans
            .iter()
            .filter(|p| p.trip_id == *trip_id)
            .cloned()
            .collect();

        ready(Ok(plans))
    }

    fn insert_snapshot(
        &self,
        trip_id: &Uuid,
        payload: serde_json::Value,
    ) -> BoxFuture<Result<Snapshot, BackendError>> {
        let mut state = self.write();

        if !state.trips.iter().any(|t| t.id == *trip_id) {
            return ready(Err(BackendError::Sqlx { source: sqlx::Error::RowNotFound }));
        }

        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            trip_id: *trip_id,
            payload,
            created_at: OffsetDateTime::now_utc(),
        };

        state.snapshots.push(snapshot.clone());

        ready(Ok(snapshot))
    }

    fn latest_snapshot(&self, trip_id: &Uuid) -> BoxFuture<Result<Option<Snapshot>, BackendError>> {
        let snapshot = self
            .read()
            .snapshots
            .iter()
            .rev()
            .find(|s| s.trip_id == *trip_id)
            .cloned();

        ready(Ok(snapshot))
    }
}
