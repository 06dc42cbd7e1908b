use futures::future::BoxFuture;
use uuid::Uuid;

use crate::code::TripCode;
use crate::errors::BackendError;
use crate::participant::{Participant, ParticipantDetails};
use crate::plan::{Plan, PlanContent, PlanSource};
use crate::recommendation::{PlaceDetails, Recommendation};
use crate::snapshot::Snapshot;
use crate::trip::{NewTrip, Trip, TripStatus};
use crate::vote::{NewVote, Vote};

pub mod memory;

pub trait Db {
    /// Fails with `CodeAlreadyExists` if the code is taken.
    fn create_trip(&self, trip: NewTrip) -> BoxFuture<Result<Trip, BackendError>>;

    fn retrieve_trip(&self, code: &TripCode) -> BoxFuture<Result<Option<Trip>, BackendError>>;

    fn owned_trips(&self, owner: &Uuid) -> BoxFuture<Result<Vec<Trip>, BackendError>>;

    /// Deletes a trip together with everything that belongs to it.
    fn delete_trip(&self, code: &TripCode) -> BoxFuture<Result<(), BackendError>>;

    /// Moves a trip to `status` unless it is already further along, and
    /// returns the resulting status.
    fn advance_status(
        &self,
        trip_id: &Uuid,
        status: TripStatus,
    ) -> BoxFuture<Result<TripStatus, BackendError>>;

    fn insert_participant(
        &self,
        trip_id: &Uuid,
        details: ParticipantDetails,
    ) -> BoxFuture<Result<Participant, BackendError>>;

    fn participants(&self, trip_id: &Uuid) -> BoxFuture<Result<Vec<Participant>, BackendError>>;

    fn insert_recommendations(
        &self,
        trip_id: &Uuid,
        places: Vec<PlaceDetails>,
    ) -> BoxFuture<Result<Vec<Recommendation>, BackendError>>;

    fn recommendations(
        &self,
        trip_id: &Uuid,
    ) -> BoxFuture<Result<Vec<Recommendation>, BackendError>>;

    /// Fails with `UnknownRecommendation` unless the recommendation
    /// belongs to the trip.
    fn insert_vote(&self, trip_id: &Uuid, vote: NewVote) -> BoxFuture<Result<Vote, BackendError>>;

    fn votes(&self, trip_id: &Uuid) -> BoxFuture<Result<Vec<Vote>, BackendError>>;

    fn count_votes(&self, trip_id: &Uuid) -> BoxFuture<Result<usize, BackendError>>;

    /// Stores a plan and makes it the trip's current one.
    fn insert_plan(
        &self,
        trip_id: &Uuid,
        content: PlanContent,
        source: PlanSource,
    ) -> BoxFuture<Result<Plan, BackendError>>;

    fn current_plan(&self, trip_id: &Uuid) -> BoxFuture<Result<Option<Plan>, BackendError>>;

    /// Every plan of the trip, oldest first.
    fn plans(&self, trip_id: &Uuid) -> BoxFuture<Result<Vec<Plan>, BackendError>>;

    fn insert_snapshot(
        &self,
        trip_id: &Uuid,
        payload: serde_json::Value,
    ) -> BoxFuture<Result<Snapshot, BackendError>>;

    fn latest_snapshot(&self, trip_id: &Uuid) -> BoxFuture<Result<Option<Snapshot>, BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
        types::Json,
    };
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::code::TripCode;
    use crate::dates::IsoDate;
    use crate::errors::BackendError;
    use crate::participant::{Participant, ParticipantDetails};
    use crate::plan::{Plan, PlanContent, PlanSource};
    use crate::recommendation::{PlaceDetails, Recommendation};
    use crate::snapshot::Snapshot;
    use crate::trip::{NewTrip, Trip, TripStatus};
    use crate::vote::{NewVote, Vote};

    const TRIPS_CODE_CONSTRAINT: &str = "trips_code";
    const VOTES_RECOMMENDATION_CONSTRAINT: &str = "votes_recommendation";

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn create_trip(&self, trip: NewTrip) -> BoxFuture<Result<Trip, BackendError>> {
            async move {
                let id = Uuid::new_v4();
                let query = sqlx::query_as(include_str!("queries/create_trip.sql"));

                let (status, created_at): (i16, OffsetDateTime) = query
                    .bind(id)
                    .bind(trip.code.as_str())
                    .bind(&trip.title)
                    .bind(trip.owner_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(Trip {
                    id,
                    code: trip.code,
                    title: trip.title,
                    status: decode_status(status).map_err(map_sqlx_error)?,
                    owner_id: trip.owner_id,
                    current_plan_id: None,
                    created_at,
                })
            }
            .boxed()
        }

        fn retrieve_trip(&self, code: &TripCode) -> BoxFuture<Result<Option<Trip>, BackendError>> {
            let code = code.clone();

            async move {
                let query = sqlx::query(include_str!("queries/retrieve_trip.sql"));

                let trip = query
                    .bind(code.as_str())
                    .try_map(|row: PgRow| trip_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(trip)
            }
            .boxed()
        }

        fn owned_trips(&self, owner: &Uuid) -> BoxFuture<Result<Vec<Trip>, BackendError>> {
            let owner = *owner;

            async move {
                let query = sqlx::query(include_str!("queries/owned_trips.sql"));

                let trips = query
                    .bind(owner)
                    .try_map(|row: PgRow| trip_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(trips)
            }
            .boxed()
        }

        fn delete_trip(&self, code: &TripCode) -> BoxFuture<Result<(), BackendError>> {
            let code = code.clone();

            async move {
                let query = sqlx::query(include_str!("queries/delete_trip.sql"));

                let count = query
                    .bind(code.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(BackendError::NonExistentTrip(code))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn advance_status(
            &self,
            trip_id: &Uuid,
            status: TripStatus,
        ) -> BoxFuture<Result<TripStatus, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let query = sqlx::query_as(include_str!("queries/advance_status.sql"));

                let (status,): (i16,) = query
                    .bind(trip_id)
                    .bind(status.as_i16())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                decode_status(status).map_err(map_sqlx_error)
            }
            .boxed()
        }

        fn insert_participant(
            &self,
            trip_id: &Uuid,
            details: ParticipantDetails,
        ) -> BoxFuture<Result<Participant, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let id = Uuid::new_v4();
                let query = sqlx::query_as(include_str!("queries/insert_participant.sql"));

                let dates: Vec<String> = details
                    .available_dates
                    .iter()
                    .map(|d| d.to_string())
                    .collect();

                let (created_at,): (OffsetDateTime,) = query
                    .bind(id)
                    .bind(trip_id)
                    .bind(&details.nickname)
                    .bind(dates)
                    .bind(details.budget)
                    .bind(&details.preferred_province)
                    .bind(&details.travel_styles)
                    .bind(&details.additional_notes)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(Participant {
                    id,
                    trip_id,
                    details,
                    created_at,
                })
            }
            .boxed()
        }

        fn participants(&self, trip_id: &Uuid) -> BoxFuture<Result<Vec<Participant>, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let query = sqlx::query(include_str!("queries/participants.sql"));

                let participants = query
                    .bind(trip_id)
                    .try_map(|row: PgRow| participant_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(participants)
            }
            .boxed()
        }

        fn insert_recommendations(
            &self,
            trip_id: &Uuid,
            places: Vec<PlaceDetails>,
        ) -> BoxFuture<Result<Vec<Recommendation>, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
                let mut inserted = Vec::with_capacity(places.len());

                for details in places {
                    let id = Uuid::new_v4();
                    let query = sqlx::query_as(include_str!("queries/insert_recommendation.sql"));

                    let (created_at,): (OffsetDateTime,) = query
                        .bind(id)
                        .bind(trip_id)
                        .bind(&details.name)
                        .bind(details.category.as_str())
                        .bind(&details.description)
                        .bind(details.rating)
                        .bind(details.estimated_cost)
                        .bind(&details.duration)
                        .bind(&details.location)
                        .bind(&details.pros)
                        .bind(&details.cons)
                        .bind(&details.place_id)
                        .fetch_one(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;

                    inserted.push(Recommendation {
                        id,
                        trip_id,
                        details,
                        created_at,
                    });
                }

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(inserted)
            }
            .boxed()
        }

        fn recommendations(
            &self,
            trip_id: &Uuid,
        ) -> BoxFuture<Result<Vec<Recommendation>, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let query = sqlx::query(include_str!("queries/recommendations.sql"));

                let recommendations = query
                    .bind(trip_id)
                    .try_map(|row: PgRow| recommendation_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(recommendations)
            }
            .boxed()
        }

        fn insert_vote(&self, trip_id: &Uuid, vote: NewVote) -> BoxFuture<Result<Vote, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let id = Uuid::new_v4();
                let query = sqlx::query_as(include_str!("queries/insert_vote.sql"));

                // inserts nothing unless the recommendation is in this trip
                let row: Option<(OffsetDateTime,)> = query
                    .bind(id)
                    .bind(trip_id)
                    .bind(vote.recommendation_id)
                    .bind(vote.vote_type.as_str())
                    .bind(&vote.participant_nickname)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| match e {
                        sqlx::Error::Database(ref d)
                            if d.constraint() == Some(VOTES_RECOMMENDATION_CONSTRAINT) =>
                        {
                            BackendError::UnknownRecommendation(vote.recommendation_id)
                        }
                        e => map_sqlx_error(e),
                    })?;

                let (created_at,) =
                    row.ok_or(BackendError::UnknownRecommendation(vote.recommendation_id))?;

                Ok(Vote {
                    id,
                    trip_id,
                    recommendation_id: vote.recommendation_id,
                    vote_type: vote.vote_type,
                    participant_nickname: vote.participant_nickname,
                    created_at,
                })
            }
            .boxed()
        }

        fn votes(&self, trip_id: &Uuid) -> BoxFuture<Result<Vec<Vote>, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let query = sqlx::query(include_str!("queries/votes.sql"));

                let votes = query
                    .bind(trip_id)
                    .try_map(|row: PgRow| {
                        let vote_type: String = try_get(&row, "vote_type")?;

                        Ok(Vote {
                            id: try_get(&row, "id")?,
                            trip_id: try_get(&row, "trip_id")?,
                            recommendation_id: try_get(&row, "recommendation_id")?,
                            vote_type: vote_type.parse().map_err(decode_error)?,
                            participant_nickname: try_get(&row, "participant_nickname")?,
                            created_at: try_get(&row, "created_at")?,
                        })
                    })
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(votes)
            }
            .boxed()
        }

        fn count_votes(&self, trip_id: &Uuid) -> BoxFuture<Result<usize, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let query = sqlx::query_as::<_, (i64,)>(include_str!("queries/count_votes.sql"));

                let (count,) = query
                    .bind(trip_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(count as usize)
            }
            .boxed()
        }

        fn insert_plan(
            &self,
            trip_id: &Uuid,
            content: PlanContent,
            source: PlanSource,
        ) -> BoxFuture<Result<Plan, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let id = Uuid::new_v4();
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                let (created_at,): (OffsetDateTime,) =
                    sqlx::query_as(include_str!("queries/insert_plan.sql"))
                        .bind(id)
                        .bind(trip_id)
                        .bind(Json(&content))
                        .bind(source.as_str())
                        .fetch_one(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;

                sqlx::query(include_str!("queries/set_current_plan.sql"))
                    .bind(trip_id)
                    .bind(id)
                    .execute(&mut tx)
                    .await
                    .map_err(map_sqlx_error)?;

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(Plan {
                    id,
                    trip_id,
                    content,
                    source,
                    created_at,
                })
            }
            .boxed()
        }

        fn current_plan(&self, trip_id: &Uuid) -> BoxFuture<Result<Option<Plan>, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let query = sqlx::query(include_str!("queries/current_plan.sql"));

                let plan = query
                    .bind(trip_id)
                    .try_map(|row: PgRow| plan_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(plan)
            }
            .boxed()
        }

        fn plans(&self, trip_id: &Uuid) -> BoxFuture<Result<Vec<Plan>, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let query = sqlx::query(include_str!("queries/plans.sql"));

                let plans = query
                    .bind(trip_id)
                    .try_map(|row: PgRow| plan_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(plans)
            }
            .boxed()
        }

        fn insert_snapshot(
            &self,
            trip_id: &Uuid,
            payload: serde_json::Value,
        ) -> BoxFuture<Result<Snapshot, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let id = Uuid::new_v4();

                let (created_at,): (OffsetDateTime,) =
                    sqlx::query_as(include_str!("queries/insert_snapshot.sql"))
                        .bind(id)
                        .bind(trip_id)
                        .bind(Json(&payload))
                        .fetch_one(&self.pool)
                        .await
                        .map_err(map_sqlx_error)?;

                Ok(Snapshot {
                    id,
                    trip_id,
                    payload,
                    created_at,
                })
            }
            .boxed()
        }

        fn latest_snapshot(
            &self,
            trip_id: &Uuid,
        ) -> BoxFuture<Result<Option<Snapshot>, BackendError>> {
            let trip_id = *trip_id;

            async move {
                let query = sqlx::query(include_str!("queries/latest_snapshot.sql"));

                let snapshot = query
                    .bind(trip_id)
                    .try_map(|row: PgRow| snapshot_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(snapshot)
            }
            .boxed()
        }
    }

    fn trip_from_row(row: &PgRow) -> Result<Trip, sqlx::Error> {
        let code: String = try_get(row, "code")?;

        Ok(Trip {
            id: try_get(row, "id")?,
            code: code.parse::<TripCode>().map_err(decode_error)?,
            title: try_get(row, "title")?,
            status: decode_status(try_get(row, "status")?)?,
            owner_id: try_get(row, "owner_id")?,
            current_plan_id: try_get(row, "current_plan_id")?,
            created_at: try_get(row, "created_at")?,
        })
    }

    fn participant_from_row(row: &PgRow) -> Result<Participant, sqlx::Error> {
        let dates: Vec<String> = try_get(row, "available_dates")?;

        let available_dates = dates
            .iter()
            .map(|d| d.parse::<IsoDate>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_error)?;

        Ok(Participant {
            id: try_get(row, "id")?,
            trip_id: try_get(row, "trip_id")?,
            details: ParticipantDetails {
                nickname: try_get(row, "nickname")?,
                available_dates,
                budget: try_get(row, "budget")?,
                preferred_province: try_get(row, "preferred_province")?,
                travel_styles: try_get(row, "travel_styles")?,
                additional_notes: try_get(row, "additional_notes")?,
            },
            created_at: try_get(row, "created_at")?,
        })
    }

    fn recommendation_from_row(row: &PgRow) -> Result<Recommendation, sqlx::Error> {
        let category: String = try_get(row, "category")?;

        Ok(Recommendation {
            id: try_get(row, "id")?,
            trip_id: try_get(row, "trip_id")?,
            details: PlaceDetails {
                name: try_get(row, "name")?,
                category: category.parse().map_err(decode_error)?,
                description: try_get(row, "description")?,
                rating: try_get(row, "rating")?,
                estimated_cost: try_get(row, "estimated_cost")?,
                duration: try_get(row, "duration")?,
                location: try_get(row, "location")?,
                pros: try_get(row, "pros")?,
                cons: try_get(row, "cons")?,
                place_id: try_get(row, "place_id")?,
            },
            created_at: try_get(row, "created_at")?,
        })
    }

    fn plan_from_row(row: &PgRow) -> Result<Plan, sqlx::Error> {
        let Json(content): Json<PlanContent> = try_get(row, "content")?;
        let source: String = try_get(row, "source")?;

        Ok(Plan {
            id: try_get(row, "id")?,
            trip_id: try_get(row, "trip_id")?,
            content,
            source: source.parse().map_err(decode_error)?,
            created_at: try_get(row, "created_at")?,
        })
    }

    fn snapshot_from_row(row: &PgRow) -> Result<Snapshot, sqlx::Error> {
        let Json(payload): Json<serde_json::Value> = try_get(row, "payload")?;

        Ok(Snapshot {
            id: try_get(row, "id")?,
            trip_id: try_get(row, "trip_id")?,
            payload,
            created_at: try_get(row, "created_at")?,
        })
    }

    fn decode_status(value: i16) -> Result<TripStatus, sqlx::Error> {
        TripStatus::from_i16(value).ok_or_else(|| {
            decode_error(BackendError::UnknownEnumValue {
                kind: "trip status",
                value: value.to_string(),
            })
        })
    }

    // this should never happen, since we control what goes into the
    // database, but just for completeness...
    fn decode_error(error: BackendError) -> sqlx::Error {
        sqlx::Error::Decode(Box::new(error))
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(TRIPS_CODE_CONSTRAINT) => {
                BackendError::CodeAlreadyExists
            }
            _ => BackendError::Sqlx { source: error },
        }
    }
}
