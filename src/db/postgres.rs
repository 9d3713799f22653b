use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, types::Json, Executor, Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    db::TripStore,
    entities::{Trip, TripStatus},
    error::Error,
};

type Database = Postgres;

pub struct PgPool(pub Pool<Database>);

impl PgPool {
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        Ok(Self(pool))
    }
}

pub struct PgTripStore {
    pool: Pool<Database>,
}

impl PgTripStore {
    #[tracing::instrument(name = "PgTripStore::new", skip_all)]
    pub async fn new(pool: Pool<Database>) -> Result<Self, Error> {
        pool.execute(
            "CREATE TABLE IF NOT EXISTS trips (
                id UUID PRIMARY KEY,
                user_id VARCHAR NOT NULL,
                status VARCHAR NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )",
        )
        .await?;

        pool.execute("CREATE INDEX IF NOT EXISTS trips_user_id_idx ON trips (user_id)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS trips_status_idx ON trips (status)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS trips_created_at_idx ON trips (created_at DESC)")
            .await?;

        Ok(Self { pool })
    }
}

#[tracing::instrument(skip(tx))]
async fn fetch_trip_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Trip, Error> {
    let Json(trip): Json<Trip> = sqlx::query("SELECT data FROM trips WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(Error::trip_not_found_error)?
        .try_get("data")?;

    Ok(trip)
}

#[tracing::instrument(skip(tx, trip), fields(trip_id = %trip.id))]
async fn write_trip(tx: &mut Transaction<'_, Database>, trip: &Trip) -> Result<(), Error> {
    sqlx::query(
        "UPDATE trips SET user_id = $2, status = $3, data = $4, created_at = $5, updated_at = $6 WHERE id = $1",
    )
    .bind(&trip.id)
    .bind(&trip.user_id)
    .bind(trip.status.name())
    .bind(Json(trip))
    .bind(trip.created_at)
    .bind(trip.updated_at)
    .execute(&mut *tx)
    .await?;

    Ok(())
}

#[async_trait]
impl TripStore for PgTripStore {
    #[tracing::instrument(skip(self, trip), fields(trip_id = %trip.id))]
    async fn create(&self, trip: &Trip) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO trips (id, user_id, status, data, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&trip.id)
        .bind(&trip.user_id)
        .bind(trip.status.name())
        .bind(Json(trip))
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Trip>, Error> {
        let maybe_result = sqlx::query("SELECT data FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(trip): Json<Trip> = result.try_get("data")?;
                Ok(Some(trip))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, trip), fields(trip_id = %trip.id))]
    async fn update(&self, trip: &Trip) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        // lock the row so a concurrent status update cannot interleave
        fetch_trip_for_update(&mut tx, &trip.id).await?;

        let mut trip = trip.clone();
        trip.updated_at = Utc::now();
        write_trip(&mut tx, &trip).await?;

        tx.commit().await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(&self, id: &Uuid, status: TripStatus) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        let mut trip = fetch_trip_for_update(&mut tx, id).await?;
        trip.status = status;
        trip.updated_at = Utc::now();
        write_trip(&mut tx, &trip).await?;

        tx.commit().await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Trip>, Error> {
        let rows = sqlx::query("SELECT data FROM trips WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<Trip, Error> {
                let Json(trip): Json<Trip> = row.try_get("data")?;
                Ok(trip)
            })
            .collect()
    }
}

#[tokio::test]
#[ignore = "requires a postgres instance at DATABASE_URL"]
async fn postgres_round_trip() {
    use crate::engine::FareEngine;
    use crate::entities::Route;

    let uri = std::env::var("DATABASE_URL").unwrap();
    let PgPool(pool) = PgPool::new(&uri, 2).await.unwrap();
    let store = PgTripStore::new(pool).await.unwrap();

    let route = Route::new(3000.0, 420.0, vec![]);
    let fare = FareEngine::default().compute_fares(&route).remove(0);
    let trip = Trip::new(format!("rider-{}", Uuid::new_v4()), route, fare);

    store.create(&trip).await.unwrap();
    store
        .update_status(&trip.id, TripStatus::DriverAssigned)
        .await
        .unwrap();

    let stored = store.get_by_id(&trip.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TripStatus::DriverAssigned);
    assert!(stored.updated_at > trip.updated_at);

    let listed = store.list_by_user(&trip.user_id).await.unwrap();
    assert_eq!(listed.len(), 1);

    // a full replace moves the trip to its new rider
    let mut moved = stored.clone();
    moved.user_id = format!("rider-{}", Uuid::new_v4());
    store.update(&moved).await.unwrap();

    assert!(store.list_by_user(&trip.user_id).await.unwrap().is_empty());
    let listed = store.list_by_user(&moved.user_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, trip.id);
    assert_eq!(listed[0].user_id, moved.user_id);

    assert!(store
        .update_status(&Uuid::new_v4(), TripStatus::Cancelled)
        .await
        .unwrap_err()
        .is_trip_not_found_error());
}
