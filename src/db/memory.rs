use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::TripStore,
    entities::{Trip, TripStatus},
    error::Error,
};

/// Single-process store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryTripStore {
    trips: RwLock<HashMap<Uuid, Trip>>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripStore for MemoryTripStore {
    #[tracing::instrument(skip(self, trip), fields(trip_id = %trip.id))]
    async fn create(&self, trip: &Trip) -> Result<(), Error> {
        let mut trips = self.trips.write().await;

        if trips.contains_key(&trip.id) {
            return Err(Error::persistence_failure_error(format!(
                "duplicate trip id {}",
                trip.id
            )));
        }

        trips.insert(trip.id, trip.clone());

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Trip>, Error> {
        Ok(self.trips.read().await.get(id).cloned())
    }

    #[tracing::instrument(skip(self, trip), fields(trip_id = %trip.id))]
    async fn update(&self, trip: &Trip) -> Result<(), Error> {
        let mut trips = self.trips.write().await;

        let stored = trips
            .get_mut(&trip.id)
            .ok_or_else(Error::trip_not_found_error)?;

        *stored = trip.clone();
        stored.updated_at = Utc::now();

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(&self, id: &Uuid, status: TripStatus) -> Result<(), Error> {
        let mut trips = self.trips.write().await;

        let stored = trips.get_mut(id).ok_or_else(Error::trip_not_found_error)?;

        stored.status = status;
        stored.updated_at = Utc::now();

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Trip>, Error> {
        let mut trips: Vec<Trip> = self
            .trips
            .read()
            .await
            .values()
            .filter(|trip| trip.user_id == user_id)
            .cloned()
            .collect();

        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(trips)
    }
}

#[cfg(test)]
fn sample_trip(user_id: &str) -> Trip {
    use crate::engine::FareEngine;
    use crate::entities::Route;

    let route = Route::new(3000.0, 420.0, vec![]);
    let fare = FareEngine::default().compute_fares(&route).remove(0);

    Trip::new(user_id.into(), route, fare)
}

#[tokio::test]
async fn reads_its_own_writes() {
    let store = MemoryTripStore::new();
    let trip = sample_trip("rider-1");

    store.create(&trip).await.unwrap();
    assert_eq!(store.get_by_id(&trip.id).await.unwrap(), Some(trip.clone()));

    let mut changed = trip.clone();
    changed.user_id = "rider-2".into();
    store.update(&changed).await.unwrap();

    let stored = store.get_by_id(&trip.id).await.unwrap().unwrap();
    assert_eq!(stored.user_id, "rider-2");
    assert!(stored.updated_at >= trip.updated_at);
}

#[tokio::test]
async fn update_status_refreshes_updated_at() {
    let store = MemoryTripStore::new();
    let trip = sample_trip("rider-1");
    store.create(&trip).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .update_status(&trip.id, TripStatus::DriverAssigned)
        .await
        .unwrap();

    let stored = store.get_by_id(&trip.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TripStatus::DriverAssigned);
    assert!(stored.updated_at > trip.updated_at);
    assert_eq!(stored.created_at, trip.created_at);
}

#[tokio::test]
async fn missing_trips() {
    let store = MemoryTripStore::new();
    let trip = sample_trip("rider-1");

    assert_eq!(store.get_by_id(&trip.id).await.unwrap(), None);
    assert!(store
        .update_status(&trip.id, TripStatus::Cancelled)
        .await
        .unwrap_err()
        .is_trip_not_found_error());
    assert!(store.update(&trip).await.unwrap_err().is_trip_not_found_error());
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    let store = MemoryTripStore::new();
    let trip = sample_trip("rider-1");

    store.create(&trip).await.unwrap();

    assert!(store
        .create(&trip)
        .await
        .unwrap_err()
        .is_persistence_failure_error());
}

#[tokio::test]
async fn lists_a_users_trips_newest_first() {
    let store = MemoryTripStore::new();

    let first = sample_trip("rider-1");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = sample_trip("rider-1");
    let other = sample_trip("rider-2");

    for trip in [&first, &second, &other] {
        store.create(trip).await.unwrap();
    }

    let ids: Vec<Uuid> = store
        .list_by_user("rider-1")
        .await
        .unwrap()
        .iter()
        .map(|trip| trip.id)
        .collect();

    assert_eq!(ids, vec![second.id, first.id]);
}
