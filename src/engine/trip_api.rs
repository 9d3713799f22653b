use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::{DriverResponseAPI, TripAPI, TripPreview},
    entities::{Coordinates, Trip, TripStatus},
    error::Error,
    events::PublishPolicy,
};

#[async_trait]
impl TripAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn preview_trip(
        &self,
        user_id: String,
        pickup: Coordinates,
        destination: Coordinates,
    ) -> Result<TripPreview, Error> {
        let preview = self.price_route(&pickup, &destination).await?;

        self.quotes
            .record(&user_id, pickup, destination, &preview.ride_fares)
            .await;

        Ok(preview)
    }

    #[tracing::instrument(skip(self))]
    async fn create_trip(
        &self,
        user_id: String,
        fare_id: Uuid,
        pickup: Coordinates,
        destination: Coordinates,
    ) -> Result<Trip, Error> {
        // every creation re-quotes; the rider's fare is honoured from the
        // quote book when the fresh ids no longer match
        let TripPreview { route, ride_fares } = self.price_route(&pickup, &destination).await?;

        let selected_fare = match ride_fares.into_iter().find(|fare| fare.id == fare_id) {
            Some(fare) => fare,
            None => self
                .quotes
                .find(&fare_id)
                .await
                .filter(|quote| quote.was_issued_for(&user_id, &pickup, &destination))
                .map(|quote| quote.fare)
                .ok_or_else(|| {
                    tracing::info!("fare {} was never quoted for this trip", fare_id);
                    Error::fare_not_found_error()
                })?,
        };

        if selected_fare.is_expired_at(Utc::now()) {
            tracing::info!("fare {} expired at {}", fare_id, selected_fare.expires_at);
            return Err(Error::fare_expired_error());
        }

        let trip = Trip::new(user_id, route, selected_fare);

        self.store.create(&trip).await?;

        tracing::info!("created trip {}", trip.id);

        self.events
            .trip_created(&trip, PublishPolicy::BestEffort)
            .await?;

        Ok(trip)
    }

    #[tracing::instrument(skip(self))]
    async fn start_trip(&self, user_id: String, fare_id: Uuid) -> Result<Trip, Error> {
        let quote = self
            .quotes
            .find(&fare_id)
            .await
            .filter(|quote| quote.user_id == user_id)
            .ok_or_else(Error::fare_not_found_error)?;

        self.create_trip(user_id, fare_id, quote.pickup, quote.destination)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_trip(&self, id: Uuid) -> Result<Trip, Error> {
        self.store
            .get_by_id(&id)
            .await?
            .ok_or_else(Error::trip_not_found_error)
    }

    #[tracing::instrument(skip(self))]
    async fn find_user_trips(&self, user_id: String) -> Result<Vec<Trip>, Error> {
        self.store.list_by_user(&user_id).await
    }
}

#[async_trait]
impl DriverResponseAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn handle_driver_response(
        &self,
        trip_id: Uuid,
        driver_id: String,
        accepted: bool,
    ) -> Result<(), Error> {
        let trip = self
            .store
            .get_by_id(&trip_id)
            .await?
            .ok_or_else(Error::trip_not_found_error)?;

        if !accepted {
            // no rematching: the offer simply lapses
            tracing::info!("driver {} declined trip {}", driver_id, trip_id);
            return Ok(());
        }

        if trip.status.can_transition_to(TripStatus::DriverAssigned) {
            self.store
                .update_status(&trip_id, TripStatus::DriverAssigned)
                .await?;
        } else if trip.status == TripStatus::DriverAssigned {
            tracing::info!("trip {} already has a driver, republishing", trip_id);
        } else {
            tracing::warn!(
                "driver {} accepted trip {} in status {}",
                driver_id,
                trip_id,
                trip.status.name()
            );
            return Err(Error::invalid_invocation_error());
        }

        let trip = self
            .store
            .get_by_id(&trip_id)
            .await?
            .ok_or_else(Error::trip_not_found_error)?;

        self.events
            .driver_assigned(&trip, PublishPolicy::Required)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::{
        db::{MemoryTripStore, TripStore},
        engine::FareEngine,
        entities::{Package, Route},
        events::{EventChannel, LocalBroker, TRIP_EVENT_CREATED, TRIP_EVENT_DRIVER_ASSIGNED},
        testing::{drain, recorder, FailingChannel, FailingRouting, FailingStore, FixedRoute},
    };

    fn pickup() -> Coordinates {
        Coordinates::new(37.7749, -122.4194)
    }

    fn destination() -> Coordinates {
        Coordinates::new(37.7849, -122.4094)
    }

    struct Harness {
        engine: Engine,
        store: Arc<MemoryTripStore>,
        broker: Arc<LocalBroker>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryTripStore::new());
        let broker = Arc::new(LocalBroker::new());
        let engine = Engine::new(
            Arc::new(FixedRoute::five_km()),
            FareEngine::default(),
            store.clone(),
            broker.clone(),
        );

        Harness {
            engine,
            store,
            broker,
        }
    }

    #[tokio::test]
    async fn preview_quotes_every_package() {
        let h = harness();

        let preview = h
            .engine
            .preview_trip("rider-1".into(), pickup(), destination())
            .await
            .unwrap();

        assert_eq!(preview.route.distance, 5000.0);
        assert_eq!(preview.ride_fares.len(), 4);

        let sedan = preview
            .ride_fares
            .iter()
            .find(|fare| fare.package == Package::Sedan)
            .unwrap();
        assert_eq!(sedan.total_price_in_cents, 1450);

        // a preview never creates a trip
        assert!(h.store.list_by_user("rider-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn preview_rejects_coordinates_out_of_range() {
        let h = harness();

        let err = h
            .engine
            .preview_trip("rider-1".into(), Coordinates::new(91.0, 0.0), destination())
            .await
            .unwrap_err();

        assert!(err.is_invalid_input_error());
    }

    #[tokio::test]
    async fn routing_failures_propagate_unchanged() {
        for failure in [
            Error::routing_unavailable_error("connection refused"),
            Error::no_route_found_error(),
        ] {
            let engine = Engine::new(
                Arc::new(FailingRouting(failure.clone())),
                FareEngine::default(),
                Arc::new(MemoryTripStore::new()),
                Arc::new(LocalBroker::new()),
            );

            let preview_err = engine
                .preview_trip("rider-1".into(), pickup(), destination())
                .await
                .unwrap_err();
            let create_err = engine
                .create_trip("rider-1".into(), Uuid::new_v4(), pickup(), destination())
                .await
                .unwrap_err();

            assert_eq!(preview_err, failure);
            assert_eq!(create_err, failure);
        }
    }

    #[tokio::test]
    async fn create_trip_from_a_previewed_fare() {
        let h = harness();
        let mut events = recorder(&h.broker).await;

        let preview = h
            .engine
            .preview_trip("rider-1".into(), pickup(), destination())
            .await
            .unwrap();
        let chosen = preview.ride_fares[1].clone();

        let trip = h
            .engine
            .create_trip("rider-1".into(), chosen.id, pickup(), destination())
            .await
            .unwrap();

        assert_eq!(trip.status, TripStatus::Created);
        assert_eq!(trip.user_id, "rider-1");
        assert_eq!(trip.selected_fare, Some(chosen));
        assert!(trip.driver.is_none());
        assert_eq!(h.store.get_by_id(&trip.id).await.unwrap(), Some(trip.clone()));

        let published = drain(&mut events).await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, TRIP_EVENT_CREATED);
        let payload: Trip = serde_json::from_slice(&published[0].payload).unwrap();
        assert_eq!(payload, trip);
    }

    #[tokio::test]
    async fn create_trip_with_unknown_fare() {
        let h = harness();
        let mut events = recorder(&h.broker).await;

        let err = h
            .engine
            .create_trip("rider-1".into(), Uuid::new_v4(), pickup(), destination())
            .await
            .unwrap_err();

        assert!(err.is_fare_not_found_error());
        assert!(h.store.list_by_user("rider-1").await.unwrap().is_empty());
        assert!(drain(&mut events).await.is_empty());
    }

    #[tokio::test]
    async fn create_trip_with_expired_fare() {
        let h = harness();
        let route = Route::new(5000.0, 600.0, vec![]);
        let stale = h
            .engine
            .fares
            .compute_fares_at(&route, Utc::now() - Duration::minutes(7));
        h.engine
            .quotes
            .record("rider-1", pickup(), destination(), &stale)
            .await;

        let err = h
            .engine
            .create_trip("rider-1".into(), stale[0].id, pickup(), destination())
            .await
            .unwrap_err();

        assert!(err.is_fare_expired_error());
        assert!(h.store.list_by_user("rider-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quotes_belong_to_the_rider_and_route_they_were_issued_for() {
        let h = harness();

        let preview = h
            .engine
            .preview_trip("rider-1".into(), pickup(), destination())
            .await
            .unwrap();
        let fare_id = preview.ride_fares[0].id;

        let other_rider = h
            .engine
            .create_trip("rider-2".into(), fare_id, pickup(), destination())
            .await
            .unwrap_err();
        let other_route = h
            .engine
            .create_trip("rider-1".into(), fare_id, destination(), pickup())
            .await
            .unwrap_err();

        assert!(other_rider.is_fare_not_found_error());
        assert!(other_route.is_fare_not_found_error());
    }

    #[tokio::test]
    async fn creation_survives_a_failed_publish() {
        let store = Arc::new(MemoryTripStore::new());
        let engine = Engine::new(
            Arc::new(FixedRoute::five_km()),
            FareEngine::default(),
            store.clone(),
            Arc::new(FailingChannel),
        );

        let preview = engine
            .preview_trip("rider-1".into(), pickup(), destination())
            .await
            .unwrap();
        let trip = engine
            .create_trip(
                "rider-1".into(),
                preview.ride_fares[0].id,
                pickup(),
                destination(),
            )
            .await
            .unwrap();

        assert!(store.get_by_id(&trip.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn creation_aborts_when_the_store_is_down() {
        let broker = Arc::new(LocalBroker::new());
        let mut events = recorder(&broker).await;
        let engine = Engine::new(
            Arc::new(FixedRoute::five_km()),
            FareEngine::default(),
            Arc::new(FailingStore::default()),
            broker.clone(),
        );

        let preview = engine
            .preview_trip("rider-1".into(), pickup(), destination())
            .await
            .unwrap();
        let err = engine
            .create_trip(
                "rider-1".into(),
                preview.ride_fares[0].id,
                pickup(),
                destination(),
            )
            .await
            .unwrap_err();

        assert!(err.is_persistence_failure_error());
        assert!(drain(&mut events).await.is_empty());
    }

    #[tokio::test]
    async fn start_trip_recovers_endpoints_from_the_quote() {
        let h = harness();

        let preview = h
            .engine
            .preview_trip("rider-1".into(), pickup(), destination())
            .await
            .unwrap();
        let chosen = preview.ride_fares[3].clone();

        let trip = h
            .engine
            .start_trip("rider-1".into(), chosen.id)
            .await
            .unwrap();

        assert_eq!(trip.selected_fare.map(|fare| fare.id), Some(chosen.id));
        assert_eq!(h.engine.find_trip(trip.id).await.unwrap().id, trip.id);
        assert_eq!(
            h.engine
                .find_user_trips("rider-1".into())
                .await
                .unwrap()
                .len(),
            1
        );

        assert!(h
            .engine
            .start_trip("rider-1".into(), Uuid::new_v4())
            .await
            .unwrap_err()
            .is_fare_not_found_error());
    }

    async fn created_trip(h: &Harness) -> Trip {
        let preview = h
            .engine
            .preview_trip("rider-1".into(), pickup(), destination())
            .await
            .unwrap();

        h.engine
            .start_trip("rider-1".into(), preview.ride_fares[0].id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn acceptance_assigns_the_driver() {
        let h = harness();
        let trip = created_trip(&h).await;
        let mut events = recorder(&h.broker).await;

        h.engine
            .handle_driver_response(trip.id, "driver-7".into(), true)
            .await
            .unwrap();

        let stored = h.engine.find_trip(trip.id).await.unwrap();
        assert_eq!(stored.status, TripStatus::DriverAssigned);
        assert!(stored.updated_at >= trip.updated_at);

        let published = drain(&mut events).await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, TRIP_EVENT_DRIVER_ASSIGNED);
        let payload: Trip = serde_json::from_slice(&published[0].payload).unwrap();
        assert_eq!(payload, stored);
    }

    #[tokio::test]
    async fn response_for_unknown_trip() {
        let h = harness();
        let mut events = recorder(&h.broker).await;

        let err = h
            .engine
            .handle_driver_response(Uuid::new_v4(), "driver-7".into(), true)
            .await
            .unwrap_err();

        assert!(err.is_trip_not_found_error());
        assert!(drain(&mut events).await.is_empty());
    }

    #[tokio::test]
    async fn decline_leaves_the_trip_alone() {
        let h = harness();
        let trip = created_trip(&h).await;
        let mut events = recorder(&h.broker).await;

        h.engine
            .handle_driver_response(trip.id, "driver-7".into(), false)
            .await
            .unwrap();

        assert_eq!(h.engine.find_trip(trip.id).await.unwrap(), trip);
        assert!(drain(&mut events).await.is_empty());
    }

    #[tokio::test]
    async fn assignment_requires_the_publish() {
        let store = Arc::new(MemoryTripStore::new());
        let engine = Engine::new(
            Arc::new(FixedRoute::five_km()),
            FareEngine::default(),
            store.clone(),
            Arc::new(FailingChannel),
        );
        let preview = engine
            .preview_trip("rider-1".into(), pickup(), destination())
            .await
            .unwrap();
        let trip = engine
            .start_trip("rider-1".into(), preview.ride_fares[0].id)
            .await
            .unwrap();

        let err = engine
            .handle_driver_response(trip.id, "driver-7".into(), true)
            .await
            .unwrap_err();

        assert!(err.is_publish_failure_error());
        assert_eq!(
            store.get_by_id(&trip.id).await.unwrap().unwrap().status,
            TripStatus::DriverAssigned
        );
    }

    #[tokio::test]
    async fn repeated_acceptance_republishes_without_a_second_transition() {
        let h = harness();
        let trip = created_trip(&h).await;
        let mut events = recorder(&h.broker).await;

        h.engine
            .handle_driver_response(trip.id, "driver-7".into(), true)
            .await
            .unwrap();
        let assigned = h.engine.find_trip(trip.id).await.unwrap();

        h.engine
            .handle_driver_response(trip.id, "driver-7".into(), true)
            .await
            .unwrap();

        assert_eq!(h.engine.find_trip(trip.id).await.unwrap(), assigned);
        assert_eq!(drain(&mut events).await.len(), 2);
    }

    #[tokio::test]
    async fn acceptance_of_a_cancelled_trip_is_refused() {
        let h = harness();
        let trip = created_trip(&h).await;
        h.store
            .update_status(&trip.id, TripStatus::Cancelled)
            .await
            .unwrap();
        let mut events = recorder(&h.broker).await;

        let err = h
            .engine
            .handle_driver_response(trip.id, "driver-7".into(), true)
            .await
            .unwrap_err();

        assert!(err.is_invalid_invocation_error());
        assert!(drain(&mut events).await.is_empty());
    }

    #[tokio::test]
    async fn channel_is_shared_with_subscribers() {
        let h = harness();
        let mut created = h
            .broker
            .subscribe("dispatch", &[TRIP_EVENT_CREATED])
            .await
            .unwrap();

        let trip = created_trip(&h).await;

        let published = drain(&mut created).await;
        assert_eq!(published.len(), 1);
        let payload: Trip = serde_json::from_slice(&published[0].payload).unwrap();
        assert_eq!(payload.id, trip.id);
    }
}
