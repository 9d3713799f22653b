use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use uuid::Uuid;

use crate::{
    db::TripStore,
    entities::{Coordinates, Route, Trip, TripStatus},
    error::Error,
    events::{EventChannel, LocalBroker, Message, Subscription},
    external::RoutingGateway,
};

pub struct FixedRoute(pub Route);

impl FixedRoute {
    pub fn five_km() -> Self {
        Self(Route::new(
            5000.0,
            600.0,
            vec![
                Coordinates::new(37.5, -122.5),
                Coordinates::new(37.75, -122.25),
            ],
        ))
    }
}

#[async_trait]
impl RoutingGateway for FixedRoute {
    async fn get_route(&self, _: &Coordinates, _: &Coordinates) -> Result<Route, Error> {
        Ok(self.0.clone())
    }
}

pub struct FailingRouting(pub Error);

#[async_trait]
impl RoutingGateway for FailingRouting {
    async fn get_route(&self, _: &Coordinates, _: &Coordinates) -> Result<Route, Error> {
        Err(self.0.clone())
    }
}

pub struct FailingChannel;

#[async_trait]
impl EventChannel for FailingChannel {
    async fn publish(&self, topic: &str, _: Vec<u8>) -> Result<(), Error> {
        Err(Error::publish_failure_error(format!("broker down ({})", topic)))
    }

    async fn subscribe(&self, _: &str, _: &[&str]) -> Result<Subscription, Error> {
        Err(Error::unexpected_error("broker down"))
    }
}

/// Every operation fails as if the database were unreachable.
#[derive(Default)]
pub struct FailingStore {
    pub reads: AtomicU32,
}

impl FailingStore {
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    fn down() -> Error {
        Error::persistence_failure_error("connection refused")
    }
}

#[async_trait]
impl TripStore for FailingStore {
    async fn create(&self, _: &Trip) -> Result<(), Error> {
        Err(Self::down())
    }

    async fn get_by_id(&self, _: &Uuid) -> Result<Option<Trip>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(Self::down())
    }

    async fn update(&self, _: &Trip) -> Result<(), Error> {
        Err(Self::down())
    }

    async fn update_status(&self, _: &Uuid, _: TripStatus) -> Result<(), Error> {
        Err(Self::down())
    }

    async fn list_by_user(&self, _: &str) -> Result<Vec<Trip>, Error> {
        Err(Self::down())
    }
}

/// Every lookup misses.
#[derive(Default)]
pub struct MissingStore {
    pub reads: AtomicU32,
}

impl MissingStore {
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TripStore for MissingStore {
    async fn create(&self, _: &Trip) -> Result<(), Error> {
        Ok(())
    }

    async fn get_by_id(&self, _: &Uuid) -> Result<Option<Trip>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn update(&self, _: &Trip) -> Result<(), Error> {
        Err(Error::trip_not_found_error())
    }

    async fn update_status(&self, _: &Uuid, _: TripStatus) -> Result<(), Error> {
        Err(Error::trip_not_found_error())
    }

    async fn list_by_user(&self, _: &str) -> Result<Vec<Trip>, Error> {
        Ok(Vec::new())
    }
}

/// Lookups hang long enough for a test to give up on them.
#[derive(Default)]
pub struct SlowStore {
    pub reads: AtomicU32,
}

impl SlowStore {
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TripStore for SlowStore {
    async fn create(&self, _: &Trip) -> Result<(), Error> {
        Ok(())
    }

    async fn get_by_id(&self, _: &Uuid) -> Result<Option<Trip>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }

    async fn update(&self, _: &Trip) -> Result<(), Error> {
        Ok(())
    }

    async fn update_status(&self, _: &Uuid, _: TripStatus) -> Result<(), Error> {
        Ok(())
    }

    async fn list_by_user(&self, _: &str) -> Result<Vec<Trip>, Error> {
        Ok(Vec::new())
    }
}

/// Subscribes a private queue to every topic.
pub async fn recorder(broker: &LocalBroker) -> Subscription {
    broker
        .subscribe(&format!("recorder-{}", Uuid::new_v4()), &["#"])
        .await
        .unwrap()
}

/// Acknowledges and returns whatever is already queued.
pub async fn drain(subscription: &mut Subscription) -> Vec<Message> {
    let mut messages = Vec::new();

    while let Some(Some(delivery)) = subscription.next().now_or_never() {
        messages.push(delivery.message().clone());
        delivery.ack().await.unwrap();
    }

    messages
}
