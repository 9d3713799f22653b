//! Publish/subscribe plumbing between the trip service and the rest of the
//! platform.
//!
//! Topics are dot-separated routing keys. Subscribers bind a named queue to
//! one or more topic patterns, where `*` matches exactly one word and `#`
//! matches zero or more. Every delivery must be settled: acknowledged,
//! requeued for another attempt, or discarded as poison. A delivery dropped
//! without being settled is requeued.

mod consumer;
mod local;
mod publisher;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::error::Error;

pub use consumer::{DriverResponse, DriverResponseConsumer};
pub use local::LocalBroker;
pub use publisher::{PublishPolicy, TripEvents};

pub const TRIP_EVENT_CREATED: &str = "trip.event.created";
pub const TRIP_EVENT_DRIVER_ASSIGNED: &str = "trip.event.driver_assigned";
pub const TRIP_EVENT_NO_DRIVERS_FOUND: &str = "trip.event.no_drivers_found";

pub const DRIVER_CMD_TRIP_ACCEPT: &str = "driver.cmd.trip_accept";
pub const DRIVER_CMD_TRIP_DECLINE: &str = "driver.cmd.trip_decline";

pub const DRIVER_TRIP_RESPONSE_QUEUE: &str = "driver_trip_response";

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented on every redelivery.
    pub delivery_count: u32,
}

impl Message {
    pub fn new(topic: &str, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            payload,
            delivery_count: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Ack,
    Requeue,
    Discard,
}

/// Transport side of a delivery.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn settle(self: Box<Self>, outcome: Outcome) -> Result<(), Error>;
}

pub struct Delivery {
    message: Message,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(message: Message, acker: Box<dyn Acknowledge>) -> Self {
        Self { message, acker }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub async fn settle(self, outcome: Outcome) -> Result<(), Error> {
        self.acker.settle(outcome).await
    }

    pub async fn ack(self) -> Result<(), Error> {
        self.settle(Outcome::Ack).await
    }
}

pub type Subscription = Pin<Box<dyn Stream<Item = Delivery> + Send>>;

#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Messages published to one topic reach each bound queue in publish
    /// order.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error>;

    /// Declares `queue` if needed, binds it to `patterns` and starts
    /// consuming from it. Several subscriptions to the same queue compete
    /// for its messages.
    async fn subscribe(&self, queue: &str, patterns: &[&str]) -> Result<Subscription, Error>;
}

pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let topic: Vec<&str> = topic.split('.').collect();

    matches_words(&pattern, &topic)
}

fn matches_words(pattern: &[&str], topic: &[&str]) -> bool {
    match (pattern.split_first(), topic.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            matches_words(rest, topic)
                || (!topic.is_empty() && matches_words(pattern, &topic[1..]))
        }
        (Some((&"*", rest)), Some((_, topic_rest))) => matches_words(rest, topic_rest),
        (Some((word, rest)), Some((topic_word, topic_rest))) => {
            word == topic_word && matches_words(rest, topic_rest)
        }
        _ => false,
    }
}

#[test]
fn topic_patterns() {
    assert!(topic_matches("driver.cmd.trip_accept", "driver.cmd.trip_accept"));
    assert!(!topic_matches("driver.cmd.trip_accept", "driver.cmd.trip_decline"));
    assert!(topic_matches("driver.cmd.*", "driver.cmd.trip_decline"));
    assert!(!topic_matches("driver.*", "driver.cmd.trip_decline"));
    assert!(topic_matches("trip.#", "trip.event.created"));
    assert!(topic_matches("trip.#", "trip"));
    assert!(topic_matches("#", "trip.event.driver_assigned"));
    assert!(topic_matches("#.created", "trip.event.created"));
    assert!(!topic_matches("trip.event", "trip.event.created"));
    assert!(!topic_matches("trip.event.created.x", "trip.event.created"));
}
