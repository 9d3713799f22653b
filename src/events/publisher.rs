use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    entities::Trip,
    error::Error,
    events::{
        EventChannel, TRIP_EVENT_CREATED, TRIP_EVENT_DRIVER_ASSIGNED, TRIP_EVENT_NO_DRIVERS_FOUND,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishPolicy {
    /// A failed publish is logged and swallowed; one attempt only.
    BestEffort,
    /// A failed publish fails the operation.
    Required,
}

/// Trip lifecycle events, JSON encoded.
#[derive(Clone)]
pub struct TripEvents {
    channel: Arc<dyn EventChannel>,
}

impl TripEvents {
    pub fn new(channel: Arc<dyn EventChannel>) -> Self {
        Self { channel }
    }

    pub async fn trip_created(&self, trip: &Trip, policy: PublishPolicy) -> Result<(), Error> {
        self.publish(TRIP_EVENT_CREATED, trip, policy).await
    }

    pub async fn driver_assigned(&self, trip: &Trip, policy: PublishPolicy) -> Result<(), Error> {
        self.publish(TRIP_EVENT_DRIVER_ASSIGNED, trip, policy).await
    }

    pub async fn no_drivers_found(
        &self,
        trip_id: &Uuid,
        policy: PublishPolicy,
    ) -> Result<(), Error> {
        self.publish(
            TRIP_EVENT_NO_DRIVERS_FOUND,
            &json!({ "trip_id": trip_id }),
            policy,
        )
        .await
    }

    #[tracing::instrument(skip(self, data))]
    async fn publish<T: Serialize>(
        &self,
        topic: &str,
        data: &T,
        policy: PublishPolicy,
    ) -> Result<(), Error> {
        let result = match serde_json::to_vec(data) {
            Ok(payload) => self.channel.publish(topic, payload).await,
            Err(err) => Err(Error::publish_failure_error(err.to_string())),
        };

        match (result, policy) {
            (Ok(()), _) => {
                tracing::info!("published {}", topic);
                Ok(())
            }
            (Err(err), PublishPolicy::BestEffort) => {
                tracing::warn!("failed to publish {}, continuing: {}", topic, err);
                Ok(())
            }
            (Err(err), PublishPolicy::Required) => {
                tracing::error!("failed to publish {}: {}", topic, err);
                Err(err)
            }
        }
    }
}

#[tokio::test]
async fn policy_decides_whether_failures_surface() {
    use crate::testing::FailingChannel;

    let events = TripEvents::new(Arc::new(FailingChannel));
    let trip_id = Uuid::new_v4();

    assert!(events
        .no_drivers_found(&trip_id, PublishPolicy::BestEffort)
        .await
        .is_ok());
    assert!(events
        .no_drivers_found(&trip_id, PublishPolicy::Required)
        .await
        .unwrap_err()
        .is_publish_failure_error());
}

#[tokio::test]
async fn no_drivers_found_carries_the_trip_id() {
    use crate::events::LocalBroker;
    use futures::StreamExt;

    let broker = Arc::new(LocalBroker::new());
    let mut subscription = broker
        .subscribe("watch", &[TRIP_EVENT_NO_DRIVERS_FOUND])
        .await
        .unwrap();
    let events = TripEvents::new(broker.clone());
    let trip_id = Uuid::new_v4();

    events
        .no_drivers_found(&trip_id, PublishPolicy::Required)
        .await
        .unwrap();

    let delivery = subscription.next().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&delivery.message().payload).unwrap();
    assert_eq!(body["trip_id"], trip_id.to_string());
}
