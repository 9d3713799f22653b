use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::DynAPI,
    error::Error,
    events::{
        EventChannel, Message, Outcome, DRIVER_CMD_TRIP_ACCEPT, DRIVER_CMD_TRIP_DECLINE,
        DRIVER_TRIP_RESPONSE_QUEUE,
    },
};

/// A driver's answer to a trip offer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverResponse {
    #[serde(rename = "tripID")]
    pub trip_id: Uuid,
    #[serde(rename = "riderID")]
    pub rider_id: String,
    #[serde(rename = "driverID")]
    pub driver_id: String,
    pub accepted: bool,
}

/// Sequential pump from the driver response queue into the orchestrator.
///
/// Each message is fully handled before the next one is drawn. Failed
/// messages are requeued while the failure is retryable and the message has
/// been delivered fewer than `max_delivery_attempts` times; everything else
/// that fails is discarded.
pub struct DriverResponseConsumer {
    api: DynAPI,
    channel: Arc<dyn EventChannel>,
    max_delivery_attempts: u32,
}

impl DriverResponseConsumer {
    pub fn new(api: DynAPI, channel: Arc<dyn EventChannel>, max_delivery_attempts: u32) -> Self {
        Self {
            api,
            channel,
            max_delivery_attempts: max_delivery_attempts.max(1),
        }
    }

    /// Runs until `shutdown` resolves or the subscription ends. A message
    /// being handled when `shutdown` resolves is left unsettled so that it is
    /// delivered again.
    pub async fn run<F>(self, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let mut deliveries = self
            .channel
            .subscribe(
                DRIVER_TRIP_RESPONSE_QUEUE,
                &[DRIVER_CMD_TRIP_ACCEPT, DRIVER_CMD_TRIP_DECLINE],
            )
            .await?;

        tracing::info!("started driver response consumer");

        tokio::pin!(shutdown);

        loop {
            let delivery = tokio::select! {
                _ = &mut shutdown => break,
                next = deliveries.next() => match next {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            let message = delivery.message().clone();

            let outcome = tokio::select! {
                _ = &mut shutdown => None,
                outcome = self.process(&message) => Some(outcome),
            };

            match outcome {
                Some(outcome) => {
                    if let Err(err) = delivery.settle(outcome).await {
                        tracing::error!("failed to settle driver response: {}", err);
                    }
                }
                None => {
                    tracing::info!("shutting down with a driver response in flight");
                    drop(delivery);
                    break;
                }
            }
        }

        tracing::info!("stopped driver response consumer");

        Ok(())
    }

    #[tracing::instrument(skip(self, message), fields(message_id = %message.id, topic = %message.topic, attempt = message.delivery_count))]
    async fn process(&self, message: &Message) -> Outcome {
        let response: DriverResponse = match serde_json::from_slice(&message.payload) {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("discarding malformed driver response: {}", err);
                return Outcome::Discard;
            }
        };

        tracing::info!(
            "received driver response: trip_id={}, driver_id={}, accepted={}",
            response.trip_id,
            response.driver_id,
            response.accepted
        );

        let result = self
            .api
            .handle_driver_response(response.trip_id, response.driver_id, response.accepted)
            .await;

        match result {
            Ok(()) => Outcome::Ack,
            Err(err) if err.is_retryable() && message.delivery_count < self.max_delivery_attempts => {
                tracing::warn!("failed to handle driver response, requeueing: {}", err);
                Outcome::Requeue
            }
            Err(err) => {
                tracing::error!("failed to handle driver response, discarding: {}", err);
                Outcome::Discard
            }
        }
    }
}
