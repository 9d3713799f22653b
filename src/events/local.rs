use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use futures::stream;

use crate::{
    error::Error,
    events::{topic_matches, Acknowledge, Delivery, EventChannel, Message, Outcome, Subscription},
};

struct Queue {
    patterns: RwLock<Vec<String>>,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
}

impl Queue {
    fn is_bound_to(&self, topic: &str) -> bool {
        self.patterns
            .read()
            .map(|patterns| patterns.iter().any(|pattern| topic_matches(pattern, topic)))
            .unwrap_or(false)
    }
}

/// In-process topic exchange.
///
/// Queues are unbounded FIFOs; a requeued message goes to the tail of its
/// queue with its delivery count incremented. Messages published to a topic
/// no queue is bound to are dropped.
#[derive(Default)]
pub struct LocalBroker {
    queues: RwLock<HashMap<String, Arc<Queue>>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&self, name: &str, patterns: &[&str]) -> Result<Arc<Queue>, Error> {
        let mut queues = self
            .queues
            .write()
            .map_err(|_| Error::unexpected_error("broker lock poisoned"))?;

        let queue = queues
            .entry(name.to_string())
            .or_insert_with(|| {
                let (sender, receiver) = async_channel::unbounded();
                Arc::new(Queue {
                    patterns: RwLock::new(Vec::new()),
                    sender,
                    receiver,
                })
            })
            .clone();

        let mut bound = queue
            .patterns
            .write()
            .map_err(|_| Error::unexpected_error("broker lock poisoned"))?;

        for pattern in patterns {
            if !bound.iter().any(|existing| existing == pattern) {
                bound.push(pattern.to_string());
            }
        }

        drop(bound);

        Ok(queue)
    }
}

#[async_trait]
impl EventChannel for LocalBroker {
    #[tracing::instrument(skip(self, payload), fields(bytes = payload.len()))]
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error> {
        let senders: Vec<Sender<Message>> = self
            .queues
            .read()
            .map_err(|_| Error::publish_failure_error("broker lock poisoned"))?
            .values()
            .filter(|queue| queue.is_bound_to(topic))
            .map(|queue| queue.sender.clone())
            .collect();

        if senders.is_empty() {
            tracing::debug!("no queue bound to {}, dropping message", topic);
            return Ok(());
        }

        let message = Message::new(topic, payload);

        for sender in senders {
            sender
                .try_send(message.clone())
                .map_err(|err| Error::publish_failure_error(err.to_string()))?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn subscribe(&self, queue: &str, patterns: &[&str]) -> Result<Subscription, Error> {
        let queue = self.declare(queue, patterns)?;

        let deliveries = stream::unfold(queue, |queue| async move {
            let message = queue.receiver.recv().await.ok()?;
            let acker = LocalAcker {
                message: Some(message.clone()),
                requeue: queue.sender.clone(),
            };

            Some((Delivery::new(message, Box::new(acker)), queue))
        });

        Ok(Box::pin(deliveries))
    }
}

struct LocalAcker {
    message: Option<Message>,
    requeue: Sender<Message>,
}

impl LocalAcker {
    fn requeue(&mut self) -> Result<(), Error> {
        if let Some(mut message) = self.message.take() {
            message.delivery_count += 1;
            self.requeue
                .try_send(message)
                .map_err(|err| Error::publish_failure_error(err.to_string()))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Acknowledge for LocalAcker {
    async fn settle(self: Box<Self>, outcome: Outcome) -> Result<(), Error> {
        let mut acker = self;

        match outcome {
            Outcome::Ack | Outcome::Discard => {
                acker.message = None;
                Ok(())
            }
            Outcome::Requeue => acker.requeue(),
        }
    }
}

impl Drop for LocalAcker {
    fn drop(&mut self) {
        if self.message.is_some() {
            tracing::debug!("delivery dropped before settlement, requeueing");
            let _ = self.requeue();
        }
    }
}

#[cfg(test)]
async fn next_delivery(subscription: &mut Subscription) -> Delivery {
    use futures::StreamExt;
    use std::time::Duration;

    tokio::time::timeout(Duration::from_secs(1), subscription.next())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn delivers_in_publish_order_to_bound_queues() {
    let broker = LocalBroker::new();
    let mut accepts = broker
        .subscribe("accepts", &["driver.cmd.trip_accept"])
        .await
        .unwrap();
    let mut everything = broker.subscribe("audit", &["driver.#"]).await.unwrap();

    for n in 0..3u8 {
        broker
            .publish("driver.cmd.trip_accept", vec![n])
            .await
            .unwrap();
    }
    broker
        .publish("driver.cmd.trip_decline", vec![9])
        .await
        .unwrap();

    for n in 0..3u8 {
        let delivery = next_delivery(&mut accepts).await;
        assert_eq!(delivery.message().payload, vec![n]);
        delivery.ack().await.unwrap();
    }

    let mut seen = Vec::new();
    for _ in 0..4 {
        let delivery = next_delivery(&mut everything).await;
        seen.push(delivery.message().payload[0]);
        delivery.ack().await.unwrap();
    }
    assert_eq!(seen, vec![0, 1, 2, 9]);
}

#[tokio::test]
async fn requeue_redelivers_with_incremented_count() {
    let broker = LocalBroker::new();
    let mut subscription = broker.subscribe("q", &["a.b"]).await.unwrap();

    broker.publish("a.b", b"hello".to_vec()).await.unwrap();

    let first = next_delivery(&mut subscription).await;
    assert_eq!(first.message().delivery_count, 1);
    let id = first.message().id;
    first.settle(Outcome::Requeue).await.unwrap();

    let second = next_delivery(&mut subscription).await;
    assert_eq!(second.message().id, id);
    assert_eq!(second.message().delivery_count, 2);
    second.settle(Outcome::Discard).await.unwrap();

    broker.publish("a.b", b"next".to_vec()).await.unwrap();
    let third = next_delivery(&mut subscription).await;
    assert_eq!(third.message().payload, b"next".to_vec());
}

#[tokio::test]
async fn unsettled_deliveries_are_redelivered() {
    let broker = LocalBroker::new();
    let mut subscription = broker.subscribe("q", &["a.*"]).await.unwrap();

    broker.publish("a.b", b"payload".to_vec()).await.unwrap();

    let delivery = next_delivery(&mut subscription).await;
    drop(delivery);

    let again = next_delivery(&mut subscription).await;
    assert_eq!(again.message().payload, b"payload".to_vec());
    assert_eq!(again.message().delivery_count, 2);
}

#[test]
fn publishing_without_bindings_is_not_an_error() {
    let broker = LocalBroker::new();

    tokio_test::block_on(broker.publish("trip.event.created", b"{}".to_vec())).unwrap();
}
