/// Queue consumer loop
///
/// Pulls deliveries from a message stream and spawns one task per delivery.
/// At most `max_in_flight` deliveries are processed at once; completion order
/// is not delivery order. On shutdown the loop stops pulling, waits for
/// in-flight tasks and returns.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::delivery::{DeadLetter, DeadLetterSink, Delivery};
use crate::pipeline::{ContactPipeline, Disposition, RedeliveryPolicy};

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub max_in_flight: usize,
    pub drain_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 16,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Processes one delivery and settles it with the broker.
pub struct DeliveryHandler {
    pipeline: ContactPipeline,
    policy: RedeliveryPolicy,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    queue: String,
}

impl DeliveryHandler {
    pub fn new(
        pipeline: ContactPipeline,
        policy: RedeliveryPolicy,
        dead_letters: Option<Arc<dyn DeadLetterSink>>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            policy,
            dead_letters,
            queue: queue.into(),
        }
    }

    /// Run the pipeline for `delivery` and ack, retry, dead-letter or discard
    /// it. Never fails: every error ends as a log line and a settle call.
    ///
    /// Returns the disposition actually applied.
    pub async fn handle<D>(&self, delivery: &D) -> Disposition
    where
        D: Delivery + ?Sized,
    {
        let delivered = delivery.delivered();

        let (disposition, reason) = match self.pipeline.process(delivery.payload()).await {
            Ok(contact) => {
                info!(name = %contact.name, delivered, "Contact {} saved to the database", contact.name);
                (Disposition::Ack, None)
            }
            Err(e) => {
                let disposition = self.policy.decide(&e, delivered);
                if e.is_permanent() {
                    warn!(error = %e, delivered, ?disposition, "Rejected message");
                } else {
                    error!(error = %e, delivered, ?disposition, "Error processing message");
                }
                (disposition, Some(e.to_string()))
            }
        };

        self.settle(delivery, disposition, reason).await
    }

    async fn settle<D>(&self, delivery: &D, disposition: Disposition, reason: Option<String>) -> Disposition
    where
        D: Delivery + ?Sized,
    {
        let (applied, result) = match disposition {
            Disposition::Ack => (Disposition::Ack, delivery.acknowledge().await),
            Disposition::Retry(delay) => (disposition, delivery.redeliver(Some(delay)).await),
            Disposition::Discard => (Disposition::Discard, delivery.terminate().await),
            Disposition::DeadLetter => match self.dead_letters {
                Some(ref sink) => {
                    let letter = DeadLetter::new(
                        &self.queue,
                        reason.unwrap_or_default(),
                        delivery.delivered(),
                        delivery.payload(),
                    );
                    match sink.publish(&letter).await {
                        Ok(()) => (Disposition::DeadLetter, delivery.acknowledge().await),
                        Err(e) => {
                            error!(error = %e, "Failed to publish dead letter, leaving message for redelivery");
                            (Disposition::Retry(Duration::ZERO), delivery.redeliver(None).await)
                        }
                    }
                }
                None => (Disposition::Discard, delivery.terminate().await),
            },
        };

        if let Err(e) = result {
            error!(error = %e, disposition = ?applied, "Failed to settle message");
        }
        applied
    }
}

pub struct QueueConsumer {
    handler: Arc<DeliveryHandler>,
    config: ConsumerConfig,
}

impl QueueConsumer {
    pub fn new(handler: Arc<DeliveryHandler>, config: ConsumerConfig) -> Self {
        Self { handler, config }
    }

    /// Consume `messages` until `shutdown` is cancelled or the stream ends.
    ///
    /// Deliveries already handed to the pipeline always settle before this
    /// returns; the drain timeout only releases deliveries whose store call
    /// has not started.
    pub async fn run<S, D, E>(&self, messages: S, shutdown: CancellationToken)
    where
        S: Stream<Item = Result<D, E>>,
        D: Delivery + 'static,
        E: std::fmt::Display,
    {
        let mut messages = Box::pin(messages);
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let released = CancellationToken::new();
        let mut in_flight = JoinSet::new();

        info!(
            queue = %self.handler.queue,
            max_in_flight = self.config.max_in_flight,
            "Consuming messages"
        );

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = messages.next() => next,
            };

            match next {
                None => {
                    warn!("Message stream ended");
                    break;
                }
                Some(Err(e)) => {
                    error!(error = %e, "Error receiving message");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
                Some(Ok(delivery)) => {
                    let span = tracing::info_span!(
                        "delivery",
                        queue = %self.handler.queue,
                        delivered = delivery.delivered()
                    );
                    let handler = Arc::clone(&self.handler);
                    let released = released.clone();
                    in_flight.spawn(
                        async move {
                            let _permit = permit;
                            if released.is_cancelled() {
                                release(&delivery).await;
                            } else {
                                handler.handle(&delivery).await;
                            }
                        }
                        .instrument(span),
                    );
                }
            }

            while let Some(result) = in_flight.try_join_next() {
                log_task_result(result);
            }
        }

        // Stop pulling before waiting on what is already running.
        drop(messages);
        self.drain(in_flight, released).await;
    }

    /// Wait for every spawned delivery to settle.
    ///
    /// Tasks are never aborted; a started insert always reaches its settle
    /// call. After the drain timeout, tasks that have not reached the pipeline
    /// yet hand their message back to the broker instead.
    async fn drain(&self, mut in_flight: JoinSet<()>, released: CancellationToken) {
        if in_flight.is_empty() {
            return;
        }
        info!(in_flight = in_flight.len(), "Waiting for in-flight messages");

        let drained = tokio::time::timeout(self.config.drain_timeout, async {
            while let Some(result) = in_flight.join_next().await {
                log_task_result(result);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = in_flight.len(),
                "Drain timeout reached, releasing pending deliveries and waiting for running inserts"
            );
            released.cancel();
            while let Some(result) = in_flight.join_next().await {
                log_task_result(result);
            }
        }
        debug!("All in-flight messages settled");
    }
}

async fn release<D: Delivery + ?Sized>(delivery: &D) {
    if let Err(e) = delivery.redeliver(None).await {
        error!(error = %e, "Failed to release message");
    }
}

fn log_task_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "Delivery task panicked");
        }
    }
}
