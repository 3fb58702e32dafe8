/// Acknowledgement and dead-letter seams
///
/// The consumer only needs a handful of operations on a delivered message, so
/// they are expressed as a trait. JetStream messages implement it directly;
/// tests use in-memory recorders.

use async_nats::jetstream::{self, AckKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::BrokerError;

/// A message handed out by the broker, awaiting a settle call.
///
/// Implementations must tolerate settle calls from concurrent tasks.
#[async_trait]
pub trait Delivery: Send + Sync {
    fn payload(&self) -> &[u8];

    /// Attempt number, 1 on first delivery.
    fn delivered(&self) -> i64;

    /// Remove the message from the queue.
    async fn acknowledge(&self) -> Result<(), BrokerError>;

    /// Ask for redelivery, optionally after a delay.
    async fn redeliver(&self, delay: Option<Duration>) -> Result<(), BrokerError>;

    /// Stop redelivery without processing.
    async fn terminate(&self) -> Result<(), BrokerError>;
}

#[async_trait]
impl Delivery for jetstream::Message {
    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn delivered(&self) -> i64 {
        self.info().map(|info| info.delivered).unwrap_or(1)
    }

    async fn acknowledge(&self) -> Result<(), BrokerError> {
        self.ack().await.map_err(BrokerError::Settle)
    }

    async fn redeliver(&self, delay: Option<Duration>) -> Result<(), BrokerError> {
        self.ack_with(AckKind::Nak(delay)).await.map_err(BrokerError::Settle)
    }

    async fn terminate(&self) -> Result<(), BrokerError> {
        self.ack_with(AckKind::Term).await.map_err(BrokerError::Settle)
    }
}

/// Record published for a message that will not be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub dead_letter_id: Uuid,
    /// Queue the message was consumed from
    pub queue: String,
    pub reason: String,
    /// Attempts made before giving up
    pub delivered: i64,
    pub failed_at: DateTime<Utc>,
    /// Original body, lossy UTF-8
    pub payload: String,
}

impl DeadLetter {
    pub fn new(queue: &str, reason: String, delivered: i64, payload: &[u8]) -> Self {
        Self {
            dead_letter_id: Uuid::new_v4(),
            queue: queue.to_string(),
            reason,
            delivered,
            failed_at: Utc::now(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, letter: &DeadLetter) -> Result<(), BrokerError>;
}

/// Publishes dead letters to a JetStream subject and waits for the server ack.
#[derive(Clone)]
pub struct JetStreamDeadLetters {
    jetstream: jetstream::Context,
    subject: String,
}

impl JetStreamDeadLetters {
    pub fn new(jetstream: jetstream::Context, subject: String) -> Self {
        Self { jetstream, subject }
    }
}

#[async_trait]
impl DeadLetterSink for JetStreamDeadLetters {
    async fn publish(&self, letter: &DeadLetter) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(letter)?;
        let publish_error = |e: async_nats::Error| BrokerError::Publish {
            subject: self.subject.clone(),
            source: e,
        };

        let ack = self
            .jetstream
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| publish_error(e.into()))?;
        ack.await.map_err(|e| publish_error(e.into()))?;

        tracing::debug!(
            dead_letter_id = %letter.dead_letter_id,
            subject = %self.subject,
            "Published dead letter"
        );
        Ok(())
    }
}
