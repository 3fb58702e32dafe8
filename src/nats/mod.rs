/// NATS JetStream integration module
///
/// Owns the broker connection, unwraps message envelopes and drives the
/// per-delivery acknowledgement decision.

pub mod client;
pub mod consumer;
pub mod delivery;
pub mod message_envelope;

pub use client::{NatsClient, NatsConfig};
pub use consumer::{ConsumerConfig, DeliveryHandler, QueueConsumer};
pub use delivery::{DeadLetter, DeadLetterSink, Delivery, JetStreamDeadLetters};
pub use message_envelope::Envelope;

/// Broker-side failures.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("failed to connect to NATS at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: async_nats::Error,
    },

    #[error("failed to declare queue '{queue}': {source}")]
    Declare {
        queue: String,
        #[source]
        source: async_nats::Error,
    },

    #[error("failed to subscribe to queue '{queue}': {source}")]
    Subscribe {
        queue: String,
        #[source]
        source: async_nats::Error,
    },

    #[error("failed to settle message: {0}")]
    Settle(#[source] async_nats::Error),

    #[error("failed to publish to '{subject}': {source}")]
    Publish {
        subject: String,
        #[source]
        source: async_nats::Error,
    },

    #[error("failed to encode dead letter: {0}")]
    Encode(#[from] serde_json::Error),
}
