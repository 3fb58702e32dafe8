/// NATS JetStream client for the contact queue
///
/// Owns the broker connection for the whole process lifetime: connects,
/// declares the queue (and the dead-letter queue), creates the durable
/// consumer and closes everything at shutdown.

use async_nats::jetstream::{self, consumer::pull, consumer::PullConsumer, stream};
use std::time::Duration;

use super::delivery::JetStreamDeadLetters;
use super::BrokerError;

#[derive(Debug, Clone)]
pub struct NatsConfig {
    pub url: String,
    /// Stream name, also used as its only subject
    pub queue: String,
    pub consumer_name: String,
    /// `None` disables dead-lettering
    pub dead_letter_queue: Option<String>,
    pub max_deliver: i64,
    /// Unacknowledged messages the server hands out at once
    pub max_ack_pending: i64,
    /// Time the server waits for a settle call before redelivering.
    /// Must outlast the slowest store call.
    pub ack_wait: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            queue: "fila_criar_contato".to_string(),
            consumer_name: "contact-worker".to_string(),
            dead_letter_queue: Some("fila_criar_contato_dlq".to_string()),
            max_deliver: 5,
            max_ack_pending: 16,
            ack_wait: Duration::from_secs(60),
        }
    }
}

pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    consumer: PullConsumer,
    config: NatsConfig,
}

impl NatsClient {
    /// Connect to NATS and declare the queue and its consumer.
    ///
    /// Every declaration is idempotent, so restarting against a server where
    /// the queue already exists is fine. Any failure here is fatal.
    pub async fn connect(config: NatsConfig) -> Result<Self, BrokerError> {
        match Self::try_connect(config).await {
            Ok(client) => Ok(client),
            Err(e) => {
                tracing::error!(error = %e, "Error connecting to NATS");
                Err(e)
            }
        }
    }

    async fn try_connect(config: NatsConfig) -> Result<Self, BrokerError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| BrokerError::Connect {
                url: config.url.clone(),
                source: e.into(),
            })?;
        tracing::info!("Connected to NATS at {}", config.url);

        let jetstream = jetstream::new(client.clone());

        let stream = declare_queue(&jetstream, &config.queue).await?;
        if let Some(ref dead_letter_queue) = config.dead_letter_queue {
            declare_queue(&jetstream, dead_letter_queue).await?;
        }

        let consumer = stream
            .get_or_create_consumer(&config.consumer_name, consumer_config(&config))
            .await
            .map_err(|e| BrokerError::Declare {
                queue: config.queue.clone(),
                source: e.into(),
            })?;

        tracing::info!(
            queue = %config.queue,
            consumer = %config.consumer_name,
            "Connected to NATS and waiting for messages on queue '{}'",
            config.queue
        );

        Ok(Self {
            client,
            jetstream,
            consumer,
            config,
        })
    }

    /// Start pulling from the durable consumer.
    pub async fn messages(&self) -> Result<pull::Stream, BrokerError> {
        self.consumer
            .messages()
            .await
            .map_err(|e| BrokerError::Subscribe {
                queue: self.config.queue.clone(),
                source: e.into(),
            })
    }

    /// Dead-letter publisher, when dead-lettering is enabled.
    pub fn dead_letters(&self) -> Option<JetStreamDeadLetters> {
        self.config
            .dead_letter_queue
            .as_ref()
            .map(|queue| JetStreamDeadLetters::new(self.jetstream.clone(), queue.clone()))
    }

    /// Check if the NATS connection is active
    pub fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }

    /// Release the consumer, flush pending acks and drop the connection.
    ///
    /// Errors are logged, never returned.
    pub async fn close(self) {
        tracing::info!("Closing NATS connection");
        let Self { client, consumer, .. } = self;
        drop(consumer);

        if let Err(e) = client.flush().await {
            tracing::warn!(error = %e, "Failed to flush NATS connection during shutdown");
        }
        drop(client);
    }
}

/// Get or create a durable work-queue stream whose only subject is its name.
pub async fn declare_queue(
    jetstream: &jetstream::Context,
    name: &str,
) -> Result<stream::Stream, BrokerError> {
    let stream = jetstream
        .get_or_create_stream(queue_stream_config(name))
        .await
        .map_err(|e| BrokerError::Declare {
            queue: name.to_string(),
            source: e.into(),
        })?;

    tracing::debug!(queue = name, "JetStream queue ready");
    Ok(stream)
}

/// Durable pull consumer with explicit acks and a bounded redelivery count.
pub fn consumer_config(config: &NatsConfig) -> pull::Config {
    pull::Config {
        durable_name: Some(config.consumer_name.clone()),
        ack_policy: jetstream::consumer::AckPolicy::Explicit,
        ack_wait: config.ack_wait,
        max_deliver: config.max_deliver,
        max_ack_pending: config.max_ack_pending,
        filter_subject: config.queue.clone(),
        ..Default::default()
    }
}

/// Durable, shared, not auto-deleted: messages stay on disk until acked.
pub fn queue_stream_config(name: &str) -> stream::Config {
    stream::Config {
        name: name.to_string(),
        subjects: vec![name.to_string()],
        retention: stream::RetentionPolicy::WorkQueue,
        storage: stream::StorageType::File,
        num_replicas: 1,
        ..Default::default()
    }
}
