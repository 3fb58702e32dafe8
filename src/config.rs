//! Worker configuration.
//!
//! Every option can come from a command-line flag or an environment variable
//! (a `.env` file is loaded first by the binary).

use clap::Parser;
use std::time::Duration;

use crate::diesel_runtime::DatabaseConfig;
use crate::nats::{ConsumerConfig, NatsConfig};
use crate::pipeline::RedeliveryPolicy;
use crate::service::ContactRules;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    TooSmall(&'static str),

    #[error("dead-letter queue must differ from the consumed queue '{0}'")]
    DeadLetterIsQueue(String),

    #[error("retry backoff {base_ms}ms exceeds max backoff {max_ms}ms")]
    Backoff { base_ms: u64, max_ms: u64 },

    #[error("ack wait {ack_wait_secs}s must exceed the database connect timeout {connect_timeout_secs}s")]
    AckWait { ack_wait_secs: u64, connect_timeout_secs: u64 },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "contact-worker", version, about = "Consumes create-contact messages and stores them")]
pub struct WorkerConfig {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://localhost:4222")]
    pub nats_url: String,

    /// Queue (JetStream stream and subject) to consume
    #[arg(long, env = "QUEUE_NAME", default_value = "fila_criar_contato")]
    pub queue: String,

    /// Durable consumer name
    #[arg(long, env = "NATS_CONSUMER", default_value = "contact-worker")]
    pub consumer_name: String,

    /// Queue receiving messages that will not be retried
    #[arg(long, env = "DEAD_LETTER_QUEUE", default_value = "fila_criar_contato_dlq")]
    pub dead_letter_queue: String,

    /// Discard poison messages instead of dead-lettering them
    #[arg(long, env = "NO_DEAD_LETTER")]
    pub no_dead_letter: bool,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 15)]
    pub db_max_connections: u32,

    /// Seconds an insert waits for a pooled connection
    #[arg(long, env = "DB_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub db_connect_timeout_secs: u64,

    /// Deliveries allowed before a failing message is dead-lettered
    #[arg(long, env = "MAX_DELIVER", default_value_t = 5)]
    pub max_deliver: i64,

    /// Seconds the broker waits for an ack before redelivering
    #[arg(long, env = "ACK_WAIT_SECS", default_value_t = 60)]
    pub ack_wait_secs: u64,

    /// Messages processed concurrently
    #[arg(long, env = "MAX_IN_FLIGHT", default_value_t = 16)]
    pub max_in_flight: usize,

    #[arg(long, env = "RETRY_BACKOFF_MS", default_value_t = 500)]
    pub retry_backoff_ms: u64,

    #[arg(long, env = "MAX_BACKOFF_MS", default_value_t = 30_000)]
    pub max_backoff_ms: u64,

    /// Seconds to wait for in-flight messages at shutdown
    #[arg(long, env = "DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    pub drain_timeout_secs: u64,

    /// Reject contacts without a name or with a malformed area code
    #[arg(long, env = "REQUIRE_NAME")]
    pub require_name: bool,

    /// Create the contatos table at startup if missing
    #[arg(long, env = "ENSURE_SCHEMA")]
    pub ensure_schema: bool,
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_deliver < 1 {
            return Err(ConfigError::TooSmall("max-deliver"));
        }
        if self.max_in_flight < 1 {
            return Err(ConfigError::TooSmall("max-in-flight"));
        }
        if self.db_max_connections < 1 {
            return Err(ConfigError::TooSmall("db-max-connections"));
        }
        if !self.no_dead_letter && self.dead_letter_queue == self.queue {
            return Err(ConfigError::DeadLetterIsQueue(self.queue.clone()));
        }
        if self.ack_wait_secs <= self.db_connect_timeout_secs {
            return Err(ConfigError::AckWait {
                ack_wait_secs: self.ack_wait_secs,
                connect_timeout_secs: self.db_connect_timeout_secs,
            });
        }
        if self.retry_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::Backoff {
                base_ms: self.retry_backoff_ms,
                max_ms: self.max_backoff_ms,
            });
        }
        Ok(())
    }

    pub fn nats(&self) -> NatsConfig {
        NatsConfig {
            url: self.nats_url.clone(),
            queue: self.queue.clone(),
            consumer_name: self.consumer_name.clone(),
            dead_letter_queue: (!self.no_dead_letter).then(|| self.dead_letter_queue.clone()),
            max_deliver: self.max_deliver,
            max_ack_pending: i64::try_from(self.max_in_flight).unwrap_or(i64::MAX),
            ack_wait: Duration::from_secs(self.ack_wait_secs),
        }
    }

    pub fn consumer(&self) -> ConsumerConfig {
        ConsumerConfig {
            max_in_flight: self.max_in_flight,
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
        }
    }

    pub fn redelivery(&self) -> RedeliveryPolicy {
        RedeliveryPolicy {
            max_deliver: self.max_deliver,
            base_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            dead_letter: !self.no_dead_letter,
        }
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            max_connections: self.db_max_connections,
            connection_timeout_secs: self.db_connect_timeout_secs,
            ..DatabaseConfig::default()
        }
    }

    pub fn rules(&self) -> ContactRules {
        ContactRules {
            require_name: self.require_name,
        }
    }
}
