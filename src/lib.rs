//! # Contact consumer
//!
//! Background worker that consumes "create contact" messages from a durable
//! NATS JetStream queue and persists them with Diesel. A message is
//! acknowledged only after its row is written.
//!
//! ## Pipeline
//!
//! ```text
//! JetStream delivery
//!   -> Envelope::parse          {"message": <payload>}
//!   -> ContactDto::from_json    case-insensitive keys
//!   -> Contact                  created_at stamped here
//!   -> ContactService           normalize, derive region, rules
//!   -> ContactStore::insert     one row in `contatos`
//!   -> ack | nak(backoff) | dead-letter | term
//! ```
//!
//! ## Example message
//!
//! ```json
//! {"message": "{\"Nome\":\"Ana\",\"Telefone\":\"11999999999\",\"Email\":\"ana@x.com\",\"Ddd\":\"11\",\"Regiao\":\"SP\"}"}
//! ```

// Domain
pub mod contact;
pub mod service;
pub mod store;

// Message processing
pub mod pipeline;

// Diesel ORM runtime infrastructure
pub mod diesel_runtime;

// NATS JetStream integration
pub mod nats;

// Process wiring
pub mod config;
pub mod telemetry;
pub mod worker;

// Re-export key types
pub use contact::{Contact, ContactDto};
pub use service::{ContactRules, ContactService, ServiceError, ValidationError};
pub use store::{ContactStore, StoreError};

pub use pipeline::{parse_contact, ContactPipeline, Disposition, ProcessingError, RedeliveryPolicy};

pub use diesel_runtime::{Database, DatabaseConfig, DieselContactStore};

pub use nats::{
    BrokerError, ConsumerConfig, DeadLetter, DeadLetterSink, Delivery, DeliveryHandler, Envelope,
    NatsClient, NatsConfig, QueueConsumer,
};

pub use config::WorkerConfig;
