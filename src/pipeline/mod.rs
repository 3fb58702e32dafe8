//! Per-message processing pipeline.
//!
//! decode → unwrap envelope → deserialize DTO → map entity → service → store.
//! Nothing in here talks to the broker; the consumer turns the outcome into an
//! acknowledgement decision through [`RedeliveryPolicy`].

pub mod redelivery;

pub use redelivery::{Disposition, RedeliveryPolicy};

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::contact::{Contact, ContactDto, DtoError};
use crate::nats::message_envelope::Envelope;
use crate::service::{ContactRules, ContactService, ServiceError, ValidationError};
use crate::store::{ContactStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("message body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("envelope has no '{}' property", Envelope::FIELD)]
    MissingMessage,

    #[error(transparent)]
    InvalidPayload(#[from] DtoError),

    #[error("payload contains no contact object")]
    EmptyPayload,

    #[error("contact rejected: {0}")]
    Rejected(ValidationError),

    #[error(transparent)]
    Persistence(StoreError),
}

impl ProcessingError {
    /// Permanent failures fail the same way on every redelivery.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, ProcessingError::Persistence(_))
    }
}

impl From<ServiceError> for ProcessingError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Rejected(v) => ProcessingError::Rejected(v),
            ServiceError::Store(s) => ProcessingError::Persistence(s),
        }
    }
}

/// Turn a raw message body into a contact stamped with `created_at`.
pub fn parse_contact(payload: &[u8], created_at: DateTime<Utc>) -> Result<Contact, ProcessingError> {
    let text = std::str::from_utf8(payload)?;
    tracing::debug!(body = text, "Message received");

    let inner = match Envelope::parse(text) {
        Envelope::Valid(inner) => inner,
        Envelope::MissingField => return Err(ProcessingError::MissingMessage),
        Envelope::Malformed(reason) => return Err(ProcessingError::MalformedEnvelope(reason)),
    };

    let dto = ContactDto::from_json(&inner)?.ok_or(ProcessingError::EmptyPayload)?;
    Ok(dto.into_entity(created_at))
}

/// Shared by every delivery task.
#[derive(Clone)]
pub struct ContactPipeline {
    store: Arc<dyn ContactStore>,
    rules: ContactRules,
}

impl ContactPipeline {
    pub fn new(store: Arc<dyn ContactStore>, rules: ContactRules) -> Self {
        Self { store, rules }
    }

    /// Run one message through the pipeline and return the stored contact.
    ///
    /// The service is built for this message only and the blocking store call
    /// runs on tokio's blocking pool.
    pub async fn process(&self, payload: &[u8]) -> Result<Contact, ProcessingError> {
        let contact = parse_contact(payload, Utc::now())?;
        let service = ContactService::new(Arc::clone(&self.store), self.rules);

        let saved = tokio::task::spawn_blocking(move || service.save_contact(contact))
            .await
            .map_err(|e| ProcessingError::Persistence(StoreError::new(format!("store task failed: {}", e))))??;

        Ok(saved)
    }
}
