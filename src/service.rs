//! Contact business rules.
//!
//! The service sits between the consumer and the store. It normalizes the
//! entity, fills in the region from the area code and optionally rejects
//! incomplete contacts. Store failures are propagated untouched so the
//! consumer can decide between ack and redelivery.

use std::sync::Arc;

use crate::contact::{region_for_area_code, Contact};
use crate::store::{ContactStore, StoreError};

/// Rules applied before persisting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactRules {
    /// Reject contacts with an empty name or a malformed area code instead of
    /// storing them with a warning.
    pub require_name: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("contact name is missing or empty")]
    MissingName,

    #[error("area code '{0}' must have 2 or 3 digits")]
    InvalidAreaCode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("contact rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ContactService {
    store: Arc<dyn ContactStore>,
    rules: ContactRules,
}

impl ContactService {
    pub fn new(store: Arc<dyn ContactStore>, rules: ContactRules) -> Self {
        Self { store, rules }
    }

    /// Apply the rules and insert the contact.
    ///
    /// Returns the contact as it was written.
    pub fn save_contact(&self, contact: Contact) -> Result<Contact, ServiceError> {
        let contact = normalize(contact);
        self.check(&contact)?;

        self.store.insert(&contact)?;
        Ok(contact)
    }

    fn check(&self, contact: &Contact) -> Result<(), ValidationError> {
        if contact.is_missing_name() {
            if self.rules.require_name {
                return Err(ValidationError::MissingName);
            }
            tracing::warn!(phone = ?contact.phone, "Contact has no name, storing it anyway");
        }

        if let Some(code) = contact.area_code.as_deref() {
            if !contact.has_valid_area_code() {
                if self.rules.require_name {
                    return Err(ValidationError::InvalidAreaCode(code.to_string()));
                }
                tracing::warn!(area_code = code, "Area code is not 2-3 digits");
            }
        }

        Ok(())
    }
}

/// Trim text fields, keep only digits in the area code and derive the region
/// when none was supplied.
fn normalize(contact: Contact) -> Contact {
    let area_code = clean(contact.area_code).and_then(|code| {
        let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
        (!digits.is_empty()).then_some(digits)
    });
    let region = clean(contact.region).or_else(|| {
        area_code
            .as_deref()
            .and_then(region_for_area_code)
            .map(String::from)
    });

    Contact {
        name: contact.name.trim().to_string(),
        phone: clean(contact.phone),
        email: clean(contact.email),
        area_code,
        region,
        created_at: contact.created_at,
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
