//! Persistence seam for contacts.

use crate::contact::Contact;

/// The single failure class a store reports.
///
/// Connectivity problems, constraint violations and malformed data all end up
/// here; callers must not assume any of them is retryable on its own.
#[derive(Debug, thiserror::Error)]
#[error("persistence failed: {message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Insert-only contact storage.
///
/// Every call is its own unit of work: implementations acquire whatever
/// connection they need inside `insert` and release it before returning.
#[cfg_attr(test, mockall::automock)]
pub trait ContactStore: Send + Sync {
    /// Insert exactly one row. No upsert, no existence check.
    fn insert(&self, contact: &Contact) -> Result<(), StoreError>;
}
