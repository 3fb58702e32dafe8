//! Persisted contact record.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A contact ready to be inserted.
///
/// `created_at` is always assigned by the pipeline when the entity is built,
/// never read from the incoming payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub area_code: Option<String>,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    /// True when the name is empty or whitespace only.
    pub fn is_missing_name(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// True when an area code is present and made of 2 or 3 ASCII digits.
    pub fn has_valid_area_code(&self) -> bool {
        match self.area_code.as_deref() {
            Some(code) => (2..=3).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }
}
