//! Diesel implementation of the contact store.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use super::database::Database;
use super::schema::contatos;
use crate::contact::Contact;
use crate::store::{ContactStore, StoreError};

/// Row shape of `contatos` without the generated id.
#[derive(Debug, PartialEq, Eq, Insertable)]
#[diesel(table_name = contatos)]
pub struct NewContactRow<'a> {
    pub nome: &'a str,
    pub telefone: Option<&'a str>,
    pub email: Option<&'a str>,
    pub ddd: Option<&'a str>,
    pub regiao: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

impl<'a> From<&'a Contact> for NewContactRow<'a> {
    fn from(contact: &'a Contact) -> Self {
        Self {
            nome: &contact.name,
            telefone: contact.phone.as_deref(),
            email: contact.email.as_deref(),
            ddd: contact.area_code.as_deref(),
            regiao: contact.region.as_deref(),
            created_at: contact.created_at.naive_utc(),
        }
    }
}

/// Each insert checks out its own pooled connection and returns it when the
/// call ends.
#[derive(Clone)]
pub struct DieselContactStore {
    database: Database,
}

impl DieselContactStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl ContactStore for DieselContactStore {
    fn insert(&self, contact: &Contact) -> Result<(), StoreError> {
        let mut conn = self
            .database
            .get_connection()
            .map_err(|e| StoreError::new(format!("database pool error: {}", e)))?;

        diesel::insert_into(contatos::table)
            .values(NewContactRow::from(contact))
            .execute(&mut conn)
            .map_err(|e| StoreError::new(format!("database error: {}", e)))?;

        tracing::debug!(
            name = %contact.name,
            phone = ?contact.phone,
            email = ?contact.email,
            area_code = ?contact.area_code,
            region = ?contact.region,
            created_at = %contact.created_at,
            "Inserted contact row"
        );
        Ok(())
    }
}
