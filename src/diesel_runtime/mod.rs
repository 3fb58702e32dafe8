//! Diesel ORM runtime infrastructure
//!
//! Connection pooling, the `contatos` table and the Diesel-backed
//! [`ContactStore`](crate::store::ContactStore).
//!
//! # Features
//!
//! - `postgres` (default): PostgreSQL backend
//! - `mysql`: MySQL backend

pub mod contact_store;
pub mod database;
pub mod schema;

#[cfg(not(any(feature = "postgres", feature = "mysql")))]
compile_error!("enable either the `postgres` or the `mysql` feature");

// Re-export key types
pub use contact_store::{DieselContactStore, NewContactRow};
pub use database::{Database, DatabaseConfig, DbConnection, Pool, PooledConnection};
