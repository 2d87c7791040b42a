//! Onboarding DB: SurrealDB connection management and the
//! database-backed [`DocumentStore`](onboard_core::DocumentStore).
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The document store ([`SurrealDocumentStore`])
//! - Error types ([`DbError`])

mod connection;
mod error;
mod schema;
mod store;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::run_migrations;
pub use store::SurrealDocumentStore;
