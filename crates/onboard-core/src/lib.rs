//! Onboarding Core: Domain models, store and identity traits, and the
//! error taxonomy shared by every crate in the workspace.

pub mod error;
pub mod identity;
pub mod models;
pub mod store;

pub use error::{LinkError, OnboardError, OnboardResult, StepError};
pub use store::{Collection, DocumentStore, DocumentStoreExt};
