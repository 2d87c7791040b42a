//! Domain models for the onboarding engine.
//!
//! Every document stored by the engine has a typed shape here. Fields
//! written by older portal versions are accepted through serde aliases
//! and defaults so that reads never fail on legacy documents.

pub mod admin;
pub mod admin_record;
pub mod allowlist;
pub mod appointment;
pub mod employee_id;
pub mod notification;
pub mod principal;
pub mod profile;
pub mod shift;
pub mod step;
