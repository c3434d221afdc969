//! # HealthAssist Core
//!
//! Core business logic for the HealthAssist care assistant.
//!
//! This crate contains pure data operations over the JSON document store:
//! - Users, patients, health records, medications and emergency contacts
//! - Per-user notifications, Health Buddy profiles and wellness histories
//! - Reminder generation with per-day de-duplication
//! - BMI, wellness scoring and synthetic health series
//!
//! **No API concerns**: HTTP servers, API keys and service wiring belong in `api-rest` or `api-shared`.

pub mod auth;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod metrics;
pub mod reminders;
pub mod repositories;
pub mod store;
pub mod timestamps;

pub use config::CoreConfig;
pub use database::Database;
pub use error::{HealthError, HealthResult, StoreError, StoreResult};
pub use healthassist_types::{EmailAddress, NonEmptyText, TextError, Username};
