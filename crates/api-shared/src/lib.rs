//! # API Shared
//!
//! Shared utilities and definitions for HealthAssist APIs.
//!
//! Contains:
//! - Request and response bodies with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - API key validation
//!
//! Used by `api-rest` and the workspace binary.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{validate_api_key, ApiKeyError, API_KEY_HEADER};
pub use dto::*;
pub use health::HealthService;
