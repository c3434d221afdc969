//! Repository services, one per logical table.
//!
//! Each service wraps a shared [`Database`](crate::Database) and exposes the operations of its
//! entity. Foreign keys between entities (`patient_id`, `user_id`) are stored as given and never
//! checked for existence.

pub mod buddy;
pub mod emergency;
pub mod health_records;
pub mod medications;
pub mod notifications;
pub mod patients;
pub mod users;
pub mod wellness;
