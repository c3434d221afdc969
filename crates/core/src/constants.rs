//! Constants used throughout the HealthAssist core crate.
//!
//! Collection file names and keys live here so the on-disk layout is defined in one place.

use crate::store::CollectionSpec;

/// Default directory for collection files when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = ".";

/// Maximum number of notifications created for one user on one day.
pub const DEFAULT_DAILY_NOTIFICATION_CAP: usize = 5;

/// Maximum number of scheduled reminders created by a single generation run.
pub const DEFAULT_REMINDERS_PER_RUN: usize = 2;

/// Number of buddy chat messages kept per user.
pub const DEFAULT_MESSAGE_HISTORY_LIMIT: usize = 50;

/// Top-level key of every per-username keyed collection file.
pub const KEYED_COLLECTION_KEY: &str = "users";

pub const USERS: CollectionSpec = CollectionSpec::new("users_db.json", "users", "");

pub const PATIENTS: CollectionSpec = CollectionSpec::new("patients_db.json", "patients", "PT");

pub const HEALTH_RECORDS: CollectionSpec =
    CollectionSpec::new("health_records_db.json", "records", "REC");

pub const MEDICATIONS: CollectionSpec =
    CollectionSpec::new("medications_db.json", "medications", "MED");

pub const EMERGENCY_CONTACTS: CollectionSpec =
    CollectionSpec::new("emergency_contacts_db.json", "contacts", "EC");

pub const EMERGENCY_EVENTS: CollectionSpec =
    CollectionSpec::new("emergency_events_db.json", "events", "EM");

/// Filename for per-user notification lists.
pub const NOTIFICATIONS_FILENAME: &str = "notifications_db.json";

/// Filename for per-user health buddy profiles.
pub const BUDDY_FILENAME: &str = "buddy_data.json";

/// Filename for per-user wellness score series.
pub const WELLNESS_FILENAME: &str = "wellness_data.json";

/// Number of current notifications returned when the caller sets no limit.
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 10;
