//! The set of collections backing one HealthAssist data directory.

use crate::config::CoreConfig;
use crate::constants::{
    BUDDY_FILENAME, EMERGENCY_CONTACTS, EMERGENCY_EVENTS, HEALTH_RECORDS, MEDICATIONS,
    NOTIFICATIONS_FILENAME, PATIENTS, USERS, WELLNESS_FILENAME,
};
use crate::error::StoreResult;
use crate::repositories::buddy::BuddyProfile;
use crate::repositories::emergency::{EmergencyContact, EmergencyEvent};
use crate::repositories::health_records::HealthRecord;
use crate::repositories::medications::Medication;
use crate::repositories::notifications::Notification;
use crate::repositories::patients::Patient;
use crate::repositories::users::{seed_users, User};
use crate::repositories::wellness::WellnessProfile;
use crate::store::{JsonCollection, KeyedCollection};
use std::sync::Arc;

/// Every collection of one data directory.
///
/// Services share a `Database` through an `Arc` so that all writers of a collection go through
/// the same lock.
#[derive(Debug)]
pub struct Database {
    cfg: Arc<CoreConfig>,
    pub(crate) users: JsonCollection<User>,
    pub(crate) patients: JsonCollection<Patient>,
    pub(crate) health_records: JsonCollection<HealthRecord>,
    pub(crate) medications: JsonCollection<Medication>,
    pub(crate) emergency_contacts: JsonCollection<EmergencyContact>,
    pub(crate) emergency_events: JsonCollection<EmergencyEvent>,
    pub(crate) notifications: KeyedCollection<Vec<Notification>>,
    pub(crate) buddies: KeyedCollection<BuddyProfile>,
    pub(crate) wellness: KeyedCollection<WellnessProfile>,
}

impl Database {
    pub fn open(cfg: Arc<CoreConfig>) -> Arc<Self> {
        let dir = cfg.data_dir();
        Arc::new(Self {
            users: JsonCollection::new(dir, USERS).with_seed(seed_users),
            patients: JsonCollection::new(dir, PATIENTS),
            health_records: JsonCollection::new(dir, HEALTH_RECORDS),
            medications: JsonCollection::new(dir, MEDICATIONS),
            emergency_contacts: JsonCollection::new(dir, EMERGENCY_CONTACTS),
            emergency_events: JsonCollection::new(dir, EMERGENCY_EVENTS),
            notifications: KeyedCollection::new(dir, NOTIFICATIONS_FILENAME),
            buddies: KeyedCollection::new(dir, BUDDY_FILENAME),
            wellness: KeyedCollection::new(dir, WELLNESS_FILENAME),
            cfg,
        })
    }

    pub fn cfg(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Loads every collection once, creating missing files.
    ///
    /// Intended for startup, so that a corrupt file is reported before the first request.
    pub fn initialise(&self) -> StoreResult<()> {
        self.users.load_or_init()?;
        self.patients.load_or_init()?;
        self.health_records.load_or_init()?;
        self.medications.load_or_init()?;
        self.emergency_contacts.load_or_init()?;
        self.emergency_events.load_or_init()?;
        self.notifications.load_or_init()?;
        self.buddies.load_or_init()?;
        self.wellness.load_or_init()?;
        Ok(())
    }
}
