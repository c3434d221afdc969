//! Emergency contacts and the log of triggered emergency alerts.
//!
//! A patient has at most one primary contact. Marking a contact primary clears the flag on the
//! patient's other contacts in the same rewrite of the collection.

use crate::database::Database;
use crate::error::{HealthError, HealthResult};
use crate::store::{merge_fields, patched, Record};
use crate::timestamps::deserialize_optional_timestamp;
use crate::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const DEFAULT_EMERGENCY_MESSAGE: &str = "Emergency alert triggered";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: String,
    pub patient_id: String,
    pub name: String,
    #[serde(default)]
    pub relationship: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for EmergencyContact {
    const PROTECTED_FIELDS: &'static [&'static str] = &["id", "patient_id", "created_at"];
    const MODIFIED_FIELD: Option<&'static str> = Some("modified_at");

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Debug, Default)]
pub struct NewEmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub email: String,
    pub is_primary: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Active,
    Resolved,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmergencyEvent {
    pub id: String,
    pub patient_id: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    /// Whatever location fix was available when the alert fired.
    #[serde(default)]
    pub location_data: Map<String, Value>,
    #[serde(default)]
    pub contacted_numbers: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for EmergencyEvent {
    fn id(&self) -> &str {
        &self.id
    }
}

/// The text sent to emergency contacts.
///
/// Appends the last known address, and a map link when coordinates are present, unless the
/// location carries an `error`.
pub fn alert_message(
    patient_name: &str,
    location: &Map<String, Value>,
    custom: Option<&str>,
) -> String {
    let mut message = match custom.map(str::trim).filter(|m| !m.is_empty()) {
        Some(custom) => custom.to_owned(),
        None => format!("EMERGENCY ALERT: {patient_name} has triggered an emergency alert."),
    };

    if location.is_empty() || location.contains_key("error") {
        return message;
    }

    let address = location
        .get("address")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    message.push_str(&format!("\n\nLast known location: {address}"));

    if let (Some(lat), Some(lng)) = (
        location.get("latitude").and_then(Value::as_f64),
        location.get("longitude").and_then(Value::as_f64),
    ) {
        message.push_str(&format!("\nMap link: https://maps.google.com/?q={lat},{lng}"));
    }
    message
}

#[derive(Clone, Debug)]
pub struct EmergencyService {
    db: Arc<Database>,
}

impl EmergencyService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Adds a contact under the next `EC` id.
    ///
    /// # Errors
    ///
    /// Returns `HealthError::Text` if the name or phone number is blank.
    pub fn add_contact(
        &self,
        patient_id: &str,
        new: NewEmergencyContact,
    ) -> HealthResult<EmergencyContact> {
        let patient_id = NonEmptyText::new(patient_id)?.into_inner();
        let name = NonEmptyText::new(&new.name)?.into_inner();
        let phone = NonEmptyText::new(&new.phone)?.into_inner();

        let now = Utc::now();
        let contacts = &self.db.emergency_contacts;
        let contact = contacts.transact(|records| {
            let id = contacts.next_id(records);
            let contact = EmergencyContact {
                id,
                patient_id,
                name,
                relationship: new.relationship,
                phone,
                email: new.email,
                is_primary: new.is_primary,
                created_at: Some(now),
                modified_at: None,
                extra: Map::new(),
            };
            if contact.is_primary {
                clear_other_primaries(records, &contact.patient_id, &contact.id);
            }
            records.push(contact.clone());
            contact
        })?;

        tracing::info!("added emergency contact {} for {}", contact.id, contact.patient_id);
        Ok(contact)
    }

    pub fn contacts_for_patient(&self, patient_id: &str) -> HealthResult<Vec<EmergencyContact>> {
        Ok(self
            .db
            .emergency_contacts
            .filter(|c| c.patient_id == patient_id)?)
    }

    pub fn primary_contact(&self, patient_id: &str) -> HealthResult<Option<EmergencyContact>> {
        Ok(self
            .db
            .emergency_contacts
            .find(|c| c.patient_id == patient_id && c.is_primary)?)
    }

    /// Merges `patch` into the contact. Returns `None` if there is no such contact.
    pub fn update_contact(
        &self,
        id: &str,
        patch: &Map<String, Value>,
    ) -> HealthResult<Option<EmergencyContact>> {
        Ok(self.db.emergency_contacts.mutate(|records| {
            let Some(index) = records.iter().position(|c| c.id == id) else {
                return Ok(None);
            };

            let updated = patched(&records[index], |object| {
                merge_fields(object, patch, EmergencyContact::PROTECTED_FIELDS);
                Ok(())
            })?;
            if updated.is_primary {
                clear_other_primaries(records, &updated.patient_id, &updated.id);
            }
            records[index] = updated.clone();
            Ok(Some(updated))
        })?)
    }

    pub fn delete_contact(&self, id: &str) -> HealthResult<bool> {
        Ok(self.db.emergency_contacts.delete(id)?)
    }

    /// Records that an emergency alert fired for `patient_id`.
    pub fn log_event(
        &self,
        patient_id: &str,
        location_data: Map<String, Value>,
        contacted_numbers: Vec<String>,
        message: Option<String>,
    ) -> HealthResult<EmergencyEvent> {
        let patient_id = NonEmptyText::new(patient_id)?.into_inner();
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EMERGENCY_MESSAGE.to_owned());

        let now = Utc::now();
        let event = self.db.emergency_events.create(|id| EmergencyEvent {
            id,
            patient_id,
            timestamp: Some(now),
            location_data,
            contacted_numbers,
            message,
            status: EventStatus::Active,
            resolved_at: None,
            extra: Map::new(),
        })?;

        tracing::warn!("emergency event {} logged for {}", event.id, event.patient_id);
        Ok(event)
    }

    /// Events for a patient, most recent first.
    pub fn events_for_patient(&self, patient_id: &str) -> HealthResult<Vec<EmergencyEvent>> {
        let mut events = self
            .db
            .emergency_events
            .filter(|e| e.patient_id == patient_id)?;
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }

    /// Marks an event resolved.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::RecordNotFound`] if there is no such event.
    pub fn resolve_event(&self, id: &str) -> HealthResult<EmergencyEvent> {
        let now = Utc::now();
        self.db
            .emergency_events
            .modify(id, |event| {
                if event.status != EventStatus::Resolved {
                    event.status = EventStatus::Resolved;
                    event.resolved_at = Some(now);
                }
                event.clone()
            })?
            .ok_or_else(|| HealthError::RecordNotFound {
                collection: "emergency_events",
                id: id.to_owned(),
            })
    }
}

fn clear_other_primaries(records: &mut [EmergencyContact], patient_id: &str, keep_id: &str) {
    for other in records
        .iter_mut()
        .filter(|c| c.patient_id == patient_id && c.id != keep_id && c.is_primary)
    {
        other.is_primary = false;
    }
}
