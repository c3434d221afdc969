//! Patient demographics and clinical summary.

use crate::database::Database;
use crate::error::{HealthError, HealthResult};
use crate::metrics::{bmi, Bmi};
use crate::store::Record;
use crate::timestamps::deserialize_optional_timestamp;
use crate::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A scheduled visit. `date` is kept as written; reminders parse it leniently.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(default)]
    pub date: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub doctor: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gender: String,
    /// Centimetres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Kilograms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub blood_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contact: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub emergency_contact: String,
    #[serde(default, deserialize_with = "string_list")]
    pub medical_history: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub medications: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub allergies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub appointments: Vec<Appointment>,
    /// Username of the linked patient account, if any.
    #[serde(default)]
    pub user_id: Option<String>,
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

impl Record for Patient {
    const MODIFIED_FIELD: Option<&'static str> = Some("modified_at");

    fn id(&self) -> &str {
        &self.id
    }
}

impl Patient {
    /// Whether any medical history entry mentions `needle`, case-insensitively.
    pub fn has_condition(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.medical_history
            .iter()
            .any(|entry| entry.to_lowercase().contains(&needle))
    }
}

/// Accepts either a list of strings or a single newline-separated string.
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
        Other(Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::List(items)) => items,
        Some(Raw::Text(text)) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Raw::Other(_)) | None => Vec::new(),
    })
}

/// Input for [`PatientService::create`].
#[derive(Clone, Debug, Default)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<u32>,
    pub gender: String,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub blood_type: String,
    pub contact: String,
    pub email: String,
    pub address: String,
    pub emergency_contact: String,
    pub medical_history: Vec<String>,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
    pub appointments: Vec<Appointment>,
    pub user_id: Option<String>,
}

impl NewPatient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct PatientService {
    db: Arc<Database>,
}

impl PatientService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Stores a new patient under the next `PT` id.
    ///
    /// # Errors
    ///
    /// Returns `HealthError::Text` for a blank name and [`HealthError::InvalidInput`] for a
    /// non-positive height or weight.
    pub fn create(&self, new: NewPatient) -> HealthResult<Patient> {
        let name = NonEmptyText::new(&new.name)?;
        for (field, value) in [("height", new.height), ("weight", new.weight)] {
            if value.is_some_and(|v| !v.is_finite() || v <= 0.0) {
                return Err(HealthError::InvalidInput(format!("{field} must be positive")));
            }
        }

        let now = Utc::now();
        let patient = self.db.patients.create(|id| Patient {
            id,
            name: name.into_inner(),
            age: new.age,
            gender: new.gender,
            height: new.height,
            weight: new.weight,
            blood_type: new.blood_type,
            contact: new.contact,
            email: new.email,
            address: new.address,
            emergency_contact: new.emergency_contact,
            medical_history: new.medical_history,
            medications: new.medications,
            allergies: new.allergies,
            appointments: new.appointments,
            user_id: new.user_id.filter(|u| !u.trim().is_empty()),
            created_at: Some(now),
            modified_at: None,
            extra: Map::new(),
        })?;

        tracing::info!("created patient {}", patient.id);
        Ok(patient)
    }

    pub fn get(&self, id: &str) -> HealthResult<Option<Patient>> {
        Ok(self.db.patients.get(id)?)
    }

    pub fn list(&self) -> HealthResult<Vec<Patient>> {
        Ok(self.db.patients.list()?)
    }

    /// The patient record linked to a user account.
    pub fn find_by_user(&self, username: &str) -> HealthResult<Option<Patient>> {
        Ok(self
            .db
            .patients
            .find(|p| p.user_id.as_deref() == Some(username))?)
    }

    pub fn update(&self, id: &str, patch: &Map<String, Value>) -> HealthResult<Option<Patient>> {
        Ok(self.db.patients.update(id, patch)?)
    }

    /// BMI from the patient's stored height and weight.
    ///
    /// `Ok(None)` when either measurement is missing.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::RecordNotFound`] if there is no such patient.
    pub fn bmi(&self, id: &str) -> HealthResult<Option<Bmi>> {
        let patient = self.get(id)?.ok_or_else(|| HealthError::RecordNotFound {
            collection: "patients",
            id: id.to_owned(),
        })?;

        Ok(match (patient.height, patient.weight) {
            (Some(height), Some(weight)) => bmi(height, weight),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::test_db;
    use crate::metrics::BmiCategory;
    use serde_json::json;
    use tempfile::TempDir;

    fn service(dir: &std::path::Path) -> PatientService {
        PatientService::new(test_db(dir))
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = service(temp_dir.path());

        let mut new = NewPatient::new("Jane Doe");
        new.age = Some(30);
        new.allergies = vec!["Penicillin".into()];
        let first = patients.create(new).expect("create should succeed");
        assert_eq!(first.id, "PT0001");

        let second = patients
            .create(NewPatient::new("John Roe"))
            .expect("create should succeed");
        assert_eq!(second.id, "PT0002");

        let stored = patients
            .get("PT0001")
            .expect("get should succeed")
            .expect("patient should exist");
        assert_eq!(stored.name, "Jane Doe");
        assert_eq!(stored.age, Some(30));
        assert_eq!(stored.allergies, vec!["Penicillin".to_string()]);
    }

    #[test]
    fn test_create_rejects_blank_name_and_bad_measurements() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = service(temp_dir.path());

        assert!(matches!(
            patients.create(NewPatient::new("  ")),
            Err(HealthError::Text(_))
        ));

        let mut new = NewPatient::new("A");
        new.height = Some(0.0);
        assert!(matches!(
            patients.create(new),
            Err(HealthError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_partial_update_changes_only_supplied_fields() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = service(temp_dir.path());

        let mut new = NewPatient::new("A");
        new.age = Some(30);
        patients.create(new).expect("create should succeed");

        let patch = json!({ "age": 31 });
        let updated = patients
            .update("PT0001", patch.as_object().expect("object"))
            .expect("update should succeed")
            .expect("patient should exist");

        assert_eq!(updated.name, "A");
        assert_eq!(updated.age, Some(31));
        assert!(updated.modified_at.is_some());
    }

    #[test]
    fn test_missing_patient_is_none() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = service(temp_dir.path());

        assert!(patients.get("PT0099").expect("get should succeed").is_none());
        assert!(patients
            .find_by_user("nobody")
            .expect("find should succeed")
            .is_none());
    }

    #[test]
    fn test_find_by_user() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = service(temp_dir.path());

        patients
            .create(NewPatient::new("Unlinked"))
            .expect("create should succeed");
        let mut linked = NewPatient::new("Jane Doe");
        linked.user_id = Some("patient".into());
        patients.create(linked).expect("create should succeed");

        let found = patients
            .find_by_user("patient")
            .expect("find should succeed")
            .expect("linked patient should exist");
        assert_eq!(found.id, "PT0002");
    }

    #[test]
    fn test_bmi_for_stored_patient() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = service(temp_dir.path());

        let mut new = NewPatient::new("A");
        new.height = Some(170.0);
        new.weight = Some(70.0);
        patients.create(new).expect("create should succeed");
        patients
            .create(NewPatient::new("No measurements"))
            .expect("create should succeed");

        let result = patients
            .bmi("PT0001")
            .expect("bmi should succeed")
            .expect("bmi should be computed");
        assert_eq!(result.value, 24.22);
        assert_eq!(result.category, BmiCategory::NormalWeight);

        assert!(patients.bmi("PT0002").expect("bmi should succeed").is_none());
        assert!(matches!(
            patients.bmi("PT0404"),
            Err(HealthError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_legacy_newline_lists_are_split() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(
            temp_dir.path().join("patients_db.json"),
            r#"{"patients": [{"id": "PT0001", "name": "A", "medical_history": "Diabetes\nAsthma\n", "user_id": null}]}"#,
        )
        .expect("should write");

        let patient = service(temp_dir.path())
            .get("PT0001")
            .expect("get should succeed")
            .expect("patient should exist");
        assert_eq!(patient.medical_history, vec!["Diabetes", "Asthma"]);
        assert!(patient.has_condition("diabetes"));
    }
}
