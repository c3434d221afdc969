//! Clinical notes, prescriptions, and results attached to a patient.
//!
//! Records are append-only: there is no update or delete.

use crate::database::Database;
use crate::error::HealthResult;
use crate::store::Record;
use crate::timestamps::deserialize_optional_timestamp;
use crate::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// The kind of a health record, stored as its display label.
///
/// Labels outside the known set survive a load and save unchanged as [`RecordType::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    Consultation,
    Prescription,
    LabResult,
    TreatmentPlan,
    VitalSigns,
    Other(String),
}

impl RecordType {
    pub fn label(&self) -> &str {
        match self {
            RecordType::Consultation => "Consultation",
            RecordType::Prescription => "Prescription",
            RecordType::LabResult => "Lab Result",
            RecordType::TreatmentPlan => "Treatment Plan",
            RecordType::VitalSigns => "Vital Signs",
            RecordType::Other(label) => label,
        }
    }
}

impl From<String> for RecordType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Consultation" => RecordType::Consultation,
            "Prescription" => RecordType::Prescription,
            "Lab Result" => RecordType::LabResult,
            "Treatment Plan" => RecordType::TreatmentPlan,
            "Vital Signs" => RecordType::VitalSigns,
            _ => RecordType::Other(label),
        }
    }
}

impl From<&str> for RecordType {
    fn from(label: &str) -> Self {
        RecordType::from(label.to_owned())
    }
}

impl From<RecordType> for String {
    fn from(kind: RecordType) -> Self {
        match kind {
            RecordType::Other(label) => label,
            known => known.label().to_owned(),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(rename = "type")]
    pub kind: RecordType,
    /// Free-form payload; its shape depends on `kind`.
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub created_by: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for HealthRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Debug)]
pub struct HealthRecordService {
    db: Arc<Database>,
}

impl HealthRecordService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Appends a record under the next `REC` id. `patient_id` is not checked for existence.
    pub fn add(
        &self,
        patient_id: &str,
        kind: RecordType,
        data: Map<String, Value>,
        created_by: &str,
    ) -> HealthResult<HealthRecord> {
        let patient_id = NonEmptyText::new(patient_id)?;
        let now = Utc::now();
        let record = self.db.health_records.create(|id| HealthRecord {
            id,
            patient_id: patient_id.into_inner(),
            kind,
            data,
            created_by: created_by.to_owned(),
            created_at: Some(now),
            extra: Map::new(),
        })?;
        tracing::info!("added {} record {} for {}", record.kind, record.id, record.patient_id);
        Ok(record)
    }

    pub fn for_patient(&self, patient_id: &str) -> HealthResult<Vec<HealthRecord>> {
        Ok(self
            .db
            .health_records
            .filter(|r| r.patient_id == patient_id)?)
    }

    pub fn get(&self, id: &str) -> HealthResult<Option<HealthRecord>> {
        Ok(self.db.health_records.get(id)?)
    }

    pub fn list(&self) -> HealthResult<Vec<HealthRecord>> {
        Ok(self.db.health_records.list()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::test_db;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_record_type_labels_round_trip() {
        let kind: RecordType = serde_json::from_value(json!("Lab Result")).expect("deserialize");
        assert_eq!(kind, RecordType::LabResult);
        assert_eq!(
            serde_json::to_value(&kind).expect("serialize"),
            json!("Lab Result")
        );

        let other: RecordType = serde_json::from_value(json!("Imaging")).expect("deserialize");
        assert_eq!(other, RecordType::Other("Imaging".into()));
        assert_eq!(serde_json::to_value(&other).expect("serialize"), json!("Imaging"));
    }

    #[test]
    fn test_add_and_list_for_patient() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let records = HealthRecordService::new(test_db(temp_dir.path()));

        let data = json!({ "notes": "Routine check" });
        let first = records
            .add(
                "PT0001",
                RecordType::Consultation,
                data.as_object().cloned().unwrap_or_default(),
                "doctor",
            )
            .expect("add should succeed");
        assert_eq!(first.id, "REC0001");

        records
            .add("PT0002", RecordType::VitalSigns, Map::new(), "doctor")
            .expect("add should succeed");
        records
            .add("PT0001", RecordType::LabResult, Map::new(), "doctor")
            .expect("add should succeed");

        let for_patient = records.for_patient("PT0001").expect("for_patient should succeed");
        let ids: Vec<&str> = for_patient.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["REC0001", "REC0003"]);
        assert_eq!(for_patient[0].data.get("notes"), Some(&json!("Routine check")));

        assert!(records.get("REC0404").expect("get should succeed").is_none());
    }
}
