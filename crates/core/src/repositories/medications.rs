//! Medication schedules.
//!
//! The prescription details live in a nested `data` object; updates merge into it.

use crate::database::Database;
use crate::error::{HealthResult, StoreError};
use crate::store::{merge_fields, Record};
use crate::timestamps::{deserialize_optional_date, deserialize_optional_timestamp};
use crate::NonEmptyText;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// When in the day a dose is taken, stored as its display label.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Bedtime,
    WithMeals,
    BeforeMeals,
    AfterMeals,
    Other(String),
}

impl DayPart {
    pub fn label(&self) -> &str {
        match self {
            DayPart::Morning => "Morning",
            DayPart::Afternoon => "Afternoon",
            DayPart::Evening => "Evening",
            DayPart::Bedtime => "Before bed",
            DayPart::WithMeals => "With meals",
            DayPart::BeforeMeals => "Before meals",
            DayPart::AfterMeals => "After meals",
            DayPart::Other(label) => label,
        }
    }
}

impl From<String> for DayPart {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Morning" => DayPart::Morning,
            "Afternoon" => DayPart::Afternoon,
            "Evening" => DayPart::Evening,
            "Before bed" | "Bedtime" => DayPart::Bedtime,
            "With meals" => DayPart::WithMeals,
            "Before meals" => DayPart::BeforeMeals,
            "After meals" => DayPart::AfterMeals,
            _ => DayPart::Other(label),
        }
    }
}

impl From<DayPart> for String {
    fn from(part: DayPart) -> Self {
        match part {
            DayPart::Other(label) => label,
            known => known.label().to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MedicationStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationData {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub timing: BTreeSet<DayPart>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<NaiveDate>,
    /// `None` for an open-ended course.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instructions: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default)]
    pub status: MedicationStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MedicationData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub patient_id: String,
    pub data: MedicationData,
    #[serde(default)]
    pub created_by: String,
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
}

impl Record for Medication {
    const PROTECTED_FIELDS: &'static [&'static str] = &["id", "patient_id", "created_at"];
    const MODIFIED_FIELD: Option<&'static str> = Some("modified_at");

    fn id(&self) -> &str {
        &self.id
    }
}

impl Medication {
    pub fn is_active(&self) -> bool {
        self.data.status == MedicationStatus::Active
    }
}

#[derive(Clone, Debug)]
pub struct MedicationService {
    db: Arc<Database>,
}

impl MedicationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn add(
        &self,
        patient_id: &str,
        data: MedicationData,
        created_by: &str,
    ) -> HealthResult<Medication> {
        let patient_id = NonEmptyText::new(patient_id)?;
        NonEmptyText::new(&data.name)?;

        let now = Utc::now();
        let medication = self.db.medications.create(|id| Medication {
            id,
            patient_id: patient_id.into_inner(),
            data,
            created_by: created_by.to_owned(),
            created_at: Some(now),
            modified_at: None,
        })?;
        tracing::info!(
            "added medication {} for {}",
            medication.id,
            medication.patient_id
        );
        Ok(medication)
    }

    pub fn for_patient(&self, patient_id: &str) -> HealthResult<Vec<Medication>> {
        Ok(self.db.medications.filter(|m| m.patient_id == patient_id)?)
    }

    pub fn active_for_patient(&self, patient_id: &str) -> HealthResult<Vec<Medication>> {
        Ok(self
            .db
            .medications
            .filter(|m| m.patient_id == patient_id && m.is_active())?)
    }

    pub fn get(&self, id: &str) -> HealthResult<Option<Medication>> {
        Ok(self.db.medications.get(id)?)
    }

    /// Merges `patch` into the medication's `data` object and stamps `modified_at`.
    ///
    /// Returns `None` if there is no such medication.
    pub fn update(&self, id: &str, patch: &Map<String, Value>) -> HealthResult<Option<Medication>> {
        Ok(self.db.medications.update_with(id, |object| {
            match object.get_mut("data") {
                Some(Value::Object(data)) => merge_fields(data, patch, &[]),
                _ => {
                    return Err(StoreError::InvalidPatch(format!(
                        "medication {id} has no data object"
                    )))
                }
            }
            Ok(())
        })?)
    }

    pub fn delete(&self, id: &str) -> HealthResult<bool> {
        Ok(self.db.medications.delete(id)?)
    }
}
