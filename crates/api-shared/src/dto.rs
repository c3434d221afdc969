//! Request and response bodies for the HTTP API.
//!
//! Stored records (patients, medications, notifications and so on) are returned as the core
//! types serialise; only inputs and the few reshaped outputs are defined here.

use chrono::{DateTime, Utc};
use healthassist_core::metrics::{Bmi, HealthSample, WeeklySummary, WellnessSnapshot, MAX_SAMPLE_DAYS};
use healthassist_core::repositories::emergency::NewEmergencyContact;
use healthassist_core::repositories::medications::{DayPart, MedicationData};
use healthassist_core::repositories::patients::{Appointment, NewPatient};
use healthassist_core::repositories::users::{NewUser, Role, User};
use healthassist_core::repositories::wellness::WellnessUpdate;
use healthassist_core::timestamps::parse_date;
use healthassist_core::{HealthError, HealthResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct LoginReq {
    pub username: String,
    pub password: String,
}

/// A user account without its password hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserRes {
    pub username: String,
    pub role: String,
    pub name: String,
    pub email: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<User> for UserRes {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            role: user.role.to_string(),
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ListUsersRes {
    pub users: Vec<UserRes>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct RegisterUserReq {
    pub username: String,
    pub password: String,
    /// `admin`, `doctor` or `patient`. Defaults to `patient`.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl TryFrom<RegisterUserReq> for NewUser {
    type Error = HealthError;

    fn try_from(req: RegisterUserReq) -> HealthResult<Self> {
        let role = match req.role.as_deref() {
            None | Some("") => Role::Patient,
            Some(role) => role.parse()?,
        };
        Ok(NewUser {
            username: req.username,
            password: req.password,
            role,
            name: req.name,
            email: req.email,
        })
    }
}

// ============================================================================
// Patients
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct AppointmentReq {
    pub date: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub doctor: String,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreatePatientReq {
    pub name: String,
    pub age: Option<u32>,
    pub gender: String,
    /// Centimetres.
    pub height: Option<f64>,
    /// Kilograms.
    pub weight: Option<f64>,
    pub blood_type: String,
    pub contact: String,
    pub email: String,
    pub address: String,
    pub emergency_contact: String,
    pub medical_history: Vec<String>,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
    pub appointments: Vec<AppointmentReq>,
    pub user_id: Option<String>,
}

impl From<CreatePatientReq> for NewPatient {
    fn from(req: CreatePatientReq) -> Self {
        NewPatient {
            name: req.name,
            age: req.age,
            gender: req.gender,
            height: req.height,
            weight: req.weight,
            blood_type: req.blood_type,
            contact: req.contact,
            email: req.email,
            address: req.address,
            emergency_contact: req.emergency_contact,
            medical_history: req.medical_history,
            medications: req.medications,
            allergies: req.allergies,
            appointments: req
                .appointments
                .into_iter()
                .map(|a| Appointment {
                    date: a.date,
                    kind: a.kind,
                    doctor: a.doctor,
                })
                .collect(),
            user_id: req.user_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BmiRes {
    pub bmi: f64,
    pub category: String,
}

impl From<Bmi> for BmiRes {
    fn from(bmi: Bmi) -> Self {
        Self {
            bmi: bmi.value,
            category: bmi.category.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct AddRecordReq {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Map<String, Value>,
    pub created_by: String,
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct AddMedicationReq {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    /// Day-part labels such as `Morning` or `Before bed`.
    pub timing: Vec<String>,
    /// `YYYY-MM-DD`.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub instructions: String,
    pub notes: String,
    pub created_by: String,
}

impl TryFrom<AddMedicationReq> for MedicationData {
    type Error = HealthError;

    fn try_from(req: AddMedicationReq) -> HealthResult<Self> {
        let date = |raw: Option<String>, field: &str| -> HealthResult<_> {
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(raw) => parse_date(raw).map(Some).ok_or_else(|| {
                    HealthError::InvalidInput(format!("{field} must be YYYY-MM-DD, got '{raw}'"))
                }),
            }
        };

        let mut data = MedicationData::new(req.name);
        data.dosage = req.dosage;
        data.frequency = req.frequency;
        data.timing = req.timing.into_iter().map(DayPart::from).collect();
        data.start_date = date(req.start_date, "start_date")?;
        data.end_date = date(req.end_date, "end_date")?;
        data.instructions = req.instructions;
        data.notes = req.notes;
        Ok(data)
    }
}

// ============================================================================
// Emergency
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct EmergencyContactReq {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub email: String,
    pub is_primary: bool,
}

impl From<EmergencyContactReq> for NewEmergencyContact {
    fn from(req: EmergencyContactReq) -> Self {
        NewEmergencyContact {
            name: req.name,
            relationship: req.relationship,
            phone: req.phone,
            email: req.email,
            is_primary: req.is_primary,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct EmergencyEventReq {
    #[schema(value_type = Object)]
    pub location_data: Map<String, Value>,
    pub contacted_numbers: Vec<String>,
    pub message: Option<String>,
}

// ============================================================================
// Notifications, buddy
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationsQuery {
    /// Include notifications already marked read.
    #[serde(default)]
    pub include_read: bool,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct AddGoalReq {
    pub description: String,
    /// Defaults to thirty days from now.
    #[serde(default)]
    pub target_date: Option<String>,
}

// ============================================================================
// Wellness and health series
// ============================================================================

/// One day's wellness entry. Raw measurements are scored; explicit scores override them.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RecordWellnessReq {
    pub steps: Option<u32>,
    pub sleep_hours: Option<f64>,
    pub heart_rate: Option<u32>,
    pub nutrition: Option<u8>,
    pub mental: Option<u8>,
    pub medication_adherence: Option<u8>,
    pub overall: Option<u8>,
    pub components: BTreeMap<String, u8>,
    pub activity: Option<String>,
    pub insight: Option<String>,
}

impl From<RecordWellnessReq> for WellnessUpdate {
    fn from(req: RecordWellnessReq) -> Self {
        let snapshot = WellnessSnapshot {
            steps: req.steps,
            sleep_hours: req.sleep_hours,
            heart_rate: req.heart_rate,
            nutrition: req.nutrition,
            mental: req.mental,
            medication_adherence: req.medication_adherence,
        };
        let measured = snapshot != WellnessSnapshot::default();

        WellnessUpdate {
            overall: req.overall,
            components: req.components,
            activity: req.activity,
            insight: req.insight,
            snapshot: measured.then_some(snapshot),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HealthSeriesQuery {
    /// Days of history ending today, 1 to 366 (default 30).
    pub days: Option<usize>,
    /// Add weekday patterns and noise (default true).
    pub randomness: Option<bool>,
}

impl HealthSeriesQuery {
    pub const DEFAULT_DAYS: usize = 30;

    pub fn days(&self) -> HealthResult<usize> {
        let days = self.days.unwrap_or(Self::DEFAULT_DAYS);
        if days == 0 || days > MAX_SAMPLE_DAYS {
            return Err(HealthError::InvalidInput(format!(
                "days must be between 1 and {MAX_SAMPLE_DAYS}, got {days}"
            )));
        }
        Ok(days)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthSeriesRes {
    pub series: Vec<HealthSample>,
    pub weekly: Vec<WeeklySummary>,
}
