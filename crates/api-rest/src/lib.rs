//! # API REST
//!
//! REST API implementation for HealthAssist.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, API key checks)
//!
//! Uses `api-shared` for request/response bodies and utilities.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{
    validate_api_key, AddGoalReq, AddMedicationReq, AddRecordReq, AppointmentReq, BmiRes,
    CreatePatientReq, EmergencyContactReq, EmergencyEventReq, HealthRes, HealthSeriesQuery,
    HealthSeriesRes, HealthService, ListUsersRes, LoginReq, NotificationsQuery,
    RecordWellnessReq, RegisterUserReq, UserRes, API_KEY_HEADER,
};
use healthassist_core::{
    auth::RequestContext,
    config::limit_from_env_value,
    constants::{
        DEFAULT_DAILY_NOTIFICATION_CAP, DEFAULT_NOTIFICATION_LIMIT, DEFAULT_REMINDERS_PER_RUN,
    },
    metrics::{sample_health_series, weekly_summary},
    reminders::ReminderService,
    repositories::buddy::{BuddyProfile, BuddyService, HealthGoal},
    repositories::emergency::{EmergencyContact, EmergencyEvent, EmergencyService},
    repositories::health_records::{HealthRecord, HealthRecordService, RecordType},
    repositories::medications::{Medication, MedicationData, MedicationService},
    repositories::notifications::{Notification, NotificationService},
    repositories::patients::{Patient, PatientService},
    repositories::users::{NewUser, UserService},
    repositories::wellness::{WellnessProfile, WellnessService},
    CoreConfig, Database, HealthError, StoreError, Username,
};

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request handlers.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Database>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    /// `api_key` of `None` leaves every route open.
    pub fn new(db: Arc<Database>, api_key: Option<String>) -> Self {
        Self {
            db,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

type ApiError = (StatusCode, &'static str);

/// Resolves the core configuration from the process environment.
///
/// # Environment Variables
/// - `HEALTHASSIST_DATA_DIR`: Directory holding the collection files (default: ".")
/// - `HEALTHASSIST_DAILY_NOTIFICATION_CAP`: Notifications per user per day (default: 5)
/// - `HEALTHASSIST_REMINDERS_PER_RUN`: Scheduled reminders per generation run (default: 2)
///
/// # Errors
/// Returns an error if:
/// - the data directory does not exist, or
/// - a limit is not a positive integer, or the per-run limit exceeds the daily cap.
pub fn core_config_from_env() -> anyhow::Result<CoreConfig> {
    let data_dir = std::env::var("HEALTHASSIST_DATA_DIR")
        .unwrap_or_else(|_| healthassist_core::constants::DEFAULT_DATA_DIR.into());
    let data_path = std::path::Path::new(&data_dir);
    if !data_path.exists() {
        anyhow::bail!("Data directory does not exist: {}", data_path.display());
    }

    let daily_cap = limit_from_env_value(
        std::env::var("HEALTHASSIST_DAILY_NOTIFICATION_CAP").ok(),
        DEFAULT_DAILY_NOTIFICATION_CAP,
    )?;
    let per_run = limit_from_env_value(
        std::env::var("HEALTHASSIST_REMINDERS_PER_RUN").ok(),
        DEFAULT_REMINDERS_PER_RUN,
    )?;

    Ok(CoreConfig::new(data_path.to_path_buf())?.with_notification_limits(daily_cap, per_run)?)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        login,
        register_user,
        list_users,
        get_user,
        update_user,
        list_patients,
        create_patient,
        get_patient,
        update_patient,
        patient_bmi,
        list_records,
        add_record,
        list_medications,
        add_medication,
        update_medication,
        delete_medication,
        list_emergency_contacts,
        add_emergency_contact,
        update_emergency_contact,
        delete_emergency_contact,
        list_emergency_events,
        log_emergency_event,
        resolve_emergency_event,
        list_notifications,
        generate_notifications,
        mark_all_notifications_read,
        mark_notification_read,
        delete_notification,
        get_buddy,
        add_buddy_goal,
        get_wellness,
        record_wellness,
        health_series,
    ),
    components(schemas(
        HealthRes,
        LoginReq,
        UserRes,
        ListUsersRes,
        RegisterUserReq,
        AppointmentReq,
        CreatePatientReq,
        BmiRes,
        AddRecordReq,
        AddMedicationReq,
        EmergencyContactReq,
        EmergencyEventReq,
        AddGoalReq,
        RecordWellnessReq,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router: API routes, Swagger UI, API key check and CORS.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/users", get(list_users).post(register_user))
        .route("/users/:username", get(get_user).patch(update_user))
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/:id", get(get_patient).patch(update_patient))
        .route("/patients/:id/bmi", get(patient_bmi))
        .route("/patients/:id/records", get(list_records).post(add_record))
        .route(
            "/patients/:id/medications",
            get(list_medications).post(add_medication),
        )
        .route(
            "/medications/:id",
            patch(update_medication).delete(delete_medication),
        )
        .route(
            "/patients/:id/emergency-contacts",
            get(list_emergency_contacts).post(add_emergency_contact),
        )
        .route(
            "/emergency-contacts/:id",
            patch(update_emergency_contact).delete(delete_emergency_contact),
        )
        .route(
            "/patients/:id/emergency-events",
            get(list_emergency_events).post(log_emergency_event),
        )
        .route("/emergency-events/:id/resolve", post(resolve_emergency_event))
        .route("/users/:username/notifications", get(list_notifications))
        .route(
            "/users/:username/notifications/generate",
            post(generate_notifications),
        )
        .route(
            "/users/:username/notifications/read-all",
            post(mark_all_notifications_read),
        )
        .route(
            "/users/:username/notifications/:id/read",
            post(mark_notification_read),
        )
        .route(
            "/users/:username/notifications/:id",
            delete(delete_notification),
        )
        .route("/users/:username/buddy", get(get_buddy))
        .route("/users/:username/buddy/goals", post(add_buddy_goal))
        .route(
            "/users/:username/wellness",
            get(get_wellness).post(record_wellness),
        )
        .route("/users/:username/health-series", get(health_series))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Rejects requests without the configured `x-api-key`.
///
/// The health check and the API documentation stay open.
async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/health" || path.starts_with("/swagger-ui") || path.starts_with("/api-docs") {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    match validate_api_key(state.api_key.as_deref(), provided) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!("Rejected request to {}: {}", path, e);
            (StatusCode::UNAUTHORIZED, "Invalid API key").into_response()
        }
    }
}

/// Maps a core error onto an HTTP status, logging storage failures.
fn api_error(context: &str, err: HealthError) -> ApiError {
    match err {
        HealthError::InvalidInput(_) | HealthError::Text(_) => {
            tracing::warn!("{} rejected: {}", context, err);
            (StatusCode::BAD_REQUEST, "Invalid input")
        }
        HealthError::Store(StoreError::InvalidPatch(_)) => {
            tracing::warn!("{} rejected: {}", context, err);
            (StatusCode::BAD_REQUEST, "Invalid update")
        }
        HealthError::Store(StoreError::RecordExists(_)) => {
            (StatusCode::CONFLICT, "Record already exists")
        }
        HealthError::RecordNotFound { .. } => (StatusCode::NOT_FOUND, "Not found"),
        HealthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
        HealthError::Store(_) => {
            tracing::error!("{} error: {:?}", context, err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

fn found<T>(value: Option<T>) -> Result<T, ApiError> {
    value.ok_or((StatusCode::NOT_FOUND, "Not found"))
}

fn valid_username(raw: &str) -> Result<Username, ApiError> {
    Username::parse(raw).map_err(|_| (StatusCode::BAD_REQUEST, "Invalid username"))
}

/// A well-formed username that belongs to a registered account.
fn require_account(state: &AppState, raw: &str) -> Result<Username, ApiError> {
    let username = valid_username(raw)?;
    let user = UserService::new(state.db.clone())
        .get(username.as_str())
        .map_err(|e| api_error("Get user", e))?;
    found(user)?;
    Ok(username)
}

fn require_patient(state: &AppState, id: &str) -> Result<Patient, ApiError> {
    let patient = PatientService::new(state.db.clone())
        .get(id)
        .map_err(|e| api_error("Get patient", e))?;
    found(patient)
}

/// Resolves the author of a clinical write and checks they are staff.
fn require_staff(state: &AppState, username: &str) -> Result<RequestContext, ApiError> {
    let user = UserService::new(state.db.clone())
        .get(username)
        .map_err(|e| api_error("Get user", e))?
        .ok_or((StatusCode::BAD_REQUEST, "Unknown author"))?;

    let ctx = RequestContext::from(&user);
    if !ctx.is_staff() {
        tracing::warn!("{} ({}) may not write clinical data", ctx.username, ctx.role);
        return Err((StatusCode::FORBIDDEN, "Staff only"));
    }
    Ok(ctx)
}

// ============================================================================
// Health and users
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks. Never requires an API key.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Credentials accepted", body = UserRes),
        (status = 401, description = "Unknown user or wrong password"),
        (status = 500, description = "Internal server error")
    )
)]
/// Checks a username and password against the stored SHA-256 hash.
///
/// # Errors
/// Returns `401 Unauthorized` if the user does not exist or the password does not match.
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> Result<Json<UserRes>, ApiError> {
    let users = UserService::new(state.db.clone());
    match users.authenticate(&req.username, &req.password) {
        Ok(Some(user)) => Ok(Json(user.into())),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "Invalid credentials")),
        Err(e) => Err(api_error("Login", e)),
    }
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = RegisterUserReq,
    responses(
        (status = 201, description = "User registered", body = UserRes),
        (status = 400, description = "Bad request"),
        (status = 409, description = "Username already taken"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a new user account
///
/// # Errors
/// Returns:
/// - `400 Bad Request` for a blank or malformed username, an empty password, or an unknown role,
/// - `409 Conflict` if the username is taken,
/// - `500 Internal Server Error` if the user collection cannot be written.
#[axum::debug_handler]
async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserReq>,
) -> Result<(StatusCode, Json<UserRes>), ApiError> {
    let new = NewUser::try_from(req).map_err(|e| api_error("Register user", e))?;
    let user = UserService::new(state.db.clone())
        .register(new)
        .map_err(|e| api_error("Register user", e))?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All user accounts", body = ListUsersRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn list_users(State(state): State<AppState>) -> Result<Json<ListUsersRes>, ApiError> {
    let users = UserService::new(state.db.clone())
        .list()
        .map_err(|e| api_error("List users", e))?;
    Ok(Json(ListUsersRes {
        users: users.into_iter().map(UserRes::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Login name")),
    responses(
        (status = 200, description = "User account", body = UserRes),
        (status = 404, description = "No such user"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn get_user(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
) -> Result<Json<UserRes>, ApiError> {
    let user = UserService::new(state.db.clone())
        .get(&username)
        .map_err(|e| api_error("Get user", e))?;
    Ok(Json(found(user)?.into()))
}

#[utoipa::path(
    patch,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Login name")),
    request_body = Object,
    responses(
        (status = 200, description = "User updated", body = UserRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such user"),
        (status = 500, description = "Internal server error")
    )
)]
/// Merge fields into a user account
///
/// `username`, `password` and `created_at` cannot be changed this way.
#[axum::debug_handler]
async fn update_user(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<UserRes>, ApiError> {
    let user = UserService::new(state.db.clone())
        .update(&username, &patch)
        .map_err(|e| api_error("Update user", e))?;
    Ok(Json(found(user)?.into()))
}

// ============================================================================
// Patients and clinical records
// ============================================================================

#[utoipa::path(
    get,
    path = "/patients",
    responses(
        (status = 200, description = "List of patients", body = [Object]),
        (status = 500, description = "Internal server error")
    )
)]
/// List all patients in the system
///
/// # Errors
/// Returns `500 Internal Server Error` if the patient collection cannot be read.
#[axum::debug_handler]
async fn list_patients(State(state): State<AppState>) -> Result<Json<Vec<Patient>>, ApiError> {
    let patients = PatientService::new(state.db.clone())
        .list()
        .map_err(|e| api_error("List patients", e))?;
    Ok(Json(patients))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 201, description = "Patient created", body = Object),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Create a new patient record
///
/// The patient is assigned the next `PT` identifier.
///
/// # Errors
/// Returns:
/// - `400 Bad Request` for a blank name or a non-positive height or weight,
/// - `500 Internal Server Error` if the patient collection cannot be written.
#[axum::debug_handler]
async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<CreatePatientReq>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = PatientService::new(state.db.clone())
        .create(req.into())
        .map_err(|e| api_error("Create patient", e))?;
    Ok((StatusCode::CREATED, Json(patient)))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient record", body = Object),
        (status = 404, description = "No such patient"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn get_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Patient>, ApiError> {
    Ok(Json(require_patient(&state, &id)?))
}

#[utoipa::path(
    patch,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    request_body = Object,
    responses(
        (status = 200, description = "Patient updated", body = Object),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such patient"),
        (status = 500, description = "Internal server error")
    )
)]
/// Merge fields into a patient record and stamp `modified_at`
#[axum::debug_handler]
async fn update_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<Patient>, ApiError> {
    let patient = PatientService::new(state.db.clone())
        .update(&id, &patch)
        .map_err(|e| api_error("Update patient", e))?;
    Ok(Json(found(patient)?))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/bmi",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Body mass index", body = BmiRes),
        (status = 404, description = "No such patient"),
        (status = 422, description = "Height or weight not recorded"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn patient_bmi(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<BmiRes>, ApiError> {
    let bmi = PatientService::new(state.db.clone())
        .bmi(&id)
        .map_err(|e| api_error("Patient BMI", e))?;
    bmi.map(|b| Json(b.into())).ok_or((
        StatusCode::UNPROCESSABLE_ENTITY,
        "Height and weight are required",
    ))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/records",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Health records of the patient", body = [Object]),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn list_records(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Vec<HealthRecord>>, ApiError> {
    let records = HealthRecordService::new(state.db.clone())
        .for_patient(&id)
        .map_err(|e| api_error("List records", e))?;
    Ok(Json(records))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/records",
    params(("id" = String, Path, description = "Patient id")),
    request_body = AddRecordReq,
    responses(
        (status = 201, description = "Health record added", body = Object),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Author is not a doctor or admin"),
        (status = 404, description = "No such patient"),
        (status = 500, description = "Internal server error")
    )
)]
/// Add a consultation, prescription, lab result or other record to a patient
///
/// `created_by` must name a doctor or admin account.
#[axum::debug_handler]
async fn add_record(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<AddRecordReq>,
) -> Result<(StatusCode, Json<HealthRecord>), ApiError> {
    require_patient(&state, &id)?;
    let author = require_staff(&state, &req.created_by)?;
    let record = HealthRecordService::new(state.db.clone())
        .add(
            &id,
            RecordType::from(req.kind.as_str()),
            req.data,
            &author.username,
        )
        .map_err(|e| api_error("Add record", e))?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/medications",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Medications of the patient", body = [Object]),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn list_medications(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Vec<Medication>>, ApiError> {
    let medications = MedicationService::new(state.db.clone())
        .for_patient(&id)
        .map_err(|e| api_error("List medications", e))?;
    Ok(Json(medications))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/medications",
    params(("id" = String, Path, description = "Patient id")),
    request_body = AddMedicationReq,
    responses(
        (status = 201, description = "Medication added", body = Object),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Author is not a doctor or admin"),
        (status = 404, description = "No such patient"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn add_medication(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<AddMedicationReq>,
) -> Result<(StatusCode, Json<Medication>), ApiError> {
    require_patient(&state, &id)?;
    let author = require_staff(&state, &req.created_by)?;
    let data = MedicationData::try_from(req).map_err(|e| api_error("Add medication", e))?;
    let medication = MedicationService::new(state.db.clone())
        .add(&id, data, &author.username)
        .map_err(|e| api_error("Add medication", e))?;
    Ok((StatusCode::CREATED, Json(medication)))
}

#[utoipa::path(
    patch,
    path = "/medications/{id}",
    params(("id" = String, Path, description = "Medication id")),
    request_body = Object,
    responses(
        (status = 200, description = "Medication updated", body = Object),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such medication"),
        (status = 500, description = "Internal server error")
    )
)]
/// Merge fields into a medication's prescription details
#[axum::debug_handler]
async fn update_medication(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<Medication>, ApiError> {
    let medication = MedicationService::new(state.db.clone())
        .update(&id, &patch)
        .map_err(|e| api_error("Update medication", e))?;
    Ok(Json(found(medication)?))
}

#[utoipa::path(
    delete,
    path = "/medications/{id}",
    params(("id" = String, Path, description = "Medication id")),
    responses(
        (status = 204, description = "Medication deleted"),
        (status = 404, description = "No such medication"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn delete_medication(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = MedicationService::new(state.db.clone())
        .delete(&id)
        .map_err(|e| api_error("Delete medication", e))?;
    deleted
        .then_some(StatusCode::NO_CONTENT)
        .ok_or((StatusCode::NOT_FOUND, "Not found"))
}

// ============================================================================
// Emergency
// ============================================================================

#[utoipa::path(
    get,
    path = "/patients/{id}/emergency-contacts",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Emergency contacts of the patient", body = [Object]),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn list_emergency_contacts(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Vec<EmergencyContact>>, ApiError> {
    let contacts = EmergencyService::new(state.db.clone())
        .contacts_for_patient(&id)
        .map_err(|e| api_error("List emergency contacts", e))?;
    Ok(Json(contacts))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/emergency-contacts",
    params(("id" = String, Path, description = "Patient id")),
    request_body = EmergencyContactReq,
    responses(
        (status = 201, description = "Emergency contact added", body = Object),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such patient"),
        (status = 500, description = "Internal server error")
    )
)]
/// Add an emergency contact
///
/// Marking the new contact primary clears the flag on the patient's other contacts.
#[axum::debug_handler]
async fn add_emergency_contact(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<EmergencyContactReq>,
) -> Result<(StatusCode, Json<EmergencyContact>), ApiError> {
    require_patient(&state, &id)?;
    let contact = EmergencyService::new(state.db.clone())
        .add_contact(&id, req.into())
        .map_err(|e| api_error("Add emergency contact", e))?;
    Ok((StatusCode::CREATED, Json(contact)))
}

#[utoipa::path(
    patch,
    path = "/emergency-contacts/{id}",
    params(("id" = String, Path, description = "Emergency contact id")),
    request_body = Object,
    responses(
        (status = 200, description = "Emergency contact updated", body = Object),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such contact"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn update_emergency_contact(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<EmergencyContact>, ApiError> {
    let contact = EmergencyService::new(state.db.clone())
        .update_contact(&id, &patch)
        .map_err(|e| api_error("Update emergency contact", e))?;
    Ok(Json(found(contact)?))
}

#[utoipa::path(
    delete,
    path = "/emergency-contacts/{id}",
    params(("id" = String, Path, description = "Emergency contact id")),
    responses(
        (status = 204, description = "Emergency contact deleted"),
        (status = 404, description = "No such contact"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn delete_emergency_contact(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = EmergencyService::new(state.db.clone())
        .delete_contact(&id)
        .map_err(|e| api_error("Delete emergency contact", e))?;
    deleted
        .then_some(StatusCode::NO_CONTENT)
        .ok_or((StatusCode::NOT_FOUND, "Not found"))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/emergency-events",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Emergency events, newest first", body = [Object]),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn list_emergency_events(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Vec<EmergencyEvent>>, ApiError> {
    let events = EmergencyService::new(state.db.clone())
        .events_for_patient(&id)
        .map_err(|e| api_error("List emergency events", e))?;
    Ok(Json(events))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/emergency-events",
    params(("id" = String, Path, description = "Patient id")),
    request_body = EmergencyEventReq,
    responses(
        (status = 201, description = "Emergency event logged", body = Object),
        (status = 404, description = "No such patient"),
        (status = 500, description = "Internal server error")
    )
)]
/// Log that an emergency alert was sent
///
/// The stored message includes the patient's name and any address or coordinates in
/// `location_data`.
#[axum::debug_handler]
async fn log_emergency_event(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<EmergencyEventReq>,
) -> Result<(StatusCode, Json<EmergencyEvent>), ApiError> {
    require_patient(&state, &id)?;
    let event = EmergencyService::new(state.db.clone())
        .log_event(&id, req.location_data, req.contacted_numbers, req.message)
        .map_err(|e| api_error("Log emergency event", e))?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[utoipa::path(
    post,
    path = "/emergency-events/{id}/resolve",
    params(("id" = String, Path, description = "Emergency event id")),
    responses(
        (status = 200, description = "Emergency event resolved", body = Object),
        (status = 404, description = "No such event"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn resolve_emergency_event(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<EmergencyEvent>, ApiError> {
    let event = EmergencyService::new(state.db.clone())
        .resolve_event(&id)
        .map_err(|e| api_error("Resolve emergency event", e))?;
    Ok(Json(event))
}

// ============================================================================
// Notifications
// ============================================================================

#[utoipa::path(
    get,
    path = "/users/{username}/notifications",
    params(("username" = String, Path, description = "Login name"), NotificationsQuery),
    responses(
        (status = 200, description = "Unexpired notifications, newest first", body = [Object]),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// List a user's current notifications
///
/// Expired notifications are hidden but stay in storage. Read ones are hidden unless
/// `include_read` is set. At most `limit` (default 10) are returned.
#[axum::debug_handler]
async fn list_notifications(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let username = valid_username(&username)?;
    let notifications = NotificationService::new(state.db.clone())
        .current(
            username.as_str(),
            query.include_read,
            query.limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT),
            Utc::now(),
        )
        .map_err(|e| api_error("List notifications", e))?;
    Ok(Json(notifications))
}

#[utoipa::path(
    post,
    path = "/users/{username}/notifications/generate",
    params(("username" = String, Path, description = "Login name")),
    responses(
        (status = 200, description = "Notifications created by this run", body = [Object]),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Run every reminder generator for a user
///
/// Titles already issued today are skipped and the daily notification cap is respected.
#[axum::debug_handler]
async fn generate_notifications(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let username = valid_username(&username)?;
    let mut rng = StdRng::from_entropy();
    let created = ReminderService::new(state.db.clone())
        .generate_all(username.as_str(), Utc::now(), &mut rng)
        .map_err(|e| api_error("Generate notifications", e))?;
    Ok(Json(created))
}

#[utoipa::path(
    post,
    path = "/users/{username}/notifications/read-all",
    params(("username" = String, Path, description = "Login name")),
    responses(
        (status = 204, description = "Every notification marked read"),
        (status = 404, description = "User has no notifications"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn mark_all_notifications_read(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    let updated = NotificationService::new(state.db.clone())
        .mark_all_read(&username)
        .map_err(|e| api_error("Mark all notifications read", e))?;
    updated
        .then_some(StatusCode::NO_CONTENT)
        .ok_or((StatusCode::NOT_FOUND, "Not found"))
}

#[utoipa::path(
    post,
    path = "/users/{username}/notifications/{id}/read",
    params(
        ("username" = String, Path, description = "Login name"),
        ("id" = String, Path, description = "Notification id")
    ),
    responses(
        (status = 204, description = "Notification marked read"),
        (status = 404, description = "No such notification"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn mark_notification_read(
    State(state): State<AppState>,
    AxumPath((username, id)): AxumPath<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let updated = NotificationService::new(state.db.clone())
        .mark_read(&username, &id)
        .map_err(|e| api_error("Mark notification read", e))?;
    updated
        .then_some(StatusCode::NO_CONTENT)
        .ok_or((StatusCode::NOT_FOUND, "Not found"))
}

#[utoipa::path(
    delete,
    path = "/users/{username}/notifications/{id}",
    params(
        ("username" = String, Path, description = "Login name"),
        ("id" = String, Path, description = "Notification id")
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "No such notification"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn delete_notification(
    State(state): State<AppState>,
    AxumPath((username, id)): AxumPath<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let deleted = NotificationService::new(state.db.clone())
        .delete(&username, &id)
        .map_err(|e| api_error("Delete notification", e))?;
    deleted
        .then_some(StatusCode::NO_CONTENT)
        .ok_or((StatusCode::NOT_FOUND, "Not found"))
}

// ============================================================================
// Buddy and wellness
// ============================================================================

#[utoipa::path(
    get,
    path = "/users/{username}/buddy",
    params(("username" = String, Path, description = "Login name")),
    responses(
        (status = 200, description = "Health Buddy profile", body = Object),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such user"),
        (status = 500, description = "Internal server error")
    )
)]
/// Fetch the user's Health Buddy, creating it on first visit
///
/// Each call counts as a visit for the daily streak.
#[axum::debug_handler]
async fn get_buddy(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
) -> Result<Json<BuddyProfile>, ApiError> {
    let username = require_account(&state, &username)?;
    let mut rng = StdRng::from_entropy();
    let buddy = BuddyService::new(state.db.clone())
        .get_or_create(username.as_str(), Utc::now(), &mut rng)
        .map_err(|e| api_error("Get buddy", e))?;
    Ok(Json(buddy))
}

#[utoipa::path(
    post,
    path = "/users/{username}/buddy/goals",
    params(("username" = String, Path, description = "Login name")),
    request_body = AddGoalReq,
    responses(
        (status = 201, description = "Goal added", body = Object),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such user"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn add_buddy_goal(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
    Json(req): Json<AddGoalReq>,
) -> Result<(StatusCode, Json<HealthGoal>), ApiError> {
    let username = require_account(&state, &username)?;
    let mut rng = StdRng::from_entropy();
    let goal = BuddyService::new(state.db.clone())
        .add_goal(
            username.as_str(),
            &req.description,
            req.target_date.as_deref(),
            Utc::now(),
            &mut rng,
        )
        .map_err(|e| api_error("Add buddy goal", e))?;
    Ok((StatusCode::CREATED, Json(goal)))
}

#[utoipa::path(
    get,
    path = "/users/{username}/wellness",
    params(("username" = String, Path, description = "Login name")),
    responses(
        (status = 200, description = "Wellness score history", body = Object),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such user"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn get_wellness(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
) -> Result<Json<WellnessProfile>, ApiError> {
    let username = require_account(&state, &username)?;
    let profile = WellnessService::new(state.db.clone())
        .get_or_create(username.as_str(), Utc::now())
        .map_err(|e| api_error("Get wellness", e))?;
    Ok(Json(profile))
}

#[utoipa::path(
    post,
    path = "/users/{username}/wellness",
    params(("username" = String, Path, description = "Login name")),
    request_body = RecordWellnessReq,
    responses(
        (status = 200, description = "Updated wellness score history", body = Object),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such user"),
        (status = 500, description = "Internal server error")
    )
)]
/// Record today's wellness entry
///
/// Supplied measurements (steps, sleep, heart rate and self-rated scores) are turned into an
/// overall score and component scores. Explicit `overall` or `components` values win.
#[axum::debug_handler]
async fn record_wellness(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
    Json(req): Json<RecordWellnessReq>,
) -> Result<Json<WellnessProfile>, ApiError> {
    let username = require_account(&state, &username)?;
    let mut rng = StdRng::from_entropy();
    let profile = WellnessService::new(state.db.clone())
        .record_day(username.as_str(), req.into(), Utc::now(), &mut rng)
        .map_err(|e| api_error("Record wellness", e))?;
    Ok(Json(profile))
}

#[utoipa::path(
    get,
    path = "/users/{username}/health-series",
    params(
        ("username" = String, Path, description = "Login name"),
        HealthSeriesQuery
    ),
    responses(
        (status = 200, description = "Daily samples and weekly averages", body = Object),
        (status = 400, description = "Bad request"),
        (status = 404, description = "No such user"),
        (status = 500, description = "Internal server error")
    )
)]
/// Synthetic daily activity ending today, with ISO-week averages for dashboards
#[axum::debug_handler]
async fn health_series(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
    Query(query): Query<HealthSeriesQuery>,
) -> Result<Json<HealthSeriesRes>, ApiError> {
    require_account(&state, &username)?;
    let days = query.days().map_err(|e| api_error("Health series", e))?;
    let series = sample_health_series(
        days,
        Utc::now().date_naive(),
        query.randomness.unwrap_or(true),
    );
    let weekly = weekly_summary(&series);
    Ok(Json(HealthSeriesRes { series, weekly }))
}
