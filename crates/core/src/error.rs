use std::path::PathBuf;

/// Failures of the JSON collection store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable (path: {path}): {source}", path = path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage corruption (path: {path}): {detail}", path = path.display())]
    StorageCorruption { path: PathBuf, detail: String },
    #[error("failed to serialize collection: {0}")]
    Serialization(serde_json::Error),
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    #[error("record already exists: {0}")]
    RecordExists(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text: {0}")]
    Text(#[from] healthassist_types::TextError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{collection} record not found: {id}")]
    RecordNotFound { collection: &'static str, id: String },
    #[error("invalid username or password")]
    InvalidCredentials,
}

pub type HealthResult<T> = std::result::Result<T, HealthError>;
