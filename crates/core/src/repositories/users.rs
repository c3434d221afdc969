//! Login accounts.
//!
//! Users are keyed by their username rather than a generated id. The first load of a data
//! directory seeds one account per role.

use crate::auth::{hash_password, verify_password};
use crate::database::Database;
use crate::error::{HealthError, HealthResult};
use crate::store::Record;
use crate::timestamps::deserialize_optional_timestamp;
use crate::{EmailAddress, NonEmptyText, Username};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Patient,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            other => Err(HealthError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// A stored account. The password is only ever held as its SHA-256 hex digest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for User {
    const ID_FIELD: &'static str = "username";
    const PROTECTED_FIELDS: &'static [&'static str] = &["username", "password", "created_at"];

    fn id(&self) -> &str {
        &self.username
    }
}

/// Accounts written the first time `users_db.json` is created.
pub(crate) fn seed_users() -> Vec<User> {
    let now = Utc::now();
    [
        ("admin", "admin123", Role::Admin, "System Administrator", "admin@healthassist.ai"),
        ("doctor", "doctor123", Role::Doctor, "Dr. John Smith", "doctor@healthassist.ai"),
        ("patient", "patient123", Role::Patient, "Jane Doe", "patient@healthassist.ai"),
    ]
    .into_iter()
    .map(|(username, password, role, name, email)| User {
        username: username.into(),
        password_hash: hash_password(password),
        role,
        name: name.into(),
        email: email.into(),
        created_at: Some(now),
        extra: Map::new(),
    })
    .collect()
}

/// Input for [`UserService::register`].
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns `HealthError::Text` if the username, password, or name is blank or malformed, or
    /// the email is given but malformed. Returns `StoreError::RecordExists` (wrapped) if the
    /// username is taken.
    pub fn register(&self, new: NewUser) -> HealthResult<User> {
        let username = Username::parse(&new.username)?;
        let password = NonEmptyText::new(&new.password)?;
        let name = NonEmptyText::new(&new.name)?;
        let email = if new.email.trim().is_empty() {
            String::new()
        } else {
            EmailAddress::parse(&new.email)?.as_str().to_owned()
        };

        let user = User {
            username: username.as_str().to_owned(),
            password_hash: hash_password(password.as_str()),
            role: new.role,
            name: name.into_inner(),
            email,
            created_at: Some(Utc::now()),
            extra: Map::new(),
        };

        let user = self.db.users.insert(user)?;
        tracing::info!("registered user {} ({})", user.username, user.role);
        Ok(user)
    }

    /// Returns the user if `password` matches, `None` for an unknown user or a wrong password.
    pub fn authenticate(&self, username: &str, password: &str) -> HealthResult<Option<User>> {
        let user = self.db.users.get(username.trim())?;
        Ok(user.filter(|u| verify_password(password, &u.password_hash)))
    }

    pub fn get(&self, username: &str) -> HealthResult<Option<User>> {
        Ok(self.db.users.get(username)?)
    }

    pub fn list(&self) -> HealthResult<Vec<User>> {
        Ok(self.db.users.list()?)
    }

    /// Merges `patch` into the user. The username, password, and creation time never change here.
    pub fn update(&self, username: &str, patch: &Map<String, Value>) -> HealthResult<Option<User>> {
        Ok(self.db.users.update(username, patch)?)
    }

    /// Replaces the password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::InvalidCredentials`] if the user does not exist or `old` does not
    /// match, and `HealthError::Text` if `new` is blank.
    pub fn change_password(&self, username: &str, old: &str, new: &str) -> HealthResult<()> {
        let new = NonEmptyText::new(new)?;
        let new_hash = hash_password(new.as_str());

        let changed = self.db.users.transact(|users| {
            match users
                .iter_mut()
                .find(|u| u.username == username && verify_password(old, &u.password_hash))
            {
                Some(user) => {
                    user.password_hash = new_hash;
                    true
                }
                None => false,
            }
        })?;

        if changed {
            Ok(())
        } else {
            Err(HealthError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::test_db;
    use crate::error::StoreError;
    use serde_json::json;
    use tempfile::TempDir;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            password: "secret".into(),
            role: Role::Patient,
            name: "Sam Patel".into(),
            email: "sam@example.com".into(),
        }
    }

    #[test]
    fn test_seeded_accounts_authenticate() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let users = UserService::new(test_db(temp_dir.path()));

        let admin = users
            .authenticate("admin", "admin123")
            .expect("authenticate should succeed")
            .expect("admin should be seeded");
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.name, "System Administrator");

        let doctor = users
            .authenticate("doctor", "doctor123")
            .expect("authenticate should succeed")
            .expect("doctor should be seeded");
        assert_eq!(doctor.name, "Dr. John Smith");

        assert!(users
            .authenticate("patient", "wrong")
            .expect("authenticate should succeed")
            .is_none());
        assert!(users
            .authenticate("nobody", "x")
            .expect("authenticate should succeed")
            .is_none());
    }

    #[test]
    fn test_register_rejects_duplicate_username() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let users = UserService::new(test_db(temp_dir.path()));

        users.register(new_user("sam")).expect("register should succeed");
        let err = users
            .register(new_user("sam"))
            .expect_err("duplicate should fail");
        assert!(matches!(err, HealthError::Store(StoreError::RecordExists(_))));
    }

    #[test]
    fn test_register_validates_input() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let users = UserService::new(test_db(temp_dir.path()));

        let mut bad = new_user("sam");
        bad.email = "not-an-email".into();
        assert!(matches!(users.register(bad), Err(HealthError::Text(_))));

        let mut bad = new_user("sam");
        bad.password = "  ".into();
        assert!(matches!(users.register(bad), Err(HealthError::Text(_))));

        let mut no_email = new_user("sam");
        no_email.email = String::new();
        users.register(no_email).expect("email is optional");
    }

    #[test]
    fn test_stored_password_is_hashed() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let users = UserService::new(test_db(temp_dir.path()));
        users.register(new_user("sam")).expect("register should succeed");

        let raw = std::fs::read_to_string(temp_dir.path().join("users_db.json"))
            .expect("users file should exist");
        assert!(!raw.contains("\"secret\""));
        assert!(raw.contains(&hash_password("secret")));
    }

    #[test]
    fn test_update_cannot_touch_username_or_password() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let users = UserService::new(test_db(temp_dir.path()));

        let patch = json!({ "name": "Janet Doe", "username": "hijack", "password": "x" });
        let updated = users
            .update("patient", patch.as_object().expect("object"))
            .expect("update should succeed")
            .expect("patient should exist");

        assert_eq!(updated.username, "patient");
        assert_eq!(updated.name, "Janet Doe");
        assert!(users
            .authenticate("patient", "patient123")
            .expect("authenticate should succeed")
            .is_some());
    }

    #[test]
    fn test_change_password() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let users = UserService::new(test_db(temp_dir.path()));

        let err = users
            .change_password("patient", "wrong", "new-pass")
            .expect_err("wrong old password should fail");
        assert!(matches!(err, HealthError::InvalidCredentials));

        users
            .change_password("patient", "patient123", "new-pass")
            .expect("change_password should succeed");
        assert!(users
            .authenticate("patient", "new-pass")
            .expect("authenticate should succeed")
            .is_some());
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Doctor".parse::<Role>().expect("parse"), Role::Doctor);
        assert!("nurse".parse::<Role>().is_err());
    }
}
