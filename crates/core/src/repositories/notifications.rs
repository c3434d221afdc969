//! Per-user notification inboxes.
//!
//! Expired notifications are hidden from [`NotificationService::current`] but never removed from
//! the store, so an inbox grows until notifications are deleted.

use crate::database::Database;
use crate::error::{HealthError, HealthResult};
use crate::timestamps::deserialize_optional_timestamp;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    /// An empty or unparsable stored value reads as "never expires".
    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub action: Option<Value>,
}

impl Notification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry < now)
    }

    /// Whether the notification was created on the UTC date `day`.
    pub fn created_on(&self, day: NaiveDate) -> bool {
        self.created_at.is_some_and(|at| at.date_naive() == day)
    }
}

/// Input for [`NotificationService::create`].
#[derive(Clone, Debug)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub expiry: Option<DateTime<Utc>>,
    pub action: Option<Value>,
}

impl NewNotification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::Info,
            expiry: None,
            action: None,
        }
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn expires_at(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

#[derive(Clone, Debug)]
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Appends a notification to `username`'s inbox, creating the inbox if needed.
    pub fn create(
        &self,
        username: &str,
        new: NewNotification,
        now: DateTime<Utc>,
    ) -> HealthResult<Notification> {
        let mut created = self.create_planned(username, now, |_| vec![new])?;
        created.pop().ok_or_else(|| {
            HealthError::InvalidInput(format!("notification for {username} was not stored"))
        })
    }

    /// Appends the notifications `plan` picks after looking at the stored inbox.
    ///
    /// `plan` runs under the inbox write lock, so decisions it makes from the existing
    /// notifications still hold when its picks are persisted.
    pub fn create_planned(
        &self,
        username: &str,
        now: DateTime<Utc>,
        plan: impl FnOnce(&[Notification]) -> Vec<NewNotification>,
    ) -> HealthResult<Vec<Notification>> {
        let created = self
            .db
            .notifications
            .modify_or_insert_with(username, Vec::new, |inbox| {
                let created: Vec<Notification> = plan(inbox.as_slice())
                    .into_iter()
                    .map(|new| Notification {
                        id: uuid::Uuid::new_v4().simple().to_string(),
                        title: new.title,
                        message: new.message,
                        kind: new.kind,
                        created_at: Some(now),
                        expiry: new.expiry,
                        read: false,
                        action: new.action,
                    })
                    .collect();
                inbox.extend(created.iter().cloned());
                created
            })?;

        for notification in &created {
            tracing::debug!("notification '{}' created for {}", notification.title, username);
        }
        Ok(created)
    }

    /// The notifications to show `username` at `now`.
    ///
    /// Read notifications are dropped unless `include_read`; the rest are ordered newest first,
    /// expired ones removed, and the result truncated to `limit`.
    pub fn current(
        &self,
        username: &str,
        include_read: bool,
        limit: usize,
        now: DateTime<Utc>,
    ) -> HealthResult<Vec<Notification>> {
        let mut inbox: Vec<Notification> = self
            .all(username)?
            .into_iter()
            .filter(|n| include_read || !n.read)
            .collect();
        inbox.sort_by_key(|n| Reverse(n.created_at));

        Ok(inbox
            .into_iter()
            .filter(|n| !n.is_expired(now))
            .take(limit)
            .collect())
    }

    /// Every stored notification of `username`, expired and read ones included, in insertion order.
    pub fn all(&self, username: &str) -> HealthResult<Vec<Notification>> {
        Ok(self.db.notifications.get(username)?.unwrap_or_default())
    }

    /// Returns `false` if the user or the notification does not exist.
    pub fn mark_read(&self, username: &str, notification_id: &str) -> HealthResult<bool> {
        let found = self.db.notifications.modify(username, |inbox| {
            match inbox.iter_mut().find(|n| n.id == notification_id) {
                Some(notification) => {
                    notification.read = true;
                    true
                }
                None => false,
            }
        })?;
        Ok(found.unwrap_or(false))
    }

    /// Marks the whole inbox read. Returns `false` if the user has no inbox.
    pub fn mark_all_read(&self, username: &str) -> HealthResult<bool> {
        let found = self.db.notifications.modify(username, |inbox| {
            inbox.iter_mut().for_each(|n| n.read = true);
        })?;
        Ok(found.is_some())
    }

    pub fn delete(&self, username: &str, notification_id: &str) -> HealthResult<bool> {
        let removed = self.db.notifications.modify(username, |inbox| {
            let before = inbox.len();
            inbox.retain(|n| n.id != notification_id);
            inbox.len() < before
        })?;
        Ok(removed.unwrap_or(false))
    }
}
