//! The per-user Health Buddy: visit streaks, goals, reminders, and chat history.
//!
//! Buddy state lives in `buddy_data.json`; every notable event also drops a notification into
//! the user's inbox. Notifications are written after the buddy file so the two collections are
//! never locked at the same time.

use crate::database::Database;
use crate::error::{HealthError, HealthResult};
use crate::repositories::notifications::{NewNotification, NotificationKind, NotificationService};
use crate::timestamps::{deserialize_optional_timestamp, parse_timestamp};
use crate::NonEmptyText;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::sync::Arc;

pub const DEFAULT_BUDDY_NAME: &str = "Health Buddy";

/// Streak lengths that earn a notification.
pub const STREAK_MILESTONES: &[u32] = &[7, 14, 30, 60, 90, 180, 365];

const PERSONALITY_TRAITS: &[&str] = &[
    "supportive",
    "motivational",
    "encouraging",
    "positive",
    "friendly",
    "gentle",
    "understanding",
    "enthusiastic",
];

const DEFAULT_GOAL_DAYS: i64 = 30;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuddyMessage {
    pub text: String,
    #[serde(default)]
    pub from_buddy: bool,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub date: Option<DateTime<Utc>>,
    pub old_progress: u8,
    pub new_progress: u8,
    #[serde(default)]
    pub note: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthGoal {
    pub id: String,
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub target_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    /// Percent, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub check_ins: Vec<CheckIn>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    Once,
    Daily,
    Weekly,
    Monthly,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuddyReminder {
    pub id: String,
    pub title: String,
    /// Time of day as entered, e.g. `"08:30"`.
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuddyProfile {
    pub name: String,
    #[serde(default)]
    pub personality_traits: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub last_interaction: Option<DateTime<Utc>>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub messages: Vec<BuddyMessage>,
    #[serde(default)]
    pub health_goals: Vec<HealthGoal>,
    #[serde(default)]
    pub reminders: Vec<BuddyReminder>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What a visit did to the streak.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreakChange {
    Unchanged,
    Extended(u32),
    Reset { previous: u32 },
}

impl BuddyProfile {
    /// A fresh buddy with three traits drawn at random.
    pub fn new(name: &str, now: DateTime<Utc>, rng: &mut impl Rng) -> Self {
        let personality_traits = PERSONALITY_TRAITS
            .choose_multiple(rng, 3)
            .map(|t| (*t).to_owned())
            .collect();

        Self {
            name: name.to_owned(),
            personality_traits,
            created_at: Some(now),
            last_interaction: Some(now),
            streak: 0,
            messages: Vec::new(),
            health_goals: Vec::new(),
            reminders: Vec::new(),
            achievements: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Applies the streak rules for a visit at `now`.
    ///
    /// A visit on the calendar day after the last one extends the streak; a longer gap resets
    /// it. Same-day visits (and a last interaction in the future) leave everything unchanged.
    pub fn record_visit(&mut self, now: DateTime<Utc>) -> StreakChange {
        let Some(last) = self.last_interaction else {
            self.last_interaction = Some(now);
            return StreakChange::Unchanged;
        };

        match (now.date_naive() - last.date_naive()).num_days() {
            1 => {
                self.streak += 1;
                self.last_interaction = Some(now);
                StreakChange::Extended(self.streak)
            }
            gap if gap > 1 => {
                let previous = self.streak;
                self.streak = 0;
                self.last_interaction = Some(now);
                StreakChange::Reset { previous }
            }
            _ => StreakChange::Unchanged,
        }
    }

    /// The nearest incomplete goal whose target date is between today and `days` days ahead.
    pub fn goal_due_within(&self, now: DateTime<Utc>, days: i64) -> Option<(&HealthGoal, i64)> {
        self.health_goals
            .iter()
            .filter(|g| !g.completed)
            .filter_map(|g| {
                let target = g.target_date?;
                let days_left = (target.date_naive() - now.date_naive()).num_days();
                (0..=days).contains(&days_left).then_some((g, days_left))
            })
            .min_by_key(|(_, days_left)| *days_left)
    }
}

/// Input for [`BuddyService::add_reminder`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct NewBuddyReminder {
    pub title: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub notes: String,
}

/// Changes to a goal. Absent fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct GoalUpdate {
    pub description: Option<String>,
    pub target_date: Option<String>,
    pub progress: Option<u8>,
    pub completed: Option<bool>,
    pub note: Option<String>,
}

/// Changes to a reminder. Absent fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ReminderUpdate {
    pub title: Option<String>,
    pub time: Option<String>,
    pub recurrence: Option<Recurrence>,
    pub notes: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct BuddyService {
    db: Arc<Database>,
    notifications: NotificationService,
}

impl BuddyService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            notifications: NotificationService::new(Arc::clone(&db)),
            db,
        }
    }

    fn notify(
        &self,
        username: &str,
        pending: Vec<NewNotification>,
        now: DateTime<Utc>,
    ) -> HealthResult<()> {
        for notification in pending {
            self.notifications.create(username, notification, now)?;
        }
        Ok(())
    }

    fn welcome(name: &str) -> NewNotification {
        NewNotification::new(
            format!("Meet {name}!"),
            format!(
                "Your new Health Buddy {name} is here to support your health journey. \
                 Check out the Health Buddy page to get started!"
            ),
        )
        .kind(NotificationKind::Success)
    }

    /// Runs `f` against the user's buddy, creating the buddy first if needed, and persists.
    ///
    /// Nothing is written when `f` fails. Notifications pushed by `f` are delivered after the
    /// buddy file is written.
    fn with_buddy<R>(
        &self,
        username: &str,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
        f: impl FnOnce(&mut BuddyProfile, &mut Vec<NewNotification>) -> HealthResult<R>,
    ) -> HealthResult<R> {
        let mut pending = Vec::new();
        let created = Cell::new(false);

        let out = self.db.buddies.try_modify_or_insert_with(
            username,
            || {
                created.set(true);
                BuddyProfile::new(DEFAULT_BUDDY_NAME, now, rng)
            },
            |buddy| {
                if created.get() {
                    pending.push(Self::welcome(&buddy.name));
                }
                let out = f(buddy, &mut pending)?;
                buddy.last_interaction = Some(now);
                Ok::<R, HealthError>(out)
            },
        )?;

        self.notify(username, pending, now)?;
        Ok(out)
    }

    pub fn get(&self, username: &str) -> HealthResult<Option<BuddyProfile>> {
        Ok(self.db.buddies.get(username)?)
    }

    /// Returns the user's buddy, creating it on the first visit and updating the streak on
    /// later ones.
    pub fn get_or_create(
        &self,
        username: &str,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> HealthResult<BuddyProfile> {
        let (buddy, created) = self.db.buddies.get_or_insert_with(username, || {
            BuddyProfile::new(DEFAULT_BUDDY_NAME, now, rng)
        })?;

        if created {
            tracing::info!("created health buddy for {}", username);
            self.notify(username, vec![Self::welcome(&buddy.name)], now)?;
            return Ok(buddy);
        }

        let visit = self
            .db
            .buddies
            .modify(username, |buddy| (buddy.record_visit(now), buddy.clone()))?;
        let Some((change, buddy)) = visit else {
            return Ok(buddy);
        };

        let pending = match change {
            StreakChange::Extended(streak) if STREAK_MILESTONES.contains(&streak) => {
                vec![NewNotification::new(
                    format!("{streak} Day Streak!"),
                    format!(
                        "Congratulations! You've maintained a {streak}-day streak with {}. \
                         Keep up the great work!",
                        buddy.name
                    ),
                )
                .kind(NotificationKind::Success)]
            }
            StreakChange::Reset { previous } if previous > 3 => {
                vec![NewNotification::new(
                    "Streak Reset",
                    format!(
                        "Your {previous}-day streak with {} has been reset. \
                         Visit your Health Buddy daily to maintain your streak!",
                        buddy.name
                    ),
                )
                .kind(NotificationKind::Warning)]
            }
            _ => Vec::new(),
        };
        self.notify(username, pending, now)?;
        Ok(buddy)
    }

    /// Overwrites the top-level buddy fields named in `patch`. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::InvalidInput`] if a value does not fit its field.
    pub fn update(
        &self,
        username: &str,
        patch: &Map<String, Value>,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> HealthResult<BuddyProfile> {
        self.with_buddy(username, now, rng, |buddy, _| {
            let mut value =
                serde_json::to_value(&*buddy).map_err(crate::error::StoreError::Serialization)?;
            if let Value::Object(object) = &mut value {
                for (key, field) in patch {
                    if let Some(slot) = object.get_mut(key) {
                        *slot = field.clone();
                    }
                }
            }
            *buddy = serde_json::from_value(value)
                .map_err(|e| HealthError::InvalidInput(format!("invalid buddy update: {e}")))?;
            Ok(buddy.clone())
        })
    }

    /// Appends a chat message, keeping only the most recent messages.
    pub fn add_message(
        &self,
        username: &str,
        text: &str,
        from_buddy: bool,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> HealthResult<BuddyMessage> {
        let text = NonEmptyText::new(text)?.into_inner();
        let limit = self.db.cfg().message_history_limit();

        self.with_buddy(username, now, rng, |buddy, _| {
            let message = BuddyMessage {
                text,
                from_buddy,
                timestamp: Some(now),
            };
            buddy.messages.push(message.clone());
            if buddy.messages.len() > limit {
                let excess = buddy.messages.len() - limit;
                buddy.messages.drain(..excess);
            }
            Ok(message)
        })
    }

    /// Adds a goal. A missing or unparsable `target_date` means thirty days from `now`.
    pub fn add_goal(
        &self,
        username: &str,
        description: &str,
        target_date: Option<&str>,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> HealthResult<HealthGoal> {
        let description = NonEmptyText::new(description)?.into_inner();
        let target = target_date
            .and_then(parse_timestamp)
            .unwrap_or_else(|| now + Duration::days(DEFAULT_GOAL_DAYS));

        self.with_buddy(username, now, rng, |buddy, pending| {
            let goal = HealthGoal {
                id: uuid::Uuid::new_v4().to_string(),
                description,
                created_at: Some(now),
                target_date: Some(target),
                completed: false,
                progress: 0,
                check_ins: Vec::new(),
            };
            pending.push(NewNotification::new(
                "New Health Goal Created",
                format!(
                    "You've set a new health goal: {}. Your buddy will help you track your progress!",
                    goal.description
                ),
            ));
            buddy.health_goals.push(goal.clone());
            Ok(goal)
        })
    }

    /// Applies `update` to a goal, logging a check-in for progress changes.
    ///
    /// Returns `None` if the user has no buddy or no goal with `goal_id`.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::InvalidInput`] for progress above 100.
    pub fn update_goal(
        &self,
        username: &str,
        goal_id: &str,
        update: GoalUpdate,
        now: DateTime<Utc>,
    ) -> HealthResult<Option<HealthGoal>> {
        if update.progress.is_some_and(|p| p > 100) {
            return Err(HealthError::InvalidInput(
                "progress must be between 0 and 100".into(),
            ));
        }

        let mut pending = Vec::new();
        let result = self.db.buddies.modify(username, |buddy| {
            let goal = buddy.health_goals.iter_mut().find(|g| g.id == goal_id)?;

            if let Some(new_progress) = update.progress {
                let old_progress = goal.progress;
                goal.check_ins.push(CheckIn {
                    date: Some(now),
                    old_progress,
                    new_progress,
                    note: update.note.clone().unwrap_or_default(),
                });
                goal.progress = new_progress;

                if new_progress == 100 && old_progress < 100 {
                    pending.push(
                        NewNotification::new(
                            "Goal Achieved!",
                            format!(
                                "Congratulations! You've achieved your health goal: {}",
                                goal.description
                            ),
                        )
                        .kind(NotificationKind::Success),
                    );
                } else if new_progress >= 50 && old_progress < 50 {
                    pending.push(
                        NewNotification::new(
                            "Halfway to Your Goal!",
                            format!(
                                "You're now 50% of the way to achieving your goal: {}. Keep up the great work!",
                                goal.description
                            ),
                        )
                        .kind(NotificationKind::Success),
                    );
                }
            }

            if let Some(description) = update.description.as_deref().map(str::trim) {
                if !description.is_empty() {
                    goal.description = description.to_owned();
                }
            }
            if let Some(target) = update.target_date.as_deref().and_then(parse_timestamp) {
                goal.target_date = Some(target);
            }

            let newly_completed = update.completed == Some(true) && !goal.completed;
            if let Some(completed) = update.completed {
                goal.completed = completed;
            }
            let goal = goal.clone();

            if newly_completed {
                buddy.achievements.push(Achievement {
                    kind: "goal_completed".into(),
                    description: goal.description.clone(),
                    date: Some(now),
                });
                pending.push(
                    NewNotification::new(
                        "Goal Completed!",
                        format!(
                            "Congratulations on completing your health goal: {}",
                            goal.description
                        ),
                    )
                    .kind(NotificationKind::Success),
                );
            }

            buddy.last_interaction = Some(now);
            Some(goal)
        })?;

        self.notify(username, pending, now)?;
        Ok(result.flatten())
    }

    pub fn add_reminder(
        &self,
        username: &str,
        new: NewBuddyReminder,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> HealthResult<BuddyReminder> {
        let title = NonEmptyText::new(&new.title)?.into_inner();

        self.with_buddy(username, now, rng, |buddy, pending| {
            let reminder = BuddyReminder {
                id: uuid::Uuid::new_v4().to_string(),
                title,
                time: new.time.trim().to_owned(),
                recurrence: new.recurrence,
                notes: new.notes,
                created_at: Some(now),
                completed: false,
            };
            pending.push(NewNotification::new(
                "New Reminder Set",
                format!("Your Health Buddy will remind you: {}", reminder.title),
            ));
            buddy.reminders.push(reminder.clone());
            Ok(reminder)
        })
    }

    /// Returns `None` if the user has no buddy or no reminder with `reminder_id`.
    pub fn update_reminder(
        &self,
        username: &str,
        reminder_id: &str,
        update: ReminderUpdate,
        now: DateTime<Utc>,
    ) -> HealthResult<Option<BuddyReminder>> {
        let mut pending = Vec::new();
        let result = self.db.buddies.modify(username, |buddy| {
            let reminder = buddy.reminders.iter_mut().find(|r| r.id == reminder_id)?;

            if update.completed == Some(true) && !reminder.completed {
                pending.push(
                    NewNotification::new(
                        "Reminder Completed",
                        format!("You've completed your reminder: {}", reminder.title),
                    )
                    .kind(NotificationKind::Success),
                );
            }

            if let Some(title) = update.title.as_deref().map(str::trim) {
                if !title.is_empty() {
                    reminder.title = title.to_owned();
                }
            }
            if let Some(time) = &update.time {
                reminder.time = time.trim().to_owned();
            }
            if let Some(recurrence) = update.recurrence {
                reminder.recurrence = recurrence;
            }
            if let Some(notes) = &update.notes {
                reminder.notes = notes.clone();
            }
            if let Some(completed) = update.completed {
                reminder.completed = completed;
            }

            let reminder = reminder.clone();
            buddy.last_interaction = Some(now);
            Some(reminder)
        })?;

        self.notify(username, pending, now)?;
        Ok(result.flatten())
    }
}
