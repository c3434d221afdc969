//! Reminder generation with per-day de-duplication.
//!
//! Each generator looks at the user's notifications created on the current UTC date. A title
//! already issued today is never issued again the same day, and the scheduled and buddy
//! generators stop once the user has received the configured daily number of notifications.
//! Titles from earlier days do not block anything.

use crate::database::Database;
use crate::error::HealthResult;
use crate::repositories::buddy::{BuddyProfile, STREAK_MILESTONES};
use crate::repositories::medications::{DayPart, Medication, MedicationService};
use crate::repositories::notifications::{
    NewNotification, Notification, NotificationKind, NotificationService,
};
use crate::repositories::patients::{Patient, PatientService};
use crate::timestamps::{end_of_day, parse_timestamp};
use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// Days ahead that appointments and goal deadlines start producing reminders.
pub const LOOKAHEAD_DAYS: i64 = 3;

const MAX_BUDDY_REMINDERS: usize = 2;

const GENERAL_REMINDERS: &[(&str, &str)] = &[
    ("Stay Hydrated", "Remember to drink water regularly throughout the day for optimal health."),
    ("Take a Break", "It's time for a short break. Stand up, stretch, and rest your eyes."),
    ("Posture Check", "Check your posture. Sit up straight and adjust your position if needed."),
    ("Deep Breathing", "Take a moment for deep breathing. Inhale slowly for 4 counts, hold for 2, and exhale for 6."),
    ("Step Count", "Have you reached your step goal today? Consider taking a short walk."),
    ("Mindfulness Moment", "Take a mindful moment. Focus on your surroundings and practice being present."),
    ("Healthy Snack", "It's snack time! Choose a nutritious option like fruits, nuts, or yogurt."),
    ("Sleep Reminder", "Start winding down for good sleep. Reduce screen time and prepare for rest."),
];

/// Medication reminder windows: inclusive start and end hour, title, day part.
const MEDICATION_WINDOWS: &[(u32, u32, &str, DayPart)] = &[
    (8, 10, "Morning Medication", DayPart::Morning),
    (12, 14, "Afternoon Medication", DayPart::Afternoon),
    (18, 20, "Evening Medication", DayPart::Evening),
    (21, 23, "Bedtime Medication", DayPart::Bedtime),
];

/// What a user may still receive today.
#[derive(Clone, Debug)]
pub struct DailyBudget {
    titles_today: HashSet<String>,
    remaining: usize,
}

impl DailyBudget {
    pub fn from_inbox(inbox: &[Notification], now: DateTime<Utc>, daily_cap: usize) -> Self {
        let today = now.date_naive();
        let titles_today: HashSet<String> = inbox
            .iter()
            .filter(|n| n.created_on(today))
            .map(|n| n.title.clone())
            .collect();
        let issued_today = inbox.iter().filter(|n| n.created_on(today)).count();

        Self {
            titles_today,
            remaining: daily_cap.saturating_sub(issued_today),
        }
    }

    pub fn issued_today(&self, title: &str) -> bool {
        self.titles_today.contains(title)
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn record(&mut self, title: &str) {
        self.titles_today.insert(title.to_owned());
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// The scheduled reminders `patient` qualifies for, general ones first.
pub fn reminder_candidates(patient: Option<&Patient>) -> Vec<(&'static str, &'static str)> {
    let mut candidates = GENERAL_REMINDERS.to_vec();
    let Some(patient) = patient else {
        return candidates;
    };

    if patient.age.is_some_and(|age| age > 50) {
        candidates.push((
            "Health Screening Reminder",
            "Regular health screenings are important at your age. Check with your doctor about recommended screenings.",
        ));
    }
    if patient.has_condition("diabetes") {
        candidates.push((
            "Blood Sugar Check",
            "Don't forget to monitor your blood sugar levels today.",
        ));
    }
    if patient.has_condition("hypertension") || patient.has_condition("blood pressure") {
        candidates.push((
            "Blood Pressure Check",
            "Remember to check your blood pressure today and log the results.",
        ));
    }
    if patient.has_condition("heart") {
        candidates.push((
            "Heart Health",
            "Take your heart medications as prescribed and stay active within your doctor's guidelines.",
        ));
    }
    candidates
}

fn days_phrase(days: i64) -> String {
    match days {
        0 => "today".to_owned(),
        1 => "in 1 day".to_owned(),
        n => format!("in {n} days"),
    }
}

#[derive(Clone, Debug)]
pub struct ReminderService {
    db: Arc<Database>,
    notifications: NotificationService,
}

impl ReminderService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            notifications: NotificationService::new(Arc::clone(&db)),
            db,
        }
    }

    /// Creates whatever `plan` picks against the user's budget for today.
    ///
    /// The budget is built from the stored inbox inside the same lock that appends the picks,
    /// so concurrent runs for one user cannot exceed the daily cap or repeat a title.
    fn issue_within_budget(
        &self,
        username: &str,
        now: DateTime<Utc>,
        plan: impl FnOnce(&mut DailyBudget) -> Vec<NewNotification>,
    ) -> HealthResult<Vec<Notification>> {
        let daily_cap = self.db.cfg().daily_notification_cap();
        self.notifications.create_planned(username, now, |inbox| {
            let mut budget = DailyBudget::from_inbox(inbox, now, daily_cap);
            plan(&mut budget)
        })
    }

    /// Issues general and condition-specific wellbeing reminders.
    ///
    /// Up to `min(reminders_per_run, remaining daily budget)` candidates not yet issued today
    /// are sampled uniformly without replacement. Each expires at the end of the current day.
    pub fn scheduled_health_reminders(
        &self,
        username: &str,
        patient: Option<&Patient>,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> HealthResult<Vec<Notification>> {
        let per_run = self.db.cfg().reminders_per_run();
        let candidates = reminder_candidates(patient);
        let expiry = end_of_day(now);

        let created = self.issue_within_budget(username, now, |budget| {
            let to_add = per_run.min(budget.remaining());
            let fresh: Vec<(&str, &str)> = candidates
                .iter()
                .filter(|(title, _)| !budget.issued_today(title))
                .copied()
                .collect();

            fresh
                .choose_multiple(rng, to_add)
                .map(|(title, message)| {
                    budget.record(title);
                    NewNotification::new(*title, *message).expires_at(expiry)
                })
                .collect()
        })?;

        if created.is_empty() {
            tracing::debug!("no scheduled reminders left today for {}", username);
        }
        Ok(created)
    }

    /// Issues reminders derived from the user's Health Buddy: a streak milestone, up to two
    /// open buddy reminders, and a warning for the nearest goal due within three days.
    ///
    /// Every notification expires a day after `now`.
    pub fn buddy_reminders(
        &self,
        username: &str,
        buddy: &BuddyProfile,
        now: DateTime<Utc>,
    ) -> HealthResult<Vec<Notification>> {
        let expiry = now + Duration::days(1);

        self.issue_within_budget(username, now, |budget| {
            let mut pending = Vec::new();

            if STREAK_MILESTONES.contains(&buddy.streak) {
                pending.push(
                    NewNotification::new(
                        "Streak Milestone!",
                        format!(
                            "Congratulations! You've maintained a {}-day streak with your Health Buddy. Keep up the great work!",
                            buddy.streak
                        ),
                    )
                    .kind(NotificationKind::Success),
                );
            }

            pending.extend(
                buddy
                    .reminders
                    .iter()
                    .filter(|r| !r.completed && !r.title.trim().is_empty())
                    .filter(|r| !budget.issued_today(&format!("Reminder: {}", r.title)))
                    .take(MAX_BUDDY_REMINDERS)
                    .map(|r| {
                        NewNotification::new(
                            format!("Reminder: {}", r.title),
                            format!("Your Health Buddy reminds you: {}", r.title),
                        )
                    }),
            );

            if let Some((goal, days_left)) = buddy.goal_due_within(now, LOOKAHEAD_DAYS) {
                let phrase = days_phrase(days_left);
                let mut label = phrase.clone();
                if let Some(first) = label.get_mut(..1) {
                    first.make_ascii_uppercase();
                }
                pending.push(
                    NewNotification::new(
                        format!("Goal Deadline: {label}"),
                        format!(
                            "Your health goal '{}' is due {phrase}. Current progress: {}%",
                            goal.description, goal.progress
                        ),
                    )
                    .kind(NotificationKind::Warning),
                );
            }

            let mut picked = Vec::new();
            for new in pending {
                if budget.remaining() == 0 {
                    break;
                }
                if budget.issued_today(&new.title) {
                    continue;
                }
                budget.record(&new.title);
                picked.push(new.expires_at(expiry));
            }
            picked
        })
    }

    /// Issues warnings for appointments between now and three days ahead.
    ///
    /// Each expires at the appointment time. Unparsable appointment dates are skipped.
    pub fn appointment_reminders(
        &self,
        username: &str,
        patient: &Patient,
        now: DateTime<Utc>,
    ) -> HealthResult<Vec<Notification>> {
        self.issue_within_budget(username, now, |budget| {
            let mut picked = Vec::new();

            for appointment in &patient.appointments {
                let Some(at) = parse_timestamp(&appointment.date) else {
                    if !appointment.date.trim().is_empty() {
                        tracing::warn!(
                            "skipping appointment with unreadable date '{}' for patient {}",
                            appointment.date,
                            patient.id
                        );
                    }
                    continue;
                };
                if at < now {
                    continue;
                }

                let days_until = (at.date_naive() - now.date_naive()).num_days();
                if days_until > LOOKAHEAD_DAYS {
                    continue;
                }

                let title = match days_until {
                    0 => "Appointment Today".to_owned(),
                    1 => "Upcoming Appointment: 1 day".to_owned(),
                    n => format!("Upcoming Appointment: {n} days"),
                };
                if budget.issued_today(&title) {
                    continue;
                }

                let kind = match appointment.kind.trim() {
                    "" => "medical appointment",
                    kind => kind,
                };
                let doctor = match appointment.doctor.trim() {
                    "" => "your doctor",
                    doctor => doctor,
                };
                budget.record(&title);
                picked.push(
                    NewNotification::new(
                        title,
                        format!(
                            "You have a {kind} with {doctor} on {}",
                            at.format("%A, %B %d at %I:%M %p")
                        ),
                    )
                    .kind(NotificationKind::Warning)
                    .expires_at(at),
                );
            }
            picked
        })
    }

    /// Issues at most one medication reminder for the day-part window containing `now`.
    ///
    /// Names the first active medication taken at that part of the day. When no active
    /// medication declares any timing, the first active medication is used instead.
    pub fn medication_reminders(
        &self,
        username: &str,
        medications: &[Medication],
        now: DateTime<Utc>,
    ) -> HealthResult<Option<Notification>> {
        let hour = now.hour();
        let Some((_, end_hour, title, part)) = MEDICATION_WINDOWS
            .iter()
            .find(|(start, end, _, _)| (*start..=*end).contains(&hour))
        else {
            return Ok(None);
        };

        let active: Vec<&Medication> = medications.iter().filter(|m| m.is_active()).collect();
        let untimed = active.iter().all(|m| m.data.timing.is_empty());
        let Some(medication) = active
            .iter()
            .find(|m| m.data.timing.contains(part))
            .or_else(|| untimed.then(|| active.first()).flatten())
        else {
            return Ok(None);
        };

        let dose = format!("{} {}", medication.data.name, medication.data.dosage);
        let mut message = format!("Time to take {}", dose.trim());
        if *part == DayPart::Bedtime {
            message.push_str(" before bed");
        }

        let window_end = NaiveTime::from_hms_opt(*end_hour, 59, 59).unwrap_or(NaiveTime::MIN);
        let expiry = now.date_naive().and_time(window_end).and_utc();
        let new = NewNotification::new(*title, message).expires_at(expiry);

        let created = self.issue_within_budget(username, now, |budget| {
            if budget.issued_today(title) {
                return Vec::new();
            }
            budget.record(title);
            vec![new]
        })?;
        Ok(created.into_iter().next())
    }

    /// Runs every generator for `username` using their linked patient record and buddy.
    pub fn generate_all(
        &self,
        username: &str,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> HealthResult<Vec<Notification>> {
        let patient = PatientService::new(Arc::clone(&self.db)).find_by_user(username)?;
        let mut created =
            self.scheduled_health_reminders(username, patient.as_ref(), now, rng)?;

        if let Some(buddy) = self.db.buddies.get(username)? {
            created.extend(self.buddy_reminders(username, &buddy, now)?);
        }

        if let Some(patient) = &patient {
            created.extend(self.appointment_reminders(username, patient, now)?);
            let medications =
                MedicationService::new(Arc::clone(&self.db)).active_for_patient(&patient.id)?;
            created.extend(self.medication_reminders(username, &medications, now)?);
        }

        tracing::info!("generated {} notification(s) for {}", created.len(), username);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::database::test_support::test_db;
    use crate::repositories::buddy::{BuddyReminder, HealthGoal, Recurrence};
    use crate::repositories::medications::MedicationData;
    use crate::repositories::patients::{Appointment, NewPatient};
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn roomy_db(dir: &std::path::Path) -> Arc<Database> {
        let cfg = CoreConfig::new(dir.to_path_buf())
            .expect("CoreConfig::new should succeed")
            .with_notification_limits(20, 8)
            .expect("limits should be valid");
        Database::open(Arc::new(cfg))
    }

    fn titles(notifications: &[Notification]) -> Vec<&str> {
        notifications.iter().map(|n| n.title.as_str()).collect()
    }

    #[test]
    fn test_title_issued_today_is_not_repeated_until_tomorrow() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = roomy_db(temp_dir.path());
        let reminders = ReminderService::new(Arc::clone(&db));
        let inbox = NotificationService::new(Arc::clone(&db));
        let mut rng = StdRng::seed_from_u64(5);

        inbox
            .create(
                "patient",
                NewNotification::new("Stay Hydrated", "drink"),
                at(3, 8),
            )
            .expect("create should succeed");

        let today = reminders
            .scheduled_health_reminders("patient", None, at(3, 9), &mut rng)
            .expect("generation should succeed");
        assert_eq!(today.len(), 7, "every other general reminder is issued");
        assert!(!titles(&today).contains(&"Stay Hydrated"));

        let again = reminders
            .scheduled_health_reminders("patient", None, at(3, 10), &mut rng)
            .expect("generation should succeed");
        assert!(again.is_empty(), "nothing left to issue today");

        let tomorrow = reminders
            .scheduled_health_reminders("patient", None, at(4, 9), &mut rng)
            .expect("generation should succeed");
        assert!(titles(&tomorrow).contains(&"Stay Hydrated"));
    }

    #[test]
    fn test_scheduled_respects_run_size_and_daily_cap() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = test_db(temp_dir.path());
        let reminders = ReminderService::new(Arc::clone(&db));
        let mut rng = StdRng::seed_from_u64(11);

        let mut issued = Vec::new();
        for hour in 8..12 {
            let run = reminders
                .scheduled_health_reminders("patient", None, at(3, hour), &mut rng)
                .expect("generation should succeed");
            assert!(run.len() <= 2);
            issued.extend(run);
        }
        assert_eq!(issued.len(), 5, "default daily cap");

        let mut unique = titles(&issued);
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 5);

        let expected_expiry = end_of_day(at(3, 8));
        assert!(issued.iter().all(|n| n.expiry == Some(expected_expiry)));
        assert!(issued.iter().all(|n| n.kind == NotificationKind::Info));
    }

    #[test]
    fn test_concurrent_runs_share_one_daily_cap() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = test_db(temp_dir.path());

        std::thread::scope(|scope| {
            for seed in 0..16 {
                let reminders = ReminderService::new(Arc::clone(&db));
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    reminders
                        .scheduled_health_reminders("patient", None, at(3, 9), &mut rng)
                        .expect("generation should succeed");
                });
            }
        });

        let stored = NotificationService::new(Arc::clone(&db))
            .all("patient")
            .expect("inbox should load");
        assert_eq!(stored.len(), 5, "default daily cap holds across threads");

        let mut unique = titles(&stored);
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), stored.len(), "no title repeats within the day");
    }

    #[test]
    fn test_personalised_candidates() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let patients = PatientService::new(test_db(temp_dir.path()));

        let mut new = NewPatient::new("Jane Doe");
        new.age = Some(62);
        new.medical_history = vec!["Type 2 Diabetes".into(), "Hypertension".into()];
        let mut patient = patients.create(new).expect("create should succeed");

        let found: Vec<&str> = reminder_candidates(Some(&patient))
            .into_iter()
            .map(|(title, _)| title)
            .collect();
        assert!(found.contains(&"Health Screening Reminder"));
        assert!(found.contains(&"Blood Sugar Check"));
        assert!(found.contains(&"Blood Pressure Check"));
        assert!(!found.contains(&"Heart Health"));

        patient.age = Some(40);
        patient.medical_history.clear();
        assert_eq!(reminder_candidates(Some(&patient)).len(), GENERAL_REMINDERS.len());
    }

    #[test]
    fn test_buddy_reminders() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = roomy_db(temp_dir.path());
        let reminders = ReminderService::new(Arc::clone(&db));
        let mut rng = StdRng::seed_from_u64(1);

        let mut buddy = BuddyProfile::new("Health Buddy", at(1, 8), &mut rng);
        buddy.streak = 7;
        for (i, title) in ["Walk", "Stretch", "Meditate"].iter().enumerate() {
            buddy.reminders.push(BuddyReminder {
                id: format!("r{i}"),
                title: (*title).into(),
                time: "09:00".into(),
                recurrence: Recurrence::Daily,
                notes: String::new(),
                created_at: None,
                completed: false,
            });
        }
        buddy.health_goals.push(HealthGoal {
            id: "g1".into(),
            description: "Lose 2kg".into(),
            created_at: None,
            target_date: Some(at(5, 12)),
            completed: false,
            progress: 40,
            check_ins: Vec::new(),
        });

        let created = reminders
            .buddy_reminders("patient", &buddy, at(3, 9))
            .expect("generation should succeed");
        assert_eq!(
            titles(&created),
            vec![
                "Streak Milestone!",
                "Reminder: Walk",
                "Reminder: Stretch",
                "Goal Deadline: In 2 days"
            ]
        );
        assert!(created[3].message.contains("Current progress: 40%"));
        assert!(created
            .iter()
            .all(|n| n.expiry == Some(at(3, 9) + Duration::days(1))));

        let second = reminders
            .buddy_reminders("patient", &buddy, at(3, 10))
            .expect("generation should succeed");
        assert_eq!(titles(&second), vec!["Reminder: Meditate"]);
    }

    #[test]
    fn test_appointment_reminders() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = test_db(temp_dir.path());
        let reminders = ReminderService::new(Arc::clone(&db));

        let mut new = NewPatient::new("Jane Doe");
        new.appointments = vec![
            Appointment {
                date: "2024-06-03T15:30:00".into(),
                kind: "Follow-up".into(),
                doctor: "Dr. John Smith".into(),
            },
            Appointment {
                date: "2024-06-05 10:00:00".into(),
                kind: String::new(),
                doctor: String::new(),
            },
            Appointment {
                date: "2024-06-20 10:00:00".into(),
                ..Appointment::default()
            },
            Appointment {
                date: "soon".into(),
                ..Appointment::default()
            },
        ];
        let patient = PatientService::new(Arc::clone(&db))
            .create(new)
            .expect("create should succeed");

        let created = reminders
            .appointment_reminders("patient", &patient, at(3, 9))
            .expect("generation should succeed");
        assert_eq!(
            titles(&created),
            vec!["Appointment Today", "Upcoming Appointment: 2 days"]
        );
        assert!(created[0].message.contains("Follow-up with Dr. John Smith"));
        assert!(created[1].message.contains("medical appointment with your doctor"));
        assert_eq!(created[0].kind, NotificationKind::Warning);
        assert_eq!(
            created[0].expiry,
            parse_timestamp("2024-06-03T15:30:00")
        );

        let again = reminders
            .appointment_reminders("patient", &patient, at(3, 11))
            .expect("generation should succeed");
        assert!(again.is_empty());
    }

    #[test]
    fn test_medication_reminder_windows() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = test_db(temp_dir.path());
        let reminders = ReminderService::new(Arc::clone(&db));
        let meds = MedicationService::new(Arc::clone(&db));

        let mut evening = MedicationData::new("Metformin");
        evening.dosage = "500mg".into();
        evening.timing = [DayPart::Evening].into_iter().collect();
        meds.add("PT0001", evening, "doctor")
            .expect("add should succeed");
        let active = meds
            .active_for_patient("PT0001")
            .expect("active_for_patient should succeed");

        assert!(reminders
            .medication_reminders("patient", &active, at(3, 9))
            .expect("generation should succeed")
            .is_none(), "nothing is taken in the morning");
        assert!(reminders
            .medication_reminders("patient", &active, at(3, 16))
            .expect("generation should succeed")
            .is_none(), "outside every window");

        let created = reminders
            .medication_reminders("patient", &active, at(3, 19))
            .expect("generation should succeed")
            .expect("evening reminder");
        assert_eq!(created.title, "Evening Medication");
        assert_eq!(created.message, "Time to take Metformin 500mg");
        assert_eq!(
            created.expiry,
            Some(
                Utc.with_ymd_and_hms(2024, 6, 3, 20, 59, 59)
                    .single()
                    .expect("valid timestamp")
            )
        );

        assert!(reminders
            .medication_reminders("patient", &active, at(3, 20))
            .expect("generation should succeed")
            .is_none(), "one reminder per window per day");
    }

    #[test]
    fn test_untimed_medication_used_at_bedtime() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = test_db(temp_dir.path());
        let reminders = ReminderService::new(Arc::clone(&db));
        let meds = MedicationService::new(Arc::clone(&db));

        meds.add("PT0001", MedicationData::new("Melatonin"), "doctor")
            .expect("add should succeed");
        let active = meds
            .active_for_patient("PT0001")
            .expect("active_for_patient should succeed");

        let created = reminders
            .medication_reminders("patient", &active, at(3, 22))
            .expect("generation should succeed")
            .expect("bedtime reminder");
        assert_eq!(created.title, "Bedtime Medication");
        assert_eq!(created.message, "Time to take Melatonin before bed");
    }

    #[test]
    fn test_generate_all_uses_linked_records() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = test_db(temp_dir.path());
        let reminders = ReminderService::new(Arc::clone(&db));
        let mut rng = StdRng::seed_from_u64(2);

        let mut new = NewPatient::new("Jane Doe");
        new.user_id = Some("patient".into());
        let patient = PatientService::new(Arc::clone(&db))
            .create(new)
            .expect("create should succeed");
        MedicationService::new(Arc::clone(&db))
            .add(&patient.id, MedicationData::new("Aspirin"), "doctor")
            .expect("add should succeed");

        let created = reminders
            .generate_all("patient", at(3, 9), &mut rng)
            .expect("generate_all should succeed");
        assert_eq!(created.len(), 3);
        assert!(titles(&created).contains(&"Morning Medication"));

        let stored = NotificationService::new(db)
            .all("patient")
            .expect("all should succeed");
        assert_eq!(stored.len(), 3);
    }
}
