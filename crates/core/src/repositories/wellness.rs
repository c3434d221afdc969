//! Daily wellness score history per user.

use crate::database::Database;
use crate::error::HealthResult;
use crate::metrics::{gaussian, linspace, wellness_score, WellnessSnapshot};
use crate::timestamps::deserialize_optional_timestamp;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Components tracked from the first day.
pub const WELLNESS_COMPONENTS: &[&str] = &["physical", "mental", "nutrition", "sleep", "activity"];

const SEED_DAYS: usize = 31;
const PADDING_SCORE: u8 = 50;

/// Trend windows look at this many recent scores.
pub const TREND_WINDOW: usize = 7;

/// A swing larger than this within the window counts as volatile.
pub const VOLATILITY_RANGE: u8 = 20;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WellnessActivity {
    pub activity: String,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthInsight {
    pub insight: String,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// `dates[i]` is the day of `overall_scores[i]`. Component histories are aligned to `dates`
/// when written by this module, but may be shorter in older data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WellnessProfile {
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    #[serde(default)]
    pub overall_scores: Vec<u8>,
    #[serde(default)]
    pub component_scores: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    pub health_insights: Vec<HealthInsight>,
    #[serde(default)]
    pub wellness_activities: Vec<WellnessActivity>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn clamp_score(value: f64) -> u8 {
    value.clamp(0.0, 100.0) as u8
}

fn vary(score: u8, rng: &mut impl Rng, low: i32, high: i32) -> u8 {
    (i32::from(score) + rng.gen_range(low..=high)).clamp(0, 100) as u8
}

/// Writes `score` as the value for day number `days`, padding a lagging history first.
fn set_latest(history: &mut Vec<u8>, days: usize, score: u8) {
    let score = score.min(100);
    if history.len() != days {
        history.resize(days.saturating_sub(1), PADDING_SCORE);
        history.push(score);
    } else if let Some(last) = history.last_mut() {
        *last = score;
    }
}

/// A stable RNG seed derived from the username.
fn username_seed(username: &str) -> u64 {
    let digest = Sha256::digest(username.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

impl WellnessProfile {
    /// Thirty-one days of synthetic history ending on `now`'s date.
    ///
    /// Scores climb from about 60 to 75 with noise. The same username always yields the same
    /// scores.
    pub fn seeded(username: &str, now: DateTime<Utc>) -> Self {
        let mut rng = StdRng::seed_from_u64(username_seed(username));
        let start = now.date_naive() - Duration::days(SEED_DAYS as i64 - 1);
        let dates: Vec<NaiveDate> = (0..SEED_DAYS)
            .map(|i| start + Duration::days(i as i64))
            .collect();

        let overall_scores: Vec<u8> = linspace(60.0, 75.0, SEED_DAYS)
            .map(|base| clamp_score(base + gaussian(&mut rng, 0.0, 5.0)))
            .collect();

        let shapes: [(&str, f64, f64); 5] = [
            ("physical", -5.0, 10.0),
            ("mental", 5.0, 8.0),
            ("nutrition", -2.0, 7.0),
            ("sleep", 2.0, 15.0),
            ("activity", 0.0, 12.0),
        ];
        let component_scores = shapes
            .iter()
            .map(|(name, offset, spread)| {
                let history = overall_scores
                    .iter()
                    .map(|score| {
                        clamp_score(gaussian(&mut rng, f64::from(*score) + offset, *spread))
                    })
                    .collect();
                ((*name).to_owned(), history)
            })
            .collect();

        Self {
            dates,
            overall_scores,
            component_scores,
            health_insights: Vec::new(),
            wellness_activities: Vec::new(),
            last_updated: Some(now),
            extra: Map::new(),
        }
    }

    pub fn latest_score(&self) -> Option<u8> {
        self.overall_scores.last().copied()
    }

    /// Latest value of every component.
    pub fn latest_components(&self) -> BTreeMap<String, u8> {
        self.component_scores
            .iter()
            .filter_map(|(name, history)| Some((name.clone(), *history.last()?)))
            .collect()
    }

    /// Records `update` for `now`'s date.
    ///
    /// A supplied snapshot is scored with [`wellness_score`] first; explicit overall and
    /// component values take precedence over the derived ones.
    ///
    /// A new day gets a new entry; without an explicit overall score it drifts from the previous
    /// day by -3 to +5 (or starts between 60 and 80), and without explicit components each
    /// existing component lands within 10 of the overall score. On a day that already has an
    /// entry, only the supplied values are overwritten. Component histories that fell behind are
    /// padded with 50 before today's value is written.
    pub fn record(&mut self, update: WellnessUpdate, now: DateTime<Utc>, rng: &mut impl Rng) {
        let today = now.date_naive();
        let mut overall = update.overall;
        let mut components = update.components;
        if let Some(snapshot) = &update.snapshot {
            let (derived, derived_components) = wellness_score(snapshot, rng);
            overall = overall.or(Some(derived));
            for (name, score) in derived_components {
                components.entry(name).or_insert(score);
            }
        }

        if self.dates.last() != Some(&today) {
            self.dates.push(today);
            let overall = overall.unwrap_or_else(|| match self.overall_scores.last() {
                Some(previous) => vary(*previous, rng, -3, 5),
                None => rng.gen_range(60..=80),
            });
            set_latest(&mut self.overall_scores, self.dates.len(), overall);

            if components.is_empty() {
                let names: Vec<String> = if self.component_scores.is_empty() {
                    WELLNESS_COMPONENTS.iter().map(|c| (*c).to_owned()).collect()
                } else {
                    self.component_scores.keys().cloned().collect()
                };
                components = names
                    .into_iter()
                    .map(|name| (name, vary(overall, rng, -10, 10)))
                    .collect();
            }
        } else if let Some(overall) = overall {
            set_latest(&mut self.overall_scores, self.dates.len(), overall);
        }

        let days = self.dates.len();
        for (name, score) in components {
            set_latest(self.component_scores.entry(name).or_default(), days, score);
        }

        if let Some(activity) = update.activity.filter(|a| !a.trim().is_empty()) {
            self.wellness_activities.push(WellnessActivity {
                activity,
                date: today,
                timestamp: Some(now),
            });
        }
        if let Some(insight) = update.insight.filter(|i| !i.trim().is_empty()) {
            self.health_insights.push(HealthInsight {
                insight,
                date: today,
                timestamp: Some(now),
            });
        }

        self.last_updated = Some(now);
    }
}

/// Input for [`WellnessService::record_day`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct WellnessUpdate {
    #[serde(default)]
    pub overall: Option<u8>,
    #[serde(default)]
    pub components: BTreeMap<String, u8>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub insight: Option<String>,
    /// Raw measurements to score when `overall` or a component is not given.
    #[serde(default)]
    pub snapshot: Option<WellnessSnapshot>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WellnessTrend {
    Declining,
    Improving,
    Volatile,
    Steady,
    InsufficientData,
}

/// Classifies the last [`TREND_WINDOW`] scores.
///
/// A window that never rises (and is not flat) is declining, one that never falls (and is not
/// flat) is improving. Otherwise a swing above [`VOLATILITY_RANGE`] is volatile.
pub fn trend(scores: &[u8]) -> WellnessTrend {
    if scores.len() < TREND_WINDOW {
        return WellnessTrend::InsufficientData;
    }

    let window = &scores[scores.len() - TREND_WINDOW..];
    let never_rises = window.windows(2).all(|w| w[1] <= w[0]);
    let never_falls = window.windows(2).all(|w| w[1] >= w[0]);
    let flat = never_rises && never_falls;

    if never_rises && !flat {
        WellnessTrend::Declining
    } else if never_falls && !flat {
        WellnessTrend::Improving
    } else if is_volatile(window) {
        WellnessTrend::Volatile
    } else {
        WellnessTrend::Steady
    }
}

fn is_volatile(window: &[u8]) -> bool {
    match (window.iter().max(), window.iter().min()) {
        (Some(max), Some(min)) => max - min > VOLATILITY_RANGE,
        _ => false,
    }
}

/// Advice for an overall score, its components, and the recent history.
pub fn insights(overall: u8, components: &BTreeMap<String, u8>, history: &[u8]) -> Vec<String> {
    let headline = match overall {
        90..=u8::MAX => "Your overall wellness score is excellent! Keep up the great work with your healthy habits.",
        80..=89 => "You're doing very well with your overall wellness. Small improvements in weaker areas could boost your health even further.",
        70..=79 => "Your wellness score is good, but there's room for improvement in some areas. Focus on the components with lower scores.",
        60..=69 => "Your wellness score is average. Consider making some lifestyle changes to improve your overall health and well-being.",
        _ => "Your wellness score indicates that your health habits need attention. Focus on making gradual improvements in all areas.",
    };
    let mut out = vec![headline.to_owned()];

    for (component, score) in components {
        if *score >= 70 {
            continue;
        }
        let advice = match component.as_str() {
            "physical" => "Consider scheduling a check-up with your doctor to monitor your physical health metrics.",
            "mental" => "Your mental wellness score suggests you might benefit from stress-reduction activities like meditation or mindfulness.",
            "nutrition" => "Try incorporating more fruits, vegetables, and whole foods into your diet to improve your nutrition score.",
            "sleep" => "Your sleep score is lower than ideal. Consider establishing a regular sleep schedule and creating a restful bedroom environment.",
            "activity" => "Increasing your daily physical activity, even with short walks, could significantly improve your activity score.",
            _ => continue,
        };
        out.push(advice.to_owned());
    }

    match trend(history) {
        WellnessTrend::Declining => out.push("Your wellness score has been declining over the past week. Consider what factors might be affecting your health habits.".to_owned()),
        WellnessTrend::Improving => out.push("Great job! Your wellness score has been improving consistently over the past week.".to_owned()),
        _ => {}
    }
    if history.len() >= TREND_WINDOW && is_volatile(&history[history.len() - TREND_WINDOW..]) {
        out.push("Your wellness score has been fluctuating significantly. More consistent health habits may help stabilize your well-being.".to_owned());
    }

    out
}

#[derive(Clone, Debug)]
pub struct WellnessService {
    db: Arc<Database>,
}

impl WellnessService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Returns the user's history, seeding it on first access.
    pub fn get_or_create(&self, username: &str, now: DateTime<Utc>) -> HealthResult<WellnessProfile> {
        let (profile, created) = self
            .db
            .wellness
            .get_or_insert_with(username, || WellnessProfile::seeded(username, now))?;
        if created {
            tracing::info!("seeded wellness history for {}", username);
        }
        Ok(profile)
    }

    pub fn record_day(
        &self,
        username: &str,
        update: WellnessUpdate,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> HealthResult<WellnessProfile> {
        Ok(self.db.wellness.modify_or_insert_with(
            username,
            || WellnessProfile::seeded(username, now),
            |profile| {
                profile.record(update, now, rng);
                profile.clone()
            },
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::test_db;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn test_seeded_profile_is_stable_per_user() {
        let a = WellnessProfile::seeded("patient", day(30));
        let b = WellnessProfile::seeded("patient", day(30));
        let other = WellnessProfile::seeded("doctor", day(30));

        assert_eq!(a, b);
        assert_ne!(a.overall_scores, other.overall_scores);
        assert_eq!(a.dates.len(), 31);
        assert_eq!(a.dates.last(), Some(&day(30).date_naive()));
        for component in WELLNESS_COMPONENTS {
            assert_eq!(a.component_scores[*component].len(), 31);
        }
        assert!(a.overall_scores.iter().all(|s| *s <= 100));
    }

    #[test]
    fn test_record_new_day_then_overwrite_today() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut profile = WellnessProfile::seeded("patient", day(10));

        profile.record(WellnessUpdate::default(), day(11), &mut rng);
        assert_eq!(profile.dates.len(), 32);
        assert_eq!(profile.overall_scores.len(), 32);
        assert!(profile.component_scores.values().all(|h| h.len() == 32));

        let update = WellnessUpdate {
            overall: Some(88),
            components: [("sleep".to_owned(), 95)].into_iter().collect(),
            activity: Some("Yoga".into()),
            ..WellnessUpdate::default()
        };
        profile.record(update, day(11), &mut rng);
        assert_eq!(profile.dates.len(), 32, "same day does not add an entry");
        assert_eq!(profile.latest_score(), Some(88));
        assert_eq!(profile.latest_components()["sleep"], 95);
        assert_eq!(profile.wellness_activities.len(), 1);
    }

    #[test]
    fn test_new_component_is_padded() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut profile = WellnessProfile::seeded("patient", day(10));

        let update = WellnessUpdate {
            components: [("hydration".to_owned(), 70)].into_iter().collect(),
            ..WellnessUpdate::default()
        };
        profile.record(update, day(10), &mut rng);

        let hydration = &profile.component_scores["hydration"];
        assert_eq!(hydration.len(), 31);
        assert!(hydration[..30].iter().all(|s| *s == 50));
        assert_eq!(hydration[30], 70);
    }

    #[test]
    fn test_snapshot_is_scored_and_explicit_values_win() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut profile = WellnessProfile::seeded("patient", day(10));

        let snapshot = WellnessSnapshot {
            steps: Some(10_000),
            sleep_hours: Some(8.0),
            heart_rate: Some(70),
            nutrition: Some(80),
            mental: Some(60),
            medication_adherence: None,
        };
        let update = WellnessUpdate {
            components: [("mental".to_owned(), 95)].into_iter().collect(),
            snapshot: Some(snapshot.clone()),
            ..WellnessUpdate::default()
        };
        profile.record(update, day(11), &mut rng);

        let (expected, _) = wellness_score(&snapshot, &mut rng);
        let latest = profile.latest_components();
        assert_eq!(profile.latest_score(), Some(expected));
        assert_eq!(latest["activity"], 100);
        assert_eq!(latest["sleep"], 100);
        assert_eq!(latest["nutrition"], 80);
        assert_eq!(latest["mental"], 95, "explicit component overrides the snapshot");
        assert_eq!(profile.dates.len(), 32);
    }

    #[test]
    fn test_trend_classification() {
        assert_eq!(trend(&[70, 71]), WellnessTrend::InsufficientData);
        assert_eq!(trend(&[80, 78, 78, 75, 74, 70, 69]), WellnessTrend::Declining);
        assert_eq!(trend(&[10, 60, 61, 62, 62, 65, 70, 71]), WellnessTrend::Improving);
        assert_eq!(trend(&[60, 85, 62, 80, 61, 70, 65]), WellnessTrend::Volatile);
        assert_eq!(trend(&[70, 72, 71, 70, 72, 71, 70]), WellnessTrend::Steady);
        assert_eq!(trend(&[70; 7]), WellnessTrend::Steady);
    }

    #[test]
    fn test_insights() {
        let components: BTreeMap<String, u8> =
            [("sleep".to_owned(), 40), ("mental".to_owned(), 90)].into_iter().collect();
        let out = insights(92, &components, &[60, 61, 62, 63, 64, 65, 66]);

        assert!(out[0].contains("excellent"));
        assert!(out.iter().any(|i| i.contains("sleep score is lower")));
        assert!(!out.iter().any(|i| i.contains("mental wellness")));
        assert!(out.iter().any(|i| i.contains("improving consistently")));
    }

    #[test]
    fn test_service_seeds_once_and_records() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let wellness = WellnessService::new(test_db(temp_dir.path()));
        let mut rng = StdRng::seed_from_u64(3);

        let first = wellness
            .get_or_create("patient", day(10))
            .expect("get_or_create should succeed");
        let again = wellness
            .get_or_create("patient", day(12))
            .expect("get_or_create should succeed");
        assert_eq!(first, again);

        let update = WellnessUpdate {
            overall: Some(77),
            ..WellnessUpdate::default()
        };
        let recorded = wellness
            .record_day("patient", update, day(11), &mut rng)
            .expect("record_day should succeed");
        assert_eq!(recorded.latest_score(), Some(77));
        assert_eq!(recorded.dates.len(), 32);
    }
}
