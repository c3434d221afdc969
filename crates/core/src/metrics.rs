//! Derived health metrics: BMI, the composite wellness score, and synthetic activity series.
//!
//! Everything here is a pure function of its inputs. Randomised defaults take the RNG as an
//! argument.

use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// BMI
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BmiCategory {
    Underweight,
    #[serde(rename = "Normal weight")]
    NormalWeight,
    Overweight,
    Obesity,
}

impl BmiCategory {
    pub fn from_value(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::NormalWeight
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obesity
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::NormalWeight => "Normal weight",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obesity => "Obesity",
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bmi {
    /// Rounded to two decimal places.
    pub value: f64,
    pub category: BmiCategory,
}

/// Body mass index from height in centimetres and weight in kilograms.
///
/// Returns `None` unless both measurements are positive and finite. The category is taken from
/// the unrounded value.
pub fn bmi(height_cm: f64, weight_kg: f64) -> Option<Bmi> {
    if !(height_cm.is_finite() && weight_kg.is_finite()) || height_cm <= 0.0 || weight_kg <= 0.0 {
        return None;
    }

    let height_m = height_cm / 100.0;
    let raw = weight_kg / (height_m * height_m);
    Some(Bmi {
        value: (raw * 100.0).round() / 100.0,
        category: BmiCategory::from_value(raw),
    })
}

// ============================================================================
// WELLNESS SCORE
// ============================================================================

/// One day's raw inputs to the wellness score. Missing values fall back to defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WellnessSnapshot {
    pub steps: Option<u32>,
    pub sleep_hours: Option<f64>,
    pub heart_rate: Option<u32>,
    pub nutrition: Option<u8>,
    pub mental: Option<u8>,
    pub medication_adherence: Option<u8>,
}

const COMPONENT_WEIGHTS: &[(&str, f64)] = &[
    ("activity", 0.15),
    ("sleep", 0.20),
    ("physical", 0.15),
    ("nutrition", 0.20),
    ("mental", 0.20),
    ("medication_adherence", 0.10),
];

const DEFAULT_COMPONENT_WEIGHT: f64 = 0.1;

fn component_weight(component: &str) -> f64 {
    COMPONENT_WEIGHTS
        .iter()
        .find(|(name, _)| *name == component)
        .map_or(DEFAULT_COMPONENT_WEIGHT, |(_, weight)| *weight)
}

/// Activity score against a 10,000 step target.
pub fn steps_score(steps: u32) -> u8 {
    (f64::from(steps) / 10_000.0 * 100.0).min(100.0) as u8
}

/// Sleep score, 100 for seven to nine hours.
pub fn sleep_score(hours: f64) -> u8 {
    let score = if (7.0..=9.0).contains(&hours) {
        100.0
    } else if hours < 7.0 {
        hours.max(0.0) / 7.0 * 100.0
    } else {
        (100.0 - (hours - 9.0) * 10.0).max(60.0)
    };
    score as u8
}

/// Resting heart rate score, 100 for 60 to 100 bpm.
pub fn heart_rate_score(bpm: u32) -> u8 {
    let bpm = i64::from(bpm);
    let score = if (60..=100).contains(&bpm) {
        100
    } else if bpm < 60 {
        (100 - (60 - bpm) * 2).max(70)
    } else {
        (100 - (bpm - 100) * 3).max(0)
    };
    score as u8
}

fn default_component(rng: &mut impl Rng) -> u8 {
    rng.gen_range(60..=80)
}

/// Computes the overall wellness score and its components.
///
/// Components are `activity` (steps), `sleep`, `physical` (heart rate), `nutrition`, `mental`
/// and, when supplied, `medication_adherence`. A missing input yields a random component score
/// between 60 and 80. The overall score is the weighted mean of the components present.
pub fn wellness_score(snapshot: &WellnessSnapshot, rng: &mut impl Rng) -> (u8, BTreeMap<String, u8>) {
    let mut components = BTreeMap::new();

    let activity = snapshot
        .steps
        .map_or_else(|| default_component(rng), steps_score);
    components.insert("activity".to_owned(), activity);

    let sleep = snapshot
        .sleep_hours
        .map_or_else(|| default_component(rng), sleep_score);
    components.insert("sleep".to_owned(), sleep);

    let physical = snapshot
        .heart_rate
        .map_or_else(|| default_component(rng), heart_rate_score);
    components.insert("physical".to_owned(), physical);

    let nutrition = snapshot
        .nutrition
        .map_or_else(|| default_component(rng), |n| n.min(100));
    components.insert("nutrition".to_owned(), nutrition);

    let mental = snapshot
        .mental
        .map_or_else(|| default_component(rng), |m| m.min(100));
    components.insert("mental".to_owned(), mental);

    if let Some(adherence) = snapshot.medication_adherence {
        components.insert("medication_adherence".to_owned(), adherence.min(100));
    }

    (weighted_overall(&components), components)
}

fn weighted_overall(components: &BTreeMap<String, u8>) -> u8 {
    let (sum, total_weight) = components
        .iter()
        .fold((0.0, 0.0), |(sum, total), (name, score)| {
            let weight = component_weight(name);
            (sum + f64::from(*score) * weight, total + weight)
        });

    if total_weight > 0.0 {
        (sum / total_weight).round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}

// ============================================================================
// SYNTHETIC SERIES
// ============================================================================

/// A normally distributed sample via the Box-Muller transform.
pub(crate) fn gaussian(rng: &mut impl Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub(crate) fn linspace(start: f64, end: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 {
        (end - start) / (n - 1) as f64
    } else {
        0.0
    };
    (0..n).map(move |i| start + step * i as f64)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthSample {
    pub date: NaiveDate,
    pub steps: u32,
    pub sleep_hours: f64,
    pub heart_rate: u32,
}

const SAMPLE_SEED: u64 = 42;

/// Longest series [`sample_health_series`] produces.
pub const MAX_SAMPLE_DAYS: usize = 366;

/// Synthetic daily activity for the `days` days ending on `end`, for demonstration dashboards.
///
/// `days` is capped at [`MAX_SAMPLE_DAYS`]. Output is deterministic for a given `days`, `end`
/// and `with_randomness`. With randomness, the first five days of every seven get an activity
/// boost and a small sleep penalty, plus Gaussian noise.
pub fn sample_health_series(days: usize, end: NaiveDate, with_randomness: bool) -> Vec<HealthSample> {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let days = days.min(MAX_SAMPLE_DAYS);
    let start = end - Duration::days(days.saturating_sub(1) as i64);

    linspace(7000.0, 9000.0, days)
        .zip(linspace(6.5, 7.5, days))
        .zip(linspace(72.0, 68.0, days))
        .enumerate()
        .map(|(i, ((steps, sleep), heart_rate))| {
            let (steps, sleep, heart_rate) = if with_randomness {
                let weekday = if i % 7 >= 5 { 0.0 } else { 1.0 };
                (
                    steps + weekday * 1500.0 + gaussian(&mut rng, 0.0, 500.0),
                    sleep - weekday * 0.5 + gaussian(&mut rng, 0.0, 0.3),
                    heart_rate + gaussian(&mut rng, 0.0, 2.0),
                )
            } else {
                (steps, sleep, heart_rate)
            };

            HealthSample {
                date: start + Duration::days(i as i64),
                steps: steps.clamp(2000.0, 15000.0) as u32,
                sleep_hours: sleep.clamp(4.0, 10.0),
                heart_rate: heart_rate.clamp(50.0, 100.0) as u32,
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub iso_year: i32,
    pub iso_week: u32,
    /// Earliest sample date in the week.
    pub start: NaiveDate,
    pub days: usize,
    pub avg_steps: f64,
    pub avg_sleep_hours: f64,
    pub avg_heart_rate: f64,
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Groups samples by ISO week and averages each metric, in chronological order.
pub fn weekly_summary(series: &[HealthSample]) -> Vec<WeeklySummary> {
    let mut weeks: BTreeMap<(i32, u32), Vec<&HealthSample>> = BTreeMap::new();
    for sample in series {
        let week = sample.date.iso_week();
        weeks
            .entry((week.year(), week.week()))
            .or_default()
            .push(sample);
    }

    weeks
        .into_iter()
        .filter_map(|((iso_year, iso_week), samples)| {
            let start = samples.iter().map(|s| s.date).min()?;
            let steps: Vec<f64> = samples.iter().map(|s| f64::from(s.steps)).collect();
            let sleep: Vec<f64> = samples.iter().map(|s| s.sleep_hours).collect();
            let heart: Vec<f64> = samples.iter().map(|s| f64::from(s.heart_rate)).collect();

            Some(WeeklySummary {
                iso_year,
                iso_week,
                start,
                days: samples.len(),
                avg_steps: average(&steps)?,
                avg_sleep_hours: average(&sleep)?,
                avg_heart_rate: average(&heart)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmi_normal_weight_scenario() {
        let result = bmi(170.0, 70.0).expect("bmi should be computed");
        assert_eq!(result.value, 24.22);
        assert_eq!(result.category, BmiCategory::NormalWeight);
        assert_eq!(result.category.to_string(), "Normal weight");
    }

    #[test]
    fn test_bmi_category_thresholds() {
        assert_eq!(BmiCategory::from_value(18.4), BmiCategory::Underweight);
        assert_eq!(BmiCategory::from_value(18.5), BmiCategory::NormalWeight);
        assert_eq!(BmiCategory::from_value(25.0), BmiCategory::Overweight);
        assert_eq!(BmiCategory::from_value(30.0), BmiCategory::Obesity);
    }

    #[test]
    fn test_bmi_rejects_non_positive_measurements() {
        assert!(bmi(0.0, 70.0).is_none());
        assert!(bmi(170.0, -1.0).is_none());
        assert!(bmi(f64::NAN, 70.0).is_none());
    }

    #[test]
    fn test_component_formulas() {
        assert_eq!(steps_score(5000), 50);
        assert_eq!(steps_score(25_000), 100);

        assert_eq!(sleep_score(8.0), 100);
        assert_eq!(sleep_score(3.5), 50);
        assert_eq!(sleep_score(11.0), 80);
        assert_eq!(sleep_score(20.0), 60);

        assert_eq!(heart_rate_score(72), 100);
        assert_eq!(heart_rate_score(50), 80);
        assert_eq!(heart_rate_score(30), 70);
        assert_eq!(heart_rate_score(110), 70);
        assert_eq!(heart_rate_score(200), 0);
    }

    #[test]
    fn test_wellness_score_with_full_snapshot() {
        let snapshot = WellnessSnapshot {
            steps: Some(10_000),
            sleep_hours: Some(8.0),
            heart_rate: Some(70),
            nutrition: Some(50),
            mental: Some(50),
            medication_adherence: Some(100),
        };
        let mut rng = StdRng::seed_from_u64(1);
        let (overall, components) = wellness_score(&snapshot, &mut rng);

        assert_eq!(components.len(), 6);
        assert_eq!(components["activity"], 100);
        assert_eq!(components["nutrition"], 50);
        // (100*.15 + 100*.2 + 100*.15 + 50*.2 + 50*.2 + 100*.1) / 1.0
        assert_eq!(overall, 80);
    }

    #[test]
    fn test_wellness_score_defaults_are_in_range() {
        let mut rng = StdRng::seed_from_u64(9);
        let (overall, components) = wellness_score(&WellnessSnapshot::default(), &mut rng);

        assert_eq!(components.len(), 5);
        assert!(components.values().all(|s| (60..=80).contains(s)));
        assert!((60..=80).contains(&overall));
    }

    #[test]
    fn test_sample_series_is_deterministic_and_clipped() {
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).expect("valid date");
        let first = sample_health_series(30, end, true);
        let second = sample_health_series(30, end, true);

        assert_eq!(first, second);
        assert_eq!(first.len(), 30);
        assert_eq!(first[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"));
        assert_eq!(first[29].date, end);
        assert!(first.iter().all(|s| (2000..=15000).contains(&s.steps)));
        assert!(first.iter().all(|s| (4.0..=10.0).contains(&s.sleep_hours)));
        assert!(first.iter().all(|s| (50..=100).contains(&s.heart_rate)));
    }

    #[test]
    fn test_sample_series_without_randomness_follows_trend() {
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).expect("valid date");
        let series = sample_health_series(3, end, false);

        let steps: Vec<u32> = series.iter().map(|s| s.steps).collect();
        assert_eq!(steps, vec![7000, 8000, 9000]);
        assert_eq!(series[2].heart_rate, 68);
    }

    #[test]
    fn test_sample_series_length_is_capped() {
        let end = NaiveDate::from_ymd_opt(2024, 6, 9).expect("valid date");
        let series = sample_health_series(usize::MAX, end, false);
        assert_eq!(series.len(), MAX_SAMPLE_DAYS);
        assert_eq!(series.last().map(|s| s.date), Some(end));
    }

    #[test]
    fn test_weekly_summary_groups_by_iso_week() {
        // 2024-06-01 is a Saturday; 06-03 starts ISO week 23.
        let end = NaiveDate::from_ymd_opt(2024, 6, 9).expect("valid date");
        let series = sample_health_series(9, end, false);
        let weeks = weekly_summary(&series);

        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].iso_week, 22);
        assert_eq!(weeks[0].days, 2);
        assert_eq!(weeks[1].iso_week, 23);
        assert_eq!(weeks[1].days, 7);
        assert_eq!(weeks[1].start, NaiveDate::from_ymd_opt(2024, 6, 3).expect("valid date"));

        let expected = average(&series[2..].iter().map(|s| f64::from(s.steps)).collect::<Vec<_>>())
            .expect("non-empty");
        assert_eq!(weeks[1].avg_steps, expected);
    }

    #[test]
    fn test_average() {
        assert_eq!(average(&[]), None);
        assert_eq!(average(&[1.0, 2.0, 3.0]), Some(2.0));
    }
}
