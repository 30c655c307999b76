//! WHOOP developer API (v2) response structures.
//!
//! Only the fields the relay reshapes are modelled; everything is optional
//! because unscored records arrive with `score` missing.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// WHOOP pagination wrapper for collection endpoints
#[derive(Debug, Deserialize)]
pub struct Paginated<T> {
    pub records: Vec<T>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// `score_state` values: SCORED, PENDING_SCORE, UNSCORABLE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreState {
    Scored,
    PendingScore,
    Unscorable,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct Cycle {
    pub id: i64,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub timezone_offset: Option<String>,
    pub score_state: Option<ScoreState>,
    pub score: Option<CycleScore>,
}

#[derive(Debug, Deserialize)]
pub struct CycleScore {
    /// Day strain (0-21)
    pub strain: Option<f64>,
    pub kilojoule: Option<f64>,
    pub average_heart_rate: Option<i32>,
    pub max_heart_rate: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct Recovery {
    pub cycle_id: i64,
    pub sleep_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub score_state: Option<ScoreState>,
    pub score: Option<RecoveryScore>,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryScore {
    pub user_calibrating: Option<bool>,
    /// Percentage (0-100)
    pub recovery_score: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub hrv_rmssd_milli: Option<f64>,
    pub spo2_percentage: Option<f64>,
    pub skin_temp_celsius: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Sleep {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub nap: bool,
    pub score_state: Option<ScoreState>,
    pub score: Option<SleepScore>,
}

#[derive(Debug, Deserialize)]
pub struct SleepScore {
    pub stage_summary: Option<StageSummary>,
    pub respiratory_rate: Option<f64>,
    pub sleep_performance_percentage: Option<f64>,
    pub sleep_consistency_percentage: Option<f64>,
    pub sleep_efficiency_percentage: Option<f64>,
}

/// Durations are milliseconds.
#[derive(Debug, Default, Deserialize)]
pub struct StageSummary {
    pub total_in_bed_time_milli: Option<i64>,
    pub total_awake_time_milli: Option<i64>,
    pub total_light_sleep_time_milli: Option<i64>,
    pub total_slow_wave_sleep_time_milli: Option<i64>,
    pub total_rem_sleep_time_milli: Option<i64>,
    pub disturbance_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct Workout {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sport_name: Option<String>,
    pub sport_id: Option<i32>,
    pub score_state: Option<ScoreState>,
    pub score: Option<WorkoutScore>,
}

#[derive(Debug, Deserialize)]
pub struct WorkoutScore {
    pub strain: Option<f64>,
    pub average_heart_rate: Option<i32>,
    pub max_heart_rate: Option<i32>,
    pub kilojoule: Option<f64>,
    pub distance_meter: Option<f64>,
    pub altitude_gain_meter: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BodyMeasurement {
    pub height_meter: Option<f64>,
    pub weight_kilogram: Option<f64>,
    pub max_heart_rate: Option<i32>,
}
