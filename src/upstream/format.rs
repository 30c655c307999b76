//! Reshape WHOOP records into the relay's public JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::models::{
    BodyMeasurement, Cycle, Recovery, ScoreState, Sleep, StageSummary, UserProfile, Workout,
};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryView {
    pub cycle_id: i64,
    pub date: Option<DateTime<Utc>>,
    pub scored: bool,
    pub recovery_score: Option<f64>,
    pub hrv: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub spo2: Option<f64>,
    pub skin_temp: Option<f64>,
    pub calibrating: bool,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SleepStages {
    pub light_hours: Option<f64>,
    pub deep_hours: Option<f64>,
    pub rem_hours: Option<f64>,
    pub awake_hours: Option<f64>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SleepView {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub nap: bool,
    pub scored: bool,
    pub sleep_performance: Option<f64>,
    pub sleep_efficiency: Option<f64>,
    pub sleep_consistency: Option<f64>,
    pub respiratory_rate: Option<f64>,
    /// Light + deep + REM.
    pub total_sleep_hours: Option<f64>,
    pub time_in_bed_hours: Option<f64>,
    pub disturbances: Option<i32>,
    pub stages: SleepStages,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrainView {
    pub cycle_id: i64,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub scored: bool,
    pub strain: Option<f64>,
    pub kilojoules: Option<f64>,
    pub calories: Option<f64>,
    pub average_heart_rate: Option<i32>,
    pub max_heart_rate: Option<i32>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutView {
    pub id: String,
    pub sport: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: f64,
    pub scored: bool,
    pub strain: Option<f64>,
    pub average_heart_rate: Option<i32>,
    pub max_heart_rate: Option<i32>,
    pub kilojoules: Option<f64>,
    pub calories: Option<f64>,
    pub distance_meters: Option<f64>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub user_id: i64,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub height_meters: Option<f64>,
    pub weight_kilograms: Option<f64>,
    pub max_heart_rate: Option<i32>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodayView {
    pub strain: StrainView,
    pub recovery: Option<RecoveryView>,
    pub sleep: Option<SleepView>,
}

fn scored(state: Option<ScoreState>) -> bool {
    state == Some(ScoreState::Scored)
}

fn hours(millis: Option<i64>) -> Option<f64> {
    millis.map(|ms| round2(ms as f64 / MILLIS_PER_HOUR))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn kcal(kilojoule: Option<f64>) -> Option<f64> {
    kilojoule.map(|kj| (kj / 4.184).round())
}

pub fn recovery(r: &Recovery) -> RecoveryView {
    let score = r.score.as_ref();
    RecoveryView {
        cycle_id: r.cycle_id,
        date: r.created_at,
        scored: scored(r.score_state),
        recovery_score: score.and_then(|s| s.recovery_score),
        hrv: score.and_then(|s| s.hrv_rmssd_milli).map(round2),
        resting_heart_rate: score.and_then(|s| s.resting_heart_rate),
        spo2: score.and_then(|s| s.spo2_percentage).map(round2),
        skin_temp: score.and_then(|s| s.skin_temp_celsius).map(round2),
        calibrating: score.and_then(|s| s.user_calibrating).unwrap_or(false),
    }
}

pub fn sleep(s: &Sleep) -> SleepView {
    let score = s.score.as_ref();
    let empty = StageSummary::default();
    let stages = score
        .and_then(|sc| sc.stage_summary.as_ref())
        .unwrap_or(&empty);

    let asleep = [
        stages.total_light_sleep_time_milli,
        stages.total_slow_wave_sleep_time_milli,
        stages.total_rem_sleep_time_milli,
    ];
    let total_sleep = if asleep.iter().all(Option::is_none) {
        None
    } else {
        Some(asleep.iter().flatten().fold(0i64, |acc, ms| acc.saturating_add(*ms)))
    };

    SleepView {
        id: s.id.clone(),
        start: s.start,
        end: s.end,
        nap: s.nap,
        scored: scored(s.score_state),
        sleep_performance: score.and_then(|sc| sc.sleep_performance_percentage),
        sleep_efficiency: score.and_then(|sc| sc.sleep_efficiency_percentage).map(round2),
        sleep_consistency: score.and_then(|sc| sc.sleep_consistency_percentage),
        respiratory_rate: score.and_then(|sc| sc.respiratory_rate).map(round2),
        total_sleep_hours: hours(total_sleep),
        time_in_bed_hours: hours(stages.total_in_bed_time_milli),
        disturbances: stages.disturbance_count,
        stages: SleepStages {
            light_hours: hours(stages.total_light_sleep_time_milli),
            deep_hours: hours(stages.total_slow_wave_sleep_time_milli),
            rem_hours: hours(stages.total_rem_sleep_time_milli),
            awake_hours: hours(stages.total_awake_time_milli),
        },
    }
}

pub fn strain(c: &Cycle) -> StrainView {
    let score = c.score.as_ref();
    StrainView {
        cycle_id: c.id,
        start: c.start,
        end: c.end,
        scored: scored(c.score_state),
        strain: score.and_then(|s| s.strain).map(round2),
        kilojoules: score.and_then(|s| s.kilojoule).map(round2),
        calories: kcal(score.and_then(|s| s.kilojoule)),
        average_heart_rate: score.and_then(|s| s.average_heart_rate),
        max_heart_rate: score.and_then(|s| s.max_heart_rate),
    }
}

pub fn workout(w: &Workout) -> WorkoutView {
    let score = w.score.as_ref();
    let sport = match (&w.sport_name, w.sport_id) {
        (Some(name), _) => name.clone(),
        (None, Some(id)) => format!("sport-{id}"),
        (None, None) => "unknown".to_string(),
    };
    WorkoutView {
        id: w.id.clone(),
        sport,
        start: w.start,
        end: w.end,
        duration_minutes: round2((w.end - w.start).num_seconds() as f64 / 60.0),
        scored: scored(w.score_state),
        strain: score.and_then(|s| s.strain).map(round2),
        average_heart_rate: score.and_then(|s| s.average_heart_rate),
        max_heart_rate: score.and_then(|s| s.max_heart_rate),
        kilojoules: score.and_then(|s| s.kilojoule).map(round2),
        calories: kcal(score.and_then(|s| s.kilojoule)),
        distance_meters: score.and_then(|s| s.distance_meter),
    }
}

pub fn profile(p: &UserProfile, body: Option<&BodyMeasurement>) -> ProfileView {
    ProfileView {
        user_id: p.user_id,
        email: p.email.clone(),
        first_name: p.first_name.clone(),
        last_name: p.last_name.clone(),
        height_meters: body.and_then(|b| b.height_meter),
        weight_kilograms: body.and_then(|b| b.weight_kilogram),
        max_heart_rate: body.and_then(|b| b.max_heart_rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recovery_fields() {
        let r: Recovery = serde_json::from_value(json!({
            "cycle_id": 93845,
            "sleep_id": "ecfc6a15-4661-442f-a9a4-f160dd7afae8",
            "created_at": "2022-04-24T11:25:44.774Z",
            "score_state": "SCORED",
            "score": {
                "user_calibrating": false,
                "recovery_score": 44.0,
                "resting_heart_rate": 64.0,
                "hrv_rmssd_milli": 31.813562,
                "spo2_percentage": 95.6875,
                "skin_temp_celsius": 33.7
            }
        }))
        .unwrap();

        let view = recovery(&r);
        assert!(view.scored);
        assert_eq!(view.recovery_score, Some(44.0));
        assert_eq!(view.hrv, Some(31.81));
        assert_eq!(view.spo2, Some(95.69));

        let out = serde_json::to_value(&view).unwrap();
        assert_eq!(out["restingHeartRate"], json!(64.0));
        assert_eq!(out["cycleId"], json!(93845));
    }

    #[test]
    fn test_pending_sleep_has_no_totals() {
        let s: Sleep = serde_json::from_value(json!({
            "id": "abc",
            "start": "2022-04-24T02:25:44.774Z",
            "end": "2022-04-24T10:25:44.774Z",
            "nap": false,
            "score_state": "PENDING_SCORE"
        }))
        .unwrap();

        let view = sleep(&s);
        assert!(!view.scored);
        assert_eq!(view.total_sleep_hours, None);
        assert_eq!(view.stages.deep_hours, None);
    }

    #[test]
    fn test_sleep_hours() {
        let s: Sleep = serde_json::from_value(json!({
            "id": "abc",
            "start": "2022-04-24T02:25:44.774Z",
            "end": "2022-04-24T10:25:44.774Z",
            "score_state": "SCORED",
            "score": {
                "stage_summary": {
                    "total_in_bed_time_milli": 30272735,
                    "total_awake_time_milli": 1403507,
                    "total_light_sleep_time_milli": 14905851,
                    "total_slow_wave_sleep_time_milli": 6630370,
                    "total_rem_sleep_time_milli": 5879573,
                    "disturbance_count": 12
                },
                "respiratory_rate": 16.11328125,
                "sleep_performance_percentage": 98.0,
                "sleep_efficiency_percentage": 91.69533848
            }
        }))
        .unwrap();

        let view = sleep(&s);
        assert_eq!(view.total_sleep_hours, Some(7.62));
        assert_eq!(view.stages.light_hours, Some(4.14));
        assert_eq!(view.time_in_bed_hours, Some(8.41));
        assert_eq!(view.sleep_efficiency, Some(91.7));
        assert_eq!(view.disturbances, Some(12));
    }

    #[test]
    fn test_absurd_stage_durations_saturate() {
        let s: Sleep = serde_json::from_value(json!({
            "id": "abc",
            "start": "2022-04-24T02:25:44.774Z",
            "end": "2022-04-24T10:25:44.774Z",
            "score_state": "SCORED",
            "score": {
                "stage_summary": {
                    "total_light_sleep_time_milli": i64::MAX,
                    "total_slow_wave_sleep_time_milli": i64::MAX,
                    "total_rem_sleep_time_milli": 1
                }
            }
        }))
        .unwrap();

        let view = sleep(&s);
        assert_eq!(view.total_sleep_hours, hours(Some(i64::MAX)));
    }

    #[test]
    fn test_workout_sport_and_duration() {
        let w: Workout = serde_json::from_value(json!({
            "id": "w1",
            "start": "2022-04-24T02:25:44.774Z",
            "end": "2022-04-24T03:10:44.774Z",
            "sport_name": "running",
            "score_state": "SCORED",
            "score": { "strain": 8.2463, "kilojoule": 1569.34, "distance_meter": 1772.77 }
        }))
        .unwrap();

        let view = workout(&w);
        assert_eq!(view.sport, "running");
        assert_eq!(view.duration_minutes, 45.0);
        assert_eq!(view.strain, Some(8.25));
        assert_eq!(view.calories, Some(375.0));
    }

    #[test]
    fn test_unknown_score_state_is_tolerated() {
        let c: Cycle = serde_json::from_value(json!({
            "id": 1,
            "start": "2022-04-24T02:25:44.774Z",
            "score_state": "SOMETHING_NEW"
        }))
        .unwrap();
        let view = strain(&c);
        assert!(!view.scored);
        assert_eq!(view.strain, None);
        assert_eq!(view.end, None);
    }

    #[test]
    fn test_profile_merges_body() {
        let p: UserProfile = serde_json::from_value(json!({
            "user_id": 10129,
            "email": "jsmith123@whoop.com",
            "first_name": "John",
            "last_name": "Smith"
        }))
        .unwrap();
        let b: BodyMeasurement = serde_json::from_value(json!({
            "height_meter": 1.8288,
            "weight_kilogram": 90.0718,
            "max_heart_rate": 200
        }))
        .unwrap();

        let view = profile(&p, Some(&b));
        assert_eq!(view.first_name.as_deref(), Some("John"));
        assert_eq!(view.max_heart_rate, Some(200));
        assert_eq!(profile(&p, None).weight_kilograms, None);
    }
}
