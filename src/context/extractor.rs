//! C1 — Context Extractor: raw sensors to categorical features.
//!
//! Pure function, no I/O, no randomness: `extract` depends only on its
//! argument, which is what makes idempotence (spec §8) trivially true.

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use super::{Context, RawActivity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    fn from_hour(hour: u32) -> Self {
        if hour < 12 {
            TimeOfDay::Morning
        } else if hour < 17 {
            TimeOfDay::Afternoon
        } else if hour < 21 {
            TimeOfDay::Evening
        } else {
            TimeOfDay::Night
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityState {
    Stationary,
    Traveling,
    Walking,
    Unknown,
}

impl From<RawActivity> for ActivityState {
    fn from(raw: RawActivity) -> Self {
        match raw {
            RawActivity::Still => ActivityState::Stationary,
            RawActivity::Walking | RawActivity::Running | RawActivity::OnFoot => {
                ActivityState::Walking
            }
            RawActivity::InVehicle | RawActivity::OnBicycle => ActivityState::Traveling,
            RawActivity::Unknown => ActivityState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationCategory {
    Home,
    Work,
    Campus,
    Commute,
    NearHome,
    InParkedVehicle,
    Unknown,
}

fn wifi_matches(ssid: &Option<String>, needles: &[&str], exact: &[&str]) -> bool {
    match ssid {
        None => false,
        Some(s) => {
            let lower = s.to_lowercase();
            exact.iter().any(|e| s == e) || needles.iter().any(|n| lower.contains(n))
        }
    }
}

/// Location inference: first matching rule wins (spec §4.1).
fn classify_location(ctx: &Context) -> LocationCategory {
    let speed = ctx.speed_kmh;
    let wifi_empty = ctx.wifi_ssid.as_deref().map(str::is_empty).unwrap_or(true);

    if speed > 10.0 && ctx.car_bluetooth_connected && ctx.activity == RawActivity::InVehicle {
        return LocationCategory::Commute;
    }
    if speed < 5.0 && wifi_matches(&ctx.wifi_ssid, &["home"], &["HomeWiFi"]) {
        return LocationCategory::Home;
    }
    if speed < 5.0 && wifi_matches(&ctx.wifi_ssid, &["office", "work"], &["OfficeWiFi"]) {
        return LocationCategory::Work;
    }
    if speed < 5.0 && wifi_matches(&ctx.wifi_ssid, &["campus", "university"], &[]) {
        return LocationCategory::Campus;
    }
    if speed > 0.0 && speed < 10.0 && ctx.activity == RawActivity::Walking && wifi_empty {
        return LocationCategory::NearHome;
    }
    if speed < 5.0 && ctx.car_bluetooth_connected && ctx.activity == RawActivity::Still {
        return LocationCategory::InParkedVehicle;
    }
    LocationCategory::Unknown
}

fn confidence_score(ctx: &Context) -> f64 {
    let mut score = 1.0;
    if ctx.activity == RawActivity::Unknown {
        score -= 0.2;
    }
    let wifi_empty = ctx.wifi_ssid.as_deref().map(str::is_empty).unwrap_or(true);
    if wifi_empty && !ctx.car_bluetooth_connected {
        score -= 0.2;
    }
    let location_vector_empty = ctx
        .location_vector
        .as_deref()
        .map(str::is_empty)
        .unwrap_or(true);
    if location_vector_empty {
        score -= 0.2;
    }
    score.clamp(0.0, 1.0)
}

pub fn extract(ctx: &Context) -> super::ExtractedContext {
    let hour = ctx.timestamp.hour();
    // chrono's weekday() is Monday-based (0); spec's day_of_week is 1..7.
    let day_of_week = ctx.timestamp.weekday().number_from_monday();

    super::ExtractedContext {
        time_of_day: TimeOfDay::from_hour(hour),
        day_of_week,
        is_weekday: day_of_week <= 5,
        location_category: classify_location(ctx),
        activity_state: ActivityState::from(ctx.activity),
        car_connected: ctx.car_bluetooth_connected,
        wifi_ssid: ctx.wifi_ssid.clone(),
        speed_kmh: ctx.speed_kmh,
        confidence_score: confidence_score(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn base_context() -> Context {
        Context {
            timestamp: Utc.with_ymd_and_hms(2025, 12, 1, 8, 30, 0).unwrap(),
            activity: RawActivity::InVehicle,
            speed_kmh: 45.0,
            car_bluetooth_connected: true,
            wifi_ssid: None,
            location_vector: Some("leaving_home".to_string()),
            extras: HashMap::new(),
        }
    }

    #[test]
    fn commute_detected_for_fast_connected_driving() {
        let ec = extract(&base_context());
        assert_eq!(ec.location_category, LocationCategory::Commute);
        assert_eq!(ec.activity_state, ActivityState::Traveling);
        assert_eq!(ec.time_of_day, TimeOfDay::Morning);
    }

    #[test]
    fn extraction_is_idempotent() {
        let ctx = base_context();
        assert_eq!(extract(&ctx), extract(&ctx));
    }

    #[test]
    fn home_wifi_detected_when_slow_and_connected() {
        let mut ctx = base_context();
        ctx.speed_kmh = 1.0;
        ctx.car_bluetooth_connected = false;
        ctx.activity = RawActivity::Still;
        ctx.wifi_ssid = Some("HomeWiFi".to_string());
        let ec = extract(&ctx);
        assert_eq!(ec.location_category, LocationCategory::Home);
    }

    #[test]
    fn confidence_penalized_for_missing_primary_fields() {
        let mut ctx = base_context();
        ctx.activity = RawActivity::Unknown;
        ctx.wifi_ssid = None;
        ctx.car_bluetooth_connected = false;
        ctx.location_vector = None;
        let ec = extract(&ctx);
        assert!((ec.confidence_score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn confidence_score_always_in_unit_interval() {
        let ec = extract(&base_context());
        assert!(ec.confidence_score >= 0.0 && ec.confidence_score <= 1.0);
    }

    #[test]
    fn context_key_is_deterministic_across_speed_and_timestamp() {
        let mut a = base_context();
        let mut b = base_context();
        a.speed_kmh = 42.0;
        b.speed_kmh = 99.0;
        b.timestamp = Utc.with_ymd_and_hms(2025, 12, 1, 9, 15, 0).unwrap();
        assert_eq!(extract(&a).context_key(), extract(&b).context_key());
    }
}
