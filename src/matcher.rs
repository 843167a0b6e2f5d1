//! C3 — Rule Matcher: score one rule against one context in `[0, 1]`.
//!
//! `trigger_condition` is an open, untyped map (spec §9 design note); we
//! parse the closed set of condition keys defensively and ignore (while
//! noting) anything we don't recognize, rather than failing the match.

use chrono::{NaiveTime, Timelike};
use serde::Serialize;
use serde_json::Value as Json;

use crate::context::{Context, ExtractedContext};
use crate::rules::Rule;

/// Result of matching one rule against one context.
pub struct MatchResult {
    pub base_score: f64,
    /// Recognized keys that were present and matched.
    pub matched_conditions: Vec<String>,
    /// Recognized keys that were present but did not match.
    pub unmatched_conditions: Vec<String>,
    /// Keys present in `trigger_condition` this matcher does not recognize.
    pub ignored_keys: Vec<String>,
}

/// Score `rule` against `ec`/`raw` using the key table in spec §4.3.
pub fn score(rule: &Rule, raw: &Context, ec: &ExtractedContext) -> MatchResult {
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();
    let mut ignored = Vec::new();

    for (key, value) in &rule.trigger_condition {
        match evaluate_key(key, value, raw, ec) {
            Some(true) => matched.push(key.clone()),
            Some(false) => unmatched.push(key.clone()),
            None => ignored.push(key.clone()),
        }
    }

    let recognized = matched.len() + unmatched.len();
    let base_score = if recognized == 0 {
        0.0
    } else {
        matched.len() as f64 / recognized as f64
    };

    MatchResult {
        base_score,
        matched_conditions: matched,
        unmatched_conditions: unmatched,
        ignored_keys: ignored,
    }
}

/// `Some(true)`/`Some(false)` for a recognized key's match outcome, `None`
/// if `key` is not one of the condition keys in spec §4.3.
fn evaluate_key(key: &str, value: &Json, raw: &Context, ec: &ExtractedContext) -> Option<bool> {
    if let Some(name) = key.strip_prefix("extras.") {
        let expected = value;
        let actual = raw.extras.get(name);
        return Some(actual == Some(expected));
    }

    match key {
        "activity" => Some(as_str(value)?.eq_ignore_ascii_case(&serde_tag(ec.activity_state)?)),
        "activity_type" => Some(as_str(value)?.eq_ignore_ascii_case(&serde_tag(raw.activity)?)),
        "time_range" => Some(time_range_matches(as_str(value)?, raw)),
        "time" => Some(time_matches_with_tolerance(as_str(value)?, raw)),
        "day_of_week" => Some(day_of_week_matches(value, ec.day_of_week)),
        "is_weekday" => Some(value.as_bool()? == ec.is_weekday),
        "location_vector" => {
            Some(raw.location_vector.as_deref() == Some(as_str(value)?))
        }
        "location_category" => {
            Some(as_str(value)?.eq_ignore_ascii_case(&serde_tag(ec.location_category)?))
        }
        "wifi_ssid" => Some(raw.wifi_ssid.as_deref() == Some(as_str(value)?)),
        "car_bluetooth" => Some(value.as_bool()? == ec.car_connected),
        "min_speed" => Some(ec.speed_kmh >= value.as_f64()?),
        "max_speed" => Some(ec.speed_kmh <= value.as_f64()?),
        _ => None,
    }
}

fn as_str(value: &Json) -> Option<&str> {
    value.as_str()
}

/// The SCREAMING_SNAKE_CASE wire representation of an enum tagged with
/// `#[serde(rename_all = "SCREAMING_SNAKE_CASE")]` (e.g. `RawActivity`,
/// `LocationCategory`) — `Debug` output does not insert the underscores
/// multi-word variants need (`InVehicle` vs. the spec's `IN_VEHICLE`), so
/// condition-key matching must go through serde rather than `{:?}`.
fn serde_tag<T: Serialize>(value: T) -> Option<String> {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
}

fn day_of_week_matches(value: &Json, day_of_week: u32) -> bool {
    if let Some(n) = value.as_u64() {
        return n as u32 == day_of_week;
    }
    if let Some(name) = value.as_str() {
        return weekday_from_name(name) == Some(day_of_week);
    }
    false
}

fn weekday_from_name(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "monday" => Some(1),
        "tuesday" => Some(2),
        "wednesday" => Some(3),
        "thursday" => Some(4),
        "friday" => Some(5),
        "saturday" => Some(6),
        "sunday" => Some(7),
        _ => None,
    }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

/// `"HH:MM-HH:MM"`, current wall-clock time within the interval. Wraps
/// across midnight when `start > end`.
fn time_range_matches(range: &str, raw: &Context) -> bool {
    let Some((start_s, end_s)) = range.split_once('-') else {
        return false;
    };
    let (Some(start), Some(end)) = (parse_hhmm(start_s.trim()), parse_hhmm(end_s.trim())) else {
        return false;
    };
    let now = raw.timestamp.time();

    if start <= end {
        now >= start && now <= end
    } else {
        now >= start || now <= end
    }
}

/// Exact `"HH:MM"` match with ±15-minute tolerance, wrapping across
/// midnight.
fn time_matches_with_tolerance(target: &str, raw: &Context) -> bool {
    let Some(target) = parse_hhmm(target) else {
        return false;
    };
    let now = raw.timestamp.time();

    let now_minutes = now.hour() as i64 * 60 + now.minute() as i64;
    let target_minutes = target.hour() as i64 * 60 + target.minute() as i64;
    let diff = (now_minutes - target_minutes).abs();
    let wrapped_diff = 24 * 60 - diff;
    diff.min(wrapped_diff) <= 15
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::extract;
    use crate::rules::RuleSource;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn morning_commute_context() -> Context {
        Context {
            timestamp: Utc.with_ymd_and_hms(2025, 12, 1, 8, 30, 0).unwrap(),
            activity: crate::context::RawActivity::InVehicle,
            speed_kmh: 45.0,
            car_bluetooth_connected: true,
            wifi_ssid: None,
            location_vector: Some("leaving_home".to_string()),
            extras: HashMap::new(),
        }
    }

    fn rule_with(conditions: &[(&str, Json)]) -> Rule {
        let mut trigger = HashMap::new();
        for (k, v) in conditions {
            trigger.insert(k.to_string(), v.clone());
        }
        Rule::new(1, "Get Fuel", "", trigger, RuleSource::User)
    }

    #[test]
    fn full_match_scores_one() {
        let raw = morning_commute_context();
        let ec = extract(&raw);
        let rule = rule_with(&[
            ("activity", Json::String("TRAVELING".into())),
            ("time_range", Json::String("07:00-10:00".into())),
        ]);
        let result = score(&rule, &raw, &ec);
        assert_eq!(result.base_score, 1.0);
    }

    #[test]
    fn partial_match_is_fraction_matched() {
        let raw = morning_commute_context();
        let ec = extract(&raw);
        let rule = rule_with(&[
            ("activity", Json::String("TRAVELING".into())),
            ("time_range", Json::String("14:00-16:00".into())),
        ]);
        let result = score(&rule, &raw, &ec);
        assert_eq!(result.base_score, 0.5);
    }

    #[test]
    fn zero_recognized_keys_scores_zero() {
        let raw = morning_commute_context();
        let ec = extract(&raw);
        let rule = rule_with(&[("not_a_real_key", Json::Bool(true))]);
        let result = score(&rule, &raw, &ec);
        assert_eq!(result.base_score, 0.0);
        assert_eq!(result.ignored_keys, vec!["not_a_real_key".to_string()]);
    }

    #[test]
    fn time_range_wraps_across_midnight() {
        let mut raw = morning_commute_context();
        raw.timestamp = Utc.with_ymd_and_hms(2025, 12, 1, 23, 30, 0).unwrap();
        let ec = extract(&raw);
        let rule = rule_with(&[("time_range", Json::String("22:00-02:00".into()))]);
        assert_eq!(score(&rule, &raw, &ec).base_score, 1.0);
    }

    #[test]
    fn activity_type_matches_multi_word_raw_activity() {
        let raw = morning_commute_context(); // raw.activity == InVehicle
        let ec = extract(&raw);
        let rule = rule_with(&[("activity_type", Json::String("IN_VEHICLE".into()))]);
        assert_eq!(score(&rule, &raw, &ec).base_score, 1.0);
    }

    #[test]
    fn location_category_matches_multi_word_category() {
        let mut raw = morning_commute_context();
        raw.activity = crate::context::RawActivity::Walking;
        raw.speed_kmh = 4.0;
        raw.car_bluetooth_connected = false;
        raw.wifi_ssid = None;
        let ec = extract(&raw);
        assert_eq!(ec.location_category, crate::context::LocationCategory::NearHome);

        let rule = rule_with(&[("location_category", Json::String("NEAR_HOME".into()))]);
        assert_eq!(score(&rule, &raw, &ec).base_score, 1.0);
    }

    #[test]
    fn base_score_always_in_unit_interval() {
        let raw = morning_commute_context();
        let ec = extract(&raw);
        let rule = rule_with(&[
            ("activity", Json::String("TRAVELING".into())),
            ("min_speed", Json::from(100.0)),
        ]);
        let result = score(&rule, &raw, &ec);
        assert!(result.base_score >= 0.0 && result.base_score <= 1.0);
    }
}
