//! End-to-end round trip across the full C1-C7 pipeline, one level up from
//! each component's own unit tests (mirrors the teacher's
//! `agent/intelligence_test.rs` placement: exercise the public surface,
//! not internals).

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::context::{Context, RawActivity};
use crate::db::connection::establish_pool;
use crate::db::migrations::run_migrations;
use crate::inference::infer;
use crate::learning::{apply_feedback, Outcome};
use crate::rules::{RuleCatalog, RuleSource};
use crate::timing::TimingStore;

async fn fresh_engine() -> (RuleCatalog, TimingStore, sqlx::Pool<sqlx::Sqlite>) {
    let pool = establish_pool(":memory:".into()).await.expect("pool");
    run_migrations(&pool).await.expect("migrate");
    let rules = RuleCatalog::load(pool.clone()).await.expect("rules");
    let timing = TimingStore::load(pool.clone()).await.expect("timing");
    (rules, timing, pool)
}

fn morning_commute() -> Context {
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

fn fuel_rule_trigger() -> HashMap<String, serde_json::Value> {
    let mut m = HashMap::new();
    m.insert("activity".to_string(), json!("TRAVELING"));
    m.insert("time_range".to_string(), json!("07:00-10:00"));
    m
}

/// A suggestion surfaced, accepted, then re-inferred: weight and timing
/// confidence for the accepted slot should both have moved up, never down,
/// and the slot that was fed back on should now be persisted.
#[tokio::test]
async fn accepted_suggestion_raises_weight_and_timing_confidence() {
    let (rules, timing, pool) = fresh_engine().await;
    let rule = rules
        .create(
            "Get Fuel".to_string(),
            "Remember to fill up before the tank runs dry".to_string(),
            fuel_rule_trigger(),
            RuleSource::User,
        )
        .await
        .expect("create rule");

    let first = infer(&rules, &timing, &pool, &morning_commute(), true)
        .await
        .expect("first inference");
    assert_eq!(first.suggested_tasks.len(), 1);
    let chosen_lead_time = first.suggested_tasks[0]
        .chosen_lead_time
        .expect("search always picks or skips; here it must pick");

    let before_weight = first.suggested_tasks[0].suggestion_score / rule.weight;
    let _ = before_weight; // base_score, unused beyond documenting the relation

    apply_feedback(
        &rules,
        &timing,
        &pool,
        rule.id,
        Outcome::Accept,
        &morning_commute(),
        chosen_lead_time,
    )
    .await
    .expect("apply feedback");

    let second = infer(&rules, &timing, &pool, &morning_commute(), true)
        .await
        .expect("second inference");
    assert_eq!(second.suggested_tasks.len(), 1);

    assert!(second.suggested_tasks[0].suggestion_score >= first.suggested_tasks[0].suggestion_score);

    let updated_rule = rules.get(rule.id).expect("rule still exists");
    assert!((updated_rule.weight - 0.80).abs() < 1e-9);

    let raised_option = second.suggested_tasks[0]
        .timing_options
        .iter()
        .find(|o| o.lead_time_minutes == chosen_lead_time)
        .expect("fed-back lead time still present");
    assert!(raised_option.confidence > 0.5);
}

/// A rejected rule eventually drops below the suggestion threshold and
/// disappears from future inference results for the same context.
#[tokio::test]
async fn repeated_rejection_suppresses_future_suggestions() {
    let (rules, timing, pool) = fresh_engine().await;
    let rule = rules
        .create(
            "Get Fuel".to_string(),
            "Remember to fill up".to_string(),
            fuel_rule_trigger(),
            RuleSource::User,
        )
        .await
        .expect("create rule");

    // weight starts at 0.75; base_score is 1.0 here, so three rejects
    // (0.75 -> 0.65 -> 0.55 -> 0.45) push suggestion_score under 0.60.
    for _ in 0..3 {
        apply_feedback(
            &rules,
            &timing,
            &pool,
            rule.id,
            Outcome::Reject,
            &morning_commute(),
            10,
        )
        .await
        .expect("apply feedback");
    }

    let response = infer(&rules, &timing, &pool, &morning_commute(), false)
        .await
        .expect("inference after rejections");
    assert!(response.suggested_tasks.is_empty());

    let updated_rule = rules.get(rule.id).expect("rule still exists");
    assert!((updated_rule.weight - 0.45).abs() < 1e-9);
}

/// Calendar ingestion produces rules indistinguishable from user rules to
/// the inference engine, at the priority-derived initial weight.
#[tokio::test]
async fn calendar_derived_rule_participates_in_inference() {
    use crate::calendar::{ingest_calendar_events, EventPriority, ParsedEvent};

    let (rules, timing, pool) = fresh_engine().await;
    let event = ParsedEvent {
        event_id: "evt-1".to_string(),
        title: "Fuel Stop".to_string(),
        start_time: Utc.with_ymd_and_hms(2025, 12, 1, 8, 30, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 12, 1, 8, 45, 0).unwrap(),
        priority: EventPriority::High,
        is_all_day: false,
        location: Some("leaving_home".to_string()),
        preparation_time_minutes: 5,
        travel_time_minutes: 10,
    };

    let result = ingest_calendar_events(&rules, &[event]).await.expect("ingest");
    assert_eq!(result.rules_generated, 1);

    let response = infer(&rules, &timing, &pool, &morning_commute(), false)
        .await
        .expect("inference");
    assert_eq!(response.suggested_tasks.len(), 1);
    assert!((response.suggested_tasks[0].suggestion_score - 0.85).abs() < 1e-9);
}
