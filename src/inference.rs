//! C5 — Inference Engine: compose C1-C4 into ranked, timed suggestions.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::config::SUGGESTION_THRESHOLD;
use crate::context::{self, ActivityState, Context, LocationCategory, TimeOfDay};
use crate::error::ApiError;
use crate::matcher;
use crate::rules::RuleCatalog;
use crate::schedule::{self, ScheduleMeta};
use crate::timing::{best_by_ucb, TimingOption, TimingStore};

/// One rule that cleared the suggestion threshold, with its timing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub rule_id: i64,
    pub rule_name: String,
    pub suggestion_score: f64,
    pub timing_options: Vec<TimingOption>,
    pub chosen_lead_time: Option<i64>,
    pub reasoning: String,
    pub matched_conditions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSummary {
    pub activity_state: ActivityState,
    pub location_category: LocationCategory,
    pub time_of_day: TimeOfDay,
    pub car_connected: bool,
    pub wifi_ssid: Option<String>,
    pub optimization_mode: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub suggested_tasks: Vec<Candidate>,
    pub context_summary: ContextSummary,
    pub total_rules_evaluated: usize,
    pub schedule: Option<ScheduleMeta>,
}

/// `infer(context, enable_search) -> InferenceResponse` (spec §4.5, §6).
/// Every call appends `raw` to the `user_contexts` audit log.
pub async fn infer(
    rules: &RuleCatalog,
    timing: &TimingStore,
    pool: &Pool<Sqlite>,
    raw: &Context,
    enable_search: bool,
) -> Result<InferenceResponse, ApiError> {
    context::validate(raw)?;
    context::record_snapshot(pool, raw).await;

    let ec = context::extract(raw);
    let active = rules.list_active();
    let context_key = ec.context_key();

    let mut candidates = Vec::new();
    for rule in &active {
        let m = matcher::score(rule, raw, &ec);
        let suggestion_score = m.base_score * rule.weight;

        if suggestion_score < SUGGESTION_THRESHOLD {
            log::debug!(
                "rule {} ({}) suppressed: suggestion_score {:.3} < threshold",
                rule.id,
                rule.name,
                suggestion_score
            );
            continue;
        }

        let timing_options = timing.evaluate(&rule.task_type(), &context_key);
        let reasoning = format!(
            "matched {}/{} recognized conditions: {}",
            m.matched_conditions.len(),
            m.matched_conditions.len() + m.unmatched_conditions.len(),
            m.matched_conditions.join(", ")
        );

        candidates.push(Candidate {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            suggestion_score,
            timing_options,
            chosen_lead_time: None,
            reasoning,
            matched_conditions: m.matched_conditions,
        });
    }

    let schedule_meta = if enable_search && !candidates.is_empty() {
        let result = schedule::optimize(&candidates);
        for (candidate, chosen) in candidates.iter_mut().zip(result.assignment.iter()) {
            candidate.chosen_lead_time = *chosen;
        }
        Some(result.meta)
    } else {
        for candidate in &mut candidates {
            candidate.chosen_lead_time =
                best_by_ucb(&candidate.timing_options).map(|o| o.lead_time_minutes);
        }
        None
    };

    candidates.sort_by(|a, b| {
        b.suggestion_score
            .partial_cmp(&a.suggestion_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(InferenceResponse {
        suggested_tasks: candidates,
        context_summary: ContextSummary {
            activity_state: ec.activity_state,
            location_category: ec.location_category,
            time_of_day: ec.time_of_day,
            car_connected: ec.car_connected,
            wifi_ssid: ec.wifi_ssid,
            optimization_mode: if enable_search {
                "A* search"
            } else {
                "greedy"
            },
        },
        total_rules_evaluated: active.len(),
        schedule: schedule_meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RawActivity;
    use crate::rules::RuleSource;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashMap;

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

    fn fuel_trigger() -> HashMap<String, serde_json::Value> {
        let mut m = HashMap::new();
        m.insert("activity".to_string(), json!("TRAVELING"));
        m.insert("time_range".to_string(), json!("07:00-10:00"));
        m
    }

    async fn fresh_stores() -> (RuleCatalog, TimingStore, Pool<Sqlite>) {
        let pool = crate::db::connection::establish_pool(":memory:".into())
            .await
            .expect("pool");
        crate::db::migrations::run_migrations(&pool)
            .await
            .expect("migrate");
        let rules = RuleCatalog::load(pool.clone()).await.expect("rules");
        let timing = TimingStore::load(pool.clone()).await.expect("timing");
        (rules, timing, pool)
    }

    #[tokio::test]
    async fn morning_commute_yields_one_suggestion_via_search() {
        let (rules, timing, pool) = fresh_stores().await;
        rules
            .create(
                "Get Fuel".to_string(),
                "Remember to fill up".to_string(),
                fuel_trigger(),
                RuleSource::User,
            )
            .await
            .expect("create rule");

        let response = infer(&rules, &timing, &pool, &morning_commute(), true)
            .await
            .expect("infer");

        assert_eq!(response.suggested_tasks.len(), 1);
        assert!(response.suggested_tasks[0].suggestion_score >= 0.75);
        assert_eq!(response.context_summary.optimization_mode, "A* search");
        assert_eq!(
            response.context_summary.location_category,
            LocationCategory::Commute
        );
    }

    #[tokio::test]
    async fn below_threshold_rule_yields_no_suggestions() {
        let (rules, timing, pool) = fresh_stores().await;
        let rule = rules
            .create(
                "Get Fuel".to_string(),
                "Remember to fill up".to_string(),
                fuel_trigger(),
                RuleSource::User,
            )
            .await
            .expect("create rule");
        rules.update_weight(rule.id, -0.25).await.expect("lower weight");

        let response = infer(&rules, &timing, &pool, &morning_commute(), false)
            .await
            .expect("infer");
        assert!(response.suggested_tasks.is_empty());
    }

    #[tokio::test]
    async fn every_suggestion_clears_the_threshold() {
        let (rules, timing, pool) = fresh_stores().await;
        rules
            .create(
                "Get Fuel".to_string(),
                "Remember to fill up".to_string(),
                fuel_trigger(),
                RuleSource::User,
            )
            .await
            .expect("create rule");

        let response = infer(&rules, &timing, &pool, &morning_commute(), false)
            .await
            .expect("infer");
        for candidate in &response.suggested_tasks {
            assert!(candidate.suggestion_score >= SUGGESTION_THRESHOLD);
        }
    }

    #[tokio::test]
    async fn negative_speed_is_rejected_as_invalid_context() {
        let (rules, timing, pool) = fresh_stores().await;
        let mut ctx = morning_commute();
        ctx.speed_kmh = -5.0;

        let err = infer(&rules, &timing, &pool, &ctx, false)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Validation);
    }
}
