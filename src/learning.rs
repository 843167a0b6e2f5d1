//! C7 — Learning Service: apply accept/reject feedback to rule weights and
//! timing slots.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::config::{WEIGHT_DELTA_ACCEPT, WEIGHT_DELTA_REJECT};
use crate::context::{self, Context};
use crate::error::ApiError;
use crate::rules::{Rule, RuleCatalog};
use crate::timing::{TimingSlot, TimingStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Accept,
    Reject,
}

/// `apply_feedback(rule_id, outcome, context_snapshot, chosen_lead_time)` —
/// spec §4.7. The two mutations (rule weight, timing slot) are applied
/// independently; each rolls itself back on persistence failure, so a
/// failure in one does not leave the other half-applied.
pub async fn apply_feedback(
    rules: &RuleCatalog,
    timing: &TimingStore,
    pool: &Pool<Sqlite>,
    rule_id: i64,
    outcome: Outcome,
    context_snapshot: &Context,
    chosen_lead_time: i64,
) -> Result<(Rule, TimingSlot), ApiError> {
    context::validate(context_snapshot)?;

    let rule = rules
        .get(rule_id)
        .filter(|r| r.is_active)
        .ok_or_else(|| ApiError::not_found(format!("rule {rule_id} not found or inactive")))?;

    let weight_delta = match outcome {
        Outcome::Accept => WEIGHT_DELTA_ACCEPT,
        Outcome::Reject => -WEIGHT_DELTA_REJECT,
    };
    let updated_rule = rules.update_weight(rule_id, weight_delta).await?;

    let ec = context::extract(context_snapshot);
    let context_key = ec.context_key();
    let task_type = rule.task_type();
    let accepted = outcome == Outcome::Accept;

    let slot = timing
        .record_outcome(&task_type, &context_key, chosen_lead_time, accepted)
        .await?;

    let record = FeedbackRecord {
        rule_id,
        outcome,
        context_snapshot: context_snapshot.clone(),
        chosen_lead_time,
        timestamp: Utc::now(),
    };
    if let Err(err) = log_feedback(pool, &record).await {
        log::warn!("failed to append feedback_log row: {err:?}");
    }

    log::info!(
        "feedback applied: rule={} outcome={:?} lead_time={} new_weight={:.2} slot=({:.1},{:.1})",
        rule_id,
        outcome,
        chosen_lead_time,
        updated_rule.weight,
        slot.alpha,
        slot.beta
    );

    Ok((updated_rule, slot))
}

/// Append-only feedback record as named in spec §3/§6. Not required for
/// the update logic above, but kept as the shape persisted to
/// `feedback_log` for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub rule_id: i64,
    pub outcome: Outcome,
    pub context_snapshot: Context,
    pub chosen_lead_time: i64,
    pub timestamp: chrono::DateTime<Utc>,
}

pub async fn log_feedback(
    pool: &sqlx::Pool<sqlx::Sqlite>,
    record: &FeedbackRecord,
) -> Result<(), ApiError> {
    let context_json = serde_json::to_string(&record.context_snapshot)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO feedback_log (rule_id, outcome, context_json, chosen_lead_time_minutes, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.rule_id)
    .bind(match record.outcome {
        Outcome::Accept => "ACCEPT",
        Outcome::Reject => "REJECT",
    })
    .bind(context_json)
    .bind(record.chosen_lead_time)
    .bind(record.timestamp.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}
