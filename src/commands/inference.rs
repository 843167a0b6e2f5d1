//! Tauri commands for suggestion inference and feedback (spec §6).

use tauri::State;

use crate::context::Context;
use crate::error::ApiError;
use crate::inference::{self, InferenceResponse};
use crate::learning::{self, Outcome};
use crate::rules::Rule;
use crate::timing::TimingSlot;
use crate::DbState;

/// Get ranked, timed suggestions for the caller's current situation.
#[tauri::command]
pub async fn get_suggestions(
    state: State<'_, DbState>,
    context: Context,
    enable_search: Option<bool>,
) -> Result<InferenceResponse, ApiError> {
    inference::infer(
        &state.rules,
        &state.timing,
        &state.pool,
        &context,
        enable_search.unwrap_or(true),
    )
    .await
}

/// Record an accept/reject outcome against a suggested rule and lead time.
#[tauri::command]
pub async fn record_feedback(
    state: State<'_, DbState>,
    rule_id: i64,
    outcome: Outcome,
    context: Context,
    chosen_lead_time_minutes: i64,
) -> Result<(Rule, TimingSlot), ApiError> {
    learning::apply_feedback(
        &state.rules,
        &state.timing,
        &state.pool,
        rule_id,
        outcome,
        &context,
        chosen_lead_time_minutes,
    )
    .await
}
