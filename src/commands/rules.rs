//! Tauri commands for rule catalog CRUD (spec §6).

use std::collections::HashMap;

use tauri::State;

use crate::error::ApiError;
use crate::rules::{Rule, RuleSource};
use crate::DbState;

#[tauri::command]
pub fn list_rules(state: State<'_, DbState>) -> Vec<Rule> {
    state.rules.list_all()
}

#[tauri::command]
pub async fn create_rule(
    state: State<'_, DbState>,
    name: String,
    description: String,
    trigger_condition: HashMap<String, serde_json::Value>,
) -> Result<Rule, ApiError> {
    state
        .rules
        .create(name, description, trigger_condition, RuleSource::User)
        .await
}

#[tauri::command]
pub async fn deactivate_rule(state: State<'_, DbState>, rule_id: i64) -> Result<(), ApiError> {
    state.rules.deactivate(rule_id).await
}
