//! C2 — Rule Catalog: the persistent set of active rules and their weights.
//!
//! A typed store, not a business-rule engine: matching lives in `matcher`,
//! learning lives in `learning`. This module only owns CRUD and the
//! weight-clamping invariant.

mod store;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_RULE_WEIGHT, WEIGHT_MAX, WEIGHT_MIN};
use crate::error::ApiError;

pub use store::RuleCatalog;

/// Where a rule originated. Diagnostic only — the engine treats every
/// rule identically regardless of `source` (spec §9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    User,
    Calendar,
}

/// A persistent, learned trigger → reminder mapping (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub trigger_condition: HashMap<String, serde_json::Value>,
    pub weight: f64,
    pub is_active: bool,
    pub source: RuleSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        description: impl Into<String>,
        trigger_condition: HashMap<String, serde_json::Value>,
        source: RuleSource,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: description.into(),
            trigger_condition,
            weight: DEFAULT_RULE_WEIGHT,
            is_active: true,
            source,
            created_at: now,
            updated_at: now,
        }
    }

    /// `task_type`: a lowercased canonical token derived from the rule's
    /// name (spec §4.4) — strip punctuation, take the first word, lowercase.
    /// The only contract is determinism per rule, so this normalization is
    /// intentionally simple.
    pub fn task_type(&self) -> String {
        self.name
            .split_whitespace()
            .next()
            .unwrap_or("")
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    }

    /// Clamp and apply a weight delta, returning the new weight.
    pub fn apply_weight_delta(&mut self, delta: f64) -> f64 {
        self.weight = (self.weight + delta).clamp(WEIGHT_MIN, WEIGHT_MAX);
        self.updated_at = Utc::now();
        self.weight
    }
}

/// Validate a freshly-created or updated rule's weight invariant before it
/// enters the catalog.
pub fn validate_weight(weight: f64) -> Result<f64, ApiError> {
    if !(WEIGHT_MIN..=WEIGHT_MAX).contains(&weight) {
        return Err(ApiError::validation(format!(
            "rule weight {weight} out of range [{WEIGHT_MIN}, {WEIGHT_MAX}]"
        )));
    }
    Ok(weight)
}
