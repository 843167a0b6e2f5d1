//! Calendar event ingestion: convert enriched, externally-parsed events into
//! rules (spec §6). The core trusts `ParsedEvent` fields; it does not parse
//! free text itself.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::calendar_rule_weight;
use crate::error::ApiError;
use crate::rules::{RuleCatalog, RuleSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPriority {
    High,
    Medium,
    Low,
}

impl EventPriority {
    fn as_str(self) -> &'static str {
        match self {
            EventPriority::High => "HIGH",
            EventPriority::Medium => "MEDIUM",
            EventPriority::Low => "LOW",
        }
    }
}

/// An enriched event as produced by the external calendar parser. The core
/// never constructs one of these; it only consumes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub event_id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub priority: EventPriority,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub preparation_time_minutes: i64,
    pub travel_time_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub created: usize,
    pub updated: usize,
    pub rules_generated: usize,
}

/// `ingest_calendar_events([ParsedEvent]) -> {created, updated, rules_generated}`.
/// Calendar-derived rules get an initial weight from the event's priority
/// (spec §6) and a `trigger_condition` that encodes a start-time match; they
/// are otherwise indistinguishable from user-authored rules (spec §9).
///
/// This implementation always creates a new rule per event (there is no
/// existing event -> rule index to update against), so `updated` is always
/// 0 — retained in the return shape because §6 defines it as part of the
/// contract.
pub async fn ingest_calendar_events(
    rules: &RuleCatalog,
    events: &[ParsedEvent],
) -> Result<IngestResult, ApiError> {
    let mut created = 0usize;

    for event in events {
        if event.is_all_day {
            // All-day events have no meaningful start-time trigger;
            // nothing in spec.md requires notifying for them.
            continue;
        }

        let weight = calendar_rule_weight(event.priority.as_str());
        let trigger = build_trigger(event);

        rules
            .create_with_weight(
                event.title.clone(),
                format!("Calendar: {}", event.title),
                trigger,
                RuleSource::Calendar,
                weight,
            )
            .await?;
        created += 1;
    }

    Ok(IngestResult {
        created,
        updated: 0,
        rules_generated: created,
    })
}

fn build_trigger(event: &ParsedEvent) -> HashMap<String, serde_json::Value> {
    let mut trigger = HashMap::new();
    trigger.insert(
        "time".to_string(),
        json!(event.start_time.format("%H:%M").to_string()),
    );
    if let Some(location) = &event.location {
        trigger.insert("location_vector".to_string(), json!(location));
    }
    trigger
}
