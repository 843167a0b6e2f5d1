//! Raw situational input and its categorical normalization.
//!
//! `Context` is what a caller hands the engine: a snapshot of sensor
//! readings. `extractor` turns it into an `ExtractedContext`, the
//! categorical feature set every other component reasons over.

mod extractor;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Pool, Sqlite};

use crate::error::ApiError;

pub use extractor::{extract, ActivityState, LocationCategory, TimeOfDay};

/// Recognized raw activity readings (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RawActivity {
    Still,
    Walking,
    Running,
    OnBicycle,
    InVehicle,
    OnFoot,
    Unknown,
}

/// A snapshot of the user's current situation, as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub timestamp: DateTime<Utc>,
    pub activity: RawActivity,
    pub speed_kmh: f64,
    pub car_bluetooth_connected: bool,
    pub wifi_ssid: Option<String>,
    pub location_vector: Option<String>,
    #[serde(default)]
    pub extras: HashMap<String, Value>,
}

/// Categorical, de-sensored view of a `Context` (spec §3). Pure function of
/// its input: `extract(c) == extract(c)` bitwise for any `c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContext {
    pub time_of_day: TimeOfDay,
    pub day_of_week: u32,
    pub is_weekday: bool,
    pub location_category: LocationCategory,
    pub activity_state: ActivityState,
    pub car_connected: bool,
    pub wifi_ssid: Option<String>,
    pub speed_kmh: f64,
    pub confidence_score: f64,
}

impl ExtractedContext {
    /// Deterministic string key for Beta-slot lookup: exactly the four
    /// fields named in spec §3, joined by `_` in that order.
    pub fn context_key(&self) -> String {
        format!(
            "{:?}_{:?}_{}_{:?}",
            self.activity_state, self.time_of_day, self.is_weekday, self.location_category
        )
    }
}

/// Reject a malformed `Context` before it reaches the extractor (spec §7,
/// `InvalidContext`). Timestamp parsing and activity vocabulary are already
/// enforced by `Context`'s `Deserialize` impl (a bad timestamp or an unknown
/// activity string fails at the transport boundary); the one check that
/// survives typed deserialization is a negative speed.
pub fn validate(raw: &Context) -> Result<(), ApiError> {
    if raw.speed_kmh < 0.0 {
        return Err(ApiError::validation(format!(
            "speed_kmh must be non-negative, got {}",
            raw.speed_kmh
        )));
    }
    Ok(())
}

/// Append `raw` to the `user_contexts` audit log. Best-effort: a failure
/// here is logged and swallowed rather than surfaced, since a missed audit
/// row must never block a suggestion from being returned (mirrors the
/// teacher's `ml/rich_features.rs::save_snapshot`, which is likewise
/// fire-and-forget from its caller's perspective).
pub async fn record_snapshot(pool: &Pool<Sqlite>, raw: &Context) {
    let context_json = match serde_json::to_string(raw) {
        Ok(json) => json,
        Err(err) => {
            log::warn!("failed to serialize context snapshot: {err}");
            return;
        }
    };

    if let Err(err) = insert_snapshot(pool, &context_json, Utc::now()).await {
        log::warn!("failed to persist context snapshot: {err:?}");
    }
}

async fn insert_snapshot(
    pool: &Pool<Sqlite>,
    context_json: &str,
    created_at: DateTime<Utc>,
) -> Result<(), ApiError> {
    sqlx::query("INSERT INTO user_contexts (context_json, created_at) VALUES (?, ?)")
        .bind(context_json)
        .bind(created_at.to_rfc3339())
        .execute(pool)
        .await?;
    Ok(())
}
