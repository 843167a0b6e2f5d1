//! In-memory rule catalog guarded by a single reader-writer lock, backed by
//! the `rules` table. Mirrors spec §5: many concurrent readers (inference
//! calls) see a consistent snapshot; writers (learning, rule CRUD) are
//! serialized against each other and against readers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value as Json;
use sqlx::{Pool, Sqlite};

use crate::error::ApiError;

use super::{validate_weight, Rule, RuleSource};

#[derive(Clone)]
pub struct RuleCatalog {
    pool: Pool<Sqlite>,
    rules: Arc<RwLock<HashMap<i64, Rule>>>,
}

impl RuleCatalog {
    /// Load every row from `rules` into the in-memory map.
    pub async fn load(pool: Pool<Sqlite>) -> Result<Self, ApiError> {
        let rows = sqlx::query_as::<_, RuleRow>("SELECT * FROM rules")
            .fetch_all(&pool)
            .await?;

        let mut rules = HashMap::with_capacity(rows.len());
        for row in rows {
            let rule = row.into_rule()?;
            rules.insert(rule.id, rule);
        }

        Ok(Self {
            pool,
            rules: Arc::new(RwLock::new(rules)),
        })
    }

    /// Every rule with `is_active == true`. Snapshot taken under one read
    /// guard so concurrent feedback cannot interleave partial updates into
    /// a single inference call.
    pub fn list_active(&self) -> Vec<Rule> {
        self.rules
            .read()
            .values()
            .filter(|r| r.is_active)
            .cloned()
            .collect()
    }

    /// Every rule regardless of `is_active` (for the `list_rules` external
    /// operation, which §6 does not restrict to active rules).
    pub fn list_all(&self) -> Vec<Rule> {
        self.rules.read().values().cloned().collect()
    }

    pub fn get(&self, id: i64) -> Option<Rule> {
        self.rules.read().get(&id).cloned()
    }

    pub async fn create(
        &self,
        name: String,
        description: String,
        trigger_condition: HashMap<String, Json>,
        source: RuleSource,
    ) -> Result<Rule, ApiError> {
        self.create_with_weight(
            name,
            description,
            trigger_condition,
            source,
            crate::config::DEFAULT_RULE_WEIGHT,
        )
        .await
    }

    /// Like [`Self::create`], but with an explicit initial weight — used by
    /// calendar ingestion, whose starting weight is derived from event
    /// priority rather than the catalog default (spec §6).
    pub async fn create_with_weight(
        &self,
        name: String,
        description: String,
        trigger_condition: HashMap<String, Json>,
        source: RuleSource,
        initial_weight: f64,
    ) -> Result<Rule, ApiError> {
        let initial_weight = validate_weight(initial_weight)?;
        let trigger_json = serde_json::to_string(&trigger_condition)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        let source_str = source_to_str(source);

        let id = sqlx::query(
            r#"
            INSERT INTO rules (name, description, trigger_condition, weight, is_active, source, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?, ?)
            "#,
        )
        .bind(&name)
        .bind(&description)
        .bind(&trigger_json)
        .bind(initial_weight)
        .bind(source_str)
        .bind(Utc::now().to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let rule = Rule {
            weight: initial_weight,
            ..Rule::new(id, name, description, trigger_condition, source)
        };
        self.rules.write().insert(id, rule.clone());
        Ok(rule)
    }

    /// Apply a weight delta, clamping to `[0.10, 0.95]`, and persist it.
    /// Rolls the in-memory change back if persistence fails (spec §7).
    pub async fn update_weight(&self, id: i64, delta: f64) -> Result<Rule, ApiError> {
        let previous = self
            .get(id)
            .ok_or_else(|| ApiError::not_found(format!("rule {id} not found")))?;

        let mut updated = previous.clone();
        let new_weight = updated.apply_weight_delta(delta);
        validate_weight(new_weight)?;

        {
            let mut guard = self.rules.write();
            guard.insert(id, updated.clone());
        }

        if let Err(err) = self.persist_weight(id, new_weight, updated.updated_at).await {
            // Roll back: the caller never observed an inconsistent state
            // because the read above happened under one guard, but once
            // persistence fails we must undo the write we already made.
            self.rules.write().insert(id, previous);
            return Err(err);
        }

        Ok(updated)
    }

    async fn persist_weight(
        &self,
        id: i64,
        weight: f64,
        updated_at: chrono::DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let attempt = sqlx::query("UPDATE rules SET weight = ?, updated_at = ? WHERE id = ?")
            .bind(weight)
            .bind(updated_at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await;

        match attempt {
            Ok(_) => Ok(()),
            Err(_) => {
                // Retry once per spec §7's PersistenceFailure semantics.
                sqlx::query("UPDATE rules SET weight = ?, updated_at = ? WHERE id = ?")
                    .bind(weight)
                    .bind(updated_at.to_rfc3339())
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }
        }
    }

    pub async fn deactivate(&self, id: i64) -> Result<(), ApiError> {
        if self.get(id).is_none() {
            return Err(ApiError::not_found(format!("rule {id} not found")));
        }

        sqlx::query("UPDATE rules SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if let Some(rule) = self.rules.write().get_mut(&id) {
            rule.is_active = false;
        }
        Ok(())
    }
}

fn source_to_str(source: RuleSource) -> &'static str {
    match source {
        RuleSource::User => "user",
        RuleSource::Calendar => "calendar",
    }
}

fn str_to_source(s: &str) -> RuleSource {
    match s {
        "calendar" => RuleSource::Calendar,
        _ => RuleSource::User,
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: i64,
    name: String,
    description: String,
    trigger_condition: String,
    weight: f64,
    is_active: bool,
    source: String,
    created_at: String,
    updated_at: String,
}

impl RuleRow {
    fn into_rule(self) -> Result<Rule, ApiError> {
        let trigger_condition: HashMap<String, Json> =
            serde_json::from_str(&self.trigger_condition)
                .map_err(|e| ApiError::internal(e.to_string()))?;

        Ok(Rule {
            id: self.id,
            name: self.name,
            description: self.description,
            trigger_condition,
            weight: self.weight,
            is_active: self.is_active,
            source: str_to_source(&self.source),
            created_at: parse_rfc3339(&self.created_at)?,
            updated_at: parse_rfc3339(&self.updated_at)?,
        })
    }
}

fn parse_rfc3339(s: &str) -> Result<chrono::DateTime<Utc>, ApiError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApiError::internal(format!("bad timestamp {s}: {e}")))
}
