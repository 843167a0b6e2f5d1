//! In-memory timing-slot store guarded by a reader-writer lock, backed by
//! the `timing_slots` table. Slots are materialized lazily — a slot only
//! gets a database row the first time it is evaluated or fed back into
//! (spec §3 lifecycle note).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::{Pool, Sqlite};

use crate::config::LEAD_TIME_CANDIDATES;
use crate::error::ApiError;

use super::{TimingOption, TimingSlot};

type SlotKey = (String, String, i64);

#[derive(Clone)]
pub struct TimingStore {
    pool: Pool<Sqlite>,
    slots: Arc<RwLock<HashMap<SlotKey, TimingSlot>>>,
}

impl TimingStore {
    pub async fn load(pool: Pool<Sqlite>) -> Result<Self, ApiError> {
        let rows = sqlx::query_as::<_, SlotRow>(
            "SELECT task_type, context_key, lead_time_minutes, alpha, beta, total_triggers FROM timing_slots",
        )
        .fetch_all(&pool)
        .await?;

        let mut slots = HashMap::with_capacity(rows.len());
        for row in rows {
            slots.insert(
                (row.task_type, row.context_key, row.lead_time_minutes),
                TimingSlot {
                    alpha: row.alpha,
                    beta: row.beta,
                    total_triggers: row.total_triggers,
                },
            );
        }

        Ok(Self {
            pool,
            slots: Arc::new(RwLock::new(slots)),
        })
    }

    /// Load (or lazily create, in memory only) every candidate lead-time's
    /// slot for `(task_type, context_key)` and compute its UCB score (spec
    /// §4.4 steps 1-4). Does not persist newly-created default slots —
    /// they are materialized on first feedback (`record_outcome`).
    pub fn evaluate(&self, task_type: &str, context_key: &str) -> Vec<TimingOption> {
        let mut guard = self.slots.write();
        LEAD_TIME_CANDIDATES
            .iter()
            .map(|&lead_time| {
                let key = (task_type.to_string(), context_key.to_string(), lead_time);
                let slot = *guard.entry(key).or_insert_with(TimingSlot::default);
                TimingOption {
                    lead_time_minutes: lead_time,
                    confidence: slot.confidence(),
                    ucb: slot.ucb(),
                }
            })
            .collect()
    }

    /// Apply an ACCEPT/REJECT outcome to one slot, creating it if this is
    /// its first feedback, and persist the result. Rolls the in-memory
    /// change back on persistence failure (spec §7).
    pub async fn record_outcome(
        &self,
        task_type: &str,
        context_key: &str,
        lead_time: i64,
        accepted: bool,
    ) -> Result<TimingSlot, ApiError> {
        let key = (task_type.to_string(), context_key.to_string(), lead_time);

        let previous = {
            let guard = self.slots.read();
            guard.get(&key).copied().unwrap_or_default()
        };

        let mut updated = previous;
        if accepted {
            updated.record_accept();
        } else {
            updated.record_reject();
        }

        self.slots.write().insert(key.clone(), updated);

        if let Err(err) = self.persist(task_type, context_key, lead_time, updated).await {
            self.slots.write().insert(key, previous);
            return Err(err);
        }

        Ok(updated)
    }

    async fn persist(
        &self,
        task_type: &str,
        context_key: &str,
        lead_time: i64,
        slot: TimingSlot,
    ) -> Result<(), ApiError> {
        let attempt = self.upsert(task_type, context_key, lead_time, slot).await;
        match attempt {
            Ok(_) => Ok(()),
            Err(_) => {
                self.upsert(task_type, context_key, lead_time, slot).await?;
                Ok(())
            }
        }
    }

    async fn upsert(
        &self,
        task_type: &str,
        context_key: &str,
        lead_time: i64,
        slot: TimingSlot,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO timing_slots (task_type, context_key, lead_time_minutes, alpha, beta, total_triggers)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(task_type, context_key, lead_time_minutes)
            DO UPDATE SET alpha = excluded.alpha, beta = excluded.beta, total_triggers = excluded.total_triggers
            "#,
        )
        .bind(task_type)
        .bind(context_key)
        .bind(lead_time)
        .bind(slot.alpha)
        .bind(slot.beta)
        .bind(slot.total_triggers)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    task_type: String,
    context_key: String,
    lead_time_minutes: i64,
    alpha: f64,
    beta: f64,
    total_triggers: i64,
}
