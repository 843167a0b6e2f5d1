//! C4 — Timing Optimizer: per-`(task_type, context_key, lead_time)` Beta
//! distributions and UCB-based lead-time scoring.

mod store;

use serde::{Deserialize, Serialize};

pub use store::TimingStore;

/// Persistent `(alpha, beta)` pair for one `(task_type, context_key,
/// lead_time_minutes)` triple (spec §3). `total_triggers == alpha + beta - 2`
/// is maintained as an invariant by every mutator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingSlot {
    pub alpha: f64,
    pub beta: f64,
    pub total_triggers: i64,
}

impl Default for TimingSlot {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
            total_triggers: 0,
        }
    }
}

impl TimingSlot {
    pub fn confidence(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn uncertainty(&self) -> f64 {
        1.0 / (self.alpha + self.beta).sqrt()
    }

    pub fn ucb(&self) -> f64 {
        self.confidence() + crate::config::UCB_EXPLORATION * self.uncertainty()
    }

    pub fn record_accept(&mut self) {
        self.alpha += 1.0;
        self.total_triggers += 1;
    }

    pub fn record_reject(&mut self) {
        self.beta += 1.0;
        self.total_triggers += 1;
    }

    pub fn is_consistent(&self) -> bool {
        self.alpha >= 1.0
            && self.beta >= 1.0
            && self.total_triggers as f64 == self.alpha + self.beta - 2.0
    }
}

/// One lead-time candidate with its learned statistics, as returned by
/// `TimingStore::evaluate` for a `(task_type, context_key)` pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingOption {
    pub lead_time_minutes: i64,
    pub confidence: f64,
    pub ucb: f64,
}

/// `argmax_w ucb(w)`, breaking ties by the smaller lead-time.
pub fn best_by_ucb(options: &[TimingOption]) -> Option<TimingOption> {
    options.iter().copied().fold(None, |best, candidate| {
        match best {
            None => Some(candidate),
            Some(current) => {
                if candidate.ucb > current.ucb
                    || (candidate.ucb == current.ucb
                        && candidate.lead_time_minutes < current.lead_time_minutes)
                {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        }
    })
}
