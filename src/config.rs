//! Tunables shared across the inference, timing, and scheduling components.

/// Candidate notification lead-times, in minutes before the nominal moment.
pub const LEAD_TIME_CANDIDATES: [i64; 4] = [10, 15, 30, 60];

/// Suggestions with `suggestion_score` below this are dropped from the
/// candidate set before they ever reach the schedule optimizer.
pub const SUGGESTION_THRESHOLD: f64 = 0.60;

/// Rule weight clamp bounds.
pub const WEIGHT_MIN: f64 = 0.10;
pub const WEIGHT_MAX: f64 = 0.95;

/// Default weight assigned to a newly created rule.
pub const DEFAULT_RULE_WEIGHT: f64 = 0.75;

/// Weight adjustment applied on ACCEPT / REJECT feedback.
pub const WEIGHT_DELTA_ACCEPT: f64 = 0.05;
pub const WEIGHT_DELTA_REJECT: f64 = 0.10;

/// Exploration coefficient in the UCB score: `confidence + UCB_EXPLORATION * uncertainty`.
pub const UCB_EXPLORATION: f64 = 0.5;

/// Node budget for the A* branch-and-bound schedule search.
pub const DEFAULT_SEARCH_NODE_BUDGET: usize = 10_000;

/// Initial weight assigned to a rule synthesized from a calendar event, by priority.
pub fn calendar_rule_weight(priority: &str) -> f64 {
    match priority {
        "HIGH" => 0.85,
        "MEDIUM" => 0.75,
        "LOW" => 0.65,
        _ => DEFAULT_RULE_WEIGHT,
    }
}
