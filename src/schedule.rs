//! C6 — Schedule Optimizer: A* branch-and-bound over candidate x timing
//! lead-time assignment, maximizing total expected reward.
//!
//! The search space is `∏(k_i + 1)` (one "skip" action plus each timing
//! option per candidate) — small in practice, but large enough that a
//! per-candidate greedy choice can miss a jointly-better assignment (spec
//! §4.6). Node ordering follows the reversed `BinaryHeap` idiom: we want a
//! max-heap on `g + h`, so `Ord` is implemented to put the highest
//! priority first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SEARCH_NODE_BUDGET;
use crate::inference::Candidate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleMeta {
    pub total_expected_reward: f64,
    pub nodes_explored: usize,
    pub search_time_ms: u64,
    pub search_completed: bool,
    pub optimization_quality: &'static str,
}

pub struct ScheduleResult {
    /// `assignment[i]` is the chosen lead-time for `candidates[i]`, or
    /// `None` if that candidate was skipped.
    pub assignment: Vec<Option<i64>>,
    pub meta: ScheduleMeta,
}

#[derive(Clone)]
struct Node {
    depth: usize,
    g: f64,
    assignment: Vec<Option<i64>>,
    seq: u64,
}

struct Scored {
    priority: f64,
    depth: usize,
    seq: u64,
    node: Node,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.depth == other.depth && self.seq == other.seq
    }
}
impl Eq for Scored {}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on priority; ties prefer smaller depth (more exploration
        // left), then smaller sequence number, for determinism (spec §4.6).
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.depth.cmp(&self.depth))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reward of choosing `candidate`'s `j`-th timing option.
fn option_reward(candidate: &Candidate, option_index: usize) -> f64 {
    candidate.suggestion_score * candidate.timing_options[option_index].confidence
}

/// Per-candidate best achievable reward (skip included, which is 0 and
/// never exceeds a positive option reward here).
fn best_option_reward(candidate: &Candidate) -> f64 {
    (0..candidate.timing_options.len())
        .map(|j| option_reward(candidate, j))
        .fold(0.0, f64::max)
}

/// Run the A* branch-and-bound search (spec §4.6), falling back to greedy
/// if the node budget is exhausted before the search space is exhausted.
pub fn optimize(candidates: &[Candidate]) -> ScheduleResult {
    optimize_with_budget(candidates, DEFAULT_SEARCH_NODE_BUDGET)
}

pub fn optimize_with_budget(candidates: &[Candidate], node_budget: usize) -> ScheduleResult {
    let started = Instant::now();
    let n = candidates.len();

    // max_remaining[i] = sum of best achievable reward for candidates i..n.
    let mut max_remaining = vec![0.0; n + 1];
    for i in (0..n).rev() {
        max_remaining[i] = max_remaining[i + 1] + best_option_reward(&candidates[i]);
    }

    let mut seq_counter: u64 = 0;
    let mut heap = BinaryHeap::new();
    heap.push(Scored {
        priority: max_remaining[0],
        depth: 0,
        seq: seq_counter,
        node: Node {
            depth: 0,
            g: 0.0,
            assignment: Vec::with_capacity(n),
            seq: seq_counter,
        },
    });

    let mut best_complete: Option<(f64, Vec<Option<i64>>)> = None;
    let mut nodes_explored = 0usize;

    while let Some(Scored { node, .. }) = heap.pop() {
        nodes_explored += 1;
        if nodes_explored > node_budget {
            break;
        }

        if node.depth == n {
            let better = match &best_complete {
                Some((best, _)) => node.g > *best,
                None => true,
            };
            if better {
                best_complete = Some((node.g, node.assignment.clone()));
            }
            continue;
        }

        let candidate = &candidates[node.depth];
        let bound = best_complete.as_ref().map(|(r, _)| *r);

        // Skip action: reward 0.
        push_child(
            &mut heap,
            &mut seq_counter,
            &node,
            None,
            0.0,
            &max_remaining,
            bound,
        );

        for j in 0..candidate.timing_options.len() {
            let reward = option_reward(candidate, j);
            push_child(
                &mut heap,
                &mut seq_counter,
                &node,
                Some(candidate.timing_options[j].lead_time_minutes),
                reward,
                &max_remaining,
                bound,
            );
        }
    }

    let search_completed = heap.is_empty();

    let (assignment, total_expected_reward, optimization_quality, search_completed) =
        if search_completed && best_complete.is_some() {
            let (reward, assignment) = best_complete.unwrap();
            (assignment, reward, "optimal", true)
        } else {
            log::warn!(
                "schedule search exhausted its node budget ({nodes_explored}/{node_budget} nodes); \
                 falling back to greedy assignment"
            );
            let greedy = greedy_assignment(candidates);
            let reward = total_reward(candidates, &greedy);
            (greedy, reward, "greedy_fallback", false)
        };

    ScheduleResult {
        assignment,
        meta: ScheduleMeta {
            total_expected_reward,
            nodes_explored,
            search_time_ms: started.elapsed().as_millis() as u64,
            search_completed,
            optimization_quality,
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn push_child(
    heap: &mut BinaryHeap<Scored>,
    seq_counter: &mut u64,
    parent: &Node,
    chosen: Option<i64>,
    reward: f64,
    max_remaining: &[f64],
    bound: Option<f64>,
) {
    let depth = parent.depth + 1;
    let g = parent.g + reward;
    let h = max_remaining[depth];

    // Pruning: a completion from here can never beat the current best.
    if let Some(best) = bound {
        if g + h <= best {
            return;
        }
    }

    *seq_counter += 1;
    let mut assignment = parent.assignment.clone();
    assignment.push(chosen);

    heap.push(Scored {
        priority: g + h,
        depth,
        seq: *seq_counter,
        node: Node {
            depth,
            g,
            assignment,
            seq: *seq_counter,
        },
    });
}

/// Per-candidate `argmax` (plus skip if that scores higher) with no joint
/// reasoning — used as the A* fallback and as the non-search `infer` path's
/// baseline for comparison in tests.
pub fn greedy_assignment(candidates: &[Candidate]) -> Vec<Option<i64>> {
    candidates
        .iter()
        .map(|c| {
            let mut best_reward = 0.0;
            let mut best_lead_time = None;
            for (j, option) in c.timing_options.iter().enumerate() {
                let reward = option_reward(c, j);
                if reward > best_reward {
                    best_reward = reward;
                    best_lead_time = Some(option.lead_time_minutes);
                }
            }
            best_lead_time
        })
        .collect()
}

pub fn total_reward(candidates: &[Candidate], assignment: &[Option<i64>]) -> f64 {
    candidates
        .iter()
        .zip(assignment)
        .map(|(c, chosen)| match chosen {
            None => 0.0,
            Some(lead_time) => c
                .timing_options
                .iter()
                .find(|o| o.lead_time_minutes == *lead_time)
                .map(|o| c.suggestion_score * o.confidence)
                .unwrap_or(0.0),
        })
        .sum()
}
