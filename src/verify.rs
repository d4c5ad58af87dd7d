//! Consensus-critical proof verification (§4.3).
//!
//! `verify(problem, solution, budget)` is total and deterministic: it never
//! panics, never errors, and never consults wall-clock time. Exceeding a
//! hard budget (`max_ops`, `max_memory_bytes`) yields `false`, the same
//! verdict as a wrong answer, so every node reaches the same conclusion
//! from the same inputs regardless of the hardware it runs on.

use crate::types::{HardwareTier, Problem, ProblemType, Solution, VerifyBudget};

/// Non-consensus-critical bookkeeping about a verification run: informational
/// only, never hashed, never compared across nodes (§4.4 - "no measurement
/// that varies across hardware may enter consensus scoring").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerificationMetrics {
    pub ops_used: u64,
    pub peak_memory_bytes: u64,
    pub budget_exceeded: bool,
}

/// Consensus entry point (§4.3): dispatches on problem type. Only subset-sum
/// is consensus-critical today (§9 open question a); SAT/TSP are scaffolded
/// and always verify `false` until their golden vectors are published.
pub fn verify_solution(problem: &Problem, solution: &Solution, budget: &VerifyBudget) -> bool {
    verify_solution_metered(problem, solution, budget).0
}

/// Same verdict as `verify_solution`, plus the informational metrics C4's
/// work-score computation needs (solve-cost/verify-cost asymmetry). The
/// metrics never affect the returned bool.
pub fn verify_solution_metered(
    problem: &Problem,
    solution: &Solution,
    budget: &VerifyBudget,
) -> (bool, VerificationMetrics) {
    match problem.problem_type {
        ProblemType::SubsetSum => verify_subset_sum(problem, solution, budget),
        ProblemType::Sat | ProblemType::Tsp => (false, VerificationMetrics::default()),
    }
}

/// §4.3 subset-sum algorithm, exactly as specified:
/// 1. `|indices| >= 1`, all `< |elements|`, strictly increasing.
/// 2. Sum selected elements with an overflow-guarded add; overflow -> false.
/// 3. `sum == target`.
fn verify_subset_sum(
    problem: &Problem,
    solution: &Solution,
    budget: &VerifyBudget,
) -> (bool, VerificationMetrics) {
    let mut metrics = VerificationMetrics::default();

    if solution.indices.is_empty() {
        return (false, metrics);
    }

    let mut prev: Option<u32> = None;
    for &idx in &solution.indices {
        metrics.ops_used += 1;
        if metrics.ops_used > budget.max_ops {
            metrics.budget_exceeded = true;
            return (false, metrics);
        }

        if idx as usize >= problem.elements.len() {
            return (false, metrics);
        }
        if let Some(p) = prev {
            if idx <= p {
                return (false, metrics);
            }
        }
        prev = Some(idx);
    }

    let mut sum: i64 = 0;
    for &idx in &solution.indices {
        metrics.ops_used += 1;
        if metrics.ops_used > budget.max_ops {
            metrics.budget_exceeded = true;
            return (false, metrics);
        }

        let element = problem.elements[idx as usize];
        sum = match sum.checked_add(element) {
            Some(s) => s,
            None => return (false, metrics),
        };
    }

    // Peak working set: the index list plus the running accumulator.
    metrics.peak_memory_bytes =
        (solution.indices.len() * std::mem::size_of::<u32>() + std::mem::size_of::<i64>()) as u64;
    if metrics.peak_memory_bytes > budget.max_memory_bytes {
        metrics.budget_exceeded = true;
        return (false, metrics);
    }

    (sum == problem.target, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProblemType;

    fn problem(tier: HardwareTier, elements: Vec<i64>, target: i64) -> Problem {
        Problem {
            problem_type: ProblemType::SubsetSum,
            tier,
            elements,
            target,
            timestamp: 1000,
        }
    }

    fn solution(indices: Vec<u32>) -> Solution {
        Solution {
            indices,
            timestamp: 1001,
        }
    }

    #[test]
    fn accepts_correct_subset() {
        let p = problem(HardwareTier::Desktop, vec![1, 2, 3, 4, 5], 9);
        let s = solution(vec![0, 2, 4]); // 1+3+5 = 9
        let budget = VerifyBudget::from_tier(HardwareTier::Desktop);
        assert!(verify_solution(&p, &s, &budget));
    }

    #[test]
    fn rejects_wrong_sum() {
        let p = problem(HardwareTier::Desktop, vec![1, 2, 3, 4, 5], 9);
        let s = solution(vec![0, 1]); // 1+2 = 3
        let budget = VerifyBudget::from_tier(HardwareTier::Desktop);
        assert!(!verify_solution(&p, &s, &budget));
    }

    #[test]
    fn rejects_out_of_bounds_index() {
        let p = problem(HardwareTier::Desktop, vec![1, 2, 3, 4, 5], 9);
        let s = solution(vec![10]);
        let budget = VerifyBudget::from_tier(HardwareTier::Desktop);
        assert!(!verify_solution(&p, &s, &budget));
    }

    #[test]
    fn rejects_non_increasing_indices() {
        let p = problem(HardwareTier::Desktop, vec![1, 2, 3, 4, 5], 9);
        let s = solution(vec![2, 0, 4]);
        let budget = VerifyBudget::from_tier(HardwareTier::Desktop);
        assert!(!verify_solution(&p, &s, &budget));
    }

    #[test]
    fn rejects_duplicate_indices() {
        let p = problem(HardwareTier::Desktop, vec![1, 2, 3, 4, 5], 9);
        let s = solution(vec![0, 0, 4]);
        let budget = VerifyBudget::from_tier(HardwareTier::Desktop);
        assert!(!verify_solution(&p, &s, &budget));
    }

    #[test]
    fn rejects_empty_solution() {
        let p = problem(HardwareTier::Desktop, vec![1, 2, 3, 4, 5], 9);
        let s = solution(vec![]);
        let budget = VerifyBudget::from_tier(HardwareTier::Desktop);
        assert!(!verify_solution(&p, &s, &budget));
    }

    #[test]
    fn single_index_target_match_is_valid() {
        let p = problem(HardwareTier::Desktop, vec![9, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12], 9);
        let s = solution(vec![0]);
        let budget = VerifyBudget::from_tier(HardwareTier::Desktop);
        assert!(verify_solution(&p, &s, &budget));
    }

    #[test]
    fn exceeding_op_budget_returns_false_not_error() {
        let p = problem(HardwareTier::Desktop, vec![1; 14], 10);
        let s = solution((0..14).collect());
        let tiny_budget = VerifyBudget {
            max_ops: 2,
            max_duration_ms: 1000,
            max_memory_bytes: 1024 * 1024,
        };
        let (ok, metrics) = verify_solution_metered(&p, &s, &tiny_budget);
        assert!(!ok);
        assert!(metrics.budget_exceeded);
    }

    #[test]
    fn wall_clock_never_influences_verdict() {
        // verify_solution takes no time input at all - this is a
        // compile-time guarantee, exercised here just for documentation.
        let p = problem(HardwareTier::Desktop, vec![1, 2, 3, 4, 5], 9);
        let s = solution(vec![0, 2, 4]);
        let budget = VerifyBudget::from_tier(HardwareTier::Desktop);
        assert_eq!(verify_solution(&p, &s, &budget), verify_solution(&p, &s, &budget));
    }

    #[test]
    fn sat_and_tsp_are_scaffolded_never_true() {
        let p = Problem {
            problem_type: ProblemType::Sat,
            tier: HardwareTier::Desktop,
            elements: vec![],
            target: 0,
            timestamp: 0,
        };
        let s = solution(vec![0]);
        let budget = VerifyBudget::permissive();
        assert!(!verify_solution(&p, &s, &budget));
    }
}
