//! Work score and difficulty adjustment (§4.4).
//!
//! Every quantity that feeds the consensus-critical score is a pure,
//! deterministic function of `(problem, solution, canonical verify cost)` -
//! never of wall-clock time, host CPU speed, or measured joules. §4.4 is
//! explicit that "no measurement that varies across hardware may enter
//! consensus scoring"; the formula's `measured_solve_time`/`measured_solve_space`/
//! `solve_energy_joules` terms are therefore resolved here (§9 open question
//! b) against *canonical* proxies instead of real solver telemetry:
//!
//! - solve cost is approximated by the NP-hardness proxy `2^|elements|`
//!   (deterministic given the problem alone);
//! - verify cost is the op/byte count `verify::verify_solution_metered`
//!   actually produces (a deterministic function of `(problem, solution)`,
//!   not of the machine it ran on);
//! - energy efficiency has no canonical proxy and is pinned to neutral
//!   (`SCALE`, i.e. 1.0) in `SCORE_V1` until one is defined.
//!
//! Real solver telemetry (wall time, RSS, joules) remains available to
//! callers as `VerificationMetrics`/miner-side stats for monitoring, but
//! never reaches this module.

use crate::types::{Problem, ProblemType, Solution, VerifyBudget};
use crate::verify::verify_solution_metered;

/// Fixed-point scale: `SCALE ≡ 1.0` (§4.4).
pub const SCALE: u64 = 1_000_000;

/// Pinned score-table version. A change to any constant below requires a
/// new `SCORE_V` identifier and a `codec_version` bump (§9 open question b).
pub const SCORE_V: u32 = 1;

/// Exponent `k` in `score = (...) / scaled_denom^k` - one less than the
/// count of scaled factors multiplied together, so the product renormalizes
/// back into fixed-point range exactly once.
const SCORE_EXPONENT_K: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    /// Scaled weight per problem type (§4.4 `problem_weight`).
    pub problem_weight: u64,
    /// Scaled multiplier derived from instance size (§4.4 `size_factor`).
    pub size_factor: u64,
    /// Scaled solution-quality term (§4.4 `quality_score`); neutral (SCALE)
    /// absent a defined quality metric for subset-sum.
    pub quality_score: u64,
    /// Scaled energy-efficiency term; neutral (SCALE) - no canonical proxy.
    pub energy_efficiency: u64,
}

pub fn weights_for(problem_type: ProblemType, element_count: usize) -> ScoreWeights {
    let problem_weight = match problem_type {
        ProblemType::SubsetSum => SCALE,
        ProblemType::Sat | ProblemType::Tsp => SCALE, // scaffolded, never reached via verify=false
    };
    // Bigger instances are proportionally harder; cap growth so size_factor
    // stays comfortably inside u64/u128 arithmetic at the largest tier (32).
    let size_factor = SCALE.saturating_mul((element_count as u64).max(1)) / 16;
    ScoreWeights {
        problem_weight,
        size_factor: size_factor.max(1),
        quality_score: SCALE,
        energy_efficiency: SCALE,
    }
}

/// Deterministic "solve cost" proxy: `2^|elements|`, capped to avoid
/// overflow at the largest tier (32 elements -> 2^32, well inside u128).
fn canonical_solve_ops(problem: &Problem) -> u128 {
    1u128 << problem.elements.len().min(63)
}

fn canonical_solve_space_bytes(problem: &Problem) -> u128 {
    canonical_solve_ops(problem) * std::mem::size_of::<i64>() as u128
}

/// `a` and `b` are already SCALE-fixed-point; returns their SCALE-fixed
/// ratio `scaled(a)/max(scaled(b),1)`, matching §4.4's `scaled(x)/max(scaled(y),1)`.
fn scaled_ratio(a: u128, b: u128) -> u128 {
    let scale = SCALE as u128;
    let a_scaled = a.saturating_mul(scale);
    let b_scaled = (b.saturating_mul(scale)).max(1);
    a_scaled / b_scaled
}

/// Integer square root via Newton's method (no floating point).
fn isqrt(n: u128) -> u128 {
    if n == 0 {
        return 0;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// The consensus-critical score recorded in / compared against the header
/// (§4.4). Total and deterministic given `(problem, solution, budget)`:
/// every input is either part of the revealed problem/solution or derived
/// from the canonical verify pass, never from wall-clock measurement.
pub fn compute_work_score(problem: &Problem, solution: &Solution, budget: &VerifyBudget) -> u64 {
    let (valid, metrics) = verify_solution_metered(problem, solution, budget);
    if !valid {
        return 0;
    }

    let weights = weights_for(problem.problem_type, problem.elements.len());

    let solve_ops = canonical_solve_ops(problem);
    let verify_ops = (metrics.ops_used as u128).max(1);
    let time_asymmetry = scaled_ratio(solve_ops, verify_ops);

    let solve_space = canonical_solve_space_bytes(problem);
    let verify_space = (metrics.peak_memory_bytes as u128).max(1);
    let space_asymmetry = isqrt(scaled_ratio(solve_space, verify_space));

    let scale = SCALE as u128;
    let product = time_asymmetry
        .saturating_mul(space_asymmetry)
        .saturating_mul(weights.problem_weight as u128)
        .saturating_mul(weights.size_factor as u128)
        .saturating_mul(weights.quality_score as u128)
        .saturating_mul(weights.energy_efficiency as u128);

    let denom = scale.pow(SCORE_EXPONENT_K);
    (product / denom.max(1)).min(u64::MAX as u128) as u64
}

/// Difficulty adjustment (§4.4): EWMA over the most recent `window` accepted
/// scores, clamped into `[min_target, max_target]`. `smoothing_ppm` is the
/// weight (parts per million) given to the newest sample.
pub fn ewma_difficulty(
    previous_target: u32,
    recent_scores: &[u64],
    smoothing_ppm: u32,
    min_target: u32,
    max_target: u32,
) -> u32 {
    if recent_scores.is_empty() {
        return previous_target.clamp(min_target, max_target);
    }

    let ppm = smoothing_ppm as u128;
    let mut ewma = previous_target as u128 * SCALE as u128;
    for &score in recent_scores {
        // ewma = ewma*(1-ppm) + score*ppm, all in ppm-of-SCALE fixed point.
        ewma = (ewma.saturating_mul(1_000_000u128.saturating_sub(ppm))
            + (score as u128).saturating_mul(SCALE as u128).saturating_mul(ppm))
            / 1_000_000u128;
    }
    let adjusted = (ewma / SCALE as u128).min(u32::MAX as u128) as u32;
    adjusted.clamp(min_target, max_target)
}

/// Emission schedule (§4.6): halving every `halving_interval` blocks, floored
/// at `min_reward`.
pub fn block_reward(block_index: u32, initial_reward: u64, halving_interval: u32, min_reward: u64) -> u64 {
    if halving_interval == 0 {
        return initial_reward.max(min_reward);
    }
    let halvings = block_index / halving_interval;
    let reward = if halvings >= 64 {
        0
    } else {
        initial_reward >> halvings
    };
    reward.max(min_reward)
}
