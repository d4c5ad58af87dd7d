//! Pinned consensus parameters (§6 "Parameters"). A plain struct, not a CLI
//! - CLI parsing belongs to the node-binary layer this core explicitly
//! excludes (§1 Non-goals); the teacher's `network-b/node/src/config.rs`
//! `clap` surface has no counterpart here.

use crate::hash::EPOCH_SECONDS;
use crate::types::HardwareTier;

/// Every parameter here is pinned for a given `codec_version` (§6): changing
/// one requires a version bump and a new golden vector set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusParams {
    /// Target seconds between blocks (§4.9).
    pub block_interval_secs: u64,
    /// Grace window, in seconds, a late block is still accepted within.
    pub turn_tolerance_secs: u64,

    /// Base block reward before halving (§4.6).
    pub initial_reward: u64,
    /// Blocks between halvings.
    pub halving_interval: u32,
    /// Reward floor once halving would otherwise reach zero.
    pub min_reward: u64,

    /// Difficulty clamp floor/ceiling (§4.4).
    pub min_target: u32,
    pub max_target: u32,
    /// Blocks of trailing score history the EWMA adjustment looks at.
    pub diff_window: usize,
    /// Parts-per-million weight given to the newest sample in the EWMA.
    pub diff_smoothing_ppm: u32,

    /// Fee-split triple, parts per million, must sum to 1_000_000 (§4.6).
    pub producer_fee_ppm: u32,
    pub burn_fee_ppm: u32,
    pub treasury_fee_ppm: u32,

    /// Epoch bucket width for commit-reveal salts (§4.4).
    pub epoch_seconds: i64,
    /// Retention window for the replay cache, in blocks (§4.10).
    pub epoch_replay_ttl: u32,

    /// Cumulative weighted-severity threshold that bans a validator (§4.9).
    pub ban_threshold: u64,
    /// Blocks a high-severity offense jails a validator for.
    pub jail_blocks: u32,

    /// Depth behind the canonical tip at which blocks are final (§3, §4.8).
    pub checkpoint_depth: u32,

    /// Per-block gas cap summed across transactions (§4.5).
    pub block_gas_cap: u64,
    /// Mempool admission cap (transaction count) (§4.7).
    pub mempool_max_transactions: usize,
    /// Mempool admission cap (total byte size) (§4.7).
    pub mempool_max_bytes: usize,
    /// Maximum age, in seconds, a pending transaction may sit in the mempool.
    pub mempool_max_age_secs: i64,

    /// Default hardware tier used when none is otherwise specified (tests,
    /// problem generation defaults).
    pub default_tier: HardwareTier,
}

impl ConsensusParams {
    /// Pinned production defaults (§6). The fee triple approximates
    /// `(1 : 1/sqrt(2) : 1/sqrt(2)) / (1+sqrt(2))` in parts per million
    /// (§4.6's Critical Complex Equilibrium ratios), matching spec §8
    /// scenario 3 exactly.
    pub fn mainnet() -> Self {
        Self {
            block_interval_secs: 2,
            turn_tolerance_secs: 1,

            initial_reward: 50_000_000_000,
            halving_interval: 2_102_400, // ~4 years at a 2s block interval
            min_reward: 1,

            min_target: 1,
            max_target: u32::MAX,
            diff_window: 64,
            diff_smoothing_ppm: 100_000,

            producer_fee_ppm: 414_214,
            burn_fee_ppm: 292_893,
            treasury_fee_ppm: 292_893,

            epoch_seconds: EPOCH_SECONDS,
            epoch_replay_ttl: 7 * 24 * 60 * 60 / 2, // 7 days of 2s blocks

            ban_threshold: 100,
            jail_blocks: 100,

            checkpoint_depth: 100,

            block_gas_cap: 30_000_000,
            mempool_max_transactions: 10_000,
            mempool_max_bytes: 20 * 1024 * 1024,
            mempool_max_age_secs: 3600,

            default_tier: HardwareTier::Desktop,
        }
    }

    /// Shorter windows and a lower checkpoint depth, so reorg/checkpoint
    /// tests don't need thousands of blocks to exercise the clamp.
    pub fn for_tests() -> Self {
        Self {
            block_interval_secs: 2,
            turn_tolerance_secs: 1,
            initial_reward: 1000,
            halving_interval: 100,
            min_reward: 1,
            min_target: 1,
            max_target: 1_000_000,
            diff_window: 8,
            diff_smoothing_ppm: 500_000,
            producer_fee_ppm: 414_214,
            burn_fee_ppm: 292_893,
            treasury_fee_ppm: 292_893,
            epoch_seconds: EPOCH_SECONDS,
            epoch_replay_ttl: 50,
            ban_threshold: 100,
            jail_blocks: 10,
            checkpoint_depth: 6,
            block_gas_cap: 1_000_000,
            mempool_max_transactions: 1_000,
            mempool_max_bytes: 1024 * 1024,
            mempool_max_age_secs: 600,
            default_tier: HardwareTier::Mobile,
        }
    }

    /// Sanity check the fee triple sums correctly; run once at startup.
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.producer_fee_ppm as u64 + self.burn_fee_ppm as u64 + self.treasury_fee_ppm as u64;
        if sum != 1_000_000 {
            return Err(format!("fee split ppm triple sums to {sum}, expected 1_000_000"));
        }
        if self.min_target > self.max_target {
            return Err("min_target must not exceed max_target".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_params_are_internally_consistent() {
        assert!(ConsensusParams::mainnet().validate().is_ok());
    }

    #[test]
    fn test_params_are_internally_consistent() {
        assert!(ConsensusParams::for_tests().validate().is_ok());
    }

    #[test]
    fn fee_triple_matches_scenario_3() {
        let p = ConsensusParams::mainnet();
        assert_eq!(p.producer_fee_ppm, 414_214);
        assert_eq!(p.burn_fee_ppm, 292_893);
        assert_eq!(p.treasury_fee_ppm, 292_893);
    }

    #[test]
    fn rejects_bad_fee_split() {
        let mut p = ConsensusParams::for_tests();
        p.producer_fee_ppm += 1;
        assert!(p.validate().is_err());
    }
}
