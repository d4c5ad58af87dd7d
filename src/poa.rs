//! Proof-of-authority block engine (§4.9): round-robin leader schedule,
//! authorization/turn checks, and the validator slashing table. Grounded in
//! the teacher's `network-b/node/src/validator.rs` `BlockValidator` - the
//! same "structural check, then authorization, then state application"
//! validation sequence - generalized from the teacher's hash-puzzle
//! difficulty check to round-robin turn/authorization checks over a fixed
//! validator set.

use crate::errors::{ConsensusError, Result};
use crate::types::{Address, BlockHeader, ValidatorRecord};

/// One of the four offenses in §4.9's slashing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offense {
    /// Structurally or semantically invalid block proposed.
    InvalidBlock,
    /// Two conflicting headers signed by the same validator at one height.
    DoubleSign,
    /// Block proposed by a validator whose turn it was not.
    OutOfTurn,
    /// Validator missed its turn entirely (soft deadline exceeded, §4.9).
    LivenessFailure,
}

/// Per-offense effect (§4.9 table). `jail_blocks` is `None` when the offense
/// does not jail; `ban` forces `ValidatorRecord::banned = true` outright.
struct SlashEffect {
    reputation_delta: i64,
    jail: bool,
    ban: bool,
    /// Weighted severity added to `cumulative_severity` for the ban
    /// threshold check (§4.9: "cumulative_severity >= BAN_THRESHOLD").
    severity: u64,
}

fn effect_for(offense: Offense) -> SlashEffect {
    match offense {
        Offense::InvalidBlock => SlashEffect {
            reputation_delta: -50_000,
            jail: true,
            ban: false,
            severity: 40,
        },
        Offense::DoubleSign => SlashEffect {
            reputation_delta: i64::MIN, // rep -> 0, handled specially below
            jail: false,
            ban: true,
            severity: 100,
        },
        Offense::OutOfTurn => SlashEffect {
            reputation_delta: -10_000,
            jail: false,
            ban: false,
            severity: 10,
        },
        Offense::LivenessFailure => SlashEffect {
            reputation_delta: -1_000,
            jail: false,
            ban: false,
            severity: 1,
        },
    }
}

/// Reputation recovered for every block a validator successfully proposes
/// (§4.9: "Reputation recovers at +100 per block successfully proposed").
const REPUTATION_RECOVERY: i64 = 100;

/// Ordered, fixed validator set for one PoA round-robin schedule (§4.9:
/// "fixed validator set encoded in extra_data"). Membership never changes
/// within a `codec_version`; only per-validator reputation/jail/ban state
/// mutates block to block.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: Vec<ValidatorRecord>,
}

impl ValidatorSet {
    pub fn new(public_keys: &[Address]) -> Self {
        Self {
            validators: public_keys.iter().map(|pk| ValidatorRecord::new(*pk)).collect(),
        }
    }

    pub fn from_records(records: Vec<ValidatorRecord>) -> Self {
        Self { validators: records }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn records(&self) -> &[ValidatorRecord] {
        &self.validators
    }

    fn index_of(&self, public_key: &Address) -> Option<usize> {
        self.validators.iter().position(|v| &v.public_key == public_key)
    }

    pub fn get(&self, public_key: &Address) -> Option<&ValidatorRecord> {
        self.index_of(public_key).map(|i| &self.validators[i])
    }

    /// Scheduled leader for `block_index` (§4.9: `leader = validators[index
    /// mod N]`), skipping jailed/banned validators in favor of the next
    /// member in modular order (§4.9: "the next validator in modular order
    /// produces instead"). Returns `None` only if every validator is
    /// inactive.
    pub fn leader(&self, block_index: u32, current_index: u32) -> Option<Address> {
        let n = self.validators.len();
        if n == 0 {
            return None;
        }
        for offset in 0..n {
            let idx = (block_index as usize + offset) % n;
            let candidate = &self.validators[idx];
            if candidate.is_active(current_index) {
                return Some(candidate.public_key);
            }
        }
        None
    }

    /// Authorization + turn check for a proposed block (§4.5, §4.9): the
    /// miner must be the scheduled leader for `block_index` and must be an
    /// active (non-banned, non-jailed) validator.
    pub fn authorize(&self, header: &BlockHeader, current_index: u32) -> Result<()> {
        let record = self.get(&header.miner_address).ok_or_else(|| ConsensusError::UnauthorizedValidator {
            miner: hex::encode(header.miner_address),
        })?;

        if record.banned {
            return Err(ConsensusError::ValidatorBanned {
                validator: hex::encode(record.public_key),
            });
        }
        if let Some(until) = record.jail_until {
            if current_index < until {
                return Err(ConsensusError::ValidatorJailed {
                    validator: hex::encode(record.public_key),
                    until,
                });
            }
        }

        let scheduled = self.leader(header.block_index, current_index);
        if scheduled != Some(header.miner_address) {
            return Err(ConsensusError::OutOfTurn {
                expected: scheduled.map(hex::encode).unwrap_or_default(),
                actual: hex::encode(header.miner_address),
            });
        }
        Ok(())
    }

    /// Apply §4.9's slashing table to `validator`. `current_index` anchors
    /// the jail window (`jail_until = current_index + jail_blocks`).
    pub fn slash(&mut self, validator: &Address, offense: Offense, current_index: u32, jail_blocks: u32, ban_threshold: u64) -> Result<()> {
        let idx = self
            .index_of(validator)
            .ok_or_else(|| ConsensusError::UnauthorizedValidator {
                miner: hex::encode(validator),
            })?;
        let effect = effect_for(offense);
        let record = &mut self.validators[idx];

        if matches!(offense, Offense::DoubleSign) {
            record.reputation = 0;
        } else {
            record.reputation = (record.reputation + effect.reputation_delta).max(0);
        }
        if effect.jail {
            record.jail_until = Some(current_index + jail_blocks);
        }
        if effect.ban {
            record.banned = true;
        }
        record.cumulative_severity = record.cumulative_severity.saturating_add(effect.severity);
        if record.cumulative_severity >= ban_threshold {
            record.banned = true;
        }
        Ok(())
    }

    /// Reward successful production (§4.9): `+100` reputation, capped at
    /// `ValidatorRecord::MAX_REPUTATION`.
    pub fn reward_production(&mut self, validator: &Address) {
        if let Some(idx) = self.index_of(validator) {
            let record = &mut self.validators[idx];
            record.reputation = (record.reputation + REPUTATION_RECOVERY).min(ValidatorRecord::MAX_REPUTATION);
        }
    }
}
