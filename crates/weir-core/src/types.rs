//! Core engine types: identities, pools, stakes, locks and parameters.
//!
//! All monetary values are in base units (1 WEIR = 10^18 units) held as
//! `u128`. Fixed-point values carry their scale in the field docs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    ACC_SCALE, DEFAULT_STAKING_PERCENT, DEFAULT_STEEPNESS, INITIAL_LOCK_POOL_WEIGHT,
};

/// Index of a pool in the registry. Pool 0 is the lock pool.
pub type PoolId = u32;

/// A 32-byte participant identity.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The zero identity.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Derive an identity from a human-readable name (BLAKE3 of the name).
    pub fn from_name(name: &str) -> Self {
        Self(*blake3::hash(name.as_bytes()).as_bytes())
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Identity of a stake unit (the deposit asset of a pool).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct UnitId(pub [u8; 32]);

impl UnitId {
    /// Derive a unit identity from its ticker symbol.
    pub fn from_symbol(symbol: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"weir-unit:");
        hasher.update(symbol.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// A reward pool.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Pool {
    /// Deposit asset of this pool. Pool 0 holds the reward asset itself.
    pub stake_unit: UnitId,
    /// Allocation points.
    pub weight: u64,
    /// Timestamp (Unix seconds) the accumulator was last advanced to.
    pub last_reward_time: u64,
    /// Cumulative reward per stake unit, scaled by [`ACC_SCALE`].
    pub acc_reward_per_share: u128,
}

impl Pool {
    /// Create a pool with an empty accumulator.
    pub fn new(stake_unit: UnitId, weight: u64, last_reward_time: u64) -> Self {
        Self {
            stake_unit,
            weight,
            last_reward_time,
            acc_reward_per_share: 0,
        }
    }

    /// The lock pool as created at genesis.
    pub fn lock_pool(reward_unit: UnitId, start_time: u64) -> Self {
        Self::new(reward_unit, INITIAL_LOCK_POOL_WEIGHT, start_time)
    }
}

/// A participant's position in one pool.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct UserStake {
    /// Stake units held.
    pub amount: u128,
    /// `amount * acc_reward_per_share / ACC_SCALE` at the last settlement.
    pub reward_debt: u128,
}

impl UserStake {
    /// Reward accrued since the last settlement against accumulator `acc`.
    ///
    /// Saturates at zero; the debt never exceeds the accrued total while the
    /// accumulator is non-decreasing.
    pub fn accrued(&self, acc: u128) -> Option<u128> {
        let gross = crate::math::mul_div(self.amount, acc, ACC_SCALE).ok()?;
        Some(gross.saturating_sub(self.reward_debt))
    }
}

/// A vote-escrow lock in the lock pool.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Lock {
    /// Reward-asset units committed to the lock.
    pub locked_amount: u128,
    /// Unix timestamp at which the principal becomes withdrawable. Zero when unlocked.
    pub unlock_time: u64,
}

impl Lock {
    /// Lifecycle state of this lock at `now`.
    pub fn state(&self, now: u64) -> LockState {
        if self.locked_amount == 0 {
            LockState::Unlocked
        } else if now >= self.unlock_time {
            LockState::Expired
        } else {
            LockState::Active
        }
    }

    /// Seconds left until unlock at `now` (zero once expired).
    pub fn remaining(&self, now: u64) -> u64 {
        self.unlock_time.saturating_sub(now)
    }
}

/// Lifecycle of a lock.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    /// No principal locked.
    Unlocked,
    /// Principal locked and `now < unlock_time`.
    Active,
    /// Principal locked and `now >= unlock_time`; only withdrawal remains.
    Expired,
}

/// Global engine parameters.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Params {
    /// Reward units emitted per second across all pools.
    pub emission_rate: u128,
    /// Share of combined weight assigned to the lock pool, in percent.
    pub staking_weight_percent: u64,
    /// Sum of every pool's weight.
    pub total_weight: u64,
    /// Decay steepness `k`, WAD-scaled.
    pub steepness: u128,
    /// No pool accrues before this Unix timestamp.
    pub reward_start_time: u64,
}

impl Params {
    /// Genesis parameters with the given emission rate and start time.
    pub fn genesis(emission_rate: u128, reward_start_time: u64) -> Self {
        Self {
            emission_rate,
            staking_weight_percent: DEFAULT_STAKING_PERCENT,
            total_weight: INITIAL_LOCK_POOL_WEIGHT,
            steepness: DEFAULT_STEEPNESS,
            reward_start_time,
        }
    }
}

/// Outcome of a reward settlement for one participant.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Claim {
    /// Reward units transferred to the participant.
    pub paid: u128,
    /// Reward units burned (decayed or expired share).
    pub burned: u128,
}

impl Claim {
    /// Total reward settled: paid plus burned.
    pub fn total(&self) -> u128 {
        self.paid.saturating_add(self.burned)
    }
}
