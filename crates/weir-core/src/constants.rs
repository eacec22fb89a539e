//! Engine constants. All monetary values are in base units (1 WEIR = 10^18 units).

/// Base units per whole reward token.
pub const COIN: u128 = 1_000_000_000_000_000_000;

/// Fixed-point scale shared by the accumulator, steepness and vote power.
///
/// `1.0` is represented as `WAD`.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Scale of `Pool::acc_reward_per_share`.
pub const ACC_SCALE: u128 = WAD;

/// Default hard cap of the reward asset used by genesis configuration.
pub const DEFAULT_MAX_SUPPLY: u128 = 100_000_000 * COIN;

/// Upper bound on the global emission rate, in base units per second.
pub const MAX_EMISSION_RATE: u128 = 100 * COIN;

/// Upper bound on the share of combined weight assigned to the lock pool.
pub const MAX_STAKING_PERCENT: u64 = 30;

/// Divisor for `staking_weight_percent`.
pub const PERCENT_PRECISION: u64 = 100;

/// Lower bound on the decay steepness `k` (1.0).
pub const K_MIN: u128 = WAD;

/// Upper bound on the decay steepness `k` (6.0).
///
/// Keeps `k * x` inside the range covered by the exponential table.
pub const K_MAX: u128 = 6 * WAD;

/// Default steepness (3.0).
pub const DEFAULT_STEEPNESS: u128 = 3 * WAD;

/// Seconds per day.
pub const DAY_SECS: u64 = 86_400;

/// Shortest lock (and shortest extension) accepted by the lock pool.
pub const MIN_LOCK_TIME: u64 = 7 * DAY_SECS;

/// Longest lock (and longest extension) accepted by the lock pool.
pub const MAX_LOCK_TIME: u64 = 365 * DAY_SECS;

/// Index of the lock pool.
pub const LOCK_POOL: u32 = 0;

/// Initial weight of the lock pool before any rebalance.
pub const INITIAL_LOCK_POOL_WEIGHT: u64 = 0;

/// Default staking weight percent applied at genesis.
pub const DEFAULT_STAKING_PERCENT: u64 = 20;
