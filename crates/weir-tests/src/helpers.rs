//! Shared test helpers for scenario, invariant and persistence tests.

use std::sync::Arc;

use weir_core::clock::ManualClock;
use weir_core::constants::{ACC_SCALE, DEFAULT_MAX_SUPPLY};
use weir_core::error::{FarmError, WeirError};
use weir_core::ledger::{MemoryRewardAsset, MemoryUnitLedger};
use weir_core::math::mul_div;
use weir_core::state::{FarmState, MemoryFarmStore};
use weir_core::traits::{FarmStore, RewardAsset};
use weir_core::types::{AccountId, Params, UnitId};
use weir_farm::{Context, Farm};

/// Start of the simulated timeline.
pub const T0: u64 = 1_700_000_000;

/// Account the engine holds funds under.
pub fn engine() -> AccountId {
    AccountId::from_name("farm")
}

/// Participant account from a seed byte.
pub fn user(seed: u8) -> AccountId {
    AccountId::from_name(&format!("user-{seed}"))
}

/// Stake unit from a seed byte.
pub fn unit(seed: u8) -> UnitId {
    UnitId::from_symbol(&format!("LP-{seed}"))
}

/// Genesis parameters with the given emission rate and lock pool share.
pub fn params(rate: u128, percent: u64) -> Params {
    Params {
        staking_weight_percent: percent,
        ..Params::genesis(rate, 0)
    }
}

/// The engine error inside `err`. Panics on asset or storage errors.
pub fn farm_err(err: WeirError) -> FarmError {
    match err.as_farm() {
        Some(e) => e.clone(),
        None => panic!("expected an engine error, got {err}"),
    }
}

/// A farm wired to in-memory ledgers and a manual clock.
pub struct TestFarm {
    pub farm: Farm,
    pub asset: MemoryRewardAsset,
    pub units: MemoryUnitLedger,
    pub clock: ManualClock,
}

impl TestFarm {
    /// Fresh farm on a [`MemoryFarmStore`].
    pub fn new(genesis: Params) -> Self {
        Self::with_store(genesis, Arc::new(MemoryFarmStore::new()))
    }

    /// Farm on `store`, starting from `genesis` if the store is empty.
    pub fn with_store(genesis: Params, store: Arc<dyn FarmStore>) -> Self {
        let asset = MemoryRewardAsset::new("WEIR", DEFAULT_MAX_SUPPLY);
        Self::with_parts(
            genesis,
            store,
            asset,
            MemoryUnitLedger::new(),
            ManualClock::new(T0),
        )
    }

    /// Farm over existing ledgers and clock, e.g. to reopen a store.
    pub fn with_parts(
        genesis: Params,
        store: Arc<dyn FarmStore>,
        asset: MemoryRewardAsset,
        units: MemoryUnitLedger,
        clock: ManualClock,
    ) -> Self {
        let ctx = Context::new(
            Arc::new(asset.clone()),
            Arc::new(units.clone()),
            Arc::new(clock.clone()),
            engine(),
        );
        let farm = Farm::open(ctx, store, genesis).unwrap();
        Self {
            farm,
            asset,
            units,
            clock,
        }
    }

    pub fn now(&self) -> u64 {
        use weir_core::traits::Clock;
        self.clock.now()
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(secs);
    }

    /// Give `who` reward asset from outside the farm.
    pub fn fund(&self, who: &AccountId, amount: u128) {
        self.asset.mint(who, amount).unwrap();
    }

    /// Give `who` stake units.
    pub fn issue(&self, unit: &UnitId, who: &AccountId, amount: u128) {
        self.units.issue(unit, who, amount);
    }

    pub fn balance(&self, who: &AccountId) -> u128 {
        self.asset.balance_of(who)
    }

    /// Register a pool for `unit`, fund `who` and deposit.
    pub fn pool_with_deposit(&self, unit: UnitId, weight: u64, who: &AccountId, amount: u128) -> u32 {
        let id = self.farm.add_pool(weight, unit, false).unwrap();
        self.issue(&unit, who, amount);
        self.farm.deposit(id, who, amount).unwrap();
        id
    }
}

/// Check the accounting invariants of a committed state.
///
/// Weights add up, every stake's debt is covered by the accumulator, lock
/// totals match the lock map, and the engine holds at least the locked
/// principal.
pub fn check_invariants(state: &FarmState, asset: &MemoryRewardAsset) -> Result<(), String> {
    if !state.weights_consistent() {
        let sum: u64 = state.pools().iter().map(|p| p.weight).sum();
        return Err(format!(
            "weights sum to {sum}, total_weight is {}",
            state.params().total_weight
        ));
    }

    for ((pool, who), stake) in state.stakes() {
        let acc = state.pool(*pool).map_err(|e| e.to_string())?.acc_reward_per_share;
        let gross = mul_div(stake.amount, acc, ACC_SCALE).map_err(|e| e.to_string())?;
        if stake.reward_debt > gross {
            return Err(format!(
                "pool {pool} {who}: debt {} exceeds accrued {gross}",
                stake.reward_debt
            ));
        }
    }

    let locked: u128 = state.locks().values().map(|l| l.locked_amount).sum();
    if locked != state.total_locked() {
        return Err(format!(
            "locks sum to {locked}, total_locked is {}",
            state.total_locked()
        ));
    }
    let users = state.locks().values().filter(|l| l.locked_amount > 0).count() as u64;
    if users != state.locked_users() {
        return Err(format!(
            "{users} locks held, locked_users is {}",
            state.locked_users()
        ));
    }
    for (who, lock) in state.locks() {
        let stake = state.stake(weir_core::constants::LOCK_POOL, who);
        if stake.amount != lock.locked_amount {
            return Err(format!(
                "{who}: lock pool stake {} differs from locked {}",
                stake.amount, lock.locked_amount
            ));
        }
    }

    let held = asset.balance_of(&engine());
    if held < state.total_locked() {
        return Err(format!(
            "engine holds {held}, below locked principal {}",
            state.total_locked()
        ));
    }
    if asset.total_supply() > asset.max_supply() {
        return Err(format!(
            "supply {} above cap {}",
            asset.total_supply(),
            asset.max_supply()
        ));
    }
    Ok(())
}
