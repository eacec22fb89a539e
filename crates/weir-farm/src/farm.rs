//! The [`Farm`] engine: transactional entry points and snapshot queries.
//!
//! Every mutating call runs as one transaction under the engine-wide
//! [`CallGuard`]: the last committed state is cloned, the operation works on
//! the copy, and only a fully successful operation is persisted through the
//! [`FarmStore`] and swapped in. A failed call drops the copy and reverts
//! the calls it already made on the external ledgers, so engine state and
//! ledger balances are left exactly as they were. Queries read the
//! committed snapshot and never wait on an in-flight transaction.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use weir_core::constants::{K_MAX, K_MIN, MAX_EMISSION_RATE, MAX_STAKING_PERCENT};
use weir_core::error::{AssetError, FarmError, WeirError};
use weir_core::state::FarmState;
use weir_core::traits::FarmStore;
use weir_core::types::{AccountId, Claim, Lock, LockState, Params, Pool, PoolId, UnitId, UserStake};

use crate::accrual;
use crate::context::{Context, Tx};
use crate::guard::CallGuard;
use crate::lock::{self, LeaveReceipt};
use crate::registry;
use crate::stake;

/// Check a configuration value against its allowed range.
fn check_range(name: &'static str, value: u128, min: u128, max: u128) -> Result<(), FarmError> {
    if value < min || value > max {
        return Err(FarmError::ParameterOutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Validate genesis or reconfigured parameters.
pub fn validate_params(params: &Params) -> Result<(), FarmError> {
    check_range("emission_rate", params.emission_rate, 0, MAX_EMISSION_RATE)?;
    check_range(
        "staking_weight_percent",
        params.staking_weight_percent as u128,
        0,
        MAX_STAKING_PERCENT as u128,
    )?;
    check_range("steepness", params.steepness, K_MIN, K_MAX)
}

/// A weighted multi-pool reward farm with a vote-escrow lock pool.
pub struct Farm {
    committed: RwLock<Arc<FarmState>>,
    guard: CallGuard,
    ctx: Context,
    store: Arc<dyn FarmStore>,
}

impl Farm {
    /// Resume from `store`, or start a fresh farm from `genesis` if the
    /// store is empty.
    ///
    /// `genesis` is ignored when persisted state exists.
    pub fn open(ctx: Context, store: Arc<dyn FarmStore>, genesis: Params) -> Result<Self, WeirError> {
        let state = match store.load()? {
            Some(state) => {
                info!(
                    pools = state.pool_count(),
                    total_locked = state.total_locked(),
                    "farm resumed from store"
                );
                state
            }
            None => {
                validate_params(&genesis)?;
                let mut state = FarmState::genesis(genesis, ctx.asset.unit(), ctx.clock.now());
                let journal = state.take_journal();
                store.commit(&state, &journal)?;
                info!(
                    emission_rate = genesis.emission_rate,
                    staking_weight_percent = genesis.staking_weight_percent,
                    start = genesis.reward_start_time,
                    "farm created"
                );
                state
            }
        };
        Ok(Self {
            committed: RwLock::new(Arc::new(state)),
            guard: CallGuard::new(),
            ctx,
            store,
        })
    }

    /// The collaborators this farm was opened with.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The last committed state.
    pub fn snapshot(&self) -> Arc<FarmState> {
        Arc::clone(&self.committed.read())
    }

    /// Run `f` as one all-or-nothing transaction at the clock's current time.
    fn transact<T>(
        &self,
        f: impl FnOnce(&mut Tx<'_>) -> Result<T, FarmError>,
    ) -> Result<T, WeirError> {
        let _entered = self.guard.enter()?;
        let now = self.ctx.clock.now();
        let mut working = FarmState::clone(&self.snapshot());

        let mut tx = Tx::new(&mut working, &self.ctx, now);
        let result = f(&mut tx);
        let effects = tx.into_effects();
        let out = match result {
            Ok(out) => out,
            Err(err) => {
                self.ctx.revert(effects);
                return Err(err.into());
            }
        };

        let journal = working.take_journal();
        if !journal.is_empty() {
            if let Err(err) = self.store.commit(&working, &journal) {
                self.ctx.revert(effects);
                return Err(err);
            }
            *self.committed.write() = Arc::new(working);
        }
        Ok(out)
    }

    // --- Pool registry ---

    /// Register a pool for `unit`. Returns its index.
    pub fn add_pool(&self, weight: u64, unit: UnitId, rebalance_first: bool) -> Result<PoolId, WeirError> {
        self.transact(|tx| registry::add_pool(tx, weight, unit, rebalance_first))
    }

    /// Change the weight of pool `id` (never the lock pool).
    pub fn set_pool_weight(&self, id: PoolId, weight: u64, rebalance_first: bool) -> Result<(), WeirError> {
        self.transact(|tx| registry::set_pool_weight(tx, id, weight, rebalance_first))
    }

    // --- Stake ledger ---

    pub fn deposit(&self, pool: PoolId, user: &AccountId, amount: u128) -> Result<Claim, WeirError> {
        self.transact(|tx| stake::deposit(tx, pool, user, amount))
    }

    pub fn withdraw(&self, pool: PoolId, user: &AccountId, amount: u128) -> Result<Claim, WeirError> {
        self.transact(|tx| stake::withdraw(tx, pool, user, amount))
    }

    /// Take the principal out of `pool` and forfeit any pending reward.
    pub fn emergency_withdraw(&self, pool: PoolId, user: &AccountId) -> Result<u128, WeirError> {
        self.transact(|tx| stake::emergency_withdraw(tx, pool, user))
    }

    // --- Lock engine ---

    pub fn enter_staking(&self, user: &AccountId, amount: u128, duration: u64) -> Result<Claim, WeirError> {
        self.transact(|tx| lock::enter_staking(tx, user, amount, duration))
    }

    pub fn leave_staking(&self, user: &AccountId) -> Result<LeaveReceipt, WeirError> {
        self.transact(|tx| lock::leave_staking(tx, user))
    }

    pub fn extend_lock_time(&self, user: &AccountId, extra: u64) -> Result<Claim, WeirError> {
        self.transact(|tx| lock::extend_lock_time(tx, user, extra))
    }

    // --- Configuration ---
    //
    // Each setter settles every pool at the old parameters first.

    pub fn set_emission_rate(&self, rate: u128) -> Result<(), WeirError> {
        self.transact(|tx| {
            check_range("emission_rate", rate, 0, MAX_EMISSION_RATE)?;
            accrual::mass_settle(tx)?;
            let old = std::mem::replace(&mut tx.state.params_mut().emission_rate, rate);
            info!(old, new = rate, "emission rate set");
            Ok(())
        })
    }

    pub fn set_staking_weight_percent(&self, percent: u64) -> Result<(), WeirError> {
        self.transact(|tx| {
            check_range(
                "staking_weight_percent",
                percent as u128,
                0,
                MAX_STAKING_PERCENT as u128,
            )?;
            accrual::mass_settle(tx)?;
            tx.state.params_mut().staking_weight_percent = percent;
            registry::rebalance_staking_pool(tx.state)?;
            info!(percent, lock_pool_weight = tx.state.pool(0)?.weight, "staking weight set");
            Ok(())
        })
    }

    pub fn set_steepness(&self, k: u128) -> Result<(), WeirError> {
        self.transact(|tx| {
            check_range("steepness", k, K_MIN, K_MAX)?;
            accrual::mass_settle(tx)?;
            let old = std::mem::replace(&mut tx.state.params_mut().steepness, k);
            info!(old, new = k, "decay steepness set");
            Ok(())
        })
    }

    /// Lower the reward asset's hard cap.
    ///
    /// The settlement that precedes the change is counted against the new
    /// cap, so a rejected cap mints nothing.
    pub fn decrease_reward_cap(&self, new_cap: u128) -> Result<(), WeirError> {
        self.transact(|tx| {
            let ctx = tx.ctx;
            let current = ctx.asset.max_supply();
            if new_cap > current {
                return Err(AssetError::CapIncrease {
                    current,
                    requested: new_cap,
                }
                .into());
            }
            let plan = accrual::plan_all(tx)?;
            let supply = ctx.asset.total_supply() + plan.minted;
            if new_cap < supply {
                return Err(AssetError::CapBelowSupply { cap: new_cap, supply }.into());
            }
            accrual::apply(tx, plan)?;
            tx.lower_cap(new_cap)?;
            info!(old = current, new = new_cap, "reward cap decreased");
            Ok(())
        })
    }

    // --- Queries ---

    fn now(&self) -> u64 {
        self.ctx.clock.now()
    }

    /// Raw reward `user` could claim from `pool` now.
    pub fn pending_reward(&self, pool: PoolId, user: &AccountId) -> Result<u128, FarmError> {
        stake::pending_reward(&self.snapshot(), &self.ctx, pool, user, self.now())
    }

    /// Lock-pool reward `user` would be paid now, after vote-power scaling.
    pub fn decayed_pending_reward(&self, user: &AccountId) -> Result<u128, FarmError> {
        lock::decayed_pending_reward(&self.snapshot(), &self.ctx, user, self.now())
    }

    pub fn ve_balance(&self, user: &AccountId, as_of: u64) -> Result<u128, FarmError> {
        lock::ve_balance(&self.snapshot(), &self.ctx, user, as_of)
    }

    pub fn ve_power(&self, user: &AccountId, as_of: u64) -> Result<u128, FarmError> {
        lock::ve_power(&self.snapshot(), &self.ctx, user, as_of)
    }

    pub fn lock_state(&self, user: &AccountId, as_of: u64) -> LockState {
        self.snapshot().lock(user).state(as_of)
    }

    pub fn pool_count(&self) -> usize {
        self.snapshot().pool_count()
    }

    pub fn pool_info(&self, id: PoolId) -> Result<Pool, FarmError> {
        self.snapshot().pool(id).copied()
    }

    pub fn user_info(&self, pool: PoolId, user: &AccountId) -> UserStake {
        self.snapshot().stake(pool, user)
    }

    pub fn lock_info(&self, user: &AccountId) -> Lock {
        self.snapshot().lock(user)
    }

    pub fn params(&self) -> Params {
        *self.snapshot().params()
    }

    pub fn total_locked(&self) -> u128 {
        self.snapshot().total_locked()
    }

    pub fn locked_users(&self) -> u64 {
        self.snapshot().locked_users()
    }
}

impl std::fmt::Debug for Farm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.snapshot();
        f.debug_struct("Farm")
            .field("account", &self.ctx.account)
            .field("pools", &state.pool_count())
            .field("total_locked", &state.total_locked())
            .finish_non_exhaustive()
    }
}

impl Drop for Farm {
    fn drop(&mut self) {
        debug!(account = %self.ctx.account, "farm closed");
    }
}
