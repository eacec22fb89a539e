//! Stake ledger for the non-lock pools.
//!
//! Every mutation plans the pool's settlement against its current backing,
//! moves the stake units, then mints and pays what the position accrued and
//! re-baselines the reward debt against the settled accumulator. Units move
//! first so a rejected unit transfer fails before any reward leaves the
//! engine.

use tracing::{debug, warn};
use weir_core::constants::{ACC_SCALE, LOCK_POOL};
use weir_core::error::{FarmError, MathError};
use weir_core::math::mul_div;
use weir_core::state::FarmState;
use weir_core::types::{AccountId, Claim, PoolId, UserStake};

use crate::accrual;
use crate::context::{Context, Tx};

/// Reward debt for `amount` units at accumulator `acc`.
pub fn debt_for(amount: u128, acc: u128) -> Result<u128, FarmError> {
    Ok(mul_div(amount, acc, ACC_SCALE)?)
}

/// Accrued, unclaimed reward of `stake` at accumulator `acc`.
pub fn accrued(stake: &UserStake, acc: u128) -> Result<u128, FarmError> {
    stake.accrued(acc).ok_or(FarmError::Math(MathError::Overflow))
}

/// Re-baseline the debt of `(pool, user)` against the pool's accumulator.
pub fn refresh_debt(state: &mut FarmState, pool: PoolId, user: &AccountId) -> Result<(), FarmError> {
    let acc = state.pool(pool)?.acc_reward_per_share;
    let stake = state.stake_mut(pool, user);
    stake.reward_debt = debt_for(stake.amount, acc)?;
    Ok(())
}

/// Reward `user` could claim from `pool` if the pool settled at `now`.
///
/// For the lock pool this is the raw amount, before vote-power scaling.
pub fn pending_reward(
    state: &FarmState,
    ctx: &Context,
    pool: PoolId,
    user: &AccountId,
    now: u64,
) -> Result<u128, FarmError> {
    let acc = accrual::projected_acc(state, ctx, pool, now)?;
    accrued(&state.stake(pool, user), acc)
}

fn require_farm_pool(state: &FarmState, pool: PoolId) -> Result<(), FarmError> {
    if pool == LOCK_POOL {
        return Err(FarmError::InvalidPool(pool));
    }
    state.pool(pool).map(|_| ())
}

/// Deposit `amount` stake units into `pool`, paying out pending reward.
///
/// A zero amount only harvests.
pub fn deposit(
    tx: &mut Tx<'_>,
    pool: PoolId,
    user: &AccountId,
    amount: u128,
) -> Result<Claim, FarmError> {
    require_farm_pool(tx.state, pool)?;
    let unit = tx.state.pool(pool)?.stake_unit;
    let have = tx.ctx.units.balance_of(&unit, user);
    if have < amount {
        return Err(FarmError::InsufficientBalance { have, need: amount });
    }

    // units move before any reward is minted or paid
    let plan = accrual::plan(&*tx.state, tx.ctx, &[pool], tx.now)?;
    let engine = tx.ctx.account;
    tx.move_units(&unit, user, &engine, amount)?;
    accrual::apply(tx, plan)?;

    let acc = tx.state.pool(pool)?.acc_reward_per_share;
    let pending = accrued(&tx.state.stake(pool, user), acc)?;
    let paid = tx.pay_reward(user, pending)?;

    let stake = tx.state.stake_mut(pool, user);
    stake.amount = stake
        .amount
        .checked_add(amount)
        .ok_or(MathError::Overflow)?;
    refresh_debt(tx.state, pool, user)?;

    debug!(pool, %user, amount, paid, "deposit");
    Ok(Claim { paid, burned: 0 })
}

/// Withdraw `amount` stake units from `pool`, paying out pending reward.
///
/// # Errors
///
/// [`FarmError::InsufficientBalance`] if `amount` exceeds the recorded stake.
pub fn withdraw(
    tx: &mut Tx<'_>,
    pool: PoolId,
    user: &AccountId,
    amount: u128,
) -> Result<Claim, FarmError> {
    require_farm_pool(tx.state, pool)?;
    let have = tx.state.stake(pool, user).amount;
    if have < amount {
        return Err(FarmError::InsufficientBalance { have, need: amount });
    }
    let unit = tx.state.pool(pool)?.stake_unit;

    let plan = accrual::plan(&*tx.state, tx.ctx, &[pool], tx.now)?;
    let engine = tx.ctx.account;
    tx.move_units(&unit, &engine, user, amount)?;
    accrual::apply(tx, plan)?;

    let acc = tx.state.pool(pool)?.acc_reward_per_share;
    let pending = accrued(&tx.state.stake(pool, user), acc)?;
    let paid = tx.pay_reward(user, pending)?;

    tx.state.stake_mut(pool, user).amount = have - amount;
    refresh_debt(tx.state, pool, user)?;

    debug!(pool, %user, amount, paid, "withdraw");
    Ok(Claim { paid, burned: 0 })
}

/// Return the whole principal of `(pool, user)` without settling; pending
/// reward is forfeited.
///
/// Returns the principal released.
pub fn emergency_withdraw(tx: &mut Tx<'_>, pool: PoolId, user: &AccountId) -> Result<u128, FarmError> {
    require_farm_pool(tx.state, pool)?;
    let unit = tx.state.pool(pool)?.stake_unit;
    let amount = tx.state.stake(pool, user).amount;

    *tx.state.stake_mut(pool, user) = UserStake::default();
    let engine = tx.ctx.account;
    tx.move_units(&unit, &engine, user, amount)?;

    warn!(pool, %user, amount, "emergency withdraw; pending reward forfeited");
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debt_scales_with_accumulator() {
        assert_eq!(debt_for(10, 3 * ACC_SCALE).unwrap(), 30);
        assert_eq!(debt_for(3, ACC_SCALE / 2).unwrap(), 1);
    }

    #[test]
    fn accrued_excludes_debt() {
        let s = UserStake { amount: 4, reward_debt: 2 };
        assert_eq!(accrued(&s, ACC_SCALE).unwrap(), 2);
    }
}
