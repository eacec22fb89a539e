//! Pool registry: the append-only pool list and its weights.
//!
//! Keeps `params.total_weight` equal to the sum of pool weights and derives
//! the lock pool's weight from the others.

use tracing::info;
use weir_core::constants::{LOCK_POOL, PERCENT_PRECISION};
use weir_core::error::{FarmError, MathError};
use weir_core::state::FarmState;
use weir_core::types::{Pool, PoolId, UnitId};

use crate::accrual;
use crate::context::Tx;

/// Register a pool for `unit` with `weight`.
///
/// # Errors
///
/// [`FarmError::DuplicatePool`] if `unit` already backs a pool (the reward
/// asset always backs the lock pool).
pub fn add_pool(
    tx: &mut Tx<'_>,
    weight: u64,
    unit: UnitId,
    rebalance_first: bool,
) -> Result<PoolId, FarmError> {
    if tx.state.has_unit(&unit) || unit == tx.ctx.asset.unit() {
        return Err(FarmError::DuplicatePool(unit));
    }
    if rebalance_first {
        accrual::mass_settle(tx)?;
    }

    let start = tx.now.max(tx.state.params().reward_start_time);
    let total = tx
        .state
        .params()
        .total_weight
        .checked_add(weight)
        .ok_or(MathError::Overflow)?;
    tx.state.params_mut().total_weight = total;
    let id = tx.state.push_pool(Pool::new(unit, weight, start));
    rebalance_staking_pool(tx.state)?;

    info!(pool = id, %unit, weight, start, "pool added");
    Ok(id)
}

/// Change the weight of a non-lock pool.
///
/// # Errors
///
/// [`FarmError::InvalidPool`] for the lock pool or an unknown index.
pub fn set_pool_weight(
    tx: &mut Tx<'_>,
    id: PoolId,
    weight: u64,
    rebalance_first: bool,
) -> Result<(), FarmError> {
    if id == LOCK_POOL {
        return Err(FarmError::InvalidPool(id));
    }
    let old = tx.state.pool(id)?.weight;
    if rebalance_first {
        accrual::mass_settle(tx)?;
    }

    let total = (tx.state.params().total_weight - old)
        .checked_add(weight)
        .ok_or(MathError::Overflow)?;
    tx.state.params_mut().total_weight = total;
    tx.state.pool_mut(id)?.weight = weight;
    rebalance_staking_pool(tx.state)?;

    info!(pool = id, old, new = weight, "pool weight set");
    Ok(())
}

/// Recompute the lock pool's weight as `staking_weight_percent` of the
/// combined weight.
///
/// `pool0 = others * pct / (100 - pct)`. Left unchanged while no other pool
/// carries weight.
pub fn rebalance_staking_pool(state: &mut FarmState) -> Result<(), FarmError> {
    let others = state.other_weights();
    if others == 0 {
        return Ok(());
    }
    let pct = state.params().staking_weight_percent;
    let target = (others as u128 * pct as u128 / (PERCENT_PRECISION - pct) as u128) as u64;

    let old = state.pool(LOCK_POOL)?.weight;
    if old == target {
        return Ok(());
    }
    state.pool_mut(LOCK_POOL)?.weight = target;
    let total = others.checked_add(target).ok_or(MathError::Overflow)?;
    state.params_mut().total_weight = total;
    Ok(())
}
