//! Lazy per-pool reward accrual.
//!
//! A pool's accumulator is advanced only when something touches the pool.
//! Settlement is split into a pure [`plan`] step and an [`apply`] step so a
//! batch of pools mints with a single call: a rejected mint leaves every pool
//! untouched.

use tracing::debug;
use weir_core::constants::ACC_SCALE;
use weir_core::error::FarmError;
use weir_core::math::{self, mul_div};
use weir_core::state::FarmState;
use weir_core::types::{Params, Pool, PoolId};

use crate::context::{Context, Tx};

/// The outcome of advancing one pool to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    pub pool: PoolId,
    /// Reward units to mint for this pool.
    pub minted: u128,
    pub acc_reward_per_share: u128,
    pub last_reward_time: u64,
}

/// Planned settlement of several pools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlePlan {
    pub accruals: Vec<Accrual>,
    /// Sum of `accruals[..].minted`.
    pub minted: u128,
}

/// Reward owed to a pool for `elapsed` seconds, before the supply cap.
///
/// `elapsed * emission_rate * weight / total_weight`, floored.
pub fn owed(params: &Params, weight: u64, elapsed: u64) -> Result<u128, FarmError> {
    if params.total_weight == 0 || weight == 0 {
        return Ok(0);
    }
    let emitted = (elapsed as u128)
        .checked_mul(params.emission_rate)
        .ok_or(weir_core::error::MathError::Overflow)?;
    Ok(mul_div(
        emitted,
        weight as u128,
        params.total_weight as u128,
    )?)
}

/// Advance one pool to `now` without touching any state.
///
/// `mintable` is what the reward asset can still mint; the returned
/// `minted` never exceeds it. With zero backing the accumulator stays put
/// but the timestamp still moves, so nothing accrues retroactively.
pub fn preview(
    id: PoolId,
    pool: &Pool,
    params: &Params,
    backing: u128,
    now: u64,
    mintable: u128,
) -> Result<Accrual, FarmError> {
    let mut accrual = Accrual {
        pool: id,
        minted: 0,
        acc_reward_per_share: pool.acc_reward_per_share,
        last_reward_time: pool.last_reward_time,
    };
    if now <= pool.last_reward_time {
        return Ok(accrual);
    }
    accrual.last_reward_time = now;
    if backing == 0 {
        return Ok(accrual);
    }

    let elapsed = now - pool.last_reward_time;
    let minted = owed(params, pool.weight, elapsed)?.min(mintable);
    if minted > 0 {
        let per_share = mul_div(minted, ACC_SCALE, backing)?;
        accrual.acc_reward_per_share = math::add(pool.acc_reward_per_share, per_share)?;
        accrual.minted = minted;
    }
    Ok(accrual)
}

/// Plan settlement of `ids` in order, each against the supply left after
/// the pools before it.
pub fn plan(
    state: &FarmState,
    ctx: &Context,
    ids: &[PoolId],
    now: u64,
) -> Result<SettlePlan, FarmError> {
    let mut mintable = ctx.asset.mintable();
    let mut out = SettlePlan::default();
    for &id in ids {
        let pool = state.pool(id)?;
        let backing = ctx.backing(state, id)?;
        let accrual = preview(id, pool, state.params(), backing, now, mintable)?;
        mintable -= accrual.minted;
        out.minted = math::add(out.minted, accrual.minted)?;
        out.accruals.push(accrual);
    }
    Ok(out)
}

/// Mint the planned total to the engine, then write the pools.
///
/// # Errors
///
/// [`FarmError::SupplyCapExceeded`] if the asset rejects the mint; no pool is
/// written in that case.
pub fn apply(tx: &mut Tx<'_>, plan: SettlePlan) -> Result<(), FarmError> {
    tx.mint(plan.minted)?;
    for accrual in plan.accruals {
        if tx.state.pool(accrual.pool)?.last_reward_time == accrual.last_reward_time {
            continue;
        }
        let pool = tx.state.pool_mut(accrual.pool)?;
        pool.acc_reward_per_share = accrual.acc_reward_per_share;
        pool.last_reward_time = accrual.last_reward_time;
        if accrual.minted > 0 {
            debug!(
                pool = accrual.pool,
                minted = accrual.minted,
                acc = accrual.acc_reward_per_share,
                "pool settled"
            );
        }
    }
    Ok(())
}

/// Settle one pool to the transaction's instant.
pub fn settle(tx: &mut Tx<'_>, id: PoolId) -> Result<(), FarmError> {
    let plan = plan(&*tx.state, tx.ctx, &[id], tx.now)?;
    apply(tx, plan)
}

/// Settle every pool in index order.
pub fn mass_settle(tx: &mut Tx<'_>) -> Result<(), FarmError> {
    let plan = plan_all(tx)?;
    apply(tx, plan)
}

/// Plan settlement of every pool.
pub fn plan_all(tx: &Tx<'_>) -> Result<SettlePlan, FarmError> {
    let ids: Vec<PoolId> = (0..tx.state.pool_count() as PoolId).collect();
    plan(&*tx.state, tx.ctx, &ids, tx.now)
}

/// Accumulator of `id` as a settlement at `now` would leave it.
pub fn projected_acc(
    state: &FarmState,
    ctx: &Context,
    id: PoolId,
    now: u64,
) -> Result<u128, FarmError> {
    let pool = state.pool(id)?;
    let backing = ctx.backing(state, id)?;
    let accrual = preview(id, pool, state.params(), backing, now, ctx.asset.mintable())?;
    Ok(accrual.acc_reward_per_share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::types::UnitId;

    fn params(rate: u128, total: u64) -> Params {
        Params {
            total_weight: total,
            ..Params::genesis(rate, 0)
        }
    }

    fn pool(weight: u64, last: u64) -> Pool {
        Pool::new(UnitId::from_symbol("LP"), weight, last)
    }

    #[test]
    fn owed_is_pro_rata() {
        assert_eq!(owed(&params(5, 1000), 1000, 100).unwrap(), 500);
        assert_eq!(owed(&params(5, 1000), 250, 100).unwrap(), 125);
    }

    #[test]
    fn owed_floors() {
        // 1 * 1 * 1 / 3
        assert_eq!(owed(&params(1, 3), 1, 1).unwrap(), 0);
        assert_eq!(owed(&params(10, 3), 1, 1).unwrap(), 3);
    }

    #[test]
    fn owed_zero_total_weight() {
        assert_eq!(owed(&params(5, 0), 0, 100).unwrap(), 0);
    }

    #[test]
    fn preview_advances_accumulator() {
        let a = preview(1, &pool(1000, 0), &params(5, 1000), 1000, 100, u128::MAX).unwrap();
        assert_eq!(a.minted, 500);
        assert_eq!(a.acc_reward_per_share, ACC_SCALE / 2);
        assert_eq!(a.last_reward_time, 100);
    }

    #[test]
    fn preview_caps_at_mintable() {
        let a = preview(1, &pool(1000, 0), &params(5, 1000), 1000, 100, 200).unwrap();
        assert_eq!(a.minted, 200);
        assert_eq!(a.acc_reward_per_share, ACC_SCALE / 5);
    }

    #[test]
    fn preview_zero_backing_moves_time_only() {
        let a = preview(1, &pool(1000, 0), &params(5, 1000), 0, 100, u128::MAX).unwrap();
        assert_eq!(a.minted, 0);
        assert_eq!(a.acc_reward_per_share, 0);
        assert_eq!(a.last_reward_time, 100);
    }

    #[test]
    fn preview_same_instant_is_noop() {
        let p = pool(1000, 100);
        let a = preview(1, &p, &params(5, 1000), 1000, 100, u128::MAX).unwrap();
        assert_eq!(a.minted, 0);
        assert_eq!(a.last_reward_time, 100);
    }

    #[test]
    fn preview_before_start_is_noop() {
        let p = pool(1000, 500);
        let a = preview(1, &p, &params(5, 1000), 1000, 100, u128::MAX).unwrap();
        assert_eq!(a.last_reward_time, 500);
        assert_eq!(a.minted, 0);
    }
}
