//! Vote-escrow lock engine for the lock pool.
//!
//! A lock is `Unlocked`, `Active` or `Expired` (see [`LockState`]). While a
//! lock is active its accrued reward is paid scaled by the holder's vote
//! power and the unscaled remainder is burned; once it has expired the whole
//! accrued reward is burned and only the principal can be taken out.

use tracing::{debug, info, warn};
use weir_core::constants::{LOCK_POOL, MAX_LOCK_TIME, MIN_LOCK_TIME, WAD};
use weir_core::error::{FarmError, MathError};
use weir_core::math::mul_div;
use weir_core::state::FarmState;
use weir_core::types::{AccountId, Claim, Lock, LockState, UserStake};

use crate::accrual;
use crate::context::{Context, Tx};
use crate::stake::{accrued, refresh_debt};

/// Outcome of [`leave_staking`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaveReceipt {
    pub claim: Claim,
    /// Principal returned to the holder (zero while the lock is active).
    pub released: u128,
}

/// Check a lock duration (or extension) against `[MIN_LOCK_TIME, MAX_LOCK_TIME]`.
pub fn validate_duration(duration: u64) -> Result<(), FarmError> {
    if !(MIN_LOCK_TIME..=MAX_LOCK_TIME).contains(&duration) {
        return Err(FarmError::InvalidLockDuration {
            duration,
            min: MIN_LOCK_TIME,
            max: MAX_LOCK_TIME,
        });
    }
    Ok(())
}

/// Decayed balance of `lock` at `as_of`.
pub fn lock_ve_balance(
    state: &FarmState,
    ctx: &Context,
    lock: &Lock,
    as_of: u64,
) -> Result<u128, FarmError> {
    Ok(ctx.curve.ve_balance(
        lock.locked_amount,
        lock.remaining(as_of),
        MAX_LOCK_TIME,
        state.params().steepness,
    )?)
}

/// Decayed balance of `user`'s lock at `as_of`.
pub fn ve_balance(
    state: &FarmState,
    ctx: &Context,
    user: &AccountId,
    as_of: u64,
) -> Result<u128, FarmError> {
    lock_ve_balance(state, ctx, &state.lock(user), as_of)
}

/// Vote power of `lock` at `as_of`, WAD-scaled. Zero for an empty lock.
pub fn lock_ve_power(
    state: &FarmState,
    ctx: &Context,
    lock: &Lock,
    as_of: u64,
) -> Result<u128, FarmError> {
    if lock.locked_amount == 0 {
        return Ok(0);
    }
    Ok(ctx.curve.ve_power(
        lock.remaining(as_of),
        MAX_LOCK_TIME,
        state.params().steepness,
    )?)
}

/// Vote power of `user` at `as_of`, WAD-scaled. Zero without a lock.
pub fn ve_power(
    state: &FarmState,
    ctx: &Context,
    user: &AccountId,
    as_of: u64,
) -> Result<u128, FarmError> {
    lock_ve_power(state, ctx, &state.lock(user), as_of)
}

/// Split `pending` into the part paid at the lock's vote power and the
/// part to burn.
///
/// The paid part is `pending * ve_power / WAD`, the same power
/// [`ve_power`] reports.
fn split_by_power(
    state: &FarmState,
    ctx: &Context,
    lock: &Lock,
    pending: u128,
    now: u64,
) -> Result<(u128, u128), FarmError> {
    match lock.state(now) {
        LockState::Unlocked => Ok((0, pending)),
        LockState::Expired => Ok((0, pending)),
        LockState::Active => {
            let power = lock_ve_power(state, ctx, lock, now)?;
            let scaled = mul_div(pending, power, WAD)?.min(pending);
            Ok((scaled, pending - scaled))
        }
    }
}

/// Reward `user` would receive from the lock pool at `now`, after decay.
pub fn decayed_pending_reward(
    state: &FarmState,
    ctx: &Context,
    user: &AccountId,
    now: u64,
) -> Result<u128, FarmError> {
    let pending = crate::stake::pending_reward(state, ctx, LOCK_POOL, user, now)?;
    let (scaled, _) = split_by_power(state, ctx, &state.lock(user), pending, now)?;
    Ok(scaled)
}

/// Settle `user`'s accrued lock-pool reward against the already settled
/// accumulator: pay the vote-power share, burn the rest.
///
/// Does not re-baseline the reward debt.
fn claim_locked(tx: &mut Tx<'_>, user: &AccountId) -> Result<Claim, FarmError> {
    let acc = tx.state.pool(LOCK_POOL)?.acc_reward_per_share;
    let pending = accrued(&tx.state.stake(LOCK_POOL, user), acc)?;
    if pending == 0 {
        return Ok(Claim::default());
    }

    let lock = tx.state.lock(user);
    let (scaled, remainder) = split_by_power(tx.state, tx.ctx, &lock, pending, tx.now)?;
    let paid = tx.pay_reward(user, scaled)?;
    let burned = tx.burn_reward(remainder)?;

    if lock.state(tx.now) == LockState::Expired {
        warn!(%user, burned, "lock expired; accrued reward burned");
    } else {
        debug!(%user, paid, burned, "lock reward claimed");
    }
    Ok(Claim { paid, burned })
}

/// Lock `amount` of the reward asset for `duration` seconds.
///
/// An existing lock is topped up and its unlock time moved to
/// `max(unlock_time, now + duration)`; it never shortens. A zero amount
/// harvests an existing lock.
pub fn enter_staking(
    tx: &mut Tx<'_>,
    user: &AccountId,
    amount: u128,
    duration: u64,
) -> Result<Claim, FarmError> {
    validate_duration(duration)?;
    let before = tx.state.lock(user);
    if amount == 0 && before.locked_amount == 0 {
        return Err(FarmError::ZeroAmount);
    }
    let have = tx.ctx.asset.balance_of(user);
    if have < amount {
        return Err(FarmError::InsufficientBalance { have, need: amount });
    }
    let new_total = tx
        .state
        .total_locked()
        .checked_add(amount)
        .ok_or(MathError::Overflow)?;

    accrual::settle(tx, LOCK_POOL)?;
    let claim = claim_locked(tx, user)?;

    let engine = tx.ctx.account;
    tx.move_asset(user, &engine, amount)?;

    let first = before.locked_amount == 0;
    let unlock_time = before.unlock_time.max(tx.now + duration);
    let lock = tx.state.lock_mut(user);
    lock.locked_amount += amount;
    lock.unlock_time = unlock_time;
    let locked_amount = lock.locked_amount;
    tx.state.stake_mut(LOCK_POOL, user).amount = locked_amount;
    let users = tx.state.locked_users() + u64::from(first);
    tx.state.set_totals(new_total, users);
    refresh_debt(tx.state, LOCK_POOL, user)?;

    info!(%user, amount, locked = locked_amount, unlock_time, "lock entered");
    Ok(claim)
}

/// Claim from the lock, and take the principal out once it has expired.
///
/// # Errors
///
/// [`FarmError::NoLock`] if `user` holds no lock.
pub fn leave_staking(tx: &mut Tx<'_>, user: &AccountId) -> Result<LeaveReceipt, FarmError> {
    let lock = tx.state.lock(user);
    if lock.locked_amount == 0 {
        return Err(FarmError::NoLock(*user));
    }

    accrual::settle(tx, LOCK_POOL)?;
    let claim = claim_locked(tx, user)?;

    if lock.state(tx.now) == LockState::Active {
        refresh_debt(tx.state, LOCK_POOL, user)?;
        return Ok(LeaveReceipt { claim, released: 0 });
    }

    let principal = lock.locked_amount;
    *tx.state.lock_mut(user) = Lock::default();
    *tx.state.stake_mut(LOCK_POOL, user) = UserStake::default();
    let total = tx.state.total_locked() - principal;
    let users = tx.state.locked_users() - 1;
    tx.state.set_totals(total, users);
    let engine = tx.ctx.account;
    tx.move_asset(&engine, user, principal)?;

    info!(%user, principal, "lock released");
    Ok(LeaveReceipt {
        claim,
        released: principal,
    })
}

/// Push the unlock time of `user`'s lock to `now + extra`.
///
/// # Errors
///
/// [`FarmError::LockNotExtended`] unless `now + extra` is strictly later than
/// the current unlock time.
pub fn extend_lock_time(tx: &mut Tx<'_>, user: &AccountId, extra: u64) -> Result<Claim, FarmError> {
    let lock = tx.state.lock(user);
    if lock.locked_amount == 0 {
        return Err(FarmError::NoLock(*user));
    }
    validate_duration(extra)?;
    let proposed = tx.now + extra;
    if proposed <= lock.unlock_time {
        return Err(FarmError::LockNotExtended {
            current: lock.unlock_time,
            proposed,
        });
    }

    accrual::settle(tx, LOCK_POOL)?;
    let claim = claim_locked(tx, user)?;
    tx.state.lock_mut(user).unlock_time = proposed;
    refresh_debt(tx.state, LOCK_POOL, user)?;

    info!(%user, from = lock.unlock_time, to = proposed, "lock extended");
    Ok(claim)
}
