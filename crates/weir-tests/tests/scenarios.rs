//! End-to-end scenarios across weir-core, weir-decay and weir-farm.
//!
//! Each test drives a farm through its public operations only and checks
//! balances on the in-memory ledgers afterwards.

use std::sync::Arc;
use std::thread;

use weir_core::constants::{COIN, LOCK_POOL, MAX_LOCK_TIME, MIN_LOCK_TIME, WAD};
use weir_core::error::{AssetError, FarmError};
use weir_core::traits::{DecayCurve, RewardAsset, UnitLedger};
use weir_core::types::LockState;
use weir_decay::ExpDecayCurve;
use weir_tests::helpers::*;

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

#[test]
fn single_pool_pays_full_emission() {
    let t = TestFarm::new(params(5, 0));
    let alice = user(1);
    let pool = t.pool_with_deposit(unit(1), 1000, &alice, 100);

    t.advance(100);
    assert_eq!(t.farm.pending_reward(pool, &alice).unwrap(), 500);

    let claim = t.farm.withdraw(pool, &alice, 100).unwrap();
    assert_eq!(claim.paid, 500);
    assert_eq!(t.balance(&alice), 500);
    assert_eq!(t.units.balance_of(&unit(1), &alice), 100);
    check_invariants(&t.farm.snapshot(), &t.asset).unwrap();
}

#[test]
fn lock_pool_share_follows_percent() {
    let t = TestFarm::new(params(COIN, 30));
    t.farm.add_pool(300, unit(1), false).unwrap();
    t.farm.add_pool(400, unit(2), false).unwrap();

    assert_eq!(t.farm.pool_info(LOCK_POOL).unwrap().weight, 300);
    assert_eq!(t.farm.params().total_weight, 1000);

    t.farm.set_pool_weight(2, 1100, true).unwrap();
    assert_eq!(t.farm.pool_info(LOCK_POOL).unwrap().weight, 600);
    assert_eq!(t.farm.params().total_weight, 2000);

    t.farm.set_staking_weight_percent(0).unwrap();
    assert_eq!(t.farm.pool_info(LOCK_POOL).unwrap().weight, 0);
    assert_eq!(t.farm.params().total_weight, 1400);
}

#[test]
fn over_withdraw_changes_nothing() {
    let t = TestFarm::new(params(5, 0));
    let alice = user(1);
    let pool = t.pool_with_deposit(unit(1), 1000, &alice, 100);
    t.advance(50);

    let before = t.farm.snapshot();
    let supply = t.asset.total_supply();
    let err = t.farm.withdraw(pool, &alice, 101).unwrap_err();
    assert_eq!(
        farm_err(err),
        FarmError::InsufficientBalance {
            have: 100,
            need: 101
        }
    );
    assert_eq!(*t.farm.snapshot(), *before);
    assert_eq!(t.asset.total_supply(), supply);
    assert_eq!(t.balance(&alice), 0);
}

#[test]
fn two_stakers_split_by_time_and_share() {
    let t = TestFarm::new(params(12, 0));
    let (alice, bob) = (user(1), user(2));
    let pool = t.pool_with_deposit(unit(1), 10, &alice, 100);

    t.advance(10);
    t.issue(&unit(1), &bob, 200);
    t.farm.deposit(pool, &bob, 200).unwrap();
    t.advance(10);

    // alice: 120 alone, then 1/3 of 120
    assert_eq!(t.farm.pending_reward(pool, &alice).unwrap(), 160);
    assert_eq!(t.farm.pending_reward(pool, &bob).unwrap(), 80);
}

#[test]
fn emergency_exit_keeps_rewards_in_engine() {
    let t = TestFarm::new(params(5, 0));
    let alice = user(1);
    let pool = t.pool_with_deposit(unit(1), 1, &alice, 40);
    t.advance(20);

    let released = t.farm.emergency_withdraw(pool, &alice).unwrap();
    assert_eq!(released, 40);
    assert_eq!(t.balance(&alice), 0);
    assert_eq!(t.farm.user_info(pool, &alice).amount, 0);
    assert_eq!(t.farm.pending_reward(pool, &alice).unwrap(), 0);
    check_invariants(&t.farm.snapshot(), &t.asset).unwrap();
}

// ---------------------------------------------------------------------------
// Locks
// ---------------------------------------------------------------------------

fn locked_farm(percent: u64) -> TestFarm {
    let t = TestFarm::new(params(COIN, percent));
    t.farm.add_pool(800, unit(1), false).unwrap();
    t
}

#[test]
fn full_lock_power_decays_to_zero() {
    let t = locked_farm(20);
    let alice = user(1);
    t.fund(&alice, 1000 * COIN);
    t.farm.enter_staking(&alice, 1000 * COIN, MAX_LOCK_TIME).unwrap();

    let lock = t.farm.lock_info(&alice);
    assert_eq!(lock.unlock_time, T0 + MAX_LOCK_TIME);

    let power = t.farm.ve_power(&alice, T0).unwrap();
    assert_eq!(power, WAD);
    let power = t.farm.ve_power(&alice, T0 + 1).unwrap();
    assert!(power < WAD && WAD - power < WAD / 1_000_000, "power {power}");

    let half = t.farm.ve_power(&alice, T0 + MAX_LOCK_TIME / 2).unwrap();
    let expected = ExpDecayCurve::new()
        .ve_power(MAX_LOCK_TIME - MAX_LOCK_TIME / 2, MAX_LOCK_TIME, t.farm.params().steepness)
        .unwrap();
    assert_eq!(half, expected);
    assert!(half > WAD / 2, "convex curve keeps more than half: {half}");

    assert_eq!(t.farm.ve_power(&alice, lock.unlock_time).unwrap(), 0);
    assert_eq!(t.farm.ve_balance(&alice, lock.unlock_time).unwrap(), 0);
    assert_eq!(t.farm.lock_state(&alice, lock.unlock_time), LockState::Expired);
}

#[test]
fn active_harvest_pays_by_power() {
    let t = locked_farm(20);
    let alice = user(1);
    t.fund(&alice, 100 * COIN);
    t.farm.enter_staking(&alice, 100 * COIN, MAX_LOCK_TIME).unwrap();

    t.advance(MAX_LOCK_TIME / 4);
    let pending = t.farm.pending_reward(LOCK_POOL, &alice).unwrap();
    let decayed = t.farm.decayed_pending_reward(&alice).unwrap();
    assert!(pending > 0);
    assert!(decayed < pending);

    let receipt = t.farm.leave_staking(&alice).unwrap();
    assert_eq!(receipt.released, 0);
    assert_eq!(receipt.claim.paid, decayed);
    assert_eq!(receipt.claim.paid + receipt.claim.burned, pending);
    assert_eq!(t.balance(&alice), decayed);
    assert_eq!(t.farm.lock_info(&alice).locked_amount, 100 * COIN);
    assert_eq!(t.farm.pending_reward(LOCK_POOL, &alice).unwrap(), 0);
    check_invariants(&t.farm.snapshot(), &t.asset).unwrap();
}

#[test]
fn expired_leave_burns_and_returns_principal() {
    let t = locked_farm(20);
    let (alice, bob) = (user(1), user(2));
    t.fund(&alice, 50 * COIN);
    t.fund(&bob, 50 * COIN);
    t.farm.enter_staking(&alice, 50 * COIN, MIN_LOCK_TIME).unwrap();
    t.farm.enter_staking(&bob, 50 * COIN, MAX_LOCK_TIME).unwrap();
    assert_eq!(t.farm.locked_users(), 2);

    t.advance(MIN_LOCK_TIME + 10);
    let pending = t.farm.pending_reward(LOCK_POOL, &alice).unwrap();
    assert!(pending > 0);
    let supply = t.asset.total_supply();

    let receipt = t.farm.leave_staking(&alice).unwrap();
    assert_eq!(receipt.claim.paid, 0);
    assert_eq!(receipt.claim.burned, pending);
    assert_eq!(receipt.released, 50 * COIN);
    assert_eq!(t.balance(&alice), 50 * COIN);

    let lock = t.farm.lock_info(&alice);
    assert_eq!((lock.locked_amount, lock.unlock_time), (0, 0));
    assert_eq!(t.farm.lock_state(&alice, t.now()), LockState::Unlocked);
    assert_eq!(t.farm.total_locked(), 50 * COIN);
    assert_eq!(t.farm.locked_users(), 1);
    assert!(t.asset.total_supply() > supply);
    check_invariants(&t.farm.snapshot(), &t.asset).unwrap();

    assert_eq!(
        farm_err(t.farm.leave_staking(&alice).unwrap_err()),
        FarmError::NoLock(alice)
    );
}

#[test]
fn extension_must_be_strictly_later() {
    let t = locked_farm(20);
    let alice = user(1);
    t.fund(&alice, COIN);
    t.farm.enter_staking(&alice, COIN, 30 * 86_400).unwrap();

    t.advance(86_400);
    let err = t.farm.extend_lock_time(&alice, 29 * 86_400).unwrap_err();
    assert!(matches!(farm_err(err), FarmError::LockNotExtended { .. }));

    t.farm.extend_lock_time(&alice, 29 * 86_400 + 1).unwrap();
    assert_eq!(t.farm.lock_info(&alice).unlock_time, T0 + 30 * 86_400 + 1);

    let err = t.farm.extend_lock_time(&alice, MAX_LOCK_TIME + 1).unwrap_err();
    assert!(matches!(farm_err(err), FarmError::InvalidLockDuration { .. }));
}

#[test]
fn locked_principal_is_never_paid_as_reward() {
    // nothing emitted: the only reward-asset the engine holds is principal
    let t = TestFarm::new(params(0, 20));
    let (alice, bob) = (user(1), user(2));
    t.fund(&alice, 10 * COIN);
    t.fund(&bob, 10 * COIN);
    t.farm.enter_staking(&alice, 10 * COIN, MIN_LOCK_TIME).unwrap();
    t.farm.enter_staking(&bob, 10 * COIN, MIN_LOCK_TIME).unwrap();

    t.advance(MIN_LOCK_TIME);
    t.farm.leave_staking(&alice).unwrap();
    t.farm.leave_staking(&bob).unwrap();
    assert_eq!(t.balance(&alice), 10 * COIN);
    assert_eq!(t.balance(&bob), 10 * COIN);
    assert_eq!(t.balance(&engine()), 0);
}

// ---------------------------------------------------------------------------
// Configuration and concurrency
// ---------------------------------------------------------------------------

#[test]
fn cap_cuts_emission_short() {
    let t = TestFarm::new(params(10, 0));
    let alice = user(1);
    let pool = t.pool_with_deposit(unit(1), 1, &alice, 1);

    t.farm.decrease_reward_cap(55).unwrap();
    t.advance(100);
    t.farm.deposit(pool, &alice, 0).unwrap();
    assert_eq!(t.asset.total_supply(), 55);
    assert_eq!(t.balance(&alice), 55);

    let err = t.farm.decrease_reward_cap(54).unwrap_err();
    assert_eq!(
        farm_err(err),
        FarmError::Asset(AssetError::CapBelowSupply {
            cap: 54,
            supply: 55
        })
    );
    let err = t.farm.decrease_reward_cap(56).unwrap_err();
    assert!(matches!(
        farm_err(err),
        FarmError::Asset(AssetError::CapIncrease { .. })
    ));
}

#[test]
fn steepness_only_changes_future_power() {
    let t = locked_farm(20);
    let alice = user(1);
    t.fund(&alice, COIN);
    t.farm.enter_staking(&alice, COIN, MAX_LOCK_TIME).unwrap();
    let as_of = T0 + MAX_LOCK_TIME / 2;

    let before = t.farm.ve_power(&alice, as_of).unwrap();
    t.farm.set_steepness(6 * WAD).unwrap();
    let after = t.farm.ve_power(&alice, as_of).unwrap();
    assert!(after > before);
    assert!(t.farm.set_steepness(WAD / 2).is_err());
    assert_eq!(t.farm.params().steepness, 6 * WAD);
}

#[test]
fn parallel_writers_serialize() {
    let t = TestFarm::new(params(7, 0));
    let pool = t.farm.add_pool(1, unit(1), false).unwrap();
    let users: Vec<_> = (1..=8).map(user).collect();
    for who in &users {
        t.issue(&unit(1), who, 1_000);
    }

    let farm = Arc::new(t.farm);
    let handles: Vec<_> = users
        .iter()
        .map(|who| {
            let farm = Arc::clone(&farm);
            let who = *who;
            thread::spawn(move || {
                for _ in 0..10 {
                    farm.deposit(pool, &who, 100).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(t.units.balance_of(&unit(1), &engine()), 8_000);
    for who in &users {
        assert_eq!(farm.user_info(pool, who).amount, 1_000);
    }
    check_invariants(&farm.snapshot(), &t.asset).unwrap();
}
