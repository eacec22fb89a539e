//! External collaborators and the per-transaction view of engine state.

use std::sync::Arc;

use tracing::{debug, error, warn};
use weir_core::error::{AssetError, FarmError};
use weir_core::state::FarmState;
use weir_core::traits::{Clock, DecayCurve, RewardAsset, UnitLedger};
use weir_core::types::{AccountId, PoolId, UnitId};
use weir_decay::ExpDecayCurve;

/// Everything the engine talks to but does not own.
#[derive(Clone)]
pub struct Context {
    /// The capped reward asset. Also the lock pool's stake unit.
    pub asset: Arc<dyn RewardAsset>,
    /// Stake units of the non-lock pools.
    pub units: Arc<dyn UnitLedger>,
    pub clock: Arc<dyn Clock>,
    pub curve: Arc<dyn DecayCurve>,
    /// Account holding deposits, locked principal and minted rewards.
    pub account: AccountId,
}

impl Context {
    /// Collaborators with the exponential decay curve.
    pub fn new(
        asset: Arc<dyn RewardAsset>,
        units: Arc<dyn UnitLedger>,
        clock: Arc<dyn Clock>,
        account: AccountId,
    ) -> Self {
        Self {
            asset,
            units,
            clock,
            curve: Arc::new(ExpDecayCurve::new()),
            account,
        }
    }

    /// Replace the decay curve.
    pub fn with_curve(mut self, curve: Arc<dyn DecayCurve>) -> Self {
        self.curve = curve;
        self
    }

    /// Backing supply of a pool: the engine's stake-unit balance, or the
    /// total locked principal for the lock pool.
    pub fn backing(&self, state: &FarmState, pool: PoolId) -> Result<u128, FarmError> {
        if pool == weir_core::constants::LOCK_POOL {
            return Ok(state.total_locked());
        }
        let unit = state.pool(pool)?.stake_unit;
        Ok(self.units.balance_of(&unit, &self.account))
    }

    /// Reward units the engine holds beyond locked principal.
    pub fn reward_reserve(&self, state: &FarmState) -> u128 {
        self.asset
            .balance_of(&self.account)
            .saturating_sub(state.total_locked())
    }

    /// Undo `effects` in reverse order.
    ///
    /// A compensation the ledger rejects is logged and skipped; the rest
    /// still run.
    pub fn revert(&self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        let count = effects.len();
        for effect in effects.into_iter().rev() {
            if let Err(err) = self.undo(&effect) {
                error!(?effect, %err, "external effect could not be reverted");
            }
        }
        debug!(count, "external effects reverted");
    }

    fn undo(&self, effect: &Effect) -> Result<(), AssetError> {
        match *effect {
            Effect::Minted(amount) => self.asset.burn(&self.account, amount),
            Effect::Burned(amount) => self.asset.mint(&self.account, amount),
            Effect::Moved { from, to, amount } => self.asset.transfer(&to, &from, amount),
            Effect::MovedUnits {
                unit,
                from,
                to,
                amount,
            } => self.units.transfer(&unit, &to, &from, amount),
            Effect::CapLowered { from, to } => {
                warn!(from, to, "reward cap cannot be raised back");
                Ok(())
            }
        }
    }
}

/// A call already made on an external ledger during a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Reward minted to the engine.
    Minted(u128),
    /// Reward burned from the engine.
    Burned(u128),
    /// Reward asset moved between accounts.
    Moved {
        from: AccountId,
        to: AccountId,
        amount: u128,
    },
    /// Stake units moved between accounts.
    MovedUnits {
        unit: UnitId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    },
    /// The asset's hard cap was lowered.
    CapLowered { from: u128, to: u128 },
}

/// One in-flight transaction: a working copy of state plus collaborators,
/// evaluated at a single instant.
///
/// External ledger calls go through the methods here so that
/// [`Context::revert`] can undo them if the transaction does not commit.
pub struct Tx<'a> {
    pub state: &'a mut FarmState,
    pub ctx: &'a Context,
    pub now: u64,
    effects: Vec<Effect>,
}

impl<'a> Tx<'a> {
    pub fn new(state: &'a mut FarmState, ctx: &'a Context, now: u64) -> Self {
        Self {
            state,
            ctx,
            now,
            effects: Vec::new(),
        }
    }

    /// External calls made so far, oldest first.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// End the transaction, handing back its external calls.
    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }

    /// Mint `amount` of reward to the engine.
    pub fn mint(&mut self, amount: u128) -> Result<(), FarmError> {
        if amount > 0 {
            self.ctx.asset.mint(&self.ctx.account, amount)?;
            self.effects.push(Effect::Minted(amount));
        }
        Ok(())
    }

    /// Move `amount` of the reward asset between accounts.
    pub fn move_asset(&mut self, from: &AccountId, to: &AccountId, amount: u128) -> Result<(), FarmError> {
        if amount > 0 {
            self.ctx.asset.transfer(from, to, amount)?;
            self.effects.push(Effect::Moved {
                from: *from,
                to: *to,
                amount,
            });
        }
        Ok(())
    }

    /// Move `amount` of stake unit `unit` between accounts.
    pub fn move_units(
        &mut self,
        unit: &UnitId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), FarmError> {
        if amount > 0 {
            self.ctx.units.transfer(unit, from, to, amount)?;
            self.effects.push(Effect::MovedUnits {
                unit: *unit,
                from: *from,
                to: *to,
                amount,
            });
        }
        Ok(())
    }

    /// Pay up to `amount` of reward to `to`, never touching locked principal.
    ///
    /// Returns the amount actually paid.
    pub fn pay_reward(&mut self, to: &AccountId, amount: u128) -> Result<u128, FarmError> {
        let paid = amount.min(self.ctx.reward_reserve(&*self.state));
        if paid < amount {
            warn!(%to, owed = amount, paid, "reward reserve short; paying what is held");
        }
        let engine = self.ctx.account;
        self.move_asset(&engine, to, paid)?;
        Ok(paid)
    }

    /// Burn up to `amount` of reward held by the engine.
    ///
    /// Returns the amount actually burned.
    pub fn burn_reward(&mut self, amount: u128) -> Result<u128, FarmError> {
        let burned = amount.min(self.ctx.reward_reserve(&*self.state));
        if burned > 0 {
            self.ctx.asset.burn(&self.ctx.account, burned)?;
            self.effects.push(Effect::Burned(burned));
        }
        Ok(burned)
    }

    /// Lower the reward asset's hard cap.
    pub fn lower_cap(&mut self, new_cap: u128) -> Result<(), FarmError> {
        let from = self.ctx.asset.max_supply();
        self.ctx.asset.decrease_cap(new_cap)?;
        self.effects.push(Effect::CapLowered { from, to: new_cap });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::clock::ManualClock;
    use weir_core::ledger::{MemoryRewardAsset, MemoryUnitLedger};
    use weir_core::types::Params;

    #[test]
    fn revert_undoes_effects_in_reverse() {
        let asset = MemoryRewardAsset::new("WEIR", 1_000);
        let units = MemoryUnitLedger::new();
        let engine = AccountId::from_name("farm");
        let alice = AccountId::from_name("alice");
        let lp = UnitId::from_symbol("LP");
        units.issue(&lp, &alice, 7);
        let ctx = Context::new(
            Arc::new(asset.clone()),
            Arc::new(units.clone()),
            Arc::new(ManualClock::new(0)),
            engine,
        );
        let mut state = FarmState::genesis(Params::genesis(1, 0), asset.unit(), 0);

        let mut tx = Tx::new(&mut state, &ctx, 0);
        tx.move_units(&lp, &alice, &engine, 7).unwrap();
        tx.mint(100).unwrap();
        assert_eq!(tx.pay_reward(&alice, 60).unwrap(), 60);
        assert_eq!(tx.burn_reward(90).unwrap(), 40);
        tx.lower_cap(500).unwrap();
        // zero amounts make no call
        tx.mint(0).unwrap();
        assert_eq!(tx.effects().len(), 5);
        assert_eq!(asset.total_supply(), 60);

        ctx.revert(tx.into_effects());
        assert_eq!(asset.total_supply(), 0);
        assert_eq!(asset.balance_of(&alice), 0);
        assert_eq!(asset.balance_of(&engine), 0);
        assert_eq!(units.balance_of(&lp, &alice), 7);
        // a lowered cap stays lowered
        assert_eq!(asset.max_supply(), 500);
    }

    #[test]
    fn payout_never_touches_locked_principal() {
        let asset = MemoryRewardAsset::new("WEIR", 1_000);
        let engine = AccountId::from_name("farm");
        let alice = AccountId::from_name("alice");
        let ctx = Context::new(
            Arc::new(asset.clone()),
            Arc::new(MemoryUnitLedger::new()),
            Arc::new(ManualClock::new(0)),
            engine,
        );
        let mut state = FarmState::genesis(Params::genesis(1, 0), asset.unit(), 0);
        state.set_totals(300, 1);
        asset.mint(&engine, 350).unwrap();

        let mut tx = Tx::new(&mut state, &ctx, 0);
        assert_eq!(tx.pay_reward(&alice, 80).unwrap(), 50);
        assert_eq!(tx.burn_reward(10).unwrap(), 0);
        assert_eq!(asset.balance_of(&engine), 300);
    }
}
