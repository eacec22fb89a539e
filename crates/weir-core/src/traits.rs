//! Trait interfaces for the Weir engine.
//!
//! These traits define the contracts between crates and external
//! collaborators:
//! - [`RewardAsset`]: capped, mintable reward ledger (external)
//! - [`UnitLedger`]: stake-unit transfers for non-lock pools (external)
//! - [`Clock`]: source of the current Unix timestamp
//! - [`DecayCurve`]: vote-escrow decay math (weir-decay implements)
//! - [`FarmStore`]: persistence of engine state (weir-node implements)

use crate::error::{AssetError, MathError, WeirError};
use crate::state::{FarmState, Journal};
use crate::types::{AccountId, UnitId};

/// A mintable, burnable fungible asset with a hard supply cap.
///
/// Methods take `&self`; implementations synchronise internally so the same
/// ledger can be shared between the engine and its callers. A transfer may
/// run arbitrary third-party logic, including calling back into the engine.
pub trait RewardAsset: Send + Sync {
    /// Identity of the asset. Used as the lock pool's stake unit.
    fn unit(&self) -> UnitId;

    /// Create `amount` new units for `to`.
    ///
    /// # Errors
    ///
    /// [`AssetError::SupplyCapExceeded`] if `total_supply + amount > max_supply`.
    fn mint(&self, to: &AccountId, amount: u128) -> Result<(), AssetError>;

    /// Destroy `amount` units held by `from`.
    fn burn(&self, from: &AccountId, amount: u128) -> Result<(), AssetError>;

    /// Move `amount` units between accounts.
    fn transfer(&self, from: &AccountId, to: &AccountId, amount: u128) -> Result<(), AssetError>;

    /// Balance of `who`.
    fn balance_of(&self, who: &AccountId) -> u128;

    /// Units currently in existence.
    fn total_supply(&self) -> u128;

    /// Hard cap on `total_supply`.
    fn max_supply(&self) -> u128;

    /// Lower the hard cap.
    ///
    /// # Errors
    ///
    /// [`AssetError::CapBelowSupply`] if `new_cap < total_supply`;
    /// [`AssetError::CapIncrease`] if `new_cap > max_supply`.
    fn decrease_cap(&self, new_cap: u128) -> Result<(), AssetError>;

    /// Units that can still be minted.
    ///
    /// Default implementation: `max_supply - total_supply`, saturating.
    fn mintable(&self) -> u128 {
        self.max_supply().saturating_sub(self.total_supply())
    }
}

/// Balances and transfers of pool stake units.
pub trait UnitLedger: Send + Sync {
    /// Move `amount` of `unit` between accounts.
    fn transfer(
        &self,
        unit: &UnitId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), AssetError>;

    /// Balance of `unit` held by `who`.
    fn balance_of(&self, unit: &UnitId, who: &AccountId) -> u128;
}

/// Source of the current Unix timestamp in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Vote-escrow decay math.
///
/// All values are integers; ratios are WAD-scaled. Implemented by the
/// exponential curve in weir-decay.
pub trait DecayCurve: Send + Sync {
    /// Decayed balance of `locked` units with `remaining` seconds left on a
    /// lock whose maximum duration is `max_lock`, at steepness `k` (WAD).
    ///
    /// Must return 0 when `remaining == 0` and exactly `locked` when
    /// `remaining >= max_lock`.
    fn ve_balance(
        &self,
        locked: u128,
        remaining: u64,
        max_lock: u64,
        k: u128,
    ) -> Result<u128, MathError>;

    /// Vote power `ve_balance / locked`, WAD-scaled. Zero for an empty lock.
    ///
    /// Default implementation evaluates the curve on one WAD of principal.
    fn ve_power(&self, remaining: u64, max_lock: u64, k: u128) -> Result<u128, MathError> {
        self.ve_balance(crate::constants::WAD, remaining, max_lock, k)
    }
}

/// Persistence of engine state.
///
/// `commit` writes the records named in the journal atomically; a crash
/// between commits leaves the last committed state intact.
pub trait FarmStore: Send + Sync {
    /// Load the last committed state, or `None` for an empty store.
    fn load(&self) -> Result<Option<FarmState>, WeirError>;

    /// Persist the records touched by one transaction.
    fn commit(&self, state: &FarmState, journal: &Journal) -> Result<(), WeirError>;
}
