//! In-memory [`RewardAsset`] and [`UnitLedger`] implementations.
//!
//! Both are cheap-clone handles over shared state, so a test or simulator
//! can keep a handle while the engine owns another. No persistence; see
//! [`AssetSnapshot`] for exporting balances.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::AssetError;
use crate::traits::{RewardAsset, UnitLedger};
use crate::types::{AccountId, UnitId};

#[derive(Debug, Default)]
struct AssetBook {
    balances: HashMap<AccountId, u128>,
    total_supply: u128,
    max_supply: u128,
    mint_halted: bool,
}

impl AssetBook {
    fn debit(&mut self, who: &AccountId, amount: u128) -> Result<(), AssetError> {
        let have = self.balances.get(who).copied().unwrap_or(0);
        if have < amount {
            return Err(AssetError::InsufficientBalance {
                account: *who,
                have,
                need: amount,
            });
        }
        self.balances.insert(*who, have - amount);
        Ok(())
    }

    fn credit(&mut self, who: &AccountId, amount: u128) {
        let entry = self.balances.entry(*who).or_insert(0);
        *entry = entry.saturating_add(amount);
    }
}

/// Exported state of a [`MemoryRewardAsset`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AssetSnapshot {
    pub symbol: String,
    pub max_supply: u128,
    pub balances: Vec<(AccountId, u128)>,
}

/// Capped reward asset held in memory.
#[derive(Debug, Clone)]
pub struct MemoryRewardAsset {
    symbol: String,
    unit: UnitId,
    book: Arc<RwLock<AssetBook>>,
}

impl MemoryRewardAsset {
    /// Create an asset with zero supply and the given cap.
    pub fn new(symbol: &str, max_supply: u128) -> Self {
        Self {
            symbol: symbol.to_string(),
            unit: UnitId::from_symbol(symbol),
            book: Arc::new(RwLock::new(AssetBook {
                max_supply,
                ..AssetBook::default()
            })),
        }
    }

    /// Rebuild an asset from a snapshot. Total supply is the sum of balances.
    pub fn from_snapshot(snapshot: &AssetSnapshot) -> Self {
        let asset = Self::new(&snapshot.symbol, snapshot.max_supply);
        {
            let mut book = asset.book.write();
            for (who, amount) in &snapshot.balances {
                book.credit(who, *amount);
                book.total_supply = book.total_supply.saturating_add(*amount);
            }
        }
        asset
    }

    /// Export balances in account order.
    pub fn snapshot(&self) -> AssetSnapshot {
        let book = self.book.read();
        let balances: BTreeMap<AccountId, u128> = book
            .balances
            .iter()
            .filter(|(_, v)| **v > 0)
            .map(|(k, v)| (*k, *v))
            .collect();
        AssetSnapshot {
            symbol: self.symbol.clone(),
            max_supply: book.max_supply,
            balances: balances.into_iter().collect(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Make every subsequent mint fail with `SupplyCapExceeded`.
    #[cfg(any(test, feature = "testing"))]
    pub fn halt_minting(&self, halted: bool) {
        self.book.write().mint_halted = halted;
    }
}

impl RewardAsset for MemoryRewardAsset {
    fn unit(&self) -> UnitId {
        self.unit
    }

    fn mint(&self, to: &AccountId, amount: u128) -> Result<(), AssetError> {
        let mut book = self.book.write();
        let mintable = book.max_supply.saturating_sub(book.total_supply);
        if book.mint_halted {
            return Err(AssetError::SupplyCapExceeded {
                requested: amount,
                mintable: 0,
            });
        }
        if amount > mintable {
            return Err(AssetError::SupplyCapExceeded {
                requested: amount,
                mintable,
            });
        }
        book.total_supply += amount;
        book.credit(to, amount);
        Ok(())
    }

    fn burn(&self, from: &AccountId, amount: u128) -> Result<(), AssetError> {
        let mut book = self.book.write();
        book.debit(from, amount)?;
        book.total_supply -= amount;
        Ok(())
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: u128) -> Result<(), AssetError> {
        let mut book = self.book.write();
        book.debit(from, amount)?;
        book.credit(to, amount);
        Ok(())
    }

    fn balance_of(&self, who: &AccountId) -> u128 {
        self.book.read().balances.get(who).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> u128 {
        self.book.read().total_supply
    }

    fn max_supply(&self) -> u128 {
        self.book.read().max_supply
    }

    fn decrease_cap(&self, new_cap: u128) -> Result<(), AssetError> {
        let mut book = self.book.write();
        if new_cap > book.max_supply {
            return Err(AssetError::CapIncrease {
                current: book.max_supply,
                requested: new_cap,
            });
        }
        if new_cap < book.total_supply {
            return Err(AssetError::CapBelowSupply {
                cap: new_cap,
                supply: book.total_supply,
            });
        }
        book.max_supply = new_cap;
        Ok(())
    }
}

/// Stake-unit balances held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryUnitLedger {
    balances: Arc<RwLock<HashMap<(UnitId, AccountId), u128>>>,
}

impl MemoryUnitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `amount` of `unit` to `who` out of thin air.
    pub fn issue(&self, unit: &UnitId, who: &AccountId, amount: u128) {
        let mut balances = self.balances.write();
        let entry = balances.entry((*unit, *who)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Non-zero balances as `(unit, holder, amount)`, in key order.
    pub fn balances(&self) -> Vec<(UnitId, AccountId, u128)> {
        let balances = self.balances.read();
        let mut out: Vec<_> = balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|((unit, who), amount)| (*unit, *who, *amount))
            .collect();
        out.sort();
        out
    }
}

impl UnitLedger for MemoryUnitLedger {
    fn transfer(
        &self,
        unit: &UnitId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), AssetError> {
        let mut balances = self.balances.write();
        let have = balances.get(&(*unit, *from)).copied().unwrap_or(0);
        if have < amount {
            return Err(AssetError::InsufficientBalance {
                account: *from,
                have,
                need: amount,
            });
        }
        balances.insert((*unit, *from), have - amount);
        let entry = balances.entry((*unit, *to)).or_insert(0);
        *entry = entry.saturating_add(amount);
        Ok(())
    }

    fn balance_of(&self, unit: &UnitId, who: &AccountId) -> u128 {
        self.balances
            .read()
            .get(&(*unit, *who))
            .copied()
            .unwrap_or(0)
    }
}
