//! The simulated outside world: reward asset, stake-unit ledger and clock.
//!
//! The farm itself persists through RocksDB; everything it talks to is kept
//! in memory and saved next to it as `world.json`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use weir_core::clock::ManualClock;
use weir_core::ledger::{AssetSnapshot, MemoryRewardAsset, MemoryUnitLedger};
use weir_core::traits::Clock;
use weir_core::types::{AccountId, UnitId};

/// Symbol of the reward asset.
pub const REWARD_SYMBOL: &str = "WEIR";

#[derive(Serialize, Deserialize, Default)]
struct WorldFile {
    now: u64,
    asset: Option<AssetSnapshot>,
    units: Vec<(UnitId, AccountId, u128)>,
    accounts: BTreeMap<String, AccountId>,
    symbols: BTreeMap<String, UnitId>,
}

pub struct World {
    pub asset: MemoryRewardAsset,
    pub units: MemoryUnitLedger,
    pub clock: ManualClock,
    accounts: BTreeMap<String, AccountId>,
    symbols: BTreeMap<String, UnitId>,
}

impl World {
    /// A fresh world with an empty asset capped at `cap`.
    pub fn new(cap: u128, now: u64) -> Self {
        Self {
            asset: MemoryRewardAsset::new(REWARD_SYMBOL, cap),
            units: MemoryUnitLedger::new(),
            clock: ManualClock::new(now),
            accounts: BTreeMap::new(),
            symbols: BTreeMap::new(),
        }
    }

    /// Load `path`, or start fresh if it does not exist.
    pub fn load_or_new(path: &Path, cap: u128, now: u64) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(cap, now));
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read world file: {}", path.display()))?;
        let file: WorldFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid world file: {}", path.display()))?;

        let asset = match &file.asset {
            Some(snapshot) => MemoryRewardAsset::from_snapshot(snapshot),
            None => MemoryRewardAsset::new(REWARD_SYMBOL, cap),
        };
        let units = MemoryUnitLedger::new();
        for (unit, who, amount) in &file.units {
            units.issue(unit, who, *amount);
        }
        Ok(Self {
            asset,
            units,
            clock: ManualClock::new(file.now.max(now)),
            accounts: file.accounts,
            symbols: file.symbols,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = WorldFile {
            now: self.clock.now(),
            asset: Some(self.asset.snapshot()),
            units: self.units.balances(),
            accounts: self.accounts.clone(),
            symbols: self.symbols.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write world file: {}", path.display()))
    }

    /// Account for `name`, remembered for display.
    pub fn account(&mut self, name: &str) -> AccountId {
        *self
            .accounts
            .entry(name.to_string())
            .or_insert_with(|| AccountId::from_name(name))
    }

    /// Stake unit for `symbol`, remembered for display.
    pub fn unit(&mut self, symbol: &str) -> UnitId {
        *self
            .symbols
            .entry(symbol.to_string())
            .or_insert_with(|| UnitId::from_symbol(symbol))
    }

    /// Named accounts in name order.
    pub fn accounts(&self) -> impl Iterator<Item = (&str, &AccountId)> {
        self.accounts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Display name of a stake unit.
    pub fn symbol_of(&self, unit: &UnitId) -> String {
        if *unit == UnitId::from_symbol(REWARD_SYMBOL) {
            return REWARD_SYMBOL.to_string();
        }
        self.symbols
            .iter()
            .find(|(_, u)| *u == unit)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| unit.to_string())
    }
}
