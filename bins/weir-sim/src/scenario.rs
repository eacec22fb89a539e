//! JSON scenarios: a list of steps run against a farm, one transaction each.
//!
//! ```json
//! { "name": "single pool",
//!   "steps": [
//!     { "op": "add_pool", "symbol": "LP", "weight": 1000 },
//!     { "op": "issue", "symbol": "LP", "account": "alice", "amount": 100 },
//!     { "op": "deposit", "pool": 1, "account": "alice", "amount": 100 },
//!     { "op": "advance", "secs": 100 },
//!     { "op": "report", "account": "alice" } ] }
//! ```
//!
//! Amounts are base units, either as integers or decimal strings; a string
//! ending in `WEIR` is read in whole coins (up to 18 decimals).

use std::fmt;

use anyhow::Result;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};
use weir_core::constants::{COIN, WAD};
use weir_core::traits::{Clock, RewardAsset};
use weir_core::types::PoolId;
use weir_farm::Farm;

use crate::world::World;

/// A base-unit amount read from an integer or a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount(pub u128);

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer amount or a string such as \"12.5 WEIR\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(v as u128))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u128::try_from(v)
                    .map(Amount)
                    .map_err(|_| E::custom(format!("negative amount: {v}")))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
                Ok(Amount(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                parse_amount(v).map(Amount).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Parse a decimal with up to `scale` fractional digits into an integer
/// scaled by `10^scale`.
pub fn parse_decimal(s: &str, scale: u32) -> Result<u128, String> {
    let s = s.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(format!("invalid number: {s:?}"));
    }
    if frac.len() > scale as usize {
        return Err(format!("too many decimals in {s:?} (max {scale})"));
    }
    let unit = 10u128.pow(scale);
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| format!("invalid number: {s:?}"))?
    };
    let frac_value: u128 = if frac.is_empty() {
        0
    } else {
        let digits: u128 = frac.parse().map_err(|_| format!("invalid number: {s:?}"))?;
        digits * 10u128.pow(scale - frac.len() as u32)
    };
    whole
        .checked_mul(unit)
        .and_then(|w| w.checked_add(frac_value))
        .ok_or_else(|| format!("number too large: {s:?}"))
}

/// Parse `"123"` (base units) or `"1.5 WEIR"` (coins).
pub fn parse_amount(s: &str) -> Result<u128, String> {
    let s = s.trim();
    match s.strip_suffix("WEIR") {
        Some(coins) => parse_decimal(coins, 18),
        None => s
            .parse()
            .map_err(|_| format!("invalid amount: {s:?}")),
    }
}

/// Base units as coins with six decimals.
pub fn fmt_coins(units: u128) -> String {
    format!("{}.{:06} WEIR", units / COIN, (units % COIN) / (COIN / 1_000_000))
}

/// WAD-scaled ratio with six decimals.
pub fn fmt_wad(value: u128) -> String {
    format!("{}.{:06}", value / WAD, (value % WAD) / (WAD / 1_000_000))
}

/// Unix time as RFC 3339, falling back to raw seconds.
pub fn fmt_time(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Clock start for a fresh world.
    #[serde(default)]
    pub start_time: Option<u64>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Move the clock forward.
    Advance { secs: u64 },
    /// Mint reward asset to an account outside the farm.
    Mint { account: String, amount: Amount },
    /// Issue stake units to an account.
    Issue { symbol: String, account: String, amount: Amount },
    AddPool {
        symbol: String,
        weight: u64,
        #[serde(default)]
        rebalance_first: bool,
    },
    SetPoolWeight {
        pool: PoolId,
        weight: u64,
        #[serde(default)]
        rebalance_first: bool,
    },
    Deposit { pool: PoolId, account: String, amount: Amount },
    Withdraw { pool: PoolId, account: String, amount: Amount },
    EmergencyWithdraw { pool: PoolId, account: String },
    EnterStaking { account: String, amount: Amount, duration: u64 },
    LeaveStaking { account: String },
    ExtendLockTime { account: String, extra: u64 },
    SetEmissionRate { rate: Amount },
    SetStakingWeightPercent { percent: u64 },
    /// Steepness as a WAD integer or a decimal string such as `"3.0"`.
    SetSteepness { k: Steepness },
    DecreaseRewardCap { cap: Amount },
    /// Record an account's position without changing anything.
    Report { account: String },
}

/// Decay steepness read as a WAD integer or a plain decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Steepness(pub u128);

impl<'de> Deserialize<'de> for Steepness {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Wad(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Wad(v) => Ok(Steepness(v as u128)),
            Raw::Text(s) => parse_decimal(&s, 18).map(Steepness).map_err(de::Error::custom),
        }
    }
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Advance { .. } => "advance",
            Step::Mint { .. } => "mint",
            Step::Issue { .. } => "issue",
            Step::AddPool { .. } => "add_pool",
            Step::SetPoolWeight { .. } => "set_pool_weight",
            Step::Deposit { .. } => "deposit",
            Step::Withdraw { .. } => "withdraw",
            Step::EmergencyWithdraw { .. } => "emergency_withdraw",
            Step::EnterStaking { .. } => "enter_staking",
            Step::LeaveStaking { .. } => "leave_staking",
            Step::ExtendLockTime { .. } => "extend_lock_time",
            Step::SetEmissionRate { .. } => "set_emission_rate",
            Step::SetStakingWeightPercent { .. } => "set_staking_weight_percent",
            Step::SetSteepness { .. } => "set_steepness",
            Step::DecreaseRewardCap { .. } => "decrease_reward_cap",
            Step::Report { .. } => "report",
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub index: usize,
    pub time: u64,
    pub at: String,
    pub op: &'static str,
    pub ok: bool,
    pub detail: String,
}

fn execute(step: &Step, farm: &Farm, world: &mut World) -> Result<String> {
    let detail = match step {
        Step::Advance { secs } => {
            world.clock.advance(*secs);
            format!("+{secs}s")
        }
        Step::Mint { account, amount } => {
            let who = world.account(account);
            world.asset.mint(&who, amount.0)?;
            format!("{account} +{}", fmt_coins(amount.0))
        }
        Step::Issue {
            symbol,
            account,
            amount,
        } => {
            let unit = world.unit(symbol);
            let who = world.account(account);
            world.units.issue(&unit, &who, amount.0);
            format!("{account} +{} {symbol}", amount.0)
        }
        Step::AddPool {
            symbol,
            weight,
            rebalance_first,
        } => {
            let unit = world.unit(symbol);
            let id = farm.add_pool(*weight, unit, *rebalance_first)?;
            format!("pool {id} ({symbol}) weight {weight}")
        }
        Step::SetPoolWeight {
            pool,
            weight,
            rebalance_first,
        } => {
            farm.set_pool_weight(*pool, *weight, *rebalance_first)?;
            format!("pool {pool} weight {weight}")
        }
        Step::Deposit {
            pool,
            account,
            amount,
        } => {
            let who = world.account(account);
            let claim = farm.deposit(*pool, &who, amount.0)?;
            format!("{account} +{} into pool {pool}, paid {}", amount.0, fmt_coins(claim.paid))
        }
        Step::Withdraw {
            pool,
            account,
            amount,
        } => {
            let who = world.account(account);
            let claim = farm.withdraw(*pool, &who, amount.0)?;
            format!("{account} -{} from pool {pool}, paid {}", amount.0, fmt_coins(claim.paid))
        }
        Step::EmergencyWithdraw { pool, account } => {
            let who = world.account(account);
            let released = farm.emergency_withdraw(*pool, &who)?;
            format!("{account} released {released} from pool {pool}")
        }
        Step::EnterStaking {
            account,
            amount,
            duration,
        } => {
            let who = world.account(account);
            let claim = farm.enter_staking(&who, amount.0, *duration)?;
            format!(
                "{account} locked {} for {duration}s, paid {}, burned {}",
                fmt_coins(amount.0),
                fmt_coins(claim.paid),
                fmt_coins(claim.burned)
            )
        }
        Step::LeaveStaking { account } => {
            let who = world.account(account);
            let receipt = farm.leave_staking(&who)?;
            format!(
                "{account} released {}, paid {}, burned {}",
                fmt_coins(receipt.released),
                fmt_coins(receipt.claim.paid),
                fmt_coins(receipt.claim.burned)
            )
        }
        Step::ExtendLockTime { account, extra } => {
            let who = world.account(account);
            let claim = farm.extend_lock_time(&who, *extra)?;
            let unlock = farm.lock_info(&who).unlock_time;
            format!(
                "{account} unlocks at {}, paid {}, burned {}",
                fmt_time(unlock),
                fmt_coins(claim.paid),
                fmt_coins(claim.burned)
            )
        }
        Step::SetEmissionRate { rate } => {
            farm.set_emission_rate(rate.0)?;
            format!("{}/s", fmt_coins(rate.0))
        }
        Step::SetStakingWeightPercent { percent } => {
            farm.set_staking_weight_percent(*percent)?;
            format!("{percent}%")
        }
        Step::SetSteepness { k } => {
            farm.set_steepness(k.0)?;
            format!("k = {}", fmt_wad(k.0))
        }
        Step::DecreaseRewardCap { cap } => {
            farm.decrease_reward_cap(cap.0)?;
            format!("cap {}", fmt_coins(cap.0))
        }
        Step::Report { account } => {
            let who = world.account(account);
            let now = world.clock.now();
            let mut parts = vec![format!("balance {}", fmt_coins(world.asset.balance_of(&who)))];
            for pool in 1..farm.pool_count() as PoolId {
                let stake = farm.user_info(pool, &who);
                if stake.amount > 0 {
                    let pending = farm.pending_reward(pool, &who)?;
                    parts.push(format!("pool {pool}: {} staked, {} pending", stake.amount, fmt_coins(pending)));
                }
            }
            let lock = farm.lock_info(&who);
            if lock.locked_amount > 0 {
                parts.push(format!(
                    "lock: {} {:?}, vePower {}, {} claimable",
                    fmt_coins(lock.locked_amount),
                    farm.lock_state(&who, now),
                    fmt_wad(farm.ve_power(&who, now)?),
                    fmt_coins(farm.decayed_pending_reward(&who)?)
                ));
            }
            format!("{account}: {}", parts.join("; "))
        }
    };
    Ok(detail)
}

/// Run every step in order. A failing step is recorded and the run goes on.
pub fn run(scenario: &Scenario, farm: &Farm, world: &mut World) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let result = execute(step, farm, world);
        let time = world.clock.now();
        let (ok, detail) = match result {
            Ok(detail) => {
                debug!(index, op = step.name(), %detail, "step done");
                (true, detail)
            }
            Err(err) => {
                warn!(index, op = step.name(), error = %err, "step failed");
                (false, err.to_string())
            }
        };
        outcomes.push(Outcome {
            index,
            time,
            at: fmt_time(time),
            op: step.name(),
            ok,
            detail,
        });
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use weir_core::state::MemoryFarmStore;
    use weir_core::types::{AccountId, Params};
    use weir_farm::Context;

    fn farm(world: &World, params: Params) -> Farm {
        let ctx = Context::new(
            Arc::new(world.asset.clone()),
            Arc::new(world.units.clone()),
            Arc::new(world.clock.clone()),
            AccountId::from_name("farm"),
        );
        Farm::open(ctx, Arc::new(MemoryFarmStore::new()), params).unwrap()
    }

    #[test]
    fn parse_amounts() {
        assert_eq!(parse_amount("42").unwrap(), 42);
        assert_eq!(parse_amount("1.5 WEIR").unwrap(), 3 * COIN / 2);
        assert_eq!(parse_amount("2WEIR").unwrap(), 2 * COIN);
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("0.0000000000000000001 WEIR").is_err());
        assert_eq!(parse_decimal("3", 18).unwrap(), 3 * WAD);
        assert_eq!(parse_decimal(".25", 2).unwrap(), 25);
        assert!(parse_decimal(".", 2).is_err());
    }

    #[test]
    fn formatting() {
        assert_eq!(fmt_coins(COIN + COIN / 4), "1.250000 WEIR");
        assert_eq!(fmt_wad(WAD / 2), "0.500000");
        assert_eq!(fmt_time(0), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn steps_deserialize() {
        let scenario = Scenario::from_json(
            br#"{ "steps": [
                { "op": "advance", "secs": 5 },
                { "op": "mint", "account": "a", "amount": "1 WEIR" },
                { "op": "set_steepness", "k": "2.5" },
                { "op": "add_pool", "symbol": "LP", "weight": 3 }
            ] }"#,
        )
        .unwrap();
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(scenario.steps[1], Step::Mint { amount: Amount(a), .. } if a == COIN));
        assert!(matches!(scenario.steps[2], Step::SetSteepness { k: Steepness(k) } if k == 5 * WAD / 2));
        assert!(matches!(
            scenario.steps[3],
            Step::AddPool { weight: 3, rebalance_first: false, .. }
        ));
    }

    #[test]
    fn run_records_failures_and_continues() {
        let mut world = World::new(u128::MAX / 2, 1_000);
        let farm = farm(
            &world,
            Params {
                staking_weight_percent: 0,
                ..Params::genesis(5, 0)
            },
        );
        let scenario = Scenario::from_json(
            br#"{ "steps": [
                { "op": "add_pool", "symbol": "LP", "weight": 1000 },
                { "op": "issue", "symbol": "LP", "account": "alice", "amount": 100 },
                { "op": "deposit", "pool": 1, "account": "alice", "amount": 100 },
                { "op": "advance", "secs": 100 },
                { "op": "withdraw", "pool": 1, "account": "alice", "amount": 101 },
                { "op": "withdraw", "pool": 1, "account": "alice", "amount": 100 }
            ] }"#,
        )
        .unwrap();

        let outcomes = run(&scenario, &farm, &mut world);
        let ok: Vec<bool> = outcomes.iter().map(|o| o.ok).collect();
        assert_eq!(ok, vec![true, true, true, true, false, true]);
        assert!(outcomes[4].detail.contains("insufficient balance"));
        assert_eq!(outcomes[5].time, 1_100);

        let alice = world.account("alice");
        assert_eq!(world.asset.balance_of(&alice), 500);
    }
}
