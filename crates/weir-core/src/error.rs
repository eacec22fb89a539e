//! Error types for the Weir engine.
use thiserror::Error;

use crate::types::{AccountId, UnitId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] Overflow,
    #[error("division by zero")] DivisionByZero,
    #[error("exponent out of range: {0}")] ExponentOutOfRange(u128),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("supply cap exceeded: requested {requested}, mintable {mintable}")] SupplyCapExceeded { requested: u128, mintable: u128 },
    #[error("insufficient balance for {account}: have {have}, need {need}")] InsufficientBalance { account: AccountId, have: u128, need: u128 },
    #[error("cap {cap} below total supply {supply}")] CapBelowSupply { cap: u128, supply: u128 },
    #[error("cap can only decrease: current {current}, requested {requested}")] CapIncrease { current: u128, requested: u128 },
    #[error("transfer rejected: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FarmError {
    #[error("invalid pool: {0}")] InvalidPool(u32),
    #[error("stake unit already registered: {0}")] DuplicatePool(UnitId),
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("invalid lock duration {duration}s (allowed {min}..={max})")] InvalidLockDuration { duration: u64, min: u64, max: u64 },
    #[error("lock not extended: current unlock {current}, proposed {proposed}")] LockNotExtended { current: u64, proposed: u64 },
    #[error("no lock held by {0}")] NoLock(AccountId),
    #[error("zero amount")] ZeroAmount,
    #[error("{name} out of range: {value} (allowed {min}..={max})")] ParameterOutOfRange { name: &'static str, value: u128, min: u128, max: u128 },
    #[error("supply cap exceeded: requested {requested}, mintable {mintable}")] SupplyCapExceeded { requested: u128, mintable: u128 },
    #[error("reentrant call rejected")] ReentrantCall,
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Asset(AssetError),
}

impl From<AssetError> for FarmError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::SupplyCapExceeded { requested, mintable } => {
                FarmError::SupplyCapExceeded { requested, mintable }
            }
            other => FarmError::Asset(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum WeirError {
    #[error(transparent)] Farm(#[from] FarmError),
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Asset(#[from] AssetError),
    #[error("storage: {0}")] Storage(String),
}

impl WeirError {
    /// The engine-level error, if this is one.
    pub fn as_farm(&self) -> Option<&FarmError> {
        match self {
            WeirError::Farm(e) => Some(e),
            _ => None,
        }
    }
}
