//! # weir-farm: Weighted reward farm with a vote-escrow lock pool.
//!
//! - **Pool registry**: an append-only list of weighted pools. Pool 0 stakes
//!   the reward asset itself and its weight is derived from the others.
//! - **Lazy accrual**: each pool carries a reward-per-share accumulator that
//!   advances only when the pool is touched, capped by the asset's supply.
//! - **Stake ledger**: per-position amount and reward debt for pools 1..n.
//! - **Lock engine**: time-locked deposits into pool 0 whose rewards are paid
//!   at the holder's decayed vote power; the unscaled remainder is burned.
//! - **[`Farm`]**: the transactional facade. One writer at a time, nested
//!   entry rejected, failed calls leave state untouched.

pub mod accrual;
pub mod context;
pub mod farm;
pub mod guard;
pub mod lock;
pub mod registry;
pub mod stake;

pub use context::{Context, Tx};
pub use farm::{validate_params, Farm};
pub use guard::CallGuard;
pub use lock::LeaveReceipt;
