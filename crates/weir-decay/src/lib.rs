//! # weir-decay: Vote-escrow decay curve.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! - **Fixed-point exponential**: `e^y` for WAD-scaled `y` in `[0, K_MAX]`,
//!   evaluated as a truncated power series with 256-bit intermediates.
//! - **Normalized curve**: `ve = locked * (1 - e^(-k*x)) / (1 - e^(-k))` where
//!   `x` is remaining lock time as a fraction of the maximum lock. Exactly
//!   `locked` at `x = 1`, exactly zero at `x = 0`, for every valid `k`.

pub mod curve;
pub mod exp;

pub use curve::ExpDecayCurve;
pub use exp::{exp_neg_wad, exp_wad, EXP_MAX_INPUT};
