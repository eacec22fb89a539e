//! Exponential vote-escrow curve implementing [`DecayCurve`].
//!
//! `ve(locked, remaining) = locked * (1 - e^(-k*x)) / (1 - e^(-k))` with
//! `x = min(remaining, max_lock) / max_lock`. The `1 - e^(-k)` denominator
//! normalizes the curve so a lock with the full duration remaining carries
//! its whole principal regardless of `k`.

use weir_core::constants::{K_MAX, K_MIN, WAD};
use weir_core::error::MathError;
use weir_core::math::{mul_div, wad_mul};
use weir_core::traits::DecayCurve;

use crate::exp::exp_neg_wad;

/// The production decay curve.
#[derive(Debug, Clone, Default)]
pub struct ExpDecayCurve;

impl ExpDecayCurve {
    pub fn new() -> Self {
        Self
    }

    /// Whether `k` lies in `[K_MIN, K_MAX]`.
    pub fn valid_steepness(k: u128) -> bool {
        (K_MIN..=K_MAX).contains(&k)
    }
}

impl DecayCurve for ExpDecayCurve {
    fn ve_balance(
        &self,
        locked: u128,
        remaining: u64,
        max_lock: u64,
        k: u128,
    ) -> Result<u128, MathError> {
        if locked == 0 || remaining == 0 {
            return Ok(0);
        }
        if max_lock == 0 {
            return Err(MathError::DivisionByZero);
        }
        if !Self::valid_steepness(k) {
            return Err(MathError::ExponentOutOfRange(k));
        }
        if remaining >= max_lock {
            return Ok(locked);
        }

        // x in [0, 1) as WAD
        let x = mul_div(remaining as u128, WAD, max_lock as u128)?;
        let kx = wad_mul(k, x)?;

        let numerator = WAD - exp_neg_wad(kx)?;
        let denominator = WAD - exp_neg_wad(k)?;

        // Truncation can push the ratio a hair above one just below x = 1.
        let ve = mul_div(locked, numerator, denominator)?;
        Ok(ve.min(locked))
    }
}
