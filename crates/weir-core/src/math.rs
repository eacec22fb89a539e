//! Fixed-point arithmetic.
//!
//! Everything is integer-only so results are bit-reproducible. Values tagged
//! "WAD" are scaled by [`WAD`] (`1.0 == 10^18`). Products that may exceed
//! `u128` go through a 256-bit intermediate in [`mul_div`].

use primitive_types::U256;

use crate::constants::WAD;
use crate::error::MathError;

/// `floor(a * b / denominator)` with a 256-bit intermediate product.
///
/// Fails on a zero denominator or when the quotient does not fit in `u128`.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    // Fast path: product fits in u128.
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / denominator);
    }
    let quotient = U256::from(a) * U256::from(b) / U256::from(denominator);
    if quotient > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(quotient.as_u128())
}

/// WAD multiplication: `floor(a * b / WAD)`.
pub fn wad_mul(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, b, WAD)
}

/// WAD division: `floor(a * WAD / b)`.
pub fn wad_div(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, WAD, b)
}

/// Checked addition mapped into [`MathError`].
pub fn add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

/// Checked subtraction mapped into [`MathError`].
pub fn sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Overflow)
}
