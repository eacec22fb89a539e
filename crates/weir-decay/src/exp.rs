//! Fixed-point exponential.
//!
//! `e^y` is evaluated as `Σ y^i / i!` in WAD fixed point, stopping at the
//! first term that truncates to zero. Every term is a floor of a value that
//! is non-decreasing in `y`, so the result is monotonic in `y` and exact
//! (`WAD`) at `y = 0`.
//!
//! The domain is capped at [`EXP_MAX_INPUT`] (6.0), the largest `k * x` the
//! decay curve can produce. At the cap the series needs ~42 terms.

use weir_core::constants::{K_MAX, WAD};
use weir_core::error::MathError;
use weir_core::math::mul_div;

/// Largest accepted exponent (6.0 in WAD).
pub const EXP_MAX_INPUT: u128 = K_MAX;

/// `e^y * WAD` for WAD-scaled `y` in `[0, EXP_MAX_INPUT]`.
pub fn exp_wad(y: u128) -> Result<u128, MathError> {
    if y > EXP_MAX_INPUT {
        return Err(MathError::ExponentOutOfRange(y));
    }

    let mut sum = WAD;
    let mut term = WAD;
    let mut i: u128 = 1;
    loop {
        // term_i = term_{i-1} * y / (i * WAD)
        // term <= ~65 * WAD and y <= 6 * WAD: product needs the wide path.
        term = mul_div(term, y, WAD * i)?;
        if term == 0 {
            break;
        }
        sum = sum.checked_add(term).ok_or(MathError::Overflow)?;
        i += 1;
    }
    Ok(sum)
}

/// `e^(-y) * WAD` for WAD-scaled `y` in `[0, EXP_MAX_INPUT]`.
///
/// Computed as `WAD^2 / e^y`, so it is non-increasing in `y`.
pub fn exp_neg_wad(y: u128) -> Result<u128, MathError> {
    let e = exp_wad(y)?;
    mul_div(WAD, WAD, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Reference values `e^(-n) * 1e18` rounded, for n = 0..=6.
    const EXP_NEG_REFERENCE: [u128; 7] = [
        1_000_000_000_000_000_000, // e^0
        367_879_441_171_442_321,   // e^-1
        135_335_283_236_612_691,   // e^-2
        49_787_068_367_863_943,    // e^-3
        18_315_638_888_734_180,    // e^-4
        6_737_946_999_085_467,     // e^-5
        2_478_752_176_666_358,     // e^-6
    ];

    fn close(a: u128, b: u128, tolerance: u128) -> bool {
        a.abs_diff(b) <= tolerance
    }

    #[test]
    fn exp_at_zero_is_one() {
        assert_eq!(exp_wad(0).unwrap(), WAD);
        assert_eq!(exp_neg_wad(0).unwrap(), WAD);
    }

    #[test]
    fn exp_neg_matches_reference_at_integers() {
        for (n, &expected) in EXP_NEG_REFERENCE.iter().enumerate() {
            let got = exp_neg_wad(n as u128 * WAD).unwrap();
            assert!(
                close(got, expected, 1_000),
                "e^-{n}: got {got}, expected {expected}"
            );
        }
    }

    #[test]
    fn exp_at_one_is_e() {
        let e = exp_wad(WAD).unwrap();
        assert!(close(e, 2_718_281_828_459_045_235, 1_000), "e = {e}");
    }

    #[test]
    fn exp_at_half() {
        // e^-0.5 = 0.6065306597126334
        let v = exp_neg_wad(WAD / 2).unwrap();
        assert!(close(v, 606_530_659_712_633_423, 1_000), "e^-0.5 = {v}");
    }

    #[test]
    fn exp_rejects_out_of_range() {
        assert_eq!(
            exp_wad(EXP_MAX_INPUT + 1),
            Err(MathError::ExponentOutOfRange(EXP_MAX_INPUT + 1))
        );
    }

    #[test]
    fn exp_at_domain_cap() {
        assert!(exp_wad(EXP_MAX_INPUT).is_ok());
    }

    proptest! {
        #[test]
        fn exp_monotonic(a in 0u128..=EXP_MAX_INPUT, b in 0u128..=EXP_MAX_INPUT) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(exp_wad(lo).unwrap() <= exp_wad(hi).unwrap());
            prop_assert!(exp_neg_wad(lo).unwrap() >= exp_neg_wad(hi).unwrap());
        }

        #[test]
        fn exp_neg_in_unit_interval(y in 0u128..=EXP_MAX_INPUT) {
            let v = exp_neg_wad(y).unwrap();
            prop_assert!(v <= WAD);
            prop_assert!(v > 0);
        }

        #[test]
        fn exp_deterministic(y in 0u128..=EXP_MAX_INPUT) {
            prop_assert_eq!(exp_wad(y).unwrap(), exp_wad(y).unwrap());
        }
    }
}
