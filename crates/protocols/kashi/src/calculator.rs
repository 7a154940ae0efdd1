//! Kashi Calculator
//!
//! Pure share/amount conversions and interest projection.
//! No I/O - just calculations.

use kashi_core::{ProtocolError, Timestamp};
use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::constants::scale;
use crate::state::{AccrueInfo, KashiPair, PairAmounts, Rebase};

/// Convert a big integer to f64, rejecting values beyond the f64 range
pub fn big_to_f64(value: &BigUint) -> Result<f64, ProtocolError> {
    value
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProtocolError::InvalidInput {
            message: format!("value {value} exceeds the floating point range"),
        })
}

/// Convert a non-negative float to an integer without losing magnitude
///
/// Values up to 2^53 - 1 are rounded exactly. Larger values keep a rounded
/// 52-bit mantissa scaled by the float's binary exponent, so the result
/// has the float's magnitude instead of saturating.
pub fn float_to_big_uint(value: f64) -> Result<BigUint, ProtocolError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ProtocolError::InvalidInput {
            message: format!("cannot represent {value} as a non-negative integer"),
        });
    }
    if value <= scale::MAX_SAFE_INTEGER {
        return Ok(BigUint::from(value.round() as u64));
    }

    // Unbiased exponent straight from the IEEE-754 bits
    let exponent = ((value.to_bits() >> 52) & 0x7ff) as i32 - 1023;
    let shift = exponent - (scale::MANTISSA_BITS - 1);
    let mantissa = (value / 2f64.powi(shift)).round() as u64;
    Ok(BigUint::from(mantissa) << shift as usize)
}

/// Vault shares -> asset amount (identity for an empty vault)
pub fn shares_to_amount(shares: &BigUint, total: &Rebase) -> Result<f64, ProtocolError> {
    total.validate("vault")?;
    big_to_f64(&total.to_elastic(shares))
}

/// Asset amount -> vault shares (identity for an empty vault)
pub fn amount_to_shares(amount: f64, total: &Rebase) -> Result<BigUint, ProtocolError> {
    total.validate("vault")?;
    Ok(total.to_base(&float_to_big_uint(amount)?))
}

/// Normalize a pair to plain amounts
///
/// Outstanding loans are lent-out capital, so `lended` counts them on top
/// of the idle assets held as vault shares. Only the elastic sides of the
/// pair totals are read; a fully borrowed pair has `total_asset.elastic == 0`
/// with fractions still outstanding, which is a valid state here.
pub fn pair_to_amounts(pair: &KashiPair, vault: &Rebase) -> Result<PairAmounts, ProtocolError> {
    let borrowed = big_to_f64(&pair.total_borrow.elastic)?;
    let idle = shares_to_amount(&pair.total_asset.elastic, vault)?;

    Ok(PairAmounts {
        address: pair.address.clone(),
        lended: idle + borrowed,
        borrowed,
        interest_per_second: pair.interest_per_second as f64,
    })
}

/// Project a pair's borrow totals forward by `elapsed_secs` of interest
///
/// elastic += elastic * interest_per_second * elapsed / 1e18; base is unchanged.
pub fn accrued_total_borrow(
    total_borrow: &Rebase,
    interest_per_second: u64,
    elapsed_secs: u64,
) -> Rebase {
    let extra = &total_borrow.elastic
        * BigUint::from(interest_per_second)
        * BigUint::from(elapsed_secs)
        / BigUint::from(scale::E18);
    Rebase {
        elastic: &total_borrow.elastic + extra,
        base: total_borrow.base.clone(),
    }
}

/// Borrow totals as they would be after accruing up to `now`
pub fn accrued_total_borrow_at(
    total_borrow: &Rebase,
    accrue_info: &AccrueInfo,
    now: Timestamp,
) -> Rebase {
    accrued_total_borrow(
        total_borrow,
        accrue_info.interest_per_second,
        accrue_info.elapsed_since(now),
    )
}
