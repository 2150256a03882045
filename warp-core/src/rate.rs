//! Fixed-point exchange rate between assets and shares.
//!
//! A rate is stored scaled by [`PRECISION`]: `assets = shares * rate / PRECISION`.
//! Products are computed in 512 bits so conversions never overflow before
//! the division.

use std::fmt;

use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};

use crate::{WarpError, WarpResult, PRECISION};

/// Rounding direction for [`mul_div`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// Compute `x * y / denominator` without intermediate overflow.
///
/// Fails with `MathOverflow` if the denominator is zero or the quotient
/// does not fit in 256 bits.
pub fn mul_div(x: U256, y: U256, denominator: U256, rounding: Rounding) -> WarpResult<U256> {
    if denominator.is_zero() {
        return Err(WarpError::MathOverflow);
    }

    let (quotient, remainder) = x.full_mul(y).div_mod(U512::from(denominator));
    let quotient = match rounding {
        Rounding::Up if !remainder.is_zero() => quotient
            .checked_add(U512::one())
            .ok_or(WarpError::MathOverflow)?,
        _ => quotient,
    };

    U256::try_from(quotient).map_err(|_| WarpError::MathOverflow)
}

/// Assets per share, scaled by [`PRECISION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRate(U256);

impl ExchangeRate {
    /// One asset per share.
    pub fn identity() -> Self {
        Self(U256::from(PRECISION))
    }

    /// Wrap an already scaled value.
    pub fn from_scaled(scaled: U256) -> Self {
        Self(scaled)
    }

    /// Rate implied by `assets` backing `shares`. Identity when there are
    /// no shares yet.
    pub fn from_ratio(assets: U256, shares: U256) -> WarpResult<Self> {
        if shares.is_zero() {
            return Ok(Self::identity());
        }
        mul_div(assets, U256::from(PRECISION), shares, Rounding::Down).map(Self)
    }

    pub fn scaled(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Shares worth `assets` at this rate, rounded down.
    pub fn assets_to_shares(&self, assets: U256) -> WarpResult<U256> {
        self.to_shares(assets, Rounding::Down)
    }

    /// Shares worth `assets` at this rate, rounded up. Used when debiting
    /// shares so that a burn never releases more value than it removes.
    pub fn assets_to_shares_up(&self, assets: U256) -> WarpResult<U256> {
        self.to_shares(assets, Rounding::Up)
    }

    /// Assets represented by `shares` at this rate, rounded down.
    pub fn shares_to_assets(&self, shares: U256) -> WarpResult<U256> {
        mul_div(shares, self.0, U256::from(PRECISION), Rounding::Down)
    }

    fn to_shares(&self, assets: U256, rounding: Rounding) -> WarpResult<U256> {
        if self.0.is_zero() {
            return Err(WarpError::ZeroExchangeRate);
        }
        mul_div(assets, U256::from(PRECISION), self.0, rounding)
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = U256::from(PRECISION);
        let whole = self.0 / precision;
        let fraction = (self.0 % precision).low_u64();
        write!(f, "{}.{:010}", whole, fraction)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    #[test]
    fn test_identity_conversions() {
        let rate = ExchangeRate::identity();
        assert!(rate.is_identity());
        assert_eq!(rate.assets_to_shares(e18(7)).unwrap(), e18(7));
        assert_eq!(rate.shares_to_assets(e18(7)).unwrap(), e18(7));
        assert_eq!(rate.to_string(), "1.0000000000");
    }

    #[test]
    fn test_from_ratio() {
        let rate = ExchangeRate::from_ratio(U256::from(1045u64), U256::from(1000u64)).unwrap();
        assert_eq!(rate.scaled(), U256::from(10_450_000_000u64));
        assert_eq!(rate.to_string(), "1.0450000000");

        let empty = ExchangeRate::from_ratio(e18(5), U256::zero()).unwrap();
        assert!(empty.is_identity());
    }

    #[test]
    fn test_rounding_directions() {
        // 3 assets per 2 shares.
        let rate = ExchangeRate::from_scaled(U256::from(15_000_000_000u64));
        assert_eq!(rate.assets_to_shares(U256::from(10u64)).unwrap(), U256::from(6u64));
        assert_eq!(rate.assets_to_shares_up(U256::from(10u64)).unwrap(), U256::from(7u64));
        assert_eq!(rate.shares_to_assets(U256::from(7u64)).unwrap(), U256::from(10u64));
        assert_eq!(rate.assets_to_shares_up(U256::from(9u64)).unwrap(), U256::from(6u64));
    }

    #[test]
    fn test_zero_rate() {
        let rate = ExchangeRate::from_scaled(U256::zero());
        assert_eq!(rate.assets_to_shares(U256::one()), Err(WarpError::ZeroExchangeRate));
        assert_eq!(rate.shares_to_assets(e18(1)).unwrap(), U256::zero());
    }

    #[test]
    fn test_mul_div_wide_product() {
        let result = mul_div(U256::MAX, U256::from(2u64), U256::from(4u64), Rounding::Down).unwrap();
        assert_eq!(result, U256::MAX / 2);
        assert_eq!(
            mul_div(U256::MAX, U256::from(2u64), U256::one(), Rounding::Down),
            Err(WarpError::MathOverflow)
        );
        assert_eq!(
            mul_div(U256::one(), U256::one(), U256::zero(), Rounding::Down),
            Err(WarpError::MathOverflow)
        );
    }

    #[test]
    fn test_serde_transparent() {
        let rate = ExchangeRate::identity();
        let json = serde_json::to_string(&rate).unwrap();
        let back: ExchangeRate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rate);
    }

    proptest! {
        #[test]
        fn test_round_trip_never_gains(
            assets in 0u128..=u128::MAX / 2,
            scaled in PRECISION..PRECISION * 1_000,
        ) {
            let rate = ExchangeRate::from_scaled(U256::from(scaled));
            let assets = U256::from(assets);
            let shares = rate.assets_to_shares(assets).unwrap();
            prop_assert!(rate.shares_to_assets(shares).unwrap() <= assets);
        }

        #[test]
        fn test_round_up_covers_amount(
            assets in 1u128..=u128::MAX / 2,
            scaled in 1u64..PRECISION * 1_000,
        ) {
            let rate = ExchangeRate::from_scaled(U256::from(scaled));
            let assets = U256::from(assets);
            let down = rate.assets_to_shares(assets).unwrap();
            let up = rate.assets_to_shares_up(assets).unwrap();
            prop_assert!(up >= down);
            prop_assert!(up - down <= U256::one());
            prop_assert!(rate.shares_to_assets(up).unwrap() >= assets);
        }
    }
}
