//! Vault-owner share of realised yield.

use serde::{Deserialize, Serialize};
use warp_core::{mul_div, Rounding, WarpError, WarpResult, BPS_DENOMINATOR, U256};

/// Upper bound for the yield fee (100%).
pub const MAX_YIELD_FEE_BPS: u32 = BPS_DENOMINATOR;

/// Fraction of realised yield kept as a claimable fee, in basis points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YieldFee {
    bps: u32,
}

/// Yield divided between the fee recipient and holders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub fee: U256,
    pub holders: U256,
}

impl YieldFee {
    pub fn new(bps: u32) -> WarpResult<Self> {
        if bps > MAX_YIELD_FEE_BPS {
            return Err(WarpError::FeeTooHigh {
                bps,
                max: MAX_YIELD_FEE_BPS,
            });
        }
        Ok(Self { bps })
    }

    pub fn bps(&self) -> u32 {
        self.bps
    }

    /// Split `yield_amount`; the fee rounds down so holders keep any dust.
    pub fn split(&self, yield_amount: U256) -> WarpResult<FeeSplit> {
        let fee = mul_div(
            yield_amount,
            U256::from(self.bps),
            U256::from(BPS_DENOMINATOR),
            Rounding::Down,
        )?;
        Ok(FeeSplit {
            fee,
            holders: yield_amount - fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ten_percent_split() {
        let fee = YieldFee::new(1_000).unwrap();
        let split = fee.split(U256::from(5u64) * U256::exp10(18)).unwrap();
        assert_eq!(split.fee, U256::from(5u64) * U256::exp10(17));
        assert_eq!(split.holders, U256::from(45u64) * U256::exp10(17));
    }

    #[test]
    fn test_fee_bounds() {
        assert!(YieldFee::new(MAX_YIELD_FEE_BPS).is_ok());
        assert_eq!(
            YieldFee::new(10_001),
            Err(WarpError::FeeTooHigh {
                bps: 10_001,
                max: 10_000
            })
        );
        let zero = YieldFee::default().split(U256::from(99u64)).unwrap();
        assert_eq!(zero.fee, U256::zero());
        assert_eq!(zero.holders, U256::from(99u64));
    }

    #[test]
    fn test_dust_goes_to_holders() {
        let split = YieldFee::new(3_333).unwrap().split(U256::from(1u64)).unwrap();
        assert_eq!(split.fee, U256::zero());
        assert_eq!(split.holders, U256::one());
    }

    proptest! {
        #[test]
        fn test_split_conserves_yield(amount in any::<u128>(), bps in 0u32..=10_000) {
            let split = YieldFee::new(bps).unwrap().split(U256::from(amount)).unwrap();
            prop_assert_eq!(split.fee + split.holders, U256::from(amount));
            prop_assert!(split.fee <= U256::from(amount));
        }
    }
}
