//! Decimal scaling between a local token and the 18-decimal wire format.

use std::cmp::Ordering;

use primitive_types::U256;

use crate::{WarpError, WarpResult, WIRE_DECIMALS};

/// Largest power of ten that fits in a U256.
const MAX_EXP10: u8 = 77;

/// Rescale `amount` from `from` decimals to `to` decimals.
///
/// Narrowing truncates toward zero. Widening fails with `MathOverflow` when
/// the result does not fit.
pub fn convert_decimals(amount: U256, from: u8, to: u8) -> WarpResult<U256> {
    match from.cmp(&to) {
        Ordering::Equal => Ok(amount),
        Ordering::Greater => {
            let diff = from - to;
            if diff > MAX_EXP10 {
                return Ok(U256::zero());
            }
            Ok(amount / U256::exp10(diff as usize))
        }
        Ordering::Less => {
            let diff = to - from;
            if diff > MAX_EXP10 {
                return if amount.is_zero() {
                    Ok(U256::zero())
                } else {
                    Err(WarpError::MathOverflow)
                };
            }
            amount
                .checked_mul(U256::exp10(diff as usize))
                .ok_or(WarpError::MathOverflow)
        }
    }
}

/// Local token units to wire units.
pub fn to_wire_amount(amount: U256, local_decimals: u8) -> WarpResult<U256> {
    convert_decimals(amount, local_decimals, WIRE_DECIMALS)
}

/// Wire units to local token units.
pub fn from_wire_amount(amount: U256, local_decimals: u8) -> WarpResult<U256> {
    convert_decimals(amount, WIRE_DECIMALS, local_decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_decimals() {
        let amount = U256::from(123_456u64);
        assert_eq!(convert_decimals(amount, 18, 18).unwrap(), amount);
    }

    #[test]
    fn test_widening_and_narrowing() {
        // 1.5 USDC (6 decimals) on the wire
        let local = U256::from(1_500_000u64);
        let wire = to_wire_amount(local, 6).unwrap();
        assert_eq!(wire, U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(from_wire_amount(wire, 6).unwrap(), local);
    }

    #[test]
    fn test_narrowing_truncates() {
        let wire = U256::from(1_999_999_999_999u64);
        assert_eq!(from_wire_amount(wire, 6).unwrap(), U256::from(1u64));
        assert_eq!(from_wire_amount(U256::from(999_999_999_999u64), 6).unwrap(), U256::zero());
    }

    #[test]
    fn test_widening_overflow() {
        assert_eq!(to_wire_amount(U256::MAX, 0), Err(WarpError::MathOverflow));
        assert_eq!(convert_decimals(U256::one(), 0, 200), Err(WarpError::MathOverflow));
        assert_eq!(convert_decimals(U256::MAX, 200, 0).unwrap(), U256::zero());
    }
}
