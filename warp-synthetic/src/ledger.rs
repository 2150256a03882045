//! Share balances and asset-denominated allowances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warp_core::{WarpError, WarpResult, H256, U256};

/// Fungible-token ledger over shares.
///
/// Only mint and burn change `total_shares`. Allowances are stored in asset
/// units, the unit callers approve in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharesLedger {
    balances: BTreeMap<H256, U256>,
    allowances: BTreeMap<H256, BTreeMap<H256, U256>>,
    total_shares: U256,
}

impl SharesLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_shares(&self) -> U256 {
        self.total_shares
    }

    pub fn share_balance_of(&self, account: H256) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    /// Number of accounts with a non-zero share balance.
    pub fn holders(&self) -> usize {
        self.balances.len()
    }

    pub fn mint(&mut self, to: H256, shares: U256) -> WarpResult<()> {
        let total = self
            .total_shares
            .checked_add(shares)
            .ok_or(WarpError::MathOverflow)?;
        // balance <= total, so this cannot overflow once the total fits
        let balance = self.share_balance_of(to) + shares;

        self.total_shares = total;
        self.set_balance(to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: H256, shares: U256) -> WarpResult<()> {
        let balance = self.ensure_balance(from, shares)?;
        self.total_shares -= shares;
        self.set_balance(from, balance - shares);
        Ok(())
    }

    pub fn move_shares(&mut self, from: H256, to: H256, shares: U256) -> WarpResult<()> {
        let balance = self.ensure_balance(from, shares)?;
        if from == to {
            return Ok(());
        }
        self.set_balance(from, balance - shares);
        let credited = self.share_balance_of(to) + shares;
        self.set_balance(to, credited);
        Ok(())
    }

    /// Fail with `InsufficientBalance` unless `account` holds `shares`.
    pub fn ensure_balance(&self, account: H256, shares: U256) -> WarpResult<U256> {
        let balance = self.share_balance_of(account);
        if balance < shares {
            return Err(WarpError::InsufficientBalance {
                need: shares,
                have: balance,
            });
        }
        Ok(balance)
    }

    pub fn allowance(&self, owner: H256, spender: H256) -> U256 {
        self.allowances
            .get(&owner)
            .and_then(|spenders| spenders.get(&spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn approve(&mut self, owner: H256, spender: H256, assets: U256) {
        if assets.is_zero() {
            if let Some(spenders) = self.allowances.get_mut(&owner) {
                spenders.remove(&spender);
                if spenders.is_empty() {
                    self.allowances.remove(&owner);
                }
            }
            return;
        }
        self.allowances.entry(owner).or_default().insert(spender, assets);
    }

    /// Fail with `InsufficientAllowance` unless `spender` may move `assets`.
    pub fn ensure_allowance(&self, owner: H256, spender: H256, assets: U256) -> WarpResult<U256> {
        let allowed = self.allowance(owner, spender);
        if allowed < assets {
            return Err(WarpError::InsufficientAllowance {
                need: assets,
                have: allowed,
            });
        }
        Ok(allowed)
    }

    /// Reduce an allowance. `U256::MAX` is treated as unlimited.
    pub fn spend_allowance(&mut self, owner: H256, spender: H256, assets: U256) -> WarpResult<()> {
        let allowed = self.ensure_allowance(owner, spender, assets)?;
        if allowed != U256::MAX {
            self.approve(owner, spender, allowed - assets);
        }
        Ok(())
    }

    fn set_balance(&mut self, account: H256, shares: U256) {
        if shares.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, shares);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> H256 {
        H256::repeat_byte(0xa1)
    }

    fn bob() -> H256 {
        H256::repeat_byte(0xb0)
    }

    #[test]
    fn test_mint_burn_move() {
        let mut ledger = SharesLedger::new();
        ledger.mint(alice(), U256::from(100u64)).unwrap();
        ledger.move_shares(alice(), bob(), U256::from(30u64)).unwrap();
        ledger.burn(bob(), U256::from(10u64)).unwrap();

        assert_eq!(ledger.share_balance_of(alice()), U256::from(70u64));
        assert_eq!(ledger.share_balance_of(bob()), U256::from(20u64));
        assert_eq!(ledger.total_shares(), U256::from(90u64));
    }

    #[test]
    fn test_insufficient_balance() {
        let mut ledger = SharesLedger::new();
        ledger.mint(alice(), U256::from(5u64)).unwrap();
        assert_eq!(
            ledger.burn(alice(), U256::from(6u64)),
            Err(WarpError::InsufficientBalance {
                need: U256::from(6u64),
                have: U256::from(5u64)
            })
        );
        assert!(ledger.move_shares(bob(), alice(), U256::one()).is_err());
        assert_eq!(ledger.total_shares(), U256::from(5u64));
    }

    #[test]
    fn test_self_move_keeps_balance() {
        let mut ledger = SharesLedger::new();
        ledger.mint(alice(), U256::from(5u64)).unwrap();
        ledger.move_shares(alice(), alice(), U256::from(5u64)).unwrap();
        assert_eq!(ledger.share_balance_of(alice()), U256::from(5u64));
    }

    #[test]
    fn test_zero_balances_pruned() {
        let mut ledger = SharesLedger::new();
        ledger.mint(alice(), U256::from(5u64)).unwrap();
        ledger.move_shares(alice(), bob(), U256::from(5u64)).unwrap();
        assert_eq!(ledger.holders(), 1);
    }

    #[test]
    fn test_allowances() {
        let mut ledger = SharesLedger::new();
        ledger.approve(alice(), bob(), U256::from(50u64));
        ledger.spend_allowance(alice(), bob(), U256::from(20u64)).unwrap();
        assert_eq!(ledger.allowance(alice(), bob()), U256::from(30u64));

        assert_eq!(
            ledger.spend_allowance(alice(), bob(), U256::from(31u64)),
            Err(WarpError::InsufficientAllowance {
                need: U256::from(31u64),
                have: U256::from(30u64)
            })
        );

        ledger.approve(alice(), bob(), U256::MAX);
        ledger.spend_allowance(alice(), bob(), U256::from(1_000u64)).unwrap();
        assert_eq!(ledger.allowance(alice(), bob()), U256::MAX);

        ledger.approve(alice(), bob(), U256::zero());
        assert_eq!(ledger.allowance(alice(), bob()), U256::zero());
    }
}
