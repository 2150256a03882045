//! Yield-bearing vault holding the route's collateral.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use warp_core::{H256, U256, WarpError, WarpResult};

/// Custody of the underlying asset on the collateral chain.
///
/// Amounts are in local token units.
pub trait Vault {
    /// Current value of everything the vault holds for the route,
    /// including accrued yield and net of losses.
    fn total_assets(&self) -> U256;

    /// Pull `assets` of the underlying token from `from` into the vault.
    fn deposit(&mut self, from: H256, assets: U256) -> WarpResult<()>;

    /// Release `assets` of the underlying token to `receiver`.
    fn withdraw(&mut self, assets: U256, receiver: H256) -> WarpResult<()>;
}

/// In-memory vault with an underlying-token balance sheet.
///
/// Yield and losses are injected by hand with [`MemoryVault::accrue_yield`]
/// and [`MemoryVault::realize_loss`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryVault {
    assets: U256,
    balances: BTreeMap<H256, U256>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of the underlying token to a wallet.
    pub fn mint_underlying(&mut self, account: H256, amount: U256) -> WarpResult<()> {
        let balance = self.balance_of(account);
        let updated = balance.checked_add(amount).ok_or(WarpError::MathOverflow)?;
        self.balances.insert(account, updated);
        Ok(())
    }

    /// Underlying-token wallet balance.
    pub fn balance_of(&self, account: H256) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn accrue_yield(&mut self, amount: U256) -> WarpResult<()> {
        self.assets = self.assets.checked_add(amount).ok_or(WarpError::MathOverflow)?;
        debug!(%amount, total = %self.assets, "vault yield accrued");
        Ok(())
    }

    pub fn realize_loss(&mut self, amount: U256) -> WarpResult<()> {
        if amount > self.assets {
            return Err(WarpError::InsufficientVaultAssets {
                need: amount,
                have: self.assets,
            });
        }
        self.assets -= amount;
        debug!(%amount, total = %self.assets, "vault loss realised");
        Ok(())
    }
}

impl Vault for MemoryVault {
    fn total_assets(&self) -> U256 {
        self.assets
    }

    fn deposit(&mut self, from: H256, assets: U256) -> WarpResult<()> {
        let balance = self.balance_of(from);
        if balance < assets {
            return Err(WarpError::InsufficientBalance {
                need: assets,
                have: balance,
            });
        }
        let total = self.assets.checked_add(assets).ok_or(WarpError::MathOverflow)?;

        self.balances.insert(from, balance - assets);
        self.assets = total;
        Ok(())
    }

    fn withdraw(&mut self, assets: U256, receiver: H256) -> WarpResult<()> {
        if assets > self.assets {
            return Err(WarpError::InsufficientVaultAssets {
                need: assets,
                have: self.assets,
            });
        }
        let credited = self
            .balance_of(receiver)
            .checked_add(assets)
            .ok_or(WarpError::MathOverflow)?;

        self.assets -= assets;
        self.balances.insert(receiver, credited);
        Ok(())
    }
}
