//! warp-collateral
//!
//! The collateral end of a rebasing warp route. It custodies the underlying
//! asset in a yield-bearing vault, tracks the principal deposited against
//! it, splits realised yield between holders and the vault owner, and
//! publishes sequence-numbered exchange-rate updates to synthetic domains.

pub mod authority;
pub mod fees;
pub mod vault;

pub use authority::{
    CollateralAuthority, CollateralConfig, CollateralEvent, CollateralState, RebaseReceipt,
    YieldDelta,
};
pub use fees::{FeeSplit, YieldFee, MAX_YIELD_FEE_BPS};
pub use vault::{MemoryVault, Vault};
