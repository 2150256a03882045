//! warp-synthetic
//!
//! The synthetic end of a rebasing warp route. Balances are held as shares;
//! the asset value of a share comes from an exchange rate cached from the
//! collateral authority's rebase messages. Rebases apply last-writer-wins by
//! sequence number, so late or duplicated updates are ignored.

pub mod cache;
pub mod ledger;
pub mod token;

pub use cache::{RateCache, RebaseOutcome};
pub use ledger::SharesLedger;
pub use token::{SyntheticConfig, SyntheticEvent, SyntheticState, SyntheticToken};
