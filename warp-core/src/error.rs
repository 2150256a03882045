//! Error types shared by every warp-route crate.

use primitive_types::{H256, U256};
use thiserror::Error;

use crate::Domain;

/// Result alias for warp-route operations.
pub type WarpResult<T> = Result<T, WarpError>;

/// Failures reported by a message transport when dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("insufficient dispatch payment: paid {paid}, required {required}")]
    InsufficientPayment { paid: U256, required: U256 },

    #[error("no route to destination domain {0}")]
    UnknownDestination(Domain),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarpError {
    // Setup and wiring
    #[error("configuration error: {0}")]
    Config(String),

    #[error("zero address for {0}")]
    ZeroAddress(&'static str),

    #[error("fee too high: {bps} bps exceeds maximum of {max} bps")]
    FeeTooHigh { bps: u32, max: u32 },

    #[error("no router enrolled for domain {0}")]
    UnenrolledRouter(Domain),

    // Insufficient resources
    #[error("insufficient principal: requested {requested}, deposited {deposited}")]
    InsufficientPrincipal { requested: U256, deposited: U256 },

    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: U256, have: U256 },

    #[error("insufficient allowance: need {need}, have {have}")]
    InsufficientAllowance { need: U256, have: U256 },

    #[error("insufficient vault assets: need {need}, have {have}")]
    InsufficientVaultAssets { need: U256, have: U256 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    // Yield and fee claims
    #[error("no yield to claim")]
    NoYieldToClaim,

    #[error("fee recipient not configured")]
    ZeroFeeRecipient,

    #[error("no fees to claim")]
    NoFeesToClaim,

    // Messages
    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("unauthorized sender {sender:?} for domain {domain}")]
    UnauthorizedSender { domain: Domain, sender: H256 },

    #[error("rebase from domain {0} is not the rate authority")]
    UnauthorizedRebase(Domain),

    #[error("message {0:?} is not pending delivery")]
    UnknownMessage(H256),

    // Arithmetic
    #[error("arithmetic overflow")]
    MathOverflow,

    #[error("exchange rate is zero")]
    ZeroExchangeRate,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
