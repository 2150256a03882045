//! warp-core
//!
//! Shared building blocks for rebasing warp routes. A collateral chain holds
//! the real asset in a yield-bearing vault and publishes an exchange rate;
//! synthetic chains cache that rate and value their share balances with it.
//! This crate provides the pieces both sides agree on: the fixed-point
//! exchange rate, the typed message envelope, decimal scaling between the
//! local token and the wire, remote router enrollment and the transport
//! capability used to dispatch messages.

pub mod decimals;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod rate;
pub mod router;
pub mod transport;

pub use primitive_types::{H256, U256, U512};

pub use decimals::{convert_decimals, from_wire_amount, to_wire_amount};
pub use endpoint::TransferEndpoint;
pub use error::{TransportError, WarpError, WarpResult};
pub use message::{message_id, MessageType, RebaseMessage, TokenMessage, WarpMessage};
pub use rate::{mul_div, ExchangeRate, Rounding};
pub use router::Routers;
pub use transport::{DispatchReceipt, MessageRecipient, OutboundMessage, Transport};
#[cfg(any(test, feature = "test-utils"))]
pub use transport::RecordingTransport;

/// Identifier of a chain taking part in a route.
pub type Domain = u32;

/// Fixed-point denominator of exchange rates. A scaled rate equal to
/// `PRECISION` means one asset per share.
pub const PRECISION: u64 = 10_000_000_000;

/// Decimals of every amount carried in a transfer message.
pub const WIRE_DECIMALS: u8 = 18;

/// Basis-point denominator used by fee fractions.
pub const BPS_DENOMINATOR: u32 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// HEX HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a 32-byte address or id from hex (with or without `0x`).
pub fn hex_to_h256(hex: &str) -> WarpResult<H256> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let bytes = hex::decode(hex).map_err(|e| WarpError::Decoding(e.to_string()))?;

    if bytes.len() != 32 {
        return Err(WarpError::Decoding(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }

    Ok(H256::from_slice(&bytes))
}

/// Render a 32-byte address or id as `0x`-prefixed hex.
pub fn h256_to_hex(value: &H256) -> String {
    format!("0x{}", hex::encode(value.as_bytes()))
}
