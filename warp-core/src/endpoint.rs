//! Common surface of the two ends of a route.

use primitive_types::{H256, U256};

use crate::{Domain, ExchangeRate, TokenMessage, WarpResult};

/// One side of a warp route.
///
/// The collateral side custodies the asset and speaks local token units;
/// the synthetic side tracks shares. Both put asset amounts on the wire and
/// value inbound amounts with their own current rate at processing time.
pub trait TransferEndpoint {
    fn local_domain(&self) -> Domain;

    /// Rate this endpoint applies right now.
    fn current_rate(&self) -> ExchangeRate;

    /// Build the wire message for sending `amount` (in this endpoint's
    /// external unit) to `recipient`.
    fn encode_outbound(&self, recipient: H256, amount: U256) -> WarpResult<TokenMessage>;

    /// Amount credited locally for an inbound transfer: local token units
    /// on the collateral side, shares on the synthetic side.
    fn decode_inbound(&self, message: &TokenMessage) -> WarpResult<U256>;
}
