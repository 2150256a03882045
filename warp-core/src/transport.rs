//! Message transport capability.
//!
//! Endpoints never deliver messages themselves. They hand an
//! [`OutboundMessage`] to a [`Transport`] and later receive bodies through
//! [`MessageRecipient::handle`], in whatever order the transport chooses.

use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};

use crate::{Domain, TransportError, WarpResult};

/// A message handed to the transport for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub origin: Domain,
    pub sender: H256,
    pub destination: Domain,
    pub recipient: H256,
    pub body: Vec<u8>,
    /// Opaque metadata for the transport's post-dispatch hook.
    pub hook_metadata: Vec<u8>,
    /// Hook to use instead of the transport default.
    pub hook_override: Option<H256>,
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub message_id: H256,
    /// Excess payment returned to the caller.
    pub refund: U256,
}

/// Asynchronous message delivery between domains.
pub trait Transport {
    /// Fee required to dispatch `body` to `destination`.
    fn quote_dispatch(&self, destination: Domain, body: &[u8]) -> U256;

    /// Enqueue a message. `payment` must cover the quoted fee; any excess
    /// is reported back as a refund.
    fn dispatch(
        &mut self,
        message: OutboundMessage,
        payment: U256,
    ) -> Result<DispatchReceipt, TransportError>;
}

/// Receiving side of a transport.
pub trait MessageRecipient {
    fn handle(&mut self, origin: Domain, sender: H256, body: &[u8]) -> WarpResult<()>;
}

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingTransport;

/// Test double, built for tests or with the `test-utils` feature.
#[cfg(any(test, feature = "test-utils"))]
mod recording {
    use primitive_types::{H256, U256};
    use tracing::debug;

    use super::{DispatchReceipt, OutboundMessage, Transport};
    use crate::{message_id, Domain, TransportError};

    /// Transport that records dispatched messages without delivering them.
    ///
    /// Useful when exercising a single endpoint: tests inspect `sent` and feed
    /// bodies to the peer by hand.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        pub fee: U256,
        pub sent: Vec<(H256, OutboundMessage)>,
        /// When set, every dispatch fails with `UnknownDestination`.
        pub fail_dispatch: bool,
    }

    impl RecordingTransport {
        pub fn with_fee(fee: U256) -> Self {
            Self {
                fee,
                ..Self::default()
            }
        }

        /// Body of the most recently dispatched message.
        pub fn last_body(&self) -> Option<&[u8]> {
            self.sent.last().map(|(_, message)| message.body.as_slice())
        }
    }

    impl Transport for RecordingTransport {
        fn quote_dispatch(&self, _destination: Domain, _body: &[u8]) -> U256 {
            self.fee
        }

        fn dispatch(
            &mut self,
            message: OutboundMessage,
            payment: U256,
        ) -> Result<DispatchReceipt, TransportError> {
            if self.fail_dispatch {
                return Err(TransportError::UnknownDestination(message.destination));
            }
            if payment < self.fee {
                return Err(TransportError::InsufficientPayment {
                    paid: payment,
                    required: self.fee,
                });
            }

            let nonce = self.sent.len() as u32;
            let id = message_id(
                nonce,
                message.origin,
                message.sender,
                message.destination,
                message.recipient,
                &message.body,
            );
            debug!(message_id = ?id, destination = message.destination, "recorded dispatch");
            self.sent.push((id, message));

            Ok(DispatchReceipt {
                message_id: id,
                refund: payment - self.fee,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound(destination: Domain) -> OutboundMessage {
        OutboundMessage {
            origin: 1,
            sender: H256::repeat_byte(1),
            destination,
            recipient: H256::repeat_byte(2),
            body: vec![0, 1, 2],
            hook_metadata: Vec::new(),
            hook_override: None,
        }
    }

    #[test]
    fn test_recording_transport_refund() {
        let mut transport = RecordingTransport::with_fee(U256::from(10u64));
        let receipt = transport.dispatch(outbound(2), U256::from(25u64)).unwrap();
        assert_eq!(receipt.refund, U256::from(15u64));
        assert_eq!(transport.last_body(), Some(&[0u8, 1, 2][..]));
    }

    #[test]
    fn test_recording_transport_underpayment() {
        let mut transport = RecordingTransport::with_fee(U256::from(10u64));
        let err = transport.dispatch(outbound(2), U256::from(9u64)).unwrap_err();
        assert_eq!(
            err,
            TransportError::InsufficientPayment {
                paid: U256::from(9u64),
                required: U256::from(10u64)
            }
        );
        assert!(transport.sent.is_empty());
    }
}
