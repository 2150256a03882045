//! Wire messages exchanged between warp-route endpoints.
//!
//! Every message body is a one-byte [`MessageType`] tag followed by the
//! payload, laid out in 32-byte big-endian words:
//!
//! - transfer: recipient (32) + amount (32) + metadata (rest)
//! - rebase: exchange rate (32) + sequence number (uint32 padded to 32)

use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::{Domain, ExchangeRate, WarpError, WarpResult};

const WORD: usize = 32;

/// Version byte mixed into message ids.
pub const MESSAGE_VERSION: u8 = 3;

/// Message types carried by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Cross-chain token transfer
    Transfer = 0,
    /// Exchange-rate update from the collateral authority
    Rebase = 1,
}

impl TryFrom<u8> for MessageType {
    type Error = WarpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Transfer),
            1 => Ok(Self::Rebase),
            _ => Err(WarpError::InvalidMessageType(value)),
        }
    }
}

/// Transfer payload. `amount` is always in 18-decimal asset units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMessage {
    pub recipient: H256,
    pub amount: U256,
    pub metadata: Vec<u8>,
}

impl TokenMessage {
    pub fn new(recipient: H256, amount: U256) -> Self {
        Self {
            recipient,
            amount,
            metadata: Vec::new(),
        }
    }

    /// Attach opaque metadata forwarded with the transfer.
    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(2 * WORD + self.metadata.len());
        encoded.extend_from_slice(self.recipient.as_bytes());
        encoded.extend_from_slice(&u256_word(self.amount));
        encoded.extend_from_slice(&self.metadata);
        encoded
    }

    pub fn decode(bytes: &[u8]) -> WarpResult<Self> {
        if bytes.len() < 2 * WORD {
            return Err(WarpError::Decoding(format!(
                "transfer payload too short: {} < {}",
                bytes.len(),
                2 * WORD
            )));
        }

        Ok(Self {
            recipient: H256::from_slice(&bytes[..WORD]),
            amount: U256::from_big_endian(&bytes[WORD..2 * WORD]),
            metadata: bytes[2 * WORD..].to_vec(),
        })
    }
}

/// Rebase payload broadcast by the collateral authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseMessage {
    pub exchange_rate: ExchangeRate,
    pub sequence: u32,
}

impl RebaseMessage {
    pub fn new(exchange_rate: ExchangeRate, sequence: u32) -> Self {
        Self {
            exchange_rate,
            sequence,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(2 * WORD);
        encoded.extend_from_slice(&u256_word(self.exchange_rate.scaled()));

        // uint32 sequence (left-padded to 32 bytes)
        let mut sequence = [0u8; WORD];
        sequence[WORD - 4..].copy_from_slice(&self.sequence.to_be_bytes());
        encoded.extend_from_slice(&sequence);
        encoded
    }

    pub fn decode(bytes: &[u8]) -> WarpResult<Self> {
        if bytes.len() != 2 * WORD {
            return Err(WarpError::Decoding(format!(
                "rebase payload must be {} bytes, got {}",
                2 * WORD,
                bytes.len()
            )));
        }

        let exchange_rate = ExchangeRate::from_scaled(U256::from_big_endian(&bytes[..WORD]));

        let sequence_word = &bytes[WORD..];
        if sequence_word[..WORD - 4].iter().any(|b| *b != 0) {
            return Err(WarpError::Decoding("sequence number exceeds uint32".into()));
        }
        let mut sequence = [0u8; 4];
        sequence.copy_from_slice(&sequence_word[WORD - 4..]);

        Ok(Self {
            exchange_rate,
            sequence: u32::from_be_bytes(sequence),
        })
    }
}

/// Typed message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarpMessage {
    pub msg_type: MessageType,
    pub payload: Vec<u8>,
}

impl WarpMessage {
    /// Create a transfer message
    pub fn transfer(message: &TokenMessage) -> Self {
        Self {
            msg_type: MessageType::Transfer,
            payload: message.encode(),
        }
    }

    /// Create a rebase message
    pub fn rebase(message: &RebaseMessage) -> Self {
        Self {
            msg_type: MessageType::Rebase,
            payload: message.encode(),
        }
    }

    pub fn decode(bytes: &[u8]) -> WarpResult<Self> {
        let (tag, payload) = bytes
            .split_first()
            .ok_or_else(|| WarpError::Decoding("empty message body".into()))?;

        Ok(Self {
            msg_type: MessageType::try_from(*tag)?,
            payload: payload.to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut result = vec![self.msg_type as u8];
        result.extend_from_slice(&self.payload);
        result
    }

    /// Decode the payload as a transfer
    pub fn as_transfer(&self) -> WarpResult<TokenMessage> {
        if self.msg_type != MessageType::Transfer {
            return Err(WarpError::InvalidMessageType(self.msg_type as u8));
        }
        TokenMessage::decode(&self.payload)
    }

    /// Decode the payload as a rebase
    pub fn as_rebase(&self) -> WarpResult<RebaseMessage> {
        if self.msg_type != MessageType::Rebase {
            return Err(WarpError::InvalidMessageType(self.msg_type as u8));
        }
        RebaseMessage::decode(&self.payload)
    }
}

/// Keccak-256 id of a dispatched message, over
/// `version | nonce | origin | sender | destination | recipient | body`.
pub fn message_id(
    nonce: u32,
    origin: Domain,
    sender: H256,
    destination: Domain,
    recipient: H256,
    body: &[u8],
) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update([MESSAGE_VERSION]);
    hasher.update(nonce.to_be_bytes());
    hasher.update(origin.to_be_bytes());
    hasher.update(sender.as_bytes());
    hasher.update(destination.to_be_bytes());
    hasher.update(recipient.as_bytes());
    hasher.update(body);
    H256::from_slice(&hasher.finalize())
}

fn u256_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
