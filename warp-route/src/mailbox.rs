//! In-memory transport shared by every domain of a route.
//!
//! Dispatched messages wait in a single pending queue until the route
//! releases them. Release order per destination is FIFO, LIFO or a seeded
//! shuffle; single messages can also be taken by id, and delivered ones
//! replayed to model at-least-once delivery.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use warp_core::{
    message_id, DispatchReceipt, Domain, OutboundMessage, Transport, TransportError, WarpError,
    H256, U256,
};

/// Order in which pending messages are released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryOrder {
    #[default]
    Fifo,
    Lifo,
    Shuffled { seed: u64 },
}

impl FromStr for DeliveryOrder {
    type Err = WarpError;

    /// Accepts `fifo`, `lifo`, `shuffled` or `shuffled:<seed>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.split_once(':') {
            None if s == "fifo" => Ok(Self::Fifo),
            None if s == "lifo" => Ok(Self::Lifo),
            None if s == "shuffled" => Ok(Self::Shuffled { seed: 0 }),
            Some(("shuffled", seed)) => seed
                .parse()
                .map(|seed| Self::Shuffled { seed })
                .map_err(|_| WarpError::Config(format!("invalid shuffle seed: {}", seed))),
            _ => Err(WarpError::Config(format!("unknown delivery order: {}", s))),
        }
    }
}

/// A dispatched message as held by the mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: H256,
    pub nonce: u32,
    pub origin: Domain,
    pub sender: H256,
    pub destination: Domain,
    pub recipient: H256,
    pub body: Vec<u8>,
    pub hook_metadata: Vec<u8>,
    pub hook_override: Option<H256>,
}

#[derive(Debug)]
pub struct Mailbox {
    domains: BTreeSet<Domain>,
    dispatch_fee: U256,
    order: DeliveryOrder,
    rng: StdRng,
    nonce: u32,
    pending: VecDeque<Envelope>,
    delivered: BTreeMap<H256, Envelope>,
}

impl Mailbox {
    pub fn new(dispatch_fee: U256, order: DeliveryOrder) -> Self {
        let seed = match order {
            DeliveryOrder::Shuffled { seed } => seed,
            _ => 0,
        };
        Self {
            domains: BTreeSet::new(),
            dispatch_fee,
            order,
            rng: StdRng::seed_from_u64(seed),
            nonce: 0,
            pending: VecDeque::new(),
            delivered: BTreeMap::new(),
        }
    }

    /// Accept dispatches addressed to `domain`.
    pub fn add_domain(&mut self, domain: Domain) {
        self.domains.insert(domain);
    }

    pub fn domains(&self) -> impl Iterator<Item = Domain> + '_ {
        self.domains.iter().copied()
    }

    pub fn dispatch_fee(&self) -> U256 {
        self.dispatch_fee
    }

    pub fn order(&self) -> DeliveryOrder {
        self.order
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_for(&self, destination: Domain) -> usize {
        self.pending
            .iter()
            .filter(|envelope| envelope.destination == destination)
            .count()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Envelope> {
        self.pending.iter()
    }

    /// Delivered messages, keyed by message id.
    pub fn delivered(&self) -> impl Iterator<Item = &Envelope> {
        self.delivered.values()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    /// Remove the next message for `destination` (or any destination)
    /// according to the delivery order.
    pub fn pop_next(&mut self, destination: Option<Domain>) -> Option<Envelope> {
        let candidates: Vec<usize> = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, envelope)| destination.map_or(true, |d| envelope.destination == d))
            .map(|(index, _)| index)
            .collect();

        let index = match self.order {
            DeliveryOrder::Fifo => candidates.first().copied(),
            DeliveryOrder::Lifo => candidates.last().copied(),
            DeliveryOrder::Shuffled { .. } if candidates.is_empty() => None,
            DeliveryOrder::Shuffled { .. } => {
                Some(candidates[self.rng.gen_range(0..candidates.len())])
            }
        }?;
        self.pending.remove(index)
    }

    /// Remove a specific pending message.
    pub fn take(&mut self, id: H256) -> Option<Envelope> {
        let index = self.pending.iter().position(|envelope| envelope.id == id)?;
        self.pending.remove(index)
    }

    /// Put a message back after a failed delivery.
    pub fn requeue(&mut self, envelope: Envelope) {
        debug!(message_id = ?envelope.id, "message requeued");
        self.pending.push_back(envelope);
    }

    pub fn mark_delivered(&mut self, envelope: Envelope) {
        self.delivered.insert(envelope.id, envelope);
    }

    /// A previously delivered message, for replay.
    pub fn delivered_envelope(&self, id: H256) -> Option<&Envelope> {
        self.delivered.get(&id)
    }
}

impl Transport for Mailbox {
    fn quote_dispatch(&self, _destination: Domain, _body: &[u8]) -> U256 {
        self.dispatch_fee
    }

    fn dispatch(
        &mut self,
        message: OutboundMessage,
        payment: U256,
    ) -> Result<DispatchReceipt, TransportError> {
        if !self.domains.contains(&message.destination) {
            return Err(TransportError::UnknownDestination(message.destination));
        }
        if payment < self.dispatch_fee {
            return Err(TransportError::InsufficientPayment {
                paid: payment,
                required: self.dispatch_fee,
            });
        }

        let nonce = self.nonce;
        self.nonce = self.nonce.wrapping_add(1);
        let id = message_id(
            nonce,
            message.origin,
            message.sender,
            message.destination,
            message.recipient,
            &message.body,
        );

        debug!(
            message_id = ?id,
            nonce,
            origin = message.origin,
            destination = message.destination,
            "message dispatched"
        );
        self.pending.push_back(Envelope {
            id,
            nonce,
            origin: message.origin,
            sender: message.sender,
            destination: message.destination,
            recipient: message.recipient,
            body: message.body,
            hook_metadata: message.hook_metadata,
            hook_override: message.hook_override,
        });

        Ok(DispatchReceipt {
            message_id: id,
            refund: payment - self.dispatch_fee,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound(destination: Domain, tag: u8) -> OutboundMessage {
        OutboundMessage {
            origin: 1,
            sender: H256::repeat_byte(1),
            destination,
            recipient: H256::repeat_byte(2),
            body: vec![tag],
            hook_metadata: Vec::new(),
            hook_override: None,
        }
    }

    fn mailbox(order: DeliveryOrder) -> Mailbox {
        let mut mailbox = Mailbox::new(U256::zero(), order);
        mailbox.add_domain(2);
        mailbox.add_domain(3);
        mailbox
    }

    fn fill(mailbox: &mut Mailbox) {
        for tag in 0..4u8 {
            mailbox.dispatch(outbound(2, tag), U256::zero()).unwrap();
        }
        mailbox.dispatch(outbound(3, 9), U256::zero()).unwrap();
    }

    fn drain(mailbox: &mut Mailbox, destination: Domain) -> Vec<u8> {
        std::iter::from_fn(|| mailbox.pop_next(Some(destination)))
            .map(|envelope| envelope.body[0])
            .collect()
    }

    #[test]
    fn test_fifo_and_lifo() {
        let mut fifo = mailbox(DeliveryOrder::Fifo);
        fill(&mut fifo);
        assert_eq!(drain(&mut fifo, 2), vec![0, 1, 2, 3]);
        assert_eq!(fifo.pending_for(3), 1);

        let mut lifo = mailbox(DeliveryOrder::Lifo);
        fill(&mut lifo);
        assert_eq!(drain(&mut lifo, 2), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let mut a = mailbox(DeliveryOrder::Shuffled { seed: 7 });
        let mut b = mailbox(DeliveryOrder::Shuffled { seed: 7 });
        fill(&mut a);
        fill(&mut b);

        let order = drain(&mut a, 2);
        assert_eq!(order, drain(&mut b, 2));

        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_dispatch_checks() {
        let mut mailbox = Mailbox::new(U256::from(5u64), DeliveryOrder::Fifo);
        mailbox.add_domain(2);

        assert_eq!(
            mailbox.dispatch(outbound(4, 0), U256::from(5u64)),
            Err(TransportError::UnknownDestination(4))
        );
        assert!(matches!(
            mailbox.dispatch(outbound(2, 0), U256::from(4u64)),
            Err(TransportError::InsufficientPayment { .. })
        ));
        let receipt = mailbox.dispatch(outbound(2, 0), U256::from(8u64)).unwrap();
        assert_eq!(receipt.refund, U256::from(3u64));
        assert_eq!(mailbox.pending_count(), 1);
    }

    #[test]
    fn test_take_requeue_and_history() {
        let mut mailbox = mailbox(DeliveryOrder::Fifo);
        let first = mailbox.dispatch(outbound(2, 0), U256::zero()).unwrap();
        let second = mailbox.dispatch(outbound(2, 1), U256::zero()).unwrap();
        assert_ne!(first.message_id, second.message_id);

        let envelope = mailbox.take(second.message_id).unwrap();
        assert_eq!(envelope.nonce, 1);
        assert!(mailbox.take(second.message_id).is_none());

        mailbox.requeue(envelope);
        let next = mailbox.pop_next(None).unwrap();
        assert_eq!(next.id, first.message_id);

        mailbox.mark_delivered(next);
        assert!(mailbox.delivered_envelope(first.message_id).is_some());
        assert_eq!(mailbox.delivered_count(), 1);
        assert_eq!(mailbox.pending_count(), 1);
    }

    #[test]
    fn test_history_is_keyed_by_message_id() {
        let mut mailbox = mailbox(DeliveryOrder::Fifo);
        let first = mailbox.dispatch(outbound(2, 0), U256::zero()).unwrap();
        let second = mailbox.dispatch(outbound(3, 1), U256::zero()).unwrap();

        let envelope = mailbox.take(first.message_id).unwrap();
        mailbox.mark_delivered(envelope.clone());
        mailbox.mark_delivered(envelope);
        assert_eq!(mailbox.delivered_count(), 1);

        let envelope = mailbox.take(second.message_id).unwrap();
        mailbox.mark_delivered(envelope);
        assert_eq!(mailbox.delivered_count(), 2);
        assert_eq!(mailbox.delivered_envelope(second.message_id).unwrap().destination, 3);
        assert!(mailbox.delivered().all(|envelope| envelope.body.len() == 1));
        assert!(mailbox.delivered_envelope(H256::repeat_byte(9)).is_none());
    }

    #[test]
    fn test_delivery_order_parsing() {
        assert_eq!("fifo".parse::<DeliveryOrder>().unwrap(), DeliveryOrder::Fifo);
        assert_eq!("LIFO".parse::<DeliveryOrder>().unwrap(), DeliveryOrder::Lifo);
        assert_eq!(
            "shuffled:42".parse::<DeliveryOrder>().unwrap(),
            DeliveryOrder::Shuffled { seed: 42 }
        );
        assert!("shuffled:x".parse::<DeliveryOrder>().is_err());
        assert!("random".parse::<DeliveryOrder>().is_err());
    }
}
