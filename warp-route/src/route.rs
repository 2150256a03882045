//! A complete route: collateral authority, synthetic tokens and mailbox.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use warp_collateral::{CollateralAuthority, RebaseReceipt, Vault};
use warp_core::{
    Domain, ExchangeRate, MessageRecipient, TransportError, WarpError, WarpResult, H256, U256,
};
use warp_synthetic::SyntheticToken;

use crate::config::WarpRouteConfig;
use crate::mailbox::{Envelope, Mailbox};

/// Outcome of delivering a batch of messages.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: Vec<H256>,
    /// Messages whose handler failed; they stay pending.
    pub failed: Vec<(H256, WarpError)>,
}

impl DeliveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct WarpRoute<V> {
    collateral: CollateralAuthority<V>,
    synthetics: BTreeMap<Domain, SyntheticToken>,
    mailbox: Mailbox,
}

impl<V: Vault> WarpRoute<V> {
    /// Build every endpoint and enroll each one with all the others.
    pub fn from_config(config: &WarpRouteConfig, vault: V) -> WarpResult<Self> {
        config.validate()?;

        let mut collateral =
            CollateralAuthority::new(config.collateral.to_collateral_config()?, vault)?;
        let mut mailbox = Mailbox::new(
            U256::from(config.transport.dispatch_fee),
            config.transport.delivery_order,
        );
        mailbox.add_domain(collateral.domain());

        let mut synthetics = BTreeMap::new();
        for synthetic in &config.synthetics {
            let token = SyntheticToken::new(synthetic.to_synthetic_config(collateral.domain())?)?;
            mailbox.add_domain(token.domain());
            synthetics.insert(token.domain(), token);
        }

        let mut routers = vec![(collateral.domain(), collateral.address())];
        routers.extend(synthetics.values().map(|token| (token.domain(), token.address())));

        for &(domain, router) in &routers {
            if domain != collateral.domain() {
                collateral.enroll_remote_router(domain, router)?;
            }
        }
        for token in synthetics.values_mut() {
            for &(domain, router) in &routers {
                if domain != token.domain() {
                    token.enroll_remote_router(domain, router)?;
                }
            }
        }

        info!(
            collateral = collateral.domain(),
            synthetics = synthetics.len(),
            order = ?mailbox.order(),
            "warp route assembled"
        );
        Ok(Self {
            collateral,
            synthetics,
            mailbox,
        })
    }

    pub fn collateral(&self) -> &CollateralAuthority<V> {
        &self.collateral
    }

    pub fn collateral_mut(&mut self) -> &mut CollateralAuthority<V> {
        &mut self.collateral
    }

    pub fn synthetic(&self, domain: Domain) -> Option<&SyntheticToken> {
        self.synthetics.get(&domain)
    }

    pub fn synthetic_mut(&mut self, domain: Domain) -> Option<&mut SyntheticToken> {
        self.synthetics.get_mut(&domain)
    }

    pub fn synthetic_domains(&self) -> Vec<Domain> {
        self.synthetics.keys().copied().collect()
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn mailbox_mut(&mut self) -> &mut Mailbox {
        &mut self.mailbox
    }

    /// Exchange rate per domain: the last rate the authority published and
    /// each synthetic's cached rate.
    pub fn rates(&self) -> BTreeMap<Domain, ExchangeRate> {
        let mut rates = BTreeMap::new();
        rates.insert(self.collateral.domain(), self.collateral.exchange_rate());
        for (domain, token) in &self.synthetics {
            rates.insert(*domain, token.exchange_rate());
        }
        rates
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Dispatch helpers (pay exactly the quoted fee)
    // ───────────────────────────────────────────────────────────────────────────

    /// Lock `amount` on the collateral chain for `recipient` on `destination`.
    pub fn deposit(
        &mut self,
        from: H256,
        destination: Domain,
        recipient: H256,
        amount: U256,
    ) -> WarpResult<H256> {
        let fee = self.collateral.quote_transfer_remote(&self.mailbox, destination)?;
        let receipt =
            self.collateral
                .transfer_remote(&mut self.mailbox, from, destination, recipient, amount, fee)?;
        Ok(receipt.message_id)
    }

    /// Send `assets` from a synthetic domain to any other domain of the route.
    pub fn transfer_remote(
        &mut self,
        origin: Domain,
        from: H256,
        destination: Domain,
        recipient: H256,
        assets: U256,
    ) -> WarpResult<H256> {
        let token = self
            .synthetics
            .get_mut(&origin)
            .ok_or(WarpError::UnenrolledRouter(origin))?;
        let fee = token.quote_transfer_remote(&self.mailbox, destination)?;
        let receipt =
            token.transfer_remote(&mut self.mailbox, from, destination, recipient, assets, fee)?;
        Ok(receipt.message_id)
    }

    pub fn rebase(&mut self, destination: Domain) -> WarpResult<RebaseReceipt> {
        let fee = self.collateral.quote_rebase(&self.mailbox, destination)?;
        self.collateral
            .rebase(&mut self.mailbox, destination, Vec::new(), None, fee)
    }

    /// Rebase every synthetic domain, one message each.
    pub fn rebase_all(&mut self) -> WarpResult<Vec<RebaseReceipt>> {
        self.synthetic_domains()
            .into_iter()
            .map(|domain| self.rebase(domain))
            .collect()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Delivery
    // ───────────────────────────────────────────────────────────────────────────

    /// Deliver one pending message by id. On failure it stays pending.
    pub fn deliver(&mut self, id: H256) -> WarpResult<Envelope> {
        let envelope = self.mailbox.take(id).ok_or(WarpError::UnknownMessage(id))?;
        self.process(envelope)
    }

    /// Deliver the next message for `destination` in mailbox order.
    pub fn deliver_next(&mut self, destination: Domain) -> Option<WarpResult<Envelope>> {
        let envelope = self.mailbox.pop_next(Some(destination))?;
        Some(self.process(envelope))
    }

    /// Attempt each message currently pending for `destination` once.
    /// Failures go back to the mailbox after the pass.
    pub fn deliver_pending(&mut self, destination: Domain) -> DeliveryReport {
        let count = self.mailbox.pending_for(destination);
        self.run_pass(Some(destination), count)
    }

    /// Deliver until the mailbox is empty or a full pass makes no progress.
    /// `failed` lists the messages still failing after the last pass.
    pub fn relay_all(&mut self) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        loop {
            let pending = self.mailbox.pending_count();
            if pending == 0 {
                break;
            }

            let pass = self.run_pass(None, pending);
            let progressed = !pass.delivered.is_empty();
            report.delivered.extend(pass.delivered);
            report.failed = pass.failed;
            if !progressed {
                break;
            }
        }
        report
    }

    /// Replay an already delivered message.
    pub fn redeliver(&mut self, id: H256) -> WarpResult<()> {
        let envelope = self
            .mailbox
            .delivered_envelope(id)
            .cloned()
            .ok_or(WarpError::UnknownMessage(id))?;
        debug!(message_id = ?id, "replaying delivered message");
        self.handle_envelope(&envelope)
    }

    /// Attempt up to `count` messages. A failed envelope is held aside so
    /// the rest of the pass cannot pick it again, then requeued.
    fn run_pass(&mut self, destination: Option<Domain>, count: usize) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut held = Vec::new();
        for _ in 0..count {
            let Some(envelope) = self.mailbox.pop_next(destination) else {
                break;
            };
            let id = envelope.id;
            match self.try_deliver(envelope) {
                Ok(_) => report.delivered.push(id),
                Err((envelope, err)) => {
                    report.failed.push((id, err));
                    held.push(envelope);
                }
            }
        }
        for envelope in held {
            self.mailbox.requeue(envelope);
        }
        report
    }

    fn process(&mut self, envelope: Envelope) -> WarpResult<Envelope> {
        self.try_deliver(envelope).map_err(|(envelope, err)| {
            self.mailbox.requeue(envelope);
            err
        })
    }

    /// Hand an envelope to its endpoint. On failure the envelope is given
    /// back to the caller.
    fn try_deliver(&mut self, envelope: Envelope) -> Result<Envelope, (Envelope, WarpError)> {
        match self.handle_envelope(&envelope) {
            Ok(()) => {
                debug!(
                    message_id = ?envelope.id,
                    origin = envelope.origin,
                    destination = envelope.destination,
                    "message delivered"
                );
                self.mailbox.mark_delivered(envelope.clone());
                Ok(envelope)
            }
            Err(err) => {
                warn!(message_id = ?envelope.id, error = %err, "delivery failed");
                Err((envelope, err))
            }
        }
    }

    fn handle_envelope(&mut self, envelope: &Envelope) -> WarpResult<()> {
        let (address, endpoint): (H256, &mut dyn MessageRecipient) =
            if envelope.destination == self.collateral.domain() {
                (self.collateral.address(), &mut self.collateral as &mut dyn MessageRecipient)
            } else {
                let token = self
                    .synthetics
                    .get_mut(&envelope.destination)
                    .ok_or(TransportError::UnknownDestination(envelope.destination))?;
                (token.address(), token as &mut dyn MessageRecipient)
            };

        if address != envelope.recipient {
            return Err(TransportError::UnknownDestination(envelope.destination).into());
        }
        endpoint.handle(envelope.origin, envelope.sender, &envelope.body)
    }
}
