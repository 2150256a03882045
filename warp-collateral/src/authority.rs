//! Collateral exchange-rate authority.
//!
//! The authority owns the vault position for a route. Deposits arriving via
//! [`CollateralAuthority::transfer_remote`] increase principal; inbound
//! transfers release principal back to recipients. On each
//! [`CollateralAuthority::rebase`] the yield realised since the last rebase
//! is split into a vault-owner fee and a holder portion. The holder portion
//! (or the full loss, in a drawdown) is capitalised into principal, and the
//! resulting assets-per-share rate is sent to one destination domain with
//! the next sequence number.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use warp_core::{
    from_wire_amount, to_wire_amount, DispatchReceipt, Domain, ExchangeRate, MessageRecipient,
    MessageType, OutboundMessage, RebaseMessage, Routers, TokenMessage, TransferEndpoint,
    Transport, TransportError, WarpError, WarpMessage, WarpResult, H256, U256, WIRE_DECIMALS,
};

use crate::fees::YieldFee;
use crate::vault::Vault;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Static wiring of a collateral endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralConfig {
    /// Local domain id.
    pub domain: Domain,
    /// Address of this endpoint as seen by remote routers.
    pub address: H256,
    /// Decimals of the underlying token.
    pub decimals: u8,
    /// Vault-owner share of realised yield, in basis points.
    pub yield_fee_bps: u32,
    /// Receiver of claimed yield and fees.
    pub fee_recipient: Option<H256>,
}

impl CollateralConfig {
    pub fn new(domain: Domain, address: H256) -> Self {
        Self {
            domain,
            address,
            decimals: WIRE_DECIMALS,
            yield_fee_bps: 0,
            fee_recipient: None,
        }
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn with_yield_fee_bps(mut self, bps: u32) -> Self {
        self.yield_fee_bps = bps;
        self
    }

    pub fn with_fee_recipient(mut self, recipient: H256) -> Self {
        self.fee_recipient = Some(recipient);
        self
    }
}

/// Vault value relative to principal plus accrued fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YieldDelta {
    Gain(U256),
    Loss(U256),
}

impl YieldDelta {
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Gain(amount) | Self::Loss(amount) => amount.is_zero(),
        }
    }
}

/// Persisted state of a collateral endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralState {
    pub domain: Domain,
    pub address: H256,
    pub decimals: u8,
    pub principal_deposited: U256,
    pub accumulated_fees: U256,
    /// Shares outstanding across all synthetic domains, in wire units.
    ///
    /// Counted at this authority's last published rate when a transfer is
    /// sent. A synthetic that applies a newer rebase before the transfer
    /// lands mints at that newer rate, so the sum of synthetic share supplies
    /// can differ from this figure until shares are burned back.
    pub total_shares: U256,
    /// Rate sent with the latest rebase.
    pub exchange_rate: ExchangeRate,
    pub rebase_sequence: u32,
    pub yield_fee_bps: u32,
    pub fee_recipient: Option<H256>,
    pub routers: Routers,
}

/// Observable state transitions of the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralEvent {
    RouterEnrolled {
        domain: Domain,
        router: H256,
    },
    TransferSent {
        destination: Domain,
        recipient: H256,
        amount: U256,
        message_id: H256,
    },
    TransferReceived {
        origin: Domain,
        recipient: H256,
        amount: U256,
    },
    RebaseDispatched {
        destination: Domain,
        sequence: u32,
        exchange_rate: ExchangeRate,
        realised: YieldDelta,
        message_id: H256,
    },
    YieldClaimed {
        recipient: H256,
        amount: U256,
    },
    FeesClaimed {
        recipient: H256,
        amount: U256,
    },
    FeeRecipientSet {
        recipient: Option<H256>,
    },
    YieldFeeSet {
        bps: u32,
    },
}

/// Outcome of a dispatched rebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebaseReceipt {
    pub message_id: H256,
    pub sequence: u32,
    pub exchange_rate: ExchangeRate,
    pub refund: U256,
}

/// Values a rebase commits once its message is dispatched.
struct RebasePlan {
    principal: U256,
    fees: U256,
    rate: ExchangeRate,
    realised: YieldDelta,
}

// ═══════════════════════════════════════════════════════════════════════════════
// AUTHORITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral endpoint and single source of exchange-rate updates.
#[derive(Debug)]
pub struct CollateralAuthority<V> {
    domain: Domain,
    address: H256,
    decimals: u8,
    vault: V,
    routers: Routers,
    principal_deposited: U256,
    accumulated_fees: U256,
    total_shares: U256,
    exchange_rate: ExchangeRate,
    rebase_sequence: u32,
    yield_fee: YieldFee,
    fee_recipient: Option<H256>,
    events: Vec<CollateralEvent>,
}

impl<V: Vault> CollateralAuthority<V> {
    pub fn new(config: CollateralConfig, vault: V) -> WarpResult<Self> {
        let state = CollateralState {
            domain: config.domain,
            address: config.address,
            decimals: config.decimals,
            principal_deposited: U256::zero(),
            accumulated_fees: U256::zero(),
            total_shares: U256::zero(),
            exchange_rate: ExchangeRate::identity(),
            rebase_sequence: 0,
            yield_fee_bps: config.yield_fee_bps,
            fee_recipient: config.fee_recipient,
            routers: Routers::new(),
        };
        Self::from_state(state, vault)
    }

    /// Rebuild an authority from a snapshot and the vault it manages.
    pub fn from_state(state: CollateralState, vault: V) -> WarpResult<Self> {
        if state.address.is_zero() {
            return Err(WarpError::ZeroAddress("collateral router"));
        }
        if state.fee_recipient.is_some_and(|recipient| recipient.is_zero()) {
            return Err(WarpError::ZeroAddress("fee recipient"));
        }
        if state.routers.get(state.domain).is_some() {
            return Err(WarpError::Config(format!(
                "local domain {} enrolled as a remote router",
                state.domain
            )));
        }
        let yield_fee = YieldFee::new(state.yield_fee_bps)?;

        Ok(Self {
            domain: state.domain,
            address: state.address,
            decimals: state.decimals,
            vault,
            routers: state.routers,
            principal_deposited: state.principal_deposited,
            accumulated_fees: state.accumulated_fees,
            total_shares: state.total_shares,
            exchange_rate: state.exchange_rate,
            rebase_sequence: state.rebase_sequence,
            yield_fee,
            fee_recipient: state.fee_recipient,
            events: Vec::new(),
        })
    }

    pub fn state(&self) -> CollateralState {
        CollateralState {
            domain: self.domain,
            address: self.address,
            decimals: self.decimals,
            principal_deposited: self.principal_deposited,
            accumulated_fees: self.accumulated_fees,
            total_shares: self.total_shares,
            exchange_rate: self.exchange_rate,
            rebase_sequence: self.rebase_sequence,
            yield_fee_bps: self.yield_fee.bps(),
            fee_recipient: self.fee_recipient,
            routers: self.routers.clone(),
        }
    }

    pub fn enroll_remote_router(&mut self, domain: Domain, router: H256) -> WarpResult<()> {
        if domain == self.domain {
            return Err(WarpError::Config(format!(
                "cannot enroll a remote router for local domain {}",
                domain
            )));
        }
        self.routers.enroll(domain, router)?;
        info!(domain, router = ?router, "collateral router enrolled");
        self.events.push(CollateralEvent::RouterEnrolled { domain, router });
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Views
    // ───────────────────────────────────────────────────────────────────────────

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn address(&self) -> H256 {
        self.address
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn routers(&self) -> &Routers {
        &self.routers
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }

    /// Current vault value in local token units.
    pub fn total_assets(&self) -> U256 {
        self.vault.total_assets()
    }

    /// Shares outstanding as counted by this authority. See
    /// [`CollateralState::total_shares`].
    pub fn total_shares(&self) -> U256 {
        self.total_shares
    }

    pub fn principal_deposited(&self) -> U256 {
        self.principal_deposited
    }

    pub fn accumulated_fees(&self) -> U256 {
        self.accumulated_fees
    }

    /// Rate sent with the latest rebase.
    pub fn exchange_rate(&self) -> ExchangeRate {
        self.exchange_rate
    }

    /// Sequence number of the latest rebase (0 before the first).
    pub fn rebase_sequence(&self) -> u32 {
        self.rebase_sequence
    }

    pub fn yield_fee_bps(&self) -> u32 {
        self.yield_fee.bps()
    }

    pub fn fee_recipient(&self) -> Option<H256> {
        self.fee_recipient
    }

    /// Vault value above (or below) principal plus accrued fees.
    pub fn calculate_yield(&self) -> WarpResult<YieldDelta> {
        let assets = self.vault.total_assets();
        let basis = self
            .principal_deposited
            .checked_add(self.accumulated_fees)
            .ok_or(WarpError::MathOverflow)?;

        Ok(if assets >= basis {
            YieldDelta::Gain(assets - basis)
        } else {
            YieldDelta::Loss(basis - assets)
        })
    }

    pub fn drain_events(&mut self) -> Vec<CollateralEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Transfers
    // ───────────────────────────────────────────────────────────────────────────

    /// Fee the transport charges for a transfer to `destination`.
    pub fn quote_transfer_remote<T: Transport + ?Sized>(
        &self,
        transport: &T,
        destination: Domain,
    ) -> WarpResult<U256> {
        self.routers.router(destination)?;
        let body = WarpMessage::transfer(&TokenMessage::new(H256::zero(), U256::zero())).encode();
        Ok(transport.quote_dispatch(destination, &body))
    }

    /// Deposit `amount` of the underlying token from `from` and send it to
    /// `recipient` on `destination`.
    pub fn transfer_remote<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        from: H256,
        destination: Domain,
        recipient: H256,
        amount: U256,
        payment: U256,
    ) -> WarpResult<DispatchReceipt> {
        if amount.is_zero() {
            return Err(WarpError::InvalidAmount("transfer amount must be non-zero".into()));
        }
        let router = self.routers.router(destination)?;
        let message = self.encode_outbound(recipient, amount)?;

        let shares = self.exchange_rate.assets_to_shares(message.amount)?;
        let total_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(WarpError::MathOverflow)?;
        let principal = self
            .principal_deposited
            .checked_add(amount)
            .ok_or(WarpError::MathOverflow)?;

        let body = WarpMessage::transfer(&message).encode();
        let required = transport.quote_dispatch(destination, &body);
        if payment < required {
            return Err(TransportError::InsufficientPayment {
                paid: payment,
                required,
            }
            .into());
        }

        self.vault.deposit(from, amount)?;
        let outbound = self.outbound(destination, router, body, Vec::new(), None);
        let receipt = match transport.dispatch(outbound, payment) {
            Ok(receipt) => receipt,
            Err(err) => {
                if let Err(rollback) = self.vault.withdraw(amount, from) {
                    warn!(error = %rollback, "failed to return deposit after dispatch error");
                }
                return Err(err.into());
            }
        };

        self.principal_deposited = principal;
        self.total_shares = total_shares;

        info!(
            destination,
            recipient = ?recipient,
            %amount,
            message_id = ?receipt.message_id,
            "collateral transfer sent"
        );
        self.events.push(CollateralEvent::TransferSent {
            destination,
            recipient,
            amount,
            message_id: receipt.message_id,
        });
        Ok(receipt)
    }

    /// Process a message delivered by the transport.
    pub fn handle(&mut self, origin: Domain, sender: H256, body: &[u8]) -> WarpResult<()> {
        self.routers.ensure_router(origin, sender)?;

        let message = WarpMessage::decode(body)?;
        if message.msg_type != MessageType::Transfer {
            return Err(WarpError::InvalidMessageType(message.msg_type as u8));
        }
        let transfer = message.as_transfer()?;

        let amount = self.decode_inbound(&transfer)?;
        let burned = self.burned_shares(transfer.amount)?;
        self.withdraw_principal(transfer.recipient, amount)?;
        self.total_shares -= burned;

        info!(origin, recipient = ?transfer.recipient, %amount, "collateral transfer received");
        self.events.push(CollateralEvent::TransferReceived {
            origin,
            recipient: transfer.recipient,
            amount,
        });
        Ok(())
    }

    /// Release `amount` of principal from the vault to `recipient`.
    ///
    /// This is the release path of inbound transfers. A request above the
    /// deposited principal fails whole.
    pub fn withdraw_principal(&mut self, recipient: H256, amount: U256) -> WarpResult<U256> {
        if amount > self.principal_deposited {
            return Err(WarpError::InsufficientPrincipal {
                requested: amount,
                deposited: self.principal_deposited,
            });
        }
        if amount.is_zero() {
            debug!(recipient = ?recipient, "zero principal withdrawal");
            return Ok(U256::zero());
        }

        self.vault.withdraw(amount, recipient)?;
        self.principal_deposited -= amount;
        debug!(recipient = ?recipient, %amount, principal = %self.principal_deposited, "principal withdrawn");
        Ok(amount)
    }

    /// Shares retired by an inbound transfer of `wire_amount`.
    fn burned_shares(&self, wire_amount: U256) -> WarpResult<U256> {
        if self.total_shares.is_zero() {
            return Ok(U256::zero());
        }
        if self.exchange_rate.is_zero() {
            return Ok(self.total_shares);
        }
        let shares = self.exchange_rate.assets_to_shares_up(wire_amount)?;
        Ok(shares.min(self.total_shares))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Rebase
    // ───────────────────────────────────────────────────────────────────────────

    /// Fee the transport charges for a rebase to `destination`.
    pub fn quote_rebase<T: Transport + ?Sized>(
        &self,
        transport: &T,
        destination: Domain,
    ) -> WarpResult<U256> {
        self.routers.router(destination)?;
        let body = WarpMessage::rebase(&RebaseMessage::new(self.exchange_rate, 0)).encode();
        Ok(transport.quote_dispatch(destination, &body))
    }

    /// Realise yield and send the resulting rate to `destination`.
    ///
    /// Nothing is committed unless the transport accepts the message.
    pub fn rebase<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        destination: Domain,
        hook_metadata: Vec<u8>,
        hook_override: Option<H256>,
        payment: U256,
    ) -> WarpResult<RebaseReceipt> {
        let router = self.routers.router(destination)?;
        let sequence = self
            .rebase_sequence
            .checked_add(1)
            .ok_or(WarpError::MathOverflow)?;
        let plan = self.plan_rebase()?;

        let body = WarpMessage::rebase(&RebaseMessage::new(plan.rate, sequence)).encode();
        let outbound = self.outbound(destination, router, body, hook_metadata, hook_override);
        let receipt = transport.dispatch(outbound, payment)?;

        self.principal_deposited = plan.principal;
        self.accumulated_fees = plan.fees;
        self.exchange_rate = plan.rate;
        self.rebase_sequence = sequence;

        info!(
            destination,
            sequence,
            rate = %plan.rate,
            principal = %plan.principal,
            fees = %plan.fees,
            "rebase dispatched"
        );
        self.events.push(CollateralEvent::RebaseDispatched {
            destination,
            sequence,
            exchange_rate: plan.rate,
            realised: plan.realised,
            message_id: receipt.message_id,
        });

        Ok(RebaseReceipt {
            message_id: receipt.message_id,
            sequence,
            exchange_rate: plan.rate,
            refund: receipt.refund,
        })
    }

    fn plan_rebase(&self) -> WarpResult<RebasePlan> {
        if self.total_shares.is_zero() {
            return Ok(RebasePlan {
                principal: self.principal_deposited,
                fees: self.accumulated_fees,
                rate: ExchangeRate::identity(),
                realised: YieldDelta::Gain(U256::zero()),
            });
        }

        let realised = self.calculate_yield()?;
        let (principal, fees) = match realised {
            YieldDelta::Gain(amount) => {
                let split = self.yield_fee.split(amount)?;
                let principal = self
                    .principal_deposited
                    .checked_add(split.holders)
                    .ok_or(WarpError::MathOverflow)?;
                let fees = self
                    .accumulated_fees
                    .checked_add(split.fee)
                    .ok_or(WarpError::MathOverflow)?;
                (principal, fees)
            }
            YieldDelta::Loss(amount) if amount <= self.principal_deposited => {
                (self.principal_deposited - amount, self.accumulated_fees)
            }
            YieldDelta::Loss(amount) => {
                let excess = amount - self.principal_deposited;
                (U256::zero(), self.accumulated_fees.saturating_sub(excess))
            }
        };

        let backing = to_wire_amount(principal, self.decimals)?;
        let rate = ExchangeRate::from_ratio(backing, self.total_shares)?;
        Ok(RebasePlan {
            principal,
            fees,
            rate,
            realised,
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Yield and fees
    // ───────────────────────────────────────────────────────────────────────────

    /// Send all unrealised yield to the fee recipient.
    pub fn claim_yield(&mut self) -> WarpResult<U256> {
        let recipient = self.fee_recipient.ok_or(WarpError::ZeroFeeRecipient)?;
        let amount = match self.calculate_yield()? {
            YieldDelta::Gain(amount) if !amount.is_zero() => amount,
            _ => return Err(WarpError::NoYieldToClaim),
        };

        self.vault.withdraw(amount, recipient)?;
        info!(recipient = ?recipient, %amount, "yield claimed");
        self.events.push(CollateralEvent::YieldClaimed { recipient, amount });
        Ok(amount)
    }

    /// Send accumulated vault-owner fees to the fee recipient.
    pub fn claim_fees(&mut self) -> WarpResult<U256> {
        let recipient = self.fee_recipient.ok_or(WarpError::ZeroFeeRecipient)?;
        let amount = self.accumulated_fees;
        if amount.is_zero() {
            return Err(WarpError::NoFeesToClaim);
        }

        self.vault.withdraw(amount, recipient)?;
        self.accumulated_fees = U256::zero();
        info!(recipient = ?recipient, %amount, "fees claimed");
        self.events.push(CollateralEvent::FeesClaimed { recipient, amount });
        Ok(amount)
    }

    pub fn set_fee_recipient(&mut self, recipient: Option<H256>) -> WarpResult<()> {
        if recipient.is_some_and(|recipient| recipient.is_zero()) {
            return Err(WarpError::ZeroAddress("fee recipient"));
        }
        self.fee_recipient = recipient;
        self.events.push(CollateralEvent::FeeRecipientSet { recipient });
        Ok(())
    }

    /// Takes effect from the next rebase.
    pub fn set_yield_fee_bps(&mut self, bps: u32) -> WarpResult<()> {
        self.yield_fee = YieldFee::new(bps)?;
        self.events.push(CollateralEvent::YieldFeeSet { bps });
        Ok(())
    }

    fn outbound(
        &self,
        destination: Domain,
        recipient: H256,
        body: Vec<u8>,
        hook_metadata: Vec<u8>,
        hook_override: Option<H256>,
    ) -> OutboundMessage {
        OutboundMessage {
            origin: self.domain,
            sender: self.address,
            destination,
            recipient,
            body,
            hook_metadata,
            hook_override,
        }
    }
}

impl<V: Vault> TransferEndpoint for CollateralAuthority<V> {
    fn local_domain(&self) -> Domain {
        self.domain
    }

    fn current_rate(&self) -> ExchangeRate {
        self.exchange_rate
    }

    fn encode_outbound(&self, recipient: H256, amount: U256) -> WarpResult<TokenMessage> {
        let wire_amount = to_wire_amount(amount, self.decimals)?;
        Ok(TokenMessage::new(recipient, wire_amount))
    }

    fn decode_inbound(&self, message: &TokenMessage) -> WarpResult<U256> {
        from_wire_amount(message.amount, self.decimals)
    }
}

impl<V: Vault> MessageRecipient for CollateralAuthority<V> {
    fn handle(&mut self, origin: Domain, sender: H256, body: &[u8]) -> WarpResult<()> {
        CollateralAuthority::handle(self, origin, sender, body)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
