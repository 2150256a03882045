//! Synthetic token: a shares ledger valued through the cached rate.
//!
//! Every mutation (mint, burn, peer transfer) operates on shares. Balances
//! and supply are reported in assets by converting at the rate currently
//! cached, so a rebase revalues every holder without touching share counts.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use warp_core::{
    DispatchReceipt, Domain, ExchangeRate, MessageRecipient, MessageType, OutboundMessage,
    Routers, TokenMessage, TransferEndpoint, Transport, WarpError, WarpMessage, WarpResult, H256,
    U256, WIRE_DECIMALS,
};

use crate::cache::{RateCache, RebaseOutcome};
use crate::ledger::SharesLedger;

/// Static wiring of a synthetic endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub domain: Domain,
    pub address: H256,
    /// Domain of the collateral authority; the only accepted rebase origin.
    pub authority_domain: Domain,
    pub name: String,
    pub symbol: String,
}

impl SyntheticConfig {
    pub fn new(domain: Domain, address: H256, authority_domain: Domain) -> Self {
        Self {
            domain,
            address,
            authority_domain,
            name: "Warp Synthetic".to_string(),
            symbol: "wSYN".to_string(),
        }
    }

    pub fn with_metadata(mut self, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.name = name.into();
        self.symbol = symbol.into();
        self
    }
}

/// Persisted state of a synthetic endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticState {
    pub config: SyntheticConfig,
    pub exchange_rate: ExchangeRate,
    pub last_applied_sequence: u32,
    pub ledger: SharesLedger,
    pub routers: Routers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntheticEvent {
    RouterEnrolled {
        domain: Domain,
        router: H256,
    },
    RateUpdated {
        sequence: u32,
        previous: ExchangeRate,
        exchange_rate: ExchangeRate,
    },
    StaleRebaseIgnored {
        sequence: u32,
        watermark: u32,
    },
    TransferReceived {
        origin: Domain,
        recipient: H256,
        amount: U256,
        shares: U256,
    },
    TransferSent {
        destination: Domain,
        recipient: H256,
        amount: U256,
        shares: U256,
        message_id: H256,
    },
    Transfer {
        from: H256,
        to: H256,
        amount: U256,
        shares: U256,
    },
    Approval {
        owner: H256,
        spender: H256,
        amount: U256,
    },
}

#[derive(Debug)]
pub struct SyntheticToken {
    config: SyntheticConfig,
    routers: Routers,
    cache: RateCache,
    ledger: SharesLedger,
    events: Vec<SyntheticEvent>,
}

impl SyntheticToken {
    pub fn new(config: SyntheticConfig) -> WarpResult<Self> {
        Self::from_state(SyntheticState {
            config,
            exchange_rate: ExchangeRate::identity(),
            last_applied_sequence: 0,
            ledger: SharesLedger::new(),
            routers: Routers::new(),
        })
    }

    pub fn from_state(state: SyntheticState) -> WarpResult<Self> {
        if state.config.address.is_zero() {
            return Err(WarpError::ZeroAddress("synthetic router"));
        }
        if state.config.authority_domain == state.config.domain {
            return Err(WarpError::Config(format!(
                "synthetic domain {} cannot be its own rate authority",
                state.config.domain
            )));
        }

        Ok(Self {
            config: state.config,
            routers: state.routers,
            cache: RateCache::from_parts(state.exchange_rate, state.last_applied_sequence),
            ledger: state.ledger,
            events: Vec::new(),
        })
    }

    pub fn state(&self) -> SyntheticState {
        SyntheticState {
            config: self.config.clone(),
            exchange_rate: self.cache.rate(),
            last_applied_sequence: self.cache.last_applied_sequence(),
            ledger: self.ledger.clone(),
            routers: self.routers.clone(),
        }
    }

    pub fn enroll_remote_router(&mut self, domain: Domain, router: H256) -> WarpResult<()> {
        if domain == self.config.domain {
            return Err(WarpError::Config(format!(
                "cannot enroll a remote router for local domain {}",
                domain
            )));
        }
        self.routers.enroll(domain, router)?;
        info!(local = self.config.domain, domain, router = ?router, "synthetic router enrolled");
        self.events.push(SyntheticEvent::RouterEnrolled { domain, router });
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<SyntheticEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Metadata and views
    // ───────────────────────────────────────────────────────────────────────────

    pub fn domain(&self) -> Domain {
        self.config.domain
    }

    pub fn address(&self) -> H256 {
        self.config.address
    }

    pub fn authority_domain(&self) -> Domain {
        self.config.authority_domain
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn decimals(&self) -> u8 {
        WIRE_DECIMALS
    }

    pub fn routers(&self) -> &Routers {
        &self.routers
    }

    pub fn exchange_rate(&self) -> ExchangeRate {
        self.cache.rate()
    }

    pub fn last_applied_sequence(&self) -> u32 {
        self.cache.last_applied_sequence()
    }

    pub fn assets_to_shares(&self, assets: U256) -> WarpResult<U256> {
        self.cache.assets_to_shares(assets)
    }

    pub fn shares_to_assets(&self, shares: U256) -> WarpResult<U256> {
        self.cache.shares_to_assets(shares)
    }

    /// Asset value of `account`'s shares at the cached rate.
    pub fn balance_of(&self, account: H256) -> WarpResult<U256> {
        self.shares_to_assets(self.ledger.share_balance_of(account))
    }

    pub fn share_balance_of(&self, account: H256) -> U256 {
        self.ledger.share_balance_of(account)
    }

    pub fn total_supply(&self) -> WarpResult<U256> {
        self.shares_to_assets(self.ledger.total_shares())
    }

    pub fn total_shares(&self) -> U256 {
        self.ledger.total_shares()
    }

    pub fn allowance(&self, owner: H256, spender: H256) -> U256 {
        self.ledger.allowance(owner, spender)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Local transfers
    // ───────────────────────────────────────────────────────────────────────────

    /// Move the shares worth `assets` at the current rate. Returns the
    /// number of shares moved.
    pub fn transfer(&mut self, from: H256, to: H256, assets: U256) -> WarpResult<U256> {
        if to.is_zero() {
            return Err(WarpError::ZeroAddress("recipient"));
        }
        let shares = self.cache.assets_to_shares(assets)?;
        self.ledger.move_shares(from, to, shares)?;

        debug!(from = ?from, to = ?to, %assets, %shares, "transfer");
        self.events.push(SyntheticEvent::Transfer {
            from,
            to,
            amount: assets,
            shares,
        });
        Ok(shares)
    }

    /// Allow `spender` to move up to `assets` of `owner`'s balance.
    pub fn approve(&mut self, owner: H256, spender: H256, assets: U256) -> WarpResult<()> {
        if spender.is_zero() {
            return Err(WarpError::ZeroAddress("spender"));
        }
        self.ledger.approve(owner, spender, assets);
        self.events.push(SyntheticEvent::Approval {
            owner,
            spender,
            amount: assets,
        });
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        spender: H256,
        from: H256,
        to: H256,
        assets: U256,
    ) -> WarpResult<U256> {
        if to.is_zero() {
            return Err(WarpError::ZeroAddress("recipient"));
        }
        let shares = self.cache.assets_to_shares(assets)?;
        self.ledger.ensure_balance(from, shares)?;
        self.ledger.spend_allowance(from, spender, assets)?;
        self.ledger.move_shares(from, to, shares)?;

        debug!(spender = ?spender, from = ?from, to = ?to, %assets, %shares, "transfer from");
        self.events.push(SyntheticEvent::Transfer {
            from,
            to,
            amount: assets,
            shares,
        });
        Ok(shares)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Cross-chain
    // ───────────────────────────────────────────────────────────────────────────

    pub fn quote_transfer_remote<T: Transport + ?Sized>(
        &self,
        transport: &T,
        destination: Domain,
    ) -> WarpResult<U256> {
        self.routers.router(destination)?;
        let body = WarpMessage::transfer(&TokenMessage::new(H256::zero(), U256::zero())).encode();
        Ok(transport.quote_dispatch(destination, &body))
    }

    /// Burn the shares worth `assets` from `from` and send `assets` to
    /// `recipient` on `destination`.
    pub fn transfer_remote<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        from: H256,
        destination: Domain,
        recipient: H256,
        assets: U256,
        payment: U256,
    ) -> WarpResult<DispatchReceipt> {
        if assets.is_zero() {
            return Err(WarpError::InvalidAmount("transfer amount must be non-zero".into()));
        }
        let router = self.routers.router(destination)?;
        let shares = self.cache.rate().assets_to_shares_up(assets)?;
        self.ledger.ensure_balance(from, shares)?;

        let message = self.encode_outbound(recipient, assets)?;
        let outbound = OutboundMessage {
            origin: self.config.domain,
            sender: self.config.address,
            destination,
            recipient: router,
            body: WarpMessage::transfer(&message).encode(),
            hook_metadata: Vec::new(),
            hook_override: None,
        };
        let receipt = transport.dispatch(outbound, payment)?;
        self.ledger.burn(from, shares)?;

        info!(
            origin = self.config.domain,
            destination,
            recipient = ?recipient,
            %assets,
            %shares,
            message_id = ?receipt.message_id,
            "synthetic transfer sent"
        );
        self.events.push(SyntheticEvent::TransferSent {
            destination,
            recipient,
            amount: assets,
            shares,
            message_id: receipt.message_id,
        });
        Ok(receipt)
    }

    /// Offer a rate update to the cache. Stale sequence numbers are ignored.
    pub fn apply_rebase(&mut self, exchange_rate: ExchangeRate, sequence: u32) -> RebaseOutcome {
        let outcome = self.cache.apply(exchange_rate, sequence);
        match outcome {
            RebaseOutcome::Applied { previous } => {
                info!(
                    domain = self.config.domain,
                    sequence,
                    previous = %previous,
                    rate = %exchange_rate,
                    "exchange rate updated"
                );
                self.events.push(SyntheticEvent::RateUpdated {
                    sequence,
                    previous,
                    exchange_rate,
                });
            }
            RebaseOutcome::Stale { watermark } => {
                debug!(
                    domain = self.config.domain,
                    sequence,
                    watermark,
                    "stale rebase ignored"
                );
                self.events.push(SyntheticEvent::StaleRebaseIgnored {
                    sequence,
                    watermark,
                });
            }
        }
        outcome
    }

    /// Process a message delivered by the transport.
    pub fn handle(&mut self, origin: Domain, sender: H256, body: &[u8]) -> WarpResult<()> {
        self.routers.ensure_router(origin, sender)?;

        let message = WarpMessage::decode(body)?;
        match message.msg_type {
            MessageType::Rebase => {
                if origin != self.config.authority_domain {
                    return Err(WarpError::UnauthorizedRebase(origin));
                }
                let rebase = message.as_rebase()?;
                self.apply_rebase(rebase.exchange_rate, rebase.sequence);
                Ok(())
            }
            MessageType::Transfer => {
                let transfer = message.as_transfer()?;
                self.receive_transfer(origin, transfer)
            }
        }
    }

    fn receive_transfer(&mut self, origin: Domain, transfer: TokenMessage) -> WarpResult<()> {
        let shares = self.decode_inbound(&transfer)?;
        if shares.is_zero() {
            warn!(
                domain = self.config.domain,
                origin,
                amount = %transfer.amount,
                rate = %self.cache.rate(),
                "inbound transfer too small to mint a share"
            );
        } else {
            self.ledger.mint(transfer.recipient, shares)?;
            info!(
                domain = self.config.domain,
                origin,
                recipient = ?transfer.recipient,
                amount = %transfer.amount,
                %shares,
                "synthetic transfer received"
            );
        }

        self.events.push(SyntheticEvent::TransferReceived {
            origin,
            recipient: transfer.recipient,
            amount: transfer.amount,
            shares,
        });
        Ok(())
    }
}

impl TransferEndpoint for SyntheticToken {
    fn local_domain(&self) -> Domain {
        self.config.domain
    }

    fn current_rate(&self) -> ExchangeRate {
        self.cache.rate()
    }

    fn encode_outbound(&self, recipient: H256, amount: U256) -> WarpResult<TokenMessage> {
        Ok(TokenMessage::new(recipient, amount))
    }

    fn decode_inbound(&self, message: &TokenMessage) -> WarpResult<U256> {
        self.cache.assets_to_shares(message.amount)
    }
}

impl MessageRecipient for SyntheticToken {
    fn handle(&mut self, origin: Domain, sender: H256, body: &[u8]) -> WarpResult<()> {
        SyntheticToken::handle(self, origin, sender, body)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
