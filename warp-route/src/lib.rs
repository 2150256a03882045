//! warp-route
//!
//! Wires one collateral authority and its synthetic domains into a route
//! over an in-memory [`Mailbox`]. The mailbox holds dispatched messages
//! until they are delivered, in FIFO, LIFO or seeded-shuffle order, so the
//! out-of-order and delayed delivery the protocol tolerates can be driven
//! deterministically.

pub mod config;
pub mod mailbox;
pub mod route;
pub mod telemetry;

pub use config::{CollateralDomainConfig, SyntheticDomainConfig, TransportConfig, WarpRouteConfig};
pub use mailbox::{DeliveryOrder, Envelope, Mailbox};
pub use route::{DeliveryReport, WarpRoute};
pub use telemetry::init_tracing;
