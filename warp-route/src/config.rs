//! Route configuration.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use warp_collateral::{CollateralConfig, MAX_YIELD_FEE_BPS};
use warp_core::{hex_to_h256, Domain, WarpError, WarpResult, H256, WIRE_DECIMALS};
use warp_synthetic::SyntheticConfig;

use crate::mailbox::DeliveryOrder;

/// Description of one warp route: a collateral domain and its synthetics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarpRouteConfig {
    pub collateral: CollateralDomainConfig,
    pub synthetics: Vec<SyntheticDomainConfig>,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Collateral side of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralDomainConfig {
    /// Domain id of the collateral chain.
    pub domain: Domain,
    /// Router address, `0x`-prefixed 32-byte hex.
    pub router: String,
    /// Decimals of the underlying token.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Vault-owner share of realised yield.
    #[serde(default)]
    pub yield_fee_bps: u32,
    /// Receiver of claimed yield and fees.
    #[serde(default)]
    pub fee_recipient: Option<String>,
}

/// One synthetic domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticDomainConfig {
    pub domain: Domain,
    pub router: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Mailbox settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Flat fee charged per dispatched message.
    #[serde(default)]
    pub dispatch_fee: u128,
    #[serde(default)]
    pub delivery_order: DeliveryOrder,
}

fn default_decimals() -> u8 {
    WIRE_DECIMALS
}

fn parse_address(value: &str, what: &'static str) -> WarpResult<H256> {
    let address = hex_to_h256(value)
        .map_err(|e| WarpError::Config(format!("invalid {} address {}: {}", what, value, e)))?;
    if address.is_zero() {
        return Err(WarpError::ZeroAddress(what));
    }
    Ok(address)
}

impl CollateralDomainConfig {
    pub fn to_collateral_config(&self) -> WarpResult<CollateralConfig> {
        let mut config = CollateralConfig::new(self.domain, parse_address(&self.router, "collateral router")?)
            .with_decimals(self.decimals)
            .with_yield_fee_bps(self.yield_fee_bps);
        if let Some(recipient) = &self.fee_recipient {
            config = config.with_fee_recipient(parse_address(recipient, "fee recipient")?);
        }
        Ok(config)
    }
}

impl SyntheticDomainConfig {
    pub fn to_synthetic_config(&self, authority_domain: Domain) -> WarpResult<SyntheticConfig> {
        let mut config = SyntheticConfig::new(
            self.domain,
            parse_address(&self.router, "synthetic router")?,
            authority_domain,
        );
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(symbol) = &self.symbol {
            config.symbol = symbol.clone();
        }
        Ok(config)
    }
}

impl WarpRouteConfig {
    /// Load configuration from `WARP_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from a variable lookup.
    ///
    /// `WARP_SYNTHETICS` lists `domain=router` pairs separated by commas.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let domain: Domain = lookup("WARP_COLLATERAL_DOMAIN")
            .context("WARP_COLLATERAL_DOMAIN must be set")?
            .trim()
            .parse()
            .context("WARP_COLLATERAL_DOMAIN must be a u32")?;

        let router = lookup("WARP_COLLATERAL_ROUTER").context("WARP_COLLATERAL_ROUTER must be set")?;

        let decimals: u8 = lookup("WARP_COLLATERAL_DECIMALS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(WIRE_DECIMALS);

        let yield_fee_bps: u32 = lookup("WARP_YIELD_FEE_BPS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);

        let fee_recipient = lookup("WARP_FEE_RECIPIENT").filter(|s| !s.trim().is_empty());

        let synthetics = lookup("WARP_SYNTHETICS")
            .context("WARP_SYNTHETICS must be set")?
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| -> Result<SyntheticDomainConfig> {
                let (domain, router) = entry
                    .split_once('=')
                    .with_context(|| format!("expected domain=router, got {}", entry))?;
                Ok(SyntheticDomainConfig {
                    domain: domain
                        .trim()
                        .parse()
                        .with_context(|| format!("invalid synthetic domain {}", domain))?,
                    router: router.trim().to_string(),
                    name: None,
                    symbol: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let dispatch_fee: u128 = lookup("WARP_DISPATCH_FEE")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);

        let delivery_order = match lookup("WARP_DELIVERY_ORDER") {
            Some(order) => order.parse().context("invalid WARP_DELIVERY_ORDER")?,
            None => DeliveryOrder::Fifo,
        };

        let config = Self {
            collateral: CollateralDomainConfig {
                domain,
                router,
                decimals,
                yield_fee_bps,
                fee_recipient,
            },
            synthetics,
            transport: TransportConfig {
                dispatch_fee,
                delivery_order,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid warp route config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Reject wiring that could never form a working route.
    pub fn validate(&self) -> WarpResult<()> {
        if self.collateral.yield_fee_bps > MAX_YIELD_FEE_BPS {
            return Err(WarpError::FeeTooHigh {
                bps: self.collateral.yield_fee_bps,
                max: MAX_YIELD_FEE_BPS,
            });
        }
        if self.synthetics.is_empty() {
            return Err(WarpError::Config("route has no synthetic domains".into()));
        }

        let mut domains = BTreeSet::new();
        domains.insert(self.collateral.domain);
        for synthetic in &self.synthetics {
            if !domains.insert(synthetic.domain) {
                return Err(WarpError::Config(format!("duplicate domain {}", synthetic.domain)));
            }
        }

        self.collateral.to_collateral_config()?;
        for synthetic in &self.synthetics {
            synthetic.to_synthetic_config(self.collateral.domain)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const ROUTER_A: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
    const ROUTER_B: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";
    const ROUTER_C: &str = "0x3333333333333333333333333333333333333333333333333333333333333333";

    fn sample_json() -> String {
        format!(
            r#"{{
                "collateral": {{ "domain": 1, "router": "{ROUTER_A}", "yield_fee_bps": 1000 }},
                "synthetics": [
                    {{ "domain": 2, "router": "{ROUTER_B}", "symbol": "wstETH" }},
                    {{ "domain": 3, "router": "{ROUTER_C}" }}
                ],
                "transport": {{ "dispatch_fee": 5, "delivery_order": {{ "mode": "shuffled", "seed": 9 }} }}
            }}"#
        )
    }

    #[test]
    fn test_from_json_str() {
        let config = WarpRouteConfig::from_json_str(&sample_json()).unwrap();
        assert_eq!(config.collateral.decimals, 18);
        assert_eq!(config.collateral.yield_fee_bps, 1000);
        assert_eq!(config.synthetics.len(), 2);
        assert_eq!(config.synthetics[0].symbol.as_deref(), Some("wstETH"));
        assert_eq!(config.transport.dispatch_fee, 5);
        assert_eq!(config.transport.delivery_order, DeliveryOrder::Shuffled { seed: 9 });

        let synthetic = config.synthetics[0].to_synthetic_config(1).unwrap();
        assert_eq!(synthetic.symbol, "wstETH");
        assert_eq!(synthetic.authority_domain, 1);
    }

    #[test]
    fn test_transport_defaults() {
        let json = format!(
            r#"{{ "collateral": {{ "domain": 1, "router": "{ROUTER_A}" }},
                  "synthetics": [{{ "domain": 2, "router": "{ROUTER_B}" }}] }}"#
        );
        let config = WarpRouteConfig::from_json_str(&json).unwrap();
        assert_eq!(config.transport, TransportConfig::default());
        assert_eq!(config.collateral.fee_recipient, None);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();
        let config = WarpRouteConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.synthetics[1].domain, 3);

        assert!(WarpRouteConfig::from_json_file("/nonexistent/warp.json").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_wiring() {
        let mut config = WarpRouteConfig::from_json_str(&sample_json()).unwrap();

        config.synthetics[1].domain = 2;
        assert!(matches!(config.validate(), Err(WarpError::Config(_))));

        config.synthetics[1].domain = 1;
        assert!(matches!(config.validate(), Err(WarpError::Config(_))));

        config.synthetics[1].domain = 3;
        config.synthetics[1].router = format!("0x{}", "00".repeat(32));
        assert_eq!(config.validate(), Err(WarpError::ZeroAddress("synthetic router")));

        config.synthetics[1].router = "0x1234".into();
        assert!(matches!(config.validate(), Err(WarpError::Config(_))));

        config.synthetics[1].router = ROUTER_C.into();
        config.collateral.yield_fee_bps = 10_001;
        assert!(matches!(config.validate(), Err(WarpError::FeeTooHigh { .. })));

        config.collateral.yield_fee_bps = 0;
        config.synthetics.clear();
        assert!(matches!(config.validate(), Err(WarpError::Config(_))));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, String> = HashMap::from([
            ("WARP_COLLATERAL_DOMAIN", "1".to_string()),
            ("WARP_COLLATERAL_ROUTER", ROUTER_A.to_string()),
            ("WARP_COLLATERAL_DECIMALS", "6".to_string()),
            ("WARP_YIELD_FEE_BPS", "250".to_string()),
            ("WARP_FEE_RECIPIENT", ROUTER_C.to_string()),
            ("WARP_SYNTHETICS", format!("2={ROUTER_B}, 3={ROUTER_C}")),
            ("WARP_DELIVERY_ORDER", "lifo".to_string()),
        ]);
        let config = WarpRouteConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.collateral.decimals, 6);
        assert_eq!(config.collateral.yield_fee_bps, 250);
        assert_eq!(config.collateral.fee_recipient.as_deref(), Some(ROUTER_C));
        assert_eq!(
            config.synthetics.iter().map(|s| s.domain).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(config.transport.delivery_order, DeliveryOrder::Lifo);
        assert_eq!(config.transport.dispatch_fee, 0);
    }

    #[test]
    fn test_from_lookup_missing_required() {
        let err = WarpRouteConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("WARP_COLLATERAL_DOMAIN"));

        let err = WarpRouteConfig::from_lookup(|key| match key {
            "WARP_COLLATERAL_DOMAIN" => Some("1".into()),
            "WARP_COLLATERAL_ROUTER" => Some(ROUTER_A.into()),
            "WARP_SYNTHETICS" => Some("2:nope".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("domain=router"));
    }
}
