//! Remote router enrollment.

use std::collections::BTreeMap;

use primitive_types::H256;
use serde::{Deserialize, Serialize};

use crate::{Domain, WarpError, WarpResult};

/// Registry of the trusted router on each remote domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routers {
    routers: BTreeMap<Domain, H256>,
}

impl Routers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll (or replace) the router for `domain`.
    pub fn enroll(&mut self, domain: Domain, router: H256) -> WarpResult<()> {
        if router.is_zero() {
            return Err(WarpError::ZeroAddress("remote router"));
        }
        self.routers.insert(domain, router);
        Ok(())
    }

    pub fn get(&self, domain: Domain) -> Option<H256> {
        self.routers.get(&domain).copied()
    }

    /// Router for `domain`, or `UnenrolledRouter`.
    pub fn router(&self, domain: Domain) -> WarpResult<H256> {
        self.get(domain).ok_or(WarpError::UnenrolledRouter(domain))
    }

    /// Check that `sender` is the enrolled router of `origin`.
    pub fn ensure_router(&self, origin: Domain, sender: H256) -> WarpResult<()> {
        let enrolled = self.router(origin)?;
        if enrolled != sender {
            return Err(WarpError::UnauthorizedSender {
                domain: origin,
                sender,
            });
        }
        Ok(())
    }

    pub fn domains(&self) -> impl Iterator<Item = Domain> + '_ {
        self.routers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enroll_and_check() {
        let mut routers = Routers::new();
        routers.enroll(2, H256::repeat_byte(2)).unwrap();

        assert_eq!(routers.router(2).unwrap(), H256::repeat_byte(2));
        assert!(routers.ensure_router(2, H256::repeat_byte(2)).is_ok());
        assert_eq!(
            routers.ensure_router(2, H256::repeat_byte(3)),
            Err(WarpError::UnauthorizedSender {
                domain: 2,
                sender: H256::repeat_byte(3)
            })
        );
        assert_eq!(routers.router(9), Err(WarpError::UnenrolledRouter(9)));
    }

    #[test]
    fn test_zero_router_rejected() {
        let mut routers = Routers::new();
        assert_eq!(
            routers.enroll(2, H256::zero()),
            Err(WarpError::ZeroAddress("remote router"))
        );
        assert!(routers.is_empty());
    }

    #[test]
    fn test_reenroll_replaces() {
        let mut routers = Routers::new();
        routers.enroll(5, H256::repeat_byte(1)).unwrap();
        routers.enroll(5, H256::repeat_byte(9)).unwrap();
        assert_eq!(routers.len(), 1);
        assert_eq!(routers.get(5), Some(H256::repeat_byte(9)));
        assert_eq!(routers.domains().collect::<Vec<_>>(), vec![5]);
    }
}
