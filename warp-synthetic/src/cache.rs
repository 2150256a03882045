//! Sequenced exchange-rate cache.

use serde::{Deserialize, Serialize};
use warp_core::{ExchangeRate, WarpResult, U256};

/// Result of offering a rebase to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// The rate was replaced.
    Applied { previous: ExchangeRate },
    /// The sequence number was at or below the watermark; nothing changed.
    Stale { watermark: u32 },
}

impl RebaseOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Locally cached rate plus the sequence number it came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCache {
    rate: ExchangeRate,
    last_applied: u32,
}

impl RateCache {
    /// Identity rate, watermark 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(rate: ExchangeRate, last_applied: u32) -> Self {
        Self { rate, last_applied }
    }

    pub fn rate(&self) -> ExchangeRate {
        self.rate
    }

    pub fn last_applied_sequence(&self) -> u32 {
        self.last_applied
    }

    pub fn apply(&mut self, rate: ExchangeRate, sequence: u32) -> RebaseOutcome {
        if sequence <= self.last_applied {
            return RebaseOutcome::Stale {
                watermark: self.last_applied,
            };
        }
        let previous = std::mem::replace(&mut self.rate, rate);
        self.last_applied = sequence;
        RebaseOutcome::Applied { previous }
    }

    pub fn assets_to_shares(&self, assets: U256) -> WarpResult<U256> {
        self.rate.assets_to_shares(assets)
    }

    pub fn shares_to_assets(&self, shares: U256) -> WarpResult<U256> {
        self.rate.shares_to_assets(shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rate(scaled: u64) -> ExchangeRate {
        ExchangeRate::from_scaled(U256::from(scaled))
    }

    #[test]
    fn test_starts_at_identity() {
        let cache = RateCache::new();
        assert!(cache.rate().is_identity());
        assert_eq!(cache.last_applied_sequence(), 0);
    }

    #[test]
    fn test_newer_sequence_applies() {
        let mut cache = RateCache::new();
        let outcome = cache.apply(rate(12_000_000_000), 1);
        assert_eq!(
            outcome,
            RebaseOutcome::Applied {
                previous: ExchangeRate::identity()
            }
        );
        assert_eq!(cache.rate(), rate(12_000_000_000));
        assert_eq!(cache.last_applied_sequence(), 1);
    }

    #[test]
    fn test_stale_and_duplicate_ignored() {
        let mut cache = RateCache::new();
        cache.apply(rate(13_000_000_000), 5);

        assert_eq!(cache.apply(rate(11_000_000_000), 3), RebaseOutcome::Stale { watermark: 5 });
        assert_eq!(cache.apply(rate(11_000_000_000), 5), RebaseOutcome::Stale { watermark: 5 });
        assert_eq!(cache.rate(), rate(13_000_000_000));
    }

    #[test]
    fn test_sequence_zero_never_applies() {
        let mut cache = RateCache::new();
        assert!(!cache.apply(rate(2), 0).is_applied());
        assert!(cache.rate().is_identity());
    }

    proptest! {
        #[test]
        fn test_order_insensitive(
            updates in proptest::collection::vec((1u32..1_000, 1u64..100_000_000_000), 1..20),
        ) {
            let mut forward = RateCache::new();
            for (sequence, scaled) in &updates {
                forward.apply(rate(*scaled), *sequence);
            }
            let mut backward = RateCache::new();
            for (sequence, scaled) in updates.iter().rev() {
                backward.apply(rate(*scaled), *sequence);
            }

            let max_sequence = updates.iter().map(|(sequence, _)| *sequence).max().unwrap();
            prop_assert_eq!(forward.last_applied_sequence(), max_sequence);
            prop_assert_eq!(backward.last_applied_sequence(), max_sequence);

            // With unique sequence numbers both orders converge on the same rate.
            let unique = updates.iter().filter(|(sequence, _)| *sequence == max_sequence).count() == 1;
            if unique {
                prop_assert_eq!(forward.rate(), backward.rate());
            }
        }

        #[test]
        fn test_late_older_update_is_discarded(
            s1 in 1u32..u32::MAX,
            r1 in 1u64..100_000_000_000,
            r2 in 1u64..100_000_000_000,
        ) {
            let s2 = s1 + 1;
            let mut only_newest = RateCache::new();
            only_newest.apply(rate(r2), s2);

            let mut reordered = RateCache::new();
            reordered.apply(rate(r2), s2);
            reordered.apply(rate(r1), s1);

            prop_assert_eq!(reordered, only_newest);
        }
    }
}
