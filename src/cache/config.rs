//! Cache configuration and expiry policy.

use std::collections::BTreeSet;
use std::num::{NonZeroU64, NonZeroUsize};
use std::time::Duration;

use tokio::time::Instant;

use super::keys::CacheTag;

const DEFAULT_CAPACITY: usize = 512;
const DEFAULT_SHORT_TTL_SECS: u64 = 60;
const DEFAULT_MEDIUM_TTL_SECS: u64 = 300;
const DEFAULT_LONG_TTL_SECS: u64 = 3600;

/// Lifetime of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Seconds(NonZeroU64),
    /// Held until invalidated by tag (or evicted for capacity).
    NoExpiry,
}

impl Ttl {
    /// `None` for zero seconds, which is not a valid lifetime.
    pub fn seconds(secs: u64) -> Option<Self> {
        NonZeroU64::new(secs).map(Ttl::Seconds)
    }

    pub fn expires_at(self, now: Instant) -> Option<Instant> {
        match self {
            Ttl::Seconds(secs) => now.checked_add(Duration::from_secs(secs.get())),
            Ttl::NoExpiry => None,
        }
    }
}

/// Coarse freshness classes mapped to configured lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    Short,
    Medium,
    Long,
    Static,
}

/// Cache behaviour loaded from settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When disabled every lookup computes and nothing is stored.
    pub enabled: bool,
    /// Maximum number of stored entries before least-recently-used eviction.
    pub capacity: usize,
    pub short_ttl: Ttl,
    pub medium_ttl: Ttl,
    pub long_ttl: Ttl,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            short_ttl: fixed_ttl(DEFAULT_SHORT_TTL_SECS),
            medium_ttl: fixed_ttl(DEFAULT_MEDIUM_TTL_SECS),
            long_ttl: fixed_ttl(DEFAULT_LONG_TTL_SECS),
        }
    }
}

const fn fixed_ttl(secs: u64) -> Ttl {
    match NonZeroU64::new(secs) {
        Some(secs) => Ttl::Seconds(secs),
        None => Ttl::NoExpiry,
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            short_ttl: settings.short_ttl,
            medium_ttl: settings.medium_ttl,
            long_ttl: settings.long_ttl,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self, class: TtlClass) -> Ttl {
        match class {
            TtlClass::Short => self.short_ttl,
            TtlClass::Medium => self.medium_ttl,
            TtlClass::Long => self.long_ttl,
            TtlClass::Static => Ttl::NoExpiry,
        }
    }

    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

/// Per-call storage options: lifetime plus invalidation tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Ttl,
    pub tags: BTreeSet<CacheTag>,
}

impl CacheOptions {
    pub fn new(ttl: Ttl) -> Self {
        Self {
            ttl,
            tags: BTreeSet::new(),
        }
    }

    pub fn tag(mut self, tag: CacheTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = CacheTag>) -> Self {
        self.tags.extend(tags);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.capacity, 512);
        assert_eq!(config.ttl(TtlClass::Short), Ttl::seconds(60).expect("ttl"));
        assert_eq!(config.ttl(TtlClass::Medium), Ttl::seconds(300).expect("ttl"));
        assert_eq!(config.ttl(TtlClass::Long), Ttl::seconds(3600).expect("ttl"));
        assert_eq!(config.ttl(TtlClass::Static), Ttl::NoExpiry);
    }

    #[test]
    fn zero_seconds_is_not_a_ttl() {
        assert_eq!(Ttl::seconds(0), None);
    }

    #[test]
    fn no_expiry_has_no_deadline() {
        let now = Instant::now();
        assert_eq!(Ttl::NoExpiry.expires_at(now), None);
        let ttl = Ttl::seconds(5).expect("ttl");
        assert_eq!(ttl.expires_at(now), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn capacity_clamps_to_min() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }

    #[test]
    fn options_collect_unique_tags() {
        let options = CacheOptions::new(Ttl::NoExpiry)
            .tag(CacheTag::Posts)
            .tags([CacheTag::Posts, CacheTag::Comments]);
        assert_eq!(options.tags.len(), 2);
    }
}
