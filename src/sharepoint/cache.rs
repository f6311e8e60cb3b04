//! Site/drive id cache with time-to-live (TTL) support.
//!
//! Name-based operations resolve `domain + site + drive name` to ids with two
//! Graph calls; the result is stable, so it is kept for an hour.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use super::DriveRef;

/// Cache TTL in hours.
const CACHE_TTL_HOURS: i64 = 1;

/// Cached data with timestamp.
#[derive(Debug, Clone)]
struct CachedData<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LocationKey {
    domain: String,
    site: String,
    drive: String,
}

impl LocationKey {
    fn new(domain: &str, site: &str, drive: &str) -> Self {
        Self {
            domain: domain.to_ascii_lowercase(),
            site: site.trim_matches('/').to_string(),
            drive: drive.to_string(),
        }
    }
}

/// Drive location cache with 1-hour TTL.
#[derive(Debug, Clone)]
pub struct LocationCache {
    entries: HashMap<LocationKey, CachedData<DriveRef>>,
    ttl: Duration,
}

impl Default for LocationCache {
    fn default() -> Self {
        Self::with_ttl(Duration::hours(CACHE_TTL_HOURS))
    }
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Get a cached drive location if still valid.
    pub fn get(&self, domain: &str, site: &str, drive: &str) -> Option<&DriveRef> {
        self.entries
            .get(&LocationKey::new(domain, site, drive))
            .filter(|cached| self.is_valid(&cached.cached_at))
            .map(|cached| &cached.data)
    }

    /// Store a resolved drive location.
    pub fn insert(&mut self, domain: &str, site: &str, drive: &str, location: DriveRef) {
        self.entries.insert(
            LocationKey::new(domain, site, drive),
            CachedData {
                data: location,
                cached_at: Utc::now(),
            },
        );
    }

    /// Invalidate the whole cache.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_valid(&self, cached_at: &DateTime<Utc>) -> bool {
        Utc::now() - *cached_at < self.ttl
    }
}
