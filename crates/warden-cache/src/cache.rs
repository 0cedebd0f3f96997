//! The [`Cache`] abstraction and its sharded SIEVE implementation.

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::sieve::SieveCache;

/// Type-erased cached value.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

// ============================================================================
// Cache trait
// ============================================================================

/// Key-value store with per-entry cost and TTL.
///
/// Every operation is atomic per key. Implementations must never block on
/// upstream I/O; callers fetch on a miss and then `set`.
pub trait Cache: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<CacheValue>;

    /// Stores `value` with the default TTL. Returns `false` if the entry was rejected.
    fn set(&self, key: &str, value: CacheValue, cost: u64) -> bool;

    /// Stores `value` with an explicit TTL (`None` never expires).
    fn set_with_ttl(&self, key: &str, value: CacheValue, cost: u64, ttl: Option<Duration>)
    -> bool;

    fn delete(&self, key: &str);

    /// Drops every entry.
    fn invalidate(&self);
}

impl dyn Cache {
    /// Typed lookup. A value of the wrong type is logged and treated as a miss.
    pub fn get_as<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self.get(key)?;
        match value.downcast::<T>() {
            Ok(typed) => Some(typed),
            Err(_) => {
                warn!(
                    key,
                    expected = std::any::type_name::<T>(),
                    "cached value has unexpected type, treating as miss"
                );
                None
            }
        }
    }

    /// Typed store with the default TTL.
    pub fn set_as<T>(&self, key: &str, value: T, cost: u64) -> bool
    where
        T: Any + Send + Sync,
    {
        self.set(key, Arc::new(value), cost)
    }
}

/// Cost of a value measured as the length of its JSON encoding.
///
/// Values that fail to serialize cost 1.
pub fn json_cost<T: Serialize + ?Sized>(value: &T) -> u64 {
    serde_json::to_vec(value).map_or(1, |bytes| bytes.len().max(1) as u64)
}

// ============================================================================
// Clock
// ============================================================================

/// Time source for expiry.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

// ============================================================================
// TtlCache
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Total cost budget, split evenly across shards.
    pub max_cost: u64,
    /// TTL applied by [`Cache::set`]. `None` never expires.
    pub default_ttl: Option<Duration>,
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cost: 1 << 30,
            default_ttl: Some(Duration::from_secs(60)),
            shards: 16,
        }
    }
}

/// Sharded cost-bounded cache.
///
/// Keys hash to one shard; each shard has its own lock, so unrelated keys do
/// not contend.
#[derive(Debug)]
pub struct TtlCache {
    shards: Vec<Mutex<SieveCache<String, CacheValue>>>,
    default_ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        if config.shards == 0 {
            return Err(CacheError::ZeroShards);
        }
        let per_shard = config.max_cost / config.shards as u64;
        if per_shard == 0 {
            return Err(CacheError::BudgetTooSmall {
                max_cost: config.max_cost,
                shards: config.shards,
            });
        }
        debug!(
            max_cost = config.max_cost,
            shards = config.shards,
            ttl = ?config.default_ttl,
            "creating cache"
        );
        let shards = (0..config.shards)
            .map(|_| Mutex::new(SieveCache::new(per_shard)))
            .collect();
        Ok(Self {
            shards,
            default_ttl: config.default_ttl,
            clock,
        })
    }

    fn shard(&self, key: &str) -> &Mutex<SieveCache<String, CacheValue>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    /// Number of live entries (including not-yet-collected expired ones).
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_cost(&self) -> u64 {
        self.shards.iter().map(|s| s.lock().cost()).sum()
    }
}

impl Cache for TtlCache {
    fn get(&self, key: &str) -> Option<CacheValue> {
        let now = self.clock.now();
        self.shard(key).lock().get(&key.to_string(), now)
    }

    fn set(&self, key: &str, value: CacheValue, cost: u64) -> bool {
        self.set_with_ttl(key, value, cost, self.default_ttl)
    }

    fn set_with_ttl(
        &self,
        key: &str,
        value: CacheValue,
        cost: u64,
        ttl: Option<Duration>,
    ) -> bool {
        let now = self.clock.now();
        // A TTL past the end of the clock's range never expires.
        let expires_at = ttl.and_then(|ttl| now.checked_add(ttl));
        let stored = self
            .shard(key)
            .lock()
            .insert(key.to_string(), value, cost, expires_at, now);
        if !stored {
            debug!(key, cost, "cache entry rejected: cost exceeds shard budget");
        }
        stored
    }

    fn delete(&self, key: &str) {
        self.shard(key).lock().remove(&key.to_string());
    }

    fn invalidate(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }
}
