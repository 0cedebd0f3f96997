//! # warden-cache: shared cache for IdP and key-manager lookups
//!
//! One abstraction, [`Cache`], backs every cache in Warden. Entries carry a
//! caller-supplied cost and an optional TTL; the store evicts by SIEVE once the
//! total cost would exceed the configured budget.
//!
//! Values are type-erased. [`dyn Cache::get_as`](Cache) downcasts and treats a
//! type mismatch as a miss, logging a warning.

mod cache;
mod error;
mod sieve;
mod size;

pub use cache::{Cache, CacheConfig, CacheValue, Clock, ManualClock, SystemClock, TtlCache, json_cost};
pub use error::CacheError;
pub use size::{ByteSize, parse_byte_size};
