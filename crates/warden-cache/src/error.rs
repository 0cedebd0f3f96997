//! Cache error types

use thiserror::Error;
use warden_types::ErrorKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("invalid byte size {input:?}: {reason}")]
    InvalidSize { input: String, reason: &'static str },

    #[error("cache needs at least one shard")]
    ZeroShards,

    #[error("cache budget of {max_cost} bytes is too small for {shards} shards")]
    BudgetTooSmall { max_cost: u64, shards: usize },
}

impl CacheError {
    /// Every cache error is a configuration mistake.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}
