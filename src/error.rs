//! Error types for the fallible edges of the crate: construction and the registry.
//!
//! Container operations themselves never return errors; they report misses as
//! `None`/`false`.

use crate::config::{MAX_SEGMENT_BITS, MIN_SEGMENT_BITS};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("segment bits must be in {min}..={max}, got {0}", min = MIN_SEGMENT_BITS, max = MAX_SEGMENT_BITS)]
    SegmentBitsOutOfRange(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("entity is not alive")]
    DeadEntity,
    #[error("component column `{0}` refused the write (read-only)")]
    Rejected(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
