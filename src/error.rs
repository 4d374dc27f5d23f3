//! Error types for timeseries reads and construction.

use core::time::Duration;

use thiserror::Error;

use crate::timeseries::Index;

/// Outcome of a read that did not produce a value.
///
/// `Evicted` is a caller logic error and is reported without blocking.
/// `Timeout` and `Cancelled` are transient: retry or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeSeriesError {
    #[error("index {index} is too old: oldest retained index is {oldest}")]
    Evicted { index: Index, oldest: Index },
    #[error("timed out after {waited:?} waiting for index {index}")]
    Timeout { index: Index, waited: Duration },
    #[error("wait for index {index} was cancelled")]
    Cancelled { index: Index },
}

impl TimeSeriesError {
    /// The logical index the failed read asked for.
    pub fn index(&self) -> Index {
        match *self {
            Self::Evicted { index, .. } | Self::Timeout { index, .. } | Self::Cancelled { index } => {
                index
            }
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    #[inline]
    pub fn is_evicted(&self) -> bool {
        matches!(self, Self::Evicted { .. })
    }
}

/// Invalid construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("capacity must be greater than zero")]
    ZeroCapacity,
    #[error("cancel poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("start index must be greater than i64::MIN")]
    StartIndexOutOfRange,
}
