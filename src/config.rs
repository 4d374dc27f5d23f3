//! Construction parameters for [`TimeSeries`](crate::TimeSeries).

use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::timeseries::Index;

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimeSeriesConfig {
    /// Number of retained elements. Must be non-zero.
    pub capacity: usize,
    /// Logical index given to the first appended element. Must be above
    /// `Index::MIN`, since the empty series keeps `newest = start_index - 1`.
    pub start_index: Index,
    /// Slice length of a cancellable wait between checks of the flag.
    pub cancel_poll_interval: Duration,
}

impl TimeSeriesConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn with_start_index(mut self, start_index: Index) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn with_cancel_poll_interval(mut self, interval: Duration) -> Self {
        self.cancel_poll_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.cancel_poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.start_index == Index::MIN {
            return Err(ConfigError::StartIndexOutOfRange);
        }
        Ok(())
    }
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            start_index: 0,
            cancel_poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
        }
    }
}
