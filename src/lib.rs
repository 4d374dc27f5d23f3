//! Thread-safe bounded-history timeseries for real-time control loops.
//!
//! # Highlights
//! - One writer appends timestamped values; any number of readers access them
//!   by an ever-increasing logical index.
//! - Bounded memory: only the newest `capacity` values are retained.
//! - Readers block for values that have not been produced yet, with optional
//!   timeouts and cooperative cancellation.
//!
//! # Quick start
//! ```
//! use std::thread;
//! use rt_timeseries::TimeSeries;
//!
//! let series = TimeSeries::<f64>::new(100);
//! let reader = series.clone();
//!
//! let handle = thread::spawn(move || reader.get(2));
//! for v in [0.5, 1.5, 2.5] {
//!     series.append(v);
//! }
//! assert_eq!(handle.join().unwrap(), Ok(2.5));
//! ```
//!
//! # Semantics
//! - The first appended value gets index `start_index` (default `0`).
//! - Reading an index older than `oldest_timeindex()` fails with
//!   [`TimeSeriesError::Evicted`] and never blocks.
//! - Reading a future index blocks; timed variants return
//!   [`TimeSeriesError::Timeout`], cancellable ones
//!   [`TimeSeriesError::Cancelled`].
//! - `tag`/`has_changed_since_tag` give cheap "new data?" polling.
//!
//! # Concurrency
//! Single writer by convention: `append` is safe to call from several threads
//! but index order then follows lock acquisition order. Values are copied out
//! under the lock, so every reader of an index sees the same value.

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod timeseries;

pub use cancel::CancelFlag;
pub use clock::{Clock, MonotonicClock, SystemClock};
pub use config::TimeSeriesConfig;
pub use error::{ConfigError, TimeSeriesError};
pub use timeseries::{Index, Sample, TimeSeries};
