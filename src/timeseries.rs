//! Thread-safe bounded-history timeseries addressed by a logical index.
//!
//! # Overview
//! - Single writer, any number of readers.
//! - Every appended value gets the next logical index, starting at `start_index`.
//!   Indices are never reused; the physical slot `index mod capacity` is.
//! - Once `capacity` values are retained, each append evicts the oldest one.
//! - Reads of an evicted index fail immediately with [`TimeSeriesError::Evicted`].
//! - Reads of an index not yet appended block until the writer produces it,
//!   a deadline passes, or a [`CancelFlag`] is raised.
//!
//! # Locking
//! One mutex guards the slots, both index bounds and the tag. One condvar is
//! paired with it and is broadcast on every append. Waiters re-check their
//! predicate on every wake, and copy the slot out before releasing the lock,
//! since the next append may overwrite it.
//!
//! A waiter can be woken for its index and still find it gone: if the writer
//! appends `capacity` more values before the waiter re-acquires the lock, the
//! read fails with `Evicted` rather than returning the overwritten slot.

use core::fmt;
use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::cancel::CancelFlag;
use crate::clock::{Clock, MonotonicClock};
use crate::config::TimeSeriesConfig;
use crate::error::{ConfigError, TimeSeriesError};

/// Logical index of an appended element.
pub type Index = i64;

/// A value together with the time it was appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    pub value: T,
    pub timestamp_ms: f64,
}

impl<T> Sample<T> {
    #[inline]
    pub fn timestamp_s(&self) -> f64 {
        self.timestamp_ms / 1000.0
    }
}

struct State<T> {
    slots: Box<[Option<Sample<T>>]>,
    oldest: Index,
    newest: Index,
    tagged: Index,
}

impl<T> State<T> {
    fn new(capacity: usize, start_index: Index) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            oldest: start_index,
            newest: start_index - 1,
            tagged: start_index - 1,
        }
    }

    #[inline]
    fn capacity(&self) -> Index {
        self.slots.len() as Index
    }

    #[inline]
    fn len(&self) -> usize {
        if self.newest < self.oldest {
            0
        } else {
            (self.newest - self.oldest + 1) as usize
        }
    }

    #[inline]
    fn slot_for(&self, index: Index) -> usize {
        index.rem_euclid(self.capacity()) as usize
    }

    fn check_retained(&self, index: Index) -> Result<(), TimeSeriesError> {
        if index < self.oldest {
            trace!(index, oldest = self.oldest, "read rejected, index evicted");
            return Err(TimeSeriesError::Evicted {
                index,
                oldest: self.oldest,
            });
        }
        Ok(())
    }

    /// Store `sample` under the next index. Returns that index and the sample
    /// it displaced, if any.
    fn push(&mut self, sample: Sample<T>) -> (Index, Option<Sample<T>>) {
        self.newest += 1;
        if self.newest - self.oldest + 1 > self.capacity() {
            self.oldest += 1;
        }
        let slot = self.slot_for(self.newest);
        let displaced = self.slots[slot].replace(sample);
        (self.newest, displaced)
    }

    /// Caller must have checked `oldest <= index <= newest`.
    fn sample(&self, index: Index) -> &Sample<T> {
        match &self.slots[self.slot_for(index)] {
            Some(sample) => sample,
            None => unreachable!("retained index {index} maps to an empty slot"),
        }
    }
}

/// How long a reader is willing to block.
#[derive(Clone, Copy)]
enum Wait<'a> {
    Forever,
    Until(Instant),
    Cancellable {
        flag: &'a CancelFlag,
        deadline: Option<Instant>,
    },
}

impl<'a> Wait<'a> {
    fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
        timeout.and_then(|t| Instant::now().checked_add(t))
    }

    fn within(timeout: Option<Duration>) -> Self {
        match Self::deadline_after(timeout) {
            Some(deadline) => Wait::Until(deadline),
            None => Wait::Forever,
        }
    }

    fn cancellable(flag: &'a CancelFlag, timeout: Option<Duration>) -> Self {
        Wait::Cancellable {
            flag,
            deadline: Self::deadline_after(timeout),
        }
    }
}

struct Shared<T, C> {
    state: Mutex<State<T>>,
    appended: Condvar,
    clock: C,
    capacity: usize,
    start_index: Index,
    cancel_poll_interval: Duration,
}

impl<T, C> Shared<T, C> {
    /// Block until `newest >= target`.
    fn wait_for_newest(
        &self,
        state: &mut MutexGuard<'_, State<T>>,
        target: Index,
        wait: Wait<'_>,
    ) -> Result<(), TimeSeriesError> {
        let started = Instant::now();
        while state.newest < target {
            match wait {
                Wait::Forever => self.appended.wait(state),
                Wait::Until(deadline) => {
                    let timed_out = self.appended.wait_until(state, deadline).timed_out();
                    if timed_out && state.newest < target {
                        return Err(Self::timed_out(target, started));
                    }
                }
                Wait::Cancellable { flag, deadline } => {
                    if flag.is_cancelled() {
                        trace!(index = target, "wait cancelled");
                        return Err(TimeSeriesError::Cancelled { index: target });
                    }
                    // an interval too large for Instant means no slicing, only the deadline
                    let wake_at = match Instant::now().checked_add(self.cancel_poll_interval) {
                        Some(slice_end) => Some(deadline.map_or(slice_end, |d| d.min(slice_end))),
                        None => deadline,
                    };
                    let timed_out = match wake_at {
                        Some(wake_at) => self.appended.wait_until(state, wake_at).timed_out(),
                        None => {
                            self.appended.wait(state);
                            false
                        }
                    };
                    let expired = deadline.is_some_and(|d| Instant::now() >= d);
                    if timed_out && expired && state.newest < target {
                        return Err(Self::timed_out(target, started));
                    }
                }
            }
        }
        Ok(())
    }

    fn timed_out(index: Index, started: Instant) -> TimeSeriesError {
        let waited = started.elapsed();
        trace!(index, ?waited, "wait timed out");
        TimeSeriesError::Timeout { index, waited }
    }

    /// Wait for `index`, then hand its sample to `read` under the lock.
    fn read_with<R>(
        &self,
        index: Index,
        wait: Wait<'_>,
        read: impl FnOnce(&Sample<T>) -> R,
    ) -> Result<R, TimeSeriesError> {
        let mut state = self.state.lock();
        state.check_retained(index)?;
        self.wait_for_newest(&mut state, index, wait)?;
        // the writer may have lapped us before we got the lock back
        state.check_retained(index)?;
        Ok(read(state.sample(index)))
    }

    /// Wait until at least one element exists, then read the bounds.
    fn bounds(&self, wait: Wait<'_>) -> Result<(Index, Index), TimeSeriesError> {
        let mut state = self.state.lock();
        self.wait_for_newest(&mut state, self.start_index, wait)?;
        Ok((state.oldest, state.newest))
    }
}

/// Bounded history of timestamped values shared between one writer and
/// many readers.
///
/// `TimeSeries` is a handle: cloning it shares the same underlying series.
///
/// ```
/// use rt_timeseries::TimeSeries;
///
/// let series = TimeSeries::<u32>::new(3);
/// for v in 0..5 {
///     series.append(v);
/// }
///
/// assert_eq!(series.oldest_timeindex(), 2);
/// assert_eq!(series.newest_timeindex(), 4);
/// assert_eq!(series.get(3), Ok(3));
/// assert!(series.get(1).unwrap_err().is_evicted());
/// ```
pub struct TimeSeries<T, C = MonotonicClock> {
    shared: Arc<Shared<T, C>>,
}

impl<T, C> Clone for TimeSeries<T, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> TimeSeries<T, MonotonicClock> {
    /// Empty series holding at most `capacity` values, first index 0.
    ///
    /// # Panics
    /// If `capacity` is zero. See [`try_new`](Self::try_new).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        Self::build(TimeSeriesConfig::new(capacity), MonotonicClock::new())
    }

    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_config(TimeSeriesConfig::new(capacity))
    }

    pub fn with_config(config: TimeSeriesConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<T, C: Clock> TimeSeries<T, C> {
    /// Empty series stamping appends with `clock`.
    pub fn with_clock(config: TimeSeriesConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: TimeSeriesConfig, clock: C) -> Self {
        debug!(
            capacity = config.capacity,
            start_index = config.start_index,
            "timeseries created"
        );
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new(config.capacity, config.start_index)),
                appended: Condvar::new(),
                clock,
                capacity: config.capacity,
                start_index: config.start_index,
                cancel_poll_interval: config.cancel_poll_interval,
            }),
        }
    }

    /// Append `value` and wake every blocked reader. Returns its index.
    ///
    /// Must only be called from the single writer.
    pub fn append(&self, value: T) -> Index {
        let (index, displaced) = {
            let mut state = self.shared.state.lock();
            let timestamp_ms = self.shared.clock.now_ms();
            state.push(Sample {
                value,
                timestamp_ms,
            })
        };
        self.shared.appended.notify_all();
        drop(displaced);
        index
    }
}

impl<T, C> TimeSeries<T, C> {
    /// Time in milliseconds at which `index` was appended. Blocks like [`get`](Self::get).
    pub fn timestamp_ms(&self, index: Index) -> Result<f64, TimeSeriesError> {
        self.shared
            .read_with(index, Wait::Forever, |s| s.timestamp_ms)
    }

    pub fn timestamp_ms_timeout(
        &self,
        index: Index,
        timeout: Duration,
    ) -> Result<f64, TimeSeriesError> {
        self.shared
            .read_with(index, Wait::within(Some(timeout)), |s| s.timestamp_ms)
    }

    pub fn timestamp_s(&self, index: Index) -> Result<f64, TimeSeriesError> {
        self.shared
            .read_with(index, Wait::Forever, Sample::timestamp_s)
    }

    pub fn timestamp_s_timeout(
        &self,
        index: Index,
        timeout: Duration,
    ) -> Result<f64, TimeSeriesError> {
        self.shared
            .read_with(index, Wait::within(Some(timeout)), Sample::timestamp_s)
    }

    /// Newest index. Blocks while the series is empty.
    pub fn newest_timeindex(&self) -> Index {
        match self.shared.bounds(Wait::Forever) {
            Ok((_, newest)) => newest,
            Err(_) => unreachable!("untimed wait cannot fail"),
        }
    }

    pub fn newest_timeindex_timeout(&self, timeout: Duration) -> Result<Index, TimeSeriesError> {
        self.shared
            .bounds(Wait::within(Some(timeout)))
            .map(|(_, newest)| newest)
    }

    /// Oldest retained index. Blocks while the series is empty.
    pub fn oldest_timeindex(&self) -> Index {
        match self.shared.bounds(Wait::Forever) {
            Ok((oldest, _)) => oldest,
            Err(_) => unreachable!("untimed wait cannot fail"),
        }
    }

    pub fn oldest_timeindex_timeout(&self, timeout: Duration) -> Result<Index, TimeSeriesError> {
        self.shared
            .bounds(Wait::within(Some(timeout)))
            .map(|(oldest, _)| oldest)
    }

    /// Block until `index` has been appended or `max_duration` elapses.
    ///
    /// `Ok(true)` if the index became available, `Ok(false)` on timeout.
    /// `None` waits indefinitely. Fails if `index` is already evicted.
    pub fn wait_for_timeindex(
        &self,
        index: Index,
        max_duration: Option<Duration>,
    ) -> Result<bool, TimeSeriesError> {
        self.wait_inner(index, Wait::within(max_duration))
    }

    /// Like [`wait_for_timeindex`](Self::wait_for_timeindex), and also
    /// returns `Cancelled` once `flag` is raised.
    pub fn wait_for_timeindex_cancellable(
        &self,
        index: Index,
        flag: &CancelFlag,
        max_duration: Option<Duration>,
    ) -> Result<bool, TimeSeriesError> {
        self.wait_inner(index, Wait::cancellable(flag, max_duration))
    }

    fn wait_inner(&self, index: Index, wait: Wait<'_>) -> Result<bool, TimeSeriesError> {
        let mut state = self.shared.state.lock();
        state.check_retained(index)?;
        match self.shared.wait_for_newest(&mut state, index, wait) {
            Ok(()) => Ok(true),
            Err(TimeSeriesError::Timeout { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Number of retained elements.
    pub fn length(&self) -> usize {
        self.shared.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    #[inline]
    pub fn max_length(&self) -> usize {
        self.shared.capacity
    }

    #[inline]
    pub fn start_index(&self) -> Index {
        self.shared.start_index
    }

    /// Total number of appends since construction, evicted ones included.
    pub fn count_appended_elements(&self) -> u64 {
        let state = self.shared.state.lock();
        (state.newest - self.shared.start_index + 1) as u64
    }

    /// Remember `index` for [`has_changed_since_tag`](Self::has_changed_since_tag).
    pub fn tag(&self, index: Index) {
        self.shared.state.lock().tagged = index;
    }

    /// True when the newest index differs from the last tagged one.
    pub fn has_changed_since_tag(&self) -> bool {
        let state = self.shared.state.lock();
        state.tagged != state.newest
    }
}

impl<T: Clone, C> TimeSeries<T, C> {
    /// Value at `index`.
    ///
    /// Fails immediately if `index` is evicted. Blocks until the writer
    /// appends `index` if it does not exist yet.
    pub fn get(&self, index: Index) -> Result<T, TimeSeriesError> {
        self.shared
            .read_with(index, Wait::Forever, |s| s.value.clone())
    }

    /// Like [`get`](Self::get), but gives up with `Timeout` after `timeout`.
    pub fn get_timeout(&self, index: Index, timeout: Duration) -> Result<T, TimeSeriesError> {
        self.shared
            .read_with(index, Wait::within(Some(timeout)), |s| s.value.clone())
    }

    /// Like [`get`](Self::get), but gives up with `Cancelled` once `flag` is
    /// raised and with `Timeout` after `timeout`, if given.
    pub fn get_cancellable(
        &self,
        index: Index,
        flag: &CancelFlag,
        timeout: Option<Duration>,
    ) -> Result<T, TimeSeriesError> {
        self.shared
            .read_with(index, Wait::cancellable(flag, timeout), |s| s.value.clone())
    }

    /// Value and timestamp of `index`, copied out under the same lock.
    pub fn sample(&self, index: Index) -> Result<Sample<T>, TimeSeriesError> {
        self.shared.read_with(index, Wait::Forever, Sample::clone)
    }

    pub fn sample_timeout(
        &self,
        index: Index,
        timeout: Duration,
    ) -> Result<Sample<T>, TimeSeriesError> {
        self.shared
            .read_with(index, Wait::within(Some(timeout)), Sample::clone)
    }

    /// Most recently appended value. Blocks while the series is empty.
    pub fn newest_element(&self) -> T {
        let mut state = self.shared.state.lock();
        if self
            .shared
            .wait_for_newest(&mut state, self.shared.start_index, Wait::Forever)
            .is_err()
        {
            unreachable!("untimed wait cannot fail");
        }
        state.sample(state.newest).value.clone()
    }
}

impl<T, C> fmt::Debug for TimeSeries<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TimeSeries")
            .field("capacity", &self.shared.capacity)
            .field("oldest", &state.oldest)
            .field("newest", &state.newest)
            .field("tagged", &state.tagged)
            .finish()
    }
}
