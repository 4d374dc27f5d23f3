// ==============================================
// TIMESERIES CONCURRENCY TESTS (integration)
// ==============================================
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rt_timeseries::{CancelFlag, TimeSeries, TimeSeriesConfig, TimeSeriesError};

fn spawn_readers(
    series: &TimeSeries<u64>,
    readers: usize,
    count: usize,
) -> Vec<thread::JoinHandle<Vec<u64>>> {
    (0..readers)
        .map(|_| {
            let series = series.clone();
            thread::spawn(move || {
                (0..count as i64)
                    .map(|i| series.get(i).expect("index evicted before reader got to it"))
                    .collect()
            })
        })
        .collect()
}

fn input(count: usize) -> Vec<u64> {
    (0..count as u64).map(|i| i.wrapping_mul(2_654_435_761) ^ 0xdead_beef).collect()
}

#[test]
fn five_readers_reconstruct_paced_writer_sequence() {
    let count = 1000;
    let series = TimeSeries::new(count);
    let readers = spawn_readers(&series, 5, count);

    let values = input(count);
    for &v in &values {
        series.append(v);
        thread::sleep(Duration::from_millis(1));
    }

    for handle in readers {
        assert_eq!(handle.join().unwrap(), values);
    }
}

#[test]
fn lagging_readers_on_small_ring_see_ordered_values() {
    let count = 2000;
    let series = TimeSeries::<u64>::new(256);

    // A descheduled reader may be lapped; it then resumes at the oldest
    // retained index, so only whole evicted stretches may be missing.
    let readers: Vec<_> = (0..5)
        .map(|_| {
            let series = series.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                let mut index = 0;
                while index < count as i64 {
                    match series.get(index) {
                        Ok(v) => {
                            seen.push((index, v));
                            index += 1;
                        }
                        Err(TimeSeriesError::Evicted { oldest, .. }) => index = oldest,
                        Err(err) => panic!("unexpected read failure: {err}"),
                    }
                }
                seen
            })
        })
        .collect();

    let values = input(count);
    for &v in &values {
        series.append(v);
        thread::sleep(Duration::from_micros(100));
    }

    for handle in readers {
        let seen = handle.join().unwrap();
        assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(seen.iter().all(|&(i, v)| values[i as usize] == v));
        assert_eq!(seen.last().map(|&(i, _)| i), Some(count as i64 - 1));
    }
    assert_eq!(series.length(), 256);
    assert_eq!(series.oldest_timeindex(), (count - 256) as i64);
}

#[test]
fn unpaced_writer_with_full_history() {
    let count = 10_000;
    let series = TimeSeries::new(count);
    let readers = spawn_readers(&series, 4, count);

    let values = input(count);
    for &v in &values {
        series.append(v);
    }

    for handle in readers {
        assert_eq!(handle.join().unwrap(), values);
    }
}

#[test]
fn timestamps_follow_index_order_across_threads() {
    let count = 500;
    let series = TimeSeries::<u64>::new(count);
    let reader = series.clone();
    let handle = thread::spawn(move || {
        (0..count as i64)
            .map(|i| reader.timestamp_ms(i).unwrap())
            .collect::<Vec<_>>()
    });

    for v in input(count) {
        series.append(v);
    }

    let stamps = handle.join().unwrap();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn many_waiters_on_one_index_all_wake() {
    let series = TimeSeries::<u64>::new(8);
    let woken = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let series = series.clone();
            let woken = woken.clone();
            thread::spawn(move || {
                let v = series.get(5).unwrap();
                woken.fetch_add(1, Ordering::SeqCst);
                v
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    assert_eq!(woken.load(Ordering::SeqCst), 0);

    for v in 0..6 {
        series.append(v * 100);
    }
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 500);
    }
    assert_eq!(woken.load(Ordering::SeqCst), 8);
}

#[test]
fn timed_reader_gives_up_when_writer_stalls() {
    let series = TimeSeries::<u64>::new(8);
    let reader = series.clone();

    let handle = thread::spawn(move || {
        let started = Instant::now();
        let result = reader.get_timeout(3, Duration::from_millis(50));
        (result, started.elapsed())
    });

    series.append(1);
    series.append(2);

    let (result, elapsed) = handle.join().unwrap();
    assert!(matches!(result, Err(TimeSeriesError::Timeout { index: 3, .. })));
    assert!(elapsed >= Duration::from_millis(50));
}

#[test]
fn shutdown_flag_stops_live_reader() {
    let config = TimeSeriesConfig::new(16).with_cancel_poll_interval(Duration::from_millis(5));
    let series = TimeSeries::<u64>::with_config(config).unwrap();
    let flag = CancelFlag::new();

    let reader = series.clone();
    let reader_flag = flag.clone();
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        let mut index = 0;
        loop {
            match reader.get_cancellable(index, &reader_flag, None) {
                Ok(v) => {
                    seen.push(v);
                    index += 1;
                }
                Err(TimeSeriesError::Cancelled { .. }) => return seen,
                Err(err) => panic!("unexpected read failure: {err}"),
            }
        }
    });

    for v in 0..10 {
        series.append(v);
    }
    // available indices are still served after cancel; only the wait on 10 ends
    thread::sleep(Duration::from_millis(30));
    flag.cancel();

    assert_eq!(handle.join().unwrap(), (0..10).collect::<Vec<_>>());
}
