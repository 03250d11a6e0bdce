//! Bounded hand-off of grab results from a producer thread to the consumer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::api::{GrabResult, GrabStrategy};

/// Hand-off between a free-running producer and a blocking consumer.
///
/// With `LatestImageOnly` at most one undelivered result is held and a newer
/// one replaces it. With `OneByOne` results queue up to `capacity` and
/// further results are dropped until the consumer catches up.
pub struct GrabQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

struct QueueState {
    pending: VecDeque<GrabResult>,
    strategy: GrabStrategy,
    capacity: usize,
    produced: u64,
    dropped: u64,
}

impl GrabQueue {
    pub fn new(strategy: GrabStrategy, capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::with_capacity(capacity.max(1)),
                strategy,
                capacity: capacity.max(1),
                produced: 0,
                dropped: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Hand a completed grab to the consumer.
    pub fn push(&self, result: GrabResult) {
        let mut state = self.state.lock();
        state.produced += 1;
        match state.strategy {
            GrabStrategy::LatestImageOnly => {
                if state.pending.pop_front().is_some() {
                    state.dropped += 1;
                }
                state.pending.push_back(result);
            }
            GrabStrategy::OneByOne => {
                if state.pending.len() >= state.capacity {
                    state.dropped += 1;
                    return;
                }
                state.pending.push_back(result);
            }
        }
        drop(state);
        self.ready.notify_one();
    }

    /// Wait up to `timeout` for the next result. `None` means the wait expired.
    pub fn pop(&self, timeout: Duration) -> Option<GrabResult> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.pending.pop_front() {
                return Some(result);
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return state.pending.pop_front();
            }
        }
    }

    /// Discard anything not yet delivered.
    pub fn clear(&self) {
        self.state.lock().pending.clear();
    }

    /// Total results pushed since creation.
    pub fn produced(&self) -> u64 {
        self.state.lock().produced
    }

    /// Results discarded before delivery.
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }

    /// Results waiting for the consumer.
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::convert::RawPixelFormat;
    use std::sync::Arc;

    fn frame(value: u8) -> GrabResult {
        GrabResult::success(1, 1, RawPixelFormat::Mono8, vec![value])
    }

    #[test]
    fn latest_only_keeps_newest() {
        let q = GrabQueue::new(GrabStrategy::LatestImageOnly, 5);
        q.push(frame(1));
        q.push(frame(2));
        q.push(frame(3));

        assert_eq!(q.len(), 1);
        assert_eq!(q.dropped(), 2);
        assert_eq!(q.pop(Duration::ZERO).unwrap().buffer, vec![3]);
        assert!(q.is_empty());
    }

    #[test]
    fn one_by_one_is_fifo_and_bounded() {
        let q = GrabQueue::new(GrabStrategy::OneByOne, 2);
        q.push(frame(1));
        q.push(frame(2));
        q.push(frame(3));

        assert_eq!(q.dropped(), 1);
        assert_eq!(q.pop(Duration::ZERO).unwrap().buffer, vec![1]);
        assert_eq!(q.pop(Duration::ZERO).unwrap().buffer, vec![2]);
        assert!(q.pop(Duration::ZERO).is_none());
    }

    #[test]
    fn pop_times_out_when_empty() {
        let q = GrabQueue::new(GrabStrategy::LatestImageOnly, 1);
        let start = Instant::now();
        assert!(q.pop(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn pop_wakes_on_push_from_other_thread() {
        let q = Arc::new(GrabQueue::new(GrabStrategy::LatestImageOnly, 1));
        let producer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                q.push(frame(42));
            })
        };

        let result = q.pop(Duration::from_secs(2)).unwrap();
        assert_eq!(result.buffer, vec![42]);
        producer.join().unwrap();
    }

    #[test]
    fn clear_discards_pending() {
        let q = GrabQueue::new(GrabStrategy::OneByOne, 3);
        q.push(frame(1));
        q.push(frame(2));
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.produced(), 2);
    }

    #[test]
    fn queue_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GrabQueue>();
    }
}
