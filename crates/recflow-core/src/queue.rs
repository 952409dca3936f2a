//! Bounded multi-producer buffer between file workers and the stream.
//!
//! Pushes never block: a batch that does not fit is handed back and the
//! producer decides how to wait. Pops never block either, except for the
//! bounded wait in [`SharedQueue::pop_many_timeout`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Counters for queue traffic
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Records accepted
    pub pushed: AtomicU64,
    /// Records handed to consumers
    pub popped: AtomicU64,
    /// Pushes rejected because the batch did not fit
    pub rejected: AtomicU64,
}

impl QueueStats {
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn popped(&self) -> u64 {
        self.popped.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Capacity-limited queue of decoded records.
///
/// Occupancy (records currently buffered) never exceeds `capacity`.
pub struct SharedQueue<R> {
    items: Mutex<VecDeque<R>>,
    not_empty: Condvar,
    capacity: usize,
    stats: QueueStats,
}

impl<R> SharedQueue<R> {
    /// Create a queue holding at most `capacity` records (clamped to 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            capacity: capacity.max(1),
            stats: QueueStats::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<R>> {
        // A panicking producer cannot leave the deque half-modified
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a whole batch, or hand it back if it would overflow capacity
    pub fn try_push(&self, batch: Vec<R>) -> Result<(), Vec<R>> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut items = self.lock();
        if items.len() + batch.len() > self.capacity {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(batch);
        }
        self.stats
            .pushed
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        items.extend(batch);
        drop(items);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take up to `max` immediately available records (possibly none)
    pub fn try_pop_many(&self, max: usize) -> Vec<R> {
        let mut items = self.lock();
        self.take(&mut items, max)
    }

    /// Like [`try_pop_many`](Self::try_pop_many), but waits up to `timeout`
    /// for the first record when the queue is empty.
    pub fn pop_many_timeout(&self, max: usize, timeout: Duration) -> Vec<R> {
        let mut items = self.lock();
        if items.is_empty() && !timeout.is_zero() {
            items = self
                .not_empty
                .wait_timeout_while(items, timeout, |items| items.is_empty())
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        self.take(&mut items, max)
    }

    fn take(&self, items: &mut VecDeque<R>, max: usize) -> Vec<R> {
        let n = items.len().min(max);
        if n == 0 {
            return Vec::new();
        }
        self.stats.popped.fetch_add(n as u64, Ordering::Relaxed);
        items.drain(..n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Records currently buffered
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn push_within_capacity() {
        let q = SharedQueue::new(3);
        assert!(q.try_push(vec![1, 2]).is_ok());
        assert_eq!(q.len(), 2);
        assert!(q.try_push(vec![3]).is_ok());
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn overflow_hands_batch_back() {
        let q = SharedQueue::new(3);
        q.try_push(vec![1, 2]).unwrap();
        let rejected = q.try_push(vec![3, 4]).unwrap_err();
        assert_eq!(rejected, vec![3, 4]);
        assert_eq!(q.len(), 2);
        assert_eq!(q.stats().rejected(), 1);
    }

    #[test]
    fn batch_larger_than_capacity_never_fits() {
        let q = SharedQueue::new(2);
        assert!(q.try_push(vec![1, 2, 3]).is_err());
        assert!(q.is_empty());
    }

    #[test]
    fn empty_batch_always_accepted() {
        let q: SharedQueue<i32> = SharedQueue::new(1);
        q.try_push(vec![1]).unwrap();
        assert!(q.try_push(Vec::new()).is_ok());
    }

    #[test]
    fn zero_capacity_clamped() {
        let q = SharedQueue::new(0);
        assert_eq!(q.capacity(), 1);
        assert!(q.try_push(vec![1]).is_ok());
    }

    #[test]
    fn pop_many_respects_max_and_order() {
        let q = SharedQueue::new(10);
        q.try_push(vec![1, 2, 3, 4]).unwrap();
        assert_eq!(q.try_pop_many(3), vec![1, 2, 3]);
        assert_eq!(q.try_pop_many(10), vec![4]);
        assert!(q.try_pop_many(10).is_empty());
        assert_eq!(q.stats().pushed(), 4);
        assert_eq!(q.stats().popped(), 4);
    }

    #[test]
    fn pop_frees_capacity() {
        let q = SharedQueue::new(2);
        q.try_push(vec![1, 2]).unwrap();
        assert!(q.try_push(vec![3]).is_err());
        q.try_pop_many(1);
        assert!(q.try_push(vec![3]).is_ok());
    }

    #[test]
    fn pop_timeout_returns_empty_after_wait() {
        let q: SharedQueue<i32> = SharedQueue::new(4);
        let start = Instant::now();
        assert!(q.pop_many_timeout(4, Duration::from_millis(20)).is_empty());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn pop_timeout_wakes_on_push() {
        let q = Arc::new(SharedQueue::new(4));
        let producer = {
            let q = q.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                q.try_push(vec![7]).unwrap();
            })
        };
        let got = q.pop_many_timeout(4, Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(got, vec![7]);
    }

    #[test]
    fn concurrent_producers_no_loss_no_duplication() {
        let q = Arc::new(SharedQueue::new(16));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let q = q.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let mut batch = vec![p * 1000 + i];
                        loop {
                            match q.try_push(batch) {
                                Ok(()) => break,
                                Err(back) => {
                                    batch = back;
                                    std::thread::yield_now();
                                }
                            }
                        }
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while seen.len() < 1000 {
            let got = q.pop_many_timeout(64, Duration::from_millis(10));
            assert!(got.len() <= q.capacity());
            seen.extend(got);
        }
        for p in producers {
            p.join().unwrap();
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 1000);
        assert!(q.is_empty());
    }
}
