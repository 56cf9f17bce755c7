use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A double-ended queue shared between threads.
///
/// Every operation takes the same lock, so any number of producers and
/// consumers may use one instance concurrently. Each push signals one thread
/// blocked in [`ConcurrentQueue::wait`].
pub struct ConcurrentQueue<T> {
    items: Mutex<VecDeque<T>>,
    ready: Condvar,
}

impl<T> ConcurrentQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    /// Add an item to the back of the queue.
    pub fn push_back(&self, item: T) {
        self.items.lock().push_back(item);
        self.ready.notify_one();
    }

    /// Add an item to the front of the queue.
    pub fn push_front(&self, item: T) {
        self.items.lock().push_front(item);
        self.ready.notify_one();
    }

    /// Remove and return the item at the front, if any.
    pub fn pop_front(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Remove and return the item at the back, if any.
    pub fn pop_back(&self) -> Option<T> {
        self.items.lock().pop_back()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }

    /// Take every queued item, front first.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    /// Block until the queue is non-empty.
    ///
    /// The predicate is re-tested under the lock after every wake, so
    /// spurious wakeups are ignored and a push that lands before the wait
    /// starts is never missed.
    pub fn wait(&self) {
        let mut items = self.items.lock();
        while items.is_empty() {
            self.ready.wait(&mut items);
        }
    }

    /// Block until the queue is non-empty or `timeout` elapses.
    ///
    /// Returns `true` if the queue is non-empty on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        while items.is_empty() {
            if self.ready.wait_until(&mut items, deadline).timed_out() {
                return !items.is_empty();
            }
        }
        true
    }
}

impl<T: Clone> ConcurrentQueue<T> {
    /// Clone of the item at the front, left in place.
    pub fn front(&self) -> Option<T> {
        self.items.lock().front().cloned()
    }

    /// Clone of the item at the back, left in place.
    pub fn back(&self) -> Option<T> {
        self.items.lock().back().cloned()
    }
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ConcurrentQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn push_back_pop_front_is_fifo() {
        let queue = ConcurrentQueue::new();
        queue.push_back("a");
        queue.push_back("b");
        queue.push_back("c");

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_front(), Some("a"));
        assert_eq!(queue.pop_front(), Some("b"));
        assert_eq!(queue.pop_front(), Some("c"));
        assert_eq!(queue.pop_front(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn both_ends() {
        let queue = ConcurrentQueue::new();
        queue.push_back(2);
        queue.push_front(1);
        queue.push_back(3);

        assert_eq!(queue.front(), Some(1));
        assert_eq!(queue.back(), Some(3));
        assert_eq!(queue.pop_back(), Some(3));
        assert_eq!(queue.pop_front(), Some(1));
        assert_eq!(queue.pop_back(), Some(2));
        assert_eq!(queue.pop_back(), None);
    }

    #[test]
    fn clear_and_drain() {
        let queue = ConcurrentQueue::new();
        for i in 0..5 {
            queue.push_back(i);
        }
        assert_eq!(queue.drain(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());

        queue.push_back(9);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.front(), None);
    }

    #[test]
    fn concurrent_pushers_keep_per_thread_order() {
        const PUSHERS: usize = 4;
        const PER_PUSHER: usize = 2_000;

        let queue = Arc::new(ConcurrentQueue::new());
        let handles: Vec<_> = (0..PUSHERS)
            .map(|pusher| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for seq in 0..PER_PUSHER {
                        queue.push_back((pusher, seq));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let items = queue.drain();
        assert_eq!(items.len(), PUSHERS * PER_PUSHER);

        let mut next = [0usize; PUSHERS];
        for (pusher, seq) in items {
            assert_eq!(seq, next[pusher], "pusher {pusher} out of order");
            next[pusher] += 1;
        }
        assert!(next.iter().all(|&n| n == PER_PUSHER));
    }

    #[test]
    fn wait_blocks_until_push() {
        let queue = Arc::new(ConcurrentQueue::new());
        let woke = Arc::new(AtomicBool::new(false));

        let waiter = {
            let queue = Arc::clone(&queue);
            let woke = Arc::clone(&woke);
            thread::spawn(move || {
                queue.wait();
                woke.store(true, Ordering::SeqCst);
                assert!(!queue.is_empty());
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!woke.load(Ordering::SeqCst), "wait returned on empty queue");

        queue.push_back(1u8);
        waiter.join().unwrap();
        assert!(woke.load(Ordering::SeqCst));
    }

    #[test]
    fn wait_returns_immediately_when_non_empty() {
        let queue = ConcurrentQueue::new();
        queue.push_front(5);
        queue.wait();
        assert_eq!(queue.pop_front(), Some(5));
    }

    #[test]
    fn no_lost_wakeups_under_ping_pong() {
        const ROUNDS: usize = 10_000;

        let ping = Arc::new(ConcurrentQueue::new());
        let pong = Arc::new(ConcurrentQueue::new());

        let worker = {
            let ping = Arc::clone(&ping);
            let pong = Arc::clone(&pong);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    ping.wait();
                    assert!(!ping.is_empty());
                    let value: usize = ping.pop_front().unwrap();
                    pong.push_back(value + 1);
                }
            })
        };

        for round in 0..ROUNDS {
            ping.push_back(round);
            assert!(
                pong.wait_timeout(Duration::from_secs(5)),
                "lost wakeup at round {round}"
            );
            assert_eq!(pong.pop_front(), Some(round + 1));
        }

        worker.join().unwrap();
        assert!(ping.is_empty());
        assert!(pong.is_empty());
    }

    #[test]
    fn wait_timeout_expires_on_empty_queue() {
        let queue: ConcurrentQueue<u8> = ConcurrentQueue::new();
        let start = Instant::now();
        assert!(!queue.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
