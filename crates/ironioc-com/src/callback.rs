//! Priority callback queue.
//!
//! Three priority bands, each drained by its own worker thread so a slow
//! low-priority callback never delays a high-priority one. A timer thread
//! holds delayed requests in a min-heap and moves each onto its band when
//! due; delayed requests can be cancelled up until they fire.

use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};

/// Execution band of a queued callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct ReadyInner {
    bands: [VecDeque<Job>; 3],
    shutdown: bool,
}

struct ReadyShared {
    inner: Mutex<ReadyInner>,
    wake: Condvar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerKey {
    due: Instant,
    seq: u64,
}

// BinaryHeap is a max-heap; reverse the ordering to pop the earliest due
// time first, with the sequence number breaking ties in submission order.
impl Ord for TimerKey {
    fn cmp(&self, other: &TimerKey) -> std::cmp::Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerKey {
    fn partial_cmp(&self, other: &TimerKey) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct TimerInner {
    heap: BinaryHeap<TimerKey>,
    pending: HashMap<u64, (Priority, Job)>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerShared {
    inner: Mutex<TimerInner>,
    wake: Condvar,
}

/// Handle to a delayed request; cancellation is idempotent.
pub struct DelayedHandle {
    seq: u64,
    timer: Arc<TimerShared>,
}

impl DelayedHandle {
    /// Withdraw the request if it has not fired yet. Returns whether the
    /// request was still pending.
    pub fn cancel(&self) -> bool {
        let mut inner = self.timer.inner.lock();
        inner.pending.remove(&self.seq).is_some()
    }
}

impl std::fmt::Debug for DelayedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedHandle").field("seq", &self.seq).finish()
    }
}

/// Worker-backed callback queue with three priority bands and a timer.
pub struct CallbackQueue {
    ready: Arc<ReadyShared>,
    timer: Arc<TimerShared>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl CallbackQueue {
    pub fn new() -> CallbackQueue {
        let ready = Arc::new(ReadyShared {
            inner: Mutex::new(ReadyInner {
                bands: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
                shutdown: false,
            }),
            wake: Condvar::new(),
        });
        let timer = Arc::new(TimerShared {
            inner: Mutex::new(TimerInner {
                heap: BinaryHeap::new(),
                pending: HashMap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let mut threads = Vec::with_capacity(4);
        for prio in Priority::ALL {
            let shared = Arc::clone(&ready);
            threads.push(
                thread::Builder::new()
                    .name(format!("cb-{}", prio.name()))
                    .spawn(move || worker_loop(&shared, prio))
                    .unwrap_or_else(|_| panic!("spawn cb-{} worker", prio.name())),
            );
        }
        {
            let t = Arc::clone(&timer);
            let r = Arc::clone(&ready);
            threads.push(
                thread::Builder::new()
                    .name("cb-timer".to_owned())
                    .spawn(move || timer_loop(&t, &r))
                    .unwrap_or_else(|_| panic!("spawn cb-timer thread")),
            );
        }
        CallbackQueue {
            ready,
            timer,
            threads,
        }
    }

    /// Queue `f` for execution on the band's worker thread.
    pub fn schedule(&self, priority: Priority, f: impl FnOnce() + Send + 'static) {
        enqueue(&self.ready, priority, Box::new(f));
    }

    /// Queue `f` to run on the band's worker after `delay`.
    pub fn schedule_after(
        &self,
        priority: Priority,
        delay: Duration,
        f: impl FnOnce() + Send + 'static,
    ) -> DelayedHandle {
        let due = Instant::now() + delay;
        let seq = {
            let mut inner = self.timer.inner.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.pending.insert(seq, (priority, Box::new(f)));
            inner.heap.push(TimerKey { due, seq });
            seq
        };
        self.timer.wake.notify_one();
        DelayedHandle {
            seq,
            timer: Arc::clone(&self.timer),
        }
    }

    /// Number of callbacks waiting in a band (not counting one mid-run).
    pub fn queued(&self, priority: Priority) -> usize {
        self.ready.inner.lock().bands[priority.index()].len()
    }

    /// Number of delayed requests not yet fired or cancelled.
    pub fn delayed_pending(&self) -> usize {
        self.timer.inner.lock().pending.len()
    }
}

impl Default for CallbackQueue {
    fn default() -> Self {
        CallbackQueue::new()
    }
}

impl Drop for CallbackQueue {
    fn drop(&mut self) {
        self.ready.inner.lock().shutdown = true;
        self.ready.wake.notify_all();
        self.timer.inner.lock().shutdown = true;
        self.timer.wake.notify_all();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn enqueue(ready: &ReadyShared, priority: Priority, job: Job) {
    {
        let mut inner = ready.inner.lock();
        if inner.shutdown {
            tracing::warn!(
                priority = priority.name(),
                "callback scheduled after shutdown, dropped"
            );
            return;
        }
        inner.bands[priority.index()].push_back(job);
    }
    ready.wake.notify_all();
}

fn worker_loop(shared: &ReadyShared, priority: Priority) {
    let mut guard = shared.inner.lock();
    loop {
        if let Some(job) = guard.bands[priority.index()].pop_front() {
            drop(guard);
            job();
            guard = shared.inner.lock();
            continue;
        }
        if guard.shutdown {
            break;
        }
        shared.wake.wait(&mut guard);
    }
}

fn timer_loop(timer: &TimerShared, ready: &ReadyShared) {
    let mut guard = timer.inner.lock();
    loop {
        if guard.shutdown {
            break;
        }
        let now = Instant::now();
        match guard.heap.peek().copied() {
            Some(key) if key.due <= now => {
                guard.heap.pop();
                // Absent from the pending map means it was cancelled.
                if let Some((priority, job)) = guard.pending.remove(&key.seq) {
                    drop(guard);
                    enqueue(ready, priority, job);
                    guard = timer.inner.lock();
                }
            }
            Some(key) => {
                let wait = key.due.saturating_duration_since(now);
                timer.wake.wait_for(&mut guard, wait);
            }
            None => {
                timer.wake.wait(&mut guard);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    const TICK: Duration = Duration::from_millis(500);

    #[test]
    fn immediate_callback_runs() {
        let queue = CallbackQueue::new();
        let (tx, rx) = mpsc::channel();
        queue.schedule(Priority::Medium, move || tx.send(42).unwrap());
        assert_eq!(rx.recv_timeout(TICK).unwrap(), 42);
    }

    #[test]
    fn bands_drain_independently() {
        let queue = CallbackQueue::new();
        let (block_tx, block_rx) = mpsc::channel::<()>();
        let (tx, rx) = mpsc::channel();
        // Park the low band worker.
        queue.schedule(Priority::Low, move || {
            block_rx.recv_timeout(Duration::from_secs(5)).ok();
        });
        let tx2 = tx.clone();
        queue.schedule(Priority::High, move || tx2.send("high").unwrap());
        assert_eq!(
            rx.recv_timeout(TICK).unwrap(),
            "high",
            "high band must not wait behind a busy low band"
        );
        block_tx.send(()).unwrap();
    }

    #[test]
    fn delayed_callback_fires_after_delay() {
        let queue = CallbackQueue::new();
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();
        queue.schedule_after(Priority::Medium, Duration::from_millis(30), move || {
            tx.send(()).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancel_is_idempotent_and_stops_delivery() {
        let queue = CallbackQueue::new();
        let (tx, rx) = mpsc::channel();
        let handle = queue.schedule_after(Priority::Medium, Duration::from_millis(60), move || {
            tx.send(()).unwrap();
        });
        assert!(handle.cancel(), "first cancel wins");
        assert!(!handle.cancel(), "second cancel is a no-op");
        assert!(
            rx.recv_timeout(Duration::from_millis(150)).is_err(),
            "cancelled request must not fire"
        );
        assert_eq!(queue.delayed_pending(), 0);
    }

    #[test]
    fn cancel_after_fire_reports_false() {
        let queue = CallbackQueue::new();
        let (tx, rx) = mpsc::channel();
        let handle = queue.schedule_after(Priority::High, Duration::from_millis(5), move || {
            tx.send(()).unwrap();
        });
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(!handle.cancel());
    }

    #[test]
    fn fifo_within_a_band() {
        let queue = CallbackQueue::new();
        let (tx, rx) = mpsc::channel();
        for n in 0..8 {
            let tx = tx.clone();
            queue.schedule(Priority::Medium, move || tx.send(n).unwrap());
        }
        let got: Vec<i32> = (0..8).map(|_| rx.recv_timeout(TICK).unwrap()).collect();
        assert_eq!(got, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn drop_joins_workers() {
        let queue = CallbackQueue::new();
        let (tx, rx) = mpsc::channel();
        queue.schedule(Priority::Low, move || tx.send(()).unwrap());
        rx.recv_timeout(TICK).unwrap();
        drop(queue);
    }
}
