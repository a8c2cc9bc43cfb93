//! The queue itself: an unbounded channel feeding one named worker thread.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::observability::Logger;

use super::errors::{QueueError, QueueResult};

/// A named, zero-argument unit of work.
///
/// The result is inspected only by the worker: an `Err` is logged against the
/// action's description and the worker moves on.
struct Action {
    description: String,
    work: Box<dyn FnOnce() -> io::Result<()> + Send + 'static>,
}

/// Single-consumer serialized action queue.
///
/// Enqueuing never blocks on I/O; the channel is unbounded and the only
/// disk-touching code path is the worker thread. Exactly one `ActionQueue`
/// exists per record-store domain, so actions for one domain are never
/// interleaved with each other.
pub struct ActionQueue {
    name: String,
    /// Dropped (set to `None`) on stop, which disconnects the channel and
    /// lets the worker drain out and exit.
    sender: Mutex<Option<Sender<Action>>>,
    /// Actions accepted but not yet executed or discarded.
    pending: Arc<AtomicUsize>,
    /// When set, the worker discards remaining actions instead of running
    /// them. Only `stop_within` flips this, after its wait bound elapses.
    abandon: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ActionQueue {
    /// Starts the queue and its worker thread.
    ///
    /// The name shows up in the worker's thread name and in every log line
    /// the worker emits, so one process running many domains stays
    /// attributable.
    pub fn start(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let abandon = Arc::new(AtomicBool::new(false));

        let worker_name = name.clone();
        let worker_pending = pending.clone();
        let worker_abandon = abandon.clone();
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(worker_name, receiver, worker_pending, worker_abandon))?;

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            pending,
            abandon,
            worker: Mutex::new(Some(join)),
        })
    }

    /// Returns the queue's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of actions accepted but not yet executed.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Appends an action to the tail of the queue.
    ///
    /// Returns immediately; the action runs later on the worker thread, after
    /// every previously accepted action. Fails with [`QueueError::Closed`]
    /// once `stop` has been called.
    pub fn enqueue<F>(&self, description: impl Into<String>, work: F) -> QueueResult<()>
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .map_err(|_| QueueError::Closed(self.name.clone()))?;

        match sender.as_ref() {
            Some(tx) => {
                self.pending.fetch_add(1, Ordering::SeqCst);
                tx.send(Action {
                    description: description.into(),
                    work: Box::new(work),
                })
                .map_err(|_| {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    QueueError::Closed(self.name.clone())
                })
            }
            None => Err(QueueError::Closed(self.name.clone())),
        }
    }

    /// Stops the queue after a full drain.
    ///
    /// Rejects new work, waits for every already-accepted action to finish,
    /// then joins the worker. This is the durable variant of shutdown; use
    /// [`ActionQueue::stop_within`] when a bounded shutdown matters more than
    /// the tail of pending writes.
    pub fn stop(&self) {
        self.close_sender();
        self.join_worker();
    }

    /// Stops the queue, waiting at most `max_wait_count * per_wait_millis`
    /// for the pending actions to drain.
    ///
    /// If the bound elapses first, the remaining actions are discarded —
    /// accepted mutations that never reach disk. That data loss is the
    /// documented trade-off of a time-bounded shutdown, not a bug.
    pub fn stop_within(&self, max_wait_count: u32, per_wait_millis: u64) {
        self.close_sender();

        let mut drained = false;
        for _ in 0..max_wait_count {
            if self.pending.load(Ordering::SeqCst) == 0 {
                drained = true;
                break;
            }
            thread::sleep(Duration::from_millis(per_wait_millis));
        }

        if !drained && self.pending.load(Ordering::SeqCst) > 0 {
            Logger::warn(
                "QUEUE_STOP_TIMEOUT",
                &[
                    ("queue", &self.name),
                    ("remaining", &self.pending().to_string()),
                ],
            );
            self.abandon.store(true, Ordering::SeqCst);
        }

        self.join_worker();
    }

    fn close_sender(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    fn join_worker(&self) {
        let handle = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for ActionQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The worker: drains the channel head-first until it disconnects.
///
/// Runs every action to completion before looking at the next one. Action
/// failures are logged and swallowed here; the enqueuing caller has already
/// returned and must not assume disk success.
fn worker_loop(
    name: String,
    receiver: Receiver<Action>,
    pending: Arc<AtomicUsize>,
    abandon: Arc<AtomicBool>,
) {
    while let Ok(action) = receiver.recv() {
        if abandon.load(Ordering::SeqCst) {
            Logger::warn(
                "QUEUE_ACTION_DISCARDED",
                &[("queue", &name), ("action", &action.description)],
            );
            pending.fetch_sub(1, Ordering::SeqCst);
            continue;
        }

        if let Err(e) = (action.work)() {
            Logger::error(
                "QUEUE_ACTION_FAILED",
                &[
                    ("queue", &name),
                    ("action", &action.description),
                    ("error", &e.to_string()),
                ],
            );
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn test_actions_run_in_submission_order() {
        let queue = ActionQueue::start("test-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100u32 {
            let seen = seen.clone();
            queue
                .enqueue(format!("record step {}", i), move || {
                    seen.lock().unwrap().push(i);
                    Ok(())
                })
                .unwrap();
        }
        queue.stop();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 100);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_failed_action_does_not_halt_worker() {
        let queue = ActionQueue::start("test-failure-isolation").unwrap();
        let ran_after_failure = Arc::new(AtomicBool::new(false));

        queue
            .enqueue("always fails", || {
                Err(io::Error::new(io::ErrorKind::Other, "simulated"))
            })
            .unwrap();
        let flag = ran_after_failure.clone();
        queue
            .enqueue("runs anyway", move || {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        queue.stop();

        assert!(ran_after_failure.load(Ordering::SeqCst));
    }

    #[test]
    fn test_enqueue_after_stop_is_rejected() {
        let queue = ActionQueue::start("test-closed").unwrap();
        queue.stop();

        let result = queue.enqueue("too late", || Ok(()));
        assert!(matches!(result, Err(QueueError::Closed(_))));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_stop_drains_fully() {
        let queue = ActionQueue::start("test-drain").unwrap();
        let counter = Arc::new(AtomicU64::new(0));

        for _ in 0..50 {
            let counter = counter.clone();
            queue
                .enqueue("bump", move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        queue.stop();

        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_bounded_stop_discards_remainder() {
        let queue = ActionQueue::start("test-abandon").unwrap();
        let executed = Arc::new(AtomicU64::new(0));

        // The first action outlasts the stop bound; the rest should be
        // discarded rather than executed.
        queue
            .enqueue("slow write", || {
                thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .unwrap();
        for _ in 0..10 {
            let executed = executed.clone();
            queue
                .enqueue("later write", move || {
                    executed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }

        queue.stop_within(2, 10);

        assert_eq!(executed.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending(), 0);
    }
}
