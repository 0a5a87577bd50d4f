use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

/// First-come, first-served lock for async tasks sharing one logical resource.
///
/// There is no guard: the task whose [`acquire`](Self::acquire) completes owns
/// the lock until it calls [`release`](Self::release). Releasing hands the lock
/// straight to the oldest waiter, so it never looks free while someone queues.
/// A waiter dropped before it runs gives its turn back.
///
/// 先到先得的非同步互斥鎖；釋放時直接交給最早等待者。
#[derive(Debug, Default)]
pub struct FifoMutex {
    state: Mutex<LockState>,
}

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl FifoMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once the caller owns the lock.
    pub async fn acquire(&self) {
        let receiver = {
            let mut state = self.state();
            if !state.held {
                state.held = true;
                return;
            }
            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            receiver
        };

        let mut waiter = Waiter {
            lock: self,
            receiver: Some(receiver),
        };
        if let Some(receiver) = waiter.receiver.as_mut() {
            // Senders stay queued until `release` hands over, so this only
            // ever resolves with the handoff.
            let _ = receiver.await;
        }
        waiter.receiver = None;
    }

    /// Passes the lock to the next live waiter, or frees it.
    pub fn release(&self) {
        let mut state = self.state();
        while let Some(next) = state.waiters.pop_front() {
            if next.send(()).is_ok() {
                return;
            }
        }
        state.held = false;
    }

    pub fn is_held(&self) -> bool {
        self.state().held
    }

    /// Number of tasks still waiting for the lock.
    pub fn pending_count(&self) -> usize {
        self.state()
            .waiters
            .iter()
            .filter(|sender| !sender.is_closed())
            .count()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Waiter<'a> {
    lock: &'a FifoMutex,
    receiver: Option<oneshot::Receiver<()>>,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            // Ownership arrived after the waiter stopped listening.
            if receiver.try_recv().is_ok() {
                self.lock.release();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::task::yield_now;

    async fn wait_for_pending(lock: &FifoMutex, count: usize) {
        while lock.pending_count() < count {
            yield_now().await;
        }
    }

    #[tokio::test]
    async fn uncontended_acquire_and_release() {
        let lock = FifoMutex::new();
        assert!(!lock.is_held());
        lock.acquire().await;
        assert!(lock.is_held());
        assert_eq!(lock.pending_count(), 0);
        lock.release();
        assert!(!lock.is_held());
        lock.release();
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn waiters_are_served_in_arrival_order() {
        let lock = Arc::new(FifoMutex::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        lock.acquire().await;

        for i in 0..3 {
            let task_lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                task_lock.acquire().await;
                order.lock().unwrap().push(i);
            });
            wait_for_pending(&lock, i + 1).await;
        }
        assert_eq!(lock.pending_count(), 3);

        for served in 1..=3 {
            lock.release();
            assert!(lock.is_held());
            while order.lock().unwrap().len() < served {
                yield_now().await;
            }
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(lock.pending_count(), 0);

        lock.release();
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn aborted_waiter_is_skipped() {
        let lock = Arc::new(FifoMutex::new());
        lock.acquire().await;

        let waiting = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move { lock.acquire().await })
        };
        wait_for_pending(&lock, 1).await;
        waiting.abort();
        let _ = waiting.await;
        assert_eq!(lock.pending_count(), 0);

        lock.release();
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn handoff_to_a_dropped_waiter_is_returned() {
        let lock = FifoMutex::new();
        lock.acquire().await;
        {
            let waiter = lock.acquire();
            tokio::pin!(waiter);
            tokio::select! {
                biased;
                _ = &mut waiter => panic!("lock should still be held"),
                _ = std::future::ready(()) => {}
            }
            assert_eq!(lock.pending_count(), 1);
            lock.release();
            assert!(lock.is_held());
        }
        assert!(!lock.is_held());
    }
}
