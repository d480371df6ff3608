//! Last-trigger-wins coordination for overlapping scans.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::task::JoinHandle;

/// Ticket handed out when a refresh is triggered. Higher is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Holds the displayed result and the ticket it was produced under. A
/// completion is accepted only if its ticket is newer than the one shown.
pub struct RefreshGate<T> {
    next: AtomicU64,
    current: Mutex<Option<(RefreshTicket, T)>>,
}

impl<T> Default for RefreshGate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RefreshGate<T> {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            current: Mutex::new(None),
        }
    }

    pub fn trigger(&self) -> RefreshTicket {
        RefreshTicket(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Store `result` if `ticket` is newer than what is displayed.
    /// Returns whether it was accepted.
    pub fn complete(&self, ticket: RefreshTicket, result: T) -> bool {
        self.complete_with(ticket, result, |_| {})
    }

    /// Like [`complete`](Self::complete), but runs `show` on the accepted
    /// result before the lock is released, so two accepted completions can
    /// never display in the reverse order of acceptance.
    pub fn complete_with<F>(&self, ticket: RefreshTicket, result: T, show: F) -> bool
    where
        F: FnOnce(&T),
    {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match current.as_ref() {
            Some((shown, _)) if *shown >= ticket => {
                tracing::debug!(
                    "Dropping stale refresh #{} (showing #{})",
                    ticket.id(),
                    shown.id()
                );
                false
            }
            _ => {
                show(&result);
                *current = Some((ticket, result));
                true
            }
        }
    }

    pub fn displayed_ticket(&self) -> Option<RefreshTicket> {
        let current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        current.as_ref().map(|(t, _)| *t)
    }
}

impl<T: Clone> RefreshGate<T> {
    pub fn displayed(&self) -> Option<T> {
        let current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        current.as_ref().map(|(_, v)| v.clone())
    }
}

/// At most one background refresh at a time. A trigger that arrives while
/// the previous task is still running is skipped.
#[derive(Default)]
pub struct SingleFlight {
    running: Option<JoinHandle<()>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.running.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn `task` unless one is still in flight. Returns whether it was spawned.
    pub fn try_spawn<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_busy() {
            return false;
        }
        self.running = Some(tokio::spawn(task));
        true
    }

    /// Abort whatever is running, e.g. on shutdown.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.running.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_tickets_increase() {
        let gate: RefreshGate<u32> = RefreshGate::new();
        let a = gate.trigger();
        let b = gate.trigger();
        assert!(b > a);
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let gate = RefreshGate::new();
        let first = gate.trigger();
        let second = gate.trigger();

        assert!(gate.complete(second, "second"));
        // slow first scan finishes late
        assert!(!gate.complete(first, "first"));
        assert_eq!(gate.displayed(), Some("second"));
        assert_eq!(gate.displayed_ticket(), Some(second));
    }

    #[test]
    fn test_in_order_completions_replace() {
        let gate = RefreshGate::new();
        let first = gate.trigger();
        assert!(gate.complete(first, 1));
        let second = gate.trigger();
        assert!(gate.complete(second, 2));
        assert_eq!(gate.displayed(), Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_scans_newest_wins() {
        let gate = Arc::new(RefreshGate::new());
        let mut handles = Vec::new();

        // earlier triggers take longer
        for delay_ms in [40u64, 20, 5] {
            let ticket = gate.trigger();
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                gate.complete(ticket, ticket.id());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(gate.displayed(), Some(3));
    }

    #[test]
    fn test_accepted_views_show_in_acceptance_order() {
        let gate = Arc::new(RefreshGate::new());
        let shown = Arc::new(Mutex::new(Vec::new()));
        let first = gate.trigger();
        let second = gate.trigger();
        let (inside_tx, inside_rx) = mpsc::channel();

        // first is accepted and is still drawing when second completes
        let slow = {
            let gate = Arc::clone(&gate);
            let shown = Arc::clone(&shown);
            thread::spawn(move || {
                gate.complete_with(first, 1, |v| {
                    inside_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(50));
                    shown.lock().unwrap().push(*v);
                })
            })
        };
        inside_rx.recv().unwrap();

        let fast = {
            let gate = Arc::clone(&gate);
            let shown = Arc::clone(&shown);
            thread::spawn(move || gate.complete_with(second, 2, |v| shown.lock().unwrap().push(*v)))
        };

        assert!(slow.join().unwrap());
        assert!(fast.join().unwrap());
        assert_eq!(*shown.lock().unwrap(), vec![1, 2]);
        assert_eq!(gate.displayed(), Some(2));
    }

    #[test]
    fn test_rejected_completion_shows_nothing() {
        let gate = RefreshGate::new();
        let first = gate.trigger();
        let second = gate.trigger();
        assert!(gate.complete(second, 2));

        let mut called = false;
        assert!(!gate.complete_with(first, 1, |_| called = true));
        assert!(!called);
    }

    #[tokio::test]
    async fn test_single_flight_skips_while_running() {
        let mut flight = SingleFlight::new();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        assert!(flight.try_spawn(async move {
            let _ = release_rx.await;
        }));
        assert!(flight.is_busy());
        assert!(!flight.try_spawn(async {}));

        release_tx.send(()).unwrap();
        while flight.is_busy() {
            tokio::task::yield_now().await;
        }
        assert!(flight.try_spawn(async {}));
    }

    #[tokio::test]
    async fn test_single_flight_cancel_frees_slot() {
        let mut flight = SingleFlight::new();
        assert!(flight.try_spawn(std::future::pending()));
        flight.cancel();
        assert!(!flight.is_busy());
        assert!(flight.try_spawn(async {}));
    }
}
