//! One-shot timers for the Dropfour event loop.
//!
//! A timer never touches game state itself. When it fires it posts an
//! event into the same channel that carries socket traffic, so every
//! state change still happens on the single task that owns the sessions.
//!
//! # Cancellation
//!
//! Arming returns a [`TimerHandle`]. Cancelling (or dropping) the handle
//! aborts the sleeping task. A timer that already fired may still have
//! its event sitting in the channel, so consumers compare the
//! [`TimerId`] carried by the event with the one they currently hold and
//! ignore anything stale:
//!
//! ```ignore
//! Event::ReconnectExpired { session, player, timer } => {
//!     if !session.reconnect_timer_is(player, timer) {
//!         return; // superseded
//!     }
//!     // ...
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Identity of one armed timer. Unique per [`TimerService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Arms timers that deliver an event of type `E` when they expire.
///
/// Cloning is cheap; clones share the id counter and the channel.
pub struct TimerService<E> {
    tx: mpsc::UnboundedSender<E>,
    next_id: Arc<AtomicU64>,
}

impl<E> Clone for TimerService<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<E: Send + 'static> TimerService<E> {
    /// Creates a service that posts expiry events into `tx`.
    pub fn new(tx: mpsc::UnboundedSender<E>) -> Self {
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Arms a timer that fires once after `after`.
    ///
    /// `make_event` receives the new timer's id so the event can carry it
    /// back for the stale check. Must be called inside a Tokio runtime.
    pub fn arm<F>(&self, after: Duration, make_event: F) -> TimerHandle
    where
        F: FnOnce(TimerId) -> E + Send + 'static,
    {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let tx = self.tx.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            trace!(%id, "timer fired");
            // Receiver gone means the event loop shut down.
            let _ = tx.send(make_event(id));
        });

        debug!(%id, after_ms = after.as_millis() as u64, "timer armed");
        TimerHandle {
            id,
            task: Some(task),
        }
    }
}

/// An armed timer. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// The id the expiry event will carry.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Cancels the timer. If it already fired, its event may still be
    /// queued and must be filtered by id.
    pub fn cancel(mut self) {
        self.abort();
    }

    /// Whether the timer has fired (or was aborted).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                trace!(id = %self.id, "timer cancelled");
            }
            task.abort();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
