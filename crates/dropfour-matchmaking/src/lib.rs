//! Matchmaking for Dropfour.
//!
//! Players wait in a FIFO queue. The two earliest entries are paired as
//! soon as there are two; anyone who waits longer than
//! [`MatchmakingConfig::bot_fallback`] gets a game against the bot
//! instead. The fallback is a timer per entry whose event names the
//! player and carries the timer's id, so a fire that raced with a
//! pairing or a re-join is recognised as stale by
//! [`MatchmakingQueue::take_expired`].

use std::collections::VecDeque;
use std::time::Duration;

use dropfour_timer::{TimerHandle, TimerId, TimerService};
use tokio::time::Instant;
use tracing::{debug, info};

/// Tunables for the queue.
#[derive(Debug, Clone)]
pub struct MatchmakingConfig {
    /// How long a lone player waits before being matched with the bot.
    ///
    /// Default: 60 seconds.
    pub bot_fallback: Duration,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            bot_fallback: Duration::from_secs(60),
        }
    }
}

impl MatchmakingConfig {
    /// Shortest fallback accepted by [`validated`](Self::validated).
    pub const MIN_BOT_FALLBACK: Duration = Duration::from_millis(100);

    /// Clamps out-of-range values.
    pub fn validated(mut self) -> Self {
        if self.bot_fallback < Self::MIN_BOT_FALLBACK {
            tracing::warn!(
                fallback_ms = self.bot_fallback.as_millis() as u64,
                "bot_fallback below minimum, clamping"
            );
            self.bot_fallback = Self::MIN_BOT_FALLBACK;
        }
        self
    }
}

#[derive(Debug)]
struct QueueEntry {
    username: String,
    enqueued_at: Instant,
    fallback: TimerHandle,
}

/// Players waiting for an opponent, oldest first.
#[derive(Debug)]
pub struct MatchmakingQueue {
    entries: VecDeque<QueueEntry>,
    config: MatchmakingConfig,
}

impl MatchmakingQueue {
    pub fn new(config: MatchmakingConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    /// Adds `username` at the back of the queue and arms its bot
    /// fallback. A previous entry for the same name is replaced.
    ///
    /// Returns the 1-based queue length after insertion.
    pub fn enqueue<E, F>(&mut self, username: &str, timers: &TimerService<E>, on_fallback: F) -> usize
    where
        E: Send + 'static,
        F: FnOnce(TimerId) -> E + Send + 'static,
    {
        self.cancel(username);
        let fallback = timers.arm(self.config.bot_fallback, on_fallback);
        debug!(username, timer = %fallback.id(), "queued for matchmaking");
        self.entries.push_back(QueueEntry {
            username: username.to_string(),
            enqueued_at: Instant::now(),
            fallback,
        });
        self.entries.len()
    }

    /// Dequeues the two earliest entries, if there are two.
    pub fn try_pair(&mut self) -> Option<(String, String)> {
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.pop_front()?;
        let second = self.entries.pop_front()?;
        first.fallback.cancel();
        second.fallback.cancel();
        info!(
            player1 = %first.username,
            player2 = %second.username,
            waited_ms = first.enqueued_at.elapsed().as_millis() as u64,
            "players paired"
        );
        Some((first.username, second.username))
    }

    /// Removes `username` from the queue. Returns whether it was there.
    pub fn cancel(&mut self, username: &str) -> bool {
        match self.index_of(username) {
            Some(i) => {
                if let Some(entry) = self.entries.remove(i) {
                    entry.fallback.cancel();
                }
                debug!(username, "left matchmaking queue");
                true
            }
            None => false,
        }
    }

    /// Removes `username` if `timer` is still its fallback timer.
    ///
    /// Returns `false` for stale fires: the player was paired, cancelled,
    /// or re-joined with a fresh timer in the meantime.
    pub fn take_expired(&mut self, username: &str, timer: TimerId) -> bool {
        let Some(i) = self.index_of(username) else {
            return false;
        };
        if self.entries[i].fallback.id() != timer {
            return false;
        }
        if let Some(entry) = self.entries.remove(i) {
            info!(
                username,
                waited_ms = entry.enqueued_at.elapsed().as_millis() as u64,
                "matchmaking fallback expired"
            );
        }
        true
    }

    fn index_of(&self, username: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.username == username)
    }

    /// 1-based position of `username`.
    pub fn position(&self, username: &str) -> Option<usize> {
        self.index_of(username).map(|i| i + 1)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.index_of(username).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empties the queue, cancelling every fallback timer.
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            entry.fallback.cancel();
        }
    }
}

impl Default for MatchmakingQueue {
    fn default() -> Self {
        Self::new(MatchmakingConfig::default())
    }
}
