//! Persistence of finished games and the leaderboard.
//!
//! The server only ever talks to a [`ResultStore`]. Calls are spawned
//! off the event loop, attempted once, and failures are logged and
//! dropped; a slow or broken store never delays a game.

use std::collections::HashMap;
use std::future::Future;

use dropfour_protocol::{GameResult, Player, Seats, SessionId, SessionKind};
use dropfour_session::UserId;
use tokio::sync::Mutex;

/// Errors a result store may report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The write was rejected.
    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// A seat as persisted: bots have no user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPlayer {
    pub username: String,
    pub user_id: Option<UserId>,
}

/// One finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub session_id: SessionId,
    pub players: Seats<RecordedPlayer>,
    pub winner: Option<Player>,
    pub result: GameResult,
    pub duration_secs: u64,
    pub kind: SessionKind,
}

/// Durable storage for players, games and leaderboard wins.
///
/// Futures must be `Send` because every call is spawned onto the runtime.
pub trait ResultStore: Send + Sync + 'static {
    /// Returns the durable id for `username`, creating the user if needed.
    fn resolve_player(&self, username: &str) -> impl Future<Output = Result<UserId, StoreError>> + Send;

    /// Stores a finished game.
    fn record_game_result(&self, record: GameRecord) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Adds one win for `username`.
    fn increment_leaderboard_win(&self, username: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<String, UserId>,
    next_user: u64,
    games: Vec<GameRecord>,
    wins: HashMap<String, u32>,
}

/// In-process [`ResultStore`]. Used by the binary and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(username, wins)` sorted by wins descending, then username.
    pub async fn leaderboard(&self) -> Vec<(String, u32)> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state.wins.iter().map(|(u, w)| (u.clone(), *w)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows
    }

    /// Every recorded game, oldest first.
    pub async fn games(&self) -> Vec<GameRecord> {
        self.state.lock().await.games.clone()
    }

    pub async fn user_id(&self, username: &str) -> Option<UserId> {
        self.state.lock().await.users.get(username).copied()
    }
}

impl ResultStore for MemoryStore {
    async fn resolve_player(&self, username: &str) -> Result<UserId, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(id) = state.users.get(username) {
            return Ok(*id);
        }
        state.next_user += 1;
        let id = UserId(state.next_user);
        state.users.insert(username.to_string(), id);
        Ok(id)
    }

    async fn record_game_result(&self, record: GameRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.games.iter().any(|g| g.session_id == record.session_id) {
            return Err(StoreError::Rejected(format!(
                "game {} already recorded",
                record.session_id
            )));
        }
        state.games.push(record);
        Ok(())
    }

    async fn increment_leaderboard_win(&self, username: &str) -> Result<(), StoreError> {
        *self
            .state
            .lock()
            .await
            .wins
            .entry(username.to_string())
            .or_insert(0) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> GameRecord {
        GameRecord {
            session_id: SessionId::from(id),
            players: Seats {
                player1: RecordedPlayer {
                    username: "alice".into(),
                    user_id: Some(UserId(1)),
                },
                player2: RecordedPlayer {
                    username: "Bot".into(),
                    user_id: None,
                },
            },
            winner: Some(Player::One),
            result: GameResult::Win,
            duration_secs: 42,
            kind: SessionKind::Bot,
        }
    }

    #[tokio::test]
    async fn test_resolve_player_is_stable() {
        let store = MemoryStore::new();
        let a = store.resolve_player("alice").await.unwrap();
        let b = store.resolve_player("bob").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.resolve_player("alice").await.unwrap(), a);
        assert_eq!(store.user_id("alice").await, Some(a));
    }

    #[tokio::test]
    async fn test_record_game_result_rejects_duplicate() {
        let store = MemoryStore::new();
        store.record_game_result(record("g1")).await.unwrap();
        let dup = store.record_game_result(record("g1")).await;
        assert!(matches!(dup, Err(StoreError::Rejected(_))));
        assert_eq!(store.games().await.len(), 1);
    }

    #[tokio::test]
    async fn test_leaderboard_sorted_by_wins_then_name() {
        let store = MemoryStore::new();
        for name in ["carol", "bob", "alice", "bob"] {
            store.increment_leaderboard_win(name).await.unwrap();
        }
        assert_eq!(
            store.leaderboard().await,
            vec![
                ("bob".to_string(), 2),
                ("alice".to_string(), 1),
                ("carol".to_string(), 1)
            ]
        );
    }
}
