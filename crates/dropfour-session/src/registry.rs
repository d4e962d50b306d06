//! The session registry: every live game, findable by id or by username.
//!
//! # Concurrency note
//!
//! Like the rest of the game state, the registry is owned by the single
//! event-loop task and uses plain `HashMap`s. Nothing here locks.

use std::collections::HashMap;

use dropfour_protocol::{PlayerRole, SessionId};
use rand::Rng;
use tracing::info;

use crate::{GameSession, PlayerSlot, SessionError};

/// Owns all sessions plus the index from human usernames to sessions.
///
/// A username maps to at most one session. Bot seats are not indexed.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, GameSession>,
    by_username: HashMap<String, SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a player-vs-player session. `a` takes seat one and moves first.
    ///
    /// # Errors
    /// - [`SessionError::InvalidUsername`] for an empty name or `a == b`
    /// - [`SessionError::UsernameInUse`] if either name already has a session
    pub fn create_pvp(&mut self, a: &str, b: &str) -> Result<SessionId, SessionError> {
        self.check_available(a)?;
        self.check_available(b)?;
        if a == b {
            return Err(SessionError::InvalidUsername);
        }
        self.insert(PlayerSlot::human(a), PlayerSlot::human(b))
    }

    /// Starts a session between `username` (seat one) and the bot.
    ///
    /// # Errors
    /// Same as [`create_pvp`](Self::create_pvp) for `username`.
    pub fn create_bot(&mut self, username: &str, bot_name: &str) -> Result<SessionId, SessionError> {
        self.check_available(username)?;
        self.insert(PlayerSlot::human(username), PlayerSlot::bot(bot_name))
    }

    fn check_available(&self, username: &str) -> Result<(), SessionError> {
        if username.trim().is_empty() {
            return Err(SessionError::InvalidUsername);
        }
        if self.by_username.contains_key(username) {
            return Err(SessionError::UsernameInUse(username.to_string()));
        }
        Ok(())
    }

    fn insert(&mut self, player1: PlayerSlot, player2: PlayerSlot) -> Result<SessionId, SessionError> {
        let id = self.fresh_id();
        for slot in [&player1, &player2] {
            if slot.role == PlayerRole::Human {
                self.by_username.insert(slot.username.clone(), id.clone());
            }
        }
        info!(
            session_id = %id,
            player1 = %player1.username,
            player2 = %player2.username,
            "session created"
        );
        self.sessions
            .insert(id.clone(), GameSession::new(id.clone(), player1, player2));
        Ok(id)
    }

    fn fresh_id(&self) -> SessionId {
        loop {
            let id = generate_session_id();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    /// Session currently owned by `username`.
    pub fn lookup_by_username(&self, username: &str) -> Option<&SessionId> {
        self.by_username.get(username)
    }

    pub fn get(&self, id: &SessionId) -> Option<&GameSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut GameSession> {
        self.sessions.get_mut(id)
    }

    /// Removes a session and frees its usernames. Dropping the returned
    /// session cancels any timers it still holds.
    pub fn remove(&mut self, id: &SessionId) -> Option<GameSession> {
        let mut session = self.sessions.remove(id)?;
        self.by_username.retain(|_, sid| sid != id);
        session.cancel_timers();
        info!(session_id = %id, "session removed");
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SessionId> + '_ {
        self.sessions.keys()
    }

    /// Drops every session, cancelling their timers.
    pub fn clear(&mut self) {
        for session in self.sessions.values_mut() {
            session.cancel_timers();
        }
        self.sessions.clear();
        self.by_username.clear();
    }
}

/// 128 random bits as 32 lowercase hex characters.
fn generate_session_id() -> SessionId {
    let bytes: [u8; 16] = rand::rng().random();
    SessionId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

// =========================================================================
// Tests
// =========================================================================
