//! The connection protocol: the single owner of all game state.
//!
//! One task runs [`ConnectionProtocol::run`] and applies [`Event`]s one at
//! a time. Handlers, timers and store lookups never touch sessions
//! directly; they post events. No locks are held anywhere in this module.
//!
//! Identity is decided here, not by the client: a connection acts for the
//! seat whose live binding it holds, and for nothing else.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use dropfour_engine::{Player, Strategy};
use dropfour_matchmaking::MatchmakingQueue;
use dropfour_protocol::{ClientMessage, GameResult, PlayerRole, Seats, ServerMessage, SessionId};
use dropfour_session::{GameSession, MoveOutcome, PlayerSlot, SessionRegistry};
use dropfour_timer::{TimerId, TimerService};
use dropfour_transport::ConnectionId;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::config::ProtocolConfig;
use crate::error::RequestError;
use crate::event::{Event, EventSender, OutboundSender};
use crate::store::{GameRecord, RecordedPlayer, ResultStore};

/// Longest username accepted by `join`, in characters.
pub const MAX_USERNAME_LEN: usize = 50;

/// What the protocol knows about one open socket.
#[derive(Debug)]
struct ConnectionEntry {
    outbound: OutboundSender,
    /// Username this connection last joined as.
    username: Option<String>,
    /// Seat this connection was last given.
    binding: Option<(SessionId, Player)>,
}

/// Routes client requests to sessions and the matchmaking queue.
pub struct ConnectionProtocol<S, A> {
    config: ProtocolConfig,
    registry: SessionRegistry,
    queue: MatchmakingQueue,
    timers: TimerService<Event>,
    events: EventSender,
    strategy: Arc<dyn Strategy>,
    store: Arc<S>,
    analytics: Arc<A>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl<S: ResultStore, A: AnalyticsSink> ConnectionProtocol<S, A> {
    /// `events` must be the sending half of the channel later passed to
    /// [`run`](Self::run); timers and store lookups post into it.
    pub fn new(config: ProtocolConfig, events: EventSender, store: Arc<S>, analytics: Arc<A>) -> Self {
        let config = config.validated();
        Self {
            registry: SessionRegistry::new(),
            queue: MatchmakingQueue::new(config.matchmaking.clone()),
            timers: TimerService::new(events.clone()),
            strategy: Arc::from(config.strategy.build()),
            events,
            store,
            analytics,
            connections: HashMap::new(),
            config,
        }
    }

    /// Replaces the bot's move selection.
    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = Arc::from(strategy);
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Processes events until [`Event::Shutdown`] or until every sender
    /// is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        info!("protocol event loop started");
        while let Some(event) = events.recv().await {
            if self.handle_event(event).is_break() {
                break;
            }
        }
        info!("protocol event loop stopped");
    }

    /// Applies one event. Returns `Break` after a shutdown.
    pub fn handle_event(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::Connected { conn, outbound } => {
                debug!(%conn, "connection registered");
                self.connections.insert(
                    conn,
                    ConnectionEntry {
                        outbound,
                        username: None,
                        binding: None,
                    },
                );
            }
            Event::Inbound { conn, message } => self.on_message(conn, message),
            Event::Disconnected { conn } => self.on_disconnected(conn),
            Event::MatchFallback { username, timer } => self.on_match_fallback(&username, timer),
            Event::ReconnectExpired {
                session,
                player,
                timer,
            } => self.on_reconnect_expired(&session, player, timer),
            Event::BotTurn { session, timer } => self.on_bot_turn(&session, timer),
            Event::BotMoveChosen { session, ply, column } => self.on_bot_move_chosen(&session, ply, column),
            Event::IdentityResolved {
                session,
                player,
                user_id,
            } => {
                if let Some(s) = self.registry.get_mut(&session) {
                    s.set_identity(player, user_id);
                    debug!(session_id = %session, %player, %user_id, "identity resolved");
                }
            }
            Event::Shutdown => {
                self.shutdown();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // -----------------------------------------------------------------------
    // Client requests
    // -----------------------------------------------------------------------

    fn on_message(&mut self, conn: ConnectionId, message: ClientMessage) {
        if !self.connections.contains_key(&conn) {
            debug!(%conn, "message from unregistered connection, ignoring");
            return;
        }
        let result = match message {
            ClientMessage::Join { username } => self.on_join(conn, username.as_deref()),
            ClientMessage::Move { session_id, column } => self.on_move(conn, session_id, column),
            ClientMessage::Forfeit => self.on_forfeit(conn),
        };
        if let Err(e) = result {
            self.reject(conn, &e);
        }
    }

    fn on_join(&mut self, conn: ConnectionId, username: Option<&str>) -> Result<(), RequestError> {
        let username = validate_username(username).ok_or(RequestError::InvalidJoinPayload)?;
        if username.eq_ignore_ascii_case(&self.config.bot_name) {
            return Err(RequestError::ReservedUsername(username));
        }
        if let Some(seated) = self.seated_as(conn) {
            if seated != username {
                return Err(RequestError::AlreadySeated(seated));
            }
        }
        self.claim_username(conn, &username);

        if let Some(id) = self.registry.lookup_by_username(&username).cloned() {
            if self.resume_session(conn, &id, &username) {
                return Ok(());
            }
        }

        self.requeue(conn, username);
        self.pair_waiting();
        Ok(())
    }

    fn on_move(&mut self, conn: ConnectionId, session_id: SessionId, column: i64) -> Result<(), RequestError> {
        let Some(session) = self.registry.get_mut(&session_id) else {
            return Err(RequestError::SessionNotFound(session_id));
        };
        let player = acting_player(self.connections.get(&conn), conn, session)
            .ok_or(RequestError::NotAParticipant)?;
        let outcome = session.apply_move(column, player)?;
        self.after_move(&session_id, outcome);
        Ok(())
    }

    fn on_forfeit(&mut self, conn: ConnectionId) -> Result<(), RequestError> {
        let (session_id, _) = self
            .connections
            .get(&conn)
            .and_then(|e| e.binding.clone())
            .ok_or(RequestError::NotAParticipant)?;
        let Some(session) = self.registry.get_mut(&session_id) else {
            return Err(RequestError::SessionNotFound(session_id));
        };
        let player = acting_player(self.connections.get(&conn), conn, session)
            .ok_or(RequestError::NotAParticipant)?;
        session.forfeit(player)?;
        self.finish_session(&session_id);
        Ok(())
    }

    fn reject(&self, conn: ConnectionId, error: &RequestError) {
        debug!(%conn, code = error.code(), %error, "request rejected");
        self.send(conn, error.to_message());
    }

    // -----------------------------------------------------------------------
    // Matchmaking
    // -----------------------------------------------------------------------

    /// Username of the seat `conn` holds live in an active session.
    fn seated_as(&self, conn: ConnectionId) -> Option<String> {
        let (id, player) = self.connections.get(&conn)?.binding.as_ref()?;
        let session = self.registry.get(id)?;
        (session.is_active() && session.connection(*player) == Some(conn))
            .then(|| session.slot(*player).username.clone())
    }

    /// Records `username` as this connection's claim, releasing the queue
    /// slot of a name it claimed before.
    fn claim_username(&mut self, conn: ConnectionId, username: &str) {
        let previous = match self.connections.get_mut(&conn) {
            Some(entry) => entry.username.replace(username.to_string()),
            None => return,
        };
        if let Some(previous) = previous.filter(|p| p != username) {
            self.release_queue_slot(&previous);
        }
    }

    /// Drops `username` from the queue unless another open connection
    /// still claims it.
    fn release_queue_slot(&mut self, username: &str) {
        let claimed = self
            .connections
            .values()
            .any(|e| e.username.as_deref() == Some(username));
        if !claimed && self.queue.cancel(username) {
            info!(username, "left matchmaking queue");
        }
    }

    fn requeue(&mut self, conn: ConnectionId, username: String) {
        let waiting = username.clone();
        let position = self.queue.enqueue(&username, &self.timers, move |timer| Event::MatchFallback {
            username: waiting,
            timer,
        });
        info!(%conn, username, position, "player queued");
        self.send(conn, ServerMessage::Queued { position });
    }

    fn pair_waiting(&mut self) {
        while let Some((a, b)) = self.queue.try_pair() {
            self.start_pvp(a, b);
        }
    }

    fn start_pvp(&mut self, a: String, b: String) {
        let conn_a = self.live_connection_for(&a);
        let conn_b = self.live_connection_for(&b);
        let id = match self.registry.create_pvp(&a, &b) {
            Ok(id) => id,
            Err(e) => {
                warn!(player1 = %a, player2 = %b, error = %e, "could not create session");
                // Names already playing are told why; the rest wait again.
                let error = RequestError::from(e);
                for (name, conn) in [(a, conn_a), (b, conn_b)] {
                    let Some(conn) = conn else { continue };
                    if self.registry.lookup_by_username(&name).is_some() {
                        self.reject(conn, &error);
                    } else {
                        self.requeue(conn, name);
                    }
                }
                return;
            }
        };

        let (Some(ca), Some(cb)) = (conn_a, conn_b) else {
            warn!(session_id = %id, player1 = %a, player2 = %b, "pairing aborted, player gone");
            self.registry.remove(&id);
            for (name, conn) in [(a, conn_a), (b, conn_b)] {
                if let Some(conn) = conn {
                    self.requeue(conn, name);
                }
            }
            return;
        };

        self.seat(&id, Player::One, ca);
        self.seat(&id, Player::Two, cb);
        self.announce_start(&id);
    }

    fn on_match_fallback(&mut self, username: &str, timer: TimerId) {
        if !self.queue.take_expired(username, timer) {
            trace!(username, %timer, "stale matchmaking fallback");
            return;
        }
        let id = match self.registry.create_bot(username, &self.config.bot_name) {
            Ok(id) => id,
            Err(e) => {
                warn!(username, error = %e, "could not create bot session");
                return;
            }
        };
        let Some(conn) = self.live_connection_for(username) else {
            info!(session_id = %id, username, "player left before bot game started");
            self.registry.remove(&id);
            return;
        };
        self.seat(&id, Player::One, conn);
        self.announce_start(&id);
    }

    /// Most recent open connection claiming `username`.
    fn live_connection_for(&self, username: &str) -> Option<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, e)| e.username.as_deref() == Some(username))
            .map(|(conn, _)| *conn)
            .max()
    }

    fn seat(&mut self, id: &SessionId, player: Player, conn: ConnectionId) {
        if let Some(session) = self.registry.get_mut(id) {
            session.bind_connection(player, conn);
        }
        if let Some(entry) = self.connections.get_mut(&conn) {
            entry.binding = Some((id.clone(), player));
        }
    }

    fn announce_start(&self, id: &SessionId) {
        let Some(session) = self.registry.get(id) else {
            return;
        };
        let players = session.player_names();
        let state = session.snapshot();
        for player in Player::BOTH {
            if let Some(conn) = session.connection(player) {
                self.send(
                    conn,
                    ServerMessage::GameStart {
                        session_id: id.clone(),
                        players: players.clone(),
                        state: state.clone(),
                        player_slot: player,
                    },
                );
            }
        }
        info!(
            session_id = %id,
            kind = %session.kind(),
            player1 = %players.player1,
            player2 = %players.player2,
            "session started"
        );
        self.emit(AnalyticsEvent::SessionStarted {
            session_id: id.clone(),
            kind: session.kind(),
            players: vec![players.player1, players.player2],
        });

        for player in Player::BOTH {
            let slot = session.slot(player);
            if slot.role == PlayerRole::Human {
                self.resolve_identity(id.clone(), player, slot.username.clone());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reconnection
    // -----------------------------------------------------------------------

    /// Rebinds `username` to its running session. Returns `false` if
    /// there is nothing to resume.
    fn resume_session(&mut self, conn: ConnectionId, id: &SessionId, username: &str) -> bool {
        let Some(session) = self.registry.get_mut(id) else {
            return false;
        };
        if !session.is_active() {
            return false;
        }
        let Some(player) = session.player_for_username(username) else {
            return false;
        };

        // Disarm before rebinding: a grace timer must not outlive this turn.
        let was_away = session.disarm_reconnect_timer(player);
        session.bind_connection(player, conn);
        let state = session.snapshot();
        if let Some(entry) = self.connections.get_mut(&conn) {
            entry.binding = Some((id.clone(), player));
        }

        info!(session_id = %id, %conn, username, %player, was_away, "player reconnected");
        self.send(
            conn,
            ServerMessage::GameReconnected {
                session_id: id.clone(),
                state: state.clone(),
                player_slot: player,
            },
        );
        self.broadcast(id, ServerMessage::PlayerReconnected { player, state });
        true
    }

    fn on_disconnected(&mut self, conn: ConnectionId) {
        let Some(entry) = self.connections.remove(&conn) else {
            return;
        };
        debug!(%conn, username = ?entry.username, "connection closed");

        if let Some((id, player)) = entry.binding {
            if self.hold_seat(&id, player, conn) {
                return;
            }
        }
        if let Some(username) = entry.username {
            self.release_queue_slot(&username);
        }
    }

    /// Starts the grace period for a seat whose live connection dropped.
    fn hold_seat(&mut self, id: &SessionId, player: Player, conn: ConnectionId) -> bool {
        let grace = self.config.session.reconnect_grace;
        let Some(session) = self.registry.get_mut(id) else {
            return false;
        };
        if !session.is_active() || session.connection(player) != Some(conn) {
            return false;
        }
        session.unbind_connection(player);
        let sid = id.clone();
        session.arm_reconnect_timer(player, grace, &self.timers, move |timer| Event::ReconnectExpired {
            session: sid,
            player,
            timer,
        });
        info!(
            session_id = %id,
            %conn,
            %player,
            grace_secs = grace.as_secs(),
            "player disconnected, holding seat"
        );
        self.broadcast(id, ServerMessage::PlayerDisconnected { player });
        true
    }

    fn on_reconnect_expired(&mut self, id: &SessionId, player: Player, timer: TimerId) {
        let Some(session) = self.registry.get_mut(id) else {
            return;
        };
        if !session.reconnect_timer_is(player, timer) {
            trace!(session_id = %id, %player, %timer, "stale reconnect timer");
            return;
        }
        session.disarm_reconnect_timer(player);
        info!(session_id = %id, %player, "reconnect grace expired");
        if session.forfeit(player).is_ok() {
            self.finish_session(id);
        }
    }

    // -----------------------------------------------------------------------
    // Moves and the bot
    // -----------------------------------------------------------------------

    fn after_move(&mut self, id: &SessionId, outcome: MoveOutcome) {
        let Some(session) = self.registry.get(id) else {
            return;
        };
        let mover = session.slot(outcome.player).username.clone();
        let bot_to_move = session.is_active() && session.bot_player() == Some(session.current_turn());
        self.broadcast(
            id,
            ServerMessage::MoveMade {
                column: outcome.column,
                row: outcome.row,
                player: outcome.player,
                state: session.snapshot(),
            },
        );
        self.emit(AnalyticsEvent::MovePlayed {
            session_id: id.clone(),
            player: mover,
            column: outcome.column,
            row: outcome.row,
        });

        if outcome.is_terminal() {
            self.finish_session(id);
        } else if bot_to_move {
            self.schedule_bot_turn(id);
        }
    }

    fn schedule_bot_turn(&mut self, id: &SessionId) {
        let delay = self.config.bot_move_delay;
        let Some(session) = self.registry.get_mut(id) else {
            return;
        };
        let sid = id.clone();
        let handle = self
            .timers
            .arm(delay, move |timer| Event::BotTurn { session: sid, timer });
        trace!(session_id = %id, timer = %handle.id(), "bot turn scheduled");
        session.schedule_bot_turn(handle);
    }

    fn on_bot_turn(&mut self, id: &SessionId, timer: TimerId) {
        let Some(session) = self.registry.get_mut(id) else {
            return;
        };
        if !session.take_bot_turn(timer) {
            trace!(session_id = %id, %timer, "stale bot turn");
            return;
        }
        let Some(bot) = session.bot_player() else {
            return;
        };
        if !session.is_active() || session.current_turn() != bot {
            return;
        }

        // The search may be slow; it runs on the blocking pool and reports
        // back as an event.
        let board = *session.board();
        let ply = board.piece_count();
        let strategy = Arc::clone(&self.strategy);
        let events = self.events.clone();
        let session = id.clone();
        tokio::spawn(async move {
            let search = tokio::task::spawn_blocking(move || strategy.choose(&board, bot, bot.other()));
            match search.await {
                Ok(column) => {
                    let _ = events.send(Event::BotMoveChosen { session, ply, column });
                }
                Err(e) => warn!(session_id = %session, error = %e, "bot search failed"),
            }
        });
    }

    fn on_bot_move_chosen(&mut self, id: &SessionId, ply: usize, column: Option<usize>) {
        let Some(session) = self.registry.get_mut(id) else {
            return;
        };
        let Some(bot) = session.bot_player() else {
            return;
        };
        if !session.is_active() || session.current_turn() != bot || session.board().piece_count() != ply {
            trace!(session_id = %id, ply, "stale bot move");
            return;
        }
        let Some(column) = column else {
            warn!(session_id = %id, "bot found no legal column");
            return;
        };
        match session.apply_move(column as i64, bot) {
            Ok(outcome) => self.after_move(id, outcome),
            Err(e) => warn!(session_id = %id, column, error = %e, "bot move rejected"),
        }
    }

    // -----------------------------------------------------------------------
    // Game over
    // -----------------------------------------------------------------------

    /// Broadcasts the result, removes the session and hands the record to
    /// the store.
    fn finish_session(&mut self, id: &SessionId) {
        let Some(result) = self.registry.get(id).and_then(GameSession::result) else {
            return;
        };
        let Some(session) = self.registry.remove(id) else {
            return;
        };

        let winner = session.winner();
        let winner_name = session.winner_name().map(str::to_string);
        let message = ServerMessage::GameOver {
            winner,
            winner_name: winner_name.clone(),
            result,
            state: session.snapshot(),
        };
        for conn in session.live_connections() {
            self.send(conn, message.clone());
        }
        for entry in self.connections.values_mut() {
            if entry.binding.as_ref().is_some_and(|(sid, _)| sid == id) {
                entry.binding = None;
            }
        }

        let duration_secs = session.duration().as_secs();
        info!(
            session_id = %id,
            %result,
            winner = winner_name.as_deref().unwrap_or("none"),
            duration_secs,
            "session finished"
        );
        let event = match (result, winner) {
            (GameResult::Forfeit, Some(winner)) => AnalyticsEvent::Forfeit {
                session_id: id.clone(),
                player: winner.other(),
            },
            _ => AnalyticsEvent::SessionFinished {
                session_id: id.clone(),
                winner: winner_name,
                duration_secs,
                kind: session.kind(),
            },
        };
        self.emit(event);
        self.persist(&session, result, duration_secs);
    }

    fn shutdown(&mut self) {
        info!(
            sessions = self.registry.len(),
            queued = self.queue.len(),
            connections = self.connections.len(),
            "protocol shutting down"
        );
        self.queue.clear();
        self.registry.clear();
        // Dropping the outbound senders tells every handler to close.
        self.connections.clear();
    }

    // -----------------------------------------------------------------------
    // Delivery and collaborators
    // -----------------------------------------------------------------------

    fn send(&self, conn: ConnectionId, message: ServerMessage) {
        if let Some(entry) = self.connections.get(&conn) {
            if entry.outbound.send(message).is_err() {
                trace!(%conn, "outbound channel closed");
            }
        }
    }

    /// Sends to every live connection of the session.
    fn broadcast(&self, id: &SessionId, message: ServerMessage) {
        if let Some(session) = self.registry.get(id) {
            for conn in session.live_connections() {
                self.send(conn, message.clone());
            }
        }
    }

    fn emit(&self, event: AnalyticsEvent) {
        let sink = Arc::clone(&self.analytics);
        tokio::spawn(async move {
            let name = event.name();
            if let Err(e) = sink.emit(event).await {
                warn!(event = name, error = %e, "analytics emit failed");
            }
        });
    }

    fn resolve_identity(&self, session: SessionId, player: Player, username: String) {
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        tokio::spawn(async move {
            match store.resolve_player(&username).await {
                Ok(user_id) => {
                    let _ = events.send(Event::IdentityResolved {
                        session,
                        player,
                        user_id,
                    });
                }
                Err(e) => warn!(session_id = %session, %username, error = %e, "identity lookup failed"),
            }
        });
    }

    fn persist(&self, session: &GameSession, result: GameResult, duration_secs: u64) {
        let recorded = |slot: &PlayerSlot| RecordedPlayer {
            username: slot.username.clone(),
            user_id: slot.user_id,
        };
        let record = GameRecord {
            session_id: session.id().clone(),
            players: Seats {
                player1: recorded(session.slot(Player::One)),
                player2: recorded(session.slot(Player::Two)),
            },
            winner: session.winner(),
            result,
            duration_secs,
            kind: session.kind(),
        };
        let leaderboard_winner = session.leaderboard_winner().map(str::to_string);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let session_id = record.session_id.clone();
            if let Err(e) = store.record_game_result(record).await {
                warn!(%session_id, error = %e, "failed to record game result");
            }
            if let Some(username) = leaderboard_winner {
                if let Err(e) = store.increment_leaderboard_win(&username).await {
                    warn!(%session_id, %username, error = %e, "failed to update leaderboard");
                }
            }
        });
    }
}

/// Trims and bounds a `join` username.
fn validate_username(raw: Option<&str>) -> Option<String> {
    let name = raw?.trim();
    (!name.is_empty() && name.chars().count() <= MAX_USERNAME_LEN).then(|| name.to_string())
}

/// Seat `conn` may act for in `session`.
///
/// The session's live binding wins. The connection's own record is only
/// consulted when that seat has no live connection at all.
fn acting_player(entry: Option<&ConnectionEntry>, conn: ConnectionId, session: &GameSession) -> Option<Player> {
    if let Some(player) = session.player_for_connection(conn) {
        return Some(player);
    }
    let (sid, player) = entry?.binding.as_ref()?;
    (sid == session.id() && session.connection(*player).is_none()).then_some(*player)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::NoopAnalytics;
    use crate::store::MemoryStore;

    fn protocol() -> (
        ConnectionProtocol<MemoryStore, NoopAnalytics>,
        mpsc::UnboundedReceiver<Event>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let p = ConnectionProtocol::new(
            ProtocolConfig::default(),
            tx,
            Arc::new(MemoryStore::new()),
            Arc::new(NoopAnalytics),
        );
        (p, rx)
    }

    fn connect(
        p: &mut ConnectionProtocol<MemoryStore, NoopAnalytics>,
        id: u64,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let conn = ConnectionId::new(id);
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = p.handle_event(Event::Connected { conn, outbound: tx });
        (conn, rx)
    }

    fn join(p: &mut ConnectionProtocol<MemoryStore, NoopAnalytics>, conn: ConnectionId, name: &str) {
        let _ = p.handle_event(Event::Inbound {
            conn,
            message: ClientMessage::Join {
                username: Some(name.into()),
            },
        });
    }

    #[test]
    fn test_validate_username_trims_and_bounds() {
        assert_eq!(validate_username(Some("  alice ")), Some("alice".into()));
        assert_eq!(validate_username(Some("   ")), None);
        assert_eq!(validate_username(None), None);
        assert_eq!(validate_username(Some(&"x".repeat(50))), Some("x".repeat(50)));
        assert_eq!(validate_username(Some(&"x".repeat(51))), None);
    }

    #[tokio::test]
    async fn test_pairing_with_vanished_player_requeues_survivor() {
        let (mut p, _events) = protocol();
        // A queue entry whose owner has no open connection.
        p.queue.enqueue("ghost", &p.timers, |timer| Event::MatchFallback {
            username: "ghost".into(),
            timer,
        });
        let (bob, mut bob_rx) = connect(&mut p, 1);

        join(&mut p, bob, "bob");

        assert!(p.registry().is_empty());
        assert_eq!(p.queue().len(), 1);
        assert_eq!(p.queue().position("bob"), Some(1));
        assert_eq!(bob_rx.try_recv().unwrap(), ServerMessage::Queued { position: 2 });
        assert_eq!(bob_rx.try_recv().unwrap(), ServerMessage::Queued { position: 1 });
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pairing_with_player_already_in_game_requeues_other() {
        let (mut p, _events) = protocol();
        p.registry.create_bot("alice", "Bot").unwrap();
        let (alice, mut alice_rx) = connect(&mut p, 1);
        p.connections.get_mut(&alice).unwrap().username = Some("alice".into());
        p.queue.enqueue("alice", &p.timers, |timer| Event::MatchFallback {
            username: "alice".into(),
            timer,
        });
        let (bob, mut bob_rx) = connect(&mut p, 2);

        join(&mut p, bob, "bob");

        assert_eq!(p.registry().len(), 1);
        assert_eq!(p.queue().len(), 1);
        assert!(p.queue().contains("bob"));
        assert!(matches!(
            alice_rx.try_recv().unwrap(),
            ServerMessage::Error { code: 409, .. }
        ));
        assert_eq!(bob_rx.try_recv().unwrap(), ServerMessage::Queued { position: 2 });
        assert_eq!(bob_rx.try_recv().unwrap(), ServerMessage::Queued { position: 1 });
    }

    #[tokio::test]
    async fn test_switching_username_releases_old_queue_slot() {
        let (mut p, _events) = protocol();
        let (conn, _rx) = connect(&mut p, 1);
        join(&mut p, conn, "alice");
        join(&mut p, conn, "alicia");

        assert!(!p.queue().contains("alice"));
        assert!(p.queue().contains("alicia"));
    }

    #[tokio::test]
    async fn test_acting_player_prefers_live_binding() {
        let (mut p, _events) = protocol();
        let (a, _a_rx) = connect(&mut p, 1);
        let (b, _b_rx) = connect(&mut p, 2);
        join(&mut p, a, "alice");
        join(&mut p, b, "bob");
        let id = p.registry().lookup_by_username("alice").cloned().unwrap();

        // alice opens a second socket and resumes; the first one keeps its
        // stale record but the seat is live elsewhere.
        let (a2, _a2_rx) = connect(&mut p, 3);
        join(&mut p, a2, "alice");

        let session = p.registry().get(&id).unwrap();
        assert_eq!(acting_player(p.connections.get(&a2), a2, session), Some(Player::One));
        assert_eq!(acting_player(p.connections.get(&a), a, session), None);
        assert_eq!(acting_player(p.connections.get(&b), b, session), Some(Player::Two));
    }

    #[tokio::test]
    async fn test_shutdown_breaks_and_clears() {
        let (mut p, _events) = protocol();
        let (conn, mut rx) = connect(&mut p, 1);
        join(&mut p, conn, "alice");
        let _ = rx.try_recv();

        assert!(p.handle_event(Event::Shutdown).is_break());
        assert!(p.queue().is_empty());
        assert_eq!(p.connection_count(), 0);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
