//! A single game: board, seats, turn order, and the timers hanging off it.
//!
//! ```text
//!   Active ──(winning move / full board)──→ Finished
//!     │
//!     └──(forfeit / reconnect grace expired)──→ Forfeited
//! ```
//!
//! Both terminal states are final. Every transition into one of them
//! drops all timers the session still holds.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dropfour_engine::{Board, COLS, Player};
use dropfour_protocol::{
    BoardView, GameResult, GameSnapshot, PlayerRole, PlayerView, Seats, SessionId, SessionKind,
    SessionStatus,
};
use dropfour_timer::{TimerHandle, TimerId, TimerService};
use dropfour_transport::ConnectionId;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tunables for running sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected player may stay away before forfeiting.
    ///
    /// Default: 120 seconds.
    pub reconnect_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(120),
        }
    }
}

impl SessionConfig {
    /// Shortest grace period accepted by [`validated`](Self::validated).
    pub const MIN_RECONNECT_GRACE: Duration = Duration::from_secs(1);

    /// Clamps out-of-range values.
    pub fn validated(mut self) -> Self {
        if self.reconnect_grace < Self::MIN_RECONNECT_GRACE {
            tracing::warn!(
                grace_ms = self.reconnect_grace.as_millis() as u64,
                "reconnect_grace below minimum, clamping"
            );
            self.reconnect_grace = Self::MIN_RECONNECT_GRACE;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Seats
// ---------------------------------------------------------------------------

/// Durable identity of a human player, as issued by the result store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

/// One of the two seats in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    pub username: String,
    pub role: PlayerRole,
    /// Filled in asynchronously after the game starts; bots never get one.
    pub user_id: Option<UserId>,
}

impl PlayerSlot {
    pub fn human(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: PlayerRole::Human,
            user_id: None,
        }
    }

    pub fn bot(name: impl Into<String>) -> Self {
        Self {
            username: name.into(),
            role: PlayerRole::Bot,
            user_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Move outcome
// ---------------------------------------------------------------------------

/// What a legal move did to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    /// The game goes on; the turn passed to the other player.
    Continue,
    /// The mover connected four.
    Win,
    /// The board filled up with no winner.
    Draw,
}

/// A move that was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub column: usize,
    pub row: usize,
    pub player: Player,
    pub result: MoveResult,
}

impl MoveOutcome {
    /// Whether this move ended the game.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.result, MoveResult::Continue)
    }
}

// ---------------------------------------------------------------------------
// GameSession
// ---------------------------------------------------------------------------

/// Authoritative state of one game.
///
/// Only [`SessionRegistry`](crate::SessionRegistry) creates sessions. The
/// session never talks to the network or to persistence; it hands back
/// outcomes and lets the caller broadcast them.
#[derive(Debug)]
pub struct GameSession {
    id: SessionId,
    board: Board,
    slots: [PlayerSlot; 2],
    current_turn: Player,
    status: SessionStatus,
    winner: Option<Player>,
    result: Option<GameResult>,
    started_at: Instant,
    start_time_ms: u64,
    last_move_at: Instant,
    connections: [Option<ConnectionId>; 2],
    reconnect_timers: [Option<TimerHandle>; 2],
    bot_turn: Option<TimerHandle>,
}

impl GameSession {
    pub(crate) fn new(id: SessionId, player1: PlayerSlot, player2: PlayerSlot) -> Self {
        let now = Instant::now();
        let start_time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        Self {
            id,
            board: Board::new(),
            slots: [player1, player2],
            current_turn: Player::One,
            status: SessionStatus::Active,
            winner: None,
            result: None,
            started_at: now,
            start_time_ms,
            last_move_at: now,
            connections: [None, None],
            reconnect_timers: [None, None],
            bot_turn: None,
        }
    }

    // -- Accessors ---------------------------------------------------------

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn current_turn(&self) -> Player {
        self.current_turn
    }

    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    /// `None` until the session reaches a terminal state.
    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn slot(&self, player: Player) -> &PlayerSlot {
        &self.slots[player.index()]
    }

    /// `Bot` when the second seat is the scripted opponent.
    pub fn kind(&self) -> SessionKind {
        match self.slots[Player::Two.index()].role {
            PlayerRole::Bot => SessionKind::Bot,
            PlayerRole::Human => SessionKind::Pvp,
        }
    }

    /// Seat of the bot, if this is a bot session.
    pub fn bot_player(&self) -> Option<Player> {
        Player::BOTH
            .into_iter()
            .find(|p| self.slot(*p).role == PlayerRole::Bot)
    }

    /// Seat held by `username`.
    pub fn player_for_username(&self, username: &str) -> Option<Player> {
        Player::BOTH
            .into_iter()
            .find(|p| self.slot(*p).username == username)
    }

    /// Time since the session started.
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time since the last accepted move (or the start).
    pub fn idle_for(&self) -> Duration {
        self.last_move_at.elapsed()
    }

    pub fn set_identity(&mut self, player: Player, user_id: UserId) {
        self.slots[player.index()].user_id = Some(user_id);
    }

    // -- Moves -------------------------------------------------------------

    /// Drops a piece for `player` into `column`.
    ///
    /// # Errors
    /// - [`SessionError::NotActive`] if the game is over
    /// - [`SessionError::IllegalMove`] if the column is out of range or full
    /// - [`SessionError::OutOfTurn`] if it is the other player's turn
    pub fn apply_move(&mut self, column: i64, player: Player) -> Result<MoveOutcome, SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotActive);
        }
        let col = usize::try_from(column)
            .ok()
            .filter(|c| *c < COLS && self.board.is_legal(*c))
            .ok_or(SessionError::IllegalMove(column))?;
        if player != self.current_turn {
            return Err(SessionError::OutOfTurn);
        }

        let row = self
            .board
            .place(col, player)
            .ok_or(SessionError::IllegalMove(column))?;
        self.last_move_at = Instant::now();

        let result = if self.board.check_win(row, col, player) {
            self.finish(Some(player), GameResult::Win, SessionStatus::Finished);
            MoveResult::Win
        } else if self.board.is_full() {
            self.finish(None, GameResult::Draw, SessionStatus::Finished);
            MoveResult::Draw
        } else {
            self.current_turn = player.other();
            MoveResult::Continue
        };

        debug!(session_id = %self.id, %player, column = col, row, ?result, "move applied");
        Ok(MoveOutcome {
            column: col,
            row,
            player,
            result,
        })
    }

    /// Concedes the game on behalf of `player`. Returns the winner.
    ///
    /// # Errors
    /// [`SessionError::NotActive`] if the game is already over.
    pub fn forfeit(&mut self, player: Player) -> Result<Player, SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotActive);
        }
        let winner = player.other();
        self.finish(Some(winner), GameResult::Forfeit, SessionStatus::Forfeited);
        info!(session_id = %self.id, loser = %player, %winner, "session forfeited");
        Ok(winner)
    }

    fn finish(&mut self, winner: Option<Player>, result: GameResult, status: SessionStatus) {
        self.status = status;
        self.winner = winner;
        self.result = Some(result);
        self.cancel_timers();
    }

    /// Drops every timer this session holds.
    pub fn cancel_timers(&mut self) {
        for timer in &mut self.reconnect_timers {
            if let Some(handle) = timer.take() {
                handle.cancel();
            }
        }
        if let Some(handle) = self.bot_turn.take() {
            handle.cancel();
        }
    }

    // -- Reconnect grace ---------------------------------------------------

    /// Starts the forfeit countdown for a disconnected `player`, replacing
    /// any countdown already running for that seat.
    pub fn arm_reconnect_timer<E, F>(
        &mut self,
        player: Player,
        after: Duration,
        timers: &TimerService<E>,
        on_expire: F,
    ) -> TimerId
    where
        E: Send + 'static,
        F: FnOnce(TimerId) -> E + Send + 'static,
    {
        let handle = timers.arm(after, on_expire);
        let id = handle.id();
        if let Some(previous) = self.reconnect_timers[player.index()].replace(handle) {
            previous.cancel();
        }
        debug!(session_id = %self.id, %player, timer = %id, "reconnect grace started");
        id
    }

    /// Stops the forfeit countdown for `player`. Returns whether one was
    /// running.
    pub fn disarm_reconnect_timer(&mut self, player: Player) -> bool {
        match self.reconnect_timers[player.index()].take() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether `timer` is the countdown currently armed for `player`.
    pub fn reconnect_timer_is(&self, player: Player, timer: TimerId) -> bool {
        self.reconnect_timers[player.index()]
            .as_ref()
            .is_some_and(|h| h.id() == timer)
    }

    pub fn has_reconnect_timer(&self, player: Player) -> bool {
        self.reconnect_timers[player.index()].is_some()
    }

    // -- Bot pacing --------------------------------------------------------

    /// Stores the timer that will trigger the bot's next move.
    pub fn schedule_bot_turn(&mut self, handle: TimerHandle) {
        if let Some(previous) = self.bot_turn.replace(handle) {
            previous.cancel();
        }
    }

    /// Consumes the pending bot turn if `timer` is the one scheduled.
    pub fn take_bot_turn(&mut self, timer: TimerId) -> bool {
        if self.bot_turn.as_ref().is_some_and(|h| h.id() == timer) {
            self.bot_turn = None;
            true
        } else {
            false
        }
    }

    // -- Connection bindings -----------------------------------------------

    /// Records `conn` as the live connection for `player`. Returns the
    /// connection it replaced, if any.
    pub fn bind_connection(&mut self, player: Player, conn: ConnectionId) -> Option<ConnectionId> {
        self.connections[player.index()].replace(conn)
    }

    pub fn unbind_connection(&mut self, player: Player) -> Option<ConnectionId> {
        self.connections[player.index()].take()
    }

    pub fn connection(&self, player: Player) -> Option<ConnectionId> {
        self.connections[player.index()]
    }

    /// Seat whose live binding is `conn`.
    pub fn player_for_connection(&self, conn: ConnectionId) -> Option<Player> {
        Player::BOTH
            .into_iter()
            .find(|p| self.connections[p.index()] == Some(conn))
    }

    /// Every bound connection, in seat order.
    pub fn live_connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().flatten().copied()
    }

    // -- Views -------------------------------------------------------------

    /// The state clients render.
    pub fn snapshot(&self) -> GameSnapshot {
        let view = |p: Player| PlayerView {
            username: self.slot(p).username.clone(),
            role: self.slot(p).role,
        };
        GameSnapshot {
            id: self.id.clone(),
            board: BoardView::from(&self.board),
            players: Seats {
                player1: view(Player::One),
                player2: view(Player::Two),
            },
            current_turn: self.current_turn,
            status: self.status,
            start_time: self.start_time_ms,
        }
    }

    /// Usernames by seat, as sent in `game_start`.
    pub fn player_names(&self) -> Seats<String> {
        Seats {
            player1: self.slot(Player::One).username.clone(),
            player2: self.slot(Player::Two).username.clone(),
        }
    }

    pub fn winner_name(&self) -> Option<&str> {
        self.winner.map(|p| self.slot(p).username.as_str())
    }

    /// Username that earns a leaderboard win from this result.
    ///
    /// Any human winner counts in pvp; in bot games only a human beating
    /// the bot does.
    pub fn leaderboard_winner(&self) -> Option<&str> {
        let winner = self.slot(self.winner?);
        (winner.role == PlayerRole::Human).then_some(winner.username.as_str())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn pvp() -> GameSession {
        GameSession::new(
            SessionId::from("s1"),
            PlayerSlot::human("alice"),
            PlayerSlot::human("bob"),
        )
    }

    fn vs_bot() -> GameSession {
        GameSession::new(
            SessionId::from("s2"),
            PlayerSlot::human("alice"),
            PlayerSlot::bot("Bot"),
        )
    }

    /// Plays columns alternately starting with player one.
    fn play(session: &mut GameSession, columns: &[i64]) -> MoveOutcome {
        let mut last = None;
        for &c in columns {
            let player = session.current_turn();
            last = Some(session.apply_move(c, player).unwrap());
        }
        last.unwrap()
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Ev {
        Expired(Player, TimerId),
        Bot(TimerId),
    }

    fn timers() -> (TimerService<Ev>, mpsc::UnboundedReceiver<Ev>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TimerService::new(tx), rx)
    }

    // -- apply_move --------------------------------------------------------

    #[tokio::test]
    async fn test_apply_move_alternates_turn() {
        let mut s = pvp();
        let outcome = s.apply_move(3, Player::One).unwrap();
        assert_eq!(outcome.row, 0);
        assert_eq!(outcome.result, MoveResult::Continue);
        assert_eq!(s.current_turn(), Player::Two);

        s.apply_move(3, Player::Two).unwrap();
        assert_eq!(s.current_turn(), Player::One);
    }

    #[tokio::test]
    async fn test_apply_move_wrong_player_out_of_turn() {
        let mut s = pvp();
        assert_eq!(s.apply_move(0, Player::Two), Err(SessionError::OutOfTurn));
        assert_eq!(s.board().piece_count(), 0);
    }

    #[tokio::test]
    async fn test_apply_move_out_of_range_illegal() {
        let mut s = pvp();
        assert_eq!(s.apply_move(7, Player::One), Err(SessionError::IllegalMove(7)));
        assert_eq!(s.apply_move(-1, Player::One), Err(SessionError::IllegalMove(-1)));
        assert_eq!(s.current_turn(), Player::One);
    }

    #[tokio::test]
    async fn test_apply_move_full_column_illegal_board_unchanged() {
        let mut s = pvp();
        play(&mut s, &[0, 0, 0, 0, 0, 0]);
        let before = *s.board();
        let turn = s.current_turn();

        assert_eq!(s.apply_move(0, turn), Err(SessionError::IllegalMove(0)));
        assert_eq!(*s.board(), before);
        assert_eq!(s.current_turn(), turn);
    }

    #[tokio::test]
    async fn test_apply_move_vertical_four_wins() {
        let mut s = pvp();
        let outcome = play(&mut s, &[3, 4, 3, 4, 3, 4, 3]);
        assert_eq!(outcome.result, MoveResult::Win);
        assert_eq!((outcome.row, outcome.column), (3, 3));
        assert_eq!(s.status(), SessionStatus::Finished);
        assert_eq!(s.winner(), Some(Player::One));
        assert_eq!(s.result(), Some(GameResult::Win));
        assert_eq!(s.winner_name(), Some("alice"));
    }

    #[tokio::test]
    async fn test_apply_move_after_finish_not_active() {
        let mut s = pvp();
        play(&mut s, &[3, 4, 3, 4, 3, 4, 3]);
        assert_eq!(s.apply_move(0, Player::Two), Err(SessionError::NotActive));
    }

    /// 42 alternating moves that fill the board without a line of four.
    const DRAWN_GAME: [i64; 42] = [
        0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 4, 3, 3, //
        3, 3, 3, 3, 4, 4, 4, 4, 4, 5, 5, 5, 5, 5, 5, 6, 6, 6, 6, 6, 6,
    ];

    #[tokio::test]
    async fn test_apply_move_full_board_draw() {
        let mut s = pvp();
        play(&mut s, &DRAWN_GAME[..41]);
        assert!(s.is_active());

        let last = play(&mut s, &DRAWN_GAME[41..]);
        assert_eq!(last.result, MoveResult::Draw);
        assert_eq!(s.status(), SessionStatus::Finished);
        assert_eq!(s.winner(), None);
        assert_eq!(s.result(), Some(GameResult::Draw));
        assert_eq!(s.leaderboard_winner(), None);
    }

    // -- forfeit -----------------------------------------------------------

    #[tokio::test]
    async fn test_forfeit_other_player_wins() {
        let mut s = pvp();
        assert_eq!(s.forfeit(Player::One), Ok(Player::Two));
        assert_eq!(s.status(), SessionStatus::Forfeited);
        assert_eq!(s.result(), Some(GameResult::Forfeit));
        assert_eq!(s.winner_name(), Some("bob"));
    }

    #[tokio::test]
    async fn test_forfeit_twice_not_active() {
        let mut s = pvp();
        s.forfeit(Player::Two).unwrap();
        assert_eq!(s.forfeit(Player::One), Err(SessionError::NotActive));
    }

    // -- timers ------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_arm_reconnect_timer_fires_with_id() {
        let (timers, mut rx) = timers();
        let mut s = pvp();
        let id = s.arm_reconnect_timer(Player::Two, Duration::from_secs(120), &timers, move |t| {
            Ev::Expired(Player::Two, t)
        });

        assert!(s.reconnect_timer_is(Player::Two, id));
        assert_eq!(rx.recv().await.unwrap(), Ev::Expired(Player::Two, id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_reconnect_timer_replaces_previous() {
        let (timers, mut rx) = timers();
        let mut s = pvp();
        let first = s.arm_reconnect_timer(Player::One, Duration::from_secs(1), &timers, |t| {
            Ev::Expired(Player::One, t)
        });
        let second = s.arm_reconnect_timer(Player::One, Duration::from_secs(2), &timers, |t| {
            Ev::Expired(Player::One, t)
        });

        assert!(!s.reconnect_timer_is(Player::One, first));
        assert_eq!(rx.recv().await.unwrap(), Ev::Expired(Player::One, second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_reconnect_timer_prevents_fire() {
        let (timers, mut rx) = timers();
        let mut s = pvp();
        s.arm_reconnect_timer(Player::One, Duration::from_secs(120), &timers, |t| {
            Ev::Expired(Player::One, t)
        });

        assert!(s.disarm_reconnect_timer(Player::One));
        assert!(!s.disarm_reconnect_timer(Player::One));
        let result = tokio::time::timeout(Duration::from_secs(300), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_cancels_all_timers() {
        let (timers, mut rx) = timers();
        let mut s = vs_bot();
        s.arm_reconnect_timer(Player::One, Duration::from_secs(5), &timers, |t| {
            Ev::Expired(Player::One, t)
        });
        s.schedule_bot_turn(timers.arm(Duration::from_secs(1), Ev::Bot));

        s.forfeit(Player::One).unwrap();
        assert!(!s.has_reconnect_timer(Player::One));
        let result = tokio::time::timeout(Duration::from_secs(60), rx.recv()).await;
        assert!(result.is_err(), "timer survived a terminal transition");
    }

    #[tokio::test]
    async fn test_take_bot_turn_only_matching_id() {
        let (timers, _rx) = timers();
        let mut s = vs_bot();
        let handle = timers.arm(Duration::from_secs(1), Ev::Bot);
        let id = handle.id();
        let stale = timers.arm(Duration::from_secs(1), Ev::Bot).id();
        s.schedule_bot_turn(handle);

        assert!(!s.take_bot_turn(stale));
        assert!(s.take_bot_turn(id));
        assert!(!s.take_bot_turn(id));
    }

    // -- bindings ----------------------------------------------------------

    #[tokio::test]
    async fn test_bind_connection_returns_previous() {
        let mut s = pvp();
        assert_eq!(s.bind_connection(Player::One, ConnectionId::new(1)), None);
        assert_eq!(
            s.bind_connection(Player::One, ConnectionId::new(5)),
            Some(ConnectionId::new(1))
        );
        assert_eq!(s.player_for_connection(ConnectionId::new(5)), Some(Player::One));
        assert_eq!(s.player_for_connection(ConnectionId::new(1)), None);
    }

    #[tokio::test]
    async fn test_live_connections_skips_unbound() {
        let mut s = pvp();
        s.bind_connection(Player::Two, ConnectionId::new(2));
        assert_eq!(s.live_connections().collect::<Vec<_>>(), vec![ConnectionId::new(2)]);
        s.unbind_connection(Player::Two);
        assert_eq!(s.live_connections().count(), 0);
    }

    // -- views -------------------------------------------------------------

    #[tokio::test]
    async fn test_snapshot_reflects_board_and_roles() {
        let mut s = vs_bot();
        s.apply_move(3, Player::One).unwrap();
        let snap = s.snapshot();

        assert_eq!(snap.id, SessionId::from("s2"));
        assert_eq!(snap.board.grid[0][3], 1);
        assert_eq!(snap.board.col_heights[3], 1);
        assert_eq!(snap.players.player1.role, PlayerRole::Human);
        assert_eq!(snap.players.player2.role, PlayerRole::Bot);
        assert_eq!(snap.current_turn, Player::Two);
        assert_eq!(snap.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_kind_and_bot_player() {
        assert_eq!(pvp().kind(), SessionKind::Pvp);
        assert_eq!(pvp().bot_player(), None);
        assert_eq!(vs_bot().kind(), SessionKind::Bot);
        assert_eq!(vs_bot().bot_player(), Some(Player::Two));
    }

    #[tokio::test]
    async fn test_leaderboard_winner_excludes_bot() {
        let mut s = vs_bot();
        s.forfeit(Player::One).unwrap();
        assert_eq!(s.winner_name(), Some("Bot"));
        assert_eq!(s.leaderboard_winner(), None);

        let mut s = vs_bot();
        s.forfeit(Player::Two).unwrap();
        assert_eq!(s.leaderboard_winner(), Some("alice"));
    }

    #[tokio::test]
    async fn test_leaderboard_winner_pvp_and_draw() {
        let mut s = pvp();
        s.forfeit(Player::One).unwrap();
        assert_eq!(s.leaderboard_winner(), Some("bob"));

        assert_eq!(pvp().leaderboard_winner(), None);
    }

    #[test]
    fn test_session_config_validated_clamps_zero_grace() {
        let cfg = SessionConfig {
            reconnect_grace: Duration::ZERO,
        }
        .validated();
        assert_eq!(cfg.reconnect_grace, SessionConfig::MIN_RECONNECT_GRACE);
        assert_eq!(SessionConfig::default().reconnect_grace, Duration::from_secs(120));
    }
}
