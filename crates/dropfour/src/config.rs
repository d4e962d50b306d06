//! Server-wide game configuration.

use std::time::Duration;

use dropfour_engine::{Lookahead, Scripted, Strategy};
use dropfour_matchmaking::MatchmakingConfig;
use dropfour_session::SessionConfig;
use tracing::warn;

/// How the bot picks its moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BotStrategy {
    /// Win, else block, else centre-out.
    #[default]
    Scripted,
    /// Fixed-depth minimax over the position heuristic.
    Lookahead { depth: u32 },
}

impl BotStrategy {
    /// Deepest search [`validated`](ProtocolConfig::validated) allows.
    pub const MAX_DEPTH: u32 = 5;

    pub fn build(self) -> Box<dyn Strategy> {
        match self {
            Self::Scripted => Box::new(Scripted),
            Self::Lookahead { depth } => Box::new(Lookahead { depth }),
        }
    }
}

/// Everything the connection protocol needs to know.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub session: SessionConfig,
    pub matchmaking: MatchmakingConfig,
    /// Pause before the bot answers a move.
    ///
    /// Default: 500 ms.
    pub bot_move_delay: Duration,
    /// Name shown for the bot's seat.
    pub bot_name: String,
    pub strategy: BotStrategy,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            matchmaking: MatchmakingConfig::default(),
            bot_move_delay: Duration::from_millis(500),
            bot_name: "Bot".to_string(),
            strategy: BotStrategy::default(),
        }
    }
}

impl ProtocolConfig {
    /// Clamps or replaces out-of-range values.
    ///
    /// - `session` and `matchmaking` run their own `validated()`.
    /// - A blank `bot_name` falls back to `"Bot"`.
    /// - `Lookahead` depth is clamped to `1..=5`.
    pub fn validated(mut self) -> Self {
        self.session = self.session.validated();
        self.matchmaking = self.matchmaking.validated();

        let trimmed = self.bot_name.trim();
        if trimmed.is_empty() {
            warn!("bot_name is blank, using default");
            self.bot_name = "Bot".to_string();
        } else if trimmed.len() != self.bot_name.len() {
            self.bot_name = trimmed.to_string();
        }

        if let BotStrategy::Lookahead { depth } = self.strategy {
            let clamped = depth.clamp(1, BotStrategy::MAX_DEPTH);
            if clamped != depth {
                warn!(depth, clamped, "lookahead depth out of range, clamping");
                self.strategy = BotStrategy::Lookahead { depth: clamped };
            }
        }
        self
    }
}
