//! Serializable result payloads handed to the HTTP layer.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::board::{Board, Mark};
use crate::db::{Game, Session, User};

/// User account view, without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    /// User id.
    pub id: i32,
    /// Email address.
    pub email: String,
    /// Current credit balance.
    pub credits: i32,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: *user.id(),
            email: user.email().clone(),
            credits: *user.credits(),
        }
    }
}

/// Opaque credentials returned on login.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Credentials {
    /// Authenticated user id.
    pub user_id: i32,
}

/// Session view.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    /// Session id.
    pub id: i32,
    /// Owning user id.
    pub user_id: i32,
    /// Lifecycle status string.
    pub status: String,
    /// Wins within the session.
    pub score: i32,
    /// Creation timestamp.
    pub created_at: NaiveDateTime,
    /// Finish timestamp, absent while the session runs.
    pub ended_at: Option<NaiveDateTime>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: *session.id(),
            user_id: *session.user_id(),
            status: session.status().clone(),
            score: *session.score(),
            created_at: *session.created_at(),
            ended_at: *session.ended_at(),
        }
    }
}

/// Non-board game summary, used in session conflict payloads.
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    /// Game id.
    pub id: i32,
    /// Lifecycle status string.
    pub status: String,
    /// Recorded winner, if finished.
    pub winner: Option<String>,
}

impl From<&Game> for GameSummary {
    fn from(game: &Game) -> Self {
        Self {
            id: *game.id(),
            status: game.status().clone(),
            winner: game.winner().clone(),
        }
    }
}

/// Full game view including the board.
#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    /// Game id.
    pub id: i32,
    /// Parent session id.
    pub session_id: Option<i32>,
    /// Current board.
    pub board: Board,
    /// The human player's mark.
    pub symbol: Mark,
    /// Lifecycle status string.
    pub status: String,
}

/// Result of starting a session: the session plus its first game.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStarted {
    /// The created session.
    pub session: SessionView,
    /// Id of the accompanying game.
    pub game_id: i32,
    /// Human-readable confirmation.
    pub message: String,
}

/// Conflict payload returned when an active session already exists.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConflict {
    /// The existing session.
    pub session: SessionView,
    /// Summaries of the session's games, without boards.
    pub games: Vec<GameSummary>,
    /// Human-readable explanation.
    pub message: String,
}

/// Outcome of one resolved turn.
#[derive(Debug, Clone, Serialize)]
pub struct PlayOutcome {
    /// Board after the human and (possibly) opponent moves.
    pub board: Board,
    /// The human player's mark.
    pub symbol: Mark,
    /// The user's credit balance after the turn.
    pub credits: i32,
    /// Game status string after the turn.
    pub status: String,
    /// Winner string, present once the game is finished.
    pub winner: Option<String>,
    /// Session score, present once the game is finished.
    pub score: Option<i32>,
    /// Human-readable summary of the turn.
    pub message: String,
}

/// Result of a session status check.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCheck {
    /// True when the session exists and accepts play.
    pub active: bool,
    /// The session, when active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
    /// Explanation, when not active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// HTTP-style status code for the surrounding layer.
    #[serde(skip)]
    pub code: u16,
}

/// One high-score entry derived from a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighScore {
    /// Date the session ended, if recorded.
    pub date: Option<String>,
    /// Session score.
    pub score: i32,
    /// Masked owner email.
    pub user: String,
    /// Human-readable elapsed time.
    pub time_played: String,
}
