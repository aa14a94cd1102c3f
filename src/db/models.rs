//! Database models and domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;

use crate::board::{Board, Mark};
use crate::db::{DbError, schema};

/// User account database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::users)]
pub struct User {
    id: i32,
    email: String,
    password: String,
    credits: i32,
}

/// Insertable user model for registration.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    email: String,
    password: String,
    credits: i32,
}

/// Partial update for a user row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = schema::users)]
pub struct UserPatch {
    /// New email address.
    pub email: Option<String>,
    /// New password.
    pub password: Option<String>,
    /// New credit balance.
    pub credits: Option<i32>,
}

/// Game session database model.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::sessions)]
#[diesel(belongs_to(User))]
pub struct Session {
    id: i32,
    user_id: i32,
    status: String,
    score: i32,
    created_at: NaiveDateTime,
    ended_at: Option<NaiveDateTime>,
}

impl Session {
    /// Parses the stored status string into a [`SessionStatus`].
    pub fn parse_status(&self) -> Result<SessionStatus, DbError> {
        SessionStatus::from_db_string(self.status())
    }

    /// True unless the session has finished.
    pub fn is_active(&self) -> Result<bool, DbError> {
        Ok(self.parse_status()? == SessionStatus::Active)
    }
}

/// Insertable session model. Status, score and creation time come from
/// column defaults.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::sessions)]
pub struct NewSession {
    user_id: i32,
}

/// Partial update for a session row.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = schema::sessions)]
pub struct SessionPatch {
    /// New status string (see [`SessionStatus::to_db_string`]).
    pub status: Option<String>,
    /// New cumulative score.
    pub score: Option<i32>,
    /// Finish timestamp, set exactly once at session end.
    pub ended_at: Option<NaiveDateTime>,
}

/// Game database model. The board is stored as JSON text.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::games)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Session))]
pub struct Game {
    id: i32,
    user_id: i32,
    session_id: Option<i32>,
    board: String,
    symbol: String,
    status: String,
    winner: Option<String>,
}

impl Game {
    /// Deserializes the stored board JSON.
    pub fn parse_board(&self) -> Result<Board, DbError> {
        Ok(serde_json::from_str(self.board())?)
    }

    /// Parses the human player's mark.
    pub fn parse_symbol(&self) -> Result<Mark, DbError> {
        Mark::from_db_string(self.symbol())
            .ok_or_else(|| DbError::new(format!("Invalid symbol: '{}'", self.symbol())))
    }

    /// Parses the stored status string into a [`GameStatus`].
    pub fn parse_status(&self) -> Result<GameStatus, DbError> {
        GameStatus::from_db_string(self.status())
    }

    /// Parses the stored winner, if the game has one recorded.
    pub fn parse_winner(&self) -> Result<Option<GameWinner>, DbError> {
        self.winner
            .as_deref()
            .map(GameWinner::from_db_string)
            .transpose()
    }
}

/// Insertable game model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::games)]
pub struct NewGame {
    user_id: i32,
    session_id: Option<i32>,
    board: String,
    symbol: String,
    status: String,
}

/// Partial update for a game row.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = schema::games)]
pub struct GamePatch {
    /// New board JSON.
    pub board: Option<String>,
    /// New status string.
    pub status: Option<String>,
    /// Winner, recorded once at finalization.
    pub winner: Option<String>,
}

/// Session lifecycle status.
///
/// Historical rows may carry a `new` status; it behaves exactly like
/// `active` and parses as such. Only `active` and `finished` are ever
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Session accepts new games.
    Active,
    /// Session is closed; no further games may be created against it.
    Finished,
}

impl SessionStatus {
    /// Converts status to the string stored in the database.
    pub fn to_db_string(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }

    /// Parses status from the string stored in the database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the string is not a valid status value.
    pub fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "active" | "new" => Ok(Self::Active),
            "finished" => Ok(Self::Finished),
            _ => Err(DbError::new(format!("Invalid session status: '{}'", s))),
        }
    }
}

/// Game lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    /// Created, no move made yet.
    NotStarted,
    /// At least one move made, no terminal state reached.
    InProgress,
    /// Terminal state reached; winner and credits finalized.
    Finished,
}

impl GameStatus {
    /// True for the states that block creating another game in the session.
    pub fn is_open(self) -> bool {
        matches!(self, Self::NotStarted | Self::InProgress)
    }

    /// Converts status to the string stored in the database.
    pub fn to_db_string(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
        }
    }

    /// Parses status from the string stored in the database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the string is not a valid status value.
    pub fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "finished" => Ok(Self::Finished),
            _ => Err(DbError::new(format!("Invalid game status: '{}'", s))),
        }
    }
}

/// Outcome of a finished game, from the human player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameWinner {
    /// The human's mark completed a line.
    Human,
    /// Board full with no line complete.
    Draw,
    /// The opponent's mark completed a line.
    NotHuman,
}

impl GameWinner {
    /// Converts the outcome to the string stored in the database.
    pub fn to_db_string(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Draw => "draw",
            Self::NotHuman => "not_human",
        }
    }

    /// Parses the outcome from the string stored in the database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the string is not a valid outcome value.
    pub fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "human" => Ok(Self::Human),
            "draw" => Ok(Self::Draw),
            "not_human" => Ok(Self::NotHuman),
            _ => Err(DbError::new(format!("Invalid winner: '{}'", s))),
        }
    }
}
