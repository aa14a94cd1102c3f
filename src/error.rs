//! Service-level error taxonomy.
//!
//! Validation and business-rule failures are returned as structured values;
//! only [`ServiceError::Invariant`] signals corrupted state and is mapped to
//! an internal error by the surrounding layer.

use derive_more::{Display, Error};
use std::collections::BTreeMap;

use crate::board::{Board, Mark};
use crate::db::DbError;
use crate::views::SessionConflict;

/// Everything the orchestrator can reject or fail with.
#[derive(Debug, Clone, Display, Error)]
pub enum ServiceError {
    /// A referenced entity does not exist.
    #[display("{entity} not found")]
    NotFound {
        /// Entity kind, e.g. "user".
        entity: &'static str,
    },

    /// Registration re-used an existing email.
    #[display("User already exists")]
    UserExists,

    /// Login with unknown email or wrong password.
    #[display("User doesn't exist or password does not match")]
    AuthFailed,

    /// An active session already exists for the user.
    #[display("Game session already active")]
    SessionConflict(#[error(not(source))] SessionConflict),

    /// An unfinished game already exists for the session.
    #[display("Game {game_id} already in progress")]
    GameConflict {
        /// Id of the conflicting game.
        game_id: i32,
    },

    /// The session is finished; no further games may be created.
    #[display("Game session is finished")]
    SessionFinished,

    /// The game is already finished; no further moves accepted.
    #[display("Game is already finished")]
    GameFinished,

    /// A debit would drive the balance below zero.
    #[display("Not enough credits")]
    InsufficientCredits {
        /// Balance at the time of the rejected debit.
        balance: i32,
    },

    /// Credits may only be set while the balance is zero.
    #[display("Invalid credits count. Should be 0 before updating")]
    CreditsNotZero,

    /// A credit balance may never be set negative.
    #[display("Credits must not be negative")]
    NegativeCredits,

    /// Both coordinates missing from the move input.
    #[display("Row and col fields are required")]
    MissingFields,

    /// Per-field validation failures, keyed by field name.
    #[display("Invalid fields: {fields:?}")]
    InvalidFields {
        /// One message per invalid field.
        fields: BTreeMap<&'static str, String>,
    },

    /// Move onto an occupied cell; carries context for the client.
    #[display("Spot is already taken")]
    SpotTaken {
        /// Board as it stands, unmutated.
        board: Board,
        /// The human player's mark.
        symbol: Mark,
    },

    /// Data-consistency bug, e.g. an active session without an open game.
    /// Unrecoverable; never swallowed.
    #[display("Invariant violation: {_0}")]
    Invariant(#[error(not(source))] String),

    /// Underlying database failure.
    #[display("{_0}")]
    Db(DbError),
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        Self::Db(err)
    }
}

impl ServiceError {
    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::AuthFailed => 401,
            Self::Invariant(_) | Self::Db(_) => 500,
            _ => 400,
        }
    }
}
