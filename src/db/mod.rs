//! Database persistence layer for users, sessions and games.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::DbError;
pub use models::{
    Game, GamePatch, GameStatus, GameWinner, NewGame, NewSession, NewUser, Session,
    SessionPatch, SessionStatus, User, UserPatch,
};
pub use repository::{
    GameCriteria, GameRepository, Repository, SessionCriteria, SessionRepository, UserCriteria,
    UserRepository,
};
