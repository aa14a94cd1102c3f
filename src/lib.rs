//! Gridplay library - credit-gated tic-tac-toe web backend
//!
//! Users register, spend credits to start play sessions, play 3x3 boards
//! against a randomized opponent move and accumulate score. Finished
//! sessions feed an anonymized high-score table.
//!
//! # Architecture
//!
//! - **Board engine**: pure 3x3 grid rules ([`Board`], [`Mark`], [`Field`])
//! - **Ledger**: credit constants and guarded debit/credit arithmetic
//! - **Service**: use-case orchestrator over injected repositories
//! - **Db**: diesel/sqlite persistence behind a generic [`Repository`]
//! - **Api**: thin axum surface serializing the service's results
//!
//! # Example
//!
//! ```no_run
//! use gridplay::{SqliteGameService, router};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = Arc::new(SqliteGameService::open("gridplay.db", 10));
//! let app = router(service);
//!
//! let listener = tokio::net::TcpListener::bind(("127.0.0.1", 3000)).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod api;
mod board;
mod db;
mod error;
mod ledger;
mod opponent;
mod report;
mod service;
mod views;

/// Command-line interface, used by the server binary.
pub mod cli;

// Crate-level exports - HTTP surface
pub use api::{AppState, router};

// Crate-level exports - Board engine
pub use board::{Board, BoardState, CoordError, Field, Mark};

// Crate-level exports - Credit ledger
pub use ledger::{InsufficientCredits, PLAY_COST, WIN_BONUS, can_afford_game, credit, debit};

// Crate-level exports - Opponent strategies
pub use opponent::{OpponentStrategy, RandomOpponent};

// Crate-level exports - Orchestrator
pub use service::{AccountUpdate, DEFAULT_STARTING_CREDITS, GameService, SqliteGameService};

// Crate-level exports - Error taxonomy
pub use error::ServiceError;

// Crate-level exports - Reporting helpers
pub use report::{format_time_played, mask_email};

// Crate-level exports - Persistence
pub use db::{
    DbError, Game, GameCriteria, GamePatch, GameRepository, GameStatus, GameWinner, NewGame,
    NewSession, NewUser, Repository, Session, SessionCriteria, SessionPatch, SessionRepository,
    SessionStatus, User, UserCriteria, UserPatch, UserRepository,
};

// Crate-level exports - Result payloads
pub use views::{
    Credentials, GameSummary, GameView, HighScore, PlayOutcome, SessionCheck, SessionConflict,
    SessionStarted, SessionView, UserView,
};
