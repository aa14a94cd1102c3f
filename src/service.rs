//! Use-case orchestrator: accounts, session and game lifecycle, turn
//! resolution, and high-score reporting.
//!
//! Repositories are injected behind the [`Repository`] trait; the opponent
//! move is injected behind [`OpponentStrategy`]. All business-rule
//! rejections come back as [`ServiceError`] values; only invariant
//! violations indicate corrupted state.

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::board::{Board, BoardState, CoordError, Field, Mark};
use crate::db::{
    DbError, Game, GameCriteria, GamePatch, GameRepository, GameStatus, GameWinner, NewGame,
    NewSession, NewUser, Repository, Session, SessionCriteria, SessionPatch, SessionRepository,
    SessionStatus, User, UserCriteria, UserPatch, UserRepository,
};
use crate::error::ServiceError;
use crate::ledger::{self, PLAY_COST, WIN_BONUS};
use crate::opponent::{OpponentStrategy, RandomOpponent};
use crate::report;
use crate::views::{
    Credentials, GameView, HighScore, PlayOutcome, SessionCheck, SessionConflict, SessionStarted,
    SessionView, UserView,
};

/// Default credit balance granted on registration.
pub const DEFAULT_STARTING_CREDITS: i32 = 10;

/// Partial account update accepted by [`GameService::update_account`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    /// New email address.
    pub email: Option<String>,
    /// New password.
    pub password: Option<String>,
    /// New credit balance. Only accepted while the current balance is zero.
    pub credits: Option<i32>,
}

impl AccountUpdate {
    fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.credits.is_none()
    }
}

/// Registry of per-game mutexes serializing turn resolution.
///
/// The read-modify-write sequence in [`GameService::play`] is not atomic at
/// the persistence layer, so concurrent requests for the same game id must
/// not interleave.
#[derive(Debug, Clone, Default)]
struct MoveLocks {
    inner: Arc<Mutex<HashMap<i32, Arc<Mutex<()>>>>>,
}

impl MoveLocks {
    fn acquire(&self, game_id: i32) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().unwrap();
        locks.entry(game_id).or_default().clone()
    }

    /// Evicts a finished game's entry. Callers still holding the returned
    /// [`Arc`] keep their guard; only future acquirers get a fresh lock.
    fn release(&self, game_id: i32) {
        let mut locks = self.inner.lock().unwrap();
        locks.remove(&game_id);
    }
}

/// The game backend's use-case layer.
pub struct GameService<U, S, G, O = RandomOpponent> {
    users: U,
    sessions: S,
    games: G,
    opponent: O,
    starting_credits: i32,
    move_locks: MoveLocks,
}

/// [`GameService`] wired to the sqlite repositories and random opponent.
pub type SqliteGameService =
    GameService<UserRepository, SessionRepository, GameRepository, RandomOpponent>;

impl SqliteGameService {
    /// Opens the service over the database at `db_path`.
    pub fn open(db_path: &str, starting_credits: i32) -> Self {
        Self::new(
            UserRepository::new(db_path),
            SessionRepository::new(db_path),
            GameRepository::new(db_path),
            RandomOpponent,
            starting_credits,
        )
    }
}

impl<U, S, G, O> GameService<U, S, G, O>
where
    U: Repository<Entity = User, NewEntity = NewUser, Criteria = UserCriteria, Patch = UserPatch>,
    S: Repository<
            Entity = Session,
            NewEntity = NewSession,
            Criteria = SessionCriteria,
            Patch = SessionPatch,
        >,
    G: Repository<Entity = Game, NewEntity = NewGame, Criteria = GameCriteria, Patch = GamePatch>,
    O: OpponentStrategy,
{
    /// Creates a service over the given repositories and opponent strategy.
    pub fn new(users: U, sessions: S, games: G, opponent: O, starting_credits: i32) -> Self {
        Self {
            users,
            sessions,
            games,
            opponent,
            starting_credits,
            move_locks: MoveLocks::default(),
        }
    }

    /// Registers a new user with the starting credit balance.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UserExists`] if the email is taken.
    #[instrument(skip(self, password))]
    pub fn register(&self, email: &str, password: &str) -> Result<UserView, ServiceError> {
        let existing = self.users.filter_by(&UserCriteria::by_email(email))?;
        if !existing.is_empty() {
            return Err(ServiceError::UserExists);
        }
        let user = self.users.create(NewUser::new(
            email.to_string(),
            password.to_string(),
            self.starting_credits,
        ))?;
        info!(user_id = user.id(), "User registered");
        Ok(UserView::from(&user))
    }

    /// Checks credentials and returns an opaque identity.
    ///
    /// # Errors
    ///
    /// [`ServiceError::AuthFailed`] on unknown email or wrong password.
    #[instrument(skip(self, password))]
    pub fn login(&self, email: &str, password: &str) -> Result<Credentials, ServiceError> {
        let user = self
            .users
            .filter_by(&UserCriteria::by_email(email))?
            .into_iter()
            .next()
            .ok_or(ServiceError::AuthFailed)?;
        if user.password() != password {
            return Err(ServiceError::AuthFailed);
        }
        Ok(Credentials {
            user_id: *user.id(),
        })
    }

    /// Returns the account view, without the password.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if the user is absent.
    #[instrument(skip(self))]
    pub fn get_account(&self, user_id: i32) -> Result<UserView, ServiceError> {
        Ok(UserView::from(&self.user(user_id)?))
    }

    /// Applies a partial account update.
    ///
    /// Credits may only be set while the current balance is zero, and never
    /// to a negative value.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`], [`ServiceError::CreditsNotZero`] or
    /// [`ServiceError::NegativeCredits`].
    #[instrument(skip(self, update))]
    pub fn update_account(
        &self,
        user_id: i32,
        update: AccountUpdate,
    ) -> Result<UserView, ServiceError> {
        let user = self.user(user_id)?;
        if update.is_empty() {
            return Ok(UserView::from(&user));
        }
        if let Some(credits) = update.credits {
            if credits < 0 {
                return Err(ServiceError::NegativeCredits);
            }
            if *user.credits() != 0 {
                return Err(ServiceError::CreditsNotZero);
            }
        }
        let patch = UserPatch {
            email: update.email,
            password: update.password,
            credits: update.credits,
        };
        let updated = self
            .users
            .update_fields(user_id, patch)?
            .ok_or(ServiceError::NotFound { entity: "user" })?;
        info!(user_id, "Account updated");
        Ok(UserView::from(&updated))
    }

    /// Starts a play session: debits [`PLAY_COST`], creates the session and
    /// its first game with a randomly assigned mark.
    ///
    /// # Errors
    ///
    /// [`ServiceError::SessionConflict`] (with the existing session's
    /// non-board game summaries) if an active session already exists;
    /// [`ServiceError::InsufficientCredits`] if the balance cannot cover
    /// [`PLAY_COST`].
    #[instrument(skip(self))]
    pub fn start_session(&self, user_id: i32) -> Result<SessionStarted, ServiceError> {
        let user = self.user(user_id)?;

        let active = self
            .sessions
            .filter_by(&SessionCriteria::by_user_status(user_id, SessionStatus::Active))?;
        if let Some(existing) = active.into_iter().next() {
            let games = self.games.filter_by(&GameCriteria::by_session(*existing.id()))?;
            warn!(user_id, session_id = existing.id(), "Active session already exists");
            return Err(ServiceError::SessionConflict(SessionConflict {
                session: SessionView::from(&existing),
                games: games.iter().map(Into::into).collect(),
                message: "Game session already active".to_string(),
            }));
        }

        let balance = ledger::debit(*user.credits(), PLAY_COST)
            .map_err(|e| ServiceError::InsufficientCredits { balance: e.balance })?;
        self.set_credits(user_id, balance)?;

        let session = self.sessions.create(NewSession::new(user_id))?;
        let game = self.create_game_row(user_id, *session.id())?;
        info!(user_id, session_id = session.id(), game_id = game.id(), "Session started");

        Ok(SessionStarted {
            session: SessionView::from(&session),
            game_id: *game.id(),
            message: "Game session started".to_string(),
        })
    }

    /// Creates a fresh game in an active session, debiting [`PLAY_COST`].
    ///
    /// # Errors
    ///
    /// [`ServiceError::SessionFinished`], [`ServiceError::GameConflict`]
    /// (with the existing game id), or
    /// [`ServiceError::InsufficientCredits`] — the latter also finishes the
    /// session.
    #[instrument(skip(self))]
    pub fn create_game(&self, user_id: i32, session_id: i32) -> Result<GameView, ServiceError> {
        let user = self.user(user_id)?;
        let session = self.session(session_id, user_id)?;
        if !session.is_active()? {
            return Err(ServiceError::SessionFinished);
        }

        let open = self.games.filter_by(&GameCriteria::open_for_session(session_id))?;
        if let Some(existing) = open.first() {
            return Err(ServiceError::GameConflict {
                game_id: *existing.id(),
            });
        }

        match ledger::debit(*user.credits(), PLAY_COST) {
            Err(e) => {
                // Cannot afford another board: the session ends here.
                self.finish_session(&session)?;
                Err(ServiceError::InsufficientCredits { balance: e.balance })
            }
            Ok(balance) => {
                self.set_credits(user_id, balance)?;
                let game = self.create_game_row(user_id, session_id)?;
                self.game_view(&game)
            }
        }
    }

    /// Reports whether a session exists and accepts play.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure; absent or finished
    /// sessions are reported in the payload.
    #[instrument(skip(self))]
    pub fn check_session_status(
        &self,
        session_id: i32,
        user_id: i32,
    ) -> Result<SessionCheck, ServiceError> {
        let found = self
            .sessions
            .filter_by(&SessionCriteria::by_id_and_user(session_id, user_id))?
            .into_iter()
            .next();
        let Some(session) = found else {
            return Ok(SessionCheck {
                active: false,
                session: None,
                message: Some("Game session not found for requested user".to_string()),
                code: 404,
            });
        };
        if !session.is_active()? {
            return Ok(SessionCheck {
                active: false,
                session: None,
                message: Some("Game session is finished".to_string()),
                code: 400,
            });
        }
        Ok(SessionCheck {
            active: true,
            session: Some(SessionView::from(&session)),
            message: None,
            code: 200,
        })
    }

    /// Resolves one turn: the human move, then (if the game goes on) the
    /// opponent's counter-move, finalizing on any terminal state.
    ///
    /// Runs under a per-game lock so concurrent calls for the same game id
    /// cannot interleave their read-modify-write sequences.
    ///
    /// # Errors
    ///
    /// [`ServiceError::MissingFields`] / [`ServiceError::InvalidFields`] on
    /// malformed coordinates, [`ServiceError::SpotTaken`] (with the
    /// untouched board) on an occupied cell, lifecycle errors for wrong
    /// session/game state, and [`ServiceError::Invariant`] when an active
    /// session unexpectedly has no open game.
    #[instrument(skip(self))]
    pub fn play(
        &self,
        session_id: i32,
        user_id: i32,
        game_id: i32,
        row: Option<i32>,
        col: Option<i32>,
    ) -> Result<PlayOutcome, ServiceError> {
        let game_lock = self.move_locks.acquire(game_id);
        let _turn = game_lock.lock().unwrap();

        let field = Field::new(row, col).map_err(|e| match e {
            CoordError::MissingFields => ServiceError::MissingFields,
            CoordError::InvalidFields(fields) => ServiceError::InvalidFields { fields },
        })?;

        let user = self.user(user_id)?;
        let session = self.session(session_id, user_id)?;
        if !session.is_active()? {
            return Err(ServiceError::SessionFinished);
        }

        let game = self
            .games
            .filter_by(&GameCriteria::open_for_session(session_id))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ServiceError::Invariant(format!("active session {session_id} has no open game"))
            })?;
        if *game.id() != game_id {
            return Err(self.classify_game_mismatch(game_id, user_id)?);
        }

        let mark = game.parse_symbol()?;
        let mut board = game.parse_board()?;

        if !board.is_move_possible(field) {
            debug!(game_id, ?field, "Rejected move onto occupied cell");
            return Err(ServiceError::SpotTaken {
                board,
                symbol: mark,
            });
        }

        board.apply_move(field, mark);
        self.persist_board(&game, &board)?;

        let state = board.evaluate();
        if state.is_terminal() {
            return self.finalize(&user, &session, &game, &board, state);
        }

        // Human move left the game open, so a free spot is guaranteed.
        let spot = self.opponent.choose(&board);
        board.apply_move(spot, mark.opponent());
        self.persist_board(&game, &board)?;

        let state = board.evaluate();
        if state.is_terminal() {
            return self.finalize(&user, &session, &game, &board, state);
        }

        Ok(PlayOutcome {
            board,
            symbol: mark,
            credits: *user.credits(),
            status: GameStatus::InProgress.to_db_string().to_string(),
            winner: None,
            score: None,
            message: "Your move".to_string(),
        })
    }

    /// Derives the high-score table from finished sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Db`] on storage failure.
    #[instrument(skip(self))]
    pub fn high_scores(&self) -> Result<Vec<HighScore>, ServiceError> {
        let mut finished = self.sessions.filter_by(&SessionCriteria {
            status: Some(SessionStatus::Finished),
            ..SessionCriteria::default()
        })?;
        finished.sort_by(|a, b| b.ended_at().cmp(a.ended_at()));

        let mut entries = Vec::with_capacity(finished.len());
        for session in &finished {
            let owner = self
                .users
                .filter_by(&UserCriteria::by_id(*session.user_id()))?
                .into_iter()
                .next();
            let Some(owner) = owner else {
                warn!(session_id = session.id(), "Finished session without owner, skipping");
                continue;
            };
            entries.push(HighScore {
                date: session.ended_at().map(|t| t.date().to_string()),
                score: *session.score(),
                user: report::mask_email(owner.email()),
                time_played: report::format_time_played(*session.created_at(), *session.ended_at()),
            });
        }
        Ok(entries)
    }

    fn user(&self, user_id: i32) -> Result<User, ServiceError> {
        self.users
            .filter_by(&UserCriteria::by_id(user_id))?
            .into_iter()
            .next()
            .ok_or(ServiceError::NotFound { entity: "user" })
    }

    fn session(&self, session_id: i32, user_id: i32) -> Result<Session, ServiceError> {
        self.sessions
            .filter_by(&SessionCriteria::by_id_and_user(session_id, user_id))?
            .into_iter()
            .next()
            .ok_or(ServiceError::NotFound { entity: "session" })
    }

    fn set_credits(&self, user_id: i32, balance: i32) -> Result<(), ServiceError> {
        self.users
            .update_fields(
                user_id,
                UserPatch {
                    credits: Some(balance),
                    ..UserPatch::default()
                },
            )?
            .ok_or(ServiceError::NotFound { entity: "user" })?;
        Ok(())
    }

    fn create_game_row(&self, user_id: i32, session_id: i32) -> Result<Game, ServiceError> {
        let board = serde_json::to_string(&Board::new()).map_err(DbError::from)?;
        let mark = Mark::random();
        let game = self.games.create(NewGame::new(
            user_id,
            Some(session_id),
            board,
            mark.to_db_string().to_string(),
            GameStatus::InProgress.to_db_string().to_string(),
        ))?;
        Ok(game)
    }

    fn game_view(&self, game: &Game) -> Result<GameView, ServiceError> {
        Ok(GameView {
            id: *game.id(),
            session_id: *game.session_id(),
            board: game.parse_board()?,
            symbol: game.parse_symbol()?,
            status: game.status().clone(),
        })
    }

    fn persist_board(&self, game: &Game, board: &Board) -> Result<(), ServiceError> {
        let json = serde_json::to_string(board).map_err(DbError::from)?;
        self.games
            .update_fields(
                *game.id(),
                GamePatch {
                    board: Some(json),
                    status: Some(GameStatus::InProgress.to_db_string().to_string()),
                    winner: None,
                },
            )?
            .ok_or(ServiceError::NotFound { entity: "game" })?;
        Ok(())
    }

    /// Explains why the caller's game id does not match the open game.
    fn classify_game_mismatch(
        &self,
        game_id: i32,
        user_id: i32,
    ) -> Result<ServiceError, ServiceError> {
        let requested = self.games.filter_by(&GameCriteria {
            id: Some(game_id),
            user_id: Some(user_id),
            ..GameCriteria::default()
        })?;
        Ok(match requested.first() {
            Some(game) if game.parse_status()? == GameStatus::Finished => {
                ServiceError::GameFinished
            }
            _ => ServiceError::NotFound { entity: "game" },
        })
    }

    /// Stamps the session finished. `ended_at` is set exactly once; calling
    /// this on an already-finished session is a no-op.
    fn finish_session(&self, session: &Session) -> Result<(), ServiceError> {
        if !session.is_active()? {
            return Ok(());
        }
        self.sessions
            .update_fields(
                *session.id(),
                SessionPatch {
                    status: Some(SessionStatus::Finished.to_db_string().to_string()),
                    ended_at: Some(Utc::now().naive_utc()),
                    ..SessionPatch::default()
                },
            )?
            .ok_or(ServiceError::NotFound { entity: "session" })?;
        info!(session_id = session.id(), "Session finished");
        Ok(())
    }

    /// Finalizes a terminal game: records the winner, settles credits and
    /// score. Finalizing an already-finished game is a no-op.
    fn finalize(
        &self,
        user: &User,
        session: &Session,
        game: &Game,
        board: &Board,
        state: BoardState,
    ) -> Result<PlayOutcome, ServiceError> {
        let human = game.parse_symbol()?;

        if game.parse_status()? == GameStatus::Finished {
            self.move_locks.release(*game.id());
            return Ok(PlayOutcome {
                board: board.clone(),
                symbol: human,
                credits: *user.credits(),
                status: GameStatus::Finished.to_db_string().to_string(),
                winner: game
                    .parse_winner()?
                    .map(|w| w.to_db_string().to_string()),
                score: Some(*session.score()),
                message: "Game already finished".to_string(),
            });
        }

        let (winner, message) = match state {
            BoardState::Won(mark) if mark == human => (GameWinner::Human, "You win!"),
            BoardState::Won(_) => (GameWinner::NotHuman, "You lose"),
            BoardState::Draw => (GameWinner::Draw, "Draw"),
            BoardState::InPlay => {
                return Err(ServiceError::Invariant(format!(
                    "finalize called on non-terminal game {}",
                    game.id()
                )));
            }
        };

        let json = serde_json::to_string(board).map_err(DbError::from)?;
        self.games
            .update_fields(
                *game.id(),
                GamePatch {
                    board: Some(json),
                    status: Some(GameStatus::Finished.to_db_string().to_string()),
                    winner: Some(winner.to_db_string().to_string()),
                },
            )?
            .ok_or(ServiceError::NotFound { entity: "game" })?;

        let mut credits = *user.credits();
        let mut score = *session.score();
        match winner {
            GameWinner::Human => {
                credits = ledger::credit(credits, WIN_BONUS);
                self.set_credits(*user.id(), credits)?;
                score += 1;
                self.sessions
                    .update_fields(
                        *session.id(),
                        SessionPatch {
                            score: Some(score),
                            ..SessionPatch::default()
                        },
                    )?
                    .ok_or(ServiceError::NotFound { entity: "session" })?;
            }
            GameWinner::NotHuman => {
                if !ledger::can_afford_game(credits) {
                    self.finish_session(session)?;
                }
            }
            GameWinner::Draw => {}
        }

        info!(
            game_id = game.id(),
            winner = winner.to_db_string(),
            credits,
            score,
            "Game finalized"
        );
        // The game accepts no further moves; drop its lock entry.
        self.move_locks.release(*game.id());

        Ok(PlayOutcome {
            board: board.clone(),
            symbol: human,
            credits,
            status: GameStatus::Finished.to_db_string().to_string(),
            winner: Some(winner.to_db_string().to_string()),
            score: Some(score),
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::MoveLocks;

    #[test]
    fn test_move_locks_reuse_entry_per_game() {
        let locks = MoveLocks::default();
        let first = locks.acquire(1);
        let second = locks.acquire(1);
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(locks.inner.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_move_locks_release_evicts_entry() {
        let locks = MoveLocks::default();
        let held = locks.acquire(7);
        let _guard = held.lock().unwrap();

        locks.release(7);
        assert!(locks.inner.lock().unwrap().is_empty());

        // A later acquirer gets a fresh lock; the held guard stays valid.
        let fresh = locks.acquire(7);
        assert!(!std::sync::Arc::ptr_eq(&held, &fresh));
    }
}
