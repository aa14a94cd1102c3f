//! Per-entity repositories over sqlite.
//!
//! Every repository holds a database path and establishes a connection per
//! call. Request-level serialization for the read-modify-write sequences in
//! turn resolution is provided by the orchestrator's per-game locks, not
//! here.

use diesel::prelude::*;
use tracing::{debug, info, instrument};

use crate::db::models::{
    Game, GamePatch, GameStatus, NewGame, NewSession, NewUser, Session, SessionPatch,
    SessionStatus, User, UserPatch,
};
use crate::db::{DbError, schema};

/// Generic persistence contract, implemented once per entity type.
pub trait Repository {
    /// Persisted record type.
    type Entity;
    /// Insertable fields for new records.
    type NewEntity;
    /// Filter criteria; unset fields match everything.
    type Criteria;
    /// Partial update; unset fields are left untouched.
    type Patch;

    /// Returns every record matching the criteria.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    fn filter_by(&self, criteria: &Self::Criteria) -> Result<Vec<Self::Entity>, DbError>;

    /// Inserts a record and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert violates a constraint or a
    /// database error occurs.
    fn create(&self, fields: Self::NewEntity) -> Result<Self::Entity, DbError>;

    /// Applies the patch to the record with the given id.
    ///
    /// Returns `None` if no such record exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    fn update_fields(&self, id: i32, patch: Self::Patch) -> Result<Option<Self::Entity>, DbError>;

    /// All records, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    fn all(&self) -> Result<Vec<Self::Entity>, DbError>;
}

macro_rules! sqlite_backed {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone)]
        pub struct $name {
            db_path: String,
        }

        impl $name {
            /// Creates a repository connected to the database at the given
            /// path. Use `":memory:"` for an in-memory database.
            pub fn new(db_path: impl Into<String>) -> Self {
                Self {
                    db_path: db_path.into(),
                }
            }

            fn connection(&self) -> Result<SqliteConnection, DbError> {
                debug!(path = %self.db_path, "Establishing connection");
                SqliteConnection::establish(&self.db_path).map_err(|e| {
                    DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e))
                })
            }
        }
    };
}

sqlite_backed!(UserRepository, "Sqlite-backed repository for users.");
sqlite_backed!(SessionRepository, "Sqlite-backed repository for sessions.");
sqlite_backed!(GameRepository, "Sqlite-backed repository for games.");

/// Filter criteria for users.
#[derive(Debug, Clone, Default)]
pub struct UserCriteria {
    /// Match on id.
    pub id: Option<i32>,
    /// Match on email.
    pub email: Option<String>,
}

impl UserCriteria {
    /// Criteria matching a single user id.
    pub fn by_id(id: i32) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Criteria matching a single email.
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }
}

impl Repository for UserRepository {
    type Entity = User;
    type NewEntity = NewUser;
    type Criteria = UserCriteria;
    type Patch = UserPatch;

    #[instrument(skip(self))]
    fn filter_by(&self, criteria: &UserCriteria) -> Result<Vec<User>, DbError> {
        let mut conn = self.connection()?;
        let mut query = schema::users::table.into_boxed();
        if let Some(id) = criteria.id {
            query = query.filter(schema::users::id.eq(id));
        }
        if let Some(ref email) = criteria.email {
            query = query.filter(schema::users::email.eq(email.clone()));
        }
        let users = query.load::<User>(&mut conn)?;
        debug!(count = users.len(), "Users matched");
        Ok(users)
    }

    #[instrument(skip(self, fields))]
    fn create(&self, fields: NewUser) -> Result<User, DbError> {
        let mut conn = self.connection()?;
        let user = diesel::insert_into(schema::users::table)
            .values(&fields)
            .returning(User::as_returning())
            .get_result(&mut conn)?;
        info!(user_id = user.id(), "User created");
        Ok(user)
    }

    #[instrument(skip(self, patch))]
    fn update_fields(&self, id: i32, patch: UserPatch) -> Result<Option<User>, DbError> {
        let mut conn = self.connection()?;
        let updated = diesel::update(schema::users::table.find(id))
            .set(&patch)
            .execute(&mut conn)?;
        if updated == 0 {
            debug!(user_id = id, "No user to update");
            return Ok(None);
        }
        let user = schema::users::table.find(id).first(&mut conn).optional()?;
        Ok(user)
    }

    #[instrument(skip(self))]
    fn all(&self) -> Result<Vec<User>, DbError> {
        let mut conn = self.connection()?;
        Ok(schema::users::table.load::<User>(&mut conn)?)
    }
}

/// Filter criteria for sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionCriteria {
    /// Match on id.
    pub id: Option<i32>,
    /// Match on owning user.
    pub user_id: Option<i32>,
    /// Match on lifecycle status. `Active` also matches legacy `new` rows.
    pub status: Option<SessionStatus>,
}

impl SessionCriteria {
    /// Criteria for one user's sessions in a given status.
    pub fn by_user_status(user_id: i32, status: SessionStatus) -> Self {
        Self {
            user_id: Some(user_id),
            status: Some(status),
            ..Self::default()
        }
    }

    /// Criteria matching a session id owned by a user.
    pub fn by_id_and_user(id: i32, user_id: i32) -> Self {
        Self {
            id: Some(id),
            user_id: Some(user_id),
            ..Self::default()
        }
    }
}

impl Repository for SessionRepository {
    type Entity = Session;
    type NewEntity = NewSession;
    type Criteria = SessionCriteria;
    type Patch = SessionPatch;

    #[instrument(skip(self))]
    fn filter_by(&self, criteria: &SessionCriteria) -> Result<Vec<Session>, DbError> {
        let mut conn = self.connection()?;
        let mut query = schema::sessions::table.into_boxed();
        if let Some(id) = criteria.id {
            query = query.filter(schema::sessions::id.eq(id));
        }
        if let Some(user_id) = criteria.user_id {
            query = query.filter(schema::sessions::user_id.eq(user_id));
        }
        match criteria.status {
            Some(SessionStatus::Active) => {
                // Legacy rows may carry 'new'; it behaves as active.
                query = query.filter(schema::sessions::status.eq_any(["active", "new"]));
            }
            Some(SessionStatus::Finished) => {
                query = query.filter(schema::sessions::status.eq("finished"));
            }
            None => {}
        }
        let sessions = query.load::<Session>(&mut conn)?;
        debug!(count = sessions.len(), "Sessions matched");
        Ok(sessions)
    }

    #[instrument(skip(self, fields))]
    fn create(&self, fields: NewSession) -> Result<Session, DbError> {
        let mut conn = self.connection()?;
        let session = diesel::insert_into(schema::sessions::table)
            .values(&fields)
            .returning(Session::as_returning())
            .get_result(&mut conn)?;
        info!(session_id = session.id(), user_id = session.user_id(), "Session created");
        Ok(session)
    }

    #[instrument(skip(self, patch))]
    fn update_fields(&self, id: i32, patch: SessionPatch) -> Result<Option<Session>, DbError> {
        let mut conn = self.connection()?;
        let updated = diesel::update(schema::sessions::table.find(id))
            .set(&patch)
            .execute(&mut conn)?;
        if updated == 0 {
            debug!(session_id = id, "No session to update");
            return Ok(None);
        }
        let session = schema::sessions::table
            .find(id)
            .first(&mut conn)
            .optional()?;
        Ok(session)
    }

    #[instrument(skip(self))]
    fn all(&self) -> Result<Vec<Session>, DbError> {
        let mut conn = self.connection()?;
        Ok(schema::sessions::table.load::<Session>(&mut conn)?)
    }
}

/// Filter criteria for games.
#[derive(Debug, Clone, Default)]
pub struct GameCriteria {
    /// Match on id.
    pub id: Option<i32>,
    /// Match on owning user.
    pub user_id: Option<i32>,
    /// Match on parent session.
    pub session_id: Option<i32>,
    /// Match any of the given statuses.
    pub status_in: Option<Vec<GameStatus>>,
}

impl GameCriteria {
    /// Criteria for all games of a session.
    pub fn by_session(session_id: i32) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::default()
        }
    }

    /// Criteria for a session's unfinished game.
    pub fn open_for_session(session_id: i32) -> Self {
        Self {
            session_id: Some(session_id),
            status_in: Some(vec![GameStatus::NotStarted, GameStatus::InProgress]),
            ..Self::default()
        }
    }
}

impl Repository for GameRepository {
    type Entity = Game;
    type NewEntity = NewGame;
    type Criteria = GameCriteria;
    type Patch = GamePatch;

    #[instrument(skip(self))]
    fn filter_by(&self, criteria: &GameCriteria) -> Result<Vec<Game>, DbError> {
        let mut conn = self.connection()?;
        let mut query = schema::games::table.into_boxed();
        if let Some(id) = criteria.id {
            query = query.filter(schema::games::id.eq(id));
        }
        if let Some(user_id) = criteria.user_id {
            query = query.filter(schema::games::user_id.eq(user_id));
        }
        if let Some(session_id) = criteria.session_id {
            query = query.filter(schema::games::session_id.eq(session_id));
        }
        if let Some(ref statuses) = criteria.status_in {
            let strings: Vec<&'static str> =
                statuses.iter().map(|s| s.to_db_string()).collect();
            query = query.filter(schema::games::status.eq_any(strings));
        }
        let games = query.load::<Game>(&mut conn)?;
        debug!(count = games.len(), "Games matched");
        Ok(games)
    }

    #[instrument(skip(self, fields))]
    fn create(&self, fields: NewGame) -> Result<Game, DbError> {
        let mut conn = self.connection()?;
        let game = diesel::insert_into(schema::games::table)
            .values(&fields)
            .returning(Game::as_returning())
            .get_result(&mut conn)?;
        info!(game_id = game.id(), user_id = game.user_id(), "Game created");
        Ok(game)
    }

    #[instrument(skip(self, patch))]
    fn update_fields(&self, id: i32, patch: GamePatch) -> Result<Option<Game>, DbError> {
        let mut conn = self.connection()?;
        let updated = diesel::update(schema::games::table.find(id))
            .set(&patch)
            .execute(&mut conn)?;
        if updated == 0 {
            debug!(game_id = id, "No game to update");
            return Ok(None);
        }
        let game = schema::games::table.find(id).first(&mut conn).optional()?;
        Ok(game)
    }

    #[instrument(skip(self))]
    fn all(&self) -> Result<Vec<Game>, DbError> {
        let mut conn = self.connection()?;
        Ok(schema::games::table.load::<Game>(&mut conn)?)
    }
}
