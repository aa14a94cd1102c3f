//! Tests for the use-case orchestrator over a real sqlite database.
//!
//! The opponent is replaced by a deterministic first-free-spot strategy so
//! move sequences and outcomes are reproducible.

use chrono::Duration;
use diesel::Connection;
use diesel::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tempfile::NamedTempFile;

use gridplay::{
    Board, Field, GameCriteria, GamePatch, GameRepository, GameService, GameStatus, GameWinner,
    NewSession, OpponentStrategy, Repository, ServiceError, SessionCriteria, SessionPatch,
    SessionRepository, UserCriteria, UserRepository,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Deterministic opponent: always the first free spot in scan order.
struct FirstFree;

impl OpponentStrategy for FirstFree {
    fn choose(&self, board: &Board) -> Field {
        board.free_spots()[0]
    }
}

type TestService = GameService<UserRepository, SessionRepository, GameRepository, FirstFree>;

/// Creates a temporary database with schema applied, returning the file
/// handle (must stay in scope to keep the file alive) and a ready service.
fn setup_test_service(starting_credits: i32) -> (NamedTempFile, TestService) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let mut conn = SqliteConnection::establish(&db_path).expect("Failed to connect");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Migrations failed");

    let service = GameService::new(
        UserRepository::new(&db_path),
        SessionRepository::new(&db_path),
        GameRepository::new(&db_path),
        FirstFree,
        starting_credits,
    );
    (db_file, service)
}

fn games_repo(db: &NamedTempFile) -> GameRepository {
    GameRepository::new(db.path().to_str().expect("Invalid path"))
}

fn sessions_repo(db: &NamedTempFile) -> SessionRepository {
    SessionRepository::new(db.path().to_str().expect("Invalid path"))
}

fn users_repo(db: &NamedTempFile) -> UserRepository {
    UserRepository::new(db.path().to_str().expect("Invalid path"))
}

#[test]
fn test_register_grants_starting_credits() {
    let (_db, service) = setup_test_service(10);
    let user = service
        .register("alice@example.com", "secret")
        .expect("Register failed");
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.credits, 10);
}

#[test]
fn test_register_duplicate_email_conflicts() {
    let (_db, service) = setup_test_service(10);
    service
        .register("bob@example.com", "secret")
        .expect("First register failed");
    let err = service
        .register("bob@example.com", "other")
        .expect_err("Duplicate email must conflict");
    assert!(matches!(err, ServiceError::UserExists));
}

#[test]
fn test_login_checks_password() {
    let (_db, service) = setup_test_service(10);
    let user = service
        .register("carol@example.com", "secret")
        .expect("Register failed");

    let credentials = service
        .login("carol@example.com", "secret")
        .expect("Login failed");
    assert_eq!(credentials.user_id, user.id);

    let err = service
        .login("carol@example.com", "wrong")
        .expect_err("Wrong password must fail");
    assert!(matches!(err, ServiceError::AuthFailed));

    let err = service
        .login("nobody@example.com", "secret")
        .expect_err("Unknown email must fail");
    assert!(matches!(err, ServiceError::AuthFailed));
}

#[test]
fn test_get_account_unknown_user() {
    let (_db, service) = setup_test_service(10);
    let err = service.get_account(99).expect_err("Must be absent");
    assert!(matches!(err, ServiceError::NotFound { entity: "user" }));
}

#[test]
fn test_update_account_credit_rules() {
    let (_db, service) = setup_test_service(10);
    let user = service
        .register("dave@example.com", "secret")
        .expect("Register failed");

    // Non-zero balance blocks credit updates.
    let err = service
        .update_account(
            user.id,
            gridplay::AccountUpdate {
                credits: Some(50),
                ..Default::default()
            },
        )
        .expect_err("Credits must be 0 before updating");
    assert!(matches!(err, ServiceError::CreditsNotZero));

    // Negative balances are rejected outright.
    let err = service
        .update_account(
            user.id,
            gridplay::AccountUpdate {
                credits: Some(-1),
                ..Default::default()
            },
        )
        .expect_err("Negative credits must be rejected");
    assert!(matches!(err, ServiceError::NegativeCredits));

    // Email updates pass through untouched fields.
    let updated = service
        .update_account(
            user.id,
            gridplay::AccountUpdate {
                email: Some("dave2@example.com".to_string()),
                ..Default::default()
            },
        )
        .expect("Update failed");
    assert_eq!(updated.email, "dave2@example.com");
    assert_eq!(updated.credits, 10);
}

#[test]
fn test_update_account_credits_allowed_at_zero() {
    let (_db, service) = setup_test_service(0);
    let user = service
        .register("erin@example.com", "secret")
        .expect("Register failed");
    let updated = service
        .update_account(
            user.id,
            gridplay::AccountUpdate {
                credits: Some(12),
                ..Default::default()
            },
        )
        .expect("Update failed");
    assert_eq!(updated.credits, 12);
}

#[test]
fn test_start_session_debits_and_creates_empty_game() {
    let (db, service) = setup_test_service(10);
    let user = service
        .register("frank@example.com", "secret")
        .expect("Register failed");

    let started = service.start_session(user.id).expect("Start failed");
    assert_eq!(started.session.score, 0);
    assert_eq!(started.session.user_id, user.id);
    assert!(started.session.ended_at.is_none());

    let account = service.get_account(user.id).expect("Account failed");
    assert_eq!(account.credits, 7);

    let games = games_repo(&db)
        .filter_by(&GameCriteria::by_session(started.session.id))
        .expect("Query failed");
    assert_eq!(games.len(), 1);
    let game = &games[0];
    assert_eq!(*game.id(), started.game_id);
    assert_eq!(game.parse_board().expect("Bad board"), Board::new());
    assert_eq!(
        game.parse_status().expect("Bad status"),
        GameStatus::InProgress
    );
    // The mark was assigned at creation.
    game.parse_symbol().expect("Bad symbol");
}

#[test]
fn test_start_session_conflict_returns_existing_session() {
    let (db, service) = setup_test_service(10);
    let user = service
        .register("grace@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");

    let err = service
        .start_session(user.id)
        .expect_err("Second start must conflict");
    let ServiceError::SessionConflict(conflict) = err else {
        panic!("Expected SessionConflict");
    };
    assert_eq!(conflict.session.id, started.session.id);
    assert_eq!(conflict.games.len(), 1);
    assert_eq!(conflict.games[0].id, started.game_id);

    // No second session row was created and no credits were debited.
    let sessions = sessions_repo(&db)
        .filter_by(&SessionCriteria {
            user_id: Some(user.id),
            ..Default::default()
        })
        .expect("Query failed");
    assert_eq!(sessions.len(), 1);
    assert_eq!(service.get_account(user.id).expect("Account").credits, 7);
}

#[test]
fn test_start_session_insufficient_credits() {
    let (_db, service) = setup_test_service(2);
    let user = service
        .register("henry@example.com", "secret")
        .expect("Register failed");
    let err = service
        .start_session(user.id)
        .expect_err("2 credits cannot start a session");
    assert!(matches!(
        err,
        ServiceError::InsufficientCredits { balance: 2 }
    ));
    assert_eq!(service.get_account(user.id).expect("Account").credits, 2);
}

#[test]
fn test_create_game_conflicts_with_open_game() {
    let (_db, service) = setup_test_service(10);
    let user = service
        .register("iris@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");

    let err = service
        .create_game(user.id, started.session.id)
        .expect_err("Open game must conflict");
    assert!(
        matches!(err, ServiceError::GameConflict { game_id } if game_id == started.game_id)
    );
}

#[test]
fn test_create_game_insufficient_credits_finishes_session() {
    let (db, service) = setup_test_service(4);
    let user = service
        .register("judy@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");

    // Close the open game directly so a new one may be requested.
    games_repo(&db)
        .update_fields(
            started.game_id,
            GamePatch {
                status: Some(GameStatus::Finished.to_db_string().to_string()),
                ..Default::default()
            },
        )
        .expect("Patch failed");

    let err = service
        .create_game(user.id, started.session.id)
        .expect_err("1 credit cannot start a game");
    assert!(matches!(
        err,
        ServiceError::InsufficientCredits { balance: 1 }
    ));

    // Side effect: the session is finished and stamped.
    let check = service
        .check_session_status(started.session.id, user.id)
        .expect("Check failed");
    assert!(!check.active);
    assert_eq!(check.code, 400);
    let sessions = sessions_repo(&db)
        .filter_by(&SessionCriteria::by_id_and_user(started.session.id, user.id))
        .expect("Query failed");
    assert!(sessions[0].ended_at().is_some());
}

#[test]
fn test_create_game_on_finished_session_rejected() {
    let (db, service) = setup_test_service(10);
    let user = service
        .register("kent@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");

    sessions_repo(&db)
        .update_fields(
            started.session.id,
            SessionPatch {
                status: Some("finished".to_string()),
                ..Default::default()
            },
        )
        .expect("Patch failed");

    let err = service
        .create_game(user.id, started.session.id)
        .expect_err("Finished session must reject games");
    assert!(matches!(err, ServiceError::SessionFinished));
}

#[test]
fn test_play_missing_fields() {
    let (_db, service) = setup_test_service(10);
    let user = service
        .register("liam@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");

    let err = service
        .play(started.session.id, user.id, started.game_id, None, None)
        .expect_err("Missing both coordinates must be rejected");
    assert!(matches!(err, ServiceError::MissingFields));
}

#[test]
fn test_play_invalid_fields_leave_board_untouched() {
    let (db, service) = setup_test_service(10);
    let user = service
        .register("mona@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");

    let err = service
        .play(started.session.id, user.id, started.game_id, Some(5), Some(0))
        .expect_err("Out-of-range coordinates must be rejected");
    let ServiceError::InvalidFields { fields } = err else {
        panic!("Expected InvalidFields");
    };
    assert!(fields.contains_key("row"));
    assert!(fields.contains_key("col"));

    let game = &games_repo(&db)
        .filter_by(&GameCriteria::by_session(started.session.id))
        .expect("Query failed")[0];
    assert_eq!(game.parse_board().expect("Bad board"), Board::new());
}

#[test]
fn test_play_occupied_spot_rejected_without_mutation() {
    let (db, service) = setup_test_service(10);
    let user = service
        .register("nina@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");

    // Human takes (2,2); deterministic opponent answers (1,1).
    let outcome = service
        .play(started.session.id, user.id, started.game_id, Some(2), Some(2))
        .expect("Play failed");
    assert_eq!(outcome.board.free_spots().len(), 7);

    let err = service
        .play(started.session.id, user.id, started.game_id, Some(2), Some(2))
        .expect_err("Occupied spot must be rejected");
    let ServiceError::SpotTaken { board, symbol } = err else {
        panic!("Expected SpotTaken");
    };
    assert_eq!(symbol, outcome.symbol);
    assert_eq!(board, outcome.board);

    // Stored board is exactly as it was after the first turn.
    let game = &games_repo(&db)
        .filter_by(&GameCriteria::by_session(started.session.id))
        .expect("Query failed")[0];
    assert_eq!(game.parse_board().expect("Bad board"), outcome.board);
}

#[test]
fn test_play_wrong_game_id() {
    let (_db, service) = setup_test_service(10);
    let user = service
        .register("omar@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");

    let err = service
        .play(started.session.id, user.id, started.game_id + 100, Some(1), Some(1))
        .expect_err("Unknown game id must be rejected");
    assert!(matches!(err, ServiceError::NotFound { entity: "game" }));
}

#[test]
fn test_end_to_end_win_awards_bonus_and_score() {
    let (db, service) = setup_test_service(10);
    let user = service
        .register("pam@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");
    assert_eq!(service.get_account(user.id).expect("Account").credits, 7);

    let sid = started.session.id;
    let gid = started.game_id;

    // Against the first-free-spot opponent, the main diagonal wins:
    // human (1,1) -> opp (1,2); human (2,2) -> opp (1,3); human (3,3).
    service
        .play(sid, user.id, gid, Some(1), Some(1))
        .expect("Turn 1 failed");
    service
        .play(sid, user.id, gid, Some(2), Some(2))
        .expect("Turn 2 failed");
    let outcome = service
        .play(sid, user.id, gid, Some(3), Some(3))
        .expect("Turn 3 failed");

    assert_eq!(outcome.status, "finished");
    assert_eq!(outcome.winner.as_deref(), Some("human"));
    assert_eq!(outcome.score, Some(1));
    assert_eq!(outcome.credits, 11);
    assert_eq!(outcome.message, "You win!");

    assert_eq!(service.get_account(user.id).expect("Account").credits, 11);
    let sessions = sessions_repo(&db)
        .filter_by(&SessionCriteria::by_id_and_user(sid, user.id))
        .expect("Query failed");
    assert_eq!(*sessions[0].score(), 1);
    // The session stays active; a new game can be bought.
    let game = service.create_game(user.id, sid).expect("New game failed");
    assert_eq!(game.board, Board::new());
    assert_eq!(service.get_account(user.id).expect("Account").credits, 8);
}

#[test]
fn test_end_to_end_draw_keeps_credits_and_session() {
    let (db, service) = setup_test_service(10);
    let user = service
        .register("drew@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");
    assert_eq!(service.get_account(user.id).expect("Account").credits, 7);

    let sid = started.session.id;
    let gid = started.game_id;

    // Against the first-free-spot opponent this fills the board linelessly:
    // human (1,3) -> opp (1,1); human (2,1) -> opp (1,2);
    // human (2,2) -> opp (2,3); human (3,2) -> opp (3,1); human (3,3).
    service.play(sid, user.id, gid, Some(1), Some(3)).expect("Turn 1");
    service.play(sid, user.id, gid, Some(2), Some(1)).expect("Turn 2");
    service.play(sid, user.id, gid, Some(2), Some(2)).expect("Turn 3");
    service.play(sid, user.id, gid, Some(3), Some(2)).expect("Turn 4");
    let outcome = service
        .play(sid, user.id, gid, Some(3), Some(3))
        .expect("Turn 5");

    assert_eq!(outcome.status, "finished");
    assert_eq!(outcome.winner.as_deref(), Some("draw"));
    assert_eq!(outcome.score, Some(0));
    assert_eq!(outcome.credits, 7);
    assert_eq!(outcome.message, "Draw");
    assert!(outcome.board.free_spots().is_empty());

    // No bonus, no score change, balance untouched.
    assert_eq!(service.get_account(user.id).expect("Account").credits, 7);
    let sessions = sessions_repo(&db)
        .filter_by(&SessionCriteria::by_id_and_user(sid, user.id))
        .expect("Query failed");
    assert_eq!(*sessions[0].score(), 0);

    let game = &games_repo(&db)
        .filter_by(&GameCriteria::by_session(sid))
        .expect("Query failed")[0];
    assert_eq!(game.parse_winner().expect("Bad winner"), Some(GameWinner::Draw));

    // The session stays active and accepts a fresh board.
    let check = service
        .check_session_status(sid, user.id)
        .expect("Check failed");
    assert!(check.active);
    service.create_game(user.id, sid).expect("New game failed");
    assert_eq!(service.get_account(user.id).expect("Account").credits, 4);
}

#[test]
fn test_play_on_finished_game_reports_game_over() {
    let (_db, service) = setup_test_service(10);
    let user = service
        .register("quinn@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");
    let sid = started.session.id;
    let gid = started.game_id;

    service.play(sid, user.id, gid, Some(1), Some(1)).expect("Turn 1");
    service.play(sid, user.id, gid, Some(2), Some(2)).expect("Turn 2");
    service.play(sid, user.id, gid, Some(3), Some(3)).expect("Turn 3");

    // Buy a fresh board, then address the finished game.
    let fresh = service.create_game(user.id, sid).expect("New game failed");
    let err = service
        .play(sid, user.id, gid, Some(1), Some(2))
        .expect_err("Finished game must reject moves");
    assert!(matches!(err, ServiceError::GameFinished));

    // The fresh board accepts play as usual.
    service
        .play(sid, user.id, fresh.id, Some(2), Some(2))
        .expect("Fresh game turn failed");
}

#[test]
fn test_end_to_end_loss_at_play_cost_finishes_session() {
    let (db, service) = setup_test_service(3);
    let user = service
        .register("rita@example.com", "secret")
        .expect("Register failed");
    let started = service.start_session(user.id).expect("Start failed");
    assert_eq!(service.get_account(user.id).expect("Account").credits, 0);

    let sid = started.session.id;
    let gid = started.game_id;

    // Feed the first-free-spot opponent the top row:
    // human (3,3) -> opp (1,1); human (3,1) -> opp (1,2);
    // human (2,1) -> opp (1,3) completes the row.
    service.play(sid, user.id, gid, Some(3), Some(3)).expect("Turn 1");
    service.play(sid, user.id, gid, Some(3), Some(1)).expect("Turn 2");
    let outcome = service
        .play(sid, user.id, gid, Some(2), Some(1))
        .expect("Turn 3");

    assert_eq!(outcome.status, "finished");
    assert_eq!(outcome.winner.as_deref(), Some("not_human"));
    assert_eq!(outcome.score, Some(0));
    assert_eq!(outcome.credits, 0);

    // 0 credits < PLAY_COST after a loss: the session is over.
    let check = service
        .check_session_status(sid, user.id)
        .expect("Check failed");
    assert!(!check.active);
    assert_eq!(check.code, 400);
    let sessions = sessions_repo(&db)
        .filter_by(&SessionCriteria::by_id_and_user(sid, user.id))
        .expect("Query failed");
    assert!(sessions[0].ended_at().is_some());
}

#[test]
fn test_check_session_status_variants() {
    let (_db, service) = setup_test_service(10);
    let user = service
        .register("sam@example.com", "secret")
        .expect("Register failed");

    let check = service
        .check_session_status(123, user.id)
        .expect("Check failed");
    assert!(!check.active);
    assert_eq!(check.code, 404);

    let started = service.start_session(user.id).expect("Start failed");
    let check = service
        .check_session_status(started.session.id, user.id)
        .expect("Check failed");
    assert!(check.active);
    assert_eq!(check.code, 200);
    assert_eq!(
        check.session.expect("Session payload").id,
        started.session.id
    );
}

#[test]
fn test_active_session_without_game_is_invariant_violation() {
    let (db, service) = setup_test_service(10);
    let user = service
        .register("tess@example.com", "secret")
        .expect("Register failed");

    // Corrupt state: a session row with no accompanying game.
    let session = sessions_repo(&db)
        .create(NewSession::new(user.id))
        .expect("Create failed");

    let err = service
        .play(*session.id(), user.id, 1, Some(1), Some(1))
        .expect_err("Must surface corrupted state");
    assert!(matches!(err, ServiceError::Invariant(_)));
}

#[test]
fn test_high_scores_masked_ordered_and_formatted() {
    let (db, service) = setup_test_service(10);
    let users = users_repo(&db);
    let sessions = sessions_repo(&db);

    let alice = service
        .register("test_email@gmail.com", "secret")
        .expect("Register failed");
    let bob = service
        .register("bob_longname@example.org", "secret")
        .expect("Register failed");
    assert_eq!(
        users
            .filter_by(&UserCriteria::by_email("test_email@gmail.com"))
            .expect("Query failed")
            .len(),
        1
    );

    // Two finished sessions with controlled end times and scores.
    let first = sessions.create(NewSession::new(alice.id)).expect("Create");
    let second = sessions.create(NewSession::new(bob.id)).expect("Create");

    let first_created = *first.created_at();
    sessions
        .update_fields(
            *first.id(),
            SessionPatch {
                status: Some("finished".to_string()),
                score: Some(2),
                ended_at: Some(first_created + Duration::minutes(10)),
            },
        )
        .expect("Patch failed");
    let second_created = *second.created_at();
    sessions
        .update_fields(
            *second.id(),
            SessionPatch {
                status: Some("finished".to_string()),
                score: Some(5),
                ended_at: Some(second_created + Duration::minutes(30)),
            },
        )
        .expect("Patch failed");

    let scores = service.high_scores().expect("High scores failed");
    assert_eq!(scores.len(), 2);
    // Newest ended_at first.
    assert_eq!(scores[0].score, 5);
    assert_eq!(scores[0].user, "bob****org");
    assert_eq!(scores[0].time_played, "30 minutes");
    assert_eq!(scores[1].score, 2);
    assert_eq!(scores[1].user, "tes****com");
    assert_eq!(scores[1].time_played, "10 minutes");
}
