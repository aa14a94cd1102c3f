//! HTTP surface: thin axum handlers over the game service.
//!
//! Handlers deserialize requests, delegate to [`SqliteGameService`] and map
//! [`ServiceError`] values to status codes and JSON bodies. No game rule
//! lives here.

use axum::Router;
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::error::ServiceError;
use crate::service::{AccountUpdate, SqliteGameService};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The use-case layer.
    pub service: Arc<SqliteGameService>,
}

/// Builds the application router.
pub fn router(service: Arc<SqliteGameService>) -> Router {
    let state = AppState { service };
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/account/{user_id}", get(account_detail))
        .route("/account/{user_id}", patch(account_update))
        .route("/game/start/{user_id}", post(start_session))
        .route("/game/{session_id}/new/{user_id}", post(create_game))
        .route("/game/{session_id}/status/{user_id}", get(session_status))
        .route("/game/{session_id}/play/{user_id}", post(play))
        .route("/scores", get(high_scores))
        .with_state(state)
}

/// Registration payload.
#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
}

/// Login payload.
#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// One turn's move payload. Coordinates are 1-based and validated by the
/// service, not here.
#[derive(Debug, Deserialize)]
struct PlayRequest {
    game_id: i32,
    row: Option<i32>,
    col: Option<i32>,
}

/// Newtype mapping [`ServiceError`] onto HTTP responses.
struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match self.0 {
            ServiceError::UserExists => json!({"error": "User already exists"}),
            ServiceError::SessionConflict(conflict) => {
                json!({"message": conflict.message, "session": conflict.session, "games": conflict.games})
            }
            ServiceError::GameConflict { game_id } => {
                json!({"message": "Game already in progress", "game_id": game_id})
            }
            ServiceError::InvalidFields { fields } => json!({"errors": fields}),
            ServiceError::SpotTaken { board, symbol } => {
                json!({"message": "Spot is already taken", "board": board, "symbol": symbol})
            }
            ServiceError::Invariant(ref message) => {
                error!(%message, "Invariant violation");
                json!({"message": "Internal server error"})
            }
            ServiceError::Db(ref db) => {
                error!(error = %db, "Database failure");
                json!({"message": "Internal server error"})
            }
            other => json!({"message": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.service.register(&req.email, &req.password)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = state.service.login(&req.email, &req.password)?;
    Ok(Json(credentials))
}

async fn account_detail(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.service.get_account(user_id)?;
    Ok(Json(user))
}

async fn account_update(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(update): Json<AccountUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.service.update_account(user_id, update)?;
    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "credits": user.credits,
        "message": "Account updated",
    })))
}

async fn start_session(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let started = state.service.start_session(user_id)?;
    Ok(Json(started))
}

async fn create_game(
    State(state): State<AppState>,
    Path((session_id, user_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state.service.create_game(user_id, session_id)?;
    Ok(Json(game))
}

async fn session_status(
    State(state): State<AppState>,
    Path((session_id, user_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, ApiError> {
    let check = state.service.check_session_status(session_id, user_id)?;
    let status =
        StatusCode::from_u16(check.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(check)))
}

async fn play(
    State(state): State<AppState>,
    Path((session_id, user_id)): Path<(i32, i32)>,
    Json(req): Json<PlayRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .service
        .play(session_id, user_id, req.game_id, req.row, req.col)?;
    Ok(Json(outcome))
}

async fn high_scores(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let scores = state.service.high_scores()?;
    Ok(Json(scores))
}
