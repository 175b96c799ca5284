//! Stones local HTTP API
//!
//! Serves one game session to a browser front end: move entry, undo, reset,
//! TPS import/export, clock expiry, and AI moves. The AI runs on a blocking
//! thread against a snapshot and its move is applied against the snapshot's
//! fingerprint, so any change to the game in the meantime turns it into a 409.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use stones_ai::{Ai, Difficulty, Settings};
use stones_core::{
    find_road, Color, Direction, Game, GameResult, GameState, Move, MoveRecord, Phase, PieceKind,
    Pos, Rejection, WinReason,
};

// =============================================================================
// Session State
// =============================================================================

/// Shared application state
struct AppStateInner {
    game: Mutex<Game>,
    ai: Ai,
}

impl AppStateInner {
    /// The session. A handler that panicked mid-update cannot leave the game
    /// half-applied, so a poisoned lock is still usable.
    fn game(&self) -> MutexGuard<'_, Game> {
        self.game.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type AppState = Arc<AppStateInner>;

fn app_state(size: u8, settings: Settings) -> Result<AppState> {
    let mut game = Game::with_allotments(size, settings.allotment)
        .with_context(|| format!("starting a {size}x{size} game"))?;
    game.subscribe(|event| debug!(?event, "board event"));
    game.on_road_win(|cells, color| info!(%color, length = cells.len(), "road completed"));
    Ok(Arc::new(AppStateInner {
        game: Mutex::new(game),
        ai: Ai::new(settings.ai),
    }))
}

// =============================================================================
// JSON Models
// =============================================================================

#[derive(Debug, Serialize)]
struct PieceModel {
    color: Color,
    kind: PieceKind,
}

#[derive(Debug, Serialize)]
struct CellModel {
    /// Bottom to top
    stack: Vec<PieceModel>,
}

#[derive(Debug, Serialize)]
struct ReservesModel {
    stones: u8,
    capstones: u8,
}

#[derive(Debug, Serialize)]
struct GameStateModel {
    size: u8,
    /// `board[row][col]`, row 0 is rank 1
    board: Vec<Vec<CellModel>>,
    to_move: Color,
    turn: u32,
    phase: Phase,
    white_reserve: ReservesModel,
    black_reserve: ReservesModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<GameResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    win_reason: Option<WinReason>,
    /// The winning road, for road wins
    #[serde(skip_serializing_if = "Option::is_none")]
    road: Option<Vec<(u8, u8)>>,
    can_undo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_move: Option<String>,
    history: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LegalMoveModel {
    notation: String,
    #[serde(flatten)]
    mv: Move,
}

fn default_kind() -> PieceKind {
    PieceKind::Flat
}

#[derive(Deserialize)]
struct PlaceRequest {
    row: u8,
    col: u8,
    #[serde(default = "default_kind")]
    kind: PieceKind,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MoveRequest {
    Notation {
        notation: String,
    },
    Spread {
        row: u8,
        col: u8,
        dir: Direction,
        drops: Vec<u8>,
    },
}

#[derive(Deserialize, Default)]
struct ResetRequest {
    size: Option<u8>,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}

#[derive(Deserialize)]
struct AiRequest {
    #[serde(default = "default_difficulty")]
    difficulty: Difficulty,
}

#[derive(Debug, Serialize)]
struct AiMoveModel {
    notation: String,
    score: i32,
    nodes: u64,
    depth: u8,
    state: GameStateModel,
}

#[derive(Deserialize)]
struct TimeExpiredRequest {
    color: Color,
}

#[derive(Debug, Serialize)]
struct TimeExpiredModel {
    ended: bool,
    state: GameStateModel,
}

#[derive(Debug, Serialize)]
struct ExportModel {
    tps: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportRequest {
    Tps { tps: String },
    State { state: GameState },
}

#[derive(Debug, Serialize)]
struct HealthModel {
    status: String,
}

#[derive(Debug, Serialize)]
struct ErrorModel {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<Rejection>,
}

type ApiError = (StatusCode, Json<ErrorModel>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn bad_request(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorModel {
            detail: detail.into(),
            reason: None,
        }),
    )
}

/// Stale AI results are a conflict; every other rejection is the caller's fault.
fn rejected(reason: Rejection) -> ApiError {
    let status = match reason {
        Rejection::StaleState => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorModel {
            detail: reason.to_string(),
            reason: Some(reason),
        }),
    )
}

// =============================================================================
// Conversion Functions
// =============================================================================

fn state_to_model(game: &Game) -> GameStateModel {
    let state = game.state();
    let board = state.board();
    let size = board.size();

    let rows = (0..size)
        .map(|row| {
            (0..size)
                .map(|col| CellModel {
                    stack: board
                        .stack(Pos::new(row, col))
                        .pieces()
                        .iter()
                        .map(|p| PieceModel {
                            color: p.color,
                            kind: p.kind,
                        })
                        .collect(),
                })
                .collect()
        })
        .collect();

    let reserve = |color| {
        let stock = state.reserve(color);
        ReservesModel {
            stones: stock.stones,
            capstones: stock.capstones,
        }
    };

    let road = match (state.result().and_then(GameResult::winner), state.win_reason()) {
        (Some(winner), Some(WinReason::Road)) => find_road(board, winner)
            .map(|road| road.cells.iter().map(|p| (p.row, p.col)).collect()),
        _ => None,
    };

    GameStateModel {
        size,
        board: rows,
        to_move: state.to_move(),
        turn: state.turn(),
        phase: state.phase(),
        white_reserve: reserve(Color::White),
        black_reserve: reserve(Color::Black),
        result: state.result(),
        win_reason: state.win_reason(),
        road,
        can_undo: game.can_undo(),
        last_move: game.last_move_record().map(|r| r.notation.clone()),
        history: state.history().iter().map(|r| r.notation.clone()).collect(),
    }
}

fn request_to_move(req: MoveRequest) -> Result<Move, ApiError> {
    match req {
        MoveRequest::Notation { notation } => notation
            .parse()
            .map_err(|e| bad_request(format!("{notation}: {e}"))),
        MoveRequest::Spread {
            row,
            col,
            dir,
            drops,
        } => Ok(Move::spread(Pos::new(row, col), dir, drops)),
    }
}

/// Apply an AI move only if the game is still in the position it was searched from.
fn commit_ai_move(game: &mut Game, basis: u64, mv: Move) -> Result<MoveRecord, ApiError> {
    game.apply_at(basis, mv).map_err(|reason| {
        if reason == Rejection::StaleState {
            warn!(turn = game.state().turn(), "discarding AI move for an outdated position");
        }
        rejected(reason)
    })
}

// =============================================================================
// API Endpoints
// =============================================================================

async fn get_game(State(state): State<AppState>) -> Json<GameStateModel> {
    Json(state_to_model(&state.game()))
}

async fn get_moves(State(state): State<AppState>) -> Json<Vec<LegalMoveModel>> {
    let snapshot = state.game().snapshot();
    let moves = snapshot
        .legal_moves()
        .into_iter()
        .map(|mv| LegalMoveModel {
            notation: mv.to_string(),
            mv,
        })
        .collect();
    Json(moves)
}

async fn place(
    State(state): State<AppState>,
    Json(req): Json<PlaceRequest>,
) -> ApiResult<GameStateModel> {
    let mut game = state.game();
    game.try_place(Pos::new(req.row, req.col), req.kind)
        .map_err(rejected)?;
    Ok(Json(state_to_model(&game)))
}

async fn make_move(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<GameStateModel> {
    let mv = request_to_move(req)?;
    let mut game = state.game();
    game.apply(mv).map_err(rejected)?;
    Ok(Json(state_to_model(&game)))
}

async fn undo(State(state): State<AppState>) -> ApiResult<GameStateModel> {
    let mut game = state.game();
    if game.undo().is_none() {
        return Err(bad_request("Nothing to undo"));
    }
    Ok(Json(state_to_model(&game)))
}

async fn reset_game(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> ApiResult<GameStateModel> {
    let mut game = state.game();
    let size = req.size.unwrap_or_else(|| game.state().size());
    game.new_game(size).map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(state_to_model(&game)))
}

async fn ai_move(
    State(state): State<AppState>,
    Json(req): Json<AiRequest>,
) -> ApiResult<AiMoveModel> {
    let snapshot = state.game().snapshot();
    if snapshot.is_over() {
        return Err(bad_request("Game is already over"));
    }
    let basis = snapshot.fingerprint();

    let worker = state.clone();
    let difficulty = req.difficulty;
    let outcome = tokio::task::spawn_blocking(move || worker.ai.search(&snapshot, difficulty))
        .await
        .map_err(|e| {
            warn!(error = %e, "AI task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorModel {
                    detail: "AI search failed".to_string(),
                    reason: None,
                }),
            )
        })?;

    let Some(mv) = outcome.mv else {
        return Err(bad_request("No legal move available"));
    };

    let mut game = state.game();
    let record = commit_ai_move(&mut game, basis, mv)?;
    info!(%difficulty, notation = %record.notation, score = outcome.score, "AI moved");
    Ok(Json(AiMoveModel {
        notation: record.notation,
        score: outcome.score,
        nodes: outcome.stats.nodes,
        depth: outcome.stats.depth_reached,
        state: state_to_model(&game),
    }))
}

async fn time_expired(
    State(state): State<AppState>,
    Json(req): Json<TimeExpiredRequest>,
) -> Json<TimeExpiredModel> {
    let mut game = state.game();
    let ended = game.set_time_expired(req.color);
    Json(TimeExpiredModel {
        ended,
        state: state_to_model(&game),
    })
}

async fn export_game(State(state): State<AppState>) -> Json<ExportModel> {
    Json(ExportModel {
        tps: state.game().state().to_tps(),
    })
}

async fn import_game(
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> ApiResult<GameStateModel> {
    let mut game = state.game();
    let loaded = match req {
        ImportRequest::Tps { tps } => game.load_tps(tps.trim()),
        ImportRequest::State { state } => game.load_state(state),
    };
    loaded.map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(state_to_model(&game)))
}

async fn health() -> Json<HealthModel> {
    Json(HealthModel {
        status: "ok".to_string(),
    })
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/game", get(get_game))
        .route("/moves", get(get_moves))
        .route("/place", post(place))
        .route("/move", post(make_move))
        .route("/undo", post(undo))
        .route("/reset", post(reset_game))
        .route("/ai", post(ai_move))
        .route("/time-expired", post(time_expired))
        .route("/export", get(export_game))
        .route("/import", post(import_game))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Main
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "stones-api", about = "Local HTTP API for Stones", version)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Board size for the first game
    #[arg(short, long, default_value = "5")]
    size: u8,

    /// TOML file with [ai.*] and [[allotment]] overrides
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("loading config")?;
    let state = app_state(args.size, settings)?;

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("binding {}:{}", args.host, args.port))?;
    info!(host = %args.host, port = args.port, size = args.size, "Stones API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(size: u8) -> AppState {
        app_state(size, Settings::default()).unwrap()
    }

    async fn play(state: &AppState, notation: &str) -> ApiResult<GameStateModel> {
        make_move(
            State(state.clone()),
            Json(MoveRequest::Notation {
                notation: notation.to_string(),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn test_opening_placements() {
        let state = session(4);
        let Json(model) = place(
            State(state.clone()),
            Json(PlaceRequest {
                row: 0,
                col: 0,
                kind: PieceKind::Flat,
            }),
        )
        .await
        .unwrap();
        assert_eq!(model.board[0][0].stack[0].color, Color::Black);
        assert_eq!(model.turn, 2);

        let err = place(
            State(state.clone()),
            Json(PlaceRequest {
                row: 3,
                col: 3,
                kind: PieceKind::Standing,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1.reason, Some(Rejection::WrongPhase));

        let Json(model) = play(&state, "d4").await.unwrap();
        assert_eq!(model.phase, Phase::Playing);
        assert_eq!(model.turn, 3);
        assert_eq!(model.history, vec!["a1", "d4"]);
    }

    #[tokio::test]
    async fn test_bad_notation_is_bad_request() {
        let state = session(5);
        let err = play(&state, "z9").await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1.reason.is_none());
    }

    #[tokio::test]
    async fn test_undo_and_reset() {
        let state = session(5);
        assert!(undo(State(state.clone())).await.is_err());
        play(&state, "a1").await.unwrap();
        let Json(model) = undo(State(state.clone())).await.unwrap();
        assert_eq!(model.turn, 1);
        assert!(!model.can_undo);

        let Json(model) = reset_game(State(state.clone()), Json(ResetRequest { size: Some(6) }))
            .await
            .unwrap();
        assert_eq!(model.size, 6);
        assert_eq!(model.white_reserve.stones, 30);
        assert!(reset_game(State(state), Json(ResetRequest { size: Some(9) })).await.is_err());
    }

    #[tokio::test]
    async fn test_ai_move_applies() {
        let state = session(4);
        let Json(reply) = ai_move(
            State(state.clone()),
            Json(AiRequest {
                difficulty: Difficulty::Easy,
            }),
        )
        .await
        .unwrap();
        assert_eq!(reply.state.turn, 2);
        assert_eq!(reply.state.last_move.as_deref(), Some(reply.notation.as_str()));
    }

    #[tokio::test]
    async fn test_road_win_reports_cells() {
        let state = session(5);
        let Json(_) = import_game(
            State(state.clone()),
            Json(ImportRequest::Tps {
                tps: "x5/x5/x5/2,2,2,x2/1,1,1,1,x 1 5".to_string(),
            }),
        )
        .await
        .unwrap();
        let Json(model) = play(&state, "e1").await.unwrap();
        assert_eq!(model.result, Some(GameResult::WhiteWins));
        assert_eq!(model.road.map(|r| r.len()), Some(5));

        let err = ai_move(
            State(state),
            Json(AiRequest {
                difficulty: Difficulty::Hard,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let state = session(5);
        play(&state, "a1").await.unwrap();
        play(&state, "e5").await.unwrap();
        play(&state, "c3").await.unwrap();
        let Json(exported) = export_game(State(state.clone())).await;

        let other = session(3);
        let Json(model) = import_game(
            State(other.clone()),
            Json(ImportRequest::Tps {
                tps: exported.tps.clone(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(model.size, 5);
        assert_eq!(model.turn, 4);
        assert_eq!(export_game(State(other)).await.0.tps, exported.tps);
    }

    #[tokio::test]
    async fn test_time_expiry_only_while_playing() {
        let state = session(4);
        let Json(reply) = time_expired(State(state.clone()), Json(TimeExpiredRequest { color: Color::White })).await;
        assert!(!reply.ended);

        play(&state, "a1").await.unwrap();
        play(&state, "d4").await.unwrap();
        let Json(reply) = time_expired(State(state), Json(TimeExpiredRequest { color: Color::White })).await;
        assert!(reply.ended);
        assert_eq!(reply.state.result, Some(GameResult::BlackWins));
        assert_eq!(reply.state.win_reason, Some(WinReason::Time));
    }

    #[test]
    fn test_stale_state_is_conflict() {
        assert_eq!(rejected(Rejection::StaleState).0, StatusCode::CONFLICT);
        assert_eq!(rejected(Rejection::OccupiedTarget).0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ai_move_for_replaced_position_conflicts() {
        let state = session(4);
        play(&state, "a1").await.unwrap();
        play(&state, "d4").await.unwrap();
        play(&state, "a2").await.unwrap();
        let basis = state.game().state().fingerprint();

        // Same ply, different position.
        undo(State(state.clone())).await.unwrap();
        play(&state, "b2").await.unwrap();
        let c3: Move = "c3".parse().unwrap();
        let err = commit_ai_move(&mut state.game(), basis, c3.clone()).unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);
        assert_eq!(err.1.reason, Some(Rejection::StaleState));

        let current = state.game().state().fingerprint();
        let record = commit_ai_move(&mut state.game(), current, c3).unwrap();
        assert_eq!(record.notation, "c3");
    }
}
