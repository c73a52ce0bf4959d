//! Game setup and lifecycle endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, validate_spice, ApiResult};
use crate::engine::RandomSource;
use crate::errors::AppError;
use crate::models::{
    CreateGameRequest, Game, GameStatus, GameTaskHistory, TagId, UpdateGameTagsRequest,
};
use crate::AppState;

/// Join code characters; no 0/O or 1/I look-alikes.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;
const CODE_ATTEMPTS: usize = 10;

/// Players needed before a game can start.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// POST /api/games - Create a new game.
pub async fn create_game(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> ApiResult<Game> {
    validate_spice(request.max_spice_rating, "maxSpiceRating")?;
    validate_game_tags(&state, &request.tag_ids, request.max_spice_rating).await?;

    let mut code = None;
    for _ in 0..CODE_ATTEMPTS {
        let candidate = generate_code(state.random.as_ref());
        if !state.repo.code_exists(&candidate).await? {
            code = Some(candidate);
            break;
        }
    }
    let code =
        code.ok_or_else(|| AppError::Internal("Could not allocate a join code".to_string()))?;

    let game = state.repo.create_game(&code, &request).await?;
    tracing::info!(game_id = %game.id, code = %game.code, "Created game");
    success(game)
}

/// GET /api/games/:id - Get a game.
pub async fn get_game(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Game> {
    success(load_game(&state, &id).await?)
}

/// GET /api/games/code/:code - Look up a game by join code.
pub async fn get_game_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Game> {
    match state.repo.get_game_by_code(&code).await? {
        Some(game) => success(game),
        None => Err(AppError::NotFound(format!("No game with code {}", code))),
    }
}

/// PUT /api/games/:id/tags - Replace the game-level tag set.
pub async fn update_game_tags(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateGameTagsRequest>,
) -> ApiResult<Game> {
    let mut game = load_game(&state, &id).await?;
    if game.status == GameStatus::Completed {
        return Err(AppError::InvalidState("Game is completed".to_string()));
    }
    if let Some(expected) = request.expected_version {
        if expected != game.version {
            return Err(AppError::Conflict {
                message: format!(
                    "Version mismatch: expected {}, current {}",
                    expected, game.version
                ),
                current_version: game.version,
            });
        }
    }
    validate_game_tags(&state, &request.tag_ids, game.max_spice_rating).await?;

    game.tag_ids = request.tag_ids.iter().copied().collect();
    success(state.repo.save_game(&game).await?)
}

/// POST /api/games/:id/start - Move a waiting game to active.
pub async fn start_game(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Game> {
    let mut game = load_game(&state, &id).await?;
    if game.status != GameStatus::Waiting {
        return Err(AppError::InvalidState(format!(
            "Game is {}, only waiting games can start",
            game.status.as_str()
        )));
    }

    let active = state
        .repo
        .list_players(&id)
        .await?
        .into_iter()
        .filter(|p| p.active)
        .count();
    if active < MIN_PLAYERS_TO_START {
        return Err(AppError::Validation(format!(
            "At least {} players are needed to start",
            MIN_PLAYERS_TO_START
        )));
    }

    game.status = GameStatus::Active;
    game.current_player_index = 0;
    let game = state.repo.save_game(&game).await?;
    tracing::info!(game_id = %game.id, players = active, "Game started");
    success(game)
}

/// POST /api/games/:id/end - Finish a game. Terminal.
pub async fn end_game(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Game> {
    let mut game = load_game(&state, &id).await?;
    if game.status == GameStatus::Completed {
        return Err(AppError::InvalidState("Game is already completed".to_string()));
    }

    game.status = GameStatus::Completed;
    let game = state.repo.save_game(&game).await?;
    tracing::info!(game_id = %game.id, rounds = game.current_round, "Game completed");
    success(game)
}

/// GET /api/games/:id/history - Prompts served so far.
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<GameTaskHistory>> {
    load_game(&state, &id).await?;
    success(state.repo.list_history(&id).await?)
}

pub(crate) async fn load_game(state: &AppState, id: &str) -> Result<Game, AppError> {
    state
        .repo
        .get_game(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Game {} not found", id)))
}

/// Every game tag must exist and be allowed at the game's spice ceiling.
async fn validate_game_tags(
    state: &AppState,
    tag_ids: &[TagId],
    max_spice_rating: u8,
) -> Result<(), AppError> {
    if tag_ids.is_empty() {
        return Ok(());
    }

    let catalog = state.repo.list_tags().await?;
    for id in tag_ids {
        let tag = catalog
            .iter()
            .find(|tag| tag.id == *id)
            .ok_or_else(|| AppError::Validation(format!("Unknown tag {}", id)))?;
        if tag.min_spice_level > max_spice_rating {
            return Err(AppError::Validation(format!(
                "Tag {} needs spice level {}, game allows {}",
                tag.name, tag.min_spice_level, max_spice_rating
            )));
        }
    }
    Ok(())
}

fn generate_code(random: &dyn RandomSource) -> String {
    (0..CODE_LENGTH)
        .map(|_| {
            let index = random.pick_index(CODE_ALPHABET.len()) % CODE_ALPHABET.len();
            CODE_ALPHABET[index] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::random::SequenceRandom;

    #[test]
    fn test_generate_code_uses_alphabet() {
        let random = SequenceRandom::new([0, 1, 2, 31, 30, 8]);
        assert_eq!(generate_code(&random), "ABC98J");
    }

    #[test]
    fn test_generate_code_length() {
        let random = crate::engine::ThreadRandom::new();
        let code = generate_code(&random);
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }
}
