//! Player endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::games::load_game;
use super::turns::turn_after_removal;
use super::{success, ApiResult};
use crate::engine;
use crate::errors::AppError;
use crate::models::{Game, GameStatus, JoinGameRequest, Player};
use crate::AppState;

/// POST /api/games/:id/players - Join a game.
///
/// The new player starts with the catalog's default tags for their gender.
pub async fn join_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<JoinGameRequest>,
) -> ApiResult<Player> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Player name is required".to_string()));
    }

    let game = load_game(&state, &id).await?;
    if game.status == GameStatus::Completed {
        return Err(AppError::InvalidState("Game is completed".to_string()));
    }

    let catalog = state.repo.list_tags().await?;
    let tags = engine::initial_tags(&catalog, request.gender, game.max_spice_rating);

    let player = state.repo.create_player(&id, &request, &tags).await?;
    tracing::info!(
        game_id = %id,
        player_id = %player.id,
        tags = player.tags.len(),
        "Player joined"
    );
    success(player)
}

/// GET /api/games/:id/players - List players in turn order.
pub async fn list_players(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Player>> {
    load_game(&state, &id).await?;
    success(state.repo.list_players(&id).await?)
}

/// DELETE /api/games/:id/players/:player_id - Remove a player from play.
///
/// The turn pointer is adjusted so the player whose turn it was keeps it.
pub async fn remove_player(
    State(state): State<AppState>,
    Path((id, player_id)): Path<(String, String)>,
) -> ApiResult<Game> {
    let game = load_game(&state, &id).await?;
    if game.status == GameStatus::Completed {
        return Err(AppError::InvalidState("Game is completed".to_string()));
    }

    let players = state.repo.list_players(&id).await?;
    if !players.iter().any(|p| p.id == player_id) {
        return Err(AppError::NotFound(format!("Player {} not found", player_id)));
    }

    let game = state
        .repo
        .remove_player(&turn_after_removal(&game, &players, &player_id), &player_id)
        .await?;
    tracing::info!(
        game_id = %id,
        player_id = %player_id,
        current_player_index = game.current_player_index,
        "Player removed"
    );
    success(game)
}
