//! Turn endpoints: draw a prompt for the current player, then complete it.

use axum::{
    extract::{Path, State},
    Json,
};

use super::games::load_game;
use super::{success, ApiResult};
use crate::engine;
use crate::errors::AppError;
use crate::models::{
    CompleteTurnRequest, CompleteTurnResponse, DrawTurnRequest, Game, GameStatus, Player,
    TurnResponse,
};
use crate::AppState;

/// POST /api/games/:id/turn - Draw a prompt for whoever's turn it is.
///
/// Only one prompt may be pending per turn; it must be completed before the
/// next draw.
pub async fn draw_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DrawTurnRequest>,
) -> ApiResult<TurnResponse> {
    let game = active_game(&state, &id).await?;
    if let Some(pending) = game.pending_task_id {
        return Err(AppError::InvalidState(format!(
            "Task {} is still pending for this turn",
            pending
        )));
    }
    let players = state.repo.list_players(&id).await?;
    let acting = current_player(&game, &players)?.clone();

    let tasks = state.repo.list_tasks(None).await?;
    let served = state.repo.served_task_ids(&id, &acting.id).await?;

    let eligible = engine::eligible_tasks(&tasks, &game, &acting, request.task_type, &served);
    let mut warnings = eligible.warnings;

    let Some(task) = state.resolver.pick_task(&eligible.tasks) else {
        tracing::info!(
            game_id = %id,
            player_id = %acting.id,
            served = served.len(),
            "No eligible tasks left"
        );
        return success(TurnResponse::NoTasksAvailable {
            player: acting,
            warnings,
        });
    };

    let resolved = state.resolver.resolve_description(task, &acting, &players);
    warnings.extend(resolved.warnings);

    state.repo.serve_task(&game, &acting.id, task.id).await?;

    tracing::debug!(
        game_id = %id,
        player_id = %acting.id,
        task_id = task.id,
        pool = eligible.tasks.len(),
        "Drew task"
    );

    success(TurnResponse::Task {
        player: acting,
        task: task.clone(),
        description: resolved.text,
        warnings,
    })
}

/// POST /api/games/:id/turn/complete - Finish the current player's turn.
///
/// A completed task applies its tag directives and scores a point; a skipped
/// one changes nothing but still passes the turn on. With no prompt pending,
/// for example after `noTasksAvailable`, the turn may be passed by omitting
/// `taskId`.
pub async fn complete_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CompleteTurnRequest>,
) -> ApiResult<CompleteTurnResponse> {
    let game = active_game(&state, &id).await?;
    let players = state.repo.list_players(&id).await?;
    let acting = current_player(&game, &players)?;

    if acting.id != request.player_id {
        return Err(AppError::InvalidState(format!(
            "It is not player {}'s turn",
            request.player_id
        )));
    }

    match (game.pending_task_id, request.task_id) {
        (Some(pending), Some(task_id)) if pending == task_id => {}
        (None, None) => {}
        (Some(pending), _) => {
            return Err(AppError::Validation(format!(
                "Task {} is the pending prompt for this turn",
                pending
            )));
        }
        (None, Some(task_id)) => {
            return Err(AppError::Validation(format!(
                "Task {} was not drawn this turn",
                task_id
            )));
        }
    }

    let pending = game.pending_task_id;
    let task = match pending {
        Some(task_id) => {
            let task = state.repo.get_task(task_id).await?;
            if task.is_none() {
                tracing::warn!(game_id = %id, task_id, "Pending task was deleted");
            }
            task
        }
        None => None,
    };

    let mut player = acting.clone();
    let mut warnings = Vec::new();
    let scored = request.completed && pending.is_some();
    if scored {
        if let Some(task) = &task {
            warnings = engine::completion_warnings(task);
            player.tags = engine::apply_completion(&acting.tags, task);
        }
        player.score += 1;
    }

    let active_count = players.iter().filter(|p| p.active).count();
    let game = state
        .repo
        .complete_turn(&advance_turn(&game, active_count), &player)
        .await?;

    tracing::info!(
        game_id = %id,
        player_id = %player.id,
        task_id = ?pending,
        completed = scored,
        round = game.current_round,
        "Turn completed"
    );

    success(CompleteTurnResponse {
        game,
        player,
        warnings,
    })
}

async fn active_game(state: &AppState, id: &str) -> Result<Game, AppError> {
    let game = load_game(state, id).await?;
    if game.status != GameStatus::Active {
        return Err(AppError::InvalidState(format!(
            "Game is {}, turns need an active game",
            game.status.as_str()
        )));
    }
    Ok(game)
}

/// The active player at the game's turn pointer. `players` is in turn order.
fn current_player<'a>(game: &Game, players: &'a [Player]) -> Result<&'a Player, AppError> {
    let active: Vec<&Player> = players.iter().filter(|p| p.active).collect();
    if active.is_empty() {
        return Err(AppError::InvalidState("Game has no active players".to_string()));
    }
    let index = game.current_player_index.rem_euclid(active.len() as i64) as usize;
    Ok(active[index])
}

/// Move the turn pointer on by one, starting a new round on wrap-around.
fn advance_turn(game: &Game, active_count: usize) -> Game {
    let count = active_count.max(1) as i64;
    let next = game.current_player_index.rem_euclid(count) + 1;

    let mut advanced = game.clone();
    if next >= count {
        advanced.current_player_index = 0;
        advanced.current_round += 1;
    } else {
        advanced.current_player_index = next;
    }
    advanced
}

/// Keep the turn pointer on the same player when someone leaves.
///
/// Removing a player before the pointer shifts it back by one. Removing the
/// current player hands the turn to the next one and drops their pending
/// prompt; if they were last, play wraps into a new round.
pub(crate) fn turn_after_removal(game: &Game, players: &[Player], removed_id: &str) -> Game {
    let active: Vec<&Player> = players.iter().filter(|p| p.active).collect();
    let Some(position) = active.iter().position(|p| p.id == removed_id) else {
        return game.clone();
    };

    let count = active.len() as i64;
    let position = position as i64;
    let current = game.current_player_index.rem_euclid(count);

    let mut next = game.clone();
    next.current_player_index = current;
    if position < current {
        next.current_player_index = current - 1;
    } else if position == current {
        next.pending_task_id = None;
        if current == count - 1 {
            next.current_player_index = 0;
            if game.status == GameStatus::Active {
                next.current_round += 1;
            }
        }
    }
    next
}
