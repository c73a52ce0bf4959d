//! Game, turn and history models.

use serde::{Deserialize, Serialize};

use super::{Player, TagId, TagSet, Task, TaskId, TaskType};
use crate::engine::FilterWarning;

/// Lifecycle state of a game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Completed,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Active => "active",
            GameStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(GameStatus::Waiting),
            "active" => Some(GameStatus::Active),
            "completed" => Some(GameStatus::Completed),
            _ => None,
        }
    }
}

/// A single party game session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub code: String,
    pub status: GameStatus,
    pub max_spice_rating: u8,
    pub current_round: i64,
    pub current_player_index: i64,
    /// Game-level tag context selected at setup.
    pub tag_ids: TagSet,
    /// Prompt drawn by the current player and not yet completed.
    #[serde(default)]
    pub pending_task_id: Option<TaskId>,
    pub created_at: String,
    pub updated_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// Request body for creating a new game.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    #[serde(default = "default_max_spice_rating")]
    pub max_spice_rating: u8,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

fn default_max_spice_rating() -> u8 {
    3
}

/// Request body for replacing the game tag set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameTagsRequest {
    pub tag_ids: Vec<TagId>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// A (game, player, task) record of a prompt already served.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameTaskHistory {
    pub game_id: String,
    pub player_id: String,
    pub task_id: TaskId,
    pub served_at: String,
}

/// Request body for drawing the next prompt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawTurnRequest {
    #[serde(default)]
    pub task_type: Option<TaskType>,
}

/// Result of drawing a prompt for the current player.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum TurnResponse {
    #[serde(rename_all = "camelCase")]
    Task {
        player: Player,
        task: Task,
        /// Description with placeholders resolved.
        description: String,
        warnings: Vec<FilterWarning>,
    },
    #[serde(rename_all = "camelCase")]
    NoTasksAvailable {
        player: Player,
        warnings: Vec<FilterWarning>,
    },
}

/// Request body for finishing the current turn.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTurnRequest {
    pub player_id: String,
    /// The pending prompt. Omitted to pass a turn where nothing was drawn.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

/// Game and player state after a turn is finished.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTurnResponse {
    pub game: Game,
    pub player: Player,
    pub warnings: Vec<FilterWarning>,
}
