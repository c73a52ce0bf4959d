//! Database repository for catalog and game state.
//!
//! Uses prepared statements and transactions for data integrity.

use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    CreateGameRequest, CreateTagRequest, CreateTaskRequest, DefaultGender, Game, GameStatus,
    GameTaskHistory, Gender, JoinGameRequest, Player, SomeoneGender, Tag, TagId, TagSet, Task,
    TaskId, TaskTagField, TaskType, UpdateTagRequest, UpdateTaskRequest,
};

const TASK_COLUMNS: &str = "id, task_type, description, spice_rating, tags, tags_to_remove, cant_have_tags, tags_to_add, someone_tags, someone_cant_have_tags, someone_gender, created_at, modified_at, version";
const GAME_COLUMNS: &str = "id, code, status, max_spice_rating, current_round, current_player_index, tag_ids, pending_task_id, created_at, updated_at, version";
const PLAYER_COLUMNS: &str =
    "id, game_id, name, gender, score, turn_order, active, tags, joined_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== TAG OPERATIONS ====================

    /// List all tags.
    pub async fn list_tags(&self) -> Result<Vec<Tag>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, group_id, default_for_gender, min_spice_level, is_default, created_at, modified_at, version FROM tags ORDER BY name"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    /// Get a tag by ID.
    pub async fn get_tag(&self, id: TagId) -> Result<Option<Tag>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, group_id, default_for_gender, min_spice_level, is_default, created_at, modified_at, version FROM tags WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(tag_from_row))
    }

    /// Create a new tag.
    pub async fn create_tag(&self, request: &CreateTagRequest) -> Result<Tag, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO tags (name, group_id, default_for_gender, min_spice_level, is_default, created_at, modified_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, 1)"
        )
        .bind(&request.name)
        .bind(request.group_id)
        .bind(request.default_for_gender.as_str())
        .bind(request.min_spice_level as i64)
        .bind(request.is_default as i32)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Tag {
            id: result.last_insert_rowid(),
            name: request.name.clone(),
            group_id: request.group_id,
            default_for_gender: request.default_for_gender,
            min_spice_level: request.min_spice_level,
            is_default: request.is_default,
            created_at: now.clone(),
            modified_at: now,
            version: 1,
        })
    }

    /// Update a tag with optimistic concurrency control.
    pub async fn update_tag(&self, id: TagId, request: &UpdateTagRequest) -> Result<Tag, AppError> {
        let existing = self
            .get_tag(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tag {} not found", id)))?;

        check_version(request.expected_version, existing.version)?;

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;

        let name = request.name.as_ref().unwrap_or(&existing.name);
        let group_id = request.group_id.or(existing.group_id);
        let default_for_gender = request
            .default_for_gender
            .unwrap_or(existing.default_for_gender);
        let min_spice_level = request.min_spice_level.unwrap_or(existing.min_spice_level);
        let is_default = request.is_default.unwrap_or(existing.is_default);

        let result = sqlx::query(
            "UPDATE tags SET name = ?, group_id = ?, default_for_gender = ?, min_spice_level = ?, is_default = ?, modified_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(name)
        .bind(group_id)
        .bind(default_for_gender.as_str())
        .bind(min_spice_level as i64)
        .bind(is_default as i32)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_tag(id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|t| t.version).unwrap_or(0),
            });
        }

        Ok(Tag {
            id,
            name: name.clone(),
            group_id,
            default_for_gender,
            min_spice_level,
            is_default,
            created_at: existing.created_at,
            modified_at: now,
            version: new_version,
        })
    }

    /// Delete a tag.
    ///
    /// Tasks that still reference the id keep it; such a requirement just
    /// never matches again.
    pub async fn delete_tag(&self, id: TagId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Tag {} not found", id)));
        }
        Ok(())
    }

    // ==================== TASK OPERATIONS ====================

    /// List tasks, optionally of one type.
    pub async fn list_tasks(&self, task_type: Option<TaskType>) -> Result<Vec<Task>, AppError> {
        let rows = match task_type {
            Some(task_type) => {
                sqlx::query(&format!(
                    "SELECT {} FROM tasks WHERE task_type = ? ORDER BY id",
                    TASK_COLUMNS
                ))
                .bind(task_type.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {} FROM tasks ORDER BY id", TASK_COLUMNS))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.iter().map(task_from_row).collect())
    }

    /// Get a task by ID.
    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(task_from_row))
    }

    /// Create a new task.
    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"INSERT INTO tasks (
                task_type, description, spice_rating, tags, tags_to_remove, cant_have_tags,
                tags_to_add, someone_tags, someone_cant_have_tags, someone_gender,
                created_at, modified_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)"#,
        )
        .bind(request.task_type.as_str())
        .bind(&request.description)
        .bind(request.spice_rating as i64)
        .bind(serde_json::to_string(&request.tags)?)
        .bind(serde_json::to_string(&request.tags_to_remove)?)
        .bind(serde_json::to_string(&request.cant_have_tags)?)
        .bind(serde_json::to_string(&request.tags_to_add)?)
        .bind(serde_json::to_string(&request.someone_tags)?)
        .bind(serde_json::to_string(&request.someone_cant_have_tags)?)
        .bind(request.someone_gender.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Task {
            id: result.last_insert_rowid(),
            task_type: request.task_type,
            description: request.description.clone(),
            spice_rating: request.spice_rating,
            tags: request.tags.clone(),
            tags_to_remove: request.tags_to_remove.clone(),
            cant_have_tags: request.cant_have_tags.clone(),
            tags_to_add: request.tags_to_add.clone(),
            someone_tags: request.someone_tags.clone(),
            someone_cant_have_tags: request.someone_cant_have_tags.clone(),
            someone_gender: request.someone_gender,
            created_at: now.clone(),
            modified_at: now,
            version: 1,
            malformed: Vec::new(),
        })
    }

    /// Update a task with optimistic concurrency control.
    pub async fn update_task(
        &self,
        id: TaskId,
        request: &UpdateTaskRequest,
    ) -> Result<Task, AppError> {
        let existing = self
            .get_task(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))?;

        check_version(request.expected_version, existing.version)?;

        let now = Utc::now().to_rfc3339();
        let new_version = existing.version + 1;

        let updated = Task {
            id,
            task_type: request.task_type.unwrap_or(existing.task_type),
            description: request
                .description
                .clone()
                .unwrap_or_else(|| existing.description.clone()),
            spice_rating: request.spice_rating.unwrap_or(existing.spice_rating),
            tags: request.tags.clone().unwrap_or_else(|| existing.tags.clone()),
            tags_to_remove: request
                .tags_to_remove
                .clone()
                .unwrap_or_else(|| existing.tags_to_remove.clone()),
            cant_have_tags: request
                .cant_have_tags
                .clone()
                .unwrap_or_else(|| existing.cant_have_tags.clone()),
            tags_to_add: request
                .tags_to_add
                .clone()
                .unwrap_or_else(|| existing.tags_to_add.clone()),
            someone_tags: request
                .someone_tags
                .clone()
                .unwrap_or_else(|| existing.someone_tags.clone()),
            someone_cant_have_tags: request
                .someone_cant_have_tags
                .clone()
                .unwrap_or_else(|| existing.someone_cant_have_tags.clone()),
            someone_gender: request.someone_gender.unwrap_or(existing.someone_gender),
            created_at: existing.created_at.clone(),
            modified_at: now.clone(),
            version: new_version,
            malformed: Vec::new(),
        };

        let result = sqlx::query(
            r#"UPDATE tasks SET
                task_type = ?, description = ?, spice_rating = ?, tags = ?, tags_to_remove = ?,
                cant_have_tags = ?, tags_to_add = ?, someone_tags = ?, someone_cant_have_tags = ?,
                someone_gender = ?, modified_at = ?, version = ?
            WHERE id = ? AND version = ?"#,
        )
        .bind(updated.task_type.as_str())
        .bind(&updated.description)
        .bind(updated.spice_rating as i64)
        .bind(serde_json::to_string(&updated.tags)?)
        .bind(serde_json::to_string(&updated.tags_to_remove)?)
        .bind(serde_json::to_string(&updated.cant_have_tags)?)
        .bind(serde_json::to_string(&updated.tags_to_add)?)
        .bind(serde_json::to_string(&updated.someone_tags)?)
        .bind(serde_json::to_string(&updated.someone_cant_have_tags)?)
        .bind(updated.someone_gender.as_str())
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_task(id).await?;
            return Err(AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|t| t.version).unwrap_or(0),
            });
        }

        Ok(updated)
    }

    /// Delete a task.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Task {} not found", id)));
        }
        Ok(())
    }

    // ==================== GAME OPERATIONS ====================

    /// Whether a join code is already taken.
    pub async fn code_exists(&self, code: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM games WHERE code = ?")
            .bind(code)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }

    /// Create a new game in the waiting state.
    pub async fn create_game(
        &self,
        code: &str,
        request: &CreateGameRequest,
    ) -> Result<Game, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let tag_ids: TagSet = request.tag_ids.iter().copied().collect();

        sqlx::query(
            "INSERT INTO games (id, code, status, max_spice_rating, current_round, current_player_index, tag_ids, created_at, updated_at, version) VALUES (?, ?, ?, ?, 1, 0, ?, ?, ?, 1)"
        )
        .bind(&id)
        .bind(code)
        .bind(GameStatus::Waiting.as_str())
        .bind(request.max_spice_rating as i64)
        .bind(serde_json::to_string(&tag_ids)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Game {
            id,
            code: code.to_string(),
            status: GameStatus::Waiting,
            max_spice_rating: request.max_spice_rating,
            current_round: 1,
            current_player_index: 0,
            tag_ids,
            pending_task_id: None,
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Get a game by ID.
    pub async fn get_game(&self, id: &str) -> Result<Option<Game>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM games WHERE id = ?", GAME_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(game_from_row))
    }

    /// Get a game by its join code.
    pub async fn get_game_by_code(&self, code: &str) -> Result<Option<Game>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM games WHERE code = ?", GAME_COLUMNS))
            .bind(code.to_uppercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(game_from_row))
    }

    /// Persist the mutable fields of a game, guarded by its current version.
    ///
    /// `game.version` must be the version that was read; the stored copy is
    /// bumped by one and returned.
    pub async fn save_game(&self, game: &Game) -> Result<Game, AppError> {
        let now = Utc::now().to_rfc3339();
        let new_version = game.version + 1;

        let result = sqlx::query(
            "UPDATE games SET status = ?, max_spice_rating = ?, current_round = ?, current_player_index = ?, tag_ids = ?, pending_task_id = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(game.status.as_str())
        .bind(game.max_spice_rating as i64)
        .bind(game.current_round)
        .bind(game.current_player_index)
        .bind(serde_json::to_string(&game.tag_ids)?)
        .bind(game.pending_task_id)
        .bind(&now)
        .bind(new_version)
        .bind(&game.id)
        .bind(game.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.game_conflict(&game.id).await);
        }

        Ok(Game {
            updated_at: now,
            version: new_version,
            ..game.clone()
        })
    }

    async fn game_conflict(&self, id: &str) -> AppError {
        match self.get_game(id).await {
            Ok(Some(current)) => AppError::Conflict {
                message: "Concurrent modification detected".to_string(),
                current_version: current.version,
            },
            Ok(None) => AppError::NotFound(format!("Game {} not found", id)),
            Err(e) => e,
        }
    }

    // ==================== PLAYER OPERATIONS ====================

    /// Add a player to a game at the end of the turn order.
    pub async fn create_player(
        &self,
        game_id: &str,
        request: &JoinGameRequest,
        tags: &TagSet,
    ) -> Result<Player, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT COALESCE(MAX(turn_order) + 1, 0) AS next_order FROM players WHERE game_id = ?",
        )
        .bind(game_id)
        .fetch_one(&mut *tx)
        .await?;
        let turn_order: i64 = row.get("next_order");

        sqlx::query(
            "INSERT INTO players (id, game_id, name, gender, score, turn_order, active, tags, joined_at) VALUES (?, ?, ?, ?, 0, ?, 1, ?, ?)"
        )
        .bind(&id)
        .bind(game_id)
        .bind(request.name.trim())
        .bind(request.gender.map(|g| g.as_str()))
        .bind(turn_order)
        .bind(serde_json::to_string(tags)?)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Player {
            id,
            game_id: game_id.to_string(),
            name: request.name.trim().to_string(),
            gender: request.gender,
            score: 0,
            turn_order,
            active: true,
            tags: tags.clone(),
            joined_at: now,
        })
    }

    /// List every player of a game in turn order.
    pub async fn list_players(&self, game_id: &str) -> Result<Vec<Player>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM players WHERE game_id = ? ORDER BY turn_order",
            PLAYER_COLUMNS
        ))
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(player_from_row).collect())
    }

    /// Mark a player inactive and store the game's adjusted turn pointer.
    /// The player's history and tags are kept.
    pub async fn remove_player(&self, game: &Game, player_id: &str) -> Result<Game, AppError> {
        let now = Utc::now().to_rfc3339();
        let new_version = game.version + 1;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE players SET active = 0 WHERE game_id = ? AND id = ?")
            .bind(&game.id)
            .bind(player_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Player {} not found", player_id)));
        }

        let result = sqlx::query(
            "UPDATE games SET current_round = ?, current_player_index = ?, pending_task_id = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(game.current_round)
        .bind(game.current_player_index)
        .bind(game.pending_task_id)
        .bind(&now)
        .bind(new_version)
        .bind(&game.id)
        .bind(game.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.game_conflict(&game.id).await);
        }

        tx.commit().await?;

        Ok(Game {
            updated_at: now,
            version: new_version,
            ..game.clone()
        })
    }

    /// Store a finished turn: the player's new tags and score, and the game's
    /// advanced turn pointer with the pending prompt cleared. Both writes
    /// commit together or not at all.
    pub async fn complete_turn(&self, game: &Game, player: &Player) -> Result<Game, AppError> {
        let now = Utc::now().to_rfc3339();
        let new_version = game.version + 1;

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE players SET tags = ?, score = ? WHERE id = ? AND game_id = ?")
            .bind(serde_json::to_string(&player.tags)?)
            .bind(player.score)
            .bind(&player.id)
            .bind(&game.id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "UPDATE games SET current_round = ?, current_player_index = ?, pending_task_id = NULL, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(game.current_round)
        .bind(game.current_player_index)
        .bind(&now)
        .bind(new_version)
        .bind(&game.id)
        .bind(game.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.game_conflict(&game.id).await);
        }

        tx.commit().await?;

        Ok(Game {
            pending_task_id: None,
            updated_at: now,
            version: new_version,
            ..game.clone()
        })
    }

    // ==================== HISTORY OPERATIONS ====================

    /// Serve a task to the current player: record it in the history
    /// (insert-if-absent) and make it the game's pending prompt.
    pub async fn serve_task(
        &self,
        game: &Game,
        player_id: &str,
        task_id: TaskId,
    ) -> Result<Game, AppError> {
        let now = Utc::now().to_rfc3339();
        let new_version = game.version + 1;

        let mut tx = self.pool.begin().await?;

        let recorded = sqlx::query(
            "INSERT OR IGNORE INTO game_task_history (game_id, player_id, task_id, served_at) VALUES (?, ?, ?, ?)"
        )
        .bind(&game.id)
        .bind(player_id)
        .bind(task_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        if recorded.rows_affected() == 0 {
            tracing::warn!(
                game_id = %game.id,
                player_id = %player_id,
                task_id,
                "Task was already recorded as served"
            );
        }

        let result = sqlx::query(
            "UPDATE games SET pending_task_id = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(task_id)
        .bind(&now)
        .bind(new_version)
        .bind(&game.id)
        .bind(game.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.game_conflict(&game.id).await);
        }

        tx.commit().await?;

        Ok(Game {
            pending_task_id: Some(task_id),
            updated_at: now,
            version: new_version,
            ..game.clone()
        })
    }

    /// Task ids already served to a player in a game.
    pub async fn served_task_ids(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> Result<BTreeSet<TaskId>, AppError> {
        let rows = sqlx::query(
            "SELECT task_id FROM game_task_history WHERE game_id = ? AND player_id = ?",
        )
        .bind(game_id)
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<TaskId, _>("task_id"))
            .collect())
    }

    /// Full serve history of a game, oldest first.
    pub async fn list_history(&self, game_id: &str) -> Result<Vec<GameTaskHistory>, AppError> {
        let rows = sqlx::query(
            "SELECT game_id, player_id, task_id, served_at FROM game_task_history WHERE game_id = ? ORDER BY served_at, rowid",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| GameTaskHistory {
                game_id: row.get("game_id"),
                player_id: row.get("player_id"),
                task_id: row.get("task_id"),
                served_at: row.get("served_at"),
            })
            .collect())
    }
}

fn check_version(expected: Option<i64>, current: i64) -> Result<(), AppError> {
    match expected {
        Some(expected) if expected != current => Err(AppError::Conflict {
            message: format!(
                "Version mismatch: expected {}, current {}",
                expected, current
            ),
            current_version: current,
        }),
        _ => Ok(()),
    }
}

// Helper functions for row conversion

fn tag_from_row(row: &sqlx::sqlite::SqliteRow) -> Tag {
    let default_for_gender: String = row.get("default_for_gender");
    let min_spice_level: i64 = row.get("min_spice_level");
    let is_default: i32 = row.get("is_default");
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        group_id: row.get("group_id"),
        default_for_gender: DefaultGender::from_str(&default_for_gender).unwrap_or_default(),
        min_spice_level: min_spice_level.clamp(1, 5) as u8,
        is_default: is_default != 0,
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
        version: row.get("version"),
    }
}

fn task_from_row(row: &sqlx::sqlite::SqliteRow) -> Task {
    let id: TaskId = row.get("id");
    let task_type: String = row.get("task_type");
    let spice_rating: i64 = row.get("spice_rating");
    let someone_gender: String = row.get("someone_gender");

    let mut malformed = Vec::new();
    let mut tag_list = |field: TaskTagField| -> Vec<TagId> {
        let raw: Option<String> = row.get(field.column());
        match raw.as_deref().map(parse_tag_ids) {
            None => Vec::new(),
            Some(Ok(ids)) => ids,
            Some(Err(e)) => {
                tracing::warn!(task_id = id, field = field.column(), "Unreadable tag list: {}", e);
                malformed.push(field);
                Vec::new()
            }
        }
    };

    let tags = tag_list(TaskTagField::Tags);
    let tags_to_remove = tag_list(TaskTagField::TagsToRemove);
    let cant_have_tags = tag_list(TaskTagField::CantHaveTags);
    let tags_to_add = tag_list(TaskTagField::TagsToAdd);
    let someone_tags = tag_list(TaskTagField::SomeoneTags);
    let someone_cant_have_tags = tag_list(TaskTagField::SomeoneCantHaveTags);

    Task {
        id,
        task_type: TaskType::from_str(&task_type).unwrap_or_else(|| {
            tracing::warn!(task_id = id, "Unknown task type {:?}, using truth", task_type);
            TaskType::Truth
        }),
        description: row.get("description"),
        spice_rating: spice_rating.clamp(1, 5) as u8,
        tags,
        tags_to_remove,
        cant_have_tags,
        tags_to_add,
        someone_tags,
        someone_cant_have_tags,
        someone_gender: SomeoneGender::from_str(&someone_gender).unwrap_or_default(),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
        version: row.get("version"),
        malformed,
    }
}

fn game_from_row(row: &sqlx::sqlite::SqliteRow) -> Game {
    let status: String = row.get("status");
    let max_spice_rating: i64 = row.get("max_spice_rating");
    let id: String = row.get("id");
    let raw_tag_ids: Option<String> = row.get("tag_ids");
    let tag_ids = parse_tag_set(raw_tag_ids.as_deref(), &id, "tag_ids");
    Game {
        id,
        code: row.get("code"),
        status: GameStatus::from_str(&status).unwrap_or(GameStatus::Waiting),
        max_spice_rating: max_spice_rating.clamp(1, 5) as u8,
        current_round: row.get("current_round"),
        current_player_index: row.get("current_player_index"),
        tag_ids,
        pending_task_id: row.get("pending_task_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn player_from_row(row: &sqlx::sqlite::SqliteRow) -> Player {
    let gender: Option<String> = row.get("gender");
    let active: i32 = row.get("active");
    let id: String = row.get("id");
    let raw_tags: Option<String> = row.get("tags");
    let tags = parse_tag_set(raw_tags.as_deref(), &id, "tags");
    Player {
        id,
        game_id: row.get("game_id"),
        name: row.get("name"),
        gender: gender.as_deref().and_then(Gender::from_str),
        score: row.get("score"),
        turn_order: row.get("turn_order"),
        active: active != 0,
        tags,
        joined_at: row.get("joined_at"),
    }
}

fn parse_tag_ids(s: &str) -> Result<Vec<TagId>, serde_json::Error> {
    serde_json::from_str(s)
}

/// Parse a stored tag set. An unreadable column reads as empty; the next
/// write of the row replaces it.
fn parse_tag_set(raw: Option<&str>, owner_id: &str, column: &str) -> TagSet {
    match raw.map(parse_tag_ids) {
        None => TagSet::new(),
        Some(Ok(ids)) => ids.into_iter().collect(),
        Some(Err(e)) => {
            tracing::warn!(owner_id, column, "Unreadable tag set, reading as empty: {}", e);
            TagSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        (Repository::new(pool), temp_dir)
    }

    fn dare(description: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            task_type: TaskType::Dare,
            description: description.to_string(),
            spice_rating: 1,
            tags: vec![1],
            tags_to_remove: vec![],
            cant_have_tags: vec![],
            tags_to_add: vec![2],
            someone_tags: vec![],
            someone_cant_have_tags: vec![],
            someone_gender: SomeoneGender::Any,
        }
    }

    #[tokio::test]
    async fn test_malformed_tag_column_is_flagged() {
        let (repo, _dir) = repo().await;
        let task = repo.create_task(&dare("Do a handstand")).await.unwrap();

        sqlx::query("UPDATE tasks SET tags_to_remove = 'not json' WHERE id = ?")
            .bind(task.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let loaded = repo.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.malformed, vec![TaskTagField::TagsToRemove]);
        assert!(loaded.tags_to_remove.is_empty());
        assert_eq!(loaded.tags, vec![1]);
        assert_eq!(loaded.tags_to_add, vec![2]);
    }

    #[tokio::test]
    async fn test_serve_task_records_history_once() {
        let (repo, _dir) = repo().await;
        let game = repo
            .create_game(
                "ABCDEF",
                &CreateGameRequest {
                    max_spice_rating: 3,
                    tag_ids: vec![],
                },
            )
            .await
            .unwrap();
        let player = repo
            .create_player(
                &game.id,
                &JoinGameRequest {
                    name: "Sam".to_string(),
                    gender: None,
                },
                &TagSet::new(),
            )
            .await
            .unwrap();

        let game = repo.serve_task(&game, &player.id, 7).await.unwrap();
        assert_eq!(game.pending_task_id, Some(7));
        let game = repo.serve_task(&game, &player.id, 7).await.unwrap();
        assert_eq!(game.version, 3);

        let served = repo.served_task_ids(&game.id, &player.id).await.unwrap();
        assert_eq!(served.into_iter().collect::<Vec<_>>(), vec![7]);
        assert_eq!(repo.list_history(&game.id).await.unwrap().len(), 1);

        let stored = repo.get_game(&game.id).await.unwrap().unwrap();
        assert_eq!(stored.pending_task_id, Some(7));
    }

    #[tokio::test]
    async fn test_complete_turn_clears_pending_task() {
        let (repo, _dir) = repo().await;
        let game = repo
            .create_game(
                "PLMKOJ",
                &CreateGameRequest {
                    max_spice_rating: 3,
                    tag_ids: vec![],
                },
            )
            .await
            .unwrap();
        let mut player = repo
            .create_player(
                &game.id,
                &JoinGameRequest {
                    name: "Ida".to_string(),
                    gender: None,
                },
                &TagSet::new(),
            )
            .await
            .unwrap();

        let mut game = repo.serve_task(&game, &player.id, 3).await.unwrap();
        game.current_player_index = 1;
        player.score = 1;
        player.tags = [5].into_iter().collect();

        let done = repo.complete_turn(&game, &player).await.unwrap();
        assert_eq!(done.pending_task_id, None);

        let stored = repo.get_game(&game.id).await.unwrap().unwrap();
        assert_eq!(stored.pending_task_id, None);
        assert_eq!(stored.current_player_index, 1);

        let players = repo.list_players(&game.id).await.unwrap();
        assert_eq!(players[0].score, 1);
        assert_eq!(players[0].tags.iter().copied().collect::<Vec<_>>(), vec![5]);
    }

    #[tokio::test]
    async fn test_unreadable_player_tags_read_as_empty() {
        let (repo, _dir) = repo().await;
        let game = repo
            .create_game(
                "NBHUYG",
                &CreateGameRequest {
                    max_spice_rating: 3,
                    tag_ids: vec![],
                },
            )
            .await
            .unwrap();
        let player = repo
            .create_player(
                &game.id,
                &JoinGameRequest {
                    name: "Joy".to_string(),
                    gender: None,
                },
                &[1, 2].into_iter().collect(),
            )
            .await
            .unwrap();

        sqlx::query("UPDATE players SET tags = '[1, oops' WHERE id = ?")
            .bind(&player.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let players = repo.list_players(&game.id).await.unwrap();
        assert!(players[0].tags.is_empty());
    }

    #[tokio::test]
    async fn test_save_game_rejects_stale_version() {
        let (repo, _dir) = repo().await;
        let game = repo
            .create_game(
                "QWERTY",
                &CreateGameRequest {
                    max_spice_rating: 2,
                    tag_ids: vec![3, 1],
                },
            )
            .await
            .unwrap();

        let saved = repo.save_game(&game).await.unwrap();
        assert_eq!(saved.version, 2);

        let stale = repo.save_game(&game).await;
        assert!(matches!(
            stale,
            Err(AppError::Conflict {
                current_version: 2,
                ..
            })
        ));

        let by_code = repo.get_game_by_code("qwerty").await.unwrap().unwrap();
        assert_eq!(by_code.tag_ids.into_iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_players_get_sequential_turn_order() {
        let (repo, _dir) = repo().await;
        let game = repo
            .create_game(
                "ZXCVBN",
                &CreateGameRequest {
                    max_spice_rating: 3,
                    tag_ids: vec![],
                },
            )
            .await
            .unwrap();

        for name in ["A", "B", "C"] {
            repo.create_player(
                &game.id,
                &JoinGameRequest {
                    name: name.to_string(),
                    gender: Some(Gender::Female),
                },
                &TagSet::new(),
            )
            .await
            .unwrap();
        }

        let players = repo.list_players(&game.id).await.unwrap();
        let orders: Vec<i64> = players.iter().map(|p| p.turn_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(players[0].gender, Some(Gender::Female));
    }
}
