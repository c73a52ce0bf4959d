//! Task catalog endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{success, validate_spice, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateTaskRequest, TagId, Task, TaskId, TaskListQuery, UpdateTaskRequest};
use crate::AppState;

/// GET /api/tasks - List tasks, optionally filtered by `?type=`.
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Vec<Task>> {
    success(state.repo.list_tasks(query.task_type).await?)
}

/// GET /api/tasks/:id - Get a single task.
pub async fn get_task(State(state): State<AppState>, Path(id): Path<TaskId>) -> ApiResult<Task> {
    match state.repo.get_task(id).await? {
        Some(task) => success(task),
        None => Err(AppError::NotFound(format!("Task {} not found", id))),
    }
}

/// POST /api/tasks - Create a new task.
pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<Task> {
    if request.description.trim().is_empty() {
        return Err(AppError::Validation("Description is required".to_string()));
    }
    validate_spice(request.spice_rating, "spiceRating")?;
    validate_directives(&request.tags_to_add, &request.tags_to_remove)?;

    let task = state.repo.create_task(&request).await?;
    tracing::info!(task_id = task.id, task_type = task.task_type.as_str(), "Created task");
    success(task)
}

/// PUT /api/tasks/:id - Update a task.
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(request): Json<UpdateTaskRequest>,
) -> ApiResult<Task> {
    if let Some(description) = &request.description {
        if description.trim().is_empty() {
            return Err(AppError::Validation("Description cannot be empty".to_string()));
        }
    }
    if let Some(rating) = request.spice_rating {
        validate_spice(rating, "spiceRating")?;
    }

    // Directive lists are checked against the stored values they are merged with.
    if request.tags_to_add.is_some() || request.tags_to_remove.is_some() {
        let existing = state
            .repo
            .get_task(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))?;
        let to_add = request.tags_to_add.as_ref().unwrap_or(&existing.tags_to_add);
        let to_remove = request
            .tags_to_remove
            .as_ref()
            .unwrap_or(&existing.tags_to_remove);
        validate_directives(to_add, to_remove)?;
    }

    success(state.repo.update_task(id, &request).await?)
}

/// DELETE /api/tasks/:id - Delete a task.
pub async fn delete_task(State(state): State<AppState>, Path(id): Path<TaskId>) -> ApiResult<()> {
    state.repo.delete_task(id).await?;
    tracing::info!(task_id = id, "Deleted task");
    success(())
}

/// A task may not both grant and strip the same tag.
fn validate_directives(to_add: &[TagId], to_remove: &[TagId]) -> Result<(), AppError> {
    if let Some(tag) = to_add.iter().find(|tag| to_remove.contains(tag)) {
        return Err(AppError::Validation(format!(
            "Tag {} cannot be in both tagsToAdd and tagsToRemove",
            tag
        )));
    }
    Ok(())
}
