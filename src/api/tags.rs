//! Tag catalog endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, validate_spice, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateTagRequest, Tag, TagId, UpdateTagRequest};
use crate::AppState;

/// GET /api/tags - List all tags.
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Vec<Tag>> {
    success(state.repo.list_tags().await?)
}

/// GET /api/tags/:id - Get a single tag.
pub async fn get_tag(State(state): State<AppState>, Path(id): Path<TagId>) -> ApiResult<Tag> {
    match state.repo.get_tag(id).await? {
        Some(tag) => success(tag),
        None => Err(AppError::NotFound(format!("Tag {} not found", id))),
    }
}

/// POST /api/tags - Create a new tag.
pub async fn create_tag(
    State(state): State<AppState>,
    Json(request): Json<CreateTagRequest>,
) -> ApiResult<Tag> {
    // Validate required fields
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Tag name is required".to_string()));
    }
    validate_spice(request.min_spice_level, "minSpiceLevel")?;

    let tag = state.repo.create_tag(&request).await?;
    tracing::info!(tag_id = tag.id, "Created tag {}", tag.name);
    success(tag)
}

/// PUT /api/tags/:id - Update a tag.
pub async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<TagId>,
    Json(request): Json<UpdateTagRequest>,
) -> ApiResult<Tag> {
    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Tag name cannot be empty".to_string()));
        }
    }
    if let Some(level) = request.min_spice_level {
        validate_spice(level, "minSpiceLevel")?;
    }

    success(state.repo.update_tag(id, &request).await?)
}

/// DELETE /api/tags/:id - Delete a tag.
pub async fn delete_tag(State(state): State<AppState>, Path(id): Path<TagId>) -> ApiResult<()> {
    state.repo.delete_tag(id).await?;
    tracing::info!(tag_id = id, "Deleted tag");
    success(())
}
