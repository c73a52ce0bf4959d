//! REST API module.
//!
//! Catalog administration (tags, tasks) plus the game flow: setup, joining,
//! drawing prompts and completing turns.

mod games;
mod players;
mod tags;
mod tasks;
mod turns;

pub use games::*;
pub use players::*;
pub use tags::*;
pub use tasks::*;
pub use turns::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Lowest and highest spice rating accepted anywhere.
pub const MIN_SPICE: u8 = 1;
pub const MAX_SPICE: u8 = 5;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Reject spice values outside 1..=5.
fn validate_spice(value: u8, field: &str) -> Result<(), AppError> {
    if !(MIN_SPICE..=MAX_SPICE).contains(&value) {
        return Err(AppError::Validation(format!(
            "{} must be between {} and {}",
            field, MIN_SPICE, MAX_SPICE
        )));
    }
    Ok(())
}
