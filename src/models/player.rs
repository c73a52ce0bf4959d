//! Player model.

use serde::{Deserialize, Serialize};

use super::TagSet;

/// Player gender as entered at join.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// A participant in one game.
///
/// `tags` is the per-player held-tag state; only task completion mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub game_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub score: i64,
    pub turn_order: i64,
    pub active: bool,
    pub tags: TagSet,
    pub joined_at: String,
}

/// Request body for joining a game.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    pub name: String,
    #[serde(default)]
    pub gender: Option<Gender>,
}
