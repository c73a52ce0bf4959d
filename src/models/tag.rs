//! Tag catalog model.

use serde::{Deserialize, Serialize};

use super::{Gender, TagId};

/// Which players receive a tag automatically when they join a game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefaultGender {
    Male,
    Female,
    Both,
    #[default]
    None,
}

impl DefaultGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultGender::Male => "male",
            DefaultGender::Female => "female",
            DefaultGender::Both => "both",
            DefaultGender::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "male" => Some(DefaultGender::Male),
            "female" => Some(DefaultGender::Female),
            "both" => Some(DefaultGender::Both),
            "none" => Some(DefaultGender::None),
            _ => None,
        }
    }

    /// Whether a player of the given gender gets this tag by default.
    pub fn applies_to(&self, gender: Option<Gender>) -> bool {
        match (self, gender) {
            (DefaultGender::Both, Some(_)) => true,
            (DefaultGender::Male, Some(Gender::Male)) => true,
            (DefaultGender::Female, Some(Gender::Female)) => true,
            _ => false,
        }
    }
}

/// A catalog tag. Reference data, edited by admins only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    pub default_for_gender: DefaultGender,
    pub min_spice_level: u8,
    pub is_default: bool,
    pub created_at: String,
    pub modified_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// Request body for creating a new tag.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagRequest {
    pub name: String,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub default_for_gender: DefaultGender,
    #[serde(default = "default_min_spice_level")]
    pub min_spice_level: u8,
    #[serde(default)]
    pub is_default: bool,
}

fn default_min_spice_level() -> u8 {
    1
}

/// Request body for updating an existing tag.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub default_for_gender: Option<DefaultGender>,
    #[serde(default)]
    pub min_spice_level: Option<u8>,
    #[serde(default)]
    pub is_default: Option<bool>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}
