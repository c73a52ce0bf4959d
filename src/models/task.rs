//! Task (prompt) model.

use serde::{Deserialize, Serialize};

use super::{TagId, TaskId};

/// Kind of prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Truth,
    Dare,
    Group,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Truth => "truth",
            TaskType::Dare => "dare",
            TaskType::Group => "group",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "truth" => Some(TaskType::Truth),
            "dare" => Some(TaskType::Dare),
            "group" => Some(TaskType::Group),
            _ => None,
        }
    }
}

/// Gender constraint on the player picked for `{someone}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SomeoneGender {
    #[default]
    Any,
    Same,
    Other,
}

impl SomeoneGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            SomeoneGender::Any => "any",
            SomeoneGender::Same => "same",
            SomeoneGender::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "any" => Some(SomeoneGender::Any),
            "same" => Some(SomeoneGender::Same),
            "other" => Some(SomeoneGender::Other),
            _ => None,
        }
    }
}

/// The tag-list columns of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum TaskTagField {
    Tags,
    TagsToRemove,
    CantHaveTags,
    TagsToAdd,
    SomeoneTags,
    SomeoneCantHaveTags,
}

impl TaskTagField {
    pub fn column(&self) -> &'static str {
        match self {
            TaskTagField::Tags => "tags",
            TaskTagField::TagsToRemove => "tags_to_remove",
            TaskTagField::CantHaveTags => "cant_have_tags",
            TaskTagField::TagsToAdd => "tags_to_add",
            TaskTagField::SomeoneTags => "someone_tags",
            TaskTagField::SomeoneCantHaveTags => "someone_cant_have_tags",
        }
    }
}

/// A truth/dare/group prompt together with its tag rules.
///
/// `tags` are required tags: every one must be in the acting player's
/// available tag universe. `cant_have_tags` exclude the task when the player
/// holds any of them. `tags_to_remove` / `tags_to_add` are applied to the
/// player when the task is completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub description: String,
    pub spice_rating: u8,
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default)]
    pub tags_to_remove: Vec<TagId>,
    #[serde(default)]
    pub cant_have_tags: Vec<TagId>,
    #[serde(default)]
    pub tags_to_add: Vec<TagId>,
    #[serde(default)]
    pub someone_tags: Vec<TagId>,
    #[serde(default)]
    pub someone_cant_have_tags: Vec<TagId>,
    #[serde(default)]
    pub someone_gender: SomeoneGender,
    pub created_at: String,
    pub modified_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
    /// Tag-list columns whose stored value could not be parsed.
    #[serde(skip)]
    pub malformed: Vec<TaskTagField>,
}

impl Task {
    pub fn is_malformed(&self, field: TaskTagField) -> bool {
        self.malformed.contains(&field)
    }
}

/// Request body for creating a new task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub description: String,
    #[serde(default = "default_spice_rating")]
    pub spice_rating: u8,
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default)]
    pub tags_to_remove: Vec<TagId>,
    #[serde(default)]
    pub cant_have_tags: Vec<TagId>,
    #[serde(default)]
    pub tags_to_add: Vec<TagId>,
    #[serde(default)]
    pub someone_tags: Vec<TagId>,
    #[serde(default)]
    pub someone_cant_have_tags: Vec<TagId>,
    #[serde(default)]
    pub someone_gender: SomeoneGender,
}

fn default_spice_rating() -> u8 {
    1
}

/// Request body for updating an existing task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default, rename = "type")]
    pub task_type: Option<TaskType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub spice_rating: Option<u8>,
    #[serde(default)]
    pub tags: Option<Vec<TagId>>,
    #[serde(default)]
    pub tags_to_remove: Option<Vec<TagId>>,
    #[serde(default)]
    pub cant_have_tags: Option<Vec<TagId>>,
    #[serde(default)]
    pub tags_to_add: Option<Vec<TagId>>,
    #[serde(default)]
    pub someone_tags: Option<Vec<TagId>>,
    #[serde(default)]
    pub someone_cant_have_tags: Option<Vec<TagId>>,
    #[serde(default)]
    pub someone_gender: Option<SomeoneGender>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Query string for listing tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskListQuery {
    #[serde(default, rename = "type")]
    pub task_type: Option<TaskType>,
}
