//! Data models for the game backend.
//!
//! JSON field names are camelCase to match the web client.

mod game;
mod player;
mod tag;
mod task;

pub use game::*;
pub use player::*;
pub use tag::*;
pub use task::*;

use std::collections::BTreeSet;

pub type TagId = i64;
pub type TaskId = i64;

/// An ordered set of tag ids.
pub type TagSet = BTreeSet<TagId>;
