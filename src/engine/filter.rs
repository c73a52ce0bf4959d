//! Task eligibility rules.
//!
//! Every filter is a pure pass over the input order: surviving tasks keep
//! their relative order and nothing is mutated.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{Game, Player, TagSet, Task, TaskId, TaskTagField, TaskType};

/// A task record that could not be evaluated as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterWarning {
    pub task_id: TaskId,
    pub field: TaskTagField,
    pub message: String,
}

impl FilterWarning {
    pub(crate) fn malformed(task: &Task, field: TaskTagField, effect: &str) -> Self {
        tracing::warn!(
            task_id = task.id,
            field = field.column(),
            "Malformed tag list on task: {}",
            effect
        );
        Self {
            task_id: task.id,
            field,
            message: format!("{} is malformed; {}", field.column(), effect),
        }
    }
}

/// Tasks that passed a filter, plus warnings about records it had to skip.
#[derive(Debug, Default)]
pub struct Filtered<'a> {
    pub tasks: Vec<&'a Task>,
    pub warnings: Vec<FilterWarning>,
}

impl<'a> Filtered<'a> {
    fn merge_warnings(mut self, earlier: Vec<FilterWarning>) -> Self {
        let mut warnings = earlier;
        warnings.append(&mut self.warnings);
        self.warnings = warnings;
        self
    }
}

/// Game tags together with the tags the player currently holds.
pub fn available_tag_universe(game: &Game, player: &Player) -> TagSet {
    game.tag_ids.union(&player.tags).copied().collect()
}

/// Keep tasks whose required tags are satisfied by the available universe.
///
/// A task with no required tags and nothing to remove is always offered.
/// Otherwise it needs a non-empty universe, a non-empty required set, and
/// every required tag present in `game_tag_ids`. A task with required tags
/// empty but `tags_to_remove` set therefore never qualifies.
pub fn filter_available_tasks_for_player<'a, I>(
    tasks: I,
    player: &Player,
    game_tag_ids: &TagSet,
    player_tag_ids: &TagSet,
) -> Filtered<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    let nothing_to_match = game_tag_ids.is_empty() && player_tag_ids.is_empty();
    let mut out = Filtered::default();

    for task in tasks {
        if task.is_malformed(TaskTagField::Tags) {
            out.warnings.push(FilterWarning::malformed(
                task,
                TaskTagField::Tags,
                "task excluded",
            ));
            continue;
        }
        if task.is_malformed(TaskTagField::TagsToRemove) {
            out.warnings.push(FilterWarning::malformed(
                task,
                TaskTagField::TagsToRemove,
                "treated as no directive",
            ));
        }

        let tag_independent = task.tags.is_empty() && task.tags_to_remove.is_empty();

        let available = if nothing_to_match {
            tag_independent
        } else {
            tag_independent
                || (!game_tag_ids.is_empty()
                    && !task.tags.is_empty()
                    && task.tags.iter().all(|tag| game_tag_ids.contains(tag)))
        };

        if available {
            out.tasks.push(task);
        }
    }

    tracing::debug!(
        player_id = %player.id,
        kept = out.tasks.len(),
        "Filtered tasks by required tags"
    );
    out
}

/// Drop tasks whose `cant_have_tags` intersect the player's held tags.
pub fn filter_by_cant_have_tags<'a, I>(tasks: I, player: &Player) -> Filtered<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut out = Filtered::default();

    for task in tasks {
        if task.is_malformed(TaskTagField::CantHaveTags) {
            out.warnings.push(FilterWarning::malformed(
                task,
                TaskTagField::CantHaveTags,
                "task excluded",
            ));
            continue;
        }
        if !task.cant_have_tags.iter().any(|tag| player.tags.contains(tag)) {
            out.tasks.push(task);
        }
    }

    out
}

/// Keep tasks at or below the game's spice ceiling.
pub fn filter_by_spice<'a, I>(tasks: I, max_spice_rating: u8) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|task| task.spice_rating <= max_spice_rating)
        .collect()
}

/// Keep tasks of the requested type; `None` keeps everything.
pub fn filter_by_type<'a, I>(tasks: I, task_type: Option<TaskType>) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|task| task_type.map_or(true, |wanted| task.task_type == wanted))
        .collect()
}

/// Full eligibility pipeline for the acting player.
///
/// Spice and type come first, then required tags and can't-have tags, then
/// anything this player was already served in this game.
pub fn eligible_tasks<'a>(
    tasks: &'a [Task],
    game: &Game,
    player: &Player,
    task_type: Option<TaskType>,
    served: &BTreeSet<TaskId>,
) -> Filtered<'a> {
    let pool = filter_by_type(filter_by_spice(tasks, game.max_spice_rating), task_type);

    let universe = available_tag_universe(game, player);
    let by_tags = filter_available_tasks_for_player(pool, player, &universe, &player.tags);
    let by_cant_have =
        filter_by_cant_have_tags(by_tags.tasks, player).merge_warnings(by_tags.warnings);

    Filtered {
        tasks: by_cant_have
            .tasks
            .into_iter()
            .filter(|task| !served.contains(&task.id))
            .collect(),
        warnings: by_cant_have.warnings,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{Gender, Player, SomeoneGender, TagId, TagSet, Task, TaskType};

    pub fn task(id: i64, tags: &[TagId], tags_to_remove: &[TagId]) -> Task {
        Task {
            id,
            task_type: TaskType::Dare,
            description: format!("task {}", id),
            spice_rating: 1,
            tags: tags.to_vec(),
            tags_to_remove: tags_to_remove.to_vec(),
            cant_have_tags: Vec::new(),
            tags_to_add: Vec::new(),
            someone_tags: Vec::new(),
            someone_cant_have_tags: Vec::new(),
            someone_gender: SomeoneGender::Any,
            created_at: String::new(),
            modified_at: String::new(),
            version: 1,
            malformed: Vec::new(),
        }
    }

    pub fn player(id: &str, gender: Option<Gender>, tags: &[TagId]) -> Player {
        Player {
            id: id.to_string(),
            game_id: "game".to_string(),
            name: id.to_string(),
            gender,
            score: 0,
            turn_order: 0,
            active: true,
            tags: tags.iter().copied().collect(),
            joined_at: String::new(),
        }
    }

    pub fn set(ids: &[TagId]) -> TagSet {
        ids.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{player, set, task};
    use super::*;
    use crate::models::GameStatus;

    fn ids(filtered: &Filtered<'_>) -> Vec<i64> {
        filtered.tasks.iter().map(|t| t.id).collect()
    }

    fn game(max_spice_rating: u8, tag_ids: &[i64]) -> Game {
        Game {
            id: "game".to_string(),
            code: "ABCDEF".to_string(),
            status: GameStatus::Active,
            max_spice_rating,
            current_round: 1,
            current_player_index: 0,
            tag_ids: set(tag_ids),
            pending_task_id: None,
            created_at: String::new(),
            updated_at: String::new(),
            version: 1,
        }
    }

    #[test]
    fn test_required_tag_contained_in_universe() {
        let tasks = vec![task(1, &[5], &[])];
        let p = player("p", None, &[]);

        let hit = filter_available_tasks_for_player(&tasks, &p, &set(&[5, 7]), &set(&[]));
        assert_eq!(ids(&hit), vec![1]);

        let miss = filter_available_tasks_for_player(&tasks, &p, &set(&[7]), &set(&[]));
        assert!(miss.tasks.is_empty());
    }

    #[test]
    fn test_untagged_task_always_available() {
        let tasks = vec![task(1, &[], &[])];
        let p = player("p", None, &[]);

        let empty = filter_available_tasks_for_player(&tasks, &p, &set(&[]), &set(&[]));
        assert_eq!(ids(&empty), vec![1]);

        let full = filter_available_tasks_for_player(&tasks, &p, &set(&[1, 2, 3]), &set(&[2]));
        assert_eq!(ids(&full), vec![1]);
    }

    #[test]
    fn test_removal_only_task_never_selectable() {
        let tasks = vec![task(1, &[], &[3])];
        let p = player("p", None, &[3]);

        let empty = filter_available_tasks_for_player(&tasks, &p, &set(&[]), &set(&[]));
        assert!(empty.tasks.is_empty());

        let holding = filter_available_tasks_for_player(&tasks, &p, &set(&[3]), &set(&[3]));
        assert!(holding.tasks.is_empty());
    }

    #[test]
    fn test_partial_match_is_not_enough() {
        let tasks = vec![task(1, &[1, 2], &[])];
        let p = player("p", None, &[]);

        let filtered = filter_available_tasks_for_player(&tasks, &p, &set(&[1, 3]), &set(&[]));
        assert!(filtered.tasks.is_empty());
    }

    #[test]
    fn test_required_tags_with_empty_universe_excluded() {
        let tasks = vec![task(1, &[4], &[])];
        let p = player("p", None, &[]);

        let filtered = filter_available_tasks_for_player(&tasks, &p, &set(&[]), &set(&[]));
        assert!(filtered.tasks.is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let tasks = vec![
            task(3, &[], &[]),
            task(1, &[9], &[]),
            task(2, &[5], &[]),
            task(4, &[], &[]),
        ];
        let p = player("p", None, &[]);

        let filtered = filter_available_tasks_for_player(&tasks, &p, &set(&[5]), &set(&[]));
        assert_eq!(ids(&filtered), vec![3, 2, 4]);
    }

    #[test]
    fn test_cant_have_tags_exclude_held() {
        let mut blocked = task(1, &[2], &[]);
        blocked.cant_have_tags = vec![9];
        let mut open = task(2, &[], &[]);
        open.cant_have_tags = vec![11];
        let tasks = vec![blocked, open];
        let p = player("p", None, &[2, 9]);

        let filtered = filter_by_cant_have_tags(&tasks, &p);
        assert_eq!(ids(&filtered), vec![2]);
    }

    #[test]
    fn test_filters_commute() {
        let mut a = task(1, &[2], &[]);
        a.cant_have_tags = vec![9];
        let b = task(2, &[2], &[]);
        let c = task(3, &[], &[]);
        let tasks = vec![a, b, c];
        let p = player("p", None, &[2, 9]);
        let universe = set(&[2, 9]);

        let tags_first = filter_available_tasks_for_player(&tasks, &p, &universe, &p.tags);
        let tags_then_cant = filter_by_cant_have_tags(tags_first.tasks, &p);

        let cant_first = filter_by_cant_have_tags(&tasks, &p);
        let cant_then_tags =
            filter_available_tasks_for_player(cant_first.tasks, &p, &universe, &p.tags);

        assert_eq!(ids(&tags_then_cant), ids(&cant_then_tags));
        assert_eq!(ids(&tags_then_cant), vec![2, 3]);
    }

    #[test]
    fn test_malformed_required_tags_excluded_with_warning() {
        let mut broken = task(1, &[], &[]);
        broken.malformed = vec![TaskTagField::Tags];
        let tasks = vec![broken, task(2, &[], &[])];
        let p = player("p", None, &[]);

        let filtered = filter_available_tasks_for_player(&tasks, &p, &set(&[]), &set(&[]));
        assert_eq!(ids(&filtered), vec![2]);
        assert_eq!(filtered.warnings.len(), 1);
        assert_eq!(filtered.warnings[0].task_id, 1);
        assert_eq!(filtered.warnings[0].field, TaskTagField::Tags);
    }

    #[test]
    fn test_malformed_removal_list_is_no_directive() {
        let mut broken = task(1, &[], &[]);
        broken.malformed = vec![TaskTagField::TagsToRemove];
        let tasks = vec![broken];
        let p = player("p", None, &[]);

        let filtered = filter_available_tasks_for_player(&tasks, &p, &set(&[]), &set(&[]));
        assert_eq!(ids(&filtered), vec![1]);
        assert_eq!(filtered.warnings[0].field, TaskTagField::TagsToRemove);
    }

    #[test]
    fn test_eligible_tasks_pipeline() {
        let mut spicy = task(1, &[], &[]);
        spicy.spice_rating = 5;
        let mut truth = task(2, &[], &[]);
        truth.task_type = TaskType::Truth;
        let tagged = task(3, &[7], &[]);
        let served_task = task(4, &[], &[]);
        let mut blocked = task(5, &[], &[]);
        blocked.cant_have_tags = vec![8];
        let tasks = vec![spicy, truth, tagged, served_task, blocked];

        let g = game(3, &[]);
        let p = player("p", None, &[7, 8]);
        let served: BTreeSet<TaskId> = [4].into_iter().collect();

        let all = eligible_tasks(&tasks, &g, &p, None, &served);
        assert_eq!(ids(&all), vec![2, 3]);

        let dares = eligible_tasks(&tasks, &g, &p, Some(TaskType::Dare), &served);
        assert_eq!(ids(&dares), vec![3]);
    }

    #[test]
    fn test_universe_includes_player_tags() {
        let g = game(3, &[1, 2]);
        let p = player("p", None, &[2, 6]);
        assert_eq!(available_tag_universe(&g, &p), set(&[1, 2, 6]));
    }
}
