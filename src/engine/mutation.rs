//! Held-tag bookkeeping: tags granted at join and tag changes on completion.

use crate::models::{Gender, Tag, TagSet, Task, TaskTagField};

use super::FilterWarning;

/// Player tag set after completing `task`.
///
/// Removals are applied first, then additions, so a tag listed in both ends
/// up held. The input set is left untouched.
pub fn apply_completion(player_tags: &TagSet, task: &Task) -> TagSet {
    let mut next = player_tags.clone();
    for tag in &task.tags_to_remove {
        next.remove(tag);
    }
    next.extend(task.tags_to_add.iter().copied());
    next
}

/// Warnings for directive lists that were unreadable and therefore skipped.
pub fn completion_warnings(task: &Task) -> Vec<FilterWarning> {
    [TaskTagField::TagsToRemove, TaskTagField::TagsToAdd]
        .into_iter()
        .filter(|field| task.is_malformed(*field))
        .map(|field| FilterWarning::malformed(task, field, "treated as no directive"))
        .collect()
}

/// Tags a player holds when joining a game.
///
/// A tag is granted when it is a default for everyone or a default for the
/// player's gender, and its minimum spice level fits under the game's ceiling.
pub fn initial_tags(catalog: &[Tag], gender: Option<Gender>, max_spice_rating: u8) -> TagSet {
    catalog
        .iter()
        .filter(|tag| tag.min_spice_level <= max_spice_rating)
        .filter(|tag| tag.is_default || tag.default_for_gender.applies_to(gender))
        .map(|tag| tag.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::filter::fixtures::{set, task};
    use crate::models::DefaultGender;

    fn tag(
        id: i64,
        default_for_gender: DefaultGender,
        min_spice_level: u8,
        is_default: bool,
    ) -> Tag {
        Tag {
            id,
            name: format!("tag {}", id),
            group_id: None,
            default_for_gender,
            min_spice_level,
            is_default,
            created_at: String::new(),
            modified_at: String::new(),
            version: 1,
        }
    }

    #[test]
    fn test_remove_then_add() {
        let mut t = task(1, &[], &[2]);
        t.tags_to_add = vec![5];

        let next = apply_completion(&set(&[1, 2]), &t);
        assert_eq!(next, set(&[1, 5]));
    }

    #[test]
    fn test_addition_wins_on_overlap() {
        let mut t = task(1, &[], &[4]);
        t.tags_to_add = vec![4];

        let next = apply_completion(&set(&[]), &t);
        assert!(next.contains(&4));
    }

    #[test]
    fn test_reapplying_is_stable() {
        let mut t = task(1, &[], &[3]);
        t.tags_to_add = vec![7];

        let once = apply_completion(&set(&[3, 8]), &t);
        let twice = apply_completion(&once, &t);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_later_task_wins_across_completions() {
        let mut grant = task(1, &[], &[]);
        grant.tags_to_add = vec![6];
        let revoke = task(2, &[6], &[6]);

        let after_grant = apply_completion(&set(&[]), &grant);
        let after_revoke = apply_completion(&after_grant, &revoke);
        assert!(!after_revoke.contains(&6));

        let regrant = apply_completion(&after_revoke, &grant);
        assert!(regrant.contains(&6));
    }

    #[test]
    fn test_input_set_untouched() {
        let mut t = task(1, &[], &[1]);
        t.tags_to_add = vec![2];
        let before = set(&[1]);

        let _ = apply_completion(&before, &t);
        assert_eq!(before, set(&[1]));
    }

    #[test]
    fn test_completion_warnings_for_malformed_directives() {
        let mut t = task(1, &[], &[]);
        t.malformed = vec![TaskTagField::TagsToAdd, TaskTagField::Tags];

        let warnings = completion_warnings(&t);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, TaskTagField::TagsToAdd);
    }

    #[test]
    fn test_initial_tags_by_gender_and_spice() {
        let catalog = vec![
            tag(1, DefaultGender::Male, 1, false),
            tag(2, DefaultGender::Female, 1, false),
            tag(3, DefaultGender::Both, 1, false),
            tag(4, DefaultGender::None, 1, true),
            tag(5, DefaultGender::Both, 4, false),
            tag(6, DefaultGender::None, 1, false),
        ];

        assert_eq!(initial_tags(&catalog, Some(Gender::Male), 3), set(&[1, 3, 4]));
        assert_eq!(initial_tags(&catalog, Some(Gender::Female), 5), set(&[2, 3, 4, 5]));
        assert_eq!(initial_tags(&catalog, None, 5), set(&[4]));
    }
}
