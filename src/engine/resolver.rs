//! Turn resolution: random task choice and description placeholders.
//!
//! Supported placeholders:
//! - `{someone}`: another active player matching the task's someone rules
//! - `{player_count}`: number of active players
//! - `{player_count/N}`: that count divided by `N`, rounded half up

use std::sync::{Arc, LazyLock};

use regex_lite::{Captures, Regex};

use super::random::{choose, RandomSource};
use super::FilterWarning;
use crate::models::{Player, SomeoneGender, Task, TaskTagField};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(someone|player_count)(?:/(\d+))?\}").expect("valid placeholder regex")
});

/// Description text after placeholder substitution.
#[derive(Debug, Clone)]
pub struct ResolvedText {
    pub text: String,
    pub warnings: Vec<FilterWarning>,
}

/// Picks tasks and fills in their templates.
#[derive(Clone)]
pub struct TurnResolver {
    random: Arc<dyn RandomSource>,
    someone_fallback: String,
}

impl TurnResolver {
    pub fn new(random: Arc<dyn RandomSource>, someone_fallback: impl Into<String>) -> Self {
        Self {
            random,
            someone_fallback: someone_fallback.into(),
        }
    }

    /// Uniform choice among eligible tasks. `None` means nothing is left to offer.
    pub fn pick_task<'a>(&self, eligible: &[&'a Task]) -> Option<&'a Task> {
        choose(self.random.as_ref(), eligible).copied()
    }

    /// Substitute placeholders in the task description.
    ///
    /// `roster` is every player of the game; inactive players and the acting
    /// player are never picked for `{someone}`. Every `{someone}` in one
    /// description names the same player.
    pub fn resolve_description(
        &self,
        task: &Task,
        acting: &Player,
        roster: &[Player],
    ) -> ResolvedText {
        let player_count = roster.iter().filter(|p| p.active).count();
        let mut warnings = Vec::new();
        let mut someone: Option<String> = None;

        let text = PLACEHOLDER.replace_all(&task.description, |caps: &Captures| {
            let token = caps[0].to_string();
            let divisor = caps.get(2).map(|m| m.as_str());

            match (&caps[1], divisor) {
                ("someone", None) => someone
                    .get_or_insert_with(|| {
                        let (candidates, mut found) = someone_candidates(task, acting, roster);
                        warnings.append(&mut found);
                        match choose(self.random.as_ref(), &candidates) {
                            Some(player) => player.name.clone(),
                            None => self.someone_fallback.clone(),
                        }
                    })
                    .clone(),
                ("player_count", None) => player_count.to_string(),
                ("player_count", Some(raw)) => match raw.parse::<usize>() {
                    Ok(n) if n > 0 => divide_round_half_up(player_count, n).to_string(),
                    _ => token,
                },
                _ => token,
            }
        });

        ResolvedText {
            text: text.into_owned(),
            warnings,
        }
    }
}

/// Players eligible to stand in for `{someone}`, in roster order.
///
/// A candidate must be active, not the acting player, hold every
/// `someone_tags` entry, hold none of `someone_cant_have_tags`, and satisfy
/// `someone_gender`. "other" requires a set gender different from the acting
/// player's.
pub fn someone_candidates<'a>(
    task: &Task,
    acting: &Player,
    roster: &'a [Player],
) -> (Vec<&'a Player>, Vec<FilterWarning>) {
    let broken: Vec<FilterWarning> = [
        TaskTagField::SomeoneTags,
        TaskTagField::SomeoneCantHaveTags,
    ]
    .into_iter()
    .filter(|field| task.is_malformed(*field))
    .map(|field| {
        FilterWarning::malformed(task, field, "someone falls back to the default label")
    })
    .collect();
    if !broken.is_empty() {
        return (Vec::new(), broken);
    }

    let candidates = roster
        .iter()
        .filter(|p| p.active && p.id != acting.id)
        .filter(|p| task.someone_tags.iter().all(|tag| p.tags.contains(tag)))
        .filter(|p| !task.someone_cant_have_tags.iter().any(|tag| p.tags.contains(tag)))
        .filter(|p| match task.someone_gender {
            SomeoneGender::Any => true,
            SomeoneGender::Same => p.gender == acting.gender,
            SomeoneGender::Other => p.gender.is_some() && p.gender != acting.gender,
        })
        .collect();

    (candidates, Vec::new())
}

fn divide_round_half_up(count: usize, divisor: usize) -> usize {
    (2 * count + divisor) / (2 * divisor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::filter::fixtures::{player, task};
    use crate::engine::random::SequenceRandom;
    use crate::models::Gender;

    fn resolver(indexes: impl IntoIterator<Item = usize>) -> TurnResolver {
        TurnResolver::new(Arc::new(SequenceRandom::new(indexes)), "someone")
    }

    fn roster() -> Vec<Player> {
        vec![
            player("alice", Some(Gender::Female), &[1]),
            player("bea", Some(Gender::Female), &[1, 2]),
            player("carl", Some(Gender::Male), &[2]),
            player("dana", None, &[1]),
        ]
    }

    fn names(candidates: &[&Player]) -> Vec<String> {
        candidates.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_other_gender_excludes_unset() {
        let players = roster();
        let mut t = task(1, &[], &[]);
        t.someone_gender = SomeoneGender::Other;

        let (candidates, warnings) = someone_candidates(&t, &players[0], &players);
        assert_eq!(names(&candidates), vec!["carl"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_same_gender() {
        let players = roster();
        let mut t = task(1, &[], &[]);
        t.someone_gender = SomeoneGender::Same;

        let (candidates, _) = someone_candidates(&t, &players[0], &players);
        assert_eq!(names(&candidates), vec!["bea"]);
    }

    #[test]
    fn test_someone_tags_require_all() {
        let players = roster();
        let mut t = task(1, &[], &[]);
        t.someone_tags = vec![1, 2];

        let (candidates, _) = someone_candidates(&t, &players[2], &players);
        assert_eq!(names(&candidates), vec!["bea"]);
    }

    #[test]
    fn test_someone_cant_have_tags() {
        let players = roster();
        let mut t = task(1, &[], &[]);
        t.someone_cant_have_tags = vec![2];

        let (candidates, _) = someone_candidates(&t, &players[0], &players);
        assert_eq!(names(&candidates), vec!["dana"]);
    }

    #[test]
    fn test_inactive_players_skipped() {
        let mut players = roster();
        players[2].active = false;
        let t = task(1, &[], &[]);

        let (candidates, _) = someone_candidates(&t, &players[0], &players);
        assert_eq!(names(&candidates), vec!["bea", "dana"]);
    }

    #[test]
    fn test_someone_resolves_to_candidate() {
        let players = roster();
        let mut t = task(1, &[], &[]);
        t.description = "Swap seats with {someone}, then high-five {someone}".to_string();

        let resolved = resolver([1]).resolve_description(&t, &players[0], &players);
        assert_eq!(resolved.text, "Swap seats with carl, then high-five carl");
    }

    #[test]
    fn test_someone_fallback_when_no_candidate() {
        let players = roster();
        let mut t = task(1, &[], &[]);
        t.someone_tags = vec![99];
        t.description = "Compliment {someone}".to_string();

        let resolved = resolver([]).resolve_description(&t, &players[0], &players);
        assert_eq!(resolved.text, "Compliment someone");
    }

    #[test]
    fn test_malformed_someone_tags_fall_back_with_warning() {
        let players = roster();
        let mut t = task(1, &[], &[]);
        t.malformed = vec![TaskTagField::SomeoneTags];
        t.description = "Wink at {someone}".to_string();

        let resolved = resolver([]).resolve_description(&t, &players[0], &players);
        assert_eq!(resolved.text, "Wink at someone");
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[test]
    fn test_player_count_placeholders() {
        let mut players = roster();
        players.push(player("erin", None, &[]));
        let mut t = task(1, &[], &[]);
        t.description = [
            "{player_count} in",
            "{player_count/2} teams",
            "{player_count/3} each",
            "{player_count/0}",
        ]
        .join(", ");

        let resolved = resolver([]).resolve_description(&t, &players[0], &players);
        assert_eq!(resolved.text, "5 in, 3 teams, 2 each, {player_count/0}");
    }

    #[test]
    fn test_player_count_ignores_inactive_players() {
        let mut players = roster();
        players.push(player("erin", None, &[]));
        players[1].active = false;
        players[4].active = false;
        let mut t = task(1, &[], &[]);
        t.description = "{player_count} left, pairs of {player_count/2}".to_string();

        let resolved = resolver([]).resolve_description(&t, &players[0], &players);
        assert_eq!(resolved.text, "3 left, pairs of 2");
    }

    #[test]
    fn test_unknown_braces_untouched() {
        let players = roster();
        let mut t = task(1, &[], &[]);
        t.description = "Say {something} to {someone/2}".to_string();

        let resolved = resolver([]).resolve_description(&t, &players[0], &players);
        assert_eq!(resolved.text, "Say {something} to {someone/2}");
    }

    #[test]
    fn test_resolution_leaves_records_untouched() {
        let players = roster();
        let mut t = task(1, &[], &[]);
        t.description = "Dance with {someone}".to_string();
        let before = t.description.clone();

        let _ = resolver([0]).resolve_description(&t, &players[0], &players);
        assert_eq!(t.description, before);
        assert_eq!(players[1].tags.len(), 2);
    }

    #[test]
    fn test_pick_task_uniform_index() {
        let a = task(1, &[], &[]);
        let b = task(2, &[], &[]);
        let eligible = vec![&a, &b];

        assert_eq!(resolver([1]).pick_task(&eligible).map(|t| t.id), Some(2));
        assert!(resolver([0]).pick_task(&[]).is_none());
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(divide_round_half_up(5, 2), 3);
        assert_eq!(divide_round_half_up(4, 3), 1);
        assert_eq!(divide_round_half_up(7, 2), 4);
        assert_eq!(divide_round_half_up(6, 4), 2);
        assert_eq!(divide_round_half_up(1, 4), 0);
    }
}
