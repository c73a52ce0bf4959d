//! Injectable randomness for task choice, someone choice and join codes.

use rand::Rng;

/// Source of uniform random indexes.
pub trait RandomSource: Send + Sync {
    /// Returns an index in `0..len`. `len` is never zero.
    fn pick_index(&self, len: usize) -> usize;
}

/// Thread-local RNG backed source.
pub struct ThreadRandom;

impl ThreadRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ThreadRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ThreadRandom {
    fn pick_index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Pick one element uniformly, or `None` for an empty slice.
pub fn choose<'a, T>(random: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    let index = random.pick_index(items.len()).min(items.len() - 1);
    items.get(index)
}

/// Scripted source for tests. Replays the given indexes in order (wrapped to
/// `len`), then keeps returning 0.
#[cfg(test)]
pub struct SequenceRandom(std::sync::Mutex<std::collections::VecDeque<usize>>);

#[cfg(test)]
impl SequenceRandom {
    pub fn new(indexes: impl IntoIterator<Item = usize>) -> Self {
        Self(std::sync::Mutex::new(indexes.into_iter().collect()))
    }
}

#[cfg(test)]
impl RandomSource for SequenceRandom {
    fn pick_index(&self, len: usize) -> usize {
        let next = self.0.lock().unwrap().pop_front().unwrap_or(0);
        next % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_empty_is_none() {
        let random = ThreadRandom::new();
        let empty: [u8; 0] = [];
        assert!(choose(&random, &empty).is_none());
    }

    #[test]
    fn test_thread_random_stays_in_range() {
        let random = ThreadRandom::new();
        for _ in 0..200 {
            assert!(random.pick_index(3) < 3);
        }
    }

    #[test]
    fn test_sequence_random_replays_then_defaults() {
        let random = SequenceRandom::new([2, 5]);
        let items = ["a", "b", "c"];
        assert_eq!(choose(&random, &items), Some(&"c"));
        assert_eq!(choose(&random, &items), Some(&"c"));
        assert_eq!(choose(&random, &items), Some(&"a"));
    }
}
