//! # Item Queue
//!
//! Ordered playlist with a play mode and a current position.
//!
//! The queue keeps its items in insertion order and walks them through a
//! separate play order: the identity permutation for `Normal`, `RepeatOne`
//! and `RepeatAll`, a random permutation for `Shuffle`. The cursor indexes
//! the play order, so switching modes never moves items around.
//!
//! `next()`/`previous()` return `None` when the mode has no further item;
//! they never panic, including on an empty queue.
//!
//! Removing the current item detaches the cursor: there is no current item
//! until the next step, and the cursor stays where the removed item was so
//! `next()` lands on its follower and `previous()` on its predecessor.

use crate::config::PlayMode;
use crate::item::PlayableItem;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub struct ItemQueue {
    items: Vec<PlayableItem>,
    mode: PlayMode,
    /// Permutation of item indices in play order.
    order: Vec<usize>,
    /// Position of the current item within `order`.
    cursor: Option<usize>,
    /// The current item was removed; `cursor` is the position its follower
    /// now occupies and may equal `order.len()`.
    detached: bool,
    rng: StdRng,
}

impl std::fmt::Debug for ItemQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemQueue")
            .field("len", &self.items.len())
            .field("mode", &self.mode)
            .field("current_index", &self.current_index())
            .finish()
    }
}

impl Default for ItemQueue {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl ItemQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue with a fixed shuffle seed; shuffle order becomes reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            items: Vec::new(),
            mode: PlayMode::Normal,
            order: Vec::new(),
            cursor: None,
            detached: false,
            rng,
        }
    }

    /// Replace the contents and make `start` the current item.
    ///
    /// Returns the new current item, or `None` when `items` is empty.
    pub fn replace(
        &mut self,
        items: Vec<PlayableItem>,
        mode: PlayMode,
        start: usize,
    ) -> Option<&PlayableItem> {
        self.items = items;
        self.mode = mode;
        if self.items.is_empty() {
            self.clear();
            return None;
        }

        let start = start.min(self.items.len() - 1);
        self.rebuild_order(Some(start));
        self.current()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.cursor = None;
        self.detached = false;
    }

    pub fn items(&self) -> &[PlayableItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    /// Index of the current item in insertion order.
    pub fn current_index(&self) -> Option<usize> {
        if self.detached {
            return None;
        }
        self.cursor.map(|cursor| self.order[cursor])
    }

    pub fn current(&self) -> Option<&PlayableItem> {
        self.current_index().map(|index| &self.items[index])
    }

    /// Mutable access to the queued copy of an item.
    pub fn find_mut(&mut self, id: &crate::item::ItemId) -> Option<&mut PlayableItem> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    /// Switch play mode.
    ///
    /// Entering `Shuffle` draws a fresh order that starts with the current
    /// item; leaving it restores insertion order around the current item.
    pub fn set_mode(&mut self, mode: PlayMode) {
        if self.mode == mode {
            return;
        }
        let was_shuffled = self.mode == PlayMode::Shuffle;
        self.mode = mode;
        if was_shuffled || mode == PlayMode::Shuffle {
            let current = self.current_index();
            self.rebuild_order(current);
        }
    }

    pub fn add_item(&mut self, item: PlayableItem) {
        self.add_items(vec![item]);
    }

    /// Append items.
    ///
    /// In shuffle mode new items land at random positions among the items
    /// not yet played in this round.
    pub fn add_items(&mut self, items: Vec<PlayableItem>) {
        for item in items {
            let index = self.items.len();
            self.items.push(item);
            if self.mode == PlayMode::Shuffle {
                let earliest = match self.cursor {
                    Some(cursor) if self.detached => cursor,
                    Some(cursor) => cursor + 1,
                    None => 0,
                };
                let at = self.rng.gen_range(earliest..=self.order.len());
                self.order.insert(at, index);
            } else {
                self.order.push(index);
            }
        }
    }

    /// Remove the item at `index` (insertion order).
    ///
    /// Removing the current item leaves the queue without a current item;
    /// `next()` then returns the item that followed it and `previous()` the
    /// one before it.
    pub fn remove_item(&mut self, index: usize) -> Option<PlayableItem> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);

        if let Some(position) = self.order.iter().position(|&i| i == index) {
            self.order.remove(position);
            if let Some(cursor) = self.cursor {
                if position < cursor {
                    self.cursor = Some(cursor - 1);
                } else if position == cursor {
                    self.detached = true;
                }
            }
            if self.order.is_empty() {
                self.cursor = None;
                self.detached = false;
            }
        }
        for entry in self.order.iter_mut() {
            if *entry > index {
                *entry -= 1;
            }
        }

        Some(removed)
    }

    pub fn has_next(&self) -> bool {
        if self.items.is_empty() {
            return false;
        }
        match self.mode {
            PlayMode::Normal => self.next_position().is_some(),
            PlayMode::RepeatOne | PlayMode::RepeatAll | PlayMode::Shuffle => true,
        }
    }

    pub fn has_previous(&self) -> bool {
        if self.items.is_empty() {
            return false;
        }
        match self.mode {
            PlayMode::Normal => self.cursor.map_or(false, |cursor| cursor > 0),
            PlayMode::RepeatOne | PlayMode::RepeatAll | PlayMode::Shuffle => true,
        }
    }

    /// Advance per the play mode.
    pub fn next(&mut self) -> Option<&PlayableItem> {
        if self.items.is_empty() {
            return None;
        }

        let cursor = match self.mode {
            PlayMode::RepeatOne if self.detached => self.next_position().unwrap_or(0),
            PlayMode::RepeatOne => self.cursor.unwrap_or(0),
            PlayMode::Normal => self.next_position()?,
            PlayMode::RepeatAll => self.next_position().unwrap_or(0),
            PlayMode::Shuffle => match self.next_position() {
                Some(next) => next,
                None => {
                    self.reshuffle();
                    0
                }
            },
        };

        self.move_to(cursor)
    }

    /// Step back per the play mode.
    pub fn previous(&mut self) -> Option<&PlayableItem> {
        if self.items.is_empty() {
            return None;
        }

        let last = self.order.len() - 1;
        let cursor = match (self.mode, self.cursor) {
            (PlayMode::RepeatOne, Some(cursor)) if !self.detached => cursor,
            (PlayMode::RepeatOne, None) => 0,
            (PlayMode::Normal, Some(cursor)) if cursor > 0 => cursor - 1,
            (PlayMode::Normal, _) => return None,
            (_, Some(cursor)) if cursor > 0 => cursor - 1,
            (_, _) => last,
        };

        self.move_to(cursor)
    }

    fn move_to(&mut self, cursor: usize) -> Option<&PlayableItem> {
        self.cursor = Some(cursor);
        self.detached = false;
        self.current()
    }

    fn next_position(&self) -> Option<usize> {
        match self.cursor {
            None => Some(0),
            Some(cursor) if self.detached => (cursor < self.order.len()).then_some(cursor),
            Some(cursor) if cursor + 1 < self.order.len() => Some(cursor + 1),
            Some(_) => None,
        }
    }

    fn rebuild_order(&mut self, current: Option<usize>) {
        self.detached = false;
        self.order = (0..self.items.len()).collect();
        if self.mode == PlayMode::Shuffle {
            self.order.shuffle(&mut self.rng);
            if let Some(current) = current {
                if let Some(position) = self.order.iter().position(|&i| i == current) {
                    self.order.swap(0, position);
                }
            }
            self.cursor = current.map(|_| 0);
        } else {
            self.cursor = current;
        }
    }

    /// New round of shuffle; the item that just played never comes first.
    fn reshuffle(&mut self) {
        let just_played = self.current_index();
        self.order.shuffle(&mut self.rng);
        if self.order.len() > 1 && self.order.first().copied() == just_played {
            let swap_with = self.rng.gen_range(1..self.order.len());
            self.order.swap(0, swap_with);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn items(n: usize) -> Vec<PlayableItem> {
        (0..n)
            .map(|i| PlayableItem::new(format!("item-{}", i), format!("https://x/{}.mp3", i)))
            .collect()
    }

    fn current_id(queue: &ItemQueue) -> Option<String> {
        queue.current().map(|item| item.id.to_string())
    }

    #[test]
    fn test_empty_queue_never_panics() {
        let mut queue = ItemQueue::with_seed(1);
        assert!(queue.next().is_none());
        assert!(queue.previous().is_none());
        assert!(queue.current().is_none());
        assert!(!queue.has_next());
        assert!(queue.replace(Vec::new(), PlayMode::RepeatAll, 0).is_none());
        assert!(queue.remove_item(0).is_none());
    }

    #[test]
    fn test_normal_mode_stops_at_boundaries() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(2), PlayMode::Normal, 0);

        assert!(!queue.has_previous());
        assert!(queue.previous().is_none());
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-1".into()));
        assert!(!queue.has_next());
        assert!(queue.next().is_none());
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_repeat_all_wraps_both_ways() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(3), PlayMode::RepeatAll, 0);

        assert_eq!(queue.previous().map(|i| i.id.to_string()), Some("item-2".into()));
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-0".into()));
    }

    #[test]
    fn test_repeat_all_single_item_wraps_to_itself() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(1), PlayMode::RepeatAll, 0);
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-0".into()));
    }

    #[test]
    fn test_repeat_one_replays() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(3), PlayMode::RepeatOne, 1);
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-1".into()));
        assert_eq!(queue.previous().map(|i| i.id.to_string()), Some("item-1".into()));
    }

    #[test]
    fn test_shuffle_visits_every_item_once_per_round() {
        let mut queue = ItemQueue::with_seed(7);
        queue.replace(items(5), PlayMode::Shuffle, 2);
        assert_eq!(current_id(&queue), Some("item-2".into()));

        let mut seen = HashSet::new();
        seen.insert(queue.current_index().unwrap());
        for _ in 0..4 {
            queue.next();
            seen.insert(queue.current_index().unwrap());
        }
        assert_eq!(seen.len(), 5);

        let last = queue.current_index();
        queue.next();
        assert_ne!(queue.current_index(), last);
    }

    #[test]
    fn test_switch_into_shuffle_keeps_current_first() {
        let mut queue = ItemQueue::with_seed(3);
        queue.replace(items(4), PlayMode::Normal, 2);
        queue.set_mode(PlayMode::Shuffle);
        assert_eq!(queue.current_index(), Some(2));

        queue.set_mode(PlayMode::Normal);
        assert_eq!(queue.current_index(), Some(2));
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-3".into()));
    }

    #[test]
    fn test_remove_before_current_shifts_index() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(3), PlayMode::Normal, 2);
        let removed = queue.remove_item(0).unwrap();
        assert_eq!(removed.id.as_str(), "item-0");
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(current_id(&queue), Some("item-2".into()));
    }

    #[test]
    fn test_remove_current_next_yields_follower() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(3), PlayMode::Normal, 1);
        queue.remove_item(1);
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-2".into()));

        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(2), PlayMode::Normal, 0);
        queue.remove_item(0);
        assert!(queue.current().is_none());
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-1".into()));
    }

    #[test]
    fn test_remove_current_previous_yields_predecessor() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(3), PlayMode::Normal, 2);
        queue.remove_item(2);

        assert!(queue.current().is_none());
        assert_eq!(queue.current_index(), None);
        assert!(!queue.has_next());
        assert!(queue.has_previous());
        assert_eq!(queue.previous().map(|i| i.id.to_string()), Some("item-1".into()));
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_remove_current_under_repeat_one_moves_to_follower() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(3), PlayMode::RepeatOne, 1);
        queue.remove_item(1);
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-2".into()));
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-2".into()));

        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(3), PlayMode::RepeatOne, 2);
        queue.remove_item(2);
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-0".into()));
    }

    #[test]
    fn test_removals_around_detached_cursor() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(5), PlayMode::Normal, 2);
        queue.remove_item(2);
        // Drop the follower, then something before the gap.
        queue.remove_item(2);
        queue.remove_item(0);

        assert!(queue.current().is_none());
        assert_eq!(queue.next().map(|i| i.id.to_string()), Some("item-4".into()));
        assert_eq!(queue.previous().map(|i| i.id.to_string()), Some("item-1".into()));
    }

    #[test]
    fn test_removing_last_item_empties_queue() {
        let mut queue = ItemQueue::with_seed(1);
        queue.replace(items(1), PlayMode::RepeatAll, 0);
        queue.remove_item(0);

        assert!(queue.is_empty());
        assert!(queue.next().is_none());
        assert!(queue.previous().is_none());
    }

    #[test]
    fn test_add_items_in_shuffle_stay_unplayed() {
        let mut queue = ItemQueue::with_seed(11);
        queue.replace(items(2), PlayMode::Shuffle, 0);
        queue.add_items(items(3).into_iter().skip(2).collect());

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.current_index(), Some(0));
        let mut rest = HashSet::new();
        while queue.has_next() && rest.len() < 2 {
            queue.next();
            rest.insert(queue.current_index().unwrap());
        }
        assert_eq!(rest, HashSet::from([1, 2]));
    }
}
