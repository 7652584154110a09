// SPDX-License-Identifier: MIT OR Apache-2.0
//! Master index tables.
//!
//! A master table maps stable [`Id`]s to the live nodes or graphs of a
//! director. Slots are reused through a singly linked free list threaded
//! through the empty slots, so insert, remove and indexed lookup are O(1).

use crate::id::Id;

/// An item that can be stored in a [`MasterTable`]
pub trait TableEntry {
    /// The item's identity
    fn entry_id(&self) -> &Id;

    /// Mutable access to the identity, used to keep the index hint current
    fn entry_id_mut(&mut self) -> &mut Id;
}

#[derive(Debug, Clone)]
struct Slot<T> {
    item: Option<T>,
    /// Next free slot; only meaningful while `item` is `None`
    next: Option<usize>,
}

impl<T> Slot<T> {
    fn free(next: Option<usize>) -> Self {
        Self { item: None, next }
    }
}

/// Free-list backed dense table of owned items
#[derive(Debug, Clone)]
pub struct MasterTable<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<usize>,
}

impl<T: TableEntry> MasterTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
        }
    }

    /// Insert an item and return the slot it landed in.
    ///
    /// Without an explicit index the head of the free list is reused, or a
    /// slot is appended. With an explicit index any occupant is relocated
    /// first, then the slot is spliced out of the free list. That splice is
    /// a walk of the list; explicit placement is only used when restoring
    /// saved IDs.
    pub fn add(&mut self, mut item: T, index: Option<usize>) -> usize {
        if let Some(index) = index {
            return self.add_at(item, index);
        }

        let index = match self.free_head {
            Some(free) => {
                self.free_head = self.slots[free].next.take();
                free
            }
            None => {
                self.slots.push(Slot::free(None));
                self.slots.len() - 1
            }
        };

        item.entry_id_mut().index = Some(index);
        self.slots[index].item = Some(item);
        index
    }

    fn add_at(&mut self, mut item: T, index: usize) -> usize {
        while index >= self.slots.len() {
            let appended = self.slots.len();
            self.slots.push(Slot::free(self.free_head));
            self.free_head = Some(appended);
        }

        if self.slots[index].item.is_some() {
            let move_to = self.free_head.unwrap_or(self.slots.len());
            if let Some(occupant) = self.take_slot(index) {
                self.add_at(occupant, move_to);
            }
        }

        self.unlink_free(index);
        item.entry_id_mut().index = Some(index);
        self.slots[index].item = Some(item);
        index
    }

    /// Remove the item `id` refers to.
    ///
    /// The index hint must point at a slot holding exactly this identity;
    /// otherwise nothing happens and `None` is returned.
    pub fn remove(&mut self, id: &Id) -> Option<T> {
        let index = id.index?;
        let held = self.slots.get(index)?.item.as_ref()?;
        if held.entry_id().uid != id.uid {
            return None;
        }
        self.take_slot(index)
    }

    /// Look up an item by identity
    pub fn get(&self, id: &Id) -> Option<&T> {
        let index = self.position(id)?;
        self.slots[index].item.as_ref()
    }

    /// Look up an item by identity, mutably
    pub fn get_mut(&mut self, id: &Id) -> Option<&mut T> {
        let index = self.position(id)?;
        self.slots[index].item.as_mut()
    }

    /// Resolve the slot holding `id`.
    ///
    /// The index hint is tried first. A stale or missing hint falls back to
    /// a scan by identity.
    pub fn position(&self, id: &Id) -> Option<usize> {
        if let Some(index) = id.index {
            if let Some(Slot { item: Some(item), .. }) = self.slots.get(index) {
                if item.entry_id().uid == id.uid {
                    return Some(index);
                }
            }
        }

        self.slots.iter().position(|slot| {
            slot.item
                .as_ref()
                .is_some_and(|item| item.entry_id().uid == id.uid)
        })
    }

    /// Check whether an item with this identity is live
    pub fn contains(&self, id: &Id) -> bool {
        self.position(id).is_some()
    }

    /// Move live items from the end into the earliest free slots and drop
    /// the trailing free region. Returns the `(from, to)` relocations.
    pub fn compact(&mut self) -> Vec<(usize, usize)> {
        let mut moves = Vec::new();
        let mut last = self.slots.len();
        let mut index = 0;

        while index < last {
            if self.slots[index].item.is_none() {
                while last > index + 1 && self.slots[last - 1].item.is_none() {
                    last -= 1;
                }
                if last <= index + 1 {
                    break;
                }

                last -= 1;
                if let Some(item) = self.take_slot(last) {
                    self.add_at(item, index);
                    moves.push((last, index));
                }
            }
            index += 1;
        }

        while self.slots.last().is_some_and(|slot| slot.item.is_none()) {
            self.slots.pop();
        }
        self.rebuild_free_list();
        moves
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.item.is_some()).count()
    }

    /// Check if the table holds no live items
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.item.is_none())
    }

    /// Number of slots, live or free
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Free slot indices in free-list order
    pub fn free_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        let mut cursor = self.free_head;
        while let Some(index) = cursor {
            // A cycle would be a broken invariant; stop rather than spin.
            if indices.len() > self.slots.len() {
                tracing::error!("Master table free list contains a cycle");
                break;
            }
            indices.push(index);
            cursor = self.slots.get(index).and_then(|slot| slot.next);
        }
        indices
    }

    /// Iterate over live items
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.item.as_ref())
    }

    /// Iterate over live items mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| slot.item.as_mut())
    }

    /// Remove every item
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
    }

    fn take_slot(&mut self, index: usize) -> Option<T> {
        let mut item = self.slots.get_mut(index)?.item.take()?;
        self.slots[index].next = self.free_head;
        self.free_head = Some(index);
        item.entry_id_mut().index = None;
        Some(item)
    }

    fn unlink_free(&mut self, index: usize) -> bool {
        let mut previous: Option<usize> = None;
        let mut cursor = self.free_head;

        while let Some(current) = cursor {
            if current == index {
                let next = self.slots[current].next.take();
                match previous {
                    Some(previous) => self.slots[previous].next = next,
                    None => self.free_head = next,
                }
                return true;
            }
            previous = Some(current);
            cursor = self.slots[current].next;
        }
        false
    }

    fn rebuild_free_list(&mut self) {
        self.free_head = None;
        for index in (0..self.slots.len()).rev() {
            if self.slots[index].item.is_none() {
                self.slots[index].next = self.free_head;
                self.free_head = Some(index);
            } else {
                self.slots[index].next = None;
            }
        }
    }
}

impl<T: TableEntry> Default for MasterTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug)]
    struct Item {
        id: Id,
    }

    impl Item {
        fn new() -> Self {
            Self { id: Id::new() }
        }
    }

    impl TableEntry for Item {
        fn entry_id(&self) -> &Id {
            &self.id
        }

        fn entry_id_mut(&mut self) -> &mut Id {
            &mut self.id
        }
    }

    fn live_ids(table: &MasterTable<Item>) -> Vec<Id> {
        table.iter().map(|item| item.id).collect()
    }

    fn assert_sound(table: &MasterTable<Item>) {
        let mut seen = HashSet::new();
        for item in table.iter() {
            let index = item.id.index.expect("live items are indexed");
            assert!(seen.insert(index), "two live items share slot {index}");
            let found = table.get(&item.id).expect("live item resolves");
            assert_eq!(found.id.index, Some(index));
        }

        let free = table.free_indices();
        let free_set: HashSet<_> = free.iter().copied().collect();
        assert_eq!(free.len(), free_set.len(), "free list has duplicates");
        for index in 0..table.slot_count() {
            assert_eq!(
                free_set.contains(&index),
                !seen.contains(&index),
                "slot {index} free-list membership is wrong"
            );
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let mut table = MasterTable::new();
        let a = table.add(Item::new(), None);
        let b = table.add(Item::new(), None);
        assert_eq!((a, b), (0, 1));
        assert_eq!(table.len(), 2);
        assert_sound(&table);
    }

    #[test]
    fn test_remove_reuses_slot() {
        let mut table = MasterTable::new();
        table.add(Item::new(), None);
        table.add(Item::new(), None);
        let ids = live_ids(&table);

        let removed = table.remove(&ids[0]).expect("item removed");
        assert_eq!(removed.id.index, None);
        assert_eq!(table.free_indices(), vec![0]);

        let index = table.add(Item::new(), None);
        assert_eq!(index, 0);
        assert!(table.free_indices().is_empty());
        assert_sound(&table);
    }

    #[test]
    fn test_remove_rejects_stale_index() {
        let mut table = MasterTable::new();
        table.add(Item::new(), None);
        let other = table.add(Item::new(), None);
        let mut stale = live_ids(&table)[0];
        stale.index = Some(other);

        assert!(table.remove(&stale).is_none());
        assert_eq!(table.len(), 2);
        assert!(table.remove(&Id::new()).is_none());
    }

    #[test]
    fn test_lookup_falls_back_to_scan() {
        let mut table = MasterTable::new();
        table.add(Item::new(), None);
        table.add(Item::new(), None);
        let target = live_ids(&table)[1];

        let mut stale = target;
        stale.index = Some(0);
        assert_eq!(table.get(&stale).map(|item| item.id.index), Some(Some(1)));
        assert_eq!(table.position(&target.unindexed()), Some(1));
    }

    #[test]
    fn test_explicit_index_relocates_occupant() {
        let mut table = MasterTable::new();
        table.add(Item::new(), None);
        let occupant = live_ids(&table)[0];

        let placed = table.add(Item::new(), Some(0));
        assert_eq!(placed, 0);
        let moved = table.get(&occupant.unindexed()).expect("occupant survives");
        assert_eq!(moved.id.index, Some(1));
        assert_sound(&table);
    }

    #[test]
    fn test_explicit_index_grows_table() {
        let mut table = MasterTable::new();
        table.add(Item::new(), Some(4));
        assert_eq!(table.slot_count(), 5);
        assert_eq!(table.len(), 1);
        assert_sound(&table);

        // Free slots below the explicit index are handed out again.
        let next = table.add(Item::new(), None);
        assert!(next < 4);
        assert_sound(&table);
    }

    #[test]
    fn test_compact() {
        let mut table = MasterTable::new();
        for _ in 0..6 {
            table.add(Item::new(), None);
        }
        let ids = live_ids(&table);
        table.remove(&ids[0]);
        table.remove(&ids[2]);
        table.remove(&ids[5]);

        let moves = table.compact();
        assert_eq!(moves, vec![(4, 0), (3, 2)]);
        assert_eq!(table.slot_count(), 3);
        assert!(table.free_indices().is_empty());
        assert_sound(&table);
    }

    #[test]
    fn test_random_sequence_keeps_invariants() {
        let mut table = MasterTable::new();
        let mut live: Vec<Id> = Vec::new();
        let mut seed: u32 = 0x2545_f491;

        for step in 0..400 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let roll = (seed >> 16) % 10;

            if roll < 5 || live.is_empty() {
                let explicit = (roll == 0).then_some((seed as usize >> 8) % 24);
                table.add(Item::new(), explicit);
            } else {
                let victim = (seed as usize >> 4) % live.len();
                let id = live[victim];
                let current = table.get(&id).map(|item| item.id).expect("tracked item is live");
                assert!(table.remove(&current).is_some(), "step {step}: remove failed");
            }

            live = live_ids(&table);
            assert_sound(&table);
        }
    }
}
