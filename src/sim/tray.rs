//! Fixed-capacity slot container with the 3-match rule and compaction
//!
//! Slots fill leftmost-free. A slot may also be *reserved* by a block still in
//! flight; reservations live in the transit set and are passed in where they
//! matter, so the tray itself only ever holds committed entities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity::{Category, Entity, EntityId};
use crate::error::EngineFault;

/// Ordered slots, each empty or holding one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tray {
    slots: Vec<Option<Entity>>,
}

impl Tray {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<Entity>] {
        &self.slots
    }

    pub fn get(&self, slot: usize) -> Option<&Entity> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Number of occupied slots
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Leftmost slot that is empty and not reserved
    pub fn first_free_slot(&self, reserved: &[usize]) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .find(|(i, s)| s.is_none() && !reserved.contains(i))
            .map(|(i, _)| i)
    }

    /// Place a landed entity into its reserved slot and mark it idle
    pub fn commit(&mut self, slot: usize, mut entity: Entity) -> Result<(), EngineFault> {
        let capacity = self.capacity();
        let cell = self
            .slots
            .get_mut(slot)
            .ok_or(EngineFault::SlotOutOfRange { slot, capacity })?;
        if let Some(occupant) = cell {
            return Err(EngineFault::SlotOccupied {
                slot,
                occupant: occupant.id,
                entity: entity.id,
            });
        }
        entity.land();
        *cell = Some(entity);
        Ok(())
    }

    /// Entities to clear: for every category with at least `threshold` idle
    /// entities, the leftmost `threshold` of them. Returned in slot order.
    pub fn detect_matches(&self, threshold: usize) -> Vec<EntityId> {
        if threshold == 0 {
            return Vec::new();
        }

        let mut by_category: BTreeMap<Category, Vec<(usize, EntityId)>> = BTreeMap::new();
        for (slot, entity) in self.slots.iter().enumerate() {
            if let Some(entity) = entity.as_ref().filter(|e| e.is_idle()) {
                by_category
                    .entry(entity.category)
                    .or_default()
                    .push((slot, entity.id));
            }
        }

        let mut matched: Vec<(usize, EntityId)> = by_category
            .into_values()
            .filter(|hits| hits.len() >= threshold)
            .flat_map(|hits| hits.into_iter().take(threshold))
            .collect();
        matched.sort_by_key(|(slot, _)| *slot);
        matched.into_iter().map(|(_, id)| id).collect()
    }

    /// Flag matched entities for removal. Returns how many changed status.
    pub fn mark_removing(&mut self, ids: &[EntityId]) -> usize {
        self.slots
            .iter_mut()
            .flatten()
            .filter(|e| ids.contains(&e.id))
            .map(|e| e.mark_removing())
            .filter(|changed| *changed)
            .count()
    }

    /// Drop every removing entity and repack survivors leftmost, keeping their order
    pub fn compact(&mut self) -> Vec<Entity> {
        let ids: Vec<EntityId> = self
            .slots
            .iter()
            .flatten()
            .filter(|e| e.is_removing())
            .map(|e| e.id)
            .collect();
        self.compact_around(&ids, &[])
    }

    /// Drop the removing entities in `ids` and repack the rest leftmost.
    /// Survivors skip `reserved` slots so blocks still in flight land where
    /// they were sent. Entities of a later match keep their slots until their
    /// own grace period ends.
    pub fn compact_around(&mut self, ids: &[EntityId], reserved: &[usize]) -> Vec<Entity> {
        let expired = |e: &Entity| e.is_removing() && ids.contains(&e.id);
        if !self.slots.iter().flatten().any(|e| expired(e)) {
            return Vec::new();
        }

        let capacity = self.capacity();
        let (removed, survivors): (Vec<_>, Vec<_>) = std::mem::take(&mut self.slots)
            .into_iter()
            .flatten()
            .partition(|e| expired(e));

        // Reserved slots are always empty, so survivors fit in the rest
        let mut slots = vec![None; capacity];
        let open = (0..capacity).filter(|i| !reserved.contains(i));
        for (slot, entity) in open.zip(survivors) {
            slots[slot] = Some(entity);
        }
        self.slots = slots;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn block(id: u32, category: Category) -> Entity {
        Entity::spawn(EntityId(id), category)
    }

    fn tray_of(capacity: usize, categories: &[Option<Category>]) -> Tray {
        let mut tray = Tray::new(capacity);
        for (slot, category) in categories.iter().enumerate() {
            if let Some(category) = category {
                tray.commit(slot, block(slot as u32 + 1, *category)).unwrap();
            }
        }
        tray
    }

    fn categories(tray: &Tray) -> Vec<Option<Category>> {
        tray.slots()
            .iter()
            .map(|s| s.as_ref().map(|e| e.category))
            .collect()
    }

    use Category::*;

    #[test]
    fn test_first_free_slot_is_leftmost() {
        let tray = tray_of(5, &[Some(Blue), None, Some(Green), None, None]);
        assert_eq!(tray.first_free_slot(&[]), Some(1));
        assert_eq!(tray.first_free_slot(&[1]), Some(3));
        assert_eq!(tray.first_free_slot(&[1, 3, 4]), None);
    }

    #[test]
    fn test_commit_marks_idle() {
        let mut tray = Tray::new(3);
        tray.commit(1, block(9, Orange)).unwrap();
        assert!(tray.get(1).unwrap().is_idle());
        assert_eq!(tray.occupied(), 1);
    }

    #[test]
    fn test_commit_into_occupied_slot_faults() {
        let mut tray = Tray::new(3);
        tray.commit(0, block(1, Blue)).unwrap();

        let err = tray.commit(0, block(2, Green)).unwrap_err();
        assert_eq!(
            err,
            EngineFault::SlotOccupied {
                slot: 0,
                occupant: EntityId(1),
                entity: EntityId(2),
            }
        );
        assert_eq!(tray.get(0).unwrap().category, Blue);

        let err = tray.commit(3, block(3, Green)).unwrap_err();
        assert_eq!(err, EngineFault::SlotOutOfRange { slot: 3, capacity: 3 });
    }

    #[test]
    fn test_detect_matches_takes_leftmost_three() {
        let tray = tray_of(
            7,
            &[Some(Yellow), Some(Blue), Some(Yellow), Some(Yellow), Some(Yellow)],
        );
        assert_eq!(
            tray.detect_matches(3),
            vec![EntityId(1), EntityId(3), EntityId(4)]
        );
    }

    #[test]
    fn test_detect_matches_unions_categories() {
        let tray = tray_of(
            7,
            &[
                Some(Blue),
                Some(Yellow),
                Some(Blue),
                Some(Yellow),
                Some(Blue),
                Some(Yellow),
            ],
        );
        let ids = tray.detect_matches(3);
        assert_eq!(ids.len(), 6);
        assert_eq!(ids[0], EntityId(1));
    }

    #[test]
    fn test_detect_matches_ignores_removing() {
        let mut tray = tray_of(7, &[Some(Green), Some(Green), Some(Green), Some(Green)]);
        let first = tray.detect_matches(3);
        assert_eq!(tray.mark_removing(&first), 3);

        // One idle green left - no second match
        assert!(tray.detect_matches(3).is_empty());
        // Marking again is a no-op
        assert_eq!(tray.mark_removing(&first), 0);
    }

    #[test]
    fn test_compact_preserves_order() {
        let mut tray = tray_of(
            7,
            &[Some(Yellow), Some(Blue), Some(Yellow), Some(Green), Some(Yellow)],
        );
        let ids = tray.detect_matches(3);
        tray.mark_removing(&ids);

        let removed = tray.compact();
        assert_eq!(removed.len(), 3);
        assert_eq!(
            categories(&tray),
            vec![Some(Blue), Some(Green), None, None, None, None, None]
        );
    }

    #[test]
    fn test_compact_without_removals_is_noop() {
        let mut tray = tray_of(4, &[None, Some(Blue), None, Some(Green)]);
        let before = tray.clone();
        assert!(tray.compact().is_empty());
        assert_eq!(tray, before);
    }

    #[test]
    fn test_compact_around_skips_reserved() {
        // Slot 1 is reserved by a block in flight
        let mut tray = tray_of(
            7,
            &[
                Some(Blue),
                None,
                Some(Yellow),
                Some(Yellow),
                Some(Yellow),
                Some(Green),
                Some(Purple),
            ],
        );
        let ids = tray.detect_matches(3);
        tray.mark_removing(&ids);

        tray.compact_around(&ids, &[1]);
        assert_eq!(
            categories(&tray),
            vec![Some(Blue), None, Some(Green), Some(Purple), None, None, None]
        );
    }

    #[test]
    fn test_compact_around_keeps_later_match() {
        // Yellows matched first; greens were flagged during the yellows' grace
        let mut tray = tray_of(
            7,
            &[
                Some(Yellow),
                Some(Yellow),
                Some(Yellow),
                Some(Green),
                Some(Green),
                Some(Green),
                Some(Blue),
            ],
        );
        let yellows = vec![EntityId(1), EntityId(2), EntityId(3)];
        let greens = vec![EntityId(4), EntityId(5), EntityId(6)];
        tray.mark_removing(&yellows);
        tray.mark_removing(&greens);

        let removed = tray.compact_around(&yellows, &[]);
        assert_eq!(removed.len(), 3);
        assert_eq!(
            categories(&tray),
            vec![Some(Green), Some(Green), Some(Green), Some(Blue), None, None, None]
        );
        assert!(tray.slots().iter().flatten().take(3).all(Entity::is_removing));

        tray.compact_around(&greens, &[]);
        assert_eq!(
            categories(&tray),
            vec![Some(Blue), None, None, None, None, None, None]
        );
    }

    fn arb_slots() -> impl Strategy<Value = Vec<Option<Category>>> {
        let category = prop::sample::select(vec![Yellow, Orange, Green, Blue, Purple]);
        prop::collection::vec(prop::option::of(category), 1..12)
    }

    proptest! {
        #[test]
        fn prop_occupancy_never_exceeds_capacity(
            slots in arb_slots(),
            extra in prop::collection::vec(0usize..16, 0..20),
        ) {
            let mut tray = tray_of(slots.len(), &slots);
            for (n, slot) in extra.into_iter().enumerate() {
                let _ = tray.commit(slot, block(100 + n as u32, Purple));
                prop_assert!(tray.occupied() <= tray.capacity());
            }
        }

        #[test]
        fn prop_matches_are_leftmost_threshold(slots in arb_slots()) {
            let tray = tray_of(slots.len(), &slots);
            let matched = tray.detect_matches(3);

            for category in Category::ALL {
                let present: Vec<EntityId> = tray
                    .slots()
                    .iter()
                    .flatten()
                    .filter(|e| e.category == category)
                    .map(|e| e.id)
                    .collect();
                let picked: Vec<EntityId> = matched
                    .iter()
                    .copied()
                    .filter(|id| present.contains(id))
                    .collect();
                if present.len() >= 3 {
                    prop_assert_eq!(picked, present[..3].to_vec());
                } else {
                    prop_assert!(picked.is_empty());
                }
            }
        }

        #[test]
        fn prop_compaction_keeps_survivor_order(slots in arb_slots()) {
            let mut tray = tray_of(slots.len(), &slots);
            let matched = tray.detect_matches(3);
            tray.mark_removing(&matched);

            let survivors: Vec<EntityId> = tray
                .slots()
                .iter()
                .flatten()
                .filter(|e| !e.is_removing())
                .map(|e| e.id)
                .collect();

            tray.compact();
            prop_assert_eq!(tray.capacity(), slots.len());

            let after: Vec<EntityId> = tray.slots().iter().flatten().map(|e| e.id).collect();
            prop_assert_eq!(&after, &survivors);
            // Packed leftmost: no gaps before the last survivor
            prop_assert!(tray.slots()[..after.len()].iter().all(Option::is_some));
        }
    }
}
