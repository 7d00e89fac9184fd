//! Single-category bins (baskets, the catcher)

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::{Category, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectorId(pub usize);

impl fmt::Display for CollectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A bin that only takes entities of its category, up to `capacity`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collector {
    pub id: CollectorId,
    category: Category,
    capacity: usize,
    items: Vec<Entity>,
    /// Where arriving entities are aimed
    pub position: Vec2,
}

impl Collector {
    pub fn new(id: CollectorId, category: Category, capacity: usize, position: Vec2) -> Self {
        Self {
            id,
            category,
            capacity,
            items: Vec::new(),
            position,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items(&self) -> &[Entity] {
        &self.items
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn accepts(&self, category: Category) -> bool {
        category == self.category && !self.is_full()
    }

    /// Append a landed entity if it belongs here; otherwise hand it back.
    pub fn collect(&mut self, mut entity: Entity) -> Result<(), Entity> {
        if !self.accepts(entity.category) {
            return Err(entity);
        }
        entity.land();
        self.items.push(entity);
        Ok(())
    }

    /// The catcher changes what it accepts mid-round
    pub(crate) fn set_category(&mut self, category: Category) {
        self.category = category;
    }
}

/// Default routing: the first collector of the entity's category wins,
/// otherwise the first collector (where it will be a miss).
pub fn route(collectors: &[Collector], category: Category) -> Option<&Collector> {
    collectors
        .iter()
        .find(|c| c.category == category)
        .or_else(|| collectors.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::EntityId;

    fn fruit(id: u32, category: Category) -> Entity {
        Entity::spawn(EntityId(id), category)
    }

    #[test]
    fn test_collect_matching() {
        let mut basket = Collector::new(CollectorId(0), Category::Yellow, 3, Vec2::ZERO);
        assert!(basket.collect(fruit(1, Category::Yellow)).is_ok());
        assert_eq!(basket.items().len(), 1);
        assert!(basket.items()[0].is_idle());
    }

    #[test]
    fn test_collect_wrong_category_is_returned() {
        let mut basket = Collector::new(CollectorId(0), Category::Yellow, 3, Vec2::ZERO);
        let rejected = basket.collect(fruit(1, Category::Orange)).unwrap_err();
        assert_eq!(rejected.id, EntityId(1));
        assert!(basket.items().is_empty());
    }

    #[test]
    fn test_collect_when_full_is_returned() {
        let mut basket = Collector::new(CollectorId(0), Category::Orange, 2, Vec2::ZERO);
        basket.collect(fruit(1, Category::Orange)).unwrap();
        basket.collect(fruit(2, Category::Orange)).unwrap();
        assert!(basket.is_full());

        assert!(basket.collect(fruit(3, Category::Orange)).is_err());
        assert_eq!(basket.items().len(), 2);
    }

    #[test]
    fn test_route_first_matching_wins() {
        let collectors = vec![
            Collector::new(CollectorId(0), Category::Yellow, 3, Vec2::ZERO),
            Collector::new(CollectorId(1), Category::Orange, 3, Vec2::ZERO),
            Collector::new(CollectorId(2), Category::Orange, 3, Vec2::ZERO),
        ];
        assert_eq!(route(&collectors, Category::Orange).unwrap().id, CollectorId(1));
        assert_eq!(route(&collectors, Category::Yellow).unwrap().id, CollectorId(0));
        // No blue bin: falls back to the first
        assert_eq!(route(&collectors, Category::Blue).unwrap().id, CollectorId(0));
        assert!(route(&[], Category::Blue).is_none());
    }
}
