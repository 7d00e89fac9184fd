//! Spawned items and their identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique entity identifier. Never reused, not even across resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Block color / fruit type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Also the mango in fruit modes
    Yellow,
    Orange,
    Green,
    Blue,
    Purple,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Yellow,
        Category::Orange,
        Category::Green,
        Category::Blue,
        Category::Purple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Yellow => "yellow",
            Category::Orange => "orange",
            Category::Green => "green",
            Category::Blue => "blue",
            Category::Purple => "purple",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yellow" | "mango" => Some(Category::Yellow),
            "orange" => Some(Category::Orange),
            "green" => Some(Category::Green),
            "blue" => Some(Category::Blue),
            "purple" => Some(Category::Purple),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. Ordered: an entity only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    /// Under transit control
    Falling,
    /// Committed to a tray slot or collector
    Idle,
    /// Matched, waiting for compaction
    Removing,
}

/// A spawned block or fruit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub category: Category,
    status: EntityStatus,
}

impl Entity {
    /// Fresh entity, still falling
    pub(crate) fn spawn(id: EntityId, category: Category) -> Self {
        Self {
            id,
            category,
            status: EntityStatus::Falling,
        }
    }

    pub fn status(&self) -> EntityStatus {
        self.status
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.status == EntityStatus::Idle
    }

    #[inline]
    pub fn is_removing(&self) -> bool {
        self.status == EntityStatus::Removing
    }

    /// Move to `next` if that is a forward step. Returns whether the status changed.
    fn advance(&mut self, next: EntityStatus) -> bool {
        if next > self.status {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Transit finished; entity now belongs to its container
    pub(crate) fn land(&mut self) -> bool {
        self.advance(EntityStatus::Idle)
    }

    pub(crate) fn mark_removing(&mut self) -> bool {
        self.advance(EntityStatus::Removing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_moves_forward() {
        let mut entity = Entity::spawn(EntityId(1), Category::Blue);
        assert_eq!(entity.status(), EntityStatus::Falling);

        assert!(entity.land());
        assert!(entity.is_idle());
        assert!(!entity.land());

        assert!(entity.mark_removing());
        assert!(entity.is_removing());
        assert!(!entity.land());
        assert_eq!(entity.status(), EntityStatus::Removing);
        assert_eq!(entity.category, Category::Blue);
    }

    #[test]
    fn test_category_names() {
        for category in Category::ALL {
            assert_eq!(Category::from_str(category.as_str()), Some(category));
        }
        assert_eq!(Category::from_str("Mango"), Some(Category::Yellow));
        assert_eq!(Category::from_str("teal"), None);
    }

    #[test]
    fn test_entity_serializes_lowercase() {
        let mut entity = Entity::spawn(EntityId(7), Category::Purple);
        entity.land();
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(json, r#"{"id":7,"category":"purple","status":"idle"}"#);
    }
}
