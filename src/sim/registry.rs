//! Entity registry with permanent removal
//!
//! Ordered storage keeps sensor iteration deterministic across peers given
//! the same entity set. Removed ids are remembered so a late update cannot
//! resurrect a dead entity.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::sim::entity::Entity;
use crate::sim::EntityKind;

#[derive(Debug, Default)]
pub struct Registry {
    entities: BTreeMap<Uuid, Entity>,
    removed: BTreeSet<Uuid>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity. Refused when the id was previously removed.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if self.removed.contains(&entity.id) {
            return false;
        }
        self.entities.insert(entity.id, entity);
        true
    }

    /// Remove an entity and tombstone its id. Idempotent; returns the
    /// entity only on the first call.
    pub fn remove(&mut self, id: Uuid) -> Option<Entity> {
        self.removed.insert(id);
        self.entities.remove(&id)
    }

    pub fn is_removed(&self, id: Uuid) -> bool {
        self.removed.contains(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities in id order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.entities.keys().copied().collect()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(move |entity| entity.kind_tag() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SeekerTuning;

    fn aircraft(id: Uuid) -> Entity {
        Entity::aircraft(id, false, "reg".into(), SeekerTuning::default())
    }

    #[test]
    fn removal_is_permanent() {
        let mut registry = Registry::new();
        let id = Uuid::new_v4();
        assert!(registry.insert(aircraft(id)));
        assert!(registry.remove(id).is_some());

        // A late update must not bring the entity back.
        assert!(!registry.insert(aircraft(id)));
        assert!(!registry.contains(id));
        assert!(registry.is_removed(id));
    }

    #[test]
    fn double_removal_yields_the_entity_once() {
        let mut registry = Registry::new();
        let id = Uuid::new_v4();
        registry.insert(aircraft(id));
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn removing_an_unknown_id_still_tombstones_it() {
        let mut registry = Registry::new();
        let id = Uuid::new_v4();
        assert!(registry.remove(id).is_none());
        assert!(!registry.insert(aircraft(id)));
    }

    #[test]
    fn iteration_is_id_ordered() {
        let mut registry = Registry::new();
        for _ in 0..8 {
            registry.insert(aircraft(Uuid::new_v4()));
        }
        let ids = registry.ids();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
