use std::collections::HashMap;

use slotmap::{SlotMap, new_key_type};

use crate::entity::{Activity, Entity, EntityKind, Queue};

new_key_type! {
    /// Identifies an entity in an [`EntityRegistry`].
    pub struct EntityId;
}

/// Errors raised when building a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("entity '{0}' is already registered")]
    DuplicateName(String),
}

/// Name-indexed store of the model's entities.
///
/// Built by the caller before a replay starts. During a replay it only grows,
/// through auto-registration of names seen for the first time. Iteration
/// follows registration order.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: SlotMap<EntityId, Entity>,
    by_name: HashMap<String, EntityId>,
    order: Vec<EntityId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of names, inferring each entity's kind
    /// from its name.
    pub fn from_names<I, S>(names: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.insert(Entity::for_name(name.as_ref()))?;
        }
        Ok(registry)
    }

    /// Add an entity. Names must be unique.
    pub fn insert(&mut self, entity: impl Into<Entity>) -> Result<EntityId, RegistryError> {
        let entity = entity.into();
        if self.by_name.contains_key(entity.name()) {
            return Err(RegistryError::DuplicateName(entity.name().to_string()));
        }
        let name = entity.name().to_string();
        let id = self.entities.insert(entity);
        self.by_name.insert(name, id);
        self.order.push(id);
        Ok(id)
    }

    /// Look up `name`, registering a new entity of the inferred kind if it is
    /// not known yet. Returns the id and whether the entity was just created.
    pub fn get_or_register(&mut self, name: &str) -> (EntityId, bool) {
        if let Some(&id) = self.by_name.get(name) {
            return (id, false);
        }
        let id = self.entities.insert(Entity::new(EntityKind::infer(name), name));
        self.by_name.insert(name.to_string(), id);
        self.order.push(id);
        (id, true)
    }

    pub fn id(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.id(name).and_then(|id| self.entities.get(id))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entity> {
        let id = self.id(name)?;
        self.entities.get_mut(id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn activity(&self, name: &str) -> Option<&Activity> {
        self.get(name).and_then(Entity::as_activity)
    }

    pub fn activity_mut(&mut self, name: &str) -> Option<&mut Activity> {
        self.get_mut(name).and_then(Entity::as_activity_mut)
    }

    pub fn queue(&self, name: &str) -> Option<&Queue> {
        self.get(name).and_then(Entity::as_queue)
    }

    pub fn queue_mut(&mut self, name: &str) -> Option<&mut Queue> {
        self.get_mut(name).and_then(Entity::as_queue_mut)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.order.iter().filter_map(|&id| self.entities.get(id))
    }

    /// Activities in registration order, mutably. Used to attach observers.
    pub fn activities_mut(&mut self) -> impl Iterator<Item = &mut Activity> + '_ {
        // SlotMap iteration order is not registration order, so rebuild it.
        let rank: HashMap<EntityId, usize> =
            self.order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let mut items: Vec<(usize, &mut Activity)> = self
            .entities
            .iter_mut()
            .filter_map(|(id, e)| Some((*rank.get(&id)?, e.as_activity_mut()?)))
            .collect();
        items.sort_by_key(|(i, _)| *i);
        items.into_iter().map(|(_, a)| a)
    }

    /// Entity names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(Entity::name)
    }
}
