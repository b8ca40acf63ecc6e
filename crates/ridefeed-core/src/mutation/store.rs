use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{Club, Comment, Post, RideEvent};
use crate::sync::lock;

/// Anything addressable by a string id.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Post {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Club {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for RideEvent {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Comment {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Local state an optimistic mutation reads and writes.
///
/// `capture` must record everything `apply` may change for that id, so that
/// `restore` with the captured value puts the state back exactly.
pub trait EntityStore: Send + Sync {
    type Entity: Clone + Send + Sync + 'static;
    type Snapshot: Send + 'static;

    /// `None` when the entity is not held locally.
    fn capture(&self, id: &str) -> Option<Self::Snapshot>;

    fn apply(&self, id: &str, transform: &(dyn Fn(&mut Self::Entity) + Send + Sync));

    fn restore(&self, id: &str, snapshot: Self::Snapshot);

    /// Adopt the server's canonical version.
    fn merge(&self, id: &str, canonical: Self::Entity);
}

/// A plain id → entity map. Used for clubs, ride events and comments.
pub struct InMemoryEntityStore<E> {
    entities: Mutex<HashMap<String, E>>,
}

impl<E: Identified + Clone> InMemoryEntityStore<E> {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
        }
    }

    /// Insert or replace entities, e.g. after a list screen loads.
    pub fn upsert_all(&self, items: impl IntoIterator<Item = E>) {
        let mut entities = lock(&self.entities);
        for item in items {
            entities.insert(item.id().to_string(), item);
        }
    }

    pub fn upsert(&self, item: E) {
        self.upsert_all(std::iter::once(item));
    }

    pub fn get(&self, id: &str) -> Option<E> {
        lock(&self.entities).get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<E> {
        lock(&self.entities).remove(id)
    }

    pub fn clear(&self) {
        lock(&self.entities).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entities).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Identified + Clone> Default for InMemoryEntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EntityStore for InMemoryEntityStore<E>
where
    E: Identified + Clone + Send + Sync + 'static,
{
    type Entity = E;
    type Snapshot = E;

    fn capture(&self, id: &str) -> Option<E> {
        self.get(id)
    }

    fn apply(&self, id: &str, transform: &(dyn Fn(&mut E) + Send + Sync)) {
        if let Some(entity) = lock(&self.entities).get_mut(id) {
            transform(entity);
        }
    }

    fn restore(&self, id: &str, snapshot: E) {
        lock(&self.entities).insert(id.to_string(), snapshot);
    }

    fn merge(&self, id: &str, canonical: E) {
        lock(&self.entities).insert(id.to_string(), canonical);
    }
}
