//! Apply-then-confirm-or-rollback engine behind every engagement action.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, warn};

use super::store::EntityStore;
use crate::error::{FeedError, MutationError};
use crate::sync::lock;

/// An applied but unsettled mutation. Holds the entity's in-flight marker
/// and the pre-transform snapshot; if dropped before `confirm`, the
/// snapshot is restored and only then is the marker cleared.
struct Pending<'a, S: EntityStore> {
    manager: &'a OptimisticMutationManager<S>,
    entity_id: String,
    snapshot: Option<S::Snapshot>,
}

impl<S: EntityStore> Pending<'_, S> {
    fn confirm(&mut self) {
        self.snapshot = None;
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.manager.store.restore(&self.entity_id, snapshot);
        }
    }
}

impl<S: EntityStore> Drop for Pending<'_, S> {
    fn drop(&mut self) {
        if self.snapshot.is_some() {
            warn!(entity = %self.entity_id, "Mutation abandoned before settling; rolling back");
            self.rollback();
        }
        lock(&self.manager.in_flight).remove(&self.entity_id);
        self.manager.settled.send_modify(|n| *n += 1);
    }
}

pub struct OptimisticMutationManager<S: EntityStore> {
    store: Arc<S>,
    in_flight: Mutex<HashSet<String>>,
    /// Bumped whenever any mutation settles.
    settled: watch::Sender<u64>,
}

impl<S: EntityStore> OptimisticMutationManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            in_flight: Mutex::new(HashSet::new()),
            settled: watch::Sender::new(0),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// True while a mutation for `entity_id` has not settled.
    pub fn is_in_flight(&self, entity_id: &str) -> bool {
        lock(&self.in_flight).contains(entity_id)
    }

    /// Apply `transform` locally, then run `remote`.
    ///
    /// - Rejected with [`MutationError::Busy`] if a mutation for the same
    ///   entity is pending; `remote` is never called.
    /// - On success a canonical entity from the server replaces local state.
    /// - On failure local state is restored exactly to what it was before
    ///   `transform`, and only then is the error returned.
    /// - If the returned future is dropped before `remote` settles, local
    ///   state is restored as on failure.
    pub async fn mutate<T, R, Fut>(
        &self,
        entity_id: &str,
        transform: T,
        remote: R,
    ) -> Result<Option<S::Entity>, MutationError>
    where
        T: Fn(&mut S::Entity) + Send + Sync,
        R: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<S::Entity>, FeedError>>,
    {
        let mut pending = {
            let mut in_flight = lock(&self.in_flight);
            if in_flight.contains(entity_id) {
                debug!(entity = entity_id, "Mutation rejected: already in flight");
                return Err(MutationError::Busy(entity_id.to_string()));
            }
            let Some(captured) = self.store.capture(entity_id) else {
                warn!(entity = entity_id, "Mutation rejected: entity not loaded");
                return Err(MutationError::UnknownEntity(entity_id.to_string()));
            };
            in_flight.insert(entity_id.to_string());
            Pending {
                manager: self,
                entity_id: entity_id.to_string(),
                snapshot: Some(captured),
            }
        };

        self.store.apply(entity_id, &transform);

        match remote().await {
            Ok(Some(canonical)) => {
                pending.confirm();
                self.store.merge(entity_id, canonical.clone());
                debug!(entity = entity_id, "Mutation confirmed with canonical entity");
                Ok(Some(canonical))
            }
            Ok(None) => {
                pending.confirm();
                debug!(entity = entity_id, "Mutation confirmed");
                Ok(None)
            }
            Err(e) => {
                pending.rollback();
                warn!(entity = entity_id, error = %e, "Mutation failed; rolled back");
                Err(MutationError::Rejected(e))
            }
        }
    }

    /// Like [`mutate`](Self::mutate), but instead of failing with `Busy`
    /// waits for the pending mutation on `entity_id` to settle and then
    /// runs. Used for changes the server has already accepted, which must
    /// land after any rollback rather than be erased by it.
    pub async fn mutate_when_idle<T, R, Fut>(
        &self,
        entity_id: &str,
        transform: T,
        remote: R,
    ) -> Result<Option<S::Entity>, MutationError>
    where
        T: Fn(&mut S::Entity) + Send + Sync,
        R: Fn() -> Fut,
        Fut: Future<Output = Result<Option<S::Entity>, FeedError>>,
    {
        loop {
            // Subscribe before checking so a settle in between is not missed.
            let mut settled = self.settled.subscribe();
            match self.mutate(entity_id, &transform, &remote).await {
                Err(MutationError::Busy(_)) => {
                    debug!(entity = entity_id, "Queued behind in-flight mutation");
                    // The sender lives as long as `self`.
                    let _ = settled.changed().await;
                }
                other => return other,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
