//! Per-domain feed state machine.
//!
//! ```text
//! idle | error --refresh--> refreshing --ok--> idle
//!                                       \-err-> error   (posts kept)
//! idle --load_more (has_more)--> loading_more --ok--> idle
//!                                             \-err-> error (posts, has_more kept)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::coordinator::{FeedQueryCoordinator, FetchOutcome};
use super::observer::{Observers, Subscription};
use super::state::{DomainFeedState, FeedPhase, FeedSnapshot};
use crate::error::FeedError;
use crate::models::{FeedDomain, FeedParams, Post};
use crate::sync::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirstPage {
    /// Serve from cache when fresh.
    CacheFirst,
    /// Always hit the network.
    Network,
}

pub struct FeedController {
    domain: FeedDomain,
    coordinator: Arc<FeedQueryCoordinator>,
    params: Mutex<FeedParams>,
    /// Bumped whenever params change so late responses for old params are ignored.
    params_generation: AtomicU64,
    state: Mutex<DomainFeedState>,
    observers: Observers<FeedSnapshot>,
    torn_down: AtomicBool,
}

impl FeedController {
    pub fn new(domain: FeedDomain, params: FeedParams, coordinator: Arc<FeedQueryCoordinator>) -> Self {
        Self {
            domain,
            coordinator,
            params: Mutex::new(params),
            params_generation: AtomicU64::new(0),
            state: Mutex::new(DomainFeedState::default()),
            observers: Observers::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn domain(&self) -> FeedDomain {
        self.domain
    }

    pub fn params(&self) -> FeedParams {
        lock(&self.params).clone()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot::of(self.domain, &lock(&self.state))
    }

    pub fn subscribe(&self, listener: impl Fn(&FeedSnapshot) + Send + Sync + 'static) -> Subscription {
        self.observers.subscribe(listener)
    }

    /// First load for a freshly mounted screen: cached page if still fresh.
    pub async fn load(&self) -> FeedSnapshot {
        self.fetch_first_page(FirstPage::CacheFirst).await
    }

    /// Pull-to-refresh. A no-op while a load-more is running.
    pub async fn refresh(&self) -> FeedSnapshot {
        self.fetch_first_page(FirstPage::Network).await
    }

    /// Fetch the next page. Only runs when more pages exist and nothing else
    /// is loading; otherwise returns the current snapshot untouched.
    pub async fn load_more(&self) -> FeedSnapshot {
        let (params, generation, cursor) = {
            let mut state = lock(&self.state);
            if !state.can_load_more() {
                debug!(domain = %self.domain, phase = ?state.phase, has_more = state.has_more, "Ignoring load-more");
                return FeedSnapshot::of(self.domain, &state);
            }
            state.phase = FeedPhase::LoadingMore;
            state.error = None;
            let (params, generation) = self.current_params();
            (params, generation, state.cursor.clone())
        };
        self.publish();

        let result = self
            .coordinator
            .load_more(self.domain, &params, cursor.as_deref())
            .await;

        self.finish(generation, result, true)
    }

    /// Swap the query (e.g. new filters). Clears the list; call `refresh`
    /// or `load` afterwards to populate it.
    pub fn set_params(&self, params: FeedParams) {
        let Some(previous) = self.swap_params(params) else {
            return;
        };
        self.coordinator.reset(self.domain, &previous);
        *lock(&self.state) = DomainFeedState::default();
        debug!(domain = %self.domain, "Feed params changed");
        self.publish();
    }

    /// Point at new params but keep showing the current posts until the next
    /// refresh replaces them.
    pub(crate) fn retarget(&self, params: FeedParams) {
        if let Some(previous) = self.swap_params(params) {
            self.coordinator.reset(self.domain, &previous);
        }
    }

    /// Install new params, returning the old ones if they differ.
    fn swap_params(&self, params: FeedParams) -> Option<FeedParams> {
        let mut current = lock(&self.params);
        if *current == params {
            return None;
        }
        let previous = std::mem::replace(&mut *current, params);
        self.params_generation.fetch_add(1, Ordering::SeqCst);
        Some(previous)
    }

    /// Drop all state for this feed, in memory and in the coordinator.
    pub fn reset(&self) {
        let params = self.params();
        self.coordinator.reset(self.domain, &params);
        self.params_generation.fetch_add(1, Ordering::SeqCst);
        *lock(&self.state) = DomainFeedState::default();
        self.publish();
    }

    /// Stop reacting to responses and drop all subscribers. In-flight
    /// fetches still complete and populate the cache.
    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
        self.observers.clear();
        debug!(domain = %self.domain, "Feed controller torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    // ===== Post access for optimistic mutations =====

    pub fn post(&self, post_id: &str) -> Option<Post> {
        lock(&self.state).posts.iter().find(|p| p.id == post_id).cloned()
    }

    /// Apply `f` to the post in place. Returns false if the post is not shown.
    pub fn update_post(&self, post_id: &str, f: impl FnOnce(&mut Post)) -> bool {
        let updated = {
            let mut state = lock(&self.state);
            match state.posts.iter_mut().find(|p| p.id == post_id) {
                Some(post) => {
                    f(post);
                    true
                }
                None => false,
            }
        };
        if updated {
            self.publish();
        }
        updated
    }

    /// Overwrite the post wholesale.
    pub fn replace_post(&self, post: Post) -> bool {
        let id = post.id.clone();
        self.update_post(&id, move |slot| *slot = post)
    }

    // ===== Internals =====

    /// Enter `refreshing` without fetching yet. Used by the nearby feed while
    /// it waits for a location fix. Returns false during a load-more.
    pub(crate) fn begin_refresh(&self) -> bool {
        {
            let mut state = lock(&self.state);
            if state.phase == FeedPhase::LoadingMore {
                debug!(domain = %self.domain, "Ignoring refresh during load-more");
                return false;
            }
            state.phase = FeedPhase::Refreshing;
            state.error = None;
        }
        self.publish();
        true
    }

    /// Land in `error` without touching posts.
    pub(crate) fn fail(&self, error: &FeedError) -> FeedSnapshot {
        warn!(domain = %self.domain, error = %error, "Feed failed");
        lock(&self.state).fail(error.kind(), false);
        self.publish()
    }

    async fn fetch_first_page(&self, mode: FirstPage) -> FeedSnapshot {
        if !self.begin_refresh() {
            return self.snapshot();
        }
        self.fetch_after_begin(mode).await
    }

    pub(crate) async fn refresh_after_begin(&self) -> FeedSnapshot {
        self.fetch_after_begin(FirstPage::Network).await
    }

    async fn fetch_after_begin(&self, mode: FirstPage) -> FeedSnapshot {
        let (params, generation) = self.current_params();
        info!(domain = %self.domain, mode = ?mode, "Fetching first page");

        let result = match mode {
            FirstPage::CacheFirst => self.coordinator.load(self.domain, &params).await,
            FirstPage::Network => self.coordinator.refresh(self.domain, &params).await,
        };

        self.finish(generation, result, false)
    }

    fn current_params(&self) -> (FeedParams, u64) {
        let params = lock(&self.params);
        (params.clone(), self.params_generation.load(Ordering::SeqCst))
    }

    fn finish(
        &self,
        generation: u64,
        result: Result<FetchOutcome, FeedError>,
        appending: bool,
    ) -> FeedSnapshot {
        if self.is_torn_down() {
            return self.snapshot();
        }
        if self.params_generation.load(Ordering::SeqCst) != generation {
            debug!(domain = %self.domain, "Ignoring response for previous params");
            return self.snapshot();
        }

        {
            let mut state = lock(&self.state);
            match result {
                Ok(FetchOutcome::Applied(page)) => {
                    if appending {
                        state.append(page);
                    } else {
                        state.replace(page);
                    }
                    state.settle();
                }
                Ok(FetchOutcome::Discarded) => state.settle(),
                Err(e) => {
                    warn!(domain = %self.domain, error = %e, appending = appending, "Feed fetch failed");
                    state.fail(e.kind(), appending);
                }
            }
        }
        self.publish()
    }

    fn publish(&self) -> FeedSnapshot {
        let snapshot = self.snapshot();
        if !self.is_torn_down() {
            self.observers.notify(&snapshot);
        }
        snapshot
    }
}

// ============================================================================
// Tests
// ============================================================================
