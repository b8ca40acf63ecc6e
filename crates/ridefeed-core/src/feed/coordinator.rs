//! Paginated fetch coordination shared by every feed domain.
//!
//! The coordinator owns the merged page state per (domain, params) key and
//! guarantees that at most one network call is in flight for a key:
//!
//! - `refresh` while a refresh is in flight joins it.
//! - `load_more` while a refresh is in flight is queued and re-issued with
//!   the post-refresh cursor once it settles.
//! - `load_more` while a load-more is in flight joins it.
//! - `refresh` while a load-more is in flight waits for it, then fetches.
//!
//! Every issued call takes a sequence number from one counter. A refresh
//! response is applied only if it is still the latest refresh issued for its
//! key; `reset` consumes a sequence number so anything in flight settles as
//! discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, CacheStore};
use crate::error::FeedError;
use crate::models::{FeedDomain, FeedPage, FeedParams, Post};
use crate::ports::FeedFetcher;
use crate::sync::lock;

/// What a coordinator call did to the key's page state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The merged page for the key after this call.
    Applied(FeedPage),
    /// The response arrived after the key was refreshed again or reset and
    /// was dropped. Page state is untouched.
    Discarded,
}

impl FetchOutcome {
    pub fn page(&self) -> Option<&FeedPage> {
        match self {
            FetchOutcome::Applied(page) => Some(page),
            FetchOutcome::Discarded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Refresh,
    LoadMore,
}

type Settled = Option<Result<FetchOutcome, FeedError>>;

struct InFlight {
    kind: FetchKind,
    seq: u64,
    settled: watch::Receiver<Settled>,
}

#[derive(Default)]
struct KeyState {
    /// Sequence number of the latest refresh issued (or reset) for this key.
    latest_refresh: u64,
    page: Option<FeedPage>,
    in_flight: Option<InFlight>,
}

#[derive(Default)]
struct State {
    next_seq: u64,
    keys: HashMap<CacheKey, KeyState>,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

enum Step {
    Lead(Flight),
    Join(watch::Receiver<Settled>),
    Wait(watch::Receiver<Settled>),
    Done(FetchOutcome),
}

/// The leader's claim on a key. Clears the in-flight marker even if the
/// leading future is dropped before the response arrives.
struct Flight {
    state: Arc<Mutex<State>>,
    key: CacheKey,
    seq: u64,
    tx: watch::Sender<Settled>,
    settled: bool,
}

impl Flight {
    /// Release the key, then wake everyone waiting on it. The marker is
    /// cleared first so a woken follower can claim the key immediately.
    fn publish(mut self, result: Result<FetchOutcome, FeedError>) -> Result<FetchOutcome, FeedError> {
        self.release();
        self.settled = true;
        self.tx.send_replace(Some(result.clone()));
        result
    }

    /// A key left with neither a page nor a fetch is dropped.
    fn release(&self) {
        let mut state = lock(&self.state);
        let empty = match state.keys.get_mut(&self.key) {
            Some(ks) if ks.in_flight.as_ref().map(|f| f.seq) == Some(self.seq) => {
                ks.in_flight = None;
                ks.page.is_none()
            }
            _ => false,
        };
        if empty {
            state.keys.remove(&self.key);
        }
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        if !self.settled {
            debug!(key = %self.key, seq = self.seq, "Fetch abandoned before settling");
            self.release();
        }
    }
}

async fn wait_settled(mut rx: watch::Receiver<Settled>) -> Settled {
    match rx.wait_for(Option::is_some).await {
        Ok(settled) => settled.clone(),
        // Leader dropped without settling
        Err(_) => None,
    }
}

pub struct FeedQueryCoordinator {
    fetcher: Arc<dyn FeedFetcher>,
    cache: Arc<CacheStore>,
    state: Arc<Mutex<State>>,
}

impl FeedQueryCoordinator {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, cache: Arc<CacheStore>) -> Self {
        Self {
            fetcher,
            cache,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Current merged page for a key, if any.
    pub fn page(&self, domain: FeedDomain, params: &FeedParams) -> Option<FeedPage> {
        let key = CacheKey::new(domain, params);
        lock(&self.state)
            .keys
            .get(&key)
            .and_then(|ks| ks.page.clone())
    }

    pub fn is_in_flight(&self, domain: FeedDomain, params: &FeedParams) -> bool {
        let key = CacheKey::new(domain, params);
        lock(&self.state)
            .keys
            .get(&key)
            .map(|ks| ks.in_flight.is_some())
            .unwrap_or(false)
    }

    /// Cache-first first page: serve a live cache entry, otherwise refresh.
    pub async fn load(
        &self,
        domain: FeedDomain,
        params: &FeedParams,
    ) -> Result<FetchOutcome, FeedError> {
        Self::validate(domain, params)?;
        let key = CacheKey::new(domain, params);

        if let Some(entry) = self.cache.read_entry(&key) {
            let page = entry.payload().clone();
            let mut state = lock(&self.state);
            let ks = state.keys.entry(key).or_default();
            if ks.page.is_none() {
                ks.page = Some(page.clone());
            }
            return Ok(FetchOutcome::Applied(page));
        }

        self.refresh(domain, params).await
    }

    /// Fetch the first page and replace the key's list and cursor.
    pub async fn refresh(
        &self,
        domain: FeedDomain,
        params: &FeedParams,
    ) -> Result<FetchOutcome, FeedError> {
        Self::validate(domain, params)?;
        let key = CacheKey::new(domain, params);

        let flight = loop {
            match self.claim(&key, FetchKind::Refresh, None) {
                Step::Lead(flight) => break flight,
                Step::Join(rx) => {
                    debug!(key = %key, "Joining in-flight refresh");
                    if let Some(result) = wait_settled(rx).await {
                        return result;
                    }
                }
                Step::Wait(rx) => {
                    debug!(key = %key, "Refresh waiting for in-flight load-more");
                    wait_settled(rx).await;
                }
                Step::Done(outcome) => return Ok(outcome),
            }
        };

        info!(key = %key, seq = flight.seq, "Refreshing feed");
        let response = self.fetcher.fetch_page(domain, params, None).await;

        let result = {
            let mut state = lock(&self.state);
            let ks = state.keys.entry(key.clone()).or_default();
            match response {
                Ok(page) if ks.latest_refresh == flight.seq => {
                    let page = page.normalized();
                    ks.page = Some(page.clone());
                    self.cache.store_key(key.clone(), page.clone());
                    debug!(key = %key, items = page.len(), has_more = page.has_more, "Refresh applied");
                    Ok(FetchOutcome::Applied(page))
                }
                Ok(_) => {
                    debug!(key = %key, seq = flight.seq, latest = ks.latest_refresh, "Discarding superseded refresh");
                    Ok(FetchOutcome::Discarded)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Refresh failed");
                    Err(e)
                }
            }
        };

        flight.publish(result)
    }

    /// Fetch the page after `current_cursor` and append it, skipping ids
    /// already present. When the key has no further page this returns the
    /// current page without touching the network.
    pub async fn load_more(
        &self,
        domain: FeedDomain,
        params: &FeedParams,
        current_cursor: Option<&str>,
    ) -> Result<FetchOutcome, FeedError> {
        Self::validate(domain, params)?;
        let key = CacheKey::new(domain, params);

        let mut caller_cursor = current_cursor.map(str::to_string);
        let flight = loop {
            match self.claim(&key, FetchKind::LoadMore, caller_cursor.as_deref()) {
                Step::Lead(flight) => break flight,
                Step::Join(rx) => {
                    debug!(key = %key, "Joining in-flight load-more");
                    if let Some(result) = wait_settled(rx).await {
                        return result;
                    }
                }
                Step::Wait(rx) => {
                    debug!(key = %key, "Load-more queued behind refresh");
                    wait_settled(rx).await;
                    // The refreshed page owns the cursor now.
                    caller_cursor = None;
                }
                Step::Done(outcome) => return Ok(outcome),
            }
        };

        let (cursor, epoch) = {
            let state = lock(&self.state);
            let ks = state.keys.get(&key);
            let cursor = ks
                .and_then(|ks| ks.page.as_ref())
                .and_then(|p| p.next_cursor.clone());
            (cursor, ks.map(|ks| ks.latest_refresh).unwrap_or_default())
        };
        let Some(cursor) = cursor else {
            // claim() only leads when a cursor exists
            return flight.publish(Ok(FetchOutcome::Discarded));
        };

        info!(key = %key, seq = flight.seq, "Loading next page");
        let response = self.fetcher.fetch_page(domain, params, Some(&cursor)).await;

        let result = {
            let mut state = lock(&self.state);
            let ks = state.keys.entry(key.clone()).or_default();
            match response {
                Ok(_) if ks.latest_refresh != epoch => {
                    debug!(key = %key, "Key was reset during load-more; dropping page");
                    Ok(FetchOutcome::Discarded)
                }
                Ok(next) => {
                    let mut merged = ks.page.take().unwrap_or_default();
                    let added = merged.append(next.normalized());
                    ks.page = Some(merged.clone());
                    self.cache.store_key(key.clone(), merged.clone());
                    debug!(key = %key, added = added, total = merged.len(), has_more = merged.has_more, "Page appended");
                    Ok(FetchOutcome::Applied(merged))
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Load-more failed");
                    Err(e)
                }
            }
        };

        flight.publish(result)
    }

    /// Forget the page state for one key. Responses still in flight for it
    /// settle as discarded.
    pub fn reset(&self, domain: FeedDomain, params: &FeedParams) {
        let key = CacheKey::new(domain, params);
        self.reset_where(|k| *k == key);
        debug!(key = %key, "Reset feed key");
    }

    /// Forget every key of one domain.
    pub fn reset_domain(&self, domain: FeedDomain) {
        self.reset_where(|key| key.domain() == domain);
    }

    /// Forget everything (logout).
    pub fn reset_all(&self) {
        self.reset_where(|_| true);
    }

    /// Swap a confirmed post into every merged page that holds it, so a later
    /// load-more does not write the old copy back to the cache. Returns the
    /// number of pages patched.
    pub fn replace_post(&self, post: &Post) -> usize {
        let mut state = lock(&self.state);
        let mut patched = 0;
        for ks in state.keys.values_mut() {
            let Some(page) = ks.page.as_mut() else {
                continue;
            };
            if let Some(slot) = page.items.iter_mut().find(|p| p.id == post.id) {
                *slot = post.clone();
                patched += 1;
            }
        }
        patched
    }

    /// Number of keys with page state or a fetch in flight.
    pub fn tracked_keys(&self) -> usize {
        lock(&self.state).keys.len()
    }

    fn reset_where(&self, matches: impl Fn(&CacheKey) -> bool) {
        let mut state = lock(&self.state);
        let seq = state.next_seq();
        // Keys with a fetch in flight must survive so its response finds a
        // bumped sequence number rather than a fresh, zeroed state.
        state.keys.retain(|key, ks| {
            if !matches(key) {
                return true;
            }
            ks.latest_refresh = seq;
            ks.page = None;
            ks.in_flight.is_some()
        });
    }

    fn validate(domain: FeedDomain, params: &FeedParams) -> Result<(), FeedError> {
        params.validate(domain).map_err(|e| {
            error!(domain = %domain, params = %params.canonical(), error = %e, "Rejected feed request");
            e
        })
    }

    /// Check and set the in-flight marker in one critical section.
    fn claim(&self, key: &CacheKey, kind: FetchKind, caller_cursor: Option<&str>) -> Step {
        let mut state = lock(&self.state);
        let seq = state.next_seq();
        let ks = state.keys.entry(key.clone()).or_default();

        if let Some(flight) = &ks.in_flight {
            return match (flight.kind, kind) {
                (FetchKind::Refresh, FetchKind::Refresh)
                | (FetchKind::LoadMore, FetchKind::LoadMore) => Step::Join(flight.settled.clone()),
                _ => Step::Wait(flight.settled.clone()),
            };
        }

        if kind == FetchKind::LoadMore {
            if ks.page.is_none() {
                // Seed from the cache, or from the caller's cursor when the
                // key was reset underneath a controller that still has posts.
                ks.page = self
                    .cache
                    .read_entry(key)
                    .map(|e| e.payload().clone())
                    .or_else(|| {
                        caller_cursor.map(|c| FeedPage::new(Vec::new(), Some(c.to_string())))
                    });
            }
            let page = ks.page.clone().unwrap_or_default();
            if page.next_cursor.is_none() {
                if ks.page.is_none() {
                    state.keys.remove(key);
                }
                debug!(key = %key, "No further pages");
                return Step::Done(FetchOutcome::Applied(page));
            }
            if let Some(c) = caller_cursor {
                if page.next_cursor.as_deref() != Some(c) {
                    debug!(key = %key, "Caller cursor is stale; using the key's cursor");
                }
            }
        } else {
            ks.latest_refresh = seq;
        }

        let (tx, rx) = watch::channel(None);
        ks.in_flight = Some(InFlight {
            kind,
            seq,
            settled: rx,
        });

        Step::Lead(Flight {
            state: Arc::clone(&self.state),
            key: key.clone(),
            seq,
            tx,
            settled: false,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves scripted pages keyed by cursor, yielding a few times first so
    /// concurrent callers get a chance to overlap.
    struct ScriptedFetcher {
        calls: AtomicUsize,
        cursors: Mutex<Vec<Option<String>>>,
        responses: Mutex<VecDeque<Result<FeedPage, FeedError>>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<FeedPage, FeedError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                cursors: Mutex::new(Vec::new()),
                responses: Mutex::new(responses.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn cursors(&self) -> Vec<Option<String>> {
            self.cursors.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeedFetcher for ScriptedFetcher {
        async fn fetch_page(
            &self,
            _domain: FeedDomain,
            _params: &FeedParams,
            cursor: Option<&str>,
        ) -> Result<FeedPage, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.cursors.lock().unwrap().push(cursor.map(str::to_string));
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FeedError::Network("script exhausted".into())))
        }
    }

    fn page(ids: &[&str], cursor: Option<&str>) -> FeedPage {
        FeedPage::new(
            ids.iter().map(|id| Post::new(*id)).collect(),
            cursor.map(str::to_string),
        )
    }

    fn ids(outcome: &FetchOutcome) -> Vec<String> {
        outcome
            .page()
            .map(|p| p.items.iter().map(|i| i.id.clone()).collect())
            .unwrap_or_default()
    }

    fn coordinator(fetcher: Arc<ScriptedFetcher>) -> FeedQueryCoordinator {
        FeedQueryCoordinator::new(fetcher, Arc::new(CacheStore::default()))
    }

    fn params() -> FeedParams {
        FeedParams::new().with("limit", 3)
    }

    #[tokio::test]
    async fn test_concurrent_refresh_single_network_call() {
        let fetcher = ScriptedFetcher::new(vec![Ok(page(&["a", "b"], Some("c1")))]);
        let coord = coordinator(fetcher.clone());
        let p = params();

        let (first, second) = tokio::join!(
            coord.refresh(FeedDomain::Personal, &p),
            coord.refresh(FeedDomain::Personal, &p)
        );

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(coord.page(FeedDomain::Personal, &p).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_replaces_list() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a", "b"], Some("c1"))),
            Ok(page(&["c", "d"], Some("c2"))),
            Ok(page(&["z"], None)),
        ]);
        let coord = coordinator(fetcher.clone());
        let p = params();

        coord.refresh(FeedDomain::Personal, &p).await.unwrap();
        coord.load_more(FeedDomain::Personal, &p, Some("c1")).await.unwrap();
        let outcome = coord.refresh(FeedDomain::Personal, &p).await.unwrap();

        assert_eq!(ids(&outcome), vec!["z"]);
        assert!(!outcome.page().unwrap().has_more);
    }

    #[tokio::test]
    async fn test_load_more_appends_and_dedupes() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a", "b", "c"], Some("c1"))),
            Ok(page(&["c", "d", "e"], Some("c2"))),
        ]);
        let coord = coordinator(fetcher.clone());
        let p = params();

        coord.refresh(FeedDomain::Trending, &p).await.unwrap();
        let outcome = coord
            .load_more(FeedDomain::Trending, &p, Some("c1"))
            .await
            .unwrap();

        assert_eq!(ids(&outcome), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(fetcher.cursors(), vec![None, Some("c1".to_string())]);
    }

    #[tokio::test]
    async fn test_null_cursor_is_never_requeried() {
        let fetcher = ScriptedFetcher::new(vec![Ok(page(&["a"], None))]);
        let coord = coordinator(fetcher.clone());
        let p = params();

        coord.refresh(FeedDomain::Personal, &p).await.unwrap();
        let outcome = coord.load_more(FeedDomain::Personal, &p, None).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(ids(&outcome), vec!["a"]);
    }

    #[tokio::test]
    async fn test_load_more_during_refresh_uses_post_refresh_cursor() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a", "b"], Some("old"))),
            Ok(page(&["n", "a", "b"], Some("fresh"))),
            Ok(page(&["b", "c"], Some("next"))),
        ]);
        let coord = coordinator(fetcher.clone());
        let p = params();
        coord.refresh(FeedDomain::Personal, &p).await.unwrap();

        let (refreshed, more) = tokio::join!(
            coord.refresh(FeedDomain::Personal, &p),
            coord.load_more(FeedDomain::Personal, &p, Some("old"))
        );

        assert_eq!(ids(&refreshed.unwrap()), vec!["n", "a", "b"]);
        assert_eq!(ids(&more.unwrap()), vec!["n", "a", "b", "c"]);
        assert_eq!(
            fetcher.cursors(),
            vec![None, None, Some("fresh".to_string())]
        );
    }

    #[tokio::test]
    async fn test_refresh_waits_for_load_more() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a"], Some("c1"))),
            Ok(page(&["b"], Some("c2"))),
            Ok(page(&["x", "a"], Some("c3"))),
        ]);
        let coord = coordinator(fetcher.clone());
        let p = params();
        coord.refresh(FeedDomain::Personal, &p).await.unwrap();

        let (more, refreshed) = tokio::join!(
            coord.load_more(FeedDomain::Personal, &p, Some("c1")),
            coord.refresh(FeedDomain::Personal, &p)
        );

        assert_eq!(ids(&more.unwrap()), vec!["a", "b"]);
        assert_eq!(ids(&refreshed.unwrap()), vec!["x", "a"]);
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(
            coord.page(FeedDomain::Personal, &p).unwrap().next_cursor.as_deref(),
            Some("c3")
        );
    }

    #[tokio::test]
    async fn test_concurrent_load_more_joins() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a"], Some("c1"))),
            Ok(page(&["b"], Some("c2"))),
        ]);
        let coord = coordinator(fetcher.clone());
        let p = params();
        coord.refresh(FeedDomain::Filtered, &p).await.unwrap();

        let (x, y) = tokio::join!(
            coord.load_more(FeedDomain::Filtered, &p, Some("c1")),
            coord.load_more(FeedDomain::Filtered, &p, Some("c1"))
        );

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(x.unwrap(), y.unwrap());
    }

    #[tokio::test]
    async fn test_interleavings_never_duplicate_ids() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a", "b"], Some("c1"))),
            Ok(page(&["b", "c"], Some("c2"))),
            Ok(page(&["c", "a", "d"], Some("c3"))),
            Ok(page(&["d", "e", "a"], Some("c4"))),
            Ok(page(&["e", "f"], None)),
        ]);
        let coord = coordinator(fetcher.clone());
        let p = params();

        let _ = tokio::join!(
            coord.refresh(FeedDomain::Personal, &p),
            coord.load_more(FeedDomain::Personal, &p, None),
            coord.refresh(FeedDomain::Personal, &p),
            coord.load_more(FeedDomain::Personal, &p, Some("c1")),
        );
        let _ = coord.load_more(FeedDomain::Personal, &p, None).await;
        let _ = coord.load_more(FeedDomain::Personal, &p, None).await;

        let merged = coord.page(FeedDomain::Personal, &p).unwrap();
        let unique: HashSet<_> = merged.items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(unique.len(), merged.items.len());
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_refresh() {
        let fetcher = ScriptedFetcher::new(vec![Ok(page(&["a"], None))]);
        let coord = coordinator(fetcher.clone());
        let p = params();

        let (outcome, _) = tokio::join!(coord.refresh(FeedDomain::Personal, &p), async {
            tokio::task::yield_now().await;
            coord.reset_all();
        });

        assert_eq!(outcome.unwrap(), FetchOutcome::Discarded);
        assert!(coord.page(FeedDomain::Personal, &p).is_none());
        assert!(!coord.is_in_flight(FeedDomain::Personal, &p));
        assert_eq!(coord.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_page() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a"], Some("c1"))),
            Err(FeedError::Network("offline".into())),
        ]);
        let coord = coordinator(fetcher.clone());
        let p = params();

        coord.refresh(FeedDomain::Personal, &p).await.unwrap();
        let err = coord.refresh(FeedDomain::Personal, &p).await.unwrap_err();

        assert_eq!(err, FeedError::Network("offline".into()));
        assert_eq!(coord.page(FeedDomain::Personal, &p).unwrap().len(), 1);
        assert!(!coord.is_in_flight(FeedDomain::Personal, &p));
    }

    #[tokio::test]
    async fn test_load_serves_cache_without_network() {
        let fetcher = ScriptedFetcher::new(vec![Ok(page(&["a"], Some("c1")))]);
        let coord = coordinator(fetcher.clone());
        let p = params();

        coord.load(FeedDomain::Trending, &p).await.unwrap();
        let outcome = coord.load(FeedDomain::Trending, &p).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(ids(&outcome), vec!["a"]);
    }

    #[tokio::test]
    async fn test_replaced_post_survives_load_more() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(page(&["a", "b"], Some("c1"))),
            Ok(page(&["c"], None)),
        ]);
        let coord = coordinator(fetcher.clone());
        let p = params();
        coord.refresh(FeedDomain::Personal, &p).await.unwrap();

        let liked = Post::new("a").with_likes(9, true);
        assert_eq!(coord.replace_post(&liked), 1);
        coord.cache().invalidate_domain(FeedDomain::Personal);
        coord.load_more(FeedDomain::Personal, &p, Some("c1")).await.unwrap();

        let cached = coord.cache().read(FeedDomain::Personal, &p).unwrap();
        assert_eq!(cached.items.len(), 3);
        assert_eq!(cached.items[0].engagement.like_count, 9);
    }

    #[tokio::test]
    async fn test_reset_forgets_idle_keys() {
        let fetcher = ScriptedFetcher::new(
            (0..5)
                .map(|i| Ok(page(&[format!("p{}", i).as_str()], None)))
                .collect(),
        );
        let coord = coordinator(fetcher.clone());

        for i in 0..5 {
            let p = params()
                .with("lat", 45.0 + i as f64 / 10.0)
                .with("lng", -122.6);
            coord.refresh(FeedDomain::Nearby, &p).await.unwrap();
            coord.reset(FeedDomain::Nearby, &p);
        }

        assert_eq!(coord.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_invalid_params_never_fetch() {
        let fetcher = ScriptedFetcher::new(vec![]);
        let coord = coordinator(fetcher.clone());
        let bad = FeedParams::new().with("limit", 1000);

        let err = coord.refresh(FeedDomain::Personal, &bad).await.unwrap_err();

        assert!(matches!(err, FeedError::Validation(_)));
        assert_eq!(fetcher.calls(), 0);
    }
}
