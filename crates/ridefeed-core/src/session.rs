//! Application-session owner.
//!
//! One `FeedSession` per signed-in rider. It owns the cache, the shared
//! pagination coordinator, one controller per feed domain and the mutation
//! managers behind every engagement action. `logout` wipes all of it.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::cache::{CacheConfig, CacheStore};
use crate::config::Config;
use crate::error::{FeedError, MutationError};
use crate::feed::{
    FeedController, FeedPosts, FeedQueryCoordinator, FeedSnapshot, NearbyFeedController,
    Subscription,
};
use crate::models::{Club, Comment, FeedDomain, FeedParams, Post, RideEvent};
use crate::mutation::{transforms, InMemoryEntityStore, OptimisticMutationManager};
use crate::ports::{EngagementApi, FeedFetcher, LocationProvider};

/// External services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn FeedFetcher>,
    pub engagement: Arc<dyn EngagementApi>,
    pub location: Arc<dyn LocationProvider>,
}

pub struct FeedSession {
    cache: Arc<CacheStore>,
    coordinator: Arc<FeedQueryCoordinator>,
    base_params: FeedParams,
    personal: Arc<FeedController>,
    trending: Arc<FeedController>,
    filtered: Arc<FeedController>,
    nearby: NearbyFeedController,
    engagement: Arc<dyn EngagementApi>,
    posts: OptimisticMutationManager<FeedPosts>,
    clubs: OptimisticMutationManager<InMemoryEntityStore<Club>>,
    events: OptimisticMutationManager<InMemoryEntityStore<RideEvent>>,
    comments: OptimisticMutationManager<InMemoryEntityStore<Comment>>,
}

impl FeedSession {
    /// `base_params` apply to every domain (typically just `limit`).
    pub fn new(collaborators: Collaborators, cache_config: CacheConfig, base_params: FeedParams) -> Self {
        let cache = Arc::new(CacheStore::new(cache_config));
        let coordinator = Arc::new(FeedQueryCoordinator::new(collaborators.fetcher, cache.clone()));

        let feed = |domain| {
            Arc::new(FeedController::new(domain, base_params.clone(), coordinator.clone()))
        };
        let personal = feed(FeedDomain::Personal);
        let trending = feed(FeedDomain::Trending);
        let filtered = feed(FeedDomain::Filtered);
        let nearby = NearbyFeedController::new(
            base_params.clone(),
            coordinator.clone(),
            collaborators.location,
        );

        let posts = FeedPosts::new(vec![
            personal.clone(),
            trending.clone(),
            nearby.feed().clone(),
            filtered.clone(),
        ]);

        Self {
            cache,
            coordinator,
            base_params,
            personal,
            trending,
            filtered,
            nearby,
            engagement: collaborators.engagement,
            posts: OptimisticMutationManager::new(Arc::new(posts)),
            clubs: OptimisticMutationManager::new(Arc::new(InMemoryEntityStore::new())),
            events: OptimisticMutationManager::new(Arc::new(InMemoryEntityStore::new())),
            comments: OptimisticMutationManager::new(Arc::new(InMemoryEntityStore::new())),
        }
    }

    pub fn from_config(config: &Config, collaborators: Collaborators) -> Self {
        let base_params = FeedParams::new().with("limit", config.page_size());
        Self::new(collaborators, config.cache_config(), base_params)
    }

    // ===== Feeds =====

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn coordinator(&self) -> &Arc<FeedQueryCoordinator> {
        &self.coordinator
    }

    pub fn controller(&self, domain: FeedDomain) -> &Arc<FeedController> {
        match domain {
            FeedDomain::Personal => &self.personal,
            FeedDomain::Trending => &self.trending,
            FeedDomain::Nearby => self.nearby.feed(),
            FeedDomain::Filtered => &self.filtered,
        }
    }

    pub fn nearby(&self) -> &NearbyFeedController {
        &self.nearby
    }

    pub fn snapshot(&self, domain: FeedDomain) -> FeedSnapshot {
        self.controller(domain).snapshot()
    }

    pub fn subscribe(
        &self,
        domain: FeedDomain,
        listener: impl Fn(&FeedSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        self.controller(domain).subscribe(listener)
    }

    /// Cache-first mount. The nearby feed always needs a fresh fix, so it
    /// refreshes instead.
    pub async fn load(&self, domain: FeedDomain) -> FeedSnapshot {
        match domain {
            FeedDomain::Nearby => self.nearby.refresh().await,
            _ => self.controller(domain).load().await,
        }
    }

    pub async fn refresh(&self, domain: FeedDomain) -> FeedSnapshot {
        match domain {
            FeedDomain::Nearby => self.nearby.refresh().await,
            _ => self.controller(domain).refresh().await,
        }
    }

    pub async fn load_more(&self, domain: FeedDomain) -> FeedSnapshot {
        self.controller(domain).load_more().await
    }

    /// Refresh every domain concurrently.
    pub async fn refresh_all(&self) -> Vec<FeedSnapshot> {
        join_all(FeedDomain::ALL.iter().map(|domain| self.refresh(*domain))).await
    }

    /// Replace the filtered feed's filters and fetch its first page. Merged
    /// pages for earlier filter combinations are dropped; their cache entries
    /// age out on their own.
    pub async fn set_filter(&self, filters: FeedParams) -> FeedSnapshot {
        let mut params = self.base_params.clone();
        for (name, value) in filters.iter() {
            params.set(name.clone(), value.clone());
        }
        self.coordinator.reset_domain(FeedDomain::Filtered);
        self.filtered.set_params(params);
        self.filtered.refresh().await
    }

    // ===== Entity stores =====

    pub fn posts(&self) -> &Arc<FeedPosts> {
        self.posts.store()
    }

    pub fn clubs(&self) -> &Arc<InMemoryEntityStore<Club>> {
        self.clubs.store()
    }

    pub fn events(&self) -> &Arc<InMemoryEntityStore<RideEvent>> {
        self.events.store()
    }

    pub fn comments(&self) -> &Arc<InMemoryEntityStore<Comment>> {
        self.comments.store()
    }

    /// True while any engagement action on `entity_id` is unsettled.
    pub fn is_mutation_in_flight(&self, entity_id: &str) -> bool {
        self.posts.is_in_flight(entity_id)
            || self.clubs.is_in_flight(entity_id)
            || self.events.is_in_flight(entity_id)
            || self.comments.is_in_flight(entity_id)
    }

    // ===== Engagement actions =====

    pub async fn toggle_like(&self, post_id: &str) -> Result<Option<Post>, MutationError> {
        let api = &self.engagement;
        if self.current_post(post_id)?.user_interaction.is_liked {
            self.mutate_post(post_id, transforms::unlike, || api.unlike_post(post_id))
                .await
        } else {
            self.mutate_post(post_id, transforms::like, || api.like_post(post_id))
                .await
        }
    }

    pub async fn toggle_bookmark(&self, post_id: &str) -> Result<Option<Post>, MutationError> {
        let api = &self.engagement;
        if self.current_post(post_id)?.user_interaction.is_bookmarked {
            self.mutate_post(post_id, transforms::unbookmark, || api.unbookmark_post(post_id))
                .await
        } else {
            self.mutate_post(post_id, transforms::bookmark, || api.bookmark_post(post_id))
                .await
        }
    }

    pub async fn vote(&self, post_id: &str, option_id: &str) -> Result<Option<Post>, MutationError> {
        let api = &self.engagement;
        let option = option_id.to_string();
        self.mutate_post(
            post_id,
            move |post: &mut Post| transforms::cast_vote(post, &option),
            || api.vote_poll(post_id, option_id),
        )
        .await
    }

    pub async fn join_club(&self, club_id: &str) -> Result<Option<Club>, MutationError> {
        let api = &self.engagement;
        self.clubs
            .mutate(club_id, transforms::join_club, || api.join_club(club_id))
            .await
    }

    pub async fn leave_club(&self, club_id: &str) -> Result<Option<Club>, MutationError> {
        let api = &self.engagement;
        self.clubs
            .mutate(club_id, transforms::leave_club, || api.leave_club(club_id))
            .await
    }

    pub async fn join_event(&self, event_id: &str) -> Result<Option<RideEvent>, MutationError> {
        let api = &self.engagement;
        self.events
            .mutate(event_id, transforms::join_event, || api.join_event(event_id))
            .await
    }

    pub async fn leave_event(&self, event_id: &str) -> Result<Option<RideEvent>, MutationError> {
        let api = &self.engagement;
        self.events
            .mutate(event_id, transforms::leave_event, || api.leave_event(event_id))
            .await
    }

    /// Soft-delete a comment. Once the server confirms, the parent post's
    /// comment count drops by one in every feed showing it.
    pub async fn delete_comment(&self, comment_id: &str) -> Result<Option<Comment>, MutationError> {
        let api = &self.engagement;
        let Some(comment) = self.comments().get(comment_id) else {
            return Err(MutationError::UnknownEntity(comment_id.to_string()));
        };
        if comment.is_deleted {
            debug!(comment = comment_id, "Comment already deleted");
            return Ok(None);
        }

        let result = self
            .comments
            .mutate(comment_id, transforms::mark_deleted, || api.delete_comment(comment_id))
            .await?;

        // Already confirmed; queue behind any pending like or vote so its
        // rollback cannot erase the decrement.
        let post_id = comment.post_id.as_str();
        let domains = self.posts().domains_showing(post_id);
        let decrement = self
            .posts
            .mutate_when_idle(post_id, transforms::remove_comment_from_count, || async {
                Ok(None)
            })
            .await;
        match decrement {
            Ok(_) => self.publish_confirmed(post_id, domains),
            Err(e) => debug!(post = post_id, error = %e, "Parent post not shown; count left as is"),
        }
        Ok(result)
    }

    // ===== Lifecycle =====

    /// Drop everything tied to the signed-in rider. In-flight fetches settle
    /// as discarded; controllers stay usable for the next sign-in.
    pub fn logout(&self) {
        self.cache.clear();
        self.coordinator.reset_all();
        for feed in [&self.personal, &self.trending, &self.filtered] {
            feed.reset();
        }
        self.nearby.reset();
        self.clubs().clear();
        self.events().clear();
        self.comments().clear();
        info!("Session cleared");
    }

    /// Stop all controllers from publishing. Used when the app shuts down.
    pub fn teardown(&self) {
        for domain in FeedDomain::ALL {
            self.controller(domain).teardown();
        }
    }

    fn current_post(&self, post_id: &str) -> Result<Post, MutationError> {
        self.posts()
            .get(post_id)
            .ok_or_else(|| MutationError::UnknownEntity(post_id.to_string()))
    }

    /// Run a post mutation and, once confirmed, push the result to the
    /// coordinator and invalidate cached pages of every domain that showed
    /// the post.
    async fn mutate_post<T, R, Fut>(
        &self,
        post_id: &str,
        transform: T,
        remote: R,
    ) -> Result<Option<Post>, MutationError>
    where
        T: Fn(&mut Post) + Send + Sync,
        R: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Post>, FeedError>>,
    {
        let domains = self.posts().domains_showing(post_id);
        let result = self.posts.mutate(post_id, transform, remote).await?;
        self.publish_confirmed(post_id, domains);
        Ok(result)
    }

    /// Patch the confirmed post into the coordinator's merged pages so a
    /// later load-more cannot write the old copy back, then drop the cached
    /// pages that held it.
    fn publish_confirmed(&self, post_id: &str, domains: Vec<FeedDomain>) {
        if let Some(post) = self.posts().get(post_id) {
            let patched = self.coordinator.replace_post(&post);
            debug!(post = post_id, pages = patched, "Patched merged pages");
        }
        for domain in domains {
            self.cache.invalidate_domain(domain);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::feed::{FeedPhase, LocationStatus};
    use crate::models::FeedPage;
    use crate::ports::{Coordinates, StaticLocation};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Every feed shows its own post; personal and trending also share "shared".
    struct DomainFetcher;

    #[async_trait]
    impl FeedFetcher for DomainFetcher {
        async fn fetch_page(
            &self,
            domain: FeedDomain,
            _params: &FeedParams,
            _cursor: Option<&str>,
        ) -> Result<FeedPage, FeedError> {
            let mut items = vec![Post::new(format!("{}-1", domain))];
            if matches!(domain, FeedDomain::Personal | FeedDomain::Trending) {
                let mut shared = Post::new("shared").with_likes(5, false);
                shared.engagement.comment_count = 3;
                items.insert(0, shared);
            }
            Ok(FeedPage::new(items, None))
        }
    }

    /// Personal only: "shared" then "tail" on a second page.
    struct PagedFetcher;

    #[async_trait]
    impl FeedFetcher for PagedFetcher {
        async fn fetch_page(
            &self,
            _domain: FeedDomain,
            _params: &FeedParams,
            cursor: Option<&str>,
        ) -> Result<FeedPage, FeedError> {
            match cursor {
                None => Ok(FeedPage::new(
                    vec![Post::new("shared").with_likes(5, false)],
                    Some("c1".into()),
                )),
                Some(_) => Ok(FeedPage::new(vec![Post::new("tail")], None)),
            }
        }
    }

    /// Acknowledges every action, or fails all of them with `failure`.
    /// With `slow_failing_like` set, likes stall for a few polls and fail.
    #[derive(Default)]
    struct MockEngagement {
        calls: AtomicUsize,
        failure: Mutex<Option<FeedError>>,
        slow_failing_like: AtomicBool,
    }

    impl MockEngagement {
        fn respond<T>(&self) -> Result<Option<T>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failure.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(None),
            }
        }
    }

    #[async_trait]
    impl EngagementApi for MockEngagement {
        async fn like_post(&self, _: &str) -> Result<Option<Post>, FeedError> {
            if self.slow_failing_like.load(Ordering::SeqCst) {
                for _ in 0..5 {
                    tokio::task::yield_now().await;
                }
                return Err(FeedError::Network("offline".into()));
            }
            self.respond()
        }
        async fn unlike_post(&self, _: &str) -> Result<Option<Post>, FeedError> {
            self.respond()
        }
        async fn bookmark_post(&self, _: &str) -> Result<Option<Post>, FeedError> {
            self.respond()
        }
        async fn unbookmark_post(&self, _: &str) -> Result<Option<Post>, FeedError> {
            self.respond()
        }
        async fn vote_poll(&self, _: &str, _: &str) -> Result<Option<Post>, FeedError> {
            self.respond()
        }
        async fn join_club(&self, _: &str) -> Result<Option<Club>, FeedError> {
            self.respond()
        }
        async fn leave_club(&self, _: &str) -> Result<Option<Club>, FeedError> {
            self.respond()
        }
        async fn join_event(&self, _: &str) -> Result<Option<RideEvent>, FeedError> {
            self.respond()
        }
        async fn leave_event(&self, _: &str) -> Result<Option<RideEvent>, FeedError> {
            self.respond()
        }
        async fn delete_comment(&self, _: &str) -> Result<Option<Comment>, FeedError> {
            self.respond()
        }
    }

    fn session_with(location: StaticLocation) -> (FeedSession, Arc<MockEngagement>) {
        session_from(Arc::new(DomainFetcher), location)
    }

    fn session_from(
        fetcher: Arc<dyn FeedFetcher>,
        location: StaticLocation,
    ) -> (FeedSession, Arc<MockEngagement>) {
        let engagement = Arc::new(MockEngagement::default());
        let collaborators = Collaborators {
            fetcher,
            engagement: engagement.clone(),
            location: Arc::new(location),
        };
        let session = FeedSession::new(
            collaborators,
            CacheConfig::default(),
            FeedParams::new().with("limit", 10),
        );
        (session, engagement)
    }

    fn session() -> (FeedSession, Arc<MockEngagement>) {
        session_with(StaticLocation(Some(Coordinates {
            latitude: 51.5,
            longitude: -0.12,
        })))
    }

    fn cached(session: &FeedSession, domain: FeedDomain) -> bool {
        session
            .cache()
            .contains(domain, &session.controller(domain).params())
    }

    #[tokio::test]
    async fn test_refresh_all_loads_every_domain() {
        let (session, _) = session();

        let snaps = session.refresh_all().await;

        assert_eq!(snaps.len(), 4);
        for snap in &snaps {
            assert_eq!(snap.phase, FeedPhase::Idle);
            assert!(!snap.posts.is_empty());
        }
        assert!(matches!(
            session.nearby().location_status(),
            LocationStatus::Acquired { .. }
        ));
        assert_eq!(session.cache().len(), 4);
    }

    #[tokio::test]
    async fn test_toggle_like_updates_every_copy_and_invalidates() {
        let (session, engagement) = session();
        session.refresh_all().await;

        let result = session.toggle_like("shared").await;

        assert_eq!(result, Ok(None));
        assert_eq!(engagement.calls.load(Ordering::SeqCst), 1);
        for domain in [FeedDomain::Personal, FeedDomain::Trending] {
            let post = session.controller(domain).post("shared").unwrap();
            assert_eq!(post.engagement.like_count, 6);
            assert!(post.user_interaction.is_liked);
            assert!(!cached(&session, domain));
        }
        assert!(cached(&session, FeedDomain::Filtered));

        // Second toggle unlikes
        session.toggle_like("shared").await.unwrap();
        let post = session.posts().get("shared").unwrap();
        assert_eq!(post.engagement.like_count, 5);
        assert!(!post.user_interaction.is_liked);
    }

    #[tokio::test]
    async fn test_failed_like_rolls_back_and_keeps_cache() {
        let (session, engagement) = session();
        session.refresh_all().await;
        *engagement.failure.lock().unwrap() = Some(FeedError::Network("offline".into()));

        let err = session.toggle_like("shared").await.unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::Network));
        let post = session.posts().get("shared").unwrap();
        assert_eq!(post.engagement.like_count, 5);
        assert!(!post.user_interaction.is_liked);
        assert!(cached(&session, FeedDomain::Personal));
    }

    #[tokio::test]
    async fn test_like_unknown_post() {
        let (session, engagement) = session();

        let err = session.toggle_like("nope").await.unwrap_err();

        assert_eq!(err, MutationError::UnknownEntity("nope".into()));
        assert_eq!(engagement.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_club_join_conflict() {
        let (session, engagement) = session();
        session.clubs().upsert(Club::new("c1", "Ton-Up Club"));
        *engagement.failure.lock().unwrap() = Some(FeedError::Conflict("already a member".into()));

        let err = session.join_club("c1").await.unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::Conflict));
        assert_eq!(session.clubs().get("c1").unwrap().member_count, 0);
        assert!(!session.is_mutation_in_flight("c1"));
    }

    #[tokio::test]
    async fn test_event_attendance() {
        let (session, _) = session();
        session.events().upsert(RideEvent::new("e1", "Dawn patrol"));

        session.join_event("e1").await.unwrap();
        assert!(session.events().get("e1").unwrap().is_attending);

        session.leave_event("e1").await.unwrap();
        let event = session.events().get("e1").unwrap();
        assert!(!event.is_attending);
        assert_eq!(event.attendee_count, 0);
    }

    #[tokio::test]
    async fn test_delete_comment_decrements_post_count() {
        let (session, _) = session();
        session.refresh_all().await;
        session.comments().upsert(Comment::new("k1", "shared", "see you at the pass"));

        session.delete_comment("k1").await.unwrap();

        assert!(session.comments().get("k1").unwrap().is_deleted);
        assert_eq!(
            session.controller(FeedDomain::Trending).post("shared").unwrap().engagement.comment_count,
            2
        );

        // Deleting again is a no-op
        session.delete_comment("k1").await.unwrap();
        assert_eq!(session.posts().get("shared").unwrap().engagement.comment_count, 2);
    }

    #[tokio::test]
    async fn test_confirmed_like_survives_load_more_and_reload() {
        let (session, _) = session_from(Arc::new(PagedFetcher), StaticLocation(None));
        session.refresh(FeedDomain::Personal).await;

        session.toggle_like("shared").await.unwrap();
        session.load_more(FeedDomain::Personal).await;
        let snap = session.load(FeedDomain::Personal).await;

        let shared = snap.posts.iter().find(|p| p.id == "shared").unwrap();
        assert!(shared.user_interaction.is_liked);
        assert_eq!(shared.engagement.like_count, 6);
        let cached = session
            .cache()
            .read(FeedDomain::Personal, &session.controller(FeedDomain::Personal).params())
            .unwrap();
        assert_eq!(cached.items.len(), 2);
        assert_eq!(cached.items[0].engagement.like_count, 6);
    }

    #[tokio::test]
    async fn test_comment_delete_survives_failed_like_rollback() {
        let (session, engagement) = session();
        session.refresh_all().await;
        session.comments().upsert(Comment::new("k1", "shared", "see you at the pass"));
        engagement.slow_failing_like.store(true, Ordering::SeqCst);

        let (like, delete) = tokio::join!(
            session.toggle_like("shared"),
            session.delete_comment("k1")
        );

        assert_eq!(like.unwrap_err().kind(), Some(ErrorKind::Network));
        assert!(delete.is_ok());
        for domain in [FeedDomain::Personal, FeedDomain::Trending] {
            let post = session.controller(domain).post("shared").unwrap();
            assert_eq!(post.engagement.comment_count, 2);
            assert_eq!(post.engagement.like_count, 5);
            assert!(!post.user_interaction.is_liked);
        }
        assert!(!session.is_mutation_in_flight("shared"));
    }

    #[tokio::test]
    async fn test_nearby_denied_through_session() {
        let (session, _) = session_with(StaticLocation(None));

        let snap = session.refresh(FeedDomain::Nearby).await;

        assert_eq!(snap.error, Some(ErrorKind::PermissionDenied));
        assert!(snap.posts.is_empty());
        assert_eq!(session.nearby().location_status(), LocationStatus::Denied);
    }

    #[tokio::test]
    async fn test_set_filter_keeps_base_params() {
        let (session, _) = session();
        let unfiltered = session.controller(FeedDomain::Filtered).params();
        session.refresh(FeedDomain::Filtered).await;
        assert!(session.coordinator().page(FeedDomain::Filtered, &unfiltered).is_some());

        let snap = session
            .set_filter(FeedParams::new().with("tags", vec!["adventure", "offroad"]))
            .await;

        assert_eq!(snap.phase, FeedPhase::Idle);
        let params = session.controller(FeedDomain::Filtered).params();
        assert_eq!(params.get("limit").and_then(|v| v.as_i64()), Some(10));
        assert!(params.get("tags").is_some());
        assert!(session.coordinator().page(FeedDomain::Filtered, &unfiltered).is_none());
        assert!(session.cache().contains(FeedDomain::Filtered, &unfiltered));
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let (session, _) = session();
        session.refresh_all().await;
        session.clubs().upsert(Club::new("c1", "Ton-Up Club"));

        session.logout();

        assert!(session.cache().is_empty());
        assert!(session.clubs().is_empty());
        assert_eq!(session.nearby().location_status(), LocationStatus::Unknown);
        assert!(session.controller(FeedDomain::Nearby).params().get("lat").is_none());
        for domain in FeedDomain::ALL {
            let snap = session.snapshot(domain);
            assert!(snap.posts.is_empty());
            assert_eq!(snap.phase, FeedPhase::Idle);
        }
    }
}
