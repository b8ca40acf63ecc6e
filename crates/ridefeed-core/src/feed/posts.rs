//! Posts as shown across every feed domain.
//!
//! The same post can appear in several feeds at once. Mutations go through
//! this view so a like on the trending feed also shows up on the personal
//! feed, and a rollback restores each copy exactly as it was.

use std::sync::Arc;

use super::controller::FeedController;
use crate::models::{FeedDomain, Post};
use crate::mutation::EntityStore;

pub struct FeedPosts {
    feeds: Vec<Arc<FeedController>>,
}

impl FeedPosts {
    pub fn new(feeds: Vec<Arc<FeedController>>) -> Self {
        Self { feeds }
    }

    /// First copy of the post found in any feed.
    pub fn get(&self, post_id: &str) -> Option<Post> {
        self.feeds.iter().find_map(|feed| feed.post(post_id))
    }

    /// Domains currently showing the post.
    pub fn domains_showing(&self, post_id: &str) -> Vec<FeedDomain> {
        self.feeds
            .iter()
            .filter(|feed| feed.post(post_id).is_some())
            .map(|feed| feed.domain())
            .collect()
    }
}

impl EntityStore for FeedPosts {
    type Entity = Post;
    /// Each feed's copy, keyed by its position in `feeds`.
    type Snapshot = Vec<(usize, Post)>;

    fn capture(&self, id: &str) -> Option<Self::Snapshot> {
        let copies: Vec<(usize, Post)> = self
            .feeds
            .iter()
            .enumerate()
            .filter_map(|(i, feed)| feed.post(id).map(|post| (i, post)))
            .collect();
        if copies.is_empty() {
            None
        } else {
            Some(copies)
        }
    }

    fn apply(&self, id: &str, transform: &(dyn Fn(&mut Post) + Send + Sync)) {
        for feed in &self.feeds {
            feed.update_post(id, |post| transform(post));
        }
    }

    fn restore(&self, _id: &str, snapshot: Self::Snapshot) {
        for (i, post) in snapshot {
            if let Some(feed) = self.feeds.get(i) {
                feed.replace_post(post);
            }
        }
    }

    fn merge(&self, _id: &str, canonical: Post) {
        for feed in &self.feeds {
            feed.replace_post(canonical.clone());
        }
    }
}
