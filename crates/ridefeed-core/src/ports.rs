//! Narrow interfaces to the outside world.
//!
//! Each collaborator is a separate trait so tests can mock exactly the
//! capability under test.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::models::{Club, Comment, FeedDomain, FeedPage, FeedParams, Post, RideEvent};

/// Remote source of feed pages.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch one page. `cursor` is `None` for the first page.
    async fn fetch_page(
        &self,
        domain: FeedDomain,
        params: &FeedParams,
        cursor: Option<&str>,
    ) -> Result<FeedPage, FeedError>;
}

/// Remote engagement actions. Each returns the canonical entity when the
/// backend sends one back, or `None` when it only acknowledges.
#[async_trait]
pub trait EngagementApi: Send + Sync {
    async fn like_post(&self, post_id: &str) -> Result<Option<Post>, FeedError>;
    async fn unlike_post(&self, post_id: &str) -> Result<Option<Post>, FeedError>;
    async fn bookmark_post(&self, post_id: &str) -> Result<Option<Post>, FeedError>;
    async fn unbookmark_post(&self, post_id: &str) -> Result<Option<Post>, FeedError>;
    async fn vote_poll(&self, post_id: &str, option_id: &str) -> Result<Option<Post>, FeedError>;
    async fn join_club(&self, club_id: &str) -> Result<Option<Club>, FeedError>;
    async fn leave_club(&self, club_id: &str) -> Result<Option<Club>, FeedError>;
    async fn join_event(&self, event_id: &str) -> Result<Option<RideEvent>, FeedError>;
    async fn leave_event(&self, event_id: &str) -> Result<Option<RideEvent>, FeedError>;
    async fn delete_comment(&self, comment_id: &str) -> Result<Option<Comment>, FeedError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Device position. Fails with [`FeedError::PermissionDenied`] when the
/// rider has refused location access.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, FeedError>;
}

/// Fixed position, for desktops and for riders who set a home location.
#[derive(Debug, Clone, Copy)]
pub struct StaticLocation(pub Option<Coordinates>);

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_position(&self) -> Result<Coordinates, FeedError> {
        self.0.ok_or(FeedError::PermissionDenied)
    }
}
