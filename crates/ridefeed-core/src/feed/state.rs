use serde::Serialize;

use crate::error::ErrorKind;
use crate::models::{FeedDomain, FeedPage, Post};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum FeedPhase {
    #[default]
    Idle,
    Refreshing,
    LoadingMore,
    Error,
}

/// Per-domain feed state. Post ids are unique and order is display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainFeedState {
    pub posts: Vec<Post>,
    pub cursor: Option<String>,
    pub has_more: bool,
    pub phase: FeedPhase,
    pub error: Option<ErrorKind>,
    /// Set when the last failure came from load-more, so load-more may be
    /// retried straight from the error phase.
    pub(crate) load_more_failed: bool,
}

impl DomainFeedState {
    /// Replace the list with a fresh first page.
    pub(crate) fn replace(&mut self, page: FeedPage) {
        self.posts = page.items;
        self.cursor = page.next_cursor;
        self.has_more = page.has_more;
    }

    /// Merge a page into the list, skipping ids already shown.
    pub(crate) fn append(&mut self, page: FeedPage) {
        let mut merged = FeedPage {
            items: std::mem::take(&mut self.posts),
            next_cursor: self.cursor.take(),
            has_more: self.has_more,
        };
        merged.append(page);
        self.replace(merged);
    }

    pub(crate) fn settle(&mut self) {
        self.phase = FeedPhase::Idle;
        self.error = None;
        self.load_more_failed = false;
    }

    pub(crate) fn fail(&mut self, kind: ErrorKind, during_load_more: bool) {
        self.phase = FeedPhase::Error;
        self.error = Some(kind);
        self.load_more_failed = during_load_more;
    }

    pub fn can_load_more(&self) -> bool {
        self.has_more
            && (self.phase == FeedPhase::Idle
                || (self.phase == FeedPhase::Error && self.load_more_failed))
    }
}

/// Read-only view handed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct FeedSnapshot {
    pub domain: FeedDomain,
    pub posts: Vec<Post>,
    pub has_more: bool,
    pub phase: FeedPhase,
    pub error: Option<ErrorKind>,
}

impl FeedSnapshot {
    pub(crate) fn of(domain: FeedDomain, state: &DomainFeedState) -> Self {
        Self {
            domain,
            posts: state.posts.clone(),
            has_more: state.has_more,
            phase: state.phase,
            error: state.error,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, FeedPhase::Refreshing | FeedPhase::LoadingMore)
    }
}
