use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::Post;

/// One page of a cursor-paginated feed, or the merged view of several.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<Post>,
    /// Opaque token for the next page. `None` means end of feed.
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
}

impl FeedPage {
    /// Build a page whose `has_more` follows the cursor.
    pub fn new(items: Vec<Post>, next_cursor: Option<String>) -> Self {
        let has_more = next_cursor.is_some();
        Self {
            items,
            next_cursor,
            has_more,
        }
    }

    /// Collapse duplicate ids within a single page, keeping the first.
    /// `has_more` is re-derived from the cursor: a null cursor is authoritative
    /// whatever the server claimed.
    pub fn normalized(mut self) -> Self {
        let mut seen = HashSet::with_capacity(self.items.len());
        self.items.retain(|p| seen.insert(p.id.clone()));
        self.has_more = self.next_cursor.is_some();
        self
    }

    /// Append `next`'s items, skipping ids already present, and adopt its cursor.
    /// Returns the number of items actually appended.
    pub fn append(&mut self, next: FeedPage) -> usize {
        let mut seen: HashSet<String> = self.items.iter().map(|p| p.id.clone()).collect();
        let before = self.items.len();
        for post in next.items {
            if seen.insert(post.id.clone()) {
                self.items.push(post);
            }
        }
        self.next_cursor = next.next_cursor;
        self.has_more = self.next_cursor.is_some();
        self.items.len() - before
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(ids: &[&str], cursor: Option<&str>) -> FeedPage {
        FeedPage::new(
            ids.iter().map(|id| Post::new(*id)).collect(),
            cursor.map(str::to_string),
        )
    }

    fn ids(page: &FeedPage) -> Vec<&str> {
        page.items.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_append_skips_existing_ids() {
        let mut merged = page(&["a", "b", "c"], Some("c1"));
        let added = merged.append(page(&["c", "d"], Some("c2")));
        assert_eq!(added, 1);
        assert_eq!(ids(&merged), vec!["a", "b", "c", "d"]);
        assert_eq!(merged.next_cursor.as_deref(), Some("c2"));
        assert!(merged.has_more);
    }

    #[test]
    fn test_append_null_cursor_ends_feed() {
        let mut merged = page(&["a"], Some("c1"));
        merged.append(page(&["b"], None));
        assert!(!merged.has_more);
        assert_eq!(merged.next_cursor, None);
    }

    #[test]
    fn test_normalized_overrides_server_has_more() {
        let mut p = page(&["a", "a", "b"], None);
        p.has_more = true;
        let p = p.normalized();
        assert_eq!(ids(&p), vec!["a", "b"]);
        assert!(!p.has_more);
    }
}
