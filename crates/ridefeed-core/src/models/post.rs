use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate counters shown under a post.
/// Unsigned so a transform can never drive them negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Engagement {
    #[serde(rename = "likeCount", default)]
    pub like_count: u32,
    #[serde(rename = "commentCount", default)]
    pub comment_count: u32,
    #[serde(rename = "bookmarkCount", default)]
    pub bookmark_count: u32,
}

/// The signed-in rider's own relationship to a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserInteraction {
    #[serde(rename = "isLiked", default)]
    pub is_liked: bool,
    #[serde(rename = "isBookmarked", default)]
    pub is_bookmarked: bool,
    #[serde(rename = "votedOptionId", default)]
    pub voted_option_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PollOption {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub votes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Poll {
    #[serde(default)]
    pub options: Vec<PollOption>,
}

impl Poll {
    pub fn option_mut(&mut self, option_id: &str) -> Option<&mut PollOption> {
        self.options.iter_mut().find(|o| o.id == option_id)
    }

    pub fn total_votes(&self) -> u32 {
        self.options.iter().map(|o| o.votes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "createdAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub engagement: Engagement,
    #[serde(rename = "userInteraction", default)]
    pub user_interaction: UserInteraction,
    #[serde(default)]
    pub poll: Option<Poll>,
}

impl Post {
    /// A bare post with zeroed counters.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: None,
            body: None,
            created_at: None,
            engagement: Engagement::default(),
            user_interaction: UserInteraction::default(),
            poll: None,
        }
    }

    pub fn with_likes(mut self, like_count: u32, is_liked: bool) -> Self {
        self.engagement.like_count = like_count;
        self.user_interaction.is_liked = is_liked;
        self
    }

    pub fn with_poll(mut self, poll: Poll) -> Self {
        self.poll = Some(poll);
        self
    }

    /// Display name of the author, falling back for anonymous posts.
    pub fn author_display(&self) -> &str {
        self.author.as_deref().unwrap_or("Unknown rider")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_deserializes_camel_case() {
        let json = r#"{
            "id": "p1",
            "author": "Ana",
            "engagement": {"likeCount": 3, "commentCount": 1, "bookmarkCount": 0},
            "userInteraction": {"isLiked": true, "isBookmarked": false, "votedOptionId": null}
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, "p1");
        assert_eq!(post.engagement.like_count, 3);
        assert!(post.user_interaction.is_liked);
        assert_eq!(post.author_display(), "Ana");
    }

    #[test]
    fn test_post_missing_engagement_defaults_to_zero() {
        let post: Post = serde_json::from_str(r#"{"id": "p2"}"#).unwrap();
        assert_eq!(post.engagement, Engagement::default());
        assert_eq!(post.author_display(), "Unknown rider");
    }

    #[test]
    fn test_poll_total_votes() {
        let poll = Poll {
            options: vec![
                PollOption { id: "a".into(), label: "Twisties".into(), votes: 4 },
                PollOption { id: "b".into(), label: "Highway".into(), votes: 2 },
            ],
        };
        assert_eq!(poll.total_votes(), 6);
    }
}
