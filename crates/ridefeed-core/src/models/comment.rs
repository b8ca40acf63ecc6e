use serde::{Deserialize, Serialize};

/// A comment under a post. Deletion is a soft flag locally so it can be
/// undone exactly if the server refuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Comment {
    pub id: String,
    #[serde(rename = "postId")]
    pub post_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "isDeleted", default)]
    pub is_deleted: bool,
}

impl Comment {
    pub fn new(id: impl Into<String>, post_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            post_id: post_id.into(),
            author: None,
            body: body.into(),
            is_deleted: false,
        }
    }
}
