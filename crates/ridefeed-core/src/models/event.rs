use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A group ride or meetup riders can sign up for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct RideEvent {
    pub id: String,
    pub title: String,
    #[serde(rename = "startsAt", default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "attendeeCount", default)]
    pub attendee_count: u32,
    #[serde(rename = "isAttending", default)]
    pub is_attending: bool,
}

impl RideEvent {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            starts_at: None,
            attendee_count: 0,
            is_attending: false,
        }
    }
}
