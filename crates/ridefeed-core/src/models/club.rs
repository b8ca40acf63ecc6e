use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Club {
    pub id: String,
    pub name: String,
    #[serde(rename = "memberCount", default)]
    pub member_count: u32,
    #[serde(rename = "isMember", default)]
    pub is_member: bool,
}

impl Club {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            member_count: 0,
            is_member: false,
        }
    }
}
