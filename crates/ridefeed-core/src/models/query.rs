//! Feed domains and their query parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedError;

/// Largest page size the backend accepts.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Parameter name reserved for the pagination cursor, which the coordinator
/// owns. Callers never pass it in params.
pub const CURSOR_PARAM: &str = "cursor";

/// One independently cached and paginated feed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum FeedDomain {
    Personal,
    Trending,
    Nearby,
    Filtered,
}

impl FeedDomain {
    pub const ALL: [FeedDomain; 4] = [
        FeedDomain::Personal,
        FeedDomain::Trending,
        FeedDomain::Nearby,
        FeedDomain::Filtered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedDomain::Personal => "personal",
            FeedDomain::Trending => "trending",
            FeedDomain::Nearby => "nearby",
            FeedDomain::Filtered => "filtered",
        }
    }

    /// Parse a domain name as typed on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "personal" | "home" => Some(FeedDomain::Personal),
            "trending" => Some(FeedDomain::Trending),
            "nearby" | "local" => Some(FeedDomain::Nearby),
            "filtered" => Some(FeedDomain::Filtered),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeedDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters for a feed request.
///
/// Absent values are never stored, and the backing map is ordered by name,
/// so two parameter sets built in any order compare and encode identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedParams(BTreeMap<String, Value>);

impl FeedParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter. Null values (including non-finite floats) are dropped.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a parameter only when a value is present.
    pub fn with_opt<V: Into<Value>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    /// Integral floats are stored as integers, so `10.0` and `10` are the
    /// same parameter.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        match normalize_numbers(value.into()) {
            Value::Null => {
                self.0.remove(&name);
            }
            v => {
                self.0.insert(name, v);
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Deterministic serialization: fields sorted by name, nested objects too.
    pub fn canonical(&self) -> String {
        // serde_json's Map is ordered unless `preserve_order` is enabled,
        // which this crate never turns on.
        let normalized: BTreeMap<&String, Value> = self
            .0
            .iter()
            .map(|(k, v)| (k, normalize_numbers(v.clone())))
            .collect();
        serde_json::to_string(&normalized).unwrap_or_default()
    }

    /// Flatten into query-string pairs. Arrays become comma-joined lists.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    Value::Array(items) => items
                        .iter()
                        .map(|i| match i {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }

    /// Reject parameter sets the backend would refuse.
    pub fn validate(&self, domain: FeedDomain) -> Result<(), FeedError> {
        if self.0.contains_key(CURSOR_PARAM) {
            return Err(FeedError::Validation(format!(
                "'{}' is managed by the pagination layer",
                CURSOR_PARAM
            )));
        }
        if let Some(limit) = self.0.get("limit") {
            match limit.as_i64() {
                Some(n) if (1..=MAX_PAGE_LIMIT).contains(&n) => {}
                _ => {
                    return Err(FeedError::Validation(format!(
                        "limit must be between 1 and {}, got {}",
                        MAX_PAGE_LIMIT, limit
                    )))
                }
            }
        }
        if domain == FeedDomain::Nearby {
            Self::check_coordinate(self.0.get("lat"), "lat", 90.0)?;
            Self::check_coordinate(self.0.get("lng"), "lng", 180.0)?;
        }
        Ok(())
    }

    fn check_coordinate(value: Option<&Value>, name: &str, bound: f64) -> Result<(), FeedError> {
        match value.and_then(Value::as_f64) {
            Some(v) if (-bound..=bound).contains(&v) => Ok(()),
            Some(v) => Err(FeedError::Validation(format!(
                "{} out of range: {}",
                name, v
            ))),
            None => Err(FeedError::Validation(format!(
                "nearby feed requires '{}'",
                name
            ))),
        }
    }
}

fn normalize_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() && is_integral(f) => Value::from(f as i64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_numbers(v)))
                .collect(),
        ),
        other => other,
    }
}

fn is_integral(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}
