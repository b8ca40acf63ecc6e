use std::fmt;

use crate::models::{FeedDomain, FeedParams};

/// Deterministic identity of a (domain, params) query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    domain: FeedDomain,
    encoded: String,
}

impl CacheKey {
    pub fn new(domain: FeedDomain, params: &FeedParams) -> Self {
        Self {
            domain,
            encoded: format!("{}:{}", domain.as_str(), params.canonical()),
        }
    }

    pub fn domain(&self) -> FeedDomain {
        self.domain
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}
