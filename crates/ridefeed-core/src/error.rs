//! Error taxonomy shared by the feed pipeline and the mutation engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification surfaced to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ErrorKind {
    /// Transient; the user retries through refresh or load-more.
    Network,
    /// Location access refused. Only produced by the nearby feed.
    PermissionDenied,
    /// Malformed request parameters. A programmer error.
    Validation,
    /// The backend rejected an optimistic change (e.g. "already a member").
    Conflict,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::PermissionDenied => write!(f, "permission denied"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Conflict => write!(f, "conflict"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Rejected by server: {0}")]
    Conflict(String),
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::Network(_) => ErrorKind::Network,
            FeedError::PermissionDenied => ErrorKind::PermissionDenied,
            FeedError::Validation(_) => ErrorKind::Validation,
            FeedError::Conflict(_) => ErrorKind::Conflict,
        }
    }

    /// Short message suitable for a toast or status line.
    pub fn user_message(&self) -> String {
        match self {
            FeedError::Network(_) => "Network error. Check your connection.".to_string(),
            FeedError::PermissionDenied => {
                "Location access is needed to show rides near you.".to_string()
            }
            FeedError::Validation(msg) => format!("Something went wrong: {}", msg),
            FeedError::Conflict(msg) => msg.clone(),
        }
    }
}

/// Failure modes of [`crate::mutation::OptimisticMutationManager::mutate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// Another mutation for the same entity has not settled yet.
    #[error("A change to {0} is already in progress")]
    Busy(String),

    /// The entity is not present in local state, so nothing can be applied.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// The remote operation failed; local state has already been rolled back.
    #[error(transparent)]
    Rejected(#[from] FeedError),
}

impl MutationError {
    /// Kind to surface in the UI. `None` for `Busy`, which is not a failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            MutationError::Rejected(e) => Some(e.kind()),
            MutationError::UnknownEntity(_) => Some(ErrorKind::Validation),
            MutationError::Busy(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_kind() {
        assert_eq!(FeedError::Network("timeout".into()).kind(), ErrorKind::Network);
        assert_eq!(FeedError::PermissionDenied.kind(), ErrorKind::PermissionDenied);
        assert_eq!(FeedError::Conflict("dup".into()).kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_mutation_error_from_feed_error() {
        let err: MutationError = FeedError::Conflict("already a member".into()).into();
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));
        assert_eq!(err.to_string(), "Rejected by server: already a member");
        assert_eq!(MutationError::Busy("p1".into()).kind(), None);
    }
}
