//! Feed pipeline: pagination coordination and per-domain controllers.
//!
//! The `FeedQueryCoordinator` is shared by all domains and owns merged page
//! state per (domain, params). Each domain gets a `FeedController` that
//! turns coordinator results into a `FeedSnapshot` for subscribers; the
//! nearby domain wraps its controller in `NearbyFeedController` to acquire
//! a location fix first.

pub mod controller;
pub mod coordinator;
pub mod nearby;
pub mod observer;
pub mod posts;
pub mod state;

pub use controller::FeedController;
pub use coordinator::{FeedQueryCoordinator, FetchOutcome};
pub use nearby::{LocationStatus, NearbyFeedController};
pub use observer::{Observers, Subscription};
pub use posts::FeedPosts;
pub use state::{DomainFeedState, FeedPhase, FeedSnapshot};
