//! ridefeed core - client-side feed cache and optimistic mutation layer.
//!
//! This crate sits between UI screens and the ridefeed backend. It serves
//! cursor-paginated feeds (personal, trending, nearby, filtered) through a
//! bounded, expiring cache, coordinates overlapping fetches, and applies
//! engagement actions (likes, bookmarks, votes, club and event membership,
//! comment deletion) optimistically with exact rollback on failure.
//!
//! Most applications only need [`FeedSession`] and [`ApiClient`].

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod mutation;
pub mod ports;
pub mod session;

mod sync;

pub use api::{ApiClient, ApiError};
pub use cache::{CacheConfig, CacheStore};
pub use config::Config;
pub use error::{ErrorKind, FeedError, MutationError};
pub use feed::{FeedController, FeedPhase, FeedQueryCoordinator, FeedSnapshot, Subscription};
pub use models::{Club, Comment, FeedDomain, FeedPage, FeedParams, Post, RideEvent};
pub use mutation::OptimisticMutationManager;
pub use ports::{Coordinates, EngagementApi, FeedFetcher, LocationProvider, StaticLocation};
pub use session::{Collaborators, FeedSession};
