//! REST client for the ridefeed backend.
//!
//! `ApiClient` is the production implementation of the `FeedFetcher` and
//! `EngagementApi` ports. Authentication is out of scope: callers supply a
//! bearer token obtained elsewhere.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
