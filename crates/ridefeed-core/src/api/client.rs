//! HTTP client for the ridefeed REST backend.
//!
//! Implements the feed-fetch and engagement collaborator traits over
//! reqwest. Requests are never retried; failures surface as [`FeedError`]
//! and the caller decides what to do.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::ApiError;
use crate::error::FeedError;
use crate::models::{Club, Comment, FeedDomain, FeedPage, FeedParams, Post, RideEvent};
use crate::models::query::CURSOR_PARAM;
use crate::ports::{EngagementApi, FeedFetcher};

/// Default backend when neither config nor environment names one.
pub const DEFAULT_API_BASE_URL: &str = "https://api.ridefeed.app/v1";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// API client for the ridefeed backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn feed_url(&self, domain: FeedDomain) -> String {
        format!("{}/feeds/{}", self.base_url, domain.as_str())
    }

    fn resource_url(&self, collection: &str, id: &str, action: Option<&str>) -> String {
        match action {
            Some(action) => format!("{}/{}/{}/{}", self.base_url, collection, id, action),
            None => format!("{}/{}/{}", self.base_url, collection, id),
        }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send an engagement request. A success with an empty or unrecognized
    /// body counts as a plain acknowledgement.
    async fn send_action<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Option<T>, ApiError> {
        let response = Self::check_response(builder.send().await?).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            debug!(url = url, "Action acknowledged");
            return Ok(None);
        }
        match serde_json::from_str(&body) {
            Ok(entity) => Ok(Some(entity)),
            Err(e) => {
                warn!(url = url, error = %e, "Unrecognized action response; treating as acknowledged");
                Ok(None)
            }
        }
    }

    async fn action<T: DeserializeOwned>(
        &self,
        method: Method,
        collection: &str,
        id: &str,
        action: Option<&str>,
    ) -> Result<Option<T>, FeedError> {
        let url = self.resource_url(collection, id, action);
        debug!(method = %method, url = %url, "Sending action");
        let builder = self.request(method, &url);
        Ok(self.send_action(builder, &url).await?)
    }
}

#[async_trait]
impl FeedFetcher for ApiClient {
    async fn fetch_page(
        &self,
        domain: FeedDomain,
        params: &FeedParams,
        cursor: Option<&str>,
    ) -> Result<FeedPage, FeedError> {
        let url = self.feed_url(domain);
        let mut query = params.to_query_pairs();
        if let Some(cursor) = cursor {
            query.push((CURSOR_PARAM.to_string(), cursor.to_string()));
        }
        debug!(url = %url, cursor = ?cursor, "Fetching feed page");

        let response = self
            .request(Method::GET, &url)
            .query(&query)
            .send()
            .await
            .map_err(ApiError::from)?;
        let response = Self::check_response(response).await?;
        let page: FeedPage = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(page)
    }
}

#[async_trait]
impl EngagementApi for ApiClient {
    async fn like_post(&self, post_id: &str) -> Result<Option<Post>, FeedError> {
        self.action(Method::POST, "posts", post_id, Some("like")).await
    }

    async fn unlike_post(&self, post_id: &str) -> Result<Option<Post>, FeedError> {
        self.action(Method::DELETE, "posts", post_id, Some("like")).await
    }

    async fn bookmark_post(&self, post_id: &str) -> Result<Option<Post>, FeedError> {
        self.action(Method::POST, "posts", post_id, Some("bookmark")).await
    }

    async fn unbookmark_post(&self, post_id: &str) -> Result<Option<Post>, FeedError> {
        self.action(Method::DELETE, "posts", post_id, Some("bookmark")).await
    }

    async fn vote_poll(&self, post_id: &str, option_id: &str) -> Result<Option<Post>, FeedError> {
        let url = self.resource_url("posts", post_id, Some("vote"));
        let body = serde_json::json!({ "optionId": option_id });
        let builder = self.request(Method::POST, &url).json(&body);
        Ok(self.send_action(builder, &url).await?)
    }

    async fn join_club(&self, club_id: &str) -> Result<Option<Club>, FeedError> {
        self.action(Method::POST, "clubs", club_id, Some("membership")).await
    }

    async fn leave_club(&self, club_id: &str) -> Result<Option<Club>, FeedError> {
        self.action(Method::DELETE, "clubs", club_id, Some("membership")).await
    }

    async fn join_event(&self, event_id: &str) -> Result<Option<RideEvent>, FeedError> {
        self.action(Method::POST, "events", event_id, Some("attendance")).await
    }

    async fn leave_event(&self, event_id: &str) -> Result<Option<RideEvent>, FeedError> {
        self.action(Method::DELETE, "events", event_id, Some("attendance")).await
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<Option<Comment>, FeedError> {
        self.action(Method::DELETE, "comments", comment_id, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new("https://rides.example.com/api/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url(), "https://rides.example.com/api");
    }

    #[test]
    fn test_feed_url() {
        assert_eq!(
            client().feed_url(FeedDomain::Nearby),
            "https://rides.example.com/api/feeds/nearby"
        );
    }

    #[test]
    fn test_resource_urls() {
        let api = client();
        assert_eq!(
            api.resource_url("posts", "p1", Some("like")),
            "https://rides.example.com/api/posts/p1/like"
        );
        assert_eq!(
            api.resource_url("comments", "k9", None),
            "https://rides.example.com/api/comments/k9"
        );
    }

    #[test]
    fn test_with_token_keeps_base_url() {
        let api = client().with_token("abc".into());
        assert_eq!(api.token.as_deref(), Some("abc"));
        assert_eq!(api.base_url(), "https://rides.example.com/api");
    }
}
