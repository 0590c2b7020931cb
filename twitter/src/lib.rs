//! Minimal Twitter API v2 client.
//!
//! This crate provides a focused client for the two endpoints a story bot
//! needs:
//! - Creating a post, optionally as a reply to an earlier post
//! - Searching recent posts in a conversation for audience replies
//!
//! Authentication is a single OAuth 2.0 bearer token; everything else is
//! out of scope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://api.twitter.com/2";

/// Maximum length of a post, in characters.
pub const POST_CHAR_LIMIT: usize = 280;

/// Errors that can occur when using the Twitter client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("bearer token not configured")]
    NoBearerToken,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("post is {length} characters, the limit is {POST_CHAR_LIMIT}")]
    TooLong { length: usize },
}

/// Twitter API v2 client.
#[derive(Clone)]
pub struct Twitter {
    client: reqwest::Client,
    bearer_token: String,
}

impl Twitter {
    /// Create a new Twitter client with the given bearer token.
    pub fn new(bearer_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            bearer_token: bearer_token.into(),
        }
    }

    /// Create a Twitter client from the TWITTER_BEARER_TOKEN environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let token = std::env::var("TWITTER_BEARER_TOKEN").map_err(|_| Error::NoBearerToken)?;
        Ok(Self::new(token))
    }

    /// Create a post and return its id.
    ///
    /// Text over [`POST_CHAR_LIMIT`] characters is rejected before any
    /// request is made; it is never truncated.
    pub async fn create_post(&self, text: &str, reply_to: Option<&str>) -> Result<String, Error> {
        let length = text.chars().count();
        if length > POST_CHAR_LIMIT {
            return Err(Error::TooLong { length });
        }

        let body = CreatePostRequest {
            text,
            reply: reply_to.map(|id| ReplySettings {
                in_reply_to_tweet_id: id,
            }),
        };

        let response = self
            .client
            .post(format!("{API_BASE}/tweets"))
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message });
        }

        let created: CreatePostResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(created.data.id)
    }

    /// Search the recent-posts index for replies in a conversation, newer
    /// than `since_id`, following pagination until the results run out.
    pub async fn replies_since(
        &self,
        conversation_id: &str,
        since_id: &str,
    ) -> Result<Vec<Reply>, Error> {
        let mut replies = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{API_BASE}/tweets/search/recent"))
                .bearer_auth(&self.bearer_token)
                .query(&[
                    ("query", format!("conversation_id:{conversation_id}")),
                    ("since_id", since_id.to_string()),
                    ("max_results", "100".to_string()),
                ]);
            if let Some(token) = &next_token {
                request = request.query(&[("next_token", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(Error::Api { status, message });
            }

            let page: SearchResponse = response
                .json()
                .await
                .map_err(|e| Error::Parse(e.to_string()))?;

            replies.extend(page.data.unwrap_or_default());

            match page.meta.and_then(|m| m.next_token) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(replies)
    }
}

/// A reply found in a conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct Reply {
    /// The reply's own id.
    pub id: String,
    /// The reply text, hashtags included.
    pub text: String,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreatePostRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplySettings<'a>>,
}

#[derive(Debug, Serialize)]
struct ReplySettings<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<Vec<Reply>>,
    #[serde(default)]
    meta: Option<SearchMeta>,
}

#[derive(Debug, Deserialize)]
struct SearchMeta {
    #[serde(default)]
    next_token: Option<String>,
}
