//! Live channel pair over the Twitter API.
//!
//! Thin adapters from the [`twitter`] client onto the game's channel traits.
//! The publisher enforces the 280-character maximum by construction (the
//! client rejects long text before any request); the collector searches the
//! prompt's conversation for replies newer than the prompt itself.

use crate::game::{ChannelError, Publisher, ReplyCollector};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use twitter::{Twitter, POST_CHAR_LIMIT};

/// Posts sections to Twitter.
pub struct LivePublisher {
    client: Twitter,
}

impl LivePublisher {
    pub fn new(client: Twitter) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Publisher for LivePublisher {
    async fn post(&self, text: &str, reply_to: Option<&str>) -> Result<String, ChannelError> {
        self.client
            .create_post(text, reply_to)
            .await
            .map_err(publish_error)
    }

    fn max_post_len(&self) -> Option<usize> {
        Some(POST_CHAR_LIMIT)
    }
}

/// Collects audience replies from the prompt's conversation.
pub struct LiveCollector {
    client: Twitter,
}

impl LiveCollector {
    pub fn new(client: Twitter) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReplyCollector for LiveCollector {
    async fn collect(
        &self,
        since_id: &str,
        _since_time: NaiveDateTime,
    ) -> Result<Vec<String>, ChannelError> {
        // The prompt post roots its own conversation; replies newer than the
        // prompt are exactly the votes for this decision point.
        let replies = self
            .client
            .replies_since(since_id, since_id)
            .await
            .map_err(|e| ChannelError::Collect(e.to_string()))?;

        Ok(replies.into_iter().map(|reply| reply.text).collect())
    }
}

fn publish_error(error: twitter::Error) -> ChannelError {
    match error {
        twitter::Error::TooLong { length } => ChannelError::TooLong {
            length,
            limit: POST_CHAR_LIMIT,
        },
        other => ChannelError::Publish(other.to_string()),
    }
}
