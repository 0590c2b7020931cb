//! Console channel pair for interactive testing.
//!
//! The publisher prints each post to stdout and hands back a fresh UUID so
//! ids stay unique across restarts; the collector prompts on stdin and
//! returns whatever line was typed. There is no post length limit.

use crate::game::{ChannelError, Publisher, ReplyCollector};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

/// Prints posts to stdout.
#[derive(Debug, Default)]
pub struct ConsolePublisher;

impl ConsolePublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Publisher for ConsolePublisher {
    async fn post(&self, text: &str, reply_to: Option<&str>) -> Result<String, ChannelError> {
        let rendered = match reply_to {
            Some(parent) => format!("\n[in reply to {parent}]\n{text}\n"),
            None => format!("\n{text}\n"),
        };

        let mut stdout = io::stdout();
        stdout
            .write_all(rendered.as_bytes())
            .await
            .map_err(|e| ChannelError::Publish(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| ChannelError::Publish(e.to_string()))?;

        Ok(Uuid::new_v4().to_string())
    }
}

/// Reads one reply per poll from stdin.
#[derive(Debug, Default)]
pub struct ConsoleCollector;

impl ConsoleCollector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReplyCollector for ConsoleCollector {
    async fn collect(
        &self,
        _since_id: &str,
        _since_time: NaiveDateTime,
    ) -> Result<Vec<String>, ChannelError> {
        let mut stdout = io::stdout();
        stdout
            .write_all(b"Reply with your preferred hashtag: ")
            .await
            .map_err(|e| ChannelError::Collect(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| ChannelError::Collect(e.to_string()))?;

        let mut line = String::new();
        BufReader::new(io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| ChannelError::Collect(e.to_string()))?;

        Ok(vec![line.trim().to_string()])
    }
}
