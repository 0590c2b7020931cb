//! The game loop and its channel capabilities.
//!
//! A [`Game`] owns a story, a game log, and the two channel capabilities:
//! a [`Publisher`] that posts text and a [`ReplyCollector`] that gathers
//! audience replies. Each loop iteration reconstructs the session from the
//! log, gathers votes if the session stopped at a decision point, renders
//! the next section, publishes it, and appends the new state. The log is
//! the only persisted state, so killing the process at any point and
//! restarting resumes cleanly.

use crate::gamelog::{GameLog, LogError, Resume, SessionState};
use crate::render::{render_section, wrap_text};
use crate::story::{Story, StoryError};
use crate::tally::{extract_tags, tally};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

const RETRY_BASE: Duration = Duration::from_secs(30);
const RETRY_CAP: Duration = Duration::from_secs(15 * 60);
const RETRY_ATTEMPTS: u32 = 6;

/// Errors from a publish or collect attempt.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("publish failed: {0}")]
    Publish(String),

    #[error("collect failed: {0}")]
    Collect(String),

    #[error("post is {length} characters, the channel limit is {limit}")]
    TooLong { length: usize, limit: usize },
}

impl ChannelError {
    /// Whether retrying the same call could possibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ChannelError::TooLong { .. })
    }
}

/// Errors from running a game.
#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Story(#[from] StoryError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("no valid votes arrived at '{key}' within the configured poll rounds")]
    NoValidVotes { key: String },

    #[error("unreadable period '{0}', expected forms like 90s, 30m, 24h, 3d")]
    InvalidPeriod(String),
}

/// Outbound channel: posts text, optionally threading onto an earlier post.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `text`, replying to `reply_to` when given, and return the new
    /// post's id. Text over the channel's maximum must be rejected, never
    /// truncated.
    async fn post(&self, text: &str, reply_to: Option<&str>) -> Result<String, ChannelError>;

    /// The channel's maximum post length in characters, if it has one.
    fn max_post_len(&self) -> Option<usize> {
        None
    }
}

/// Inbound channel: gathers reply texts newer than a given post.
#[async_trait]
pub trait ReplyCollector: Send + Sync {
    /// Collect raw reply texts posted after `since_id` / `since_time`.
    async fn collect(
        &self,
        since_id: &str,
        since_time: NaiveDateTime,
    ) -> Result<Vec<String>, ChannelError>;
}

/// Parse a reply-window period like `90s`, `30m`, `24h`, or `3d`.
pub fn parse_period(input: &str) -> Result<Duration, GameError> {
    let input = input.trim();
    let Some((last_at, unit)) = input.char_indices().last() else {
        return Err(GameError::InvalidPeriod(input.to_string()));
    };
    let value: u64 = input[..last_at]
        .parse()
        .map_err(|_| GameError::InvalidPeriod(input.to_string()))?;
    let seconds = match unit {
        's' => value,
        'm' => value * 60,
        'h' => value * 60 * 60,
        'd' => value * 60 * 60 * 24,
        _ => return Err(GameError::InvalidPeriod(input.to_string())),
    };
    Ok(Duration::from_secs(seconds))
}

/// Configuration for running a game.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// How long to wait for audience replies at each decision point.
    pub period: Duration,
    /// Degrade unreadable log state to a fresh start instead of failing.
    /// Off by default: silently restarting discards audience progress.
    pub tolerate_corrupt_log: bool,
    /// How many reply windows to wait through with no valid vote before
    /// giving up. `None` re-polls until a valid vote arrives.
    pub max_poll_rounds: Option<u32>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(24 * 60 * 60),
            tolerate_corrupt_log: false,
            max_poll_rounds: None,
        }
    }
}

impl GameConfig {
    /// Set the reply window.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Degrade unreadable log state to a fresh start.
    pub fn with_tolerate_corrupt_log(mut self) -> Self {
        self.tolerate_corrupt_log = true;
        self
    }

    /// Bound the number of empty reply windows before giving up.
    pub fn with_max_poll_rounds(mut self, rounds: u32) -> Self {
        self.max_poll_rounds = Some(rounds);
        self
    }
}

/// One story session driven over a channel pair.
pub struct Game {
    story: Story,
    log: GameLog,
    publisher: Box<dyn Publisher>,
    collector: Box<dyn ReplyCollector>,
    config: GameConfig,
}

impl Game {
    /// Assemble a game from its parts.
    pub fn new(
        story: Story,
        log: GameLog,
        publisher: Box<dyn Publisher>,
        collector: Box<dyn ReplyCollector>,
        config: GameConfig,
    ) -> Self {
        Self {
            story,
            log,
            publisher,
            collector,
            config,
        }
    }

    /// Run the session to the story's end.
    ///
    /// Strictly sequential: reconstruct, wait for votes if mid-choice,
    /// render, publish, append, repeat. Returns once the log records the
    /// end marker, including when a previous run already recorded it.
    pub async fn play(&mut self) -> Result<(), GameError> {
        loop {
            let resume = self
                .log
                .load_last_state(&self.story.title, self.config.tolerate_corrupt_log)
                .await?;

            let ended = match resume {
                Resume::Ended => return Ok(()),
                Resume::Fresh => {
                    self.run_section(None, BTreeSet::new(), None, Vec::new())
                        .await?
                }
                Resume::InProgress(state) => {
                    let (summary, winner) = self.await_votes(&state).await?;
                    self.run_section(
                        Some(winner.as_str()),
                        state.flags.clone(),
                        Some(state.last_message_id.clone()),
                        summary,
                    )
                    .await?
                }
            };

            if ended {
                return Ok(());
            }
        }
    }

    /// Wait out the reply window, then poll and tally until a valid vote
    /// decides the next key.
    async fn await_votes(
        &self,
        state: &SessionState,
    ) -> Result<(Vec<String>, String), GameError> {
        let valid = self.story.hashtags(&state.current_key)?;
        self.wait_for_window(state.logged_at).await;

        let mut rounds = 0u32;
        loop {
            let replies = self
                .collect_with_retry(&state.last_message_id, state.logged_at)
                .await?;
            let collected = extract_tags(&replies);
            let (summary, winner) = tally(&collected, &valid);

            if let Some(winner) = winner {
                return Ok((summary, winner));
            }

            rounds += 1;
            if let Some(max) = self.config.max_poll_rounds {
                if rounds >= max {
                    return Err(GameError::NoValidVotes {
                        key: state.current_key.clone(),
                    });
                }
            }
            self.log
                .append_debug(&format!(
                    "no valid votes at {} yet, waiting another window",
                    state.current_key
                ))
                .await?;
            tokio::time::sleep(self.config.period).await;
        }
    }

    /// Sleep until `logged_at + period`, clamped to at most one period so
    /// the assumed-year timestamp limitation can never stall the bot.
    async fn wait_for_window(&self, logged_at: NaiveDateTime) {
        if self.config.period.is_zero() {
            return;
        }
        let Ok(period) = chrono::Duration::from_std(self.config.period) else {
            return;
        };
        let deadline = logged_at + period;
        let remaining = deadline - Local::now().naive_local();
        if let Ok(remaining) = remaining.to_std() {
            tokio::time::sleep(remaining.min(self.config.period)).await;
        }
    }

    /// Render one section and carry it out: append its decision events (and
    /// end marker), publish the vote summary and every paragraph as a reply
    /// chain, and record the prompt's message id for a decision section.
    ///
    /// Returns whether the story ended here.
    async fn run_section(
        &self,
        start_key: Option<&str>,
        flags: BTreeSet<String>,
        reply_to: Option<String>,
        summary: Vec<String>,
    ) -> Result<bool, GameError> {
        let section = render_section(&self.story, flags, start_key)?;

        for decision in &section.decisions {
            self.log
                .append_decision_point(&decision.key, &decision.flags)
                .await?;
        }
        if let Some(title) = &section.ended {
            self.log.append_end(title).await?;
        }

        let mut last_id = reply_to;
        if !summary.is_empty() {
            let id = self
                .post_with_retry(&summary.join("\n"), last_id.as_deref())
                .await?;
            last_id = Some(id);
        }
        for paragraph in &section.text {
            for chunk in self.split_for_post(paragraph) {
                let id = self.post_with_retry(&chunk, last_id.as_deref()).await?;
                last_id = Some(id);
            }
        }

        // A decision section logs the prompt's id, the post replies land on.
        // A terminal section logs nothing more; GAMEEND is its last word.
        if section.ended.is_none() {
            if let Some(id) = &last_id {
                self.log.append_message_id(id).await?;
            }
        }

        Ok(section.ended.is_some())
    }

    /// Word-wrap a paragraph to the publisher's limit when it has one.
    fn split_for_post(&self, text: &str) -> Vec<String> {
        match self.publisher.max_post_len() {
            Some(limit) if text.chars().count() > limit => wrap_text(text, limit),
            _ => vec![text.to_string()],
        }
    }

    async fn post_with_retry(
        &self,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<String, GameError> {
        let mut backoff = RETRY_BASE;
        let mut attempt = 0u32;
        loop {
            match self.publisher.post(text, reply_to).await {
                Ok(id) => return Ok(id),
                Err(e) if e.is_retryable() && attempt + 1 < RETRY_ATTEMPTS => {
                    self.log
                        .append_debug(&format!("publish attempt {} failed: {e}", attempt + 1))
                        .await?;
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(RETRY_CAP);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn collect_with_retry(
        &self,
        since_id: &str,
        since_time: NaiveDateTime,
    ) -> Result<Vec<String>, GameError> {
        let mut backoff = RETRY_BASE;
        let mut attempt = 0u32;
        loop {
            match self.collector.collect(since_id, since_time).await {
                Ok(replies) => return Ok(replies),
                Err(e) if e.is_retryable() && attempt + 1 < RETRY_ATTEMPTS => {
                    self.log
                        .append_debug(&format!("collect attempt {} failed: {e}", attempt + 1))
                        .await?;
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(RETRY_CAP);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
