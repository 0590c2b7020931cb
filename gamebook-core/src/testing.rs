//! Testing utilities for the gamebook engine.
//!
//! This module provides:
//! - `MockPublisher` and `MockCollector` for deterministic game runs with no
//!   console or network
//! - `sample_story()`, a small multi-decision story exercising flags,
//!   conditions, forced branches, and an ending

use crate::game::{ChannelError, Publisher, ReplyCollector};
use crate::story::Story;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A post recorded by [`MockPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPost {
    pub text: String,
    pub reply_to: Option<String>,
}

/// A publisher that records every post and hands out sequential ids.
#[derive(Clone, Default)]
pub struct MockPublisher {
    posts: Arc<Mutex<Vec<MockPost>>>,
    max_post_len: Option<usize>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enforce a post length limit like the live channel does.
    pub fn with_max_post_len(mut self, limit: usize) -> Self {
        self.max_post_len = Some(limit);
        self
    }

    /// Everything posted so far, in order.
    pub fn posts(&self) -> Vec<MockPost> {
        self.posts.lock().expect("mock publisher lock").clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn post(&self, text: &str, reply_to: Option<&str>) -> Result<String, ChannelError> {
        if let Some(limit) = self.max_post_len {
            let length = text.chars().count();
            if length > limit {
                return Err(ChannelError::TooLong { length, limit });
            }
        }

        let mut posts = self.posts.lock().expect("mock publisher lock");
        posts.push(MockPost {
            text: text.to_string(),
            reply_to: reply_to.map(str::to_string),
        });
        Ok(format!("post-{}", posts.len()))
    }

    fn max_post_len(&self) -> Option<usize> {
        self.max_post_len
    }
}

/// A collector that returns scripted reply batches in order, then nothing.
#[derive(Clone, Default)]
pub struct MockCollector {
    batches: Arc<Mutex<VecDeque<Vec<String>>>>,
}

impl MockCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch of reply texts for the next poll.
    pub fn queue_replies(&self, replies: &[&str]) {
        self.batches
            .lock()
            .expect("mock collector lock")
            .push_back(replies.iter().map(|s| s.to_string()).collect());
    }
}

#[async_trait]
impl ReplyCollector for MockCollector {
    async fn collect(
        &self,
        _since_id: &str,
        _since_time: NaiveDateTime,
    ) -> Result<Vec<String>, ChannelError> {
        Ok(self
            .batches
            .lock()
            .expect("mock collector lock")
            .pop_front()
            .unwrap_or_default())
    }
}

/// A small complete story for tests.
///
/// `entrance` sets the `lantern` flag and diverts into the `corridor`
/// decision (`#Left`/`#Right`). The left path sets `wentLeft`. Both paths
/// meet at `fork`, where conditions can reduce three options down to one
/// forced branch, and every branch reaches the `ending` stitch.
pub fn sample_story() -> Story {
    Story::parse(SAMPLE_STORY_JSON.as_bytes()).expect("sample story parses")
}

const SAMPLE_STORY_JSON: &str = r#"{
    "title": "The Cave of Tests",
    "data": {
        "editorData": {"authorName": "DJ Nrrd"},
        "initial": "entrance",
        "stitches": {
            "entrance": {"content": [
                "You have discovered the cave of tests.",
                {"flagName": "lantern"},
                {"pageNum": 1},
                {"divert": "corridor"}
            ]},
            "corridor": {"content": [
                "You see two paths.",
                {"option": "Go #Left", "linkPath": "leftPath",
                 "ifConditions": null, "notIfConditions": null},
                {"option": "Go #Right", "linkPath": "rightPath",
                 "ifConditions": null, "notIfConditions": null}
            ]},
            "leftPath": {"content": [
                "The left path narrows into darkness.",
                {"flagName": "wentLeft"},
                {"divert": "fork"}
            ]},
            "rightPath": {"content": [
                "The right path glitters with quartz.",
                {"divert": "fork"}
            ]},
            "fork": {"content": [
                "A locked gate bars the way out.",
                {"option": "Force the gate #Force", "linkPath": "gateForced",
                 "ifConditions": null, "notIfConditions": null},
                {"option": "Raise the lantern #Lantern", "linkPath": "gateLit",
                 "ifConditions": [{"ifCondition": "lantern"}],
                 "notIfConditions": null},
                {"option": "Turn back #Back", "linkPath": "ending",
                 "ifConditions": null,
                 "notIfConditions": [{"notIfCondition": "wentLeft"}]}
            ]},
            "gateForced": {"content": [
                "The gate gives way.",
                {"divert": "ending"}
            ]},
            "gateLit": {"content": [
                "Lantern light picks out a keyhole, and the key beside it.",
                {"divert": "ending"}
            ]},
            "ending": {"content": [
                "Outside, sunlight."
            ]}
        }
    }
}"#;
