//! Section rendering.
//!
//! One render walks the story graph from a starting stitch, accumulating
//! flags and visible prose, until it reaches a decision point the reader must
//! vote on or a terminal stitch. The walk is an explicit loop: divert chains
//! can be long and must not grow the call stack.

use crate::conditions::passes;
use crate::story::{Choice, Story, StoryError};
use std::collections::BTreeSet;

/// Maximum length of a single prompt chunk, in characters.
pub const MAX_POST_LEN: usize = 280;

const PROMPT_HEADER: &str = "Should we:\n\n";
const PROMPT_FOOTER: &str = "\nReply to this tweet with your preferred Hashtag";

/// A decision point passed through during a render: the stitch key and the
/// flag set as it stood at that moment. These are what the game log records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionEvent {
    pub key: String,
    pub flags: BTreeSet<String>,
}

/// The output of one render: everything between one reader action and the
/// next decision point or the ending.
#[derive(Debug, Clone)]
pub struct Section {
    /// Visible paragraphs, with the choice prompt chunks at the end when the
    /// section stops at a decision point.
    pub text: Vec<String>,
    /// The working flag set after the walk.
    pub flags: BTreeSet<String>,
    /// Decision points passed through, in traversal order.
    pub decisions: Vec<DecisionEvent>,
    /// The story title, when a terminal stitch ended the story here.
    pub ended: Option<String>,
}

/// What a stitch's options resolve to under the current flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedOptions {
    /// Conditions left a single survivor; follow it without asking.
    Forced(String),
    /// A real choice: prompt chunks, each within [`MAX_POST_LEN`].
    Prompt(Vec<String>),
}

/// Walk the story from `start_key` (or the story's initial stitch), applying
/// flags and conditions, until a decision point or an ending.
///
/// Identical inputs produce identical output: the walk owns its accumulators
/// and mutates nothing shared.
pub fn render_section(
    story: &Story,
    flags: BTreeSet<String>,
    start_key: Option<&str>,
) -> Result<Section, StoryError> {
    let mut flags = flags;
    let mut text = Vec::new();
    let mut decisions = Vec::new();
    let mut key = start_key.unwrap_or(&story.initial).to_string();

    loop {
        let stitch = story
            .stitch(&key)
            .ok_or_else(|| StoryError::UnknownKey(key.clone()))?;

        // Flags apply on every visit, shown or not.
        flags.extend(stitch.flag_names.iter().cloned());

        if passes(&flags, &stitch.if_conditions, &stitch.not_if_conditions) {
            text.push(stitch.content.clone());
        }

        // A divert takes precedence over options when a stitch carries both.
        if let Some(divert) = &stitch.divert {
            key = divert.clone();
            continue;
        }

        if !stitch.options.is_empty() {
            decisions.push(DecisionEvent {
                key: key.clone(),
                flags: flags.clone(),
            });
            match format_options(&key, &stitch.options, &flags)? {
                FormattedOptions::Forced(target) => {
                    key = target;
                    continue;
                }
                FormattedOptions::Prompt(chunks) => {
                    text.extend(chunks);
                    return Ok(Section {
                        text,
                        flags,
                        decisions,
                        ended: None,
                    });
                }
            }
        }

        text.push(format!(
            "Thank you for playing {} by {}",
            story.title, story.author
        ));
        return Ok(Section {
            text,
            flags,
            decisions,
            ended: Some(story.title.clone()),
        });
    }
}

/// Resolve a stitch's options under the current flags.
///
/// Options whose conditions fail are dropped, preserving document order. A
/// single survivor is a forced continuation; several become a paginated
/// prompt; none is a [`StoryError::BrokenStory`] for `key`.
pub fn format_options(
    key: &str,
    options: &[Choice],
    flags: &BTreeSet<String>,
) -> Result<FormattedOptions, StoryError> {
    let surviving: Vec<&Choice> = options
        .iter()
        .filter(|choice| passes(flags, &choice.if_conditions, &choice.not_if_conditions))
        .collect();

    if surviving.is_empty() {
        return Err(StoryError::BrokenStory(key.to_string()));
    }
    if let [only] = surviving.as_slice() {
        return Ok(FormattedOptions::Forced(only.target.clone()));
    }

    let mut pieces = vec![PROMPT_HEADER.to_string()];
    pieces.extend(surviving.iter().map(|choice| format!("* {}\n", choice.label)));
    pieces.push(PROMPT_FOOTER.to_string());

    Ok(FormattedOptions::Prompt(pack_pieces(&pieces, MAX_POST_LEN)))
}

/// Pack pieces into chunks of at most `limit` characters without ever
/// splitting a piece. A piece that alone exceeds the limit becomes its own
/// oversized chunk for the publisher to refuse.
fn pack_pieces(pieces: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for piece in pieces {
        let piece_len = piece.chars().count();
        if current_len > 0 && current_len + piece_len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(piece);
        current_len += piece_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Word-wrap prose to `limit` characters per chunk. Words are whitespace
/// separated and never split; other whitespace collapses to single spaces.
pub fn wrap_text(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if current_len == 0 { word_len } else { word_len + 1 };
        if current_len > 0 && current_len + needed > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
