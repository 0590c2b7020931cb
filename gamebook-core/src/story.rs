//! Story document loading.
//!
//! An inklewriter export is a JSON object whose `data.stitches` map holds the
//! story graph. Each stitch's `content` array starts with the prose paragraph
//! and continues with annotation objects: a divert, reader options, flags to
//! set, visibility conditions, and page metadata. This module parses that
//! document into an immutable [`Story`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

lazy_static! {
    /// Hashtag pattern shared by option labels and audience replies.
    pub(crate) static ref HASHTAG: Regex =
        Regex::new("#[0-9a-zA-Z]+").expect("hashtag pattern is valid");
}

/// Errors from loading or querying a story.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("not an inklewriter story document: {0}")]
    Format(String),

    #[error("no stitch named '{0}' in the story")]
    UnknownKey(String),

    #[error("no option passes at '{0}', the story cannot continue")]
    BrokenStory(String),

    #[error("expected exactly one hashtag in option label {label:?}")]
    OptionHashtag { label: String },
}

/// A reader-chosen edge out of a stitch.
#[derive(Debug, Clone)]
pub struct Choice {
    /// Display text, expected to carry exactly one `#hashtag`.
    pub label: String,
    /// Key of the successor stitch.
    pub target: String,
    /// Flags that must all be set for this choice to be visible.
    pub if_conditions: BTreeSet<String>,
    /// Flags that hide this choice once every one of them is set.
    pub not_if_conditions: BTreeSet<String>,
}

/// A node in the story graph.
#[derive(Debug, Clone)]
pub struct Stitch {
    /// Unique key within the story.
    pub key: String,
    /// The stitch's prose paragraph.
    pub content: String,
    /// Unconditional successor, if any.
    pub divert: Option<String>,
    /// Reader choices, in document order.
    pub options: Vec<Choice>,
    /// Flags set whenever this stitch is visited.
    pub flag_names: BTreeSet<String>,
    /// Flags that must all be set for the prose to be shown.
    pub if_conditions: BTreeSet<String>,
    /// Flags that hide the prose once every one of them is set.
    pub not_if_conditions: BTreeSet<String>,
    /// Page number from the editor, if present.
    pub page_num: Option<u32>,
    /// Page label from the editor, if present.
    pub page_label: Option<String>,
}

/// A loaded story: metadata plus the stitch graph. Immutable after parse.
#[derive(Debug, Clone)]
pub struct Story {
    /// Story title.
    pub title: String,
    /// Author name from the editor metadata.
    pub author: String,
    /// Key of the stitch the story starts from.
    pub initial: String,
    stitches: HashMap<String, Stitch>,
}

impl Story {
    /// Parse a story from the raw bytes of an inklewriter JSON export.
    ///
    /// Fetching those bytes (local file vs. HTTP) is the caller's concern.
    pub fn parse(source: &[u8]) -> Result<Self, StoryError> {
        let doc: SourceDocument =
            serde_json::from_slice(source).map_err(|e| StoryError::Format(e.to_string()))?;

        let mut stitches = HashMap::new();
        for (key, raw) in doc.data.stitches {
            let stitch = Stitch::from_source(&key, raw)?;
            stitches.insert(key, stitch);
        }

        Ok(Self {
            title: doc.title,
            author: doc.data.editor_data.author_name,
            initial: doc.data.initial,
            stitches,
        })
    }

    /// Look up a stitch by key.
    pub fn stitch(&self, key: &str) -> Option<&Stitch> {
        self.stitches.get(key)
    }

    /// Number of stitches in the story.
    pub fn len(&self) -> usize {
        self.stitches.len()
    }

    /// Whether the story has no stitches at all.
    pub fn is_empty(&self) -> bool {
        self.stitches.is_empty()
    }

    /// Map each option hashtag at `key` (uppercased) to its target stitch.
    ///
    /// Every option label must carry exactly one hashtag; anything else is an
    /// authoring error surfaced as [`StoryError::OptionHashtag`].
    pub fn hashtags(&self, key: &str) -> Result<HashMap<String, String>, StoryError> {
        let stitch = self
            .stitch(key)
            .ok_or_else(|| StoryError::UnknownKey(key.to_string()))?;

        let mut tags = HashMap::new();
        for choice in &stitch.options {
            let mut found = HASHTAG.find_iter(&choice.label);
            match (found.next(), found.next()) {
                (Some(tag), None) => {
                    tags.insert(tag.as_str().to_uppercase(), choice.target.clone());
                }
                _ => {
                    return Err(StoryError::OptionHashtag {
                        label: choice.label.clone(),
                    })
                }
            }
        }
        Ok(tags)
    }
}

impl Stitch {
    fn from_source(key: &str, raw: SourceStitch) -> Result<Self, StoryError> {
        let mut items = raw.content.into_iter();
        let content = match items.next() {
            Some(ContentItem::Text(text)) => text,
            _ => {
                return Err(StoryError::Format(format!(
                    "stitch '{key}' does not start with text content"
                )))
            }
        };

        let mut stitch = Self {
            key: key.to_string(),
            content,
            divert: None,
            options: Vec::new(),
            flag_names: BTreeSet::new(),
            if_conditions: BTreeSet::new(),
            not_if_conditions: BTreeSet::new(),
            page_num: None,
            page_label: None,
        };

        for item in items {
            let note = match item {
                ContentItem::Annotation(note) => note,
                // Stray text past the first element carries no story data.
                ContentItem::Text(_) => continue,
            };

            // Only the first divert counts; later ones are authoring noise.
            if let Some(divert) = note.divert {
                stitch.divert.get_or_insert(divert);
            }
            if let Some(label) = note.option {
                let target = note.link_path.ok_or_else(|| {
                    StoryError::Format(format!("option {label:?} in stitch '{key}' has no linkPath"))
                })?;
                stitch.options.push(Choice {
                    label,
                    target,
                    if_conditions: note
                        .if_conditions
                        .unwrap_or_default()
                        .into_iter()
                        .map(|c| c.if_condition)
                        .collect(),
                    not_if_conditions: note
                        .not_if_conditions
                        .unwrap_or_default()
                        .into_iter()
                        .map(|c| c.not_if_condition)
                        .collect(),
                });
                continue;
            }
            if let Some(flag) = note.flag_name {
                stitch.flag_names.insert(flag);
            }
            if let Some(flag) = note.if_condition {
                stitch.if_conditions.insert(flag);
            }
            if let Some(flag) = note.not_if_condition {
                stitch.not_if_conditions.insert(flag);
            }
            // Last write wins; the editor emits at most one of each.
            if let Some(num) = note.page_num {
                stitch.page_num = Some(num);
            }
            if let Some(label) = note.page_label {
                stitch.page_label = Some(label);
            }
        }

        Ok(stitch)
    }
}

// ============================================================================
// Source document shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct SourceDocument {
    title: String,
    data: SourceData,
}

#[derive(Debug, Deserialize)]
struct SourceData {
    #[serde(rename = "editorData")]
    editor_data: EditorData,
    initial: String,
    stitches: HashMap<String, SourceStitch>,
}

#[derive(Debug, Deserialize)]
struct EditorData {
    #[serde(rename = "authorName")]
    author_name: String,
}

#[derive(Debug, Deserialize)]
struct SourceStitch {
    content: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentItem {
    Text(String),
    Annotation(Annotation),
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    divert: Option<String>,
    #[serde(default)]
    option: Option<String>,
    #[serde(rename = "linkPath", default)]
    link_path: Option<String>,
    #[serde(rename = "ifConditions", default)]
    if_conditions: Option<Vec<IfCondition>>,
    #[serde(rename = "notIfConditions", default)]
    not_if_conditions: Option<Vec<NotIfCondition>>,
    #[serde(rename = "ifCondition", default)]
    if_condition: Option<String>,
    #[serde(rename = "notIfCondition", default)]
    not_if_condition: Option<String>,
    #[serde(rename = "flagName", default)]
    flag_name: Option<String>,
    #[serde(rename = "pageNum", default)]
    page_num: Option<u32>,
    #[serde(rename = "pageLabel", default)]
    page_label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IfCondition {
    #[serde(rename = "ifCondition")]
    if_condition: String,
}

#[derive(Debug, Deserialize)]
struct NotIfCondition {
    #[serde(rename = "notIfCondition")]
    not_if_condition: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_story;

    fn story_from(json: &str) -> Result<Story, StoryError> {
        Story::parse(json.as_bytes())
    }

    #[test]
    fn test_parse_sample_story() {
        let story = sample_story();
        assert_eq!(story.title, "The Cave of Tests");
        assert_eq!(story.author, "DJ Nrrd");
        assert_eq!(story.initial, "entrance");
        assert_eq!(story.len(), 8);
    }

    #[test]
    fn test_stitch_fields() {
        let story = sample_story();

        let entrance = story.stitch("entrance").unwrap();
        assert_eq!(entrance.divert.as_deref(), Some("corridor"));
        assert!(entrance.flag_names.contains("lantern"));
        assert!(entrance.options.is_empty());

        let corridor = story.stitch("corridor").unwrap();
        assert_eq!(corridor.content, "You see two paths.");
        assert!(corridor.divert.is_none());
        assert_eq!(corridor.options.len(), 2);
        assert_eq!(corridor.options[0].label, "Go #Left");
        assert_eq!(corridor.options[0].target, "leftPath");
    }

    #[test]
    fn test_option_conditions_parsed() {
        let story = sample_story();
        let fork = story.stitch("fork").unwrap();

        assert!(fork.options[1].if_conditions.contains("lantern"));
        assert!(fork.options[2].not_if_conditions.contains("wentLeft"));
    }

    #[test]
    fn test_parse_rejects_bad_json() {
        assert!(matches!(story_from("not json"), Err(StoryError::Format(_))));
    }

    #[test]
    fn test_parse_rejects_missing_data_block() {
        let result = story_from(r#"{"title": "No Data Here"}"#);
        assert!(matches!(result, Err(StoryError::Format(_))));
    }

    #[test]
    fn test_parse_rejects_stitch_without_leading_text() {
        let result = story_from(
            r#"{
                "title": "Bad",
                "data": {
                    "editorData": {"authorName": "A"},
                    "initial": "start",
                    "stitches": {"start": {"content": [{"divert": "end"}]}}
                }
            }"#,
        );
        assert!(matches!(result, Err(StoryError::Format(msg)) if msg.contains("start")));
    }

    #[test]
    fn test_parse_rejects_option_without_link_path() {
        let result = story_from(
            r#"{
                "title": "Bad",
                "data": {
                    "editorData": {"authorName": "A"},
                    "initial": "start",
                    "stitches": {
                        "start": {"content": ["text", {"option": "Go #On"}]}
                    }
                }
            }"#,
        );
        assert!(matches!(result, Err(StoryError::Format(msg)) if msg.contains("linkPath")));
    }

    #[test]
    fn test_first_divert_wins() {
        let story = story_from(
            r#"{
                "title": "Diverts",
                "data": {
                    "editorData": {"authorName": "A"},
                    "initial": "start",
                    "stitches": {
                        "start": {"content": ["text", {"divert": "first"}, {"divert": "second"}]}
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(story.stitch("start").unwrap().divert.as_deref(), Some("first"));
    }

    #[test]
    fn test_page_metadata_last_write_wins() {
        let story = story_from(
            r#"{
                "title": "Pages",
                "data": {
                    "editorData": {"authorName": "A"},
                    "initial": "start",
                    "stitches": {
                        "start": {"content": ["text", {"pageNum": 1, "pageLabel": "One"}, {"pageNum": 2}]}
                    }
                }
            }"#,
        )
        .unwrap();

        let stitch = story.stitch("start").unwrap();
        assert_eq!(stitch.page_num, Some(2));
        assert_eq!(stitch.page_label.as_deref(), Some("One"));
    }

    #[test]
    fn test_hashtags_map() {
        let story = sample_story();
        let tags = story.hashtags("corridor").unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("#LEFT").map(String::as_str), Some("leftPath"));
        assert_eq!(tags.get("#RIGHT").map(String::as_str), Some("rightPath"));
    }

    #[test]
    fn test_hashtags_unknown_key() {
        let story = sample_story();
        let result = story.hashtags("missing");
        assert!(matches!(result, Err(StoryError::UnknownKey(key)) if key == "missing"));
    }

    #[test]
    fn test_hashtags_rejects_label_without_tag() {
        let story = story_from(
            r#"{
                "title": "Tagless",
                "data": {
                    "editorData": {"authorName": "A"},
                    "initial": "start",
                    "stitches": {
                        "start": {"content": ["text",
                            {"option": "no tag here", "linkPath": "a"},
                            {"option": "fine #Tag", "linkPath": "b"}]}
                    }
                }
            }"#,
        )
        .unwrap();

        let result = story.hashtags("start");
        assert!(matches!(result, Err(StoryError::OptionHashtag { label }) if label == "no tag here"));
    }

    #[test]
    fn test_hashtags_rejects_label_with_two_tags() {
        let story = story_from(
            r##"{
                "title": "Doubled",
                "data": {
                    "editorData": {"authorName": "A"},
                    "initial": "start",
                    "stitches": {
                        "start": {"content": ["text",
                            {"option": "#One or #Two", "linkPath": "a"}]}
                    }
                }
            }"##,
        )
        .unwrap();

        assert!(matches!(story.hashtags("start"), Err(StoryError::OptionHashtag { .. })));
    }
}
