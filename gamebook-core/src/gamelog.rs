//! The game log: the bot's only persisted state.
//!
//! Session progress lives in an append-only text log the bot re-reads at
//! every iteration. The wire format is fixed, one event per line:
//!
//! ```text
//! <timestamp> - <level> - <payload>
//! ```
//!
//! with the timestamp formatted `%b %d %H:%M` (no year) and `INFO` marking
//! the session-relevant lines; everything else is debug noise the reader
//! skips. A completed decision point is exactly two consecutive INFO lines,
//! the `{key} - {flags as JSON array}` pair followed by the id of the
//! published prompt. A finished story is a single `GAMEEND {title}` line.
//!
//! Keeping the parsing behind this module means the rest of the engine never
//! sees the format, so a structured state file could replace it later.

use chrono::{Datelike, Local, NaiveDateTime};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Payload marker for a finished story.
pub const END_MARKER: &str = "GAMEEND";

const LEVEL_INFO: &str = "INFO";
const LEVEL_DEBUG: &str = "DEBUG";
const TIMESTAMP_FORMAT: &str = "%b %d %H:%M";

/// Errors from writing or reconstructing the game log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("flags could not be serialized: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a decision line before the message id, got: {line}")]
    NotDecisionPair { line: String },

    #[error("flags are not a JSON string array in: {line}")]
    BadFlags { line: String },

    #[error("unreadable timestamp in: {line}")]
    BadTimestamp { line: String },
}

/// Session state reconstructed from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Key of the decision point the session stopped at.
    pub current_key: String,
    /// Flags accumulated up to that decision.
    pub flags: BTreeSet<String>,
    /// Id of the published prompt; replies thread onto it.
    pub last_message_id: String,
    /// When the prompt id was logged. The persisted format has no year, so
    /// the current year is assumed at read time.
    pub logged_at: NaiveDateTime,
}

/// What the log says about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    /// No prior session; start from the story's initial stitch.
    Fresh,
    /// The story already finished; there is nothing to reprocess.
    Ended,
    /// Mid-story: waiting on votes at a decision point.
    InProgress(SessionState),
}

/// Append-only handle on the log file.
///
/// Writes go straight to disk in event order, never buffered or reordered;
/// the decision/message-id pairing is what makes reconstruction unambiguous.
pub struct GameLog {
    path: PathBuf,
}

impl GameLog {
    /// Create a handle for the log at `path`. The file itself is created on
    /// first append.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Record a decision point: the stitch key and the flag snapshot.
    pub async fn append_decision_point(
        &self,
        key: &str,
        flags: &BTreeSet<String>,
    ) -> Result<(), LogError> {
        let flags_json = serde_json::to_string(flags)?;
        self.append_line(LEVEL_INFO, &format!("{key} - {flags_json}"))
            .await
    }

    /// Record the id the prompt was published under.
    pub async fn append_message_id(&self, id: &str) -> Result<(), LogError> {
        self.append_line(LEVEL_INFO, id).await
    }

    /// Record that the story titled `title` finished.
    pub async fn append_end(&self, title: &str) -> Result<(), LogError> {
        self.append_line(LEVEL_INFO, &format!("{END_MARKER} {title}"))
            .await
    }

    /// Record a diagnostic line the reader will skip.
    pub async fn append_debug(&self, message: &str) -> Result<(), LogError> {
        self.append_line(LEVEL_DEBUG, message).await
    }

    async fn append_line(&self, level: &str, payload: &str) -> Result<(), LogError> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let line = format!("{timestamp} - {level} - {payload}\n");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Re-read the whole log and reconstruct where the session titled
    /// `title` left off. A missing file is a fresh start.
    ///
    /// With `tolerate_corruption`, reconstruction mismatches degrade to
    /// [`Resume::Fresh`] instead of failing; IO errors always propagate.
    pub async fn load_last_state(
        &self,
        title: &str,
        tolerate_corruption: bool,
    ) -> Result<Resume, LogError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Resume::Fresh),
            Err(e) => return Err(e.into()),
        };
        parse_last_state(&raw, title, tolerate_corruption)
    }
}

/// Reconstruct session state from raw log text. Pure over the line sequence;
/// [`GameLog::load_last_state`] reads the file and delegates here.
pub fn parse_last_state(
    raw: &str,
    title: &str,
    tolerate_corruption: bool,
) -> Result<Resume, LogError> {
    let lines = info_lines(raw);

    let Some((_, last_payload)) = lines.last() else {
        return Ok(Resume::Fresh);
    };
    if *last_payload == format!("{END_MARKER} {title}") {
        return Ok(Resume::Ended);
    }
    if lines.len() < 2 {
        return Ok(Resume::Fresh);
    }

    let decision = &lines[lines.len() - 2];
    let message = &lines[lines.len() - 1];

    match reconstruct(decision, message) {
        Ok(state) => Ok(Resume::InProgress(state)),
        Err(_) if tolerate_corruption => Ok(Resume::Fresh),
        Err(e) => Err(e),
    }
}

/// Timestamp/payload pairs of the session-relevant lines, in order.
fn info_lines(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, " - ");
            let timestamp = parts.next()?;
            let level = parts.next()?;
            let payload = parts.next()?;
            (level == LEVEL_INFO).then(|| (timestamp.to_string(), payload.to_string()))
        })
        .collect()
}

fn reconstruct(
    decision: &(String, String),
    message: &(String, String),
) -> Result<SessionState, LogError> {
    let (_, decision_payload) = decision;
    let (message_timestamp, message_payload) = message;

    let (key, flags_json) =
        decision_payload
            .split_once(" - ")
            .ok_or_else(|| LogError::NotDecisionPair {
                line: decision_payload.clone(),
            })?;
    if key.is_empty() {
        return Err(LogError::NotDecisionPair {
            line: decision_payload.clone(),
        });
    }

    let flags: BTreeSet<String> =
        serde_json::from_str(flags_json).map_err(|_| LogError::BadFlags {
            line: decision_payload.clone(),
        })?;

    // The wire format drops the year; assume the current one.
    let year = Local::now().year();
    let logged_at = NaiveDateTime::parse_from_str(
        &format!("{year} {message_timestamp}"),
        "%Y %b %d %H:%M",
    )
    .map_err(|_| LogError::BadTimestamp {
        line: message_timestamp.clone(),
    })?;

    Ok(SessionState {
        current_key: key.to_string(),
        flags,
        last_message_id: message_payload.clone(),
        logged_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_log_is_fresh() {
        assert_eq!(parse_last_state("", "Any", false).unwrap(), Resume::Fresh);
    }

    #[test]
    fn test_single_info_line_is_fresh() {
        let raw = "Mar 01 09:15 - INFO - corridor - [\"lantern\"]\n";
        assert_eq!(parse_last_state(raw, "Any", false).unwrap(), Resume::Fresh);
    }

    #[test]
    fn test_debug_lines_are_invisible() {
        let raw = "\
Mar 01 09:14 - DEBUG - building stitch corridor
Mar 01 09:15 - INFO - corridor - [\"lantern\"]
Mar 01 09:15 - DEBUG - posted chunk 1/1
Mar 01 09:16 - INFO - 1460323737035677698
Mar 01 09:17 - DEBUG - polling for replies
";
        let resume = parse_last_state(raw, "Any", false).unwrap();
        let Resume::InProgress(state) = resume else {
            panic!("expected an in-progress session");
        };
        assert_eq!(state.current_key, "corridor");
        assert_eq!(state.flags, set(&["lantern"]));
        assert_eq!(state.last_message_id, "1460323737035677698");
    }

    #[test]
    fn test_malformed_noise_is_skipped() {
        let raw = "\
garbage line without separators
Mar 01 09:15 - INFO - corridor - []
Mar 01 09:16 - INFO - 42
";
        let resume = parse_last_state(raw, "Any", false).unwrap();
        assert!(matches!(resume, Resume::InProgress(state) if state.current_key == "corridor"));
    }

    #[test]
    fn test_empty_flags_round_trip() {
        let raw = "Mar 01 09:15 - INFO - corridor - []\nMar 01 09:16 - INFO - 42\n";
        let Resume::InProgress(state) = parse_last_state(raw, "Any", false).unwrap() else {
            panic!("expected an in-progress session");
        };
        assert!(state.flags.is_empty());
    }

    #[test]
    fn test_matching_end_marker_is_ended() {
        let raw = "\
Mar 01 09:15 - INFO - corridor - []
Mar 01 09:16 - INFO - 42
Mar 02 18:00 - INFO - GAMEEND The Cave of Tests
";
        let resume = parse_last_state(raw, "The Cave of Tests", false).unwrap();
        assert_eq!(resume, Resume::Ended);
    }

    #[test]
    fn test_foreign_end_marker_is_not_recognized() {
        // An end marker for some other story is just an ordinary payload, so
        // the pair check fails loudly in strict mode.
        let raw = "\
Mar 01 09:15 - INFO - corridor - []
Mar 01 09:16 - INFO - 42
Mar 02 18:00 - INFO - GAMEEND Some Other Story
";
        let result = parse_last_state(raw, "The Cave of Tests", false);
        assert!(matches!(result, Err(LogError::NotDecisionPair { .. })));

        let tolerant = parse_last_state(raw, "The Cave of Tests", true).unwrap();
        assert_eq!(tolerant, Resume::Fresh);
    }

    #[test]
    fn test_bad_flags_json() {
        let raw = "Mar 01 09:15 - INFO - corridor - [not json\nMar 01 09:16 - INFO - 42\n";
        assert!(matches!(
            parse_last_state(raw, "Any", false),
            Err(LogError::BadFlags { .. })
        ));
        assert_eq!(parse_last_state(raw, "Any", true).unwrap(), Resume::Fresh);
    }

    #[test]
    fn test_bad_timestamp() {
        let raw = "Mar 01 09:15 - INFO - corridor - []\nnot a date - INFO - 42\n";
        assert!(matches!(
            parse_last_state(raw, "Any", false),
            Err(LogError::BadTimestamp { .. })
        ));
    }

    #[test]
    fn test_timestamp_assumes_current_year() {
        let raw = "Mar 01 09:15 - INFO - corridor - []\nMar 01 09:16 - INFO - 42\n";
        let Resume::InProgress(state) = parse_last_state(raw, "Any", false).unwrap() else {
            panic!("expected an in-progress session");
        };
        assert_eq!(state.logged_at.year(), Local::now().year());
        assert_eq!(state.logged_at.format("%b %d %H:%M").to_string(), "Mar 01 09:16");
    }

    #[tokio::test]
    async fn test_append_round_trip() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let log = GameLog::new(dir.path().join("game.log"));

        let flags = set(&["lantern", "wentLeft"]);
        log.append_decision_point("fork", &flags).await.unwrap();
        log.append_message_id("98765").await.unwrap();

        let resume = log.load_last_state("The Cave of Tests", false).await.unwrap();
        let Resume::InProgress(state) = resume else {
            panic!("expected an in-progress session");
        };
        assert_eq!(state.current_key, "fork");
        assert_eq!(state.flags, flags);
        assert_eq!(state.last_message_id, "98765");
    }

    #[tokio::test]
    async fn test_append_round_trip_empty_flags() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let log = GameLog::new(dir.path().join("game.log"));

        log.append_decision_point("corridor", &BTreeSet::new())
            .await
            .unwrap();
        log.append_message_id("1").await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("game.log")).unwrap();
        assert!(raw.contains("corridor - []"));

        let resume = log.load_last_state("Any", false).await.unwrap();
        assert!(matches!(resume, Resume::InProgress(state) if state.flags.is_empty()));
    }

    #[tokio::test]
    async fn test_append_end_round_trip() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let log = GameLog::new(dir.path().join("game.log"));

        log.append_decision_point("corridor", &BTreeSet::new())
            .await
            .unwrap();
        log.append_message_id("1").await.unwrap();
        log.append_end("The Cave of Tests").await.unwrap();

        let resume = log.load_last_state("The Cave of Tests", false).await.unwrap();
        assert_eq!(resume, Resume::Ended);
    }

    #[tokio::test]
    async fn test_debug_appends_do_not_affect_state() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let log = GameLog::new(dir.path().join("game.log"));

        log.append_decision_point("corridor", &BTreeSet::new())
            .await
            .unwrap();
        log.append_message_id("7").await.unwrap();
        log.append_debug("surveying replies").await.unwrap();
        log.append_debug("still nothing").await.unwrap();

        let resume = log.load_last_state("Any", false).await.unwrap();
        assert!(matches!(resume, Resume::InProgress(state) if state.last_message_id == "7"));
    }

    #[tokio::test]
    async fn test_missing_file_is_fresh() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let log = GameLog::new(dir.path().join("never-written.log"));

        let resume = log.load_last_state("Any", false).await.unwrap();
        assert_eq!(resume, Resume::Fresh);
    }
}
