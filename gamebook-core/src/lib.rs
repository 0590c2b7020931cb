//! Branching-story engine for a hashtag-voting gamebook bot.
//!
//! This crate provides:
//! - An inklewriter story loader and condition-gated graph traversal
//! - Section rendering with 280-character choice prompts
//! - An append-only game log that doubles as the resumable session state
//! - Vote tallying over audience reply hashtags
//! - A game loop over pluggable publisher/collector channels (console,
//!   Twitter, or mocks)
//!
//! # Quick Start
//!
//! ```ignore
//! use gamebook_core::{Game, GameConfig, GameLog, Story};
//! use gamebook_core::console::{ConsoleCollector, ConsolePublisher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = tokio::fs::read("story.json").await?;
//!     let story = Story::parse(&bytes)?;
//!
//!     let mut game = Game::new(
//!         story,
//!         GameLog::new("gamebook.log"),
//!         Box::new(ConsolePublisher::new()),
//!         Box::new(ConsoleCollector::new()),
//!         GameConfig::default().with_period(std::time::Duration::ZERO),
//!     );
//!     game.play().await?;
//!     Ok(())
//! }
//! ```

pub mod conditions;
pub mod console;
pub mod game;
pub mod gamelog;
pub mod live;
pub mod render;
pub mod story;
pub mod tally;
pub mod testing;

// Primary public API
pub use conditions::passes;
pub use game::{
    parse_period, ChannelError, Game, GameConfig, GameError, Publisher, ReplyCollector,
};
pub use gamelog::{parse_last_state, GameLog, LogError, Resume, SessionState};
pub use render::{
    format_options, render_section, wrap_text, DecisionEvent, FormattedOptions, Section,
    MAX_POST_LEN,
};
pub use story::{Choice, Stitch, Story, StoryError};
pub use tally::{extract_tags, tally};
pub use testing::{MockCollector, MockPost, MockPublisher};
