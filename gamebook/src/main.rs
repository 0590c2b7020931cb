//! The gamebook bot binary.
//!
//! Loads a story from a local file or URL, picks the console or live
//! channel pair, and runs the game loop until the story ends. All session
//! state lives in the game log, so the process can be killed and restarted
//! at any point.

use anyhow::{bail, Context, Result};
use clap::Parser;
use gamebook_core::console::{ConsoleCollector, ConsolePublisher};
use gamebook_core::live::{LiveCollector, LivePublisher};
use gamebook_core::{parse_period, Game, GameConfig, GameLog, Publisher, ReplyCollector, Story};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use twitter::Twitter;

#[derive(Debug, Parser)]
#[command(name = "gamebook", about = "Play a branching gamebook by audience vote")]
struct Args {
    /// Story source: a local file path or an http(s) URL
    #[arg(short, long)]
    source: String,

    /// Reply window between decision points, e.g. 90s, 30m, 24h, 3d
    #[arg(short = 't', long)]
    period: Option<String>,

    /// Run an interactive console session instead of posting to Twitter
    #[arg(short = 'n', long)]
    console: bool,

    /// Game log path; this file is the bot's persisted state
    #[arg(long, default_value = "gamebook.log")]
    log: PathBuf,

    /// Start fresh when the game log cannot be parsed instead of failing
    #[arg(long)]
    tolerate_corrupt_log: bool,

    /// Verbose diagnostic output
    #[arg(short = 'd', long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bytes = fetch_source(&args.source).await?;
    let story = Story::parse(&bytes)
        .with_context(|| format!("failed to load story from {}", args.source))?;
    tracing::info!(title = %story.title, stitches = story.len(), "story loaded");

    let period = match &args.period {
        Some(period) => parse_period(period)?,
        // Interactive sessions default to no wait; live games to a day.
        None if args.console => Duration::ZERO,
        None => Duration::from_secs(24 * 60 * 60),
    };

    let mut config = GameConfig::default().with_period(period);
    if args.tolerate_corrupt_log {
        config = config.with_tolerate_corrupt_log();
    }

    let (publisher, collector): (Box<dyn Publisher>, Box<dyn ReplyCollector>) = if args.console {
        tracing::debug!("using the console channel pair");
        (
            Box::new(ConsolePublisher::new()),
            Box::new(ConsoleCollector::new()),
        )
    } else {
        let client =
            Twitter::from_env().context("TWITTER_BEARER_TOKEN must be set for a live game")?;
        (
            Box::new(LivePublisher::new(client.clone())),
            Box::new(LiveCollector::new(client)),
        )
    };

    let mut game = Game::new(story, GameLog::new(&args.log), publisher, collector, config);
    game.play().await?;
    tracing::info!("story complete");
    Ok(())
}

/// Fetch the story bytes from a URL or the local filesystem.
async fn fetch_source(source: &str) -> Result<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        tracing::debug!(%source, "fetching story over HTTP");
        let response = reqwest::get(source)
            .await
            .with_context(|| format!("could not fetch {source}"))?;
        if !response.status().is_success() {
            bail!("{source} returned {}", response.status());
        }
        Ok(response.bytes().await?.to_vec())
    } else {
        tokio::fs::read(source)
            .await
            .with_context(|| format!("could not read {source}"))
    }
}
