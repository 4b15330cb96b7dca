pub mod add;
pub mod board;
pub mod completions;
pub mod legend;
pub mod list;
pub mod show;
pub mod sim;
pub mod watch;

use anyhow::{Context, Result};
use chrono::Local;
use emoboard_core::backend::{self, EmotionBackend};
use emoboard_core::board::format_timestamp_in;
use emoboard_core::config::{BoardConfig, ConfigOverrides, resolve_config};
use emoboard_core::position::RandomPositions;
use emoboard_core::{Emotion, FeedSession};
use rand::rngs::StdRng;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::output::{OutputMode, Renderable};

/// Session type every board command works with.
pub type BoardSession = FeedSession<Box<dyn EmotionBackend>, RandomPositions<StdRng>>;

/// What every command needs from the global flags.
#[derive(Debug, Clone)]
pub struct CmdContext {
    pub output: OutputMode,
    pub overrides: ConfigOverrides,
    pub project_root: PathBuf,
    pub quiet: bool,
}

impl CmdContext {
    /// Resolve configuration. Missing endpoint or key fails here, before any
    /// backend is built.
    pub fn config(&self) -> Result<BoardConfig> {
        Ok(resolve_config(&self.project_root, &self.overrides)?)
    }

    /// Connect to the configured backend and build an idle session.
    pub fn session(&self) -> Result<BoardSession> {
        let config = self.config()?;
        let backend = backend::connect(&config)
            .with_context(|| format!("connecting to {}", config.endpoint))?;
        Ok(FeedSession::new(backend, RandomPositions::from_entropy())
            .with_limit(config.feed.feed_limit))
    }

    /// Informational line on stderr, suppressed by `--quiet` and in JSON mode.
    pub fn note(&self, message: &str) {
        if !self.quiet && !self.output.is_json() {
            let _ = writeln!(io::stderr(), "{message}");
        }
    }
}

/// One post as the CLI prints it.
#[derive(Debug, Clone, Serialize)]
pub struct EmotionView {
    #[serde(flatten)]
    pub emotion: Emotion,
    pub label: &'static str,
    pub created: String,
}

impl From<&Emotion> for EmotionView {
    fn from(emotion: &Emotion) -> Self {
        Self {
            emotion: emotion.clone(),
            label: emotion.emotion.label(),
            created: format_timestamp_in(emotion.timestamp, &Local),
        }
    }
}

impl Renderable for EmotionView {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "● {:<10} {}", self.label, self.emotion.text)?;
        writeln!(
            w,
            "  {}  {}  ({:.1}%, {:.1}%)",
            self.emotion.id, self.created, self.emotion.x, self.emotion.y
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}  {}  {}  {}",
            self.emotion.id,
            self.emotion.emotion,
            self.created,
            self.emotion.text
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "emotion", "created", "text"]
    }
}
