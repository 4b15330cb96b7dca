//! How `eb` prints results and errors.
//!
//! Commands never pick a format themselves; they get an [`OutputMode`]:
//!
//! - `pretty`: headed sections for people at a terminal
//! - `text`: one row per record, two-space separated, for `grep`/`cut`
//! - `json`: stable objects and arrays
//!
//! The mode comes from `--format` (or the hidden `--json`), then the `FORMAT`
//! environment variable, then whether stdout is a terminal.

use clap::ValueEnum;
use emoboard_core::config::ConfigError;
use emoboard_core::error::ErrorCode;
use emoboard_core::feed::FeedError;
use serde::Serialize;
use std::fmt;
use std::io::{self, IsTerminal, Write};

/// Width of the `----` rule under pretty headings.
pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", "-".repeat(PRETTY_RULE_WIDTH))
}

/// Heading line plus rule.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// `Key:        value`, keys padded to one column.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    let key = format!("{key}:");
    writeln!(w, "{key:<12} {}", value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Sections and labels.
    Pretty,
    /// One line per record.
    Text,
    /// JSON.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    /// Parse a `FORMAT` value. Unknown values are ignored.
    fn from_env_value(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn pick_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    stdout_is_tty: bool,
) -> OutputMode {
    format_flag
        .or_else(|| json_flag.then_some(OutputMode::Json))
        .or_else(|| format_env.and_then(OutputMode::from_env_value))
        .unwrap_or(if stdout_is_tty {
            OutputMode::Pretty
        } else {
            OutputMode::Text
        })
}

/// Output mode for this process.
pub fn resolve_output_mode(format_flag: Option<OutputMode>, json_flag: bool) -> OutputMode {
    let format_env = std::env::var("FORMAT").ok();
    pick_mode(
        format_flag,
        json_flag,
        format_env.as_deref(),
        io::stdout().is_terminal(),
    )
}

/// A record that can be printed in every [`OutputMode`].
pub trait Renderable {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    /// One JSON object, optionally newline-terminated.
    fn render_json(&self, w: &mut dyn Write) -> io::Result<()>;

    /// One text row whose columns follow [`Renderable::table_headers`].
    fn render_table(&self, w: &mut dyn Write) -> io::Result<()>;

    fn table_headers() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[]
    }
}

/// Print one record to stdout.
pub fn render_item<R: Renderable>(item: &R, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Pretty => item.render_human(&mut out),
        OutputMode::Text => item.render_table(&mut out),
        OutputMode::Json => item.render_json(&mut out),
    }
}

/// Print records to `out`. JSON mode emits one array (`[]` when empty); text
/// mode leads with a header row unless there is nothing to show.
pub fn write_list<R: Renderable>(
    out: &mut dyn Write,
    items: &[R],
    mode: OutputMode,
) -> io::Result<()> {
    match mode {
        OutputMode::Pretty => items.iter().try_for_each(|item| item.render_human(out)),
        OutputMode::Text => {
            if let Some(headers) = (!items.is_empty()).then(R::table_headers) {
                writeln!(out, "{}", headers.join("  "))?;
            }
            items.iter().try_for_each(|item| item.render_table(out))
        }
        OutputMode::Json => {
            let mut objects = Vec::with_capacity(items.len());
            for item in items {
                let mut buf = Vec::new();
                item.render_json(&mut buf)?;
                objects.push(String::from_utf8_lossy(buf.trim_ascii_end()).into_owned());
            }
            if objects.is_empty() {
                writeln!(out, "[]")
            } else {
                writeln!(out, "[\n{}\n]", objects.join(",\n"))
            }
        }
    }
}

pub fn render_list<R: Renderable>(items: &[R], mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_list(&mut out, items, mode)
}

/// Print a serializable value: JSON via serde, the other modes via the given
/// closures.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text(value, &mut out)?,
        OutputMode::Pretty => pretty(value, &mut out)?,
    }
    Ok(())
}

/// A command failure tagged with a stable [`ErrorCode`].
#[derive(Debug)]
pub struct CodedError {
    pub code: ErrorCode,
    pub message: String,
}

impl CodedError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CodedError {}

/// What gets printed when a command fails.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Stable code, e.g. `E3001`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    fn with_code(message: String, code: ErrorCode) -> Self {
        Self {
            message,
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

impl From<&anyhow::Error> for CliError {
    /// Pick the code from the first known error type in the chain.
    fn from(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        if let Some(coded) = err.downcast_ref::<CodedError>() {
            return Self::with_code(message, coded.code);
        }
        if let Some(feed) = err.downcast_ref::<FeedError>() {
            return Self::with_code(message, feed.code());
        }
        if let Some(config) = err.downcast_ref::<ConfigError>() {
            return Self::with_code(message, config.code());
        }
        Self {
            message,
            suggestion: None,
            error_code: None,
        }
    }
}

/// `error[E1001]: message` plus an optional suggestion line, or
/// `{"error": {...}}` in JSON mode.
pub fn write_error(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *out, &serde_json::json!({ "error": error }))?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(hint) = &error.suggestion {
                writeln!(out, "  suggestion: {hint}")?;
            }
        }
    }
    Ok(())
}

/// [`write_error`] to stderr.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(&'static str);

    impl Renderable for Row {
        fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
            writeln!(w, "row {}", self.0)
        }

        fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
            writeln!(w, "{{\"name\":\"{}\"}}", self.0)
        }

        fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
            writeln!(w, "{}", self.0)
        }

        fn table_headers() -> &'static [&'static str] {
            &["name"]
        }
    }

    fn list(mode: OutputMode, rows: &[Row]) -> String {
        let mut buf = Vec::new();
        write_list(&mut buf, rows, mode).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn format_flag_wins_over_json_and_env() {
        let mode = pick_mode(Some(OutputMode::Text), true, Some("pretty"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn json_flag_wins_over_env() {
        let mode = pick_mode(None, true, Some("pretty"), true);
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn format_env_is_case_insensitive() {
        let mode = pick_mode(None, false, Some("TEXT"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn unknown_env_falls_through_to_tty() {
        assert_eq!(
            pick_mode(None, false, Some("fancy"), true),
            OutputMode::Pretty
        );
        assert_eq!(
            pick_mode(None, false, None, false),
            OutputMode::Text
        );
    }

    #[test]
    fn json_list_is_an_array() {
        let out = list(OutputMode::Json, &[Row("a"), Row("b")]);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        let empty: serde_json::Value = serde_json::from_str(&list(OutputMode::Json, &[])).unwrap();
        assert_eq!(empty, serde_json::json!([]));
    }

    #[test]
    fn text_list_has_header_only_when_not_empty() {
        assert_eq!(list(OutputMode::Text, &[Row("a")]), "name\na\n");
        assert_eq!(list(OutputMode::Text, &[]), "");
    }

    #[test]
    fn feed_errors_carry_their_code() {
        let err = anyhow::Error::new(FeedError::Load("timeout".to_string()));
        let cli = CliError::from(&err);
        assert_eq!(cli.message, "Database error: timeout");
        assert_eq!(cli.error_code.as_deref(), Some("E3001"));
        assert!(cli.suggestion.is_some());
    }

    #[test]
    fn context_keeps_the_code_reachable() {
        let err = anyhow::Error::new(CodedError::new(ErrorCode::RecordNotFound, "no such id"))
            .context("show failed");
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E4001"));
        assert!(cli.message.starts_with("show failed"));
    }

    #[test]
    fn json_error_is_wrapped() {
        let mut buf = Vec::new();
        let err = anyhow::Error::new(ConfigError::MissingEndpoint);
        write_error(&mut buf, OutputMode::Json, &CliError::from(&err)).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed["error"]["error_code"], "E1001");
    }

    #[test]
    fn uncoded_error_is_plain() {
        let mut buf = Vec::new();
        let err = anyhow::anyhow!("boom");
        write_error(&mut buf, OutputMode::Text, &CliError::from(&err)).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "error: boom\n");
    }
}
