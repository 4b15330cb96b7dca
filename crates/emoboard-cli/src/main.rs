#![forbid(unsafe_code)]

mod cmd;
mod output;
mod tui;

use clap::{CommandFactory, Parser, Subcommand};
use emoboard_core::config::ConfigOverrides;
use output::{CliError, OutputMode};
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "eb: anonymous live emotion board",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty, text, or json. Defaults to pretty on a
    /// terminal and text otherwise.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Backend endpoint (`https://…`, `sqlite://path`, or `memory:`).
    /// Overrides `EMOBOARD_URL` and the project config file.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Backend access key. Overrides `EMOBOARD_KEY`.
    #[arg(long, global = true)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: self.endpoint.clone(),
            access_key: self.key.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List recent emotions",
        long_about = "List the most recent emotions, newest first.",
        after_help = "EXAMPLES:\n    # Show the latest posts\n    eb list\n\n    # Only hopeful posts, at most 10\n    eb list --emotion hope -n 10\n\n    # Emit machine-readable output\n    eb list --format json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Write",
        about = "Share an emotion",
        long_about = "Post a short anonymous text tagged with an emotion. \
                      The dot lands at a random spot on the board.",
        after_help = "EXAMPLES:\n    # Post with the default emotion (sadness)\n    eb add \"long week\"\n\n    # Pick an emotion\n    eb add \"got the job\" --emotion joy\n\n    # Emit machine-readable output\n    eb add \"waiting\" -e anxiety --format json"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one emotion",
        long_about = "Show a single post with its board position and tooltip text.",
        after_help = "EXAMPLES:\n    # Show a post\n    eb show 3f2a9c\n\n    # Emit machine-readable output\n    eb show 3f2a9c --format json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Count emotions per category",
        long_about = "Show the legend: how many loaded posts carry each emotion.",
        after_help = "EXAMPLES:\n    # Show the legend\n    eb legend\n\n    # Emit machine-readable output\n    eb legend --format json"
    )]
    Legend(cmd::legend::LegendArgs),

    #[command(
        next_help_heading = "Live",
        about = "Stream new emotions as they arrive",
        long_about = "Load the feed, subscribe to inserts and print each new post.",
        after_help = "EXAMPLES:\n    # Follow the board until Ctrl-C\n    eb watch\n\n    # Stop after five new posts or a minute\n    eb watch --count 5 --timeout 60"
    )]
    Watch(cmd::watch::WatchArgs),

    #[command(
        next_help_heading = "Live",
        about = "Open the interactive board",
        long_about = "Full-screen board with live dots, legend, tooltips and an add dialog.",
        after_help = "EXAMPLES:\n    # Open the board\n    eb board\n\n    # Against a local database\n    eb board --endpoint sqlite://board.db --key local"
    )]
    Board(cmd::board::BoardArgs),

    #[command(
        next_help_heading = "Diagnostics",
        about = "Run the deterministic sync simulator",
        long_about = "Drive simulated clients over a faulty network and check that \
                      every feed converges.",
        after_help = "EXAMPLES:\n    # Run seeds 0..100\n    eb sim\n\n    # Lossy network\n    eb sim --seeds 0..50 --drop 30\n\n    # Replay one seed with a full trace\n    eb sim --replay 17 --format json"
    )]
    Sim(cmd::sim::SimArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    eb completions bash\n\n    # Generate zsh completions\n    eb completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("EMOBOARD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "emoboard=debug,info"
        } else {
            "emoboard=info,warn"
        })
    });

    let format = env::var("EMOBOARD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = cli.output_mode();
    let project_root = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => fail(output, &anyhow::Error::from(e)),
    };
    let ctx = cmd::CmdContext {
        output,
        overrides: cli.overrides(),
        project_root,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Commands::List(ref args) => cmd::list::run_list(args, &ctx),
        Commands::Add(ref args) => cmd::add::run_add(args, &ctx),
        Commands::Show(ref args) => cmd::show::run_show(args, &ctx),
        Commands::Legend(ref args) => cmd::legend::run_legend(args, &ctx),
        Commands::Watch(ref args) => cmd::watch::run_watch(args, &ctx),
        Commands::Board(ref args) => cmd::board::run_board(args, &ctx),
        Commands::Sim(ref args) => cmd::sim::run_sim(args, &ctx),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    };

    if let Err(e) = result {
        fail(output, &e);
    }
}

/// Print `err` in the active output mode and exit non-zero.
fn fail(output: OutputMode, err: &anyhow::Error) -> ! {
    if let Err(render) = output::render_error(output, &CliError::from(err)) {
        eprintln!("error: {err:#} ({render})");
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use emoboard_core::Category;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn format_flag_parses_before_and_after_subcommand() {
        let cli = Cli::parse_from(["eb", "--format", "json", "list"]);
        assert_eq!(cli.format, Some(OutputMode::Json));
        let cli = Cli::parse_from(["eb", "list", "--format", "text"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn json_flag_sets_output_mode() {
        let cli = Cli::parse_from(["eb", "legend", "--json"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn add_defaults_to_sadness() {
        let cli = Cli::parse_from(["eb", "add", "grey sky"]);
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.text, "grey sky");
                assert_eq!(args.emotion, Category::Sadness);
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn add_rejects_unknown_emotion() {
        assert!(Cli::try_parse_from(["eb", "add", "x", "--emotion", "boredom"]).is_err());
    }

    #[test]
    fn endpoint_and_key_become_overrides() {
        let cli = Cli::parse_from(["eb", "--endpoint", "memory:", "--key", "k", "legend"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.endpoint.as_deref(), Some("memory:"));
        assert_eq!(overrides.access_key.as_deref(), Some("k"));
    }

    #[test]
    fn replay_conflicts_with_seed_range() {
        assert!(Cli::try_parse_from(["eb", "sim", "--replay", "3", "--seeds", "0..4"]).is_err());
        assert!(Cli::try_parse_from(["eb", "sim", "--replay", "3"]).is_ok());
    }
}
