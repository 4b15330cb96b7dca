use anyhow::Result;
use clap::Args;
use emoboard_core::error::ErrorCode;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{CmdContext, EmotionView};
use crate::output::{CodedError, render_item};

const TICK: Duration = Duration::from_millis(250);

/// Arguments for `eb watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Exit after this many new posts.
    #[arg(long)]
    pub count: Option<usize>,

    /// Exit after this many seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Load the board, then print every post pushed to it until a limit is hit.
pub fn run_watch(args: &WatchArgs, ctx: &CmdContext) -> Result<()> {
    let mut session = ctx.session()?;
    session.start();
    if !session.is_live() {
        let message = session.error().unwrap_or("change stream unavailable").to_string();
        return Err(CodedError::new(ErrorCode::SubscribeFailed, message).into());
    }
    if let Some(error) = session.error() {
        ctx.note(&format!("warning: {error}"));
    }
    ctx.note(&format!(
        "Watching a board of {} posts. New posts appear below.",
        session.emotions().len()
    ));

    let deadline = args.timeout.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut printed = 0_usize;
    loop {
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            break;
        }
        let wait = deadline.map_or(TICK, |deadline| (deadline - now).min(TICK));

        let stats = session.pump_blocking(wait);
        if stats.merged > 0 {
            let remaining = args.count.map_or(usize::MAX, |count| count - printed);
            // Merged posts sit at the head, newest arrival first.
            let fresh: Vec<EmotionView> = session.emotions()[..stats.merged]
                .iter()
                .rev()
                .take(remaining)
                .map(EmotionView::from)
                .collect();
            for view in &fresh {
                render_item(view, ctx.output)?;
            }
            printed += fresh.len();
        }
        if stats.dropped > 0 {
            debug!(dropped = stats.dropped, "ignored malformed pushes");
        }
        if stats.disconnected {
            let message = session.error().unwrap_or("change stream closed").to_string();
            return Err(CodedError::new(ErrorCode::SubscribeFailed, message).into());
        }
    }

    session.stop();
    debug!(printed, "watch finished");
    Ok(())
}
