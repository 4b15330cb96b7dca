use anyhow::Result;
use clap::Args;
use emoboard_core::Category;

use super::{CmdContext, EmotionView};
use crate::output::render_list;

/// Arguments for `eb list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of posts to load (default: configured feed limit).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Only show posts tagged with this emotion.
    #[arg(long)]
    pub emotion: Option<Category>,
}

/// Load the board and print it newest first.
pub fn run_list(args: &ListArgs, ctx: &CmdContext) -> Result<()> {
    let mut session = ctx.session()?;
    if let Some(limit) = args.limit {
        session = session.with_limit(limit);
    }
    session.load()?;

    let views: Vec<EmotionView> = session
        .emotions()
        .iter()
        .filter(|emotion| args.emotion.is_none_or(|category| emotion.emotion == category))
        .map(EmotionView::from)
        .collect();
    if views.is_empty() {
        ctx.note("The board is empty.");
    }
    render_list(&views, ctx.output)?;
    Ok(())
}
